//! The server half of the handshake.
//!
//! The server picks its most preferred group that the client sent a key
//! share for.  If there is none, it asks for its most preferred group
//! from the client's `supported_groups` with a HelloRetryRequest, and
//! holds the second ClientHello to that choice.

mod builder;
mod hs;
mod server_conn;
mod tls13;

pub use builder::{ServerConfig, ServerConfigBuilder};
pub use server_conn::{ServerConnection, ServerConnectionData};
