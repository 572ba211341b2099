//! The client half of the handshake.
//!
//! A client offers one key share per configured key-share group in its
//! first ClientHello.  If the server answers with a HelloRetryRequest,
//! the client checks it, replaces its key shares with one for the
//! requested group, echoes any cookie, and sends a second ClientHello.
//! Only one retry is tolerated.

mod builder;
mod client_conn;
mod hs;
mod tls13;

pub use builder::{ClientConfig, ClientConfigBuilder};
pub use client_conn::{ClientConnection, ClientConnectionData};
