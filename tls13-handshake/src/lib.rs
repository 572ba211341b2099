//! # tls13-handshake
//!
//! A TLS 1.3 client and server, built around the handshake and its
//! HelloRetryRequest branch.
//!
//! ## Key shares and HelloRetryRequest
//!
//! A client advertises its groups in `supported_groups`, in preference
//! order, but only generates key shares for a subset of them
//! ([`ClientConfigBuilder::with_key_share_groups`]).  A server picks the
//! first of its own groups the client sent a share for.  When there is
//! no such group, but the client does support one of the server's
//! groups, the server answers with a HelloRetryRequest naming the group
//! it wants.  The client then sends a second ClientHello carrying exactly
//! that share.  One retry is allowed per connection.
//!
//! After the handshake, [`CommonState::negotiated_key_exchange_group`]
//! and [`CommonState::handshake_kind`] say what happened.
//!
//! ## Cryptography
//!
//! All primitives come from a [`crypto::CryptoProvider`].  The built-in
//! [`crypto::rustcrypto`] provider is written on the RustCrypto crates,
//! and supports:
//!
//! - cipher suites `TLS13_AES_128_GCM_SHA256`, `TLS13_AES_256_GCM_SHA384`,
//!   `TLS13_CHACHA20_POLY1305_SHA256`, `TLS13_AES_128_CCM_SHA256` and
//!   `TLS13_AES_128_CCM_8_SHA256`;
//! - key exchange over X25519, X448, secp256r1, secp384r1 and secp521r1;
//! - ECDSA signatures over P-256, P-384 and P-521, and RSA-PSS when the
//!   `rsa-pss` feature is enabled.
//!
//! ## Getting started
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::io::{Read, Write};
//! use std::net::TcpStream;
//! use std::sync::Arc;
//!
//! use tls13_handshake::crypto::rustcrypto;
//! use tls13_handshake::pki_types::{CertificateDer, ServerName};
//! use tls13_handshake::{ClientConfig, ClientConnection, NamedGroup, RootCertStore, Stream};
//!
//! let mut roots = RootCertStore::empty();
//! # let ca_der: CertificateDer<'static> = CertificateDer::from(vec![]);
//! roots.add(ca_der)?;
//!
//! let config = ClientConfig::builder(Arc::new(rustcrypto::default_provider()))
//!     .with_kx_groups(&[NamedGroup::secp256r1, NamedGroup::secp384r1])
//!     .with_key_share_groups(&[NamedGroup::secp256r1])
//!     .with_root_certificates(roots)?;
//!
//! let name = ServerName::try_from("testserver.com")?;
//! let mut conn = ClientConnection::new(Arc::new(config), name)?;
//! let mut sock = TcpStream::connect("127.0.0.1:4433")?;
//! let mut tls = Stream::new(&mut conn, &mut sock);
//! tls.write_all(b"GET / HTTP/1.0\r\n\r\n")?;
//! let mut response = Vec::new();
//! tls.read_to_end(&mut response)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate features
//!
//! - `logging` (enabled by default): log through the `log` crate.
//! - `rsa-pss` (enabled by default): RSA-PSS signing and verification in
//!   the built-in provider.

// Require docs for public APIs, deny unsafe code, etc.
#![forbid(unsafe_code, unused_must_use)]
#![warn(
    clippy::alloc_instead_of_core,
    clippy::manual_let_else,
    clippy::use_self,
    clippy::upper_case_acronyms,
    elided_lifetimes_in_paths,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_import_braces,
    unused_extern_crates,
    unused_qualifications
)]
// Relax these clippy lints:
// - too_many_arguments: some things just need a lot of state, wrapping it
//   doesn't necessarily make it easier to follow what's going on
// - single_component_path_imports: our top-level `use log` import causes
//   a false positive, https://github.com/rust-lang/rust-clippy/issues/5210
// - new_without_default: for internal constructors, the indirection is not
//   helpful
#![allow(
    clippy::too_many_arguments,
    clippy::single_component_path_imports,
    clippy::new_without_default
)]

// log for logging (optional).
#[cfg(feature = "logging")]
use log;

#[cfg(not(feature = "logging"))]
#[macro_use]
mod log {
    macro_rules! trace    ( ($($tt:tt)*) => {{}} );
    macro_rules! debug    ( ($($tt:tt)*) => {{}} );
    macro_rules! warn     ( ($($tt:tt)*) => {{}} );
    macro_rules! error    ( ($($tt:tt)*) => {{}} );
}

#[macro_use]
mod msgs;
#[macro_use]
mod check;
mod builder;
mod common_state;
mod conn;
/// Crypto provider interface, and the built-in RustCrypto provider.
pub mod crypto;
mod enums;
mod error;
mod hash_hs;
mod key_log;
mod key_log_file;
mod rand;
mod record_layer;
mod stream;
mod suites;
mod tls13;
mod vecbuf;
mod verify;
mod webpki;

mod client;
mod server;

/// Internal classes that are used in integration tests.
/// The contents of this section DO NOT form part of the stable interface.
#[doc(hidden)]
pub mod internal {
    /// Low-level TLS message parsing and encoding functions.
    pub mod msgs {
        pub use crate::msgs::*;
    }
    /// Low-level TLS message decryption functions.
    pub mod record_layer {
        pub use crate::record_layer::RecordLayer;
    }
}

// The public interface is:
pub use crate::client::{ClientConfig, ClientConfigBuilder, ClientConnection, ClientConnectionData};
pub use crate::common_state::{CommonState, HandshakeKind, IoState, Side};
pub use crate::conn::{Connection, ConnectionCommon, Reader, SideData, Writer};
pub use crate::enums::{
    AlertDescription, CipherSuite, ContentType, HandshakeType, NamedGroup, ProtocolVersion,
    SignatureScheme,
};
pub use crate::error::{
    CertificateError, ConfigError, Error, InvalidMessage, OtherError, PeerIncompatible,
    PeerMisbehaved,
};
pub use crate::key_log::{KeyLog, NoKeyLog};
pub use crate::key_log_file::KeyLogFile;
pub use crate::msgs::handshake::DigitallySignedStruct;
pub use crate::server::{ServerConfig, ServerConfigBuilder, ServerConnection, ServerConnectionData};
pub use crate::stream::Stream;
pub use crate::suites::Tls13CipherSuite;
pub use crate::verify::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
pub use crate::webpki::{
    verify_server_cert_signed_by_trust_anchor, verify_server_name, verify_tls13_signature,
    ParsedCertificate, RootCertStore, WebPkiServerVerifier, WebPkiSupportedAlgorithms,
};

/// Re-exports the contents of the [rustls-pki-types](https://docs.rs/rustls-pki-types) crate for easy access
pub use pki_types;
