use std::fmt::Debug;

/// A sink for traffic secrets, so that captures of a connection can be
/// decrypted by tools like Wireshark.
///
/// Anything installed here sees secrets that break the confidentiality
/// of the connection.  Install one only for debugging.
///
/// Each side of a connection reports five secrets, labelled as in the
/// NSS key log format
/// (<https://nss-crypto.org/reference/security/nss/legacy/key_log_format/index.html>):
///
/// | label | protects |
/// |---|---|
/// | `CLIENT_HANDSHAKE_TRAFFIC_SECRET` | the client's encrypted handshake flight |
/// | `SERVER_HANDSHAKE_TRAFFIC_SECRET` | the server's encrypted handshake flight |
/// | `CLIENT_TRAFFIC_SECRET_0` | client application data |
/// | `SERVER_TRAFFIC_SECRET_0` | server application data |
/// | `EXPORTER_SECRET` | nothing; keying material exporters derive from it |
///
/// `client_random` is the `random` of the ClientHello.  After a
/// HelloRetryRequest both ClientHellos carry the same random, so it names
/// the connection unambiguously.
///
/// [`KeyLogFile`](crate::KeyLogFile) writes these to the file named by
/// `SSLKEYLOGFILE`.
pub trait KeyLog: Debug + Send + Sync {
    /// Record `secret` under `label`.
    fn log(&self, label: &str, client_random: &[u8], secret: &[u8]);

    /// Whether `log` should be called for `label` at all.
    fn will_log(&self, _label: &str) -> bool {
        true
    }
}

/// The default: secrets go nowhere.
#[derive(Debug)]
pub struct NoKeyLog;

impl KeyLog for NoKeyLog {
    fn log(&self, _: &str, _: &[u8], _: &[u8]) {}

    fn will_log(&self, _label: &str) -> bool {
        false
    }
}
