use std::fmt;

use crate::crypto::cipher::Tls13AeadAlgorithm;
use crate::crypto::hash;
use crate::crypto::tls13::Hkdf;
use crate::enums::CipherSuite;

/// A TLS 1.3 cipher suite: an AEAD paired with the hash that drives the
/// transcript and the key schedule.
pub struct Tls13CipherSuite {
    /// The TLS enumeration naming this cipher suite.
    pub suite: CipherSuite,

    /// Which hash function the suite uses.
    pub hash_provider: &'static dyn hash::Hash,

    /// How to complete HKDF with the suite's hash function.
    ///
    /// Its hash must be the same as `hash_provider`'s.
    pub hkdf_provider: &'static dyn Hkdf,

    /// How to produce a [`MessageDecrypter`] or [`MessageEncrypter`]
    /// from raw key material.
    ///
    /// [`MessageDecrypter`]: crate::crypto::cipher::MessageDecrypter
    /// [`MessageEncrypter`]: crate::crypto::cipher::MessageEncrypter
    pub aead_alg: &'static dyn Tls13AeadAlgorithm,

    /// How many records we may encrypt under one key before the
    /// connection must be closed.
    pub confidentiality_limit: u64,
}

impl Tls13CipherSuite {
    /// Which hash function the suite uses.
    pub fn hash_algorithm(&self) -> hash::HashAlgorithm {
        self.hash_provider.algorithm()
    }

    /// The suite's name as it appears in handshake logs, such as
    /// `TLS1-3-AES-256-GCM-SHA384`.
    pub(crate) fn log_name(&self) -> String {
        match self.suite.as_str() {
            Some(name) => name
                .replacen("TLS13_", "TLS1-3-", 1)
                .replace('_', "-"),
            None => format!("{:?}", self.suite),
        }
    }
}

impl PartialEq for Tls13CipherSuite {
    fn eq(&self, other: &Self) -> bool {
        self.suite == other.suite
    }
}

impl fmt::Debug for Tls13CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tls13CipherSuite")
            .field("suite", &self.suite)
            .finish()
    }
}

/// Choose the first of `server`'s suites which the client also offered.
pub(crate) fn choose_ciphersuite_preferring_server(
    client_suites: &[CipherSuite],
    server_suites: &[&'static Tls13CipherSuite],
) -> Option<&'static Tls13CipherSuite> {
    server_suites
        .iter()
        .find(|scs| client_suites.contains(&scs.suite))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rustcrypto::{
        TLS13_AES_128_GCM_SHA256, TLS13_AES_256_GCM_SHA384, TLS13_CHACHA20_POLY1305_SHA256,
    };

    #[test]
    fn server_preference_wins() {
        let client = [
            CipherSuite::TLS13_CHACHA20_POLY1305_SHA256,
            CipherSuite::TLS13_AES_256_GCM_SHA384,
        ];
        let server = [TLS13_AES_256_GCM_SHA384, TLS13_CHACHA20_POLY1305_SHA256];

        assert_eq!(
            choose_ciphersuite_preferring_server(&client, &server),
            Some(TLS13_AES_256_GCM_SHA384)
        );
        assert_eq!(
            choose_ciphersuite_preferring_server(&client, &[TLS13_AES_128_GCM_SHA256]),
            None
        );
    }

    #[test]
    fn debug_names_the_suite() {
        assert_eq!(
            format!("{:?}", TLS13_AES_256_GCM_SHA384),
            "Tls13CipherSuite { suite: TLS13_AES_256_GCM_SHA384 }"
        );
        assert_eq!(
            TLS13_AES_256_GCM_SHA384.log_name(),
            "TLS1-3-AES-256-GCM-SHA384"
        );
        assert_eq!(
            TLS13_AES_256_GCM_SHA384.hash_algorithm(),
            hash::HashAlgorithm::SHA384
        );
    }
}
