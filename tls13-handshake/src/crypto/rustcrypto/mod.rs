use pki_types::PrivateKeyDer;
use std::sync::Arc;

use crate::crypto::tls13::HkdfUsingHmac;
use crate::crypto::{CryptoProvider, GetRandomFailed, KeyProvider, SecureRandom, SigningKey};
use crate::enums::CipherSuite;
use crate::error::Error;
use crate::suites::Tls13CipherSuite;

pub(crate) mod aead;
pub(crate) mod hash;
pub(crate) mod hmac;
pub(crate) mod kx;
pub(crate) mod sign;
pub(crate) mod verify;

pub use verify::SUPPORTED_SIG_ALGS;

/// A `CryptoProvider` backed by the RustCrypto crates.
///
/// It has every cipher suite and group this crate knows about, and
/// ECDSA signatures on P-256, P-384 and P-521.  RSA-PSS is included
/// when the `rsa-pss` feature is on.
pub fn default_provider() -> CryptoProvider {
    CryptoProvider {
        cipher_suites: DEFAULT_CIPHER_SUITES.to_vec(),
        kx_groups: kx::ALL_KX_GROUPS.to_vec(),
        signature_verification_algorithms: SUPPORTED_SIG_ALGS,
        secure_random: &Provider,
        key_provider: &Provider,
    }
}

/// The names of every key exchange group `default_provider()` supports.
pub mod kx_group {
    use crate::enums::NamedGroup;

    /// X25519, the default first choice.
    pub const X25519: NamedGroup = NamedGroup::X25519;
    /// X448.
    pub const X448: NamedGroup = NamedGroup::X448;
    /// ECDH over NIST P-256.
    pub const SECP256R1: NamedGroup = NamedGroup::secp256r1;
    /// ECDH over NIST P-384.
    pub const SECP384R1: NamedGroup = NamedGroup::secp384r1;
    /// ECDH over NIST P-521.
    pub const SECP521R1: NamedGroup = NamedGroup::secp521r1;
}

#[derive(Debug)]
struct Provider;

impl SecureRandom for Provider {
    fn fill(&self, bytes: &mut [u8]) -> Result<(), GetRandomFailed> {
        use rand_core::RngCore;
        rand_core::OsRng
            .try_fill_bytes(bytes)
            .map_err(|_| GetRandomFailed)
    }
}

impl KeyProvider for Provider {
    fn load_private_key(
        &self,
        key_der: PrivateKeyDer<'static>,
    ) -> Result<Arc<dyn SigningKey>, Error> {
        sign::any_supported_type(&key_der)
    }
}

/// The cipher suite configuration that an application should use by default.
pub static DEFAULT_CIPHER_SUITES: &[&Tls13CipherSuite] = &[
    TLS13_AES_128_GCM_SHA256,
    TLS13_AES_256_GCM_SHA384,
    TLS13_CHACHA20_POLY1305_SHA256,
    TLS13_AES_128_CCM_SHA256,
    TLS13_AES_128_CCM_8_SHA256,
];

/// The TLS1.3 ciphersuite TLS_AES_128_GCM_SHA256
pub static TLS13_AES_128_GCM_SHA256: &Tls13CipherSuite = &Tls13CipherSuite {
    suite: CipherSuite::TLS13_AES_128_GCM_SHA256,
    hash_provider: &hash::Sha256,
    hkdf_provider: &HkdfUsingHmac(&hmac::Sha256Hmac),
    aead_alg: &aead::AES_128_GCM,
    confidentiality_limit: 1 << 23,
};

/// The TLS1.3 ciphersuite TLS_AES_256_GCM_SHA384
pub static TLS13_AES_256_GCM_SHA384: &Tls13CipherSuite = &Tls13CipherSuite {
    suite: CipherSuite::TLS13_AES_256_GCM_SHA384,
    hash_provider: &hash::Sha384,
    hkdf_provider: &HkdfUsingHmac(&hmac::Sha384Hmac),
    aead_alg: &aead::AES_256_GCM,
    confidentiality_limit: 1 << 23,
};

/// The TLS1.3 ciphersuite TLS_CHACHA20_POLY1305_SHA256
pub static TLS13_CHACHA20_POLY1305_SHA256: &Tls13CipherSuite = &Tls13CipherSuite {
    suite: CipherSuite::TLS13_CHACHA20_POLY1305_SHA256,
    hash_provider: &hash::Sha256,
    hkdf_provider: &HkdfUsingHmac(&hmac::Sha256Hmac),
    aead_alg: &aead::CHACHA20_POLY1305,
    confidentiality_limit: u64::MAX,
};

/// The TLS1.3 ciphersuite TLS_AES_128_CCM_SHA256
pub static TLS13_AES_128_CCM_SHA256: &Tls13CipherSuite = &Tls13CipherSuite {
    suite: CipherSuite::TLS13_AES_128_CCM_SHA256,
    hash_provider: &hash::Sha256,
    hkdf_provider: &HkdfUsingHmac(&hmac::Sha256Hmac),
    aead_alg: &aead::AES_128_CCM,
    confidentiality_limit: 1 << 23,
};

/// The TLS1.3 ciphersuite TLS_AES_128_CCM_8_SHA256
pub static TLS13_AES_128_CCM_8_SHA256: &Tls13CipherSuite = &Tls13CipherSuite {
    suite: CipherSuite::TLS13_AES_128_CCM_8_SHA256,
    hash_provider: &hash::Sha256,
    hkdf_provider: &HkdfUsingHmac(&hmac::Sha256Hmac),
    aead_alg: &aead::AES_128_CCM_8,
    confidentiality_limit: 1 << 23,
};
