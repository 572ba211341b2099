use std::fmt::Debug;
use std::sync::Arc;

use pki_types::PrivateKeyDer;
use zeroize::Zeroize;

use crate::enums::{CipherSuite, NamedGroup};
use crate::error::{ConfigError, Error};
use crate::suites::Tls13CipherSuite;
use crate::webpki::WebPkiSupportedAlgorithms;

/// Pure-Rust cryptography from the RustCrypto project.  This is the default provider.
pub mod rustcrypto;

/// TLS message encryption/decryption interfaces.
pub mod cipher;

/// Hashing interfaces.
pub mod hash;

/// HMAC interfaces.
pub mod hmac;

/// Message signing interfaces.
pub mod signer;

/// Cryptography specific to TLS1.3.
pub mod tls13;

pub use crate::rand::GetRandomFailed;
pub use signer::{Signer, SigningKey};

/// The registries a connection draws its cryptography from.
///
/// A provider is built once, wrapped in an `Arc`, and shared read-only by
/// every config and connection made from it.
///
/// The order of `cipher_suites` and `kx_groups` is the default preference
/// order for configs that do not choose their own.
#[derive(Debug, Clone)]
pub struct CryptoProvider {
    /// Supported cipher suites, in preference order.
    pub cipher_suites: Vec<&'static Tls13CipherSuite>,

    /// Supported key exchange groups, in preference order.
    pub kx_groups: Vec<&'static dyn SupportedKxGroup>,

    /// Signature verification algorithms for certificates and CertificateVerify.
    pub signature_verification_algorithms: WebPkiSupportedAlgorithms,

    /// Source of randomness.
    pub secure_random: &'static dyn SecureRandom,

    /// Private key loader.
    pub key_provider: &'static dyn KeyProvider,
}

impl CryptoProvider {
    /// Look up the implementation of `name`.
    pub fn find_kx_group(&self, name: NamedGroup) -> Result<&'static dyn SupportedKxGroup, Error> {
        self.kx_groups
            .iter()
            .find(|skxg| skxg.name() == name)
            .copied()
            .ok_or_else(|| ConfigError::UnsupportedGroup(name).into())
    }

    /// Look up the implementation of `suite`.
    pub fn find_cipher_suite(&self, suite: CipherSuite) -> Result<&'static Tls13CipherSuite, Error> {
        self.cipher_suites
            .iter()
            .find(|scs| scs.suite == suite)
            .copied()
            .ok_or_else(|| ConfigError::UnsupportedCipherSuite(suite).into())
    }
}

/// A source of cryptographically secure randomness.
pub trait SecureRandom: Send + Sync + Debug {
    /// Fill the given buffer with random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), GetRandomFailed>;
}

/// A mechanism for loading private keys from [`PrivateKeyDer`].
pub trait KeyProvider: Send + Sync + Debug {
    /// Decode and validate a private signing key from `key_der`.
    ///
    /// Return an error if the key type encoding is not supported, or if the key fails validation.
    fn load_private_key(
        &self,
        key_der: PrivateKeyDer<'static>,
    ) -> Result<Arc<dyn SigningKey>, Error>;
}

/// A supported key exchange group.
///
/// This has a TLS-level name expressed using the [`NamedGroup`] enum, and
/// a function which produces a [`ActiveKeyExchange`].
pub trait SupportedKxGroup: Send + Sync + Debug {
    /// Start a key exchange.
    ///
    /// This will prepare an ephemeral secret key in the supported group, and a corresponding
    /// public key. The key exchange can be completed by calling [ActiveKeyExchange#complete]
    /// or discarded.
    ///
    /// # Errors
    ///
    /// This can fail if the random source fails during ephemeral key generation.
    fn start(&self) -> Result<Box<dyn ActiveKeyExchange>, Error>;

    /// Named group the SupportedKxGroup operates in.
    fn name(&self) -> NamedGroup;
}

/// An in-progress key exchange originating from a `SupportedKxGroup`.
pub trait ActiveKeyExchange: Send + Sync {
    /// Completes the key exchange, given the peer's public key.
    ///
    /// A peer key that does not decode, or that produces a degenerate
    /// result, fails with `PeerMisbehaved::InvalidKeyShare`.
    ///
    /// This consumes and so terminates the [`ActiveKeyExchange`].
    fn complete(self: Box<Self>, peer_pub_key: &[u8]) -> Result<SharedSecret, Error>;

    /// Return the public key being used.
    fn pub_key(&self) -> &[u8];

    /// Return the group being used.
    fn group(&self) -> NamedGroup;
}

/// The result from `ActiveKeyExchange::complete` as a value.
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    /// Returns the shared secret as a slice of bytes.
    pub fn secret_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl From<&[u8]> for SharedSecret {
    fn from(source: &[u8]) -> Self {
        Self(source.to_vec())
    }
}
