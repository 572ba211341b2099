use std::fmt;
use std::sync::Arc;

use pki_types::{CertificateDer, PrivateKeyDer};

use crate::builder::{resolve_cipher_suites, resolve_kx_groups};
use crate::crypto::{CryptoProvider, SigningKey, SupportedKxGroup};
use crate::enums::{CipherSuite, NamedGroup};
use crate::error::{ConfigError, Error};
use crate::key_log::{KeyLog, NoKeyLog};
use crate::suites::Tls13CipherSuite;

/// Common configuration for a set of server sessions.
///
/// Making one of these is cheap, though one of the inputs may be expensive:
/// loading the certificate chain and private key.
#[derive(Clone)]
pub struct ServerConfig {
    pub(crate) provider: Arc<CryptoProvider>,

    /// Cipher suites we accept, most preferred first.
    pub(crate) cipher_suites: Vec<&'static Tls13CipherSuite>,

    /// Groups we accept, most preferred first.  The first of these the
    /// client sent a key share for is used; failing that, the first the
    /// client listed in `supported_groups` is requested with a
    /// HelloRetryRequest.
    pub(crate) kx_groups: Vec<&'static dyn SupportedKxGroup>,

    pub(crate) cert: Arc<ServerCert>,

    /// Whether a HelloRetryRequest carries a cookie the client must echo.
    ///
    /// The default is false.
    pub send_hrr_cookie: bool,

    /// How to output key material for debugging.  The default
    /// does nothing.
    pub key_log: Arc<dyn KeyLog>,
}

/// The chain a server presents, and the key for its end-entity
/// certificate.
pub(crate) struct ServerCert {
    pub(crate) chain: Vec<CertificateDer<'static>>,
    pub(crate) key: Arc<dyn SigningKey>,
}

impl ServerConfig {
    /// Start building a `ServerConfig` that uses `provider` for all
    /// cryptography.
    pub fn builder(provider: Arc<CryptoProvider>) -> ServerConfigBuilder {
        ServerConfigBuilder {
            provider,
            cipher_suites: None,
            kx_groups: None,
            send_hrr_cookie: false,
            key_log: Arc::new(NoKeyLog {}),
        }
    }

    /// The provider this config was built with.
    pub fn crypto_provider(&self) -> &Arc<CryptoProvider> {
        &self.provider
    }

    /// The groups we accept, most preferred first.
    pub fn kx_groups(&self) -> Vec<NamedGroup> {
        self.kx_groups
            .iter()
            .map(|skxg| skxg.name())
            .collect()
    }

    pub(crate) fn find_kx_group(&self, group: NamedGroup) -> Option<&'static dyn SupportedKxGroup> {
        self.kx_groups
            .iter()
            .copied()
            .find(|skxg| skxg.name() == group)
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("cipher_suites", &self.cipher_suites)
            .field("kx_groups", &self.kx_groups())
            .field("signature_schemes", &self.cert.key.schemes())
            .field("send_hrr_cookie", &self.send_hrr_cookie)
            .finish_non_exhaustive()
    }
}

/// A builder for [`ServerConfig`].
///
/// Suites and groups default to everything the provider supports, in the
/// provider's order.  Nothing is checked until `with_single_cert`.
pub struct ServerConfigBuilder {
    provider: Arc<CryptoProvider>,
    cipher_suites: Option<Vec<CipherSuite>>,
    kx_groups: Option<Vec<NamedGroup>>,
    send_hrr_cookie: bool,
    key_log: Arc<dyn KeyLog>,
}

impl ServerConfigBuilder {
    /// Accept exactly these cipher suites, most preferred first.
    pub fn with_cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = Some(suites.to_vec());
        self
    }

    /// Accept exactly these key exchange groups, most preferred first.
    pub fn with_kx_groups(mut self, groups: &[NamedGroup]) -> Self {
        self.kx_groups = Some(groups.to_vec());
        self
    }

    /// Put a cookie in every HelloRetryRequest and insist the client
    /// echoes it.
    pub fn send_hrr_cookie(mut self, enable: bool) -> Self {
        self.send_hrr_cookie = enable;
        self
    }

    /// Log secrets through `key_log`.
    pub fn with_key_log(mut self, key_log: Arc<dyn KeyLog>) -> Self {
        self.key_log = key_log;
        self
    }

    /// Finish the config, serving `cert_chain` (end-entity first) with
    /// the matching private key `key_der`.
    ///
    /// The key is loaded through the provider's [`KeyProvider`].  This
    /// fails if the chain is empty, or if the key's type is not one
    /// the provider can sign with.
    ///
    /// [`KeyProvider`]: crate::crypto::KeyProvider
    pub fn with_single_cert(
        self,
        cert_chain: Vec<CertificateDer<'static>>,
        key_der: PrivateKeyDer<'static>,
    ) -> Result<ServerConfig, Error> {
        let cipher_suites = resolve_cipher_suites(&self.provider, self.cipher_suites.as_deref())?;
        let kx_groups = resolve_kx_groups(&self.provider, self.kx_groups.as_deref())?;

        if cert_chain.is_empty() {
            return Err(ConfigError::EmptyCertificateChain.into());
        }

        let key = self
            .provider
            .key_provider
            .load_private_key(key_der)?;

        Ok(ServerConfig {
            provider: self.provider,
            cipher_suites,
            kx_groups,
            cert: Arc::new(ServerCert {
                chain: cert_chain,
                key,
            }),
            send_hrr_cookie: self.send_hrr_cookie,
            key_log: self.key_log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rustcrypto;

    fn provider() -> Arc<CryptoProvider> {
        Arc::new(rustcrypto::default_provider())
    }

    fn p256_key() -> PrivateKeyDer<'static> {
        use p256::pkcs8::EncodePrivateKey;

        let secret = p256::SecretKey::from_bytes(&[0x42u8; 32].into()).unwrap();
        PrivateKeyDer::Pkcs8(
            secret
                .to_pkcs8_der()
                .unwrap()
                .as_bytes()
                .to_vec()
                .into(),
        )
    }

    #[test]
    fn empty_chain_is_rejected() {
        let err = ServerConfig::builder(provider())
            .with_single_cert(vec![], p256_key())
            .unwrap_err();
        assert_eq!(err, Error::InvalidConfig(ConfigError::EmptyCertificateChain));
    }

    #[test]
    fn garbage_key_is_rejected() {
        let err = ServerConfig::builder(provider())
            .with_single_cert(
                vec![CertificateDer::from(vec![0x30, 0x00])],
                PrivateKeyDer::Pkcs8(vec![1, 2, 3].into()),
            )
            .unwrap_err();
        assert_eq!(err, Error::InvalidConfig(ConfigError::UnsupportedPrivateKey));
    }

    #[test]
    fn group_order_is_preference_order() {
        let config = ServerConfig::builder(provider())
            .with_kx_groups(&[NamedGroup::X448, NamedGroup::secp256r1])
            .with_cipher_suites(&[CipherSuite::TLS13_AES_256_GCM_SHA384])
            .with_single_cert(vec![CertificateDer::from(vec![0x30, 0x00])], p256_key())
            .unwrap();

        assert_eq!(
            config.kx_groups(),
            vec![NamedGroup::X448, NamedGroup::secp256r1]
        );
        assert_eq!(
            config.cipher_suites,
            vec![rustcrypto::TLS13_AES_256_GCM_SHA384]
        );
        assert!(!config.send_hrr_cookie);
    }

    #[test]
    fn unsupported_group_is_rejected() {
        let err = ServerConfig::builder(provider())
            .with_kx_groups(&[NamedGroup::FFDHE2048])
            .with_single_cert(vec![CertificateDer::from(vec![0x30, 0x00])], p256_key())
            .unwrap_err();
        assert_eq!(
            err,
            Error::InvalidConfig(ConfigError::UnsupportedGroup(NamedGroup::FFDHE2048))
        );
    }
}
