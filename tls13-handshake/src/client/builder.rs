use std::fmt;
use std::sync::Arc;

use crate::builder::{reject_duplicates, resolve_cipher_suites, resolve_kx_groups};
use crate::crypto::{CryptoProvider, SupportedKxGroup};
use crate::enums::{CipherSuite, NamedGroup, SignatureScheme};
use crate::error::{ConfigError, Error};
use crate::key_log::{KeyLog, NoKeyLog};
use crate::suites::Tls13CipherSuite;
use crate::verify::ServerCertVerifier;
use crate::webpki::{RootCertStore, WebPkiServerVerifier};

/// Common configuration for (typically) all connections made by a program.
///
/// Making one of these is cheap, though one of the inputs may be expensive:
/// gathering trust roots from the operating system to add to the
/// [`RootCertStore`] passed to [`ClientConfigBuilder::with_root_certificates`].
///
/// A `ClientConfig` is immutable once built; share it between connections
/// with an `Arc`.
#[derive(Clone)]
pub struct ClientConfig {
    pub(crate) provider: Arc<CryptoProvider>,

    /// Cipher suites we offer, most preferred first.
    pub(crate) cipher_suites: Vec<&'static Tls13CipherSuite>,

    /// Groups we advertise in `supported_groups`, most preferred first.
    pub(crate) kx_groups: Vec<&'static dyn SupportedKxGroup>,

    /// Groups we send a key share for in the first ClientHello.
    /// Always a subset of `kx_groups`, in `kx_groups` order.
    pub(crate) key_share_groups: Vec<NamedGroup>,

    pub(crate) signature_schemes: Vec<SignatureScheme>,

    pub(crate) verifier: Arc<dyn ServerCertVerifier>,

    /// How to output key material for debugging.  The default
    /// does nothing.
    pub key_log: Arc<dyn KeyLog>,

    /// Whether to send the Server Name Indication (SNI) extension
    /// during the client handshake.
    ///
    /// The default is true.
    pub enable_sni: bool,

    /// Whether to use the TLS 1.3 middlebox compatibility mode: a random
    /// legacy session id, and a dummy ChangeCipherSpec before our second
    /// flight.
    ///
    /// The default is true.
    pub compatibility_mode: bool,
}

impl ClientConfig {
    /// Start building a `ClientConfig` that uses `provider` for all
    /// cryptography.
    pub fn builder(provider: Arc<CryptoProvider>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            provider,
            cipher_suites: None,
            kx_groups: None,
            key_share_groups: None,
            signature_schemes: None,
            compatibility_mode: true,
            enable_sni: true,
            key_log: Arc::new(NoKeyLog {}),
        }
    }

    /// The provider this config was built with.
    pub fn crypto_provider(&self) -> &Arc<CryptoProvider> {
        &self.provider
    }

    /// The groups sent in `supported_groups`, most preferred first.
    pub fn kx_groups(&self) -> Vec<NamedGroup> {
        self.kx_groups
            .iter()
            .map(|skxg| skxg.name())
            .collect()
    }

    /// The groups the first ClientHello carries a key share for.
    pub fn key_share_groups(&self) -> &[NamedGroup] {
        &self.key_share_groups
    }

    pub(crate) fn find_cipher_suite(&self, suite: CipherSuite) -> Option<&'static Tls13CipherSuite> {
        self.cipher_suites
            .iter()
            .copied()
            .find(|scs| scs.suite == suite)
    }

    pub(crate) fn find_kx_group(&self, group: NamedGroup) -> Option<&'static dyn SupportedKxGroup> {
        self.kx_groups
            .iter()
            .copied()
            .find(|skxg| skxg.name() == group)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("cipher_suites", &self.cipher_suites)
            .field("kx_groups", &self.kx_groups())
            .field("key_share_groups", &self.key_share_groups)
            .field("signature_schemes", &self.signature_schemes)
            .field("enable_sni", &self.enable_sni)
            .field("compatibility_mode", &self.compatibility_mode)
            .finish_non_exhaustive()
    }
}

/// A builder for [`ClientConfig`].
///
/// Anything not set explicitly defaults to "everything the provider
/// supports, in the provider's order".  The one exception is
/// [`ClientConfigBuilder::with_key_share_groups`], which defaults to just
/// the most preferred group.
///
/// Nothing is checked until the final `with_root_certificates` or
/// `with_server_verifier` call.
pub struct ClientConfigBuilder {
    provider: Arc<CryptoProvider>,
    cipher_suites: Option<Vec<CipherSuite>>,
    kx_groups: Option<Vec<NamedGroup>>,
    key_share_groups: Option<Vec<NamedGroup>>,
    signature_schemes: Option<Vec<SignatureScheme>>,
    compatibility_mode: bool,
    enable_sni: bool,
    key_log: Arc<dyn KeyLog>,
}

impl ClientConfigBuilder {
    /// Offer exactly these cipher suites, in this order.
    pub fn with_cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = Some(suites.to_vec());
        self
    }

    /// Advertise exactly these groups in `supported_groups`, in this order.
    pub fn with_kx_groups(mut self, groups: &[NamedGroup]) -> Self {
        self.kx_groups = Some(groups.to_vec());
        self
    }

    /// Send key shares for these groups in the first ClientHello.
    ///
    /// Each must also be one of the groups given to
    /// [`ClientConfigBuilder::with_kx_groups`].  A server preferring some other
    /// advertised group answers with a HelloRetryRequest.
    pub fn with_key_share_groups(mut self, groups: &[NamedGroup]) -> Self {
        self.key_share_groups = Some(groups.to_vec());
        self
    }

    /// Offer exactly these schemes in `signature_algorithms`.
    ///
    /// Each must be one the certificate verifier supports.
    pub fn with_signature_schemes(mut self, schemes: &[SignatureScheme]) -> Self {
        self.signature_schemes = Some(schemes.to_vec());
        self
    }

    /// See [`ClientConfig::compatibility_mode`].
    pub fn compatibility_mode(mut self, enabled: bool) -> Self {
        self.compatibility_mode = enabled;
        self
    }

    /// See [`ClientConfig::enable_sni`].
    pub fn enable_sni(mut self, enabled: bool) -> Self {
        self.enable_sni = enabled;
        self
    }

    /// See [`ClientConfig::key_log`].
    pub fn with_key_log(mut self, key_log: Arc<dyn KeyLog>) -> Self {
        self.key_log = key_log;
        self
    }

    /// Verify servers with webpki against `roots`, and finish.
    pub fn with_root_certificates(
        self,
        roots: impl Into<Arc<RootCertStore>>,
    ) -> Result<ClientConfig, Error> {
        let verifier = WebPkiServerVerifier::new(roots, &self.provider)?;
        self.with_server_verifier(Arc::new(verifier))
    }

    /// Verify servers with a custom verifier, and finish.
    pub fn with_server_verifier(
        self,
        verifier: Arc<dyn ServerCertVerifier>,
    ) -> Result<ClientConfig, Error> {
        let cipher_suites = resolve_cipher_suites(&self.provider, self.cipher_suites.as_deref())?;
        let kx_groups = resolve_kx_groups(&self.provider, self.kx_groups.as_deref())?;

        let key_share_groups = match self.key_share_groups {
            Some(wanted) => {
                if wanted.is_empty() {
                    return Err(ConfigError::NoKeyShares.into());
                }
                reject_duplicates(wanted.iter().map(|g| u16::from(*g)))?;
                if let Some(stray) = wanted
                    .iter()
                    .find(|g| !kx_groups.iter().any(|skxg| skxg.name() == **g))
                {
                    return Err(ConfigError::KeyShareNotInGroups(*stray).into());
                }

                // sent in supported_groups order
                kx_groups
                    .iter()
                    .map(|skxg| skxg.name())
                    .filter(|g| wanted.contains(g))
                    .collect()
            }
            None => vec![kx_groups[0].name()],
        };

        let verifiable = verifier.supported_verify_schemes();
        let signature_schemes = match self.signature_schemes {
            Some(wanted) => {
                if wanted.is_empty() {
                    return Err(ConfigError::NoSignatureSchemes.into());
                }
                reject_duplicates(wanted.iter().map(|s| u16::from(*s)))?;
                if let Some(unsupported) = wanted
                    .iter()
                    .find(|s| !verifiable.contains(s))
                {
                    return Err(ConfigError::UnsupportedSignatureScheme(*unsupported).into());
                }
                wanted
            }
            None => verifiable,
        };

        if signature_schemes.is_empty() {
            return Err(ConfigError::NoSignatureSchemes.into());
        }

        Ok(ClientConfig {
            provider: self.provider,
            cipher_suites,
            kx_groups,
            key_share_groups,
            signature_schemes,
            verifier,
            key_log: self.key_log,
            enable_sni: self.enable_sni,
            compatibility_mode: self.compatibility_mode,
        })
    }
}

impl fmt::Debug for ClientConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfigBuilder")
            .field("cipher_suites", &self.cipher_suites)
            .field("kx_groups", &self.kx_groups)
            .field("key_share_groups", &self.key_share_groups)
            .field("signature_schemes", &self.signature_schemes)
            .finish_non_exhaustive()
    }
}
