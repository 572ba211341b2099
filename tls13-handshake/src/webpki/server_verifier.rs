use std::sync::Arc;

use pki_types::{CertificateDer, ServerName, UnixTime};

use super::verify::{
    verify_server_cert_signed_by_trust_anchor, verify_server_name, verify_tls13_signature,
    ParsedCertificate,
};
use super::{RootCertStore, WebPkiSupportedAlgorithms};
use crate::crypto::CryptoProvider;
use crate::enums::SignatureScheme;
use crate::error::{ConfigError, Error};
#[cfg(feature = "logging")]
use crate::log::debug;
use crate::msgs::handshake::DigitallySignedStruct;
use crate::verify::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};

/// Default `ServerCertVerifier`: chains to a [`RootCertStore`] with webpki
/// and checks the server name.  No revocation checking is done.
#[derive(Debug)]
pub struct WebPkiServerVerifier {
    roots: Arc<RootCertStore>,
    supported: WebPkiSupportedAlgorithms,
}

impl WebPkiServerVerifier {
    /// Make a verifier trusting `roots`, using the signature algorithms of `provider`.
    ///
    /// Fails with [`ConfigError::NoRootAnchors`] when `roots` is empty.
    pub fn new(
        roots: impl Into<Arc<RootCertStore>>,
        provider: &CryptoProvider,
    ) -> Result<Self, Error> {
        let roots = roots.into();
        if roots.is_empty() {
            return Err(ConfigError::NoRootAnchors.into());
        }

        Ok(Self {
            roots,
            supported: provider.signature_verification_algorithms,
        })
    }
}

impl ServerCertVerifier for WebPkiServerVerifier {
    /// Will verify the certificate is valid in the following ways:
    /// - Signed by a trusted `RootCertStore` CA
    /// - Not Expired
    /// - Valid for DNS entry
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        now: UnixTime,
    ) -> Result<ServerCertVerified, Error> {
        let cert = ParsedCertificate::try_from(end_entity)?;

        verify_server_cert_signed_by_trust_anchor(
            &cert,
            &self.roots,
            intermediates,
            now,
            self.supported.all,
        )?;

        verify_server_name(&cert, server_name)?;
        debug!("Verifying peer X.509 certificate... ok");
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        verify_tls13_signature(message, cert, dss, &self.supported)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.supported.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rustcrypto::default_provider;

    #[test]
    fn no_roots_is_a_config_error() {
        assert_eq!(
            WebPkiServerVerifier::new(RootCertStore::empty(), &default_provider()).unwrap_err(),
            Error::InvalidConfig(ConfigError::NoRootAnchors)
        );
    }
}
