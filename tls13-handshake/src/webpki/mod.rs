use std::sync::Arc;

use crate::error::{CertificateError, Error, OtherError};

mod anchors;
mod server_verifier;
mod verify;

pub use anchors::RootCertStore;
pub use server_verifier::WebPkiServerVerifier;
pub use verify::{
    verify_server_cert_signed_by_trust_anchor, verify_server_name, verify_tls13_signature,
    ParsedCertificate, WebPkiSupportedAlgorithms,
};

#[allow(deprecated)]
fn pki_error(error: webpki::Error) -> Error {
    use webpki::Error::*;
    match error {
        BadDer { .. } | BadDerTime { .. } | TrailingData { .. } => {
            CertificateError::BadEncoding.into()
        }
        CertNotValidYet { .. } => CertificateError::NotValidYet.into(),
        CertExpired { .. } | InvalidCertValidity { .. } => CertificateError::Expired.into(),
        UnknownIssuer { .. } => CertificateError::UnknownIssuer.into(),
        CertNotValidForName { .. } => CertificateError::NotValidForName.into(),
        RequiredEkuNotFound { .. } => CertificateError::InvalidPurpose.into(),

        InvalidSignatureForPublicKey { .. }
        | UnsupportedSignatureAlgorithm { .. }
        | UnsupportedSignatureAlgorithmForPublicKey { .. } => CertificateError::BadSignature.into(),

        _ => CertificateError::Other(OtherError(Arc::new(error))).into(),
    }
}
