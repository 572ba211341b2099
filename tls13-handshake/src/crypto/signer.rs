use std::fmt::Debug;

use crate::enums::SignatureScheme;
use crate::error::Error;

/// A server's private key, as loaded by
/// [`KeyProvider::load_private_key()`](crate::crypto::KeyProvider::load_private_key).
///
/// The server asks it for a [`Signer`] once per handshake, offering the
/// client's `signature_algorithms` that TLS 1.3 allows.
pub trait SigningKey: Debug + Send + Sync {
    /// Pick one of `offered` this key can sign with, in the key's own
    /// preference order.  `None` ends the handshake with
    /// `handshake_failure`.
    fn choose_scheme(&self, offered: &[SignatureScheme]) -> Option<Box<dyn Signer>>;

    /// Every scheme this key could sign with.
    fn schemes(&self) -> &[SignatureScheme];
}

/// A key bound to one scheme, ready to sign a CertificateVerify.
pub trait Signer: Debug + Send + Sync {
    /// Sign `message`, which is the full CertificateVerify input (padding,
    /// context string and transcript hash) and not a digest.
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, Error>;

    /// The scheme [`Self::sign()`] uses, sent in the CertificateVerify.
    fn scheme(&self) -> SignatureScheme;
}
