use std::fmt;
use std::sync::Arc;

use p256::pkcs8::DecodePrivateKey;
use pki_types::PrivateKeyDer;

use crate::crypto::{Signer, SigningKey};
use crate::enums::SignatureScheme;
use crate::error::{ConfigError, Error};

/// Parse `der` as any supported key encoding/type, returning
/// the first which works.
pub(crate) fn any_supported_type(der: &PrivateKeyDer<'_>) -> Result<Arc<dyn SigningKey>, Error> {
    if let Some(key) = EcdsaSigningKeyP256::new(der) {
        return Ok(Arc::new(key));
    }
    if let Some(key) = EcdsaSigningKeyP384::new(der) {
        return Ok(Arc::new(key));
    }
    if let Some(key) = EcdsaSigningKeyP521::new(der) {
        return Ok(Arc::new(key));
    }

    #[cfg(feature = "rsa-pss")]
    if let Some(key) = rsa_pss::RsaSigningKey::new(der) {
        return Ok(Arc::new(key));
    }

    #[cfg(not(feature = "rsa-pss"))]
    if is_rsa_key(der) {
        return Err(ConfigError::UnsupportedSignatureScheme(SignatureScheme::RSA_PSS_SHA256).into());
    }

    Err(ConfigError::UnsupportedPrivateKey.into())
}

#[cfg(not(feature = "rsa-pss"))]
fn is_rsa_key(der: &PrivateKeyDer<'_>) -> bool {
    use p256::pkcs8::{ObjectIdentifier, PrivateKeyInfo};

    const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

    match der {
        PrivateKeyDer::Pkcs1(_) => true,
        PrivateKeyDer::Pkcs8(der) => PrivateKeyInfo::try_from(der.secret_pkcs8_der())
            .map(|info| info.algorithm.oid == RSA_ENCRYPTION)
            .unwrap_or(false),
        _ => false,
    }
}

/// An ECDSA key on one curve.  Signatures are DER encoded, and made
/// deterministically (RFC 6979).
macro_rules! ecdsa_signing_key {
    ($name:ident, $curve:ident, $scheme:expr) => {
        #[derive(Clone)]
        pub(crate) struct $name {
            key: Arc<$curve::ecdsa::SigningKey>,
        }

        impl $name {
            fn new(der: &PrivateKeyDer<'_>) -> Option<Self> {
                let secret = match der {
                    PrivateKeyDer::Pkcs8(der) => {
                        $curve::SecretKey::from_pkcs8_der(der.secret_pkcs8_der()).ok()?
                    }
                    PrivateKeyDer::Sec1(der) => {
                        $curve::SecretKey::from_sec1_der(der.secret_sec1_der()).ok()?
                    }
                    _ => return None,
                };

                let key = $curve::ecdsa::SigningKey::from_bytes(&secret.to_bytes()).ok()?;
                Some(Self { key: Arc::new(key) })
            }
        }

        impl SigningKey for $name {
            fn choose_scheme(&self, offered: &[SignatureScheme]) -> Option<Box<dyn Signer>> {
                if offered.contains(&$scheme) {
                    Some(Box::new(self.clone()))
                } else {
                    None
                }
            }

            fn schemes(&self) -> &[SignatureScheme] {
                &[$scheme]
            }
        }

        impl Signer for $name {
            fn sign(&self, message: &[u8]) -> Result<Vec<u8>, Error> {
                let sig: $curve::ecdsa::Signature = signature::Signer::try_sign(&*self.key, message)
                    .map_err(|_| Error::General("signing failed".into()))?;
                Ok(sig.to_der().as_bytes().to_vec())
            }

            fn scheme(&self) -> SignatureScheme {
                $scheme
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("scheme", &$scheme)
                    .finish()
            }
        }
    };
}

ecdsa_signing_key!(EcdsaSigningKeyP256, p256, SignatureScheme::ECDSA_NISTP256_SHA256);
ecdsa_signing_key!(EcdsaSigningKeyP384, p384, SignatureScheme::ECDSA_NISTP384_SHA384);
ecdsa_signing_key!(EcdsaSigningKeyP521, p521, SignatureScheme::ECDSA_NISTP521_SHA512);

#[cfg(feature = "rsa-pss")]
mod rsa_pss {
    use std::fmt;
    use std::sync::Arc;

    use pki_types::PrivateKeyDer;
    use rand_core::OsRng;
    use rsa::pkcs1::DecodeRsaPrivateKey;
    use rsa::pkcs8::DecodePrivateKey;
    use rsa::pss::BlindedSigningKey;
    use rsa::RsaPrivateKey;
    use signature::{RandomizedSigner, SignatureEncoding};

    use crate::crypto::{Signer, SigningKey};
    use crate::enums::SignatureScheme;
    use crate::error::Error;

    static ALL_RSA_SCHEMES: &[SignatureScheme] = &[
        SignatureScheme::RSA_PSS_SHA256,
        SignatureScheme::RSA_PSS_SHA384,
        SignatureScheme::RSA_PSS_SHA512,
    ];

    /// An RSA key that signs only with PSS padding (RSASSA-PSS-RSAE).
    #[derive(Clone)]
    pub(crate) struct RsaSigningKey {
        keys: Arc<PssKeys>,
    }

    /// One blinded PSS signing key per digest, built once at load time.
    struct PssKeys {
        sha256: BlindedSigningKey<sha2::Sha256>,
        sha384: BlindedSigningKey<sha2::Sha384>,
        sha512: BlindedSigningKey<sha2::Sha512>,
    }

    impl RsaSigningKey {
        pub(crate) fn new(der: &PrivateKeyDer<'_>) -> Option<Self> {
            let key = match der {
                PrivateKeyDer::Pkcs8(der) => {
                    RsaPrivateKey::from_pkcs8_der(der.secret_pkcs8_der()).ok()?
                }
                PrivateKeyDer::Pkcs1(der) => {
                    RsaPrivateKey::from_pkcs1_der(der.secret_pkcs1_der()).ok()?
                }
                _ => return None,
            };

            let keys = PssKeys {
                sha256: BlindedSigningKey::new(key.clone()),
                sha384: BlindedSigningKey::new(key.clone()),
                sha512: BlindedSigningKey::new(key),
            };
            Some(Self {
                keys: Arc::new(keys),
            })
        }
    }

    impl SigningKey for RsaSigningKey {
        fn choose_scheme(&self, offered: &[SignatureScheme]) -> Option<Box<dyn Signer>> {
            let scheme = ALL_RSA_SCHEMES
                .iter()
                .find(|scheme| offered.contains(scheme))?;
            Some(Box::new(RsaSigner {
                keys: self.keys.clone(),
                scheme: *scheme,
            }))
        }

        fn schemes(&self) -> &[SignatureScheme] {
            ALL_RSA_SCHEMES
        }
    }

    impl fmt::Debug for RsaSigningKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("RsaSigningKey").finish()
        }
    }

    struct RsaSigner {
        keys: Arc<PssKeys>,
        scheme: SignatureScheme,
    }

    impl Signer for RsaSigner {
        fn sign(&self, message: &[u8]) -> Result<Vec<u8>, Error> {
            let sig = match self.scheme {
                SignatureScheme::RSA_PSS_SHA256 => self
                    .keys
                    .sha256
                    .try_sign_with_rng(&mut OsRng, message)
                    .map(|sig| sig.to_vec()),
                SignatureScheme::RSA_PSS_SHA384 => self
                    .keys
                    .sha384
                    .try_sign_with_rng(&mut OsRng, message)
                    .map(|sig| sig.to_vec()),
                _ => self
                    .keys
                    .sha512
                    .try_sign_with_rng(&mut OsRng, message)
                    .map(|sig| sig.to_vec()),
            };
            sig.map_err(|_| Error::General("signing failed".into()))
        }

        fn scheme(&self) -> SignatureScheme {
            self.scheme
        }
    }

    impl fmt::Debug for RsaSigner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("RsaSigner")
                .field("scheme", &self.scheme)
                .finish()
        }
    }
}
