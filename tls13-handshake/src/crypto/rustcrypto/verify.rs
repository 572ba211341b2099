use pki_types::{alg_id, AlgorithmIdentifier, InvalidSignature, SignatureVerificationAlgorithm};
use signature::Verifier;

use crate::enums::SignatureScheme;
use crate::webpki::WebPkiSupportedAlgorithms;

/// Every verification algorithm, with the schemes each answers for.
///
/// PKCS#1 v1.5 appears in `all` only: it is acceptable inside certificate
/// chains, never in a CertificateVerify.
#[cfg(feature = "rsa-pss")]
pub static SUPPORTED_SIG_ALGS: WebPkiSupportedAlgorithms = WebPkiSupportedAlgorithms {
    all: &[
        ECDSA_P256_SHA256,
        ECDSA_P384_SHA384,
        ECDSA_P521_SHA512,
        RSA_PSS_SHA256,
        RSA_PSS_SHA384,
        RSA_PSS_SHA512,
        RSA_PKCS1_SHA256,
        RSA_PKCS1_SHA384,
        RSA_PKCS1_SHA512,
    ],
    mapping: &[
        (SignatureScheme::ECDSA_NISTP384_SHA384, &[ECDSA_P384_SHA384]),
        (SignatureScheme::ECDSA_NISTP256_SHA256, &[ECDSA_P256_SHA256]),
        (SignatureScheme::ECDSA_NISTP521_SHA512, &[ECDSA_P521_SHA512]),
        (SignatureScheme::RSA_PSS_SHA512, &[RSA_PSS_SHA512]),
        (SignatureScheme::RSA_PSS_SHA384, &[RSA_PSS_SHA384]),
        (SignatureScheme::RSA_PSS_SHA256, &[RSA_PSS_SHA256]),
    ],
};

/// Every verification algorithm, with the schemes each answers for.
#[cfg(not(feature = "rsa-pss"))]
pub static SUPPORTED_SIG_ALGS: WebPkiSupportedAlgorithms = WebPkiSupportedAlgorithms {
    all: &[ECDSA_P256_SHA256, ECDSA_P384_SHA384, ECDSA_P521_SHA512],
    mapping: &[
        (SignatureScheme::ECDSA_NISTP384_SHA384, &[ECDSA_P384_SHA384]),
        (SignatureScheme::ECDSA_NISTP256_SHA256, &[ECDSA_P256_SHA256]),
        (SignatureScheme::ECDSA_NISTP521_SHA512, &[ECDSA_P521_SHA512]),
    ],
};

static ECDSA_P256_SHA256: &dyn SignatureVerificationAlgorithm = &EcdsaP256Sha256Verify;
static ECDSA_P384_SHA384: &dyn SignatureVerificationAlgorithm = &EcdsaP384Sha384Verify;
static ECDSA_P521_SHA512: &dyn SignatureVerificationAlgorithm = &EcdsaP521Sha512Verify;

macro_rules! ecdsa_verify {
    ($name:ident, $curve:ident, $public_key_alg_id:expr, $signature_alg_id:expr) => {
        #[derive(Debug)]
        struct $name;

        impl SignatureVerificationAlgorithm for $name {
            fn public_key_alg_id(&self) -> AlgorithmIdentifier {
                $public_key_alg_id
            }

            fn signature_alg_id(&self) -> AlgorithmIdentifier {
                $signature_alg_id
            }

            fn verify_signature(
                &self,
                public_key: &[u8],
                message: &[u8],
                signature: &[u8],
            ) -> Result<(), InvalidSignature> {
                let public_key = $curve::ecdsa::VerifyingKey::from_sec1_bytes(public_key)
                    .map_err(|_| InvalidSignature)?;
                let signature =
                    $curve::ecdsa::Signature::from_der(signature).map_err(|_| InvalidSignature)?;

                public_key
                    .verify(message, &signature)
                    .map_err(|_| InvalidSignature)
            }
        }
    };
}

ecdsa_verify!(EcdsaP256Sha256Verify, p256, alg_id::ECDSA_P256, alg_id::ECDSA_SHA256);
ecdsa_verify!(EcdsaP384Sha384Verify, p384, alg_id::ECDSA_P384, alg_id::ECDSA_SHA384);
ecdsa_verify!(EcdsaP521Sha512Verify, p521, alg_id::ECDSA_P521, alg_id::ECDSA_SHA512);

#[cfg(feature = "rsa-pss")]
use rsa_verify::*;

#[cfg(feature = "rsa-pss")]
mod rsa_verify {
    use pki_types::{
        alg_id, AlgorithmIdentifier, InvalidSignature, SignatureVerificationAlgorithm,
    };
    use rsa::pkcs1::DecodeRsaPublicKey;
    use rsa::signature::Verifier;
    use rsa::{pkcs1v15, pss, RsaPublicKey};

    pub(super) static RSA_PSS_SHA256: &dyn SignatureVerificationAlgorithm = &RsaPssSha256Verify;
    pub(super) static RSA_PSS_SHA384: &dyn SignatureVerificationAlgorithm = &RsaPssSha384Verify;
    pub(super) static RSA_PSS_SHA512: &dyn SignatureVerificationAlgorithm = &RsaPssSha512Verify;
    pub(super) static RSA_PKCS1_SHA256: &dyn SignatureVerificationAlgorithm =
        &RsaPkcs1Sha256Verify;
    pub(super) static RSA_PKCS1_SHA384: &dyn SignatureVerificationAlgorithm =
        &RsaPkcs1Sha384Verify;
    pub(super) static RSA_PKCS1_SHA512: &dyn SignatureVerificationAlgorithm =
        &RsaPkcs1Sha512Verify;

    macro_rules! rsa_verify {
        ($name:ident, $padding:ident, $digest:ty, $signature_alg_id:expr) => {
            #[derive(Debug)]
            struct $name;

            impl SignatureVerificationAlgorithm for $name {
                fn public_key_alg_id(&self) -> AlgorithmIdentifier {
                    alg_id::RSA_ENCRYPTION
                }

                fn signature_alg_id(&self) -> AlgorithmIdentifier {
                    $signature_alg_id
                }

                fn verify_signature(
                    &self,
                    public_key: &[u8],
                    message: &[u8],
                    signature: &[u8],
                ) -> Result<(), InvalidSignature> {
                    // webpki hands over the RSAPublicKey structure, not a whole SPKI.
                    let public_key =
                        RsaPublicKey::from_pkcs1_der(public_key).map_err(|_| InvalidSignature)?;
                    let signature =
                        $padding::Signature::try_from(signature).map_err(|_| InvalidSignature)?;

                    $padding::VerifyingKey::<$digest>::new(public_key)
                        .verify(message, &signature)
                        .map_err(|_| InvalidSignature)
                }
            }
        };
    }

    rsa_verify!(RsaPssSha256Verify, pss, sha2::Sha256, alg_id::RSA_PSS_SHA256);
    rsa_verify!(RsaPssSha384Verify, pss, sha2::Sha384, alg_id::RSA_PSS_SHA384);
    rsa_verify!(RsaPssSha512Verify, pss, sha2::Sha512, alg_id::RSA_PSS_SHA512);
    rsa_verify!(RsaPkcs1Sha256Verify, pkcs1v15, sha2::Sha256, alg_id::RSA_PKCS1_SHA256);
    rsa_verify!(RsaPkcs1Sha384Verify, pkcs1v15, sha2::Sha384, alg_id::RSA_PKCS1_SHA384);
    rsa_verify!(RsaPkcs1Sha512Verify, pkcs1v15, sha2::Sha512, alg_id::RSA_PKCS1_SHA512);
}
