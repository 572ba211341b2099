use aes_gcm::{Aes128Gcm, Aes256Gcm};
use ccm::consts::{U12, U16, U8};
use chacha20poly1305::aead::generic_array::GenericArray;
use chacha20poly1305::aead::{AeadCore, AeadInPlace, KeyInit};
use chacha20poly1305::ChaCha20Poly1305;

use crate::crypto::cipher::{
    make_tls13_aad, AeadKey, BorrowedPlainMessage, Iv, MessageDecrypter, MessageEncrypter,
    Nonce, OpaqueMessage, PlainMessage, Tls13AeadAlgorithm,
};
use crate::enums::{ContentType, ProtocolVersion};
use crate::error::Error;

type Aes128Ccm = ccm::Ccm<aes::Aes128, U16, U12>;
type Aes128Ccm8 = ccm::Ccm<aes::Aes128, U8, U12>;

/// An AEAD from the RustCrypto `aead` family, used the TLS1.3 way.
///
/// `TAG_LEN` must agree with the algorithm's own tag size.
pub(crate) struct Aead<A, const TAG_LEN: usize>(core::marker::PhantomData<fn() -> A>);

pub(crate) static AES_128_GCM: Aead<Aes128Gcm, 16> = Aead(core::marker::PhantomData);
pub(crate) static AES_256_GCM: Aead<Aes256Gcm, 16> = Aead(core::marker::PhantomData);
pub(crate) static CHACHA20_POLY1305: Aead<ChaCha20Poly1305, 16> = Aead(core::marker::PhantomData);
pub(crate) static AES_128_CCM: Aead<Aes128Ccm, 16> = Aead(core::marker::PhantomData);
pub(crate) static AES_128_CCM_8: Aead<Aes128Ccm8, 8> = Aead(core::marker::PhantomData);

impl<A, const TAG_LEN: usize> Tls13AeadAlgorithm for Aead<A, TAG_LEN>
where
    A: AeadInPlace + KeyInit + Send + Sync + 'static,
    A: AeadCore<NonceSize = U12>,
{
    fn encrypter(&self, key: AeadKey, iv: Iv) -> Result<Box<dyn MessageEncrypter>, Error> {
        Ok(Box::new(Tls13Cipher::<A, TAG_LEN>::new(key, iv)?))
    }

    fn decrypter(&self, key: AeadKey, iv: Iv) -> Result<Box<dyn MessageDecrypter>, Error> {
        Ok(Box::new(Tls13Cipher::<A, TAG_LEN>::new(key, iv)?))
    }

    fn key_len(&self) -> usize {
        A::key_size()
    }
}

struct Tls13Cipher<A, const TAG_LEN: usize>(A, Iv);

impl<A: KeyInit, const TAG_LEN: usize> Tls13Cipher<A, TAG_LEN> {
    fn new(key: AeadKey, iv: Iv) -> Result<Self, Error> {
        let cipher = A::new_from_slice(key.as_ref())
            .map_err(|_| Error::General("AEAD key has the wrong length".into()))?;
        Ok(Self(cipher, iv))
    }
}

impl<A, const TAG_LEN: usize> MessageEncrypter for Tls13Cipher<A, TAG_LEN>
where
    A: AeadInPlace + Send + Sync,
    A: AeadCore<NonceSize = U12>,
{
    fn encrypt(&self, m: BorrowedPlainMessage<'_>, seq: u64) -> Result<OpaqueMessage, Error> {
        let total_len = self.encrypted_payload_len(m.payload.len());
        let mut payload = Vec::with_capacity(total_len);
        payload.extend_from_slice(m.payload);
        payload.push(u8::from(m.typ));

        let nonce = Nonce::new(&self.1, seq);
        let aad = make_tls13_aad(total_len);

        self.0
            .encrypt_in_place(GenericArray::from_slice(&nonce.0), &aad, &mut payload)
            .map_err(|_| Error::EncryptError)
            .map(|_| {
                OpaqueMessage::new(
                    ContentType::ApplicationData,
                    ProtocolVersion::TLSv1_2,
                    payload,
                )
            })
    }

    fn encrypted_payload_len(&self, payload_len: usize) -> usize {
        payload_len + 1 + TAG_LEN
    }
}

impl<A, const TAG_LEN: usize> MessageDecrypter for Tls13Cipher<A, TAG_LEN>
where
    A: AeadInPlace + Send + Sync,
    A: AeadCore<NonceSize = U12>,
{
    fn decrypt(&self, mut m: OpaqueMessage, seq: u64) -> Result<PlainMessage, Error> {
        let payload = &mut m.payload.0;
        if payload.len() < TAG_LEN {
            return Err(Error::DecryptError);
        }

        let nonce = Nonce::new(&self.1, seq);
        let aad = make_tls13_aad(payload.len());

        self.0
            .decrypt_in_place(GenericArray::from_slice(&nonce.0), &aad, payload)
            .map_err(|_| Error::DecryptError)?;

        self.tls13_check_length_and_unpad(m)
    }
}
