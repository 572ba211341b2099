use zeroize::Zeroize;

use crate::enums::{ContentType, ProtocolVersion};
use crate::error::{Error, PeerMisbehaved};
use crate::msgs::fragmenter::MAX_FRAGMENT_LEN;
pub use crate::msgs::message::{BorrowedPlainMessage, OpaqueMessage, PlainMessage};

/// Factory trait for building `MessageEncrypter` and `MessageDecrypter` for a TLS1.3 cipher suite.
pub trait Tls13AeadAlgorithm: Send + Sync {
    /// Build a `MessageEncrypter` for the given key/iv.
    fn encrypter(&self, key: AeadKey, iv: Iv) -> Result<Box<dyn MessageEncrypter>, Error>;

    /// Build a `MessageDecrypter` for the given key/iv.
    fn decrypter(&self, key: AeadKey, iv: Iv) -> Result<Box<dyn MessageDecrypter>, Error>;

    /// The length of key in bytes required by `encrypter()` and `decrypter()`.
    fn key_len(&self) -> usize;
}

/// Objects with this trait can decrypt TLS messages.
pub trait MessageDecrypter: Send + Sync {
    /// Perform the decryption over the concerned TLS message.
    fn decrypt(&self, m: OpaqueMessage, seq: u64) -> Result<PlainMessage, Error>;

    /// Checks the length of a freshly decrypted `TLSInnerPlaintext` and removes the padding.
    fn tls13_check_length_and_unpad(&self, mut msg: OpaqueMessage) -> Result<PlainMessage, Error> {
        let payload = &mut msg.payload.0;

        if payload.len() > MAX_FRAGMENT_LEN + 1 {
            return Err(Error::PeerSentOversizedRecord);
        }

        msg.typ = unpad_tls13(payload);
        if msg.typ == ContentType::Unknown(0) {
            return Err(PeerMisbehaved::IllegalTlsInnerPlaintext.into());
        }

        if payload.len() > MAX_FRAGMENT_LEN {
            return Err(Error::PeerSentOversizedRecord);
        }

        msg.version = ProtocolVersion::TLSv1_3;
        Ok(msg.into_plain_message())
    }
}

/// `v` is a message payload, immediately post-decryption.  This function
/// removes zero padding bytes, until a non-zero byte is encountered which is
/// the content type, which is returned.  See RFC8446 s5.2.
///
/// ContentType(0) is returned if the message payload is empty or all zeroes.
fn unpad_tls13(v: &mut Vec<u8>) -> ContentType {
    loop {
        match v.pop() {
            Some(0) => {}
            Some(content_type) => return ContentType::from(content_type),
            None => return ContentType::Unknown(0),
        }
    }
}

/// Objects with this trait can encrypt TLS messages.
pub trait MessageEncrypter: Send + Sync {
    /// Encrypt the message `m`.
    fn encrypt(&self, m: BorrowedPlainMessage<'_>, seq: u64) -> Result<OpaqueMessage, Error>;

    /// Length of the ciphertext for a plaintext of `payload_len` bytes.
    fn encrypted_payload_len(&self, payload_len: usize) -> usize;
}

impl dyn MessageEncrypter {
    pub(crate) fn invalid() -> Box<dyn MessageEncrypter> {
        Box::new(InvalidMessageEncrypter {})
    }
}

impl dyn MessageDecrypter {
    pub(crate) fn invalid() -> Box<dyn MessageDecrypter> {
        Box::new(InvalidMessageDecrypter {})
    }
}

/// Size of TLS nonces (incorrectly termed "IV" in standard) for all supported ciphersuites.
pub const NONCE_LEN: usize = 12;

/// A write or read IV.
#[derive(Default)]
pub struct Iv([u8; NONCE_LEN]);

impl From<[u8; NONCE_LEN]> for Iv {
    fn from(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }
}

impl Iv {
    #[cfg(test)]
    pub(crate) fn value(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

impl Drop for Iv {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// A nonce for one record: `iv ^ seq`, where `seq` is encoded as a
/// 96-bit big-endian integer.
pub struct Nonce(pub [u8; NONCE_LEN]);

impl Nonce {
    /// Combine an `Iv` and sequence number to produce a unique nonce.
    #[inline]
    pub fn new(iv: &Iv, seq: u64) -> Self {
        let mut nonce = Self([0u8; NONCE_LEN]);
        nonce.0[4..].copy_from_slice(&seq.to_be_bytes());

        nonce
            .0
            .iter_mut()
            .zip(iv.0.iter())
            .for_each(|(nonce, iv)| {
                *nonce ^= *iv;
            });

        nonce
    }
}

/// Returns a TLS1.3 `additional_data` encoding.
///
/// See RFC8446 s5.2 for the `additional_data` definition.
#[inline]
pub fn make_tls13_aad(payload_len: usize) -> [u8; 5] {
    let version = u16::from(ProtocolVersion::TLSv1_2);
    [
        u8::from(ContentType::ApplicationData),
        // nb. this is `legacy_record_version`, ie TLS1.2 even for TLS1.3.
        (version >> 8) as u8,
        (version & 0xff) as u8,
        (payload_len >> 8) as u8,
        (payload_len & 0xff) as u8,
    ]
}

/// Largest possible AEAD key in the ciphersuites we support.
const MAX_AEAD_KEY_LEN: usize = 32;

/// A key for an AEAD algorithm.
///
/// This is a value type for a byte string up to `MAX_AEAD_KEY_LEN` bytes in length.
pub struct AeadKey {
    buf: [u8; MAX_AEAD_KEY_LEN],
    used: usize,
}

impl From<[u8; MAX_AEAD_KEY_LEN]> for AeadKey {
    fn from(bytes: [u8; MAX_AEAD_KEY_LEN]) -> Self {
        Self {
            buf: bytes,
            used: MAX_AEAD_KEY_LEN,
        }
    }
}

impl AsRef<[u8]> for AeadKey {
    fn as_ref(&self) -> &[u8] {
        &self.buf[..self.used]
    }
}

impl AeadKey {
    pub(crate) fn with_length(mut self, len: usize) -> Self {
        assert!(len <= self.used);
        self.used = len;
        self
    }
}

impl Drop for AeadKey {
    fn drop(&mut self) {
        self.buf.zeroize();
    }
}

/// A `MessageEncrypter` which doesn't work.
struct InvalidMessageEncrypter {}

impl MessageEncrypter for InvalidMessageEncrypter {
    fn encrypt(&self, _m: BorrowedPlainMessage<'_>, _seq: u64) -> Result<OpaqueMessage, Error> {
        Err(Error::EncryptError)
    }

    fn encrypted_payload_len(&self, payload_len: usize) -> usize {
        payload_len
    }
}

/// A `MessageDecrypter` which doesn't work.
struct InvalidMessageDecrypter {}

impl MessageDecrypter for InvalidMessageDecrypter {
    fn decrypt(&self, _m: OpaqueMessage, _seq: u64) -> Result<PlainMessage, Error> {
        Err(Error::DecryptError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_xors_sequence_into_low_bytes() {
        let iv = Iv::from([0xff; NONCE_LEN]);
        let nonce = Nonce::new(&iv, 0x0102);
        assert_eq!(
            nonce.0,
            [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe, 0xfd]
        );
        assert_eq!(Nonce::new(&iv, 0).0, *iv.value());
    }

    #[test]
    fn aad_uses_legacy_record_version() {
        assert_eq!(make_tls13_aad(0x1234), [0x17, 0x03, 0x03, 0x12, 0x34]);
    }

    #[test]
    fn unpad_finds_content_type() {
        let mut v = vec![1, 2, 0x16, 0, 0, 0];
        assert_eq!(unpad_tls13(&mut v), ContentType::Handshake);
        assert_eq!(v, vec![1, 2]);

        let mut v = vec![0, 0];
        assert_eq!(unpad_tls13(&mut v), ContentType::Unknown(0));
        assert!(v.is_empty());
    }

    #[test]
    fn all_zero_inner_plaintext_is_rejected() {
        let msg = OpaqueMessage::new(
            ContentType::ApplicationData,
            ProtocolVersion::TLSv1_2,
            vec![0u8; 8],
        );
        let decrypter = <dyn MessageDecrypter>::invalid();
        assert_eq!(
            decrypter
                .tls13_check_length_and_unpad(msg)
                .unwrap_err(),
            PeerMisbehaved::IllegalTlsInnerPlaintext.into()
        );
    }

    #[test]
    fn invalid_cipher_refuses_work() {
        let msg = PlainMessage {
            typ: ContentType::ApplicationData,
            version: ProtocolVersion::TLSv1_3,
            payload: crate::msgs::base::Payload::new(b"hi".to_vec()),
        };
        assert_eq!(
            <dyn MessageEncrypter>::invalid()
                .encrypt(msg.borrow(), 0)
                .unwrap_err(),
            Error::EncryptError
        );
    }
}
