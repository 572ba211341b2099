use crate::crypto::cipher::{MessageDecrypter, MessageEncrypter};
use crate::error::Error;
use crate::msgs::message::{BorrowedPlainMessage, OpaqueMessage, PlainMessage};

static SEQ_SOFT_LIMIT: u64 = 0xffff_ffff_ffff_0000u64;
static SEQ_HARD_LIMIT: u64 = 0xffff_ffff_ffff_fffeu64;

#[derive(Debug, PartialEq)]
enum DirectionState {
    /// No keying material.
    Invalid,

    /// Keying material in use.
    Active,
}

/// Record layer that tracks decryption and encryption keys.
pub struct RecordLayer {
    message_encrypter: Box<dyn MessageEncrypter>,
    message_decrypter: Box<dyn MessageDecrypter>,
    write_seq: u64,
    read_seq: u64,
    encrypt_state: DirectionState,
    decrypt_state: DirectionState,
}

impl RecordLayer {
    /// Create new record layer with no keys.
    pub fn new() -> Self {
        Self {
            message_encrypter: <dyn MessageEncrypter>::invalid(),
            message_decrypter: <dyn MessageDecrypter>::invalid(),
            write_seq: 0,
            read_seq: 0,
            encrypt_state: DirectionState::Invalid,
            decrypt_state: DirectionState::Invalid,
        }
    }

    /// Decrypt a TLS message.
    ///
    /// `encr` is a decoded message allegedly received from the peer.
    /// If it can be decrypted, its decryption is returned.  Otherwise,
    /// an error is returned.  Before any keys are installed, messages
    /// pass through unchanged.
    pub(crate) fn decrypt_incoming(&mut self, encr: OpaqueMessage) -> Result<Decrypted, Error> {
        if self.decrypt_state != DirectionState::Active {
            return Ok(Decrypted {
                want_close_before_decrypt: false,
                plaintext: encr.into_plain_message(),
            });
        }

        // Set to `true` if the peer appears to getting close to encrypting
        // too many messages with this key.
        //
        // There's no reason to refuse to decrypt: the security failure has
        // already happened.
        let want_close_before_decrypt = self.read_seq == SEQ_SOFT_LIMIT;

        let plaintext = self
            .message_decrypter
            .decrypt(encr, self.read_seq)?;
        self.read_seq += 1;
        Ok(Decrypted {
            want_close_before_decrypt,
            plaintext,
        })
    }

    /// Encrypt a TLS message.
    ///
    /// `plain` is a TLS message we'd like to send.  Callers check
    /// `encrypt_exhausted()` first.
    pub(crate) fn encrypt_outgoing(
        &mut self,
        plain: BorrowedPlainMessage<'_>,
    ) -> Result<OpaqueMessage, Error> {
        debug_assert!(self.encrypt_state == DirectionState::Active);
        if self.encrypt_exhausted() {
            return Err(Error::EncryptError);
        }
        let seq = self.write_seq;
        self.write_seq += 1;
        self.message_encrypter.encrypt(plain, seq)
    }

    /// Set and start using the given `MessageEncrypter` for future outgoing
    /// message encryption.
    pub(crate) fn set_message_encrypter(&mut self, cipher: Box<dyn MessageEncrypter>) {
        self.message_encrypter = cipher;
        self.write_seq = 0;
        self.encrypt_state = DirectionState::Active;
    }

    /// Set and start using the given `MessageDecrypter` for future incoming
    /// message decryption.
    pub(crate) fn set_message_decrypter(&mut self, cipher: Box<dyn MessageDecrypter>) {
        self.message_decrypter = cipher;
        self.read_seq = 0;
        self.decrypt_state = DirectionState::Active;
    }

    /// Return true if we are getting close to encrypting too many
    /// messages with our encryption key.
    pub(crate) fn wants_close_before_encrypt(&self) -> bool {
        self.write_seq == SEQ_SOFT_LIMIT
    }

    /// Return true if we outright refuse to do anything with the
    /// encryption key.
    pub(crate) fn encrypt_exhausted(&self) -> bool {
        self.write_seq >= SEQ_HARD_LIMIT
    }

    pub(crate) fn is_encrypting(&self) -> bool {
        self.encrypt_state == DirectionState::Active
    }

}

impl Default for RecordLayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of decryption.
#[derive(Debug)]
pub(crate) struct Decrypted {
    /// Whether the peer appears to be getting close to encrypting too many messages with this key.
    pub(crate) want_close_before_decrypt: bool,
    /// The decrypted message.
    pub(crate) plaintext: PlainMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{ContentType, ProtocolVersion};

    struct PassThroughDecrypter;

    impl MessageDecrypter for PassThroughDecrypter {
        fn decrypt(&self, m: OpaqueMessage, _: u64) -> Result<PlainMessage, Error> {
            Ok(m.into_plain_message())
        }
    }

    struct SeqEchoEncrypter;

    impl MessageEncrypter for SeqEchoEncrypter {
        fn encrypt(&self, m: BorrowedPlainMessage<'_>, seq: u64) -> Result<OpaqueMessage, Error> {
            let mut payload = m.payload.to_vec();
            payload.extend_from_slice(&seq.to_be_bytes());
            Ok(OpaqueMessage::new(
                ContentType::ApplicationData,
                ProtocolVersion::TLSv1_2,
                payload,
            ))
        }

        fn encrypted_payload_len(&self, payload_len: usize) -> usize {
            payload_len + 8
        }
    }

    fn handshake_record() -> OpaqueMessage {
        OpaqueMessage::new(
            ContentType::Handshake,
            ProtocolVersion::TLSv1_2,
            vec![0xC0, 0xFF, 0xEE],
        )
    }

    #[test]
    fn read_sequence_follows_decrypter() {
        // A record layer starts out with no keys.
        let mut record_layer = RecordLayer::new();
        assert_eq!(record_layer.decrypt_state, DirectionState::Invalid);

        // Unkeyed messages pass through without counting.
        record_layer
            .decrypt_incoming(handshake_record())
            .unwrap();
        assert_eq!(record_layer.read_seq, 0);

        record_layer.set_message_decrypter(Box::new(PassThroughDecrypter));
        assert_eq!(record_layer.decrypt_state, DirectionState::Active);

        record_layer
            .decrypt_incoming(handshake_record())
            .unwrap();
        record_layer
            .decrypt_incoming(handshake_record())
            .unwrap();
        assert_eq!(record_layer.read_seq, 2);

        // A key change resets the sequence number.
        record_layer.set_message_decrypter(Box::new(PassThroughDecrypter));
        assert_eq!(record_layer.read_seq, 0);
    }

    #[test]
    fn invalid_decrypter_fails_once_active() {
        let mut record_layer = RecordLayer::new();
        record_layer.set_message_decrypter(<dyn MessageDecrypter>::invalid());
        assert_eq!(
            record_layer
                .decrypt_incoming(handshake_record())
                .unwrap_err(),
            Error::DecryptError
        );
        assert_eq!(record_layer.read_seq, 0);
    }

    #[test]
    fn write_sequence_numbers() {
        let mut record_layer = RecordLayer::new();
        assert!(!record_layer.is_encrypting());
        record_layer.set_message_encrypter(Box::new(SeqEchoEncrypter));
        assert!(record_layer.is_encrypting());

        let plain = BorrowedPlainMessage {
            typ: ContentType::ApplicationData,
            version: ProtocolVersion::TLSv1_2,
            payload: b"x",
        };
        for expect in 0u64..3 {
            let m = record_layer.encrypt_outgoing(plain).unwrap();
            assert_eq!(&m.payload.0[1..], &expect.to_be_bytes());
        }

        record_layer.write_seq = SEQ_SOFT_LIMIT;
        assert!(record_layer.wants_close_before_encrypt());
        assert!(!record_layer.encrypt_exhausted());

        record_layer.write_seq = SEQ_HARD_LIMIT;
        assert!(record_layer.encrypt_exhausted());
        assert_eq!(
            record_layer.encrypt_outgoing(plain).unwrap_err(),
            Error::EncryptError
        );
    }
}
