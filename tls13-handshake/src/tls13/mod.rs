use crate::crypto::hash;

pub(crate) mod key_schedule;

// TLS1.3 CertificateVerify context strings, with the trailing zero byte.
static SERVER_CONSTANT: &[u8; 34] = b"TLS 1.3, server CertificateVerify\x00";

/// Constructs the signature message specified in section 4.4.3 of RFC8446.
pub(crate) fn construct_server_verify_message(handshake_hash: &hash::Output) -> VerifyMessage {
    VerifyMessage::new(handshake_hash, SERVER_CONSTANT)
}

pub(crate) struct VerifyMessage {
    buf: [u8; MAX_VERIFY_MSG],
    used: usize,
}

impl VerifyMessage {
    fn new(handshake_hash: &hash::Output, context_string_with_0: &[u8; 34]) -> Self {
        let used = 64 + context_string_with_0.len() + handshake_hash.as_ref().len();
        let mut buf = [0x20u8; MAX_VERIFY_MSG];

        let (_spaces, context) = buf.split_at_mut(64);
        let (context, hash) = context.split_at_mut(34);
        context.copy_from_slice(context_string_with_0);
        hash[..handshake_hash.as_ref().len()].copy_from_slice(handshake_hash.as_ref());

        Self { buf, used }
    }
}

impl AsRef<[u8]> for VerifyMessage {
    fn as_ref(&self) -> &[u8] {
        &self.buf[..self.used]
    }
}

const MAX_VERIFY_MSG: usize = 64 + 34 + hash::Output::MAX_LEN;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_verify_message_layout() {
        let h = hash::Output::new(&[0xaa; 48]);
        let msg = construct_server_verify_message(&h);
        let msg = msg.as_ref();

        assert_eq!(msg.len(), 64 + 34 + 48);
        assert!(msg[..64].iter().all(|b| *b == 0x20));
        assert_eq!(&msg[64..97], b"TLS 1.3, server CertificateVerify");
        assert_eq!(msg[97], 0x00);
        assert_eq!(&msg[98..], &[0xaa; 48][..]);
    }
}
