use crate::error::InvalidMessage;
use crate::msgs::codec::{Codec, Reader};

/// The only ChangeCipherSpec body TLS 1.3 permits (RFC 8446 s5).
const COMPAT_CCS_BODY: [u8; 1] = [0x01];

/// A ChangeCipherSpec.  TLS 1.3 sends and accepts these only in
/// middlebox compatibility mode, and never protects them.
#[derive(Debug)]
pub struct ChangeCipherSpecPayload;

impl ChangeCipherSpecPayload {
    /// Whether a plaintext record body is the compatibility-mode CCS.
    pub(crate) fn is_compat_body(body: &[u8]) -> bool {
        body == COMPAT_CCS_BODY
    }
}

impl Codec for ChangeCipherSpecPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&COMPAT_CCS_BODY);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        match Self::is_compat_body(r.rest()) {
            true => Ok(Self),
            false => Err(InvalidMessage::InvalidCcs),
        }
    }
}
