use std::collections::VecDeque;

use crate::enums::{ContentType, ProtocolVersion};
use crate::error::InvalidMessage;
use crate::msgs::base::Payload;
use crate::msgs::codec::{self, Codec};
use crate::msgs::handshake::HandshakeMessagePayload;
use crate::msgs::message::{Message, MessagePayload, PlainMessage};

const HEADER_SIZE: usize = 1 + 3;

/// TLS allows for handshake messages of up to 16MB.  We
/// restrict that to 64KB to limit potential for denial-of-
/// service.
const MAX_HANDSHAKE_SIZE: u32 = 0xffff;

/// This works to reconstruct TLS handshake messages
/// from individual TLS messages.  It's guaranteed that
/// TLS messages output from this layer contain precisely
/// one handshake payload.
pub struct HandshakeJoiner {
    /// Completed handshake frames for output.
    pub frames: VecDeque<Message>,

    /// The message payload we're currently accumulating.
    buf: Vec<u8>,
}

impl Default for HandshakeJoiner {
    fn default() -> Self {
        Self::new()
    }
}

enum BufferState {
    /// Buffer contains a header that introduces a message that is too long.
    MessageTooLarge,

    /// Buffer contains a full header and body.
    OneMessage,

    /// We need more data to see a header and complete body.
    NeedsMoreData,
}

impl HandshakeJoiner {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
            buf: Vec::new(),
        }
    }

    /// Do we want to process this message?
    pub fn want_message(&self, msg: &PlainMessage) -> bool {
        msg.typ == ContentType::Handshake
    }

    /// Do we have any buffered data?
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take the message, and join/split it as needed.
    ///
    /// Returns a count of how many messages we queued.  An error means
    /// `msg` or a preceding message was corrupt; you cannot recover
    /// from this situation.
    pub fn take_message(&mut self, msg: PlainMessage) -> Result<usize, InvalidMessage> {
        if msg.payload.0.is_empty() {
            return Err(InvalidMessage::InvalidEmptyPayload);
        }

        // Most handshake messages arrive in a single fragment, so avoid
        // copying in that case.
        if self.buf.is_empty() {
            self.buf = msg.payload.0;
        } else {
            self.buf
                .extend_from_slice(&msg.payload.0[..]);
        }

        let mut count = 0;
        loop {
            match self.buf_contains_message() {
                BufferState::MessageTooLarge => return Err(InvalidMessage::HandshakePayloadTooLarge),
                BufferState::NeedsMoreData => break,
                BufferState::OneMessage => {
                    self.deframe_one(msg.version)?;
                    count += 1;
                }
            }
        }

        Ok(count)
    }

    /// Does our `buf` contain a full handshake payload?  It does if it is big
    /// enough to contain a header, and that header has a length which falls
    /// within `buf`.
    fn buf_contains_message(&self) -> BufferState {
        if self.buf.len() < HEADER_SIZE {
            return BufferState::NeedsMoreData;
        }

        let (header, rest) = self.buf.split_at(HEADER_SIZE);
        match codec::u24::read_bytes(&header[1..]) {
            Ok(len) if len.0 > MAX_HANDSHAKE_SIZE => BufferState::MessageTooLarge,
            Ok(len) if rest.get(..usize::from(len)).is_some() => BufferState::OneMessage,
            _ => BufferState::NeedsMoreData,
        }
    }

    /// Take a TLS handshake payload off the front of `buf`, and put it onto
    /// the back of our `frames` deque inside a normal `Message`.
    fn deframe_one(&mut self, version: ProtocolVersion) -> Result<(), InvalidMessage> {
        let used = {
            let mut rd = codec::Reader::init(&self.buf);
            let parsed = HandshakeMessagePayload::read(&mut rd)?;

            let m = Message {
                version,
                payload: MessagePayload::Handshake {
                    parsed,
                    encoded: Payload::new(&self.buf[..rd.used()]),
                },
            };

            self.frames.push_back(m);
            rd.used()
        };
        self.buf = self.buf.split_off(used);
        Ok(())
    }
}
