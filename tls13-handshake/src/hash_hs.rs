use std::mem;

use crate::crypto::hash;
use crate::msgs::codec::Codec;
use crate::msgs::handshake::HandshakeMessagePayload;
use crate::msgs::message::{Message, MessagePayload};

/// Early stage buffering of handshake payloads.
///
/// Before we know the hash algorithm to use to verify the handshake, we just buffer the messages.
pub(crate) struct HandshakeHashBuffer {
    buffer: Vec<u8>,
    messages: usize,
}

impl HandshakeHashBuffer {
    pub(crate) fn new() -> Self {
        Self {
            buffer: Vec::new(),
            messages: 0,
        }
    }

    /// Buffer a handshake message.
    pub(crate) fn add_message(&mut self, m: &Message) {
        if let MessagePayload::Handshake { encoded, .. } = &m.payload {
            self.update_raw(&encoded.0);
        }
    }

    fn update_raw(&mut self, buf: &[u8]) {
        self.buffer.extend_from_slice(buf);
        self.messages += 1;
    }

    /// We now know what hash function the verify_data will use.
    pub(crate) fn start_hash(self, provider: &'static dyn hash::Hash) -> HandshakeHash {
        let mut ctx = provider.start();
        ctx.update(&self.buffer);
        HandshakeHash {
            provider,
            ctx,
            messages: self.messages,
            rolled_up: false,
        }
    }
}

/// This deals with keeping a running hash of the handshake
/// payloads.  This is computed by buffering initially.  Once
/// we know what hash function we need to use we switch to
/// incremental hashing.
pub(crate) struct HandshakeHash {
    provider: &'static dyn hash::Hash,
    ctx: Box<dyn hash::Context>,

    /// How many handshake messages are in `ctx`.
    messages: usize,

    /// Whether `rollup_for_hrr` has happened.
    rolled_up: bool,
}

impl HandshakeHash {
    /// Hash a handshake message.
    pub(crate) fn add_message(&mut self, m: &Message) -> &mut Self {
        if let MessagePayload::Handshake { encoded, .. } = &m.payload {
            self.update_raw(&encoded.0);
        }
        self
    }

    fn update_raw(&mut self, buf: &[u8]) -> &mut Self {
        self.ctx.update(buf);
        self.messages += 1;
        self
    }

    /// Take the current hash value, and encapsulate it in a
    /// 'message_hash' handshake message.  Start this hash
    /// again, with that message at the front.
    ///
    /// # Panics
    ///
    /// This may only be done once, and only while the transcript holds
    /// exactly the first ClientHello.
    pub(crate) fn rollup_for_hrr(&mut self) {
        assert!(!self.rolled_up, "transcript already rolled up for HRR");
        assert_eq!(
            self.messages, 1,
            "HRR rollup must happen straight after ClientHello1"
        );

        let old_ctx = mem::replace(&mut self.ctx, self.provider.start());
        let old_hash = old_ctx.finish();
        let old_handshake_hash_msg =
            HandshakeMessagePayload::build_handshake_hash(old_hash.as_ref());

        self.messages = 0;
        self.update_raw(&old_handshake_hash_msg.get_encoding());
        self.rolled_up = true;
    }

    /// Get the current hash value.
    pub(crate) fn get_current_hash(&self) -> hash::Output {
        self.ctx.fork_finish()
    }
}

/// The transcript of a handshake whose hash function may not be known yet.
///
/// Both sides start buffering: neither knows the cipher suite until
/// the first ClientHello has been answered.
pub(crate) enum HandshakeHashOrBuffer {
    Buffer(HandshakeHashBuffer),
    Hash(HandshakeHash),
}

impl HandshakeHashOrBuffer {
    pub(crate) fn add_message(&mut self, m: &Message) {
        match self {
            Self::Buffer(buffer) => buffer.add_message(m),
            Self::Hash(hash) => {
                hash.add_message(m);
            }
        }
    }

    /// Switch to hashing with `provider`, if we weren't already.
    pub(crate) fn start_hash(self, provider: &'static dyn hash::Hash) -> HandshakeHash {
        match self {
            Self::Buffer(buffer) => buffer.start_hash(provider),
            Self::Hash(hash) => hash,
        }
    }
}
