pub use crate::msgs::enums::HashAlgorithm;

/// The hash function a TLS 1.3 suite names: SHA-256 or SHA-384.
///
/// It drives the handshake transcript (incrementally, through
/// [`Hash::start()`]) and the `message_hash` that replaces the first
/// ClientHello after a retry (in one shot, through [`Hash::hash()`]).
pub trait Hash: Send + Sync {
    /// Begin a transcript.
    fn start(&self) -> Box<dyn Context>;

    /// Digest `data` in one go.
    fn hash(&self, data: &[u8]) -> Output;

    /// Digest length in bytes.
    fn output_len(&self) -> usize;

    /// Which function this is.
    fn algorithm(&self) -> HashAlgorithm;
}

/// A running transcript hash.
pub trait Context: Send + Sync {
    /// The digest of everything added so far.  More may be added afterwards.
    fn fork_finish(&self) -> Output;

    /// The digest of everything added, consuming the context.
    fn finish(self: Box<Self>) -> Output;

    /// Add `data` to the transcript.
    fn update(&mut self, data: &[u8]);
}

/// A digest held inline.  HMAC tags share this representation, see
/// [`hmac::Tag`](super::hmac::Tag).
#[derive(Clone)]
pub struct Output {
    buf: [u8; Self::MAX_LEN],
    used: usize,
}

impl Output {
    /// Copy `bytes` into a new value.
    ///
    /// # Panics
    ///
    /// If `bytes` is longer than [`Output::MAX_LEN`].
    pub fn new(bytes: &[u8]) -> Self {
        let mut buf = [0u8; Self::MAX_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Self {
            buf,
            used: bytes.len(),
        }
    }

    /// SHA-384 gives the longest digest of any TLS 1.3 suite.
    pub const MAX_LEN: usize = 48;
}

impl AsRef<[u8]> for Output {
    fn as_ref(&self) -> &[u8] {
        &self.buf[..self.used]
    }
}
