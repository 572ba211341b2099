/// HMAC over one of the suite hash functions.  HKDF is built on top of
/// this, see [`HkdfUsingHmac`](super::tls13::HkdfUsingHmac).
pub trait Hmac: Send + Sync {
    /// Key an HMAC computation with `key`.
    fn with_key(&self, key: &[u8]) -> Box<dyn Key>;

    /// Output length of the underlying hash (`L` in RFC 2104).
    fn hash_output_len(&self) -> usize;
}

/// An HMAC output.
pub type Tag = super::hash::Output;

/// A keyed HMAC, ready to sign.
pub trait Key: Send + Sync {
    /// Tag the concatenation of `data`.
    fn sign(&self, data: &[&[u8]]) -> Tag {
        self.sign_concat(&[], data, &[])
    }

    /// Tag `first || middle[0] || .. || middle[n] || last`.  HKDF-Expand
    /// feeds its previous block, the info pieces and a counter this way.
    fn sign_concat(&self, first: &[u8], middle: &[&[u8]], last: &[u8]) -> Tag;

    /// Length of the tags this key produces.
    fn tag_len(&self) -> usize;
}
