use hmac::digest::KeyInit;
use hmac::Mac;
use sha2::Digest;

use crate::crypto;

macro_rules! sha2_hmac {
    ($name:ident, $key:ident, $digest:ty, $len:literal) => {
        pub(crate) struct $name;

        impl crypto::hmac::Hmac for $name {
            fn with_key(&self, key: &[u8]) -> Box<dyn crypto::hmac::Key> {
                // RFC 2104 key preparation: long keys are hashed, then
                // everything is zero-padded to the block size.
                let mut block = hmac::digest::Key::<hmac::Hmac<$digest>>::default();
                if key.len() > block.len() {
                    let digest = <$digest>::digest(key);
                    block[..digest.len()].copy_from_slice(&digest);
                } else {
                    block[..key.len()].copy_from_slice(key);
                }
                Box::new($key(<hmac::Hmac<$digest> as KeyInit>::new(&block)))
            }

            fn hash_output_len(&self) -> usize {
                $len
            }
        }

        struct $key(hmac::Hmac<$digest>);

        impl crypto::hmac::Key for $key {
            fn sign_concat(&self, first: &[u8], middle: &[&[u8]], last: &[u8]) -> crypto::hmac::Tag {
                let mut ctx = self.0.clone();
                ctx.update(first);
                for m in middle {
                    ctx.update(m);
                }
                ctx.update(last);
                crypto::hmac::Tag::new(&ctx.finalize().into_bytes()[..])
            }

            fn tag_len(&self) -> usize {
                $len
            }
        }
    };
}

sha2_hmac!(Sha256Hmac, Sha256HmacKey, sha2::Sha256, 32);
sha2_hmac!(Sha384Hmac, Sha384HmacKey, sha2::Sha384, 48);
