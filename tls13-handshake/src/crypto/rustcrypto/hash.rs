use sha2::Digest;

use crate::crypto::hash;

macro_rules! sha2_hash {
    ($name:ident, $context:ident, $digest:ty, $alg:ident, $len:literal) => {
        pub(crate) struct $name;

        impl hash::Hash for $name {
            fn start(&self) -> Box<dyn hash::Context> {
                Box::new($context(<$digest>::new()))
            }

            fn hash(&self, data: &[u8]) -> hash::Output {
                hash::Output::new(&<$digest>::digest(data)[..])
            }

            fn algorithm(&self) -> hash::HashAlgorithm {
                hash::HashAlgorithm::$alg
            }

            fn output_len(&self) -> usize {
                $len
            }
        }

        struct $context($digest);

        impl hash::Context for $context {
            fn fork_finish(&self) -> hash::Output {
                hash::Output::new(&self.0.clone().finalize()[..])
            }

            fn finish(self: Box<Self>) -> hash::Output {
                hash::Output::new(&self.0.finalize()[..])
            }

            fn update(&mut self, data: &[u8]) {
                self.0.update(data);
            }
        }
    };
}

sha2_hash!(Sha256, Sha256Context, sha2::Sha256, SHA256, 32);
sha2_hash!(Sha384, Sha384Context, sha2::Sha384, SHA384, 48);
