use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::{OsRng, RngCore};

use crate::crypto::{ActiveKeyExchange, SharedSecret, SupportedKxGroup};
use crate::enums::NamedGroup;
use crate::error::{Error, PeerMisbehaved};

/// All key exchange groups, in default preference order.
pub(crate) static ALL_KX_GROUPS: &[&dyn SupportedKxGroup] =
    &[&X25519, &SECP256R1, &SECP384R1, &SECP521R1, &X448];

fn invalid_key_share() -> Error {
    PeerMisbehaved::InvalidKeyShare.into()
}

/// Key exchange using X25519, from RFC 7748.
#[derive(Debug)]
pub(crate) struct X25519;

struct X25519KeyExchange {
    priv_key: x25519_dalek::EphemeralSecret,
    pub_key: x25519_dalek::PublicKey,
}

impl SupportedKxGroup for X25519 {
    fn start(&self) -> Result<Box<dyn ActiveKeyExchange>, Error> {
        let priv_key = x25519_dalek::EphemeralSecret::random_from_rng(OsRng);
        Ok(Box::new(X25519KeyExchange {
            pub_key: (&priv_key).into(),
            priv_key,
        }))
    }

    fn name(&self) -> NamedGroup {
        NamedGroup::X25519
    }
}

impl ActiveKeyExchange for X25519KeyExchange {
    fn complete(self: Box<Self>, peer: &[u8]) -> Result<SharedSecret, Error> {
        let peer_array: [u8; 32] = peer
            .try_into()
            .map_err(|_| invalid_key_share())?;
        let their_pub = x25519_dalek::PublicKey::from(peer_array);
        let shared_secret = self.priv_key.diffie_hellman(&their_pub);
        if !shared_secret.was_contributory() {
            return Err(invalid_key_share());
        }
        Ok(SharedSecret::from(&shared_secret.as_bytes()[..]))
    }

    fn pub_key(&self) -> &[u8] {
        self.pub_key.as_bytes()
    }

    fn group(&self) -> NamedGroup {
        NamedGroup::X25519
    }
}

/// Key exchange using X448, from RFC 7748.
#[derive(Debug)]
pub(crate) struct X448;

struct X448KeyExchange {
    priv_key: x448::Secret,
    pub_key: x448::PublicKey,
}

impl SupportedKxGroup for X448 {
    fn start(&self) -> Result<Box<dyn ActiveKeyExchange>, Error> {
        let mut seed = [0u8; 56];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|_| Error::FailedToGetRandomBytes)?;
        let priv_key = x448::Secret::from(seed);
        Ok(Box::new(X448KeyExchange {
            pub_key: x448::PublicKey::from(&priv_key),
            priv_key,
        }))
    }

    fn name(&self) -> NamedGroup {
        NamedGroup::X448
    }
}

impl ActiveKeyExchange for X448KeyExchange {
    fn complete(self: Box<Self>, peer: &[u8]) -> Result<SharedSecret, Error> {
        // Both steps refuse low-order points.
        let their_pub = x448::PublicKey::from_bytes(peer).ok_or_else(invalid_key_share)?;
        let shared_secret = self
            .priv_key
            .as_diffie_hellman(&their_pub)
            .ok_or_else(invalid_key_share)?;
        Ok(SharedSecret::from(&shared_secret.as_bytes()[..]))
    }

    fn pub_key(&self) -> &[u8] {
        self.pub_key.as_bytes()
    }

    fn group(&self) -> NamedGroup {
        NamedGroup::X448
    }
}

/// ECDHE over a NIST curve.  Public keys are uncompressed SEC1 points.
macro_rules! ecdh_group {
    ($group:ident, $kx:ident, $curve:ident, $name:expr) => {
        #[derive(Debug)]
        pub(crate) struct $group;

        struct $kx {
            priv_key: $curve::ecdh::EphemeralSecret,
            pub_key: Vec<u8>,
        }

        impl SupportedKxGroup for $group {
            fn start(&self) -> Result<Box<dyn ActiveKeyExchange>, Error> {
                let priv_key = $curve::ecdh::EphemeralSecret::random(&mut OsRng);
                let pub_key = priv_key
                    .public_key()
                    .to_encoded_point(false)
                    .as_bytes()
                    .to_vec();
                Ok(Box::new($kx { priv_key, pub_key }))
            }

            fn name(&self) -> NamedGroup {
                $name
            }
        }

        impl ActiveKeyExchange for $kx {
            fn complete(self: Box<Self>, peer: &[u8]) -> Result<SharedSecret, Error> {
                // RFC 8446 s4.2.8.2: only the uncompressed form is allowed.
                if peer.first() != Some(&0x04) {
                    return Err(invalid_key_share());
                }
                let their_pub =
                    $curve::PublicKey::from_sec1_bytes(peer).map_err(|_| invalid_key_share())?;
                let shared_secret = self.priv_key.diffie_hellman(&their_pub);
                Ok(SharedSecret::from(&shared_secret.raw_secret_bytes()[..]))
            }

            fn pub_key(&self) -> &[u8] {
                &self.pub_key
            }

            fn group(&self) -> NamedGroup {
                $name
            }
        }
    };
}

ecdh_group!(SECP256R1, Secp256r1KeyExchange, p256, NamedGroup::secp256r1);
ecdh_group!(SECP384R1, Secp384r1KeyExchange, p384, NamedGroup::secp384r1);
ecdh_group!(SECP521R1, Secp521r1KeyExchange, p521, NamedGroup::secp521r1);

#[cfg(test)]
mod tests {
    use super::*;

    fn agree(group: &dyn SupportedKxGroup, pub_len: usize) {
        let a = group.start().unwrap();
        let b = group.start().unwrap();
        assert_eq!(a.group(), group.name());
        assert_eq!(a.pub_key().len(), pub_len);

        let b_pub = b.pub_key().to_vec();
        let a_pub = a.pub_key().to_vec();
        let ab = a.complete(&b_pub).unwrap();
        let ba = b.complete(&a_pub).unwrap();
        assert_eq!(ab.secret_bytes(), ba.secret_bytes());
    }

    #[test]
    fn all_groups_agree() {
        agree(&X25519, 32);
        agree(&X448, 56);
        agree(&SECP256R1, 65);
        agree(&SECP384R1, 97);
        agree(&SECP521R1, 133);
    }

    #[test]
    fn malformed_shares_are_rejected() {
        for group in ALL_KX_GROUPS {
            let kx = group.start().unwrap();
            assert_eq!(
                kx.complete(&[0x04, 0x01, 0x02]).err(),
                Some(PeerMisbehaved::InvalidKeyShare.into()),
                "{:?}",
                group
            );
        }
    }

    #[test]
    fn low_order_points_are_rejected() {
        let kx = X25519.start().unwrap();
        assert_eq!(
            kx.complete(&[0u8; 32]).err(),
            Some(PeerMisbehaved::InvalidKeyShare.into())
        );

        let kx = X448.start().unwrap();
        assert_eq!(
            kx.complete(&[0u8; 56]).err(),
            Some(PeerMisbehaved::InvalidKeyShare.into())
        );
    }

    #[test]
    fn compressed_points_are_rejected() {
        let other = SECP256R1.start().unwrap();
        let mut compressed = other.pub_key()[..33].to_vec();
        compressed[0] = 0x02;
        let kx = SECP256R1.start().unwrap();
        assert_eq!(
            kx.complete(&compressed).err(),
            Some(PeerMisbehaved::InvalidKeyShare.into())
        );
    }
}
