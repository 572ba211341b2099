//! The single place where we generate random material for our own use.

use crate::crypto::SecureRandom;

/// Make a fixed-size array of random material.
pub(crate) fn random_array<const N: usize>(
    secure_random: &dyn SecureRandom,
) -> Result<[u8; N], GetRandomFailed> {
    let mut buf = [0u8; N];
    secure_random.fill(&mut buf)?;
    Ok(buf)
}

/// Random material generation failed.
#[derive(Debug)]
pub struct GetRandomFailed;
