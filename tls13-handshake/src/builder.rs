//! Resolution of configured identifiers against a [`CryptoProvider`].
//!
//! Both [`ClientConfigBuilder`] and [`ServerConfigBuilder`] record the
//! caller's choices as plain wire identifiers, and only turn them into
//! provider objects when the config is finally built.  Every check that can
//! fail happens there, so a config that exists is usable.
//!
//! [`ClientConfigBuilder`]: crate::ClientConfigBuilder
//! [`ServerConfigBuilder`]: crate::ServerConfigBuilder

use std::collections::BTreeSet;

use crate::crypto::{CryptoProvider, SupportedKxGroup};
use crate::enums::{CipherSuite, NamedGroup};
use crate::error::{ConfigError, Error};
use crate::suites::Tls13CipherSuite;

/// The cipher suites to use, in preference order.
///
/// `None` means everything the provider offers, in the provider's order.
pub(crate) fn resolve_cipher_suites(
    provider: &CryptoProvider,
    wanted: Option<&[CipherSuite]>,
) -> Result<Vec<&'static Tls13CipherSuite>, Error> {
    let suites = match wanted {
        None => provider.cipher_suites.clone(),
        Some(wanted) => {
            reject_duplicates(wanted.iter().map(|cs| u16::from(*cs)))?;
            wanted
                .iter()
                .map(|cs| provider.find_cipher_suite(*cs))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    match suites.is_empty() {
        true => Err(ConfigError::NoCipherSuites.into()),
        false => Ok(suites),
    }
}

/// The key exchange groups to use, in preference order.
///
/// `None` means everything the provider offers, in the provider's order.
pub(crate) fn resolve_kx_groups(
    provider: &CryptoProvider,
    wanted: Option<&[NamedGroup]>,
) -> Result<Vec<&'static dyn SupportedKxGroup>, Error> {
    let groups = match wanted {
        None => provider.kx_groups.clone(),
        Some(wanted) => {
            reject_duplicates(wanted.iter().map(|g| u16::from(*g)))?;
            wanted
                .iter()
                .map(|g| provider.find_kx_group(*g))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    match groups.is_empty() {
        true => Err(ConfigError::NoKxGroups.into()),
        false => Ok(groups),
    }
}

pub(crate) fn reject_duplicates(items: impl Iterator<Item = u16>) -> Result<(), Error> {
    let mut seen = BTreeSet::new();
    for item in items {
        if !seen.insert(item) {
            return Err(ConfigError::DuplicateEntry.into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::rustcrypto;

    #[test]
    fn defaults_follow_provider_order() {
        let provider = rustcrypto::default_provider();
        let suites = resolve_cipher_suites(&provider, None).unwrap();
        assert_eq!(suites, provider.cipher_suites);

        let groups = resolve_kx_groups(&provider, None).unwrap();
        assert_eq!(
            groups.iter().map(|g| g.name()).collect::<Vec<_>>(),
            provider
                .kx_groups
                .iter()
                .map(|g| g.name())
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn explicit_order_is_kept() {
        let provider = rustcrypto::default_provider();
        let groups = resolve_kx_groups(
            &provider,
            Some(&[NamedGroup::secp384r1, NamedGroup::X25519]),
        )
        .unwrap();
        assert_eq!(groups[0].name(), NamedGroup::secp384r1);
        assert_eq!(groups[1].name(), NamedGroup::X25519);
    }

    #[test]
    fn empty_duplicate_and_unknown_are_rejected() {
        let provider = rustcrypto::default_provider();
        assert_eq!(
            resolve_cipher_suites(&provider, Some(&[])).unwrap_err(),
            Error::InvalidConfig(ConfigError::NoCipherSuites)
        );
        assert_eq!(
            resolve_kx_groups(&provider, Some(&[])).unwrap_err(),
            Error::InvalidConfig(ConfigError::NoKxGroups)
        );
        assert_eq!(
            resolve_kx_groups(
                &provider,
                Some(&[NamedGroup::secp256r1, NamedGroup::secp256r1])
            )
            .unwrap_err(),
            Error::InvalidConfig(ConfigError::DuplicateEntry)
        );
        assert_eq!(
            resolve_cipher_suites(
                &provider,
                Some(&[CipherSuite::TLS_EMPTY_RENEGOTIATION_INFO_SCSV])
            )
            .unwrap_err(),
            Error::InvalidConfig(ConfigError::UnsupportedCipherSuite(
                CipherSuite::TLS_EMPTY_RENEGOTIATION_INFO_SCSV
            ))
        );
    }
}
