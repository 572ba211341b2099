use std::sync::Arc;

use subtle::ConstantTimeEq;

use super::server_conn::ServerConnectionData;
use super::{tls13, ServerConfig};
use crate::common_state::{CommonState, State};
use crate::crypto::SupportedKxGroup;
use crate::enums::{AlertDescription, HandshakeType, NamedGroup, ProtocolVersion, SignatureScheme};
use crate::error::{Error, PeerIncompatible, PeerMisbehaved};
use crate::hash_hs::{HandshakeHashBuffer, HandshakeHashOrBuffer};
#[cfg(feature = "logging")]
use crate::log::{debug, trace};
use crate::msgs::base::PayloadU16;
use crate::msgs::enums::Compression;
use crate::msgs::handshake::{
    ClientHelloPayload, ConvertServerNameList, HandshakeMessagePayload, HandshakePayload,
    HelloRetryExtension, HelloRetryRequest, KeyShareEntry, SessionId,
};
use crate::msgs::message::{Message, MessagePayload};
use crate::rand;
use crate::suites::{self, Tls13CipherSuite};

pub(super) type NextState = Box<dyn State<ServerConnectionData>>;
pub(super) type NextStateOrError = Result<NextState, Error>;
pub(super) type ServerContext<'a> = crate::common_state::Context<'a, ServerConnectionData>;

/// What a HelloRetryRequest asked for, so the second ClientHello can be
/// held to it.
struct Retry {
    suite: &'static Tls13CipherSuite,
    group: NamedGroup,
    cookie: Option<[u8; 32]>,
}

pub(super) struct ExpectClientHello {
    config: Arc<ServerConfig>,
    transcript: HandshakeHashOrBuffer,
    retry: Option<Retry>,
}

impl ExpectClientHello {
    pub(super) fn new(config: Arc<ServerConfig>) -> Self {
        Self {
            config,
            transcript: HandshakeHashOrBuffer::Buffer(HandshakeHashBuffer::new()),
            retry: None,
        }
    }

    /// Checks every ClientHello must pass, whether first or second.
    fn check_client_hello(
        &self,
        cx: &mut ServerContext<'_>,
        client_hello: &ClientHelloPayload,
    ) -> Result<(), Error> {
        match client_hello.versions_extension() {
            Some(versions) if versions.contains(&ProtocolVersion::TLSv1_3) => {
                cx.common.negotiated_version = Some(ProtocolVersion::TLSv1_3);
            }
            Some(_) => {
                return Err(cx.common.send_fatal_alert(
                    AlertDescription::ProtocolVersion,
                    PeerIncompatible::Tls13NotOffered,
                ));
            }
            None => {
                return Err(cx.common.send_fatal_alert(
                    AlertDescription::ProtocolVersion,
                    PeerIncompatible::SupportedVersionsExtensionRequired,
                ));
            }
        }

        if client_hello.compression_methods != [Compression::Null] {
            return Err(cx.common.send_fatal_alert(
                AlertDescription::IllegalParameter,
                PeerMisbehaved::OfferedIncorrectCompressions,
            ));
        }

        if client_hello.has_duplicate_extension() {
            return Err(cx.common.send_fatal_alert(
                AlertDescription::IllegalParameter,
                PeerMisbehaved::DuplicateClientHelloExtensions,
            ));
        }

        if client_hello.has_keyshare_extension_with_duplicates() {
            return Err(cx.common.send_fatal_alert(
                AlertDescription::IllegalParameter,
                PeerMisbehaved::OfferedDuplicateKeyShares,
            ));
        }

        Ok(())
    }

    fn handle_client_hello(
        self,
        cx: &mut ServerContext<'_>,
        m: &Message,
        client_hello: &ClientHelloPayload,
    ) -> NextStateOrError {
        self.check_client_hello(cx, client_hello)?;

        // Remember the server name the client asked for, if any.
        if let Some(sni) = client_hello.sni_extension() {
            if sni.has_duplicate_names_for_type() {
                return Err(cx.common.send_fatal_alert(
                    AlertDescription::IllegalParameter,
                    PeerMisbehaved::ServerNameMustContainOneHostName,
                ));
            }

            cx.data.sni = sni
                .single_hostname()
                .map(|name| name.to_owned());
        }

        let sig_schemes = require_extension(
            cx.common,
            client_hello.sigalgs_extension(),
            PeerIncompatible::SignatureAlgorithmsExtensionRequired,
        )?;
        let groups = require_extension(
            cx.common,
            client_hello.namedgroups_extension(),
            PeerIncompatible::NamedGroupsExtensionRequired,
        )?;
        let shares = require_extension(
            cx.common,
            client_hello.keyshare_extension(),
            PeerIncompatible::KeyShareExtensionRequired,
        )?;

        if shares
            .iter()
            .any(|share| !groups.contains(&share.group()))
        {
            return Err(cx.common.send_fatal_alert(
                AlertDescription::IllegalParameter,
                PeerMisbehaved::KeyShareForUnadvertisedGroup,
            ));
        }

        let suite = match &self.retry {
            // The second ClientHello must still offer the suite we chose.
            Some(retry) if !client_hello
                .cipher_suites
                .contains(&retry.suite.suite) =>
            {
                return Err(cx.common.send_fatal_alert(
                    AlertDescription::IllegalParameter,
                    PeerMisbehaved::RefusedToFollowHelloRetryRequest,
                ));
            }
            Some(retry) => retry.suite,
            None => suites::choose_ciphersuite_preferring_server(
                &client_hello.cipher_suites,
                &self.config.cipher_suites,
            )
            .ok_or_else(|| {
                cx.common.send_fatal_alert(
                    AlertDescription::HandshakeFailure,
                    PeerIncompatible::NoCipherSuitesInCommon,
                )
            })?,
        };

        let sig_schemes: Vec<SignatureScheme> = sig_schemes
            .iter()
            .copied()
            .filter(SignatureScheme::supported_in_tls13)
            .collect();
        let signer = self
            .config
            .cert
            .key
            .choose_scheme(&sig_schemes)
            .ok_or_else(|| {
                cx.common.send_fatal_alert(
                    AlertDescription::HandshakeFailure,
                    PeerIncompatible::NoSignatureSchemesInCommon,
                )
            })?;

        let (share, skxg) = match &self.retry {
            Some(retry) => {
                if let Some(expected) = &retry.cookie {
                    let echoed = client_hello
                        .cookie_extension()
                        .map(|got| bool::from(got.ct_eq(&expected[..])))
                        .unwrap_or(false);
                    if !echoed {
                        return Err(cx.common.send_fatal_alert(
                            AlertDescription::IllegalParameter,
                            PeerMisbehaved::IncorrectHelloRetryRequestCookie,
                        ));
                    }
                }

                // Exactly one share, for the group we asked for.
                match shares {
                    [share] if share.group() == retry.group => {}
                    _ => {
                        return Err(cx.common.send_fatal_alert(
                            AlertDescription::IllegalParameter,
                            PeerMisbehaved::RefusedToFollowHelloRetryRequest,
                        ));
                    }
                }

                let skxg = self
                    .config
                    .find_kx_group(retry.group)
                    .ok_or_else(|| {
                        cx.common.send_fatal_alert(
                            AlertDescription::IllegalParameter,
                            PeerMisbehaved::RefusedToFollowHelloRetryRequest,
                        )
                    })?;
                (&shares[0], skxg)
            }
            None => match choose_group(&self.config.kx_groups, groups, shares) {
                GroupChoice::Share(share, skxg) => (share, skxg),
                GroupChoice::Retry(skxg) => {
                    return self.emit_hello_retry_request(cx, m, client_hello, suite, skxg);
                }
                GroupChoice::NoneInCommon => {
                    return Err(cx.common.send_fatal_alert(
                        AlertDescription::HandshakeFailure,
                        PeerIncompatible::NoKxGroupsInCommon,
                    ));
                }
            },
        };

        debug!(
            "server hello, chosen ciphersuite: {} ( id={} )",
            suite.log_name(),
            u16::from(suite.suite)
        );
        cx.common.suite = Some(suite);

        let mut transcript = self
            .transcript
            .start_hash(suite.hash_provider);
        transcript.add_message(m);

        tls13::CompleteClientHelloHandling {
            config: self.config,
            transcript,
            suite,
            done_retry: self.retry.is_some(),
        }
        .handle_client_hello(cx, client_hello, share, skxg, signer)
    }

    fn emit_hello_retry_request(
        self,
        cx: &mut ServerContext<'_>,
        m: &Message,
        client_hello: &ClientHelloPayload,
        suite: &'static Tls13CipherSuite,
        skxg: &'static dyn SupportedKxGroup,
    ) -> NextStateOrError {
        let group = skxg.name();
        debug!("no key share for {:?}, sending HelloRetryRequest", group);

        let cookie = match self.config.send_hrr_cookie {
            true => Some(rand::random_array::<32>(self.config.provider.secure_random)?),
            false => None,
        };

        let mut extensions = vec![
            HelloRetryExtension::KeyShare(group),
            HelloRetryExtension::SupportedVersions(ProtocolVersion::TLSv1_3),
        ];
        if let Some(cookie) = &cookie {
            extensions.push(HelloRetryExtension::Cookie(PayloadU16::new(cookie.to_vec())));
        }

        let hrr = Message {
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::handshake(HandshakeMessagePayload {
                typ: HandshakeType::HelloRetryRequest,
                payload: HandshakePayload::HelloRetryRequest(HelloRetryRequest {
                    legacy_version: ProtocolVersion::TLSv1_2,
                    session_id: client_hello.session_id,
                    cipher_suite: suite.suite,
                    extensions,
                }),
            }),
        };

        let mut transcript = self
            .transcript
            .start_hash(suite.hash_provider);
        transcript.add_message(m);
        transcript.rollup_for_hrr();

        trace!("Requesting retry {:?}", hrr);
        transcript.add_message(&hrr);
        cx.common.send_msg(hrr, false);
        emit_fake_ccs(&client_hello.session_id, cx.common);

        Ok(Box::new(Self {
            config: self.config,
            transcript: HandshakeHashOrBuffer::Hash(transcript),
            retry: Some(Retry {
                suite,
                group,
                cookie,
            }),
        }))
    }
}

impl State<ServerConnectionData> for ExpectClientHello {
    fn handle(self: Box<Self>, cx: &mut ServerContext<'_>, m: Message) -> NextStateOrError {
        let client_hello =
            require_handshake_msg!(m, HandshakeType::ClientHello, HandshakePayload::ClientHello)?;
        trace!("we got a clienthello {:?}", client_hello);

        // A second ClientHello must not straddle the record that ended
        // the first.
        cx.common.check_aligned_handshake()?;

        let st = *self;
        st.handle_client_hello(cx, &m, client_hello)
    }
}

fn require_extension<'a, T: ?Sized>(
    common: &mut CommonState,
    ext: Option<&'a T>,
    missing: PeerIncompatible,
) -> Result<&'a T, Error> {
    ext.ok_or_else(|| common.send_fatal_alert(AlertDescription::MissingExtension, missing))
}

enum GroupChoice<'a> {
    /// The client already sent a share for this group.
    Share(&'a KeyShareEntry, &'static dyn SupportedKxGroup),
    /// The client supports this group, but sent no share for it.
    Retry(&'static dyn SupportedKxGroup),
    NoneInCommon,
}

/// Pick a group in server preference order.
///
/// The first of our groups the client sent a key share for wins, so no
/// retry is needed whenever that is possible.  Otherwise we ask for the
/// first of our groups the client listed in `supported_groups`.
fn choose_group<'a>(
    ours: &[&'static dyn SupportedKxGroup],
    client_groups: &[NamedGroup],
    client_shares: &'a [KeyShareEntry],
) -> GroupChoice<'a> {
    for skxg in ours {
        if let Some(share) = client_shares
            .iter()
            .find(|share| share.group() == skxg.name())
        {
            return GroupChoice::Share(share, *skxg);
        }
    }

    match ours
        .iter()
        .find(|skxg| client_groups.contains(&skxg.name()))
    {
        Some(skxg) => GroupChoice::Retry(*skxg),
        None => GroupChoice::NoneInCommon,
    }
}

/// In compatibility mode, a dummy ChangeCipherSpec follows our first
/// handshake message.  The client opts in by sending a session id.
pub(super) fn emit_fake_ccs(session_id: &SessionId, common: &mut CommonState) {
    if session_id.is_empty() {
        return;
    }
    common.send_msg(Message::build_compat_ccs(), false);
}
