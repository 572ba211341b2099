use std::sync::Arc;

use pki_types::ServerName;

use super::client_conn::ClientConnectionData;
use super::{tls13, ClientConfig};
use crate::check::inappropriate_handshake_message;
use crate::common_state::State;
use crate::crypto::ActiveKeyExchange;
use crate::enums::{AlertDescription, CipherSuite, ContentType, HandshakeType, ProtocolVersion};
use crate::error::{ConfigError, Error, PeerIncompatible, PeerMisbehaved};
use crate::hash_hs::{HandshakeHashBuffer, HandshakeHashOrBuffer};
#[cfg(feature = "logging")]
use crate::log::{debug, trace};
use crate::msgs::enums::{Compression, ExtensionType};
use crate::msgs::handshake::{
    ClientExtension, ClientHelloPayload, HandshakeMessagePayload, HandshakePayload,
    HelloRetryRequest, KeyShareEntry, Random, SessionId,
};
use crate::msgs::message::{Message, MessagePayload};
use crate::suites::Tls13CipherSuite;

pub(super) type NextState = Box<dyn State<ClientConnectionData>>;
pub(super) type NextStateOrError = Result<NextState, Error>;
pub(super) type ClientContext<'a> = crate::common_state::Context<'a, ClientConnectionData>;

pub(super) fn start_handshake(
    server_name: ServerName<'static>,
    config: Arc<ClientConfig>,
    cx: &mut ClientContext<'_>,
) -> NextStateOrError {
    let key_shares = config
        .key_share_groups
        .iter()
        .map(|group| {
            config
                .find_kx_group(*group)
                .ok_or(Error::InvalidConfig(ConfigError::UnsupportedGroup(*group)))?
                .start()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let secure_random = config.provider.secure_random;

    // https://tools.ietf.org/html/rfc8446#appendix-D.4
    let session_id = match config.compatibility_mode {
        true => SessionId::random(secure_random)?,
        false => SessionId::empty(),
    };

    Ok(emit_client_hello_for_retry(
        HandshakeHashOrBuffer::Buffer(HandshakeHashBuffer::new()),
        None,
        key_shares,
        None,
        ClientHelloInput {
            random: Random::new(secure_random)?,
            sent_tls13_fake_ccs: false,
            session_id,
            server_name,
            config,
        },
        cx,
    ))
}

pub(super) struct ClientHelloInput {
    pub(super) config: Arc<ClientConfig>,
    pub(super) random: Random,
    pub(super) sent_tls13_fake_ccs: bool,
    pub(super) session_id: SessionId,
    pub(super) server_name: ServerName<'static>,
}

impl ClientHelloInput {
    pub(super) fn sent_sni(&self) -> bool {
        self.config.enable_sni && matches!(self.server_name, ServerName::DnsName(_))
    }
}

struct ExpectServerHello {
    input: ClientHelloInput,
    transcript: HandshakeHashOrBuffer,
    offered_key_shares: Vec<Box<dyn ActiveKeyExchange>>,
    suite: Option<&'static Tls13CipherSuite>,
}

struct ExpectServerHelloOrHelloRetryRequest {
    next: ExpectServerHello,
}

fn emit_client_hello_for_retry(
    mut transcript: HandshakeHashOrBuffer,
    retryreq: Option<&HelloRetryRequest>,
    key_shares: Vec<Box<dyn ActiveKeyExchange>>,
    suite: Option<&'static Tls13CipherSuite>,
    mut input: ClientHelloInput,
    cx: &mut ClientContext<'_>,
) -> NextState {
    let config = &input.config;

    let mut exts = vec![
        ClientExtension::SupportedVersions(vec![ProtocolVersion::TLSv1_3]),
        ClientExtension::NamedGroups(config.kx_groups()),
        ClientExtension::SignatureAlgorithms(config.signature_schemes.clone()),
    ];

    if let (ServerName::DnsName(dns_name), true) = (&input.server_name, config.enable_sni) {
        exts.push(ClientExtension::make_sni(dns_name));
    }

    let entries = key_shares
        .iter()
        .map(|kx| {
            debug!("NamedGroup: {:?} ( {:x} )", kx.group(), u16::from(kx.group()));
            KeyShareEntry::new(kx.group(), kx.pub_key())
        })
        .collect();
    exts.push(ClientExtension::KeyShare(entries));

    if let Some(cookie) = retryreq.and_then(HelloRetryRequest::cookie) {
        exts.push(ClientExtension::Cookie(cookie.clone()));
    }

    let mut cipher_suites: Vec<_> = config
        .cipher_suites
        .iter()
        .map(|cs| cs.suite)
        .collect();
    // We don't do renegotiation at all, in fact.
    cipher_suites.push(CipherSuite::TLS_EMPTY_RENEGOTIATION_INFO_SCSV);

    let chp = HandshakeMessagePayload {
        typ: HandshakeType::ClientHello,
        payload: HandshakePayload::ClientHello(ClientHelloPayload {
            client_version: ProtocolVersion::TLSv1_2,
            random: input.random,
            session_id: input.session_id,
            cipher_suites,
            compression_methods: vec![Compression::Null],
            extensions: exts,
        }),
    };

    let ch = Message {
        // "This value MUST be set to 0x0303 for all records generated
        //  by a TLS 1.3 implementation other than an initial ClientHello
        //  (i.e., one not generated after a HelloRetryRequest)"
        version: match retryreq {
            Some(_) => ProtocolVersion::TLSv1_2,
            None => ProtocolVersion::TLSv1_0,
        },
        payload: MessagePayload::handshake(chp),
    };

    if retryreq.is_some() && config.compatibility_mode {
        // send dummy CCS to fool middleboxes prior
        // to second client hello
        tls13::emit_fake_ccs(&mut input.sent_tls13_fake_ccs, cx.common);
    }

    trace!("Sending ClientHello {:#?}", ch);

    transcript.add_message(&ch);
    cx.common.send_msg(ch, false);

    let next = ExpectServerHello {
        input,
        transcript,
        offered_key_shares: key_shares,
        suite,
    };

    match retryreq {
        Some(_) => Box::new(next),
        None => Box::new(ExpectServerHelloOrHelloRetryRequest { next }),
    }
}

impl State<ClientConnectionData> for ExpectServerHello {
    fn handle(self: Box<Self>, cx: &mut ClientContext<'_>, m: Message) -> NextStateOrError {
        if m.is_handshake_type(HandshakeType::HelloRetryRequest)
            && cx.data.hello_retry_requests > 0
        {
            return Err(cx.common.send_fatal_alert(
                AlertDescription::UnexpectedMessage,
                PeerMisbehaved::IllegalSecondHelloRetryRequest,
            ));
        }

        let server_hello =
            require_handshake_msg!(m, HandshakeType::ServerHello, HandshakePayload::ServerHello)?;
        trace!("We got ServerHello {:#?}", server_hello);

        let st = *self;
        let config = &st.input.config;

        match server_hello.supported_versions() {
            Some(ProtocolVersion::TLSv1_3) => {}
            Some(_) => {
                return Err(cx.common.send_fatal_alert(
                    AlertDescription::IllegalParameter,
                    PeerMisbehaved::SelectedTls12UsingTls13VersionExtension,
                ));
            }
            None => {
                return Err(cx.common.send_fatal_alert(
                    AlertDescription::ProtocolVersion,
                    PeerIncompatible::ServerDoesNotSupportTls13,
                ));
            }
        }

        if server_hello.compression_method != Compression::Null {
            return Err(cx.common.send_fatal_alert(
                AlertDescription::IllegalParameter,
                PeerMisbehaved::SelectedUnofferedCompression,
            ));
        }

        if server_hello.has_duplicate_extension() {
            return Err(cx.common.send_fatal_alert(
                AlertDescription::DecodeError,
                PeerMisbehaved::DuplicateServerHelloExtensions,
            ));
        }

        let allowed = [ExtensionType::KeyShare, ExtensionType::SupportedVersions];
        if server_hello
            .extensions
            .iter()
            .any(|ext| !allowed.contains(&ext.ext_type()))
        {
            return Err(cx.common.send_fatal_alert(
                AlertDescription::UnsupportedExtension,
                PeerMisbehaved::UnsolicitedServerHelloExtension,
            ));
        }

        if server_hello.session_id != st.input.session_id {
            return Err(cx.common.send_fatal_alert(
                AlertDescription::IllegalParameter,
                PeerMisbehaved::WrongSessionIdEcho,
            ));
        }

        cx.common.negotiated_version = Some(ProtocolVersion::TLSv1_3);

        let suite = config
            .find_cipher_suite(server_hello.cipher_suite)
            .ok_or_else(|| {
                cx.common.send_fatal_alert(
                    AlertDescription::IllegalParameter,
                    PeerMisbehaved::SelectedUnofferedCipherSuite,
                )
            })?;

        match st.suite {
            Some(prev_suite) if prev_suite != suite => {
                return Err(cx.common.send_fatal_alert(
                    AlertDescription::IllegalParameter,
                    PeerMisbehaved::SelectedDifferentCipherSuiteAfterRetry,
                ));
            }
            _ => {
                debug!(
                    "( {:04x} ) - {}",
                    u16::from(suite.suite),
                    suite.log_name()
                );
                cx.common.suite = Some(suite);
            }
        }

        // Start our handshake hash, and input the server-hello.
        let mut transcript = st.transcript.start_hash(suite.hash_provider);
        transcript.add_message(&m);

        tls13::handle_server_hello(
            st.input,
            cx,
            server_hello,
            suite,
            transcript,
            st.offered_key_shares,
        )
    }
}

impl ExpectServerHelloOrHelloRetryRequest {
    fn into_expect_server_hello(self) -> NextState {
        Box::new(self.next)
    }

    fn handle_hello_retry_request(
        self,
        cx: &mut ClientContext<'_>,
        m: Message,
    ) -> NextStateOrError {
        let hrr = require_handshake_msg!(
            m,
            HandshakeType::HelloRetryRequest,
            HandshakePayload::HelloRetryRequest
        )?;
        debug!("received HelloRetryRequest message");
        trace!("Got HRR {:?}", hrr);

        cx.common.check_aligned_handshake()?;

        let cookie = hrr.cookie();
        let req_group = hrr.requested_key_share_group();

        let offered_groups: Vec<_> = self
            .next
            .offered_key_shares
            .iter()
            .map(|kx| kx.group())
            .collect();

        // A retry request is illegal if it asks for a group we already
        // sent a share for.
        if let Some(group) = req_group {
            if offered_groups.contains(&group) {
                return Err(cx.common.send_fatal_alert(
                    AlertDescription::IllegalParameter,
                    PeerMisbehaved::IllegalHelloRetryRequestWithOfferedGroup,
                ));
            }
        }

        // Or has an empty cookie.
        if let Some(cookie) = cookie {
            if cookie.0.is_empty() {
                return Err(cx.common.send_fatal_alert(
                    AlertDescription::DecodeError,
                    PeerMisbehaved::IllegalHelloRetryRequestWithEmptyCookie,
                ));
            }
        }

        // Or has something unrecognised
        if hrr.has_unknown_extension() {
            return Err(cx.common.send_fatal_alert(
                AlertDescription::UnsupportedExtension,
                PeerIncompatible::ServerSentHelloRetryRequestWithUnknownExtension,
            ));
        }

        // Or has the same extensions more than once
        if hrr.has_duplicate_extension() {
            return Err(cx.common.send_fatal_alert(
                AlertDescription::IllegalParameter,
                PeerMisbehaved::DuplicateHelloRetryRequestExtensions,
            ));
        }

        // Or asks us to change nothing.
        if cookie.is_none() && req_group.is_none() {
            return Err(cx.common.send_fatal_alert(
                AlertDescription::IllegalParameter,
                PeerMisbehaved::IllegalHelloRetryRequestWithNoChanges,
            ));
        }

        // Or does not echo the session_id from our ClientHello:
        //
        // > A client which receives a legacy_session_id_echo field that does not
        // > match what it sent in the ClientHello MUST abort the handshake with an
        // > "illegal_parameter" alert.
        // <https://www.rfc-editor.org/rfc/rfc8446#section-4.1.3>
        if hrr.session_id != self.next.input.session_id {
            return Err(cx.common.send_fatal_alert(
                AlertDescription::IllegalParameter,
                PeerMisbehaved::IllegalHelloRetryRequestWithWrongSessionId,
            ));
        }

        // Or asks us to talk a protocol we didn't offer, or doesn't support HRR at all.
        match hrr.supported_versions() {
            Some(ProtocolVersion::TLSv1_3) => {
                cx.common.negotiated_version = Some(ProtocolVersion::TLSv1_3);
            }
            _ => {
                return Err(cx.common.send_fatal_alert(
                    AlertDescription::IllegalParameter,
                    PeerMisbehaved::IllegalHelloRetryRequestWithUnsupportedVersion,
                ));
            }
        }

        // Or asks us to use a ciphersuite we didn't offer.
        let config = &self.next.input.config;
        let cs = match config.find_cipher_suite(hrr.cipher_suite) {
            Some(cs) => cs,
            None => {
                return Err(cx.common.send_fatal_alert(
                    AlertDescription::IllegalParameter,
                    PeerMisbehaved::IllegalHelloRetryRequestWithUnofferedCipherSuite,
                ));
            }
        };

        // Or names a group we never advertised.
        let key_shares = match req_group {
            Some(group) => {
                debug!("selected_group ( {} )", u16::from(group));
                let skxg = config.find_kx_group(group).ok_or_else(|| {
                    cx.common.send_fatal_alert(
                        AlertDescription::IllegalParameter,
                        PeerMisbehaved::IllegalHelloRetryRequestWithUnofferedNamedGroup,
                    )
                })?;
                vec![skxg.start()?]
            }
            None => self.next.offered_key_shares,
        };

        // HRR selects the ciphersuite.
        cx.common.suite = Some(cs);
        cx.data.hello_retry_requests += 1;

        // The first ClientHello is replaced in the transcript by its hash.
        let mut transcript = self.next.transcript.start_hash(cs.hash_provider);
        transcript.rollup_for_hrr();
        transcript.add_message(&m);

        Ok(emit_client_hello_for_retry(
            HandshakeHashOrBuffer::Hash(transcript),
            Some(hrr),
            key_shares,
            Some(cs),
            self.next.input,
            cx,
        ))
    }
}

impl State<ClientConnectionData> for ExpectServerHelloOrHelloRetryRequest {
    fn handle(self: Box<Self>, cx: &mut ClientContext<'_>, m: Message) -> NextStateOrError {
        match m.payload {
            MessagePayload::Handshake {
                parsed:
                    HandshakeMessagePayload {
                        payload: HandshakePayload::ServerHello(..),
                        ..
                    },
                ..
            } => self
                .into_expect_server_hello()
                .handle(cx, m),
            MessagePayload::Handshake {
                parsed:
                    HandshakeMessagePayload {
                        payload: HandshakePayload::HelloRetryRequest(..),
                        ..
                    },
                ..
            } => self.handle_hello_retry_request(cx, m),
            payload => Err(inappropriate_handshake_message(
                &payload,
                &[ContentType::Handshake],
                &[HandshakeType::ServerHello, HandshakeType::HelloRetryRequest],
            )),
        }
    }
}
