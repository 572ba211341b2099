use std::mem;
use std::sync::Arc;

use pki_types::{CertificateDer, ServerName, UnixTime};
use subtle::ConstantTimeEq;

use super::client_conn::ClientConnectionData;
use super::hs::{ClientContext, ClientHelloInput, NextStateOrError};
use super::ClientConfig;
use crate::check::inappropriate_handshake_message;
use crate::common_state::{CommonState, HandshakeKind, Side, State};
use crate::crypto::ActiveKeyExchange;
use crate::enums::{AlertDescription, ContentType, HandshakeType, ProtocolVersion};
use crate::error::{Error, InvalidMessage, PeerMisbehaved};
use crate::hash_hs::HandshakeHash;
#[cfg(feature = "logging")]
use crate::log::{debug, trace};
use crate::msgs::base::Payload;
use crate::msgs::handshake::{
    HandshakeMessagePayload, HandshakePayload, Random, ServerExtension, ServerHelloPayload,
};
use crate::msgs::message::{Message, MessagePayload};
use crate::suites::Tls13CipherSuite;
use crate::tls13::construct_server_verify_message;
use crate::tls13::key_schedule::{
    KeyScheduleHandshake, KeySchedulePreHandshake, KeyScheduleTraffic,
};
use crate::verify;

pub(super) fn handle_server_hello(
    input: ClientHelloInput,
    cx: &mut ClientContext<'_>,
    server_hello: &ServerHelloPayload,
    suite: &'static Tls13CipherSuite,
    transcript: HandshakeHash,
    offered_key_shares: Vec<Box<dyn ActiveKeyExchange>>,
) -> NextStateOrError {
    let their_key_share = server_hello
        .key_share()
        .ok_or_else(|| {
            cx.common.send_fatal_alert(
                AlertDescription::MissingExtension,
                PeerMisbehaved::MissingKeyShare,
            )
        })?;

    let our_key_share = offered_key_shares
        .into_iter()
        .find(|kx| kx.group() == their_key_share.group())
        .ok_or_else(|| {
            cx.common.send_fatal_alert(
                AlertDescription::IllegalParameter,
                PeerMisbehaved::WrongGroupForKeyShare,
            )
        })?;

    let group = our_key_share.group();
    let shared_secret = our_key_share
        .complete(&their_key_share.payload.0)
        .map_err(|err| {
            cx.common
                .send_fatal_alert(AlertDescription::IllegalParameter, err)
        })?;
    cx.common.kx_group = Some(group);

    // If we change keying when a subsequent handshake message is being joined,
    // the two halves will have different record layer protections.  Disallow this.
    cx.common.check_aligned_handshake()?;

    let key_schedule = KeySchedulePreHandshake::new(Side::Client, suite)
        .into_handshake(shared_secret)
        .derive_client_handshake_secrets(
            transcript.get_current_hash(),
            &*input.config.key_log,
            &input.random.0,
            cx.common,
        )?;

    Ok(Box::new(ExpectEncryptedExtensions {
        sent_sni: input.sent_sni(),
        config: input.config,
        server_name: input.server_name,
        randoms: input.random,
        sent_tls13_fake_ccs: input.sent_tls13_fake_ccs,
        transcript,
        key_schedule,
    }))
}

struct ExpectEncryptedExtensions {
    config: Arc<ClientConfig>,
    server_name: ServerName<'static>,
    randoms: Random,
    sent_sni: bool,
    sent_tls13_fake_ccs: bool,
    transcript: HandshakeHash,
    key_schedule: KeyScheduleHandshake,
}

impl ExpectEncryptedExtensions {
    fn validate(&self, exts: &[ServerExtension]) -> Result<(), PeerMisbehaved> {
        for ext in exts {
            match ext {
                // Only ever sent in the clear.
                ServerExtension::KeyShare(_) | ServerExtension::SupportedVersions(_) => {
                    return Err(PeerMisbehaved::DisallowedEncryptedExtension);
                }
                ServerExtension::ServerNameAck if !self.sent_sni => {
                    return Err(PeerMisbehaved::UnsolicitedEncryptedExtension);
                }
                ServerExtension::ServerNameAck | ServerExtension::NamedGroups(_) => {}
                ServerExtension::Unknown(_) => {
                    return Err(PeerMisbehaved::UnsolicitedEncryptedExtension);
                }
            }
        }
        Ok(())
    }
}

impl State<ClientConnectionData> for ExpectEncryptedExtensions {
    fn handle(mut self: Box<Self>, cx: &mut ClientContext<'_>, m: Message) -> NextStateOrError {
        let exts = require_handshake_msg!(
            m,
            HandshakeType::EncryptedExtensions,
            HandshakePayload::EncryptedExtensions
        )?;
        debug!("TLS1.3 encrypted extensions: {:?}", exts);

        let mut seen = Vec::with_capacity(exts.len());
        for ext in exts {
            let typ = u16::from(ext.ext_type());
            if seen.contains(&typ) {
                return Err(cx.common.send_fatal_alert(
                    AlertDescription::DecodeError,
                    PeerMisbehaved::DuplicateEncryptedExtensions,
                ));
            }
            seen.push(typ);
        }

        self.validate(exts)
            .map_err(|err| {
                cx.common
                    .send_fatal_alert(AlertDescription::UnsupportedExtension, err)
            })?;

        self.transcript.add_message(&m);

        Ok(Box::new(ExpectCertificate {
            config: self.config,
            server_name: self.server_name,
            randoms: self.randoms,
            sent_tls13_fake_ccs: self.sent_tls13_fake_ccs,
            transcript: self.transcript,
            key_schedule: self.key_schedule,
        }))
    }
}

struct ExpectCertificate {
    config: Arc<ClientConfig>,
    server_name: ServerName<'static>,
    randoms: Random,
    sent_tls13_fake_ccs: bool,
    transcript: HandshakeHash,
    key_schedule: KeyScheduleHandshake,
}

impl State<ClientConnectionData> for ExpectCertificate {
    fn handle(mut self: Box<Self>, cx: &mut ClientContext<'_>, m: Message) -> NextStateOrError {
        self.transcript.add_message(&m);
        let cert_chain = require_handshake_msg_move!(
            m,
            HandshakeType::Certificate,
            HandshakePayload::CertificateTls13
        )?;

        // This is only non-empty for client auth.
        if !cert_chain.context.0.is_empty() {
            return Err(cx.common.send_fatal_alert(
                AlertDescription::DecodeError,
                InvalidMessage::InvalidCertRequest,
            ));
        }

        if cert_chain.any_entry_has_extension() {
            return Err(cx.common.send_fatal_alert(
                AlertDescription::UnsupportedExtension,
                PeerMisbehaved::UnsolicitedCertExtension,
            ));
        }

        let server_cert = cert_chain.into_certificate_chain();
        if server_cert.is_empty() {
            return Err(cx.common.send_fatal_alert(
                AlertDescription::DecodeError,
                Error::NoCertificatesPresented,
            ));
        }

        Ok(Box::new(ExpectCertificateVerify {
            config: self.config,
            server_name: self.server_name,
            randoms: self.randoms,
            sent_tls13_fake_ccs: self.sent_tls13_fake_ccs,
            transcript: self.transcript,
            key_schedule: self.key_schedule,
            server_cert,
        }))
    }
}

// --- TLS1.3 CertificateVerify ---
struct ExpectCertificateVerify {
    config: Arc<ClientConfig>,
    server_name: ServerName<'static>,
    randoms: Random,
    sent_tls13_fake_ccs: bool,
    transcript: HandshakeHash,
    key_schedule: KeyScheduleHandshake,
    server_cert: Vec<CertificateDer<'static>>,
}

impl State<ClientConnectionData> for ExpectCertificateVerify {
    fn handle(mut self: Box<Self>, cx: &mut ClientContext<'_>, m: Message) -> NextStateOrError {
        let cert_verify = require_handshake_msg!(
            m,
            HandshakeType::CertificateVerify,
            HandshakePayload::CertificateVerify
        )?;

        trace!("Server cert is {:?}", self.server_cert);
        debug!(
            "received signature algorithm: 0x{:04x}",
            u16::from(cert_verify.scheme)
        );

        if !self
            .config
            .signature_schemes
            .contains(&cert_verify.scheme)
        {
            return Err(cx.common.send_fatal_alert(
                AlertDescription::IllegalParameter,
                PeerMisbehaved::SignedHandshakeWithUnadvertisedSigScheme,
            ));
        }

        // 1. Verify the certificate chain.
        let (end_entity, intermediates) = self
            .server_cert
            .split_first()
            .ok_or(Error::NoCertificatesPresented)?;

        let now = UnixTime::now();
        let cert_verified = self
            .config
            .verifier
            .verify_server_cert(end_entity, intermediates, &self.server_name, now)
            .map_err(|err| cx.common.send_cert_verify_error_alert(err))?;

        // 2. Verify their signature on the handshake.
        let handshake_hash = self.transcript.get_current_hash();
        let sig_verified = self
            .config
            .verifier
            .verify_tls13_signature(
                construct_server_verify_message(&handshake_hash).as_ref(),
                end_entity,
                cert_verify,
            )
            .map_err(|err| cx.common.send_cert_verify_error_alert(err))?;

        cx.common.signature_scheme = Some(cert_verify.scheme);
        cx.common.peer_certificates = Some(mem::take(&mut self.server_cert));
        self.transcript.add_message(&m);

        Ok(Box::new(ExpectFinished {
            config: self.config,
            randoms: self.randoms,
            sent_tls13_fake_ccs: self.sent_tls13_fake_ccs,
            transcript: self.transcript,
            key_schedule: self.key_schedule,
            cert_verified,
            sig_verified,
        }))
    }
}

pub(super) fn emit_fake_ccs(sent_tls13_fake_ccs: &mut bool, common: &mut CommonState) {
    if mem::replace(sent_tls13_fake_ccs, true) {
        return;
    }

    common.send_msg(Message::build_compat_ccs(), false);
}

fn emit_finished_tls13(
    transcript: &mut HandshakeHash,
    verify_data: &[u8],
    common: &mut CommonState,
) {
    let m = Message {
        version: ProtocolVersion::TLSv1_3,
        payload: MessagePayload::handshake(HandshakeMessagePayload {
            typ: HandshakeType::Finished,
            payload: HandshakePayload::Finished(Payload::new(verify_data)),
        }),
    };

    transcript.add_message(&m);
    common.send_msg(m, true);
}

struct ExpectFinished {
    config: Arc<ClientConfig>,
    randoms: Random,
    sent_tls13_fake_ccs: bool,
    transcript: HandshakeHash,
    key_schedule: KeyScheduleHandshake,
    cert_verified: verify::ServerCertVerified,
    sig_verified: verify::HandshakeSignatureValid,
}

impl State<ClientConnectionData> for ExpectFinished {
    fn handle(self: Box<Self>, cx: &mut ClientContext<'_>, m: Message) -> NextStateOrError {
        let mut st = *self;
        let finished =
            require_handshake_msg!(m, HandshakeType::Finished, HandshakePayload::Finished)?;

        let handshake_hash = st.transcript.get_current_hash();
        let expect_verify_data = st
            .key_schedule
            .sign_server_finish(&handshake_hash)?;

        let fin = match bool::from(
            expect_verify_data
                .as_ref()
                .ct_eq(finished.bytes()),
        ) {
            true => verify::FinishedMessageVerified::assertion(),
            false => {
                return Err(cx.common.send_fatal_alert(
                    AlertDescription::DecryptError,
                    PeerMisbehaved::IncorrectFinished,
                ));
            }
        };

        st.transcript.add_message(&m);

        if st.config.compatibility_mode {
            emit_fake_ccs(&mut st.sent_tls13_fake_ccs, cx.common);
        }

        // Without client authentication, the transcript our Finished covers is
        // the one the application secrets are derived from.
        let (key_schedule_pre_finished, verify_data) = st
            .key_schedule
            .into_pre_finished_client_traffic(
                st.transcript.get_current_hash(),
                st.transcript.get_current_hash(),
                &*st.config.key_log,
                &st.randoms.0,
            )?;

        emit_finished_tls13(&mut st.transcript, verify_data.as_ref(), cx.common);

        // We sent our Finished under the handshake keys; this
        // must not straddle a record boundary with anything else.
        cx.common.check_aligned_handshake()?;
        let key_schedule_traffic = key_schedule_pre_finished.into_traffic(cx.common)?;

        cx.common.handshake_kind = Some(match cx.data.hello_retry_requests {
            0 => HandshakeKind::Full,
            _ => HandshakeKind::FullWithHelloRetryRequest,
        });
        cx.common.start_traffic();
        debug!("handshake complete");

        Ok(Box::new(ExpectTraffic {
            key_schedule: key_schedule_traffic,
            _cert_verified: st.cert_verified,
            _sig_verified: st.sig_verified,
            _fin_verified: fin,
        }))
    }
}

// -- Traffic transit state (TLS1.3) --
// In this state we can be sent tickets and key updates; we accept
// application data, ignore tickets, and refuse everything else.
struct ExpectTraffic {
    key_schedule: KeyScheduleTraffic,
    _cert_verified: verify::ServerCertVerified,
    _sig_verified: verify::HandshakeSignatureValid,
    _fin_verified: verify::FinishedMessageVerified,
}

impl State<ClientConnectionData> for ExpectTraffic {
    fn handle(self: Box<Self>, cx: &mut ClientContext<'_>, m: Message) -> NextStateOrError {
        match m.payload {
            MessagePayload::ApplicationData(payload) => cx
                .common
                .take_received_plaintext(payload),
            MessagePayload::Handshake {
                parsed:
                    HandshakeMessagePayload {
                        payload: HandshakePayload::NewSessionTicketTls13(_),
                        ..
                    },
                ..
            } => {
                debug!("Ignoring NewSessionTicket");
            }
            payload => {
                return Err(inappropriate_handshake_message(
                    &payload,
                    &[ContentType::ApplicationData, ContentType::Handshake],
                    &[HandshakeType::NewSessionTicket],
                ));
            }
        }

        Ok(self)
    }

    fn export_keying_material(
        &self,
        output: &mut [u8],
        label: &[u8],
        context: Option<&[u8]>,
    ) -> Result<(), Error> {
        self.key_schedule
            .export_keying_material(output, label, context)
    }
}
