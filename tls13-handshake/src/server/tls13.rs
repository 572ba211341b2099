use std::sync::Arc;

use subtle::ConstantTimeEq;

use super::hs::{self, NextStateOrError, ServerContext};
use super::server_conn::ServerConnectionData;
use super::ServerConfig;
use crate::check::inappropriate_message;
use crate::common_state::{CommonState, HandshakeKind, Side, State};
use crate::crypto::{Signer, SupportedKxGroup};
use crate::enums::{AlertDescription, ContentType, HandshakeType, ProtocolVersion};
use crate::error::{Error, PeerMisbehaved};
use crate::hash_hs::HandshakeHash;
#[cfg(feature = "logging")]
use crate::log::{debug, trace};
use crate::msgs::base::Payload;
use crate::msgs::enums::Compression;
use crate::msgs::handshake::{
    CertificatePayloadTls13, ClientHelloPayload, DigitallySignedStruct, HandshakeMessagePayload,
    HandshakePayload, KeyShareEntry, Random, ServerExtension, ServerHelloPayload,
};
use crate::msgs::message::{Message, MessagePayload};
use crate::suites::Tls13CipherSuite;
use crate::tls13::construct_server_verify_message;
use crate::tls13::key_schedule::{
    KeyScheduleHandshake, KeySchedulePreHandshake, KeyScheduleTraffic,
    KeyScheduleTrafficWithClientFinishedPending,
};
use crate::verify;

/// A ClientHello we are going to answer with a ServerHello.
pub(super) struct CompleteClientHelloHandling {
    pub(super) config: Arc<ServerConfig>,
    pub(super) transcript: HandshakeHash,
    pub(super) suite: &'static Tls13CipherSuite,
    pub(super) done_retry: bool,
}

impl CompleteClientHelloHandling {
    pub(super) fn handle_client_hello(
        mut self,
        cx: &mut ServerContext<'_>,
        client_hello: &ClientHelloPayload,
        share: &KeyShareEntry,
        skxg: &'static dyn SupportedKxGroup,
        signer: Box<dyn Signer>,
    ) -> NextStateOrError {
        let client_random = client_hello.random;

        let key_schedule = emit_server_hello(
            &mut self.transcript,
            self.suite,
            cx,
            client_hello,
            share,
            skxg,
            &self.config,
        )?;
        if !self.done_retry {
            hs::emit_fake_ccs(&client_hello.session_id, cx.common);
        }

        emit_encrypted_extensions(&mut self.transcript, cx);
        emit_certificate_tls13(&mut self.transcript, cx.common, &self.config);
        emit_certificate_verify_tls13(&mut self.transcript, cx.common, &*signer)?;

        cx.common.check_aligned_handshake()?;
        let key_schedule = emit_finished_tls13(
            &mut self.transcript,
            &client_random,
            cx.common,
            key_schedule,
            &self.config,
        )?;

        Ok(Box::new(ExpectFinished {
            transcript: self.transcript,
            key_schedule,
            done_retry: self.done_retry,
        }))
    }
}

fn emit_server_hello(
    transcript: &mut HandshakeHash,
    suite: &'static Tls13CipherSuite,
    cx: &mut ServerContext<'_>,
    client_hello: &ClientHelloPayload,
    share: &KeyShareEntry,
    skxg: &'static dyn SupportedKxGroup,
    config: &ServerConfig,
) -> Result<KeyScheduleHandshake, Error> {
    // Prepare key exchange; the caller already found the matching SupportedKxGroup
    debug_assert_eq!(skxg.name(), share.group());
    let kx = skxg.start()?;
    let pub_key = kx.pub_key().to_vec();
    let shared_secret = kx
        .complete(&share.payload.0)
        .map_err(|err| {
            cx.common
                .send_fatal_alert(AlertDescription::IllegalParameter, err)
        })?;
    cx.common.kx_group = Some(skxg.name());

    let extensions = vec![
        ServerExtension::KeyShare(KeyShareEntry::new(skxg.name(), pub_key)),
        ServerExtension::SupportedVersions(ProtocolVersion::TLSv1_3),
    ];

    let sh = Message {
        version: ProtocolVersion::TLSv1_2,
        payload: MessagePayload::handshake(HandshakeMessagePayload {
            typ: HandshakeType::ServerHello,
            payload: HandshakePayload::ServerHello(ServerHelloPayload {
                legacy_version: ProtocolVersion::TLSv1_2,
                random: Random::new(config.provider.secure_random)?,
                session_id: client_hello.session_id,
                cipher_suite: suite.suite,
                compression_method: Compression::Null,
                extensions,
            }),
        }),
    };

    cx.common.check_aligned_handshake()?;

    trace!("sending server hello {:?}", sh);
    transcript.add_message(&sh);
    cx.common.send_msg(sh, false);

    // Start key schedule
    KeySchedulePreHandshake::new(Side::Server, suite)
        .into_handshake(shared_secret)
        .derive_server_handshake_secrets(
            transcript.get_current_hash(),
            &*config.key_log,
            &client_hello.random.0,
            cx.common,
        )
}

fn emit_encrypted_extensions(transcript: &mut HandshakeHash, cx: &mut ServerContext<'_>) {
    let mut extensions = Vec::new();
    if cx.data.sni.is_some() {
        extensions.push(ServerExtension::ServerNameAck);
    }

    let ee = Message {
        version: ProtocolVersion::TLSv1_3,
        payload: MessagePayload::handshake(HandshakeMessagePayload {
            typ: HandshakeType::EncryptedExtensions,
            payload: HandshakePayload::EncryptedExtensions(extensions),
        }),
    };

    trace!("sending encrypted extensions {:?}", ee);
    transcript.add_message(&ee);
    cx.common.send_msg(ee, true);
}

fn emit_certificate_tls13(
    transcript: &mut HandshakeHash,
    common: &mut CommonState,
    config: &ServerConfig,
) {
    let cert = Message {
        version: ProtocolVersion::TLSv1_3,
        payload: MessagePayload::handshake(HandshakeMessagePayload {
            typ: HandshakeType::Certificate,
            payload: HandshakePayload::CertificateTls13(CertificatePayloadTls13::new(
                &config.cert.chain,
            )),
        }),
    };

    trace!("sending certificate {:?}", cert);
    transcript.add_message(&cert);
    common.send_msg(cert, true);
}

fn emit_certificate_verify_tls13(
    transcript: &mut HandshakeHash,
    common: &mut CommonState,
    signer: &dyn Signer,
) -> Result<(), Error> {
    let message = construct_server_verify_message(&transcript.get_current_hash());

    let scheme = signer.scheme();
    let sig = signer.sign(message.as_ref())?;
    common.signature_scheme = Some(scheme);
    debug!("signing with {:?}", scheme);

    let cv = Message {
        version: ProtocolVersion::TLSv1_3,
        payload: MessagePayload::handshake(HandshakeMessagePayload {
            typ: HandshakeType::CertificateVerify,
            payload: HandshakePayload::CertificateVerify(DigitallySignedStruct::new(scheme, sig)),
        }),
    };

    trace!("sending certificate-verify {:?}", cv);
    transcript.add_message(&cv);
    common.send_msg(cv, true);
    Ok(())
}

fn emit_finished_tls13(
    transcript: &mut HandshakeHash,
    client_random: &Random,
    common: &mut CommonState,
    key_schedule: KeyScheduleHandshake,
    config: &ServerConfig,
) -> Result<KeyScheduleTrafficWithClientFinishedPending, Error> {
    let handshake_hash = transcript.get_current_hash();
    let verify_data = key_schedule.sign_server_finish(&handshake_hash)?;

    let fin = Message {
        version: ProtocolVersion::TLSv1_3,
        payload: MessagePayload::handshake(HandshakeMessagePayload {
            typ: HandshakeType::Finished,
            payload: HandshakePayload::Finished(Payload::new(verify_data.as_ref())),
        }),
    };

    trace!("sending finished {:?}", fin);
    transcript.add_message(&fin);
    common.send_msg(fin, true);

    // Now move to application data keys.  Read key change is deferred until
    // the Finish message is received & validated.
    key_schedule.into_traffic_with_client_finished_pending(
        transcript.get_current_hash(),
        &*config.key_log,
        &client_random.0,
        common,
    )
}

struct ExpectFinished {
    transcript: HandshakeHash,
    key_schedule: KeyScheduleTrafficWithClientFinishedPending,
    done_retry: bool,
}

impl State<ServerConnectionData> for ExpectFinished {
    fn handle(self: Box<Self>, cx: &mut ServerContext<'_>, m: Message) -> NextStateOrError {
        let finished =
            require_handshake_msg!(m, HandshakeType::Finished, HandshakePayload::Finished)?;

        // The client's Finished must end its record: the read keys change now.
        cx.common.check_aligned_handshake()?;

        let handshake_hash = self.transcript.get_current_hash();
        let st = *self;
        let (key_schedule_traffic, expect_verify_data) = st
            .key_schedule
            .sign_client_finish(&handshake_hash, cx.common)?;

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

        cx.common.handshake_kind = Some(match st.done_retry {
            true => HandshakeKind::FullWithHelloRetryRequest,
            false => HandshakeKind::Full,
        });

        // Application data may now flow.
        cx.common.start_traffic();
        debug!("handshake complete");

        Ok(Box::new(ExpectTraffic {
            key_schedule: key_schedule_traffic,
            _fin_verified: fin,
        }))
    }
}

// --- Process traffic ---
struct ExpectTraffic {
    key_schedule: KeyScheduleTraffic,
    _fin_verified: verify::FinishedMessageVerified,
}

impl State<ServerConnectionData> for ExpectTraffic {
    fn handle(self: Box<Self>, cx: &mut ServerContext<'_>, m: Message) -> NextStateOrError {
        match m.payload {
            MessagePayload::ApplicationData(payload) => cx
                .common
                .take_received_plaintext(payload),
            payload => {
                return Err(inappropriate_message(
                    &payload,
                    &[ContentType::ApplicationData],
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
