//! Key schedule maintenance for TLS1.3

use crate::common_state::{CommonState, Side};
use crate::crypto::cipher::{AeadKey, Iv, MessageDecrypter, MessageEncrypter, NONCE_LEN};
use crate::crypto::tls13::{expand, HkdfExpander, OkmBlock, OutputLengthError};
use crate::crypto::{hash, hmac, SharedSecret};
use crate::error::Error;
use crate::key_log::KeyLog;
use crate::suites::Tls13CipherSuite;

// We express the state of a contained KeySchedule using these
// typestates.  This means we can write code that cannot accidentally
// (e.g.) encrypt application data using a KeySchedule solely constructed
// with an empty or trivial secret, or extract the wrong kind of secrets
// at a given point.

/// The "early secret" stage of the key schedule, without a PSK.
///
/// ```text
///          0
///          |
///          v
///   0 -> HKDF-Extract = Early Secret
///          |
///          v
///    Derive-Secret(., "derived", "")
/// ```
pub(crate) struct KeySchedulePreHandshake {
    ks: KeySchedule,
}

impl KeySchedulePreHandshake {
    pub(crate) fn new(side: Side, suite: &'static Tls13CipherSuite) -> Self {
        Self {
            ks: KeySchedule::new_with_empty_secret(side, suite),
        }
    }

    /// `shared_secret` is the "(EC)DHE" secret input to
    /// "HKDF-Extract":
    ///
    /// ```text
    /// (EC)DHE -> HKDF-Extract = Handshake Secret
    /// ```
    pub(crate) fn into_handshake(mut self, shared_secret: SharedSecret) -> KeyScheduleHandshakeStart {
        self.ks
            .input_secret(shared_secret.secret_bytes());
        KeyScheduleHandshakeStart { ks: self.ks }
    }
}

/// KeySchedule during handshake, before the handshake traffic
/// secrets are derived.
pub(crate) struct KeyScheduleHandshakeStart {
    ks: KeySchedule,
}

impl KeyScheduleHandshakeStart {
    /// Derive both handshake traffic secrets over `Transcript-Hash(ClientHello..ServerHello)`
    /// and install them for a client: decrypt with the server's, encrypt with our own.
    pub(crate) fn derive_client_handshake_secrets(
        self,
        hs_hash: hash::Output,
        key_log: &dyn KeyLog,
        client_random: &[u8; 32],
        common: &mut CommonState,
    ) -> Result<KeyScheduleHandshake, Error> {
        debug_assert_eq!(self.ks.side, Side::Client);
        let new = self.into_handshake(hs_hash, key_log, client_random)?;

        new.ks
            .set_decrypter(&new.server_handshake_traffic_secret, common)?;
        new.ks
            .set_encrypter(&new.client_handshake_traffic_secret, common)?;
        Ok(new)
    }

    /// As `derive_client_handshake_secrets`, but for the server.
    pub(crate) fn derive_server_handshake_secrets(
        self,
        hs_hash: hash::Output,
        key_log: &dyn KeyLog,
        client_random: &[u8; 32],
        common: &mut CommonState,
    ) -> Result<KeyScheduleHandshake, Error> {
        debug_assert_eq!(self.ks.side, Side::Server);
        let new = self.into_handshake(hs_hash, key_log, client_random)?;

        new.ks
            .set_encrypter(&new.server_handshake_traffic_secret, common)?;
        new.ks
            .set_decrypter(&new.client_handshake_traffic_secret, common)?;
        Ok(new)
    }

    fn into_handshake(
        self,
        hs_hash: hash::Output,
        key_log: &dyn KeyLog,
        client_random: &[u8; 32],
    ) -> Result<KeyScheduleHandshake, Error> {
        let client_secret = self.ks.derive_logged_secret(
            SecretKind::ClientHandshakeTrafficSecret,
            hs_hash.as_ref(),
            key_log,
            client_random,
        )?;

        let server_secret = self.ks.derive_logged_secret(
            SecretKind::ServerHandshakeTrafficSecret,
            hs_hash.as_ref(),
            key_log,
            client_random,
        )?;

        Ok(KeyScheduleHandshake {
            ks: self.ks,
            client_handshake_traffic_secret: client_secret,
            server_handshake_traffic_secret: server_secret,
        })
    }
}

pub(crate) struct KeyScheduleHandshake {
    ks: KeySchedule,
    client_handshake_traffic_secret: OkmBlock,
    server_handshake_traffic_secret: OkmBlock,
}

impl KeyScheduleHandshake {
    pub(crate) fn sign_server_finish(&self, hs_hash: &hash::Output) -> Result<hmac::Tag, Error> {
        self.ks
            .sign_finish(&self.server_handshake_traffic_secret, hs_hash)
    }

    /// Server side: derive the application traffic secrets over
    /// `Transcript-Hash(ClientHello..server Finished)` and start
    /// encrypting with ours.  The client's Finished is still to come,
    /// under the client handshake traffic secret.
    pub(crate) fn into_traffic_with_client_finished_pending(
        self,
        hs_hash: hash::Output,
        key_log: &dyn KeyLog,
        client_random: &[u8; 32],
        common: &mut CommonState,
    ) -> Result<KeyScheduleTrafficWithClientFinishedPending, Error> {
        debug_assert_eq!(self.ks.side, Side::Server);

        let before_finished =
            KeyScheduleBeforeFinished::new(self.ks, hs_hash, key_log, client_random)?;
        before_finished
            .ks
            .set_encrypter(&before_finished.current_server_traffic_secret, common)?;

        Ok(KeyScheduleTrafficWithClientFinishedPending {
            handshake_client_traffic_secret: self.client_handshake_traffic_secret,
            before_finished,
        })
    }

    /// Client side: derive the application traffic secrets over
    /// `pre_finished_hash`, and produce our Finished `verify_data` over
    /// `handshake_hash`.  Nothing is installed yet: our Finished goes out
    /// under the handshake keys.
    pub(crate) fn into_pre_finished_client_traffic(
        self,
        pre_finished_hash: hash::Output,
        handshake_hash: hash::Output,
        key_log: &dyn KeyLog,
        client_random: &[u8; 32],
    ) -> Result<(KeyScheduleClientBeforeFinished, hmac::Tag), Error> {
        debug_assert_eq!(self.ks.side, Side::Client);
        let before_finished =
            KeyScheduleBeforeFinished::new(self.ks, pre_finished_hash, key_log, client_random)?;
        let tag = before_finished
            .ks
            .sign_finish(&self.client_handshake_traffic_secret, &handshake_hash)?;
        Ok((KeyScheduleClientBeforeFinished(before_finished), tag))
    }
}

/// Keys derived (but not installed) before client's Finished message.
pub(crate) struct KeyScheduleBeforeFinished {
    ks: KeySchedule,
    current_client_traffic_secret: OkmBlock,
    current_server_traffic_secret: OkmBlock,
    current_exporter_secret: OkmBlock,
}

impl KeyScheduleBeforeFinished {
    fn new(
        mut ks: KeySchedule,
        hs_hash: hash::Output,
        key_log: &dyn KeyLog,
        client_random: &[u8; 32],
    ) -> Result<Self, Error> {
        ks.input_empty()?;

        let current_client_traffic_secret = ks.derive_logged_secret(
            SecretKind::ClientApplicationTrafficSecret,
            hs_hash.as_ref(),
            key_log,
            client_random,
        )?;

        let current_server_traffic_secret = ks.derive_logged_secret(
            SecretKind::ServerApplicationTrafficSecret,
            hs_hash.as_ref(),
            key_log,
            client_random,
        )?;

        let current_exporter_secret = ks.derive_logged_secret(
            SecretKind::ExporterMasterSecret,
            hs_hash.as_ref(),
            key_log,
            client_random,
        )?;

        Ok(Self {
            ks,
            current_client_traffic_secret,
            current_server_traffic_secret,
            current_exporter_secret,
        })
    }

    fn into_traffic(self) -> KeyScheduleTraffic {
        KeyScheduleTraffic {
            suite: self.ks.suite,
            current_exporter_secret: self.current_exporter_secret,
        }
    }
}

/// Client-side key schedule before the finished message is sent.
///
/// None of the application traffic secrets are installed yet.  After our
/// Finished is sent, `into_traffic()` does that.
pub(crate) struct KeyScheduleClientBeforeFinished(KeyScheduleBeforeFinished);

impl KeyScheduleClientBeforeFinished {
    pub(crate) fn into_traffic(self, common: &mut CommonState) -> Result<KeyScheduleTraffic, Error> {
        let next = self.0;
        debug_assert_eq!(next.ks.side, Side::Client);

        next.ks
            .set_decrypter(&next.current_server_traffic_secret, common)?;
        next.ks
            .set_encrypter(&next.current_client_traffic_secret, common)?;

        Ok(next.into_traffic())
    }
}

/// KeySchedule during traffic stage, retaining the ability to calculate the client's
/// finished verify_data. The traffic stage key schedule can be extracted from it
/// through signing the client finished hash.
pub(crate) struct KeyScheduleTrafficWithClientFinishedPending {
    handshake_client_traffic_secret: OkmBlock,
    before_finished: KeyScheduleBeforeFinished,
}

impl KeyScheduleTrafficWithClientFinishedPending {
    /// Compute the client's expected Finished `verify_data` over `hs_hash`, and
    /// install the client application traffic secret for reading.
    pub(crate) fn sign_client_finish(
        self,
        hs_hash: &hash::Output,
        common: &mut CommonState,
    ) -> Result<(KeyScheduleTraffic, hmac::Tag), Error> {
        debug_assert_eq!(self.before_finished.ks.side, Side::Server);
        let tag = self
            .before_finished
            .ks
            .sign_finish(&self.handshake_client_traffic_secret, hs_hash)?;

        self.before_finished.ks.set_decrypter(
            &self
                .before_finished
                .current_client_traffic_secret,
            common,
        )?;

        Ok((self.before_finished.into_traffic(), tag))
    }
}

/// KeySchedule during traffic stage.
///
/// Application traffic keys are installed; all that remains is the
/// exporter secret.
pub(crate) struct KeyScheduleTraffic {
    suite: &'static Tls13CipherSuite,
    current_exporter_secret: OkmBlock,
}

impl KeyScheduleTraffic {
    /// RFC 8446 section 7.5.
    pub(crate) fn export_keying_material(
        &self,
        out: &mut [u8],
        label: &[u8],
        context: Option<&[u8]>,
    ) -> Result<(), Error> {
        let h_empty = self.suite.hash_provider.hash(&[]);
        let secret = {
            let expander = self
                .suite
                .hkdf_provider
                .expander_for_okm(&self.current_exporter_secret);
            hkdf_expand_label_block(expander.as_ref(), label, h_empty.as_ref())
        };

        let h_context = self
            .suite
            .hash_provider
            .hash(context.unwrap_or(&[]));

        let expander = self
            .suite
            .hkdf_provider
            .expander_for_okm(&secret);
        hkdf_expand_label_slice(expander.as_ref(), b"exporter", h_context.as_ref(), out)
            .map_err(|_| Error::General("exporting too much".into()))
    }
}

/// This is the TLS1.3 key schedule.  It stores the current secret and
/// the type of hash.  This isn't used directly; but only through the
/// typestates.
struct KeySchedule {
    current: Box<dyn HkdfExpander>,
    side: Side,
    suite: &'static Tls13CipherSuite,
}

impl KeySchedule {
    fn new_with_empty_secret(side: Side, suite: &'static Tls13CipherSuite) -> Self {
        Self {
            current: suite
                .hkdf_provider
                .extract_from_zero_ikm(None),
            side,
            suite,
        }
    }

    /// Input the empty secret.
    ///
    /// RFC 8446: "If a given secret is not available, then the
    /// 0-value consisting of a string of Hash.length bytes set
    /// to zeros is used."
    fn input_empty(&mut self) -> Result<(), Error> {
        let salt = self.derive_for_empty_hash(SecretKind::DerivedSecret);
        self.current = self
            .suite
            .hkdf_provider
            .extract_from_zero_ikm(Some(salt.as_ref()));
        Ok(())
    }

    /// Input the given secret.
    fn input_secret(&mut self, secret: &[u8]) {
        let salt = self.derive_for_empty_hash(SecretKind::DerivedSecret);
        self.current = self
            .suite
            .hkdf_provider
            .extract_from_secret(Some(salt.as_ref()), secret);
    }

    /// Derive a secret of given `kind`, using current handshake hash `hs_hash`.
    fn derive(&self, kind: SecretKind, hs_hash: &[u8]) -> OkmBlock {
        hkdf_expand_label_block(self.current.as_ref(), kind.to_bytes(), hs_hash)
    }

    fn derive_logged_secret(
        &self,
        kind: SecretKind,
        hs_hash: &[u8],
        key_log: &dyn KeyLog,
        client_random: &[u8; 32],
    ) -> Result<OkmBlock, Error> {
        let output = self.derive(kind, hs_hash);

        let log_label = kind
            .log_label()
            .ok_or_else(|| Error::General("not a loggable secret".into()))?;
        if key_log.will_log(log_label) {
            key_log.log(log_label, client_random, output.as_ref());
        }
        Ok(output)
    }

    /// Derive a secret of given `kind` using the hash of the empty string
    /// for the handshake hash.
    ///
    /// ```text
    /// Derive-Secret(., Label, "")
    /// ```
    fn derive_for_empty_hash(&self, kind: SecretKind) -> OkmBlock {
        let empty_hash = self.suite.hash_provider.start().finish();
        self.derive(kind, empty_hash.as_ref())
    }

    fn set_encrypter(&self, secret: &OkmBlock, common: &mut CommonState) -> Result<(), Error> {
        common
            .record_layer
            .set_message_encrypter(self.derive_encrypter(secret)?);
        Ok(())
    }

    fn set_decrypter(&self, secret: &OkmBlock, common: &mut CommonState) -> Result<(), Error> {
        common
            .record_layer
            .set_message_decrypter(self.derive_decrypter(secret)?);
        Ok(())
    }

    fn derive_encrypter(&self, secret: &OkmBlock) -> Result<Box<dyn MessageEncrypter>, Error> {
        let (key, iv) = expand_secret(self.suite, secret)?;
        self.suite.aead_alg.encrypter(key, iv)
    }

    fn derive_decrypter(&self, secret: &OkmBlock) -> Result<Box<dyn MessageDecrypter>, Error> {
        let (key, iv) = expand_secret(self.suite, secret)?;
        self.suite.aead_alg.decrypter(key, iv)
    }

    /// Sign the finished message consisting of `hs_hash` using the key material
    /// `base_key`.
    ///
    /// See RFC 8446 section 4.4.4.
    fn sign_finish(&self, base_key: &OkmBlock, hs_hash: &hash::Output) -> Result<hmac::Tag, Error> {
        let expander = self
            .suite
            .hkdf_provider
            .expander_for_okm(base_key);
        let hmac_key = hkdf_expand_label_block(expander.as_ref(), b"finished", &[]);

        Ok(self
            .suite
            .hkdf_provider
            .hmac_sign(&hmac_key, hs_hash.as_ref()))
    }
}

/// Expand a traffic secret into its `[sender]_write_key` and `[sender]_write_iv`.
fn expand_secret(suite: &Tls13CipherSuite, secret: &OkmBlock) -> Result<(AeadKey, Iv), Error> {
    let expander = suite.hkdf_provider.expander_for_okm(secret);
    let key = derive_traffic_key(expander.as_ref(), suite.aead_alg.key_len())?;
    let iv = derive_traffic_iv(expander.as_ref())?;
    Ok((key, iv))
}

/// [HKDF-Expand-Label] where the output is an AEAD key.
///
/// [HKDF-Expand-Label]: <https://www.rfc-editor.org/rfc/rfc8446#section-7.1>
pub(crate) fn derive_traffic_key(
    expander: &dyn HkdfExpander,
    key_len: usize,
) -> Result<AeadKey, OutputLengthError> {
    hkdf_expand_label_inner(expander, b"key", &[], key_len, |e, info| {
        let key: AeadKey = expand(e, info)?;
        Ok(key.with_length(key_len))
    })
}

/// [HKDF-Expand-Label] where the output is an IV.
pub(crate) fn derive_traffic_iv(expander: &dyn HkdfExpander) -> Result<Iv, OutputLengthError> {
    hkdf_expand_label(expander, b"iv", &[])
}

/// [HKDF-Expand-Label] where the output length is a compile-time constant.
pub(crate) fn hkdf_expand_label<T: From<[u8; N]>, const N: usize>(
    expander: &dyn HkdfExpander,
    label: &[u8],
    context: &[u8],
) -> Result<T, OutputLengthError> {
    hkdf_expand_label_inner(expander, label, context, N, |e, info| expand(e, info))
}

/// [HKDF-Expand-Label] where the output is one block in size.
pub(crate) fn hkdf_expand_label_block(
    expander: &dyn HkdfExpander,
    label: &[u8],
    context: &[u8],
) -> OkmBlock {
    hkdf_expand_label_inner(expander, label, context, expander.hash_len(), |e, info| {
        e.expand_block(info)
    })
}

/// [HKDF-Expand-Label] where the output is a slice.
///
/// This can fail because HKDF-Expand is limited in its maximum output length.
fn hkdf_expand_label_slice(
    expander: &dyn HkdfExpander,
    label: &[u8],
    context: &[u8],
    output: &mut [u8],
) -> Result<(), OutputLengthError> {
    hkdf_expand_label_inner(expander, label, context, output.len(), |e, info| {
        e.expand_slice(info, output)
    })
}

fn hkdf_expand_label_inner<F, T>(
    expander: &dyn HkdfExpander,
    label: &[u8],
    context: &[u8],
    n: usize,
    f: F,
) -> T
where
    F: FnOnce(&dyn HkdfExpander, &[&[u8]]) -> T,
{
    const LABEL_PREFIX: &[u8] = b"tls13 ";

    let output_len = u16::to_be_bytes(n as u16);
    let label_len = u8::to_be_bytes((LABEL_PREFIX.len() + label.len()) as u8);
    let context_len = u8::to_be_bytes(context.len() as u8);

    let info = &[
        &output_len[..],
        &label_len[..],
        LABEL_PREFIX,
        label,
        &context_len[..],
        context,
    ];

    f(expander, info)
}

/// The kinds of secret we can extract from `KeySchedule`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SecretKind {
    ClientHandshakeTrafficSecret,
    ServerHandshakeTrafficSecret,
    ClientApplicationTrafficSecret,
    ServerApplicationTrafficSecret,
    ExporterMasterSecret,
    DerivedSecret,
}

impl SecretKind {
    fn to_bytes(self) -> &'static [u8] {
        use self::SecretKind::*;
        match self {
            ClientHandshakeTrafficSecret => b"c hs traffic",
            ServerHandshakeTrafficSecret => b"s hs traffic",
            ClientApplicationTrafficSecret => b"c ap traffic",
            ServerApplicationTrafficSecret => b"s ap traffic",
            ExporterMasterSecret => b"exp master",
            DerivedSecret => b"derived",
        }
    }

    fn log_label(self) -> Option<&'static str> {
        use self::SecretKind::*;
        Some(match self {
            ClientHandshakeTrafficSecret => "CLIENT_HANDSHAKE_TRAFFIC_SECRET",
            ServerHandshakeTrafficSecret => "SERVER_HANDSHAKE_TRAFFIC_SECRET",
            ClientApplicationTrafficSecret => "CLIENT_TRAFFIC_SECRET_0",
            ServerApplicationTrafficSecret => "SERVER_TRAFFIC_SECRET_0",
            ExporterMasterSecret => "EXPORTER_SECRET",
            DerivedSecret => {
                return None;
            }
        })
    }
}

const _: () = assert!(NONCE_LEN == 12);
