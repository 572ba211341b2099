//! The two halves of `tls13-peer`: a server that answers one HTTP/1.0
//! request per connection, and a client that makes one.
//!
//! Both halves build their configuration from the names given on the
//! command line.  Every name is checked, and the config is fully built,
//! before any socket is opened, so a bad name or an unsupported
//! combination surfaces as [`PeerError::Config`].

use std::fmt;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use tls13_handshake::crypto::{rustcrypto, CryptoProvider};
use tls13_handshake::pki_types::pem::PemObject;
use tls13_handshake::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tls13_handshake::{
    CipherSuite, ClientConfig, ClientConnection, CommonState, Error, HandshakeKind, KeyLogFile,
    NamedGroup, RootCertStore, ServerConfig, ServerConnection, SignatureScheme, Stream,
};

/// What the client sends.
pub const REQUEST: &[u8] = b"GET / HTTP/1.0\r\n\r\n";

/// What the server answers with.
pub const RESPONSE: &[u8] = b"HTTP/1.0 200 ok\r\nContent-Type: text/plain\r\n\r\nOK\r\n";

/// Everything that can go wrong in the peer.
#[derive(Debug)]
pub enum PeerError {
    /// A name, file or combination of options was unusable.
    Config(String),
    /// Building a config failed inside the library.
    Tls(Error),
    /// The transport failed, or the handshake did.
    Io(io::Error),
}

impl fmt::Display for PeerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(why) => write!(f, "configuration error: {}", why),
            Self::Tls(err) => write!(f, "configuration error: {}", err),
            Self::Io(err) => write!(f, "connection failed: {}", err),
        }
    }
}

impl std::error::Error for PeerError {}

impl PeerError {
    /// True for the errors that arise before any socket is opened.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Tls(Error::InvalidConfig(_)))
    }
}

impl From<Error> for PeerError {
    fn from(err: Error) -> Self {
        Self::Tls(err)
    }
}

impl From<io::Error> for PeerError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Server options, as given on the command line.
#[derive(Clone, Debug, Default)]
pub struct ServerOptions {
    /// PEM certificate chain, end-entity first.
    pub cert: PathBuf,
    /// PEM PKCS#8 private key matching the end-entity certificate.
    pub key: PathBuf,
    /// Cipher suite names, most preferred first.  Empty means all.
    pub suites: Vec<String>,
    /// Group names, most preferred first.  Empty means all.
    pub groups: Vec<String>,
    /// Put a cookie in each HelloRetryRequest.
    pub hrr_cookie: bool,
}

/// Client options, as given on the command line.
#[derive(Clone, Debug, Default)]
pub struct ClientOptions {
    /// The name the server's certificate must be valid for.
    pub server_name: String,
    /// PEM file of trusted roots.
    pub ca: PathBuf,
    /// Cipher suite names, most preferred first.  Empty means all.
    pub suites: Vec<String>,
    /// Group names for `supported_groups`.  Empty means all.
    pub groups: Vec<String>,
    /// Groups to send a key share for first.  Empty means the first group.
    pub key_shares: Vec<String>,
    /// Signature scheme names.  Empty means everything verifiable.
    pub sig_algs: Vec<String>,
    /// Turn off middlebox compatibility mode.
    pub no_compat: bool,
}

/// The provider both halves use.
pub fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustcrypto::default_provider())
}

/// Resolve each of `names` to one of `known`, by `Debug` spelling,
/// ignoring ASCII case.
fn lookup<T: Copy + fmt::Debug>(
    what: &str,
    known: &[T],
    names: &[String],
) -> Result<Vec<T>, PeerError> {
    names
        .iter()
        .map(|name| {
            known
                .iter()
                .copied()
                .find(|item| format!("{:?}", item).eq_ignore_ascii_case(name))
                .ok_or_else(|| PeerError::Config(format!("cannot look up {} '{}'", what, name)))
        })
        .collect()
}

/// Look up cipher suites by name, eg. `TLS13_AES_256_GCM_SHA384`.
pub fn lookup_suites(
    provider: &CryptoProvider,
    names: &[String],
) -> Result<Vec<CipherSuite>, PeerError> {
    let known: Vec<_> = provider
        .cipher_suites
        .iter()
        .map(|scs| scs.suite)
        .collect();
    lookup("cipher suite", &known, names)
}

/// Look up key exchange groups by name, eg. `secp384r1` or `X448`.
pub fn lookup_groups(
    provider: &CryptoProvider,
    names: &[String],
) -> Result<Vec<NamedGroup>, PeerError> {
    let known: Vec<_> = provider
        .kx_groups
        .iter()
        .map(|skxg| skxg.name())
        .collect();
    lookup("group", &known, names)
}

/// Look up signature schemes by name, eg. `ECDSA_NISTP256_SHA256`.
pub fn lookup_sig_algs(
    provider: &CryptoProvider,
    names: &[String],
) -> Result<Vec<SignatureScheme>, PeerError> {
    let known = provider
        .signature_verification_algorithms
        .supported_schemes();
    lookup("signature algorithm", &known, names)
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, PeerError> {
    let certs = CertificateDer::pem_file_iter(path)
        .and_then(|iter| iter.collect::<Result<Vec<_>, _>>())
        .map_err(|err| PeerError::Config(format!("cannot read {:?}: {:?}", path, err)))?;

    match certs.is_empty() {
        true => Err(PeerError::Config(format!(
            "no certificates found in {:?}",
            path
        ))),
        false => Ok(certs),
    }
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, PeerError> {
    PrivateKeyDer::from_pem_file(path)
        .map_err(|err| PeerError::Config(format!("cannot read key from {:?}: {:?}", path, err)))
}

/// Build the server config `options` describe.
pub fn make_server_config(options: &ServerOptions) -> Result<Arc<ServerConfig>, PeerError> {
    let provider = provider();
    let suites = lookup_suites(&provider, &options.suites)?;
    let groups = lookup_groups(&provider, &options.groups)?;

    let mut builder = ServerConfig::builder(provider).send_hrr_cookie(options.hrr_cookie);
    if !suites.is_empty() {
        builder = builder.with_cipher_suites(&suites);
    }
    if !groups.is_empty() {
        builder = builder.with_kx_groups(&groups);
    }
    if std::env::var_os("SSLKEYLOGFILE").is_some() {
        builder = builder.with_key_log(Arc::new(KeyLogFile::new()));
    }

    let config = builder.with_single_cert(
        load_certs(&options.cert)?,
        load_private_key(&options.key)?,
    )?;
    debug!("server config: {:?}", config);
    Ok(Arc::new(config))
}

/// Build the client config `options` describe, and the name to verify.
pub fn make_client_config(
    options: &ClientOptions,
) -> Result<(Arc<ClientConfig>, ServerName<'static>), PeerError> {
    let provider = provider();
    let suites = lookup_suites(&provider, &options.suites)?;
    let groups = lookup_groups(&provider, &options.groups)?;
    let key_shares = lookup_groups(&provider, &options.key_shares)?;
    let sig_algs = lookup_sig_algs(&provider, &options.sig_algs)?;

    let server_name = ServerName::try_from(options.server_name.clone()).map_err(|_| {
        PeerError::Config(format!("invalid server name '{}'", options.server_name))
    })?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(load_certs(&options.ca)?);
    debug!("loaded {} roots ({} ignored)", added, ignored);

    let mut builder = ClientConfig::builder(provider).compatibility_mode(!options.no_compat);
    if !suites.is_empty() {
        builder = builder.with_cipher_suites(&suites);
    }
    if !groups.is_empty() {
        builder = builder.with_kx_groups(&groups);
    }
    if !key_shares.is_empty() {
        builder = builder.with_key_share_groups(&key_shares);
    }
    if !sig_algs.is_empty() {
        builder = builder.with_signature_schemes(&sig_algs);
    }
    if std::env::var_os("SSLKEYLOGFILE").is_some() {
        builder = builder.with_key_log(Arc::new(KeyLogFile::new()));
    }

    let config = builder.with_root_certificates(roots)?;
    debug!("client config: {:?}", config);
    Ok((Arc::new(config), server_name))
}

/// What a completed handshake agreed on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Negotiated {
    /// The cipher suite, as fixed by the ServerHello (or the retry before it).
    pub suite: CipherSuite,
    /// The group the shared secret came from.
    pub group: NamedGroup,
    /// The scheme of the server's CertificateVerify signature.
    pub scheme: SignatureScheme,
    /// Whether the handshake needed a HelloRetryRequest.
    pub kind: HandshakeKind,
}

impl Negotiated {
    /// Read the outcome off a connection whose handshake is complete.
    pub fn of(common: &CommonState) -> Option<Self> {
        Some(Self {
            suite: common.negotiated_cipher_suite()?.suite,
            group: common.negotiated_key_exchange_group()?,
            scheme: common.negotiated_signature_scheme()?,
            kind: common.handshake_kind()?,
        })
    }
}

impl fmt::Display for Negotiated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "negotiated cipher suite: {:?} ( {:04x} )",
            self.suite,
            u16::from(self.suite)
        )?;
        writeln!(
            f,
            "key exchange group: {:?} ( {:04x} )",
            self.group,
            u16::from(self.group)
        )?;
        writeln!(
            f,
            "signature scheme: {:?} ( {:04x} )",
            self.scheme,
            u16::from(self.scheme)
        )?;
        write!(f, "handshake kind: {:?}", self.kind)
    }
}

fn negotiated(common: &CommonState) -> Result<Negotiated, PeerError> {
    Negotiated::of(common).ok_or_else(|| {
        PeerError::Tls(Error::General(
            "handshake finished without agreeing parameters".into(),
        ))
    })
}

/// Accept one connection on `listener`, read a request, and answer it.
pub fn serve_one(
    listener: &TcpListener,
    config: Arc<ServerConfig>,
) -> Result<Negotiated, PeerError> {
    let (mut sock, addr) = listener.accept()?;
    debug!("accepted connection from {}", addr);

    let mut conn = ServerConnection::new(config)?;
    let mut request = Vec::new();
    {
        let mut tls = Stream::new(&mut conn, &mut sock);
        let mut buf = [0u8; 1024];
        while !request.ends_with(b"\r\n\r\n") {
            match tls.read(&mut buf)? {
                0 => break,
                n => request.extend_from_slice(&buf[..n]),
            }
        }
        debug!("request: {:?}", String::from_utf8_lossy(&request));
        tls.write_all(RESPONSE)?;
    }

    conn.send_close_notify();
    conn.complete_io(&mut sock)?;

    if let Some(name) = conn.server_name() {
        info!("client asked for {}", name);
    }
    negotiated(&conn)
}

/// Serve connections on `listener` until the process is stopped.
/// A failed connection is logged, and does not stop the server.
pub fn serve_forever(listener: &TcpListener, config: Arc<ServerConfig>) -> io::Result<()> {
    loop {
        match serve_one(listener, config.clone()) {
            Ok(result) => println!("{}", result),
            Err(PeerError::Io(err)) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => warn!("connection failed: {}", err),
        }
    }
}

/// Connect to `host:port`, send [`REQUEST`], and return the response.
pub fn run_client(
    host: &str,
    port: u16,
    config: Arc<ClientConfig>,
    server_name: ServerName<'static>,
) -> Result<(Negotiated, Vec<u8>), PeerError> {
    let mut sock = TcpStream::connect((host, port))?;
    debug!("connected to {}:{}", host, port);

    let mut conn = ClientConnection::new(config, server_name)?;
    let mut response = Vec::new();
    {
        let mut tls = Stream::new(&mut conn, &mut sock);
        tls.write_all(REQUEST)?;
        tls.read_to_end(&mut response)?;
    }

    Ok((negotiated(&conn)?, response))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn names_are_case_insensitive() {
        let provider = provider();
        assert_eq!(
            lookup_suites(&provider, &names(&["tls13_aes_256_gcm_sha384"])).unwrap(),
            vec![CipherSuite::TLS13_AES_256_GCM_SHA384]
        );
        assert_eq!(
            lookup_groups(&provider, &names(&["SECP384R1", "x448"])).unwrap(),
            vec![NamedGroup::secp384r1, NamedGroup::X448]
        );
        assert_eq!(
            lookup_sig_algs(&provider, &names(&["ecdsa_nistp256_sha256"])).unwrap(),
            vec![SignatureScheme::ECDSA_NISTP256_SHA256]
        );
    }

    #[test]
    fn unknown_name_is_a_config_error() {
        let err = lookup_groups(&provider(), &names(&["brainpoolP256r1"])).unwrap_err();
        assert!(err.is_config());
        assert_eq!(
            err.to_string(),
            "configuration error: cannot look up group 'brainpoolP256r1'"
        );
    }

    #[test]
    fn negotiated_lines() {
        let result = Negotiated {
            suite: CipherSuite::TLS13_AES_256_GCM_SHA384,
            group: NamedGroup::secp384r1,
            scheme: SignatureScheme::ECDSA_NISTP256_SHA256,
            kind: HandshakeKind::FullWithHelloRetryRequest,
        };
        assert_eq!(
            result.to_string(),
            "negotiated cipher suite: TLS13_AES_256_GCM_SHA384 ( 1302 )\n\
             key exchange group: secp384r1 ( 0018 )\n\
             signature scheme: ECDSA_NISTP256_SHA256 ( 0403 )\n\
             handshake kind: FullWithHelloRetryRequest"
        );
    }
}
