use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use pki_types::DnsName;

use super::{hs, ServerConfig};
use crate::common_state::{CommonState, Side};
use crate::conn::{ConnectionCommon, ConnectionCore, SideData};
use crate::error::Error;

/// This represents a single TLS server connection.
///
/// Send TLS-protected data to the peer using the `io::Write` trait implementation.
/// Read data from the peer using the `io::Read` trait implementation.
pub struct ServerConnection {
    inner: ConnectionCommon<ServerConnectionData>,
}

impl ServerConnection {
    /// Make a new ServerConnection.  `config` controls how
    /// we behave in the TLS protocol.
    pub fn new(config: Arc<ServerConfig>) -> Result<Self, Error> {
        Ok(Self {
            inner: ConnectionCore::for_server(config)?.into(),
        })
    }

    /// Retrieves the server name, if any, used to select the certificate and
    /// private key.
    ///
    /// This returns `None` until some time after the client's server name indication
    /// (SNI) extension value is processed during the handshake. It will never be
    /// `None` when the connection is ready to send or process application data,
    /// unless the client does not support SNI.
    pub fn server_name(&self) -> Option<&str> {
        self.inner
            .core
            .data
            .sni
            .as_ref()
            .map(AsRef::as_ref)
    }
}

impl fmt::Debug for ServerConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConnection")
            .finish()
    }
}

impl Deref for ServerConnection {
    type Target = ConnectionCommon<ServerConnectionData>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for ServerConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl ConnectionCore<ServerConnectionData> {
    pub(crate) fn for_server(config: Arc<ServerConfig>) -> Result<Self, Error> {
        let common = CommonState::new(Side::Server);
        Ok(Self::new(
            Box::new(hs::ExpectClientHello::new(config)),
            ServerConnectionData::default(),
            common,
        ))
    }
}

/// State associated with a server connection.
#[derive(Default, Debug)]
pub struct ServerConnectionData {
    pub(super) sni: Option<DnsName<'static>>,
}

impl SideData for ServerConnectionData {}
