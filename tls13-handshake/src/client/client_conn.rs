use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use pki_types::ServerName;

use super::hs;
use super::ClientConfig;
use crate::common_state::{CommonState, Side};
use crate::conn::{ConnectionCommon, ConnectionCore, SideData};
use crate::error::Error;

/// This represents a single TLS client connection.
pub struct ClientConnection {
    inner: ConnectionCommon<ClientConnectionData>,
}

impl fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConnection")
            .finish()
    }
}

impl ClientConnection {
    /// Make a new ClientConnection.  `config` controls how
    /// we behave in the TLS protocol, `name` is the
    /// name of the server we want to talk to.
    ///
    /// The first ClientHello is queued immediately: call
    /// [`CommonState::wants_write`] and [`ConnectionCommon::write_tls`] to send it.
    pub fn new(config: Arc<ClientConfig>, name: ServerName<'static>) -> Result<Self, Error> {
        Ok(Self {
            inner: ConnectionCore::for_client(config, name)?.into(),
        })
    }
}

impl Deref for ClientConnection {
    type Target = ConnectionCommon<ClientConnectionData>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for ClientConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl ConnectionCore<ClientConnectionData> {
    pub(crate) fn for_client(
        config: Arc<ClientConfig>,
        name: ServerName<'static>,
    ) -> Result<Self, Error> {
        let mut common_state = CommonState::new(Side::Client);
        let mut data = ClientConnectionData::new();

        let mut cx = hs::ClientContext {
            common: &mut common_state,
            data: &mut data,
        };

        let state = hs::start_handshake(name, config, &mut cx)?;
        Ok(Self::new(state, data, common_state))
    }
}

/// State associated with a client connection.
#[derive(Debug)]
pub struct ClientConnectionData {
    /// How many HelloRetryRequests have been seen.  More than one is fatal.
    pub(super) hello_retry_requests: u8,
}

impl ClientConnectionData {
    fn new() -> Self {
        Self {
            hello_retry_requests: 0,
        }
    }
}

impl SideData for ClientConnectionData {}
