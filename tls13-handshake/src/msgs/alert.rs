use crate::enums::AlertDescription;
use crate::error::InvalidMessage;
use crate::msgs::codec::{Codec, Reader};
use crate::msgs::enums::AlertLevel;

#[derive(Debug)]
pub struct AlertMessagePayload {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Codec for AlertMessagePayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.level.encode(bytes);
        self.description.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let level = AlertLevel::read(r)?;
        let description = AlertDescription::read(r)?;
        r.expect_empty("AlertMessagePayload")
            .map(|_| Self { level, description })
    }
}

impl AlertMessagePayload {
    /// Alerts that do not end the connection.
    ///
    /// TLS 1.3 ignores the level byte: only `close_notify` and
    /// `user_canceled` are anything other than fatal.
    pub(crate) fn is_fatal(&self) -> bool {
        !matches!(
            self.description,
            AlertDescription::CloseNotify | AlertDescription::UserCanceled
        )
    }
}
