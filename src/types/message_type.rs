//! GT06 message type codes

use serde::{Deserialize, Serialize};

use crate::GatewayError;

/// Message types understood by the decoder, keyed by the byte at offset 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Login,
    Location,
    Status,
    Alarm,
}

impl MessageType {
    pub const LOGIN: u8 = 0x01;
    pub const LOCATION: u8 = 0x12;
    pub const STATUS: u8 = 0x13;
    pub const ALARM: u8 = 0x16;

    /// The protocol number on the wire.
    pub fn code(&self) -> u8 {
        match self {
            MessageType::Login => Self::LOGIN,
            MessageType::Location => Self::LOCATION,
            MessageType::Status => Self::STATUS,
            MessageType::Alarm => Self::ALARM,
        }
    }

    /// Whether the device waits for an acknowledgement frame.
    pub fn requires_ack(&self) -> bool {
        matches!(self, MessageType::Login | MessageType::Status)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Login => "login",
            MessageType::Location => "location",
            MessageType::Status => "status",
            MessageType::Alarm => "alarm",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = GatewayError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            Self::LOGIN => Ok(MessageType::Login),
            Self::LOCATION => Ok(MessageType::Location),
            Self::STATUS => Ok(MessageType::Status),
            Self::ALARM => Ok(MessageType::Alarm),
            code => Err(GatewayError::UnknownMessageType { code }),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for kind in [MessageType::Login, MessageType::Location, MessageType::Status, MessageType::Alarm]
        {
            assert_eq!(MessageType::try_from(kind.code()).unwrap(), kind);
        }
    }

    #[test]
    fn only_login_and_status_are_acknowledged() {
        assert!(MessageType::Login.requires_ack());
        assert!(MessageType::Status.requires_ack());
        assert!(!MessageType::Location.requires_ack());
        assert!(!MessageType::Alarm.requires_ack());
    }

    #[test]
    fn unknown_code_is_rejected() {
        let err = MessageType::try_from(0x99).unwrap_err();
        assert!(matches!(err, GatewayError::UnknownMessageType { code: 0x99 }));
    }
}
