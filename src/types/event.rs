//! Decoded events produced by the session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DeviceIdentity, GpsFix, GsmSignal, MessageType, TerminalInfo, VoltageLevel};

/// Login payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginInfo {
    pub identity: DeviceIdentity,
    pub serial: u16,
}

/// Status/heartbeat payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub terminal: TerminalInfo,
    pub voltage: VoltageLevel,
    pub gsm_signal: GsmSignal,
    pub alarm_language: u16,
    pub serial: u16,
}

/// Alarm payload: a full fix plus the status bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmReport {
    pub fix: GpsFix,
    pub terminal: TerminalInfo,
    pub voltage: VoltageLevel,
    pub gsm_signal: GsmSignal,
    pub alarm_language: u16,
    pub serial: u16,
}

/// Per-message payload, one variant per supported message type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    Login(LoginInfo),
    Location { fix: GpsFix, serial: u16 },
    Status(StatusReport),
    Alarm(AlarmReport),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Login(_) => MessageType::Login,
            Message::Location { .. } => MessageType::Location,
            Message::Status(_) => MessageType::Status,
            Message::Alarm(_) => MessageType::Alarm,
        }
    }

    /// Position carried by the message, if any
    pub fn fix(&self) -> Option<&GpsFix> {
        match self {
            Message::Location { fix, .. } => Some(fix),
            Message::Alarm(report) => Some(&report.fix),
            Message::Login(_) | Message::Status(_) => None,
        }
    }
}

/// One decoded frame, tagged with the device identity known at decode time.
///
/// Events are immutable values. `device` is `None` when no login has been
/// seen on the connection yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    /// Raw protocol number
    pub code: u8,
    pub received_at: DateTime<Utc>,
    pub device: Option<DeviceIdentity>,
    pub message: Message,
}

impl DecodedEvent {
    pub fn message_type(&self) -> MessageType {
        self.message.message_type()
    }

    pub fn is_location(&self) -> bool {
        matches!(self.message, Message::Location { .. })
    }
}
