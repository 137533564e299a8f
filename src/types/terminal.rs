//! Terminal information, voltage and GSM signal classification

use serde::{Deserialize, Serialize};

/// Bit layout of the terminal information byte.
pub mod terminal_bits {
    pub const OIL_POWER: u8 = 0x01;
    pub const IGNITION: u8 = 0x02;
    pub const CHARGING: u8 = 0x04;
    pub const ALARM_MASK: u8 = 0x38;
    pub const ALARM_SHIFT: u8 = 3;
    pub const GPS_TRACKING: u8 = 0x40;
    pub const RELAY: u8 = 0x80;
}

/// Alarm condition from bits 3..=5 of the terminal information byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmKind {
    Normal,
    Shock,
    PowerCut,
    LowBattery,
    Sos,
}

impl AlarmKind {
    /// Codes outside 1..=4 read as normal.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => AlarmKind::Shock,
            2 => AlarmKind::PowerCut,
            3 => AlarmKind::LowBattery,
            4 => AlarmKind::Sos,
            _ => AlarmKind::Normal,
        }
    }
}

/// Decoded terminal information byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalInfo {
    /// Oil and electricity connected
    pub oil_power: bool,
    /// ACC high
    pub ignition: bool,
    pub charging: bool,
    pub alarm: AlarmKind,
    pub gps_tracking: bool,
    /// Oil/electricity cutoff relay engaged
    pub relay: bool,
    pub raw: u8,
}

impl TerminalInfo {
    pub fn decode(raw: u8) -> Self {
        use terminal_bits as bits;

        Self {
            oil_power: raw & bits::OIL_POWER != 0,
            ignition: raw & bits::IGNITION != 0,
            charging: raw & bits::CHARGING != 0,
            alarm: AlarmKind::from_code((raw & bits::ALARM_MASK) >> bits::ALARM_SHIFT),
            gps_tracking: raw & bits::GPS_TRACKING != 0,
            relay: raw & bits::RELAY != 0,
            raw,
        }
    }
}

/// Battery voltage level, 7-level ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VoltageLevel {
    NoPower,
    ExtremelyLow,
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl VoltageLevel {
    /// Out-of-range values read as no power.
    pub fn from_level(level: u8) -> Self {
        match level {
            1 => VoltageLevel::ExtremelyLow,
            2 => VoltageLevel::VeryLow,
            3 => VoltageLevel::Low,
            4 => VoltageLevel::Medium,
            5 => VoltageLevel::High,
            6 => VoltageLevel::VeryHigh,
            _ => VoltageLevel::NoPower,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            VoltageLevel::NoPower => "no power (shutting down)",
            VoltageLevel::ExtremelyLow => "extremely low battery",
            VoltageLevel::VeryLow => "very low battery (low battery alarm)",
            VoltageLevel::Low => "low battery (can be used normally)",
            VoltageLevel::Medium => "medium",
            VoltageLevel::High => "high",
            VoltageLevel::VeryHigh => "very high",
        }
    }
}

/// GSM signal strength, 5-level ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GsmSignal {
    NoSignal,
    ExtremelyWeak,
    VeryWeak,
    Good,
    Strong,
}

impl GsmSignal {
    /// Out-of-range values read as no signal.
    pub fn from_level(level: u8) -> Self {
        match level {
            1 => GsmSignal::ExtremelyWeak,
            2 => GsmSignal::VeryWeak,
            3 => GsmSignal::Good,
            4 => GsmSignal::Strong,
            _ => GsmSignal::NoSignal,
        }
    }
}
