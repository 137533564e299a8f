//! Core types for decoded GT06 telemetry.
//!
//! The types map onto the fields of the GT06 wire format:
//! - [`DeviceIdentity`] is the IMEI carried by login frames
//! - [`CourseStatus`] unpacks the 16-bit course/flags field and signs coordinates
//! - [`TerminalInfo`], [`VoltageLevel`] and [`GsmSignal`] classify status bytes
//! - [`GpsFix`] is a decoded position report
//! - [`DecodedEvent`] wraps any decoded [`Message`] with its receive time and identity
//!
//! ## Usage Example
//!
//! ```rust
//! use gt06_gateway::types::{CourseStatus, TerminalInfo, AlarmKind};
//!
//! let course = CourseStatus::new(0x1554);
//! assert_eq!(course.heading(), 340);
//! assert!(course.is_northern());
//!
//! let info = TerminalInfo::decode(0x22);
//! assert!(info.ignition);
//! assert_eq!(info.alarm, AlarmKind::Sos);
//! ```

mod course;
mod event;
mod fix;
mod identity;
mod message_type;
mod terminal;

pub use course::{
    CourseStatus, GPS_POSITIONED, HEADING_MASK, NORTH_LATITUDE, REAL_TIME_GPS, WEST_LONGITUDE,
};
pub use event::{AlarmReport, DecodedEvent, LoginInfo, Message, StatusReport};
pub use fix::{CellTower, GpsFix, Satellites};
pub use identity::DeviceIdentity;
pub use message_type::MessageType;
pub use terminal::{AlarmKind, GsmSignal, TerminalInfo, VoltageLevel, terminal_bits};
