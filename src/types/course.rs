//! Course/status bitfield carried by location and alarm frames

use serde::{Deserialize, Serialize};

/// Heading degrees, low 10 bits.
pub const HEADING_MASK: u16 = 0x03FF;
/// Northern latitude when set.
pub const NORTH_LATITUDE: u16 = 0x0400;
/// Western longitude when set.
pub const WEST_LONGITUDE: u16 = 0x0800;
/// Position is a GPS fix.
pub const GPS_POSITIONED: u16 = 0x1000;
/// Real-time (as opposed to differential) GPS.
pub const REAL_TIME_GPS: u16 = 0x2000;

/// The 16-bit course/flags field overloading heading with hemisphere and fix flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseStatus(pub u16);

impl CourseStatus {
    /// Create a new CourseStatus from the raw field.
    pub fn new(value: u16) -> Self {
        Self(value)
    }

    /// Check if a specific flag is set using a bitmask.
    pub fn has_flag(&self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    /// Heading in degrees (0..=1023 on the wire, 0..360 in practice).
    pub fn heading(&self) -> u16 {
        self.0 & HEADING_MASK
    }

    pub fn is_northern(&self) -> bool {
        self.has_flag(NORTH_LATITUDE)
    }

    pub fn is_western(&self) -> bool {
        self.has_flag(WEST_LONGITUDE)
    }

    pub fn gps_positioned(&self) -> bool {
        self.has_flag(GPS_POSITIONED)
    }

    pub fn real_time_gps(&self) -> bool {
        self.has_flag(REAL_TIME_GPS)
    }

    /// Get the raw u16 value.
    pub fn value(&self) -> u16 {
        self.0
    }

    /// Signed latitude in degrees from the raw wire value.
    pub fn latitude(&self, raw: u32) -> f64 {
        coordinate_degrees(raw, !self.is_northern())
    }

    /// Signed longitude in degrees from the raw wire value.
    pub fn longitude(&self, raw: u32) -> f64 {
        coordinate_degrees(raw, self.is_western())
    }
}

/// Raw coordinates are in units of 1/30000 minute; rounded to 6 decimals.
fn coordinate_degrees(raw: u32, negative: bool) -> f64 {
    let degrees = f64::from(raw) / 60.0 / 30000.0;
    let rounded = (degrees * 1_000_000.0).round() / 1_000_000.0;
    if negative { -rounded } else { rounded }
}
