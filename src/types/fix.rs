//! GPS fix payload shared by location and alarm frames

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CourseStatus;

/// Satellite counts packed into one byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Satellites {
    /// High nibble
    pub visible: u8,
    /// Low nibble, satellites used in the fix
    pub active: u8,
}

impl Satellites {
    pub fn decode(raw: u8) -> Self {
        Self { visible: raw >> 4, active: raw & 0x0F }
    }
}

/// Serving cell (LBS) information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellTower {
    /// Mobile country code
    pub mcc: u16,
    /// Mobile network code
    pub mnc: u8,
    /// Location area code
    pub lac: u16,
    /// 24-bit cell id
    pub cell_id: u32,
}

/// A decoded GPS position report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    /// Device clock; `None` until the tracker has a valid date
    pub fixed_at: Option<DateTime<Utc>>,
    pub satellites: Satellites,
    /// Signed degrees, 6 decimals
    pub latitude: f64,
    /// Signed degrees, 6 decimals
    pub longitude: f64,
    /// km/h
    pub speed: u8,
    pub course: CourseStatus,
    pub cell: CellTower,
}

impl GpsFix {
    /// Heading in degrees
    pub fn heading(&self) -> u16 {
        self.course.heading()
    }

    pub fn is_positioned(&self) -> bool {
        self.course.gps_positioned()
    }
}
