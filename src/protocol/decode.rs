//! Message decoders
//!
//! Each decoder reads a checksum-validated frame at fixed, per-type offsets.
//! Decoders are pure: they carry no connection state and never see the device
//! identity, which the session attaches afterwards.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tracing::debug;

use super::{CHECKSUM_LEN, SERIAL_LEN, TRAILER_LEN, TYPE_OFFSET};
use crate::types::{
    AlarmReport, CellTower, CourseStatus, DeviceIdentity, GpsFix, GsmSignal, LoginInfo, Message,
    MessageType, Satellites, StatusReport, TerminalInfo, VoltageLevel,
};
use crate::{GatewayError, Result};

// Login (0x01)
const LOGIN_IDENTITY: usize = 4;
const LOGIN_IDENTITY_LEN: usize = 8;

// Location (0x12) and the GPS block of Alarm (0x16)
const GPS_DATETIME: usize = 4;
const GPS_SATELLITES: usize = 10;
const GPS_LATITUDE: usize = 11;
const GPS_LONGITUDE: usize = 15;
const GPS_SPEED: usize = 19;
const GPS_COURSE: usize = 20;
const LOCATION_MCC: usize = 22;
const LOCATION_PAYLOAD_END: usize = 30;

// Alarm (0x16): LBS block is prefixed by its own length byte
const ALARM_MCC: usize = 23;
const ALARM_TERMINAL: usize = 31;
const ALARM_PAYLOAD_END: usize = 36;

// Status (0x13)
const STATUS_TERMINAL: usize = 4;
const STATUS_PAYLOAD_END: usize = 9;

/// Bytes after the payload: serial, checksum, trailer.
const FRAME_TAIL: usize = SERIAL_LEN + CHECKSUM_LEN + TRAILER_LEN;

/// Decode a checksum-validated frame by its protocol number.
pub fn decode_frame(frame: &[u8]) -> Result<Message> {
    let code = *frame
        .get(TYPE_OFFSET)
        .ok_or_else(|| GatewayError::truncated("frame header", TYPE_OFFSET + 1, frame.len()))?;

    match MessageType::try_from(code)? {
        MessageType::Login => decode_login(frame).map(Message::Login),
        MessageType::Location => {
            let (fix, serial) = decode_location(frame)?;
            Ok(Message::Location { fix, serial })
        }
        MessageType::Status => decode_status(frame).map(Message::Status),
        MessageType::Alarm => decode_alarm(frame).map(Message::Alarm),
    }
}

/// Decode a login frame: BCD device identity and serial number.
pub fn decode_login(frame: &[u8]) -> Result<LoginInfo> {
    let payload_end = LOGIN_IDENTITY + LOGIN_IDENTITY_LEN;
    require(frame, payload_end, "login payload")?;

    let identity = DeviceIdentity::from_bcd(&frame[LOGIN_IDENTITY..payload_end])?;
    Ok(LoginInfo { identity, serial: serial_number(frame) })
}

/// Decode a location frame into a fix and its serial number.
pub fn decode_location(frame: &[u8]) -> Result<(GpsFix, u16)> {
    require(frame, LOCATION_PAYLOAD_END, "location payload")?;

    let cell = CellTower {
        mcc: read_u16(frame, LOCATION_MCC)?,
        mnc: read_u8(frame, LOCATION_MCC + 2)?,
        lac: read_u16(frame, LOCATION_MCC + 3)?,
        cell_id: read_u24(frame, LOCATION_MCC + 5)?,
    };

    Ok((gps_block(frame, cell)?, serial_number(frame)))
}

/// Decode a status (heartbeat) frame.
pub fn decode_status(frame: &[u8]) -> Result<StatusReport> {
    require(frame, STATUS_PAYLOAD_END, "status payload")?;

    Ok(StatusReport {
        terminal: TerminalInfo::decode(read_u8(frame, STATUS_TERMINAL)?),
        voltage: VoltageLevel::from_level(read_u8(frame, STATUS_TERMINAL + 1)?),
        gsm_signal: GsmSignal::from_level(read_u8(frame, STATUS_TERMINAL + 2)?),
        alarm_language: read_u16(frame, STATUS_TERMINAL + 3)?,
        serial: serial_number(frame),
    })
}

/// Decode an alarm frame: a fix, LBS block and the status bytes.
pub fn decode_alarm(frame: &[u8]) -> Result<AlarmReport> {
    require(frame, ALARM_PAYLOAD_END, "alarm payload")?;

    let cell = CellTower {
        mcc: read_u16(frame, ALARM_MCC)?,
        mnc: read_u8(frame, ALARM_MCC + 2)?,
        lac: read_u16(frame, ALARM_MCC + 3)?,
        cell_id: read_u24(frame, ALARM_MCC + 5)?,
    };

    Ok(AlarmReport {
        fix: gps_block(frame, cell)?,
        terminal: TerminalInfo::decode(read_u8(frame, ALARM_TERMINAL)?),
        voltage: VoltageLevel::from_level(read_u8(frame, ALARM_TERMINAL + 1)?),
        gsm_signal: GsmSignal::from_level(read_u8(frame, ALARM_TERMINAL + 2)?),
        alarm_language: read_u16(frame, ALARM_TERMINAL + 3)?,
        serial: serial_number(frame),
    })
}

/// Date/time, satellites, coordinates, speed and course at their shared offsets.
fn gps_block(frame: &[u8], cell: CellTower) -> Result<GpsFix> {
    let course = CourseStatus::new(read_u16(frame, GPS_COURSE)?);
    let raw_latitude = read_u32(frame, GPS_LATITUDE)?;
    let raw_longitude = read_u32(frame, GPS_LONGITUDE)?;

    Ok(GpsFix {
        fixed_at: fix_time(read_bytes(frame, GPS_DATETIME)?),
        satellites: Satellites::decode(read_u8(frame, GPS_SATELLITES)?),
        latitude: course.latitude(raw_latitude),
        longitude: course.longitude(raw_longitude),
        speed: read_u8(frame, GPS_SPEED)?,
        course,
        cell,
    })
}

/// `YY MM DD hh mm ss`, years counted from 2000, UTC.
///
/// Trackers without a clock sync send zeros here; those yield `None` and the
/// position is kept.
fn fix_time([year, month, day, hour, minute, second]: [u8; 6]) -> Option<DateTime<Utc>> {
    let fixed_at = NaiveDate::from_ymd_opt(2000 + i32::from(year), u32::from(month), u32::from(day))
        .and_then(|date| date.and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second)))
        .map(|naive| Utc.from_utc_datetime(&naive));

    if fixed_at.is_none() {
        debug!(
            "Fix time {:02}-{:02}-{:02} {:02}:{:02}:{:02} is not a calendar date",
            year, month, day, hour, minute, second
        );
    }
    fixed_at
}

/// Require the payload to end before the serial/checksum/trailer tail.
fn require(frame: &[u8], payload_end: usize, context: &str) -> Result<()> {
    let needed = payload_end + FRAME_TAIL;
    if frame.len() < needed {
        return Err(GatewayError::truncated(context, needed, frame.len()));
    }
    Ok(())
}

/// Serial number, always just before the checksum.
fn serial_number(frame: &[u8]) -> u16 {
    let at = frame.len() - FRAME_TAIL;
    u16::from_be_bytes([frame[at], frame[at + 1]])
}

/// Safe byte parsing helpers with bounds checking
fn read_bytes<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N]> {
    data.get(offset..offset + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| GatewayError::truncated(format!("field at offset {}", offset), offset + N, data.len()))
}

fn read_u8(data: &[u8], offset: usize) -> Result<u8> {
    read_bytes::<1>(data, offset).map(|[byte]| byte)
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    read_bytes(data, offset).map(u16::from_be_bytes)
}

fn read_u24(data: &[u8], offset: usize) -> Result<u32> {
    read_bytes::<3>(data, offset).map(|[a, b, c]| u32::from_be_bytes([0, a, b, c]))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    read_bytes(data, offset).map(u32::from_be_bytes)
}
