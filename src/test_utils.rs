//! Test utilities for building GT06 frames
//!
//! Builders produce byte-exact frames with correct length bytes and
//! checksums, so tests can focus on the field values they care about.

#![cfg(any(test, feature = "benchmark"))]

use crate::protocol::{START_MARKER, TRAILER, seal};
use crate::types::MessageType;

/// Login frame for IMEI 123456789012345, serial 1, as documented by the vendor.
pub const LOGIN_FRAME_123456789012345: [u8; 18] = [
    0x78, 0x78, 0x0D, 0x01, 0x01, 0x23, 0x45, 0x67, 0x89, 0x01, 0x23, 0x45, 0x00, 0x01, 0x8C, 0xDD,
    0x0D, 0x0A,
];

/// Fix time used by the location and alarm builders: 2011-12-28 10:30:15 UTC.
pub const FIX_TIME: [u8; 6] = [0x0B, 0x0C, 0x1C, 0x0A, 0x1E, 0x0F];

/// Builder for arbitrary frames.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    code: u8,
    payload: Vec<u8>,
    serial: u16,
}

impl FrameBuilder {
    pub fn new(code: u8) -> Self {
        Self { code, payload: Vec::new(), serial: 1 }
    }

    pub fn payload(mut self, payload: &[u8]) -> Self {
        self.payload = payload.to_vec();
        self
    }

    pub fn serial(mut self, serial: u16) -> Self {
        self.serial = serial;
        self
    }

    /// Assemble the frame and compute its checksum.
    pub fn build(&self) -> Vec<u8> {
        let length = 1 + self.payload.len() + 2 + 2;
        let mut frame = Vec::with_capacity(length + 5);
        frame.extend_from_slice(&START_MARKER);
        frame.push(length as u8);
        frame.push(self.code);
        frame.extend_from_slice(&self.payload);
        frame.extend_from_slice(&self.serial.to_be_bytes());
        frame.extend_from_slice(&[0, 0]);
        frame.extend_from_slice(&TRAILER);
        seal(&mut frame);
        frame
    }
}

/// Login frame carrying `imei` as 16 BCD digits.
pub fn login_frame(imei: u64, serial: u16) -> Vec<u8> {
    let digits = format!("{:016}", imei % 10_000_000_000_000_000);
    let identity: Vec<u8> = digits
        .as_bytes()
        .chunks(2)
        .map(|pair| ((pair[0] - b'0') << 4) | (pair[1] - b'0'))
        .collect();

    FrameBuilder::new(MessageType::LOGIN).payload(&identity).serial(serial).build()
}

fn gps_payload(raw_latitude: u32, raw_longitude: u32, course: u16) -> Vec<u8> {
    let mut payload = Vec::with_capacity(26);
    payload.extend_from_slice(&FIX_TIME);
    payload.push(0xC5);
    payload.extend_from_slice(&raw_latitude.to_be_bytes());
    payload.extend_from_slice(&raw_longitude.to_be_bytes());
    payload.push(60);
    payload.extend_from_slice(&course.to_be_bytes());
    payload
}

/// Location frame with fixed time, 12/5 satellites, 60 km/h and a fixed cell.
pub fn location_frame(raw_latitude: u32, raw_longitude: u32, course: u16, serial: u16) -> Vec<u8> {
    let mut payload = gps_payload(raw_latitude, raw_longitude, course);
    // MCC 460, MNC 0, LAC 0x287D, cell 0x001FB8
    payload.extend_from_slice(&[0x01, 0xCC, 0x00, 0x28, 0x7D, 0x00, 0x1F, 0xB8]);

    FrameBuilder::new(MessageType::LOCATION).payload(&payload).serial(serial).build()
}

/// Status frame with alarm/language `0x0002`.
pub fn status_frame(terminal: u8, voltage: u8, gsm: u8, serial: u16) -> Vec<u8> {
    FrameBuilder::new(MessageType::STATUS)
        .payload(&[terminal, voltage, gsm, 0x00, 0x02])
        .serial(serial)
        .build()
}

/// Alarm frame with voltage level 5 and GSM level 4.
pub fn alarm_frame(
    raw_latitude: u32,
    raw_longitude: u32,
    course: u16,
    terminal: u8,
    alarm_language: u16,
    serial: u16,
) -> Vec<u8> {
    let mut payload = gps_payload(raw_latitude, raw_longitude, course);
    // LBS length, MCC 460, MNC 1, LAC 0x287D, cell 0x001FB8
    payload.extend_from_slice(&[0x08, 0x01, 0xCC, 0x01, 0x28, 0x7D, 0x00, 0x1F, 0xB8]);
    payload.extend_from_slice(&[terminal, 5, 4]);
    payload.extend_from_slice(&alarm_language.to_be_bytes());

    FrameBuilder::new(MessageType::ALARM).payload(&payload).serial(serial).build()
}

/// Whether `data` contains the start marker anywhere.
pub fn contains_start_marker(data: &[u8]) -> bool {
    data.windows(START_MARKER.len()).any(|window| window == START_MARKER)
}

/// Install a test subscriber honouring `RUST_LOG`; safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
