//! CRC-ITU checksum used by GT06 firmware
//!
//! CRC-16/X-25: reflected polynomial `0x8408`, initial value `0xFFFF`, final
//! complement. The checksum domain of a frame runs from the packet length byte
//! through the serial number, i.e. `frame[2..len - 4]`.

use super::{CHECKSUM_LEN, MIN_FRAME_LEN, START_MARKER_LEN, TRAILER_LEN};
use crate::{GatewayError, Result};

const CRC_ITU: crc::Crc<u16> = crc::Crc::<u16>::new(&crc::CRC_16_IBM_SDLC);

/// Compute the CRC-ITU checksum of `data`.
pub fn checksum(data: &[u8]) -> u16 {
    CRC_ITU.checksum(data)
}

/// Byte range covered by the checksum of a frame of `len` bytes.
pub(crate) fn checksum_domain(len: usize) -> std::ops::Range<usize> {
    START_MARKER_LEN..len - CHECKSUM_LEN - TRAILER_LEN
}

/// Big-endian checksum stored in the frame, just before the trailer.
pub(crate) fn stored_checksum(frame: &[u8]) -> u16 {
    let at = frame.len() - CHECKSUM_LEN - TRAILER_LEN;
    u16::from_be_bytes([frame[at], frame[at + 1]])
}

/// Check a frame's stored checksum against its contents.
///
/// Frames shorter than the minimum frame length never validate.
pub fn validate(frame: &[u8]) -> bool {
    verify(frame).is_ok()
}

/// Like [`validate`], but reports what went wrong.
pub fn verify(frame: &[u8]) -> Result<()> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(GatewayError::truncated("frame", MIN_FRAME_LEN, frame.len()));
    }

    let computed = checksum(&frame[checksum_domain(frame.len())]);
    let found = stored_checksum(frame);
    if computed != found {
        return Err(GatewayError::ChecksumMismatch { computed, found });
    }
    Ok(())
}

/// Recompute and write the checksum of a frame in place.
pub(crate) fn seal(frame: &mut [u8]) {
    let len = frame.len();
    let crc = checksum(&frame[checksum_domain(len)]);
    let at = len - CHECKSUM_LEN - TRAILER_LEN;
    frame[at..at + CHECKSUM_LEN].copy_from_slice(&crc.to_be_bytes());
}
