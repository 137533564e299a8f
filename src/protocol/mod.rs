//! GT06 wire protocol
//!
//! Frame layout (all multi-byte fields big-endian):
//!
//! ```text
//! 78 78 | len | type | payload ... | serial (2) | crc (2) | 0D 0A
//! ```
//!
//! `len` counts the bytes from `type` through `crc`, so a whole frame is
//! `len + 5` bytes. The checksum covers `len` through `serial`.

mod ack;
mod checksum;
mod decode;
mod demux;

pub use ack::{ACK_TEMPLATE, build_ack};
pub use checksum::{checksum, validate, verify};
pub use decode::{decode_alarm, decode_frame, decode_location, decode_login, decode_status};
pub use demux::{FrameAssembler, split};

pub(crate) use checksum::seal;

/// Start marker opening every frame.
pub const START_MARKER: [u8; 2] = [0x78, 0x78];
/// Line ending closing every frame.
pub const TRAILER: [u8; 2] = [0x0D, 0x0A];

pub const START_MARKER_LEN: usize = START_MARKER.len();
pub const TRAILER_LEN: usize = TRAILER.len();
pub const CHECKSUM_LEN: usize = 2;
pub const SERIAL_LEN: usize = 2;

/// Offset of the packet length byte.
pub const LENGTH_OFFSET: usize = 2;
/// Offset of the protocol number (message type) byte.
pub const TYPE_OFFSET: usize = 3;

/// Bytes of a frame not counted by its length byte: marker, length, trailer.
pub const FRAME_OVERHEAD: usize = START_MARKER_LEN + 1 + TRAILER_LEN;
/// Marker, length, type, serial, checksum and trailer with an empty payload.
pub const MIN_FRAME_LEN: usize = FRAME_OVERHEAD + 1 + SERIAL_LEN + CHECKSUM_LEN;
/// Largest frame a one-byte length field can describe.
pub const MAX_FRAME_LEN: usize = u8::MAX as usize + FRAME_OVERHEAD;

/// Total frame length implied by a packet length byte.
pub fn frame_len(packet_length: u8) -> usize {
    usize::from(packet_length) + FRAME_OVERHEAD
}

/// Lowercase hex rendering for log lines.
pub(crate) fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}
