//! Acknowledgement frames

use bytes::Bytes;

use super::{TYPE_OFFSET, seal};
use crate::{GatewayError, Result};

/// Reply template: `78 78 05 <type> 00 01 <crc> 0D 0A`.
pub const ACK_TEMPLATE: [u8; 10] = [0x78, 0x78, 0x05, 0x00, 0x00, 0x01, 0x00, 0x00, 0x0D, 0x0A];

/// Build the acknowledgement for `frame`, echoing its protocol number.
pub fn build_ack(frame: &[u8]) -> Result<Bytes> {
    let code = *frame
        .get(TYPE_OFFSET)
        .ok_or_else(|| GatewayError::truncated("frame header", TYPE_OFFSET + 1, frame.len()))?;

    let mut reply = ACK_TEMPLATE;
    reply[TYPE_OFFSET] = code;
    seal(&mut reply);
    Ok(Bytes::copy_from_slice(&reply))
}
