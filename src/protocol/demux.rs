//! Frame demultiplexing
//!
//! TCP reads do not line up with frames: one read may carry several frames,
//! and a frame may end in the next read. [`split`] cuts a single read at start
//! markers. [`FrameAssembler`] keeps a per-connection buffer and only emits a
//! frame once all of its bytes have arrived.

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace, warn};

use super::{LENGTH_OFFSET, START_MARKER, START_MARKER_LEN, TRAILER, TRAILER_LEN, frame_len, hex};
use crate::{GatewayError, Result};

/// Position of the next start marker at or after `from`.
fn find_marker(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(START_MARKER_LEN)
        .position(|window| window == START_MARKER)
        .map(|position| position + from)
}

/// Split one chunk into candidate frames at start markers.
///
/// Every range between consecutive markers, and the tail after the last one,
/// is a candidate. Candidates are not validated here. A chunk that does not
/// begin with the marker is rejected as a whole.
pub fn split(chunk: &[u8]) -> Result<Vec<&[u8]>> {
    if !chunk.starts_with(&START_MARKER) {
        return Err(GatewayError::MissingStartMarker { len: chunk.len() });
    }

    let mut frames = Vec::new();
    let mut start = 0;
    while let Some(next) = find_marker(chunk, start + START_MARKER_LEN) {
        frames.push(&chunk[start..next]);
        start = next;
    }
    frames.push(&chunk[start..]);

    Ok(frames)
}

/// Per-connection reassembly buffer.
///
/// A frame is emitted once `length + 5` bytes are buffered and end with the
/// `0D 0A` trailer. When the trailer is not where the length byte says, the
/// buffer is cut at the next start marker instead, so the damaged candidate
/// fails its checksum and the stream resynchronises. A frame whose length
/// byte claims more bytes than are buffered is also cut early when a trailer
/// followed by a start marker shows that the next frame has begun. Other
/// incomplete tails stay buffered for the next read.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: BytesMut,
    max_buffered: usize,
}

impl FrameAssembler {
    /// Create an assembler holding at most `max_buffered` unconsumed bytes.
    pub fn new(max_buffered: usize) -> Self {
        Self { buffer: BytesMut::with_capacity(max_buffered.min(4096)), max_buffered }
    }

    /// Bytes waiting for the rest of their frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop anything buffered.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Append a chunk read from the socket.
    ///
    /// With nothing buffered, the chunk must begin with the start marker (a
    /// one-byte chunk must be its first byte). Otherwise the chunk is dropped
    /// and [`GatewayError::MissingStartMarker`] returned.
    pub fn push(&mut self, chunk: &[u8]) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        if self.buffer.is_empty() {
            let head = chunk.len().min(START_MARKER_LEN);
            if chunk[..head] != START_MARKER[..head] {
                return Err(GatewayError::MissingStartMarker { len: chunk.len() });
            }
        }

        if self.buffer.len() + chunk.len() > self.max_buffered {
            warn!(
                buffered = self.buffer.len(),
                incoming = chunk.len(),
                capacity = self.max_buffered,
                "Reassembly buffer overflow, discarding buffered bytes"
            );
            self.buffer.clear();
            return Err(GatewayError::BufferOverflow { capacity: self.max_buffered });
        }

        self.buffer.extend_from_slice(chunk);
        trace!(buffered = self.buffer.len(), "Buffered chunk");
        Ok(())
    }

    /// Take the next complete candidate frame, if one is buffered.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        loop {
            if !self.buffer.starts_with(&START_MARKER[..self.buffer.len().min(START_MARKER_LEN)]) {
                self.resync();
                continue;
            }

            if self.buffer.len() <= LENGTH_OFFSET {
                return None;
            }

            let total = frame_len(self.buffer[LENGTH_OFFSET]);
            if self.buffer.len() < total {
                // A later frame has already begun: the length byte overstates this one.
                if let Some(cut) = self.next_boundary() {
                    debug!(len = cut, claimed = total, "Length byte overruns next frame, cutting");
                    return Some(self.buffer.split_to(cut).freeze());
                }
                return None;
            }

            if self.buffer[total - TRAILER_LEN..total] == TRAILER {
                return Some(self.buffer.split_to(total).freeze());
            }

            // Length byte and trailer disagree: fall back to marker delimiting.
            let cut = find_marker(&self.buffer[..], START_MARKER_LEN).unwrap_or(total);
            debug!(len = cut, "Length-inconsistent frame, cutting at next start marker");
            return Some(self.buffer.split_to(cut).freeze());
        }
    }

    /// Offset of the first start marker that directly follows a trailer.
    fn next_boundary(&self) -> Option<usize> {
        let mut from = START_MARKER_LEN;
        while let Some(at) = find_marker(&self.buffer[..], from) {
            if at >= TRAILER_LEN && self.buffer[at - TRAILER_LEN..at] == TRAILER {
                return Some(at);
            }
            from = at + 1;
        }
        None
    }

    /// Discard bytes up to the next start marker.
    fn resync(&mut self) {
        match find_marker(&self.buffer[..], 1) {
            Some(at) => {
                warn!(discarded = at, bytes = %hex(&self.buffer[..at]), "Discarding bytes before start marker");
                self.buffer.advance(at);
            }
            None => {
                // keep a trailing half marker, it may be completed by the next read
                let keep = usize::from(self.buffer.last() == Some(&START_MARKER[0]));
                let discard = self.buffer.len() - keep;
                warn!(discarded = discard, "Discarding bytes with no start marker");
                self.buffer.advance(discard);
            }
        }
    }
}
