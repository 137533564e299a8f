//! Per-connection decoder state
//!
//! A [`Session`] turns socket chunks into [`DecodedEvent`]s. It holds the only
//! long-lived mutable state of a connection: the device identity bound by the
//! first login. Every decoded frame becomes an immutable event on a staging
//! list that the connection handler drains after each read.

use std::collections::VecDeque;

use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, trace, warn};

use crate::protocol::{self, FrameAssembler, TYPE_OFFSET, hex};
use crate::types::{DecodedEvent, DeviceIdentity, Message, MessageType};
use crate::{GatewayError, Result};

/// How chunks are cut into candidate frames.
#[derive(Debug)]
pub enum Framing {
    /// Buffer incomplete frames across reads.
    Reassemble(FrameAssembler),
    /// Split every read on its own; frames straddling reads are lost.
    PerRead,
}

/// Result of processing one candidate frame.
#[derive(Debug)]
pub enum FrameOutcome {
    /// The frame decoded into an event. `ack` must be written before the next frame.
    Decoded { kind: MessageType, ack: Option<Bytes> },
    /// The frame was dropped; siblings are unaffected.
    Skipped(GatewayError),
}

/// Decoder state for one TCP connection.
#[derive(Debug)]
pub struct Session {
    identity: Option<DeviceIdentity>,
    framing: Framing,
    pending: VecDeque<Bytes>,
    events: Vec<DecodedEvent>,
}

impl Session {
    pub fn new(framing: Framing) -> Self {
        Self { identity: None, framing, pending: VecDeque::new(), events: Vec::new() }
    }

    /// Session that reassembles frames, buffering at most `max_buffered` bytes.
    pub fn reassembling(max_buffered: usize) -> Self {
        Self::new(Framing::Reassemble(FrameAssembler::new(max_buffered)))
    }

    /// Session that splits each read independently.
    pub fn per_read() -> Self {
        Self::new(Framing::PerRead)
    }

    /// Identity bound by the first successful login, if any.
    pub fn identity(&self) -> Option<DeviceIdentity> {
        self.identity
    }

    /// Events decoded since the last drain.
    pub fn events(&self) -> &[DecodedEvent] {
        &self.events
    }

    /// Candidate frames waiting to be processed.
    pub fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    /// Queue the candidate frames of one chunk.
    ///
    /// Fails when the chunk does not begin with the start marker (nothing is
    /// queued) or the reassembly buffer overflowed. Returns the number of
    /// candidates queued.
    pub fn receive(&mut self, chunk: &[u8]) -> Result<usize> {
        trace!(len = chunk.len(), bytes = %hex(chunk), "Received chunk");
        let before = self.pending.len();

        match &mut self.framing {
            Framing::Reassemble(assembler) => {
                assembler.push(chunk)?;
                while let Some(frame) = assembler.next_frame() {
                    self.pending.push_back(frame);
                }
            }
            Framing::PerRead => {
                for frame in protocol::split(chunk)? {
                    self.pending.push_back(Bytes::copy_from_slice(frame));
                }
            }
        }

        Ok(self.pending.len() - before)
    }

    /// Validate and decode the next queued frame.
    pub fn process_next(&mut self) -> Option<FrameOutcome> {
        let frame = self.pending.pop_front()?;
        Some(match self.process_frame(&frame) {
            Ok((kind, ack)) => FrameOutcome::Decoded { kind, ack },
            Err(error) => {
                warn!(
                    %error,
                    code = frame.get(TYPE_OFFSET).copied().unwrap_or_default(),
                    frame = %hex(&frame),
                    "Skipping frame"
                );
                FrameOutcome::Skipped(error)
            }
        })
    }

    /// Validate, decode and record a single frame.
    ///
    /// Returns the message type and, for login and status frames, the
    /// acknowledgement to send back.
    pub fn process_frame(&mut self, frame: &[u8]) -> Result<(MessageType, Option<Bytes>)> {
        protocol::verify(frame)?;
        let message = protocol::decode_frame(frame)?;
        let kind = message.message_type();

        if let Message::Login(login) = &message {
            self.bind_identity(login.identity);
        }

        let device = match &message {
            Message::Login(login) => Some(login.identity),
            _ => self.identity,
        };

        debug!(kind = %kind, device = ?device.map(|d| d.value()), "Decoded frame");
        self.events.push(DecodedEvent {
            code: kind.code(),
            received_at: Utc::now(),
            device,
            message,
        });

        let ack = if kind.requires_ack() { Some(protocol::build_ack(frame)?) } else { None };
        Ok((kind, ack))
    }

    /// Queue a chunk and process it completely, returning acknowledgements in
    /// frame order along with the number of skipped frames.
    pub fn ingest(&mut self, chunk: &[u8]) -> Result<(Vec<Bytes>, usize)> {
        self.receive(chunk)?;

        let mut acks = Vec::new();
        let mut skipped = 0;
        while let Some(outcome) = self.process_next() {
            match outcome {
                FrameOutcome::Decoded { ack: Some(ack), .. } => acks.push(ack),
                FrameOutcome::Decoded { ack: None, .. } => {}
                FrameOutcome::Skipped(_) => skipped += 1,
            }
        }
        Ok((acks, skipped))
    }

    /// Take the staged events, leaving the list empty.
    pub fn drain_events(&mut self) -> Vec<DecodedEvent> {
        std::mem::take(&mut self.events)
    }

    fn bind_identity(&mut self, identity: DeviceIdentity) {
        match self.identity {
            None => {
                debug!(device = identity.value(), "Device logged in");
                self.identity = Some(identity);
            }
            Some(bound) if bound == identity => {}
            Some(bound) => warn!(
                bound = bound.value(),
                claimed = identity.value(),
                "Login for a different device on a bound connection, keeping first identity"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        FrameBuilder, LOGIN_FRAME_123456789012345, alarm_frame, location_frame, login_frame,
        status_frame,
    };

    fn chunk(frames: &[&[u8]]) -> Vec<u8> {
        frames.concat()
    }

    #[test]
    fn login_then_location() {
        let location = location_frame(0x026B_3F3E, 0x0C38_C9A0, 0x1554, 2);
        let mut session = Session::reassembling(1024);

        let (acks, skipped) =
            session.ingest(&chunk(&[&LOGIN_FRAME_123456789012345, &location])).unwrap();

        assert_eq!(skipped, 0);
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0][TYPE_OFFSET], MessageType::LOGIN);

        let identity = DeviceIdentity::new(123_456_789_012_345);
        assert_eq!(session.identity(), Some(identity));

        let events = session.drain_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message_type(), MessageType::Login);
        assert_eq!(events[0].device, Some(identity));
        assert_eq!(events[1].message_type(), MessageType::Location);
        assert_eq!(events[1].code, 0x12);
        assert_eq!(events[1].device, Some(identity));
        assert!(session.events().is_empty());
    }

    #[test]
    fn corrupted_middle_frame_is_skipped() {
        let first = status_frame(0x44, 4, 3, 1);
        let mut second = location_frame(0x026B_3F3E, 0x0C38_C9A0, 0x1554, 2);
        let last = second.len() - 3;
        second[last] ^= 0x5A;
        let third = status_frame(0x45, 5, 4, 3);

        for mut session in [Session::reassembling(1024), Session::per_read()] {
            let (acks, skipped) = session.ingest(&chunk(&[&first, &second, &third])).unwrap();
            assert_eq!(skipped, 1);
            assert_eq!(acks.len(), 2);

            let events = session.drain_events();
            assert_eq!(events.len(), 2);
            assert!(events.iter().all(|event| event.message_type() == MessageType::Status));
        }
    }

    #[test]
    fn overlong_length_byte_does_not_hold_back_login() {
        let mut bad = status_frame(0x44, 4, 3, 1);
        bad[2] = 0xFF;
        let login = login_frame(123_456_789_012_345, 2);

        for mut session in [Session::reassembling(4096), Session::per_read()] {
            let (acks, skipped) = session.ingest(&chunk(&[&bad, &login])).unwrap();
            assert_eq!(skipped, 1);
            assert_eq!(acks.len(), 1);
            assert_eq!(acks[0][3], MessageType::LOGIN);
            assert_eq!(session.identity(), Some(DeviceIdentity::new(123_456_789_012_345)));
        }
    }

    #[test]
    fn unknown_type_yields_nothing() {
        let frame = FrameBuilder::new(0x99).payload(&[0x01, 0x02, 0x03, 0x04]).serial(5).build();
        let mut session = Session::reassembling(1024);

        let (acks, skipped) = session.ingest(&frame).unwrap();
        assert!(acks.is_empty());
        assert_eq!(skipped, 1);
        assert!(session.drain_events().is_empty());
    }

    #[test]
    fn unaligned_chunk_aborts_only_that_chunk() {
        let mut session = Session::reassembling(1024);
        let err = session.ingest(&[0x00, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, GatewayError::MissingStartMarker { len: 3 }));

        let (acks, _) = session.ingest(&LOGIN_FRAME_123456789012345).unwrap();
        assert_eq!(acks.len(), 1);
    }

    #[test]
    fn events_before_login_have_no_identity() {
        let mut session = Session::reassembling(1024);
        session.ingest(&location_frame(1, 2, 0x1400, 1)).unwrap();

        let events = session.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].device, None);
    }

    #[test]
    fn identity_is_bound_once() {
        let mut session = Session::reassembling(1024);
        session.ingest(&login_frame(111_111_111_111_111, 1)).unwrap();
        let (acks, _) = session.ingest(&login_frame(222_222_222_222_222, 2)).unwrap();

        assert_eq!(acks.len(), 1);
        assert_eq!(session.identity(), Some(DeviceIdentity::new(111_111_111_111_111)));

        let events = session.drain_events();
        assert_eq!(events[1].device, Some(DeviceIdentity::new(222_222_222_222_222)));
    }

    #[test]
    fn fragmented_frame_is_reassembled() {
        let location = location_frame(0x026B_3F3E, 0x0C38_C9A0, 0x1554, 2);
        let stream = chunk(&[&LOGIN_FRAME_123456789012345, &location]);
        let (head, tail) = stream.split_at(25);

        let mut session = Session::reassembling(1024);
        let (acks, _) = session.ingest(head).unwrap();
        assert_eq!(acks.len(), 1);
        assert_eq!(session.drain_events().len(), 1);

        let (acks, skipped) = session.ingest(tail).unwrap();
        assert!(acks.is_empty());
        assert_eq!(skipped, 0);
        let events = session.drain_events();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_location());
    }

    #[test]
    fn per_read_framing_drops_fragments() {
        let location = location_frame(0x026B_3F3E, 0x0C38_C9A0, 0x1554, 2);
        let (head, tail) = location.split_at(20);

        let mut session = Session::per_read();
        let (_, skipped) = session.ingest(head).unwrap();
        assert_eq!(skipped, 1);
        assert!(session.ingest(tail).is_err());
        assert!(session.drain_events().is_empty());
    }

    #[test]
    fn alarm_carries_fix_and_status() {
        let mut session = Session::reassembling(1024);
        session.ingest(&LOGIN_FRAME_123456789012345).unwrap();
        let (acks, _) =
            session.ingest(&alarm_frame(0x026B_3F3E, 0x0C38_C9A0, 0x1554, 0x22, 0x0102, 3)).unwrap();
        assert!(acks.is_empty());

        let events = session.drain_events();
        let alarm = &events[1];
        assert_eq!(alarm.message_type(), MessageType::Alarm);
        assert!(alarm.message.fix().is_some());
        assert!(!alarm.is_location());
    }
}
