//! Location sink trait for the persistence collaborator

use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use crate::types::{DecodedEvent, DeviceIdentity, Message};
use crate::{GatewayError, Result};

/// One decoded position, ready for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub device: DeviceIdentity,
    pub latitude: f64,
    pub longitude: f64,
    /// km/h
    pub speed: u8,
    pub heading: u16,
    /// Device fix time, or the receive time when the device clock is unset
    pub fixed_at: DateTime<Utc>,
}

impl LocationRecord {
    /// Build a record from a location event.
    ///
    /// Fails with [`GatewayError::UnidentifiedDevice`] when the event was decoded
    /// before any login, and returns `Ok(None)` for non-location events.
    pub fn from_event(event: &DecodedEvent) -> Result<Option<Self>> {
        let Message::Location { fix, .. } = &event.message else {
            return Ok(None);
        };
        let device = event.device.ok_or(GatewayError::UnidentifiedDevice)?;

        Ok(Some(Self {
            device,
            latitude: fix.latitude,
            longitude: fix.longitude,
            speed: fix.speed,
            heading: fix.heading(),
            fixed_at: fix.fixed_at.unwrap_or(event.received_at),
        }))
    }
}

/// Destination for decoded location fixes
///
/// Implementations are shared by every connection and must tolerate
/// concurrent calls. A failed store is logged by the caller and not retried.
#[async_trait::async_trait]
pub trait LocationSink: Send + Sync + 'static {
    /// Store one fix.
    async fn store_location_fix(&self, record: LocationRecord) -> Result<()>;
}

/// Sink that only logs each fix
#[derive(Debug, Default, Clone)]
pub struct LoggingSink;

#[async_trait::async_trait]
impl LocationSink for LoggingSink {
    async fn store_location_fix(&self, record: LocationRecord) -> Result<()> {
        info!(
            device = record.device.value(),
            latitude = record.latitude,
            longitude = record.longitude,
            speed = record.speed,
            heading = record.heading,
            fixed_at = %record.fixed_at,
            "Location fix"
        );
        Ok(())
    }
}

/// Sink that hands fixes to an in-process consumer over a bounded channel
///
/// A full channel applies backpressure to the connection that produced the
/// fix. Once the [`LocationStream`] is dropped, stores fail.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<LocationRecord>,
}

impl ChannelSink {
    /// Create a sink and the stream that receives its records.
    pub fn new(capacity: usize) -> (Self, LocationStream) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, LocationStream { inner: ReceiverStream::new(receiver) })
    }
}

#[async_trait::async_trait]
impl LocationSink for ChannelSink {
    async fn store_location_fix(&self, record: LocationRecord) -> Result<()> {
        self.sender
            .send(record)
            .await
            .map_err(|_| GatewayError::sink_failed("location stream receiver dropped"))
    }
}

/// Stream of records stored through a [`ChannelSink`]
#[derive(Debug)]
pub struct LocationStream {
    inner: ReceiverStream<LocationRecord>,
}

impl Stream for LocationStream {
    type Item = LocationRecord;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
