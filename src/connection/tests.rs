//! Connection handler tests
//!
//! These drive a handler over an in-memory duplex pipe and check what the
//! device would see (acknowledgements) and what the sink receives.

use super::*;
use crate::protocol::{TYPE_OFFSET, validate};
use crate::sink::ChannelSink;
use crate::test_utils::{
    FrameBuilder, LOGIN_FRAME_123456789012345, init_test_tracing, location_frame, status_frame,
};
use crate::types::DeviceIdentity;
use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::Mutex;

const PEER: &str = "10.0.0.7:40122";

/// Sink that records fixes and can be told to fail
#[derive(Default)]
struct RecordingSink {
    records: Mutex<Vec<LocationRecord>>,
    fail: bool,
}

#[async_trait::async_trait]
impl LocationSink for RecordingSink {
    async fn store_location_fix(&self, record: LocationRecord) -> Result<()> {
        if self.fail {
            return Err(GatewayError::sink_failed("database unavailable"));
        }
        self.records.lock().await.push(record);
        Ok(())
    }
}

fn handler(
    config: &GatewayConfig,
    sink: Arc<dyn LocationSink>,
) -> (ConnectionHandler<DuplexStream>, DuplexStream, CancellationToken) {
    init_test_tracing();
    let (client, server) = tokio::io::duplex(4096);
    let cancel = CancellationToken::new();
    let handler =
        ConnectionHandler::new(server, PEER.parse().unwrap(), config, sink, cancel.clone());
    (handler, client, cancel)
}

/// Send `chunks` as separate reads, close, and collect everything sent back.
///
/// Callers run with a paused clock so each chunk is consumed before the next.
async fn exchange(
    config: &GatewayConfig,
    sink: Arc<dyn LocationSink>,
    chunks: &[Vec<u8>],
) -> (ConnectionReport, Vec<u8>) {
    let (handler, mut client, _cancel) = handler(config, sink);
    let task = tokio::spawn(handler.run());

    for chunk in chunks {
        client.write_all(chunk).await.unwrap();
        // paused clock: the sleep only elapses once the handler is idle again
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    client.shutdown().await.unwrap();

    let report = task.await.unwrap();
    let mut replies = Vec::new();
    client.read_to_end(&mut replies).await.unwrap();
    (report, replies)
}

#[tokio::test(start_paused = true)]
async fn login_and_location_in_one_chunk() {
    let sink = Arc::new(RecordingSink::default());
    let location = location_frame(0x026B_3F3E, 0x0C38_C9A0, 0x1554, 2);
    let chunk = [&LOGIN_FRAME_123456789012345[..], &location[..]].concat();

    let (report, replies) = exchange(&GatewayConfig::default(), sink.clone(), &[chunk]).await;

    assert!(matches!(report.reason, CloseReason::PeerClosed));
    assert_eq!(replies, vec![0x78, 0x78, 0x05, 0x01, 0x00, 0x01, 0xD9, 0xDC, 0x0D, 0x0A]);
    assert_eq!(report.stats.frames_decoded, 2);
    assert_eq!(report.stats.acks_sent, 1);
    assert_eq!(report.stats.fixes_forwarded, 1);

    let records = sink.records.lock().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].device, DeviceIdentity::new(123_456_789_012_345));
    assert_eq!(records[0].latitude, 22.546097);
    assert_eq!(records[0].longitude, 113.91568);
    assert_eq!(records[0].speed, 60);
}

#[tokio::test(start_paused = true)]
async fn corrupted_frame_does_not_affect_siblings() {
    let sink = Arc::new(RecordingSink::default());
    let mut corrupted = location_frame(0x026B_3F3E, 0x0C38_C9A0, 0x1554, 2);
    corrupted[12] ^= 0x01;
    let chunk =
        [LOGIN_FRAME_123456789012345.to_vec(), corrupted, location_frame(5, 6, 0x1400, 3)].concat();

    let (report, replies) = exchange(&GatewayConfig::default(), sink.clone(), &[chunk]).await;

    assert_eq!(report.stats.frames_decoded, 2);
    assert_eq!(report.stats.frames_skipped, 1);
    assert_eq!(replies.len(), 10);
    assert_eq!(sink.records.lock().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unknown_type_gets_no_reply() {
    let sink = Arc::new(RecordingSink::default());
    let frame = FrameBuilder::new(0x99).payload(&[0x10, 0x20]).serial(4).build();

    let (report, replies) = exchange(&GatewayConfig::default(), sink, &[frame]).await;

    assert!(replies.is_empty());
    assert_eq!(report.stats.frames_decoded, 0);
    assert_eq!(report.stats.frames_skipped, 1);
}

#[tokio::test(start_paused = true)]
async fn status_frames_are_acknowledged_in_order() {
    let sink = Arc::new(RecordingSink::default());
    let chunk = [
        LOGIN_FRAME_123456789012345.to_vec(),
        status_frame(0x44, 4, 3, 2),
        location_frame(1, 2, 0x1400, 3),
        status_frame(0x45, 4, 3, 4),
    ]
    .concat();

    let (report, replies) = exchange(&GatewayConfig::default(), sink, &[chunk]).await;

    assert_eq!(report.stats.acks_sent, 3);
    let acks: Vec<&[u8]> = replies.chunks(10).collect();
    assert_eq!(acks.len(), 3);
    assert!(acks.iter().all(|ack| validate(ack)));
    let codes: Vec<u8> = acks.iter().map(|ack| ack[TYPE_OFFSET]).collect();
    assert_eq!(codes, vec![0x01, 0x13, 0x13]);
}

#[tokio::test(start_paused = true)]
async fn fix_before_login_is_quarantined() {
    let sink = Arc::new(RecordingSink::default());
    let chunks = vec![location_frame(1, 2, 0x1400, 1), LOGIN_FRAME_123456789012345.to_vec()];

    let (report, _) = exchange(&GatewayConfig::default(), sink.clone(), &chunks).await;

    assert_eq!(report.stats.fixes_quarantined, 1);
    assert_eq!(report.stats.fixes_forwarded, 0);
    assert!(sink.records.lock().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn sink_failure_is_not_fatal() {
    let sink = Arc::new(RecordingSink { fail: true, ..Default::default() });
    let chunks = vec![
        LOGIN_FRAME_123456789012345.to_vec(),
        location_frame(1, 2, 0x1400, 2),
        status_frame(0x44, 4, 3, 3),
    ];

    let (report, replies) = exchange(&GatewayConfig::default(), sink, &chunks).await;

    assert!(matches!(report.reason, CloseReason::PeerClosed));
    assert_eq!(report.stats.sink_failures, 1);
    assert_eq!(replies.len(), 20);
}

#[tokio::test(start_paused = true)]
async fn unaligned_chunk_is_rejected_and_connection_survives() {
    let sink = Arc::new(RecordingSink::default());
    let chunks = vec![vec![0x01, 0x02, 0x03], LOGIN_FRAME_123456789012345.to_vec()];

    let (report, replies) = exchange(&GatewayConfig::default(), sink, &chunks).await;

    assert_eq!(report.stats.chunks_rejected, 1);
    assert_eq!(report.stats.acks_sent, 1);
    assert_eq!(replies.len(), 10);
}

#[tokio::test(start_paused = true)]
async fn fragments_are_reassembled_across_reads() {
    let (sink, stream) = ChannelSink::new(8);
    let stream_bytes = [
        LOGIN_FRAME_123456789012345.to_vec(),
        location_frame(0x026B_3F3E, 0x0C38_C9A0, 0x1554, 2),
        location_frame(0x026B_3F3E, 0x0C38_C9A0, 0x1554, 3),
    ]
    .concat();
    let chunks: Vec<Vec<u8>> = stream_bytes.chunks(7).map(<[u8]>::to_vec).collect();

    let (report, replies) = exchange(&GatewayConfig::default(), Arc::new(sink), &chunks).await;

    assert_eq!(report.stats.frames_skipped, 0);
    assert_eq!(report.stats.fixes_forwarded, 2);
    assert_eq!(replies.len(), 10);

    let records: Vec<LocationRecord> = stream.take(2).collect().await;
    assert!(records.iter().all(|r| r.device == DeviceIdentity::new(123_456_789_012_345)));
}

#[tokio::test(start_paused = true)]
async fn idle_connection_times_out() {
    let config = GatewayConfig { idle_timeout_secs: Some(30), ..GatewayConfig::default() };
    let (handler, mut client, _cancel) = handler(&config, Arc::new(RecordingSink::default()));
    let task = tokio::spawn(handler.run());

    client.write_all(&LOGIN_FRAME_123456789012345).await.unwrap();
    let report = task.await.unwrap();

    assert!(matches!(report.reason, CloseReason::IdleTimeout));
    assert_eq!(report.stats.acks_sent, 1);
}

#[tokio::test]
async fn cancellation_stops_handler() {
    let config = GatewayConfig { idle_timeout_secs: None, ..GatewayConfig::default() };
    let (handler, _client, cancel) = handler(&config, Arc::new(RecordingSink::default()));
    let task = tokio::spawn(handler.run());

    cancel.cancel();
    let report = task.await.unwrap();
    assert!(matches!(report.reason, CloseReason::Cancelled));
}
