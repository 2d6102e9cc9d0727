//! Integration tests: producer and consumer over real shared memory, and
//! the scheduler driving a frame source end to end.

use std::time::Duration;

use wstream_core::source::UnsupportedCapturer;
use wstream_core::{
    ChannelProducer, Command, Dimensions, Frame, FrameSource, FrameSourceConfig, Host,
    PaintScheduler, PaintState, SharedChannel, StreamError, StreamSettings,
};

// ── Helpers ──────────────────────────────────────────────────────

/// Channel name unique to this test process.
fn channel_name(tag: &str) -> String {
    format!("it-{tag}-{}", std::process::id())
}

/// Presentation surface that keeps every submitted frame.
#[derive(Default)]
struct RecordingHost {
    frames: Vec<Frame>,
    ticks: u32,
}

impl Host for RecordingHost {
    fn bind_surface(&mut self, _dims: Dimensions) -> Result<(), StreamError> {
        Ok(())
    }

    fn submit(&mut self, frame: Frame) -> Result<(), StreamError> {
        self.frames.push(frame);
        Ok(())
    }

    fn schedule_tick(&mut self, _after: Duration) {
        self.ticks += 1;
    }
}

type Scheduler = PaintScheduler<RecordingHost, UnsupportedCapturer>;

fn scheduler(config: FrameSourceConfig) -> Scheduler {
    let source = FrameSource::with_parts(config, UnsupportedCapturer, Default::default());
    PaintScheduler::new(RecordingHost::default(), source, &StreamSettings::default())
}

// ── Channel round trips ──────────────────────────────────────────

#[cfg(unix)]
#[test]
fn solid_frame_round_trips_byte_identical() {
    let name = channel_name("solid");
    let dims = Dimensions::new(64, 64);
    let mut consumer = SharedChannel::new(&name);
    consumer.acquire(dims).unwrap();

    let mut producer = ChannelProducer::open(&name).unwrap();
    assert_eq!(producer.requested_dimensions(), Some(dims));
    let sent = Frame::solid(dims, 0xFF20_4060);
    producer.publish(dims, sent.as_bytes()).unwrap();

    let mut received = Frame::new(dims);
    consumer.read_into(&mut received).unwrap();
    assert_eq!(received.as_bytes(), sent.as_bytes());
}

#[cfg(unix)]
#[test]
fn unchecksummed_frames_still_arrive() {
    let name = channel_name("nosum");
    let dims = Dimensions::new(8, 2);
    let mut consumer = SharedChannel::new(&name);
    consumer.acquire(dims).unwrap();

    let mut producer = ChannelProducer::open(&name).unwrap().without_checksum();
    let mut sent = Frame::new(dims);
    sent.put_pixel(3, 1, 0xFFAB_CDEF);
    producer.publish(dims, sent.as_bytes()).unwrap();

    let mut received = Frame::new(dims);
    consumer.receive(&mut received).unwrap();
    assert_eq!(received.pixel(3, 1), Some(0xFFAB_CDEF));
}

#[cfg(unix)]
#[test]
fn producer_reopens_after_regrow() {
    let name = channel_name("regrow");
    let mut consumer = SharedChannel::new(&name);
    consumer.acquire(Dimensions::new(16, 16)).unwrap();
    let producer = ChannelProducer::open(&name).unwrap();
    assert!(!producer.is_torn_down());

    // Shrinking reuses the region, growing replaces it.
    consumer.acquire(Dimensions::new(8, 8)).unwrap();
    assert!(!producer.is_torn_down());
    consumer.acquire(Dimensions::new(64, 64)).unwrap();
    assert!(producer.is_torn_down());
    assert_eq!(consumer.allocations(), 2);

    drop(producer);
    let producer = ChannelProducer::open(&name).unwrap();
    assert_eq!(
        producer.requested_dimensions(),
        Some(Dimensions::new(64, 64))
    );
    assert!(producer.capacity() >= Dimensions::new(64, 64).byte_len());
}

#[cfg(unix)]
#[test]
fn dropping_consumer_stops_producer() {
    let name = channel_name("drop");
    let dims = Dimensions::new(4, 4);
    let mut consumer = SharedChannel::new(&name);
    consumer.acquire(dims).unwrap();
    let mut producer = ChannelProducer::open(&name).unwrap();

    drop(consumer);
    assert!(producer.is_torn_down());
    let err = producer
        .publish(dims, Frame::new(dims).as_bytes())
        .unwrap_err();
    assert!(matches!(err, StreamError::ChannelUnavailable(_)));
    assert!(ChannelProducer::open(&name).is_err());
}

// ── Scheduler end to end ─────────────────────────────────────────

#[cfg(unix)]
#[test]
fn scheduler_streams_channel_frames() {
    let name = channel_name("sched");
    let dims = Dimensions::new(32, 8);
    let mut s = scheduler(FrameSourceConfig {
        stream_name: Some(name.clone()),
        ..Default::default()
    });
    s.start();
    s.on_view_changed(dims);
    s.on_flush_complete(0);

    // First paint created the channel; the producer now sees the request.
    let mut producer = ChannelProducer::open(&name).unwrap();
    assert_eq!(producer.requested_dimensions(), Some(dims));

    for (i, color) in [0xFF00_0010u32, 0xFF00_0020, 0xFF00_0030].into_iter().enumerate() {
        let sent = Frame::solid(dims, color);
        producer.publish(dims, sent.as_bytes()).unwrap();
        s.on_timer();
        s.on_flush_complete(0);
        let last = s.host().frames.last().unwrap();
        assert_eq!(last.as_bytes(), sent.as_bytes(), "frame {i}");
    }
    assert!(s.is_tick_armed());
    assert!(s.state().is_idle());
}

#[cfg(unix)]
#[test]
fn scheduler_shows_mismatch_until_producer_catches_up() {
    let name = channel_name("mismatch");
    let mut s = scheduler(FrameSourceConfig {
        stream_name: Some(name.clone()),
        ..Default::default()
    });
    s.on_view_changed(Dimensions::new(20, 10));
    s.on_flush_complete(0);

    let mut producer = ChannelProducer::open(&name).unwrap();
    let stale = Dimensions::new(10, 10);
    producer
        .publish(stale, Frame::solid(stale, 0xFFFF_0000).as_bytes())
        .unwrap();
    s.on_timer();
    s.on_flush_complete(0);
    assert!(
        s.source()
            .last_failure()
            .is_some_and(|m| m.starts_with("size mismatch"))
    );

    let wanted = producer.requested_dimensions().unwrap();
    let sent = Frame::solid(wanted, 0xFF00_FF00);
    producer.publish(wanted, sent.as_bytes()).unwrap();
    s.on_timer();
    assert_eq!(s.host().frames.last().unwrap().as_bytes(), sent.as_bytes());
    assert!(s.source().last_failure().is_none());
}

#[test]
fn control_lines_drive_the_scheduler() {
    let mut s = scheduler(FrameSourceConfig::default());
    s.on_view_changed(Dimensions::new(3, 3));
    assert_eq!(s.host().frames[0].pixel(0, 0), Some(0xFFAA_BBCC));
    s.on_flush_complete(0);

    for line in ["setDefaultColor 0xFF010203", "bogus command", "setDefaultColor"] {
        s.apply(&Command::parse(line));
        if s.state() == PaintState::FlushInFlight {
            s.on_flush_complete(0);
        }
    }
    assert_eq!(s.host().frames.len(), 2);
    assert_eq!(s.host().frames[1].pixel(2, 2), Some(0xFF01_0203));
    assert_eq!(s.host().ticks, 0);
}

#[test]
fn window_capture_without_backend_reports_diagnostic() {
    let mut s = scheduler(FrameSourceConfig::default());
    s.on_view_changed(Dimensions::new(200, 40));
    s.on_flush_complete(0);
    s.apply(&Command::SetWindowHandle(0x1234));
    assert!(s.is_tick_armed());
    assert_eq!(s.host().frames.len(), 2);
    assert!(
        s.source()
            .last_failure()
            .is_some_and(|m| m.contains("not supported"))
    );
}
