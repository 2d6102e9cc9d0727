//! Consumer side of the shared frame mailbox.

use std::ptr;

use tracing::{debug, info, warn};

use crate::channel::header::{HEADER_SIZE, HeaderFlags, payload_checksum};
use crate::channel::region::{OsBackend, RegionBackend, SharedRegion, os_name};
use crate::error::StreamError;
use crate::frame::{Dimensions, Frame};

enum ChannelState {
    /// Nothing mapped yet, or torn down.
    Unmapped,
    Mapped(SharedRegion),
    /// The last create failed for these dimensions. The next acquire
    /// retries regardless.
    Failed { dims: Dimensions, reason: String },
}

/// A named, grow-only shared-memory region used as a single-slot frame
/// mailbox.
///
/// The region is created lazily by [`acquire`](Self::acquire) and only ever
/// replaced by a larger one. Before a region is released the `TEARDOWN`
/// flag is raised so a producer still mapping it knows to reopen.
///
/// # Consistency
///
/// Payload reads are not locked against the producer. A read that overlaps
/// a write is detected through the header sequence counter and the payload
/// checksum and the frame is discarded; it is never prevented.
pub struct SharedChannel<B: RegionBackend = OsBackend> {
    name: String,
    backend: B,
    state: ChannelState,
    requested: Dimensions,
    allocations: u64,
    scratch: Vec<u8>,
}

impl SharedChannel<OsBackend> {
    /// A channel backed by OS shared memory.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_backend(name, OsBackend)
    }
}

impl<B: RegionBackend> SharedChannel<B> {
    pub fn with_backend(name: impl Into<String>, backend: B) -> Self {
        Self {
            name: name.into(),
            backend,
            state: ChannelState::Unmapped,
            requested: Dimensions::default(),
            allocations: 0,
            scratch: Vec::new(),
        }
    }

    /// Make sure the region can hold a `dims` payload and announce `dims`
    /// to the producer.
    pub fn acquire(&mut self, dims: Dimensions) -> Result<(), StreamError> {
        let required = HEADER_SIZE + dims.byte_len();
        let fits = matches!(&self.state, ChannelState::Mapped(region) if region.len() >= required);
        if !fits {
            self.teardown();
            let region = match self.backend.create(&os_name(&self.name), required) {
                Ok(region) => region,
                Err(e) => {
                    let reason = e.to_string();
                    let repeated = matches!(
                        &self.state,
                        ChannelState::Failed { dims: d, reason: r } if *d == dims && *r == reason
                    );
                    if repeated {
                        debug!(channel = %self.name, %dims, "channel create still failing: {e}");
                    } else {
                        warn!(channel = %self.name, %dims, "channel create failed: {e}");
                    }
                    self.state = ChannelState::Failed { dims, reason };
                    return Err(e);
                }
            };
            region.header().initialize(region.payload_capacity());
            self.allocations += 1;
            if self.is_failed() {
                info!(channel = %self.name, %dims, "channel create recovered");
            }
            debug!(channel = %self.name, bytes = region.len(), "channel region mapped");
            self.state = ChannelState::Mapped(region);
        }

        if let ChannelState::Mapped(region) = &self.state {
            region.header().set_consumer_dims(dims);
        }
        self.requested = dims;
        Ok(())
    }

    /// Copy the latest published frame into `frame`.
    ///
    /// `frame` is only written when the whole payload was read cleanly and
    /// matches the frame's dimensions; on any error it is left untouched.
    pub fn read_into(&mut self, frame: &mut Frame) -> Result<(), StreamError> {
        let ChannelState::Mapped(region) = &self.state else {
            return Err(StreamError::ChannelUnavailable("channel is not mapped".into()));
        };
        let header = region.header();
        header.validate()?;

        let seq = header.sequence();
        if seq == 0 {
            return Err(StreamError::NoFrameYet);
        }
        if seq & 1 == 1 {
            return Err(StreamError::TornFrame);
        }

        let requested = frame.dimensions();
        let producer = header.producer_dims();
        if producer != requested {
            return Err(StreamError::SizeMismatch {
                producer,
                requested,
            });
        }

        let len = requested.byte_len();
        if len > region.payload_capacity() {
            return Err(StreamError::PayloadTooLarge {
                size: len,
                capacity: region.payload_capacity(),
            });
        }

        self.scratch.resize(len, 0);
        // The producer may be writing concurrently; the sequence re-check
        // below rejects anything that raced.
        unsafe { ptr::copy_nonoverlapping(region.payload_ptr(), self.scratch.as_mut_ptr(), len) };

        if header.sequence_after_read() != seq {
            return Err(StreamError::TornFrame);
        }
        if header.flags().contains(HeaderFlags::CHECKSUM)
            && payload_checksum(&self.scratch) != header.checksum()
        {
            return Err(StreamError::ChecksumMismatch);
        }

        frame.as_bytes_mut().copy_from_slice(&self.scratch);
        Ok(())
    }

    /// Acquire for `frame`'s dimensions and read into it.
    pub fn receive(&mut self, frame: &mut Frame) -> Result<(), StreamError> {
        self.acquire(frame.dimensions())?;
        self.read_into(frame)
    }
}

impl<B: RegionBackend> SharedChannel<B> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mapped size in bytes (header included), 0 when nothing is mapped.
    pub fn capacity(&self) -> usize {
        match &self.state {
            ChannelState::Mapped(region) => region.len(),
            _ => 0,
        }
    }

    /// How many regions this channel has created over its life.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Dimensions announced by the last successful acquire.
    pub fn requested(&self) -> Dimensions {
        self.requested
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, ChannelState::Failed { .. })
    }

    pub fn region(&self) -> Option<&SharedRegion> {
        match &self.state {
            ChannelState::Mapped(region) => Some(region),
            _ => None,
        }
    }

    /// Tear down the region and forget any failure.
    pub fn reset(&mut self) {
        self.teardown();
        self.state = ChannelState::Unmapped;
    }

    /// Release a mapped region. A recorded failure is left in place.
    fn teardown(&mut self) {
        if !matches!(self.state, ChannelState::Mapped(_)) {
            return;
        }
        if let ChannelState::Mapped(region) =
            std::mem::replace(&mut self.state, ChannelState::Unmapped)
        {
            region.header().raise(HeaderFlags::TEARDOWN);
            debug!(channel = %self.name, "channel torn down");
            drop(region);
        }
    }
}

impl<B: RegionBackend> Drop for SharedChannel<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<B: RegionBackend> std::fmt::Debug for SharedChannel<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedChannel")
            .field("name", &self.name)
            .field("capacity", &self.capacity())
            .field("allocations", &self.allocations)
            .field("failed", &self.is_failed())
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Refuses every create.
    struct BrokenBackend {
        attempts: u32,
    }

    impl RegionBackend for BrokenBackend {
        fn create(&mut self, _name: &str, _len: usize) -> Result<SharedRegion, StreamError> {
            self.attempts += 1;
            Err(StreamError::ChannelUnavailable("out of memory".into()))
        }
    }

    #[test]
    fn failed_create_is_retried_on_every_acquire() {
        let mut channel = SharedChannel::with_backend("broken", BrokenBackend { attempts: 0 });
        let dims = Dimensions::new(10, 10);

        assert!(channel.acquire(dims).is_err());
        assert!(channel.is_failed());
        assert!(channel.acquire(dims).is_err());
        assert!(channel.acquire(dims).is_err());
        assert_eq!(channel.backend.attempts, 3);

        assert!(channel.acquire(Dimensions::new(11, 10)).is_err());
        assert_eq!(channel.backend.attempts, 4);
    }

    #[test]
    fn reset_clears_failure() {
        let mut channel = SharedChannel::with_backend("broken", BrokenBackend { attempts: 0 });
        let dims = Dimensions::new(4, 4);
        let _ = channel.acquire(dims);
        channel.reset();
        assert!(!channel.is_failed());
        let _ = channel.acquire(dims);
        assert_eq!(channel.backend.attempts, 2);
    }

    #[test]
    fn read_without_region_is_unavailable() {
        let mut channel = SharedChannel::with_backend("none", BrokenBackend { attempts: 0 });
        let mut frame = Frame::new(Dimensions::new(2, 2));
        let err = channel.read_into(&mut frame).unwrap_err();
        assert!(matches!(err, StreamError::ChannelUnavailable(_)));
    }

    #[cfg(unix)]
    mod os {
        use super::*;
        use crate::channel::ChannelProducer;

        fn unique(tag: &str) -> String {
            format!("consumer-{tag}-{}", std::process::id())
        }

        /// Fails the first `failures` creates, then maps real shared memory.
        struct FlakyBackend {
            failures: u32,
            attempts: u32,
        }

        impl RegionBackend for FlakyBackend {
            fn create(&mut self, os_name: &str, len: usize) -> Result<SharedRegion, StreamError> {
                self.attempts += 1;
                if self.failures > 0 {
                    self.failures -= 1;
                    return Err(StreamError::ChannelUnavailable("mapping in use".into()));
                }
                OsBackend.create(os_name, len)
            }
        }

        #[test]
        fn transient_create_failure_recovers_at_same_size() {
            let mut channel = SharedChannel::with_backend(
                unique("flaky"),
                FlakyBackend {
                    failures: 1,
                    attempts: 0,
                },
            );
            let dims = Dimensions::new(16, 16);

            assert!(channel.acquire(dims).is_err());
            assert!(channel.is_failed());

            channel.acquire(dims).unwrap();
            assert!(!channel.is_failed());
            assert_eq!(channel.backend.attempts, 2);
            assert_eq!(channel.allocations(), 1);
            assert_eq!(channel.requested(), dims);

            // Mapped now: further acquires at this size reuse the region.
            channel.acquire(dims).unwrap();
            assert_eq!(channel.backend.attempts, 2);
        }

        #[test]
        fn grow_only_reuses_region() {
            let mut channel = SharedChannel::new(unique("grow"));
            channel.acquire(Dimensions::new(100, 100)).unwrap();
            let capacity = channel.capacity();
            assert!(capacity >= HEADER_SIZE + 100 * 100 * 4);

            channel.acquire(Dimensions::new(50, 50)).unwrap();
            assert_eq!(channel.capacity(), capacity);
            assert_eq!(channel.allocations(), 1);

            channel.acquire(Dimensions::new(101, 100)).unwrap();
            assert_eq!(channel.allocations(), 2);
            assert!(channel.capacity() > capacity);
        }

        #[test]
        fn acquire_announces_consumer_dimensions() {
            let mut channel = SharedChannel::new(unique("announce"));
            channel.acquire(Dimensions::new(32, 16)).unwrap();
            let header = channel.region().unwrap().header();
            assert_eq!(header.consumer_dims(), Dimensions::new(32, 16));
        }

        #[test]
        fn nothing_published_yet() {
            let mut channel = SharedChannel::new(unique("empty"));
            let mut frame = Frame::new(Dimensions::new(8, 8));
            let err = channel.receive(&mut frame).unwrap_err();
            assert!(matches!(err, StreamError::NoFrameYet));
        }

        #[test]
        fn size_mismatch_leaves_frame_untouched() {
            let name = unique("mismatch");
            let mut channel = SharedChannel::new(name.as_str());
            channel.acquire(Dimensions::new(200, 150)).unwrap();

            let mut producer = ChannelProducer::open(&name).unwrap();
            let big = Dimensions::new(200, 150);
            producer.publish(big, &vec![0x7F; big.byte_len()]).unwrap();

            let mut frame = Frame::solid(Dimensions::new(200, 100), 0xFF12_3456);
            let before = frame.clone();
            channel.acquire(frame.dimensions()).unwrap();
            let err = channel.read_into(&mut frame).unwrap_err();
            assert!(matches!(err, StreamError::SizeMismatch { .. }));
            assert_eq!(frame, before);
        }

        #[test]
        fn writer_in_progress_is_torn() {
            let name = unique("torn");
            let mut channel = SharedChannel::new(name.as_str());
            let dims = Dimensions::new(4, 4);
            channel.acquire(dims).unwrap();

            let mut producer = ChannelProducer::open(&name).unwrap();
            producer.publish(dims, &vec![1; dims.byte_len()]).unwrap();

            // Simulate a producer caught mid-write.
            let odd = producer.header().begin_write();

            let mut frame = Frame::new(dims);
            assert!(matches!(
                channel.read_into(&mut frame).unwrap_err(),
                StreamError::TornFrame
            ));
            producer.header().end_write(odd);
            channel.read_into(&mut frame).unwrap();
        }

        #[test]
        fn corrupted_payload_fails_checksum() {
            let name = unique("checksum");
            let mut channel = SharedChannel::new(name.as_str());
            let dims = Dimensions::new(4, 4);
            channel.acquire(dims).unwrap();

            let mut producer = ChannelProducer::open(&name).unwrap();
            producer.publish(dims, &vec![9; dims.byte_len()]).unwrap();

            let region = channel.region().unwrap();
            unsafe { *region.payload_ptr() = 0 };

            let mut frame = Frame::new(dims);
            assert!(matches!(
                channel.read_into(&mut frame).unwrap_err(),
                StreamError::ChecksumMismatch
            ));
            assert!(frame.as_bytes().iter().all(|b| *b == 0));
        }

        #[test]
        fn drop_raises_teardown_flag() {
            let name = unique("teardown");
            let mut channel = SharedChannel::new(name.as_str());
            channel.acquire(Dimensions::new(8, 8)).unwrap();

            let producer = ChannelProducer::open(&name).unwrap();
            assert!(!producer.is_torn_down());
            drop(channel);
            assert!(producer.is_torn_down());
        }

        #[test]
        fn regrow_raises_teardown_on_old_region() {
            let name = unique("regrow");
            let mut channel = SharedChannel::new(name.as_str());
            channel.acquire(Dimensions::new(8, 8)).unwrap();
            let producer = ChannelProducer::open(&name).unwrap();

            channel.acquire(Dimensions::new(64, 64)).unwrap();
            assert!(producer.is_torn_down());

            let reopened = ChannelProducer::open(&name).unwrap();
            assert!(!reopened.is_torn_down());
            assert_eq!(reopened.requested_dimensions(), Some(Dimensions::new(64, 64)));
        }
    }
}
