//! Fixed 64-byte header at the front of every shared channel region.
//!
//! ```text
//!  offset  field              writer
//!  0       magic "WSTR"       consumer (create)
//!  4       version            consumer (create)
//!  8       producer width     producer
//!  12      producer height    producer
//!  16      consumer width     consumer (acquire)
//!  20      consumer height    consumer (acquire)
//!  24      flags              consumer: TEARDOWN, producer: CHECKSUM
//!  28      sequence           producer (odd while writing)
//!  32      payload checksum   producer
//!  36      payload capacity   consumer (create)
//!  40..64  reserved
//! ```
//!
//! Every field is a little-endian `u32` accessed through an atomic, since
//! the other side of the mapping lives in a different process and no lock
//! is shared between the two. The payload itself is copied without
//! synchronization; the sequence counter and checksum only let a reader
//! *detect* a torn frame.

use std::sync::atomic::{AtomicU32, Ordering, fence};

use bitflags::bitflags;

use crate::error::StreamError;
use crate::frame::Dimensions;

const _: () = assert!(cfg!(target_endian = "little"), "header words are little-endian");

/// Size of the header in bytes. The payload starts right after it.
pub const HEADER_SIZE: usize = 64;

/// `b"WSTR"` read as a little-endian word.
pub const MAGIC: u32 = u32::from_le_bytes(*b"WSTR");

/// Wire layout version.
pub const VERSION: u32 = 1;

const WORDS: usize = HEADER_SIZE / 4;

const MAGIC_WORD: usize = 0;
const VERSION_WORD: usize = 1;
const PRODUCER_WIDTH: usize = 2;
const PRODUCER_HEIGHT: usize = 3;
const CONSUMER_WIDTH: usize = 4;
const CONSUMER_HEIGHT: usize = 5;
const FLAGS: usize = 6;
const SEQUENCE: usize = 7;
const CHECKSUM: usize = 8;
const CAPACITY: usize = 9;

bitflags! {
    /// Bits of the header flag word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HeaderFlags: u32 {
        /// The consumer is releasing the region; the producer should stop
        /// writing and reopen.
        const TEARDOWN = 1 << 0;
        /// The checksum word covers the current payload.
        const CHECKSUM = 1 << 1;
    }
}

/// Truncated BLAKE3 of a payload, as stored in the checksum word.
pub fn payload_checksum(payload: &[u8]) -> u32 {
    let hash = blake3::hash(payload);
    let b = hash.as_bytes();
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

/// Borrowed view of a mapped header.
#[derive(Clone, Copy)]
pub struct Header<'a> {
    words: &'a [AtomicU32; WORDS],
}

impl<'a> Header<'a> {
    /// # Safety
    ///
    /// `base` must point to at least [`HEADER_SIZE`] mapped, writable,
    /// 4-byte aligned bytes that stay mapped for `'a`.
    pub(crate) unsafe fn from_ptr(base: *mut u8) -> Self {
        let words = unsafe { &*(base as *const [AtomicU32; WORDS]) };
        Self { words }
    }

    fn load(&self, word: usize) -> u32 {
        self.words[word].load(Ordering::Acquire)
    }

    fn store(&self, word: usize, value: u32) {
        self.words[word].store(value, Ordering::Release);
    }

    /// Stamp a freshly created region: magic, version, capacity, all other
    /// words zeroed.
    pub fn initialize(&self, payload_capacity: usize) {
        for word in self.words.iter() {
            word.store(0, Ordering::Relaxed);
        }
        self.store(CAPACITY, u32::try_from(payload_capacity).unwrap_or(u32::MAX));
        self.store(VERSION_WORD, VERSION);
        self.store(MAGIC_WORD, MAGIC);
    }

    /// Check magic and version.
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.load(MAGIC_WORD) != MAGIC {
            return Err(StreamError::ProtocolMismatch("bad magic"));
        }
        if self.load(VERSION_WORD) != VERSION {
            return Err(StreamError::ProtocolMismatch("unsupported version"));
        }
        Ok(())
    }

    pub fn producer_dims(&self) -> Dimensions {
        Dimensions::new(self.load(PRODUCER_WIDTH), self.load(PRODUCER_HEIGHT))
    }

    pub fn set_producer_dims(&self, dims: Dimensions) {
        self.store(PRODUCER_WIDTH, dims.width);
        self.store(PRODUCER_HEIGHT, dims.height);
    }

    pub fn consumer_dims(&self) -> Dimensions {
        Dimensions::new(self.load(CONSUMER_WIDTH), self.load(CONSUMER_HEIGHT))
    }

    pub fn set_consumer_dims(&self, dims: Dimensions) {
        self.store(CONSUMER_WIDTH, dims.width);
        self.store(CONSUMER_HEIGHT, dims.height);
    }

    pub fn flags(&self) -> HeaderFlags {
        HeaderFlags::from_bits_truncate(self.load(FLAGS))
    }

    pub fn raise(&self, flags: HeaderFlags) {
        self.words[FLAGS].fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub fn clear(&self, flags: HeaderFlags) {
        self.words[FLAGS].fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    pub fn checksum(&self) -> u32 {
        self.load(CHECKSUM)
    }

    pub fn set_checksum(&self, checksum: u32) {
        self.store(CHECKSUM, checksum);
    }

    pub fn capacity(&self) -> usize {
        self.load(CAPACITY) as usize
    }

    /// Sequence as seen before reading the payload.
    pub fn sequence(&self) -> u32 {
        self.load(SEQUENCE)
    }

    /// Sequence as seen after reading the payload. Compare with the value
    /// from [`sequence`](Self::sequence) to detect a concurrent write.
    pub fn sequence_after_read(&self) -> u32 {
        fence(Ordering::Acquire);
        self.words[SEQUENCE].load(Ordering::Relaxed)
    }

    /// Mark a write in progress (sequence becomes odd). Returns the odd
    /// value.
    pub fn begin_write(&self) -> u32 {
        let mut seq = self.words[SEQUENCE].load(Ordering::Relaxed);
        // Recover from a producer that died mid-write.
        if seq & 1 == 1 {
            seq = seq.wrapping_add(1);
        }
        let odd = seq.wrapping_add(1);
        self.words[SEQUENCE].store(odd, Ordering::Relaxed);
        fence(Ordering::Release);
        odd
    }

    /// Publish a finished write (sequence becomes even, never zero).
    pub fn end_write(&self, odd: u32) -> u32 {
        let mut even = odd.wrapping_add(1);
        if even == 0 {
            even = 2;
        }
        self.words[SEQUENCE].store(even, Ordering::Release);
        even
    }
}

impl std::fmt::Debug for Header<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Header")
            .field("producer", &self.producer_dims())
            .field("consumer", &self.consumer_dims())
            .field("flags", &self.flags())
            .field("sequence", &self.sequence())
            .field("checksum", &self.checksum())
            .field("capacity", &self.capacity())
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────
