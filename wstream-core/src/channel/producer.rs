//! Producer side of the shared frame mailbox.
//!
//! An external process opens the region the consumer created, watches the
//! consumer's requested dimensions, and publishes frames of that size. The
//! write protocol is a seqlock: the sequence goes odd, the payload and its
//! checksum are written, the sequence goes even.

use std::ptr;

use crate::channel::header::{Header, HeaderFlags, payload_checksum};
use crate::channel::region::{SharedRegion, os_name};
use crate::error::StreamError;
use crate::frame::Dimensions;

/// Writes frames into a channel created by a [`SharedChannel`](super::SharedChannel).
pub struct ChannelProducer {
    name: String,
    region: SharedRegion,
    checksum: bool,
}

impl ChannelProducer {
    /// Open the channel `name`. Fails until the consumer has created it.
    pub fn open(name: &str) -> Result<Self, StreamError> {
        let region = SharedRegion::open(&os_name(name))?;
        region.header().validate()?;
        Ok(Self {
            name: name.to_string(),
            region,
            checksum: true,
        })
    }

    /// Skip checksumming published payloads. Readers then rely on the
    /// sequence counter alone.
    pub fn without_checksum(mut self) -> Self {
        self.checksum = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> Header<'_> {
        self.region.header()
    }

    /// Largest payload this mapping accepts.
    pub fn capacity(&self) -> usize {
        self.region
            .header()
            .capacity()
            .min(self.region.payload_capacity())
    }

    /// Dimensions the consumer currently wants, `None` before its first
    /// acquire.
    pub fn requested_dimensions(&self) -> Option<Dimensions> {
        let dims = self.region.header().consumer_dims();
        (!dims.is_empty()).then_some(dims)
    }

    /// `true` once the consumer has released this region. The producer
    /// should drop it and [`open`](Self::open) again.
    pub fn is_torn_down(&self) -> bool {
        self.region.header().flags().contains(HeaderFlags::TEARDOWN)
    }

    /// Publish one frame. Returns the new (even) sequence number.
    pub fn publish(&mut self, dims: Dimensions, pixels: &[u8]) -> Result<u32, StreamError> {
        if self.is_torn_down() {
            return Err(StreamError::ChannelUnavailable(
                "consumer has torn down the channel".into(),
            ));
        }
        if pixels.len() != dims.byte_len() {
            return Err(StreamError::ProtocolMismatch(
                "payload length does not match dimensions",
            ));
        }
        if pixels.len() > self.capacity() {
            return Err(StreamError::PayloadTooLarge {
                size: pixels.len(),
                capacity: self.capacity(),
            });
        }

        let header = self.region.header();
        let odd = header.begin_write();
        header.set_producer_dims(dims);
        unsafe {
            ptr::copy_nonoverlapping(pixels.as_ptr(), self.region.payload_ptr(), pixels.len())
        };
        if self.checksum {
            header.set_checksum(payload_checksum(pixels));
            header.raise(HeaderFlags::CHECKSUM);
        } else {
            header.clear(HeaderFlags::CHECKSUM);
        }
        Ok(header.end_write(odd))
    }
}

impl std::fmt::Debug for ChannelProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelProducer")
            .field("name", &self.name)
            .field("region", &self.region)
            .field("checksum", &self.checksum)
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────
