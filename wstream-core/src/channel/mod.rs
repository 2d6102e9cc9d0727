//! Cross-process shared-memory frame channel.
//!
//! | Module     | Purpose                                            |
//! |------------|----------------------------------------------------|
//! | `header`   | 64-byte wire header, flags, seqlock, checksum      |
//! | `region`   | Named OS shared-memory mappings                    |
//! | `consumer` | [`SharedChannel`]: grow-only mailbox, reads frames |
//! | `producer` | [`ChannelProducer`]: publishes frames              |

pub mod consumer;
pub mod header;
pub mod producer;
pub mod region;

pub use consumer::SharedChannel;
pub use header::{HEADER_SIZE, Header, HeaderFlags, MAGIC, VERSION, payload_checksum};
pub use producer::ChannelProducer;
pub use region::{OsBackend, RegionBackend, SharedRegion, os_name};
