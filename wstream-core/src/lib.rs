//! # wstream-core
//!
//! Live frame streaming core: produces "what should be shown right now"
//! and paces submission against an asynchronous presentation surface.
//!
//! This crate contains:
//! - **Frame**: `Frame`, `Dimensions`, BGRA pixel helpers
//! - **Channel**: `SharedChannel` / `ChannelProducer` over named shared memory
//! - **Source**: `FrameSource` selecting solid color, channel or window capture
//! - **Scheduler**: `PaintScheduler` and its `PaintState` machine
//! - **Overlay**: diagnostic text drawn into frames on failure
//! - **Control**: text commands parsed into `Command`
//! - **Error**: `StreamError`, typed and `thiserror`-based

pub mod channel;
pub mod control;
pub mod error;
pub mod frame;
pub mod overlay;
pub mod scheduler;
pub mod settings;
pub mod source;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use channel::{ChannelProducer, HeaderFlags, SharedChannel};
pub use control::Command;
pub use error::StreamError;
pub use frame::{Dimensions, Frame};
pub use scheduler::{Host, PaintScheduler, PaintState, PaintStats};
pub use settings::StreamSettings;
pub use source::{FrameSource, FrameSourceConfig, SourceKind, WindowCapturer};
