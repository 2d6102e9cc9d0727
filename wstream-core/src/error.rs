//! Error types for the streaming core.
//!
//! Nothing in the core is fatal. Every variant is recoverable and maps to a
//! short viewer-facing message via [`StreamError::diagnostic`], which the
//! frame source renders into the frame instead of propagating the error.

use thiserror::Error;

use crate::frame::Dimensions;

/// The canonical error type for frame acquisition and presentation.
#[derive(Debug, Error)]
pub enum StreamError {
    // ── Window capture ───────────────────────────────────────────
    /// The configured handle does not refer to a live window.
    #[error("no window handle")]
    NoWindowHandle,

    /// The window exists but is not visible.
    #[error("window invisible")]
    WindowInvisible,

    /// The window's client area has a zero dimension.
    #[error("window client area is empty ({0})")]
    EmptyClientArea(Dimensions),

    /// An OS capture call failed.
    #[error("capture failed: {0}")]
    CaptureFailed(String),

    /// The requested facility does not exist on this platform.
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    // ── Shared channel ───────────────────────────────────────────
    /// The shared region could not be created or mapped.
    #[error("channel unavailable: {0}")]
    ChannelUnavailable(String),

    /// The producer has not published a frame yet.
    #[error("no frame published yet")]
    NoFrameYet,

    /// Producer and consumer disagree on frame size.
    #[error("size mismatch: producer {producer}, requested {requested}")]
    SizeMismatch {
        producer: Dimensions,
        requested: Dimensions,
    },

    /// The producer was writing while the frame was read.
    #[error("torn frame")]
    TornFrame,

    /// The payload did not match the published checksum.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Header magic or version is not what this build speaks.
    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(&'static str),

    /// A payload does not fit the region.
    #[error("payload too large: {size} bytes (capacity {capacity})")]
    PayloadTooLarge { size: usize, capacity: usize },

    // ── Presentation ─────────────────────────────────────────────
    /// A paint state transition was requested from the wrong state.
    #[error("invalid paint transition: {0}")]
    InvalidTransition(&'static str),

    /// The presentation surface refused a bind or submit.
    #[error("surface unavailable: {0}")]
    SurfaceUnavailable(String),

    /// The OS reported an I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    /// Short text drawn into the frame by the diagnostic overlay.
    pub fn diagnostic(&self) -> String {
        match self {
            Self::NoWindowHandle => "no window handle".into(),
            Self::WindowInvisible => "window invisible".into(),
            Self::EmptyClientArea(dims) => format!("window is empty ({dims})"),
            Self::CaptureFailed(what) => format!("capture failed\n{what}"),
            Self::Unsupported(what) => format!("{what}\nnot supported here"),
            Self::ChannelUnavailable(_) => "channel unavailable".into(),
            Self::NoFrameYet => "waiting for producer".into(),
            Self::SizeMismatch {
                producer,
                requested,
            } => format!("size mismatch - try resizing\n{producer} vs {requested}"),
            Self::TornFrame | Self::ChecksumMismatch => "frame dropped (torn)".into(),
            Self::ProtocolMismatch(what) => format!("protocol mismatch\n{what}"),
            Self::PayloadTooLarge { .. } => "frame too large".into(),
            Self::InvalidTransition(_) => "paint out of order".into(),
            Self::SurfaceUnavailable(_) => "surface unavailable".into(),
            Self::Io(e) => format!("io error\n{e}"),
        }
    }

    /// `true` for integrity failures where the frame was discarded rather
    /// than the source being unreachable.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::TornFrame | Self::ChecksumMismatch | Self::SizeMismatch { .. }
        )
    }
}

// ── Tests ────────────────────────────────────────────────────────
