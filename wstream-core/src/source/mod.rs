//! Frame sources.
//!
//! [`FrameSource`] decides, on every call, where the next frame comes from:
//!
//! | Configuration            | Source                         |
//! |--------------------------|--------------------------------|
//! | nothing                  | solid fill of the default color |
//! | stream name              | [`SharedChannel`] read          |
//! | window handle only       | window capture                  |
//!
//! A stream name wins over a window handle. Whatever goes wrong, the
//! caller still gets a frame of the requested size, carrying a diagnostic
//! message when acquisition failed.

#[cfg(target_os = "windows")]
pub mod gdi;
pub mod window;

use std::fmt;

use tracing::{debug, info, warn};

use crate::channel::{OsBackend, RegionBackend, SharedChannel};
use crate::control::Command;
use crate::error::StreamError;
use crate::frame::{Dimensions, Frame};
use crate::overlay;
use crate::settings::{DEFAULT_COLOR, StreamSettings};

pub use window::{
    CapturedImage, PlatformCapturer, UnsupportedCapturer, WindowCapture, WindowCapturer, blit,
};

/// What the frame source is configured to read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSourceConfig {
    /// Window to capture. Never `Some(0)`.
    pub window_handle: Option<u64>,
    /// Shared channel name. Never `Some("")`.
    pub stream_name: Option<String>,
    /// Fill color when neither of the above is set.
    pub default_color: u32,
}

impl Default for FrameSourceConfig {
    fn default() -> Self {
        Self {
            window_handle: None,
            stream_name: None,
            default_color: DEFAULT_COLOR,
        }
    }
}

impl From<&StreamSettings> for FrameSourceConfig {
    fn from(settings: &StreamSettings) -> Self {
        Self {
            default_color: settings.default_color,
            ..Self::default()
        }
    }
}

impl FrameSourceConfig {
    /// `true` when frames come from a window or a channel rather than a
    /// fixed color.
    pub fn has_source(&self) -> bool {
        self.window_handle.is_some() || self.stream_name.is_some()
    }

    pub fn kind(&self) -> SourceKind {
        match (&self.stream_name, self.window_handle) {
            (Some(_), _) => SourceKind::Channel,
            (None, Some(handle)) => SourceKind::Window(handle),
            (None, None) => SourceKind::SolidColor,
        }
    }
}

/// The source selected by a [`FrameSourceConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    SolidColor,
    Channel,
    Window(u64),
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SolidColor => write!(f, "solid color"),
            Self::Channel => write!(f, "shared channel"),
            Self::Window(handle) => write!(f, "window {handle:#x}"),
        }
    }
}

// ── FrameSource ──────────────────────────────────────────────────

/// Produces one frame per paint from the configured source.
pub struct FrameSource<C: WindowCapturer = PlatformCapturer, B: RegionBackend + Clone = OsBackend>
{
    config: FrameSourceConfig,
    window: WindowCapture<C>,
    backend: B,
    /// Created on first read, dropped when the stream name changes.
    channel: Option<SharedChannel<B>>,
    /// Diagnostic of the last failed produce, cleared on success.
    last_failure: Option<String>,
}

impl FrameSource<PlatformCapturer, OsBackend> {
    pub fn new(config: FrameSourceConfig) -> Self {
        Self::with_parts(config, PlatformCapturer::default(), OsBackend)
    }
}

impl<C: WindowCapturer, B: RegionBackend + Clone> FrameSource<C, B> {
    pub fn with_parts(config: FrameSourceConfig, capturer: C, backend: B) -> Self {
        let config = FrameSourceConfig {
            window_handle: config.window_handle.filter(|&h| h != 0),
            stream_name: config.stream_name.filter(|n| !n.is_empty()),
            ..config
        };
        Self {
            config,
            window: WindowCapture::new(capturer),
            backend,
            channel: None,
            last_failure: None,
        }
    }

    pub fn config(&self) -> &FrameSourceConfig {
        &self.config
    }

    pub fn channel(&self) -> Option<&SharedChannel<B>> {
        self.channel.as_ref()
    }

    pub fn window(&self) -> &WindowCapture<C> {
        &self.window
    }

    /// Diagnostic text of the last failed [`produce`](Self::produce).
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    /// Produce a frame of exactly `dims`.
    ///
    /// Never fails. An empty `dims` yields an empty frame; acquisition
    /// errors yield a frame with the error's diagnostic drawn into it.
    pub fn produce(&mut self, dims: Dimensions) -> Frame {
        let mut frame = Frame::new(dims);
        if dims.is_empty() {
            return frame;
        }

        let kind = self.config.kind();
        let result = match kind {
            SourceKind::SolidColor => {
                frame.fill(self.config.default_color);
                Ok(())
            }
            SourceKind::Channel => self.read_channel(&mut frame),
            SourceKind::Window(handle) => self.window.acquire(handle, &mut frame),
        };

        match result {
            Ok(()) => {
                if self.last_failure.take().is_some() {
                    info!(source = %kind, %dims, "frame source recovered");
                }
            }
            Err(e) => {
                let text = e.diagnostic();
                if self.last_failure.as_deref() != Some(text.as_str()) {
                    warn!(source = %kind, %dims, "frame acquisition failed: {e}");
                } else {
                    debug!(source = %kind, "frame acquisition still failing: {e}");
                }
                overlay::render(&text, &mut frame, true);
                self.last_failure = Some(text);
            }
        }
        frame
    }

    fn read_channel(&mut self, frame: &mut Frame) -> Result<(), StreamError> {
        let Some(name) = self.config.stream_name.as_deref() else {
            return Err(StreamError::ChannelUnavailable("no stream name".into()));
        };
        let backend = &self.backend;
        let channel = self
            .channel
            .get_or_insert_with(|| SharedChannel::with_backend(name, backend.clone()));
        channel.receive(frame)
    }

    /// Apply a control command. Returns `false` for commands that change
    /// nothing here.
    pub fn apply(&mut self, command: &Command) -> bool {
        match command {
            Command::SetWindowHandle(0) | Command::ClearWindowHandle => {
                self.config.window_handle = None;
                info!("window handle cleared");
            }
            Command::SetWindowHandle(handle) => {
                self.config.window_handle = Some(*handle);
                info!(handle = format_args!("{handle:#x}"), "window handle set");
            }
            Command::SetStreamName(name) if name.is_empty() => {
                return self.apply(&Command::ClearStreamName);
            }
            Command::SetStreamName(name) => {
                // Always rebuilt; dropping the old channel tears its region down.
                self.channel = None;
                self.config.stream_name = Some(name.clone());
                info!(stream = %name, "stream name set");
            }
            Command::ClearStreamName => {
                self.channel = None;
                self.config.stream_name = None;
                info!("stream name cleared");
            }
            Command::SetDefaultColor(argb) => {
                self.config.default_color = *argb;
                info!(color = format_args!("{argb:#010X}"), "default color set");
            }
            Command::Ignored => return false,
        }
        self.last_failure = None;
        true
    }
}

impl<C: WindowCapturer, B: RegionBackend + Clone> fmt::Debug for FrameSource<C, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSource")
            .field("config", &self.config)
            .field("channel", &self.channel)
            .field("last_failure", &self.last_failure)
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────
