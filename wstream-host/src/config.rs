//! Configuration for the host harness.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wstream_core::{Dimensions, FrameSourceConfig, StreamSettings};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Frame source and pacing.
    pub stream: StreamConfig,
    /// Initial view geometry.
    pub view: ViewConfig,
    /// Presentation surface.
    pub surface: SurfaceConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Frame source and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Window to capture at startup, 0 for none.
    pub window_handle: u64,
    /// Shared channel to read at startup, empty for none.
    pub stream_name: String,
    /// ARGB fill color when no source is configured.
    pub default_color: u32,
    /// Timer tick interval in milliseconds.
    pub update_interval_ms: u64,
}

/// Initial view geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub width: u32,
    pub height: u32,
    /// Window title (GDI surface only).
    pub title: String,
}

/// Presentation surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Present nowhere; frames are counted and dropped.
    pub headless: bool,
    /// Delay before a submitted frame is acknowledged, in milliseconds.
    pub ack_latency_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for StreamConfig {
    fn default() -> Self {
        let settings = StreamSettings::default();
        Self {
            window_handle: 0,
            stream_name: String::new(),
            default_color: settings.default_color,
            update_interval_ms: settings.update_interval.as_millis() as u64,
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            title: "wstream".into(),
        }
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            headless: false,
            ack_latency_ms: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl HostConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Core pacing settings. The interval is clamped to at least 1 ms.
    pub fn to_stream_settings(&self) -> StreamSettings {
        StreamSettings {
            update_interval: Duration::from_millis(self.stream.update_interval_ms.max(1)),
            default_color: self.stream.default_color,
        }
    }

    /// Frame source configuration at startup.
    pub fn to_source_config(&self) -> FrameSourceConfig {
        FrameSourceConfig {
            window_handle: (self.stream.window_handle != 0).then_some(self.stream.window_handle),
            stream_name: (!self.stream.stream_name.is_empty())
                .then(|| self.stream.stream_name.clone()),
            ..FrameSourceConfig::from(&self.to_stream_settings())
        }
    }

    pub fn view_dimensions(&self) -> Dimensions {
        Dimensions::new(self.view.width, self.view.height)
    }

    pub fn ack_latency(&self) -> Duration {
        Duration::from_millis(self.surface.ack_latency_ms)
    }
}

// ── Tests ────────────────────────────────────────────────────────
