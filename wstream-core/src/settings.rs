//! Runtime settings handed to the core by the host.

use std::time::Duration;

/// Fill color used when no frame source is configured.
pub const DEFAULT_COLOR: u32 = 0xFFAA_BBCC;

/// Delay between timer ticks.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_millis(30);

/// Settings for one [`PaintScheduler`](crate::scheduler::PaintScheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSettings {
    /// Interval the scheduler asks the host to wait before the next tick.
    pub update_interval: Duration,
    /// Initial fallback color.
    pub default_color: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            update_interval: DEFAULT_UPDATE_INTERVAL,
            default_color: DEFAULT_COLOR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = StreamSettings::default();
        assert_eq!(s.update_interval, Duration::from_millis(30));
        assert_eq!(s.default_color, 0xFFAABBCC);
    }
}
