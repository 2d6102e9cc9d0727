//! Timer-driven paint loop.
//!
//! The scheduler is a pure event handler: the host delivers timer ticks,
//! view changes, flush acknowledgments and control commands, and the
//! scheduler calls back through [`Host`] to bind the surface, submit
//! frames and arm the next tick. At most one frame is ever in flight;
//! paints requested meanwhile collapse into a single repaint that runs
//! when the acknowledgment arrives.

pub mod state;

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::channel::{OsBackend, RegionBackend};
use crate::control::Command;
use crate::error::StreamError;
use crate::frame::{Dimensions, Frame};
use crate::settings::StreamSettings;
use crate::source::{FrameSource, PlatformCapturer, WindowCapturer};

pub use state::PaintState;

/// What the scheduler needs from its embedding.
pub trait Host {
    /// (Re)create the presentation surface for `dims`.
    fn bind_surface(&mut self, dims: Dimensions) -> Result<(), StreamError>;

    /// Hand `frame` to the surface. Completion is reported later through
    /// [`PaintScheduler::on_flush_complete`].
    fn submit(&mut self, frame: Frame) -> Result<(), StreamError>;

    /// Deliver [`PaintScheduler::on_timer`] once, `after` from now.
    fn schedule_tick(&mut self, after: Duration);
}

/// Counters for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaintStats {
    pub frames_submitted: u64,
    /// Paint requests folded into a pending repaint.
    pub paints_coalesced: u64,
    pub submit_failures: u64,
    pub bind_failures: u64,
    /// Acknowledgments received with no flush outstanding.
    pub spurious_acks: u64,
}

/// Drives a [`FrameSource`] against a [`Host`] surface.
pub struct PaintScheduler<H, C = PlatformCapturer, B = OsBackend>
where
    H: Host,
    C: WindowCapturer,
    B: RegionBackend + Clone,
{
    host: H,
    source: FrameSource<C, B>,
    interval: Duration,
    state: PaintState,
    view: Dimensions,
    bound: bool,
    tick_armed: bool,
    stats: PaintStats,
}

impl<H, C, B> PaintScheduler<H, C, B>
where
    H: Host,
    C: WindowCapturer,
    B: RegionBackend + Clone,
{
    pub fn new(host: H, source: FrameSource<C, B>, settings: &StreamSettings) -> Self {
        Self {
            host,
            source,
            interval: settings.update_interval,
            state: PaintState::Idle,
            view: Dimensions::default(),
            bound: false,
            tick_armed: false,
            stats: PaintStats::default(),
        }
    }

    /// Arm the first tick.
    pub fn start(&mut self) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            source = %self.source.config().kind(),
            "paint scheduler started"
        );
        self.arm_tick();
    }

    // ── Host events ──────────────────────────────────────────────

    /// The armed tick fired.
    pub fn on_timer(&mut self) {
        self.tick_armed = false;
        if self.source.config().has_source() {
            self.arm_tick();
        }
        self.paint();
    }

    /// The surface finished presenting the last submitted frame.
    pub fn on_flush_complete(&mut self, result: i32) {
        if result != 0 {
            warn!(result, "flush completed with error");
        }
        match self.state.complete_flush() {
            Ok(true) => self.paint(),
            Ok(false) => {}
            Err(e) => {
                self.stats.spurious_acks += 1;
                warn!("ignoring flush acknowledgment: {e}");
            }
        }
    }

    /// The view geometry changed.
    pub fn on_view_changed(&mut self, dims: Dimensions) {
        if dims != self.view || !self.bound {
            self.view = dims;
            self.bound = false;
            if !dims.is_empty() {
                match self.host.bind_surface(dims) {
                    Ok(()) => {
                        self.bound = true;
                        debug!(%dims, "surface bound");
                    }
                    Err(e) => {
                        self.stats.bind_failures += 1;
                        warn!(%dims, "surface bind failed: {e}");
                        return;
                    }
                }
            }
        }
        self.paint();
    }

    /// Apply a control command and repaint right away.
    pub fn apply(&mut self, command: &Command) {
        if !self.source.apply(command) {
            debug!("control command ignored");
            return;
        }
        if self.source.config().has_source() && !self.tick_armed {
            self.arm_tick();
        }
        self.paint();
    }

    // ── Painting ─────────────────────────────────────────────────

    /// Attempt a paint, coalescing with an outstanding flush.
    pub fn paint(&mut self) {
        if !self.state.request_paint() {
            self.stats.paints_coalesced += 1;
            return;
        }
        if self.view.is_empty() || !self.bound {
            return;
        }

        let frame = self.source.produce(self.view);
        if frame.is_empty() {
            return;
        }
        match self.host.submit(frame) {
            Ok(()) => {
                if let Err(e) = self.state.begin_flush() {
                    warn!("{e}");
                    return;
                }
                self.stats.frames_submitted += 1;
            }
            Err(e) => {
                self.stats.submit_failures += 1;
                warn!(dims = %self.view, "frame submit failed: {e}");
            }
        }
    }

    fn arm_tick(&mut self) {
        self.host.schedule_tick(self.interval);
        self.tick_armed = true;
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn source(&self) -> &FrameSource<C, B> {
        &self.source
    }

    pub fn state(&self) -> PaintState {
        self.state
    }

    pub fn view(&self) -> Dimensions {
        self.view
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn is_tick_armed(&self) -> bool {
        self.tick_armed
    }

    pub fn stats(&self) -> PaintStats {
        self.stats
    }
}

impl<H, C, B> std::fmt::Debug for PaintScheduler<H, C, B>
where
    H: Host,
    C: WindowCapturer,
    B: RegionBackend + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaintScheduler")
            .field("state", &self.state)
            .field("view", &self.view)
            .field("bound", &self.bound)
            .field("tick_armed", &self.tick_armed)
            .field("stats", &self.stats)
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SharedRegion;
    use crate::source::{CapturedImage, FrameSourceConfig};

    #[derive(Default)]
    struct MockHost {
        binds: Vec<Dimensions>,
        submitted: Vec<Frame>,
        ticks: u32,
        fail_bind: bool,
        fail_submit: bool,
    }

    impl Host for MockHost {
        fn bind_surface(&mut self, dims: Dimensions) -> Result<(), StreamError> {
            self.binds.push(dims);
            if self.fail_bind {
                return Err(StreamError::SurfaceUnavailable("mock".into()));
            }
            Ok(())
        }

        fn submit(&mut self, frame: Frame) -> Result<(), StreamError> {
            if self.fail_submit {
                return Err(StreamError::SurfaceUnavailable("mock".into()));
            }
            self.submitted.push(frame);
            Ok(())
        }

        fn schedule_tick(&mut self, after: Duration) {
            assert_eq!(after, Duration::from_millis(30));
            self.ticks += 1;
        }
    }

    /// Captures a 4x4 white square for any handle.
    struct SquareCapturer([u32; 16]);

    impl WindowCapturer for SquareCapturer {
        fn capture(&mut self, _handle: u64) -> Result<CapturedImage<'_>, StreamError> {
            Ok(CapturedImage {
                dims: Dimensions::new(4, 4),
                pixels: &self.0,
            })
        }
    }

    #[derive(Clone)]
    struct NoRegions;

    impl RegionBackend for NoRegions {
        fn create(&mut self, _os_name: &str, _len: usize) -> Result<SharedRegion, StreamError> {
            Err(StreamError::ChannelUnavailable("no regions in tests".into()))
        }
    }

    type TestScheduler = PaintScheduler<MockHost, SquareCapturer, NoRegions>;

    fn scheduler(config: FrameSourceConfig) -> TestScheduler {
        let source =
            FrameSource::with_parts(config, SquareCapturer([0xFFFF_FFFF; 16]), NoRegions);
        PaintScheduler::new(MockHost::default(), source, &StreamSettings::default())
    }

    fn window_config() -> FrameSourceConfig {
        FrameSourceConfig {
            window_handle: Some(7),
            ..Default::default()
        }
    }

    #[test]
    fn start_arms_first_tick() {
        let mut s = scheduler(FrameSourceConfig::default());
        s.start();
        assert!(s.is_tick_armed());
        assert_eq!(s.host().ticks, 1);
    }

    #[test]
    fn empty_view_never_submits() {
        let mut s = scheduler(window_config());
        s.start();
        s.on_view_changed(Dimensions::new(0, 100));
        for _ in 0..5 {
            s.on_timer();
        }
        assert!(s.host().submitted.is_empty());
        assert!(s.host().binds.is_empty());
        assert!(s.state().is_idle());
    }

    #[test]
    fn view_change_binds_and_paints() {
        let mut s = scheduler(FrameSourceConfig::default());
        s.on_view_changed(Dimensions::new(20, 10));
        assert_eq!(s.host().binds, vec![Dimensions::new(20, 10)]);
        assert_eq!(s.host().submitted.len(), 1);
        assert_eq!(s.state(), PaintState::FlushInFlight);

        // Same size: no rebind, paint coalesces behind the flush.
        s.on_view_changed(Dimensions::new(20, 10));
        assert_eq!(s.host().binds.len(), 1);
        assert_eq!(s.state(), PaintState::FlushInFlightPending);
    }

    #[test]
    fn paints_during_flush_coalesce_into_one() {
        let mut s = scheduler(window_config());
        s.on_view_changed(Dimensions::new(8, 8));
        assert_eq!(s.host().submitted.len(), 1);

        for _ in 0..25 {
            s.paint();
        }
        assert_eq!(s.host().submitted.len(), 1);
        assert_eq!(s.stats().paints_coalesced, 25);

        s.on_flush_complete(0);
        assert_eq!(s.host().submitted.len(), 2);
        assert_eq!(s.state(), PaintState::FlushInFlight);

        s.on_flush_complete(0);
        assert_eq!(s.host().submitted.len(), 2);
        assert!(s.state().is_idle());
    }

    #[test]
    fn frames_match_view_exactly() {
        let mut s = scheduler(window_config());
        for dims in [
            Dimensions::new(1, 1),
            Dimensions::new(3, 9),
            Dimensions::new(64, 2),
        ] {
            s.on_view_changed(dims);
            s.on_flush_complete(0);
        }
        let sizes: Vec<_> = s.host().submitted.iter().map(Frame::dimensions).collect();
        assert_eq!(
            sizes,
            vec![
                Dimensions::new(1, 1),
                Dimensions::new(3, 9),
                Dimensions::new(64, 2)
            ]
        );
    }

    #[test]
    fn configured_source_keeps_ticking() {
        let mut s = scheduler(FrameSourceConfig {
            stream_name: Some("forever".into()),
            ..Default::default()
        });
        s.start();
        s.on_view_changed(Dimensions::new(16, 16));
        for _ in 0..100 {
            assert!(s.is_tick_armed());
            s.on_timer();
            s.on_flush_complete(0);
        }
        assert_eq!(s.host().ticks, 101);
        assert!(s.host().submitted.len() >= 100);
    }

    #[test]
    fn color_only_does_not_rearm() {
        let mut s = scheduler(FrameSourceConfig::default());
        s.start();
        s.on_timer();
        assert!(!s.is_tick_armed());
        assert_eq!(s.host().ticks, 1);
    }

    #[test]
    fn command_configuring_source_arms_tick() {
        let mut s = scheduler(FrameSourceConfig::default());
        s.on_view_changed(Dimensions::new(4, 4));
        s.on_flush_complete(0);
        assert!(!s.is_tick_armed());

        s.apply(&Command::SetWindowHandle(7));
        assert!(s.is_tick_armed());
        assert_eq!(s.host().ticks, 1);
        // Painted immediately, without waiting for the tick.
        assert_eq!(s.host().submitted.len(), 2);
        assert_eq!(s.host().submitted[1].pixel(0, 0), Some(0xFFFF_FFFF));

        // Already armed: no second tick.
        s.on_flush_complete(0);
        s.apply(&Command::SetStreamName("x".into()));
        assert_eq!(s.host().ticks, 1);
    }

    #[test]
    fn ignored_command_does_nothing() {
        let mut s = scheduler(FrameSourceConfig::default());
        s.on_view_changed(Dimensions::new(4, 4));
        s.on_flush_complete(0);
        s.apply(&Command::Ignored);
        assert_eq!(s.host().submitted.len(), 1);
        assert!(!s.is_tick_armed());
    }

    #[test]
    fn bind_failure_skips_painting_until_rebound() {
        let mut s = scheduler(window_config());
        s.host_mut().fail_bind = true;
        s.on_view_changed(Dimensions::new(10, 10));
        s.on_timer();
        assert!(s.host().submitted.is_empty());
        assert!(!s.is_bound());
        assert_eq!(s.stats().bind_failures, 1);

        s.host_mut().fail_bind = false;
        s.on_view_changed(Dimensions::new(10, 10));
        assert!(s.is_bound());
        assert_eq!(s.host().submitted.len(), 1);
    }

    #[test]
    fn failed_submit_stays_idle() {
        let mut s = scheduler(window_config());
        s.host_mut().fail_submit = true;
        s.on_view_changed(Dimensions::new(5, 5));
        assert!(s.state().is_idle());
        assert_eq!(s.stats().submit_failures, 1);

        s.host_mut().fail_submit = false;
        s.on_timer();
        assert_eq!(s.state(), PaintState::FlushInFlight);
    }

    #[test]
    fn spurious_ack_is_ignored() {
        let mut s = scheduler(window_config());
        s.on_flush_complete(0);
        s.on_flush_complete(-2);
        assert!(s.state().is_idle());
        assert_eq!(s.stats().spurious_acks, 2);
    }

    #[test]
    fn failed_flush_result_still_completes() {
        let mut s = scheduler(window_config());
        s.on_view_changed(Dimensions::new(5, 5));
        s.paint();
        s.on_flush_complete(-1);
        // Pending repaint replayed despite the error code.
        assert_eq!(s.host().submitted.len(), 2);
    }
}
