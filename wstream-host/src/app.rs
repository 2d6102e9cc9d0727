//! The host event loop.
//!
//! One task drives everything: the scheduler's tick deadline, flush
//! acknowledgments, control lines, surface events and shutdown are
//! multiplexed with `tokio::select!`. The core is never touched from
//! another thread.

use std::future::Future;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::LinesCodecError;
use tracing::{debug, info, warn};
use wstream_core::channel::{OsBackend, RegionBackend};
use wstream_core::source::PlatformCapturer;
use wstream_core::{
    Command, Dimensions, FrameSource, PaintScheduler, PaintStats, StreamSettings, WindowCapturer,
};

use crate::surface::{HostBridge, Presenter, SurfaceEvent};

/// How often surface events are pumped.
pub const PUMP_INTERVAL: Duration = Duration::from_millis(10);

/// Why the event loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Shutdown,
    SurfaceClosed,
}

/// A scheduler wired to a presenter, plus the acknowledgment receiver.
pub struct EventLoop<P, C = PlatformCapturer, B = OsBackend>
where
    P: Presenter,
    C: WindowCapturer,
    B: RegionBackend + Clone,
{
    scheduler: PaintScheduler<HostBridge<P>, C, B>,
    acks: mpsc::UnboundedReceiver<i32>,
}

impl<P, C, B> EventLoop<P, C, B>
where
    P: Presenter,
    C: WindowCapturer,
    B: RegionBackend + Clone,
{
    pub fn new(
        presenter: P,
        source: FrameSource<C, B>,
        settings: &StreamSettings,
        ack_latency: Duration,
    ) -> Self {
        let (bridge, acks) = HostBridge::new(presenter, ack_latency);
        Self {
            scheduler: PaintScheduler::new(bridge, source, settings),
            acks,
        }
    }

    pub fn scheduler(&self) -> &PaintScheduler<HostBridge<P>, C, B> {
        &self.scheduler
    }

    pub fn presenter(&self) -> &P {
        self.scheduler.host().presenter()
    }

    pub fn stats(&self) -> PaintStats {
        self.scheduler.stats()
    }

    /// Run until `shutdown` resolves or the surface is closed.
    ///
    /// `view` is the initial view size; later sizes come from surface
    /// events. `commands` yields control lines; when it ends, control input
    /// is simply no longer polled.
    pub async fn run<S, F>(&mut self, view: Dimensions, mut commands: S, shutdown: F) -> ExitReason
    where
        S: Stream<Item = Result<String, LinesCodecError>> + Unpin,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut pump = tokio::time::interval(PUMP_INTERVAL);
        pump.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut commands_open = true;

        self.scheduler.start();
        self.scheduler.on_view_changed(view);

        let reason = loop {
            let deadline = self.scheduler.host().next_tick();
            tokio::select! {
                _ = &mut shutdown => break ExitReason::Shutdown,

                _ = sleep_until(deadline) => {
                    self.scheduler.host_mut().take_tick();
                    self.scheduler.on_timer();
                }

                Some(result) = self.acks.recv() => {
                    self.scheduler.on_flush_complete(result);
                }

                line = commands.next(), if commands_open => match line {
                    Some(Ok(line)) => self.handle_line(&line),
                    Some(Err(e)) => warn!("control input error: {e}"),
                    None => {
                        debug!("control input closed");
                        commands_open = false;
                    }
                },

                _ = pump.tick() => {
                    let events = self.scheduler.host_mut().presenter_mut().poll_events();
                    if self.handle_surface_events(events) {
                        break ExitReason::SurfaceClosed;
                    }
                }
            }
        };

        let stats = self.scheduler.stats();
        info!(
            ?reason,
            frames = stats.frames_submitted,
            coalesced = stats.paints_coalesced,
            "event loop stopped"
        );
        reason
    }

    fn handle_line(&mut self, line: &str) {
        let command = Command::parse(line);
        if command.is_ignored() {
            if !line.trim().is_empty() {
                warn!(line, "unrecognised control command");
            }
            return;
        }
        info!(%command, "control command");
        self.scheduler.apply(&command);
    }

    /// Returns `true` when the surface was closed.
    fn handle_surface_events(&mut self, events: Vec<SurfaceEvent>) -> bool {
        for event in events {
            match event {
                SurfaceEvent::Resized(dims) => self.scheduler.on_view_changed(dims),
                SurfaceEvent::Closed => return true,
            }
        }
        false
    }
}

/// Sleep until `deadline`, or forever when there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use futures::stream;
    use wstream_core::source::UnsupportedCapturer;
    use wstream_core::{Frame, FrameSourceConfig, StreamError};

    use super::*;
    use crate::surface::HeadlessPresenter;

    fn lines(items: &[&str]) -> impl Stream<Item = Result<String, LinesCodecError>> + Unpin {
        stream::iter(
            items
                .iter()
                .map(|s| Ok(s.to_string()))
                .collect::<Vec<_>>(),
        )
    }

    fn event_loop(
        config: FrameSourceConfig,
        latency: Duration,
    ) -> EventLoop<HeadlessPresenter, UnsupportedCapturer> {
        let source = FrameSource::with_parts(config, UnsupportedCapturer, OsBackend);
        EventLoop::new(
            HeadlessPresenter::new(),
            source,
            &StreamSettings::default(),
            latency,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn color_only_paints_once_and_idles() {
        let mut ev = event_loop(FrameSourceConfig::default(), Duration::from_millis(5));
        let reason = ev
            .run(
                Dimensions::new(8, 8),
                lines(&[]),
                tokio::time::sleep(Duration::from_millis(500)),
            )
            .await;
        assert_eq!(reason, ExitReason::Shutdown);
        // Initial paint only; the first tick paints once more and stops.
        assert_eq!(ev.presenter().presented(), 2);
        assert!(!ev.scheduler().is_tick_armed());
        let last = ev.presenter().last_frame().unwrap();
        assert_eq!(last.pixel(0, 0), Some(0xFFAA_BBCC));
    }

    #[tokio::test(start_paused = true)]
    async fn commands_repaint_with_new_color() {
        let mut ev = event_loop(FrameSourceConfig::default(), Duration::ZERO);
        ev.run(
            Dimensions::new(4, 4),
            lines(&["setDefaultColor 0xFF102030", "nonsense", ""]),
            tokio::time::sleep(Duration::from_millis(100)),
        )
        .await;
        let last = ev.presenter().last_frame().unwrap();
        assert_eq!(last.pixel(3, 3), Some(0xFF10_2030));
    }

    #[tokio::test(start_paused = true)]
    async fn configured_source_keeps_painting() {
        let mut ev = event_loop(
            FrameSourceConfig {
                window_handle: Some(1),
                ..Default::default()
            },
            Duration::from_millis(5),
        );
        ev.run(
            Dimensions::new(64, 32),
            lines(&[]),
            tokio::time::sleep(Duration::from_millis(300)),
        )
        .await;
        // 30 ms ticks over 300 ms.
        let presented = ev.presenter().presented();
        assert!(presented >= 9, "presented {presented}");
        assert!(ev.scheduler().is_tick_armed());
        assert!(ev.stats().spurious_acks == 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_surface_never_has_two_frames_in_flight() {
        // Acks take longer than a tick: ticks must coalesce.
        let mut ev = event_loop(
            FrameSourceConfig {
                window_handle: Some(1),
                ..Default::default()
            },
            Duration::from_millis(100),
        );
        ev.run(
            Dimensions::new(16, 16),
            lines(&[]),
            tokio::time::sleep(Duration::from_millis(1000)),
        )
        .await;
        let stats = ev.stats();
        assert!(stats.paints_coalesced > 0);
        assert!(stats.frames_submitted <= 11, "{stats:?}");
        assert_eq!(stats.spurious_acks, 0);
    }

    /// Reports a resize then a close.
    #[derive(Default)]
    struct ClosingPresenter {
        polls: u32,
        last: Option<Dimensions>,
    }

    impl Presenter for ClosingPresenter {
        fn bind(&mut self, _dims: Dimensions) -> Result<(), StreamError> {
            Ok(())
        }

        fn present(&mut self, frame: Frame) -> Result<(), StreamError> {
            self.last = Some(frame.dimensions());
            Ok(())
        }

        fn poll_events(&mut self) -> Vec<SurfaceEvent> {
            self.polls += 1;
            match self.polls {
                2 => vec![SurfaceEvent::Resized(Dimensions::new(5, 7))],
                4 => vec![SurfaceEvent::Closed],
                _ => Vec::new(),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn surface_events_resize_and_close() {
        let source = FrameSource::with_parts(
            FrameSourceConfig::default(),
            UnsupportedCapturer,
            OsBackend,
        );
        let mut ev = EventLoop::new(
            ClosingPresenter::default(),
            source,
            &StreamSettings::default(),
            Duration::ZERO,
        );
        let reason = ev
            .run(
                Dimensions::new(2, 2),
                lines(&[]),
                std::future::pending::<()>(),
            )
            .await;
        assert_eq!(reason, ExitReason::SurfaceClosed);
        assert_eq!(ev.presenter().last, Some(Dimensions::new(5, 7)));
        assert_eq!(ev.scheduler().view(), Dimensions::new(5, 7));
    }
}
