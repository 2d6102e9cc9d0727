//! Presentation surfaces and the bridge that exposes them to the core.
//!
//! A [`Presenter`] shows frames synchronously. [`HostBridge`] turns it into
//! the asynchronous "submit now, acknowledge later" surface the paint
//! scheduler expects: every accepted frame produces one acknowledgment on
//! an mpsc channel after the configured latency.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};
use wstream_core::{Dimensions, Frame, Host, StreamError};

/// Events a surface reports back to the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The visible area changed size.
    Resized(Dimensions),
    /// The user closed the surface.
    Closed,
}

/// Something that can show frames.
pub trait Presenter {
    /// Prepare for frames of `dims`.
    fn bind(&mut self, dims: Dimensions) -> Result<(), StreamError>;

    /// Show `frame`.
    fn present(&mut self, frame: Frame) -> Result<(), StreamError>;

    /// Drain pending surface events. Called periodically by the event loop.
    fn poll_events(&mut self) -> Vec<SurfaceEvent> {
        Vec::new()
    }
}

// ── HeadlessPresenter ────────────────────────────────────────────

/// Keeps the last frame and counts the rest. Used with `--headless` and
/// in tests.
#[derive(Debug, Default)]
pub struct HeadlessPresenter {
    bound: Option<Dimensions>,
    presented: u64,
    last: Option<Frame>,
}

impl HeadlessPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bound(&self) -> Option<Dimensions> {
        self.bound
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last.as_ref()
    }
}

impl Presenter for HeadlessPresenter {
    fn bind(&mut self, dims: Dimensions) -> Result<(), StreamError> {
        self.bound = Some(dims);
        Ok(())
    }

    fn present(&mut self, frame: Frame) -> Result<(), StreamError> {
        match self.bound {
            Some(dims) if dims == frame.dimensions() => {}
            other => {
                return Err(StreamError::SurfaceUnavailable(format!(
                    "frame {} does not match surface {:?}",
                    frame.dimensions(),
                    other
                )));
            }
        }
        self.presented += 1;
        if self.presented % 100 == 0 {
            debug!(frames = self.presented, "headless surface");
        }
        self.last = Some(frame);
        Ok(())
    }
}

// ── HostBridge ───────────────────────────────────────────────────

/// [`Host`] implementation over a [`Presenter`].
///
/// Tick requests are recorded as a deadline the event loop sleeps until;
/// acknowledgments travel through the receiver returned by
/// [`new`](Self::new).
pub struct HostBridge<P: Presenter> {
    presenter: P,
    acks: mpsc::UnboundedSender<i32>,
    ack_latency: Duration,
    next_tick: Option<Instant>,
}

impl<P: Presenter> HostBridge<P> {
    pub fn new(presenter: P, ack_latency: Duration) -> (Self, mpsc::UnboundedReceiver<i32>) {
        let (acks, rx) = mpsc::unbounded_channel();
        let bridge = Self {
            presenter,
            acks,
            ack_latency,
            next_tick: None,
        };
        (bridge, rx)
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    /// When the scheduler wants its next tick, if armed.
    pub fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }

    /// Disarm before delivering the tick.
    pub fn take_tick(&mut self) -> Option<Instant> {
        self.next_tick.take()
    }
}

impl<P: Presenter> Host for HostBridge<P> {
    fn bind_surface(&mut self, dims: Dimensions) -> Result<(), StreamError> {
        self.presenter.bind(dims)
    }

    fn submit(&mut self, frame: Frame) -> Result<(), StreamError> {
        self.presenter.present(frame)?;
        let acks = self.acks.clone();
        if self.ack_latency.is_zero() {
            let _ = acks.send(0);
        } else {
            let latency = self.ack_latency;
            tokio::spawn(async move {
                tokio::time::sleep(latency).await;
                let _ = acks.send(0);
            });
        }
        Ok(())
    }

    fn schedule_tick(&mut self, after: Duration) {
        trace!(after_ms = after.as_millis() as u64, "tick armed");
        self.next_tick = Some(Instant::now() + after);
    }
}

// ── Tests ────────────────────────────────────────────────────────
