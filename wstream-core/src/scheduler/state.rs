//! Paint state machine.
//!
//! Models the single outstanding flush allowed against the presentation
//! surface, with validated transitions that return `Result` instead of
//! panicking.

use crate::error::StreamError;

// ── PaintState ───────────────────────────────────────────────────

/// Where the scheduler stands with respect to the presentation surface.
///
/// ```text
///            begin_flush              request_paint
///   Idle ───────────────► FlushInFlight ─────────────► FlushInFlightPending
///    ▲                          │                              │
///    │      complete_flush      │        complete_flush        │
///    └──────────────────────────┴──────────────────────────────┘
///                                        (caller repaints)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaintState {
    /// Nothing submitted; a paint may start.
    #[default]
    Idle,

    /// One frame submitted, acknowledgment outstanding.
    FlushInFlight,

    /// As above, and at least one paint was requested meanwhile.
    FlushInFlightPending,
}

impl std::fmt::Display for PaintState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::FlushInFlight => write!(f, "FlushInFlight"),
            Self::FlushInFlightPending => write!(f, "FlushInFlightPending"),
        }
    }
}

impl PaintState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// `true` while a submitted frame awaits acknowledgment.
    pub fn is_flushing(&self) -> bool {
        !self.is_idle()
    }

    pub fn has_pending(&self) -> bool {
        matches!(self, Self::FlushInFlightPending)
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Ask to paint. Returns `true` when the caller may paint now.
    ///
    /// During a flush the request is folded into a single pending repaint
    /// and `false` is returned.
    pub fn request_paint(&mut self) -> bool {
        match self {
            Self::Idle => true,
            Self::FlushInFlight | Self::FlushInFlightPending => {
                *self = Self::FlushInFlightPending;
                false
            }
        }
    }

    /// Transition to `FlushInFlight` after a successful submit.
    ///
    /// Valid from: `Idle`.
    pub fn begin_flush(&mut self) -> Result<(), StreamError> {
        match self {
            Self::Idle => {
                *self = Self::FlushInFlight;
                Ok(())
            }
            _ => Err(StreamError::InvalidTransition(
                "cannot flush: a flush is already outstanding",
            )),
        }
    }

    /// Transition back to `Idle` on acknowledgment. Returns whether a
    /// repaint was requested during the flush.
    ///
    /// Valid from: `FlushInFlight`, `FlushInFlightPending`.
    pub fn complete_flush(&mut self) -> Result<bool, StreamError> {
        let pending = match self {
            Self::FlushInFlight => false,
            Self::FlushInFlightPending => true,
            Self::Idle => {
                return Err(StreamError::InvalidTransition(
                    "cannot complete flush: none outstanding",
                ));
            }
        };
        *self = Self::Idle;
        Ok(pending)
    }
}

// ── Tests ────────────────────────────────────────────────────────
