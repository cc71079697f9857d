//! Button edge debouncing and long-press detection
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Minimum spacing between accepted edges on one button.
pub const DEBOUNCE_WINDOW_MS: u64 = 200;
/// Holding reset at least this long turns the release into a long press.
pub const LONG_PRESS_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Down,
    Up,
    Reset,
}

/// Buttons are wired active-low: pressing produces a falling edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Falling,
    Rising,
}

/// Outcome of a completed press/release pair on the reset button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetGesture {
    ShortPress,
    LongPress,
}

#[derive(Debug, Default)]
struct DebounceTracker {
    last_accepted_at_ms: Option<u64>,
    press_started_at_ms: Option<u64>,
}

impl DebounceTracker {
    fn accept(&mut self, now_ms: u64) -> bool {
        let quiet = self
            .last_accepted_at_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= DEBOUNCE_WINDOW_MS);
        if quiet {
            self.last_accepted_at_ms = Some(now_ms);
        }
        quiet
    }
}

/// Per-button debounce state.
///
/// Each button has its own lock, so edges on different buttons never contend.
#[derive(Debug, Default)]
pub struct InputDebouncer {
    down: Mutex<DebounceTracker>,
    up: Mutex<DebounceTracker>,
    reset: Mutex<DebounceTracker>,
}

impl InputDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    fn tracker(&self, button: Button) -> MutexGuard<'_, DebounceTracker> {
        let tracker = match button {
            Button::Down => &self.down,
            Button::Up => &self.up,
            Button::Reset => &self.reset,
        };
        tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True when the edge falls outside the button's quiet window.
    pub fn accept_edge(&self, button: Button, now_ms: u64) -> bool {
        self.tracker(button).accept(now_ms)
    }

    /// Feed one reset-button edge through the press/release state machine.
    ///
    /// A debounced falling edge starts a press. The next rising edge ends it and is
    /// classified by how long the button was held, however short. Rising edges
    /// without a pending press are ignored.
    pub fn reset_edge(&self, edge: Edge, now_ms: u64) -> Option<ResetGesture> {
        let mut tracker = self.tracker(Button::Reset);
        match edge {
            Edge::Falling => {
                // A press pending from a lost release restarts here.
                if tracker.accept(now_ms) {
                    tracker.press_started_at_ms = Some(now_ms);
                }
                None
            }
            Edge::Rising => {
                let started = tracker.press_started_at_ms?;
                let held = now_ms.saturating_sub(started);
                tracker.press_started_at_ms = None;
                // Release bounce must not start a new press.
                tracker.last_accepted_at_ms = Some(now_ms);
                Some(if held >= LONG_PRESS_MS {
                    ResetGesture::LongPress
                } else {
                    ResetGesture::ShortPress
                })
            }
        }
    }
}
