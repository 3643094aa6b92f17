//! Pause controller: preventive pause plus circuit breaker.
//!
//! # States
//! ```text
//! Closed & Inactive ──AtLimit──▶ Closed & Active ──window reset──▶ Closed & Inactive
//!        │                                                             ▲
//!        └──── failures_to_open overload responses ──▶ Open ──cooldown─┘
//! ```
//!
//! The controller is a plain state machine. It reports what changed as
//! [`Transition`] values; the guard turns those into cancellations, timers,
//! logs and listener notifications.

use std::time::Duration;
use tokio::time::Instant;

use crate::config::GuardConfig;
use crate::limits::{ThresholdLevel, Thresholds, WindowTracker};
use crate::resilience::circuit_breaker::CircuitBreaker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseState {
    Inactive,
    /// Paused until the current window resets at `deadline`.
    Active { deadline: Instant },
}

/// A state change produced by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Paused { resume_at: Instant },
    Resumed,
    Opened { close_at: Instant },
    Closed,
}

impl Transition {
    pub fn kind(&self) -> &'static str {
        match self {
            Transition::Paused { .. } => "paused",
            Transition::Resumed => "resumed",
            Transition::Opened { .. } => "opened",
            Transition::Closed => "closed",
        }
    }

    /// Entering a blocking state aborts everything in flight.
    pub fn cancels_in_flight(&self) -> bool {
        matches!(self, Transition::Paused { .. } | Transition::Opened { .. })
    }
}

#[derive(Debug)]
pub struct PauseController {
    circuit: CircuitBreaker,
    pause: PauseState,
    thresholds: Thresholds,
}

impl PauseController {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            circuit: CircuitBreaker::new(&config.circuit),
            pause: PauseState::Inactive,
            thresholds: Thresholds::from_config(&config.window),
        }
    }

    pub fn circuit(&self) -> &CircuitBreaker {
        &self.circuit
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn pause_state(&self) -> PauseState {
        self.pause
    }

    pub fn is_open(&self) -> bool {
        self.circuit.is_open()
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.pause, PauseState::Active { .. })
    }

    /// Apply the time-driven transitions that are due: an elapsed cooldown
    /// closes the circuit and an expired window ends the pause.
    pub fn sync(&mut self, now: Instant, window: &mut WindowTracker, out: &mut Vec<Transition>) {
        if self.circuit.try_close(now) {
            out.push(Transition::Closed);
        }
        if window.roll(now) && self.is_paused() {
            self.pause = PauseState::Inactive;
            out.push(Transition::Resumed);
        }
    }

    /// Decide whether a new request must be held back.
    pub fn should_block(
        &mut self,
        now: Instant,
        window: &mut WindowTracker,
        out: &mut Vec<Transition>,
    ) -> bool {
        if self.circuit.is_open() {
            self.sync(now, window, out);
            // a circuit that just closed admits the next request
            return self.circuit.is_open();
        }

        self.sync(now, window, out);
        if self.is_paused() {
            return true;
        }

        if self.thresholds.evaluate(window.count()) == ThresholdLevel::AtLimit {
            self.pause_preventively(now, window, out);
            return true;
        }
        false
    }

    /// Pause until the current window resets. No-op while paused or open.
    pub fn pause_preventively(
        &mut self,
        _now: Instant,
        window: &WindowTracker,
        out: &mut Vec<Transition>,
    ) -> bool {
        if self.is_paused() || self.is_open() {
            return false;
        }
        let deadline = window.expires_at();
        self.pause = PauseState::Active { deadline };
        out.push(Transition::Paused { resume_at: deadline });
        true
    }

    /// Open the circuit. No-op while already open.
    pub fn open(&mut self, now: Instant, out: &mut Vec<Transition>) -> bool {
        if !self.circuit.open(now) {
            return false;
        }
        if let Some(close_at) = self.circuit.close_at() {
            out.push(Transition::Opened { close_at });
        }
        true
    }

    pub fn record_overload(&mut self, now: Instant, out: &mut Vec<Transition>) {
        if self.circuit.record_failure() {
            self.open(now, out);
        }
    }

    pub fn record_success(&mut self) {
        self.circuit.record_success();
    }

    /// How long a refused caller should wait before trying again.
    pub fn recommended_delay(&self, now: Instant, window: &WindowTracker) -> Duration {
        if self.is_open() {
            return self.circuit.cooldown_remaining(now);
        }
        if self.is_paused()
            || self.thresholds.evaluate(window.count()) == ThresholdLevel::AtLimit
        {
            return window.remaining(now);
        }
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(now: Instant) -> (PauseController, WindowTracker) {
        let mut config = GuardConfig::default();
        config.window.duration_ms = 1_000;
        config.window.max_requests = 10;
        config.window.warning_threshold = 2;
        config.window.block_threshold = 3;
        config.circuit.cooldown_ms = 500;
        (
            PauseController::new(&config),
            WindowTracker::new(&config.window, now),
        )
    }

    #[test]
    fn test_pauses_at_limit_and_resumes_on_window_reset() {
        let start = Instant::now();
        let (mut ctl, mut window) = setup(start);
        let mut out = Vec::new();

        for _ in 0..3 {
            assert!(!ctl.should_block(start, &mut window, &mut out));
            assert!(window.record_attempt(start));
        }
        assert!(ctl.should_block(start, &mut window, &mut out));
        assert_eq!(out, vec![Transition::Paused { resume_at: window.expires_at() }]);

        out.clear();
        let mid = start + Duration::from_millis(999);
        assert!(ctl.should_block(mid, &mut window, &mut out));
        assert!(out.is_empty());

        let after = start + Duration::from_millis(1_001);
        assert!(!ctl.should_block(after, &mut window, &mut out));
        assert_eq!(out, vec![Transition::Resumed]);
        assert_eq!(window.count(), 0);
    }

    #[test]
    fn test_pause_is_noop_when_open() {
        let now = Instant::now();
        let (mut ctl, window) = setup(now);
        let mut out = Vec::new();

        assert!(ctl.open(now, &mut out));
        assert!(!ctl.pause_preventively(now, &window, &mut out));
        assert!(!ctl.open(now, &mut out));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_overload_opens_then_cooldown_closes() {
        let start = Instant::now();
        let (mut ctl, mut window) = setup(start);
        let mut out = Vec::new();

        ctl.record_overload(start, &mut out);
        assert!(!ctl.is_open());
        ctl.record_overload(start, &mut out);
        assert!(ctl.is_open());
        assert!(matches!(out[0], Transition::Opened { .. }));

        assert!(ctl.should_block(start + Duration::from_millis(500), &mut window, &mut out));
        assert_eq!(
            ctl.recommended_delay(start + Duration::from_millis(200), &window),
            Duration::from_millis(300)
        );

        out.clear();
        assert!(!ctl.should_block(start + Duration::from_millis(501), &mut window, &mut out));
        assert_eq!(out, vec![Transition::Closed]);
        assert_eq!(ctl.circuit().failure_count(), 0);
    }

    #[test]
    fn test_just_closed_circuit_admits_even_while_paused() {
        let start = Instant::now();
        let (mut ctl, mut window) = setup(start);
        let mut out = Vec::new();

        ctl.pause_preventively(start, &window, &mut out);
        ctl.open(start, &mut out);
        assert!(!ctl.should_block(start + Duration::from_millis(600), &mut window, &mut out));
        assert!(ctl.is_paused());
        assert!(ctl.should_block(start + Duration::from_millis(601), &mut window, &mut out));
    }
}
