//! Circuit breaker for server-reported overload.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: server is rejecting us, requests fail fast
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure counter reaches failures_to_open
//! Open → Closed: cooldown elapsed (checked on next access or by timer)
//! ```
//!
//! # Design Decisions
//! - One breaker per guard, not per endpoint
//! - No half-open probe; closing is purely time based
//! - Successes decay the failure counter instead of clearing it

use std::time::Duration;
use tokio::time::Instant;

use crate::config::CircuitConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open { opened_at: Instant },
}

/// Overload responses not yet offset by successes. Never negative.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FailureCounter(u32);

impl FailureCounter {
    pub fn increment(&mut self) -> u32 {
        self.0 = self.0.saturating_add(1);
        self.0
    }

    pub fn decrement(&mut self) {
        self.0 = self.0.saturating_sub(1);
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitState,
    failures: FailureCounter,
    cooldown: Duration,
    failures_to_open: u32,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            failures: FailureCounter::default(),
            cooldown: config.cooldown(),
            failures_to_open: config.failures_to_open,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, CircuitState::Open { .. })
    }

    pub fn failure_count(&self) -> u32 {
        self.failures.get()
    }

    /// Open the circuit. Returns false if it was already open.
    pub fn open(&mut self, now: Instant) -> bool {
        if self.is_open() {
            return false;
        }
        self.state = CircuitState::Open { opened_at: now };
        true
    }

    /// Close the circuit and clear the failure counter.
    /// Returns false if it was already closed.
    pub fn close(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        self.state = CircuitState::Closed;
        self.failures.reset();
        true
    }

    pub fn cooldown_elapsed(&self, now: Instant) -> bool {
        match self.state {
            CircuitState::Open { opened_at } => {
                now.saturating_duration_since(opened_at) > self.cooldown
            }
            CircuitState::Closed => false,
        }
    }

    /// Close the circuit if its cooldown has elapsed.
    pub fn try_close(&mut self, now: Instant) -> bool {
        self.cooldown_elapsed(now) && self.close()
    }

    /// First instant at which `try_close` succeeds.
    pub fn close_at(&self) -> Option<Instant> {
        match self.state {
            CircuitState::Open { opened_at } => {
                Some(opened_at + self.cooldown + Duration::from_millis(1))
            }
            CircuitState::Closed => None,
        }
    }

    pub fn cooldown_remaining(&self, now: Instant) -> Duration {
        match self.state {
            CircuitState::Open { opened_at } => self
                .cooldown
                .saturating_sub(now.saturating_duration_since(opened_at)),
            CircuitState::Closed => Duration::ZERO,
        }
    }

    /// Count an overload response. Returns true once the counter has
    /// reached the opening threshold.
    pub fn record_failure(&mut self) -> bool {
        self.failures.increment() >= self.failures_to_open
    }

    pub fn record_success(&mut self) {
        self.failures.decrement();
    }
}
