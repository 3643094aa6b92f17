//! Fixed-duration request window.

use std::time::Duration;
use tokio::time::Instant;

use crate::config::WindowConfig;

/// Point-in-time view of a request window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowState {
    pub count: u32,
    pub started_at: Instant,
    pub duration: Duration,
    /// `min(100, count / max_requests * 100)`.
    pub percentage_used: f64,
    /// Time until the window resets.
    pub remaining: Duration,
}

/// A counter of admitted requests that resets wholesale once its window elapses.
///
/// Methods take `&mut self`; shared use goes through the guard's lock, which
/// makes the check-reset-increment sequence atomic.
#[derive(Debug)]
pub struct WindowTracker {
    count: u32,
    started_at: Instant,
    duration: Duration,
    max_requests: u32,
    block_threshold: u32,
}

impl WindowTracker {
    pub fn new(config: &WindowConfig, now: Instant) -> Self {
        Self {
            count: 0,
            started_at: now,
            duration: config.duration(),
            max_requests: config.max_requests,
            block_threshold: config.block_threshold,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// True once strictly more than the window duration has passed.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) > self.duration
    }

    /// Reset the window if it has expired. Returns true if it did.
    pub fn roll(&mut self, now: Instant) -> bool {
        if self.is_expired(now) {
            self.reset(now);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self, now: Instant) {
        self.count = 0;
        self.started_at = now;
    }

    /// Try to count one more request in the current window.
    ///
    /// A request arriving at or above the block threshold is refused and not
    /// counted, so refused attempts never fill the window.
    pub fn record_attempt(&mut self, now: Instant) -> bool {
        self.roll(now);

        if self.count >= self.block_threshold {
            return false;
        }
        self.count += 1;
        true
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.duration
            .saturating_sub(now.saturating_duration_since(self.started_at))
    }

    /// First instant at which `roll` will reset the window.
    pub fn expires_at(&self) -> Instant {
        self.started_at + self.duration + Duration::from_millis(1)
    }

    pub fn percentage_used(&self) -> f64 {
        if self.max_requests == 0 {
            return 100.0;
        }
        (self.count as f64 / self.max_requests as f64 * 100.0).min(100.0)
    }

    pub fn state(&self, now: Instant) -> WindowState {
        WindowState {
            count: self.count,
            started_at: self.started_at,
            duration: self.duration,
            percentage_used: self.percentage_used(),
            remaining: self.remaining(now),
        }
    }
}
