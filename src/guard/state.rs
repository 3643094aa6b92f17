//! Observable guard state.

use serde::{Serialize, Serializer};
use std::time::Duration;

use crate::limits::ThresholdLevel;

/// Snapshot handed to listeners and returned by [`Guard::state`](crate::Guard::state).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardSnapshot {
    pub is_open: bool,
    pub is_paused: bool,
    pub level: ThresholdLevel,
    pub request_count: u32,
    pub max_requests: u32,
    pub warning_threshold: u32,
    pub block_threshold: u32,
    /// 0 to 100.
    pub percentage_used: f64,
    /// Until the current window resets.
    #[serde(serialize_with = "as_millis", rename = "time_remaining_ms")]
    pub time_remaining: Duration,
    /// Until an open circuit closes; zero when closed.
    #[serde(serialize_with = "as_millis", rename = "cooldown_remaining_ms")]
    pub cooldown_remaining: Duration,
    pub failure_count: u32,
    pub in_flight: usize,
}

/// Most severe condition worth surfacing to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alert {
    NearLimit,
    Paused,
    Open,
}

impl GuardSnapshot {
    pub fn is_near_limit(&self) -> bool {
        self.level != ThresholdLevel::Normal
    }

    pub fn should_block(&self) -> bool {
        self.is_open || self.is_paused || self.level == ThresholdLevel::AtLimit
    }

    pub fn alert(&self) -> Option<Alert> {
        if self.is_open {
            Some(Alert::Open)
        } else if self.is_paused {
            Some(Alert::Paused)
        } else if self.is_near_limit() {
            Some(Alert::NearLimit)
        } else {
            None
        }
    }

    /// Time until the current alert clears on its own.
    pub fn countdown(&self) -> Duration {
        if self.is_open {
            self.cooldown_remaining
        } else {
            self.time_remaining
        }
    }

    /// One-line human summary.
    pub fn describe(&self) -> String {
        match self.alert() {
            Some(Alert::Open) => format!(
                "rate limit exceeded; requests resume in {}",
                format_remaining(self.countdown())
            ),
            Some(Alert::Paused) => format!(
                "paused at {} of {} requests (safe limit {}); resuming in {}",
                self.request_count,
                self.max_requests,
                self.block_threshold,
                format_remaining(self.countdown())
            ),
            Some(Alert::NearLimit) => format!(
                "{} of {} requests used; pausing at {}",
                self.request_count, self.max_requests, self.block_threshold
            ),
            None => format!(
                "{} of {} requests used ({:.1}%)",
                self.request_count, self.max_requests, self.percentage_used
            ),
        }
    }
}

/// `"N seconds"` under a minute, `"m:ss"` otherwise. Seconds round up.
pub fn format_remaining(remaining: Duration) -> String {
    let seconds = millis_u64(remaining).div_ceil(1000);
    if seconds == 1 {
        return "1 second".to_string();
    }
    if seconds < 60 {
        return format!("{} seconds", seconds);
    }
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Whole milliseconds, saturating at `u64::MAX`.
pub(crate) fn millis_u64(value: Duration) -> u64 {
    u64::try_from(value.as_millis()).unwrap_or(u64::MAX)
}

fn as_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(millis_u64(*value))
}
