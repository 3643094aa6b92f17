//! `Retry-After` header parsing.

use chrono::{DateTime, Utc};
use std::time::{Duration, SystemTime};

/// Parse a `Retry-After` value: either delta-seconds or an HTTP-date.
///
/// Dates in the past yield zero. Anything unparseable yields `None`.
pub fn parse_retry_after(value: &str, now: SystemTime) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let now: DateTime<Utc> = now.into();
    let delta = date.with_timezone(&Utc) - now;
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}
