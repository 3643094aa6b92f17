//! Caller-side retry delays with jitter.
//!
//! The guard never retries on its own. Callers that want to retry use these
//! helpers to turn a [`GuardError`] into a wait.

use rand::Rng;
use std::time::Duration;

use crate::guard::{millis_u64, GuardError};

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    Duration::from_millis(capped_delay + jitter(capped_delay))
}

// 0 to 10% of the delay
fn jitter(delay_ms: u64) -> u64 {
    let range = delay_ms / 10;
    if range > 0 {
        rand::thread_rng().gen_range(0..range)
    } else {
        0
    }
}

/// Retry delay for a failed guarded request, or `None` if it should not be retried.
///
/// Refusals wait for the guard's own hint; cancellations and timeouts are
/// transient and back off exponentially.
pub fn retry_delay(error: &GuardError, attempt: u32, base_ms: u64, max_ms: u64) -> Option<Duration> {
    match error {
        GuardError::Blocked { retry_after, .. } => {
            let ms = millis_u64(*retry_after);
            Some(Duration::from_millis(ms.saturating_add(jitter(ms))))
        }
        GuardError::ServerOverload { .. } => error.retry_after(),
        GuardError::Cancelled { .. } => Some(calculate_backoff(attempt.max(1), base_ms, max_ms)),
        GuardError::Transport(_) if error.is_transient() => {
            Some(calculate_backoff(attempt.max(1), base_ms, max_ms))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::BlockReason;

    #[test]
    fn test_backoff_calculation() {
        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1.as_millis() >= 100);

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, 100, 1000);
        assert!(max.as_millis() >= 1000 && max.as_millis() < 1100);
    }

    #[test]
    fn test_blocked_waits_at_least_the_hint() {
        let err = GuardError::Blocked {
            reason: BlockReason::Paused,
            retry_after: Duration::from_secs(2),
        };
        let delay = retry_delay(&err, 1, 100, 1000).unwrap();
        assert!(delay >= Duration::from_secs(2));
        assert!(delay < Duration::from_millis(2200));
    }

    #[test]
    fn test_huge_hint_saturates() {
        let err = GuardError::Blocked {
            reason: BlockReason::CircuitOpen,
            retry_after: Duration::MAX,
        };
        assert_eq!(retry_delay(&err, 1, 100, 1000), Some(Duration::from_millis(u64::MAX)));
    }

    #[test]
    fn test_cancelled_backs_off_exponentially() {
        let err = GuardError::Cancelled { id: crate::inflight::RequestId::new() };
        assert!(retry_delay(&err, 3, 100, 10_000).unwrap() >= Duration::from_millis(400));
        assert!(retry_delay(&GuardError::QueueClosed, 1, 100, 1000).is_none());
    }
}
