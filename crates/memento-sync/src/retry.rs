//! Retry scheduling (spec §4.1 "Retries"): `delay = retryDelay × attempt`,
//! up to `maxRetryAttempts`, then `operationAbandoned`.

use std::time::Duration;
use tokio_retry::strategy::FixedInterval;

/// The per-attempt delay sequence for a run with `max_attempts` retries:
/// `base, 2·base, 3·base, ...`. Built on [`FixedInterval`] (this workspace's
/// one retry-strategy crate) rather than hand-rolled multiplication, so the
/// sequence composes with `tokio_retry`'s other combinators if a future
/// caller needs jitter.
#[must_use]
pub fn retry_schedule(base_delay: Duration, max_attempts: u32) -> Vec<Duration> {
    FixedInterval::from_millis(u64::try_from(base_delay.as_millis()).unwrap_or(u64::MAX))
        .take(max_attempts as usize)
        .enumerate()
        .map(|(i, d)| d * (i as u32 + 1))
        .collect()
}

/// The delay before retry attempt `attempt` (1-based) of an operation
/// retried up to `max_attempts` times. Returns `None` once `attempt` exceeds
/// `max_attempts` — the caller should abandon instead.
#[must_use]
pub fn delay_for_attempt(base_delay: Duration, max_attempts: u32, attempt: u32) -> Option<Duration> {
    if attempt == 0 || attempt > max_attempts {
        return None;
    }
    Some(base_delay * attempt)
}
