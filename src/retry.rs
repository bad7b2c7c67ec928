//! The remote extractor's retry/backoff policy.
//!
//! A hand-rolled fixed backoff schedule rather than a generic
//! exponential-jitter helper: we need an exact, deterministic sequence
//! (400, 800, 1600, 3200ms, with 429s capped at 5000ms) that tests can
//! observe directly, which is simpler to express by hand than to coax out
//! of a generic retry combinator.

use std::time::Duration;

/// Initial backoff before the first retry.
const INITIAL_BACKOFF_MS: u64 = 400;
/// Cap applied only to HTTP 429 backoffs.
const RATE_LIMIT_BACKOFF_CAP_MS: u64 = 5000;
/// Maximum number of attempts (including the first).
pub const MAX_ATTEMPTS: u32 = 4;

/// The outcome of classifying one HTTP response status for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Success; stop retrying.
    Success,
    /// HTTP 429: back off (capped) and retry if attempts remain.
    RateLimited,
    /// HTTP 5xx: back off (uncapped, but bounded by attempt count) and retry
    /// if attempts remain.
    ServerError,
    /// HTTP >=400 (and not 429/5xx), or the final attempt was exhausted:
    /// fatal to this document.
    Fatal,
}

/// Classify an HTTP status code for retry purposes.
pub fn classify_status(status: u16) -> RetryClass {
    if status < 400 {
        RetryClass::Success
    } else if status == 429 {
        RetryClass::RateLimited
    } else if (500..600).contains(&status) {
        RetryClass::ServerError
    } else {
        RetryClass::Fatal
    }
}

/// Tracks the current backoff across attempts for one document's remote
/// call.
#[derive(Debug, Clone, Copy)]
pub struct BackoffSchedule {
    current_ms: u64,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            current_ms: INITIAL_BACKOFF_MS,
        }
    }
}

impl BackoffSchedule {
    /// The delay to sleep before the next attempt, given the retry class of
    /// the response that just failed. Doubles the internal counter after
    /// returning, so repeated calls produce 400, 800, 1600, 3200, ... ms
    /// (429 backoffs are additionally capped at 5000ms).
    pub fn next_delay(&mut self, class: RetryClass) -> Duration {
        let delay_ms = match class {
            RetryClass::RateLimited => self.current_ms.min(RATE_LIMIT_BACKOFF_CAP_MS),
            _ => self.current_ms,
        };
        self.current_ms = self.current_ms.saturating_mul(2);
        Duration::from_millis(delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_each_call() {
        let mut schedule = BackoffSchedule::default();
        let delays: Vec<u64> = (0..4)
            .map(|_| schedule.next_delay(RetryClass::ServerError).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![400, 800, 1600, 3200]);
    }

    #[test]
    fn rate_limit_backoff_is_capped() {
        let mut schedule = BackoffSchedule::default();
        // Drive the schedule well past the point where uncapped backoff
        // would exceed the cap.
        for _ in 0..10 {
            let delay = schedule.next_delay(RetryClass::RateLimited);
            assert!(delay.as_millis() as u64 <= RATE_LIMIT_BACKOFF_CAP_MS);
        }
    }

    #[test]
    fn classifies_status_codes() {
        assert_eq!(classify_status(200), RetryClass::Success);
        assert_eq!(classify_status(429), RetryClass::RateLimited);
        assert_eq!(classify_status(503), RetryClass::ServerError);
        assert_eq!(classify_status(404), RetryClass::Fatal);
    }
}
