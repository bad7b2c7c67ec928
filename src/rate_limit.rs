//! A single shared pacer enforcing at most `qps` remote dispatches per
//! second across all worker threads.
//!
//! We want a fixed dispatch cadence (schedule the next permitted dispatch
//! at `now + 1000/qps` ms), not a bucket that allows bursts, so this is a
//! plain `Mutex<Instant>` pacer rather than a generic token-bucket crate.

use std::{
    sync::Mutex,
    thread,
    time::{Duration, Instant},
};

/// Default dispatches-per-second. Not exposed on the CLI.
pub const DEFAULT_QPS: u32 = 3;

/// Process-wide (well, instance-wide — see `DESIGN.md` for why this is a
/// collaborator object rather than a `static`) rate limiter.
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Instant>,
}

impl RateLimiter {
    /// Create a limiter allowing at most `qps` dispatches per second.
    pub fn new(qps: u32) -> Self {
        let qps = qps.max(1);
        Self {
            interval: Duration::from_millis(1000 / u64::from(qps)),
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Block the calling thread until a dispatch slot is available, then
    /// reserve the next one.
    pub fn acquire(&self) {
        let wait_until = {
            let mut next_slot = self.next_slot.lock().expect("rate limiter lock poisoned");
            let now = Instant::now();
            let slot = (*next_slot).max(now);
            *next_slot = slot + self.interval;
            slot
        };
        let now = Instant::now();
        if wait_until > now {
            thread::sleep(wait_until - now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn single_thread_spaces_out_dispatches() {
        let limiter = RateLimiter::new(10);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire();
        }
        // 5 dispatches at 10/s should take at least ~400ms (4 intervals).
        assert!(start.elapsed() >= Duration::from_millis(350));
    }

    #[test]
    fn concurrent_callers_serialize_on_the_shared_limiter() {
        let limiter = Arc::new(RateLimiter::new(20));
        let start = Instant::now();
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let limiter = limiter.clone();
                thread::spawn(move || limiter.acquire())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        // 10 dispatches at 20/s should take at least ~450ms (9 intervals).
        assert!(start.elapsed() >= Duration::from_millis(400));
    }
}
