//! # Rate Limiter Module
//!
//! A shared, minute-aligned request/token budget for all chat-completion
//! calls made during one batch run. One instance is constructed per run and
//! shared behind an `Arc`.
//!
//! The window state sits behind a `std::sync::Mutex` that is only held for
//! the bookkeeping itself; waiting happens outside the lock with
//! `tokio::time::sleep`, so waiters never block each other.

use crate::config::RateLimitConfig;
use rand::Rng;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

const WINDOW_MS: u64 = 60_000;
const MAX_SLEEP_MS: u64 = 250;
const RATE_LIMIT_NUDGE_MS: u64 = 50;
const NUDGE_JITTER_MS: u64 = 50;

#[derive(Debug, Default)]
struct Window {
    start_ms: u64,
    requests: u32,
    tokens: u64,
}

/// RPM/TPM budget shared by concurrent callers
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    window: Mutex<Window>,
}

impl RateLimiter {
    /// Create a limiter with the given budget
    ///
    /// Zero budgets are raised to one so `acquire` always terminates.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use catalog_enrichment::ai::rate_limiter::RateLimiter;
    /// use catalog_enrichment::config::RateLimitConfig;
    ///
    /// let limiter = RateLimiter::new(RateLimitConfig { rpm: 2, tpm: 1000, min_sleep_ms: 10 });
    /// assert!(limiter.try_acquire_at(60_000, 100).is_ok());
    /// assert!(limiter.try_acquire_at(60_001, 100).is_ok());
    /// assert!(limiter.try_acquire_at(60_002, 100).is_err());
    /// assert!(limiter.try_acquire_at(120_000, 100).is_ok());
    /// ```
    pub fn new(config: RateLimitConfig) -> Self {
        let config = RateLimitConfig {
            rpm: config.rpm.max(1),
            tpm: config.tpm.max(1),
            min_sleep_ms: config.min_sleep_ms.max(1),
        };
        Self {
            config,
            window: Mutex::new(Window::default()),
        }
    }

    /// Approximate token count, about four characters per token
    pub fn estimate_tokens(text: &str) -> u64 {
        if text.is_empty() {
            return 0;
        }
        ((text.chars().count() as f64 / 4.0).round() as u64).max(1)
    }

    /// Reserve budget at `now_ms` or report how long until the window rolls over
    ///
    /// A single request larger than the whole token budget is clamped to the
    /// budget, so it can still acquire in an otherwise empty window.
    pub fn try_acquire_at(&self, now_ms: u64, estimated_tokens: u64) -> Result<(), Duration> {
        let need = estimated_tokens.max(1).min(self.config.tpm);
        let minute_start = now_ms - now_ms % WINDOW_MS;

        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        if minute_start > window.start_ms {
            window.start_ms = minute_start;
            window.requests = 0;
            window.tokens = 0;
        }

        let have_request = window.requests < self.config.rpm;
        let have_tokens = window.tokens + need <= self.config.tpm;
        if have_request && have_tokens {
            window.requests += 1;
            window.tokens += need;
            return Ok(());
        }

        let next_window = window.start_ms + WINDOW_MS;
        Err(Duration::from_millis(next_window.saturating_sub(now_ms).max(1)))
    }

    /// Wait until a request slot and `estimated_tokens` are available, then reserve them
    pub async fn acquire(&self, estimated_tokens: u64) {
        loop {
            match self.try_acquire_at(now_ms(), estimated_tokens) {
                Ok(()) => return,
                Err(wait) => {
                    let min = self.config.min_sleep_ms;
                    let wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
                    let chunk = wait_ms.clamp(min, MAX_SLEEP_MS.max(min));
                    debug!(wait_ms, "Rate limit budget exhausted, waiting");
                    tokio::time::sleep(Duration::from_millis(chunk)).await;
                }
            }
        }
    }

    /// Brief jittered back-off after the remote API answered 429
    pub async fn on_rate_limit_hit(&self) {
        let jitter = rand::thread_rng().gen_range(0..=NUDGE_JITTER_MS);
        let pause = self.config.min_sleep_ms.max(RATE_LIMIT_NUDGE_MS) + jitter;
        warn!(pause_ms = pause, "Remote rate limit hit, backing off");
        tokio::time::sleep(Duration::from_millis(pause)).await;
    }

    /// Requests and tokens reserved in the current window
    pub fn used(&self) -> (u32, u64) {
        let window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        (window.requests, window.tokens)
    }
}

fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rpm: u32, tpm: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            rpm,
            tpm,
            min_sleep_ms: 1,
        })
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(RateLimiter::estimate_tokens(""), 0);
        assert_eq!(RateLimiter::estimate_tokens("ab"), 1);
        assert_eq!(RateLimiter::estimate_tokens(&"x".repeat(400)), 100);
    }

    #[test]
    fn test_token_budget_blocks_until_rollover() {
        let limiter = limiter(100, 1000);
        assert!(limiter.try_acquire_at(0, 600).is_ok());
        let wait = limiter.try_acquire_at(30_000, 600).unwrap_err();
        assert_eq!(wait, Duration::from_millis(30_000));
        assert!(limiter.try_acquire_at(60_000, 600).is_ok());
        assert_eq!(limiter.used(), (1, 600));
    }

    #[test]
    fn test_oversized_request_is_clamped() {
        let limiter = limiter(10, 500);
        assert!(limiter.try_acquire_at(0, 10_000).is_ok());
        assert_eq!(limiter.used(), (1, 500));
        assert!(limiter.try_acquire_at(1, 1).is_err());
    }

    #[tokio::test]
    async fn test_acquire_returns_with_budget() {
        let limiter = limiter(5, 1000);
        for _ in 0..5 {
            limiter.acquire(10).await;
        }
        let (requests, tokens) = limiter.used();
        // A minute boundary between calls resets the counters
        assert!(requests >= 1 && requests <= 5);
        assert!(tokens <= 50);
    }

    #[test]
    fn test_zero_budget_is_raised_to_one() {
        let limiter = RateLimiter::new(RateLimitConfig {
            rpm: 0,
            tpm: 0,
            min_sleep_ms: 0,
        });
        assert!(limiter.try_acquire_at(0, 100).is_ok());
        assert_eq!(limiter.used(), (1, 1));
        assert!(limiter.try_acquire_at(1, 1).is_err());
    }
}
