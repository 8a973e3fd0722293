//! Exponential backoff with jitter for rate-limited remote APIs.
//!
//! ## Schedule
//!
//! `delay = base * multiplier^attempt`, capped at `max_delay`, then shifted
//! by a uniform ±`jitter` fraction and floored at `min_delay`. Throttling
//! errors use a steeper multiplier (3×) than generic failures (2×).
//!
//! With the defaults the waits are roughly:
//!
//! | attempt | generic | rate limited |
//! |---------|---------|--------------|
//! | 0       | 1 s     | 1 s          |
//! | 1       | 2 s     | 3 s          |
//! | 2       | 4 s     | 9 s          |
//! | 4       | 16 s    | 60 s (cap)   |

use rand::Rng;
use std::fmt::Display;
use std::time::Duration;

/// Substrings (lower-case) that mark an error as throttling.
pub const RATE_LIMIT_MARKERS: [&str; 5] = [
    "429",
    "too many requests",
    "rate limit exceeded",
    "quota exceeded",
    "request limit",
];

/// Backoff constants shared by every retried call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Default: 3.
    pub max_attempts: u32,
    /// Delay before the first retry. Default: 1 s.
    pub base_delay: Duration,
    /// Upper bound applied before jitter. Default: 60 s.
    pub max_delay: Duration,
    /// Symmetric jitter fraction of the capped delay. Default: 0.1.
    pub jitter: f64,
    /// Floor applied after jitter. Default: 100 ms.
    pub min_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: 0.1,
            min_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn with_base_delay(mut self, d: Duration) -> Self {
        self.base_delay = d;
        self
    }

    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = d;
        self
    }

    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter = fraction.clamp(0.0, 1.0);
        self
    }

    /// Capped delay before jitter, in seconds.
    pub fn raw_delay_secs(&self, attempt: u32, rate_limited: bool) -> f64 {
        let multiplier: f64 = if rate_limited { 3.0 } else { 2.0 };
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let raw = self.base_delay.as_secs_f64() * multiplier.powi(exponent);
        raw.min(self.max_delay.as_secs_f64())
    }

    /// Jittered delay for `attempt` (0-based) using the thread-local RNG.
    pub fn delay(&self, attempt: u32, rate_limited: bool) -> Duration {
        self.delay_with_rng(attempt, rate_limited, &mut rand::thread_rng())
    }

    /// Jittered delay drawing randomness from `rng`.
    ///
    /// Deterministic for a seeded RNG, which keeps the schedule testable.
    pub fn delay_with_rng<R: Rng>(
        &self,
        attempt: u32,
        rate_limited: bool,
        rng: &mut R,
    ) -> Duration {
        let capped = self.raw_delay_secs(attempt, rate_limited);
        let spread = if self.jitter > 0.0 {
            rng.gen_range(-self.jitter..=self.jitter) * capped
        } else {
            0.0
        };
        let secs = capped + spread;
        if secs <= self.min_delay.as_secs_f64() {
            return self.min_delay;
        }
        Duration::from_secs_f64(secs)
    }
}

/// Returns `true` when the error text looks like request throttling.
pub fn is_rate_limited(error: &impl Display) -> bool {
    let text = error.to_string().to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|m| text.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn delay_stays_within_bounds() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        for attempt in 0..20 {
            for rate_limited in [false, true] {
                for _ in 0..50 {
                    let d = policy
                        .delay_with_rng(attempt, rate_limited, &mut rng)
                        .as_secs_f64();
                    assert!(d >= 0.1, "attempt {attempt}: {d}");
                    assert!(d <= 60.0 * 1.1 + 1e-9, "attempt {attempt}: {d}");
                }
            }
        }
    }

    #[test]
    fn raw_delay_is_monotonic_up_to_cap() {
        let policy = RetryPolicy::default();
        for rate_limited in [false, true] {
            let mut prev = 0.0;
            for attempt in 0..12 {
                let d = policy.raw_delay_secs(attempt, rate_limited);
                assert!(d >= prev, "attempt {attempt}: {d} < {prev}");
                assert!(d <= 60.0);
                prev = d;
            }
            assert_eq!(prev, 60.0);
        }
    }

    #[test]
    fn multipliers_follow_error_class() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.raw_delay_secs(0, false), 1.0);
        assert_eq!(policy.raw_delay_secs(2, false), 4.0);
        assert_eq!(policy.raw_delay_secs(2, true), 9.0);
    }

    #[test]
    fn jitter_is_ten_percent_of_capped_delay() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let d = policy.delay_with_rng(2, false, &mut rng).as_secs_f64();
            assert!((3.6..=4.4).contains(&d), "got {d}");
        }
    }

    #[test]
    fn floor_applies_to_tiny_base() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(1));
        assert_eq!(policy.delay(0, false), Duration::from_millis(100));
    }

    #[test]
    fn zero_jitter_is_exact() {
        let policy = RetryPolicy::default().with_jitter(0.0);
        assert_eq!(policy.delay(1, true), Duration::from_secs(3));
    }

    #[test]
    fn rate_limit_classification() {
        assert!(is_rate_limited(&"HTTP 429"));
        assert!(is_rate_limited(&"Too Many Requests"));
        assert!(is_rate_limited(&"Rate Limit Exceeded for tenancy"));
        assert!(is_rate_limited(&"QUOTA EXCEEDED"));
        assert!(is_rate_limited(&"request limit reached"));
        assert!(!is_rate_limited(&"404 NotAuthorizedOrNotFound"));
        assert!(!is_rate_limited(&"connection reset by peer"));
    }
}
