//! Retry wrapper for blocking remote calls.
//!
//! [`Executor::execute`] runs a closure up to [`RetryPolicy::max_attempts`]
//! times, sleeping between attempts for a delay chosen by
//! [`RetryPolicy::delay`]. The sleep is a plain `std::thread::sleep`: callers
//! that must stay responsive run the executor on their own worker thread
//! (or inside `tokio::task::spawn_blocking`).
//!
//! Every failure is retried, whether it looks transient or not. The error
//! class only changes the backoff multiplier and the log wording. On
//! exhaustion the closure's last error is returned as-is so callers can
//! match on the original SDK error.

use super::backoff::{is_rate_limited, RetryPolicy};
use std::fmt::Display;
use tracing::{error, info, warn};

/// Per-invocation retry state. Lives only for one [`Executor::execute`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryContext {
    /// 0-based attempt counter.
    pub attempt: u32,
    /// Whether the most recent failure looked like throttling.
    pub is_rate_limited: bool,
    /// Display text of the most recent failure.
    pub last_error: Option<String>,
}

impl RetryContext {
    fn new() -> Self {
        Self {
            attempt: 0,
            is_rate_limited: false,
            last_error: None,
        }
    }
}

/// Stateless retry-with-backoff wrapper around remote calls.
///
/// Construct once and share by reference; the only state is the policy.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    policy: RetryPolicy,
}

impl Executor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `call` until it succeeds or the attempt budget is spent.
    ///
    /// Blocks the calling thread between attempts. Returns the last error
    /// unchanged when every attempt fails.
    pub fn execute<T, E, F>(&self, mut call: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut ctx = RetryContext::new();

        loop {
            match call() {
                Ok(value) => {
                    if ctx.attempt > 0 {
                        info!(retries = ctx.attempt, "Remote call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    ctx.is_rate_limited = is_rate_limited(&e);
                    ctx.last_error = Some(e.to_string());

                    if ctx.attempt + 1 >= max_attempts {
                        error!(
                            attempts = max_attempts,
                            error = %e,
                            "Remote call failed after final retry"
                        );
                        return Err(e);
                    }

                    let delay = self.policy.delay(ctx.attempt, ctx.is_rate_limited);
                    let kind = if ctx.is_rate_limited {
                        "rate limited"
                    } else {
                        "error"
                    };
                    warn!(
                        attempt = ctx.attempt + 1,
                        max_attempts,
                        delay_secs = delay.as_secs_f64(),
                        error = %truncate(ctx.last_error.as_deref().unwrap_or_default(), 100),
                        "Remote call {kind}, retrying"
                    );
                    std::thread::sleep(delay);
                    ctx.attempt += 1;
                }
            }
        }
    }
}

/// Cut `s` to at most `max` characters for log lines.
fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::{Duration, Instant};

    #[derive(Debug, PartialEq, Eq)]
    struct CallError {
        attempt: u32,
    }

    impl Display for CallError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "attempt {} failed", self.attempt)
        }
    }

    fn fast_executor() -> Executor {
        Executor::new(RetryPolicy::default().with_base_delay(Duration::from_millis(1)))
    }

    #[test]
    fn always_failing_call_returns_last_error() {
        let calls = Cell::new(0u32);
        let result: Result<(), CallError> = fast_executor().execute(|| {
            calls.set(calls.get() + 1);
            Err(CallError {
                attempt: calls.get(),
            })
        });

        assert_eq!(calls.get(), 3);
        assert_eq!(result, Err(CallError { attempt: 3 }));
    }

    #[test]
    fn fails_twice_then_succeeds() {
        let calls = Cell::new(0u32);
        let result = fast_executor().execute(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err("HTTP 429 Too Many Requests")
            } else {
                Ok("ocid1.autonomousdatabase")
            }
        });

        assert_eq!(result, Ok("ocid1.autonomousdatabase"));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn first_success_does_not_sleep() {
        let start = Instant::now();
        let result: Result<u8, &str> = Executor::default().execute(|| Ok(1));
        assert_eq!(result, Ok(1));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn waits_between_attempts() {
        let start = Instant::now();
        let _: Result<(), &str> = fast_executor().execute(|| Err("boom"));
        // Two sleeps, each floored at 100 ms.
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn single_attempt_policy_does_not_retry() {
        let calls = Cell::new(0u32);
        let exec = Executor::new(RetryPolicy::default().with_max_attempts(1));
        let _: Result<(), &str> = exec.execute(|| {
            calls.set(calls.get() + 1);
            Err("bad request")
        });
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("データベース", 3), "データ");
        assert_eq!(truncate("short", 100), "short");
    }
}
