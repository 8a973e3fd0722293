//! Resilient remote calls and cloud database lifecycle control.
//!
//! ```text
//! LifecycleOperator ──▶ Executor ──▶ DatabaseClient (cloud SDK)
//!                          │
//!                          └── RetryPolicy (backoff + jitter)
//! ```
//!
//! 1. [`backoff`]: delay schedule and rate-limit classification; pure
//! 2. [`executor`]: blocking retry loop around any fallible call
//! 3. [`lifecycle`]: locate / start / stop with fresh-state preconditions

pub mod backoff;
pub mod executor;
pub mod lifecycle;
