//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Optional dependency registration:
//!     → retries.rs (bounded attempts, log each failure)
//!     → backoff.rs (linear delay per attempt)
//!     → Sleeper (tokio timer in production, recorded in tests)
//! ```
//!
//! # Design Decisions
//! - Only optional dependencies are retried; required ones fail fast
//! - Retry budgets are fixed; loops never restart themselves
//! - Sleeping is injected so backoff schedules are testable without delays

pub mod backoff;
pub mod retries;

pub use backoff::{linear_backoff, Sleeper, TokioSleeper};
pub use retries::{retry_bounded, RetryOutcome, RetryPolicy};
