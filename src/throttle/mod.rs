// src/throttle/mod.rs
// =============================================================================
// Keeps the engine polite and bounded.
//
// - rate_limiter: token buckets per host class (GitHub API vs everything else)
// - backoff: exponential backoff with jitter and the retry state machine
// =============================================================================

mod backoff;
mod rate_limiter;

pub use backoff::{BackoffPolicy, RetryState, RetryTracker};
pub use rate_limiter::{HostClass, Permit, RateBudget, RateLimited, RateLimiter};
