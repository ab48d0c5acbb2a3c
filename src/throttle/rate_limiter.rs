// src/throttle/rate_limiter.rs
// =============================================================================
// Per-host-class token buckets.
//
// Every outbound request takes one token from the bucket of its host class.
// Buckets refill continuously at a fixed rate up to their capacity. A worker
// that finds its bucket empty sleeps until a token is due, but never longer
// than the wait it was given: past that it gets RateLimited and the backoff
// controller decides what happens next.
//
// The buckets are the only mutable state shared between workers, so each one
// sits behind its own mutex. The lock is held only for the arithmetic, never
// across an await.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::github;

/// Groups of hosts that share one rate budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostClass {
    /// The code-hosting REST API (strict, documented quota)
    CodeHostApi,
    /// Every other host
    General,
}

impl HostClass {
    pub fn of(url: &Url) -> Self {
        if github::is_code_host(url) {
            HostClass::CodeHostApi
        } else {
            HostClass::General
        }
    }
}

impl fmt::Display for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostClass::CodeHostApi => f.write_str("code-host-api"),
            HostClass::General => f.write_str("general"),
        }
    }
}

/// Capacity and refill rate of one bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateBudget {
    /// Tokens available in a burst
    pub capacity: u32,
    /// Tokens added back per second
    pub refill_per_sec: f64,
}

impl RateBudget {
    pub fn per_second(capacity: u32, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            refill_per_sec,
        }
    }

    pub fn per_hour(capacity: u32, per_hour: u32) -> Self {
        Self::per_second(capacity, f64::from(per_hour) / 3600.0)
    }

    /// Anonymous API clients get 60 requests an hour.
    pub fn code_host_anonymous() -> Self {
        Self::per_hour(10, 60)
    }

    /// Token-authenticated API clients get 5000 requests an hour.
    pub fn code_host_authenticated() -> Self {
        Self::per_hour(100, 5000)
    }

    pub fn general() -> Self {
        Self::per_second(20, 10.0)
    }
}

/// Proof that a token was taken. Holding it has no further effect.
#[derive(Debug)]
pub struct Permit {
    pub host_class: HostClass,
}

/// Returned when no token became available within the allowed wait.
#[derive(Debug, Clone, thiserror::Error)]
#[error("no {host_class} request budget available within {max_wait:?}")]
pub struct RateLimited {
    pub host_class: HostClass,
    pub max_wait: Duration,
}

#[derive(Debug)]
struct Bucket {
    budget: RateBudget,
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(budget: RateBudget) -> Self {
        Self {
            budget,
            tokens: f64::from(budget.capacity),
            last_refill: Instant::now(),
        }
    }

    // Ok if a token was taken, otherwise how long until the next one is due
    fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.budget.refill_per_sec)
            .min(f64::from(self.budget.capacity));
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Ok(());
        }

        if self.budget.refill_per_sec <= 0.0 {
            return Err(Duration::MAX);
        }
        // A tiny refill rate can ask for more seconds than a Duration holds
        let wait = (1.0 - self.tokens) / self.budget.refill_per_sec;
        Err(Duration::try_from_secs_f64(wait).unwrap_or(Duration::MAX))
    }
}

pub struct RateLimiter {
    buckets: HashMap<HostClass, Mutex<Bucket>>,
    hits: AtomicU64,
}

impl RateLimiter {
    pub fn new(code_host: RateBudget, general: RateBudget) -> Self {
        let mut buckets = HashMap::new();
        buckets.insert(HostClass::CodeHostApi, Mutex::new(Bucket::new(code_host)));
        buckets.insert(HostClass::General, Mutex::new(Bucket::new(general)));
        Self {
            buckets,
            hits: AtomicU64::new(0),
        }
    }

    /// Budgets for a run, stricter for the API when no token is configured.
    pub fn for_token(has_token: bool, general: RateBudget) -> Self {
        let code_host = if has_token {
            RateBudget::code_host_authenticated()
        } else {
            RateBudget::code_host_anonymous()
        };
        Self::new(code_host, general)
    }

    /// Takes one token for `class`, waiting at most `max_wait` for it.
    pub async fn acquire(&self, class: HostClass, max_wait: Duration) -> Result<Permit, RateLimited> {
        let started = Instant::now();

        loop {
            let wait = match self.take(class) {
                Ok(()) => return Ok(Permit { host_class: class }),
                Err(wait) => wait,
            };

            if started.elapsed().saturating_add(wait) > max_wait {
                self.record_hit();
                warn!(host_class = %class, ?max_wait, "request budget exhausted");
                return Err(RateLimited {
                    host_class: class,
                    max_wait,
                });
            }

            debug!(host_class = %class, ?wait, "waiting for request budget");
            tokio::time::sleep(wait).await;
        }
    }

    /// Counts a rate-limit hit reported by a remote server (HTTP 429).
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Local denials plus remote 429s since the limiter was built.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    fn take(&self, class: HostClass) -> Result<(), Duration> {
        let Some(bucket) = self.buckets.get(&class) else {
            return Ok(());
        };
        // A poisoned bucket still holds valid numbers
        let mut bucket = bucket.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        bucket.try_take(Instant::now())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::for_token(false, RateBudget::general())
    }
}
