// src/throttle/backoff.rs
// =============================================================================
// Retry policy and the per-probe retry state machine.
//
//   Pending -> Attempting(n) -> Succeeded
//                            -> Retrying(n, delay) -> Attempting(n + 1) ...
//                            -> Exhausted
//
// BackoffPolicy answers "how long until attempt n+1?" and nothing else.
// RetryTracker walks one URL through the states above and enforces both the
// retry cap and the total delay budget. Neither one sleeps; the worker does.
// =============================================================================

use rand::Rng;
use std::time::Duration;

use crate::checker::{Outcome, ProbeOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Retries after the first attempt (3 = at most 4 attempts)
    pub max_retries: u32,
    /// Delay before the first retry; doubles each retry
    pub base_delay: Duration,
    /// Ceiling for any single delay
    pub max_delay: Duration,
    /// Ceiling for the sum of all delays spent on one URL
    pub max_total_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_total_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Delay before retrying after `attempt` (1-based) ended with `outcome`.
    ///
    /// `None` means: do not retry. Deterministic failures (4xx, redirect
    /// loops) are never retried, and neither is anything past the retry cap.
    pub fn next_delay(&self, attempt: u32, outcome: Outcome) -> Option<Duration> {
        self.next_delay_with_jitter(attempt, outcome, rand::rng().random::<f64>())
    }

    /// Same as [`next_delay`](Self::next_delay) with a fixed jitter in `[0, 1)`.
    pub fn next_delay_with_jitter(&self, attempt: u32, outcome: Outcome, jitter: f64) -> Option<Duration> {
        if !outcome.is_retryable() || attempt == 0 || attempt > self.max_retries {
            return None;
        }

        let factor = 2u32.saturating_pow(attempt - 1);
        let exponential = self.base_delay.saturating_mul(factor);
        let jitter = self.base_delay.mul_f64(jitter.clamp(0.0, 1.0));

        Some(exponential.saturating_add(jitter).min(self.max_delay))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Pending,
    Attempting { attempt: u32 },
    Retrying { attempt: u32, delay: Duration },
    Succeeded { attempts: u32 },
    Exhausted { attempts: u32 },
}

/// Walks one URL through its attempts.
#[derive(Debug)]
pub struct RetryTracker<'a> {
    policy: &'a BackoffPolicy,
    state: RetryState,
    attempts: u32,
    total_delay: Duration,
    fixed_jitter: Option<f64>,
}

impl<'a> RetryTracker<'a> {
    pub fn new(policy: &'a BackoffPolicy) -> Self {
        Self {
            policy,
            state: RetryState::Pending,
            attempts: 0,
            total_delay: Duration::ZERO,
            fixed_jitter: None,
        }
    }

    /// A tracker whose delays carry no randomness.
    pub fn with_jitter(policy: &'a BackoffPolicy, jitter: f64) -> Self {
        Self {
            fixed_jitter: Some(jitter),
            ..Self::new(policy)
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn total_delay(&self) -> Duration {
        self.total_delay
    }

    /// Moves to `Attempting` and returns the 1-based attempt number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.state = RetryState::Attempting {
            attempt: self.attempts,
        };
        self.attempts
    }

    /// Records how the current attempt ended and returns the next state.
    pub fn record(&mut self, probe: &ProbeOutcome) -> RetryState {
        self.state = self.settle(probe);
        self.state
    }

    fn settle(&mut self, probe: &ProbeOutcome) -> RetryState {
        let attempts = self.attempts;

        if probe.outcome == Outcome::Ok {
            return RetryState::Succeeded { attempts };
        }

        let jitter = self
            .fixed_jitter
            .unwrap_or_else(|| rand::rng().random::<f64>());
        let Some(computed) = self
            .policy
            .next_delay_with_jitter(attempts, probe.outcome, jitter)
        else {
            return RetryState::Exhausted { attempts };
        };

        // A server that told us when to come back wins, within the cap
        let delay = probe
            .retry_after
            .map_or(computed, |hint| hint.max(computed))
            .min(self.policy.max_delay);

        if self.total_delay.saturating_add(delay) > self.policy.max_total_delay {
            return RetryState::Exhausted { attempts };
        }

        self.total_delay += delay;
        RetryState::Retrying {
            attempt: attempts,
            delay,
        }
    }
}
