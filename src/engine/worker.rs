// src/engine/worker.rs
// =============================================================================
// Checks one resource: override lookup, then probes with retries.
//
// Per resource:
// 1. An override in force decides the verdict without touching the network
// 2. Otherwise the primary URL is probed, retrying transient failures
// 3. If the primary failed and there is a secondary URL, it gets probed too
//
// Every attempt takes a rate-limiter token first. No new attempt starts once
// the run deadline has passed; the orchestrator abandons whatever is still
// running after the grace period.
// =============================================================================

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use super::result::ValidationResult;
use crate::checker::{Outcome, ProbeOutcome, Prober};
use crate::overrides::OverrideRegistry;
use crate::table::Resource;
use crate::throttle::{BackoffPolicy, HostClass, RateLimiter, RetryState, RetryTracker};

/// How the secondary URL affects the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryPolicy {
    /// Table modes: either URL answering means the resource is live
    Fallback,
    /// Single-URL mode: a given secondary must pass as well
    Required,
}

pub struct Worker<'a, P: Prober> {
    pub prober: &'a P,
    pub overrides: &'a OverrideRegistry,
    pub limiter: &'a RateLimiter,
    pub backoff: &'a BackoffPolicy,
    /// Longest a single attempt waits for a rate-limiter token
    pub acquire_wait: Duration,
    pub secondary: SecondaryPolicy,
}

impl<'a, P: Prober> Worker<'a, P> {
    /// Checks one resource. `attempts` is shared with the caller so the count
    /// survives if this future is dropped at the hard stop.
    pub async fn check(&self, resource: &Resource, deadline: Instant, attempts: &AtomicU32) -> ValidationResult {
        let started = Instant::now();

        let secondary = resource.secondary_url.as_ref().map(Url::as_str);
        if let Some(entry) = self.overrides.lookup(resource.primary_url.as_str(), secondary) {
            debug!(name = %resource.name, status = %entry.status, "override in force, not probing");
            return ValidationResult::overridden(resource, entry);
        }

        let primary = self.probe_with_retries(&resource.primary_url, deadline, attempts).await;

        let Some(secondary_url) = &resource.secondary_url else {
            return self.finish(resource, primary, started, attempts);
        };

        match (self.secondary, primary.is_ok()) {
            (SecondaryPolicy::Fallback, true) => self.finish(resource, primary, started, attempts),
            (SecondaryPolicy::Fallback, false) => {
                let fallback = self.probe_with_retries(secondary_url, deadline, attempts).await;
                if fallback.is_ok() {
                    debug!(name = %resource.name, "primary failed, secondary answered");
                    self.finish(resource, fallback, started, attempts).with_rescue()
                } else {
                    self.finish(resource, primary, started, attempts)
                }
            }
            (SecondaryPolicy::Required, false) => self.finish(resource, primary, started, attempts),
            (SecondaryPolicy::Required, true) => {
                let required = self.probe_with_retries(secondary_url, deadline, attempts).await;
                if required.is_ok() {
                    self.finish(resource, required, started, attempts)
                } else {
                    let message = format!(
                        "secondary link {}: {}",
                        secondary_url,
                        required.message.as_deref().unwrap_or(required.outcome.as_str())
                    );
                    self.finish(resource, required.with_message(message), started, attempts)
                }
            }
        }
    }

    fn finish(&self, resource: &Resource, probe: ProbeOutcome, started: Instant, attempts: &AtomicU32) -> ValidationResult {
        ValidationResult::probed(resource, probe, attempts.load(Ordering::Relaxed), started.elapsed())
    }

    /// Probes `url` until it succeeds, fails for good, runs out of retries,
    /// or the deadline stops further attempts.
    pub async fn probe_with_retries(&self, url: &Url, deadline: Instant, attempts: &AtomicU32) -> ProbeOutcome {
        let mut tracker = RetryTracker::new(self.backoff);
        let class = HostClass::of(url);

        loop {
            if Instant::now() >= deadline {
                return ProbeOutcome::new(Outcome::Timeout).with_message("run deadline reached");
            }

            let attempt = tracker.begin_attempt();
            attempts.fetch_add(1, Ordering::Relaxed);
            let probe = self.attempt(url, class, deadline).await;
            debug!(%url, attempt, outcome = %probe.outcome, "attempt finished");

            match tracker.record(&probe) {
                RetryState::Retrying { delay, .. } => {
                    // The last real answer beats a synthetic timeout
                    if Instant::now() + delay >= deadline {
                        debug!(%url, "retry would start past the run deadline");
                        return probe;
                    }
                    warn!(%url, attempt, outcome = %probe.outcome, ?delay, "transient failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                _ => return probe,
            }
        }
    }

    async fn attempt(&self, url: &Url, class: HostClass, deadline: Instant) -> ProbeOutcome {
        let wait = self
            .acquire_wait
            .min(deadline.saturating_duration_since(Instant::now()));

        if let Err(denied) = self.limiter.acquire(class, wait).await {
            return ProbeOutcome::new(Outcome::RateLimited).with_message(denied.to_string());
        }

        let probe = self.prober.probe(url).await;
        if probe.outcome == Outcome::RateLimited {
            self.limiter.record_hit();
        }
        probe
    }
}
