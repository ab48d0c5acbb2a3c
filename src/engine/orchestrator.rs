// src/engine/orchestrator.rs
// =============================================================================
// Drives a validation run from selection to write-back.
//
// Flow:
// 1. Select resources for the mode (or build one for single-URL mode)
// 2. Fan them out through a bounded pool (buffer_unordered)
// 3. Enforce the run deadline: late starters resolve to timeout without a
//    request, stragglers are abandoned after the grace period
// 4. Sort results by table position and write status back into the table
//
// Rust concepts:
// - Generic over Prober: tests drive the whole engine with a fake prober
// - Box<dyn Reporter>: the output format is picked once, at construction
// =============================================================================

use chrono::Local;
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use super::mode::{Mode, ModeKind, SingleTarget};
use super::result::{ValidationResult, ValidationRun};
use super::worker::{SecondaryPolicy, Worker};
use crate::checker::{Outcome, Prober};
use crate::error::EngineError;
use crate::overrides::OverrideRegistry;
use crate::report::Reporter;
use crate::table::{parse_link, Resource, ResourceTable, TIMESTAMP_FORMAT};
use crate::throttle::{BackoffPolicy, RateLimiter};

/// Worker pool and deadline settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSettings {
    /// Resources checked at once in sweep modes
    pub concurrency: usize,
    /// Wall-clock budget for a sweep
    pub deadline: Duration,
    /// Wall-clock budget for newest-entry and single-URL runs
    pub short_deadline: Duration,
    /// How long in-flight work may run past the deadline
    pub grace: Duration,
    /// Longest one attempt waits for a rate-limiter token
    pub acquire_wait: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            concurrency: 10,
            deadline: Duration::from_secs(30 * 60),
            short_deadline: Duration::from_secs(60),
            grace: Duration::from_secs(5),
            acquire_wait: Duration::from_secs(30),
        }
    }
}

pub struct Orchestrator<P: Prober> {
    prober: P,
    overrides: OverrideRegistry,
    limiter: RateLimiter,
    backoff: BackoffPolicy,
    pool: PoolSettings,
    reporter: Box<dyn Reporter>,
}

impl<P: Prober> Orchestrator<P> {
    pub fn new(prober: P, reporter: Box<dyn Reporter>) -> Self {
        Self {
            prober,
            overrides: OverrideRegistry::empty(),
            limiter: RateLimiter::default(),
            backoff: BackoffPolicy::default(),
            pool: PoolSettings::default(),
            reporter,
        }
    }

    pub fn with_overrides(mut self, overrides: OverrideRegistry) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_pool(mut self, pool: PoolSettings) -> Self {
        self.pool = pool;
        self
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }

    /// Runs any table mode against `table` and writes status back into it
    /// (in memory; saving is the caller's decision).
    ///
    /// Sweeps use the full pool and deadline. Newest-entry mode checks its one
    /// resource alone under the short deadline.
    pub async fn run(&self, mode: &Mode, table: &mut ResourceTable) -> Result<ValidationRun, EngineError> {
        if let Mode::Single(target) = mode {
            return self.run_single(target).await;
        }

        let selected: Vec<Resource> = mode.select(table).into_iter().cloned().collect();
        if selected.is_empty() {
            return Err(EngineError::NothingSelected);
        }

        let kind = mode.kind();
        let (concurrency, budget) = match mode {
            Mode::Newest => (1, self.pool.short_deadline),
            _ => (self.pool.concurrency, self.pool.deadline),
        };

        info!(mode = %kind, resources = selected.len(), concurrency, "starting run");
        let run = self
            .dispatch(kind, selected, concurrency, budget, SecondaryPolicy::Fallback)
            .await;
        write_back(table, &run);
        Ok(run)
    }

    /// Checks one ad-hoc URL. Nothing is written anywhere.
    pub async fn run_single(&self, target: &SingleTarget) -> Result<ValidationRun, EngineError> {
        let invalid = |url: &str, reason: String| EngineError::InvalidUrl {
            url: url.to_string(),
            reason,
        };

        let primary = parse_link(&target.url).map_err(|reason| invalid(&target.url, reason))?;
        let secondary = match &target.secondary_url {
            Some(raw) => Some(parse_link(raw).map_err(|reason| invalid(raw, reason))?),
            None => None,
        };
        let name = target.name.clone().unwrap_or_else(|| primary.to_string());
        let resource = Resource::ad_hoc(name, primary, secondary);

        info!(url = %resource.primary_url, "checking single URL");
        Ok(self
            .dispatch(ModeKind::Single, vec![resource], 1, self.pool.short_deadline, SecondaryPolicy::Required)
            .await)
    }

    /// Renders `run` with the reporter chosen at construction.
    pub fn report(&self, run: &ValidationRun, out: &mut dyn Write) -> std::io::Result<()> {
        self.reporter.render(run, out)
    }

    async fn dispatch(
        &self,
        kind: ModeKind,
        resources: Vec<Resource>,
        concurrency: usize,
        budget: Duration,
        secondary: SecondaryPolicy,
    ) -> ValidationRun {
        let started_at = Local::now();
        let hits_before = self.limiter.hits();

        let deadline = Instant::now() + budget;
        let hard_stop = deadline + self.pool.grace;

        let worker = Worker {
            prober: &self.prober,
            overrides: &self.overrides,
            limiter: &self.limiter,
            backoff: &self.backoff,
            acquire_wait: self.pool.acquire_wait,
            secondary,
        };
        let worker = &worker;

        // Same shape as a plain buffer_unordered fan-out, with each task
        // wrapped in the deadline checks
        let tasks = resources.into_iter().map(|resource| async move {
            if Instant::now() >= deadline {
                return ValidationResult::timed_out(&resource, 0, Duration::ZERO, "not started before the run deadline");
            }

            let started = Instant::now();
            let attempts = AtomicU32::new(0);
            let checked = tokio::time::timeout_at(hard_stop, worker.check(&resource, deadline, &attempts)).await;

            match checked {
                Ok(result) => result,
                Err(_) => {
                    warn!(name = %resource.name, "abandoned at the run deadline");
                    ValidationResult::timed_out(
                        &resource,
                        attempts.load(Ordering::Relaxed),
                        started.elapsed(),
                        "abandoned at the run deadline",
                    )
                }
            }
        });

        let results: Vec<ValidationResult> = stream::iter(tasks)
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let run = ValidationRun::new(
            kind,
            started_at,
            Local::now(),
            results,
            self.limiter.hits().saturating_sub(hits_before),
        );

        info!(
            mode = %kind,
            checked = run.total_checked(),
            failed = run.total_failed(),
            overridden = run.total_overridden(),
            skipped = run.total_skipped(),
            rate_limit_hits = run.rate_limit_hits,
            elapsed = ?run.duration(),
            "run finished"
        );
        run
    }
}

// Skipped resources keep whatever status they had
fn write_back(table: &mut ResourceTable, run: &ValidationRun) {
    let checked_at = run.finished_at.format(TIMESTAMP_FORMAT).to_string();
    for result in &run.results {
        if result.outcome == Outcome::Skipped {
            continue;
        }
        table.record_status(result.sequence, &result.status_label(), &checked_at);
    }
}
