// src/engine/result.rs
// =============================================================================
// What a run produces: one ValidationResult per resource, gathered into a
// ValidationRun ordered by table position.
//
// Both are built once and never mutated afterwards. Reporters and the table
// write-back only read them.
// =============================================================================

use chrono::{DateTime, Local};
use std::time::Duration;

use super::mode::ModeKind;
use crate::checker::{Outcome, ProbeOutcome};
use crate::overrides::{ForcedStatus, OverrideEntry};
use crate::table::Resource;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    /// Table position of the resource
    pub sequence: usize,
    pub name: String,
    pub category: String,
    pub sub_category: String,
    pub primary_url: String,
    pub secondary_url: Option<String>,
    pub outcome: Outcome,
    pub status_code: Option<u16>,
    pub message: Option<String>,
    pub latency: Duration,
    /// Network attempts made, across both URLs
    pub attempts: u32,
    /// Set when an override decided the verdict
    pub forced: Option<ForcedStatus>,
    pub override_reason: Option<String>,
    /// The primary failed but the secondary answered
    pub rescued_by_secondary: bool,
    /// `Last Status` as it was before this run
    pub previous_status: Option<String>,
}

impl ValidationResult {
    fn blank(resource: &Resource, outcome: Outcome) -> Self {
        Self {
            sequence: resource.sequence,
            name: resource.name.clone(),
            category: resource.category.clone(),
            sub_category: resource.sub_category.clone(),
            primary_url: resource.primary_url.to_string(),
            secondary_url: resource.secondary_url.as_ref().map(|u| u.to_string()),
            outcome,
            status_code: None,
            message: None,
            latency: Duration::ZERO,
            attempts: 0,
            forced: None,
            override_reason: None,
            rescued_by_secondary: false,
            previous_status: resource.last_status.clone(),
        }
    }

    /// Result of a live check.
    pub fn probed(resource: &Resource, probe: ProbeOutcome, attempts: u32, latency: Duration) -> Self {
        Self {
            status_code: probe.status_code,
            message: probe.message,
            attempts,
            latency,
            ..Self::blank(resource, probe.outcome)
        }
    }

    /// Result decided by a maintainer override; no request was made.
    pub fn overridden(resource: &Resource, entry: &OverrideEntry) -> Self {
        let outcome = match entry.status {
            ForcedStatus::Skip => Outcome::Skipped,
            ForcedStatus::Valid | ForcedStatus::Invalid => Outcome::Overridden,
        };
        Self {
            forced: Some(entry.status),
            override_reason: Some(entry.reason.clone()),
            ..Self::blank(resource, outcome)
        }
    }

    /// Result for a resource the run deadline cut off.
    pub fn timed_out(resource: &Resource, attempts: u32, latency: Duration, message: &str) -> Self {
        Self {
            message: Some(message.to_string()),
            attempts,
            latency,
            ..Self::blank(resource, Outcome::Timeout)
        }
    }

    pub fn with_rescue(mut self) -> Self {
        self.rescued_by_secondary = true;
        self
    }

    pub fn is_failure(&self) -> bool {
        self.outcome.is_failure() || self.forced == Some(ForcedStatus::Invalid)
    }

    /// Broken now, and wasn't recorded as broken before this run.
    pub fn is_newly_broken(&self) -> bool {
        self.is_failure() && !self.previous_status.as_deref().is_some_and(label_is_failure)
    }

    /// Value written to the `Last Status` cell.
    pub fn status_label(&self) -> String {
        match (self.outcome, self.forced) {
            (Outcome::Overridden, Some(forced)) => format!("overridden:{}", forced),
            (outcome, _) => outcome.as_str().to_string(),
        }
    }
}

// Labels written by `status_label` that mean the resource was broken.
// Anything unrecognised (hand-edited cells, legacy values) reads as healthy.
fn label_is_failure(label: &str) -> bool {
    matches!(
        label.trim(),
        "client-error"
            | "server-error"
            | "timeout"
            | "dns-failure"
            | "redirect-loop"
            | "rate-limited"
            | "overridden:invalid"
    )
}

/// Everything one invocation found.
#[derive(Debug, Clone)]
pub struct ValidationRun {
    pub mode: ModeKind,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// Sorted by table position
    pub results: Vec<ValidationResult>,
    /// Local budget denials plus remote rate-limit responses
    pub rate_limit_hits: u64,
}

impl ValidationRun {
    pub fn new(
        mode: ModeKind,
        started_at: DateTime<Local>,
        finished_at: DateTime<Local>,
        mut results: Vec<ValidationResult>,
        rate_limit_hits: u64,
    ) -> Self {
        results.sort_by_key(|result| result.sequence);
        Self {
            mode,
            started_at,
            finished_at,
            results,
            rate_limit_hits,
        }
    }

    /// Resources the run reached a verdict on (everything but skips).
    pub fn total_checked(&self) -> usize {
        self.results.len() - self.total_skipped()
    }

    pub fn total_failed(&self) -> usize {
        self.failures().count()
    }

    pub fn total_overridden(&self) -> usize {
        self.overridden().count()
    }

    pub fn total_skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == Outcome::Skipped)
            .count()
    }

    pub fn total_ok(&self) -> usize {
        self.results.iter().filter(|r| r.outcome == Outcome::Ok).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| r.is_failure())
    }

    pub fn overridden(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results
            .iter()
            .filter(|r| r.outcome == Outcome::Overridden)
    }

    pub fn success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn resource(sequence: usize, last_status: Option<&str>) -> Resource {
        let mut resource = Resource::ad_hoc(
            format!("r{}", sequence),
            Url::parse(&format!("https://r{}.dev", sequence)).unwrap(),
            None,
        );
        resource.sequence = sequence;
        resource.last_status = last_status.map(str::to_string);
        resource
    }

    fn entry(status: ForcedStatus) -> OverrideEntry {
        OverrideEntry {
            url: "https://r0.dev/".to_string(),
            secondary_url: None,
            status,
            reason: "known".to_string(),
            expires: None,
        }
    }

    #[test]
    fn test_overrides_map_to_outcomes() {
        let r = resource(0, None);

        let valid = ValidationResult::overridden(&r, &entry(ForcedStatus::Valid));
        assert_eq!(valid.outcome, Outcome::Overridden);
        assert!(!valid.is_failure());
        assert_eq!(valid.status_label(), "overridden:valid");

        let invalid = ValidationResult::overridden(&r, &entry(ForcedStatus::Invalid));
        assert!(invalid.is_failure());

        let skip = ValidationResult::overridden(&r, &entry(ForcedStatus::Skip));
        assert_eq!(skip.outcome, Outcome::Skipped);
        assert!(!skip.is_failure());
    }

    #[test]
    fn test_newly_broken_depends_on_previous_status() {
        let broken = ProbeOutcome::new(Outcome::ClientError).with_status(404);

        let was_ok = ValidationResult::probed(&resource(0, Some("ok")), broken.clone(), 1, Duration::ZERO);
        assert!(was_ok.is_newly_broken());

        let never_checked = ValidationResult::probed(&resource(0, None), broken.clone(), 1, Duration::ZERO);
        assert!(never_checked.is_newly_broken());

        let was_broken =
            ValidationResult::probed(&resource(0, Some("server-error")), broken, 1, Duration::ZERO);
        assert!(!was_broken.is_newly_broken());
    }

    #[test]
    fn test_run_sorts_by_sequence_and_counts() {
        let now = Local::now();
        let results = vec![
            ValidationResult::probed(&resource(2, None), ProbeOutcome::new(Outcome::Ok), 1, Duration::ZERO),
            ValidationResult::overridden(&resource(1, None), &entry(ForcedStatus::Skip)),
            ValidationResult::probed(&resource(0, None), ProbeOutcome::new(Outcome::Timeout), 4, Duration::ZERO),
        ];
        let run = ValidationRun::new(ModeKind::Full, now, now, results, 0);

        let order: Vec<_> = run.results.iter().map(|r| r.sequence).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(run.total_checked(), 2);
        assert_eq!(run.total_failed(), 1);
        assert_eq!(run.total_skipped(), 1);
        assert!(!run.success());
    }
}
