// src/report/machine.rs
// =============================================================================
// JSON report for CI.
//
// Only failed and overridden resources get an entry; healthy ones are
// summarised in the totals. Each failure carries a ready-to-print workflow
// annotation so a CI step can simply echo it.
// =============================================================================

use serde::Serialize;
use std::io::{self, Write};

use super::Reporter;
use crate::checker::Outcome;
use crate::engine::{ModeKind, ValidationResult, ValidationRun};
use crate::overrides::ForcedStatus;

pub struct MachineReporter;

#[derive(Debug, Serialize)]
pub struct MachineReport<'a> {
    pub success: bool,
    pub mode: ModeKind,
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: u64,
    pub totals: Totals,
    pub entries: Vec<Entry<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Totals {
    pub checked: usize,
    pub failed: usize,
    pub overridden: usize,
    pub skipped: usize,
    pub rate_limit_hits: u64,
}

#[derive(Debug, Serialize)]
pub struct Entry<'a> {
    pub name: &'a str,
    pub category: &'a str,
    pub sub_category: &'a str,
    pub primary_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_url: Option<&'a str>,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'a str>,
    pub attempts: u32,
    pub latency_ms: u64,
    pub newly_broken: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forced_status: Option<ForcedStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_reason: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

impl<'a> MachineReport<'a> {
    pub fn from_run(run: &'a ValidationRun) -> Self {
        let entries = run
            .results
            .iter()
            .filter(|r| r.is_failure() || r.outcome == Outcome::Overridden)
            .map(Entry::from_result)
            .collect();

        Self {
            success: run.success(),
            mode: run.mode,
            started_at: run.started_at.to_rfc3339(),
            finished_at: run.finished_at.to_rfc3339(),
            duration_ms: run.duration().as_millis() as u64,
            totals: Totals {
                checked: run.total_checked(),
                failed: run.total_failed(),
                overridden: run.total_overridden(),
                skipped: run.total_skipped(),
                rate_limit_hits: run.rate_limit_hits,
            },
            entries,
        }
    }
}

impl<'a> Entry<'a> {
    fn from_result(result: &'a ValidationResult) -> Self {
        Self {
            name: &result.name,
            category: &result.category,
            sub_category: &result.sub_category,
            primary_url: &result.primary_url,
            secondary_url: result.secondary_url.as_deref(),
            outcome: result.outcome,
            status_code: result.status_code,
            message: result.message.as_deref(),
            attempts: result.attempts,
            latency_ms: result.latency.as_millis() as u64,
            newly_broken: result.is_newly_broken(),
            forced_status: result.forced,
            override_reason: result.override_reason.as_deref(),
            annotation: result.is_failure().then(|| annotation(result)),
        }
    }
}

/// `::error title=Broken link::<name> (<url>): <outcome>[ HTTP <code>][ - <message>]`
pub fn annotation(result: &ValidationResult) -> String {
    let mut detail = format!("{} ({}): {}", result.name, result.primary_url, result.status_label());
    if let Some(code) = result.status_code {
        detail.push_str(&format!(" HTTP {}", code));
    }
    let bare_status = result.status_code.map(|code| format!("HTTP {}", code));
    if let Some(reason) = result.override_reason.as_deref().or(result.message.as_deref()) {
        if bare_status.as_deref() != Some(reason) {
            detail.push_str(&format!(" - {}", reason));
        }
    }
    format!("::error title=Broken link::{}", escape_annotation(&detail))
}

// Workflow commands treat %, CR and LF specially in the message part
fn escape_annotation(text: &str) -> String {
    text.replace('%', "%25").replace('\r', "%0D").replace('\n', "%0A")
}

impl Reporter for MachineReporter {
    fn render(&self, run: &ValidationRun, out: &mut dyn Write) -> io::Result<()> {
        let report = MachineReport::from_run(run);
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::ProbeOutcome;
    use crate::overrides::OverrideEntry;
    use crate::table::Resource;
    use chrono::Local;
    use std::time::Duration;
    use url::Url;

    fn resource(sequence: usize, name: &str) -> Resource {
        let mut resource = Resource::ad_hoc(name, Url::parse(&format!("https://{}.dev", name)).unwrap(), None);
        resource.sequence = sequence;
        resource.category = "Tooling".to_string();
        resource
    }

    fn sample_run() -> ValidationRun {
        let now = Local::now();
        let results = vec![
            ValidationResult::probed(&resource(0, "ok"), ProbeOutcome::new(Outcome::Ok), 1, Duration::ZERO),
            ValidationResult::probed(
                &resource(1, "gone"),
                ProbeOutcome::new(Outcome::ClientError).with_status(404).with_message("HTTP 404"),
                1,
                Duration::from_millis(120),
            ),
            ValidationResult::overridden(
                &resource(2, "pinned"),
                &OverrideEntry {
                    url: "https://pinned.dev/".to_string(),
                    secondary_url: None,
                    status: ForcedStatus::Valid,
                    reason: "Blocks bots".to_string(),
                    expires: None,
                },
            ),
        ];
        ValidationRun::new(ModeKind::Ci, now, now, results, 2)
    }

    fn render(run: &ValidationRun) -> serde_json::Value {
        let mut out = Vec::new();
        MachineReporter.render(run, &mut out).unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    #[test]
    fn test_entries_hold_only_failed_and_overridden() {
        let json = render(&sample_run());

        assert_eq!(json["success"], false);
        assert_eq!(json["mode"], "ci");
        assert_eq!(json["totals"]["checked"], 3);
        assert_eq!(json["totals"]["failed"], 1);
        assert_eq!(json["totals"]["overridden"], 1);
        assert_eq!(json["totals"]["rate_limit_hits"], 2);

        let entries = json["entries"].as_array().unwrap();
        let names: Vec<_> = entries.iter().map(|e| e["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["gone", "pinned"]);
    }

    #[test]
    fn test_failed_entry_carries_annotation() {
        let json = render(&sample_run());
        let gone = &json["entries"][0];

        assert_eq!(gone["outcome"], "client-error");
        assert_eq!(gone["status_code"], 404);
        assert_eq!(gone["newly_broken"], true);
        assert_eq!(
            gone["annotation"],
            "::error title=Broken link::gone (https://gone.dev/): client-error HTTP 404"
        );

        let pinned = &json["entries"][1];
        assert_eq!(pinned["forced_status"], "valid");
        assert_eq!(pinned["override_reason"], "Blocks bots");
        assert!(pinned.get("annotation").is_none());
    }

    #[test]
    fn test_annotation_escapes_newlines() {
        let result = ValidationResult::probed(
            &resource(0, "x"),
            ProbeOutcome::new(Outcome::ServerError).with_message("bad\nresponse 100%"),
            1,
            Duration::ZERO,
        );
        assert!(annotation(&result).ends_with("bad%0Aresponse 100%25"));
    }
}
