// src/report/human.rs
// =============================================================================
// Terminal report: per-category counts, then what broke and why.
//
// Layout:
//   header (mode, duration)
//   CATEGORY / OK / FAILED / OVERRIDDEN / SKIPPED table
//   failures, newly broken ones marked NEW
//   overrides with their reasons
//   summary
// =============================================================================

use std::collections::BTreeMap;
use std::io::{self, Write};

use super::Reporter;
use crate::engine::{ValidationResult, ValidationRun};
use crate::checker::Outcome;

const UNCATEGORIZED: &str = "(uncategorized)";

pub struct HumanReporter;

#[derive(Default)]
struct CategoryCounts {
    ok: usize,
    failed: usize,
    overridden: usize,
    skipped: usize,
}

impl Reporter for HumanReporter {
    fn render(&self, run: &ValidationRun, out: &mut dyn Write) -> io::Result<()> {
        writeln!(
            out,
            "🔍 Link validation ({}) finished in {:.1}s",
            run.mode,
            run.duration().as_secs_f64()
        )?;
        writeln!(out)?;

        print_categories(run, out)?;
        print_failures(run, out)?;
        print_overrides(run, out)?;
        print_summary(run, out)
    }
}

fn print_categories(run: &ValidationRun, out: &mut dyn Write) -> io::Result<()> {
    // BTreeMap keeps categories alphabetical
    let mut categories: BTreeMap<&str, CategoryCounts> = BTreeMap::new();
    for result in &run.results {
        let name = if result.category.is_empty() {
            UNCATEGORIZED
        } else {
            result.category.as_str()
        };
        let counts = categories.entry(name).or_default();

        if result.is_failure() {
            counts.failed += 1;
        }
        match result.outcome {
            Outcome::Ok => counts.ok += 1,
            Outcome::Overridden => counts.overridden += 1,
            Outcome::Skipped => counts.skipped += 1,
            _ => {}
        }
    }

    writeln!(
        out,
        "{:<32} {:>6} {:>8} {:>12} {:>9}",
        "CATEGORY", "OK", "FAILED", "OVERRIDDEN", "SKIPPED"
    )?;
    writeln!(out, "{}", "=".repeat(71))?;
    for (name, counts) in &categories {
        writeln!(
            out,
            "{:<32} {:>6} {:>8} {:>12} {:>9}",
            truncate(name, 32),
            counts.ok,
            counts.failed,
            counts.overridden,
            counts.skipped
        )?;
    }
    writeln!(out)
}

fn print_failures(run: &ValidationRun, out: &mut dyn Write) -> io::Result<()> {
    if run.success() {
        return Ok(());
    }

    writeln!(out, "❌ Failures:")?;
    for result in run.failures() {
        let marker = if result.is_newly_broken() { "[NEW] " } else { "" };
        writeln!(out, "   {}{}{}", marker, result.name, location(result))?;
        writeln!(out, "      {} -> {}", result.primary_url, describe(result))?;
    }
    writeln!(out)
}

fn print_overrides(run: &ValidationRun, out: &mut dyn Write) -> io::Result<()> {
    let forced: Vec<&ValidationResult> = run.results.iter().filter(|r| r.forced.is_some()).collect();
    if forced.is_empty() {
        return Ok(());
    }

    writeln!(out, "📝 Overrides:")?;
    for result in forced {
        let status = result.forced.map(|f| f.to_string()).unwrap_or_default();
        let reason = result.override_reason.as_deref().unwrap_or("");
        writeln!(out, "   {} [{}]: {}", result.name, status, reason)?;
    }
    writeln!(out)
}

fn print_summary(run: &ValidationRun, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "📊 Summary:")?;
    writeln!(out, "   ✅ OK: {}", run.total_ok())?;
    writeln!(out, "   ❌ Failed: {}", run.total_failed())?;
    writeln!(out, "   📝 Overridden: {}", run.total_overridden())?;
    writeln!(out, "   ⏭️  Skipped: {}", run.total_skipped())?;
    if run.rate_limit_hits > 0 {
        writeln!(out, "   🚦 Rate-limit hits: {}", run.rate_limit_hits)?;
    }
    writeln!(out, "   📋 Total: {}", run.results.len())
}

fn location(result: &ValidationResult) -> String {
    match (result.category.is_empty(), result.sub_category.is_empty()) {
        (true, _) => String::new(),
        (false, true) => format!(" ({})", result.category),
        (false, false) => format!(" ({} / {})", result.category, result.sub_category),
    }
}

fn describe(result: &ValidationResult) -> String {
    let mut text = format_outcome(result.outcome);
    if let Some(message) = &result.message {
        text.push_str(&format!(" ({})", message));
    } else if let Some(code) = result.status_code {
        text.push_str(&format!(" (HTTP {})", code));
    }
    if result.attempts > 1 {
        text.push_str(&format!(" after {} attempts", result.attempts));
    }
    text
}

fn format_outcome(outcome: Outcome) -> String {
    match outcome {
        Outcome::Ok => "✅ OK".to_string(),
        Outcome::ClientError => "❌ CLIENT ERROR".to_string(),
        Outcome::ServerError => "💥 SERVER ERROR".to_string(),
        Outcome::Timeout => "⏱️  TIMEOUT".to_string(),
        Outcome::DnsFailure => "🌐 DNS FAILURE".to_string(),
        Outcome::RedirectLoop => "🔁 REDIRECT LOOP".to_string(),
        Outcome::RateLimited => "🚦 RATE LIMITED".to_string(),
        Outcome::Overridden => "📝 OVERRIDDEN (invalid)".to_string(),
        Outcome::Skipped => "⏭️  SKIPPED".to_string(),
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let cut: String = text.chars().take(width - 3).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
