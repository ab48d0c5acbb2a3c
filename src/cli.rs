// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Four subcommands, one per run mode:
//   full    - check every active resource in the table
//   single  - check one URL before it's added (submission gate)
//   newest  - check only the most recently added resource
//   ci      - same selection as full, JSON output for pipelines
//
// Options shared by all of them are marked `global = true`, so they can be
// given before or after the subcommand.
// =============================================================================

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use resource_link_guardian::engine::{Mode, SingleTarget, SweepFilter};

#[derive(Parser, Debug)]
#[command(
    name = "resource-link-guardian",
    version,
    about = "Validates the links of a curated resource table",
    long_about = "resource-link-guardian checks every resource link in a CSV table, honours \
                  maintainer overrides, and reports broken links for humans or CI. \
                  Exit codes: 0 = all good, 1 = broken links found, 2 = error."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Resource table (CSV)
    #[arg(long, global = true)]
    pub table: Option<PathBuf>,

    /// Override store (TOML)
    #[arg(long, global = true)]
    pub overrides: Option<PathBuf>,

    /// Config file (default: link-guardian.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Check every link live, ignoring the override store
    #[arg(long, global = true)]
    pub ignore_overrides: bool,

    /// Print the JSON report instead of the human one
    #[arg(long, global = true)]
    pub json: bool,

    /// Also write the JSON report to this file
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,

    /// Resources checked at once
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Don't write status back to the table
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check every active resource in the table
    ///
    /// Example: resource-link-guardian full --category "Agent Skills"
    Full(SweepArgs),

    /// Check a single URL that isn't in the table yet
    ///
    /// Example: resource-link-guardian single https://github.com/user/repo
    Single {
        /// Primary link to check
        url: String,

        /// Secondary link; must also pass when given
        #[arg(long)]
        secondary: Option<String>,

        /// Display name used in the report
        #[arg(long)]
        name: Option<String>,
    },

    /// Check only the most recently added resource
    Newest,

    /// Full sweep with JSON output for pipelines
    Ci(SweepArgs),
}

/// Selection options for full and CI sweeps.
#[derive(Args, Debug, Clone, Default)]
pub struct SweepArgs {
    /// Stop after this many resources
    #[arg(long)]
    pub max_links: Option<usize>,

    /// Only this category (repeatable)
    #[arg(long = "category")]
    pub categories: Vec<String>,

    /// Only this license tag (repeatable)
    #[arg(long = "license")]
    pub licenses: Vec<String>,

    /// Also check rows whose Active flag is FALSE
    #[arg(long)]
    pub include_inactive: bool,
}

impl From<SweepArgs> for SweepFilter {
    fn from(args: SweepArgs) -> Self {
        SweepFilter {
            include_inactive: args.include_inactive,
            categories: args.categories,
            licenses: args.licenses,
            max_links: args.max_links,
        }
    }
}

impl Commands {
    pub fn into_mode(self) -> Mode {
        match self {
            Commands::Full(args) => Mode::Full(args.into()),
            Commands::Ci(args) => Mode::Ci(args.into()),
            Commands::Newest => Mode::Newest,
            Commands::Single { url, secondary, name } => Mode::Single(SingleTarget {
                url,
                secondary_url: secondary,
                name,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "resource-link-guardian",
            "full",
            "--category",
            "Tooling",
            "--category",
            "Guides",
            "--dry-run",
            "--concurrency",
            "4",
        ]);

        assert!(cli.dry_run);
        assert_eq!(cli.concurrency, Some(4));
        match cli.command.into_mode() {
            Mode::Full(filter) => assert_eq!(filter.categories, vec!["Tooling", "Guides"]),
            other => panic!("unexpected mode: {other:?}"),
        }
    }

    #[test]
    fn test_single_with_secondary() {
        let cli = Cli::parse_from([
            "resource-link-guardian",
            "--json",
            "single",
            "https://example.com",
            "--secondary",
            "https://example.com/docs",
        ]);

        assert!(cli.json);
        assert_eq!(
            cli.command.into_mode(),
            Mode::Single(SingleTarget {
                url: "https://example.com".to_string(),
                secondary_url: Some("https://example.com/docs".to_string()),
                name: None,
            })
        );
    }

    #[test]
    fn test_verbose_counts_and_conflicts_with_quiet() {
        let cli = Cli::parse_from(["resource-link-guardian", "-vv", "newest"]);
        assert_eq!(cli.verbose, 2);

        assert!(Cli::try_parse_from(["resource-link-guardian", "-v", "-q", "newest"]).is_err());
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What does `global = true` do?
//    - The flag is accepted on the top-level command and on every subcommand
//    - `resource-link-guardian --json ci` and `resource-link-guardian ci --json`
//      mean the same thing
//
// 2. Why a separate SweepArgs struct?
//    - #[derive(Args)] lets two subcommands (full, ci) share one set of flags
//    - `From<SweepArgs> for SweepFilter` keeps clap types out of the library
//
// 3. What is ArgAction::Count?
//    - Each repetition of -v adds one, so -vv gives 2
// -----------------------------------------------------------------------------
