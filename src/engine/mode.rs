// src/engine/mode.rs
// =============================================================================
// The four ways a run can be invoked, and which resources each one selects.
//
// Selection is a plain function of (mode, table). Newest-entry mode asks the
// table for its newest row instead of relying on anything remembered between
// runs.
// =============================================================================

use serde::Serialize;
use std::fmt;

use crate::table::{Resource, ResourceTable};

/// Filters for the full sweep (and CI, which selects the same way).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepFilter {
    /// Check rows whose Active flag is FALSE too
    pub include_inactive: bool,
    /// Only these categories (case-insensitive); empty = all
    pub categories: Vec<String>,
    /// Only these license tags (case-insensitive); empty = all
    pub licenses: Vec<String>,
    /// Stop after this many resources, in table order
    pub max_links: Option<usize>,
}

impl SweepFilter {
    pub fn matches(&self, resource: &Resource) -> bool {
        (resource.active || self.include_inactive)
            && matches_any(&self.categories, &resource.category)
            && matches_any(&self.licenses, &resource.license)
    }

    pub fn select<'a>(&self, resources: &'a [Resource]) -> Vec<&'a Resource> {
        resources
            .iter()
            .filter(|resource| self.matches(resource))
            .take(self.max_links.unwrap_or(usize::MAX))
            .collect()
    }
}

fn matches_any(wanted: &[String], value: &str) -> bool {
    wanted.is_empty() || wanted.iter().any(|w| w.trim().eq_ignore_ascii_case(value.trim()))
}

/// An ad-hoc URL to check without a table (submission gate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleTarget {
    pub url: String,
    pub secondary_url: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Full(SweepFilter),
    Single(SingleTarget),
    Newest,
    Ci(SweepFilter),
}

impl Mode {
    pub fn kind(&self) -> ModeKind {
        match self {
            Mode::Full(_) => ModeKind::Full,
            Mode::Single(_) => ModeKind::Single,
            Mode::Newest => ModeKind::Newest,
            Mode::Ci(_) => ModeKind::Ci,
        }
    }

    /// Resources this mode checks from `table`. Single mode selects nothing
    /// from the table; its resource is built from the target.
    pub fn select<'a>(&self, table: &'a ResourceTable) -> Vec<&'a Resource> {
        match self {
            Mode::Full(filter) | Mode::Ci(filter) => filter.select(table.resources()),
            Mode::Newest => table.newest().into_iter().collect(),
            Mode::Single(_) => Vec::new(),
        }
    }
}

/// Mode label carried by a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    Full,
    Single,
    Newest,
    Ci,
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeKind::Full => f.write_str("full"),
            ModeKind::Single => f.write_str("single"),
            ModeKind::Newest => f.write_str("newest"),
            ModeKind::Ci => f.write_str("ci"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const CSV: &str = "\
Display Name,Category,Sub-Category,Primary Link,Secondary Link,License,Active,Date Added,Last Checked
Alpha,Tooling,CLI,https://alpha.dev,,MIT,TRUE,2025-03-01,
Beta,Tooling,CLI,https://beta.dev,,Apache-2.0,FALSE,2025-05-01,
Gamma,Guides,Intro,https://gamma.dev,,MIT,TRUE,2025-04-01,
Delta,Guides,Intro,https://delta.dev,,NOT_FOUND,TRUE,,
";

    fn table() -> ResourceTable {
        ResourceTable::from_reader(CSV.as_bytes(), Path::new("t.csv")).unwrap()
    }

    fn names(selected: Vec<&Resource>) -> Vec<&str> {
        selected.into_iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_full_sweep_skips_inactive_by_default() {
        let table = table();
        let mode = Mode::Full(SweepFilter::default());
        assert_eq!(names(mode.select(&table)), vec!["Alpha", "Gamma", "Delta"]);

        let all = Mode::Full(SweepFilter {
            include_inactive: true,
            ..Default::default()
        });
        assert_eq!(all.select(&table).len(), 4);
    }

    #[test]
    fn test_category_license_and_cap_filters() {
        let table = table();

        let guides = SweepFilter {
            categories: vec!["guides".to_string()],
            ..Default::default()
        };
        assert_eq!(names(guides.select(table.resources())), vec!["Gamma", "Delta"]);

        let mit = SweepFilter {
            licenses: vec!["MIT".to_string()],
            max_links: Some(1),
            ..Default::default()
        };
        assert_eq!(names(mit.select(table.resources())), vec!["Alpha"]);
    }

    #[test]
    fn test_newest_prefers_latest_date_added() {
        let table = table();
        // Beta is inactive but still the newest row by date
        assert_eq!(names(Mode::Newest.select(&table)), vec!["Beta"]);
    }

    #[test]
    fn test_mode_kind_labels() {
        assert_eq!(Mode::Ci(SweepFilter::default()).kind().to_string(), "ci");
        assert_eq!(serde_json::to_string(&ModeKind::Newest).unwrap(), "\"newest\"");
    }
}
