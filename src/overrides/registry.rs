// src/overrides/registry.rs
// =============================================================================
// Maintainer overrides: verdicts that replace a live check.
//
// Some links can't be checked honestly by a bot (sites that 403 every
// non-browser client, pages behind a login, links that are known-dead but kept
// for history). Maintainers pin a verdict for those in a TOML file:
//
//   [[override]]
//   url = "https://example.com/tool"
//   status = "valid"                 # valid | invalid | skip
//   reason = "Blocks automated clients"
//   expires = "2026-12-31"           # optional; inert after this day
//
// Adding `secondary_url` narrows an override to one (primary, secondary) pair.
// =============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::error::OverrideError;
use crate::table::parse_link;

/// The verdict an override forces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForcedStatus {
    /// Treat the resource as alive
    Valid,
    /// Treat the resource as broken
    Invalid,
    /// Don't check or count the resource
    Skip,
}

impl fmt::Display for ForcedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForcedStatus::Valid => f.write_str("valid"),
            ForcedStatus::Invalid => f.write_str("invalid"),
            ForcedStatus::Skip => f.write_str("skip"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideEntry {
    pub url: String,
    pub secondary_url: Option<String>,
    pub status: ForcedStatus,
    pub reason: String,
    pub expires: Option<NaiveDate>,
}

impl OverrideEntry {
    /// An override stays in force through its expiry day.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expires.is_some_and(|expires| expires < today)
    }
}

// On-disk shape, before validation
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OverrideFile {
    #[serde(default, rename = "override")]
    overrides: Vec<RawOverride>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOverride {
    url: String,
    #[serde(default)]
    secondary_url: Option<String>,
    status: ForcedStatus,
    reason: String,
    #[serde(default)]
    expires: Option<String>,
}

type OverrideKey = (String, Option<String>);

#[derive(Debug, Default, Clone)]
pub struct OverrideRegistry {
    entries: HashMap<OverrideKey, OverrideEntry>,
}

impl OverrideRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads the store at `path`. A missing file means no overrides; a file
    /// that exists but doesn't parse is an error.
    pub fn load(path: &Path) -> Result<Self, OverrideError> {
        if !path.exists() {
            debug!(path = %path.display(), "no override store, continuing without overrides");
            return Ok(Self::empty());
        }

        let text = std::fs::read_to_string(path).map_err(|source| OverrideError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_toml_str(&text, path)?;
        info!(path = %path.display(), overrides = registry.len(), "loaded override store");
        Ok(registry)
    }

    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, OverrideError> {
        let file: OverrideFile = toml::from_str(text).map_err(|source| OverrideError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;

        let entries = file
            .overrides
            .into_iter()
            .enumerate()
            .map(|(i, raw)| validate(i + 1, raw))
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_entries(entries)
    }

    /// Builds a registry, rejecting two overrides for the same key.
    pub fn from_entries(entries: Vec<OverrideEntry>) -> Result<Self, OverrideError> {
        let mut map = HashMap::with_capacity(entries.len());

        for (i, entry) in entries.into_iter().enumerate() {
            let key = (normalize(&entry.url), entry.secondary_url.as_deref().map(normalize));
            if map.contains_key(&key) {
                return Err(OverrideError::Duplicate {
                    index: i + 1,
                    url: entry.url,
                });
            }
            map.insert(key, entry);
        }

        Ok(Self { entries: map })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds the override in force today for a resource.
    pub fn lookup(&self, url: &str, secondary: Option<&str>) -> Option<&OverrideEntry> {
        self.lookup_on(url, secondary, chrono::Local::now().date_naive())
    }

    /// Lookup order: the (primary, secondary) pair, then the primary URL
    /// alone, then the secondary URL alone. Expired entries are skipped.
    pub fn lookup_on(&self, url: &str, secondary: Option<&str>, today: NaiveDate) -> Option<&OverrideEntry> {
        let primary = normalize(url);
        let secondary = secondary.map(normalize);

        let mut keys: Vec<OverrideKey> = Vec::with_capacity(3);
        if let Some(secondary) = &secondary {
            keys.push((primary.clone(), Some(secondary.clone())));
        }
        keys.push((primary, None));
        if let Some(secondary) = secondary {
            keys.push((secondary, None));
        }

        keys.iter()
            .filter_map(|key| self.entries.get(key))
            .find(|entry| !entry.is_expired(today))
    }
}

fn normalize(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn validate(index: usize, raw: RawOverride) -> Result<OverrideEntry, OverrideError> {
    let invalid = |reason: String| OverrideError::InvalidEntry {
        index,
        url: raw.url.clone(),
        reason,
    };

    let url = parse_link(&raw.url).map_err(|e| invalid(format!("bad url: {}", e)))?;
    let secondary_url = match raw.secondary_url.as_deref() {
        Some(secondary) => Some(
            parse_link(secondary)
                .map_err(|e| invalid(format!("bad secondary_url: {}", e)))?
                .to_string(),
        ),
        None => None,
    };

    if raw.reason.trim().is_empty() {
        return Err(invalid("reason must not be empty".to_string()));
    }

    let expires = match raw.expires.as_deref() {
        Some(date) => Some(
            NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
                .map_err(|e| invalid(format!("bad expires '{}': {}", date, e)))?,
        ),
        None => None,
    };

    Ok(OverrideEntry {
        url: url.to_string(),
        secondary_url,
        status: raw.status,
        reason: raw.reason.trim().to_string(),
        expires,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn registry(toml: &str) -> Result<OverrideRegistry, OverrideError> {
        OverrideRegistry::from_toml_str(toml, Path::new("overrides.toml"))
    }

    const STORE: &str = r#"
[[override]]
url = "https://blocked.example.com/"
status = "valid"
reason = "403s every bot"

[[override]]
url = "https://old.example.com/tool"
status = "invalid"
reason = "Project archived"
expires = "2025-06-30"

[[override]]
url = "https://pair.example.com"
secondary_url = "https://pair.example.com/docs"
status = "skip"
reason = "Docs mirror only"

[[override]]
url = "https://mirror.example.com"
status = "valid"
reason = "Mirror of the real docs"
"#;

    #[test]
    fn test_lookup_by_primary_url_ignores_trailing_slash() {
        let registry = registry(STORE).unwrap();
        let entry = registry
            .lookup_on("https://blocked.example.com", None, day(2025, 1, 1))
            .unwrap();
        assert_eq!(entry.status, ForcedStatus::Valid);
        assert_eq!(entry.reason, "403s every bot");
    }

    #[test]
    fn test_expired_override_is_inert() {
        let registry = registry(STORE).unwrap();
        let url = "https://old.example.com/tool";

        assert!(registry.lookup_on(url, None, day(2025, 6, 30)).is_some());
        assert!(registry.lookup_on(url, None, day(2025, 7, 1)).is_none());
    }

    #[test]
    fn test_pair_override_needs_both_urls() {
        let registry = registry(STORE).unwrap();

        let pair = registry.lookup_on(
            "https://pair.example.com/",
            Some("https://pair.example.com/docs"),
            day(2025, 1, 1),
        );
        assert_eq!(pair.map(|e| e.status), Some(ForcedStatus::Skip));

        assert!(registry
            .lookup_on("https://pair.example.com/", None, day(2025, 1, 1))
            .is_none());
    }

    #[test]
    fn test_secondary_url_is_tried_after_primary() {
        let registry = registry(STORE).unwrap();
        let entry = registry
            .lookup_on(
                "https://unlisted.example.com/",
                Some("https://mirror.example.com/"),
                day(2025, 1, 1),
            )
            .unwrap();
        assert_eq!(entry.reason, "Mirror of the real docs");
    }

    #[test]
    fn test_unknown_status_fails_to_load() {
        let err = registry(
            r#"
[[override]]
url = "https://a.example.com"
status = "maybe"
reason = "?"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, OverrideError::Parse { .. }));
    }

    #[test]
    fn test_unknown_field_fails_to_load() {
        let err = registry(
            r#"
[[override]]
url = "https://a.example.com"
status = "valid"
reason = "ok"
licence = "MIT"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, OverrideError::Parse { .. }));
    }

    #[test]
    fn test_bad_expiry_and_empty_reason_are_rejected() {
        let bad_date = registry(
            r#"
[[override]]
url = "https://a.example.com"
status = "valid"
reason = "ok"
expires = "next year"
"#,
        )
        .unwrap_err();
        assert!(matches!(bad_date, OverrideError::InvalidEntry { index: 1, .. }));

        let no_reason = registry(
            r#"
[[override]]
url = "https://a.example.com"
status = "valid"
reason = "  "
"#,
        )
        .unwrap_err();
        assert!(matches!(no_reason, OverrideError::InvalidEntry { .. }));
    }

    #[test]
    fn test_duplicate_override_is_rejected() {
        let err = registry(
            r#"
[[override]]
url = "https://a.example.com"
status = "valid"
reason = "one"

[[override]]
url = "https://a.example.com/"
status = "invalid"
reason = "two"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, OverrideError::Duplicate { index: 2, .. }));
    }

    #[test]
    fn test_missing_store_is_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = OverrideRegistry::load(&dir.path().join("none.toml")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overrides.toml");
        std::fs::write(&path, STORE).unwrap();

        let registry = OverrideRegistry::load(&path).unwrap();
        assert_eq!(registry.len(), 4);
    }
}
