// src/table/resource.rs
// =============================================================================
// One curated entry of the resource table, plus the row validation that turns
// raw CSV cells into it.
// =============================================================================

use chrono::{NaiveDate, NaiveDateTime};
use url::Url;

/// Timestamp format of the `Last Checked` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d:%H-%M-%S";

// Formats seen in `Date Added` over the table's history
const DATE_TIME_FORMATS: &[&str] = &[TIMESTAMP_FORMAT, "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Position in the table (0 = first data row); doubles as append order
    pub sequence: usize,
    pub id: Option<String>,
    pub name: String,
    pub category: String,
    pub sub_category: String,
    pub primary_url: Url,
    pub secondary_url: Option<Url>,
    pub license: String,
    pub active: bool,
    pub last_checked: Option<String>,
    pub last_status: Option<String>,
    pub date_added: Option<NaiveDateTime>,
}

impl Resource {
    /// A resource that isn't in any table (single-URL mode).
    pub fn ad_hoc(name: impl Into<String>, primary_url: Url, secondary_url: Option<Url>) -> Self {
        Self {
            sequence: 0,
            id: None,
            name: name.into(),
            category: String::new(),
            sub_category: String::new(),
            primary_url,
            secondary_url,
            license: String::new(),
            active: true,
            last_checked: None,
            last_status: None,
            date_added: None,
        }
    }
}

/// Parses a resource link: must be an absolute http(s) URL with a host.
pub fn parse_link(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err("missing host".to_string());
    }

    Ok(url)
}

/// `TRUE`/`FALSE` in any case; an empty cell means active.
pub fn parse_active(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "true" => Ok(true),
        "false" => Ok(false),
        other => Err(format!("expected TRUE or FALSE, got '{}'", other)),
    }
}

pub fn parse_date_added(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_link_accepts_http_and_https() {
        assert!(parse_link("https://example.com/tool").is_ok());
        assert!(parse_link("  http://example.com  ").is_ok());
    }

    #[test]
    fn test_parse_link_rejects_relative_and_other_schemes() {
        assert!(parse_link("example.com/tool").is_err());
        assert!(parse_link("/docs/README.md").is_err());
        assert!(parse_link("mailto:someone@example.com").is_err());
        assert!(parse_link("ftp://example.com/file").is_err());
    }

    #[test]
    fn test_parse_active() {
        assert_eq!(parse_active("TRUE"), Ok(true));
        assert_eq!(parse_active("false"), Ok(false));
        assert_eq!(parse_active(""), Ok(true));
        assert!(parse_active("maybe").is_err());
    }

    #[test]
    fn test_parse_date_added_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 7, 14)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(parse_date_added("2025-07-14:09-30-00"), Some(expected));
        assert_eq!(parse_date_added("2025-07-14 09:30:00"), Some(expected));
        assert!(parse_date_added("2025-07-14").is_some());
        assert_eq!(parse_date_added("last tuesday"), None);
        assert_eq!(parse_date_added(""), None);
    }
}
