// src/error.rs
// =============================================================================
// Error types for everything that can abort a run before any link is checked.
//
// Network failures are NOT errors here: a failed probe is an Outcome value
// (see checker::Outcome) and always ends up in the report. Only bad input
// (table, override store, config, CLI arguments) stops a run early, and main
// maps those to exit code 2.
// =============================================================================

use std::path::PathBuf;

/// Problems reading, validating or writing the resource table.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("could not read resource table {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("could not write resource table {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode resource table row: {0}")]
    Encode(#[from] csv::Error),

    #[error("resource table is missing required column '{0}'")]
    MissingColumn(String),

    /// `line` is the 1-based line in the CSV file (the header is line 1).
    #[error("line {line}: invalid '{field}': {reason}")]
    InvalidRow {
        line: usize,
        field: String,
        reason: String,
    },

    #[error("resource table contains no resources")]
    Empty,
}

/// Problems loading the override store. A corrupt store is never ignored.
#[derive(Debug, thiserror::Error)]
pub enum OverrideError {
    #[error("could not read override store {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed override store {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// `index` is the 1-based position of the `[[override]]` block.
    #[error("override #{index} ({url}): {reason}")]
    InvalidEntry {
        index: usize,
        url: String,
        reason: String,
    },

    #[error("override #{index} duplicates an earlier override for {url}")]
    Duplicate { index: usize, url: String },
}

/// Problems loading the optional config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid setting '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Run-fatal errors raised by the orchestrator before dispatch.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Overrides(#[from] OverrideError),

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("no resources matched the selection")]
    NothingSelected,
}
