// src/config.rs
// =============================================================================
// Run settings: built-in defaults, overlaid by an optional TOML file, then by
// the environment and CLI flags (in main).
//
// Example link-guardian.toml (every key optional):
//
//   table = "THE_RESOURCES_TABLE.csv"
//   overrides = "templates/resource-overrides.toml"
//   concurrency = 10
//   timeout_secs = 10
//   max_retries = 3
//   deadline_secs = 1800
//
// Rust concepts:
// - Option<T> everywhere in FileConfig: "not set" is different from "set to 0"
// - #[serde(deny_unknown_fields)]: a typo in the file is an error, not a no-op
// =============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checker::ProbeSettings;
use crate::engine::PoolSettings;
use crate::error::ConfigError;
use crate::throttle::{BackoffPolicy, RateBudget};

pub const DEFAULT_CONFIG_PATH: &str = "link-guardian.toml";
pub const DEFAULT_TABLE_PATH: &str = "THE_RESOURCES_TABLE.csv";
pub const DEFAULT_OVERRIDES_PATH: &str = "templates/resource-overrides.toml";
pub const DEFAULT_CI_OUTPUT: &str = "validation_results.json";

/// Environment variable holding the code-hosting API token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// The config file as written. Every key is optional.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub table: Option<PathBuf>,
    pub overrides: Option<PathBuf>,
    pub ci_output: Option<PathBuf>,

    // Worker pool and deadlines
    pub concurrency: Option<usize>,
    pub deadline_secs: Option<u64>,
    pub newest_deadline_secs: Option<u64>,
    pub grace_secs: Option<u64>,

    // Prober
    pub timeout_secs: Option<u64>,
    pub max_redirects: Option<usize>,
    pub user_agent: Option<String>,
    pub code_host_token: Option<String>,

    // Retries
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_secs: Option<u64>,
    pub max_total_delay_secs: Option<u64>,

    // Rate limiting
    pub acquire_wait_secs: Option<u64>,
    pub general_burst: Option<u32>,
    pub general_per_sec: Option<f64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub table: PathBuf,
    pub overrides: PathBuf,
    pub ci_output: PathBuf,
    pub probe: ProbeSettings,
    pub backoff: BackoffPolicy,
    pub pool: PoolSettings,
    pub general_budget: RateBudget,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            table: PathBuf::from(DEFAULT_TABLE_PATH),
            overrides: PathBuf::from(DEFAULT_OVERRIDES_PATH),
            ci_output: PathBuf::from(DEFAULT_CI_OUTPUT),
            probe: ProbeSettings::default(),
            backoff: BackoffPolicy::default(),
            pool: PoolSettings::default(),
            general_budget: RateBudget::general(),
        }
    }
}

impl Settings {
    /// Loads settings from `path`. An explicitly requested file must exist;
    /// the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => FileConfig::load(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => FileConfig::load(Path::new(DEFAULT_CONFIG_PATH))?,
            None => FileConfig::default(),
        };
        Self::from_file(file)
    }

    /// Defaults overlaid with whatever the file sets.
    pub fn from_file(file: FileConfig) -> Result<Self, ConfigError> {
        let mut settings = Self::default();

        if let Some(table) = file.table {
            settings.table = table;
        }
        if let Some(overrides) = file.overrides {
            settings.overrides = overrides;
        }
        if let Some(ci_output) = file.ci_output {
            settings.ci_output = ci_output;
        }

        let pool = &mut settings.pool;
        if let Some(concurrency) = file.concurrency {
            pool.concurrency = concurrency;
        }
        if let Some(secs) = file.deadline_secs {
            pool.deadline = Duration::from_secs(secs);
        }
        if let Some(secs) = file.newest_deadline_secs {
            pool.short_deadline = Duration::from_secs(secs);
        }
        if let Some(secs) = file.grace_secs {
            pool.grace = Duration::from_secs(secs);
        }
        if let Some(secs) = file.acquire_wait_secs {
            pool.acquire_wait = Duration::from_secs(secs);
        }

        let probe = &mut settings.probe;
        if let Some(secs) = file.timeout_secs {
            probe.timeout = Duration::from_secs(secs);
        }
        if let Some(max_redirects) = file.max_redirects {
            probe.max_redirects = max_redirects;
        }
        if let Some(user_agent) = file.user_agent {
            probe.user_agent = user_agent;
        }
        probe.code_host_token = file.code_host_token.filter(|t| !t.trim().is_empty());

        let backoff = &mut settings.backoff;
        if let Some(max_retries) = file.max_retries {
            backoff.max_retries = max_retries;
        }
        if let Some(ms) = file.base_delay_ms {
            backoff.base_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = file.max_delay_secs {
            backoff.max_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = file.max_total_delay_secs {
            backoff.max_total_delay = Duration::from_secs(secs);
        }

        if let Some(burst) = file.general_burst {
            settings.general_budget.capacity = burst;
        }
        if let Some(per_sec) = file.general_per_sec {
            settings.general_budget.refill_per_sec = per_sec;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// A token from the environment replaces one from the file.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.probe.code_host_token = Some(token);
        }
        self
    }

    pub fn has_token(&self) -> bool {
        self.probe.code_host_token.is_some()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &'static str, reason: &str| ConfigError::Invalid {
            key,
            reason: reason.to_string(),
        };

        if self.pool.concurrency == 0 {
            return Err(invalid("concurrency", "must be at least 1"));
        }
        if self.probe.timeout.is_zero() {
            return Err(invalid("timeout_secs", "must be greater than 0"));
        }
        if self.pool.deadline.is_zero() {
            return Err(invalid("deadline_secs", "must be greater than 0"));
        }
        if self.pool.short_deadline.is_zero() {
            return Err(invalid("newest_deadline_secs", "must be greater than 0"));
        }
        if self.general_budget.capacity == 0 {
            return Err(invalid("general_burst", "must be at least 1"));
        }
        if !self.general_budget.refill_per_sec.is_finite() || self.general_budget.refill_per_sec <= 0.0 {
            return Err(invalid("general_per_sec", "must be a positive number"));
        }
        if self.backoff.max_delay < self.backoff.base_delay {
            return Err(invalid("max_delay_secs", "must not be shorter than base_delay_ms"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.pool.concurrency, 10);
        assert_eq!(settings.pool.deadline, Duration::from_secs(1800));
        assert_eq!(settings.pool.short_deadline, Duration::from_secs(60));
        assert_eq!(settings.pool.grace, Duration::from_secs(5));
        assert_eq!(settings.backoff.max_retries, 3);
        assert_eq!(settings.overrides, PathBuf::from("templates/resource-overrides.toml"));
        assert!(!settings.has_token());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_file_overlays_defaults() {
        let file: FileConfig = toml::from_str(
            r#"
table = "data/resources.csv"
concurrency = 4
timeout_secs = 3
max_retries = 1
"#,
        )
        .unwrap();
        let settings = Settings::from_file(file).unwrap();

        assert_eq!(settings.table, PathBuf::from("data/resources.csv"));
        assert_eq!(settings.pool.concurrency, 4);
        assert_eq!(settings.probe.timeout, Duration::from_secs(3));
        assert_eq!(settings.backoff.max_retries, 1);
        // untouched keys keep their defaults
        assert_eq!(settings.probe.max_redirects, 5);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let parsed: Result<FileConfig, _> = toml::from_str("concurency = 4\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_zero_concurrency_is_invalid() {
        let file = FileConfig {
            concurrency: Some(0),
            ..Default::default()
        };
        let err = Settings::from_file(file).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "concurrency", .. }));
    }

    #[test]
    fn test_environment_token_wins_over_file() {
        let file = FileConfig {
            code_host_token: Some("from-file".to_string()),
            ..Default::default()
        };
        let settings = Settings::from_file(file).unwrap();
        assert_eq!(settings.probe.code_host_token.as_deref(), Some("from-file"));

        let settings = settings.with_token(Some("from-env".to_string()));
        assert_eq!(settings.probe.code_host_token.as_deref(), Some("from-env"));

        let settings = settings.with_token(Some("   ".to_string()));
        assert_eq!(settings.probe.code_host_token.as_deref(), Some("from-env"));
    }

    #[tokio::test]
    async fn test_tiny_general_rate_runs_out_without_panicking() {
        use crate::throttle::{HostClass, RateLimiter};

        let file = FileConfig {
            general_burst: Some(1),
            general_per_sec: Some(1e-20),
            ..Default::default()
        };
        let settings = Settings::from_file(file).unwrap();
        let limiter = RateLimiter::for_token(false, settings.general_budget);
        let wait = Duration::from_millis(10);

        assert!(limiter.acquire(HostClass::General, wait).await.is_ok());
        assert!(limiter.acquire(HostClass::General, wait).await.is_err());
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("link-guardian.toml");
        std::fs::write(&path, "grace_secs = 2\ngeneral_per_sec = 2.5\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.pool.grace, Duration::from_secs(2));
        assert_eq!(settings.general_budget.refill_per_sec, 2.5);
    }
}
