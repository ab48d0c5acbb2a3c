// src/lib.rs
// =============================================================================
// Link validation engine for a curated resource table.
//
// Checks every resource link (and its optional secondary link) for liveness,
// honours maintainer overrides, retries transient failures under a rate
// budget, and reports the results for humans and for CI.
//
// The binary in src/main.rs is a thin CLI over this library.
// =============================================================================

pub mod checker;    // src/checker/ - one liveness probe per URL
pub mod config;     // src/config.rs - defaults + optional TOML file
pub mod engine;     // src/engine/ - modes, worker pool, run aggregation
pub mod error;      // src/error.rs - input errors that abort a run
pub mod github;     // src/github/ - github.com links -> REST API endpoints
pub mod overrides;  // src/overrides/ - maintainer-pinned verdicts
pub mod report;     // src/report/ - human and machine output
pub mod table;      // src/table/ - the CSV resource table
pub mod throttle;   // src/throttle/ - rate budgets and retry backoff
