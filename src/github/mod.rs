// src/github/mod.rs
// =============================================================================
// GitHub-specific knowledge used by the prober.
//
// Repository and file links on github.com are checked through the REST API
// (see endpoint.rs), which is also the one host class with a strict,
// documented rate limit.
// =============================================================================

mod endpoint;

pub use endpoint::{api_endpoint, is_code_host, parse_repo_link, RepoLink, API_BASE};
