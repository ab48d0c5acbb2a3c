// src/checker/mod.rs
// =============================================================================
// This module contains the single-URL liveness check.
//
// Submodules:
// - outcome: How a check ended (Outcome) and what one attempt saw (ProbeOutcome)
// - http: The Prober trait and its reqwest-backed implementation
//
// Everything that happens *around* a probe (retries, rate limits, overrides,
// deadlines) lives in throttle/ and engine/.
// =============================================================================

mod http;
mod outcome;

pub use http::{HttpProber, ProbeSettings, Prober};
pub use outcome::{Outcome, ProbeOutcome};
