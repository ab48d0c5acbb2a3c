// src/engine/mod.rs
// =============================================================================
// The validation engine: picks resources for a mode, checks them through a
// bounded worker pool, and gathers the results into a ValidationRun.
// =============================================================================

mod mode;
mod orchestrator;
mod result;
mod worker;

pub use mode::{Mode, ModeKind, SingleTarget, SweepFilter};
pub use orchestrator::{Orchestrator, PoolSettings};
pub use result::{ValidationResult, ValidationRun};
pub use worker::SecondaryPolicy;
