// src/overrides/mod.rs
// =============================================================================
// Override store: maintainer-pinned verdicts that bypass the network.
// =============================================================================

mod registry;

pub use registry::{ForcedStatus, OverrideEntry, OverrideRegistry};
