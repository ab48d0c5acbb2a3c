// src/table/mod.rs
// =============================================================================
// The resource table: the curated list of links the engine validates.
//
// The table is owned by the sorting/generation tooling. This module only
// reads it and writes back the `Last Status` / `Last Checked` cells.
// =============================================================================

mod resource;
mod store;

pub use resource::{parse_link, Resource, TIMESTAMP_FORMAT};
pub use store::ResourceTable;
