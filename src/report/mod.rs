// src/report/mod.rs
// =============================================================================
// Turns a finished ValidationRun into output.
//
// Two formats share the same input:
// - human: tables and emoji for a terminal
// - machine: one JSON document for CI, with ready-made annotations
//
// The orchestrator holds a Box<dyn Reporter>, picked once when it's built.
// =============================================================================

mod human;
mod machine;

pub use human::HumanReporter;
pub use machine::{MachineReport, MachineReporter};

use std::io::{self, Write};

use crate::engine::ValidationRun;

pub trait Reporter: Send + Sync {
    fn render(&self, run: &ValidationRun, out: &mut dyn Write) -> io::Result<()>;
}

/// Machine output when asked for JSON, human output otherwise.
pub fn for_format(machine: bool) -> Box<dyn Reporter> {
    if machine {
        Box::new(MachineReporter)
    } else {
        Box::new(HumanReporter)
    }
}
