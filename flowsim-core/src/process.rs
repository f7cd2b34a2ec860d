//! `Process`: a named unit of work a product needs done by a resource
//! (spec §3). Two processes are interchangeable for routing purposes iff
//! their capability tag matches (`Capability` variant) or their id matches
//! (`Production`/`Transport` variant) — see [`crate::router`].

use crate::ids::{ProcessId, TimeModelId};
use crate::location::Location;
use crate::world::World;

#[derive(Debug, Clone)]
pub enum ProcessDef {
    Production { time_model: TimeModelId },
    Transport { time_model: TimeModelId },
    Capability { time_model: TimeModelId, capability: String },
}

impl ProcessDef {
    pub fn time_model(&self) -> TimeModelId {
        match self {
            ProcessDef::Production { time_model }
            | ProcessDef::Transport { time_model }
            | ProcessDef::Capability { time_model, .. } => *time_model,
        }
    }

    pub fn capability(&self) -> Option<&str> {
        match self {
            ProcessDef::Capability { capability, .. } => Some(capability.as_str()),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ProcessDef::Transport { .. })
    }
}

impl World {
    /// The SPT policies' sort key: a deterministic expected duration for
    /// `process`, optionally between two locations (transport).
    pub fn process_expected_time(&self, process: ProcessId, origin: Option<Location>, target: Option<Location>) -> f64 {
        let time_model = self.processes[process.index()].time_model();
        self.time_models[time_model.index()].expected_value(origin, target)
    }
}
