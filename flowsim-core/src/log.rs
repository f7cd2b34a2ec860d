//! The in-memory event log shape (spec §3 "EventLog entry", §6 "Output
//! event stream"). This is the explicit instrumentation callback that
//! replaces the monkey-patch logger called out in the design notes: every
//! state machine calls `World::log` at each of its four lifecycle
//! transitions, plus product creation/termination.

use crate::ids::{ProductId, ResourceId, StateId};
use crate::location::Location;
use crate::time_model::Time;

/// Which of a state machine's four lifecycle transitions this entry
/// records, plus the two product-lifecycle markers sources/sinks emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    StartState,
    StartInterrupt,
    EndInterrupt,
    EndState,
    CreatedMaterial,
    FinishedMaterial,
}

/// Which kind of state machine produced an entry (spec §3 `State`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKindTag {
    Production,
    Transport,
    Setup,
    Breakdown,
    ProcessBreakdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub time: Time,
    pub resource: Option<ResourceId>,
    pub state: Option<StateId>,
    pub state_type: Option<StateKindTag>,
    pub activity: Activity,
    pub product: Option<ProductId>,
    pub expected_end_time: Option<Time>,
    pub target_location: Option<Location>,
}

impl LogEntry {
    pub fn new(time: Time, activity: Activity) -> Self {
        LogEntry {
            time,
            resource: None,
            state: None,
            state_type: None,
            activity,
            product: None,
            expected_end_time: None,
            target_location: None,
        }
    }

    pub fn with_resource(mut self, resource: ResourceId) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn with_state(mut self, state: StateId, kind: StateKindTag) -> Self {
        self.state = Some(state);
        self.state_type = Some(kind);
        self
    }

    pub fn with_product(mut self, product: ProductId) -> Self {
        self.product = Some(product);
        self
    }

    pub fn with_expected_end(mut self, t: Time) -> Self {
        self.expected_end_time = Some(t);
        self
    }

    pub fn with_target(mut self, loc: Location) -> Self {
        self.target_location = Some(loc);
        self
    }
}

pub type EventLog = Vec<LogEntry>;
