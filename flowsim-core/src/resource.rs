//! A server that performs processes, production or transport (spec §3).
//! Owns its state machines and controller exclusively; queues are
//! referenced by id, not owned (spec §3 "Ownership").

use std::collections::HashMap;

use crate::controller::{Controller, Policy};
use crate::ids::{ProcessId, QueueId, ResourceId, StateId};
use crate::location::Location;
use crate::state_machine::StateMachine;
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Production,
    Transport,
}

pub struct Resource {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub capacity: usize,
    pub location: Location,
    pub processes: Vec<ProcessId>,
    /// Parallel production-state slots offered per process; defaults to 1.
    pub process_capacities: HashMap<ProcessId, usize>,
    pub input_queues: Vec<QueueId>,
    pub output_queues: Vec<QueueId>,

    /// Arena of every state machine local to this resource (production,
    /// transport, setup, breakdown, process-breakdown alike).
    pub states: Vec<StateMachine>,
    /// One or more production/transport state instances per offered
    /// process (spec invariant: every process in `processes` has at least
    /// one corresponding state).
    pub process_states: HashMap<ProcessId, Vec<StateId>>,
    /// Setup states keyed by (origin process, target process). A missing
    /// entry means "no setup required" — a permissive zero-duration no-op,
    /// not a fatal error (spec §9 open question).
    pub setup_states: HashMap<(ProcessId, ProcessId), StateId>,
    pub breakdown_states: Vec<StateId>,
    /// One `ProcessBreakdown` instance per production-state instance
    /// (spec §9 resolved design choice).
    pub process_breakdown_states: HashMap<StateId, StateId>,

    /// The process the resource is currently tooled for. `None` until the
    /// first job runs. Transport resources also use this to track where
    /// the last job ended, for empty-leg computation.
    pub current_process: Option<ProcessId>,
    /// A gate event, normally triggered. A breakdown clears it (replacing
    /// it with a fresh untriggered gate) to preempt every running state;
    /// reactivating the resource succeeds it again.
    pub active: crate::ids::EventId,
    /// A gate re-armed every time a unit of space frees up in one of this
    /// resource's input queues. The router suspends a stalled product on
    /// an `AnyOf` of candidate resources' `got_free` gates (spec §4.6 step 4,
    /// §7 "Transient RoutingStall").
    pub got_free: crate::ids::EventId,
    pub controller: Controller,
}

impl Resource {
    pub fn process_state_slots(&self, process: ProcessId) -> &[StateId] {
        self.process_states.get(&process).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl World {
    #[allow(clippy::too_many_arguments)]
    pub fn add_resource(
        &mut self,
        kind: ResourceKind,
        capacity: usize,
        location: Location,
        processes: Vec<ProcessId>,
        input_queues: Vec<QueueId>,
        output_queues: Vec<QueueId>,
        policy: Policy,
    ) -> ResourceId {
        let id = ResourceId(self.resources.len());
        let active = self.event();
        self.succeed(active).expect("fresh active gate cannot already be triggered");
        let requested = self.event();
        let got_free = self.event();
        let resource = Resource {
            id,
            kind,
            capacity,
            location,
            processes,
            process_capacities: HashMap::new(),
            input_queues,
            output_queues,
            states: Vec::new(),
            process_states: HashMap::new(),
            setup_states: HashMap::new(),
            breakdown_states: Vec::new(),
            process_breakdown_states: HashMap::new(),
            current_process: None,
            active,
            got_free,
            controller: Controller::new(id, policy, requested),
        };
        self.resources.push(resource);
        id
    }

    fn push_state(&mut self, resource: ResourceId, state: StateMachine) -> StateId {
        let states = &mut self.resources[resource.index()].states;
        let id = StateId(states.len());
        states.push(state);
        id
    }

    pub fn add_process_state(&mut self, resource: ResourceId, process: ProcessId, time_model: crate::ids::TimeModelId, is_transport: bool) -> StateId {
        let id = self.push_state(resource, StateMachine::new_process(resource, time_model, is_transport));
        self.resources[resource.index()].process_states.entry(process).or_default().push(id);
        id
    }

    pub fn add_setup_state(&mut self, resource: ResourceId, origin: ProcessId, target: ProcessId, time_model: crate::ids::TimeModelId) -> StateId {
        let id = self.push_state(resource, StateMachine::new_setup(resource, origin, target, time_model));
        self.resources[resource.index()].setup_states.insert((origin, target), id);
        id
    }

    pub fn add_breakdown_state(&mut self, resource: ResourceId, mtbf: crate::ids::TimeModelId, repair: crate::ids::TimeModelId) -> StateId {
        let id = self.push_state(resource, StateMachine::new_breakdown(resource, mtbf, repair, None));
        self.resources[resource.index()].breakdown_states.push(id);
        id
    }

    pub fn add_process_breakdown_state(
        &mut self,
        resource: ResourceId,
        target_production_state: StateId,
        process: ProcessId,
        mtbf: crate::ids::TimeModelId,
        repair: crate::ids::TimeModelId,
    ) -> StateId {
        let id = self.push_state(resource, StateMachine::new_breakdown(resource, mtbf, repair, Some(process)));
        self.resources[resource.index()].states[id.index()].target_state = Some(target_production_state);
        self.resources[resource.index()].process_breakdown_states.insert(target_production_state, id);
        id
    }

    pub fn resource_is_active(&self, resource: ResourceId) -> bool {
        self.event_triggered(self.resources[resource.index()].active)
    }

    /// Preempt the resource: replace `active` with a fresh, untriggered
    /// gate. Anything suspended on the old gate stays suspended forever
    /// (it already consumed its callback by running); running states are
    /// interrupted explicitly by the breakdown logic, not by this alone.
    pub fn resource_deactivate(&mut self, resource: ResourceId) {
        let fresh = self.event();
        self.resources[resource.index()].active = fresh;
    }

    pub fn resource_reactivate(&mut self, resource: ResourceId) -> Result<(), crate::error::SimulationFault> {
        let gate = self.resources[resource.index()].active;
        if !self.event_triggered(gate) {
            self.succeed(gate)?;
        }
        Ok(())
    }

    /// Succeed and re-arm `got_free` for every resource whose input_queues
    /// includes `queue`, waking any product stalled waiting for space.
    pub(crate) fn refresh_got_free_for_queue(&mut self, queue: QueueId) {
        let affected: Vec<ResourceId> = self.resources.iter().filter(|r| r.input_queues.contains(&queue)).map(|r| r.id).collect();
        for resource in affected {
            let gate = self.resources[resource.index()].got_free;
            if !self.event_triggered(gate) {
                self.succeed(gate).expect("got_free gate was just checked untriggered");
            }
            self.resources[resource.index()].got_free = self.event();
        }
    }
}
