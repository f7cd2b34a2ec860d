//! The five state-machine variants sharing one skeleton (spec §4.3):
//! production, transport, setup, breakdown, process-breakdown. Each is an
//! explicit resumable struct rather than a native coroutine — the
//! "tagged-variant polymorphism" translation the design notes call for.
//!
//! Interrupt delivery uses an epoch counter instead of a generic signal: a
//! state's `epoch` is bumped whenever it is interrupted, so a stale
//! `Continuation::StateMachine` callback (one scheduled before the
//! interrupt, e.g. a timeout that fires anyway because it was already
//! queued) is recognized and ignored by [`World::resume_state_machine`].

use crate::error::SimulationFault;
use crate::event::Continuation;
use crate::ids::{ProcessId, ProductId, ResourceId, StateId, TimeModelId};
use crate::location::Location;
use crate::log::{Activity, LogEntry, StateKindTag};
use crate::time_model::Time;
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Production,
    Transport,
    Setup { origin: ProcessId, target: ProcessId },
    Breakdown,
    ProcessBreakdown,
}

impl StateKind {
    fn tag(self) -> StateKindTag {
        match self {
            StateKind::Production => StateKindTag::Production,
            StateKind::Transport => StateKindTag::Transport,
            StateKind::Setup { .. } => StateKindTag::Setup,
            StateKind::Breakdown => StateKindTag::Breakdown,
            StateKind::ProcessBreakdown => StateKindTag::ProcessBreakdown,
        }
    }

    fn is_running_candidate(self) -> bool {
        matches!(self, StateKind::Production | StateKind::Transport)
    }
}

/// Phase of a production/transport/setup state's activation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    WaitActive,
    Running { wait_started: Time },
    InterruptWait,
}

/// Phase of a breakdown/process-breakdown loop — distinct from `Phase`
/// because it never binds a product and never gets interrupted itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakdownPhase {
    WaitFailure,
    WaitRepair,
}

pub struct StateMachine {
    pub kind: StateKind,
    pub resource: ResourceId,
    pub time_model: TimeModelId,
    pub repair_time_model: Option<TimeModelId>,
    /// For `ProcessBreakdown`, the single production state it is scoped to
    /// (spec §9: one instance per production-state instance).
    pub target_state: Option<StateId>,
    epoch: u64,
    done_in: Time,
    bound_product: Option<ProductId>,
    target_location: Option<Location>,
    done_event: Option<crate::ids::EventId>,
    phase: Phase,
    breakdown_phase: BreakdownPhase,
}

impl StateMachine {
    pub fn new_process(resource: ResourceId, time_model: TimeModelId, is_transport: bool) -> Self {
        StateMachine {
            kind: if is_transport { StateKind::Transport } else { StateKind::Production },
            resource,
            time_model,
            repair_time_model: None,
            target_state: None,
            epoch: 0,
            done_in: 0,
            bound_product: None,
            target_location: None,
            done_event: None,
            phase: Phase::Idle,
            breakdown_phase: BreakdownPhase::WaitFailure,
        }
    }

    pub fn new_setup(resource: ResourceId, origin: ProcessId, target: ProcessId, time_model: TimeModelId) -> Self {
        StateMachine {
            kind: StateKind::Setup { origin, target },
            resource,
            time_model,
            repair_time_model: None,
            target_state: None,
            epoch: 0,
            done_in: 0,
            bound_product: None,
            target_location: None,
            done_event: None,
            phase: Phase::Idle,
            breakdown_phase: BreakdownPhase::WaitFailure,
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub(crate) fn current_done_event(&self) -> Option<crate::ids::EventId> {
        self.done_event
    }

    pub fn new_breakdown(resource: ResourceId, mtbf: TimeModelId, repair: TimeModelId, process: Option<ProcessId>) -> Self {
        StateMachine {
            kind: if process.is_some() { StateKind::ProcessBreakdown } else { StateKind::Breakdown },
            resource,
            time_model: mtbf,
            repair_time_model: Some(repair),
            target_state: None,
            epoch: 0,
            done_in: 0,
            bound_product: None,
            target_location: None,
            done_event: None,
            phase: Phase::Idle,
            breakdown_phase: BreakdownPhase::WaitFailure,
        }
    }
}

impl World {
    /// Bind a production or transport state to `product` and start its
    /// activation cycle. Returns the event the controller should await for
    /// completion.
    pub fn activate_process_state(
        &mut self,
        resource: ResourceId,
        state: StateId,
        product: ProductId,
        target_location: Option<Location>,
    ) -> Result<crate::ids::EventId, SimulationFault> {
        let origin = self.resources[resource.index()].location;
        let time_model = self.resources[resource.index()].states[state.index()].time_model;
        let done_in = self.time_model_next(time_model, Some(origin), target_location);
        let done_event = self.event();
        {
            let st = &mut self.resources[resource.index()].states[state.index()];
            st.bound_product = Some(product);
            st.target_location = target_location;
            st.done_in = done_in;
            st.done_event = Some(done_event);
            st.phase = Phase::WaitActive;
        }
        self.drive_process_state(resource, state)?;
        Ok(done_event)
    }

    /// Start a setup state's (unbound) activation cycle.
    pub fn activate_setup_state(&mut self, resource: ResourceId, state: StateId) -> Result<crate::ids::EventId, SimulationFault> {
        let time_model = self.resources[resource.index()].states[state.index()].time_model;
        let done_in = self.time_model_next(time_model, None, None);
        let done_event = self.event();
        {
            let st = &mut self.resources[resource.index()].states[state.index()];
            st.bound_product = None;
            st.target_location = None;
            st.done_in = done_in;
            st.done_event = Some(done_event);
            st.phase = Phase::WaitActive;
        }
        self.drive_process_state(resource, state)?;
        Ok(done_event)
    }

    /// Entry point from [`World::dispatch`] for every `StateMachine`
    /// continuation. A mismatched epoch means the state moved on (was
    /// interrupted, or already finished) since this callback was queued.
    pub(crate) fn resume_state_machine(&mut self, resource: ResourceId, state: StateId, epoch: u64) -> Result<(), SimulationFault> {
        if self.resources[resource.index()].states[state.index()].epoch != epoch {
            return Ok(());
        }
        match self.resources[resource.index()].states[state.index()].kind {
            StateKind::Production | StateKind::Transport | StateKind::Setup { .. } => self.drive_process_state(resource, state),
            StateKind::Breakdown | StateKind::ProcessBreakdown => self.drive_breakdown_state(resource, state),
        }
    }

    fn drive_process_state(&mut self, resource: ResourceId, state: StateId) -> Result<(), SimulationFault> {
        let phase = self.resources[resource.index()].states[state.index()].phase;
        match phase {
            Phase::WaitActive => {
                if self.resource_is_active(resource) {
                    self.start_running(resource, state)
                } else {
                    let active = self.resources[resource.index()].active;
                    let epoch = self.resources[resource.index()].states[state.index()].epoch;
                    self.await_event(active, Continuation::StateMachine { resource, state, epoch })
                }
            }
            Phase::Running { .. } => self.finish_running(resource, state),
            Phase::InterruptWait => {
                if self.resource_is_active(resource) {
                    self.resume_after_interrupt(resource, state)
                } else {
                    let active = self.resources[resource.index()].active;
                    let epoch = self.resources[resource.index()].states[state.index()].epoch;
                    self.await_event(active, Continuation::StateMachine { resource, state, epoch })
                }
            }
            Phase::Idle => Err(SimulationFault::ImpossiblePhase("process state resumed while idle")),
        }
    }

    fn start_running(&mut self, resource: ResourceId, state: StateId) -> Result<(), SimulationFault> {
        let now = self.now();
        let (kind, done_in, product, target) = {
            let st = &mut self.resources[resource.index()].states[state.index()];
            st.phase = Phase::Running { wait_started: now };
            (st.kind, st.done_in, st.bound_product, st.target_location)
        };
        let mut entry = LogEntry::new(now, Activity::StartState)
            .with_resource(resource)
            .with_state(state, kind.tag())
            .with_expected_end(now + done_in);
        if let Some(p) = product {
            entry = entry.with_product(p);
        }
        if let Some(t) = target {
            entry = entry.with_target(t);
        }
        self.log(entry);
        let epoch = self.resources[resource.index()].states[state.index()].epoch;
        let ev = self.timeout(done_in as i64)?;
        self.await_event(ev, Continuation::StateMachine { resource, state, epoch })
    }

    fn finish_running(&mut self, resource: ResourceId, state: StateId) -> Result<(), SimulationFault> {
        let now = self.now();
        let (kind, product, target, done_event) = {
            let st = &mut self.resources[resource.index()].states[state.index()];
            st.done_in = 0;
            st.phase = Phase::Idle;
            (st.kind, st.bound_product, st.target_location, st.done_event.take())
        };
        match kind {
            StateKind::Transport => {
                if let Some(t) = target {
                    self.resources[resource.index()].location = t;
                }
            }
            StateKind::Setup { target, .. } => {
                self.resources[resource.index()].current_process = Some(target);
            }
            _ => {}
        }
        let mut entry = LogEntry::new(now, Activity::EndState).with_resource(resource).with_state(state, kind.tag());
        if let Some(p) = product {
            entry = entry.with_product(p);
        }
        if let Some(t) = target {
            entry = entry.with_target(t);
        }
        self.log(entry);
        if let Some(ev) = done_event {
            self.succeed(ev)?;
        }
        Ok(())
    }

    fn resume_after_interrupt(&mut self, resource: ResourceId, state: StateId) -> Result<(), SimulationFault> {
        let now = self.now();
        let (kind, product, target) = {
            let st = &mut self.resources[resource.index()].states[state.index()];
            st.phase = Phase::Running { wait_started: now };
            (st.kind, st.bound_product, st.target_location)
        };
        let mut entry = LogEntry::new(now, Activity::EndInterrupt).with_resource(resource).with_state(state, kind.tag());
        if let Some(p) = product {
            entry = entry.with_product(p);
        }
        if let Some(t) = target {
            entry = entry.with_target(t);
        }
        self.log(entry);
        let done_in = self.resources[resource.index()].states[state.index()].done_in;
        let epoch = self.resources[resource.index()].states[state.index()].epoch;
        let ev = self.timeout(done_in as i64)?;
        self.await_event(ev, Continuation::StateMachine { resource, state, epoch })
    }

    /// Interrupt one running production/transport state: record elapsed
    /// time against `done_in`, bump its epoch (invalidating the pending
    /// timeout), and suspend it on the resource's `active` gate.
    fn interrupt_state(&mut self, resource: ResourceId, state: StateId) -> Result<(), SimulationFault> {
        let wait_started = match self.resources[resource.index()].states[state.index()].phase {
            Phase::Running { wait_started } => wait_started,
            _ => return Ok(()),
        };
        let now = self.now();
        let (kind, product, target) = {
            let st = &mut self.resources[resource.index()].states[state.index()];
            let elapsed = now.saturating_sub(wait_started);
            st.done_in = st.done_in.saturating_sub(elapsed);
            st.epoch += 1;
            st.phase = Phase::InterruptWait;
            (st.kind, st.bound_product, st.target_location)
        };
        let mut entry = LogEntry::new(now, Activity::StartInterrupt).with_resource(resource).with_state(state, kind.tag());
        if let Some(p) = product {
            entry = entry.with_product(p);
        }
        if let Some(t) = target {
            entry = entry.with_target(t);
        }
        self.log(entry);
        let active = self.resources[resource.index()].active;
        let epoch = self.resources[resource.index()].states[state.index()].epoch;
        self.await_event(active, Continuation::StateMachine { resource, state, epoch })
    }

    /// Interrupt every currently-running production/transport state on
    /// `resource`, or only `scope` if given (the `ProcessBreakdown` case).
    fn interrupt_resource_running_states(&mut self, resource: ResourceId, scope: Option<StateId>) -> Result<(), SimulationFault> {
        let candidates: Vec<StateId> = match scope {
            Some(s) => vec![s],
            None => self.resources[resource.index()]
                .states
                .iter()
                .enumerate()
                .filter(|(_, st)| st.kind.is_running_candidate())
                .map(|(i, _)| StateId(i))
                .collect(),
        };
        for s in candidates {
            self.interrupt_state(resource, s)?;
        }
        Ok(())
    }

    fn drive_breakdown_state(&mut self, resource: ResourceId, state: StateId) -> Result<(), SimulationFault> {
        let phase = self.resources[resource.index()].states[state.index()].breakdown_phase;
        match phase {
            BreakdownPhase::WaitFailure => {
                self.resource_deactivate(resource);
                let scope = self.resources[resource.index()].states[state.index()].target_state;
                self.interrupt_resource_running_states(resource, scope)?;
                let repair_model = self.resources[resource.index()].states[state.index()]
                    .repair_time_model
                    .expect("breakdown state missing repair time model");
                let repair = self.time_model_next(repair_model, None, None);
                self.resources[resource.index()].states[state.index()].breakdown_phase = BreakdownPhase::WaitRepair;
                let epoch = self.resources[resource.index()].states[state.index()].epoch;
                let ev = self.timeout(repair as i64)?;
                self.await_event(ev, Continuation::StateMachine { resource, state, epoch })
            }
            BreakdownPhase::WaitRepair => {
                self.resource_reactivate(resource)?;
                self.schedule_next_failure(resource, state)
            }
        }
    }

    fn schedule_next_failure(&mut self, resource: ResourceId, state: StateId) -> Result<(), SimulationFault> {
        let mtbf_model = self.resources[resource.index()].states[state.index()].time_model;
        let wait = self.time_model_next(mtbf_model, None, None);
        self.resources[resource.index()].states[state.index()].breakdown_phase = BreakdownPhase::WaitFailure;
        let epoch = self.resources[resource.index()].states[state.index()].epoch;
        let ev = self.timeout(wait as i64)?;
        self.await_event(ev, Continuation::StateMachine { resource, state, epoch })
    }

    /// Kick off a breakdown/process-breakdown loop. Called once per such
    /// state during world assembly, before `run`.
    pub fn spawn_breakdown_loop(&mut self, resource: ResourceId, state: StateId) -> Result<(), SimulationFault> {
        self.schedule_next_failure(resource, state)
    }
}

#[cfg(test)]
mod tests {
    use crate::location::Location;
    use crate::log::Activity;
    use crate::resource::ResourceKind;
    use crate::time_model::TimeModel;
    use crate::world::World;

    fn setup_world() -> (World, crate::ids::ResourceId, crate::ids::StateId) {
        let mut w = World::new(1, 1_000);
        let tm = w.add_time_model(TimeModel::constant(5.0));
        let process = w.add_process(crate::process::ProcessDef::Production { time_model: tm });
        let resource = w.add_resource(
            ResourceKind::Production,
            1,
            Location::new(0.0, 0.0),
            vec![process],
            vec![],
            vec![],
            crate::controller::Policy::Fifo,
        );
        let state = w.add_process_state(resource, process, tm, false);
        (w, resource, state)
    }

    #[test]
    fn production_state_runs_start_to_end_in_one_activation() {
        let (mut w, resource, state) = setup_world();
        let product = w.next_product_id();
        let done = w.activate_process_state(resource, state, product, None).unwrap();
        assert!(!w.event_triggered(done));
        w.run(100).unwrap();
        assert!(w.event_triggered(done));
        let log = w.event_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].activity, Activity::StartState);
        assert_eq!(log[1].activity, Activity::EndState);
        assert_eq!(log[1].time, 5);
    }

    #[test]
    fn breakdown_interrupts_and_resumes_with_conserved_duration() {
        let mut w = World::new(1, 1_000);
        let work = w.add_time_model(TimeModel::constant(5.0));
        let mtbf = w.add_time_model(TimeModel::constant(2.0));
        let repair = w.add_time_model(TimeModel::constant(3.0));
        let process = w.add_process(crate::process::ProcessDef::Production { time_model: work });
        let resource = w.add_resource(
            ResourceKind::Production,
            1,
            Location::new(0.0, 0.0),
            vec![process],
            vec![],
            vec![],
            crate::controller::Policy::Fifo,
        );
        let state = w.add_process_state(resource, process, work, false);
        let breakdown = w.add_breakdown_state(resource, mtbf, repair);
        w.spawn_breakdown_loop(resource, breakdown).unwrap();
        let product = w.next_product_id();
        let done = w.activate_process_state(resource, state, product, None).unwrap();
        w.run(100).unwrap();
        assert!(w.event_triggered(done));
        // started at 0, interrupted at 2 (3 remaining), repaired for 3 -> resumes at 5, ends at 8.
        let log = w.event_log();
        let end = log.iter().find(|e| e.activity == Activity::EndState).unwrap();
        assert_eq!(end.time, 8);
    }
}
