//! The scheduler: a single monotonically non-decreasing virtual clock, a
//! min-priority queue of pending timeouts, and an arena of every long-lived
//! entity in the simulation (spec §4.1, §9 "arena + index").

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::SimulationFault;
use crate::event::{Continuation, EventKind, EventSlot};
use crate::ids::{EventId, ProcessId, ProductId, QueueId, ResourceId, SinkId, SourceId, StateId, TimeModelId};
use crate::log::{EventLog, LogEntry};
use crate::process::ProcessDef;
use crate::product::Product;
use crate::queue::{Capacity, Queue};
use crate::resource::Resource;
use crate::rng::SimRng;
use crate::source_sink::{Sink, Source};
use crate::time_model::{Time, TimeModel};

/// The single root driving every suspendable actor via event fire/resume.
pub struct World {
    pub(crate) now: Time,
    stop: Time,
    seq: u64,
    queue: BinaryHeap<Reverse<(Time, u64, EventId)>>,
    events: Vec<EventSlot>,
    pub rng: SimRng,
    pub(crate) log: EventLog,

    pub time_models: Vec<TimeModel>,
    pub processes: Vec<ProcessDef>,
    pub queues: Vec<Queue>,
    pub resources: Vec<Resource>,
    pub sources: Vec<Source>,
    pub sinks: Vec<Sink>,
    pub products: Vec<Option<Product>>,
}

impl World {
    pub fn new(seed: u64, stop: Time) -> Self {
        World {
            now: 0,
            stop,
            seq: 0,
            queue: BinaryHeap::new(),
            events: Vec::new(),
            rng: SimRng::new(seed),
            log: Vec::new(),
            time_models: Vec::new(),
            processes: Vec::new(),
            queues: Vec::new(),
            resources: Vec::new(),
            sources: Vec::new(),
            sinks: Vec::new(),
            products: Vec::new(),
        }
    }

    pub fn now(&self) -> Time {
        self.now
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn alloc_event(&mut self, kind: EventKind) -> EventId {
        let id = EventId(self.events.len());
        self.events.push(EventSlot::new(kind));
        id
    }

    pub fn event_triggered(&self, id: EventId) -> bool {
        self.events[id.index()].triggered
    }

    /// Schedule a new gate event firing at `now + delay`. `delay < 0` is a
    /// configuration/logic bug, not a recoverable condition (spec §4.1).
    pub fn timeout(&mut self, delay: i64) -> Result<EventId, SimulationFault> {
        if delay < 0 {
            return Err(SimulationFault::InvalidTime(delay));
        }
        let id = self.alloc_event(EventKind::Timeout);
        let seq = self.next_seq();
        self.queue.push(Reverse((self.now + delay as Time, seq, id)));
        Ok(id)
    }

    /// Create an untriggered gate event, fired later by [`World::succeed`].
    pub fn event(&mut self) -> EventId {
        self.alloc_event(EventKind::Gate)
    }

    /// Fires when every listed event has triggered (vacuously true if the
    /// list is empty).
    pub fn all_of(&mut self, children: Vec<EventId>) -> EventId {
        let all_triggered = children.iter().all(|c| self.events[c.index()].triggered);
        let id = self.alloc_event(EventKind::AllOf(children.clone()));
        if all_triggered {
            self.events[id.index()].triggered = true;
        } else {
            for c in children {
                if !self.events[c.index()].triggered {
                    self.events[c.index()].callbacks.push(Continuation::Composite(id));
                }
            }
        }
        id
    }

    /// Fires when any listed event has triggered (never fires if the list
    /// is empty).
    pub fn any_of(&mut self, children: Vec<EventId>) -> EventId {
        let any_triggered = children.iter().any(|c| self.events[c.index()].triggered);
        let id = self.alloc_event(EventKind::AnyOf(children.clone()));
        if any_triggered {
            self.events[id.index()].triggered = true;
        } else {
            for c in children {
                self.events[c.index()].callbacks.push(Continuation::Composite(id));
            }
        }
        id
    }

    /// Manually fire a gate event. Fails if it was already triggered.
    pub fn succeed(&mut self, id: EventId) -> Result<(), SimulationFault> {
        if self.events[id.index()].triggered {
            return Err(SimulationFault::AlreadyTriggered);
        }
        self.trigger(id)
    }

    /// Suspend `cont` on `id`: if `id` already triggered, resume
    /// immediately (same tick); otherwise register for later.
    pub fn await_event(&mut self, id: EventId, cont: Continuation) -> Result<(), SimulationFault> {
        if self.events[id.index()].triggered {
            self.dispatch(cont)
        } else {
            self.events[id.index()].callbacks.push(cont);
            Ok(())
        }
    }

    fn trigger(&mut self, id: EventId) -> Result<(), SimulationFault> {
        let slot = &mut self.events[id.index()];
        if slot.triggered {
            // Composite events may be marked triggered at construction
            // time (already-satisfied case) without ever going through
            // trigger(); a later trigger() call for the same id (e.g. a
            // stale timeout entry) is simply a no-op.
            return Ok(());
        }
        slot.triggered = true;
        let callbacks = std::mem::take(&mut slot.callbacks);
        for cb in callbacks {
            self.dispatch(cb)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, cont: Continuation) -> Result<(), SimulationFault> {
        match cont {
            Continuation::ControlLoop(resource) => self.resume_control_loop(resource),
            Continuation::Job { resource, job } => self.resume_job(resource, job),
            Continuation::StateMachine { resource, state, epoch } => {
                self.resume_state_machine(resource, state, epoch)
            }
            Continuation::Product(product) => self.resume_product(product),
            Continuation::Source(source) => self.resume_source(source),
            Continuation::Composite(id) => self.check_composite(id),
        }
    }

    fn check_composite(&mut self, id: EventId) -> Result<(), SimulationFault> {
        if self.events[id.index()].triggered {
            return Ok(());
        }
        let satisfied = match &self.events[id.index()].kind {
            EventKind::AllOf(children) => children.iter().all(|c| self.events[c.index()].triggered),
            EventKind::AnyOf(children) => children.iter().any(|c| self.events[c.index()].triggered),
            _ => unreachable!("Composite continuation registered on a non-composite event"),
        };
        if satisfied {
            self.trigger(id)?;
        }
        Ok(())
    }

    /// Advance the clock, running callbacks, until `now >= until` or the
    /// queue drains. Events scheduled exactly at `until` are not executed
    /// (spec §4.1, §8 property 5).
    pub fn run(&mut self, until: Time) -> Result<EventLog, SimulationFault> {
        self.stop = until;
        loop {
            let next_time = match self.queue.peek() {
                Some(Reverse((t, _, _))) => *t,
                None => break,
            };
            if next_time >= until {
                break;
            }
            self.step()?;
        }
        self.now = self.now.min(until);
        Ok(self.log.clone())
    }

    fn step(&mut self) -> Result<(), SimulationFault> {
        let Reverse((time, _seq, id)) = self.queue.pop().expect("step called with an empty queue");
        self.now = time;
        self.trigger(id)
    }

    pub fn stop_time(&self) -> Time {
        self.stop
    }

    pub fn log(&mut self, entry: LogEntry) {
        tracing::debug!(
            time = entry.time,
            activity = ?entry.activity,
            resource = ?entry.resource,
            "event"
        );
        self.log.push(entry);
    }

    pub fn event_log(&self) -> &EventLog {
        &self.log
    }

    // --- arena constructors used by world assembly / tests ---

    pub fn add_time_model(&mut self, model: TimeModel) -> TimeModelId {
        let id = TimeModelId(self.time_models.len());
        self.time_models.push(model);
        id
    }

    pub fn add_process(&mut self, process: ProcessDef) -> ProcessId {
        let id = ProcessId(self.processes.len());
        self.processes.push(process);
        id
    }

    pub fn add_queue(&mut self, capacity: Capacity) -> QueueId {
        let id = QueueId(self.queues.len());
        self.queues.push(Queue::new(id, capacity));
        id
    }

    pub fn add_sink(&mut self, sink: Sink) -> SinkId {
        let id = SinkId(self.sinks.len());
        self.sinks.push(sink);
        id
    }

    pub fn add_source(&mut self, source: Source) -> SourceId {
        let id = SourceId(self.sources.len());
        self.sources.push(source);
        id
    }

    pub fn next_product_id(&mut self) -> ProductId {
        let id = ProductId(self.products.len());
        self.products.push(None);
        id
    }

    /// Arm every long-lived background actor's first wait: each resource's
    /// control loop, its breakdown/process-breakdown loops, and each
    /// source's inter-arrival loop. Call once after assembling a `World`
    /// and before the first `run`.
    pub fn bootstrap(&mut self) -> Result<(), SimulationFault> {
        for i in 0..self.resources.len() {
            let resource = ResourceId(i);
            self.spawn_control_loop(resource)?;
            let breakdowns = self.resources[i].breakdown_states.clone();
            for state in breakdowns {
                self.spawn_breakdown_loop(resource, state)?;
            }
            let process_breakdowns: Vec<StateId> = self.resources[i].process_breakdown_states.values().copied().collect();
            for state in process_breakdowns {
                self.spawn_breakdown_loop(resource, state)?;
            }
        }
        for i in 0..self.sources.len() {
            self.spawn_source_loop(SourceId(i))?;
        }
        Ok(())
    }

    pub fn time_model_next(
        &mut self,
        id: TimeModelId,
        origin: Option<crate::location::Location>,
        target: Option<crate::location::Location>,
    ) -> Time {
        let now = self.now;
        // SAFETY-free trick: temporarily take the model out so we can pass
        // `&mut self` (for the rng) into `TimeModel::next` without a double
        // mutable borrow of `self.time_models`.
        let mut model = std::mem::replace(&mut self.time_models[id.index()], TimeModel::sample(Vec::new()));
        let value = model.next(&mut self.rng, now, origin, target);
        self.time_models[id.index()] = model;
        value
    }
}
