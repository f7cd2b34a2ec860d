//! The event arena and the scheduler's notion of "what should be resumed
//! when this fires". See spec §4.1.
//!
//! There is no generic `Box<dyn FnOnce>` callback list here. Every
//! suspendable actor in this crate (controller loops, in-flight jobs,
//! resource state machines, products, sources) is an explicit state
//! machine keyed by an id; [`Continuation`] just names *which* actor to
//! resume. This is the "tagged-variant polymorphism" translation the
//! design notes call for instead of a trait-object-per-process model.

use crate::ids::{EventId, ProductId, ResourceId, SourceId, StateId};

pub type JobId = usize;

/// Identifies which suspended actor should be resumed when an event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// A production or transport controller's long-lived dispatch loop.
    ControlLoop(ResourceId),
    /// One in-flight job (`start_job` coroutine) owned by a controller.
    Job { resource: ResourceId, job: JobId },
    /// A resource-local state machine (production/transport/setup/breakdown).
    /// `epoch` pins this wake-up to the specific wait it was scheduled
    /// from; a stale epoch (because the state was interrupted and moved on)
    /// makes the wake-up a no-op.
    StateMachine { resource: ResourceId, state: StateId, epoch: u64 },
    /// A product's lifecycle actor.
    Product(ProductId),
    /// A source's inter-arrival loop.
    Source(SourceId),
    /// Internal bookkeeping: notify a composite (`AllOf`/`AnyOf`) event
    /// that one of its children fired.
    Composite(EventId),
}

#[derive(Debug, Clone)]
pub enum EventKind {
    /// Fires when the scheduler's clock reaches the scheduled time.
    Timeout,
    /// Fires only when something calls `World::succeed` on it.
    Gate,
    /// Fires once every id in the list has triggered.
    AllOf(Vec<EventId>),
    /// Fires once any id in the list has triggered.
    AnyOf(Vec<EventId>),
}

#[derive(Debug)]
pub struct EventSlot {
    pub kind: EventKind,
    pub triggered: bool,
    pub callbacks: Vec<Continuation>,
}

impl EventSlot {
    pub fn new(kind: EventKind) -> Self {
        EventSlot { kind, triggered: false, callbacks: Vec::new() }
    }
}
