//! Opaque integer identifiers for every long-lived entity in the simulation.
//!
//! Entities never hold pointers or `Rc`s to each other; they hold these IDs
//! and look each other up through the owning [`crate::world::World`] arenas.
//! This sidesteps the cyclic-reference problem between resources,
//! controllers, and states called out in the design notes.

use std::fmt;

macro_rules! id_type {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub usize);

        impl $name {
            /// The raw arena index backing this id.
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

id_type!(TimeModelId, "Identifies a [`crate::time_model::TimeModel`].");
id_type!(ProcessId, "Identifies a [`crate::process::ProcessDef`].");
id_type!(QueueId, "Identifies a [`crate::queue::Queue`].");
id_type!(ResourceId, "Identifies a [`crate::resource::Resource`].");
id_type!(StateId, "Identifies a state machine local to one resource.");
id_type!(ProductId, "Identifies a live [`crate::product::Product`].");
id_type!(SourceId, "Identifies a [`crate::source_sink::Source`].");
id_type!(SinkId, "Identifies a [`crate::source_sink::Sink`].");
id_type!(EventId, "Identifies an [`crate::event::EventSlot`] in the scheduler arena.");

/// A resolved routing target: either a production/transport resource, or a
/// terminal sink. Mirrors the `Location = Resource ∪ Source ∪ Sink` union in
/// the data model (sources never appear as a routing target).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Resource(ResourceId),
    Sink(SinkId),
}
