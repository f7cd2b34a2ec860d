//! Entry and exit points of the network (spec §4.8). A source is a
//! long-lived background actor, like a control loop or breakdown cycle: it
//! wakes on its own inter-arrival timeout, mints a product, and reschedules
//! itself. A sink is passive — it only ever appears as a router's
//! destination and a queue to drop tokens into.

use crate::error::SimulationFault;
use crate::event::Continuation;
use crate::ids::{ProcessId, QueueId, SinkId, SourceId, TimeModelId};
use crate::location::Location;
use crate::process_model::ProcessModel;
use crate::product::Origin;
use crate::router::Router;
use crate::world::World;

pub struct Source {
    pub id: SourceId,
    pub location: Location,
    pub product_type: String,
    pub transport_process: ProcessId,
    /// Cloned onto every minted product; each product then advances its
    /// own copy independently.
    pub process_model_template: ProcessModel,
    pub router: Router,
    pub output_queues: Vec<QueueId>,
    pub inter_arrival: TimeModelId,
    /// `None` means the source never stops minting products on its own
    /// (it still respects the run horizon).
    pub limit: Option<u64>,
    pub(crate) emitted: u64,
}

pub struct Sink {
    pub id: SinkId,
    pub location: Location,
    pub product_type: String,
    pub input_queues: Vec<QueueId>,
}

impl Source {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: SourceId,
        location: Location,
        product_type: String,
        transport_process: ProcessId,
        process_model_template: ProcessModel,
        router: Router,
        output_queues: Vec<QueueId>,
        inter_arrival: TimeModelId,
        limit: Option<u64>,
    ) -> Self {
        Source {
            id,
            location,
            product_type,
            transport_process,
            process_model_template,
            router,
            output_queues,
            inter_arrival,
            limit,
            emitted: 0,
        }
    }
}

impl Sink {
    pub fn new(id: SinkId, location: Location, product_type: String, input_queues: Vec<QueueId>) -> Self {
        Sink { id, location, product_type, input_queues }
    }
}

impl World {
    /// Arm a source's first inter-arrival wait. Called once during
    /// [`World::bootstrap`].
    pub fn spawn_source_loop(&mut self, source: SourceId) -> Result<(), SimulationFault> {
        self.arm_source(source)
    }

    fn arm_source(&mut self, source: SourceId) -> Result<(), SimulationFault> {
        let model = self.sources[source.index()].inter_arrival;
        let delay = self.time_model_next(model, None, None);
        let event = self.timeout(delay)?;
        self.await_event(event, Continuation::Source(source))
    }

    pub(crate) fn resume_source(&mut self, source: SourceId) -> Result<(), SimulationFault> {
        let src = &self.sources[source.index()];
        let exhausted = src.limit.is_some_and(|limit| src.emitted >= limit);
        if exhausted {
            return Ok(());
        }
        self.sources[source.index()].emitted += 1;

        let id = self.next_product_id();
        let (product_type, transport_process, process_model, router, output_queues) = {
            let src = &self.sources[source.index()];
            (src.product_type.clone(), src.transport_process, src.process_model_template.clone(), src.router, src.output_queues.clone())
        };
        // Put the new product's token onto every output queue before
        // spawning its actor, so the first transport job's pickup finds it
        // already there (spec §4.8 `Source.run`).
        for queue in output_queues {
            self.queue_put(queue, crate::queue::ProductToken { product: id, product_type: product_type.clone() })?;
        }
        self.spawn_product(id, product_type, transport_process, process_model, router, Origin::Source(source))?;

        self.arm_source(source)
    }
}
