//! A single unit of material moving through the system (spec §4.6). Each
//! product replays the same transport/process cycle until its process
//! model is exhausted and a sink swallows it; a `RoutingStall` just means
//! "try the same step again once a candidate frees up", not a new phase of
//! work.

use crate::controller::ProcessRequest;
use crate::error::SimulationFault;
use crate::event::Continuation;
use crate::ids::{Destination, ProcessId, ProductId, QueueId, ResourceId, SinkId, SourceId};
use crate::location::Location;
use crate::log::{Activity, LogEntry};
use crate::process_model::ProcessModel;
use crate::router::Router;
use crate::world::World;

/// Where a product currently sits, for resolving the next leg's pickup
/// point. A product is never "at" a sink: arriving there ends its actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Source(SourceId),
    Resource(ResourceId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    WaitRoutingStall,
    WaitTransportFinished,
    WaitProcessFinished,
    Finished,
}

pub struct Product {
    pub id: ProductId,
    pub product_type: String,
    pub transport_process: ProcessId,
    pub process_model: ProcessModel,
    pub router: Router,
    current: Origin,
    next_process: Option<ProcessId>,
    next_resource: Option<Destination>,
    transport_resource: Option<ResourceId>,
    finished_process: crate::ids::EventId,
    phase: Phase,
}

impl World {
    /// Create a product at `origin` and immediately start its first
    /// transport step (spec §4.6 `create`).
    pub fn spawn_product(
        &mut self,
        id: ProductId,
        product_type: String,
        transport_process: ProcessId,
        process_model: ProcessModel,
        router: Router,
        origin: Origin,
    ) -> Result<(), SimulationFault> {
        let placeholder = self.event();
        let product = Product {
            id,
            product_type,
            transport_process,
            process_model,
            router,
            current: origin,
            next_process: None,
            next_resource: None,
            transport_resource: None,
            finished_process: placeholder,
            phase: Phase::WaitTransportFinished,
        };
        self.products[id.index()] = Some(product);
        let now = self.now();
        self.log(LogEntry::new(now, Activity::CreatedMaterial).with_product(id));
        self.do_transport_step(id)
    }

    pub(crate) fn resume_product(&mut self, product: ProductId) -> Result<(), SimulationFault> {
        let phase = self.products[product.index()].as_ref().map(|p| p.phase).unwrap_or(Phase::Finished);
        match phase {
            Phase::WaitRoutingStall => self.resolve_destination_and_proceed(product),
            Phase::WaitTransportFinished => self.after_transport_finished(product),
            Phase::WaitProcessFinished => self.after_process_finished(product),
            Phase::Finished => Ok(()),
        }
    }

    /// Pick a transport resource, advance the process model once, then
    /// resolve the step's destination (spec §4.6 `transport_step` steps
    /// 1-4). Re-entered only from `create`/`after_process_finished`: a
    /// `RoutingStall` retry must not advance the process model a second
    /// time, so it re-enters at [`World::resolve_destination_and_proceed`]
    /// instead.
    fn do_transport_step(&mut self, product: ProductId) -> Result<(), SimulationFault> {
        let (router, transport_process) = {
            let p = self.products[product.index()].as_ref().unwrap();
            (p.router, p.transport_process)
        };
        let transport_resource = self
            .router_get_transport_resource(router, transport_process)
            .expect("no resource offers this product's transport process");

        let candidates = self.products[product.index()].as_mut().unwrap().process_model.next_possible_processes();
        let next_process = match candidates.len() {
            0 => None,
            1 => Some(candidates[0]),
            n => Some(candidates[self.rng.pick_index(n)]),
        };
        if let Some(chosen) = next_process {
            self.products[product.index()].as_mut().unwrap().process_model.update_marking(chosen);
        }

        let p = self.products[product.index()].as_mut().unwrap();
        p.next_process = next_process;
        p.transport_resource = Some(transport_resource);
        self.resolve_destination_and_proceed(product)
    }

    /// Resolve this step's destination and either issue the transport
    /// request or suspend on a `RoutingStall` (spec §4.6 step 4, §7).
    /// Safe to re-enter repeatedly without side effects beyond the
    /// reservation, since `next_process`/`transport_resource` are fixed for
    /// the duration of one transport step.
    fn resolve_destination_and_proceed(&mut self, product: ProductId) -> Result<(), SimulationFault> {
        let (router, next_process, product_type) = {
            let p = self.products[product.index()].as_ref().unwrap();
            (p.router, p.next_process, p.product_type.clone())
        };
        let destination = self.router_get_destination(router, next_process, &product_type);
        let destination = match destination {
            Some(d) => d,
            None => {
                let process = next_process.expect("sink lookup found no candidate; product type is unconfigured");
                let stall_candidates = self.router_stall_candidates(router, process);
                let gates: Vec<_> = stall_candidates.iter().map(|&r| self.resources[r.index()].got_free).collect();
                self.products[product.index()].as_mut().unwrap().phase = Phase::WaitRoutingStall;
                let ev = self.any_of(gates);
                return self.await_event(ev, Continuation::Product(product));
            }
        };
        if let Destination::Resource(r) = destination {
            if let Some(&q) = self.resources[r.index()].input_queues.first() {
                self.queue_reserve(q);
            }
        }
        self.products[product.index()].as_mut().unwrap().next_resource = Some(destination);
        self.issue_transport_request(product, destination)
    }

    fn issue_transport_request(&mut self, product: ProductId, destination: Destination) -> Result<(), SimulationFault> {
        let (origin, transport_process, transport_resource, product_id) = {
            let p = self.products[product.index()].as_ref().unwrap();
            (p.current, p.transport_process, p.transport_resource.expect("transport resource not resolved"), p.id)
        };
        let origin_location = self.origin_location(origin);
        let pickup_queue = self.origin_output_queue(origin);
        let target_location = self.destination_location(destination);
        let dropoff_queue = self.destination_input_queue(destination);

        let finished = self.event();
        self.products[product.index()].as_mut().unwrap().finished_process = finished;
        let req = ProcessRequest {
            process: transport_process,
            product: product_id,
            pickup_queue,
            dropoff_queue,
            origin_location: Some(origin_location),
            target_location: Some(target_location),
            finished_process: finished,
        };
        self.submit_request(transport_resource, req)?;
        self.products[product.index()].as_mut().unwrap().phase = Phase::WaitTransportFinished;
        self.await_event(finished, Continuation::Product(product))
    }

    fn after_transport_finished(&mut self, product: ProductId) -> Result<(), SimulationFault> {
        let destination = self.products[product.index()].as_ref().unwrap().next_resource.expect("transport finished without a destination");
        match destination {
            Destination::Sink(sink) => self.finalize_at_sink(product, sink),
            Destination::Resource(resource) => {
                if let Some(&q) = self.resources[resource.index()].input_queues.first() {
                    self.queue_unreserve(q);
                }
                self.products[product.index()].as_mut().unwrap().current = Origin::Resource(resource);
                let process = self.products[product.index()]
                    .as_ref()
                    .unwrap()
                    .next_process
                    .expect("a resource destination always carries a process to run there");
                self.issue_process_request(product, process, resource)
            }
        }
    }

    fn issue_process_request(&mut self, product: ProductId, process: ProcessId, resource: ResourceId) -> Result<(), SimulationFault> {
        let pickup_queue = *self.resources[resource.index()].input_queues.first().expect("production resource has no input queue");
        let dropoff_queue = *self.resources[resource.index()].output_queues.first().expect("production resource has no output queue");
        let product_id = self.products[product.index()].as_ref().unwrap().id;

        let finished = self.event();
        self.products[product.index()].as_mut().unwrap().finished_process = finished;
        let req = ProcessRequest {
            process,
            product: product_id,
            pickup_queue,
            dropoff_queue,
            origin_location: None,
            target_location: None,
            finished_process: finished,
        };
        self.submit_request(resource, req)?;
        self.products[product.index()].as_mut().unwrap().phase = Phase::WaitProcessFinished;
        self.await_event(finished, Continuation::Product(product))
    }

    fn after_process_finished(&mut self, product: ProductId) -> Result<(), SimulationFault> {
        self.do_transport_step(product)
    }

    fn finalize_at_sink(&mut self, product: ProductId, sink: SinkId) -> Result<(), SimulationFault> {
        let _ = sink;
        let now = self.now();
        self.log(LogEntry::new(now, Activity::FinishedMaterial).with_product(product));
        self.products[product.index()] = None;
        Ok(())
    }

    fn origin_location(&self, origin: Origin) -> Location {
        match origin {
            Origin::Source(s) => self.sources[s.index()].location,
            Origin::Resource(r) => self.resources[r.index()].location,
        }
    }

    fn origin_output_queue(&self, origin: Origin) -> QueueId {
        match origin {
            Origin::Source(s) => *self.sources[s.index()].output_queues.first().expect("source has no output queue"),
            Origin::Resource(r) => *self.resources[r.index()].output_queues.first().expect("resource has no output queue"),
        }
    }

    fn destination_location(&self, destination: Destination) -> Location {
        match destination {
            Destination::Resource(r) => self.resources[r.index()].location,
            Destination::Sink(s) => self.sinks[s.index()].location,
        }
    }

    fn destination_input_queue(&self, destination: Destination) -> QueueId {
        match destination {
            Destination::Resource(r) => *self.resources[r.index()].input_queues.first().expect("resource has no input queue"),
            Destination::Sink(s) => *self.sinks[s.index()].input_queues.first().expect("sink has no input queue"),
        }
    }
}
