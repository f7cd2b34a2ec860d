//! Routing: choosing a target resource or sink for a product's next step
//! (spec §4.7). `SimpleRouter` matches on process identity; `CapabilityRouter`
//! matches Capability processes by tag and falls back to `SimpleRouter`
//! semantics for Transport processes.

use crate::ids::{Destination, ProcessId, ResourceId, SinkId};
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterKind {
    Simple,
    Capability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    Random,
    ShortestQueue,
    Fifo,
}

/// Copied onto every `Product` at creation from its source, so routing
/// decisions don't need a separate router arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Router {
    pub kind: RouterKind,
    pub heuristic: Heuristic,
}

impl World {
    fn candidate_resources(&self, router: Router, process: ProcessId) -> Vec<ResourceId> {
        match router.kind {
            RouterKind::Simple => self.resources.iter().filter(|r| r.processes.contains(&process)).map(|r| r.id).collect(),
            RouterKind::Capability => {
                if self.processes[process.index()].is_transport() {
                    self.resources.iter().filter(|r| r.processes.contains(&process)).map(|r| r.id).collect()
                } else {
                    match self.processes[process.index()].capability() {
                        Some(tag) => self
                            .resources
                            .iter()
                            .filter(|r| r.processes.iter().any(|&p| self.processes[p.index()].capability() == Some(tag)))
                            .map(|r| r.id)
                            .collect(),
                        None => Vec::new(),
                    }
                }
            }
        }
    }

    fn choose_resource(&mut self, heuristic: Heuristic, candidates: &[ResourceId]) -> ResourceId {
        match heuristic {
            Heuristic::Fifo => candidates[0],
            Heuristic::Random => candidates[self.rng.pick_index(candidates.len())],
            Heuristic::ShortestQueue => {
                let lengths: Vec<usize> = candidates
                    .iter()
                    .map(|&r| {
                        self.resources[r.index()]
                            .input_queues
                            .first()
                            .map(|&q| self.queue_len(q))
                            .unwrap_or(0)
                    })
                    .collect();
                let min = *lengths.iter().min().expect("candidates must be non-empty");
                let tied: Vec<ResourceId> = candidates.iter().zip(lengths.iter()).filter(|(_, &l)| l == min).map(|(&r, _)| r).collect();
                tied[self.rng.pick_index(tied.len())]
            }
        }
    }

    fn choose_sink(&mut self, heuristic: Heuristic, candidates: &[SinkId]) -> SinkId {
        match heuristic {
            Heuristic::Fifo => candidates[0],
            Heuristic::Random => candidates[self.rng.pick_index(candidates.len())],
            Heuristic::ShortestQueue => {
                let lengths: Vec<usize> = candidates
                    .iter()
                    .map(|&s| self.sinks[s.index()].input_queues.first().map(|&q| self.queue_len(q)).unwrap_or(0))
                    .collect();
                let min = *lengths.iter().min().expect("candidates must be non-empty");
                let tied: Vec<SinkId> = candidates.iter().zip(lengths.iter()).filter(|(_, &l)| l == min).map(|(&s, _)| s).collect();
                tied[self.rng.pick_index(tied.len())]
            }
        }
    }

    /// Filter candidates by the router's matching rule, drop those whose
    /// every input queue is full, and apply the heuristic. `None` means
    /// every candidate is currently full — a transient `RoutingStall`, not
    /// an error (spec §7).
    pub fn router_get_next_resource(&mut self, router: Router, process: ProcessId) -> Option<ResourceId> {
        let candidates = self.candidate_resources(router, process);
        let available: Vec<ResourceId> = candidates
            .into_iter()
            .filter(|&r| self.resources[r.index()].input_queues.iter().any(|&q| !self.queue_full(q)))
            .collect();
        if available.is_empty() {
            return None;
        }
        Some(self.choose_resource(router.heuristic, &available))
    }

    /// Pick the transport resource that will perform a move: the same
    /// candidate-matching rule as production routing, but never filtered by
    /// queue occupancy (a transporter's capacity is its controller's job
    /// slots, not an input queue). `None` means no resource offers the
    /// process at all, a configuration problem rather than a stall.
    pub fn router_get_transport_resource(&mut self, router: Router, transport_process: ProcessId) -> Option<ResourceId> {
        let candidates = self.candidate_resources(router, transport_process);
        if candidates.is_empty() {
            return None;
        }
        Some(self.choose_resource(router.heuristic, &candidates))
    }

    /// All resources a stalled router_get_next_resource call should retry
    /// once any one of them frees up (the `AnyOf(got_free)` set, spec §4.6
    /// step 4).
    pub fn router_stall_candidates(&self, router: Router, process: ProcessId) -> Vec<ResourceId> {
        self.candidate_resources(router, process)
    }

    pub fn router_get_sink(&mut self, router: Router, product_type: &str) -> Option<SinkId> {
        let candidates: Vec<SinkId> = self.sinks.iter().filter(|s| s.product_type == product_type).map(|s| s.id).collect();
        if candidates.is_empty() {
            return None;
        }
        Some(self.choose_sink(router.heuristic, &candidates))
    }

    pub fn router_get_destination(&mut self, router: Router, process: Option<ProcessId>, product_type: &str) -> Option<Destination> {
        match process {
            Some(p) => self.router_get_next_resource(router, p).map(Destination::Resource),
            None => self.router_get_sink(router, product_type).map(Destination::Sink),
        }
    }
}
