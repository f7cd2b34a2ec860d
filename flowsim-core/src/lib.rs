//! Discrete-event simulation kernel for production-system flow models:
//! resources running production/transport/setup/breakdown state machines,
//! products routed between them, driven by a single-threaded virtual clock.

pub mod config;
pub mod controller;
pub mod distribution;
pub mod error;
pub mod event;
pub mod ids;
pub mod location;
pub mod log;
pub mod process;
pub mod process_model;
pub mod product;
pub mod queue;
pub mod resource;
pub mod rng;
pub mod router;
pub mod source_sink;
pub mod state_machine;
pub mod time_model;
pub mod world;

pub use config::ConfigModel;
pub use error::{ConfigError, SimulationFault};
pub use log::{Activity, EventLog, LogEntry};
pub use world::World;

/// Event log plus the product-conservation bookkeeping spec §6 asks a
/// `Runner` to expose via `performance()`; KPI derivation beyond counts is
/// explicitly out of scope.
#[derive(Debug, Clone)]
pub struct PerformanceView {
    pub events: EventLog,
    pub created: usize,
    pub in_flight: usize,
    pub finished: usize,
}

impl World {
    pub fn performance(&self) -> PerformanceView {
        let in_flight = self.products.iter().filter(|p| p.is_some()).count();
        let finished = self.event_log().iter().filter(|e| e.activity == Activity::FinishedMaterial).count();
        let created = self.event_log().iter().filter(|e| e.activity == Activity::CreatedMaterial).count();
        PerformanceView { events: self.event_log().clone(), created, in_flight, finished }
    }
}

/// End-to-end scenario walkthroughs (spec §8), each hand-assembling a
/// `World` the way `config::try_from_config` would, without going through
/// config parsing.
#[cfg(test)]
mod scenarios {
    use crate::controller::{Policy, ProcessRequest};
    use crate::ids::{ProductId, ResourceId, SinkId, SourceId, StateId};
    use crate::location::{DistanceMetric, Location};
    use crate::log::{Activity, StateKindTag};
    use crate::process::ProcessDef;
    use crate::process_model::{PetriNet, ProcessModel, Transition};
    use crate::queue::{Capacity, ProductToken};
    use crate::resource::ResourceKind;
    use crate::router::{Heuristic, Router, RouterKind};
    use crate::source_sink::{Sink, Source};
    use crate::time_model::TimeModel;
    use crate::world::World;

    /// Shared rig for scenarios A and B: one source (constant(10)
    /// inter-arrival), one production resource `R` running `p1` in a
    /// constant 5 time units, one zero-duration transport resource `T`,
    /// one sink. An optional `(mtbf, repair)` pair attaches a resource-wide
    /// breakdown state to `R`.
    fn single_machine_world(seed: u64, stop: u64, breakdown: Option<(f64, f64)>) -> (World, ResourceId) {
        let mut w = World::new(seed, stop);
        let origin = Location::new(0.0, 0.0);

        let inter_arrival = w.add_time_model(TimeModel::constant(10.0));
        let p1_time = w.add_time_model(TimeModel::constant(5.0));
        let tp_time = w.add_time_model(TimeModel::constant(0.0));

        let p1 = w.add_process(ProcessDef::Production { time_model: p1_time });
        let tp = w.add_process(ProcessDef::Transport { time_model: tp_time });

        let q_src_out = w.add_queue(Capacity::Unbounded);
        let q_r_in = w.add_queue(Capacity::Unbounded);
        let q_r_out = w.add_queue(Capacity::Unbounded);
        let q_sink_in = w.add_queue(Capacity::Unbounded);

        let r = w.add_resource(ResourceKind::Production, 1, origin, vec![p1], vec![q_r_in], vec![q_r_out], Policy::Fifo);
        w.add_process_state(r, p1, p1_time, false);
        if let Some((mtbf, repair)) = breakdown {
            let mtbf_tm = w.add_time_model(TimeModel::constant(mtbf));
            let repair_tm = w.add_time_model(TimeModel::constant(repair));
            w.add_breakdown_state(r, mtbf_tm, repair_tm);
        }

        let t = w.add_resource(ResourceKind::Transport, 1, origin, vec![tp], vec![], vec![], Policy::Fifo);
        w.add_process_state(t, tp, tp_time, true);

        w.add_sink(Sink::new(SinkId(0), origin, "P".into(), vec![q_sink_in]));

        let router = Router { kind: RouterKind::Simple, heuristic: Heuristic::Fifo };
        let process_model_template = ProcessModel::list(vec![p1]);
        let source = Source::new(SourceId(0), origin, "P".into(), tp, process_model_template, router, vec![q_src_out], inter_arrival, None);
        w.add_source(source);

        w.bootstrap().unwrap();
        (w, r)
    }

    #[test]
    fn scenario_a_single_machine_constant_times() {
        let (mut w, _r) = single_machine_world(0, 35, None);
        w.run(35).unwrap();
        let log = w.event_log();
        let created: Vec<u64> = log.iter().filter(|e| e.activity == Activity::CreatedMaterial).map(|e| e.time).collect();
        let mut finished: Vec<u64> = log.iter().filter(|e| e.activity == Activity::FinishedMaterial).map(|e| e.time).collect();
        finished.sort();
        assert_eq!(created, vec![10, 20, 30]);
        assert_eq!(finished, vec![15, 25, 35]);
    }

    #[test]
    fn scenario_b_breakdown_interrupts_in_progress_job() {
        let (mut w, r) = single_machine_world(0, 30, Some((12.0, 3.0)));
        w.run(30).unwrap();
        let log = w.event_log();
        let interrupts: Vec<_> = log.iter().filter(|e| e.activity == Activity::StartInterrupt && e.resource == Some(r)).collect();
        assert_eq!(interrupts.len(), 1, "only the first breakdown cycle catches a running job before t=30");
        assert_eq!(interrupts[0].time, 12);
        let first_finish = log.iter().find(|e| e.activity == Activity::FinishedMaterial).unwrap();
        // started at 10, interrupted at 12 (3 of 5 units remain), repaired for 3 (resumes at 15), ends at 18.
        assert_eq!(first_finish.time, 18);
    }

    #[test]
    fn scenario_c_routing_stalls_on_full_queues_then_recovers() {
        let mut w = World::new(0, 60);
        let origin = Location::new(0.0, 0.0);
        let inter_arrival = w.add_time_model(TimeModel::constant(1.0));
        let p1_time = w.add_time_model(TimeModel::constant(10.0));
        let tp_time = w.add_time_model(TimeModel::constant(0.0));
        let p1 = w.add_process(ProcessDef::Production { time_model: p1_time });
        let tp = w.add_process(ProcessDef::Transport { time_model: tp_time });

        let q_src_out = w.add_queue(Capacity::Unbounded);
        let q_r1_in = w.add_queue(Capacity::Bounded(1));
        let q_r1_out = w.add_queue(Capacity::Unbounded);
        let q_r2_in = w.add_queue(Capacity::Bounded(1));
        let q_r2_out = w.add_queue(Capacity::Unbounded);
        let q_sink_in = w.add_queue(Capacity::Unbounded);

        let r1 = w.add_resource(ResourceKind::Production, 1, origin, vec![p1], vec![q_r1_in], vec![q_r1_out], Policy::Fifo);
        w.add_process_state(r1, p1, p1_time, false);
        let r2 = w.add_resource(ResourceKind::Production, 1, origin, vec![p1], vec![q_r2_in], vec![q_r2_out], Policy::Fifo);
        w.add_process_state(r2, p1, p1_time, false);

        let t = w.add_resource(ResourceKind::Transport, 1, origin, vec![tp], vec![], vec![], Policy::Fifo);
        w.add_process_state(t, tp, tp_time, true);

        w.add_sink(Sink::new(SinkId(0), origin, "P".into(), vec![q_sink_in]));

        let router = Router { kind: RouterKind::Simple, heuristic: Heuristic::ShortestQueue };
        let process_model_template = ProcessModel::list(vec![p1]);
        let source =
            Source::new(SourceId(0), origin, "P".into(), tp, process_model_template, router, vec![q_src_out], inter_arrival, Some(5));
        w.add_source(source);

        w.bootstrap().unwrap();
        w.run(60).unwrap();

        let log = w.event_log();
        let finished = log.iter().filter(|e| e.activity == Activity::FinishedMaterial).count();
        assert_eq!(finished, 5, "all five products must eventually clear the full input queues");
        let last_finish = log.iter().filter(|e| e.activity == Activity::FinishedMaterial).map(|e| e.time).max().unwrap();
        assert!(last_finish >= 11, "the last product cannot start until a resource frees around t=11, got {last_finish}");
    }

    #[test]
    fn scenario_d_petri_net_choice_is_seed_deterministic() {
        fn build_and_run(seed: u64) -> Vec<ResourceId> {
            let mut w = World::new(seed, 50);
            let origin = Location::new(0.0, 0.0);
            let inter_arrival = w.add_time_model(TimeModel::constant(100.0));
            let a_time = w.add_time_model(TimeModel::constant(5.0));
            let b_time = w.add_time_model(TimeModel::constant(5.0));
            let tp_time = w.add_time_model(TimeModel::constant(0.0));
            let pa = w.add_process(ProcessDef::Production { time_model: a_time });
            let pb = w.add_process(ProcessDef::Production { time_model: b_time });
            let tp = w.add_process(ProcessDef::Transport { time_model: tp_time });

            let q_src_out = w.add_queue(Capacity::Unbounded);
            let q_ra_in = w.add_queue(Capacity::Unbounded);
            let q_ra_out = w.add_queue(Capacity::Unbounded);
            let q_rb_in = w.add_queue(Capacity::Unbounded);
            let q_rb_out = w.add_queue(Capacity::Unbounded);
            let q_sink_in = w.add_queue(Capacity::Unbounded);

            let ra = w.add_resource(ResourceKind::Production, 1, origin, vec![pa], vec![q_ra_in], vec![q_ra_out], Policy::Fifo);
            w.add_process_state(ra, pa, a_time, false);
            let rb = w.add_resource(ResourceKind::Production, 1, origin, vec![pb], vec![q_rb_in], vec![q_rb_out], Policy::Fifo);
            w.add_process_state(rb, pb, b_time, false);

            let t = w.add_resource(ResourceKind::Transport, 1, origin, vec![tp], vec![], vec![], Policy::Fifo);
            w.add_process_state(t, tp, tp_time, true);

            w.add_sink(Sink::new(SinkId(0), origin, "P".into(), vec![q_sink_in]));

            // A single token in place 0 can flow to place 1 via either
            // transition: both are enabled simultaneously, so the choice is
            // made by the seeded RNG, not by Petri net structure.
            let net = PetriNet::new(
                2,
                vec![1, 0],
                vec![
                    Transition { name: "a".into(), inputs: vec![0], outputs: vec![1], label: Some(pa) },
                    Transition { name: "b".into(), inputs: vec![0], outputs: vec![1], label: Some(pb) },
                ],
            );
            let process_model_template = ProcessModel::petri_net(net);
            let router = Router { kind: RouterKind::Simple, heuristic: Heuristic::Fifo };
            let source =
                Source::new(SourceId(0), origin, "P".into(), tp, process_model_template, router, vec![q_src_out], inter_arrival, Some(1));
            w.add_source(source);
            w.bootstrap().unwrap();
            w.run(50).unwrap();

            w.event_log()
                .iter()
                .filter(|e| e.activity == Activity::StartState && e.state_type == Some(StateKindTag::Production))
                .map(|e| e.resource.unwrap())
                .collect()
        }

        let run1 = build_and_run(7);
        let run2 = build_and_run(7);
        assert_eq!(run1, run2, "identical seeds must choose the same Petri net branch");
        assert_eq!(run1.len(), 1, "exactly one of the two conflicting transitions fires");
    }

    #[test]
    fn scenario_e_spt_policy_orders_by_expected_time() {
        let mut w = World::new(0, 100);
        let origin = Location::new(0.0, 0.0);
        let t_long = w.add_time_model(TimeModel::constant(7.0));
        let t_short = w.add_time_model(TimeModel::constant(3.0));
        let t_mid = w.add_time_model(TimeModel::constant(5.0));
        let px = w.add_process(ProcessDef::Production { time_model: t_long });
        let py = w.add_process(ProcessDef::Production { time_model: t_short });
        let pz = w.add_process(ProcessDef::Production { time_model: t_mid });

        let q_in = w.add_queue(Capacity::Unbounded);
        let q_out = w.add_queue(Capacity::Unbounded);

        let r = w.add_resource(ResourceKind::Production, 1, origin, vec![px, py, pz], vec![q_in], vec![q_out], Policy::Spt);
        let state_x = w.add_process_state(r, px, t_long, false);
        let state_y = w.add_process_state(r, py, t_short, false);
        let state_z = w.add_process_state(r, pz, t_mid, false);

        for i in 0..3 {
            w.queue_put(q_in, ProductToken { product: ProductId(i), product_type: "P".into() }).unwrap();
        }
        // All three requests land before the control loop ever wakes, so
        // SPT gets to reorder them rather than racing the arrival order.
        for (i, process) in [px, py, pz].into_iter().enumerate() {
            let finished = w.event();
            w.submit_request(
                r,
                ProcessRequest {
                    process,
                    product: ProductId(i),
                    pickup_queue: q_in,
                    dropoff_queue: q_out,
                    origin_location: None,
                    target_location: None,
                    finished_process: finished,
                },
            )
            .unwrap();
        }
        w.spawn_control_loop(r).unwrap();
        w.run(100).unwrap();

        let order: Vec<StateId> = w.event_log().iter().filter(|e| e.activity == Activity::StartState).map(|e| e.state.unwrap()).collect();
        assert_eq!(order, vec![state_y, state_z, state_x], "SPT must run the shortest expected job first");
    }

    #[test]
    fn scenario_f_transport_performs_empty_leg_then_loaded_leg() {
        let mut w = World::new(0, 100);
        let depot = Location::new(10.0, 10.0);
        let origin = Location::new(0.0, 0.0);
        let target = Location::new(5.0, 5.0);

        let tp_time = w.add_time_model(TimeModel::distance(DistanceMetric::Manhattan, 1.0, 0.0));
        let tp = w.add_process(ProcessDef::Transport { time_model: tp_time });

        let q_pickup = w.add_queue(Capacity::Unbounded);
        let q_dropoff = w.add_queue(Capacity::Unbounded);

        let t = w.add_resource(ResourceKind::Transport, 1, depot, vec![tp], vec![], vec![], Policy::Fifo);
        w.add_process_state(t, tp, tp_time, true);

        w.queue_put(q_pickup, ProductToken { product: ProductId(0), product_type: "P".into() }).unwrap();
        let finished = w.event();
        w.submit_request(
            t,
            ProcessRequest {
                process: tp,
                product: ProductId(0),
                pickup_queue: q_pickup,
                dropoff_queue: q_dropoff,
                origin_location: Some(origin),
                target_location: Some(target),
                finished_process: finished,
            },
        )
        .unwrap();
        w.spawn_control_loop(t).unwrap();
        w.run(100).unwrap();

        // empty leg depot(10,10)->origin(0,0) = 20, loaded leg origin->target(5,5) = 10.
        assert!(w.event_triggered(finished));
        assert_eq!(w.now(), 30);
        assert_eq!(w.resources[t.index()].location, target);
    }
}
