//! Declarative model assembly (spec §4.11, §6). Plain serde structs mirror
//! the logical configuration schema; `World::try_from_config` resolves the
//! string ids an external format would use into the arena ids the kernel
//! actually runs on, validating every cross-reference named in spec §7
//! before constructing anything ("no partial initialization").
//!
//! `flowsim-core` never parses a file itself — an adapter deserializes
//! JSON/YAML/whatever into `ConfigModel` and hands it to this module.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::controller::Policy;
use crate::distribution::DistributionKind;
use crate::error::ConfigError;
use crate::ids::{ProcessId, QueueId, ResourceId, TimeModelId};
use crate::location::{DistanceMetric, Location};
use crate::process::ProcessDef;
use crate::process_model::{PetriNet, ProcessModel, Transition};
use crate::queue::Capacity;
use crate::resource::ResourceKind;
use crate::router::{Heuristic, Router, RouterKind};
use crate::source_sink::{Sink, Source};
use crate::time_model::TimeModel;
use crate::world::World;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigModel {
    pub seed: u64,
    pub time_models: Vec<TimeModelConfig>,
    #[serde(default)]
    pub states: Vec<StateConfig>,
    pub processes: Vec<ProcessConfig>,
    pub queues: Vec<QueueConfig>,
    pub resources: Vec<ResourceConfig>,
    pub products: Vec<ProductConfig>,
    pub sinks: Vec<SinkConfig>,
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeModelConfig {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub kind: TimeModelKindConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeModelKindConfig {
    Function { distribution: DistributionKind, parameters: Vec<f64>, #[serde(default = "default_batch")] batch_size: usize },
    Sample { samples: Vec<f64> },
    Distance { metric: DistanceMetric, speed: f64, reaction_time: f64 },
    Scheduled { schedule: Vec<f64>, absolute: bool, cyclic: bool },
}

fn default_batch() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    pub id: String,
    pub kind: StateKindConfig,
    pub time_model_id: String,
    #[serde(default)]
    pub repair_time_model_id: Option<String>,
    #[serde(default)]
    pub process_id: Option<String>,
    #[serde(default)]
    pub origin_setup: Option<String>,
    #[serde(default)]
    pub target_setup: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKindConfig {
    Production,
    Transport,
    Setup,
    Breakdown,
    ProcessBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub id: String,
    pub kind: ProcessKindConfig,
    pub time_model_id: String,
    #[serde(default)]
    pub capability: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessKindConfig {
    Production,
    Transport,
    Capability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub id: String,
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub id: String,
    pub kind: ResourceKindConfig,
    pub capacity: usize,
    pub location: [f64; 2],
    pub control_policy: Policy,
    pub process_ids: Vec<String>,
    #[serde(default)]
    pub process_capacities: Vec<usize>,
    #[serde(default)]
    pub state_ids: Vec<String>,
    #[serde(default)]
    pub input_queues: Vec<String>,
    #[serde(default)]
    pub output_queues: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKindConfig {
    Production,
    Transport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
    pub id: String,
    pub product_type: String,
    pub processes: ProcessesSpecConfig,
    pub transport_process: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessesSpecConfig {
    List(Vec<String>),
    PetriNet(PetriNetConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetriNetConfig {
    pub place_count: usize,
    pub initial_marking: Vec<u32>,
    pub transitions: Vec<TransitionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionConfig {
    pub name: String,
    pub inputs: Vec<usize>,
    pub outputs: Vec<usize>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub id: String,
    pub location: [f64; 2],
    pub product_type: String,
    pub input_queues: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: String,
    pub location: [f64; 2],
    pub product_type: String,
    pub time_model_id: String,
    pub router: RouterKind,
    pub routing_heuristic: Heuristic,
    pub output_queues: Vec<String>,
    #[serde(default)]
    pub limit: Option<u64>,
}

/// String-keyed lookup tables built once, reused by both the validation
/// pass and the construction pass.
struct Index {
    time_models: HashMap<String, TimeModelId>,
    processes: HashMap<String, ProcessId>,
    queues: HashMap<String, QueueId>,
}

impl World {
    /// Validate and assemble a `World` from a deserialized config. Returns
    /// every validation failure found (spec §7: "reported as a list; no
    /// partial initialization") rather than stopping at the first one.
    pub fn try_from_config(cfg: &ConfigModel) -> Result<World, Vec<ConfigError>> {
        let mut world = World::new(cfg.seed, 0);
        let mut errors = Vec::new();

        let time_model_ids: HashMap<String, TimeModelId> = cfg
            .time_models
            .iter()
            .map(|t| {
                if let TimeModelKindConfig::Function { distribution, parameters, .. } = &t.kind {
                    let expected = distribution.arity();
                    if parameters.len() < expected {
                        errors.push(ConfigError::InvalidDistributionParameters {
                            time_model: t.id.clone(),
                            distribution: *distribution,
                            expected,
                            actual: parameters.len(),
                        });
                        return (t.id.clone(), world.add_time_model(TimeModel::constant(0.0)));
                    }
                }
                (t.id.clone(), world.add_time_model(build_time_model(t)))
            })
            .collect();

        let process_ids: HashMap<String, ProcessId> = cfg
            .processes
            .iter()
            .map(|p| {
                let Some(&tm) = time_model_ids.get(&p.time_model_id) else {
                    errors.push(ConfigError::UnknownTimeModel(p.time_model_id.clone()));
                    return (p.id.clone(), world.add_process(ProcessDef::Production { time_model: TimeModelId(0) }));
                };
                let def = match p.kind {
                    ProcessKindConfig::Production => ProcessDef::Production { time_model: tm },
                    ProcessKindConfig::Transport => ProcessDef::Transport { time_model: tm },
                    ProcessKindConfig::Capability => {
                        let tag = p.capability.clone().unwrap_or_default();
                        if tag.is_empty() {
                            errors.push(ConfigError::UnknownCapability(p.id.clone()));
                        }
                        ProcessDef::Capability { time_model: tm, capability: tag }
                    }
                };
                (p.id.clone(), world.add_process(def))
            })
            .collect();

        let queue_ids: HashMap<String, QueueId> = cfg
            .queues
            .iter()
            .map(|q| (q.id.clone(), world.add_queue(Capacity::from_config(q.capacity))))
            .collect();

        let index = Index { time_models: time_model_ids, processes: process_ids, queues: queue_ids };

        for r in &cfg.resources {
            validate_resource(r, &index, &mut errors);
        }
        for pr in &cfg.products {
            validate_product(pr, &index, &mut errors);
        }
        for s in &cfg.sinks {
            validate_sink(s, &index, &mut errors);
        }
        for s in &cfg.sources {
            validate_source(s, &index, &mut errors);
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let resource_ids: HashMap<String, ResourceId> =
            cfg.resources.iter().map(|r| (r.id.clone(), build_resource(&mut world, r, &index))).collect();

        for s in &cfg.states {
            attach_state(&mut world, s, &index, &resource_ids, &cfg.resources);
        }

        let product_types: HashMap<String, (ProcessModel, ProcessId)> = cfg
            .products
            .iter()
            .map(|p| {
                let model = build_process_model(p, &index);
                let transport = index.processes[&p.transport_process];
                (p.product_type.clone(), (model, transport))
            })
            .collect();

        for s in &cfg.sinks {
            let id = crate::ids::SinkId(world.sinks.len());
            let location = Location::new(s.location[0], s.location[1]);
            let input_queues = s.input_queues.iter().map(|q| index.queues[q]).collect();
            world.add_sink(Sink::new(id, location, s.product_type.clone(), input_queues));
        }

        for s in &cfg.sources {
            let id = crate::ids::SourceId(world.sources.len());
            let location = Location::new(s.location[0], s.location[1]);
            let output_queues = s.output_queues.iter().map(|q| index.queues[q]).collect();
            let (template, transport) = product_types[&s.product_type].clone();
            let router = Router { kind: s.router, heuristic: s.routing_heuristic };
            let source = Source::new(
                id,
                location,
                s.product_type.clone(),
                transport,
                template,
                router,
                output_queues,
                index.time_models[&s.time_model_id],
                s.limit,
            );
            world.add_source(source);
        }

        world.bootstrap().map_err(|_| vec![ConfigError::NonPositiveCapacity("bootstrap".into())])?;
        Ok(world)
    }
}

fn build_time_model(cfg: &TimeModelConfig) -> TimeModel {
    match &cfg.kind {
        TimeModelKindConfig::Function { distribution, parameters, batch_size } => {
            TimeModel::function(*distribution, parameters, *batch_size)
        }
        TimeModelKindConfig::Sample { samples } => TimeModel::sample(samples.clone()),
        TimeModelKindConfig::Distance { metric, speed, reaction_time } => TimeModel::distance(*metric, *speed, *reaction_time),
        TimeModelKindConfig::Scheduled { schedule, absolute, cyclic } => TimeModel::scheduled(schedule.clone(), *absolute, *cyclic),
    }
}

fn validate_resource(r: &ResourceConfig, index: &Index, errors: &mut Vec<ConfigError>) {
    if r.capacity == 0 {
        errors.push(ConfigError::NonPositiveCapacity(r.id.clone()));
    }
    if !r.process_capacities.is_empty() && r.process_capacities.len() != r.process_ids.len() {
        errors.push(ConfigError::MismatchedProcessCapacities {
            resource: r.id.clone(),
            capacities: r.process_capacities.len(),
            processes: r.process_ids.len(),
        });
    }
    for p in &r.process_ids {
        if !index.processes.contains_key(p) {
            errors.push(ConfigError::UnknownProcess(p.clone()));
        }
    }
    for q in r.input_queues.iter().chain(r.output_queues.iter()) {
        if !index.queues.contains_key(q) {
            errors.push(ConfigError::UnknownQueue(q.clone()));
        }
    }
    if r.kind == ResourceKindConfig::Production {
        if r.input_queues.is_empty() {
            errors.push(ConfigError::MissingInputQueue(r.id.clone()));
        }
        if r.output_queues.is_empty() {
            errors.push(ConfigError::MissingOutputQueue(r.id.clone()));
        }
    }
}

fn validate_product(p: &ProductConfig, index: &Index, errors: &mut Vec<ConfigError>) {
    if !index.processes.contains_key(&p.transport_process) {
        errors.push(ConfigError::UnknownProcess(p.transport_process.clone()));
    }
    if let ProcessesSpecConfig::List(list) = &p.processes {
        for proc in list {
            if !index.processes.contains_key(proc) {
                errors.push(ConfigError::UnknownProcess(proc.clone()));
            }
        }
    }
    if let ProcessesSpecConfig::PetriNet(net) = &p.processes {
        for t in &net.transitions {
            if let Some(label) = &t.label {
                if !index.processes.contains_key(label) {
                    errors.push(ConfigError::UnknownProcess(label.clone()));
                }
            }
        }
    }
}

fn validate_sink(s: &SinkConfig, index: &Index, errors: &mut Vec<ConfigError>) {
    for q in &s.input_queues {
        if !index.queues.contains_key(q) {
            errors.push(ConfigError::UnknownQueue(q.clone()));
        }
    }
}

fn validate_source(s: &SourceConfig, index: &Index, errors: &mut Vec<ConfigError>) {
    if !index.time_models.contains_key(&s.time_model_id) {
        errors.push(ConfigError::UnknownTimeModel(s.time_model_id.clone()));
    }
    for q in &s.output_queues {
        if !index.queues.contains_key(q) {
            errors.push(ConfigError::UnknownQueue(q.clone()));
        }
    }
}

fn build_resource(world: &mut World, r: &ResourceConfig, index: &Index) -> ResourceId {
    let kind = match r.kind {
        ResourceKindConfig::Production => ResourceKind::Production,
        ResourceKindConfig::Transport => ResourceKind::Transport,
    };
    let location = Location::new(r.location[0], r.location[1]);
    let processes = r.process_ids.iter().map(|p| index.processes[p]).collect();
    let input_queues = r.input_queues.iter().map(|q| index.queues[q]).collect();
    let output_queues = r.output_queues.iter().map(|q| index.queues[q]).collect();
    let id = world.add_resource(kind, r.capacity, location, processes, input_queues, output_queues, r.control_policy);
    for (proc, &cap) in r.process_ids.iter().zip(r.process_capacities.iter()) {
        world.resources[id.index()].process_capacities.insert(index.processes[proc], cap);
    }
    id
}

/// How many parallel state instances a `states` entry for `process` should
/// expand into: `process_capacities[process]` if the owning resource
/// declares one, else 1 (spec.md:52 "one machine per slot per process";
/// `examples/original_source/prodsim/factories/resource_factory.py`'s
/// `adjust_process_capacities`/`register_production_states_for_processes`
/// duplicate the same way).
fn process_slot_count(world: &World, resource: ResourceId, process: ProcessId) -> usize {
    world.resources[resource.index()].process_capacities.get(&process).copied().unwrap_or(1).max(1)
}

/// Register a state and wire it onto its owning resource. `state.id` names
/// the resource that owns it via the resource's `state_ids` list, so this
/// scans every resource once per state — acceptable at config-load scale.
fn attach_state(world: &mut World, s: &StateConfig, index: &Index, resource_ids: &HashMap<String, ResourceId>, resources: &[ResourceConfig]) {
    let owner = resources
        .iter()
        .find(|r| r.state_ids.iter().any(|id| id == &s.id))
        .expect("validated config guarantees every state is owned by a resource");
    let resource = resource_ids[&owner.id];
    let time_model = index.time_models[&s.time_model_id];
    match s.kind {
        StateKindConfig::Production => {
            let process = index.processes[s.process_id.as_ref().expect("production state needs process_id")];
            for _ in 0..process_slot_count(world, resource, process) {
                world.add_process_state(resource, process, time_model, false);
            }
        }
        StateKindConfig::Transport => {
            let process = index.processes[s.process_id.as_ref().expect("transport state needs process_id")];
            for _ in 0..process_slot_count(world, resource, process) {
                world.add_process_state(resource, process, time_model, true);
            }
        }
        StateKindConfig::Setup => {
            let origin = index.processes[s.origin_setup.as_ref().expect("setup state needs origin_setup")];
            let target = index.processes[s.target_setup.as_ref().expect("setup state needs target_setup")];
            world.add_setup_state(resource, origin, target, time_model);
        }
        StateKindConfig::Breakdown => {
            let repair = index.time_models[s.repair_time_model_id.as_ref().expect("breakdown state needs repair_time_model_id")];
            world.add_breakdown_state(resource, time_model, repair);
        }
        StateKindConfig::ProcessBreakdown => {
            let repair = index.time_models[s.repair_time_model_id.as_ref().expect("process breakdown needs repair_time_model_id")];
            let process = index.processes[s.process_id.as_ref().expect("process breakdown needs process_id")];
            // One ProcessBreakdown instance per production-state instance
            // (spec §9): a process with multiple slots gets one breakdown
            // loop per slot, each scoped to just that slot.
            let target_states = world.resources[resource.index()].process_state_slots(process).to_vec();
            assert!(!target_states.is_empty(), "process breakdown scoped to a process with no matching production state");
            for target_state in target_states {
                world.add_process_breakdown_state(resource, target_state, process, time_model, repair);
            }
        }
    }
}

fn build_process_model(p: &ProductConfig, index: &Index) -> ProcessModel {
    match &p.processes {
        ProcessesSpecConfig::List(list) => ProcessModel::list(list.iter().map(|id| index.processes[id]).collect()),
        ProcessesSpecConfig::PetriNet(net) => {
            let transitions = net
                .transitions
                .iter()
                .map(|t| Transition {
                    name: t.name.clone(),
                    inputs: t.inputs.clone(),
                    outputs: t.outputs.clone(),
                    label: t.label.as_ref().map(|l| index.processes[l]),
                })
                .collect();
            ProcessModel::petri_net(PetriNet::new(net.place_count, net.initial_marking.clone(), transitions))
        }
    }
}
