//! Production and transport controllers (spec §4.4, §4.5): one long-lived
//! `control_loop` per resource dispatching queued requests under a policy,
//! plus one `Job` state machine per in-flight `start_job` invocation.
//!
//! Both controller flavors share this module: the resource's `kind`
//! (`ResourceKind::Production` vs `Transport`) selects which steps a job
//! goes through, rather than two parallel controller types.

use crate::error::SimulationFault;
use crate::event::Continuation;
use crate::ids::{EventId, ProcessId, ProductId, QueueId, ResourceId, StateId};
use crate::location::Location;
use crate::queue::{GetOutcome, GetPredicate, ProductToken};
use crate::resource::ResourceKind;
use crate::world::World;

pub type JobId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    Fifo,
    Lifo,
    Spt,
    SptTransport,
}

impl Policy {
    /// Reorder `requests` in place. SPT variants use a stable sort so ties
    /// preserve arrival order (spec §8 idempotence laws apply to FIFO/LIFO
    /// specifically, but stability is needed for SPT determinism too).
    fn apply(self, world: &World, requests: &mut [ProcessRequest]) {
        match self {
            Policy::Fifo => {}
            Policy::Lifo => requests.reverse(),
            Policy::Spt => requests.sort_by(|a, b| {
                let ka = world.process_expected_time(a.process, None, None);
                let kb = world.process_expected_time(b.process, None, None);
                ka.partial_cmp(&kb).expect("expected time must not be NaN")
            }),
            Policy::SptTransport => requests.sort_by(|a, b| {
                let ka = world.process_expected_time(a.process, a.origin_location, a.target_location);
                let kb = world.process_expected_time(b.process, b.origin_location, b.target_location);
                ka.partial_cmp(&kb).expect("expected time must not be NaN")
            }),
        }
    }
}

/// A request for one resource to perform `process` for `product`. Pickup
/// and dropoff queues are resolved by the caller (product / router), not
/// guessed by the controller — this keeps production and transport jobs
/// symmetric.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub process: ProcessId,
    pub product: ProductId,
    pub pickup_queue: QueueId,
    pub dropoff_queue: QueueId,
    /// Needed by transport jobs for the empty-leg check and both legs'
    /// time models; unused by production jobs.
    pub origin_location: Option<Location>,
    pub target_location: Option<Location>,
    /// Succeeded once the product token lands in `dropoff_queue`.
    pub finished_process: EventId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobPhase {
    CheckSetup,
    WaitSetup,
    PreLeg,
    WaitPreLeg,
    Pickup,
    WaitPickup,
    RunState,
    WaitState,
    Dropoff,
    Done,
}

struct Job {
    req: ProcessRequest,
    phase: JobPhase,
    state_id: Option<StateId>,
    token: Option<ProductToken>,
    /// Fires when this job has fully completed; the control loop prunes
    /// `running_jobs` by checking this, freeing the capacity slot.
    done: EventId,
}

pub struct Controller {
    pub resource: ResourceId,
    pub policy: Policy,
    pending_requests: Vec<ProcessRequest>,
    requested: EventId,
    running_jobs: Vec<JobId>,
    jobs: Vec<Option<Job>>,
}

impl Controller {
    pub fn new(resource: ResourceId, policy: Policy, requested: EventId) -> Self {
        Controller { resource, policy, pending_requests: Vec::new(), requested, running_jobs: Vec::new(), jobs: Vec::new() }
    }
}

impl World {
    /// Append a request to `resource`'s controller and wake its loop if it
    /// was idle (spec §4.4 `request`).
    pub fn submit_request(&mut self, resource: ResourceId, req: ProcessRequest) -> Result<(), SimulationFault> {
        self.resources[resource.index()].controller.pending_requests.push(req);
        let requested = self.resources[resource.index()].controller.requested;
        if !self.event_triggered(requested) {
            self.succeed(requested)?;
        }
        Ok(())
    }

    /// Arm the control loop's first wait. Called once per resource during
    /// world assembly, like a breakdown loop's first MTBF wait.
    pub fn spawn_control_loop(&mut self, resource: ResourceId) -> Result<(), SimulationFault> {
        self.rearm_control_loop(resource)
    }

    fn rearm_control_loop(&mut self, resource: ResourceId) -> Result<(), SimulationFault> {
        let mut wait_set: Vec<EventId> = self.resources[resource.index()]
            .controller
            .running_jobs
            .iter()
            .map(|&j| self.resources[resource.index()].controller.jobs[j].as_ref().unwrap().done)
            .collect();
        wait_set.push(self.resources[resource.index()].controller.requested);
        let ev = self.any_of(wait_set);
        self.await_event(ev, Continuation::ControlLoop(resource))
    }

    pub(crate) fn resume_control_loop(&mut self, resource: ResourceId) -> Result<(), SimulationFault> {
        let requested = self.resources[resource.index()].controller.requested;
        if self.event_triggered(requested) {
            let fresh = self.event();
            self.resources[resource.index()].controller.requested = fresh;
        } else {
            let still_running: Vec<JobId> = self.resources[resource.index()]
                .controller
                .running_jobs
                .iter()
                .copied()
                .filter(|&j| !self.event_triggered(self.resources[resource.index()].controller.jobs[j].as_ref().unwrap().done))
                .collect();
            self.resources[resource.index()].controller.running_jobs = still_running;
        }

        let running = self.resources[resource.index()].controller.running_jobs.len();
        let capacity = self.resources[resource.index()].capacity;
        let pending_empty = self.resources[resource.index()].controller.pending_requests.is_empty();
        if running < capacity && !pending_empty {
            let policy = self.resources[resource.index()].controller.policy;
            let mut requests = std::mem::take(&mut self.resources[resource.index()].controller.pending_requests);
            policy.apply(self, &mut requests);
            let req = requests.remove(0);
            self.resources[resource.index()].controller.pending_requests = requests;
            let job = self.spawn_job(resource, req);
            self.resources[resource.index()].controller.running_jobs.push(job);
            self.resume_job(resource, job)?;
        }
        self.rearm_control_loop(resource)
    }

    fn spawn_job(&mut self, resource: ResourceId, req: ProcessRequest) -> JobId {
        let done = self.event();
        let job = Job { req, phase: JobPhase::CheckSetup, state_id: None, token: None, done };
        let jobs = &mut self.resources[resource.index()].controller.jobs;
        let id = jobs.len();
        jobs.push(Some(job));
        id
    }

    fn job(&self, resource: ResourceId, job: JobId) -> &Job {
        self.resources[resource.index()].controller.jobs[job].as_ref().expect("job slot must be occupied")
    }

    fn job_mut(&mut self, resource: ResourceId, job: JobId) -> &mut Job {
        self.resources[resource.index()].controller.jobs[job].as_mut().expect("job slot must be occupied")
    }

    pub(crate) fn resume_job(&mut self, resource: ResourceId, job: JobId) -> Result<(), SimulationFault> {
        match self.job(resource, job).phase {
            JobPhase::CheckSetup => self.job_check_setup(resource, job),
            JobPhase::WaitSetup => self.job_after_setup(resource, job),
            JobPhase::PreLeg => self.job_pre_leg(resource, job),
            JobPhase::WaitPreLeg => self.job_after_pre_leg(resource, job),
            JobPhase::Pickup => self.job_pickup(resource, job),
            JobPhase::WaitPickup => self.job_after_pickup(resource, job),
            JobPhase::RunState => self.job_run_state(resource, job),
            JobPhase::WaitState => self.job_after_state(resource, job),
            JobPhase::Dropoff => self.job_dropoff(resource, job),
            JobPhase::Done => Ok(()),
        }
    }

    fn job_check_setup(&mut self, resource: ResourceId, job: JobId) -> Result<(), SimulationFault> {
        if self.resources[resource.index()].kind != ResourceKind::Production {
            self.job_mut(resource, job).phase = JobPhase::PreLeg;
            return self.job_pre_leg(resource, job);
        }
        let process = self.job(resource, job).req.process;
        let current = self.resources[resource.index()].current_process;
        let needs_setup = current.is_some_and(|cur| cur != process);
        if !needs_setup {
            self.job_mut(resource, job).phase = JobPhase::Pickup;
            return self.job_pickup(resource, job);
        }
        let setup_state = self.resources[resource.index()].setup_states.get(&(current.unwrap(), process)).copied();
        match setup_state {
            Some(state) => {
                let done = self.activate_setup_state(resource, state)?;
                self.job_mut(resource, job).phase = JobPhase::WaitSetup;
                self.await_event(done, Continuation::Job { resource, job })
            }
            None => {
                // No matching setup pair: permissive zero-duration no-op
                // (spec §9 resolved design choice).
                self.resources[resource.index()].current_process = Some(process);
                self.job_mut(resource, job).phase = JobPhase::Pickup;
                self.job_pickup(resource, job)
            }
        }
    }

    fn job_after_setup(&mut self, resource: ResourceId, job: JobId) -> Result<(), SimulationFault> {
        self.job_mut(resource, job).phase = JobPhase::Pickup;
        self.job_pickup(resource, job)
    }

    fn job_pre_leg(&mut self, resource: ResourceId, job: JobId) -> Result<(), SimulationFault> {
        if self.resources[resource.index()].kind != ResourceKind::Transport {
            self.job_mut(resource, job).phase = JobPhase::Pickup;
            return self.job_pickup(resource, job);
        }
        let process = self.job(resource, job).req.process;
        let origin = self.job(resource, job).req.origin_location.expect("transport request missing origin location");
        if self.resources[resource.index()].location == origin {
            self.job_mut(resource, job).phase = JobPhase::Pickup;
            self.job_pickup(resource, job)
        } else {
            self.job_activate_leg(resource, job, process, Some(origin), JobPhase::WaitPreLeg)
        }
    }

    fn job_after_pre_leg(&mut self, resource: ResourceId, job: JobId) -> Result<(), SimulationFault> {
        self.job_mut(resource, job).phase = JobPhase::Pickup;
        self.job_pickup(resource, job)
    }

    fn job_pickup(&mut self, resource: ResourceId, job: JobId) -> Result<(), SimulationFault> {
        let queue = self.job(resource, job).req.pickup_queue;
        let predicate = GetPredicate::Product(self.job(resource, job).req.product);
        match self.queue_get(queue, predicate) {
            GetOutcome::Ready(token) => {
                self.job_mut(resource, job).token = Some(token);
                self.job_mut(resource, job).phase = JobPhase::RunState;
                self.job_run_state(resource, job)
            }
            GetOutcome::Pending(ev) => {
                self.job_mut(resource, job).phase = JobPhase::WaitPickup;
                self.await_event(ev, Continuation::Job { resource, job })
            }
        }
    }

    fn job_after_pickup(&mut self, resource: ResourceId, job: JobId) -> Result<(), SimulationFault> {
        let queue = self.job(resource, job).req.pickup_queue;
        let predicate = GetPredicate::Product(self.job(resource, job).req.product);
        let token = self.queue_take_ready(queue, predicate);
        self.job_mut(resource, job).token = Some(token);
        self.job_mut(resource, job).phase = JobPhase::RunState;
        self.job_run_state(resource, job)
    }

    fn job_run_state(&mut self, resource: ResourceId, job: JobId) -> Result<(), SimulationFault> {
        let process = self.job(resource, job).req.process;
        let is_transport = self.resources[resource.index()].kind == ResourceKind::Transport;
        let target = if is_transport {
            Some(self.job(resource, job).req.target_location.expect("transport request missing target location"))
        } else {
            None
        };
        self.job_activate_leg(resource, job, process, target, JobPhase::WaitState)
    }

    fn job_after_state(&mut self, resource: ResourceId, job: JobId) -> Result<(), SimulationFault> {
        self.job_mut(resource, job).phase = JobPhase::Dropoff;
        self.job_dropoff(resource, job)
    }

    /// Shared by the (optional) transport empty leg and the real
    /// production/loaded-transport leg: pick an idle matching state (or
    /// queue behind the first matching one's current occupant), activate
    /// it, and suspend the job on its completion.
    fn job_activate_leg(
        &mut self,
        resource: ResourceId,
        job: JobId,
        process: ProcessId,
        target: Option<Location>,
        next_phase: JobPhase,
    ) -> Result<(), SimulationFault> {
        let candidates = self.resources[resource.index()].process_state_slots(process).to_vec();
        if candidates.is_empty() {
            return Err(SimulationFault::ProcessNotOffered { resource, process });
        }
        let chosen = *candidates
            .iter()
            .find(|&&s| self.resources[resource.index()].states[s.index()].is_idle())
            .unwrap_or(&candidates[0]);
        if !self.resources[resource.index()].states[chosen.index()].is_idle() {
            let queued_on = self.resources[resource.index()].states[chosen.index()]
                .current_done_event()
                .expect("busy state must carry a done event");
            return self.await_event(queued_on, Continuation::Job { resource, job });
        }
        let product = self.job(resource, job).req.product;
        let done = self.activate_process_state(resource, chosen, product, target)?;
        self.job_mut(resource, job).state_id = Some(chosen);
        self.job_mut(resource, job).phase = next_phase;
        self.await_event(done, Continuation::Job { resource, job })
    }

    fn job_dropoff(&mut self, resource: ResourceId, job: JobId) -> Result<(), SimulationFault> {
        let queue = self.job(resource, job).req.dropoff_queue;
        let token = self.job_mut(resource, job).token.take().expect("dropoff without a picked-up token");
        self.queue_put(queue, token)?;
        let finished = self.job(resource, job).req.finished_process;
        if !self.event_triggered(finished) {
            self.succeed(finished)?;
        }
        self.job_mut(resource, job).phase = JobPhase::Done;
        let done = self.job(resource, job).done;
        if !self.event_triggered(done) {
            self.succeed(done)?;
        }
        Ok(())
    }
}
