//! Error types. Configuration problems are collected and reported to the
//! caller before a run ever starts; simulation faults are fatal and abort
//! a run in progress. See spec §7.

use thiserror::Error;

use crate::distribution::DistributionKind;
use crate::ids::{ProcessId, QueueId, ResourceId, TimeModelId};

/// A single configuration-validation failure. Callers receive a `Vec` of
/// these instead of failing fast on the first one, per spec §7
/// ("reported as a list; no partial initialization").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("time model `{0}` referenced but not defined")]
    UnknownTimeModel(String),
    #[error("queue `{0}` referenced but not defined")]
    UnknownQueue(String),
    #[error("process `{0}` referenced but not defined")]
    UnknownProcess(String),
    #[error("capability `{0}` referenced but not defined by any process")]
    UnknownCapability(String),
    #[error("resource `{resource}` declares {capacities} process_capacities but {processes} process_ids")]
    MismatchedProcessCapacities { resource: String, capacities: usize, processes: usize },
    #[error("production resource `{0}` declares no input queues")]
    MissingInputQueue(String),
    #[error("production resource `{0}` declares no output queues")]
    MissingOutputQueue(String),
    #[error("sink `{sink}` filters on unknown product type `{product_type}`")]
    UnknownProductTypeAtSink { sink: String, product_type: String },
    #[error("source `{source}` emits unknown product type `{product_type}`")]
    UnknownProductTypeAtSource { source: String, product_type: String },
    #[error("resource `{0}` must have capacity of at least 1")]
    NonPositiveCapacity(String),
    #[error("time model `{time_model}` distribution {distribution:?} needs {expected} parameter(s), got {actual}")]
    InvalidDistributionParameters { time_model: String, distribution: DistributionKind, expected: usize, actual: usize },
}

/// A fatal runtime error. Preserves the partial event log gathered so far.
#[derive(Debug, Error)]
pub enum SimulationFault {
    #[error("scheduler asked to delay by a negative amount: {0}")]
    InvalidTime(i64),
    #[error("event already triggered")]
    AlreadyTriggered,
    #[error("controller for resource {resource} was asked to run process {process} which the resource does not offer")]
    ProcessNotOffered { resource: ResourceId, process: ProcessId },
    #[error("router returned resource {0}, which is not a valid candidate for the request")]
    RouterReturnedNonCandidate(ResourceId),
    #[error("queue {0} received a put while reserved-full; transport controllers treat this as a fatal invariant violation")]
    QueueFullInvariantViolation(QueueId),
    #[error("no time model registered for id {0:?}")]
    MissingTimeModel(TimeModelId),
    #[error("state machine reached an impossible phase: {0}")]
    ImpossiblePhase(&'static str),
}
