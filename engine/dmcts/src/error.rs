//! Error types for the tree engine and simulation dispatch.

use crate::node::NodeId;
use dmcts_core::InvalidActionError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced synchronously to callers of the tree engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Tree is already initialized; use reset to discard it")]
    AlreadyInitialized,

    #[error("Tree is not initialized; call init first")]
    Uninitialized,

    #[error("Node {0} is not a child of the current root")]
    UnknownNode(NodeId),

    #[error("Build halted after {count} invalid actions (last: {last})")]
    InvalidActionLimit {
        count: u32,
        last: InvalidActionError,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Tree service has stopped")]
    ServiceStopped,
}

/// Errors from a single dispatched simulation.
///
/// Any of these drops the iteration that issued the simulation; none of them
/// is fatal to a build on its own.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Rollout hit an invalid action: {0}")]
    InvalidAction(#[from] InvalidActionError),

    #[error("Worker unavailable: {0}")]
    WorkerUnavailable(String),

    #[error("Simulation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Simulation failed: {0}")]
    Failed(String),
}

impl SimulationError {
    /// Short label used for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SimulationError::InvalidAction(_) => "invalid_action",
            SimulationError::WorkerUnavailable(_) => "worker_unavailable",
            SimulationError::Timeout(_) => "timeout",
            SimulationError::Failed(_) => "failed",
        }
    }
}
