//! Node and executor error types

use crate::action::{Action, ActionResult};
use crate::plan::Operation;
use converge_api::{ResourceError, ResourceId};
use thiserror::Error;

/// Errors from planning and expanding actions.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("{id}: plan operation is unknown")]
    UnknownOperation { id: ResourceId },

    #[error("{id}: update is not supported for {resource}")]
    UpdateNotSupported { id: ResourceId, resource: &'static str },

    #[error("{id}: cannot {operation} when {side} node does not exist")]
    InconsistentPlan {
        id: ResourceId,
        operation: Operation,
        side: &'static str,
    },

    #[error("{id}: {side} node has no resource")]
    MissingResource { id: ResourceId, side: &'static str },

    #[error("{id}: compared against a node of a different kind")]
    KindMismatch { id: ResourceId },

    #[error("invalid node: {0}")]
    Build(String),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NodeError>;

/// Errors from executing an action list.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("action {index} ({action}) cancelled while waiting for rate limiter")]
    RateLimited {
        index: usize,
        action: Box<Action>,
        completed: Vec<ActionResult>,
        #[source]
        source: converge_ratelimit::RateLimitError,
    },

    #[error("action {index} ({action}) failed: {source}")]
    ActionFailed {
        index: usize,
        action: Box<Action>,
        completed: Vec<ActionResult>,
        #[source]
        source: crate::exec::ApiError,
    },

    #[error(transparent)]
    Node(#[from] NodeError),
}

impl ExecError {
    /// Results of the actions that finished before the failure.
    pub fn completed(&self) -> &[ActionResult] {
        match self {
            ExecError::RateLimited { completed, .. } | ExecError::ActionFailed { completed, .. } => {
                completed
            }
            ExecError::Node(_) => &[],
        }
    }
}
