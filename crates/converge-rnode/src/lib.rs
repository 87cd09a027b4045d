//! converge-rnode
//!
//! Resource graph nodes. A desired node is diffed against the observed
//! node into a [`Plan`], and the plan is expanded into an ordered list of
//! [`Action`]s that the [`Executor`] runs against the compute API.

pub mod action;
pub mod backendservice;
pub mod builder;
pub mod error;
pub mod exec;
pub mod healthcheck;
pub mod node;
pub mod plan;
pub mod registry;

pub use action::{Action, ActionResult, ActionSummary, ActionType};
pub use builder::Builder;
pub use error::{ExecError, NodeError, Result};
pub use exec::{ApiError, ComputeApi, Executor, FakeCompute};
pub use node::{Node, NodeKind, NodeState, Ownership, ResourceNode};
pub use plan::{Operation, Plan, PlanDetails};
pub use registry::{KindEntry, KindRegistry};
