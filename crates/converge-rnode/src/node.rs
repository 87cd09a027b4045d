//! Resource nodes
//!
//! A node pairs a resource with its ownership and existence. Comparing a
//! desired node with an observed one yields a [`PlanDetails`]; the plan in
//! effect is then expanded into [`Action`]s.

use crate::action::Action;
use crate::error::{NodeError, Result};
use crate::plan::{Operation, Plan, PlanDetails};
use converge_api::{DiffResult, Resource, ResourceId, ResourceKind};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;

/// Whether the resource is under our control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    #[default]
    Managed,
    /// Referenced but never changed
    Unmanaged,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    #[default]
    Exists,
    DoesNotExist,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Exists => write!(f, "exists"),
            NodeState::DoesNotExist => write!(f, "does not exist"),
        }
    }
}

/// Per-kind behaviour of nodes.
pub trait NodeKind: ResourceKind + Sized {
    /// Resources this resource points at.
    fn out_refs(_resource: &Resource<Self>) -> BTreeSet<ResourceId> {
        BTreeSet::new()
    }

    /// Actions that update `got` in place to match `want`.
    fn update_actions(
        want: &Resource<Self>,
        _got: &Resource<Self>,
        _diff: &DiffResult,
    ) -> Result<Vec<Action>> {
        Err(NodeError::UpdateNotSupported {
            id: want.id().clone(),
            resource: Self::RESOURCE,
        })
    }
}

/// A resource in the graph, independent of its kind.
pub trait Node: Send + Sync + fmt::Debug {
    fn id(&self) -> &ResourceId;

    /// Rate-limit category of the resource kind.
    fn service(&self) -> &'static str;

    fn ownership(&self) -> Ownership;

    fn state(&self) -> NodeState;

    fn out_refs(&self) -> BTreeSet<ResourceId>;

    fn plan(&self) -> &Plan;

    fn plan_mut(&mut self) -> &mut Plan;

    /// Decide what turns `got` into `self`.
    fn diff(&self, got: &dyn Node) -> Result<PlanDetails>;

    /// Expand the plan in effect into actions against `got`.
    fn actions(&self, got: &dyn Node) -> Result<Vec<Action>>;

    fn as_any(&self) -> &dyn Any;

    /// Diff against `got` and record the result as the plan in effect.
    fn update_plan(&mut self, got: &dyn Node) -> Result<Operation> {
        let details = self.diff(got)?;
        let op = details.operation;
        self.plan_mut().set(details);
        Ok(op)
    }
}

/// Node holding a resource of kind `K`.
pub struct ResourceNode<K: NodeKind> {
    pub(crate) id: ResourceId,
    pub(crate) ownership: Ownership,
    pub(crate) state: NodeState,
    pub(crate) resource: Option<Resource<K>>,
    pub(crate) plan: Plan,
}

impl<K: NodeKind> Clone for ResourceNode<K> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            ownership: self.ownership,
            state: self.state,
            resource: self.resource.clone(),
            plan: self.plan.clone(),
        }
    }
}

impl<K: NodeKind> fmt::Debug for ResourceNode<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceNode")
            .field("id", &self.id)
            .field("ownership", &self.ownership)
            .field("state", &self.state)
            .field("resource", &self.resource)
            .field("plan", &self.plan.op())
            .finish()
    }
}

impl<K: NodeKind> ResourceNode<K> {
    pub fn resource(&self) -> Option<&Resource<K>> {
        self.resource.as_ref()
    }

    fn downcast<'a>(&self, got: &'a dyn Node) -> Result<&'a ResourceNode<K>> {
        got.as_any()
            .downcast_ref::<ResourceNode<K>>()
            .ok_or_else(|| NodeError::KindMismatch {
                id: self.id.clone(),
            })
    }

    fn want_resource(&self) -> Result<&Resource<K>> {
        self.resource.as_ref().ok_or_else(|| NodeError::MissingResource {
            id: self.id.clone(),
            side: "desired",
        })
    }

    fn both_exist(&self, got: &ResourceNode<K>, operation: Operation) -> Result<()> {
        let side = match (self.state, got.state) {
            (NodeState::DoesNotExist, _) => "desired",
            (_, NodeState::DoesNotExist) => "observed",
            _ => return Ok(()),
        };
        Err(NodeError::InconsistentPlan {
            id: self.id.clone(),
            operation,
            side,
        })
    }

    fn create_action(&self) -> Result<Action> {
        let resource = self.want_resource()?;
        let version = resource.implied_version();
        Ok(Action::create(
            &self.id,
            K::SERVICE,
            version,
            resource.value(version)?,
        ))
    }
}

impl<K: NodeKind> Node for ResourceNode<K> {
    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn service(&self) -> &'static str {
        K::SERVICE
    }

    fn ownership(&self) -> Ownership {
        self.ownership
    }

    fn state(&self) -> NodeState {
        self.state
    }

    fn out_refs(&self) -> BTreeSet<ResourceId> {
        self.resource.as_ref().map(K::out_refs).unwrap_or_default()
    }

    fn plan(&self) -> &Plan {
        &self.plan
    }

    fn plan_mut(&mut self) -> &mut Plan {
        &mut self.plan
    }

    fn diff(&self, got: &dyn Node) -> Result<PlanDetails> {
        let got = self.downcast(got)?;

        let details = if self.ownership == Ownership::Unmanaged {
            PlanDetails::new(Operation::Nothing, "node is not managed")
        } else {
            match (self.state, got.state) {
                (NodeState::DoesNotExist, NodeState::DoesNotExist) => {
                    PlanDetails::new(Operation::Nothing, "node does not exist and is not wanted")
                }
                (NodeState::Exists, NodeState::DoesNotExist) => {
                    PlanDetails::new(Operation::Create, "node does not exist")
                }
                (NodeState::DoesNotExist, NodeState::Exists) => {
                    PlanDetails::new(Operation::Delete, "node exists but is not wanted")
                }
                (NodeState::Exists, NodeState::Exists) => {
                    let want = self.want_resource()?;
                    let have = got.resource.as_ref().ok_or_else(|| NodeError::MissingResource {
                        id: self.id.clone(),
                        side: "observed",
                    })?;
                    let diff = want.diff(have)?;
                    let traits = want.traits();
                    let immutable = diff
                        .paths()
                        .find(|p| {
                            traits.ga.is_immutable(p)
                                || traits.alpha.is_immutable(p)
                                || traits.beta.is_immutable(p)
                        })
                        .map(|p| p.to_string());
                    match immutable {
                        _ if !diff.has_diff() => {
                            PlanDetails::new(Operation::Nothing, "no diff between got and want")
                        }
                        Some(path) => {
                            let why = format!("immutable field {} changed", path);
                            PlanDetails::new(Operation::Recreate, why).with_diff(diff)
                        }
                        None => PlanDetails::new(Operation::Update, "fields differ").with_diff(diff),
                    }
                }
            }
        };

        tracing::debug!(
            id = %self.id,
            operation = %details.operation,
            why = %details.why,
            "planned node"
        );
        Ok(details)
    }

    fn actions(&self, got: &dyn Node) -> Result<Vec<Action>> {
        let got = self.downcast(got)?;
        let op = self.plan.op();
        match op {
            Operation::Unknown => Err(NodeError::UnknownOperation {
                id: self.id.clone(),
            }),
            Operation::Nothing => Ok(vec![Action::noop(&self.id, K::SERVICE)]),
            Operation::Create => Ok(vec![self.create_action()?]),
            Operation::Delete => Ok(vec![Action::delete(&self.id, K::SERVICE)]),
            Operation::Recreate => {
                self.both_exist(got, op)?;
                Ok(vec![Action::delete(&self.id, K::SERVICE), self.create_action()?])
            }
            Operation::Update => {
                self.both_exist(got, op)?;
                let want = self.want_resource()?;
                let have = got.resource.as_ref().ok_or_else(|| NodeError::MissingResource {
                    id: self.id.clone(),
                    side: "observed",
                })?;
                let diff = match self.plan.details().and_then(|d| d.diff.clone()) {
                    Some(diff) => diff,
                    None => want.diff(have)?,
                };
                K::update_actions(want, have, &diff)
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use converge_api::{FieldTraits, Key, MutableResource, TypeTraits};
    use schemars::JsonSchema;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
    #[serde(default, rename_all = "camelCase")]
    struct Log {
        enable: bool,
        sample_rate: f64,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
    #[serde(default, rename_all = "camelCase")]
    struct Router {
        name: String,
        log_config: Option<Log>,
        self_link: String,
    }

    struct RouterKind;

    impl ResourceKind for RouterKind {
        type Ga = Router;
        type Alpha = Router;
        type Beta = Router;
        const RESOURCE: &'static str = "routers";
        const SERVICE: &'static str = "Routers";

        fn traits() -> TypeTraits {
            TypeTraits::uniform(
                FieldTraits::new()
                    .output_only("selfLink")
                    .non_zero("name")
                    .immutable("logConfig.enable"),
            )
        }
    }

    impl NodeKind for RouterKind {}

    fn router(log_config: Option<Log>) -> ResourceNode<RouterKind> {
        let mut m = MutableResource::<RouterKind>::new("proj-1", Key::global("r-1"));
        m.set(&Router {
            name: "r-1".into(),
            log_config,
            ..Default::default()
        })
        .unwrap();
        Builder::with_resource(m.freeze().unwrap()).build().unwrap()
    }

    #[test]
    fn test_nested_immutable_set_from_nothing_recreates() {
        let want = router(Some(Log {
            enable: true,
            ..Default::default()
        }));
        let got = router(None);

        let plan = want.diff(&got).unwrap();
        assert_eq!(plan.operation, Operation::Recreate);
        assert!(plan.why.contains(".logConfig.enable"));
    }

    #[test]
    fn test_mutable_sibling_of_immutable_field_updates() {
        let want = router(Some(Log {
            sample_rate: 0.5,
            ..Default::default()
        }));
        let got = router(None);

        let plan = want.diff(&got).unwrap();
        assert_eq!(plan.operation, Operation::Update);
        let paths: Vec<String> = plan.diff.unwrap().paths().map(|p| p.to_string()).collect();
        assert_eq!(paths, vec![".logConfig.sampleRate"]);
    }
}
