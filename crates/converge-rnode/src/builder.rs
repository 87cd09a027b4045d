//! Node builder

use crate::error::{NodeError, Result};
use crate::node::{NodeKind, NodeState, Ownership, ResourceNode};
use crate::plan::Plan;
use converge_api::{Key, Resource, ResourceId};
use std::marker::PhantomData;

pub struct Builder<K: NodeKind> {
    id: ResourceId,
    ownership: Ownership,
    state: NodeState,
    resource: Option<Resource<K>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: NodeKind> Builder<K> {
    /// Managed node that exists, without a resource yet.
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            ownership: Ownership::Managed,
            state: NodeState::Exists,
            resource: None,
            _kind: PhantomData,
        }
    }

    /// Builder for a node identified by `project` and `key`.
    pub fn for_key(project: impl Into<String>, key: Key) -> Self {
        Self::new(ResourceId::new(project, K::RESOURCE, key))
    }

    /// Managed, existing node holding `resource`.
    pub fn with_resource(resource: Resource<K>) -> Self {
        let mut builder = Self::new(resource.id().clone());
        builder.resource = Some(resource);
        builder
    }

    pub fn set_ownership(&mut self, ownership: Ownership) -> &mut Self {
        self.ownership = ownership;
        self
    }

    pub fn set_state(&mut self, state: NodeState) -> &mut Self {
        self.state = state;
        self
    }

    pub fn set_resource(&mut self, resource: Resource<K>) -> &mut Self {
        self.resource = Some(resource);
        self
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn build(&self) -> Result<ResourceNode<K>> {
        if self.id.resource != K::RESOURCE {
            return Err(NodeError::Build(format!(
                "{}: expected a {} id",
                self.id,
                K::RESOURCE
            )));
        }
        match (&self.resource, self.state) {
            (Some(resource), _) if resource.id() != &self.id => {
                return Err(NodeError::Build(format!(
                    "resource {} does not belong to node {}",
                    resource.id(),
                    self.id
                )));
            }
            (None, NodeState::Exists) => {
                return Err(NodeError::Build(format!(
                    "{}: existing node needs a resource",
                    self.id
                )));
            }
            _ => {}
        }

        Ok(ResourceNode {
            id: self.id.clone(),
            ownership: self.ownership,
            state: self.state,
            resource: self.resource.clone(),
            plan: Plan::default(),
        })
    }
}
