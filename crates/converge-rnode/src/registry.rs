//! Registry of resource kinds
//!
//! Kinds are checked once when registered: the three shapes must be
//! synchronizable and every field trait must name a real field. A kind
//! that fails the check is never usable.

use crate::backendservice::BackendService;
use crate::builder::Builder;
use crate::error::Result;
use crate::healthcheck::HealthCheck;
use crate::node::{Node, NodeKind, NodeState};
use converge_api::{MutableResource, Resource, ResourceId, SchemaError, Version, check_kind};
use serde_json::Value;
use std::collections::BTreeMap;

/// Type-erased constructors for the nodes of one kind.
#[derive(Debug, Clone, Copy)]
pub struct KindEntry {
    pub resource: &'static str,
    pub service: &'static str,
    desired: fn(ResourceId, Value) -> Result<Box<dyn Node>>,
    observed: fn(ResourceId, Version, Value) -> Result<Box<dyn Node>>,
    absent: fn(ResourceId) -> Result<Box<dyn Node>>,
}

impl KindEntry {
    /// Managed node built from a GA value, with field traits enforced.
    pub fn desired(&self, id: ResourceId, value: Value) -> Result<Box<dyn Node>> {
        (self.desired)(id, value)
    }

    /// Node built from a value read from the API.
    pub fn observed(&self, id: ResourceId, version: Version, value: Value) -> Result<Box<dyn Node>> {
        (self.observed)(id, version, value)
    }

    /// Node for a resource that does not exist.
    pub fn absent(&self, id: ResourceId) -> Result<Box<dyn Node>> {
        (self.absent)(id)
    }
}

fn desired_node<K: NodeKind>(id: ResourceId, value: Value) -> Result<Box<dyn Node>> {
    let ga: K::Ga = serde_json::from_value(value)?;
    let mut resource = MutableResource::<K>::new(id.project, id.key);
    resource.set(&ga)?;
    Ok(Box::new(Builder::with_resource(resource.freeze()?).build()?))
}

fn observed_node<K: NodeKind>(id: ResourceId, version: Version, value: Value) -> Result<Box<dyn Node>> {
    let resource = Resource::<K>::from_remote(id, version, value)?;
    Ok(Box::new(Builder::with_resource(resource).build()?))
}

fn absent_node<K: NodeKind>(id: ResourceId) -> Result<Box<dyn Node>> {
    let mut builder = Builder::<K>::new(id);
    builder.set_state(NodeState::DoesNotExist);
    Ok(Box::new(builder.build()?))
}

#[derive(Debug, Default)]
pub struct KindRegistry {
    kinds: BTreeMap<&'static str, KindEntry>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every kind this crate implements.
    pub fn builtin() -> std::result::Result<Self, SchemaError> {
        let mut registry = Self::new();
        registry.register::<HealthCheck>()?;
        registry.register::<BackendService>()?;
        Ok(registry)
    }

    pub fn register<K: NodeKind>(&mut self) -> std::result::Result<(), SchemaError> {
        check_kind::<K>()?;
        tracing::debug!(resource = K::RESOURCE, "registered resource kind");
        self.kinds.insert(
            K::RESOURCE,
            KindEntry {
                resource: K::RESOURCE,
                service: K::SERVICE,
                desired: desired_node::<K>,
                observed: observed_node::<K>,
                absent: absent_node::<K>,
            },
        );
        Ok(())
    }

    /// Look a kind up by collection or service name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&KindEntry> {
        self.kinds.values().find(|entry| {
            entry.resource.eq_ignore_ascii_case(name) || entry.service.eq_ignore_ascii_case(name)
        })
    }

    pub fn kinds(&self) -> impl Iterator<Item = &KindEntry> {
        self.kinds.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Operation;
    use converge_api::Key;
    use serde_json::json;

    #[test]
    fn test_builtin() {
        let registry = KindRegistry::builtin().unwrap();
        assert_eq!(registry.kinds().count(), 2);
        assert_eq!(registry.get("healthchecks").unwrap().service, "HealthChecks");
        assert_eq!(registry.get("BackendServices").unwrap().resource, "backendServices");
        assert!(registry.get("meshes").is_none());
    }

    #[test]
    fn test_entry_constructors() {
        let registry = KindRegistry::builtin().unwrap();
        let kind = registry.get("healthChecks").unwrap();
        let id = ResourceId::new("proj-1", "healthChecks", Key::global("hc-1"));
        let hc = json!({
            "name": "hc-1",
            "checkIntervalSec": 7,
            "healthyThreshold": 10,
            "timeoutSec": 5,
            "type": "TCP",
            "unhealthyThreshold": 4
        });

        let want = kind.desired(id.clone(), hc.clone()).unwrap();
        let absent = kind.absent(id.clone()).unwrap();
        assert_eq!(want.diff(&*absent).unwrap().operation, Operation::Create);

        let mut observed = hc;
        observed["selfLink"] = json!("https://www.googleapis.com/compute/v1/projects/proj-1/global/healthChecks/hc-1");
        let got = kind.observed(id.clone(), Version::Ga, observed).unwrap();
        assert_eq!(want.diff(&*got).unwrap().operation, Operation::Nothing);

        // Missing required fields are rejected for desired nodes.
        assert!(kind.desired(id, json!({"name": "hc-1"})).is_err());
    }
}
