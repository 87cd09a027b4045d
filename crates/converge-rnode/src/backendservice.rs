//! Backend service resources
//!
//! Backend services reference health checks and backend groups, and can be
//! updated in place. The update carries the fingerprint of the observed
//! resource.

use crate::action::Action;
use crate::builder::Builder;
use crate::error::Result;
use crate::node::{NodeKind, ResourceNode};
use converge_api::{
    DiffResult, FieldTraits, Key, MutableResource, Resource, ResourceId, ResourceKind, TypeTraits,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Backend {
    pub balancing_mode: String,
    pub capacity_scaler: f64,
    pub description: String,
    /// URL of an instance group or network endpoint group
    pub group: String,
    pub max_connections: i64,
    pub max_rate: i64,
    pub max_rate_per_endpoint: f64,
    pub max_utilization: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionDraining {
    pub draining_timeout_sec: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct BackendServiceLogConfig {
    pub enable: bool,
    pub sample_rate: f64,
}

/// GA shape
pub mod ga {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
    #[serde(default, rename_all = "camelCase")]
    pub struct BackendService {
        pub affinity_cookie_ttl_sec: i64,
        pub backends: Vec<Backend>,
        pub connection_draining: Option<ConnectionDraining>,
        pub creation_timestamp: String,
        pub description: String,
        #[serde(rename = "enableCDN")]
        pub enable_cdn: bool,
        pub fingerprint: String,
        pub health_checks: Vec<String>,
        pub id: String,
        pub kind: String,
        pub load_balancing_scheme: String,
        pub locality_lb_policy: String,
        pub log_config: Option<BackendServiceLogConfig>,
        pub name: String,
        pub network: String,
        pub port_name: String,
        pub protocol: String,
        pub region: String,
        pub security_policy: String,
        pub self_link: String,
        pub session_affinity: String,
        pub timeout_sec: i64,
    }
}

/// Alpha shape
pub mod alpha {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
    #[serde(default, rename_all = "camelCase")]
    pub struct BackendService {
        pub affinity_cookie_ttl_sec: i64,
        pub backends: Vec<Backend>,
        pub connection_draining: Option<ConnectionDraining>,
        pub creation_timestamp: String,
        pub description: String,
        #[serde(rename = "enableCDN")]
        pub enable_cdn: bool,
        pub fingerprint: String,
        pub health_checks: Vec<String>,
        pub id: String,
        pub ip_address_selection_policy: String,
        pub kind: String,
        pub load_balancing_scheme: String,
        pub locality_lb_policy: String,
        pub log_config: Option<BackendServiceLogConfig>,
        pub name: String,
        pub network: String,
        pub port_name: String,
        pub protocol: String,
        pub region: String,
        pub security_policy: String,
        pub self_link: String,
        pub self_link_with_id: String,
        pub session_affinity: String,
        pub timeout_sec: i64,
    }
}

/// Beta shape
pub mod beta {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
    #[serde(default, rename_all = "camelCase")]
    pub struct BackendService {
        pub affinity_cookie_ttl_sec: i64,
        pub backends: Vec<Backend>,
        pub connection_draining: Option<ConnectionDraining>,
        pub creation_timestamp: String,
        pub description: String,
        #[serde(rename = "enableCDN")]
        pub enable_cdn: bool,
        pub fingerprint: String,
        pub health_checks: Vec<String>,
        pub id: String,
        pub ip_address_selection_policy: String,
        pub kind: String,
        pub load_balancing_scheme: String,
        pub locality_lb_policy: String,
        pub log_config: Option<BackendServiceLogConfig>,
        pub name: String,
        pub network: String,
        pub port_name: String,
        pub protocol: String,
        pub region: String,
        pub security_policy: String,
        pub self_link: String,
        pub session_affinity: String,
        pub timeout_sec: i64,
    }
}

/// Backend service kind.
#[derive(Debug)]
pub struct BackendService;

impl ResourceKind for BackendService {
    type Ga = ga::BackendService;
    type Alpha = alpha::BackendService;
    type Beta = beta::BackendService;

    const RESOURCE: &'static str = "backendServices";
    const SERVICE: &'static str = "BackendServices";

    fn traits() -> TypeTraits {
        let common = FieldTraits::new()
            .output_only("creationTimestamp")
            .output_only("fingerprint")
            .output_only("id")
            .output_only("kind")
            .output_only("region")
            .output_only("selfLink")
            .non_zero("name")
            .immutable("name")
            .immutable("loadBalancingScheme")
            .immutable("network");
        TypeTraits {
            ga: common.clone(),
            alpha: common.clone().output_only("selfLinkWithId"),
            beta: common,
        }
    }
}

impl NodeKind for BackendService {
    fn out_refs(resource: &Resource<Self>) -> BTreeSet<ResourceId> {
        let bs = resource.ga();
        bs.health_checks
            .iter()
            .map(String::as_str)
            .chain(bs.backends.iter().map(|b| b.group.as_str()))
            .chain(Some(bs.security_policy.as_str()))
            .filter(|url| !url.is_empty())
            .filter_map(|url| match ResourceId::parse(url) {
                Ok(id) => Some(id),
                Err(err) => {
                    tracing::warn!(resource = %resource.id(), %err, "ignoring bad reference");
                    None
                }
            })
            .collect()
    }

    fn update_actions(
        want: &Resource<Self>,
        got: &Resource<Self>,
        diff: &DiffResult,
    ) -> Result<Vec<Action>> {
        let version = want.implied_version();
        let mut payload = want.value(version)?;
        if let Value::Object(fields) = &mut payload {
            fields.insert(
                "fingerprint".to_string(),
                Value::String(got.ga().fingerprint.clone()),
            );
        }
        Ok(vec![Action::update(
            want.id(),
            Self::SERVICE,
            version,
            payload,
            diff.clone(),
        )])
    }
}

pub type MutableBackendService = MutableResource<BackendService>;
pub type BackendServiceResource = Resource<BackendService>;
pub type BackendServiceNode = ResourceNode<BackendService>;

/// Id of the backend service `key` in `project`.
pub fn id(project: impl Into<String>, key: Key) -> ResourceId {
    ResourceId::new(project, BackendService::RESOURCE, key)
}

pub fn new_mutable(project: impl Into<String>, key: Key) -> MutableBackendService {
    MutableResource::new(project, key)
}

pub fn builder(id: ResourceId) -> Builder<BackendService> {
    Builder::new(id)
}
