//! Health check resources

use crate::builder::Builder;
use crate::node::{NodeKind, ResourceNode};
use converge_api::{FieldTraits, Key, MutableResource, Resource, ResourceId, ResourceKind, TypeTraits};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpHealthCheck {
    pub host: String,
    pub port: i64,
    pub port_name: String,
    pub port_specification: String,
    pub proxy_header: String,
    pub request_path: String,
    pub response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct TcpHealthCheck {
    pub port: i64,
    pub port_name: String,
    pub port_specification: String,
    pub proxy_header: String,
    pub request: String,
    pub response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct GrpcHealthCheck {
    pub grpc_service_name: String,
    pub port: i64,
    pub port_name: String,
    pub port_specification: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct LogConfig {
    pub enable: bool,
}

/// GA shape
pub mod ga {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
    #[serde(default, rename_all = "camelCase")]
    pub struct HealthCheck {
        pub check_interval_sec: i64,
        pub creation_timestamp: String,
        pub description: String,
        pub grpc_health_check: Option<GrpcHealthCheck>,
        pub healthy_threshold: i64,
        pub http2_health_check: Option<HttpHealthCheck>,
        pub http_health_check: Option<HttpHealthCheck>,
        pub https_health_check: Option<HttpHealthCheck>,
        /// uint64 encoded as a string
        pub id: String,
        pub kind: String,
        pub log_config: Option<LogConfig>,
        pub name: String,
        pub region: String,
        pub self_link: String,
        pub ssl_health_check: Option<TcpHealthCheck>,
        pub tcp_health_check: Option<TcpHealthCheck>,
        pub timeout_sec: i64,
        #[serde(rename = "type")]
        pub type_: String,
        pub unhealthy_threshold: i64,
    }
}

/// Alpha shape
pub mod alpha {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
    #[serde(default, rename_all = "camelCase")]
    pub struct UdpHealthCheck {
        pub port: i64,
        pub port_name: String,
        pub request: String,
        pub response: String,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
    #[serde(default, rename_all = "camelCase")]
    pub struct HealthCheck {
        pub check_interval_sec: i64,
        pub creation_timestamp: String,
        pub description: String,
        pub grpc_health_check: Option<GrpcHealthCheck>,
        pub healthy_threshold: i64,
        pub http2_health_check: Option<HttpHealthCheck>,
        pub http_health_check: Option<HttpHealthCheck>,
        pub https_health_check: Option<HttpHealthCheck>,
        pub id: String,
        pub kind: String,
        pub log_config: Option<LogConfig>,
        pub name: String,
        pub region: String,
        pub self_link: String,
        pub self_link_with_id: String,
        pub source_regions: Vec<String>,
        pub ssl_health_check: Option<TcpHealthCheck>,
        pub tcp_health_check: Option<TcpHealthCheck>,
        pub timeout_sec: i64,
        #[serde(rename = "type")]
        pub type_: String,
        pub udp_health_check: Option<UdpHealthCheck>,
        pub unhealthy_threshold: i64,
    }
}

/// Beta shape
pub mod beta {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
    #[serde(default, rename_all = "camelCase")]
    pub struct HealthCheck {
        pub check_interval_sec: i64,
        pub creation_timestamp: String,
        pub description: String,
        pub grpc_health_check: Option<GrpcHealthCheck>,
        pub healthy_threshold: i64,
        pub http2_health_check: Option<HttpHealthCheck>,
        pub http_health_check: Option<HttpHealthCheck>,
        pub https_health_check: Option<HttpHealthCheck>,
        pub id: String,
        pub kind: String,
        pub log_config: Option<LogConfig>,
        pub name: String,
        pub region: String,
        pub self_link: String,
        pub source_regions: Vec<String>,
        pub ssl_health_check: Option<TcpHealthCheck>,
        pub tcp_health_check: Option<TcpHealthCheck>,
        pub timeout_sec: i64,
        #[serde(rename = "type")]
        pub type_: String,
        pub unhealthy_threshold: i64,
    }
}

/// Health check kind.
#[derive(Debug)]
pub struct HealthCheck;

impl ResourceKind for HealthCheck {
    type Ga = ga::HealthCheck;
    type Alpha = alpha::HealthCheck;
    type Beta = beta::HealthCheck;

    const RESOURCE: &'static str = "healthChecks";
    const SERVICE: &'static str = "HealthChecks";

    fn traits() -> TypeTraits {
        let common = FieldTraits::new()
            .output_only("creationTimestamp")
            .output_only("id")
            .output_only("kind")
            .output_only("region")
            .output_only("selfLink")
            .non_zero("name")
            .non_zero("checkIntervalSec")
            .non_zero("healthyThreshold")
            .non_zero("timeoutSec")
            .non_zero("type")
            .non_zero("unhealthyThreshold")
            .immutable("name");
        TypeTraits {
            ga: common.clone(),
            alpha: common.clone().output_only("selfLinkWithId"),
            beta: common,
        }
    }
}

impl NodeKind for HealthCheck {}

pub type MutableHealthCheck = MutableResource<HealthCheck>;
pub type HealthCheckResource = Resource<HealthCheck>;
pub type HealthCheckNode = ResourceNode<HealthCheck>;

/// Id of the health check `key` in `project`.
pub fn id(project: impl Into<String>, key: Key) -> ResourceId {
    ResourceId::new(project, HealthCheck::RESOURCE, key)
}

pub fn new_mutable(project: impl Into<String>, key: Key) -> MutableHealthCheck {
    MutableResource::new(project, key)
}

pub fn builder(id: ResourceId) -> Builder<HealthCheck> {
    Builder::new(id)
}
