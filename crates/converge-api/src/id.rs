//! Resource identity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const COMPUTE_BASE_URL: &str = "https://www.googleapis.com/compute";

/// API schema version of a resource representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Version {
    /// Baseline (GA) API
    Ga,
    Alpha,
    Beta,
}

impl Version {
    /// Version segment used in resource URLs
    pub fn url_segment(&self) -> &'static str {
        match self {
            Version::Ga => "v1",
            Version::Alpha => "alpha",
            Version::Beta => "beta",
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Ga => write!(f, "ga"),
            Version::Alpha => write!(f, "alpha"),
            Version::Beta => write!(f, "beta"),
        }
    }
}

/// Location scope of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Global,
    Regional(String),
    Zonal(String),
}

/// Name and location of a resource within a project
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    pub name: String,
    pub scope: Scope,
}

impl Key {
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Global,
        }
    }

    pub fn regional(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Regional(region.into()),
        }
    }

    pub fn zonal(name: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Zonal(zone.into()),
        }
    }

    fn location(&self) -> String {
        match &self.scope {
            Scope::Global => "global".to_string(),
            Scope::Regional(region) => format!("regions/{}", region),
            Scope::Zonal(zone) => format!("zones/{}", zone),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.location(), self.name)
    }
}

/// Fully qualified identity of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    pub project: String,
    /// Collection name, e.g. "healthChecks"
    pub resource: String,
    pub key: Key,
}

impl ResourceId {
    pub fn new(project: impl Into<String>, resource: impl Into<String>, key: Key) -> Self {
        Self {
            project: project.into(),
            resource: resource.into(),
            key,
        }
    }

    /// Relative resource path, e.g. `projects/p/global/healthChecks/hc-1`
    pub fn relative_path(&self) -> String {
        format!(
            "projects/{}/{}/{}/{}",
            self.project,
            self.key.location(),
            self.resource,
            self.key.name
        )
    }

    /// Full URL of the resource in the given API version
    pub fn self_link(&self, version: Version) -> String {
        format!(
            "{}/{}/{}",
            COMPUTE_BASE_URL,
            version.url_segment(),
            self.relative_path()
        )
    }

    /// Parse a self link or relative resource path.
    pub fn parse(s: &str) -> Result<Self, ParseIdError> {
        let err = || ParseIdError(s.to_string());
        let start = s.find("projects/").ok_or_else(err)?;
        let parts: Vec<&str> = s[start..].split('/').collect();
        match parts.as_slice() {
            ["projects", project, "global", resource, name] => Ok(Self::new(
                *project,
                *resource,
                Key::global(*name),
            )),
            ["projects", project, "regions", region, resource, name] => Ok(Self::new(
                *project,
                *resource,
                Key::regional(*name, *region),
            )),
            ["projects", project, "zones", zone, resource, name] => Ok(Self::new(
                *project,
                *resource,
                Key::zonal(*name, *zone),
            )),
            _ => Err(err()),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relative_path())
    }
}

impl FromStr for ResourceId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A string that is not a resource path
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid resource path: {0}")]
pub struct ParseIdError(pub String);
