//! Rate limit configuration
//!
//! Limits are described in KDL:
//!
//! ```kdl
//! default minimum="50ms"
//! limiter "compute" limit=1300 interval="1m"
//! limiter "operations" wraps="compute" minimum="100ms"
//! register "HealthChecks" limiter="compute"
//! register "Operations" operation="Get" limiter="operations"
//! ```
//!
//! Named limiters are shared: every registration that names the same
//! limiter draws from the same quota.

use crate::composite::CompositeRateLimiter;
use crate::error::{RateLimitError, Result};
use crate::limiter::{MinimumRateLimiter, NopRateLimiter, RateLimiter, TickerRateLimiter};
use kdl::{KdlDocument, KdlNode};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "CONVERGE_RATE_LIMITS";

/// Default file name looked up in the working and config directories.
pub const CONFIG_FILE: &str = "rate-limits.kdl";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LimiterSpec {
    Nop,
    Ticker {
        limit: u32,
        interval: Duration,
        minimum: Option<Duration>,
    },
    Minimum {
        wraps: Option<String>,
        minimum: Duration,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedLimiter {
    pub name: String,
    pub spec: LimiterSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub service: String,
    /// Empty matches every operation
    pub operation: String,
    pub limiter: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Limiter for calls no registration matches
    pub default: Option<LimiterSpec>,
    pub limiters: Vec<NamedLimiter>,
    pub registrations: Vec<Registration>,
}

impl RateLimitConfig {
    /// Quotas used when no configuration file is present.
    pub fn standard() -> Self {
        let register = |service: &str, limiter: &str| Registration {
            service: service.to_string(),
            operation: String::new(),
            limiter: limiter.to_string(),
        };
        Self {
            default: Some(LimiterSpec::Minimum {
                wraps: None,
                minimum: Duration::from_millis(50),
            }),
            limiters: vec![
                NamedLimiter {
                    name: "compute".into(),
                    spec: LimiterSpec::Ticker {
                        limit: 1300,
                        interval: Duration::from_secs(60),
                        minimum: None,
                    },
                },
                NamedLimiter {
                    name: "network-services".into(),
                    spec: LimiterSpec::Ticker {
                        limit: 1000,
                        interval: Duration::from_secs(60),
                        minimum: None,
                    },
                },
                NamedLimiter {
                    name: "operations".into(),
                    spec: LimiterSpec::Minimum {
                        wraps: Some("network-services".into()),
                        minimum: Duration::from_millis(100),
                    },
                },
            ],
            registrations: vec![
                register("HealthChecks", "compute"),
                register("BackendServices", "compute"),
                register("NetworkEndpointGroups", "compute"),
                register("TcpRoutes", "network-services"),
                register("Meshes", "network-services"),
                register("Operations", "operations"),
            ],
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let doc: KdlDocument = content.parse()?;
        let mut config = Self::default();

        for node in doc.nodes() {
            match node.name().value() {
                "default" => {
                    config.default = Some(match string_prop(node, "limiter") {
                        Some(name) => LimiterSpec::Minimum {
                            wraps: Some(name.to_string()),
                            minimum: duration_prop(node, "minimum")?.unwrap_or_default(),
                        },
                        None => parse_spec(node)?,
                    });
                }
                "limiter" => {
                    let name = first_arg(node)
                        .ok_or_else(|| RateLimitError::Config("limiter needs a name".into()))?;
                    config.limiters.push(NamedLimiter {
                        name: name.to_string(),
                        spec: parse_spec(node)?,
                    });
                }
                "register" => {
                    let service = first_arg(node).ok_or_else(|| {
                        RateLimitError::Config("register needs a service name".into())
                    })?;
                    let limiter = string_prop(node, "limiter").ok_or_else(|| {
                        RateLimitError::Config(format!("register {service}: missing limiter="))
                    })?;
                    config.registrations.push(Registration {
                        service: service.to_string(),
                        operation: string_prop(node, "operation").unwrap_or("").to_string(),
                        limiter: limiter.to_string(),
                    });
                }
                other => {
                    return Err(RateLimitError::Config(format!("unknown node: {other}")));
                }
            }
        }

        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading rate limit config");
        Self::parse(&content)
    }

    /// Load `explicit` if given, else the discovered file, else
    /// [`RateLimitConfig::standard`].
    pub fn load_or_standard(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match find_config_file() {
            Ok(path) => Self::load(&path),
            Err(RateLimitError::ConfigNotFound) => Ok(Self::standard()),
            Err(e) => Err(e),
        }
    }

    /// Instantiate the limiters and wire them into a composite.
    pub fn build(&self) -> Result<CompositeRateLimiter> {
        let mut built: HashMap<&str, Arc<dyn RateLimiter>> = HashMap::new();
        for named in &self.limiters {
            if built.contains_key(named.name.as_str()) {
                return Err(RateLimitError::Config(format!(
                    "duplicate limiter: {}",
                    named.name
                )));
            }
            let limiter = instantiate(&named.spec, &built)?;
            built.insert(&named.name, limiter);
        }

        let default = match &self.default {
            Some(spec) => instantiate(spec, &built)?,
            None => Arc::new(NopRateLimiter),
        };
        let mut composite = CompositeRateLimiter::new(default);
        for reg in &self.registrations {
            let limiter = built.get(reg.limiter.as_str()).ok_or_else(|| {
                RateLimitError::Config(format!(
                    "register {}: unknown limiter {}",
                    reg.service, reg.limiter
                ))
            })?;
            composite.register(&reg.service, &reg.operation, Arc::clone(limiter));
        }
        Ok(composite)
    }
}

fn instantiate(
    spec: &LimiterSpec,
    built: &HashMap<&str, Arc<dyn RateLimiter>>,
) -> Result<Arc<dyn RateLimiter>> {
    Ok(match spec {
        LimiterSpec::Nop => Arc::new(NopRateLimiter),
        LimiterSpec::Ticker {
            limit,
            interval,
            minimum,
        } => {
            let ticker: Arc<dyn RateLimiter> = Arc::new(TickerRateLimiter::new(*limit, *interval)?);
            match minimum {
                Some(minimum) => Arc::new(MinimumRateLimiter::new(ticker, *minimum)),
                None => ticker,
            }
        }
        LimiterSpec::Minimum { wraps, minimum } => {
            let inner = match wraps {
                Some(name) => Arc::clone(built.get(name.as_str()).ok_or_else(|| {
                    RateLimitError::Config(format!("unknown limiter to wrap: {name}"))
                })?),
                None => Arc::new(NopRateLimiter),
            };
            Arc::new(MinimumRateLimiter::new(inner, *minimum))
        }
    })
}

fn parse_spec(node: &KdlNode) -> Result<LimiterSpec> {
    let limit = node.get("limit").and_then(|v| v.as_integer());
    let interval = duration_prop(node, "interval")?;
    let minimum = duration_prop(node, "minimum")?;
    let wraps = string_prop(node, "wraps").map(|s| s.to_string());

    match (limit, interval) {
        (Some(limit), Some(interval)) => {
            if wraps.is_some() {
                return Err(RateLimitError::Config(
                    "a ticker limiter cannot wrap another limiter".into(),
                ));
            }
            let limit = u32::try_from(limit)
                .map_err(|_| RateLimitError::Config(format!("invalid limit: {limit}")))?;
            Ok(LimiterSpec::Ticker {
                limit,
                interval,
                minimum,
            })
        }
        (None, None) => Ok(match minimum {
            Some(minimum) => LimiterSpec::Minimum { wraps, minimum },
            None if wraps.is_none() => LimiterSpec::Nop,
            None => {
                return Err(RateLimitError::Config(
                    "wraps= requires minimum=".into(),
                ));
            }
        }),
        _ => Err(RateLimitError::Config(
            "limit= and interval= must be given together".into(),
        )),
    }
}

fn first_arg(node: &KdlNode) -> Option<&str> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
}

fn string_prop<'a>(node: &'a KdlNode, key: &str) -> Option<&'a str> {
    node.get(key).and_then(|v| v.as_string())
}

fn duration_prop(node: &KdlNode, key: &str) -> Result<Option<Duration>> {
    string_prop(node, key)
        .map(|raw| {
            humantime::parse_duration(raw)
                .map_err(|e| RateLimitError::Config(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}

/// Locate the rate limit file.
///
/// Search order:
/// 1. `CONVERGE_RATE_LIMITS`
/// 2. `./rate-limits.kdl`
/// 3. `<config_dir>/converge/rate-limits.kdl`
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
    }

    let local = std::env::current_dir()?.join(CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("converge").join(CONFIG_FILE);
        if global.exists() {
            return Ok(global);
        }
    }

    Err(RateLimitError::ConfigNotFound)
}
