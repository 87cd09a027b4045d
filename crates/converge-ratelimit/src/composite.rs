//! Per-category rate limiter composition

use crate::error::Result;
use crate::limiter::{RateLimitKey, RateLimiter};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Routes each call to the limiter registered for its service and
/// operation.
///
/// Lookup order is `(service, operation)`, then `(service, "")`, then the
/// default limiter. Limiters registered for several categories share one
/// quota.
#[derive(Debug)]
pub struct CompositeRateLimiter {
    default: Arc<dyn RateLimiter>,
    /// service -> operation -> limiter
    limiters: BTreeMap<String, BTreeMap<String, Arc<dyn RateLimiter>>>,
}

impl CompositeRateLimiter {
    pub fn new(default: Arc<dyn RateLimiter>) -> Self {
        Self {
            default,
            limiters: BTreeMap::new(),
        }
    }

    /// Register `limiter` for `service`; an empty `operation` matches every
    /// operation of the service. Re-registering replaces the previous entry.
    pub fn register(
        &mut self,
        service: impl Into<String>,
        operation: impl Into<String>,
        limiter: Arc<dyn RateLimiter>,
    ) {
        let service = service.into();
        let operation = operation.into();
        tracing::debug!(%service, %operation, ?limiter, "registered rate limiter");
        self.limiters
            .entry(service)
            .or_default()
            .insert(operation, limiter);
    }

    /// The limiter that applies to `key`.
    pub fn limiter_for(&self, key: &RateLimitKey) -> &Arc<dyn RateLimiter> {
        self.limiters
            .get(key.service.as_str())
            .and_then(|ops| ops.get(key.operation.as_str()).or_else(|| ops.get("")))
            .unwrap_or(&self.default)
    }

    pub fn default_limiter(&self) -> &Arc<dyn RateLimiter> {
        &self.default
    }

    /// Registered entries as `(service, operation, limiter)`, sorted.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &Arc<dyn RateLimiter>)> {
        self.limiters.iter().flat_map(|(service, ops)| {
            ops.iter()
                .map(move |(operation, limiter)| (service.as_str(), operation.as_str(), limiter))
        })
    }
}

#[async_trait]
impl RateLimiter for CompositeRateLimiter {
    async fn accept(&self, cancel: &CancellationToken, key: &RateLimitKey) -> Result<()> {
        self.limiter_for(key).accept(cancel, key).await
    }

    fn observe(&self, key: &RateLimitKey, error: Option<&(dyn std::error::Error + 'static)>) {
        self.limiter_for(key).observe(key, error);
    }
}
