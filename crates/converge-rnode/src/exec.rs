//! Action execution
//!
//! The [`Executor`] runs an action list in order against a [`ComputeApi`],
//! passing every call through the rate limiter first.

use crate::action::{Action, ActionResult, ActionType};
use crate::error::ExecError;
use async_trait::async_trait;
use converge_api::{ResourceId, Version};
use converge_ratelimit::{RateLimitKey, RateLimiter};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Error returned by the compute API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("API error {code}: {message}")]
pub struct ApiError {
    pub code: u16,
    pub message: String,
}

impl ApiError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(id: &ResourceId) -> Self {
        Self::new(404, format!("{} was not found", id))
    }

    pub fn conflict(id: &ResourceId) -> Self {
        Self::new(409, format!("{} already exists", id))
    }

    pub fn is_not_found(&self) -> bool {
        self.code == 404
    }

    pub fn is_conflict(&self) -> bool {
        self.code == 409
    }
}

/// Remote compute API.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn get(&self, id: &ResourceId, version: Version) -> Result<Value, ApiError>;

    async fn create(&self, id: &ResourceId, version: Version, body: &Value) -> Result<(), ApiError>;

    async fn update(&self, id: &ResourceId, version: Version, body: &Value) -> Result<(), ApiError>;

    async fn delete(&self, id: &ResourceId, version: Version) -> Result<(), ApiError>;
}

#[derive(Debug, Default)]
struct FakeState {
    objects: BTreeMap<ResourceId, Value>,
    calls: Vec<String>,
    failures: Vec<(String, ResourceId, ApiError)>,
    next_id: u64,
}

/// In-memory [`ComputeApi`].
#[derive(Debug, Default)]
pub struct FakeCompute {
    state: Mutex<FakeState>,
}

impl FakeCompute {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` as if it had been created remotely.
    pub async fn insert(&self, id: ResourceId, value: Value) {
        self.state.lock().await.objects.insert(id, value);
    }

    /// Fail the next `operation` ("get", "create", "update" or "delete")
    /// on `id` with `error`.
    pub async fn fail_next(&self, operation: &str, id: ResourceId, error: ApiError) {
        self.state
            .lock()
            .await
            .failures
            .push((operation.to_string(), id, error));
    }

    /// Calls received so far, as "operation resource-path".
    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    pub async fn contains(&self, id: &ResourceId) -> bool {
        self.state.lock().await.objects.contains_key(id)
    }

    async fn begin(&self, operation: &str, id: &ResourceId) -> Result<tokio::sync::MutexGuard<'_, FakeState>, ApiError> {
        let mut state = self.state.lock().await;
        state.calls.push(format!("{} {}", operation, id));
        if let Some(pos) = state
            .failures
            .iter()
            .position(|(op, target, _)| op == operation && target == id)
        {
            let (_, _, error) = state.failures.remove(pos);
            return Err(error);
        }
        Ok(state)
    }
}

#[async_trait]
impl ComputeApi for FakeCompute {
    async fn get(&self, id: &ResourceId, _version: Version) -> Result<Value, ApiError> {
        let state = self.begin("get", id).await?;
        state
            .objects
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::not_found(id))
    }

    async fn create(&self, id: &ResourceId, version: Version, body: &Value) -> Result<(), ApiError> {
        let mut state = self.begin("create", id).await?;
        if state.objects.contains_key(id) {
            return Err(ApiError::conflict(id));
        }
        state.next_id += 1;
        let mut stored = body.clone();
        if let Value::Object(fields) = &mut stored {
            fields.insert("selfLink".into(), Value::String(id.self_link(version)));
            fields.insert("id".into(), Value::String(state.next_id.to_string()));
        }
        state.objects.insert(id.clone(), stored);
        Ok(())
    }

    async fn update(&self, id: &ResourceId, _version: Version, body: &Value) -> Result<(), ApiError> {
        let mut state = self.begin("update", id).await?;
        let current = state
            .objects
            .get_mut(id)
            .ok_or_else(|| ApiError::not_found(id))?;
        let mut stored = body.clone();
        if let (Value::Object(fields), Value::Object(old)) = (&mut stored, &*current) {
            for key in ["selfLink", "id"] {
                if let Some(v) = old.get(key) {
                    fields.insert(key.into(), v.clone());
                }
            }
        }
        *current = stored;
        Ok(())
    }

    async fn delete(&self, id: &ResourceId, _version: Version) -> Result<(), ApiError> {
        let mut state = self.begin("delete", id).await?;
        state
            .objects
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found(id))
    }
}

/// Runs actions against the compute API under rate limiting.
pub struct Executor {
    api: Arc<dyn ComputeApi>,
    limiter: Arc<dyn RateLimiter>,
    cancel: CancellationToken,
}

impl Executor {
    pub fn new(api: Arc<dyn ComputeApi>, limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            api,
            limiter,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute `actions` in order, stopping at the first failure.
    pub async fn execute(&self, actions: &[Action]) -> Result<Vec<ActionResult>, ExecError> {
        let mut completed = Vec::with_capacity(actions.len());

        for (index, action) in actions.iter().enumerate() {
            if action.action_type == ActionType::NoOp {
                completed.push(ActionResult {
                    action_id: action.id.clone(),
                    action_type: action.action_type,
                    message: "no changes".to_string(),
                });
                continue;
            }

            let key = RateLimitKey::new(
                &action.resource.project,
                &action.service,
                action.api_operation(),
                action.version.to_string(),
            );
            if let Err(source) = self.limiter.accept(&self.cancel, &key).await {
                return Err(ExecError::RateLimited {
                    index,
                    action: Box::new(action.clone()),
                    completed,
                    source,
                });
            }

            let outcome = self.call(action).await;
            self.limiter.observe(
                &key,
                outcome
                    .as_ref()
                    .err()
                    .map(|e| e as &(dyn std::error::Error + 'static)),
            );

            let message = match outcome {
                Ok(()) => {
                    tracing::info!(action = %action, "action completed");
                    format!("{} {}", action.action_type, action.resource)
                }
                Err(err) if action.action_type == ActionType::Delete && err.is_not_found() => {
                    tracing::warn!(resource = %action.resource, "delete target already gone");
                    format!("{} already deleted", action.resource)
                }
                Err(source) => {
                    tracing::error!(action = %action, error = %source, "action failed");
                    return Err(ExecError::ActionFailed {
                        index,
                        action: Box::new(action.clone()),
                        completed,
                        source,
                    });
                }
            };
            completed.push(ActionResult {
                action_id: action.id.clone(),
                action_type: action.action_type,
                message,
            });
        }

        Ok(completed)
    }

    async fn call(&self, action: &Action) -> Result<(), ApiError> {
        let empty = Value::Object(Default::default());
        let body = action.payload.as_ref().unwrap_or(&empty);
        match action.action_type {
            ActionType::Create => self.api.create(&action.resource, action.version, body).await,
            ActionType::Update => self.api.update(&action.resource, action.version, body).await,
            ActionType::Delete => self.api.delete(&action.resource, action.version).await,
            ActionType::NoOp => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_api::Key;
    use converge_ratelimit::NopRateLimiter;
    use serde_json::json;

    fn hc_id(name: &str) -> ResourceId {
        ResourceId::new("proj-1", "healthChecks", Key::global(name))
    }

    #[tokio::test]
    async fn test_fake_compute() {
        let api = FakeCompute::new();
        let id = hc_id("hc-1");
        api.create(&id, Version::Ga, &json!({"name": "hc-1"})).await.unwrap();
        let err = api.create(&id, Version::Ga, &json!({})).await.unwrap_err();
        assert!(err.is_conflict());

        let got = api.get(&id, Version::Ga).await.unwrap();
        assert_eq!(got["selfLink"], id.self_link(Version::Ga));

        api.delete(&id, Version::Ga).await.unwrap();
        assert!(api.delete(&id, Version::Ga).await.unwrap_err().is_not_found());
        assert_eq!(api.calls().await.len(), 5);
    }

    #[tokio::test]
    async fn test_delete_not_found_is_tolerated() {
        let api = Arc::new(FakeCompute::new());
        let exec = Executor::new(api.clone(), Arc::new(NopRateLimiter));
        let id = hc_id("hc-1");
        let actions = vec![
            Action::delete(&id, "HealthChecks"),
            Action::create(&id, "HealthChecks", Version::Ga, json!({"name": "hc-1"})),
        ];
        let results = exec.execute(&actions).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].message.contains("already deleted"));
        assert!(api.contains(&id).await);
    }

    #[tokio::test]
    async fn test_failure_stops_sequence() {
        let api = Arc::new(FakeCompute::new());
        let exec = Executor::new(api.clone(), Arc::new(NopRateLimiter));
        let a = hc_id("hc-a");
        let b = hc_id("hc-b");
        api.fail_next("create", b.clone(), ApiError::new(503, "backend error"))
            .await;

        let actions = vec![
            Action::create(&a, "HealthChecks", Version::Ga, json!({"name": "hc-a"})),
            Action::create(&b, "HealthChecks", Version::Ga, json!({"name": "hc-b"})),
            Action::noop(&a, "HealthChecks"),
        ];
        match exec.execute(&actions).await {
            Err(ExecError::ActionFailed {
                index,
                completed,
                source,
                ..
            }) => {
                assert_eq!(index, 1);
                assert_eq!(completed.len(), 1);
                assert_eq!(source.code, 503);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(api.contains(&a).await);
        assert!(!api.contains(&b).await);
    }

    #[tokio::test]
    async fn test_cancelled_limiter() {
        let api = Arc::new(FakeCompute::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let exec = Executor::new(api.clone(), Arc::new(NopRateLimiter)).with_cancel(cancel);
        let id = hc_id("hc-1");
        let result = exec
            .execute(&[Action::create(&id, "HealthChecks", Version::Ga, json!({}))])
            .await;
        assert!(matches!(result, Err(ExecError::RateLimited { index: 0, .. })));
        assert!(api.calls().await.is_empty());
    }
}
