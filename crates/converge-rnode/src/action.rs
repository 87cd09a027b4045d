//! Actions emitted by nodes

use converge_api::{DiffResult, ResourceId, Version};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single step towards the desired state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Unique identifier for the action
    pub id: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Target resource
    pub resource: ResourceId,

    /// Rate-limit category of the resource (e.g., "HealthChecks")
    pub service: String,

    /// API version the payload is expressed in
    pub version: Version,

    /// Request body for create and update
    pub payload: Option<Value>,

    /// Changed fields for update
    pub diff: Option<DiffResult>,

    /// Description of the action
    pub description: String,
}

impl Action {
    fn new(action_type: ActionType, resource: &ResourceId, service: &str, version: Version) -> Self {
        Self {
            id: format!("{}:{}", action_type, resource),
            action_type,
            resource: resource.clone(),
            service: service.to_string(),
            version,
            payload: None,
            diff: None,
            description: format!("{} {}", action_type, resource),
        }
    }

    pub fn create(resource: &ResourceId, service: &str, version: Version, payload: Value) -> Self {
        let mut action = Self::new(ActionType::Create, resource, service, version);
        action.payload = Some(payload);
        action
    }

    pub fn update(
        resource: &ResourceId,
        service: &str,
        version: Version,
        payload: Value,
        diff: DiffResult,
    ) -> Self {
        let mut action = Self::new(ActionType::Update, resource, service, version);
        action.description = format!(
            "update {} ({})",
            resource,
            diff.paths().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
        );
        action.payload = Some(payload);
        action.diff = Some(diff);
        action
    }

    pub fn delete(resource: &ResourceId, service: &str) -> Self {
        Self::new(ActionType::Delete, resource, service, Version::Ga)
    }

    pub fn noop(resource: &ResourceId, service: &str) -> Self {
        Self::new(ActionType::NoOp, resource, service, Version::Ga)
    }

    /// Name of the API operation, used for rate limiting.
    pub fn api_operation(&self) -> &'static str {
        match self.action_type {
            ActionType::Create => "Insert",
            ActionType::Update => "Update",
            ActionType::Delete => "Delete",
            ActionType::NoOp => "",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new resource
    Create,
    /// Update an existing resource
    Update,
    /// Delete a resource
    Delete,
    /// No changes needed
    NoOp,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Result of a single executed action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// ID of the action
    pub action_id: String,

    pub action_type: ActionType,

    /// Outcome message
    pub message: String,
}

/// Summary of an action list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSummary {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl ActionSummary {
    pub fn of(actions: &[Action]) -> Self {
        let count = |t: ActionType| actions.iter().filter(|a| a.action_type == t).count();
        Self {
            create: count(ActionType::Create),
            update: count(ActionType::Update),
            delete: count(ActionType::Delete),
            no_change: count(ActionType::NoOp),
        }
    }

    pub fn has_changes(&self) -> bool {
        self.create + self.update + self.delete > 0
    }
}

impl fmt::Display for ActionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to delete, {} unchanged",
            self.create, self.update, self.delete, self.no_change
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_api::Key;

    #[test]
    fn test_summary() {
        let id = ResourceId::new("p", "healthChecks", Key::global("hc-1"));
        let actions = vec![
            Action::delete(&id, "HealthChecks"),
            Action::create(&id, "HealthChecks", Version::Ga, serde_json::json!({})),
            Action::noop(&id, "HealthChecks"),
        ];
        let summary = ActionSummary::of(&actions);
        assert!(summary.has_changes());
        assert_eq!(
            summary.to_string(),
            "1 to create, 0 to update, 1 to delete, 1 unchanged"
        );
        assert_eq!(actions[0].to_string(), "delete projects/p/global/healthChecks/hc-1");
        assert_eq!(actions[1].api_operation(), "Insert");
    }
}
