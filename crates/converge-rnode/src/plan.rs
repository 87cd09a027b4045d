//! Plan operations and their history

use converge_api::DiffResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What needs to happen to a resource to reach the desired state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Not yet planned
    #[default]
    Unknown,
    Nothing,
    Create,
    /// Delete, then create again
    Recreate,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Unknown => write!(f, "unknown"),
            Operation::Nothing => write!(f, "nothing"),
            Operation::Create => write!(f, "create"),
            Operation::Recreate => write!(f, "recreate"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// One planning decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDetails {
    pub operation: Operation,
    /// Human readable reason
    pub why: String,
    /// Differences that led to the decision, if any
    pub diff: Option<DiffResult>,
}

impl PlanDetails {
    pub fn new(operation: Operation, why: impl Into<String>) -> Self {
        Self {
            operation,
            why: why.into(),
            diff: None,
        }
    }

    pub fn with_diff(mut self, diff: DiffResult) -> Self {
        self.diff = Some(diff);
        self
    }
}

/// Planning history of a node; the latest entry is in effect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    history: Vec<PlanDetails>,
}

impl Plan {
    pub fn set(&mut self, details: PlanDetails) {
        self.history.push(details);
    }

    /// Latest operation, or [`Operation::Unknown`] if nothing was planned.
    pub fn op(&self) -> Operation {
        self.details().map_or(Operation::Unknown, |d| d.operation)
    }

    pub fn details(&self) -> Option<&PlanDetails> {
        self.history.last()
    }

    pub fn history(&self) -> &[PlanDetails] {
        &self.history
    }

    /// Render every decision, oldest first.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        for (i, details) in self.history.iter().enumerate() {
            out.push_str(&format!("{}: {} ({})\n", i, details.operation, details.why));
            if let Some(diff) = &details.diff {
                for line in diff.to_string().lines() {
                    out.push_str("    ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use converge_api::diff_values;
    use serde_json::json;

    #[test]
    fn test_empty_plan_is_unknown() {
        let plan = Plan::default();
        assert_eq!(plan.op(), Operation::Unknown);
        assert!(plan.details().is_none());
        assert_eq!(plan.explain(), "");
    }

    #[test]
    fn test_latest_wins_and_explain() {
        let mut plan = Plan::default();
        plan.set(PlanDetails::new(Operation::Nothing, "no diff"));
        let diff = diff_values(&json!({"port": 80}), &json!({"port": 81}), &|_| false);
        plan.set(PlanDetails::new(Operation::Update, "fields differ").with_diff(diff));

        assert_eq!(plan.op(), Operation::Update);
        assert_eq!(plan.history().len(), 2);
        assert_eq!(
            plan.explain(),
            "0: nothing (no diff)\n1: update (fields differ)\n    ~ .port: 80 -> 81\n"
        );
    }
}
