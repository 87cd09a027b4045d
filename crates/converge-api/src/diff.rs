//! Structural diff of serialized resources

use crate::copier::is_zero;
use crate::path::Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// How a value differs between the two sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffItemState {
    /// Set only in A
    OnlyInA,
    /// Set only in B
    OnlyInB,
    /// Set in both with different values
    Different,
}

/// One differing value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffItem {
    pub state: DiffItemState,
    pub path: Path,
    pub a: Value,
    pub b: Value,
}

/// Result of comparing two resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    pub items: Vec<DiffItem>,
}

impl DiffResult {
    pub fn has_diff(&self) -> bool {
        !self.items.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.items.iter().map(|i| &i.path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths().any(|p| p == path)
    }

    /// Merge `other` into `self`, keeping the first item per path.
    pub fn merge(&mut self, other: DiffResult) {
        let seen: BTreeSet<Path> = self.paths().cloned().collect();
        self.items
            .extend(other.items.into_iter().filter(|i| !seen.contains(&i.path)));
    }
}

impl fmt::Display for DiffResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            match item.state {
                DiffItemState::OnlyInA => writeln!(f, "- {}: {}", item.path, item.a)?,
                DiffItemState::OnlyInB => writeln!(f, "+ {}: {}", item.path, item.b)?,
                DiffItemState::Different => {
                    writeln!(f, "~ {}: {} -> {}", item.path, item.a, item.b)?
                }
            }
        }
        Ok(())
    }
}

/// Compare `a` and `b`, skipping paths for which `ignore` returns true.
///
/// Zero values and absent values compare equal.
pub fn diff_values(a: &Value, b: &Value, ignore: &dyn Fn(&Path) -> bool) -> DiffResult {
    let mut result = DiffResult::default();
    diff_at(&Path::root(), a, b, ignore, &mut result);
    result
}

fn diff_at(path: &Path, a: &Value, b: &Value, ignore: &dyn Fn(&Path) -> bool, out: &mut DiffResult) {
    if ignore(path) {
        return;
    }
    let empty_object = Value::Object(Default::default());
    let empty_array = Value::Array(Vec::new());
    // A container missing on one side is compared against an empty one so
    // the items name leaf fields.
    let (a, b) = match (a, b) {
        (Value::Object(_), Value::Null) => (a, &empty_object),
        (Value::Null, Value::Object(_)) => (&empty_object, b),
        (Value::Array(_), Value::Null) => (a, &empty_array),
        (Value::Null, Value::Array(_)) => (&empty_array, b),
        _ => (a, b),
    };
    match (a, b) {
        (Value::Object(ma), Value::Object(mb)) => {
            let keys: BTreeSet<&String> = ma.keys().chain(mb.keys()).collect();
            for key in keys {
                diff_at(
                    &path.field(key.clone()),
                    ma.get(key).unwrap_or(&Value::Null),
                    mb.get(key).unwrap_or(&Value::Null),
                    ignore,
                    out,
                );
            }
        }
        (Value::Array(va), Value::Array(vb)) => {
            for i in 0..va.len().max(vb.len()) {
                diff_at(
                    &path.index(i),
                    va.get(i).unwrap_or(&Value::Null),
                    vb.get(i).unwrap_or(&Value::Null),
                    ignore,
                    out,
                );
            }
        }
        _ if a == b => {}
        _ if is_zero(a) && is_zero(b) => {}
        _ => {
            let state = if is_zero(b) {
                DiffItemState::OnlyInA
            } else if is_zero(a) {
                DiffItemState::OnlyInB
            } else {
                DiffItemState::Different
            };
            out.items.push(DiffItem {
                state,
                path: path.clone(),
                a: a.clone(),
                b: b.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical() {
        let v = json!({"name": "a", "ports": [1, 2], "tcp": {"port": 80}});
        assert!(!diff_values(&v, &v, &|_| false).has_diff());
    }

    #[test]
    fn test_zero_equals_absent() {
        let a = json!({"name": "a", "description": ""});
        let b = json!({"name": "a", "tcp": null});
        assert!(!diff_values(&a, &b, &|_| false).has_diff());
    }

    #[test]
    fn test_nested_and_states() {
        let a = json!({"interval": 7, "tcp": {"port": 80}, "ports": [1]});
        let b = json!({"interval": 100, "udp": {"port": 60}, "ports": [1, 2]});
        let d = diff_values(&a, &b, &|_| false);
        let got: Vec<(String, DiffItemState)> =
            d.items.iter().map(|i| (i.path.to_string(), i.state)).collect();
        assert_eq!(
            got,
            vec![
                (".interval".to_string(), DiffItemState::Different),
                (".ports[1]".to_string(), DiffItemState::OnlyInB),
                (".tcp.port".to_string(), DiffItemState::OnlyInA),
                (".udp.port".to_string(), DiffItemState::OnlyInB),
            ]
        );
    }

    #[test]
    fn test_one_sided_subtree_is_ignored_by_nested_path() {
        let a = json!({"name": "a"});
        let b = json!({"name": "a", "log": {"enable": true, "stamp": "t1"}, "backends": [{"group": "g", "id": "7"}]});
        let skip = |p: &Path| {
            *p == Path::root().field("log").field("stamp")
                || *p == Path::root().field("backends").index(0).field("id")
        };
        let paths: Vec<String> = diff_values(&a, &b, &skip)
            .paths()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(paths, vec![".backends[0].group", ".log.enable"]);
    }

    #[test]
    fn test_ignore() {
        let a = json!({"selfLink": "x", "name": "a"});
        let b = json!({"selfLink": "y", "name": "a"});
        let ignore_self_link = |p: &Path| *p == Path::root().field("selfLink");
        assert!(!diff_values(&a, &b, &ignore_self_link).has_diff());
    }

    #[test]
    fn test_merge_dedupes() {
        let mut d1 = diff_values(&json!({"a": 1}), &json!({"a": 2}), &|_| false);
        let d2 = diff_values(&json!({"a": 1, "b": 1}), &json!({"a": 2}), &|_| false);
        d1.merge(d2);
        assert_eq!(d1.items.len(), 2);
    }
}
