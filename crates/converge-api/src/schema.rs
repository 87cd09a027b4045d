//! Type descriptions for resource shapes
//!
//! Shapes are described by their schemars JSON schema. The synchronizer and
//! the diff walk these descriptions instead of inspecting types at runtime.

use crate::error::{SchemaError, SyncError};
use crate::path::{Path, PathPattern};
use schemars::JsonSchema;
use serde_json::{Map, Value};
use std::collections::HashSet;

static ANY: Value = Value::Bool(true);

/// The JSON schema of one resource shape.
#[derive(Debug, Clone)]
pub struct TypeSchema {
    type_name: String,
    root: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScalarKind {
    String,
    Integer,
    Number,
    Boolean,
}

#[derive(Debug, Clone)]
pub(crate) enum Shape<'a> {
    Struct {
        name: Option<&'a str>,
        props: Option<&'a Map<String, Value>>,
        required: Vec<&'a str>,
    },
    Array(&'a Value),
    Map(&'a Value),
    Scalar(ScalarKind),
    Enum(Vec<&'a Value>),
    Any,
}

#[derive(Debug, Clone)]
pub(crate) struct Resolved<'a> {
    pub(crate) shape: Shape<'a>,
    pub(crate) nullable: bool,
}

impl Shape<'_> {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Shape::Struct { .. } => "struct",
            Shape::Array(_) => "array",
            Shape::Map(_) => "map",
            Shape::Scalar(ScalarKind::String) => "string",
            Shape::Scalar(ScalarKind::Integer) => "integer",
            Shape::Scalar(ScalarKind::Number) => "number",
            Shape::Scalar(ScalarKind::Boolean) => "boolean",
            Shape::Enum(_) => "enum",
            Shape::Any => "any",
        }
    }
}

impl Resolved<'_> {
    /// The value a defaulted field of this shape serializes to.
    pub(crate) fn zero(&self) -> Value {
        if self.nullable {
            return Value::Null;
        }
        match &self.shape {
            Shape::Struct { .. } | Shape::Map(_) => Value::Object(Map::new()),
            Shape::Array(_) => Value::Array(Vec::new()),
            Shape::Scalar(ScalarKind::String) => Value::String(String::new()),
            Shape::Scalar(ScalarKind::Integer) | Shape::Scalar(ScalarKind::Number) => {
                Value::from(0)
            }
            Shape::Scalar(ScalarKind::Boolean) => Value::Bool(false),
            Shape::Enum(variants) => variants.first().map(|v| (*v).clone()).unwrap_or(Value::Null),
            Shape::Any => Value::Null,
        }
    }
}

impl TypeSchema {
    /// Generate the description of `T`.
    pub fn of<T: JsonSchema>() -> Self {
        let full = std::any::type_name::<T>();
        let type_name = full.rsplit("::").next().unwrap_or(full).to_string();
        Self {
            type_name,
            root: schemars::schema_for!(T).to_value(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    fn definition(&self, reference: &str) -> Option<(&str, &Value)> {
        if reference == "#" {
            return Some((self.type_name.as_str(), &self.root));
        }
        for prefix in ["#/$defs/", "#/definitions/"] {
            if let Some(name) = reference.strip_prefix(prefix) {
                let key = name.replace("~1", "/").replace("~0", "~");
                let section = prefix.trim_start_matches("#/").trim_end_matches('/');
                return self
                    .root
                    .get(section)
                    .and_then(Value::as_object)
                    .and_then(|defs| defs.get_key_value(key.as_str()))
                    .map(|(k, v)| (k.as_str(), v));
            }
        }
        None
    }

    /// Resolve a schema node to the shape it describes, following references
    /// and unwrapping nullable wrappers.
    pub(crate) fn resolve<'a>(&'a self, node: &'a Value, path: &Path) -> Result<Resolved<'a>, SyncError> {
        self.resolve_named(node, None, path)
    }

    fn resolve_named<'a>(
        &'a self,
        node: &'a Value,
        name: Option<&'a str>,
        path: &Path,
    ) -> Result<Resolved<'a>, SyncError> {
        let obj = match node {
            Value::Bool(true) => {
                return Ok(Resolved {
                    shape: Shape::Any,
                    nullable: true,
                });
            }
            Value::Object(obj) => obj,
            other => {
                return Err(SyncError::Unsupported {
                    path: path.clone(),
                    reason: format!("schema node {}", other),
                });
            }
        };

        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            let (def_name, def) =
                self.definition(reference)
                    .ok_or_else(|| SyncError::UnresolvedRef {
                        path: path.clone(),
                        reference: reference.to_string(),
                    })?;
            return self.resolve_named(def, Some(def_name), path);
        }

        for union in ["anyOf", "oneOf"] {
            if let Some(branches) = obj.get(union).and_then(Value::as_array) {
                return self.resolve_union(branches, name, path);
            }
        }

        if let Some(all) = obj.get("allOf").and_then(Value::as_array) {
            return match all.as_slice() {
                [single] => self.resolve_named(single, name, path),
                _ => Err(SyncError::Unsupported {
                    path: path.clone(),
                    reason: "allOf with more than one branch".to_string(),
                }),
            };
        }

        let mut nullable = false;
        if let Some(variants) = obj.get("enum").and_then(Value::as_array) {
            nullable = variants.iter().any(Value::is_null);
            return Ok(Resolved {
                shape: Shape::Enum(variants.iter().filter(|v| !v.is_null()).collect()),
                nullable,
            });
        }
        if let Some(constant) = obj.get("const") {
            return Ok(Resolved {
                shape: Shape::Enum(vec![constant]),
                nullable: false,
            });
        }

        let type_name = match obj.get("type") {
            None => None,
            Some(Value::String(t)) => Some(t.as_str()),
            Some(Value::Array(types)) => {
                nullable = types.iter().any(|t| t.as_str() == Some("null"));
                let rest: Vec<&str> = types
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|t| *t != "null")
                    .collect();
                match rest.as_slice() {
                    [] => None,
                    [single] => Some(*single),
                    _ => {
                        return Err(SyncError::Unsupported {
                            path: path.clone(),
                            reason: format!("multiple types {:?}", rest),
                        });
                    }
                }
            }
            Some(other) => {
                return Err(SyncError::Unsupported {
                    path: path.clone(),
                    reason: format!("type {}", other),
                });
            }
        };

        let shape = match type_name {
            Some("object") | None if obj.contains_key("properties") => self.struct_shape(obj, name),
            Some("object") => match obj.get("additionalProperties") {
                Some(Value::Bool(false)) | None => self.struct_shape(obj, name),
                Some(values) => Shape::Map(values),
            },
            Some("array") => Shape::Array(obj.get("items").unwrap_or(&ANY)),
            Some("string") => Shape::Scalar(ScalarKind::String),
            Some("integer") => Shape::Scalar(ScalarKind::Integer),
            Some("number") => Shape::Scalar(ScalarKind::Number),
            Some("boolean") => Shape::Scalar(ScalarKind::Boolean),
            Some("null") => {
                nullable = true;
                Shape::Any
            }
            None => Shape::Any,
            Some(other) => {
                return Err(SyncError::Unsupported {
                    path: path.clone(),
                    reason: format!("type {}", other),
                });
            }
        };
        Ok(Resolved { shape, nullable })
    }

    fn struct_shape<'a>(&'a self, obj: &'a Map<String, Value>, name: Option<&'a str>) -> Shape<'a> {
        Shape::Struct {
            name,
            props: obj.get("properties").and_then(Value::as_object),
            required: obj
                .get("required")
                .and_then(Value::as_array)
                .map(|r| r.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default(),
        }
    }

    fn resolve_union<'a>(
        &'a self,
        branches: &'a [Value],
        name: Option<&'a str>,
        path: &Path,
    ) -> Result<Resolved<'a>, SyncError> {
        let mut nullable = false;
        let mut resolved = Vec::new();
        for branch in branches {
            let r = self.resolve_named(branch, name, path)?;
            if r.nullable && matches!(r.shape, Shape::Any) && is_null_schema(branch) {
                nullable = true;
                continue;
            }
            nullable |= r.nullable;
            resolved.push(r.shape);
        }

        // Unit enums with documented variants render as a union of consts.
        if !resolved.is_empty() && resolved.iter().all(|s| matches!(s, Shape::Enum(_))) {
            let variants = resolved
                .into_iter()
                .flat_map(|s| match s {
                    Shape::Enum(v) => v,
                    _ => Vec::new(),
                })
                .collect();
            return Ok(Resolved {
                shape: Shape::Enum(variants),
                nullable,
            });
        }

        let mut resolved = resolved.into_iter();
        match (resolved.next(), resolved.next()) {
            (None, _) => Ok(Resolved {
                shape: Shape::Any,
                nullable: true,
            }),
            (Some(shape), None) => Ok(Resolved { shape, nullable }),
            (Some(_), Some(_)) => Err(SyncError::Unsupported {
                path: path.clone(),
                reason: "ambiguous union of several non-null shapes".to_string(),
            }),
        }
    }

    /// Whether the pattern names an existing field of this shape.
    pub fn has_pattern(&self, pattern: &PathPattern) -> bool {
        let mut node = &self.root;
        let path = Path::root();
        for segment in pattern.segments() {
            let Ok(resolved) = self.resolve(node, &path) else {
                return false;
            };
            node = match (segment, resolved.shape) {
                (Some(name), Shape::Struct { props, .. }) => {
                    match props.and_then(|p| p.get(name)) {
                        Some(child) => child,
                        None => return false,
                    }
                }
                (None, Shape::Array(items)) => items,
                (None, Shape::Map(values)) => values,
                _ => return false,
            };
        }
        true
    }

    /// Validate that the shape meets the synchronizer's assumptions.
    ///
    /// Called once per resource kind at registration, never per instance.
    pub fn check(&self) -> Result<(), SchemaError> {
        let mut visited = HashSet::new();
        self.check_node(&self.root, &Path::root(), &mut visited)
    }

    fn check_node<'a>(
        &'a self,
        node: &'a Value,
        path: &Path,
        visited: &mut HashSet<&'a str>,
    ) -> Result<(), SchemaError> {
        let resolved = self.resolve(node, path).map_err(|e| self.schema_error(path, e))?;
        match resolved.shape {
            Shape::Struct {
                name,
                props,
                required,
            } => {
                if let Some(name) = name {
                    if !visited.insert(name) {
                        return Ok(());
                    }
                }
                if let Some(first) = required.first() {
                    return Err(SchemaError::RequiredField {
                        type_name: self.type_name.clone(),
                        path: path.field(*first),
                    });
                }
                for (field, child) in props.into_iter().flatten() {
                    self.check_node(child, &path.field(field.clone()), visited)?;
                }
                Ok(())
            }
            Shape::Array(items) => self.check_node(items, &path.index(0), visited),
            Shape::Map(values) => self.check_node(values, &path.map_key("*"), visited),
            Shape::Scalar(_) | Shape::Enum(_) | Shape::Any => Ok(()),
        }
    }

    fn schema_error(&self, path: &Path, err: SyncError) -> SchemaError {
        match err {
            SyncError::Unsupported { reason, .. } if reason.starts_with("ambiguous") => {
                SchemaError::Ambiguous {
                    type_name: self.type_name.clone(),
                    path: path.clone(),
                    reason,
                }
            }
            other => SchemaError::Unsupported {
                type_name: self.type_name.clone(),
                path: path.clone(),
                reason: other.to_string(),
            },
        }
    }
}

fn is_null_schema(node: &Value) -> bool {
    match node.get("type") {
        Some(Value::String(t)) => t == "null",
        _ => false,
    }
}

/// Validate that `T` can be handled by the field synchronizer.
pub fn check_schema<T: JsonSchema>() -> Result<(), SchemaError> {
    TypeSchema::of::<T>().check()
}
