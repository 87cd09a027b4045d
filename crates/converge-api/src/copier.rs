//! Field synchronizer
//!
//! Copies the values of one resource shape into another, differently shaped
//! version of the same resource. Fields are matched by serde name. Source
//! fields with no counterpart in the destination are recorded instead of
//! failing the copy.

use crate::error::SyncError;
use crate::path::Path;
use crate::schema::{ScalarKind, Shape, TypeSchema};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Options changing how fields are transferred.
#[derive(Debug, Clone)]
pub enum CopierOption {
    /// Exclude every field with this serde name from synchronization. The
    /// field is neither copied nor reported as missing.
    SkipField(String),
    /// Transfer values of the named schema type with a custom function
    /// instead of the structural copy.
    Convert {
        type_name: String,
        with: fn(&Value) -> Value,
    },
}

/// A source value that had no destination field.
#[derive(Debug, Clone, PartialEq)]
pub struct MissingOnCopy {
    pub path: Path,
    pub value: Value,
}

/// Structural copier between two shapes.
pub struct Copier<'o> {
    options: &'o [CopierOption],
    missing: Vec<MissingOnCopy>,
}

impl<'o> Copier<'o> {
    pub fn new(options: &'o [CopierOption]) -> Self {
        Self {
            options,
            missing: Vec::new(),
        }
    }

    /// Fields of the source that could not be placed in the destination.
    pub fn missing(&self) -> &[MissingOnCopy] {
        &self.missing
    }

    pub fn into_missing(self) -> Vec<MissingOnCopy> {
        self.missing
    }

    /// Copy `src` (described by `src_schema`) into `dst` (described by
    /// `dst_schema`). Destination fields without a source counterpart keep
    /// their current value.
    pub fn copy(
        &mut self,
        dst: &mut Value,
        dst_schema: &TypeSchema,
        src: &Value,
        src_schema: &TypeSchema,
    ) -> Result<(), SyncError> {
        self.copy_at(
            &Path::root(),
            dst,
            dst_schema,
            dst_schema.root(),
            src,
            src_schema,
            src_schema.root(),
        )
    }

    /// Typed variant of [`Copier::copy`].
    pub fn copy_typed<D, S>(
        &mut self,
        dst: &mut D,
        dst_schema: &TypeSchema,
        src: &S,
        src_schema: &TypeSchema,
    ) -> Result<(), SyncError>
    where
        D: Serialize + DeserializeOwned,
        S: Serialize,
    {
        let mut dst_value = serde_json::to_value(&*dst)?;
        let src_value = serde_json::to_value(src)?;
        self.copy(&mut dst_value, dst_schema, &src_value, src_schema)?;
        *dst = serde_json::from_value(dst_value)?;
        Ok(())
    }

    fn skipped(&self, field: &str) -> bool {
        self.options
            .iter()
            .any(|o| matches!(o, CopierOption::SkipField(name) if name == field))
    }

    fn converter(&self, shape: &Shape<'_>) -> Option<fn(&Value) -> Value> {
        let Shape::Struct {
            name: Some(name), ..
        } = shape
        else {
            return None;
        };
        self.options.iter().find_map(|o| match o {
            CopierOption::Convert { type_name, with } if type_name == name => Some(*with),
            _ => None,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn copy_at(
        &mut self,
        path: &Path,
        dst: &mut Value,
        dst_schema: &TypeSchema,
        dst_node: &Value,
        src: &Value,
        src_schema: &TypeSchema,
        src_node: &Value,
    ) -> Result<(), SyncError> {
        let d = dst_schema.resolve(dst_node, path)?;
        let s = src_schema.resolve(src_node, path)?;

        if let Some(convert) = self.converter(&s.shape) {
            *dst = if src.is_null() { d.zero() } else { convert(src) };
            return Ok(());
        }
        if src.is_null() {
            *dst = d.zero();
            return Ok(());
        }

        match (&s.shape, &d.shape) {
            (Shape::Any, _) | (_, Shape::Any) => {
                *dst = src.clone();
            }
            (Shape::Struct { props: src_props, .. }, Shape::Struct { props: dst_props, .. }) => {
                if !dst.is_object() {
                    *dst = Value::Object(Map::new());
                }
                let Value::Object(dst_map) = dst else {
                    return Ok(());
                };
                for (name, src_child_node) in (*src_props).into_iter().flatten() {
                    if self.skipped(name) {
                        continue;
                    }
                    let src_child = src.get(name.as_str()).unwrap_or(&Value::Null);
                    let child_path = path.field(name.clone());
                    match dst_props.and_then(|p| p.get(name)) {
                        Some(dst_child_node) => {
                            let slot = dst_map.entry(name.clone()).or_insert(Value::Null);
                            self.copy_at(
                                &child_path,
                                slot,
                                dst_schema,
                                dst_child_node,
                                src_child,
                                src_schema,
                                src_child_node,
                            )?;
                        }
                        None => {
                            if !is_zero(src_child) {
                                tracing::trace!(path = %child_path, "field has no destination");
                                self.missing.push(MissingOnCopy {
                                    path: child_path,
                                    value: src_child.clone(),
                                });
                            }
                        }
                    }
                }
            }
            (Shape::Array(src_items), Shape::Array(dst_items)) => {
                let items = src.as_array().map(Vec::as_slice).unwrap_or_default();
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let mut slot = Value::Null;
                    self.copy_at(
                        &path.index(i),
                        &mut slot,
                        dst_schema,
                        dst_items,
                        item,
                        src_schema,
                        src_items,
                    )?;
                    out.push(slot);
                }
                *dst = Value::Array(out);
            }
            (Shape::Map(src_values), Shape::Map(dst_values)) => {
                let mut out = Map::new();
                for (key, item) in src.as_object().into_iter().flatten() {
                    let mut slot = Value::Null;
                    self.copy_at(
                        &path.map_key(key.clone()),
                        &mut slot,
                        dst_schema,
                        dst_values,
                        item,
                        src_schema,
                        src_values,
                    )?;
                    out.insert(key.clone(), slot);
                }
                *dst = Value::Object(out);
            }
            (Shape::Scalar(a), Shape::Scalar(b))
                if a == b || (*a == ScalarKind::Integer && *b == ScalarKind::Number) =>
            {
                *dst = src.clone();
            }
            (Shape::Enum(_) | Shape::Scalar(ScalarKind::String), Shape::Enum(variants)) => {
                if variants.iter().any(|v| *v == src) {
                    *dst = src.clone();
                } else {
                    self.missing.push(MissingOnCopy {
                        path: path.clone(),
                        value: src.clone(),
                    });
                }
            }
            (Shape::Enum(_), Shape::Scalar(ScalarKind::String)) => {
                *dst = src.clone();
            }
            (src_shape, dst_shape) => {
                return Err(SyncError::IncompatibleKinds {
                    path: path.clone(),
                    src: src_shape.kind_name(),
                    dst: dst_shape.kind_name(),
                });
            }
        }
        Ok(())
    }
}

/// Whether a serialized value is the zero value of its type.
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.values().all(is_zero),
    }
}
