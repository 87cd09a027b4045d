//! Field traits
//!
//! Per-version description of which fields are server assigned, which must
//! be set and which cannot be changed without replacing the resource.

use crate::copier::is_zero;
use crate::error::SchemaError;
use crate::id::Version;
use crate::path::{Path, PathPattern};
use crate::schema::TypeSchema;
use serde_json::Value;

/// Traits of the fields of one version.
#[derive(Debug, Clone, Default)]
pub struct FieldTraits {
    output_only: Vec<PathPattern>,
    non_zero: Vec<PathPattern>,
    immutable: Vec<PathPattern>,
}

impl FieldTraits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field is assigned by the server and never set by clients.
    pub fn output_only(mut self, pattern: &str) -> Self {
        self.output_only.push(PathPattern::parse(pattern));
        self
    }

    /// Field must hold a non-zero value.
    pub fn non_zero(mut self, pattern: &str) -> Self {
        self.non_zero.push(PathPattern::parse(pattern));
        self
    }

    /// Field cannot be changed by an update.
    pub fn immutable(mut self, pattern: &str) -> Self {
        self.immutable.push(PathPattern::parse(pattern));
        self
    }

    pub fn is_output_only(&self, path: &Path) -> bool {
        self.output_only.iter().any(|p| p.covers(path))
    }

    /// Whether a change at `path` touches an immutable field, including a
    /// change to a container holding one.
    pub fn is_immutable(&self, path: &Path) -> bool {
        self.immutable.iter().any(|p| p.overlaps(path))
    }

    /// Output-only paths whose value differs between `before` and `after`.
    pub fn changed_output_only(&self, before: &Value, after: &Value) -> Option<Path> {
        self.output_only.iter().find_map(|pattern| {
            let mut paths = pattern.expand(after);
            paths.extend(pattern.expand(before));
            paths.into_iter().find(|path| {
                let old = path.lookup(before).unwrap_or(&Value::Null);
                let new = path.lookup(after).unwrap_or(&Value::Null);
                old != new && !(is_zero(old) && is_zero(new))
            })
        })
    }

    /// First required path that is unset in `value`.
    pub fn missing_non_zero(&self, value: &Value) -> Option<Path> {
        self.non_zero.iter().find_map(|pattern| {
            let paths = pattern.expand(value);
            if paths.is_empty() && !pattern.segments().any(|s| s.is_none()) {
                return Some(literal_path(pattern));
            }
            paths
                .into_iter()
                .find(|path| path.lookup(value).is_none_or(is_zero))
        })
    }

    fn patterns(&self) -> impl Iterator<Item = &PathPattern> {
        self.output_only
            .iter()
            .chain(&self.non_zero)
            .chain(&self.immutable)
    }

    /// Verify that every pattern names a field of `schema`.
    pub fn validate(&self, schema: &TypeSchema) -> Result<(), SchemaError> {
        match self.patterns().find(|p| !schema.has_pattern(p)) {
            Some(pattern) => Err(SchemaError::UnknownTraitPath {
                type_name: schema.type_name().to_string(),
                pattern: pattern.to_string(),
            }),
            None => Ok(()),
        }
    }
}

fn literal_path(pattern: &PathPattern) -> Path {
    pattern
        .segments()
        .flatten()
        .fold(Path::root(), |path, name| path.field(name))
}

/// Field traits of all three versions of a resource kind.
#[derive(Debug, Clone, Default)]
pub struct TypeTraits {
    pub ga: FieldTraits,
    pub alpha: FieldTraits,
    pub beta: FieldTraits,
}

impl TypeTraits {
    /// Use the same traits for every version.
    pub fn uniform(traits: FieldTraits) -> Self {
        Self {
            ga: traits.clone(),
            alpha: traits.clone(),
            beta: traits,
        }
    }

    pub fn get(&self, version: Version) -> &FieldTraits {
        match version {
            Version::Ga => &self.ga,
            Version::Alpha => &self.alpha,
            Version::Beta => &self.beta,
        }
    }
}
