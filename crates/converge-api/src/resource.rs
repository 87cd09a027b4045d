//! Mutable and frozen resources
//!
//! [`MutableResource`] is the builder side: every accessor checks the field
//! traits of the touched version and rolls the change back when it breaks
//! them. [`Resource`] is the frozen, shareable result.

use crate::diff::{DiffResult, diff_values};
use crate::error::{ConversionError, ResourceError, Result, SyncError};
use crate::id::{Key, ResourceId, Version};
use crate::kind::ResourceKind;
use crate::traits::TypeTraits;
use crate::versioned::{ConversionContext, VersionedResource};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type Versions<K> =
    VersionedResource<<K as ResourceKind>::Ga, <K as ResourceKind>::Alpha, <K as ResourceKind>::Beta>;

/// A resource under construction.
pub struct MutableResource<K: ResourceKind> {
    id: ResourceId,
    data: Versions<K>,
    traits: Arc<TypeTraits>,
}

impl<K: ResourceKind> MutableResource<K> {
    pub fn new(project: impl Into<String>, key: Key) -> Self {
        Self {
            id: ResourceId::new(project, K::RESOURCE, key),
            data: Versions::<K>::with_options(K::copier_options()),
            traits: Arc::new(K::traits()),
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn check_schema(&self) -> std::result::Result<(), crate::error::SchemaError> {
        crate::kind::check_kind::<K>()
    }

    pub fn access(&mut self, f: impl FnOnce(&mut K::Ga)) -> Result<()> {
        self.guarded(Version::Ga, |data| data.access(f))
    }

    pub fn access_alpha(&mut self, f: impl FnOnce(&mut K::Alpha)) -> Result<()> {
        self.guarded(Version::Alpha, |data| data.access_alpha(f))
    }

    pub fn access_beta(&mut self, f: impl FnOnce(&mut K::Beta)) -> Result<()> {
        self.guarded(Version::Beta, |data| data.access_beta(f))
    }

    pub fn set(&mut self, src: &K::Ga) -> Result<()> {
        self.guarded(Version::Ga, |data| data.set(src))
    }

    pub fn set_alpha(&mut self, src: &K::Alpha) -> Result<()> {
        self.guarded(Version::Alpha, |data| data.set_alpha(src))
    }

    pub fn set_beta(&mut self, src: &K::Beta) -> Result<()> {
        self.guarded(Version::Beta, |data| data.set_beta(src))
    }

    pub fn ga(&self) -> &K::Ga {
        self.data.ga()
    }

    pub fn alpha(&self) -> &K::Alpha {
        self.data.alpha()
    }

    pub fn beta(&self) -> &K::Beta {
        self.data.beta()
    }

    /// Validate the resource and turn it into an immutable [`Resource`].
    pub fn freeze(self) -> Result<Resource<K>> {
        for version in [Version::Ga, Version::Alpha, Version::Beta] {
            let value = self.data.to_value(version)?;
            if let Some(path) = self.traits.get(version).missing_non_zero(&value) {
                return Err(ResourceError::MissingRequiredField {
                    resource: self.id.to_string(),
                    version,
                    path,
                });
            }
        }

        let ga = self.data.to_value(Version::Ga)?;
        if let Some(name) = ga.get("name").and_then(Value::as_str)
            && !name.is_empty()
            && name != self.id.key.name
        {
            return Err(ResourceError::NameMismatch {
                resource: self.id.to_string(),
                name: name.to_string(),
                key: self.id.key.to_string(),
            });
        }

        Ok(Resource {
            id: self.id,
            data: Arc::new(self.data),
            traits: self.traits,
        })
    }

    fn guarded(
        &mut self,
        version: Version,
        mutate: impl FnOnce(&mut Versions<K>) -> std::result::Result<(), SyncError>,
    ) -> Result<()> {
        let snapshot = self.data.clone();
        let before = self.data.to_value(version)?;
        let outcome = mutate(&mut self.data)
            .map_err(ResourceError::from)
            .and_then(|()| self.check_post_access(version, &before));
        if outcome.is_err() {
            self.data = snapshot;
        }
        outcome
    }

    fn check_post_access(&self, version: Version, before: &Value) -> Result<()> {
        let after = self.data.to_value(version)?;
        let traits = self.traits.get(version);
        if let Some(path) = traits.changed_output_only(before, &after) {
            return Err(ResourceError::ForbiddenMutation {
                resource: self.id.to_string(),
                version,
                path,
            });
        }
        if let Some(path) = traits.missing_non_zero(&after) {
            return Err(ResourceError::MissingRequiredField {
                resource: self.id.to_string(),
                version,
                path,
            });
        }
        Ok(())
    }
}

impl<K: ResourceKind> fmt::Debug for MutableResource<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutableResource")
            .field("id", &self.id)
            .field("ga", self.data.ga())
            .finish_non_exhaustive()
    }
}

/// A validated, immutable resource.
pub struct Resource<K: ResourceKind> {
    id: ResourceId,
    data: Arc<Versions<K>>,
    traits: Arc<TypeTraits>,
}

impl<K: ResourceKind> Clone for Resource<K> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            data: Arc::clone(&self.data),
            traits: Arc::clone(&self.traits),
        }
    }
}

impl<K: ResourceKind> fmt::Debug for Resource<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("ga", self.data.ga())
            .finish_non_exhaustive()
    }
}

impl<K: ResourceKind> Resource<K> {
    /// Build a resource from the representation returned by the API.
    ///
    /// Output-only fields are accepted as-is.
    pub fn from_remote(id: ResourceId, version: Version, value: Value) -> Result<Self> {
        let mut data = Versions::<K>::with_options(K::copier_options());
        match version {
            Version::Ga => data.set(&serde_json::from_value(value)?)?,
            Version::Alpha => data.set_alpha(&serde_json::from_value(value)?)?,
            Version::Beta => data.set_beta(&serde_json::from_value(value)?)?,
        }
        Ok(Self {
            id,
            data: Arc::new(data),
            traits: Arc::new(K::traits()),
        })
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn traits(&self) -> &TypeTraits {
        &self.traits
    }

    /// GA view, or the fields GA would lose. [`ga`](Self::ga) reads the
    /// value regardless of the error.
    pub fn to_ga(&self) -> std::result::Result<&K::Ga, ConversionError> {
        self.data.to_ga()
    }

    /// See [`to_ga`](Self::to_ga); [`alpha`](Self::alpha) reads regardless.
    pub fn to_alpha(&self) -> std::result::Result<&K::Alpha, ConversionError> {
        self.data.to_alpha()
    }

    /// See [`to_ga`](Self::to_ga); [`beta`](Self::beta) reads regardless.
    pub fn to_beta(&self) -> std::result::Result<&K::Beta, ConversionError> {
        self.data.to_beta()
    }

    pub fn ga(&self) -> &K::Ga {
        self.data.ga()
    }

    pub fn alpha(&self) -> &K::Alpha {
        self.data.alpha()
    }

    pub fn beta(&self) -> &K::Beta {
        self.data.beta()
    }

    pub fn conversion_errors(&self, context: ConversionContext) -> ConversionError {
        self.data.conversion_errors(context)
    }

    /// Serialized representation in `version`.
    pub fn value(&self, version: Version) -> Result<Value> {
        Ok(self.data.to_value(version)?)
    }

    /// The version that carries this resource without loss, preferring GA,
    /// then Beta, then Alpha.
    pub fn implied_version(&self) -> Version {
        if self.data.check_into(Version::Ga).is_ok() {
            Version::Ga
        } else if self.data.check_into(Version::Beta).is_ok() {
            Version::Beta
        } else {
            Version::Alpha
        }
    }

    /// Compare all three representations, ignoring output-only fields.
    pub fn diff(&self, other: &Resource<K>) -> Result<DiffResult> {
        let mut result = DiffResult::default();
        for version in [Version::Ga, Version::Alpha, Version::Beta] {
            let traits = self.traits.get(version);
            let ignore = |path: &crate::path::Path| traits.is_output_only(path);
            result.merge(diff_values(
                &self.value(version)?,
                &other.value(version)?,
                &ignore,
            ));
        }
        Ok(result)
    }
}
