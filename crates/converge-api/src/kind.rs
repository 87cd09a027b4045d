//! Resource kinds
//!
//! A kind ties the three schema shapes of one cloud resource type together
//! with its collection name and field traits.

use crate::copier::CopierOption;
use crate::error::SchemaError;
use crate::id::Version;
use crate::traits::TypeTraits;
use crate::versioned::{Schema, VersionSchemas};

pub trait ResourceKind: Send + Sync + 'static {
    type Ga: Schema;
    type Alpha: Schema;
    type Beta: Schema;

    /// Collection name used in resource paths, e.g. "healthChecks".
    const RESOURCE: &'static str;

    /// Rate-limit category, e.g. "HealthChecks".
    const SERVICE: &'static str;

    fn traits() -> TypeTraits;

    fn copier_options() -> Vec<CopierOption> {
        Vec::new()
    }
}

/// Validate the shapes of `K` and the field traits declared for them.
pub fn check_kind<K: ResourceKind>() -> Result<(), SchemaError> {
    let schemas = VersionSchemas::of::<K::Ga, K::Alpha, K::Beta>();
    let traits = K::traits();
    for version in [Version::Ga, Version::Alpha, Version::Beta] {
        let schema = schemas.get(version);
        schema.check()?;
        traits.get(version).validate(schema)?;
    }
    Ok(())
}
