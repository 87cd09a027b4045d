//! converge-api
//!
//! Versioned representation of cloud resources. A resource is held in its
//! GA, Alpha and Beta API shapes at once; writes through one shape are
//! synchronized into the others and anything that does not fit is
//! recorded as conversion loss.

pub mod copier;
pub mod diff;
pub mod error;
pub mod id;
pub mod kind;
pub mod path;
pub mod resource;
pub mod schema;
pub mod traits;
pub mod versioned;

pub use copier::{Copier, CopierOption, MissingOnCopy, is_zero};
pub use diff::{DiffItem, DiffItemState, DiffResult, diff_values};
pub use error::{
    ConversionError, MissingField, ResourceError, Result, SchemaError, SyncError,
};
pub use id::{Key, ParseIdError, ResourceId, Scope, Version};
pub use kind::{ResourceKind, check_kind};
pub use path::{Path, PathElem, PathPattern};
pub use resource::{MutableResource, Resource};
pub use schema::{TypeSchema, check_schema};
pub use traits::{FieldTraits, TypeTraits};
pub use versioned::{ConversionContext, Schema, VersionSchemas, VersionedResource};
