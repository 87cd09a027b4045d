//! Error types for versioned resources

use crate::path::Path;
use crate::versioned::ConversionContext;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Structural failure of the field synchronizer.
///
/// These indicate shapes the synchronizer cannot reason about and should not
/// occur for shapes that passed [`check_schema`](crate::schema::check_schema).
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("incompatible field kinds at {path}: {src} cannot be copied into {dst}")]
    IncompatibleKinds {
        path: Path,
        src: &'static str,
        dst: &'static str,
    },

    #[error("unresolvable schema reference {reference} at {path}")]
    UnresolvedRef { path: Path, reference: String },

    #[error("unsupported schema at {path}: {reason}")]
    Unsupported { path: Path, reason: String },

    #[error("encode/decode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Schema validation failure, raised once at resource-kind registration.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("{type_name}: unsupported field kind at {path}: {reason}")]
    Unsupported {
        type_name: String,
        path: Path,
        reason: String,
    },

    #[error("{type_name}: field {path} is required; every field must be defaultable")]
    RequiredField { type_name: String, path: Path },

    #[error("{type_name}: ambiguous schema at {path}: {reason}")]
    Ambiguous {
        type_name: String,
        path: Path,
        reason: String,
    },

    #[error("{type_name}: field trait references unknown path {pattern}")]
    UnknownTraitPath { type_name: String, pattern: String },
}

/// A field value lost when converting between versions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingField {
    /// Which version => version the value was lost on
    pub context: ConversionContext,
    /// Path of the field in the source version
    pub path: Path,
    /// Value of the source field
    pub value: serde_json::Value,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) = {}", self.path, self.context, self.value)
    }
}

/// Returned from `to_*()` when values set through another version have no
/// home in the requested one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionError {
    /// Field values that were set but did not translate to the version
    /// requested.
    pub missing_fields: Vec<MissingField>,
}

impl ConversionError {
    pub fn has_err(&self) -> bool {
        !self.missing_fields.is_empty()
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.missing_fields.iter().map(|m| &m.path).collect()
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self.missing_fields.iter().map(|m| m.to_string()).collect();
        write!(f, "conversion error: missing fields [{}]", fields.join(", "))
    }
}

impl std::error::Error for ConversionError {}

/// Errors from mutating or freezing a resource.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("{resource}: field {path} is output only and cannot be set ({version})")]
    ForbiddenMutation {
        resource: String,
        version: crate::id::Version,
        path: Path,
    },

    #[error("{resource}: required field {path} is not set ({version})")]
    MissingRequiredField {
        resource: String,
        version: crate::id::Version,
        path: Path,
    },

    #[error("{resource}: resource name {name:?} does not match key {key:?}")]
    NameMismatch {
        resource: String,
        name: String,
        key: String,
    },

    #[error("synchronizer error: {0}")]
    Sync(#[from] SyncError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ResourceError>;
