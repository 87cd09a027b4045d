//! Versioned resources
//!
//! A [`VersionedResource`] holds the GA, Alpha and Beta representations of
//! one logical resource. Mutating one representation through its accessor
//! synchronizes the other two, and fields that could not be carried across
//! are remembered per direction so that exporting a version can report what
//! it lost.

use crate::copier::{Copier, CopierOption, MissingOnCopy};
use crate::error::{ConversionError, MissingField, SchemaError, SyncError};
use crate::id::Version;
use crate::schema::TypeSchema;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Bounds every schema shape must satisfy.
pub trait Schema:
    Serialize + DeserializeOwned + JsonSchema + Default + Clone + PartialEq + fmt::Debug + Send + Sync + 'static
{
}

impl<T> Schema for T where
    T: Serialize
        + DeserializeOwned
        + JsonSchema
        + Default
        + Clone
        + PartialEq
        + fmt::Debug
        + Send
        + Sync
        + 'static
{
}

/// Which version => version a value was lost on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionContext {
    GaToAlpha,
    GaToBeta,
    AlphaToGa,
    AlphaToBeta,
    BetaToGa,
    BetaToAlpha,
}

const CONTEXT_COUNT: usize = 6;

impl ConversionContext {
    pub const ALL: [ConversionContext; CONTEXT_COUNT] = [
        ConversionContext::GaToAlpha,
        ConversionContext::GaToBeta,
        ConversionContext::AlphaToGa,
        ConversionContext::AlphaToBeta,
        ConversionContext::BetaToGa,
        ConversionContext::BetaToAlpha,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn source(self) -> Version {
        match self {
            ConversionContext::GaToAlpha | ConversionContext::GaToBeta => Version::Ga,
            ConversionContext::AlphaToGa | ConversionContext::AlphaToBeta => Version::Alpha,
            ConversionContext::BetaToGa | ConversionContext::BetaToAlpha => Version::Beta,
        }
    }

    pub fn target(self) -> Version {
        match self {
            ConversionContext::AlphaToGa | ConversionContext::BetaToGa => Version::Ga,
            ConversionContext::GaToAlpha | ConversionContext::BetaToAlpha => Version::Alpha,
            ConversionContext::GaToBeta | ConversionContext::AlphaToBeta => Version::Beta,
        }
    }

    /// The two contexts leading into `version`.
    pub fn into_version(version: Version) -> [ConversionContext; 2] {
        match version {
            Version::Ga => [ConversionContext::AlphaToGa, ConversionContext::BetaToGa],
            Version::Alpha => [ConversionContext::GaToAlpha, ConversionContext::BetaToAlpha],
            Version::Beta => [ConversionContext::GaToBeta, ConversionContext::AlphaToBeta],
        }
    }
}

impl fmt::Display for ConversionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.source(), self.target())
    }
}

/// Type descriptions of the three versions.
#[derive(Debug)]
pub struct VersionSchemas {
    pub ga: TypeSchema,
    pub alpha: TypeSchema,
    pub beta: TypeSchema,
}

impl VersionSchemas {
    pub fn of<Ga: JsonSchema, Alpha: JsonSchema, Beta: JsonSchema>() -> Self {
        Self {
            ga: TypeSchema::of::<Ga>(),
            alpha: TypeSchema::of::<Alpha>(),
            beta: TypeSchema::of::<Beta>(),
        }
    }

    pub fn get(&self, version: Version) -> &TypeSchema {
        match version {
            Version::Ga => &self.ga,
            Version::Alpha => &self.alpha,
            Version::Beta => &self.beta,
        }
    }
}

/// The GA, Alpha and Beta representations of one resource, kept in sync.
#[derive(Debug, Clone)]
pub struct VersionedResource<Ga, Alpha, Beta> {
    schemas: Arc<VersionSchemas>,
    options: Arc<[CopierOption]>,

    ga: Ga,
    alpha: Alpha,
    beta: Beta,

    errors: [Vec<MissingOnCopy>; CONTEXT_COUNT],
}

impl<Ga: Schema, Alpha: Schema, Beta: Schema> Default for VersionedResource<Ga, Alpha, Beta> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ga: Schema, Alpha: Schema, Beta: Schema> VersionedResource<Ga, Alpha, Beta> {
    pub fn new() -> Self {
        Self::with_options(Vec::new())
    }

    pub fn with_options(options: Vec<CopierOption>) -> Self {
        Self {
            schemas: Arc::new(VersionSchemas::of::<Ga, Alpha, Beta>()),
            options: options.into(),
            ga: Ga::default(),
            alpha: Alpha::default(),
            beta: Beta::default(),
            errors: Default::default(),
        }
    }

    pub fn schemas(&self) -> &VersionSchemas {
        &self.schemas
    }

    /// Validate that all three shapes meet the synchronizer's assumptions.
    pub fn check_schema(&self) -> Result<(), SchemaError> {
        self.schemas.ga.check()?;
        self.schemas.alpha.check()?;
        self.schemas.beta.check()
    }

    /// Mutate the GA representation, then bring Alpha and Beta in sync.
    pub fn access(&mut self, f: impl FnOnce(&mut Ga)) -> Result<(), SyncError> {
        f(&mut self.ga);
        let src = serde_json::to_value(&self.ga)?;
        let schemas = Arc::clone(&self.schemas);
        self.errors[ConversionContext::GaToAlpha.index()] =
            propagate(&mut self.alpha, &schemas.alpha, &src, &schemas.ga, &self.options)?;
        self.errors[ConversionContext::GaToBeta.index()] =
            propagate(&mut self.beta, &schemas.beta, &src, &schemas.ga, &self.options)?;
        self.log_loss([ConversionContext::GaToAlpha, ConversionContext::GaToBeta]);
        Ok(())
    }

    /// Mutate the Alpha representation, then bring GA and Beta in sync.
    pub fn access_alpha(&mut self, f: impl FnOnce(&mut Alpha)) -> Result<(), SyncError> {
        f(&mut self.alpha);
        let src = serde_json::to_value(&self.alpha)?;
        let schemas = Arc::clone(&self.schemas);
        self.errors[ConversionContext::AlphaToGa.index()] =
            propagate(&mut self.ga, &schemas.ga, &src, &schemas.alpha, &self.options)?;
        self.errors[ConversionContext::AlphaToBeta.index()] =
            propagate(&mut self.beta, &schemas.beta, &src, &schemas.alpha, &self.options)?;
        self.log_loss([ConversionContext::AlphaToGa, ConversionContext::AlphaToBeta]);
        Ok(())
    }

    /// Mutate the Beta representation, then bring GA and Alpha in sync.
    pub fn access_beta(&mut self, f: impl FnOnce(&mut Beta)) -> Result<(), SyncError> {
        f(&mut self.beta);
        let src = serde_json::to_value(&self.beta)?;
        let schemas = Arc::clone(&self.schemas);
        self.errors[ConversionContext::BetaToGa.index()] =
            propagate(&mut self.ga, &schemas.ga, &src, &schemas.beta, &self.options)?;
        self.errors[ConversionContext::BetaToAlpha.index()] =
            propagate(&mut self.alpha, &schemas.alpha, &src, &schemas.beta, &self.options)?;
        self.log_loss([ConversionContext::BetaToGa, ConversionContext::BetaToAlpha]);
        Ok(())
    }

    /// Replace the GA representation with `src`.
    pub fn set(&mut self, src: &Ga) -> Result<(), SyncError> {
        self.access(|dst| *dst = src.clone())
    }

    /// Replace the Alpha representation with `src`.
    pub fn set_alpha(&mut self, src: &Alpha) -> Result<(), SyncError> {
        self.access_alpha(|dst| *dst = src.clone())
    }

    /// Replace the Beta representation with `src`.
    pub fn set_beta(&mut self, src: &Beta) -> Result<(), SyncError> {
        self.access_beta(|dst| *dst = src.clone())
    }

    /// The GA representation; fails with the fields set through Alpha or
    /// Beta that GA cannot hold.
    ///
    /// The representation stays readable on error through [`ga`](Self::ga).
    pub fn to_ga(&self) -> Result<&Ga, ConversionError> {
        self.check_into(Version::Ga).map(|()| &self.ga)
    }

    /// The Alpha representation; fails with the fields set through GA or
    /// Beta that Alpha cannot hold.
    ///
    /// The representation stays readable on error through [`alpha`](Self::alpha).
    pub fn to_alpha(&self) -> Result<&Alpha, ConversionError> {
        self.check_into(Version::Alpha).map(|()| &self.alpha)
    }

    /// The Beta representation; fails with the fields set through GA or
    /// Alpha that Beta cannot hold.
    ///
    /// The representation stays readable on error through [`beta`](Self::beta).
    pub fn to_beta(&self) -> Result<&Beta, ConversionError> {
        self.check_into(Version::Beta).map(|()| &self.beta)
    }

    /// The GA representation regardless of conversion loss.
    pub fn ga(&self) -> &Ga {
        &self.ga
    }

    pub fn alpha(&self) -> &Alpha {
        &self.alpha
    }

    pub fn beta(&self) -> &Beta {
        &self.beta
    }

    /// Serialized form of one representation.
    pub fn to_value(&self, version: Version) -> Result<serde_json::Value, serde_json::Error> {
        match version {
            Version::Ga => serde_json::to_value(&self.ga),
            Version::Alpha => serde_json::to_value(&self.alpha),
            Version::Beta => serde_json::to_value(&self.beta),
        }
    }

    /// Loss recorded for a single direction by the most recent sync.
    pub fn conversion_errors(&self, context: ConversionContext) -> ConversionError {
        self.collect(&[context])
    }

    /// Loss on the paths into `version`.
    pub fn check_into(&self, version: Version) -> Result<(), ConversionError> {
        let errs = self.collect(&ConversionContext::into_version(version));
        if errs.has_err() { Err(errs) } else { Ok(()) }
    }

    fn collect(&self, contexts: &[ConversionContext]) -> ConversionError {
        let missing_fields = contexts
            .iter()
            .flat_map(|&context| {
                self.errors[context.index()].iter().map(move |m| MissingField {
                    context,
                    path: m.path.clone(),
                    value: m.value.clone(),
                })
            })
            .collect();
        ConversionError { missing_fields }
    }

    fn log_loss(&self, contexts: [ConversionContext; 2]) {
        for context in contexts {
            let lost = &self.errors[context.index()];
            if !lost.is_empty() {
                tracing::debug!(
                    %context,
                    fields = ?lost.iter().map(|m| m.path.to_string()).collect::<Vec<_>>(),
                    "fields lost during version sync"
                );
            }
        }
    }
}

fn propagate<T: Schema>(
    dst: &mut T,
    dst_schema: &TypeSchema,
    src: &serde_json::Value,
    src_schema: &TypeSchema,
    options: &[CopierOption],
) -> Result<Vec<MissingOnCopy>, SyncError> {
    let mut copier = Copier::new(options);
    let mut value = serde_json::to_value(&*dst)?;
    copier.copy(&mut value, dst_schema, src, src_schema)?;
    *dst = serde_json::from_value(value)?;
    Ok(copier.into_missing())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;
    use serde_json::json;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
    #[serde(default, rename_all = "camelCase")]
    struct GaThing {
        name: String,
        size: i64,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
    #[serde(default, rename_all = "camelCase")]
    struct AlphaThing {
        name: String,
        size: i64,
        preview: Option<Preview>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
    #[serde(default, rename_all = "camelCase")]
    struct BetaThing {
        name: String,
        size: i64,
        tier: String,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
    #[serde(default, rename_all = "camelCase")]
    struct Preview {
        level: i64,
    }

    type Thing = VersionedResource<GaThing, AlphaThing, BetaThing>;

    #[test]
    fn test_check_schema() {
        Thing::new().check_schema().unwrap();
    }

    #[test]
    fn test_access_syncs_other_versions() {
        let mut t = Thing::new();
        t.access(|x| {
            x.name = "a".into();
            x.size = 3;
        })
        .unwrap();
        assert_eq!(t.alpha().name, "a");
        assert_eq!(t.beta().size, 3);
        assert!(t.to_ga().is_ok());
        assert!(t.to_alpha().is_ok());
        assert!(t.to_beta().is_ok());
    }

    #[test]
    fn test_last_writer_wins_across_versions() {
        let mut t = Thing::new();
        t.access(|x| x.size = 1).unwrap();
        t.access_beta(|x| x.size = 2).unwrap();
        t.access_alpha(|x| x.size = 3).unwrap();
        assert_eq!(t.ga().size, 3);
        assert_eq!(t.beta().size, 3);

        t.access(|x| x.size = 4).unwrap();
        assert_eq!(t.alpha().size, 4);
        assert_eq!(t.beta().size, 4);
    }

    #[test]
    fn test_alpha_only_field_is_reported() {
        let mut t = Thing::new();
        t.access(|x| x.name = "a".into()).unwrap();
        t.access_alpha(|x| x.preview = Some(Preview { level: 2 })).unwrap();

        let err = t.to_ga().unwrap_err();
        assert_eq!(err.paths(), vec![&Path::root().field("preview")]);
        assert_eq!(err.missing_fields[0].context, ConversionContext::AlphaToGa);
        assert_eq!(err.missing_fields[0].value, json!({"level": 2}));
        // The GA representation is still there next to the error.
        assert_eq!(t.ga().name, "a");
        assert!(t.to_alpha().is_ok());
        assert!(t.to_beta().is_err());

        // A later GA write keeps the alpha-only value.
        t.access(|x| x.size = 9).unwrap();
        assert_eq!(t.alpha().preview, Some(Preview { level: 2 }));
        assert!(t.to_ga().is_err());

        // Clearing it through alpha clears the record.
        t.access_alpha(|x| x.preview = None).unwrap();
        assert!(t.to_ga().is_ok());
    }

    #[test]
    fn test_set_beta() {
        let mut t = Thing::new();
        t.set_beta(&BetaThing {
            name: "b".into(),
            size: 1,
            tier: "premium".into(),
        })
        .unwrap();
        assert_eq!(t.ga(), &GaThing { name: "b".into(), size: 1 });
        let err = t.conversion_errors(ConversionContext::BetaToGa);
        assert_eq!(err.paths(), vec![&Path::root().field("tier")]);
        assert!(!t.conversion_errors(ConversionContext::GaToAlpha).has_err());
    }

    #[test]
    fn test_skip_field_option() {
        let mut t = Thing::with_options(vec![CopierOption::SkipField("tier".into())]);
        t.access_beta(|x| x.tier = "premium".into()).unwrap();
        assert!(t.to_ga().is_ok());
    }
}
