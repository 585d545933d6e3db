//! Error types for kernel operations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::env::{FeatureId, OracleError};
use crate::error::{ErrorContext, ErrorSeverity, GameError};
use crate::state::{Collection, EntityId, FeatureRecord, PathError, RecordId, SnapshotError};

/// Plan bucket an application step belonged to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Create,
    Delete,
    Set,
    Add,
}

impl Bucket {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Set => "set",
            Self::Add => "add",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input rejected before any side effect.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    #[error(transparent)]
    Path(PathError),

    #[error("entity {entity}: {message}")]
    Invariant {
        entity: EntityId,
        message: &'static str,
    },

    #[error("record {record} not found in {collection} of entity {entity}")]
    RecordNotFound {
        entity: EntityId,
        collection: Collection,
        record: RecordId,
    },

    #[error("record {record} listed twice")]
    DuplicateRecord { record: RecordId },

    #[error("source and target are the same entity {0}")]
    SameEntity(EntityId),

    #[error("temporary id '{0}' is not created by this plan")]
    UnknownTemporaryId(String),

    #[error("temporary id '{0}' is declared twice")]
    DuplicateTemporaryId(String),

    #[error("temporary id must not be empty")]
    EmptyTemporaryId,

    #[error("temporary reference '{0}' outside a plan")]
    UnresolvedTemporary(String),

    #[error("delta value for '{path}' is not a literal")]
    NonLiteralValue { path: String },

    #[error("feature '{id}' is not a {collection} definition")]
    UnknownFeature { collection: Collection, id: FeatureId },
}

/// Attempted write to a computed value.
///
/// Derived values are owned by the recompute pass. A write is an
/// architecture violation, not bad user input.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("derived field '{path}' on entity {entity} cannot be written")]
pub struct DerivedWriteViolation {
    pub entity: EntityId,
    pub path: String,
}

/// A kernel sub-step failed after validation passed.
///
/// Steps completed before the failure stay applied.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{operation} failed on entity {entity}{}: {source}", describe_location(.bucket, .path, .collection))]
pub struct MutationApplicationError {
    pub entity: EntityId,
    pub operation: &'static str,
    pub bucket: Option<Bucket>,
    pub path: Option<String>,
    pub collection: Option<Collection>,
    pub source: Box<KernelError>,
}

fn describe_location(
    bucket: &Option<Bucket>,
    path: &Option<String>,
    collection: &Option<Collection>,
) -> String {
    let mut out = String::new();
    if let Some(bucket) = bucket {
        out.push_str(&format!(" in {bucket} bucket"));
    }
    if let Some(path) = path {
        out.push_str(&format!(" at '{path}'"));
    }
    if let Some(collection) = collection {
        out.push_str(&format!(" for {collection}"));
    }
    out
}

impl MutationApplicationError {
    pub fn new(entity: EntityId, operation: &'static str, source: KernelError) -> Self {
        Self {
            entity,
            operation,
            bucket: None,
            path: None,
            collection: None,
            source: Box::new(source),
        }
    }

    pub fn in_bucket(mut self, bucket: Bucket) -> Self {
        self.bucket = Some(bucket);
        self
    }

    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn for_collection(mut self, collection: Collection) -> Self {
        self.collection = Some(collection);
        self
    }
}

/// Errors surfaced by [`super::MutationKernel`] operations.
#[derive(Clone, Debug, thiserror::Error)]
pub enum KernelError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    DerivedWrite(#[from] DerivedWriteViolation),

    #[error(transparent)]
    Application(#[from] MutationApplicationError),

    #[error("{collection} on entity {entity} is full ({capacity} records)")]
    CollectionFull {
        entity: EntityId,
        collection: Collection,
        capacity: usize,
    },

    /// Records were removed from the source but could not be created on the target.
    ///
    /// The kernel does not compensate; callers holding a snapshot restore it.
    #[error("move {source_entity} -> {target} left {} record(s) detached: {cause}", .removed.len())]
    PartialMove {
        source_entity: EntityId,
        target: EntityId,
        collection: Collection,
        removed: Vec<FeatureRecord>,
        #[source]
        cause: Box<KernelError>,
    },

    #[error("hook chain too deep: hook '{hook}' reached depth {depth}")]
    HookChainTooDeep { hook: &'static str, depth: usize },

    #[error("critical hook '{hook}' failed: {cause}")]
    HookFailed {
        hook: &'static str,
        #[source]
        cause: Box<KernelError>,
    },

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl KernelError {
    /// Wraps this error with application context unless it already carries it.
    pub(crate) fn applying(
        self,
        entity: EntityId,
        operation: &'static str,
        bucket: Bucket,
    ) -> MutationApplicationError {
        match self {
            KernelError::Application(mut inner) => {
                inner.bucket.get_or_insert(bucket);
                inner
            }
            other => MutationApplicationError::new(entity, operation, other).in_bucket(bucket),
        }
    }

    /// The validation error at the root of this error, if any.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            KernelError::Validation(err) => Some(err),
            KernelError::Application(app) => app.source.as_validation(),
            _ => None,
        }
    }
}

impl From<PathError> for KernelError {
    fn from(err: PathError) -> Self {
        KernelError::Validation(ValidationError::Path(err))
    }
}

impl GameError for ValidationError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn context(&self) -> Option<ErrorContext> {
        match self {
            Self::EntityNotFound(id) | Self::SameEntity(id) => {
                Some(ErrorContext::new("validate").with_entity(*id))
            }
            Self::Invariant { entity, message } => Some(
                ErrorContext::new("validate")
                    .with_entity(*entity)
                    .with_message(*message),
            ),
            Self::RecordNotFound { entity, .. } => {
                Some(ErrorContext::new("validate").with_entity(*entity))
            }
            _ => None,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::EntityNotFound(_) => "VALIDATION_ENTITY_NOT_FOUND",
            Self::Path(PathError::Unknown { .. }) => "VALIDATION_UNKNOWN_PATH",
            Self::Path(_) => "VALIDATION_BAD_VALUE",
            Self::Invariant { .. } => "VALIDATION_INVARIANT",
            Self::RecordNotFound { .. } => "VALIDATION_RECORD_NOT_FOUND",
            Self::DuplicateRecord { .. } => "VALIDATION_DUPLICATE_RECORD",
            Self::SameEntity(_) => "VALIDATION_SAME_ENTITY",
            Self::UnknownTemporaryId(_) => "VALIDATION_UNKNOWN_TEMPORARY_ID",
            Self::DuplicateTemporaryId(_) => "VALIDATION_DUPLICATE_TEMPORARY_ID",
            Self::EmptyTemporaryId => "VALIDATION_EMPTY_TEMPORARY_ID",
            Self::UnresolvedTemporary(_) => "VALIDATION_UNRESOLVED_TEMPORARY",
            Self::NonLiteralValue { .. } => "VALIDATION_NON_LITERAL_VALUE",
            Self::UnknownFeature { .. } => "VALIDATION_UNKNOWN_FEATURE",
        }
    }
}

impl GameError for DerivedWriteViolation {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Fatal
    }

    fn context(&self) -> Option<ErrorContext> {
        Some(ErrorContext::new("set").with_entity(self.entity))
    }

    fn error_code(&self) -> &'static str {
        "KERNEL_DERIVED_WRITE"
    }
}

impl GameError for MutationApplicationError {
    fn severity(&self) -> ErrorSeverity {
        self.source.severity()
    }

    fn context(&self) -> Option<ErrorContext> {
        Some(ErrorContext::new(self.operation).with_entity(self.entity))
    }

    fn error_code(&self) -> &'static str {
        "KERNEL_APPLICATION_FAILED"
    }
}

impl GameError for KernelError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Validation(err) => err.severity(),
            Self::DerivedWrite(err) => err.severity(),
            Self::Application(err) => err.severity(),
            Self::CollectionFull { .. } => ErrorSeverity::Recoverable,
            Self::PartialMove { .. } | Self::HookChainTooDeep { .. } => ErrorSeverity::Internal,
            Self::HookFailed { cause, .. } => cause.severity(),
            Self::Oracle(err) => err.severity(),
            Self::Snapshot(_) => ErrorSeverity::Internal,
        }
    }

    fn context(&self) -> Option<ErrorContext> {
        match self {
            Self::Validation(err) => err.context(),
            Self::DerivedWrite(err) => err.context(),
            Self::Application(err) => err.context(),
            Self::CollectionFull { entity, .. } => {
                Some(ErrorContext::new("create_records").with_entity(*entity))
            }
            Self::PartialMove { source_entity, .. } => Some(
                ErrorContext::new("move_records")
                    .with_entity(*source_entity)
                    .with_message("records removed from source were not recreated"),
            ),
            _ => None,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(err) => err.error_code(),
            Self::DerivedWrite(err) => err.error_code(),
            Self::Application(err) => err.error_code(),
            Self::CollectionFull { .. } => "KERNEL_COLLECTION_FULL",
            Self::PartialMove { .. } => "KERNEL_PARTIAL_MOVE",
            Self::HookChainTooDeep { .. } => "KERNEL_HOOK_CHAIN_TOO_DEEP",
            Self::HookFailed { .. } => "KERNEL_HOOK_FAILED",
            Self::Oracle(err) => err.error_code(),
            Self::Snapshot(_) => "KERNEL_SNAPSHOT_FAILED",
        }
    }
}
