//! Severity and context shared by every saga-core error.
//!
//! `KernelError`, `CombatError`, `AbilityError` and `TransactionError` live next to
//! the operations that raise them. They all implement [`GameError`], so the runtime
//! can forward a severity without knowing which subsystem failed.

use serde::{Deserialize, Serialize};

use crate::state::EntityId;

/// Severity level of an error, used for categorization and recovery strategies.
///
/// Errors are classified by their recoverability and expected handling:
/// - **Recoverable**: Temporary conditions that may succeed on retry or with alternative input
/// - **Validation**: Invalid input that should be rejected without retry
/// - **Internal**: Unexpected state inconsistencies that require investigation
/// - **Fatal**: Architecture violations or corrupted state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Recoverable error - can retry with same or alternative input.
    ///
    /// Examples: collection full, insufficient credits
    Recoverable,

    /// Validation error - invalid input, should not retry without changes.
    ///
    /// Examples: entity not found, unknown field path
    Validation,

    /// Internal error - unexpected state inconsistency.
    ///
    /// Examples: partial cross-entity move, hook chain overflow
    Internal,

    /// Fatal error - architecture violated or compensation failed.
    ///
    /// Examples: write to a derived field, failed rollback
    Fatal,
}

impl ErrorSeverity {
    /// Returns a human-readable description of this severity level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    /// Returns true if this error is potentially recoverable.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    /// Returns true if this error indicates a bug or a broken invariant.
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal | Self::Fatal)
    }
}

/// Contextual information attached to errors for debugging and diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorContext {
    /// Entity the failing operation targeted (if applicable).
    pub entity: Option<EntityId>,

    /// Kernel or coordinator operation name.
    pub operation: &'static str,

    /// Optional static message providing additional context.
    pub message: Option<&'static str>,
}

impl ErrorContext {
    /// Creates a new error context for the given operation.
    #[must_use]
    pub const fn new(operation: &'static str) -> Self {
        Self {
            entity: None,
            operation,
            message: None,
        }
    }

    /// Attaches an entity to this context (builder pattern).
    #[must_use]
    pub const fn with_entity(mut self, entity: EntityId) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Attaches a static message to this context (builder pattern).
    #[must_use]
    pub const fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }
}

/// Common trait for all saga-core errors.
///
/// # Implementation Guidelines
///
/// - All error enums should implement this trait
/// - Use `#[derive(thiserror::Error)]` for Display/Error impl
/// - Classify severity based on recoverability, not impact
pub trait GameError: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns the context information for this error, if available.
    fn context(&self) -> Option<ErrorContext> {
        None
    }

    /// Returns a static string identifier for this error variant.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}
