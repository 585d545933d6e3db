//! Error types for multi-entity transactions.

use super::types::TransactionKind;
use crate::error::{ErrorContext, ErrorSeverity, GameError};
use crate::kernel::KernelError;
use crate::state::{EntityId, RecordId, SnapshotError};

/// Preconditions checked before anything is snapshotted or written.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransactionValidation {
    #[error("entity {0} not found")]
    UnknownParticipant(EntityId),

    #[error("entity {0} cannot trade with itself")]
    SameParticipant(EntityId),

    #[error("price must not be negative (got {0})")]
    NegativePrice(i64),

    #[error("entity {buyer} has {credits} credits, needs {price}")]
    InsufficientCredits {
        buyer: EntityId,
        credits: u64,
        price: u64,
    },

    #[error("crediting {price} would overflow entity {entity}'s credits")]
    CreditOverflow { entity: EntityId, price: u64 },

    #[error("entity {owner} has no item {item}")]
    ItemNotFound { owner: EntityId, item: RecordId },
}

/// Why restoring one participant failed.
#[derive(Clone, Debug, thiserror::Error)]
pub enum RollbackFailure {
    #[error("restore failed: {0}")]
    Restore(KernelError),

    #[error("restored state does not match the snapshot digest")]
    DigestMismatch,

    #[error("entity vanished during rollback")]
    Missing,

    #[error(transparent)]
    Snapshot(SnapshotError),
}

/// A step failed and the compensating restore failed too.
///
/// Carries both causes. The participants listed in `failures` may hold
/// partially applied state.
#[derive(Clone, Debug, thiserror::Error)]
#[error("{kind} rollback failed after step '{step}' ({original}); {} participant(s) not restored", .failures.len())]
pub struct RollbackCompoundError {
    pub kind: TransactionKind,
    pub step: &'static str,
    pub original: KernelError,
    pub failures: Vec<(EntityId, RollbackFailure)>,
}

#[derive(Clone, Debug, thiserror::Error)]
pub enum TransactionError {
    #[error(transparent)]
    Validation(#[from] TransactionValidation),

    /// A step failed; every participant was restored and verified.
    #[error("{kind} failed at step '{step}' and was rolled back: {cause}")]
    Execution {
        kind: TransactionKind,
        step: &'static str,
        #[source]
        cause: KernelError,
    },

    #[error(transparent)]
    RollbackFailed(Box<RollbackCompoundError>),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl TransactionError {
    /// The step that failed, when execution got that far.
    pub fn failed_step(&self) -> Option<&'static str> {
        match self {
            Self::Execution { step, .. } => Some(step),
            Self::RollbackFailed(compound) => Some(compound.step),
            _ => None,
        }
    }
}

impl GameError for TransactionError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Validation(TransactionValidation::InsufficientCredits { .. }) => {
                ErrorSeverity::Recoverable
            }
            Self::Validation(_) => ErrorSeverity::Validation,
            Self::Execution { .. } => ErrorSeverity::Recoverable,
            Self::RollbackFailed(_) => ErrorSeverity::Fatal,
            Self::Snapshot(_) => ErrorSeverity::Internal,
        }
    }

    fn context(&self) -> Option<ErrorContext> {
        match self {
            Self::Execution { cause, .. } => cause
                .context()
                .or_else(|| Some(ErrorContext::new("transaction"))),
            Self::RollbackFailed(compound) => {
                let context = ErrorContext::new("transaction_rollback");
                Some(match compound.failures.first() {
                    Some((entity, _)) => context.with_entity(*entity),
                    None => context,
                })
            }
            _ => None,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "TRANSACTION_INVALID",
            Self::Execution { .. } => "TRANSACTION_ROLLED_BACK",
            Self::RollbackFailed(_) => "TRANSACTION_ROLLBACK_FAILED",
            Self::Snapshot(_) => "TRANSACTION_SNAPSHOT",
        }
    }
}
