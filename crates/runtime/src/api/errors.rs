//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from worker coordination and from the kernel, combat,
//! ability and transaction layers so callers can bubble them up with
//! consistent context.
use thiserror::Error;
use tokio::sync::oneshot;

use saga_core::{
    AbilityError, CombatError, ErrorSeverity, GameError, KernelError, TransactionError,
};

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("kernel worker command channel closed")]
    CommandChannelClosed,

    #[error("kernel worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("kernel worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Combat(#[from] CombatError),

    #[error(transparent)]
    Ability(#[from] AbilityError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl RuntimeError {
    /// Severity of the underlying game error; channel failures are fatal.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::CommandChannelClosed | Self::ReplyChannelClosed(_) | Self::WorkerJoin(_) => {
                ErrorSeverity::Fatal
            }
            Self::Kernel(err) => err.severity(),
            Self::Combat(err) => err.severity(),
            Self::Ability(err) => err.severity(),
            Self::Transaction(err) => err.severity(),
        }
    }

    /// True when the request was rejected before anything changed.
    pub fn is_validation(&self) -> bool {
        self.severity() == ErrorSeverity::Validation
    }
}
