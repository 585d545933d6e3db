//! Cross-entity transactions: purchase, sale and transfer.
//!
//! Each operation validates read-only, snapshots its participants, runs a
//! fixed sequence of kernel calls, and on failure restores every participant
//! from the snapshot.

mod coordinator;
mod error;
mod types;

pub use coordinator::TransactionCoordinator;
pub use error::{RollbackCompoundError, RollbackFailure, TransactionError, TransactionValidation};
pub use types::{
    PurchaseRequest, SaleRequest, TransactionKind, TransactionReceipt, TransferRequest,
};
