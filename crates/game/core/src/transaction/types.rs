use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::state::{EntityId, RecordId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionKind {
    Purchase,
    Sale,
    Transfer,
}

/// `buyer` pays `price` credits to `seller` for one of the seller's items.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub buyer: EntityId,
    pub seller: EntityId,
    pub item: RecordId,
    pub price: i64,
}

/// `seller` sells one item to a vendor outside the world for `price` credits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRequest {
    pub seller: EntityId,
    pub item: RecordId,
    pub price: i64,
}

/// Moves one item between two entities without payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from: EntityId,
    pub to: EntityId,
    pub item: RecordId,
}

/// Record of a completed transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub kind: TransactionKind,
    pub participants: Vec<EntityId>,
    /// The item as it was identified on its original owner.
    pub item: RecordId,
    /// The item's id on its new owner, if it has one.
    pub new_item: Option<RecordId>,
    pub price: u64,
    pub timestamp: DateTime<Utc>,
}
