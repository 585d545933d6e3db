//! Multi-bucket mutation plans.
//!
//! A plan is applied strictly in the order create, delete, set, add no
//! matter how the caller built it. Buckets are typed fields rather than an
//! ordered list, so there is no input ordering to get wrong.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::{Collection, EntityFields, EntityId, EntitySeed, FeatureRecord, RecordData, RecordId};

/// Field path to new value.
pub type FieldMap = BTreeMap<String, Value>;

/// One entity to create, addressable by a plan-local temporary id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateEntity {
    pub temporary_id: String,
    pub data: EntitySeed,
}

/// Entities to create before anything else runs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateBucket {
    pub entities: Vec<CreateEntity>,
}

/// Ordered multi-bucket mutation against one target entity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationPlan {
    pub create: Option<CreateBucket>,
    pub delete: BTreeMap<Collection, Vec<RecordId>>,
    pub set: FieldMap,
    pub add: BTreeMap<Collection, Vec<RecordData>>,
}

impl MutationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(mut self, temporary_id: impl Into<String>, data: EntitySeed) -> Self {
        self.create
            .get_or_insert_with(CreateBucket::default)
            .entities
            .push(CreateEntity {
                temporary_id: temporary_id.into(),
                data,
            });
        self
    }

    pub fn delete(mut self, collection: Collection, id: RecordId) -> Self {
        self.delete.entry(collection).or_default().push(id);
        self
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(path.into(), value.into());
        self
    }

    pub fn add(mut self, collection: Collection, record: RecordData) -> Self {
        self.add.entry(collection).or_default().push(record);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.create.as_ref().is_none_or(|c| c.entities.is_empty())
            && self.delete.values().all(Vec::is_empty)
            && self.set.is_empty()
            && self.add.values().all(Vec::is_empty)
    }
}

/// What a successfully applied plan did.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub entity: EntityId,
    /// Temporary id to the real id it was assigned.
    pub created: BTreeMap<String, EntityId>,
    pub deleted: Vec<FeatureRecord>,
    pub added: Vec<RecordId>,
    pub fields: EntityFields,
    /// Set when the plan was suppressed by a reentry guard.
    pub prevented: bool,
}
