//! Progression deltas: pure-data level-up and template changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::plan::FieldMap;
use crate::env::FeatureId;
use crate::state::{Collection, EntityFields, EntityId, FeatureRecord, RecordId};

/// Changes granted by progression. Applied in the order delete, set, add.
///
/// `add` names content definitions resolved through the content oracle.
/// `set` values must be JSON literals.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionDelta {
    pub set: FieldMap,
    pub add: BTreeMap<Collection, Vec<FeatureId>>,
    pub delete: BTreeMap<Collection, Vec<RecordId>>,
}

impl ProgressionDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.set.insert(path.into(), value.into());
        self
    }

    pub fn grant(mut self, collection: Collection, id: impl Into<FeatureId>) -> Self {
        self.add.entry(collection).or_default().push(id.into());
        self
    }

    pub fn revoke(mut self, collection: Collection, id: RecordId) -> Self {
        self.delete.entry(collection).or_default().push(id);
        self
    }
}

/// What an applied delta did.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaOutcome {
    pub entity: EntityId,
    pub deleted: Vec<FeatureRecord>,
    pub added: Vec<RecordId>,
    pub fields: EntityFields,
    /// Set when the delta was suppressed by a reentry guard.
    pub prevented: bool,
}
