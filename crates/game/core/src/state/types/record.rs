//! Feature records: feats, talents, items and other child records.
//!
//! A record is owned by exactly one entity and is only created, updated or
//! deleted through the mutation kernel. The payload is opaque to the core;
//! feature-effect logic outside the kernel interprets it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString};

use super::common::{EntityId, RecordId};

/// Named collection a record lives in.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Collection {
    Feats,
    Talents,
    Items,
    ForcePowers,
    Weapons,
}

/// Reference to an entity from inside a plan.
///
/// `Temporary` names an entity created by the same plan's `create` bucket and
/// is rewritten to the real id before any record referencing it is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRef {
    Id(EntityId),
    Temporary(String),
}

/// A live record owned by an entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: RecordId,
    pub kind: Collection,
    pub name: String,
    #[serde(default)]
    pub payload: Value,
    /// Entity this record points at (crew seat, companion, owned vehicle).
    #[serde(default)]
    pub linked: Option<EntityId>,
}

impl FeatureRecord {
    /// Strips the identity, keeping everything needed to recreate the record elsewhere.
    pub fn to_data(&self) -> RecordData {
        RecordData {
            name: self.name.clone(),
            payload: self.payload.clone(),
            linked: self.linked.map(EntityRef::Id),
        }
    }

    /// True when two records carry the same content regardless of id.
    pub fn same_content(&self, other: &FeatureRecord) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.payload == other.payload
            && self.linked == other.linked
    }
}

/// Caller-supplied content for a record that does not exist yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordData {
    pub name: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub linked: Option<EntityRef>,
}

impl RecordData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: Value::Null,
            linked: None,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn linked_to(mut self, target: EntityRef) -> Self {
        self.linked = Some(target);
        self
    }
}

/// Replacement values for an existing record; `None` leaves a field unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub id: RecordId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

/// All records of one entity, grouped by collection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecords {
    collections: BTreeMap<Collection, Vec<FeatureRecord>>,
}

impl FeatureRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, collection: Collection) -> &[FeatureRecord] {
        self.collections
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn find(&self, collection: Collection, id: RecordId) -> Option<&FeatureRecord> {
        self.get(collection).iter().find(|r| r.id == id)
    }

    pub fn find_by_name(&self, collection: Collection, name: &str) -> Option<&FeatureRecord> {
        self.get(collection).iter().find(|r| r.name == name)
    }

    pub fn contains(&self, collection: Collection, id: RecordId) -> bool {
        self.find(collection, id).is_some()
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.get(collection).len()
    }

    pub fn total(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Collection, &FeatureRecord)> {
        self.collections
            .iter()
            .flat_map(|(c, records)| records.iter().map(move |r| (*c, r)))
    }

    pub(crate) fn push(&mut self, record: FeatureRecord) {
        self.collections.entry(record.kind).or_default().push(record);
    }

    pub(crate) fn remove(&mut self, collection: Collection, id: RecordId) -> Option<FeatureRecord> {
        let records = self.collections.get_mut(&collection)?;
        let index = records.iter().position(|r| r.id == id)?;
        let removed = records.remove(index);
        if records.is_empty() {
            self.collections.remove(&collection);
        }
        Some(removed)
    }

    pub(crate) fn find_mut(
        &mut self,
        collection: Collection,
        id: RecordId,
    ) -> Option<&mut FeatureRecord> {
        self.collections
            .get_mut(&collection)?
            .iter_mut()
            .find(|r| r.id == id)
    }

    /// Highest record id in use, used to keep the world allocator ahead of loaded data.
    pub(crate) fn max_id(&self) -> Option<RecordId> {
        self.iter().map(|(_, r)| r.id).max()
    }
}
