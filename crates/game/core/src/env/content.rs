use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::{Collection, RecordData};

/// Stable identifier of a content definition (`"feat.power_attack"`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub String);

impl FeatureId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// A content definition a progression delta can grant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureDefinition {
    pub id: FeatureId,
    pub collection: Collection,
    pub name: String,
    #[serde(default)]
    pub payload: Value,
}

impl FeatureDefinition {
    /// Record content created when this feature is granted.
    pub fn to_record(&self) -> RecordData {
        RecordData::new(self.name.clone()).with_payload(self.payload.clone())
    }
}

/// Read-only access to feature content (feats, talents, items, powers).
pub trait ContentOracle: Send + Sync {
    fn feature(&self, collection: Collection, id: &FeatureId) -> Option<FeatureDefinition>;
}
