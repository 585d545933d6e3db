//! Point-in-time copies of entities with a content digest.
//!
//! The transaction coordinator snapshots every participant before executing
//! and restores from these copies on failure. The digest lets it confirm the
//! restore actually reproduced the snapshotted state.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{EntityId, EntityState};

/// SHA-256 over the bincode encoding of an entity's persistent fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateDigest(pub [u8; 32]);

impl StateDigest {
    /// Hashes the persistent state of `entity`.
    pub fn of(entity: &EntityState) -> Result<Self, SnapshotError> {
        let bytes = bincode::serialize(entity).map_err(|err| SnapshotError::Encode {
            entity: entity.id,
            message: err.to_string(),
        })?;
        Ok(Self(Sha256::digest(&bytes).into()))
    }

    /// Full lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for StateDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateDigest({self})")
    }
}

impl fmt::Display for StateDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..8]))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to encode entity {entity}: {message}")]
    Encode { entity: EntityId, message: String },
}

/// Deep copy of one entity's persistent state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity: EntityState,
    pub digest: StateDigest,
}

impl EntitySnapshot {
    pub fn capture(entity: &EntityState) -> Result<Self, SnapshotError> {
        Ok(Self {
            entity: entity.clone(),
            digest: StateDigest::of(entity)?,
        })
    }

    pub fn id(&self) -> EntityId {
        self.entity.id
    }

    /// True when `current` hashes to the snapshotted digest.
    pub fn matches(&self, current: &EntityState) -> Result<bool, SnapshotError> {
        Ok(StateDigest::of(current)? == self.digest)
    }
}
