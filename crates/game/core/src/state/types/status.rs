//! Terminal status markers.
//!
//! Death, destruction and unconsciousness are named markers rather than raw
//! boolean fields, so other systems can ask "is this entity dead" without
//! knowing which field path encodes it. Markers are applied at most once;
//! inserting a marker that is already present is a no-op.

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::config::GameConfig;

/// A named terminal or incapacitating state.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusMarker {
    /// Creature or character killed outright.
    Dead,
    /// Knocked out: at 0 hit points without a lethal hit, or helpless on the condition track.
    Unconscious,
    /// Vehicle reduced to 0 hit points.
    Destroyed,
    /// Vehicle at the bottom of the condition track.
    Disabled,
}

/// Markers currently applied to an entity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMarkers {
    markers: ArrayVec<StatusMarker, { GameConfig::MAX_STATUS_MARKERS }>,
}

impl StatusMarkers {
    /// Creates an empty marker set.
    pub fn empty() -> Self {
        Self {
            markers: ArrayVec::new(),
        }
    }

    /// Checks whether a marker is present.
    pub fn has(&self, marker: StatusMarker) -> bool {
        self.markers.contains(&marker)
    }

    /// Inserts a marker. Returns `false` when it was already present.
    ///
    /// The set holds every variant at most once, so capacity is never exceeded.
    pub fn insert(&mut self, marker: StatusMarker) -> bool {
        if self.has(marker) {
            return false;
        }
        self.markers.push(marker);
        true
    }

    /// Removes a marker if present.
    pub fn remove(&mut self, marker: StatusMarker) -> bool {
        let before = self.markers.len();
        self.markers.retain(|m| *m != marker);
        before != self.markers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusMarker> {
        self.markers.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// True when the entity is out of the fight for any reason.
    pub fn is_incapacitated(&self) -> bool {
        !self.markers.is_empty()
    }
}
