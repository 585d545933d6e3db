pub mod common;
pub mod entity;
pub mod record;
pub mod status;
pub mod subsystem;

pub use common::{Ability, AbilityScores, EntityId, EntityKind, RecordId, ScaleClass, SizeCategory};
pub use entity::{
    ConditionStep, DefenseMisc, EntitySeed, EntityState, HitPoints, ShieldState, ShieldZone,
};
pub use record::{
    Collection, EntityRef, FeatureRecord, FeatureRecords, RecordData, RecordUpdate,
};
pub use status::{StatusMarker, StatusMarkers};
pub use subsystem::{Subsystem, SubsystemMap, SubsystemTier};
