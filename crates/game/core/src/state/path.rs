//! Dot-separated field paths addressing persistent entity fields.
//!
//! Paths are parsed into [`FieldPath`] before anything is written, so a
//! mutation with one bad path never touches the entity. Paths under
//! `derived.` are recognized separately: they name real values, but those
//! values belong to the recompute pass and can never be set.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use super::delta::EntityFields;
use super::types::{Ability, EntityState, ShieldZone, SizeCategory, Subsystem, SubsystemTier};

/// Prefix reserved for computed values.
pub const DERIVED_PREFIX: &str = "derived.";

/// One of the three defenses carrying a stored misc bonus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Defense {
    Reflex,
    Fortitude,
    Will,
}

/// A writable persistent field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldPath {
    Name,
    Level,
    Size,
    Speed,
    Credits,
    HpCurrent,
    HpMax,
    ConditionStep,
    ForcePoints,
    DestinyPoints,
    Ability(Ability),
    DefenseMisc(Defense),
    ThresholdMisc,
    ShieldRating,
    ShieldZone(ShieldZone),
    Subsystem(Subsystem),
}

/// Why a path or value was rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("'{path}' is a derived field")]
    Derived { path: String },

    #[error("unknown field path '{path}'")]
    Unknown { path: String },

    #[error("'{path}' expects {expected}")]
    TypeMismatch { path: String, expected: &'static str },

    #[error("'{path}' does not exist on this entity")]
    NotApplicable { path: String },
}

impl PathError {
    pub fn is_derived(&self) -> bool {
        matches!(self, Self::Derived { .. })
    }
}

impl FieldPath {
    /// Parses a dot path, distinguishing derived paths from unknown ones.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.starts_with(DERIVED_PREFIX) {
            return Err(PathError::Derived {
                path: path.to_owned(),
            });
        }

        let parsed = match path {
            "name" => Self::Name,
            "level" => Self::Level,
            "size" => Self::Size,
            "speed" => Self::Speed,
            "credits" => Self::Credits,
            "hp.current" => Self::HpCurrent,
            "hp.max" => Self::HpMax,
            "condition.step" => Self::ConditionStep,
            "force.points" => Self::ForcePoints,
            "destiny.points" => Self::DestinyPoints,
            "threshold.misc" => Self::ThresholdMisc,
            "shields.rating" => Self::ShieldRating,
            "defenses.reflex.misc" => Self::DefenseMisc(Defense::Reflex),
            "defenses.fortitude.misc" => Self::DefenseMisc(Defense::Fortitude),
            "defenses.will.misc" => Self::DefenseMisc(Defense::Will),
            other => return Self::parse_keyed(other),
        };
        Ok(parsed)
    }

    fn parse_keyed(path: &str) -> Result<Self, PathError> {
        let unknown = || PathError::Unknown {
            path: path.to_owned(),
        };
        let (head, key) = path.split_once('.').ok_or_else(unknown)?;
        match head {
            "abilities" => Ability::from_str(key).map(Self::Ability).map_err(|_| unknown()),
            "shields" => ShieldZone::from_str(key)
                .map(Self::ShieldZone)
                .map_err(|_| unknown()),
            "subsystems" => Subsystem::from_str(key)
                .map(Self::Subsystem)
                .map_err(|_| unknown()),
            _ => Err(unknown()),
        }
    }

    /// Change bits an assignment to this path sets.
    pub fn fields(self) -> EntityFields {
        match self {
            Self::Name | Self::Level | Self::Size => EntityFields::IDENTITY,
            Self::Speed => EntityFields::SPEED,
            Self::Credits => EntityFields::CREDITS,
            Self::HpCurrent | Self::HpMax => EntityFields::HIT_POINTS,
            Self::ConditionStep => EntityFields::CONDITION,
            Self::ForcePoints | Self::DestinyPoints => EntityFields::RESOURCES,
            Self::Ability(_) => EntityFields::ABILITIES,
            Self::DefenseMisc(_) | Self::ThresholdMisc => EntityFields::DEFENSES,
            Self::ShieldRating | Self::ShieldZone(_) => EntityFields::SHIELDS,
            Self::Subsystem(_) => EntityFields::SUBSYSTEMS,
        }
    }

    /// Writes `value` into `entity`.
    ///
    /// Only checks the value's type and range for the field; cross-field
    /// invariants are the caller's job after all writes are staged.
    pub fn write(self, entity: &mut EntityState, value: &Value) -> Result<(), PathError> {
        match self {
            Self::Name => entity.name = self.string(value)?.to_owned(),
            Self::Level => entity.level = self.unsigned(value)?,
            Self::Size => {
                entity.size = SizeCategory::from_str(self.string(value)?)
                    .map_err(|_| self.mismatch("a size category"))?;
            }
            Self::Speed => entity.speed = self.unsigned(value)?,
            Self::Credits => {
                entity.credits = value
                    .as_u64()
                    .ok_or_else(|| self.mismatch("a non-negative integer"))?;
            }
            Self::HpCurrent => entity.hit_points.current = self.unsigned(value)?,
            Self::HpMax => entity.hit_points.max = self.unsigned(value)?,
            Self::ConditionStep => {
                entity.condition.0 = u8::try_from(self.unsigned(value)?)
                    .map_err(|_| self.mismatch("a condition step"))?;
            }
            Self::ForcePoints => entity.force_points = self.unsigned(value)?,
            Self::DestinyPoints => entity.destiny_points = self.unsigned(value)?,
            Self::Ability(ability) => *entity.abilities.get_mut(ability) = self.signed(value)?,
            Self::DefenseMisc(defense) => {
                let misc = self.signed(value)?;
                match defense {
                    Defense::Reflex => entity.defense_misc.reflex = misc,
                    Defense::Fortitude => entity.defense_misc.fortitude = misc,
                    Defense::Will => entity.defense_misc.will = misc,
                }
            }
            Self::ThresholdMisc => entity.defense_misc.threshold = self.signed(value)?,
            Self::ShieldRating => {
                let rating = self.unsigned(value)?;
                entity
                    .shields
                    .as_mut()
                    .ok_or_else(|| self.not_applicable())?
                    .rating = rating;
            }
            Self::ShieldZone(zone) => {
                let pool = self.unsigned(value)?;
                entity
                    .shields
                    .as_mut()
                    .ok_or_else(|| self.not_applicable())?
                    .set_zone(zone, pool);
            }
            Self::Subsystem(subsystem) => {
                let tier = SubsystemTier::from_str(self.string(value)?)
                    .map_err(|_| self.mismatch("a subsystem tier"))?;
                entity
                    .subsystems
                    .as_mut()
                    .ok_or_else(|| self.not_applicable())?
                    .set_tier(subsystem, tier);
            }
        }
        Ok(())
    }

    /// Reads the current value, or `None` when the field does not exist on this entity.
    pub fn read(self, entity: &EntityState) -> Option<Value> {
        let value = match self {
            Self::Name => Value::from(entity.name.clone()),
            Self::Level => Value::from(entity.level),
            Self::Size => Value::from(entity.size.to_string()),
            Self::Speed => Value::from(entity.speed),
            Self::Credits => Value::from(entity.credits),
            Self::HpCurrent => Value::from(entity.hit_points.current),
            Self::HpMax => Value::from(entity.hit_points.max),
            Self::ConditionStep => Value::from(entity.condition.0),
            Self::ForcePoints => Value::from(entity.force_points),
            Self::DestinyPoints => Value::from(entity.destiny_points),
            Self::Ability(ability) => Value::from(entity.abilities.get(ability)),
            Self::DefenseMisc(Defense::Reflex) => Value::from(entity.defense_misc.reflex),
            Self::DefenseMisc(Defense::Fortitude) => Value::from(entity.defense_misc.fortitude),
            Self::DefenseMisc(Defense::Will) => Value::from(entity.defense_misc.will),
            Self::ThresholdMisc => Value::from(entity.defense_misc.threshold),
            Self::ShieldRating => Value::from(entity.shields.as_ref()?.rating),
            Self::ShieldZone(zone) => Value::from(entity.shields.as_ref()?.zone(zone)),
            Self::Subsystem(subsystem) => {
                Value::from(entity.subsystems.as_ref()?.tier(subsystem).to_string())
            }
        };
        Some(value)
    }

    fn string<'v>(self, value: &'v Value) -> Result<&'v str, PathError> {
        value.as_str().ok_or_else(|| self.mismatch("a string"))
    }

    fn unsigned(self, value: &Value) -> Result<u32, PathError> {
        value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| self.mismatch("a non-negative integer"))
    }

    fn signed(self, value: &Value) -> Result<i32, PathError> {
        value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| self.mismatch("an integer"))
    }

    fn mismatch(self, expected: &'static str) -> PathError {
        PathError::TypeMismatch {
            path: self.to_string(),
            expected,
        }
    }

    fn not_applicable(self) -> PathError {
        PathError::NotApplicable {
            path: self.to_string(),
        }
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => f.write_str("name"),
            Self::Level => f.write_str("level"),
            Self::Size => f.write_str("size"),
            Self::Speed => f.write_str("speed"),
            Self::Credits => f.write_str("credits"),
            Self::HpCurrent => f.write_str("hp.current"),
            Self::HpMax => f.write_str("hp.max"),
            Self::ConditionStep => f.write_str("condition.step"),
            Self::ForcePoints => f.write_str("force.points"),
            Self::DestinyPoints => f.write_str("destiny.points"),
            Self::Ability(ability) => write!(f, "abilities.{ability}"),
            Self::DefenseMisc(Defense::Reflex) => f.write_str("defenses.reflex.misc"),
            Self::DefenseMisc(Defense::Fortitude) => f.write_str("defenses.fortitude.misc"),
            Self::DefenseMisc(Defense::Will) => f.write_str("defenses.will.misc"),
            Self::ThresholdMisc => f.write_str("threshold.misc"),
            Self::ShieldRating => f.write_str("shields.rating"),
            Self::ShieldZone(zone) => write!(f, "shields.{zone}"),
            Self::Subsystem(subsystem) => write!(f, "subsystems.{subsystem}"),
        }
    }
}

/// True for JSON scalars: null, bool, number or string.
///
/// Progression deltas are pure data and may only carry literal values.
pub fn is_literal(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_every_path_it_prints() {
        for path in [
            "name",
            "hp.current",
            "condition.step",
            "abilities.dexterity",
            "defenses.will.misc",
            "shields.starboard",
            "subsystems.life_support",
        ] {
            let parsed = FieldPath::parse(path).expect("known path");
            assert_eq!(parsed.to_string(), path);
        }
    }

    #[test]
    fn derived_and_unknown_paths_are_distinct() {
        assert!(FieldPath::parse("derived.reflex").unwrap_err().is_derived());
        assert!(matches!(
            FieldPath::parse("hp.temporary"),
            Err(PathError::Unknown { .. })
        ));
        assert!(matches!(
            FieldPath::parse("abilities.luck"),
            Err(PathError::Unknown { .. })
        ));
    }

    #[test]
    fn write_checks_value_type() {
        let mut hero = EntityState::character("Kell");
        assert!(FieldPath::HpCurrent.write(&mut hero, &json!(-3)).is_err());
        assert!(FieldPath::Name.write(&mut hero, &json!(4)).is_err());
        FieldPath::Ability(Ability::Strength)
            .write(&mut hero, &json!(16))
            .expect("integer accepted");
        assert_eq!(hero.abilities.strength, 16);
    }

    #[test]
    fn vehicle_only_fields_reject_characters() {
        let mut hero = EntityState::character("Kell");
        let err = FieldPath::Subsystem(Subsystem::Engines)
            .write(&mut hero, &json!("damaged"))
            .unwrap_err();
        assert!(matches!(err, PathError::NotApplicable { .. }));

        let mut ship = EntityState::vehicle("Skiff");
        FieldPath::Subsystem(Subsystem::Engines)
            .write(&mut ship, &json!("damaged"))
            .expect("vehicle has engines");
        assert_eq!(
            FieldPath::Subsystem(Subsystem::Engines).read(&ship),
            Some(json!("damaged"))
        );
    }

    #[test]
    fn literals_exclude_containers() {
        assert!(is_literal(&json!(3)));
        assert!(is_literal(&json!("x")));
        assert!(!is_literal(&json!([1])));
        assert!(!is_literal(&json!({"a": 1})));
    }
}
