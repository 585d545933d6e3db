//! Damage scaling across size classes.

use crate::env::TablesOracle;
use crate::state::SizeCategory;

/// Scales `raw` damage for an attacker of one size hitting a target of another.
///
/// Pure and table driven: the factor comes from the tables oracle and the
/// result is floor divided, never below zero.
pub fn scale_damage<T>(tables: &T, attacker: SizeCategory, target: SizeCategory, raw: u32) -> u32
where
    T: TablesOracle + ?Sized,
{
    tables
        .scale_factor(attacker.scale(), target.scale())
        .apply(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::RulesTables;

    #[test]
    fn same_class_is_identity() {
        let tables = RulesTables::default();
        assert_eq!(scale_damage(&tables, SizeCategory::Medium, SizeCategory::Large, 17), 17);
    }

    #[test]
    fn character_weapons_barely_scratch_starships() {
        let tables = RulesTables::default();
        assert_eq!(scale_damage(&tables, SizeCategory::Medium, SizeCategory::Cruiser, 19), 1);
        assert_eq!(scale_damage(&tables, SizeCategory::Medium, SizeCategory::Gargantuan, 15), 7);
    }

    #[test]
    fn starship_guns_multiply_against_characters() {
        let tables = RulesTables::default();
        assert_eq!(scale_damage(&tables, SizeCategory::Frigate, SizeCategory::Medium, 3), 30);
        assert_eq!(scale_damage(&tables, SizeCategory::Frigate, SizeCategory::Colossal, 3), 6);
    }
}
