//! Damage dice expressions (`2d6+3`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error parsing a dice expression.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DiceError {
    #[error("malformed dice expression '{0}'")]
    Malformed(String),

    #[error("dice expression '{0}' has zero-sided dice")]
    ZeroSides(String),
}

/// `count` dice with `sides` faces plus a flat `bonus`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiceFormula {
    pub count: u32,
    pub sides: u32,
    pub bonus: i32,
}

impl DiceFormula {
    pub const fn new(count: u32, sides: u32, bonus: i32) -> Self {
        Self {
            count,
            sides,
            bonus,
        }
    }

    /// A flat amount with no dice.
    pub const fn flat(bonus: i32) -> Self {
        Self::new(0, 0, bonus)
    }

    pub fn min(&self) -> u32 {
        clamp_total(i64::from(self.count) + i64::from(self.bonus))
    }

    pub fn max(&self) -> u32 {
        clamp_total(i64::from(self.count) * i64::from(self.sides) + i64::from(self.bonus))
    }

    /// Rolls every die through `roll_die(index, sides)` and adds the bonus.
    ///
    /// The total never goes below zero.
    pub fn roll_with<E>(
        &self,
        mut roll_die: impl FnMut(u32, u32) -> Result<u32, E>,
    ) -> Result<u32, E> {
        let mut total = i64::from(self.bonus);
        for index in 0..self.count {
            total += i64::from(roll_die(index, self.sides)?);
        }
        Ok(clamp_total(total))
    }
}

fn clamp_total(total: i64) -> u32 {
    u32::try_from(total.max(0)).unwrap_or(u32::MAX)
}

impl FromStr for DiceFormula {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let malformed = || DiceError::Malformed(s.to_owned());
        if text.is_empty() {
            return Err(malformed());
        }

        let Some(d) = text.find(['d', 'D']) else {
            return text.parse::<i32>().map(Self::flat).map_err(|_| malformed());
        };

        let count = match &text[..d] {
            "" => 1,
            digits => digits.parse::<u32>().map_err(|_| malformed())?,
        };
        let rest = &text[d + 1..];
        let split = rest.find(['+', '-']).unwrap_or(rest.len());
        let sides = rest[..split].parse::<u32>().map_err(|_| malformed())?;
        let bonus = match &rest[split..] {
            "" => 0,
            signed => signed.parse::<i32>().map_err(|_| malformed())?,
        };

        if sides == 0 && count > 0 {
            return Err(DiceError::ZeroSides(s.to_owned()));
        }
        Ok(Self::new(count, sides, bonus))
    }
}

impl TryFrom<String> for DiceFormula {
    type Error = DiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DiceFormula> for String {
    fn from(value: DiceFormula) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DiceFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            return write!(f, "{}", self.bonus);
        }
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.bonus {
            0 => Ok(()),
            b if b > 0 => write!(f, "+{b}"),
            b => write!(f, "{b}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_forms() {
        assert_eq!("2d6+3".parse(), Ok(DiceFormula::new(2, 6, 3)));
        assert_eq!("d8".parse(), Ok(DiceFormula::new(1, 8, 0)));
        assert_eq!("4d10 - 2".parse(), Ok(DiceFormula::new(4, 10, -2)));
        assert_eq!("5".parse(), Ok(DiceFormula::flat(5)));
        assert!(matches!("2x6".parse::<DiceFormula>(), Err(DiceError::Malformed(_))));
        assert!(matches!("2d0".parse::<DiceFormula>(), Err(DiceError::ZeroSides(_))));
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!(DiceFormula::new(3, 8, -1).to_string(), "3d8-1");
        assert_eq!(DiceFormula::new(1, 6, 0).to_string(), "1d6");
        assert_eq!(DiceFormula::flat(4).to_string(), "4");
    }

    #[test]
    fn roll_never_negative() {
        let formula = DiceFormula::new(2, 4, -10);
        let total: Result<u32, ()> = formula.roll_with(|_, _| Ok(1));
        assert_eq!(total, Ok(0));
        assert_eq!(formula.max(), 0);
        assert_eq!(DiceFormula::new(2, 6, 3).max(), 15);
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&DiceFormula::new(2, 6, 1)).unwrap();
        assert_eq!(json, "\"2d6+1\"");
        let back: DiceFormula = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DiceFormula::new(2, 6, 1));
    }
}
