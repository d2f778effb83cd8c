//! Damage rolls and mitigation
//!
//! - Critical hits double the number of dice, never the modifier
//! - The stat modifier is applied once per roll
//! - Every roll deals at least 1 damage
//! - Incoming hits on a player are reduced by half their defense, floored at 1

use serde::Serialize;

use super::dice::{total_of, DiceRoll, DiceSource, MAX_DICE_COUNT};

/// Outcome of a damage roll
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DamageRoll {
    /// Individual die faces
    pub faces: Vec<u32>,
    /// Flat modifier (die modifier plus stat modifier)
    pub modifier: i32,
    /// Whether the dice were doubled by a critical
    pub critical: bool,
    /// Final damage, at least 1
    pub total: i32,
}

impl DamageRoll {
    /// Roll `die` with an extra stat modifier
    pub fn roll(
        dice: &mut dyn DiceSource,
        die: &DiceRoll,
        stat_modifier: i32,
        critical: bool,
    ) -> Self {
        let count = die.count.min(MAX_DICE_COUNT);
        let count = if critical { count * 2 } else { count };
        let faces: Vec<u32> = (0..count).map(|_| dice.roll_die(die.sides)).collect();
        Self::from_faces(faces, die.modifier.saturating_add(stat_modifier), critical)
    }

    /// Build a roll from faces already thrown
    pub fn from_faces(faces: Vec<u32>, modifier: i32, critical: bool) -> Self {
        let total = total_of(&faces, modifier).max(1);
        Self {
            faces,
            modifier,
            critical,
            total,
        }
    }

    /// Total scaled by a percentage, still at least 1
    pub fn scaled(&self, percent: u32) -> i32 {
        let scaled = i64::from(self.total) * i64::from(percent) / 100;
        scaled.clamp(1, i64::from(i32::MAX)) as i32
    }
}

impl std::fmt::Display for DamageRoll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let faces: Vec<String> = self.faces.iter().map(|face| face.to_string()).collect();
        write!(f, "[{}]", faces.join("+"))?;
        if self.modifier != 0 {
            write!(f, " {:+}", self.modifier)?;
        }
        write!(f, " = {}", self.total)
    }
}

/// Damage left after the defender's defense soaks part of it
pub fn mitigate(damage: i32, defense: i32) -> i32 {
    damage.saturating_sub(defense.max(0) / 2).max(1)
}
