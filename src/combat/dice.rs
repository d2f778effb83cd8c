//! Dice rolling system
//!
//! Parses and rolls dice notation like "2d6+3", "1d20", "d8-1", and resolves
//! the d20 rolls the combat rules are built on:
//! - Attack rolls against an armor class
//! - Skill checks against a difficulty class
//!
//! All randomness flows through a [`DiceSource`] so encounters can be replayed
//! from a seed or driven by a fixed script.

use std::collections::VecDeque;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Most dice a single roll may name
pub const MAX_DICE_COUNT: u32 = 100;

/// Most sides a single die may have
pub const MAX_DIE_SIDES: u32 = 1000;

/// Largest flat modifier a roll may carry, either sign
pub const MAX_DICE_MODIFIER: i32 = 1000;

/// Sum die faces and a modifier without overflowing, saturating at the
/// bounds of `i32`
pub(crate) fn total_of(faces: &[u32], modifier: i32) -> i32 {
    let sum: i64 = faces.iter().map(|&face| i64::from(face)).sum();
    (sum + i64::from(modifier)).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Source of individual die results
pub trait DiceSource: Send {
    /// Roll one die, returning a value in `1..=sides`
    fn roll_die(&mut self, sides: u32) -> u32;

    /// Roll a d20
    fn d20(&mut self) -> u32 {
        self.roll_die(20)
    }

    /// Roll a percentile die (1-100)
    fn percentile(&mut self) -> u32 {
        self.roll_die(100)
    }
}

/// Dice backed by the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadDice;

impl DiceSource for ThreadDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        rand::rng().random_range(1..=sides.max(1))
    }
}

/// Reproducible dice from a fixed seed
#[derive(Debug, Clone)]
pub struct SeededDice {
    rng: StdRng,
}

impl SeededDice {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DiceSource for SeededDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.rng.random_range(1..=sides.max(1))
    }
}

/// Replays a fixed sequence of die results.
///
/// Each value is clamped into the range of the die being rolled. Once the
/// script is exhausted every roll returns the fallback value (1 unless set).
#[derive(Debug, Clone)]
pub struct ScriptedDice {
    script: VecDeque<u32>,
    fallback: u32,
}

impl ScriptedDice {
    pub fn new(script: impl IntoIterator<Item = u32>) -> Self {
        Self {
            script: script.into_iter().collect(),
            fallback: 1,
        }
    }

    /// Value returned after the script runs out
    pub fn with_fallback(mut self, fallback: u32) -> Self {
        self.fallback = fallback;
        self
    }

    /// Number of scripted results not yet consumed
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl DiceSource for ScriptedDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        let value = self.script.pop_front().unwrap_or(self.fallback);
        value.clamp(1, sides.max(1))
    }
}

/// A parsed dice roll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    /// Number of dice to roll
    pub count: u32,
    /// Number of sides per die
    pub sides: u32,
    /// Modifier to add/subtract
    pub modifier: i32,
}

impl DiceRoll {
    /// Create a new dice roll
    pub fn new(count: u32, sides: u32, modifier: i32) -> Self {
        Self { count, sides, modifier }
    }

    /// The bare-handed die: a single 1d1
    pub fn unarmed() -> Self {
        Self::new(1, 1, 0)
    }

    /// Roll the dice and return the total
    pub fn roll(&self, dice: &mut dyn DiceSource) -> i32 {
        self.roll_detailed(dice).1
    }

    /// Roll and return individual die results plus total. At most
    /// [`MAX_DICE_COUNT`] dice are thrown.
    pub fn roll_detailed(&self, dice: &mut dyn DiceSource) -> (Vec<u32>, i32) {
        let count = self.count.min(MAX_DICE_COUNT);
        let results: Vec<u32> = (0..count).map(|_| dice.roll_die(self.sides)).collect();
        let total = total_of(&results, self.modifier);
        (results, total)
    }

    /// Get the minimum possible result
    pub fn min(&self) -> i32 {
        clamp_i32(i64::from(self.count) + i64::from(self.modifier))
    }

    /// Get the maximum possible result
    pub fn max(&self) -> i32 {
        clamp_i32(i64::from(self.count) * i64::from(self.sides) + i64::from(self.modifier))
    }

    /// Get the expected average (rounded down)
    pub fn average(&self) -> i32 {
        let avg_per_die = (1.0 + self.sides as f64) / 2.0;
        (self.count as f64 * avg_per_die + self.modifier as f64).floor() as i32
    }
}

impl FromStr for DiceRoll {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_dice(s)
    }
}

impl std::fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.modifier > 0 {
            write!(f, "{}d{}+{}", self.count, self.sides, self.modifier)
        } else if self.modifier < 0 {
            write!(f, "{}d{}{}", self.count, self.sides, self.modifier)
        } else {
            write!(f, "{}d{}", self.count, self.sides)
        }
    }
}

fn clamp_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Parse a dice notation string like "2d6+3". Counts above
/// [`MAX_DICE_COUNT`], sides above [`MAX_DIE_SIDES`] and modifiers beyond
/// [`MAX_DICE_MODIFIER`] are rejected.
pub fn parse_dice(notation: &str) -> Result<DiceRoll, String> {
    let notation = notation.trim().to_lowercase();

    let d_pos = notation.find('d').ok_or("Missing 'd' in dice notation")?;

    let count_str = &notation[..d_pos];
    let count: u32 = if count_str.is_empty() {
        1 // "d6" means "1d6"
    } else {
        count_str.parse().map_err(|_| format!("Invalid dice count: {}", count_str))?
    };

    if count == 0 {
        return Err("Dice count must be at least 1".to_string());
    }
    if count > MAX_DICE_COUNT {
        return Err(format!("Dice count must be at most {}", MAX_DICE_COUNT));
    }

    let rest = &notation[d_pos + 1..];

    let (sides_str, modifier) = if let Some(plus_pos) = rest.find('+') {
        let mod_str = &rest[plus_pos + 1..];
        let modifier: i32 = mod_str.parse().map_err(|_| format!("Invalid modifier: {}", mod_str))?;
        (&rest[..plus_pos], modifier)
    } else if let Some(minus_pos) = rest.rfind('-').filter(|pos| *pos > 0) {
        // the minus sign stays with the modifier
        let mod_str = &rest[minus_pos..];
        let modifier: i32 = mod_str.parse().map_err(|_| format!("Invalid modifier: {}", mod_str))?;
        (&rest[..minus_pos], modifier)
    } else {
        (rest, 0)
    };

    let sides: u32 = sides_str.parse().map_err(|_| format!("Invalid die sides: {}", sides_str))?;

    if sides == 0 {
        return Err("Die sides must be at least 1".to_string());
    }
    if sides > MAX_DIE_SIDES {
        return Err(format!("Die sides must be at most {}", MAX_DIE_SIDES));
    }
    if modifier.unsigned_abs() > MAX_DICE_MODIFIER.unsigned_abs() {
        return Err(format!("Modifier must be within {}", MAX_DICE_MODIFIER));
    }

    Ok(DiceRoll { count, sides, modifier })
}

/// Ability modifier for a stat score: `(stat - 10) / 2`, rounded toward
/// negative infinity
pub fn ability_modifier(stat: i32) -> i32 {
    stat.saturating_sub(10).div_euclid(2)
}

/// Check if a d20 roll is a natural 20 (critical hit)
pub fn is_critical(roll: u32) -> bool {
    roll == 20
}

/// Check if a d20 roll is a natural 1 (critical fail)
pub fn is_fumble(roll: u32) -> bool {
    roll == 1
}

/// Result of an attack roll
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttackRoll {
    /// The natural d20 result
    pub roll: u32,
    /// Attack bonus added to the roll
    pub bonus: i32,
    /// Total attack value (roll + bonus)
    pub total: i32,
    /// Armor class the attack was made against
    pub threshold: i32,
    /// Whether the attack hit
    pub hit: bool,
    /// Natural 20
    pub critical: bool,
    /// Natural 1
    pub fumble: bool,
}

impl AttackRoll {
    /// Resolve an already rolled d20
    pub fn resolve(roll: u32, bonus: i32, threshold: i32) -> Self {
        let critical = is_critical(roll);
        let fumble = is_fumble(roll);
        let total = (roll as i32).saturating_add(bonus);

        // Critical always hits, fumble always misses
        let hit = critical || (!fumble && total >= threshold);

        Self {
            roll,
            bonus,
            total,
            threshold,
            hit,
            critical,
            fumble,
        }
    }

    /// Roll a d20 and resolve it
    pub fn roll(dice: &mut dyn DiceSource, bonus: i32, threshold: i32) -> Self {
        Self::resolve(dice.d20(), bonus, threshold)
    }
}

impl std::fmt::Display for AttackRoll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "d20: {} {:+} = {} vs AC {}", self.roll, self.bonus, self.total, self.threshold)
    }
}

/// Result of a skill check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkillCheck {
    pub roll: u32,
    pub modifier: i32,
    pub total: i32,
    pub difficulty: i32,
    pub success: bool,
}

impl SkillCheck {
    /// Resolve an already rolled d20 for a stat score against a DC
    pub fn resolve(roll: u32, stat: i32, difficulty: i32) -> Self {
        let modifier = ability_modifier(stat);
        let total = (roll as i32).saturating_add(modifier);
        let success = if is_critical(roll) {
            true
        } else if is_fumble(roll) {
            false
        } else {
            total >= difficulty
        };

        Self {
            roll,
            modifier,
            total,
            difficulty,
            success,
        }
    }
}

/// Roll a skill check for a stat score against a difficulty class
pub fn skill_check(dice: &mut dyn DiceSource, stat: i32, difficulty: i32) -> SkillCheck {
    SkillCheck::resolve(dice.d20(), stat, difficulty)
}
