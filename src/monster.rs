//! Opponents
//!
//! Every monster kind has a level 1 template. Higher levels add a fixed
//! amount per level to health, attack, defense and rewards.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::combat::{ability_modifier, DiceRoll};

/// Health gained per level above 1
pub const HEALTH_PER_LEVEL: i32 = 10;
/// Attack gained per level above 1
pub const ATTACK_PER_LEVEL: i32 = 2;
/// Defense gained per level above 1
pub const DEFENSE_PER_LEVEL: i32 = 1;
/// Experience reward gained per level above 1
pub const EXPERIENCE_PER_LEVEL: u32 = 20;
/// Gold reward gained per level above 1
pub const GOLD_PER_LEVEL: u32 = 5;

/// Highest level an encounter may be started at by default
pub const MAX_LEVEL: u32 = 100;

/// Broad creature category, used by ability restrictions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonsterCategory {
    Beast,
    Humanoid,
    Undead,
    Dragon,
}

impl std::fmt::Display for MonsterCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MonsterCategory::Beast => "beast",
            MonsterCategory::Humanoid => "humanoid",
            MonsterCategory::Undead => "undead",
            MonsterCategory::Dragon => "dragon",
        };
        write!(f, "{}", s)
    }
}

/// Known monster kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonsterKind {
    Wolf,
    Spider,
    Goblin,
    Skeleton,
    Bandit,
    Orc,
    Wizard,
    Dragon,
}

/// Level 1 statistics for a monster kind
#[derive(Debug, Clone, Copy)]
struct Template {
    name: &'static str,
    category: MonsterCategory,
    health: i32,
    attack: i32,
    defense: i32,
    dice: (u32, u32),
    experience: u32,
    gold: u32,
}

impl MonsterKind {
    /// Get all monster kinds
    pub fn all() -> &'static [MonsterKind] {
        &[
            MonsterKind::Wolf,
            MonsterKind::Spider,
            MonsterKind::Goblin,
            MonsterKind::Skeleton,
            MonsterKind::Bandit,
            MonsterKind::Orc,
            MonsterKind::Wizard,
            MonsterKind::Dragon,
        ]
    }

    fn template(&self) -> Template {
        use MonsterCategory::*;
        let (name, category, health, attack, defense, dice, experience, gold) = match self {
            MonsterKind::Wolf => ("Wolf", Beast, 25, 6, 2, (1, 4), 50, 10),
            MonsterKind::Spider => ("Giant Spider", Beast, 16, 5, 1, (1, 4), 40, 8),
            MonsterKind::Goblin => ("Goblin", Humanoid, 20, 5, 2, (1, 6), 60, 15),
            MonsterKind::Skeleton => ("Skeleton", Undead, 35, 9, 4, (1, 6), 80, 20),
            MonsterKind::Bandit => ("Bandit", Humanoid, 40, 10, 5, (1, 6), 100, 25),
            MonsterKind::Orc => ("Orc", Humanoid, 50, 12, 6, (1, 8), 120, 30),
            MonsterKind::Wizard => ("Dark Wizard", Humanoid, 30, 14, 3, (2, 4), 150, 40),
            MonsterKind::Dragon => {
                ("Dragon", MonsterCategory::Dragon, 100, 18, 10, (2, 6), 300, 100)
            }
        };
        Template {
            name,
            category,
            health,
            attack,
            defense,
            dice,
            experience,
            gold,
        }
    }
}

impl FromStr for MonsterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wolf" => Ok(MonsterKind::Wolf),
            "spider" => Ok(MonsterKind::Spider),
            "goblin" => Ok(MonsterKind::Goblin),
            "skeleton" => Ok(MonsterKind::Skeleton),
            "bandit" => Ok(MonsterKind::Bandit),
            "orc" => Ok(MonsterKind::Orc),
            "wizard" => Ok(MonsterKind::Wizard),
            "dragon" => Ok(MonsterKind::Dragon),
            other => Err(format!("Unknown monster kind: {}", other)),
        }
    }
}

impl std::fmt::Display for MonsterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MonsterKind::Wolf => "wolf",
            MonsterKind::Spider => "spider",
            MonsterKind::Goblin => "goblin",
            MonsterKind::Skeleton => "skeleton",
            MonsterKind::Bandit => "bandit",
            MonsterKind::Orc => "orc",
            MonsterKind::Wizard => "wizard",
            MonsterKind::Dragon => "dragon",
        };
        write!(f, "{}", s)
    }
}

/// A monster in an encounter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monster {
    pub kind: MonsterKind,
    pub name: String,
    pub category: MonsterCategory,
    pub level: u32,
    pub health: i32,
    pub max_health: i32,
    pub attack: i32,
    pub defense: i32,
    /// Damage dice, centered on the attack stat
    pub damage: DiceRoll,
    pub experience_reward: u32,
    pub gold_reward: u32,
}

impl Monster {
    /// Build a monster of the given kind, scaled to `level` (minimum 1).
    /// Stats saturate rather than overflow at extreme levels.
    pub fn new(kind: MonsterKind, level: u32) -> Self {
        let template = kind.template();
        let level = level.max(1);
        let steps = i32::try_from(level - 1).unwrap_or(i32::MAX);
        let scaled =
            |base: i32, per_level: i32| base.saturating_add(per_level.saturating_mul(steps));
        let reward =
            |base: u32, per_level: u32| base.saturating_add(per_level.saturating_mul(level - 1));

        let health = scaled(template.health, HEALTH_PER_LEVEL);
        let attack = scaled(template.attack, ATTACK_PER_LEVEL);
        let (count, sides) = template.dice;
        // modifier keeps the average hit equal to the attack stat
        let modifier = attack.saturating_sub(DiceRoll::new(count, sides, 0).average());

        Self {
            kind,
            name: template.name.to_string(),
            category: template.category,
            level,
            health,
            max_health: health,
            attack,
            defense: scaled(template.defense, DEFENSE_PER_LEVEL),
            damage: DiceRoll::new(count, sides, modifier),
            experience_reward: reward(template.experience, EXPERIENCE_PER_LEVEL),
            gold_reward: reward(template.gold, GOLD_PER_LEVEL),
        }
    }

    /// Armor class: defense + 10
    pub fn armor_class(&self) -> i32 {
        self.defense.saturating_add(10)
    }

    /// Attack roll bonus derived from the attack stat
    pub fn attack_bonus(&self) -> i32 {
        ability_modifier(self.attack)
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Apply damage, clamping health at 0. Returns the damage dealt.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let amount = amount.max(0);
        self.health = (self.health - amount).max(0);
        amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_one_wolf() {
        let wolf = Monster::new(MonsterKind::Wolf, 1);
        assert_eq!(wolf.health, 25);
        assert_eq!(wolf.armor_class(), 12);
        assert_eq!(wolf.attack_bonus(), -2);
        assert_eq!(wolf.damage, DiceRoll::new(1, 4, 4));
        assert_eq!(wolf.experience_reward, 50);
        assert_eq!(wolf.gold_reward, 10);
    }

    #[test]
    fn test_level_scaling() {
        let orc = Monster::new(MonsterKind::Orc, 3);
        assert_eq!(orc.health, 70);
        assert_eq!(orc.attack, 16);
        assert_eq!(orc.defense, 8);
        assert_eq!(orc.experience_reward, 160);
        assert_eq!(orc.gold_reward, 40);

        assert_eq!(Monster::new(MonsterKind::Orc, 0).level, 1);
    }

    #[test]
    fn test_damage_centered_on_attack() {
        for kind in MonsterKind::all() {
            let monster = Monster::new(*kind, 2);
            assert_eq!(monster.damage.average(), monster.attack, "{}", kind);
        }
    }

    #[test]
    fn test_extreme_level_saturates() {
        let wolf = Monster::new(MonsterKind::Wolf, u32::MAX);
        assert_eq!(wolf.level, u32::MAX);
        assert_eq!(wolf.health, i32::MAX);
        assert_eq!(wolf.attack, i32::MAX);
        assert_eq!(wolf.armor_class(), i32::MAX);
        assert_eq!(wolf.experience_reward, u32::MAX);
        assert_eq!(wolf.gold_reward, u32::MAX);
        assert!(wolf.attack_bonus() > 0);
    }

    #[test]
    fn test_take_damage_clamps() {
        let mut spider = Monster::new(MonsterKind::Spider, 1);
        assert_eq!(spider.take_damage(10), 10);
        assert!(spider.is_alive());
        spider.take_damage(100);
        assert_eq!(spider.health, 0);
        assert!(!spider.is_alive());
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("Skeleton".parse::<MonsterKind>(), Ok(MonsterKind::Skeleton));
        assert!("kraken".parse::<MonsterKind>().is_err());
        for kind in MonsterKind::all() {
            assert_eq!(kind.to_string().parse::<MonsterKind>(), Ok(*kind));
        }
    }
}
