//! Player actors
//!
//! An actor's attributes are its base scores. Equipment bonuses and timed
//! buffs are derived on demand and never written back into the attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

use crate::catalog::{ItemDefinition, ItemKind};
use crate::combat::{ability_modifier, parse_dice, BuffSet, DiceRoll};
use crate::quests::QuestProgress;

/// Largest armor class bonus agility can give
pub const MAX_AGILITY_ARMOR_BONUS: i32 = 5;

/// Core attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Strength,
    Agility,
    Intelligence,
    Stamina,
    Charisma,
}

impl Stat {
    /// Get all stats
    pub fn all() -> &'static [Stat] {
        &[
            Stat::Strength,
            Stat::Agility,
            Stat::Intelligence,
            Stat::Stamina,
            Stat::Charisma,
        ]
    }
}

impl FromStr for Stat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strength" | "str" => Ok(Stat::Strength),
            "agility" | "agi" => Ok(Stat::Agility),
            "intelligence" | "int" => Ok(Stat::Intelligence),
            "stamina" | "sta" => Ok(Stat::Stamina),
            "charisma" | "cha" => Ok(Stat::Charisma),
            other => Err(format!("Unknown stat: {}", other)),
        }
    }
}

impl std::fmt::Display for Stat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stat::Strength => "strength",
            Stat::Agility => "agility",
            Stat::Intelligence => "intelligence",
            Stat::Stamina => "stamina",
            Stat::Charisma => "charisma",
        };
        write!(f, "{}", s)
    }
}

/// A set of attribute scores (or bonuses)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attributes {
    pub strength: i32,
    pub agility: i32,
    pub intelligence: i32,
    pub stamina: i32,
    pub charisma: i32,
}

impl Attributes {
    /// Every attribute set to `value`
    pub fn uniform(value: i32) -> Self {
        Self {
            strength: value,
            agility: value,
            intelligence: value,
            stamina: value,
            charisma: value,
        }
    }

    pub fn get(&self, stat: Stat) -> i32 {
        match stat {
            Stat::Strength => self.strength,
            Stat::Agility => self.agility,
            Stat::Intelligence => self.intelligence,
            Stat::Stamina => self.stamina,
            Stat::Charisma => self.charisma,
        }
    }

    pub fn get_mut(&mut self, stat: Stat) -> &mut i32 {
        match stat {
            Stat::Strength => &mut self.strength,
            Stat::Agility => &mut self.agility,
            Stat::Intelligence => &mut self.intelligence,
            Stat::Stamina => &mut self.stamina,
            Stat::Charisma => &mut self.charisma,
        }
    }
}

/// Playable classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterClass {
    Warrior,
    Mage,
    Paladin,
    Rogue,
}

impl CharacterClass {
    /// Starting attributes for a new character
    pub fn base_attributes(&self) -> Attributes {
        let (strength, agility, intelligence, stamina, charisma) = match self {
            CharacterClass::Warrior => (8, 5, 3, 7, 2),
            CharacterClass::Mage => (2, 4, 10, 5, 4),
            CharacterClass::Paladin => (6, 4, 5, 6, 4),
            CharacterClass::Rogue => (4, 9, 3, 5, 4),
        };
        Attributes {
            strength,
            agility,
            intelligence,
            stamina,
            charisma,
        }
    }
}

impl FromStr for CharacterClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "warrior" => Ok(CharacterClass::Warrior),
            "mage" => Ok(CharacterClass::Mage),
            "paladin" => Ok(CharacterClass::Paladin),
            "rogue" => Ok(CharacterClass::Rogue),
            other => Err(format!("Unknown class: {}", other)),
        }
    }
}

impl std::fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CharacterClass::Warrior => "warrior",
            CharacterClass::Mage => "mage",
            CharacterClass::Paladin => "paladin",
            CharacterClass::Rogue => "rogue",
        };
        write!(f, "{}", s)
    }
}

/// Equipped items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Equipment {
    pub weapon: Option<ItemDefinition>,
    pub armor: Vec<ItemDefinition>,
}

impl Equipment {
    /// Total bonus to `stat` from everything equipped
    pub fn bonus(&self, stat: Stat) -> i32 {
        self.weapon
            .iter()
            .chain(self.armor.iter())
            .map(|item| item.bonuses().get(stat))
            .sum()
    }
}

/// Lifetime combat counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatRecord {
    pub monsters_killed: u32,
    pub damage_dealt: u64,
    pub damage_taken: u64,
}

/// A level gained on victory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelUp {
    pub new_level: u32,
    pub free_points: u32,
}

/// A player character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub class: CharacterClass,
    pub level: u32,
    #[serde(default)]
    pub experience: u32,
    #[serde(default)]
    pub free_points: u32,
    #[serde(default)]
    pub gold: u64,
    pub attributes: Attributes,
    pub health: i32,
    pub max_health: i32,
    pub mana: i32,
    pub max_mana: i32,
    #[serde(default)]
    pub equipment: Equipment,
    /// Carried consumable item ids
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default)]
    pub buffs: BuffSet,
    #[serde(default)]
    pub quests: Vec<QuestProgress>,
    #[serde(default)]
    pub last_regeneration: Option<DateTime<Utc>>,
    #[serde(default)]
    pub record: CombatRecord,
}

impl Actor {
    /// Create a level 1 character with the class's starting attributes,
    /// at full health and mana
    pub fn new(id: impl Into<String>, name: impl Into<String>, class: CharacterClass) -> Self {
        let attributes = class.base_attributes();
        let mut actor = Self {
            id: id.into(),
            name: name.into(),
            class,
            level: 1,
            experience: 0,
            free_points: 0,
            gold: 0,
            attributes,
            health: 0,
            max_health: 0,
            mana: 0,
            max_mana: 0,
            equipment: Equipment::default(),
            inventory: Vec::new(),
            buffs: BuffSet::new(),
            quests: Vec::new(),
            last_regeneration: Some(Utc::now()),
            record: CombatRecord::default(),
        };
        actor.recompute_maximums();
        actor.health = actor.max_health;
        actor.mana = actor.max_mana;
        actor
    }

    /// Maximum health for a stamina score
    pub fn max_health_for(stamina: i32) -> i32 {
        20 + 5 * stamina
    }

    /// Maximum mana for an intelligence score
    pub fn max_mana_for(intelligence: i32) -> i32 {
        5 * intelligence
    }

    /// Recompute maximums from the base attributes, clamping current values
    pub fn recompute_maximums(&mut self) {
        self.max_health = Self::max_health_for(self.attributes.stamina).max(1);
        self.max_mana = Self::max_mana_for(self.attributes.intelligence).max(0);
        self.health = self.health.min(self.max_health);
        self.mana = self.mana.min(self.max_mana);
    }

    /// Base attribute plus equipment bonuses
    pub fn gear_stat(&self, stat: Stat) -> i32 {
        self.attributes.get(stat) + self.equipment.bonus(stat)
    }

    /// Base attribute plus equipment and active buffs. Expired buffs are
    /// pruned as a side effect.
    pub fn stat_total(&mut self, stat: Stat, now: DateTime<Utc>) -> i32 {
        self.gear_stat(stat) + self.buffs.bonus(stat, now)
    }

    /// Same as [`Actor::stat_total`] but read-only
    pub fn effective_stat(&self, stat: Stat, now: DateTime<Utc>) -> i32 {
        let buffs: i32 = self
            .buffs
            .active(now)
            .filter(|buff| buff.stat == stat)
            .map(|buff| buff.magnitude)
            .sum();
        self.gear_stat(stat) + buffs
    }

    /// Armor class: `10 + min(5, agility / 2) + stamina / 3`, with
    /// equipment included and `extra_stamina` added (defending)
    pub fn armor_class(&self, extra_stamina: i32) -> i32 {
        let agility = self.gear_stat(Stat::Agility).max(0);
        let stamina = (self.gear_stat(Stat::Stamina) + extra_stamina).max(0);
        10 + (agility / 2).min(MAX_AGILITY_ARMOR_BONUS) + stamina / 3
    }

    /// Damage soak: half of base stamina plus half of equipment stamina
    pub fn defense(&self, extra_stamina: i32) -> i32 {
        let base = (self.attributes.stamina + extra_stamina).max(0);
        let gear = self.equipment.bonus(Stat::Stamina).max(0);
        base / 2 + gear / 2
    }

    /// Weapon damage dice and the stat that drives them. Bare hands and
    /// malformed weapon dice both fall back to 1d1 with strength.
    pub fn weapon_dice(&self) -> (DiceRoll, Stat) {
        let Some(weapon) = &self.equipment.weapon else {
            return (DiceRoll::unarmed(), Stat::Strength);
        };
        match &weapon.kind {
            ItemKind::Weapon {
                weapon_type,
                damage_dice,
                ..
            } => match parse_dice(damage_dice) {
                Ok(dice) => (dice, weapon_type.stat()),
                Err(e) => {
                    warn!(
                        weapon = %weapon.id,
                        dice = %damage_dice,
                        error = %e,
                        "malformed weapon dice, fighting unarmed"
                    );
                    (DiceRoll::unarmed(), Stat::Strength)
                }
            },
            _ => {
                warn!(item = %weapon.id, "equipped weapon slot holds a non-weapon");
                (DiceRoll::unarmed(), Stat::Strength)
            }
        }
    }

    /// Attack roll bonus from the weapon's governing stat
    pub fn attack_bonus(&mut self, now: DateTime<Utc>) -> i32 {
        let (_, stat) = self.weapon_dice();
        ability_modifier(self.stat_total(stat, now))
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Apply damage, clamping health at 0. Returns the damage taken.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let amount = amount.max(0);
        self.health = (self.health - amount).max(0);
        self.record.damage_taken += amount as u64;
        amount
    }

    /// Heal up to the maximum. Returns the amount actually healed.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.health;
        self.health = (self.health + amount.max(0)).min(self.max_health);
        self.health - before
    }

    /// Restore mana up to the maximum. Returns the amount restored.
    pub fn restore_mana(&mut self, amount: i32) -> i32 {
        let before = self.mana;
        self.mana = (self.mana + amount.max(0)).min(self.max_mana);
        self.mana - before
    }

    /// Experience needed to reach the next level
    pub fn experience_to_level(&self, multiplier: u32) -> u32 {
        multiplier.saturating_mul(self.level)
    }

    /// Grant experience, leveling up at most once. Surplus experience carries
    /// over into the new level.
    pub fn add_experience(
        &mut self,
        amount: u32,
        multiplier: u32,
        points_per_level: u32,
    ) -> Option<LevelUp> {
        self.experience = self.experience.saturating_add(amount);
        let needed = self.experience_to_level(multiplier);
        if self.experience < needed {
            return None;
        }

        self.experience -= needed;
        self.level += 1;
        self.free_points += points_per_level;
        self.recompute_maximums();

        Some(LevelUp {
            new_level: self.level,
            free_points: self.free_points,
        })
    }

    /// Whether the inventory holds at least one `item_id`
    pub fn carries(&self, item_id: &str) -> bool {
        self.inventory.iter().any(|id| id == item_id)
    }
}
