//! Ability and item catalog
//!
//! Abilities are keyed by `(class, ability id)`: a class can only use what is
//! registered for it. The built-in table can be extended or overridden from
//! configuration; an entry with the same id replaces the built-in one.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use crate::actor::{Attributes, CharacterClass, Stat};
use crate::combat::{parse_dice, DiceRoll};
use crate::config::EngineConfig;
use crate::monster::MonsterCategory;

/// What an ability costs to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AbilityCost {
    /// Spends mana
    Mana { cost: i32 },
    /// Limited number of uses per encounter
    PerEncounter { max_uses: u32 },
    /// Both limits apply
    Combined { mana: i32, max_uses: u32 },
}

impl AbilityCost {
    pub fn mana(&self) -> i32 {
        match self {
            AbilityCost::Mana { cost } => *cost,
            AbilityCost::Combined { mana, .. } => *mana,
            AbilityCost::PerEncounter { .. } => 0,
        }
    }

    pub fn max_uses(&self) -> Option<u32> {
        match self {
            AbilityCost::PerEncounter { max_uses } | AbilityCost::Combined { max_uses, .. } => {
                Some(*max_uses)
            }
            AbilityCost::Mana { .. } => None,
        }
    }
}

/// One step of an ability's effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AbilityEffect {
    /// Hit with the equipped weapon. `percent` scales the damage roll.
    WeaponStrike {
        #[serde(default = "full_damage")]
        percent: u32,
        /// Roll the dice as a critical hit
        #[serde(default)]
        critical_dice: bool,
    },
    /// Magic damage from its own dice, plus an optional stat modifier
    SpellDamage {
        dice: String,
        #[serde(default)]
        stat: Option<Stat>,
    },
    /// Raise a shield against the next hit
    Shield,
    /// Damage applied to the opponent at every round end
    DamageOverTime { dice: String, ticks: u32 },
}

fn full_damage() -> u32 {
    100
}

/// Parse a catalog dice string, falling back to 1d1 when it is malformed
pub(crate) fn dice_or_minimum(notation: &str, context: &str) -> DiceRoll {
    parse_dice(notation).unwrap_or_else(|e| {
        warn!(dice = %notation, %context, error = %e, "malformed dice, using 1d1");
        DiceRoll::unarmed()
    })
}

/// A class ability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityDefinition {
    pub id: String,
    pub name: String,
    pub class: CharacterClass,
    pub cost: AbilityCost,
    /// Only usable against this category of opponent
    #[serde(default)]
    pub restricted_to: Option<MonsterCategory>,
    pub effects: Vec<AbilityEffect>,
}

/// Weapon families and the stat that drives them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponType {
    Melee,
    Ranged,
    Magic,
}

impl WeaponType {
    /// Stat used for attack and damage modifiers
    pub fn stat(&self) -> Stat {
        match self {
            WeaponType::Melee => Stat::Strength,
            WeaponType::Ranged => Stat::Agility,
            WeaponType::Magic => Stat::Intelligence,
        }
    }
}

/// What a consumable does when used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsumableEffect {
    Heal { amount: i32 },
    FullHeal,
    RestoreMana { amount: i32 },
    Buff { stat: Stat, magnitude: i32, duration_secs: i64 },
}

/// Item kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    Weapon {
        weapon_type: WeaponType,
        damage_dice: String,
        #[serde(default)]
        bonuses: Attributes,
    },
    Armor {
        #[serde(default)]
        bonuses: Attributes,
    },
    Consumable {
        effect: ConsumableEffect,
    },
}

/// An item definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
}

impl ItemDefinition {
    /// Stat bonuses granted while equipped
    pub fn bonuses(&self) -> Attributes {
        match &self.kind {
            ItemKind::Weapon { bonuses, .. } | ItemKind::Armor { bonuses } => *bonuses,
            ItemKind::Consumable { .. } => Attributes::default(),
        }
    }

    pub fn is_consumable(&self) -> bool {
        matches!(self.kind, ItemKind::Consumable { .. })
    }
}

/// Passive bonus a class gets after a successful weapon hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClassPassive {
    None,
    /// An extra, non-critical weapon damage roll
    FollowUpStrike { stat: Stat },
    /// The damage just dealt is dealt again
    DoubleDamage { stat: Stat },
}

/// Read access to ability and item definitions
pub trait Catalog: Send + Sync {
    /// Ability registered for `class` under `id`
    fn ability(&self, class: CharacterClass, id: &str) -> Option<&AbilityDefinition>;

    /// Whether any class has an ability called `id`
    fn has_ability(&self, id: &str) -> bool;

    /// All abilities for a class, ordered by id
    fn abilities_for(&self, class: CharacterClass) -> Vec<&AbilityDefinition>;

    fn item(&self, id: &str) -> Option<&ItemDefinition>;

    fn class_passive(&self, class: CharacterClass) -> ClassPassive;
}

/// Catalog held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    abilities: BTreeMap<(CharacterClass, String), AbilityDefinition>,
    items: HashMap<String, ItemDefinition>,
}

impl StaticCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in abilities and items
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for ability in builtin_abilities() {
            catalog.insert_ability(ability);
        }
        for item in builtin_items() {
            catalog.insert_item(item);
        }
        catalog
    }

    /// Built-in table with the configured overrides applied
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut catalog = Self::builtin();
        for ability in &config.abilities {
            catalog.insert_ability(ability.clone());
        }
        for item in &config.items {
            catalog.insert_item(item.clone());
        }
        catalog
    }

    /// Register an ability, replacing any previous one with the same id
    pub fn insert_ability(&mut self, ability: AbilityDefinition) {
        self.abilities.retain(|(_, id), _| id != &ability.id);
        self.abilities.insert((ability.class, ability.id.clone()), ability);
    }

    pub fn insert_item(&mut self, item: ItemDefinition) {
        self.items.insert(item.id.clone(), item);
    }
}

impl Catalog for StaticCatalog {
    fn ability(&self, class: CharacterClass, id: &str) -> Option<&AbilityDefinition> {
        self.abilities.get(&(class, id.to_string()))
    }

    fn has_ability(&self, id: &str) -> bool {
        self.abilities.keys().any(|(_, key)| key == id)
    }

    fn abilities_for(&self, class: CharacterClass) -> Vec<&AbilityDefinition> {
        self.abilities
            .iter()
            .filter(|((owner, _), _)| *owner == class)
            .map(|(_, ability)| ability)
            .collect()
    }

    fn item(&self, id: &str) -> Option<&ItemDefinition> {
        self.items.get(id)
    }

    fn class_passive(&self, class: CharacterClass) -> ClassPassive {
        match class {
            CharacterClass::Warrior => ClassPassive::FollowUpStrike { stat: Stat::Strength },
            CharacterClass::Rogue => ClassPassive::DoubleDamage { stat: Stat::Agility },
            CharacterClass::Mage | CharacterClass::Paladin => ClassPassive::None,
        }
    }
}

fn ability(
    id: &str,
    name: &str,
    class: CharacterClass,
    cost: AbilityCost,
    restricted_to: Option<MonsterCategory>,
    effects: Vec<AbilityEffect>,
) -> AbilityDefinition {
    AbilityDefinition {
        id: id.to_string(),
        name: name.to_string(),
        class,
        cost,
        restricted_to,
        effects,
    }
}

fn builtin_abilities() -> Vec<AbilityDefinition> {
    use CharacterClass::*;
    vec![
        ability(
            "mighty_strike",
            "Mighty Strike",
            Warrior,
            AbilityCost::PerEncounter { max_uses: 1 },
            None,
            vec![AbilityEffect::WeaponStrike { percent: 100, critical_dice: true }],
        ),
        ability(
            "fireball",
            "Fireball",
            Mage,
            AbilityCost::Mana { cost: 5 },
            None,
            vec![AbilityEffect::SpellDamage {
                dice: "2d6".to_string(),
                stat: Some(Stat::Intelligence),
            }],
        ),
        ability(
            "divine_shield",
            "Divine Shield",
            Paladin,
            AbilityCost::Combined { mana: 5, max_uses: 1 },
            None,
            vec![AbilityEffect::Shield],
        ),
        ability(
            "smite_undead",
            "Smite Undead",
            Paladin,
            AbilityCost::Mana { cost: 5 },
            Some(MonsterCategory::Undead),
            vec![AbilityEffect::SpellDamage {
                dice: "1d20".to_string(),
                stat: None,
            }],
        ),
        ability(
            "poison_strike",
            "Poison Strike",
            Rogue,
            AbilityCost::Mana { cost: 4 },
            None,
            vec![
                AbilityEffect::WeaponStrike { percent: 100, critical_dice: false },
                AbilityEffect::DamageOverTime {
                    dice: "1d4".to_string(),
                    ticks: 3,
                },
            ],
        ),
        ability(
            "critical_strike",
            "Critical Strike",
            Rogue,
            AbilityCost::PerEncounter { max_uses: 1 },
            None,
            vec![AbilityEffect::WeaponStrike { percent: 250, critical_dice: false }],
        ),
    ]
}

fn weapon(
    id: &str,
    name: &str,
    weapon_type: WeaponType,
    dice: &str,
    bonuses: Attributes,
) -> ItemDefinition {
    ItemDefinition {
        id: id.to_string(),
        name: name.to_string(),
        kind: ItemKind::Weapon {
            weapon_type,
            damage_dice: dice.to_string(),
            bonuses,
        },
    }
}

fn consumable(id: &str, name: &str, effect: ConsumableEffect) -> ItemDefinition {
    ItemDefinition {
        id: id.to_string(),
        name: name.to_string(),
        kind: ItemKind::Consumable { effect },
    }
}

fn builtin_items() -> Vec<ItemDefinition> {
    let strength = |n| Attributes { strength: n, ..Attributes::default() };
    let agility = |n| Attributes { agility: n, ..Attributes::default() };
    let intelligence = |n| Attributes { intelligence: n, ..Attributes::default() };
    let stamina = |n| Attributes { stamina: n, ..Attributes::default() };

    vec![
        weapon("rusty_sword", "Rusty Sword", WeaponType::Melee, "1d6", strength(1)),
        weapon("long_sword", "Long Sword", WeaponType::Melee, "1d8", strength(2)),
        weapon("war_axe", "War Axe", WeaponType::Melee, "1d10", strength(3)),
        weapon("greatsword", "Greatsword", WeaponType::Melee, "2d6", strength(4)),
        weapon("hunting_bow", "Hunting Bow", WeaponType::Ranged, "1d6", agility(1)),
        weapon("long_bow", "Long Bow", WeaponType::Ranged, "1d8", agility(3)),
        weapon("oak_staff", "Oak Staff", WeaponType::Magic, "1d4", intelligence(2)),
        weapon("arcane_staff", "Arcane Staff", WeaponType::Magic, "1d8", intelligence(4)),
        ItemDefinition {
            id: "leather_armor".to_string(),
            name: "Leather Armor".to_string(),
            kind: ItemKind::Armor { bonuses: stamina(2) },
        },
        ItemDefinition {
            id: "chain_mail".to_string(),
            name: "Chain Mail".to_string(),
            kind: ItemKind::Armor { bonuses: stamina(4) },
        },
        consumable("health_potion", "Health Potion", ConsumableEffect::Heal { amount: 50 }),
        consumable("greater_health_potion", "Greater Health Potion", ConsumableEffect::FullHeal),
        consumable("mana_potion", "Mana Potion", ConsumableEffect::RestoreMana { amount: 30 }),
        consumable(
            "strength_elixir",
            "Elixir of Strength",
            ConsumableEffect::Buff {
                stat: Stat::Strength,
                magnitude: 3,
                duration_secs: 600,
            },
        ),
    ]
}
