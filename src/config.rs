//! Engine configuration
//!
//! Tuning values layered as: built-in defaults, then an optional TOML file,
//! then `VENTERRA_*` environment variables (nested keys split on `__`, e.g.
//! `VENTERRA_COMBAT__FLEE_BASE_CHANCE=50`).

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::catalog::{AbilityDefinition, ItemDefinition};
use crate::monster::MAX_LEVEL;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "VENTERRA_";

/// Base flee chance in percent
pub const FLEE_BASE_CHANCE: u32 = 40;

/// Flee chance gained per agility point
pub const FLEE_PER_AGILITY: u32 = 5;

/// Flee chance cap in percent
pub const FLEE_MAX_CHANCE: u32 = 80;

/// Stamina added while defending
pub const DEFEND_STAMINA_BONUS: i32 = 5;

/// Battle log lines kept per session
pub const BATTLE_LOG_LINES: usize = 3;

/// Seconds per regeneration tick
pub const REGEN_TICK_SECONDS: i64 = 60;

/// Experience needed per level: `multiplier * level`
pub const EXPERIENCE_MULTIPLIER: u32 = 200;

/// Free stat points granted per level
pub const POINTS_PER_LEVEL: u32 = 3;

/// Combat tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    pub flee_base_chance: u32,
    pub flee_per_agility: u32,
    pub flee_max_chance: u32,
    pub defend_stamina_bonus: i32,
    pub battle_log_lines: usize,
    /// Class passive trigger chance: `min(cap, base + per_point * (stat - 10))`
    pub passive_base_chance: u32,
    pub passive_per_point: u32,
    pub passive_max_chance: u32,
    /// Highest opponent level an encounter may start at
    pub max_monster_level: u32,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            flee_base_chance: FLEE_BASE_CHANCE,
            flee_per_agility: FLEE_PER_AGILITY,
            flee_max_chance: FLEE_MAX_CHANCE,
            defend_stamina_bonus: DEFEND_STAMINA_BONUS,
            battle_log_lines: BATTLE_LOG_LINES,
            passive_base_chance: 25,
            passive_per_point: 2,
            passive_max_chance: 75,
            max_monster_level: MAX_LEVEL,
        }
    }
}

impl CombatTuning {
    /// Flee chance in percent for an agility score
    pub fn flee_chance(&self, agility: i32) -> u32 {
        let bonus = self.flee_per_agility.saturating_mul(agility.max(0) as u32);
        self.flee_base_chance.saturating_add(bonus).min(self.flee_max_chance)
    }

    /// Class passive chance in percent for the governing stat
    pub fn passive_chance(&self, stat: i32) -> u32 {
        let above = (stat - 10).max(0) as u32;
        self.passive_base_chance
            .saturating_add(self.passive_per_point.saturating_mul(above))
            .min(self.passive_max_chance)
    }
}

/// Regeneration tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegenTuning {
    pub tick_seconds: i64,
}

impl Default for RegenTuning {
    fn default() -> Self {
        Self {
            tick_seconds: REGEN_TICK_SECONDS,
        }
    }
}

/// Level progression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionTuning {
    pub experience_multiplier: u32,
    pub points_per_level: u32,
}

impl Default for ProgressionTuning {
    fn default() -> Self {
        Self {
            experience_multiplier: EXPERIENCE_MULTIPLIER,
            points_per_level: POINTS_PER_LEVEL,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub combat: CombatTuning,
    pub regen: RegenTuning,
    pub progression: ProgressionTuning,
    /// Extra or replacement abilities
    pub abilities: Vec<AbilityDefinition>,
    /// Extra or replacement items
    pub items: Vec<ItemDefinition>,
}

impl EngineConfig {
    /// The layered configuration sources
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load defaults, the optional TOML file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    /// Replace the combat tuning
    pub fn with_combat(mut self, combat: CombatTuning) -> Self {
        self.combat = combat;
        self
    }

    pub fn with_regen_tick(mut self, seconds: i64) -> Self {
        self.regen.tick_seconds = seconds;
        self
    }
}
