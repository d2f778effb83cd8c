//! Status effects system
//!
//! Effects come in two scopes:
//! - Encounter effects (shield, damage over time) live on the combat session
//!   and are dropped with it
//! - Stat buffs live on the actor and expire at an absolute time, so they
//!   outlive the encounter that granted them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::actor::Stat;

/// Side of an encounter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combatant {
    Player,
    Opponent,
}

/// A status effect instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusEffect {
    /// Periodic damage applied at the end of each round
    DamageOverTime(DamageOverTime),
    /// Negates the next hit against the player
    Shield,
    /// Temporary bonus to one stat
    StatBuff(StatBuff),
}

/// Damage dealt at every round end until the ticks run out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageOverTime {
    pub target: Combatant,
    pub per_tick: i32,
    pub remaining_ticks: u32,
    /// Name shown in the battle log ("Poison Strike")
    pub source: String,
}

/// Stat bonus that expires at a fixed time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatBuff {
    pub stat: Stat,
    pub magnitude: i32,
    pub expires_at: DateTime<Utc>,
}

impl StatBuff {
    /// Whether the buff still applies at `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// One damage-over-time application at round end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotTick {
    pub target: Combatant,
    pub damage: i32,
    pub source: String,
    /// Ticks left after this one
    pub remaining_ticks: u32,
}

/// Effects scoped to a single encounter
#[derive(Debug, Clone, Default)]
pub struct EncounterEffects {
    shield: bool,
    dots: Vec<DamageOverTime>,
}

impl EncounterEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the player's shield. A second shield does not stack.
    pub fn raise_shield(&mut self) {
        self.shield = true;
    }

    pub fn shield_active(&self) -> bool {
        self.shield
    }

    /// Use up the shield against a hit. Returns whether one was up.
    pub fn consume_shield(&mut self) -> bool {
        std::mem::take(&mut self.shield)
    }

    /// Add a damage-over-time stack. Stacks tick independently.
    pub fn add_damage_over_time(&mut self, dot: DamageOverTime) {
        if dot.remaining_ticks == 0 {
            return;
        }
        self.dots.push(dot);
    }

    /// Active damage-over-time stacks
    pub fn damage_over_time(&self) -> &[DamageOverTime] {
        &self.dots
    }

    /// Advance every damage-over-time stack by one tick, dropping the
    /// finished ones
    pub fn tick(&mut self) -> Vec<DotTick> {
        let mut ticks = Vec::with_capacity(self.dots.len());
        for dot in &mut self.dots {
            dot.remaining_ticks = dot.remaining_ticks.saturating_sub(1);
            ticks.push(DotTick {
                target: dot.target,
                damage: dot.per_tick,
                source: dot.source.clone(),
                remaining_ticks: dot.remaining_ticks,
            });
        }
        self.dots.retain(|dot| {
            if dot.remaining_ticks == 0 {
                debug!(source = %dot.source, "damage over time expired");
                false
            } else {
                true
            }
        });
        ticks
    }
}

/// Timed stat buffs carried by an actor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuffSet {
    buffs: Vec<StatBuff>,
}

impl BuffSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, buff: StatBuff) {
        self.buffs.push(buff);
    }

    /// Drop expired buffs. Returns how many were removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.buffs.len();
        self.buffs.retain(|buff| buff.is_active(now));
        before - self.buffs.len()
    }

    /// Sum of unexpired bonuses to `stat`, pruning expired buffs first
    pub fn bonus(&mut self, stat: Stat, now: DateTime<Utc>) -> i32 {
        self.prune(now);
        self.buffs
            .iter()
            .filter(|buff| buff.stat == stat)
            .map(|buff| buff.magnitude)
            .sum()
    }

    /// Buffs still active at `now`, without pruning
    pub fn active(&self, now: DateTime<Utc>) -> impl Iterator<Item = &StatBuff> {
        self.buffs.iter().filter(move |buff| buff.is_active(now))
    }

    pub fn len(&self) -> usize {
        self.buffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffs.is_empty()
    }
}

impl FromIterator<StatBuff> for BuffSet {
    fn from_iter<I: IntoIterator<Item = StatBuff>>(iter: I) -> Self {
        Self {
            buffs: iter.into_iter().collect(),
        }
    }
}
