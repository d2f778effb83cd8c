//! Ability costs
//!
//! Every ability use is validated before anything is spent. A rejected use
//! leaves the actor's mana and the encounter's usage counters untouched.

use std::collections::HashMap;

use tracing::debug;

use crate::actor::Actor;
use crate::catalog::AbilityDefinition;
use crate::error::ValidationError;
use crate::monster::MonsterCategory;

/// What a committed ability use consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spent {
    pub mana: i32,
    /// Uses left this encounter, for limited abilities
    pub uses_left: Option<u32>,
}

/// Per-encounter ability use counters
#[derive(Debug, Clone, Default)]
pub struct AbilityUsage {
    counts: HashMap<String, u32>,
}

impl AbilityUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Times `ability_id` was used this encounter
    pub fn uses(&self, ability_id: &str) -> u32 {
        self.counts.get(ability_id).copied().unwrap_or(0)
    }

    /// Check whether `actor` could use `ability` against `target` right now
    pub fn check(
        &self,
        ability: &AbilityDefinition,
        actor: &Actor,
        target: MonsterCategory,
    ) -> Result<(), ValidationError> {
        if ability.class != actor.class {
            return Err(ValidationError::NotClassAbility {
                ability: ability.id.clone(),
                class: actor.class,
            });
        }

        if let Some(required) = ability.restricted_to {
            if required != target {
                return Err(ValidationError::WrongTarget {
                    ability: ability.id.clone(),
                    required,
                });
            }
        }

        if let Some(max_uses) = ability.cost.max_uses() {
            if self.uses(&ability.id) >= max_uses {
                return Err(ValidationError::UsesExhausted {
                    ability: ability.id.clone(),
                    max_uses,
                });
            }
        }

        let required = ability.cost.mana();
        if actor.mana < required {
            return Err(ValidationError::InsufficientMana {
                required,
                available: actor.mana,
            });
        }

        Ok(())
    }

    /// Validate, then spend mana and record the use
    pub fn commit(
        &mut self,
        ability: &AbilityDefinition,
        actor: &mut Actor,
        target: MonsterCategory,
    ) -> Result<Spent, ValidationError> {
        self.check(ability, actor, target)?;

        let mana = ability.cost.mana();
        actor.mana -= mana;

        let uses_left = ability.cost.max_uses().map(|max_uses| {
            let used = self.counts.entry(ability.id.clone()).or_insert(0);
            *used += 1;
            max_uses.saturating_sub(*used)
        });

        debug!(ability = %ability.id, mana, ?uses_left, "ability cost paid");
        Ok(Spent { mana, uses_left })
    }
}
