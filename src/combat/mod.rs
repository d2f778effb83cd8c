//! Combat system module
//!
//! Implements d20 turn-based combat with:
//! - Dice rolling (e.g., "2d6+3") from an injectable dice source
//! - Attack resolution with to-hit and damage
//! - Status effects (shields, damage over time, timed buffs)
//! - Ability costs (mana and per-encounter uses)
//! - The per-encounter state machine and the registry of active encounters

mod damage;
mod dice;
mod effects;
mod resources;
mod session;
mod state;

pub use damage::{mitigate, DamageRoll};
pub use dice::{
    ability_modifier, is_critical, is_fumble, parse_dice, skill_check, AttackRoll, DiceRoll,
    DiceSource, ScriptedDice, SeededDice, SkillCheck, ThreadDice,
};
pub use effects::{
    BuffSet, Combatant, DamageOverTime, DotTick, EncounterEffects, StatBuff, StatusEffect,
};
pub use resources::{AbilityUsage, Spent};
pub use session::{Action, ActionResult, CombatSession, LegalAction, Outcome, SessionState};
pub use state::{EncounterManager, SessionHandle};
