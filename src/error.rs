//! Engine errors

use thiserror::Error;

use crate::actor::CharacterClass;
use crate::monster::MonsterCategory;

/// A request that was understood but is not allowed right now.
/// The session is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{ability} is not a {class} ability")]
    NotClassAbility { ability: String, class: CharacterClass },

    #[error("{ability} can only be used against {required} opponents")]
    WrongTarget { ability: String, required: MonsterCategory },

    #[error("not enough mana: need {required}, have {available}")]
    InsufficientMana { required: i32, available: i32 },

    #[error("{ability} can only be used {max_uses} time(s) per encounter")]
    UsesExhausted { ability: String, max_uses: u32 },

    #[error("{item} is not a consumable")]
    NotConsumable { item: String },

    #[error("using {item} would have no effect: {reason}")]
    NoEffect { item: String, reason: &'static str },

    #[error("opponent level {level} is outside 1..={max}")]
    LevelOutOfRange { level: u32, max: u32 },

    #[error("player {0} is in combat")]
    InCombat(String),

    #[error("the encounter is already over")]
    EncounterOver,
}

/// Something the request refers to does not exist
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFound {
    #[error("no active encounter for player {0}")]
    Session(String),

    #[error("unknown ability {0}")]
    Ability(String),

    #[error("unknown item {0}")]
    Item(String),

    #[error("player {player} does not carry {item}")]
    InventoryItem { player: String, item: String },
}

/// Errors returned by the combat engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    #[error("invalid action: {0}")]
    Validation(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(#[from] NotFound),

    #[error("player {player} already has an active encounter")]
    Conflict { player: String },
}
