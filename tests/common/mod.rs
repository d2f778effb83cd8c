//! Common test utilities

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use venterra::combat::{DiceSource, ScriptedDice};
use venterra::{Actor, Attributes, CharacterClass, Engine, EngineConfig};

/// Engine with default tuning and the built-in catalog
pub fn engine() -> Engine {
    Engine::new(EngineConfig::default())
}

/// A character with every attribute at 10, at full health and mana
pub fn hero(id: &str, class: CharacterClass) -> Actor {
    let mut actor = Actor::new(id, "Hero", class);
    actor.attributes = Attributes::uniform(10);
    actor.recompute_maximums();
    actor.health = actor.max_health;
    actor.mana = actor.max_mana;
    actor
}

/// Dice that return the given faces in order, then 1s
pub fn scripted(faces: impl IntoIterator<Item = u32>) -> Box<dyn DiceSource> {
    Box::new(ScriptedDice::new(faces))
}

/// Fixed reference time
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}
