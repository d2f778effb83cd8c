//! Actor persistence
//!
//! Actors are saved as versioned JSON snapshots. Loading is forgiving about
//! the fields that old or hand-edited saves get wrong:
//! - the regeneration timestamp may be missing, unparsable, or stored under
//!   the legacy `last_login` key
//! - individual buffs may be malformed
//!
//! Both are repaired to safe defaults with a warning instead of failing the
//! whole load.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::actor::Actor;
use crate::combat::{BuffSet, StatBuff};
use crate::regen::parse_timestamp;

/// Current snapshot schema version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("actor not found: {0}")]
    NotFound(String),

    #[error("snapshot version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Loads and saves actors
pub trait ActorStore: Send + Sync {
    fn load(&self, id: &str) -> Result<Actor, StoreError>;
    fn save(&self, actor: &Actor) -> Result<(), StoreError>;
}

fn legacy_version() -> u32 {
    SNAPSHOT_VERSION
}

/// A persisted actor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorSnapshot {
    #[serde(default = "legacy_version")]
    pub schema_version: u32,
    pub actor: Value,
}

impl ActorSnapshot {
    /// Capture the current state of an actor
    pub fn capture(actor: &Actor) -> Result<Self, StoreError> {
        Ok(Self {
            schema_version: SNAPSHOT_VERSION,
            actor: serde_json::to_value(actor)?,
        })
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Rebuild the actor, repairing timestamp and buff fields
    pub fn restore(self) -> Result<Actor, StoreError> {
        if self.schema_version > SNAPSHOT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: self.schema_version,
                supported: SNAPSHOT_VERSION,
            });
        }

        let mut fields = match self.actor {
            Value::Object(fields) => fields,
            other => {
                return Err(StoreError::Malformed(serde::de::Error::custom(format!(
                    "expected an actor object, found {}",
                    other
                ))))
            }
        };

        let id = fields
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("<unknown>")
            .to_string();

        let raw_timestamp = fields
            .remove("last_regeneration")
            .or_else(|| fields.remove("last_login"));
        fields.remove("last_login");
        let raw_buffs = fields.remove("buffs");

        let mut actor: Actor = serde_json::from_value(Value::Object(fields))?;
        actor.last_regeneration = repair_timestamp(&id, raw_timestamp);
        actor.buffs = repair_buffs(&id, raw_buffs);
        actor.health = actor.health.min(actor.max_health).max(0);
        actor.mana = actor.mana.min(actor.max_mana).max(0);
        Ok(actor)
    }
}

fn repair_timestamp(id: &str, raw: Option<Value>) -> Option<DateTime<Utc>> {
    match raw {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => {
            let parsed = parse_timestamp(&text);
            if parsed.is_none() {
                warn!(player = %id, value = %text, "unparsable regeneration timestamp, resetting");
            }
            parsed
        }
        Some(other) => {
            warn!(
                player = %id,
                value = %other,
                "regeneration timestamp is not a string, resetting"
            );
            None
        }
    }
}

fn repair_buffs(id: &str, raw: Option<Value>) -> BuffSet {
    let entries = match raw {
        None | Some(Value::Null) => return BuffSet::new(),
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            warn!(player = %id, value = %other, "buffs are not a list, dropping them");
            return BuffSet::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<StatBuff>(entry.clone()) {
            Ok(buff) => Some(buff),
            Err(e) => {
                warn!(player = %id, value = %entry, error = %e, "dropping malformed buff");
                None
            }
        })
        .collect()
}

/// In-memory actor store
#[derive(Debug, Default)]
pub struct MemoryActorStore {
    snapshots: RwLock<HashMap<String, String>>,
}

impl MemoryActorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw snapshot JSON, as an older build would have written it
    pub fn insert_raw(&self, id: impl Into<String>, json: impl Into<String>) {
        self.snapshots.write().insert(id.into(), json.into());
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.read().is_empty()
    }
}

impl ActorStore for MemoryActorStore {
    fn load(&self, id: &str) -> Result<Actor, StoreError> {
        let json = self
            .snapshots
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        ActorSnapshot::from_json(&json)?.restore()
    }

    fn save(&self, actor: &Actor) -> Result<(), StoreError> {
        let json = ActorSnapshot::capture(actor)?.to_json()?;
        self.snapshots.write().insert(actor.id.clone(), json);
        debug!(player = %actor.id, "actor saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{CharacterClass, Stat};
    use crate::quests::{QuestKind, QuestProgress};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn legacy_json(timestamp: Value, buffs: Value) -> String {
        let mut actor =
            serde_json::to_value(Actor::new("p1", "Old Timer", CharacterClass::Rogue)).unwrap();
        let fields = actor.as_object_mut().unwrap();
        fields.remove("last_regeneration");
        fields.insert("last_login".to_string(), timestamp);
        fields.insert("buffs".to_string(), buffs);
        json!({ "actor": actor }).to_string()
    }

    #[test]
    fn test_save_and_load() {
        let store = MemoryActorStore::new();
        let mut actor = Actor::new("p1", "Hero", CharacterClass::Paladin);
        actor.gold = 40;
        actor.inventory.push("health_potion".into());
        actor.quests.push(QuestProgress::new("q1", "Wolves", QuestKind::Kill, 3));
        actor.buffs.add(StatBuff {
            stat: Stat::Strength,
            magnitude: 3,
            expires_at: Utc::now() + Duration::minutes(5),
        });

        store.save(&actor).unwrap();
        assert_eq!(store.load("p1").unwrap(), actor);
        assert!(matches!(store.load("p2"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_legacy_last_login() {
        let store = MemoryActorStore::new();
        store.insert_raw("p1", legacy_json(json!("2026-03-01T12:00:00.000000"), json!([])));

        let actor = store.load("p1").unwrap();
        assert_eq!(
            actor.last_regeneration,
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_repairs_bad_fields() {
        let store = MemoryActorStore::new();
        let buffs = json!([
            { "stat": "agility", "magnitude": 2, "expires_at": "2030-01-01T00:00:00Z" },
            { "stat": "luck", "magnitude": 9, "expires_at": "2030-01-01T00:00:00Z" },
            "garbage"
        ]);
        store.insert_raw("p1", legacy_json(json!("not a time"), buffs));

        let actor = store.load("p1").unwrap();
        assert_eq!(actor.last_regeneration, None);
        assert_eq!(actor.buffs.len(), 1);
    }

    #[test]
    fn test_clamps_current_values() {
        let mut actor = Actor::new("p1", "Hero", CharacterClass::Mage);
        actor.health = 500;
        actor.mana = -3;
        let actor = ActorSnapshot::capture(&actor).unwrap().restore().unwrap();
        assert_eq!(actor.health, actor.max_health);
        assert_eq!(actor.mana, 0);
    }

    #[test]
    fn test_rejects_future_versions() {
        let snapshot = ActorSnapshot {
            schema_version: SNAPSHOT_VERSION + 1,
            actor: json!({}),
        };
        assert!(matches!(
            snapshot.restore(),
            Err(StoreError::UnsupportedVersion { .. })
        ));

        let snapshot = ActorSnapshot {
            schema_version: SNAPSHOT_VERSION,
            actor: json!([1, 2]),
        };
        assert!(matches!(snapshot.restore(), Err(StoreError::Malformed(_))));
    }
}
