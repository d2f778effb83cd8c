//! venterra - turn-based RPG combat engine
//!
//! Resolves encounters between a player and a monster one action at a time,
//! with d20 attack rolls, class abilities, status effects and flee attempts.
//! Around the combat core sit out-of-combat regeneration and quest progress.

pub mod actor;
pub mod catalog;
pub mod combat;
pub mod config;
pub mod error;
pub mod monster;
pub mod quests;
pub mod regen;
pub mod store;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

pub use actor::{Actor, Attributes, CharacterClass, Stat};
pub use catalog::{Catalog, StaticCatalog};
pub use combat::{Action, ActionResult, LegalAction, Outcome, SessionHandle};
pub use config::EngineConfig;
pub use error::{CombatError, NotFound, ValidationError};
pub use monster::{Monster, MonsterKind};
pub use quests::{QuestKind, QuestProgress};
pub use regen::Regeneration;

use combat::{CombatSession, DiceSource, EncounterManager, SkillCheck, ThreadDice};

/// The engine instance
pub struct Engine {
    config: Arc<EngineConfig>,
    catalog: Arc<dyn Catalog>,
    encounters: EncounterManager,
}

impl Engine {
    /// Create an engine with the built-in catalog plus configured overrides
    pub fn new(config: EngineConfig) -> Self {
        let catalog = Arc::new(StaticCatalog::from_config(&config));
        Self::with_catalog(config, catalog)
    }

    /// Create an engine backed by a custom catalog
    pub fn with_catalog(config: EngineConfig, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            config: Arc::new(config),
            catalog,
            encounters: EncounterManager::new(),
        }
    }

    /// Create a shared instance
    pub fn shared(config: EngineConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    /// Start an encounter using the thread RNG
    pub async fn start_encounter(
        &self,
        player: &Actor,
        kind: MonsterKind,
        level: u32,
    ) -> Result<SessionHandle, CombatError> {
        self.start_encounter_with_dice(player, kind, level, Box::new(ThreadDice)).await
    }

    /// Start an encounter with an explicit dice source (seeded or scripted).
    /// The session works on a copy of the player; every result carries the
    /// updated actor.
    pub async fn start_encounter_with_dice(
        &self,
        player: &Actor,
        kind: MonsterKind,
        level: u32,
        dice: Box<dyn DiceSource>,
    ) -> Result<SessionHandle, CombatError> {
        let max = self.config.combat.max_monster_level;
        if level == 0 || level > max {
            return Err(ValidationError::LevelOutOfRange { level, max }.into());
        }

        let session = CombatSession::new(
            player.clone(),
            Monster::new(kind, level),
            Arc::clone(&self.catalog),
            Arc::clone(&self.config),
            dice,
        );
        self.encounters.start(session).await
    }

    /// Resolve one player action
    pub async fn submit_action(
        &self,
        handle: &SessionHandle,
        action: Action,
    ) -> Result<ActionResult, CombatError> {
        self.encounters.submit(handle, action).await
    }

    /// Actions the player may take next
    pub async fn legal_actions(
        &self,
        handle: &SessionHandle,
    ) -> Result<Vec<LegalAction>, CombatError> {
        self.encounters.legal_actions(handle).await
    }

    /// Abandon a player's encounter, returning the actor as it stands
    pub async fn end_encounter(&self, player_id: &str) -> Result<Actor, CombatError> {
        self.encounters.end(player_id).await
    }

    pub async fn is_in_combat(&self, player_id: &str) -> bool {
        self.encounters.is_in_combat(player_id).await
    }

    /// Restore health and mana for time spent out of combat
    pub async fn regenerate(
        &self,
        actor: &mut Actor,
        now: DateTime<Utc>,
    ) -> Result<Regeneration, CombatError> {
        if self.encounters.is_in_combat(&actor.id).await {
            return Err(ValidationError::InCombat(actor.id.clone()).into());
        }
        Ok(regen::regenerate_with_tick(actor, now, self.config.regen.tick_seconds))
    }

    /// Count a game event against the actor's quests, returning newly
    /// completed quests
    pub fn update_quest_progress(
        &self,
        actor: &mut Actor,
        kind: QuestKind,
        detail: &str,
    ) -> Vec<QuestProgress> {
        let completed = quests::update_quest_progress(actor, kind, detail);
        if !completed.is_empty() {
            info!(player = %actor.id, count = completed.len(), %kind, %detail, "quests completed");
        }
        completed
    }

    /// Roll a d20 check of one of the actor's stats against a difficulty class
    pub fn skill_check(
        &self,
        actor: &Actor,
        stat: Stat,
        difficulty: i32,
        dice: &mut dyn DiceSource,
    ) -> SkillCheck {
        let score = actor.effective_stat(stat, Utc::now());
        let check = combat::skill_check(dice, score, difficulty);
        debug!(
            player = %actor.id,
            %stat,
            score,
            roll = check.roll,
            difficulty,
            success = check.success,
            "skill check"
        );
        check
    }
}
