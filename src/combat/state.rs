//! Encounter registry
//!
//! Tracks which players are fighting:
//! - At most one session per player
//! - Actions for the same player run one at a time
//! - Different players never wait on each other beyond the map lookup
//! - Finished sessions are dropped as soon as they end

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::session::{Action, ActionResult, CombatSession, LegalAction};
use crate::actor::Actor;
use crate::error::{CombatError, NotFound};

/// Identifies one encounter of one player
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle {
    pub player_id: String,
    pub session_id: Uuid,
}

type SharedSession = Arc<Mutex<CombatSession>>;

/// Active encounters by player ID
#[derive(Default)]
pub struct EncounterManager {
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl EncounterManager {
    /// Create a new encounter manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared instance
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a session for its player. Fails if the player is already
    /// fighting; the existing session is left alone.
    pub async fn start(&self, session: CombatSession) -> Result<SessionHandle, CombatError> {
        let handle = SessionHandle {
            player_id: session.player().id.clone(),
            session_id: session.id(),
        };

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&handle.player_id) {
            return Err(CombatError::Conflict {
                player: handle.player_id,
            });
        }

        info!(
            player = %handle.player_id,
            session = %handle.session_id,
            opponent = %session.opponent().kind,
            level = session.opponent().level,
            "encounter started"
        );
        sessions.insert(handle.player_id.clone(), Arc::new(Mutex::new(session)));
        Ok(handle)
    }

    /// Check if a player has an active encounter
    pub async fn is_in_combat(&self, player_id: &str) -> bool {
        self.sessions.read().await.contains_key(player_id)
    }

    /// Number of active encounters
    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn lookup(&self, player_id: &str) -> Result<SharedSession, CombatError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(player_id)
            .cloned()
            .ok_or_else(|| NotFound::Session(player_id.to_string()).into())
    }

    /// Resolve one action. A session that reaches a terminal state is removed
    /// before this returns.
    pub async fn submit(
        &self,
        handle: &SessionHandle,
        action: Action,
    ) -> Result<ActionResult, CombatError> {
        let shared = self.lookup(&handle.player_id).await?;
        let mut session = shared.lock().await;

        // a stale handle, or a session finished by a concurrent action
        if session.id() != handle.session_id || session.state().is_terminal() {
            return Err(NotFound::Session(handle.player_id.clone()).into());
        }

        let result = session.submit(action)?;
        drop(session);

        if result.terminal {
            self.remove(&handle.player_id, &shared).await;
            info!(
                player = %handle.player_id,
                session = %handle.session_id,
                outcome = ?result.outcome,
                "encounter finished"
            );
        }
        Ok(result)
    }

    /// Actions the player may take next
    pub async fn legal_actions(
        &self,
        handle: &SessionHandle,
    ) -> Result<Vec<LegalAction>, CombatError> {
        let shared = self.lookup(&handle.player_id).await?;
        let session = shared.lock().await;
        if session.id() != handle.session_id {
            return Err(NotFound::Session(handle.player_id.clone()).into());
        }
        Ok(session.legal_actions())
    }

    /// Tear down a player's encounter without resolving it (timeouts,
    /// disconnects) and hand the player back
    pub async fn end(&self, player_id: &str) -> Result<Actor, CombatError> {
        let shared = self
            .sessions
            .write()
            .await
            .remove(player_id)
            .ok_or_else(|| NotFound::Session(player_id.to_string()))?;

        // wait for any in-flight action on this session
        let session = shared.lock().await;
        info!(
            player = %player_id,
            session = %session.id(),
            round = session.round(),
            "encounter ended by host"
        );
        Ok(session.player().clone())
    }

    async fn remove(&self, player_id: &str, shared: &SharedSession) {
        let mut sessions = self.sessions.write().await;
        if sessions.get(player_id).is_some_and(|current| Arc::ptr_eq(current, shared)) {
            sessions.remove(player_id);
            debug!(player = %player_id, "session removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Attributes, CharacterClass};
    use crate::catalog::StaticCatalog;
    use crate::combat::dice::ScriptedDice;
    use crate::combat::session::Outcome;
    use crate::config::EngineConfig;
    use crate::error::ValidationError;
    use crate::monster::{Monster, MonsterKind};

    fn session_for(player_id: &str, script: Vec<u32>) -> CombatSession {
        let mut player = Actor::new(player_id, "Hero", CharacterClass::Mage);
        player.attributes = Attributes::uniform(10);
        player.recompute_maximums();
        CombatSession::new(
            player,
            Monster::new(MonsterKind::Goblin, 1),
            Arc::new(StaticCatalog::builtin()),
            Arc::new(EngineConfig::default()),
            Box::new(ScriptedDice::new(script)),
        )
    }

    #[tokio::test]
    async fn test_one_session_per_player() {
        let manager = EncounterManager::new();

        let handle = manager.start(session_for("p1", vec![])).await.unwrap();
        assert!(manager.is_in_combat("p1").await);

        let err = manager.start(session_for("p1", vec![])).await.unwrap_err();
        assert_eq!(err, CombatError::Conflict { player: "p1".into() });

        // the first session still answers to its handle
        let actions = manager.legal_actions(&handle).await.unwrap();
        assert!(!actions.is_empty());

        manager.start(session_for("p2", vec![])).await.unwrap();
        assert_eq!(manager.active_count().await, 2);
    }

    #[tokio::test]
    async fn test_terminal_session_is_removed() {
        let manager = EncounterManager::new();
        let handle = manager.start(session_for("p1", vec![1])).await.unwrap();

        let result = manager.submit(&handle, Action::Flee).await.unwrap();
        assert_eq!(result.outcome, Some(Outcome::Fled));
        assert!(!manager.is_in_combat("p1").await);

        let err = manager.submit(&handle, Action::Attack).await.unwrap_err();
        assert_eq!(err, CombatError::NotFound(NotFound::Session("p1".into())));
    }

    #[tokio::test]
    async fn test_rejected_action_keeps_session() {
        let manager = EncounterManager::new();
        let handle = manager.start(session_for("p1", vec![])).await.unwrap();

        let err = manager
            .submit(&handle, Action::UseAbility("mighty_strike".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, CombatError::Validation(ValidationError::NotClassAbility { .. })));
        assert!(manager.is_in_combat("p1").await);
    }

    #[tokio::test]
    async fn test_stale_handle() {
        let manager = EncounterManager::new();
        let old = manager.start(session_for("p1", vec![])).await.unwrap();
        manager.end("p1").await.unwrap();
        let new = manager.start(session_for("p1", vec![])).await.unwrap();
        assert_ne!(old, new);

        let err = manager.submit(&old, Action::Defend).await.unwrap_err();
        assert!(matches!(err, CombatError::NotFound(_)));
        manager.submit(&new, Action::Defend).await.unwrap();
    }

    #[tokio::test]
    async fn test_end_returns_player() {
        let manager = EncounterManager::new();
        manager.start(session_for("p1", vec![])).await.unwrap();

        let player = manager.end("p1").await.unwrap();
        assert_eq!(player.id, "p1");
        assert!(!manager.is_in_combat("p1").await);

        let err = manager.end("p1").await.unwrap_err();
        assert!(matches!(err, CombatError::NotFound(NotFound::Session(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_player_actions_serialize() {
        let manager = EncounterManager::shared();
        // every roll is a natural 1: both sides fumble forever
        let handle = manager.start(session_for("p1", vec![])).await.unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let handle = handle.clone();
                tokio::spawn(async move { manager.submit(&handle, Action::Attack).await })
            })
            .collect();

        let mut rounds = Vec::new();
        for task in tasks {
            rounds.push(task.await.unwrap().unwrap().round);
        }
        rounds.sort_unstable();
        assert_eq!(rounds, (2..=9).collect::<Vec<u32>>());
    }
}
