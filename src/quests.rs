//! Quest progress tracking
//!
//! Quests move `available -> active -> completed -> claimed`. Only active
//! quests count events, progress never passes the target, and a quest reports
//! completion exactly once.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

use crate::actor::Actor;

/// Event kinds a quest can count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestKind {
    /// Defeat monsters (detail: monster kind)
    Kill,
    /// Come through encounters (detail: location)
    Survive,
    /// Visit places (detail: location)
    Explore,
    /// Gather items (detail: item id)
    Collect,
}

impl FromStr for QuestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kill" => Ok(QuestKind::Kill),
            "survive" => Ok(QuestKind::Survive),
            "explore" => Ok(QuestKind::Explore),
            "collect" => Ok(QuestKind::Collect),
            other => Err(format!("Unknown quest kind: {}", other)),
        }
    }
}

impl std::fmt::Display for QuestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QuestKind::Kill => "kill",
            QuestKind::Survive => "survive",
            QuestKind::Explore => "explore",
            QuestKind::Collect => "collect",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Available,
    Active,
    Completed,
    Claimed,
}

/// A quest and how far along it is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestProgress {
    pub id: String,
    pub name: String,
    pub kind: QuestKind,
    /// Only events with this detail count. `None` counts every event of the kind.
    #[serde(default)]
    pub target_detail: Option<String>,
    #[serde(default)]
    pub progress: u32,
    pub target: u32,
    pub status: QuestStatus,
}

impl QuestProgress {
    /// A new, not yet accepted quest
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: QuestKind,
        target: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            target_detail: None,
            progress: 0,
            target,
            status: QuestStatus::Available,
        }
    }

    /// Restrict the quest to events with this detail
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.target_detail = Some(detail.into());
        self
    }

    /// Start the quest. Returns false unless it was available.
    pub fn accept(&mut self) -> bool {
        if self.status != QuestStatus::Available {
            return false;
        }
        self.status = QuestStatus::Active;
        true
    }

    /// Whether an event counts toward this quest
    pub fn matches(&self, kind: QuestKind, detail: &str) -> bool {
        self.status == QuestStatus::Active
            && self.kind == kind
            && self.target_detail.as_deref().map_or(true, |wanted| wanted == detail)
    }

    /// Count one event. Returns true when this event completed the quest.
    pub fn advance(&mut self) -> bool {
        if self.status != QuestStatus::Active {
            return false;
        }
        self.progress = (self.progress + 1).min(self.target);
        if self.progress >= self.target {
            self.status = QuestStatus::Completed;
            return true;
        }
        false
    }

    /// Collect the reward. Returns false unless the quest was completed.
    pub fn claim(&mut self) -> bool {
        if self.status != QuestStatus::Completed {
            return false;
        }
        self.status = QuestStatus::Claimed;
        true
    }
}

/// Count an event against the actor's active quests. Returns the quests this
/// event completed.
pub fn update_quest_progress(
    actor: &mut Actor,
    kind: QuestKind,
    detail: &str,
) -> Vec<QuestProgress> {
    let mut completed = Vec::new();
    for quest in actor.quests.iter_mut().filter(|q| q.matches(kind, detail)) {
        if quest.advance() {
            info!(player = %actor.id, quest = %quest.id, "quest completed");
            completed.push(quest.clone());
        } else {
            debug!(
                quest = %quest.id,
                progress = quest.progress,
                target = quest.target,
                "quest progress"
            );
        }
    }
    completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::CharacterClass;

    fn hunter() -> Actor {
        let mut actor = Actor::new("p1", "Test", CharacterClass::Rogue);
        let mut wolves =
            QuestProgress::new("wolves", "Wolf Hunt", QuestKind::Kill, 2).with_detail("wolf");
        wolves.accept();
        let mut anything = QuestProgress::new("slayer", "Slayer", QuestKind::Kill, 3);
        anything.accept();
        let idle = QuestProgress::new("survivor", "Survivor", QuestKind::Survive, 1);
        actor.quests = vec![wolves, anything, idle];
        actor
    }

    #[test]
    fn test_filters_by_kind_detail_and_status() {
        let mut actor = hunter();

        assert!(update_quest_progress(&mut actor, QuestKind::Kill, "goblin").is_empty());
        assert_eq!(actor.quests[0].progress, 0);
        assert_eq!(actor.quests[1].progress, 1);

        update_quest_progress(&mut actor, QuestKind::Survive, "forest");
        assert_eq!(actor.quests[2].progress, 0);
    }

    #[test]
    fn test_completion_reported_once() {
        let mut actor = hunter();

        assert!(update_quest_progress(&mut actor, QuestKind::Kill, "wolf").is_empty());
        let completed = update_quest_progress(&mut actor, QuestKind::Kill, "wolf");
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, "wolves");
        assert_eq!(completed[0].status, QuestStatus::Completed);

        let completed = update_quest_progress(&mut actor, QuestKind::Kill, "wolf");
        assert_eq!(completed.iter().map(|q| q.id.as_str()).collect::<Vec<_>>(), vec!["slayer"]);

        for _ in 0..5 {
            assert!(update_quest_progress(&mut actor, QuestKind::Kill, "wolf").is_empty());
        }
        assert!(actor.quests.iter().all(|q| q.progress <= q.target));
        assert_eq!(actor.quests[0].progress, 2);
    }

    #[test]
    fn test_lifecycle() {
        let mut quest = QuestProgress::new("q", "Quest", QuestKind::Explore, 1);
        assert!(!quest.advance());
        assert!(!quest.claim());
        assert!(quest.accept());
        assert!(!quest.accept());
        assert!(quest.advance());
        assert!(!quest.advance());
        assert!(quest.claim());
        assert!(!quest.claim());
        assert_eq!(quest.status, QuestStatus::Claimed);
    }
}
