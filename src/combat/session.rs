//! Combat session state machine
//!
//! One encounter between a player and a monster. Every accepted action plays
//! out a full round:
//! - the player's action
//! - the opponent's counter-attack
//! - damage over time at round end
//!
//! The round stops as soon as either side drops. A rejected action changes
//! nothing: no mana spent, no dice rolled, no round advanced.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::damage::{mitigate, DamageRoll};
use super::dice::{ability_modifier, AttackRoll, DiceSource};
use super::effects::{Combatant, DamageOverTime, EncounterEffects, StatBuff, StatusEffect};
use super::resources::AbilityUsage;
use crate::actor::{Actor, LevelUp, Stat};
use crate::catalog::{
    dice_or_minimum, AbilityEffect, Catalog, ClassPassive, ConsumableEffect, ItemKind,
};
use crate::config::EngineConfig;
use crate::error::{CombatError, NotFound, ValidationError};
use crate::monster::Monster;
use crate::quests::QuestKind;

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    AwaitingAction,
    Resolving,
    Victory,
    Defeat,
    Fled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Victory | SessionState::Defeat | SessionState::Fled
        )
    }
}

/// A player action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "id", rename_all = "snake_case")]
pub enum Action {
    Attack,
    Defend,
    UseAbility(String),
    UseItem(String),
    Flee,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Attack => write!(f, "attack"),
            Action::Defend => write!(f, "defend"),
            Action::UseAbility(id) => write!(f, "ability:{}", id),
            Action::UseItem(id) => write!(f, "item:{}", id),
            Action::Flee => write!(f, "flee"),
        }
    }
}

/// How an encounter ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    Victory {
        experience: u32,
        gold: u32,
        level_up: Option<LevelUp>,
    },
    Defeat,
    Fled,
}

/// Result of one accepted action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    /// Lines produced by this action
    pub log: Vec<String>,
    pub player: Actor,
    pub opponent: Monster,
    pub terminal: bool,
    pub outcome: Option<Outcome>,
    pub round: u32,
}

impl ActionResult {
    /// Quest event to report for this result, if any
    pub fn quest_event(&self) -> Option<(QuestKind, String)> {
        match self.outcome {
            Some(Outcome::Victory { .. }) => {
                Some((QuestKind::Kill, self.opponent.kind.to_string()))
            }
            _ => None,
        }
    }
}

/// An action the player may submit next
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LegalAction {
    Attack,
    Defend,
    Flee {
        chance: u32,
    },
    UseAbility {
        ability_id: String,
        name: String,
        /// Why the ability cannot be used right now
        unavailable: Option<String>,
    },
    UseItem {
        item_id: String,
        name: String,
        count: usize,
    },
}

/// A single encounter
pub struct CombatSession {
    id: Uuid,
    player: Actor,
    opponent: Monster,
    round: u32,
    state: SessionState,
    history: VecDeque<String>,
    usage: AbilityUsage,
    effects: EncounterEffects,
    defending: bool,
    dice: Box<dyn DiceSource>,
    catalog: Arc<dyn Catalog>,
    config: Arc<EngineConfig>,
}

impl CombatSession {
    pub fn new(
        player: Actor,
        opponent: Monster,
        catalog: Arc<dyn Catalog>,
        config: Arc<EngineConfig>,
        dice: Box<dyn DiceSource>,
    ) -> Self {
        let mut session = Self {
            id: Uuid::new_v4(),
            player,
            opponent,
            round: 1,
            state: SessionState::AwaitingAction,
            history: VecDeque::new(),
            usage: AbilityUsage::new(),
            effects: EncounterEffects::new(),
            defending: false,
            dice,
            catalog,
            config,
        };
        let opening = format!(
            "{} encounters a {} (level {})!",
            session.player.name, session.opponent.name, session.opponent.level
        );
        session.remember(&[opening]);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn player(&self) -> &Actor {
        &self.player
    }

    pub fn opponent(&self) -> &Monster {
        &self.opponent
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn effects(&self) -> &EncounterEffects {
        &self.effects
    }

    pub fn usage(&self) -> &AbilityUsage {
        &self.usage
    }

    /// The most recent battle log lines
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    /// End the session, handing the player back
    pub fn into_player(self) -> Actor {
        self.player
    }

    /// Resolve one action at the current time
    pub fn submit(&mut self, action: Action) -> Result<ActionResult, CombatError> {
        self.submit_at(action, Utc::now())
    }

    /// Resolve one action as of `now` (buff expiry and new buff timers)
    pub fn submit_at(
        &mut self,
        action: Action,
        now: DateTime<Utc>,
    ) -> Result<ActionResult, CombatError> {
        if self.state.is_terminal() {
            return Err(ValidationError::EncounterOver.into());
        }

        debug!(session = %self.id, round = self.round, %action, "resolving action");
        self.state = SessionState::Resolving;
        let mut log = Vec::new();

        let resolved = match &action {
            Action::Attack => Ok(self.player_attack(now, &mut log)),
            Action::Defend => Ok(self.player_defend(&mut log)),
            Action::UseAbility(id) => self.player_ability(id, now, &mut log),
            Action::UseItem(id) => self.player_item(id, now, &mut log),
            Action::Flee => Ok(self.player_flee(now, &mut log)),
        };

        let mut outcome = match resolved {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(session = %self.id, %action, error = %e, "action rejected");
                self.state = SessionState::AwaitingAction;
                return Err(e);
            }
        };

        if outcome.is_none() {
            outcome = self.opponent_turn(&mut log);
        }
        if outcome.is_none() {
            outcome = self.end_round(&mut log);
        }
        if outcome.is_none() {
            self.state = SessionState::AwaitingAction;
        }

        self.remember(&log);
        Ok(ActionResult {
            log,
            player: self.player.clone(),
            opponent: self.opponent.clone(),
            terminal: outcome.is_some(),
            outcome,
            round: self.round,
        })
    }

    /// Actions the player may submit now
    pub fn legal_actions(&self) -> Vec<LegalAction> {
        self.legal_actions_at(Utc::now())
    }

    pub fn legal_actions_at(&self, now: DateTime<Utc>) -> Vec<LegalAction> {
        if self.state.is_terminal() {
            return Vec::new();
        }

        let agility = self.player.effective_stat(Stat::Agility, now);
        let mut actions = vec![
            LegalAction::Attack,
            LegalAction::Defend,
            LegalAction::Flee {
                chance: self.config.combat.flee_chance(agility),
            },
        ];

        for ability in self.catalog.abilities_for(self.player.class) {
            let unavailable = self
                .usage
                .check(ability, &self.player, self.opponent.category)
                .err()
                .map(|e| e.to_string());
            actions.push(LegalAction::UseAbility {
                ability_id: ability.id.clone(),
                name: ability.name.clone(),
                unavailable,
            });
        }

        // consumables grouped by id, in inventory order
        let mut items: Vec<(&str, &str, usize)> = Vec::new();
        for id in &self.player.inventory {
            let Some(item) = self.catalog.item(id).filter(|item| item.is_consumable()) else {
                continue;
            };
            match items.iter_mut().find(|(seen, _, _)| *seen == id.as_str()) {
                Some((_, _, count)) => *count += 1,
                None => items.push((id.as_str(), item.name.as_str(), 1)),
            }
        }
        actions.extend(items.into_iter().map(|(id, name, count)| LegalAction::UseItem {
            item_id: id.to_string(),
            name: name.to_string(),
            count,
        }));

        actions
    }

    fn remember(&mut self, lines: &[String]) {
        let limit = self.config.combat.battle_log_lines.max(1);
        for line in lines {
            debug!(session = %self.id, "{}", line);
            self.history.push_back(line.clone());
        }
        while self.history.len() > limit {
            self.history.pop_front();
        }
    }

    fn player_attack(&mut self, now: DateTime<Utc>, log: &mut Vec<String>) -> Option<Outcome> {
        let bonus = self.player.attack_bonus(now);
        let roll = AttackRoll::roll(self.dice.as_mut(), bonus, self.opponent.armor_class());

        if roll.fumble {
            log.push(format!("{} fumbles the attack! ({})", self.player.name, roll));
            return None;
        }
        if !roll.hit {
            log.push(format!("{} misses the {}. ({})", self.player.name, self.opponent.name, roll));
            return None;
        }

        let damage = self.weapon_damage(now, roll.critical);
        let dealt = self.damage_opponent(damage.total);
        if roll.critical {
            log.push(format!(
                "Critical hit! {} deals {} damage to the {}. ({}; {})",
                self.player.name, dealt, self.opponent.name, roll, damage
            ));
        } else {
            log.push(format!(
                "{} hits the {} for {} damage. ({}; {})",
                self.player.name, self.opponent.name, dealt, roll, damage
            ));
        }

        if let Some(outcome) = self.check_victory(log) {
            return Some(outcome);
        }
        self.class_passive(now, dealt, log);
        self.check_victory(log)
    }

    fn player_defend(&mut self, log: &mut Vec<String>) -> Option<Outcome> {
        self.defending = true;
        log.push(format!("{} takes a defensive stance.", self.player.name));
        None
    }

    fn player_ability(
        &mut self,
        ability_id: &str,
        now: DateTime<Utc>,
        log: &mut Vec<String>,
    ) -> Result<Option<Outcome>, CombatError> {
        let catalog = Arc::clone(&self.catalog);
        let ability = match catalog.ability(self.player.class, ability_id) {
            Some(ability) => ability,
            None if catalog.has_ability(ability_id) => {
                return Err(ValidationError::NotClassAbility {
                    ability: ability_id.to_string(),
                    class: self.player.class,
                }
                .into());
            }
            None => return Err(NotFound::Ability(ability_id.to_string()).into()),
        };

        let spent = self.usage.commit(ability, &mut self.player, self.opponent.category)?;
        if spent.mana > 0 {
            log.push(format!("{} uses {} (-{} mana).", self.player.name, ability.name, spent.mana));
        } else {
            log.push(format!("{} uses {}!", self.player.name, ability.name));
        }

        for effect in &ability.effects {
            match effect {
                AbilityEffect::WeaponStrike { percent, critical_dice } => {
                    let damage = self.weapon_damage(now, *critical_dice);
                    let dealt = self.damage_opponent(damage.scaled(*percent));
                    log.push(format!(
                        "The {} takes {} damage. ({})",
                        self.opponent.name, dealt, damage
                    ));
                }
                AbilityEffect::SpellDamage { dice, stat } => {
                    let die = dice_or_minimum(dice, &ability.id);
                    let modifier = stat
                        .map(|stat| ability_modifier(self.player.stat_total(stat, now)))
                        .unwrap_or(0);
                    let damage = DamageRoll::roll(self.dice.as_mut(), &die, modifier, false);
                    let dealt = self.damage_opponent(damage.total);
                    log.push(format!(
                        "The {} takes {} damage. ({})",
                        self.opponent.name, dealt, damage
                    ));
                }
                AbilityEffect::Shield => self.apply_effect(StatusEffect::Shield, log),
                AbilityEffect::DamageOverTime { dice, ticks } => {
                    let die = dice_or_minimum(dice, &ability.id);
                    let per_tick = die.roll(self.dice.as_mut()).max(1);
                    let dot = DamageOverTime {
                        target: Combatant::Opponent,
                        per_tick,
                        remaining_ticks: *ticks,
                        source: ability.name.clone(),
                    };
                    self.apply_effect(StatusEffect::DamageOverTime(dot), log);
                }
            }
        }

        Ok(self.check_victory(log))
    }

    fn player_item(
        &mut self,
        item_id: &str,
        now: DateTime<Utc>,
        log: &mut Vec<String>,
    ) -> Result<Option<Outcome>, CombatError> {
        let slot = self
            .player
            .inventory
            .iter()
            .position(|id| id == item_id)
            .ok_or_else(|| NotFound::InventoryItem {
                player: self.player.id.clone(),
                item: item_id.to_string(),
            })?;

        let catalog = Arc::clone(&self.catalog);
        let item = catalog
            .item(item_id)
            .ok_or_else(|| NotFound::Item(item_id.to_string()))?;
        let ItemKind::Consumable { effect } = &item.kind else {
            return Err(ValidationError::NotConsumable {
                item: item_id.to_string(),
            }
            .into());
        };

        let full_health = self.player.health >= self.player.max_health;
        let full_mana = self.player.mana >= self.player.max_mana;
        let wasted = match effect {
            ConsumableEffect::Heal { .. } | ConsumableEffect::FullHeal if full_health => {
                Some("health is already full")
            }
            ConsumableEffect::RestoreMana { .. } if full_mana => Some("mana is already full"),
            ConsumableEffect::Buff { duration_secs, .. }
                if buff_expiry(now, *duration_secs).is_none() =>
            {
                Some("buff duration is out of range")
            }
            _ => None,
        };
        if let Some(reason) = wasted {
            return Err(ValidationError::NoEffect {
                item: item_id.to_string(),
                reason,
            }
            .into());
        }

        self.player.inventory.remove(slot);
        match effect {
            ConsumableEffect::Heal { amount } => {
                let healed = self.player.heal(*amount);
                log.push(format!(
                    "{} drinks a {} and recovers {} health.",
                    self.player.name, item.name, healed
                ));
            }
            ConsumableEffect::FullHeal => {
                let healed = self.player.heal(self.player.max_health);
                log.push(format!(
                    "{} drinks a {} and recovers {} health.",
                    self.player.name, item.name, healed
                ));
            }
            ConsumableEffect::RestoreMana { amount } => {
                let restored = self.player.restore_mana(*amount);
                log.push(format!(
                    "{} drinks a {} and recovers {} mana.",
                    self.player.name, item.name, restored
                ));
            }
            ConsumableEffect::Buff {
                stat,
                magnitude,
                duration_secs,
            } => {
                log.push(format!("{} drinks an {}.", self.player.name, item.name));
                let buff = StatBuff {
                    stat: *stat,
                    magnitude: *magnitude,
                    expires_at: buff_expiry(now, *duration_secs).unwrap_or(now),
                };
                self.apply_effect(StatusEffect::StatBuff(buff), log);
            }
        }

        Ok(None)
    }

    fn player_flee(&mut self, now: DateTime<Utc>, log: &mut Vec<String>) -> Option<Outcome> {
        let agility = self.player.stat_total(Stat::Agility, now);
        let chance = self.config.combat.flee_chance(agility);
        let roll = self.dice.percentile();

        if roll <= chance {
            log.push(format!(
                "{} escapes from the {}! (rolled {}, needed {} or less)",
                self.player.name, self.opponent.name, roll, chance
            ));
            self.state = SessionState::Fled;
            info!(session = %self.id, player = %self.player.id, round = self.round, "player fled");
            return Some(Outcome::Fled);
        }

        log.push(format!(
            "{} fails to escape! (rolled {}, needed {} or less)",
            self.player.name, roll, chance
        ));
        None
    }

    fn opponent_turn(&mut self, log: &mut Vec<String>) -> Option<Outcome> {
        let extra_stamina = if std::mem::take(&mut self.defending) {
            self.config.combat.defend_stamina_bonus
        } else {
            0
        };
        let armor_class = self.player.armor_class(extra_stamina);
        let roll = AttackRoll::roll(self.dice.as_mut(), self.opponent.attack_bonus(), armor_class);

        if roll.fumble {
            log.push(format!("The {} stumbles and misses! ({})", self.opponent.name, roll));
            return None;
        }
        if !roll.hit {
            log.push(format!("The {} misses {}. ({})", self.opponent.name, self.player.name, roll));
            return None;
        }
        if self.effects.consume_shield() {
            log.push(format!("The shield absorbs the {}'s attack!", self.opponent.name));
            return None;
        }

        let damage = DamageRoll::roll(self.dice.as_mut(), &self.opponent.damage, 0, roll.critical);
        let taken = self
            .player
            .take_damage(mitigate(damage.total, self.player.defense(extra_stamina)));
        let prefix = if roll.critical { "Critical hit! " } else { "" };
        log.push(format!(
            "{}The {} hits {} for {} damage. ({})",
            prefix, self.opponent.name, self.player.name, taken, roll
        ));

        if !self.player.is_alive() {
            return Some(self.defeat(log));
        }
        None
    }

    fn end_round(&mut self, log: &mut Vec<String>) -> Option<Outcome> {
        for tick in self.effects.tick() {
            match tick.target {
                Combatant::Opponent => {
                    let dealt = self.damage_opponent(tick.damage);
                    log.push(format!(
                        "The {} takes {} damage from {}.",
                        self.opponent.name, dealt, tick.source
                    ));
                }
                Combatant::Player => {
                    let taken = self.player.take_damage(tick.damage);
                    log.push(format!(
                        "{} takes {} damage from {}.",
                        self.player.name, taken, tick.source
                    ));
                }
            }
        }

        if let Some(outcome) = self.check_victory(log) {
            return Some(outcome);
        }
        if !self.player.is_alive() {
            return Some(self.defeat(log));
        }

        self.round += 1;
        None
    }

    fn apply_effect(&mut self, effect: StatusEffect, log: &mut Vec<String>) {
        match effect {
            StatusEffect::Shield => {
                self.effects.raise_shield();
                log.push(format!("A shield of light surrounds {}.", self.player.name));
            }
            StatusEffect::DamageOverTime(dot) => {
                let target = match dot.target {
                    Combatant::Player => self.player.name.as_str(),
                    Combatant::Opponent => self.opponent.name.as_str(),
                };
                log.push(format!(
                    "{} suffers {} ({} damage per round for {} rounds).",
                    target, dot.source, dot.per_tick, dot.remaining_ticks
                ));
                self.effects.add_damage_over_time(dot);
            }
            StatusEffect::StatBuff(buff) => {
                log.push(format!(
                    "{}'s {} rises by {}.",
                    self.player.name, buff.stat, buff.magnitude
                ));
                self.player.buffs.add(buff);
            }
        }
    }

    fn weapon_damage(&mut self, now: DateTime<Utc>, critical: bool) -> DamageRoll {
        let (die, stat) = self.player.weapon_dice();
        let modifier = ability_modifier(self.player.stat_total(stat, now));
        DamageRoll::roll(self.dice.as_mut(), &die, modifier, critical)
    }

    fn damage_opponent(&mut self, amount: i32) -> i32 {
        let dealt = self.opponent.take_damage(amount);
        self.player.record.damage_dealt += dealt as u64;
        dealt
    }

    fn class_passive(&mut self, now: DateTime<Utc>, dealt: i32, log: &mut Vec<String>) {
        match self.catalog.class_passive(self.player.class) {
            ClassPassive::None => {}
            ClassPassive::FollowUpStrike { stat } => {
                if self.passive_triggers(stat, now) {
                    let damage = self.weapon_damage(now, false);
                    let extra = self.damage_opponent(damage.total);
                    log.push(format!(
                        "{} follows up with a second strike for {} damage. ({})",
                        self.player.name, extra, damage
                    ));
                }
            }
            ClassPassive::DoubleDamage { stat } => {
                if self.passive_triggers(stat, now) {
                    let extra = self.damage_opponent(dealt);
                    log.push(format!(
                        "A precise blow! {} deals {} extra damage.",
                        self.player.name, extra
                    ));
                }
            }
        }
    }

    fn passive_triggers(&mut self, stat: Stat, now: DateTime<Utc>) -> bool {
        let chance = self.config.combat.passive_chance(self.player.stat_total(stat, now));
        self.dice.percentile() <= chance
    }

    fn check_victory(&mut self, log: &mut Vec<String>) -> Option<Outcome> {
        if self.opponent.is_alive() {
            return None;
        }
        Some(self.victory(log))
    }

    fn victory(&mut self, log: &mut Vec<String>) -> Outcome {
        let experience = self.opponent.experience_reward;
        let gold = self.opponent.gold_reward;
        let progression = &self.config.progression;

        self.player.gold += u64::from(gold);
        self.player.record.monsters_killed += 1;
        let level_up = self.player.add_experience(
            experience,
            progression.experience_multiplier,
            progression.points_per_level,
        );

        log.push(format!("The {} is defeated!", self.opponent.name));
        log.push(format!("+{} experience, +{} gold.", experience, gold));
        if let Some(level_up) = &level_up {
            log.push(format!("{} reaches level {}!", self.player.name, level_up.new_level));
        }

        self.state = SessionState::Victory;
        info!(
            session = %self.id,
            player = %self.player.id,
            opponent = %self.opponent.kind,
            round = self.round,
            "victory"
        );
        Outcome::Victory {
            experience,
            gold,
            level_up,
        }
    }

    fn defeat(&mut self, log: &mut Vec<String>) -> Outcome {
        self.player.health = 1;
        log.push(format!("{} has been defeated by the {}.", self.player.name, self.opponent.name));
        self.state = SessionState::Defeat;
        info!(
            session = %self.id,
            player = %self.player.id,
            opponent = %self.opponent.kind,
            round = self.round,
            "defeat"
        );
        Outcome::Defeat
    }
}

/// When a buff of `duration_secs` taken at `now` runs out. `None` for
/// durations that are not positive or overflow the calendar.
fn buff_expiry(now: DateTime<Utc>, duration_secs: i64) -> Option<DateTime<Utc>> {
    if duration_secs <= 0 {
        return None;
    }
    Duration::try_seconds(duration_secs).and_then(|duration| now.checked_add_signed(duration))
}
