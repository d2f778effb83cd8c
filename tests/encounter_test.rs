//! End-to-end encounter tests through the engine facade

mod common;

use std::sync::Arc;

use common::{engine, hero, scripted};
use venterra::combat::{AttackRoll, SeededDice};
use venterra::store::{ActorStore, MemoryActorStore};
use venterra::{
    Action, CharacterClass, CombatError, Engine, EngineConfig, LegalAction, Monster, MonsterKind,
    NotFound, Outcome, QuestKind, QuestProgress, ValidationError,
};

#[tokio::test]
async fn test_attack_against_goblin_armor() {
    let goblin = Monster::new(MonsterKind::Goblin, 1);
    assert_eq!(goblin.armor_class(), 12);

    let roll = AttackRoll::resolve(15, 3, goblin.armor_class());
    assert_eq!(roll.total, 18);
    assert!(roll.hit);
    assert!(!roll.critical);

    let engine = engine();
    let mut player = hero("p1", CharacterClass::Mage);
    player.attributes.strength = 16;

    // d20 15, 1d1 damage, goblin fumbles
    let handle = engine
        .start_encounter_with_dice(&player, MonsterKind::Goblin, 1, scripted([15, 1, 1]))
        .await
        .unwrap();
    let result = engine.submit_action(&handle, Action::Attack).await.unwrap();

    assert!(result.log[0].contains("d20: 15 +3 = 18 vs AC 12"));
    assert_eq!(result.opponent.health, 20 - 4);
    assert_eq!(result.player.health, result.player.max_health);
    assert_eq!(result.round, 2);
}

#[tokio::test]
async fn test_ability_without_mana_is_rejected() {
    let engine = engine();
    let mut player = hero("p1", CharacterClass::Mage);
    player.mana = 4;

    let handle = engine
        .start_encounter_with_dice(&player, MonsterKind::Wolf, 1, scripted([]))
        .await
        .unwrap();

    let actions = engine.legal_actions(&handle).await.unwrap();
    assert!(actions.iter().any(|action| matches!(
        action,
        LegalAction::UseAbility { ability_id, unavailable: Some(_), .. } if ability_id == "fireball"
    )));

    let err = engine
        .submit_action(&handle, Action::UseAbility("fireball".into()))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CombatError::Validation(ValidationError::InsufficientMana {
            required: 5,
            available: 4
        })
    );

    // still in the fight, nothing spent
    assert!(engine.is_in_combat("p1").await);
    let player = engine.end_encounter("p1").await.unwrap();
    assert_eq!(player.mana, 4);
}

#[tokio::test]
async fn test_poison_runs_out_after_three_rounds() {
    let engine = engine();
    let player = hero("p1", CharacterClass::Rogue);

    // strike for 1d1, poison rolls 3 per tick, every wolf attack fumbles
    let handle = engine
        .start_encounter_with_dice(&player, MonsterKind::Wolf, 1, scripted([1, 3]))
        .await
        .unwrap();

    let result = engine
        .submit_action(&handle, Action::UseAbility("poison_strike".into()))
        .await
        .unwrap();
    assert_eq!(result.opponent.health, 25 - 1 - 3);

    engine.submit_action(&handle, Action::Defend).await.unwrap();
    let result = engine.submit_action(&handle, Action::Defend).await.unwrap();
    assert_eq!(result.opponent.health, 25 - 1 - 9);

    let result = engine.submit_action(&handle, Action::Defend).await.unwrap();
    assert_eq!(result.opponent.health, 15);
    assert!(result.log.iter().all(|line| !line.contains("Poison Strike")));
}

#[tokio::test]
async fn test_second_encounter_conflicts() {
    let engine = engine();
    let player = hero("p1", CharacterClass::Mage);

    let handle = engine
        .start_encounter_with_dice(&player, MonsterKind::Wolf, 1, scripted([15, 1, 1]))
        .await
        .unwrap();

    let err = engine
        .start_encounter_with_dice(&player, MonsterKind::Goblin, 1, scripted([]))
        .await
        .unwrap_err();
    assert_eq!(err, CombatError::Conflict { player: "p1".into() });

    // the first fight carries on untouched
    let result = engine.submit_action(&handle, Action::Attack).await.unwrap();
    assert_eq!(result.opponent.kind, MonsterKind::Wolf);
    assert_eq!(result.opponent.health, 24);
}

#[tokio::test]
async fn test_out_of_range_level_is_rejected() {
    let engine = engine();
    let player = hero("p1", CharacterClass::Warrior);

    for level in [0, 101, u32::MAX] {
        let err = engine
            .start_encounter_with_dice(&player, MonsterKind::Dragon, level, scripted([]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CombatError::Validation(ValidationError::LevelOutOfRange { level, max: 100 })
        );
        assert!(!engine.is_in_combat("p1").await);
    }

    let handle = engine
        .start_encounter_with_dice(&player, MonsterKind::Dragon, 100, scripted([]))
        .await
        .unwrap();
    let actions = engine.legal_actions(&handle).await.unwrap();
    assert_eq!(actions[0], LegalAction::Attack);
}

#[tokio::test]
async fn test_victory_completes_quest_once() {
    let engine = engine();
    let mut player = hero("p1", CharacterClass::Mage);
    player.attributes.strength = 20;
    let mut quest =
        QuestProgress::new("wolves", "Wolf Trouble", QuestKind::Kill, 1).with_detail("wolf");
    quest.accept();
    player.quests.push(quest);

    // each round: natural 20 for 2x1d1+5, then the wolf fumbles
    let script = [20, 1, 1, 1, 20, 1, 1, 1, 20, 1, 1, 1, 20];
    let handle = engine
        .start_encounter_with_dice(&player, MonsterKind::Wolf, 1, scripted(script))
        .await
        .unwrap();

    let mut last = None;
    for _ in 0..4 {
        last = Some(engine.submit_action(&handle, Action::Attack).await.unwrap());
    }
    let result = last.unwrap();

    assert!(result.terminal);
    assert_eq!(result.round, 4);
    assert_eq!(
        result.outcome,
        Some(Outcome::Victory {
            experience: 50,
            gold: 10,
            level_up: None
        })
    );
    assert_eq!(result.player.record.damage_dealt, 28);
    assert!(!engine.is_in_combat("p1").await);

    let err = engine.submit_action(&handle, Action::Attack).await.unwrap_err();
    assert!(matches!(err, CombatError::NotFound(NotFound::Session(_))));

    let mut player = result.player.clone();
    let (kind, detail) = result.quest_event().unwrap();
    let completed = engine.update_quest_progress(&mut player, kind, &detail);
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, "wolves");
    assert!(engine.update_quest_progress(&mut player, kind, &detail).is_empty());
}

#[tokio::test]
async fn test_defeat_leaves_player_standing() {
    let engine = engine();
    let mut player = hero("p1", CharacterClass::Mage);
    player.health = 5;

    // player fumbles, wolf crits
    let handle = engine
        .start_encounter_with_dice(&player, MonsterKind::Wolf, 1, scripted([1, 20, 4, 4]))
        .await
        .unwrap();
    let result = engine.submit_action(&handle, Action::Attack).await.unwrap();

    assert_eq!(result.outcome, Some(Outcome::Defeat));
    assert_eq!(result.player.health, 1);
    assert!(!engine.is_in_combat("p1").await);
}

#[tokio::test]
async fn test_flee() {
    let engine = engine();
    let player = hero("p1", CharacterClass::Mage);

    // agility 10 gives the 80% cap; 81 fails, wolf fumbles, then 80 escapes
    let handle = engine
        .start_encounter_with_dice(&player, MonsterKind::Wolf, 1, scripted([81, 1, 80]))
        .await
        .unwrap();

    let actions = engine.legal_actions(&handle).await.unwrap();
    assert!(actions.contains(&LegalAction::Flee { chance: 80 }));

    let result = engine.submit_action(&handle, Action::Flee).await.unwrap();
    assert!(!result.terminal);
    assert_eq!(result.round, 2);

    let result = engine.submit_action(&handle, Action::Flee).await.unwrap();
    assert_eq!(result.outcome, Some(Outcome::Fled));
    assert_eq!(result.quest_event(), None);
    assert!(!engine.is_in_combat("p1").await);
}

#[tokio::test]
async fn test_legal_actions_for_paladin() {
    let engine = engine();
    let mut player = hero("p1", CharacterClass::Paladin);
    player.inventory = vec![
        "health_potion".into(),
        "rusty_sword".into(),
        "health_potion".into(),
    ];

    let handle = engine
        .start_encounter_with_dice(&player, MonsterKind::Wolf, 1, scripted([]))
        .await
        .unwrap();
    let actions = engine.legal_actions(&handle).await.unwrap();

    assert_eq!(actions[0], LegalAction::Attack);
    assert_eq!(actions[1], LegalAction::Defend);
    assert!(actions.iter().any(|action| matches!(
        action,
        LegalAction::UseAbility {
            ability_id,
            unavailable: None,
            ..
        } if ability_id == "divine_shield"
    )));
    assert!(actions.iter().any(|action| matches!(
        action,
        LegalAction::UseAbility {
            ability_id,
            unavailable: Some(_),
            ..
        } if ability_id == "smite_undead"
    )));

    let items: Vec<_> = actions
        .iter()
        .filter_map(|action| match action {
            LegalAction::UseItem { item_id, count, .. } => Some((item_id.as_str(), *count)),
            _ => None,
        })
        .collect();
    assert_eq!(items, vec![("health_potion", 2)]);
}

#[tokio::test]
async fn test_seeded_encounters_are_reproducible() {
    async fn play(engine: &Engine, seed: u64) -> Vec<String> {
        let player = hero("p1", CharacterClass::Warrior);
        let max_health = player.max_health;
        let handle = engine
            .start_encounter_with_dice(
                &player,
                MonsterKind::Goblin,
                1,
                Box::new(SeededDice::new(seed)),
            )
            .await
            .unwrap();

        let mut log = Vec::new();
        let mut round = 1;
        for _ in 0..300 {
            let result = engine.submit_action(&handle, Action::Attack).await.unwrap();
            assert!(result.player.health >= 0 && result.player.health <= max_health);
            let opponent = &result.opponent;
            assert!(opponent.health >= 0 && opponent.health <= opponent.max_health);
            assert!(result.round >= round);
            round = result.round;
            log.extend(result.log);

            if result.terminal {
                match result.outcome {
                    Some(Outcome::Victory { .. }) => assert_eq!(result.opponent.health, 0),
                    Some(Outcome::Defeat) => assert_eq!(result.player.health, 1),
                    other => panic!("unexpected outcome {:?}", other),
                }
                assert!(!engine.is_in_combat("p1").await);
                return log;
            }
        }
        panic!("encounter did not finish");
    }

    let engine = engine();
    for seed in 0..10 {
        let first = play(&engine, seed).await;
        let second = play(&engine, seed).await;
        assert_eq!(first, second);
    }
}

#[tokio::test]
async fn test_player_survives_store_round_trip() {
    let engine = engine();
    let store = MemoryActorStore::new();
    let mut player = hero("p1", CharacterClass::Mage);
    player.attributes.strength = 20;
    store.save(&player).unwrap();

    let player = store.load("p1").unwrap();
    let handle = engine
        .start_encounter_with_dice(&player, MonsterKind::Wolf, 1, scripted([20, 1, 1, 1]))
        .await
        .unwrap();
    let result = engine.submit_action(&handle, Action::Attack).await.unwrap();
    let player = engine.end_encounter("p1").await.unwrap();
    assert_eq!(player, result.player);

    store.save(&player).unwrap();
    assert_eq!(store.load("p1").unwrap(), player);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_players_at_once() {
    let engine = Engine::shared(EngineConfig::default());

    let mut tasks = Vec::new();
    for n in 0..16 {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            let id = format!("p{}", n);
            let player = hero(&id, CharacterClass::Rogue);
            let handle = engine
                .start_encounter_with_dice(&player, MonsterKind::Spider, 1, scripted([1]))
                .await
                .unwrap();
            engine.submit_action(&handle, Action::Flee).await.unwrap()
        }));
    }

    for task in tasks {
        let result = task.await.unwrap();
        assert_eq!(result.outcome, Some(Outcome::Fled));
    }
    for n in 0..16 {
        assert!(!engine.is_in_combat(&format!("p{}", n)).await);
    }
}
