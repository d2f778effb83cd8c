//! venterra - play a single encounter from the command line
//!
//! Builds a character, starts a fight against the chosen monster and lets a
//! simple policy pick actions until the fight ends.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use chrono::{Duration, Utc};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use venterra::catalog::{ConsumableEffect, ItemKind};
use venterra::combat::{DiceSource, SeededDice, ThreadDice};
use venterra::store::{ActorStore, MemoryActorStore};
use venterra::{
    Action, ActionResult, Actor, CharacterClass, Engine, EngineConfig, LegalAction, MonsterKind,
    QuestKind, QuestProgress,
};

/// Venterra encounter simulator
#[derive(Parser, Debug)]
#[command(name = "venterra", version, about = "Play out a Venterra encounter")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Character class (warrior, mage, paladin, rogue)
    #[arg(long, default_value = "warrior")]
    class: CharacterClass,

    /// Character name
    #[arg(long, default_value = "Hero")]
    name: String,

    /// Monster kind to fight
    #[arg(short, long, default_value = "wolf")]
    monster: MonsterKind,

    /// Monster level
    #[arg(short, long, default_value_t = 1)]
    level: u32,

    /// Weapon item id to equip
    #[arg(short, long)]
    weapon: Option<String>,

    /// Health potions to carry
    #[arg(long, default_value_t = 2)]
    potions: usize,

    /// Seed for reproducible dice
    #[arg(long)]
    seed: Option<u64>,

    /// Give up after this many actions
    #[arg(long, default_value_t = 50)]
    max_actions: u32,

    /// Print the final character as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "venterra=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = EngineConfig::load(args.config.as_deref())?;
    let engine = Engine::new(config);
    let store = MemoryActorStore::new();

    let mut player = Actor::new("player-1", args.name.as_str(), args.class);
    if let Some(weapon_id) = &args.weapon {
        let weapon = engine
            .catalog()
            .item(weapon_id)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown item: {}", weapon_id))?;
        if !matches!(weapon.kind, ItemKind::Weapon { .. }) {
            bail!("{} is not a weapon", weapon_id);
        }
        player.equipment.weapon = Some(weapon);
    }
    player
        .inventory
        .extend(std::iter::repeat("health_potion".to_string()).take(args.potions));

    let title = format!("Hunt a {}", args.monster);
    let mut hunt = QuestProgress::new("hunt", title, QuestKind::Kill, 1)
        .with_detail(args.monster.to_string());
    hunt.accept();
    player.quests.push(hunt);
    store.save(&player)?;

    let dice: Box<dyn DiceSource> = match args.seed {
        Some(seed) => Box::new(SeededDice::new(seed)),
        None => Box::new(ThreadDice),
    };
    let handle = engine
        .start_encounter_with_dice(&player, args.monster, args.level, dice)
        .await?;
    println!(
        "{} the {} ({} HP) meets a level {} {}",
        player.name, player.class, player.health, args.level, args.monster
    );

    let mut last: Option<ActionResult> = None;
    for _ in 0..args.max_actions {
        let actions = engine.legal_actions(&handle).await?;
        let current = last.as_ref().map_or(&player, |result| &result.player);
        let action = choose_action(&engine, current, &actions);

        let result = engine.submit_action(&handle, action).await?;
        for line in &result.log {
            println!("  {}", line);
        }
        let finished = result.terminal;
        last = Some(result);
        if finished {
            break;
        }
    }

    let mut player = match &last {
        Some(result) if result.terminal => result.player.clone(),
        _ => {
            println!("The fight drags on; both sides withdraw.");
            engine.end_encounter(&player.id).await?
        }
    };

    if let Some((kind, detail)) = last.as_ref().and_then(ActionResult::quest_event) {
        for quest in engine.update_quest_progress(&mut player, kind, &detail) {
            println!("Quest complete: {}", quest.name);
        }
    }

    let rested = engine
        .regenerate(&mut player, Utc::now() + Duration::minutes(5))
        .await?;
    println!(
        "After resting: +{} HP, +{} mana ({} / {} HP)",
        rested.hp_gained, rested.mana_gained, player.health, player.max_health
    );

    store.save(&player)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&store.load(&player.id)?)?);
    }

    Ok(())
}

/// Drink a potion when badly hurt, otherwise use the first ready ability,
/// otherwise attack
fn choose_action(engine: &Engine, player: &Actor, actions: &[LegalAction]) -> Action {
    let badly_hurt = player.health * 100 < player.max_health * 40;
    if badly_hurt {
        let potion = actions.iter().find_map(|action| match action {
            LegalAction::UseItem { item_id, .. } if heals(engine, item_id) => Some(item_id.clone()),
            _ => None,
        });
        if let Some(item_id) = potion {
            return Action::UseItem(item_id);
        }
    }

    actions
        .iter()
        .find_map(|action| match action {
            LegalAction::UseAbility {
                ability_id,
                unavailable: None,
                ..
            } => Some(Action::UseAbility(ability_id.clone())),
            _ => None,
        })
        .unwrap_or(Action::Attack)
}

fn heals(engine: &Engine, item_id: &str) -> bool {
    engine.catalog().item(item_id).is_some_and(|item| {
        matches!(
            item.kind,
            ItemKind::Consumable {
                effect: ConsumableEffect::Heal { .. } | ConsumableEffect::FullHeal
            }
        )
    })
}
