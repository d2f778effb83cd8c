//! Out-of-combat regeneration
//!
//! Health and mana come back in whole ticks of wall-clock time since the
//! actor's last regeneration:
//! - health per tick: stamina + 1
//! - mana per tick: intelligence + 1
//!
//! The timestamp only moves when something was actually restored, so partial
//! ticks keep accumulating across calls.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::actor::Actor;
use crate::config::REGEN_TICK_SECONDS;

/// What one regeneration pass restored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Regeneration {
    pub hp_gained: i32,
    pub mana_gained: i32,
    pub elapsed_seconds: i64,
    pub ticks: i64,
}

impl Regeneration {
    pub fn is_empty(&self) -> bool {
        self.hp_gained == 0 && self.mana_gained == 0
    }
}

/// Regenerate with the default 60 second tick
pub fn regenerate(actor: &mut Actor, now: DateTime<Utc>) -> Regeneration {
    regenerate_with_tick(actor, now, REGEN_TICK_SECONDS)
}

/// Regenerate with a custom tick length
pub fn regenerate_with_tick(
    actor: &mut Actor,
    now: DateTime<Utc>,
    tick_seconds: i64,
) -> Regeneration {
    let Some(last) = actor.last_regeneration else {
        warn!(player = %actor.id, "no regeneration timestamp, starting the clock now");
        actor.last_regeneration = Some(now);
        return Regeneration::default();
    };

    let elapsed_seconds = (now - last).num_seconds();
    let tick_seconds = tick_seconds.max(1);
    if elapsed_seconds < tick_seconds {
        return Regeneration {
            elapsed_seconds,
            ..Regeneration::default()
        };
    }

    let ticks = elapsed_seconds / tick_seconds;
    let hp_deficit = (actor.max_health - actor.health).max(0) as i64;
    let mana_deficit = (actor.max_mana - actor.mana).max(0) as i64;
    let hp_per_tick = (actor.attributes.stamina + 1).max(0) as i64;
    let mana_per_tick = (actor.attributes.intelligence + 1).max(0) as i64;

    let hp_gained = ticks.saturating_mul(hp_per_tick).min(hp_deficit) as i32;
    let mana_gained = ticks.saturating_mul(mana_per_tick).min(mana_deficit) as i32;

    actor.health += hp_gained;
    actor.mana += mana_gained;

    let result = Regeneration {
        hp_gained,
        mana_gained,
        elapsed_seconds,
        ticks,
    };
    if !result.is_empty() {
        actor.last_regeneration = Some(now);
        debug!(player = %actor.id, hp_gained, mana_gained, ticks, "regenerated");
    }
    result
}

/// Parse a stored timestamp: RFC 3339, or a naive ISO 8601 time taken as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Attributes, CharacterClass};
    use chrono::{Duration, TimeZone};

    fn wounded(last: DateTime<Utc>) -> Actor {
        let mut actor = Actor::new("p1", "Test", CharacterClass::Warrior);
        actor.attributes = Attributes::uniform(10);
        actor.recompute_maximums();
        actor.health = 10;
        actor.mana = 0;
        actor.last_regeneration = Some(last);
        actor
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_two_ticks() {
        let mut actor = wounded(start());
        let now = start() + Duration::seconds(125);
        let result = regenerate(&mut actor, now);

        assert_eq!(result.ticks, 2);
        assert_eq!(result.elapsed_seconds, 125);
        assert_eq!(result.hp_gained, 22);
        assert_eq!(result.mana_gained, 22);
        assert_eq!(actor.health, 32);
        assert_eq!(actor.last_regeneration, Some(now));
    }

    #[test]
    fn test_gain_capped_by_deficit() {
        let mut actor = wounded(start());
        actor.health = actor.max_health - 5;
        let result = regenerate(&mut actor, start() + Duration::hours(1));
        assert_eq!(result.hp_gained, 5);
        assert_eq!(actor.health, actor.max_health);
    }

    #[test]
    fn test_partial_tick_keeps_timestamp() {
        let mut actor = wounded(start());
        let result = regenerate(&mut actor, start() + Duration::seconds(59));
        assert!(result.is_empty());
        assert_eq!(result.ticks, 0);
        assert_eq!(actor.last_regeneration, Some(start()));
    }

    #[test]
    fn test_full_actor_keeps_timestamp() {
        let mut actor = wounded(start());
        actor.health = actor.max_health;
        actor.mana = actor.max_mana;
        let result = regenerate(&mut actor, start() + Duration::minutes(10));
        assert_eq!(result.ticks, 10);
        assert!(result.is_empty());
        assert_eq!(actor.last_regeneration, Some(start()));
    }

    #[test]
    fn test_second_call_without_time_is_zero() {
        let mut actor = wounded(start());
        let now = start() + Duration::minutes(3);
        assert!(!regenerate(&mut actor, now).is_empty());
        assert!(regenerate(&mut actor, now).is_empty());
    }

    #[test]
    fn test_monotonic_in_elapsed_time() {
        let mut previous = (0, 0);
        for seconds in (0..900).step_by(17) {
            let mut actor = wounded(start());
            let result = regenerate(&mut actor, start() + Duration::seconds(seconds));
            assert!(result.hp_gained >= previous.0);
            assert!(result.mana_gained >= previous.1);
            assert!(actor.health <= actor.max_health);
            assert!(actor.mana <= actor.max_mana);
            previous = (result.hp_gained, result.mana_gained);
        }
    }

    #[test]
    fn test_missing_timestamp_starts_clock() {
        let mut actor = wounded(start());
        actor.last_regeneration = None;
        let now = start() + Duration::hours(5);
        let result = regenerate(&mut actor, now);
        assert!(result.is_empty());
        assert_eq!(actor.health, 10);
        assert_eq!(actor.last_regeneration, Some(now));
    }

    #[test]
    fn test_clock_skew_is_harmless() {
        let mut actor = wounded(start());
        let result = regenerate(&mut actor, start() - Duration::minutes(5));
        assert!(result.is_empty());
        assert_eq!(actor.last_regeneration, Some(start()));
    }

    #[test]
    fn test_custom_tick() {
        let mut actor = wounded(start());
        let result = regenerate_with_tick(&mut actor, start() + Duration::seconds(90), 30);
        assert_eq!(result.ticks, 3);
        assert_eq!(result.hp_gained, 33);
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("2026-03-01T12:00:00Z"), Some(start()));
        assert_eq!(parse_timestamp("2026-03-01T14:00:00+02:00"), Some(start()));
        assert_eq!(
            parse_timestamp("2026-03-01T12:00:00.250000"),
            Some(start() + Duration::milliseconds(250))
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
