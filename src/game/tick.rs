//! Authoritative Simulation Tick
//!
//! One fixed-rate step of a room: deferred continuations, bullet travel,
//! hits, zone damage, weapon upkeep and the win check. The zone countdown
//! runs on its own 1 Hz clock through [`shrink`].

use std::time::Duration;

use tracing::info;

use crate::core::rng::RoomRng;
use crate::core::vec2::Vec2;
use crate::game::armory::{maintain_weapons, replenish_after_shrink, seed_initial_weapons, ArmoryConfig};
use crate::game::ballistics::{advance_bullets, resolve_bullet_hits};
use crate::game::combat::{run_deferred, CombatConfig};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::placement::{find_safe_spawn_position, PlacementConfig};
use crate::game::state::{RoomState, SessionId};
use crate::game::zone::{apply_zone_damage, shrink_step, ZoneConfig, ZoneStep};
use crate::TICK_RATE;

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Set on the tick the match was decided
    pub winner: Option<SessionId>,
}

/// Configuration for one room.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Simulation rate (Hz)
    pub tick_rate: u32,
    /// Map width
    pub map_width: f32,
    /// Map height
    pub map_height: f32,
    /// Most concurrent clients
    pub max_clients: usize,
    /// Delay between game over and the forced refresh
    pub game_over_grace: Duration,
    /// Delay between the forced refresh and closing connections
    pub disconnect_delay: Duration,
    /// Safe zone tuning
    pub zone: ZoneConfig,
    /// Weapon population tuning
    pub armory: ArmoryConfig,
    /// Position search tuning
    pub placement: PlacementConfig,
    /// Shot and hit tuning
    pub combat: CombatConfig,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            map_width: 3968.0,
            map_height: 3968.0,
            max_clients: 10,
            game_over_grace: Duration::from_secs(5),
            disconnect_delay: Duration::from_millis(500),
            zone: ZoneConfig::default(),
            armory: ArmoryConfig::default(),
            placement: PlacementConfig::default(),
            combat: CombatConfig::default(),
        }
    }
}

impl RoomConfig {
    /// Period of the simulation clock.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}

/// Build the state of a fresh room with its initial weapon pool.
pub fn new_room_state(config: &RoomConfig, rng: RoomRng) -> RoomState {
    let mut state = RoomState::new(
        config.map_width,
        config.map_height,
        config.zone.initial_zone(),
        rng,
    );
    let placed = seed_initial_weapons(&mut state, &config.armory, &config.placement);
    info!("Seeded {} weapons", placed);
    state
}

/// Add a player at a safe spawn position. Returns where they landed.
pub fn spawn_player(state: &mut RoomState, id: SessionId, config: &RoomConfig) -> Vec2 {
    let position = find_safe_spawn_position(state, &config.placement);
    state.add_player(id, position);
    position
}

/// Run one simulation tick at room time `now_ms`.
pub fn tick(state: &mut RoomState, config: &RoomConfig, now_ms: u64) -> TickResult {
    let mut result = TickResult::default();

    // 0. Advance tick counter
    state.tick += 1;

    // 1. Burst rounds and reload completions that came due
    run_deferred(state, now_ms);

    // 2. Move bullets, dropping blocked and out-of-bounds ones
    advance_bullets(state, &config.combat, config.tick_rate);

    // 3. Bullet vs player hits
    resolve_bullet_hits(state, &config.combat);

    // 4. Zone damage
    apply_zone_damage(state, &config.zone);

    // 5. Keep the weapon pool valid
    maintain_weapons(state, &config.armory, &config.placement);

    // 6. Check end conditions
    result.winner = check_end_conditions(state);

    result.events = state.take_events();
    result
}

/// Advance the zone countdown by one second, adding weapons on a shrink.
pub fn shrink(state: &mut RoomState, config: &RoomConfig) -> Vec<GameEvent> {
    if let ZoneStep::Shrunk { radius } = shrink_step(state, &config.zone) {
        let added = replenish_after_shrink(state, &config.armory, &config.placement);
        info!("Zone shrank to {}, {} weapons added", radius, added);
    }
    state.take_events()
}

/// Decide the match once a single player is left standing.
///
/// Fires at most once per room, and only when more than one player ever
/// took part at the same time. Returns the winner on the deciding call.
pub fn check_end_conditions(state: &mut RoomState) -> Option<SessionId> {
    if state.match_over || state.players.len() < 2 || state.alive_count() != 1 {
        return None;
    }

    let winner = state
        .players
        .iter()
        .find(|(_, p)| p.alive)
        .map(|(id, _)| id.clone())?;

    state.match_over = true;
    state.push_event(GameEvent::new(state.tick, GameEventData::GameOver {
        winner_id: winner.clone(),
    }));
    info!("Match over, winner {}", winner);
    Some(winner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Collider;
    use crate::game::weapon::WeaponKind;

    fn test_state(seed: u64) -> (RoomState, RoomConfig) {
        let config = RoomConfig::default();
        let state = new_room_state(&config, RoomRng::new(seed));
        (state, config)
    }

    #[test]
    fn test_new_room_has_weapons() {
        let (state, config) = test_state(1);
        assert_eq!(state.weapons.len(), config.armory.min_weapons);
        assert_eq!(state.zone.radius, 5000.0);
        assert_eq!(state.tick, 0);
    }

    #[test]
    fn test_tick_interval() {
        let config = RoomConfig::default();
        let interval = config.tick_interval();
        assert!(interval > Duration::from_millis(16) && interval < Duration::from_millis(17));
    }

    #[test]
    fn test_spawn_avoids_colliders() {
        let (mut state, config) = test_state(2);
        for i in 0..6 {
            let position = Vec2::new(600.0 + i as f32 * 500.0, 1984.0);
            state.add_collider(Collider { position, radius: 60.0 });
        }
        let position = spawn_player(&mut state, "a".into(), &config);
        assert!(state.colliders.iter().all(|c| position.distance(c.position) >= c.radius));
        assert!(state.players.contains_key("a"));
    }

    #[test]
    fn test_tick_advances_counter_and_bullets() {
        let (mut state, config) = test_state(3);
        let start = Vec2::new(1000.0, 1000.0);
        let id = state.spawn_bullet(start, 0.0, "a", WeaponKind::Pistol.stats());

        tick(&mut state, &config, 16);
        assert_eq!(state.tick, 1);
        assert!(state.bullets[&id].position.x > start.x);
    }

    #[test]
    fn test_single_player_never_wins() {
        let (mut state, config) = test_state(4);
        spawn_player(&mut state, "solo".into(), &config);

        for t in 0..10 {
            let result = tick(&mut state, &config, t * 16);
            assert!(result.winner.is_none());
        }
        assert!(!state.match_over);
    }

    #[test]
    fn test_win_fires_once() {
        let (mut state, config) = test_state(5);
        state.add_player("a".into(), Vec2::new(1000.0, 1000.0));
        state.add_player("b".into(), Vec2::new(2000.0, 2000.0));
        state.damage_player("b", 100);

        let result = tick(&mut state, &config, 16);
        assert_eq!(result.winner.as_deref(), Some("a"));
        assert!(result.events.iter().any(|e| matches!(
            &e.data,
            GameEventData::GameOver { winner_id } if winner_id == "a"
        )));

        let again = tick(&mut state, &config, 32);
        assert!(again.winner.is_none());
        assert!(!again.events.iter().any(|e| matches!(e.data, GameEventData::GameOver { .. })));
    }

    #[test]
    fn test_win_after_leave() {
        let mut state = RoomState::new(3968.0, 3968.0, ZoneConfig::default().initial_zone(), RoomRng::new(6));
        state.add_player("a".into(), Vec2::new(1000.0, 1000.0));
        state.add_player("b".into(), Vec2::new(2000.0, 2000.0));
        state.add_player("c".into(), Vec2::new(3000.0, 3000.0));
        state.damage_player("c", 100);
        assert!(check_end_conditions(&mut state).is_none());

        state.remove_player("b");
        assert_eq!(check_end_conditions(&mut state).as_deref(), Some("a"));
    }

    #[test]
    fn test_shrink_replenishes_weapons() {
        let (mut state, config) = test_state(7);
        let before = state.weapons.len();

        let mut shrunk = false;
        for _ in 0..config.zone.shrink_interval {
            let events = shrink(&mut state, &config);
            shrunk |= events.iter().any(|e| matches!(e.data, GameEventData::ZoneShrunk { .. }));
        }
        assert!(shrunk);
        assert_eq!(state.zone.radius, 4750.0);
        assert_eq!(state.weapons.len(), before + 3);
    }
}
