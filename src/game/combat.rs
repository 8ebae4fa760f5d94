//! Combat: Pickup, Shoot, Reload, Drop
//!
//! Per-player weapon state machine:
//!
//! ```text
//!   Unarmed ──pickup──▶ Armed(kind) ──reload──▶ Reloading ──done──▶ Armed(kind)
//!      ▲                    │
//!      └──── drop / ammo and magazines exhausted ────┘
//! ```
//!
//! Every entry point validates against the current state and returns a
//! rejection instead of failing; the only rejection that is broadcast
//! is a reload without spare magazines.

use tracing::debug;

use crate::game::events::{GameEvent, GameEventData};
use crate::game::state::RoomState;
use crate::game::timers::DeferredAction;
use crate::game::weapon::{spread_rotations, FirePattern, WeaponKind};

/// Reason sent with a refused reload.
pub const NO_MAGAZINE_MESSAGE: &str = "no magazine available";

/// Combat tuning.
#[derive(Debug, Clone)]
pub struct CombatConfig {
    /// Maximum distance between a player and a weapon they pick up
    pub pickup_radius: f32,
    /// Bullet-vs-player hit radius
    pub hit_radius: f32,
    /// Collider radius multiplier for bullet blocking
    pub collider_tolerance: f32,
    /// Extra distance before a collider is skipped by the broad phase
    pub broad_phase_margin: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            pickup_radius: 150.0,
            hit_radius: 20.0,
            collider_tolerance: 0.8,
            broad_phase_margin: 50.0,
        }
    }
}

/// What happened to a shoot request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShotOutcome {
    /// Dead, unarmed, reloading, too soon or bad rotation.
    Rejected,
    /// Not enough ammo but a spare magazine exists; the client reloads.
    NeedsReload,
    /// Not enough ammo and no magazines; the weapon was taken away.
    Disarmed,
    /// Shot accepted; `bullets` were created immediately.
    Fired {
        /// Bullets spawned this call (later burst rounds excluded)
        bullets: usize,
    },
}

// =============================================================================
// PICKUP
// =============================================================================

/// Pick up a world weapon.
///
/// Same type as held: +1 spare magazine. Otherwise the new weapon replaces
/// the old one with a full magazine and no spares. The world weapon is
/// removed either way.
pub fn pickup_weapon(
    state: &mut RoomState,
    player_id: &str,
    weapon_id: &str,
    config: &CombatConfig,
) -> bool {
    let Some(pickup) = state.weapons.get(weapon_id).cloned() else {
        return false;
    };
    let tick = state.tick;

    let events = {
        let Some(player) = state.players.get_mut(player_id) else {
            return false;
        };
        if !player.alive {
            return false;
        }
        if player.position.distance(pickup.position) > config.pickup_radius {
            debug!("Player {} too far from weapon {}", player_id, weapon_id);
            return false;
        }

        if player.weapon == Some(pickup.kind) {
            player.magazines += 1;
            vec![GameEvent::magazines(tick, player_id, player.magazines)]
        } else {
            player.equip(pickup.kind);
            vec![
                GameEvent::weapon(tick, player_id, player.weapon),
                GameEvent::ammo(tick, player_id, player.ammo),
                GameEvent::magazines(tick, player_id, player.magazines),
            ]
        }
    };

    state.weapons.remove(weapon_id);
    for event in events {
        state.push_event(event);
    }
    true
}

// =============================================================================
// SHOOT
// =============================================================================

/// Handle a trigger pull aimed at `rotation`.
pub fn shoot(state: &mut RoomState, player_id: &str, rotation: f32, now_ms: u64) -> ShotOutcome {
    if !rotation.is_finite() {
        return ShotOutcome::Rejected;
    }
    let tick = state.tick;

    let Some(player) = state.players.get_mut(player_id) else {
        return ShotOutcome::Rejected;
    };
    if !player.alive {
        return ShotOutcome::Rejected;
    }
    let Some(kind) = player.weapon else {
        debug!("Player {} tried to shoot unarmed", player_id);
        return ShotOutcome::Rejected;
    };
    if player.is_reloading(now_ms) {
        return ShotOutcome::Rejected;
    }
    let stats = kind.stats();
    if !player.shot_ready(now_ms, stats) {
        debug!("Player {} fired too fast", player_id);
        return ShotOutcome::Rejected;
    }

    if player.ammo < stats.ammo_per_shot {
        if player.magazines > 0 {
            return ShotOutcome::NeedsReload;
        }
        player.unequip();
        state.push_event(GameEvent::weapon(tick, player_id, None));
        state.push_event(GameEvent::ammo(tick, player_id, 0));
        return ShotOutcome::Disarmed;
    }

    player.last_shot_ms = Some(now_ms);
    player.ammo -= stats.ammo_per_shot;
    let ammo = player.ammo;
    let exhausted = player.ammo == 0 && player.magazines == 0;
    let origin = player.position;

    state.push_event(GameEvent::ammo(tick, player_id, ammo));

    let bullets = match stats.pattern {
        FirePattern::Single => {
            state.spawn_bullet(origin, rotation, player_id, stats);
            1
        }
        FirePattern::Burst { rounds, spacing_ms } => {
            state.spawn_bullet(origin, rotation, player_id, stats);
            for round in 1..rounds {
                state.deferred.schedule(
                    now_ms + spacing_ms * round as u64,
                    DeferredAction::BurstRound {
                        owner: player_id.to_string(),
                        rotation,
                        weapon: kind,
                    },
                );
            }
            1
        }
        FirePattern::Spread { pellets, spread } => {
            let rotations = spread_rotations(rotation, pellets, spread);
            for pellet in &rotations {
                state.spawn_bullet(origin, *pellet, player_id, stats);
            }
            rotations.len()
        }
    };

    // Last round fired with nothing left to reload
    if exhausted {
        if let Some(player) = state.players.get_mut(player_id) {
            player.unequip();
        }
        state.push_event(GameEvent::weapon(tick, player_id, None));
        state.push_event(GameEvent::ammo(tick, player_id, 0));
    }

    ShotOutcome::Fired { bullets }
}

/// Fire a scheduled burst round from the shooter's current position.
///
/// The burst was paid for up front, so rounds still fire after the
/// shooter is unequipped by the first one.
fn fire_burst_round(state: &mut RoomState, owner: &str, rotation: f32, weapon: WeaponKind) {
    let origin = match state.players.get(owner) {
        Some(player) if player.alive => player.position,
        _ => return,
    };
    state.spawn_bullet(origin, rotation, owner, weapon.stats());
}

// =============================================================================
// RELOAD
// =============================================================================

/// Start a reload. Without spare magazines a `ReloadFailed` event is
/// queued instead.
pub fn start_reload(state: &mut RoomState, player_id: &str, now_ms: u64) -> bool {
    let tick = state.tick;
    let Some(player) = state.players.get_mut(player_id) else {
        return false;
    };
    if !player.alive {
        return false;
    }
    let Some(kind) = player.weapon else {
        return false;
    };
    if player.is_reloading(now_ms) {
        return false;
    }

    if player.magazines == 0 {
        state.push_event(GameEvent::new(tick, GameEventData::ReloadFailed {
            player_id: player_id.to_string(),
            reason: NO_MAGAZINE_MESSAGE.to_string(),
        }));
        return false;
    }

    let reload_ms = kind.stats().reload_ms;
    player.reloading = true;
    player.reload_end_ms = now_ms + reload_ms;

    state.deferred.schedule(now_ms + reload_ms, DeferredAction::ReloadComplete {
        player_id: player_id.to_string(),
        weapon: kind,
    });
    state.push_event(GameEvent::new(tick, GameEventData::ReloadStarted {
        player_id: player_id.to_string(),
        reload_ms,
    }));
    true
}

/// Finish a reload if the player is still alive, still holding the same
/// weapon and still in this reload.
fn complete_reload(state: &mut RoomState, player_id: &str, weapon: WeaponKind, now_ms: u64) {
    let tick = state.tick;
    let Some(player) = state.players.get_mut(player_id) else {
        return;
    };
    if !player.alive || !player.reloading || player.weapon != Some(weapon) {
        return;
    }
    // A newer reload owns the flag
    if now_ms < player.reload_end_ms {
        return;
    }

    player.reloading = false;
    if player.magazines == 0 {
        return;
    }
    player.ammo = weapon.stats().capacity;
    player.magazines -= 1;
    let (ammo, magazines) = (player.ammo, player.magazines);

    state.push_event(GameEvent::new(tick, GameEventData::ReloadFinished {
        player_id: player_id.to_string(),
    }));
    state.push_event(GameEvent::ammo(tick, player_id, ammo));
    state.push_event(GameEvent::magazines(tick, player_id, magazines));
}

// =============================================================================
// DROP
// =============================================================================

/// Throw away the held weapon and its loaded ammo.
pub fn drop_weapon(state: &mut RoomState, player_id: &str) -> bool {
    let tick = state.tick;
    let Some(player) = state.players.get_mut(player_id) else {
        return false;
    };
    if !player.alive {
        return false;
    }
    player.unequip();

    state.push_event(GameEvent::weapon(tick, player_id, None));
    state.push_event(GameEvent::ammo(tick, player_id, 0));
    true
}

// =============================================================================
// DEFERRED
// =============================================================================

/// Run every continuation due at `now_ms`.
pub fn run_deferred(state: &mut RoomState, now_ms: u64) {
    for action in state.deferred.pop_due(now_ms) {
        match action {
            DeferredAction::BurstRound { owner, rotation, weapon } => {
                fire_burst_round(state, &owner, rotation, weapon);
            }
            DeferredAction::ReloadComplete { player_id, weapon } => {
                complete_reload(state, &player_id, weapon, now_ms);
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::RoomRng;
    use crate::core::vec2::Vec2;
    use crate::game::state::SafeZone;

    fn test_state() -> RoomState {
        let zone = SafeZone {
            center: Vec2::new(1984.0, 1984.0),
            radius: 5000.0,
            next_shrink_time: 5,
        };
        let mut state = RoomState::new(3968.0, 3968.0, zone, RoomRng::new(9));
        state.add_player("a".into(), Vec2::new(1000.0, 1000.0));
        state
    }

    fn arm(state: &mut RoomState, kind: WeaponKind, ammo: u32, magazines: u32) {
        let player = state.players.get_mut("a").unwrap();
        player.weapon = Some(kind);
        player.ammo = ammo;
        player.magazines = magazines;
    }

    fn event_data(state: &mut RoomState) -> Vec<GameEventData> {
        state.take_events().into_iter().map(|e| e.data).collect()
    }

    #[test]
    fn test_pickup_equips_fresh_weapon() {
        let mut state = test_state();
        let id = state.spawn_weapon(Vec2::new(1100.0, 1000.0), WeaponKind::Shotgun);

        assert!(pickup_weapon(&mut state, "a", &id, &CombatConfig::default()));

        let player = &state.players["a"];
        assert_eq!(player.weapon, Some(WeaponKind::Shotgun));
        assert_eq!(player.ammo, 20);
        assert_eq!(player.magazines, 0);
        assert!(state.weapons.is_empty());
        assert_eq!(event_data(&mut state).len(), 3);
    }

    #[test]
    fn test_pickup_same_type_stacks_magazine() {
        let mut state = test_state();
        arm(&mut state, WeaponKind::Pistol, 3, 0);
        let id = state.spawn_weapon(Vec2::new(1000.0, 1100.0), WeaponKind::Pistol);

        assert!(pickup_weapon(&mut state, "a", &id, &CombatConfig::default()));

        let player = &state.players["a"];
        assert_eq!(player.ammo, 3);
        assert_eq!(player.magazines, 1);
        assert_eq!(
            event_data(&mut state),
            vec![GameEventData::MagazinesChanged { player_id: "a".into(), magazine_count: 1 }]
        );
    }

    #[test]
    fn test_pickup_out_of_range_ignored() {
        let mut state = test_state();
        let id = state.spawn_weapon(Vec2::new(1200.0, 1000.0), WeaponKind::Rifle);

        assert!(!pickup_weapon(&mut state, "a", &id, &CombatConfig::default()));
        assert_eq!(state.weapons.len(), 1);
        assert_eq!(state.players["a"].weapon, None);
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_shoot_rejections() {
        let mut state = test_state();

        // Unarmed
        assert_eq!(shoot(&mut state, "a", 0.0, 0), ShotOutcome::Rejected);

        arm(&mut state, WeaponKind::Pistol, 9, 0);
        // Non-finite rotation
        assert_eq!(shoot(&mut state, "a", f32::NAN, 0), ShotOutcome::Rejected);
        assert_eq!(shoot(&mut state, "a", f32::INFINITY, 0), ShotOutcome::Rejected);

        // Too soon after a shot
        assert!(matches!(shoot(&mut state, "a", 0.0, 1000), ShotOutcome::Fired { .. }));
        assert_eq!(shoot(&mut state, "a", 0.0, 1499), ShotOutcome::Rejected);
        assert!(matches!(shoot(&mut state, "a", 0.0, 1500), ShotOutcome::Fired { .. }));

        // Mid-reload
        state.players.get_mut("a").unwrap().magazines = 1;
        assert!(start_reload(&mut state, "a", 2000));
        assert_eq!(shoot(&mut state, "a", 0.0, 2600), ShotOutcome::Rejected);

        // Dead
        state.players.get_mut("a").unwrap().alive = false;
        assert_eq!(shoot(&mut state, "a", 0.0, 10_000), ShotOutcome::Rejected);
    }

    #[test]
    fn test_last_round_unequips_pistol() {
        let mut state = test_state();
        arm(&mut state, WeaponKind::Pistol, 1, 0);

        assert_eq!(shoot(&mut state, "a", 0.5, 0), ShotOutcome::Fired { bullets: 1 });

        let player = &state.players["a"];
        assert_eq!(player.ammo, 0);
        assert_eq!(player.weapon, None);
        assert_eq!(state.bullets.len(), 1);

        let events = event_data(&mut state);
        assert!(events.contains(&GameEventData::WeaponChanged { player_id: "a".into(), weapon: None }));
        assert_eq!(
            events.last(),
            Some(&GameEventData::AmmoChanged { player_id: "a".into(), ammo: 0 })
        );
    }

    #[test]
    fn test_empty_with_magazines_waits_for_reload() {
        let mut state = test_state();
        arm(&mut state, WeaponKind::Rifle, 2, 1);

        assert_eq!(shoot(&mut state, "a", 0.0, 0), ShotOutcome::NeedsReload);
        assert_eq!(state.players["a"].weapon, Some(WeaponKind::Rifle));
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_empty_without_magazines_disarms() {
        let mut state = test_state();
        arm(&mut state, WeaponKind::Shotgun, 3, 0);

        assert_eq!(shoot(&mut state, "a", 0.0, 0), ShotOutcome::Disarmed);
        assert_eq!(state.players["a"].weapon, None);
        assert_eq!(
            event_data(&mut state),
            vec![
                GameEventData::WeaponChanged { player_id: "a".into(), weapon: None },
                GameEventData::AmmoChanged { player_id: "a".into(), ammo: 0 },
            ]
        );
    }

    #[test]
    fn test_rifle_burst_three_rounds_five_ammo() {
        let mut state = test_state();
        arm(&mut state, WeaponKind::Rifle, 30, 0);

        assert_eq!(shoot(&mut state, "a", 1.25, 1000), ShotOutcome::Fired { bullets: 1 });
        assert_eq!(state.players["a"].ammo, 25);
        assert_eq!(state.bullets.len(), 1);
        assert_eq!(state.deferred.len(), 2);

        run_deferred(&mut state, 1099);
        assert_eq!(state.bullets.len(), 1);
        run_deferred(&mut state, 1100);
        assert_eq!(state.bullets.len(), 2);
        run_deferred(&mut state, 1200);
        assert_eq!(state.bullets.len(), 3);

        assert!(state.bullets.values().all(|b| b.rotation == 1.25));
        assert_eq!(state.players["a"].ammo, 25);
    }

    #[test]
    fn test_final_burst_completes_after_unequip() {
        let mut state = test_state();
        arm(&mut state, WeaponKind::Rifle, 5, 0);

        assert_eq!(shoot(&mut state, "a", 0.0, 0), ShotOutcome::Fired { bullets: 1 });
        assert_eq!(state.players["a"].weapon, None);

        run_deferred(&mut state, 200);
        assert_eq!(state.bullets.len(), 3);
    }

    #[test]
    fn test_burst_round_skipped_after_death() {
        let mut state = test_state();
        arm(&mut state, WeaponKind::Rifle, 30, 0);
        shoot(&mut state, "a", 0.0, 0);

        state.players.get_mut("a").unwrap().alive = false;
        run_deferred(&mut state, 500);
        assert_eq!(state.bullets.len(), 1);
    }

    #[test]
    fn test_shotgun_spread() {
        let mut state = test_state();
        arm(&mut state, WeaponKind::Shotgun, 20, 0);

        assert_eq!(shoot(&mut state, "a", 0.0, 0), ShotOutcome::Fired { bullets: 5 });
        assert_eq!(state.players["a"].ammo, 15);

        let mut rotations: Vec<f32> = state.bullets.values().map(|b| b.rotation).collect();
        rotations.sort_by(f32::total_cmp);
        let spread = rotations[4] - rotations[0];
        assert!((spread - std::f32::consts::PI / 8.0).abs() < 1e-5);
    }

    #[test]
    fn test_reload_cycle() {
        let mut state = test_state();
        arm(&mut state, WeaponKind::Pistol, 2, 2);

        assert!(start_reload(&mut state, "a", 1000));
        assert!(state.players["a"].reloading);
        assert_eq!(
            event_data(&mut state),
            vec![GameEventData::ReloadStarted { player_id: "a".into(), reload_ms: 1500 }]
        );

        run_deferred(&mut state, 2499);
        assert!(state.players["a"].reloading);

        run_deferred(&mut state, 2500);
        let player = &state.players["a"];
        assert!(!player.reloading);
        assert_eq!(player.ammo, 9);
        assert_eq!(player.magazines, 1);
        assert_eq!(
            event_data(&mut state),
            vec![
                GameEventData::ReloadFinished { player_id: "a".into() },
                GameEventData::AmmoChanged { player_id: "a".into(), ammo: 9 },
                GameEventData::MagazinesChanged { player_id: "a".into(), magazine_count: 1 },
            ]
        );
    }

    #[test]
    fn test_reload_without_magazine_fails() {
        let mut state = test_state();
        arm(&mut state, WeaponKind::Pistol, 2, 0);

        assert!(!start_reload(&mut state, "a", 0));
        assert_eq!(
            event_data(&mut state),
            vec![GameEventData::ReloadFailed {
                player_id: "a".into(),
                reason: NO_MAGAZINE_MESSAGE.into(),
            }]
        );
        assert!(state.deferred.is_empty());
    }

    #[test]
    fn test_reload_discarded_after_death_or_swap() {
        let mut state = test_state();
        arm(&mut state, WeaponKind::Pistol, 0, 1);
        assert!(start_reload(&mut state, "a", 0));
        state.players.get_mut("a").unwrap().alive = false;
        run_deferred(&mut state, 5000);
        assert_eq!(state.players["a"].ammo, 0);
        assert_eq!(state.players["a"].magazines, 1);

        let mut state = test_state();
        arm(&mut state, WeaponKind::Pistol, 0, 1);
        assert!(start_reload(&mut state, "a", 0));
        let id = state.spawn_weapon(Vec2::new(1000.0, 1000.0), WeaponKind::Rifle);
        assert!(pickup_weapon(&mut state, "a", &id, &CombatConfig::default()));
        state.take_events();
        run_deferred(&mut state, 5000);
        assert_eq!(state.players["a"].ammo, 30);
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_drop_weapon() {
        let mut state = test_state();
        arm(&mut state, WeaponKind::Rifle, 17, 2);

        assert!(drop_weapon(&mut state, "a"));
        let player = &state.players["a"];
        assert_eq!(player.weapon, None);
        assert_eq!(player.ammo, 0);
        assert_eq!(event_data(&mut state).len(), 2);
    }

    #[test]
    fn test_ammo_never_exceeds_capacity() {
        let mut state = test_state();
        for kind in WeaponKind::ALL {
            arm(&mut state, kind, 0, 3);
            let mut now = 0;
            for _ in 0..3 {
                assert!(start_reload(&mut state, "a", now));
                now += kind.stats().reload_ms;
                run_deferred(&mut state, now);
                assert!(state.players["a"].ammo <= kind.stats().capacity);
            }
            assert_eq!(state.players["a"].magazines, 0);
        }
    }
}
