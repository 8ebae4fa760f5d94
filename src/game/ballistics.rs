//! Bullet Travel and Hits
//!
//! Bullets move along a straight line each tick. The travel segment is
//! swept against every collider before the move is committed, so fast
//! bullets cannot tunnel through thin obstacles.

use crate::core::geometry::{in_rect, segment_hits_circle};
use crate::game::combat::CombatConfig;
use crate::game::state::{BulletId, RoomState};

/// Advance every bullet one tick.
///
/// A bullet is deleted when its travel segment passes within the
/// (tolerance-scaled) radius of a collider, or when the committed
/// position leaves the map. Returns the number of bullets deleted.
pub fn advance_bullets(state: &mut RoomState, config: &CombatConfig, tick_rate: u32) -> usize {
    let (width, height) = (state.map_width, state.map_height);
    let colliders = &state.colliders;
    let mut removed: Vec<BulletId> = Vec::new();

    for (id, bullet) in state.bullets.iter_mut() {
        let from = bullet.position;
        let step = bullet.step(tick_rate);
        let to = from + step;
        let travel = step.length();

        let blocked = colliders.iter().any(|collider| {
            let radius = collider.radius * config.collider_tolerance;
            // Broad phase: too far to reach this tick
            if from.distance(collider.position) > travel + config.broad_phase_margin + radius {
                return false;
            }
            segment_hits_circle(from, to, collider.position, radius)
        });

        if blocked {
            removed.push(id.clone());
            continue;
        }

        bullet.position = to;
        if !in_rect(to, width, height) {
            removed.push(id.clone());
        }
    }

    for id in &removed {
        state.bullets.remove(id);
    }
    removed.len()
}

/// Test each bullet against every living player except its owner.
///
/// A hit deletes the bullet and applies its damage; each bullet hits at
/// most one player. Returns the number of hits.
pub fn resolve_bullet_hits(state: &mut RoomState, config: &CombatConfig) -> usize {
    let bullet_ids: Vec<BulletId> = state.bullets.keys().cloned().collect();
    let mut hits = 0;

    for bullet_id in bullet_ids {
        let hit = {
            let Some(bullet) = state.bullets.get(&bullet_id) else {
                continue;
            };
            state
                .players
                .iter()
                .find(|(player_id, player)| {
                    **player_id != bullet.owner
                        && player.alive
                        && player.position.distance(bullet.position) < config.hit_radius
                })
                .map(|(player_id, _)| (player_id.clone(), bullet.damage))
        };

        if let Some((player_id, damage)) = hit {
            state.bullets.remove(&bullet_id);
            state.damage_player(&player_id, damage);
            hits += 1;
        }
    }

    hits
}

/// Delete a bullet on a client collision report.
pub fn remove_bullet(state: &mut RoomState, bullet_id: &str) -> bool {
    state.bullets.remove(bullet_id).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::RoomRng;
    use crate::core::vec2::Vec2;
    use crate::game::events::GameEventData;
    use crate::game::state::{Collider, SafeZone};
    use crate::game::weapon::WeaponKind;

    fn test_state() -> RoomState {
        let zone = SafeZone {
            center: Vec2::new(1984.0, 1984.0),
            radius: 5000.0,
            next_shrink_time: 5,
        };
        RoomState::new(3968.0, 3968.0, zone, RoomRng::new(2))
    }

    #[test]
    fn test_bullet_moves_linearly() {
        let mut state = test_state();
        let config = CombatConfig::default();
        let start = Vec2::new(500.0, 500.0);
        let rotation = 0.7;
        let id = state.spawn_bullet(start, rotation, "a", WeaponKind::Pistol.stats());
        let step = state.bullets[&id].step(60);

        let mut expected = start;
        for _ in 0..30 {
            advance_bullets(&mut state, &config, 60);
            expected = expected + step;
        }

        let position = state.bullets[&id].position;
        assert!((position.x - expected.x).abs() < 1e-2);
        assert!((position.y - expected.y).abs() < 1e-2);
    }

    #[test]
    fn test_bullet_blocked_by_collider() {
        let mut state = test_state();
        let config = CombatConfig::default();
        state.add_collider(Collider { position: Vec2::new(520.0, 500.0), radius: 30.0 });
        state.spawn_bullet(Vec2::new(500.0, 500.0), 0.0, "a", WeaponKind::Rifle.stats());

        assert_eq!(advance_bullets(&mut state, &config, 60), 1);
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_fast_bullet_cannot_tunnel() {
        let mut state = test_state();
        let config = CombatConfig::default();
        // Thin obstacle sitting between two tick positions
        state.add_collider(Collider { position: Vec2::new(505.0, 500.0), radius: 4.0 });
        let mut fast = *WeaponKind::Rifle.stats();
        fast.bullet_speed = 1200.0; // 20 units per tick
        state.spawn_bullet(Vec2::new(500.0, 500.0), 0.0, "a", &fast);

        advance_bullets(&mut state, &config, 60);
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_distant_collider_ignored() {
        let mut state = test_state();
        let config = CombatConfig::default();
        state.add_collider(Collider { position: Vec2::new(900.0, 900.0), radius: 50.0 });
        state.spawn_bullet(Vec2::new(500.0, 500.0), 0.0, "a", WeaponKind::Pistol.stats());

        assert_eq!(advance_bullets(&mut state, &config, 60), 0);
        assert_eq!(state.bullets.len(), 1);
    }

    #[test]
    fn test_bullet_removed_out_of_bounds() {
        let mut state = test_state();
        let config = CombatConfig::default();
        state.spawn_bullet(Vec2::new(3965.0, 100.0), 0.0, "a", WeaponKind::Pistol.stats());

        assert_eq!(advance_bullets(&mut state, &config, 60), 1);
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_hit_damages_and_eliminates() {
        let mut state = test_state();
        let config = CombatConfig::default();
        state.add_player("shooter".into(), Vec2::new(100.0, 100.0));
        state.add_player("target".into(), Vec2::new(300.0, 300.0));
        state.players.get_mut("target").unwrap().health = 15;

        state.spawn_bullet(Vec2::new(305.0, 300.0), 0.0, "shooter", WeaponKind::Pistol.stats());
        assert_eq!(resolve_bullet_hits(&mut state, &config), 1);
        assert_eq!(state.players["target"].health, 5);
        assert!(state.bullets.is_empty());

        state.spawn_bullet(Vec2::new(300.0, 310.0), 0.0, "shooter", WeaponKind::Pistol.stats());
        resolve_bullet_hits(&mut state, &config);
        let target = &state.players["target"];
        assert!(!target.alive);
        assert_eq!(target.health, 0);

        let events: Vec<GameEventData> = state.take_events().into_iter().map(|e| e.data).collect();
        assert_eq!(
            events,
            vec![GameEventData::PlayerEliminated { player_id: "target".into(), players_left: 1 }]
        );
    }

    #[test]
    fn test_owner_not_hit() {
        let mut state = test_state();
        let config = CombatConfig::default();
        state.add_player("a".into(), Vec2::new(100.0, 100.0));
        state.spawn_bullet(Vec2::new(100.0, 100.0), 0.0, "a", WeaponKind::Pistol.stats());

        assert_eq!(resolve_bullet_hits(&mut state, &config), 0);
        assert_eq!(state.bullets.len(), 1);
        assert_eq!(state.players["a"].health, 100);
    }

    #[test]
    fn test_remove_bullet() {
        let mut state = test_state();
        let id = state.spawn_bullet(Vec2::ZERO, 0.0, "a", WeaponKind::Pistol.stats());
        assert!(remove_bullet(&mut state, &id));
        assert!(!remove_bullet(&mut state, &id));
    }
}
