//! Player Actions
//!
//! Intent messages from a connection, already decoded from the wire.
//! `apply_action` validates every numeric field before use and drops
//! anything invalid without an error.

use tracing::{debug, info};

use crate::core::vec2::Vec2;
use crate::game::ballistics::remove_bullet;
use crate::game::combat::{drop_weapon, pickup_weapon, shoot, start_reload, ShotOutcome};
use crate::game::state::{BulletId, Collider, RoomState, WeaponId};
use crate::game::tick::RoomConfig;

/// One player intent.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayerAction {
    /// Set position (and optionally rotation).
    Move {
        /// X
        x: f32,
        /// Y
        y: f32,
        /// Optional aim
        rotation: Option<f32>,
    },
    /// Set aim rotation.
    Rotate {
        /// Radians
        rotation: f32,
    },
    /// Pull the trigger.
    Shoot {
        /// Radians
        rotation: f32,
    },
    /// Pick up a world weapon.
    PickupWeapon {
        /// Target weapon
        weapon_id: WeaponId,
    },
    /// Start reloading.
    Reload,
    /// Discard the held weapon.
    DropWeapon,
    /// Register an obstacle seen by the client.
    ReportCollider {
        /// Centre X
        x: f32,
        /// Centre Y
        y: f32,
        /// Radius
        radius: f32,
    },
    /// Client saw a bullet hit scenery.
    RemoveBullet {
        /// Bullet to delete
        bullet_id: BulletId,
    },
}

/// Apply an action from `player_id` at room time `now_ms`.
///
/// Returns true if the action changed state.
pub fn apply_action(
    state: &mut RoomState,
    player_id: &str,
    action: PlayerAction,
    config: &RoomConfig,
    now_ms: u64,
) -> bool {
    match action {
        PlayerAction::Move { x, y, rotation } => {
            let target = Vec2::new(x, y);
            if !target.is_finite() {
                return false;
            }
            let Some(player) = state.players.get_mut(player_id) else {
                return false;
            };
            if !player.alive {
                return false;
            }
            player.position = target;
            if let Some(rotation) = rotation.filter(|r| r.is_finite()) {
                player.rotation = rotation;
            }
            true
        }
        PlayerAction::Rotate { rotation } => {
            if !rotation.is_finite() {
                return false;
            }
            match state.players.get_mut(player_id) {
                Some(player) if player.alive => {
                    player.rotation = rotation;
                    true
                }
                _ => false,
            }
        }
        PlayerAction::Shoot { rotation } => {
            matches!(shoot(state, player_id, rotation, now_ms), ShotOutcome::Fired { .. } | ShotOutcome::Disarmed)
        }
        PlayerAction::PickupWeapon { weapon_id } => {
            pickup_weapon(state, player_id, &weapon_id, &config.combat)
        }
        PlayerAction::Reload => start_reload(state, player_id, now_ms),
        PlayerAction::DropWeapon => drop_weapon(state, player_id),
        PlayerAction::ReportCollider { x, y, radius } => {
            let position = Vec2::new(x, y);
            if !position.is_finite() || !radius.is_finite() || radius <= 0.0 {
                return false;
            }
            if state.colliders.is_empty() {
                info!("First collider reported by {}", player_id);
            }
            let added = state.add_collider(Collider { position, radius });
            if !added {
                debug!("Collider at ({:.0}, {:.0}) already known", x, y);
            }
            added
        }
        PlayerAction::RemoveBullet { bullet_id } => {
            let removed = remove_bullet(state, &bullet_id);
            if !removed {
                debug!("Bullet {} already gone", bullet_id);
            }
            removed
        }
    }
}
