//! State Replication
//!
//! Captures the replicated view of a room after each tick and diffs it
//! against the previous capture. Only entities whose view changed go on
//! the wire.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::state::{Bullet, Player, RoomState, WeaponPickup};
use crate::game::weapon::slot_name;
use crate::network::protocol::ZoneInfo;

/// Replicated player fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub health: i32,
    /// Empty when unarmed
    pub weapon: String,
    pub is_alive: bool,
    pub ammo: u32,
    pub magazine_count: u32,
    pub is_reloading: bool,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        Self {
            x: player.position.x,
            y: player.position.y,
            rotation: player.rotation,
            health: player.health,
            weapon: slot_name(player.weapon).to_string(),
            is_alive: player.alive,
            ammo: player.ammo,
            magazine_count: player.magazines,
            is_reloading: player.reloading,
        }
    }
}

/// Replicated bullet fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletView {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub owner_id: String,
    pub damage: i32,
    pub speed: f32,
}

impl From<&Bullet> for BulletView {
    fn from(bullet: &Bullet) -> Self {
        Self {
            x: bullet.position.x,
            y: bullet.position.y,
            rotation: bullet.rotation,
            owner_id: bullet.owner.clone(),
            damage: bullet.damage,
            speed: bullet.speed,
        }
    }
}

/// Replicated weapon pickup fields, including its stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponView {
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub kind: String,
    pub damage: i32,
    pub fire_rate: f32,
    pub ammo_capacity: u32,
    /// Milliseconds
    pub reload_time: u64,
    /// Milliseconds
    pub shot_delay: u64,
    pub bullets_per_shot: u32,
}

impl From<&WeaponPickup> for WeaponView {
    fn from(weapon: &WeaponPickup) -> Self {
        let stats = weapon.stats();
        Self {
            x: weapon.position.x,
            y: weapon.position.y,
            kind: weapon.kind.as_str().to_string(),
            damage: stats.damage,
            fire_rate: stats.fire_rate,
            ammo_capacity: stats.capacity,
            reload_time: stats.reload_ms,
            shot_delay: stats.shot_delay_ms,
            bullets_per_shot: stats.bullets_per_shot(),
        }
    }
}

// =============================================================================
// FULL STATE
// =============================================================================

/// Complete replicated room state, sent to a client on join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullState {
    pub players: BTreeMap<String, PlayerView>,
    pub bullets: BTreeMap<String, BulletView>,
    pub weapons: BTreeMap<String, WeaponView>,
    pub map_width: f32,
    pub map_height: f32,
    pub safe_zone_x: f32,
    pub safe_zone_y: f32,
    pub safe_zone_radius: f32,
    pub next_shrink_time: u32,
}

impl FullState {
    /// Capture the replicated view of `state`.
    pub fn capture(state: &RoomState) -> Self {
        Self {
            players: state.players.iter().map(|(id, p)| (id.clone(), p.into())).collect(),
            bullets: state.bullets.iter().map(|(id, b)| (id.clone(), b.into())).collect(),
            weapons: state.weapons.iter().map(|(id, w)| (id.clone(), w.into())).collect(),
            map_width: state.map_width,
            map_height: state.map_height,
            safe_zone_x: state.zone.center.x,
            safe_zone_y: state.zone.center.y,
            safe_zone_radius: state.zone.radius,
            next_shrink_time: state.zone.next_shrink_time,
        }
    }

    /// Zone fields as a zone message payload.
    pub fn zone(&self) -> ZoneInfo {
        ZoneInfo {
            x: self.safe_zone_x,
            y: self.safe_zone_y,
            radius: self.safe_zone_radius,
            next_shrink_time: self.next_shrink_time,
        }
    }
}

// =============================================================================
// PATCHES
// =============================================================================

/// Changes to one entity map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPatch<T> {
    /// Added or changed entries
    pub upserted: BTreeMap<String, T>,
    /// Removed ids
    pub removed: Vec<String>,
}

impl<T: Clone + PartialEq> MapPatch<T> {
    /// Diff two maps. `None` if they are equal.
    pub fn between(prev: &BTreeMap<String, T>, next: &BTreeMap<String, T>) -> Option<Self> {
        let upserted: BTreeMap<String, T> = next
            .iter()
            .filter(|(id, view)| prev.get(*id) != Some(*view))
            .map(|(id, view)| (id.clone(), view.clone()))
            .collect();
        let removed: Vec<String> = prev
            .keys()
            .filter(|id| !next.contains_key(*id))
            .cloned()
            .collect();

        if upserted.is_empty() && removed.is_empty() {
            None
        } else {
            Some(Self { upserted, removed })
        }
    }

    /// Apply to a map.
    pub fn apply(&self, map: &mut BTreeMap<String, T>) {
        for id in &self.removed {
            map.remove(id);
        }
        for (id, view) in &self.upserted {
            map.insert(id.clone(), view.clone());
        }
    }
}

/// Changes between two captures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<MapPatch<PlayerView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bullets: Option<MapPatch<BulletView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapons: Option<MapPatch<WeaponView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<ZoneInfo>,
}

impl StatePatch {
    /// Diff two captures. `None` if nothing changed.
    pub fn between(prev: &FullState, next: &FullState) -> Option<Self> {
        let zone = next.zone();
        let patch = Self {
            players: MapPatch::between(&prev.players, &next.players),
            bullets: MapPatch::between(&prev.bullets, &next.bullets),
            weapons: MapPatch::between(&prev.weapons, &next.weapons),
            zone: (prev.zone() != zone).then_some(zone),
        };

        if patch.players.is_none()
            && patch.bullets.is_none()
            && patch.weapons.is_none()
            && patch.zone.is_none()
        {
            None
        } else {
            Some(patch)
        }
    }

    /// Apply to a capture, as a client would.
    pub fn apply(&self, state: &mut FullState) {
        if let Some(players) = &self.players {
            players.apply(&mut state.players);
        }
        if let Some(bullets) = &self.bullets {
            bullets.apply(&mut state.bullets);
        }
        if let Some(weapons) = &self.weapons {
            weapons.apply(&mut state.weapons);
        }
        if let Some(zone) = self.zone {
            state.safe_zone_x = zone.x;
            state.safe_zone_y = zone.y;
            state.safe_zone_radius = zone.radius;
            state.next_shrink_time = zone.next_shrink_time;
        }
    }
}
