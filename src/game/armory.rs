//! Weapon Population
//!
//! Seeds the initial weapon pool across the map's quadrants, adds a few
//! weapons after every zone shrink, and keeps the pool valid each tick:
//! count within bounds, every weapon inside the zone and clear of
//! obstacles.

use tracing::debug;

use crate::game::placement::{
    find_position_in_safe_zone, is_weapon_position_valid, position_in_sector,
    PlacementConfig, Ring, SECTOR_COUNT,
};
use crate::game::state::{RoomState, WeaponId};
use crate::game::weapon::WeaponKind;

/// Configuration for weapon population.
#[derive(Debug, Clone)]
pub struct ArmoryConfig {
    /// Fewest weapons allowed on the map
    pub min_weapons: usize,
    /// Most weapons allowed on the map
    pub max_weapons: usize,
    /// Lower bound for the initial pool
    pub initial_floor: usize,
    /// Weapons added after a shrink at full radius
    pub shrink_spawn_count: usize,
    /// Radius at which the shrink spawn count stops scaling down
    pub shrink_spawn_radius: f32,
}

impl Default for ArmoryConfig {
    fn default() -> Self {
        Self {
            min_weapons: 15,
            max_weapons: 20,
            initial_floor: 10,
            shrink_spawn_count: 3,
            shrink_spawn_radius: 1000.0,
        }
    }
}

/// Sector pairs making up the four quadrants (NW, NE, SE, SW).
const QUADRANTS: [[u8; 2]; 4] = [[0, 1], [2, 3], [4, 5], [6, 7]];

/// What one maintenance pass changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Weapons moved to a valid position
    pub relocated: usize,
    /// Weapons added to reach the minimum
    pub spawned: usize,
    /// Weapons removed above the maximum
    pub culled: usize,
}

impl MaintenanceReport {
    /// Nothing changed.
    pub fn is_empty(&self) -> bool {
        self.relocated == 0 && self.spawned == 0 && self.culled == 0
    }
}

fn random_kind(state: &mut RoomState) -> WeaponKind {
    state.rng.choose(&WeaponKind::ALL).copied().unwrap_or(WeaponKind::Pistol)
}

fn spawn_in_sector(state: &mut RoomState, sector: u8, ring: Ring, placement: &PlacementConfig) -> WeaponId {
    let position = position_in_sector(state, sector, ring, placement);
    let kind = random_kind(state);
    state.spawn_weapon(position, kind)
}

fn random_ring(state: &mut RoomState) -> Ring {
    Ring::SPREAD[state.rng.next_index(Ring::SPREAD.len())]
}

/// Place `count` weapons spread over the four quadrants and the centre,
/// then scatter the remainder over shuffled sectors.
pub fn generate_weapons(state: &mut RoomState, count: usize, placement: &PlacementConfig) -> usize {
    let per_group = if count >= 15 { 3 } else { (count / 5).max(1) };
    let mut remaining = count;

    for quadrant in QUADRANTS {
        let here = per_group.min(remaining);
        remaining -= here;
        for i in 0..here {
            let ring = random_ring(state);
            spawn_in_sector(state, quadrant[i % 2], ring, placement);
        }
    }

    // Centre group
    let here = per_group.min(remaining);
    remaining -= here;
    for _ in 0..here {
        let sector = state.rng.next_index(SECTOR_COUNT as usize) as u8;
        spawn_in_sector(state, sector, Ring::Centre, placement);
    }

    if remaining > 0 {
        let mut sectors: Vec<u8> = (0..SECTOR_COUNT).collect();
        state.rng.shuffle(&mut sectors);
        for i in 0..remaining {
            let ring = random_ring(state);
            spawn_in_sector(state, sectors[i % sectors.len()], ring, placement);
        }
    }

    count
}

/// Seed the pool at room creation.
pub fn seed_initial_weapons(
    state: &mut RoomState,
    config: &ArmoryConfig,
    placement: &PlacementConfig,
) -> usize {
    let count = config.min_weapons.max(config.initial_floor);
    generate_weapons(state, count, placement)
}

/// Add weapons near the centre of a freshly shrunk zone.
///
/// Smaller zones get fewer weapons, never less than one.
pub fn replenish_after_shrink(
    state: &mut RoomState,
    config: &ArmoryConfig,
    placement: &PlacementConfig,
) -> usize {
    let factor = (state.zone.radius / config.shrink_spawn_radius).min(1.0);
    let count = ((config.shrink_spawn_count as f32 * factor).floor() as usize).max(1);

    for _ in 0..count {
        let sector = state.rng.next_index(SECTOR_COUNT as usize) as u8;
        spawn_in_sector(state, sector, Ring::Inner, placement);
    }
    count
}

/// Relocate invalid weapons, then bring the count back into bounds.
pub fn maintain_weapons(
    state: &mut RoomState,
    config: &ArmoryConfig,
    placement: &PlacementConfig,
) -> MaintenanceReport {
    let mut report = MaintenanceReport::default();

    let invalid: Vec<WeaponId> = state
        .weapons
        .iter()
        .filter(|(_, w)| !is_weapon_position_valid(state, w.position, placement))
        .map(|(id, _)| id.clone())
        .collect();

    for id in invalid {
        let position = find_position_in_safe_zone(state, placement);
        if let Some(weapon) = state.weapons.get_mut(&id) {
            weapon.position = position;
            report.relocated += 1;
        }
    }

    let count = state.weapons.len();
    if count < config.min_weapons {
        report.spawned = generate_weapons(state, config.min_weapons - count, placement);
    } else if count > config.max_weapons {
        let mut ids: Vec<WeaponId> = state.weapons.keys().cloned().collect();
        state.rng.shuffle(&mut ids);
        for id in ids.iter().take(count - config.max_weapons) {
            state.weapons.remove(id);
        }
        report.culled = count - config.max_weapons;
    }

    if !report.is_empty() {
        debug!(
            "Weapon maintenance: {} relocated, {} spawned, {} culled",
            report.relocated, report.spawned, report.culled
        );
    }
    report
}
