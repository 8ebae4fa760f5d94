//! Spawn and Weapon Placement
//!
//! Finds obstacle-free positions inside the current safe zone. Every
//! search has a bounded attempt budget and ends in a landmark fallback,
//! so placement never fails and never leaves the map.

use std::f32::consts::FRAC_PI_4;

use crate::core::geometry::in_rect;
use crate::core::vec2::Vec2;
use crate::game::state::{Collider, RoomState};

/// Configuration for the placement planner.
#[derive(Debug, Clone)]
pub struct PlacementConfig {
    /// Attempts for a weapon position inside the zone
    pub zone_search_attempts: u32,
    /// Fraction of the zone radius weapon candidates may reach
    pub zone_search_reach: f32,
    /// Weapons keep `radius * weapon_clearance` from every collider centre
    pub weapon_clearance: f32,
    /// A point with 2+ colliders within `radius + trap_margin` is trapped
    pub trap_margin: f32,
    /// First-pass spawn attempts
    pub spawn_attempts: u32,
    /// First-pass spawn reach (fraction of zone radius)
    pub spawn_reach: f32,
    /// Minimum distance between a new spawn and any living player
    pub spawn_player_spacing: f32,
    /// Spawns keep `radius * spawn_clearance` from every collider centre
    pub spawn_clearance: f32,
    /// Second-pass spawn attempts (player spacing dropped)
    pub relaxed_spawn_attempts: u32,
    /// Second-pass spawn reach
    pub relaxed_spawn_reach: f32,
    /// Known open spots on the map
    pub landmarks: Vec<Vec2>,
    /// Random offset applied to landmarks
    pub landmark_jitter: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            zone_search_attempts: 150,
            zone_search_reach: 0.75,
            weapon_clearance: 1.5,
            trap_margin: 150.0,
            spawn_attempts: 100,
            spawn_reach: 0.8,
            spawn_player_spacing: 300.0,
            spawn_clearance: 1.25,
            relaxed_spawn_attempts: 200,
            relaxed_spawn_reach: 0.9,
            landmarks: vec![
                Vec2::new(400.0, 400.0),
                Vec2::new(3600.0, 400.0),
                Vec2::new(400.0, 3600.0),
                Vec2::new(3600.0, 3600.0),
                Vec2::new(2000.0, 2000.0),
                Vec2::new(1000.0, 1000.0),
                Vec2::new(3000.0, 1000.0),
                Vec2::new(1000.0, 3000.0),
                Vec2::new(3000.0, 3000.0),
            ],
            landmark_jitter: 100.0,
        }
    }
}

/// Distance band (fraction of zone radius) for sector placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ring {
    /// Close to the zone centre, any direction
    Centre,
    /// 0.3 - 0.6 of the radius
    Inner,
    /// 0.5 - 0.7 of the radius
    Middle,
    /// 0.6 - 0.9 of the radius
    Outer,
}

impl Ring {
    /// Rings used when spreading weapons around the zone.
    pub const SPREAD: [Ring; 3] = [Ring::Inner, Ring::Middle, Ring::Outer];

    fn band(self) -> (f32, f32) {
        match self {
            Ring::Centre => (0.1, 0.4),
            Ring::Inner => (0.3, 0.6),
            Ring::Middle => (0.5, 0.7),
            Ring::Outer => (0.6, 0.9),
        }
    }
}

/// Number of angular sectors around the zone centre.
pub const SECTOR_COUNT: u8 = 8;

// =============================================================================
// VALIDITY CHECKS
// =============================================================================

/// True if every collider centre is at least `radius * factor` away.
pub fn clear_of_colliders(colliders: &[Collider], position: Vec2, factor: f32) -> bool {
    colliders
        .iter()
        .all(|c| position.distance(c.position) >= c.radius * factor)
}

/// Wedged between obstacles: two or more colliders within
/// `radius + margin`. Needs at least two known colliders.
pub fn is_trapped(colliders: &[Collider], position: Vec2, margin: f32) -> bool {
    if colliders.len() < 2 {
        return false;
    }
    let nearby = colliders
        .iter()
        .filter(|c| position.distance(c.position) < c.radius + margin)
        .count();
    nearby >= 2
}

/// Weapon position check: on the map, inside the safe zone, clear of
/// obstacles and not trapped.
pub fn is_weapon_position_valid(state: &RoomState, position: Vec2, config: &PlacementConfig) -> bool {
    state.in_bounds(position)
        && state.zone.contains(position)
        && clear_of_colliders(&state.colliders, position, config.weapon_clearance)
        && !is_trapped(&state.colliders, position, config.trap_margin)
}

fn spawn_clear_of_players(state: &RoomState, position: Vec2, spacing: f32) -> bool {
    state
        .players
        .values()
        .filter(|p| p.alive)
        .all(|p| p.position.distance(position) >= spacing)
}

// =============================================================================
// SEARCHES
// =============================================================================

/// Find a weapon position inside the safe zone.
///
/// Candidates use `sqrt(u)` scaled distance within `zone_search_reach`
/// of the radius.
pub fn find_position_in_safe_zone(state: &mut RoomState, config: &PlacementConfig) -> Vec2 {
    let zone = state.zone;
    let reach = zone.radius * config.zone_search_reach;

    for _ in 0..config.zone_search_attempts {
        let angle = state.rng.angle();
        let distance = state.rng.next_f32().sqrt() * reach;
        let candidate = zone.center.offset_polar(angle, distance);

        if is_weapon_position_valid(state, candidate, config) {
            return candidate;
        }
    }

    landmark_fallback(state, config, |s, p| is_weapon_position_valid(s, p, config))
}

/// Find a spawn position for a new player.
///
/// 1. Near the centre, away from living players and obstacles.
/// 2. Wider, obstacles only.
/// 3. Jittered landmark.
pub fn find_safe_spawn_position(state: &mut RoomState, config: &PlacementConfig) -> Vec2 {
    let zone = state.zone;

    for _ in 0..config.spawn_attempts {
        let angle = state.rng.angle();
        let distance = state.rng.next_f32() * zone.radius * config.spawn_reach;
        let candidate = zone.center.offset_polar(angle, distance);

        if state.in_bounds(candidate)
            && spawn_clear_of_players(state, candidate, config.spawn_player_spacing)
            && clear_of_colliders(&state.colliders, candidate, config.spawn_clearance)
            && !is_trapped(&state.colliders, candidate, config.trap_margin)
        {
            return candidate;
        }
    }

    for _ in 0..config.relaxed_spawn_attempts {
        let angle = state.rng.angle();
        let distance = state.rng.next_f32() * zone.radius * config.relaxed_spawn_reach;
        let candidate = zone.center.offset_polar(angle, distance);

        if state.in_bounds(candidate)
            && clear_of_colliders(&state.colliders, candidate, config.spawn_clearance)
        {
            return candidate;
        }
    }

    landmark_fallback(state, config, |s, p| {
        clear_of_colliders(&s.colliders, p, config.spawn_clearance)
    })
}

/// Weapon position inside one angular sector at the given ring.
///
/// Falls back to a free search when the sector candidate is invalid.
pub fn position_in_sector(
    state: &mut RoomState,
    sector: u8,
    ring: Ring,
    config: &PlacementConfig,
) -> Vec2 {
    let zone = state.zone;
    let angle = match ring {
        Ring::Centre => state.rng.angle(),
        _ => (sector % SECTOR_COUNT) as f32 * FRAC_PI_4 + state.rng.next_f32() * FRAC_PI_4,
    };
    let (low, high) = ring.band();
    let distance = zone.radius * state.rng.range_f32(low, high);
    let candidate = zone.center.offset_polar(angle, distance);

    if is_weapon_position_valid(state, candidate, config) {
        candidate
    } else {
        find_position_in_safe_zone(state, config)
    }
}

/// Try the landmarks in random order with jitter; if none passes
/// `accept`, use the landmark nearest the zone centre pulled onto the
/// map and into the zone.
fn landmark_fallback<F>(state: &mut RoomState, config: &PlacementConfig, accept: F) -> Vec2
where
    F: Fn(&RoomState, Vec2) -> bool,
{
    let mut order: Vec<usize> = (0..config.landmarks.len()).collect();
    state.rng.shuffle(&mut order);

    for index in order {
        let landmark = config.landmarks[index];
        let candidate = landmark + jitter(state, config.landmark_jitter);
        if state.in_bounds(candidate) && accept(state, candidate) {
            return candidate;
        }
    }

    let zone = state.zone;
    let nearest = config
        .landmarks
        .iter()
        .copied()
        .min_by(|a, b| {
            a.distance_squared(zone.center)
                .total_cmp(&b.distance_squared(zone.center))
        })
        .unwrap_or(zone.center);
    let candidate = nearest + jitter(state, config.landmark_jitter);
    pull_inside(state, candidate)
}

fn jitter(state: &mut RoomState, amount: f32) -> Vec2 {
    Vec2::new(state.rng.jitter(amount), state.rng.jitter(amount))
}

/// Clamp onto the map, then pull toward the zone centre if outside it.
fn pull_inside(state: &RoomState, position: Vec2) -> Vec2 {
    let mut p = Vec2::new(
        position.x.clamp(0.0, state.map_width),
        position.y.clamp(0.0, state.map_height),
    );
    let zone = state.zone;
    if !zone.contains(p) {
        let offset = p - zone.center;
        p = zone.center + offset.normalize().scale(zone.radius * 0.9);
    }
    if in_rect(p, state.map_width, state.map_height) {
        p
    } else {
        zone.center
    }
}

// =============================================================================
// TESTS
// =============================================================================
