//! Safe Zone
//!
//! A 1 Hz countdown shrinks the zone by a fixed step whenever it reaches
//! zero. Living players outside the zone lose health every tick.

use crate::core::vec2::Vec2;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::state::{RoomState, SafeZone, SessionId};

/// Configuration for the safe zone.
#[derive(Debug, Clone)]
pub struct ZoneConfig {
    /// Zone centre
    pub center: Vec2,
    /// Radius at room creation
    pub initial_radius: f32,
    /// Seconds between shrinks
    pub shrink_interval: u32,
    /// Radius lost per shrink
    pub shrink_step: f32,
    /// Radius never shrinks below this
    pub min_radius: f32,
    /// Health lost per tick outside the zone
    pub damage_per_tick: i32,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            center: Vec2::new(1984.0, 1984.0),
            // Larger than the map: everyone starts inside
            initial_radius: 5000.0,
            shrink_interval: 5,
            shrink_step: 250.0,
            min_radius: 200.0,
            damage_per_tick: 1,
        }
    }
}

impl ZoneConfig {
    /// Zone at room creation.
    pub fn initial_zone(&self) -> SafeZone {
        SafeZone {
            center: self.center,
            radius: self.initial_radius,
            next_shrink_time: self.shrink_interval,
        }
    }
}

/// Outcome of one countdown step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ZoneStep {
    /// Still counting; seconds left.
    Countdown(u32),
    /// Zone shrank to `radius`.
    Shrunk {
        /// New radius
        radius: f32,
    },
}

/// Advance the countdown by one second.
pub fn shrink_step(state: &mut RoomState, config: &ZoneConfig) -> ZoneStep {
    let tick = state.tick;
    let zone = &mut state.zone;
    zone.next_shrink_time = zone.next_shrink_time.saturating_sub(1);

    if zone.next_shrink_time > 0 {
        let remaining = zone.next_shrink_time;
        state.push_event(GameEvent::new(tick, GameEventData::ZoneCountdown {
            next_shrink_time: remaining,
        }));
        return ZoneStep::Countdown(remaining);
    }

    zone.next_shrink_time = config.shrink_interval;
    zone.radius = (zone.radius - config.shrink_step).max(config.min_radius);
    let zone = *zone;

    state.push_event(GameEvent::new(tick, GameEventData::ZoneShrunk {
        center: zone.center,
        radius: zone.radius,
        next_shrink_time: zone.next_shrink_time,
    }));
    ZoneStep::Shrunk { radius: zone.radius }
}

/// Damage every living player outside the zone. Returns how many were hit.
pub fn apply_zone_damage(state: &mut RoomState, config: &ZoneConfig) -> usize {
    let zone = state.zone;
    let outside: Vec<SessionId> = state
        .players
        .iter()
        .filter(|(_, p)| p.alive && !zone.contains(p.position))
        .map(|(id, _)| id.clone())
        .collect();

    for id in &outside {
        state.damage_player(id, config.damage_per_tick);
    }
    outside.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::RoomRng;

    fn test_state(config: &ZoneConfig) -> RoomState {
        RoomState::new(3968.0, 3968.0, config.initial_zone(), RoomRng::new(4))
    }

    #[test]
    fn test_shrink_after_interval() {
        let config = ZoneConfig::default();
        let mut state = test_state(&config);

        for expected in [4, 3, 2, 1] {
            assert_eq!(shrink_step(&mut state, &config), ZoneStep::Countdown(expected));
        }
        assert_eq!(state.zone.radius, 5000.0);

        assert_eq!(shrink_step(&mut state, &config), ZoneStep::Shrunk { radius: 4750.0 });
        assert_eq!(state.zone.next_shrink_time, 5);

        let events = state.take_events();
        assert_eq!(events.len(), 5);
        assert_eq!(
            events[4].data,
            GameEventData::ZoneShrunk {
                center: config.center,
                radius: 4750.0,
                next_shrink_time: 5,
            }
        );
    }

    #[test]
    fn test_shrink_clamped_to_minimum() {
        let config = ZoneConfig::default();
        let mut state = test_state(&config);
        state.zone.radius = 300.0;
        state.zone.next_shrink_time = 1;

        assert_eq!(shrink_step(&mut state, &config), ZoneStep::Shrunk { radius: 200.0 });

        state.zone.next_shrink_time = 1;
        assert_eq!(shrink_step(&mut state, &config), ZoneStep::Shrunk { radius: 200.0 });
    }

    #[test]
    fn test_zone_damage_per_tick() {
        let config = ZoneConfig::default();
        let mut state = test_state(&config);
        state.zone.radius = 500.0;
        state.add_player("inside".into(), config.center);
        state.add_player("outside".into(), Vec2::new(100.0, 100.0));

        for _ in 0..10 {
            apply_zone_damage(&mut state, &config);
        }
        assert_eq!(state.players["inside"].health, 100);
        assert_eq!(state.players["outside"].health, 90);

        // Stepping back inside stops the damage
        state.players.get_mut("outside").unwrap().position = config.center;
        apply_zone_damage(&mut state, &config);
        assert_eq!(state.players["outside"].health, 90);
    }

    #[test]
    fn test_zone_damage_kills() {
        let config = ZoneConfig::default();
        let mut state = test_state(&config);
        state.zone.radius = 500.0;
        state.add_player("a".into(), Vec2::new(100.0, 100.0));
        state.add_player("b".into(), config.center);
        state.players.get_mut("a").unwrap().health = 2;

        apply_zone_damage(&mut state, &config);
        apply_zone_damage(&mut state, &config);
        assert!(!state.players["a"].alive);

        // Dead players are no longer damaged
        assert_eq!(apply_zone_damage(&mut state, &config), 0);
        assert_eq!(state.players["a"].health, 0);
    }
}
