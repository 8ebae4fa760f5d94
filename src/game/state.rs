//! Room State Definitions
//!
//! The entity model owned by a single room: players, bullets, world
//! weapons, colliders and the safe zone. `RoomState` is the aggregate
//! root; the replication layer snapshots it every tick, so every field a
//! client can see lives here and nowhere else.
//!
//! Uses BTreeMap so iteration order (and therefore collision order)
//! follows entity ids.

use std::collections::BTreeMap;

use crate::core::geometry::{circle_contains, in_rect};
use crate::core::rng::RoomRng;
use crate::core::vec2::Vec2;
use crate::game::events::GameEvent;
use crate::game::timers::DeferredQueue;
use crate::game::weapon::{WeaponKind, WeaponStats};

/// Connection-scoped player identifier.
pub type SessionId = String;

/// Bullet identifier.
pub type BulletId = String;

/// World weapon identifier.
pub type WeaponId = String;

/// Starting and maximum health.
pub const MAX_HEALTH: i32 = 100;

// =============================================================================
// PLAYER
// =============================================================================

/// Per-connection player entity.
#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    /// Current position
    pub position: Vec2,
    /// Aim rotation (radians)
    pub rotation: f32,
    /// Health (0-100)
    pub health: i32,
    /// Equipped weapon, `None` when unarmed
    pub weapon: Option<WeaponKind>,
    /// Is player still alive?
    pub alive: bool,
    /// Rounds in the current magazine
    pub ammo: u32,
    /// Spare magazines
    pub magazines: u32,
    /// Room time of the last accepted shot
    pub last_shot_ms: Option<u64>,
    /// Room time the current reload ends
    pub reload_end_ms: u64,
    /// Reload in progress
    pub reloading: bool,
}

impl Player {
    /// Create an unarmed, full-health player.
    pub fn new(position: Vec2) -> Self {
        Self {
            position,
            rotation: 0.0,
            health: MAX_HEALTH,
            weapon: None,
            alive: true,
            ammo: 0,
            magazines: 0,
            last_shot_ms: None,
            reload_end_ms: 0,
            reloading: false,
        }
    }

    /// Mid-reload at `now_ms`.
    #[inline]
    pub fn is_reloading(&self, now_ms: u64) -> bool {
        self.reloading && now_ms < self.reload_end_ms
    }

    /// Has the shot delay of `weapon` elapsed since the last shot?
    #[inline]
    pub fn shot_ready(&self, now_ms: u64, stats: &WeaponStats) -> bool {
        match self.last_shot_ms {
            Some(last) => now_ms.saturating_sub(last) >= stats.shot_delay_ms,
            None => true,
        }
    }

    /// Equip a fresh weapon with a full magazine and no spares.
    pub fn equip(&mut self, kind: WeaponKind) {
        self.weapon = Some(kind);
        self.ammo = kind.stats().capacity;
        self.magazines = 0;
        self.reloading = false;
    }

    /// Clear weapon and loaded ammo.
    pub fn unequip(&mut self) {
        self.weapon = None;
        self.ammo = 0;
        self.reloading = false;
    }
}

// =============================================================================
// BULLET
// =============================================================================

/// Ephemeral projectile.
#[derive(Clone, Debug, PartialEq)]
pub struct Bullet {
    /// Current position
    pub position: Vec2,
    /// Direction of travel (radians)
    pub rotation: f32,
    /// Shooter
    pub owner: SessionId,
    /// Damage on hit
    pub damage: i32,
    /// Speed in units per second
    pub speed: f32,
}

impl Bullet {
    /// Displacement per simulation tick.
    #[inline]
    pub fn step(&self, tick_rate: u32) -> Vec2 {
        Vec2::from_angle(self.rotation).scale(self.speed / tick_rate as f32)
    }
}

// =============================================================================
// WORLD WEAPON
// =============================================================================

/// Weapon lying on the map, waiting to be picked up.
#[derive(Clone, Debug, PartialEq)]
pub struct WeaponPickup {
    /// Position
    pub position: Vec2,
    /// Weapon type
    pub kind: WeaponKind,
}

impl WeaponPickup {
    /// Balance values of this pickup.
    #[inline]
    pub fn stats(&self) -> &'static WeaponStats {
        self.kind.stats()
    }
}

// =============================================================================
// COLLIDERS & ZONE
// =============================================================================

/// Obstacle circle reported by a client.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Collider {
    /// Centre
    pub position: Vec2,
    /// Radius
    pub radius: f32,
}

/// Reports whose centre and radius both fall within this many units of a
/// known collider describe the same obstacle.
pub const COLLIDER_TOLERANCE: f32 = 1.0;

/// Shrinking safe zone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SafeZone {
    /// Centre
    pub center: Vec2,
    /// Current radius
    pub radius: f32,
    /// Seconds until the next shrink
    pub next_shrink_time: u32,
}

impl SafeZone {
    /// Is `position` inside the zone?
    #[inline]
    pub fn contains(&self, position: Vec2) -> bool {
        circle_contains(self.center, self.radius, position)
    }
}

// =============================================================================
// ROOM STATE
// =============================================================================

/// Complete state of one room.
#[derive(Debug)]
pub struct RoomState {
    /// Simulation ticks run so far
    pub tick: u64,
    /// All players by session (BTreeMap for ordered iteration)
    pub players: BTreeMap<SessionId, Player>,
    /// Live bullets
    pub bullets: BTreeMap<BulletId, Bullet>,
    /// Weapons on the ground
    pub weapons: BTreeMap<WeaponId, WeaponPickup>,
    /// Map width
    pub map_width: f32,
    /// Map height
    pub map_height: f32,
    /// Safe zone
    pub zone: SafeZone,
    /// Reported obstacles
    pub colliders: Vec<Collider>,
    /// Room RNG
    pub rng: RoomRng,
    /// Scheduled continuations
    pub deferred: DeferredQueue,
    /// The end condition already fired
    pub match_over: bool,

    /// Next entity id counter
    next_entity_id: u64,
    /// Events generated but not yet collected
    pending_events: Vec<GameEvent>,
}

impl RoomState {
    /// Create an empty room state.
    pub fn new(map_width: f32, map_height: f32, zone: SafeZone, rng: RoomRng) -> Self {
        Self {
            tick: 0,
            players: BTreeMap::new(),
            bullets: BTreeMap::new(),
            weapons: BTreeMap::new(),
            map_width,
            map_height,
            zone,
            colliders: Vec::new(),
            rng,
            deferred: DeferredQueue::new(),
            match_over: false,
            next_entity_id: 0,
            pending_events: Vec::new(),
        }
    }

    /// Allocate a new entity id with the given prefix.
    fn next_id(&mut self, prefix: char) -> String {
        self.next_entity_id += 1;
        format!("{}{}", prefix, to_base36(self.next_entity_id))
    }

    /// Add a player at `position`.
    pub fn add_player(&mut self, id: SessionId, position: Vec2) {
        self.players.insert(id, Player::new(position));
    }

    /// Remove a player and any continuation still pending for them.
    pub fn remove_player(&mut self, id: &str) -> Option<Player> {
        self.deferred.cancel_player(id);
        self.players.remove(id)
    }

    /// Create a bullet and return its id.
    pub fn spawn_bullet(
        &mut self,
        position: Vec2,
        rotation: f32,
        owner: &str,
        stats: &WeaponStats,
    ) -> BulletId {
        let id = self.next_id('b');
        self.bullets.insert(id.clone(), Bullet {
            position,
            rotation,
            owner: owner.to_string(),
            damage: stats.damage,
            speed: stats.bullet_speed,
        });
        id
    }

    /// Put a weapon on the ground and return its id.
    pub fn spawn_weapon(&mut self, position: Vec2, kind: WeaponKind) -> WeaponId {
        let id = self.next_id('w');
        self.weapons.insert(id.clone(), WeaponPickup { position, kind });
        id
    }

    /// Register a reported obstacle. Every client reports the same map
    /// geometry, so an obstacle already known (within
    /// [`COLLIDER_TOLERANCE`]) is ignored. Returns true if it was new.
    pub fn add_collider(&mut self, collider: Collider) -> bool {
        let known = self.colliders.iter().any(|c| {
            c.position.distance(collider.position) <= COLLIDER_TOLERANCE
                && (c.radius - collider.radius).abs() <= COLLIDER_TOLERANCE
        });
        if known {
            return false;
        }
        self.colliders.push(collider);
        true
    }

    /// Is `position` inside the map rectangle?
    #[inline]
    pub fn in_bounds(&self, position: Vec2) -> bool {
        in_rect(position, self.map_width, self.map_height)
    }

    /// Number of players still alive.
    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.alive).count()
    }

    /// Apply damage to a living player. Returns true if this killed them.
    ///
    /// Death clamps health to zero and queues the elimination event.
    pub fn damage_player(&mut self, id: &str, amount: i32) -> bool {
        let Some(player) = self.players.get_mut(id) else {
            return false;
        };
        if !player.alive {
            return false;
        }

        player.health -= amount;
        if player.health > 0 {
            return false;
        }

        player.health = 0;
        player.alive = false;
        player.reloading = false;

        let players_left = self.alive_count();
        let event = GameEvent::player_eliminated(self.tick, id, players_left);
        self.push_event(event);
        true
    }

    /// Queue an event for the next broadcast.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }

    /// Take all pending events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

/// Lowercase base-36 rendering of an id counter.
fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::GameEventData;

    fn test_state() -> RoomState {
        let zone = SafeZone {
            center: Vec2::new(1984.0, 1984.0),
            radius: 5000.0,
            next_shrink_time: 5,
        };
        RoomState::new(3968.0, 3968.0, zone, RoomRng::new(1))
    }

    #[test]
    fn test_new_player_is_unarmed() {
        let player = Player::new(Vec2::new(10.0, 20.0));
        assert!(player.alive);
        assert_eq!(player.health, MAX_HEALTH);
        assert_eq!(player.weapon, None);
        assert_eq!(player.ammo, 0);
        assert_eq!(player.magazines, 0);
        assert!(!player.reloading);
    }

    #[test]
    fn test_duplicate_collider_reports_ignored() {
        let mut state = test_state();
        let rock = Collider { position: Vec2::new(500.0, 500.0), radius: 40.0 };

        assert!(state.add_collider(rock));
        assert!(!state.add_collider(rock));
        assert!(!state.add_collider(Collider { position: Vec2::new(500.5, 500.0), radius: 40.2 }));
        assert_eq!(state.colliders.len(), 1);

        assert!(state.add_collider(Collider { position: Vec2::new(500.0, 500.0), radius: 80.0 }));
        assert_eq!(state.colliders.len(), 2);
    }

    #[test]
    fn test_entity_ids_unique() {
        let mut state = test_state();
        let stats = WeaponKind::Pistol.stats();
        let a = state.spawn_bullet(Vec2::ZERO, 0.0, "p", stats);
        let b = state.spawn_bullet(Vec2::ZERO, 0.0, "p", stats);
        let w = state.spawn_weapon(Vec2::ZERO, WeaponKind::Rifle);
        assert_ne!(a, b);
        assert!(a.starts_with('b'));
        assert!(w.starts_with('w'));
        assert_eq!(state.bullets.len(), 2);
        assert_eq!(state.weapons.len(), 1);
    }

    #[test]
    fn test_damage_player_eliminates() {
        let mut state = test_state();
        state.add_player("a".into(), Vec2::new(100.0, 100.0));
        state.add_player("b".into(), Vec2::new(200.0, 200.0));

        assert!(!state.damage_player("a", 60));
        assert_eq!(state.players["a"].health, 40);

        assert!(state.damage_player("a", 60));
        let a = &state.players["a"];
        assert!(!a.alive);
        assert_eq!(a.health, 0);

        // Dead players take no further damage
        assert!(!state.damage_player("a", 10));

        let events = state.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].data,
            GameEventData::PlayerEliminated { player_id: "a".into(), players_left: 1 }
        );
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_remove_player_cancels_deferred() {
        let mut state = test_state();
        state.add_player("a".into(), Vec2::ZERO);
        state.deferred.schedule(100, crate::game::timers::DeferredAction::ReloadComplete {
            player_id: "a".into(),
            weapon: WeaponKind::Pistol,
        });

        assert!(state.remove_player("a").is_some());
        assert!(state.deferred.is_empty());
        assert!(state.players.is_empty());
    }

    #[test]
    fn test_shot_ready() {
        let mut player = Player::new(Vec2::ZERO);
        let stats = WeaponKind::Pistol.stats();
        assert!(player.shot_ready(0, stats));

        player.last_shot_ms = Some(1000);
        assert!(!player.shot_ready(1499, stats));
        assert!(player.shot_ready(1500, stats));
    }

    #[test]
    fn test_bullet_step() {
        let bullet = Bullet {
            position: Vec2::ZERO,
            rotation: 0.0,
            owner: "a".into(),
            damage: 10,
            speed: 600.0,
        };
        let step = bullet.step(60);
        assert!((step.x - 10.0).abs() < 1e-5);
        assert!(step.y.abs() < 1e-5);
    }

    #[test]
    fn test_to_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
