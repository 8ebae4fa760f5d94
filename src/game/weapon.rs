//! Weapon Balance Table
//!
//! One consistent table drives shooting, reloading, pickups and the
//! replicated weapon entity fields.

use serde::{Serialize, Deserialize};
use std::f32::consts::PI;

/// Weapon type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeaponKind {
    /// Single shot, cheap ammo.
    Pistol,
    /// Three-round burst.
    Rifle,
    /// Five-pellet fan.
    Shotgun,
}

/// How a single trigger pull turns into bullets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FirePattern {
    /// One bullet along the aim rotation.
    Single,
    /// `rounds` bullets along the same rotation, `spacing_ms` apart.
    /// The first round fires immediately.
    Burst {
        /// Bullets per burst
        rounds: u32,
        /// Delay between consecutive rounds
        spacing_ms: u64,
    },
    /// `pellets` bullets fanned across `spread` radians centred on the aim.
    Spread {
        /// Bullets per shot
        pellets: u32,
        /// Total fan angle
        spread: f32,
    },
}

/// Per-weapon balance values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeaponStats {
    /// Damage per bullet.
    pub damage: i32,
    /// Bullet speed in units per second.
    pub bullet_speed: f32,
    /// Magazine capacity.
    pub capacity: u32,
    /// Reload duration (ms).
    pub reload_ms: u64,
    /// Minimum time between shots (ms).
    pub shot_delay_ms: u64,
    /// Shots per second as shown to clients.
    pub fire_rate: f32,
    /// Ammo consumed per trigger pull.
    pub ammo_per_shot: u32,
    /// Bullet pattern.
    pub pattern: FirePattern,
}

impl WeaponStats {
    /// Number of bullets produced by one trigger pull.
    pub fn bullets_per_shot(&self) -> u32 {
        match self.pattern {
            FirePattern::Single => 1,
            FirePattern::Burst { rounds, .. } => rounds,
            FirePattern::Spread { pellets, .. } => pellets,
        }
    }
}

const PISTOL: WeaponStats = WeaponStats {
    damage: 10,
    bullet_speed: 500.0,
    capacity: 9,
    reload_ms: 1500,
    shot_delay_ms: 500,
    fire_rate: 1.0,
    ammo_per_shot: 1,
    pattern: FirePattern::Single,
};

const RIFLE: WeaponStats = WeaponStats {
    damage: 15,
    bullet_speed: 600.0,
    capacity: 30,
    reload_ms: 2500,
    shot_delay_ms: 200,
    fire_rate: 3.0,
    ammo_per_shot: 5,
    pattern: FirePattern::Burst { rounds: 3, spacing_ms: 100 },
};

const SHOTGUN: WeaponStats = WeaponStats {
    damage: 8,
    bullet_speed: 400.0,
    capacity: 20,
    reload_ms: 3000,
    shot_delay_ms: 1000,
    fire_rate: 0.5,
    ammo_per_shot: 5,
    pattern: FirePattern::Spread { pellets: 5, spread: PI / 8.0 },
};

impl WeaponKind {
    /// All weapon kinds, in spawn-roll order.
    pub const ALL: [WeaponKind; 3] = [WeaponKind::Pistol, WeaponKind::Rifle, WeaponKind::Shotgun];

    /// Balance values for this weapon.
    #[inline]
    pub fn stats(self) -> &'static WeaponStats {
        match self {
            WeaponKind::Pistol => &PISTOL,
            WeaponKind::Rifle => &RIFLE,
            WeaponKind::Shotgun => &SHOTGUN,
        }
    }

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            WeaponKind::Pistol => "pistol",
            WeaponKind::Rifle => "rifle",
            WeaponKind::Shotgun => "shotgun",
        }
    }
}

/// Wire name for an optional weapon slot ("" when unarmed).
pub fn slot_name(slot: Option<WeaponKind>) -> &'static str {
    slot.map(WeaponKind::as_str).unwrap_or("")
}

/// Rotations of every pellet in a spread, lowest angle first.
///
/// The fan starts at `rotation - spread / 2` and steps by
/// `spread / (pellets - 1)`, so the centre pellet follows the aim.
pub fn spread_rotations(rotation: f32, pellets: u32, spread: f32) -> Vec<f32> {
    if pellets <= 1 {
        return vec![rotation];
    }
    let start = rotation - spread / 2.0;
    let step = spread / (pellets - 1) as f32;
    (0..pellets).map(|i| start + step * i as f32).collect()
}
