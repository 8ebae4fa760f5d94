//! Game Events
//!
//! Discrete events produced by the simulation. The network layer turns
//! each one into a broadcast; continuous state goes through replication.

use serde::{Serialize, Deserialize};
use crate::core::vec2::Vec2;
use crate::game::state::SessionId;
use crate::game::weapon::WeaponKind;

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Player's loaded ammo changed.
    AmmoChanged {
        player_id: SessionId,
        ammo: u32,
    },

    /// Player's spare magazine count changed.
    MagazinesChanged {
        player_id: SessionId,
        magazine_count: u32,
    },

    /// Player equipped a weapon or became unarmed.
    WeaponChanged {
        player_id: SessionId,
        weapon: Option<WeaponKind>,
    },

    /// Reload started; completes after `reload_ms`.
    ReloadStarted {
        player_id: SessionId,
        reload_ms: u64,
    },

    /// Reload finished and the magazine was swapped in.
    ReloadFinished {
        player_id: SessionId,
    },

    /// Reload refused.
    ReloadFailed {
        player_id: SessionId,
        reason: String,
    },

    /// Player died.
    PlayerEliminated {
        player_id: SessionId,
        players_left: usize,
    },

    /// One survivor remains.
    GameOver {
        winner_id: SessionId,
    },

    /// Safe zone shrank.
    ZoneShrunk {
        center: Vec2,
        radius: f32,
        next_shrink_time: u32,
    },

    /// Shrink countdown advanced.
    ZoneCountdown {
        next_shrink_time: u32,
    },
}

/// A game event stamped with the tick it happened on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u64,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u64, data: GameEventData) -> Self {
        Self { tick, data }
    }

    /// Create ammo changed event.
    pub fn ammo(tick: u64, player_id: &str, ammo: u32) -> Self {
        Self::new(tick, GameEventData::AmmoChanged {
            player_id: player_id.to_string(),
            ammo,
        })
    }

    /// Create magazine count changed event.
    pub fn magazines(tick: u64, player_id: &str, magazine_count: u32) -> Self {
        Self::new(tick, GameEventData::MagazinesChanged {
            player_id: player_id.to_string(),
            magazine_count,
        })
    }

    /// Create weapon changed event.
    pub fn weapon(tick: u64, player_id: &str, weapon: Option<WeaponKind>) -> Self {
        Self::new(tick, GameEventData::WeaponChanged {
            player_id: player_id.to_string(),
            weapon,
        })
    }

    /// Create player eliminated event.
    pub fn player_eliminated(tick: u64, player_id: &str, players_left: usize) -> Self {
        Self::new(tick, GameEventData::PlayerEliminated {
            player_id: player_id.to_string(),
            players_left,
        })
    }
}
