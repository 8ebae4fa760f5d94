//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is a JSON text frame, internally tagged by `"type"`,
//! with camelCase field names.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::game::events::{GameEvent, GameEventData};
use crate::game::input::PlayerAction;
use crate::game::weapon::slot_name;
use crate::network::replication::{FullState, StatePatch};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Join the first open room with this name, or create one.
    JoinOrCreate(JoinRequest),

    /// Always create a new room.
    Create(JoinRequest),

    /// Join a specific room.
    JoinById { room_id: String },

    /// List joinable rooms.
    ListRooms,

    /// Leave the current room.
    Leave,

    /// Set position, optionally with rotation.
    Move {
        x: f32,
        y: f32,
        #[serde(default)]
        rotation: Option<f32>,
    },

    /// Set aim.
    Rotate { rotation: f32 },

    /// Fire the held weapon.
    Shoot { rotation: f32 },

    /// Pick up a weapon from the ground.
    PickupWeapon { weapon_id: String },

    /// Reload the held weapon.
    Reload,

    /// Discard the held weapon.
    DropWeapon,

    /// Report an obstacle circle.
    ReportCollider { x: f32, y: f32, radius: f32 },

    /// Report a bullet that hit scenery client-side.
    RemoveBullet { bullet_id: String },
}

/// Room join/create request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    /// Room type name.
    pub room_name: String,
    /// Creation options (ignored when joining an existing room).
    #[serde(default)]
    pub options: RoomOptions,
}

/// Room creation options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomOptions {
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Explicit room id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    /// Metadata overrides and extra fields.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ClientMessage {
    /// Convert an in-room message to a player action.
    ///
    /// Lobby messages return `None`.
    pub fn into_action(self) -> Option<PlayerAction> {
        let action = match self {
            ClientMessage::Move { x, y, rotation } => PlayerAction::Move { x, y, rotation },
            ClientMessage::Rotate { rotation } => PlayerAction::Rotate { rotation },
            ClientMessage::Shoot { rotation } => PlayerAction::Shoot { rotation },
            ClientMessage::PickupWeapon { weapon_id } => PlayerAction::PickupWeapon { weapon_id },
            ClientMessage::Reload => PlayerAction::Reload,
            ClientMessage::DropWeapon => PlayerAction::DropWeapon,
            ClientMessage::ReportCollider { x, y, radius } => {
                PlayerAction::ReportCollider { x, y, radius }
            }
            ClientMessage::RemoveBullet { bullet_id } => PlayerAction::RemoveBullet { bullet_id },
            ClientMessage::JoinOrCreate(_)
            | ClientMessage::Create(_)
            | ClientMessage::JoinById { .. }
            | ClientMessage::ListRooms
            | ClientMessage::Leave => return None,
        };
        Some(action)
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Joined a room.
    Joined(JoinedInfo),

    /// Joinable rooms.
    Rooms { rooms: Vec<RoomListing> },

    /// Lobby failure.
    Error(ServerError),

    /// Full room state.
    State(FullState),

    /// Changes since the last replicated state.
    StatePatch(StatePatch),

    /// Ammo in the current magazine.
    AmmoUpdate { player_id: String, ammo: u32 },

    /// Spare magazines.
    MagazineUpdate { player_id: String, magazine_count: u32 },

    /// Held weapon; empty string when unarmed.
    WeaponUpdate { player_id: String, weapon: String },

    /// Reload began; `reload_time` in milliseconds.
    ReloadStart { player_id: String, reload_time: u64 },

    /// Reload completed.
    ReloadEnd { player_id: String },

    /// Reload refused.
    ReloadFail { player_id: String, message: String },

    /// A player died.
    PlayerEliminated { player_id: String, players_left: usize },

    /// One player left standing.
    GameOver { winner_id: String },

    /// Zone geometry, sent directly on join.
    ZoneShrink(ZoneInfo),

    /// Zone geometry after a shrink.
    ZoneUpdate(ZoneInfo),

    /// Seconds until the next shrink.
    ZoneTimer { next_shrink_time: u32 },

    /// Clients should reload; the room is closing.
    ForceRefresh,
}

/// Join confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedInfo {
    /// Room joined.
    pub room_id: String,
    /// Session id assigned to this connection.
    pub session_id: String,
    /// Room metadata.
    pub metadata: RoomMetadata,
}

/// Room metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMetadata {
    /// Display name.
    pub name: String,
    /// ISO-8601 creation time.
    pub created_at: String,
    /// Always `battle_royale`.
    pub game_type: String,
    /// Creation-unique id.
    pub unique_id: String,
    /// Any additional fields supplied at creation.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of a room listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListing {
    /// Room id.
    pub room_id: String,
    /// Display name.
    pub name: String,
    /// Connected clients.
    pub clients: usize,
    /// Capacity.
    pub max_clients: usize,
    /// Room metadata.
    pub metadata: RoomMetadata,
}

/// Zone geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneInfo {
    /// Centre X.
    pub x: f32,
    /// Centre Y.
    pub y: f32,
    /// Radius.
    pub radius: f32,
    /// Seconds until the next shrink.
    pub next_shrink_time: u32,
}

/// Server error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    /// Build an error message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No room with that id.
    RoomNotFound,
    /// Unknown room type name.
    InvalidRoomName,
    /// Room at capacity.
    RoomFull,
    /// Room no longer accepts players.
    RoomLocked,
    /// Connection already in a room.
    AlreadyInRoom,
    /// Connection is not in a room.
    NotInRoom,
    /// Internal error.
    InternalError,
}

// =============================================================================
// OUTBOUND QUEUE
// =============================================================================

/// Item queued for one connection's writer task.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Send a message.
    Message(ServerMessage),
    /// Send a Normal close frame and stop.
    Close,
}

impl From<ServerMessage> for Outbound {
    fn from(message: ServerMessage) -> Self {
        Outbound::Message(message)
    }
}

// =============================================================================
// EVENT MAPPING
// =============================================================================

/// Wire message for a simulation event.
pub fn event_to_message(event: &GameEvent) -> ServerMessage {
    match &event.data {
        GameEventData::AmmoChanged { player_id, ammo } => ServerMessage::AmmoUpdate {
            player_id: player_id.clone(),
            ammo: *ammo,
        },
        GameEventData::MagazinesChanged { player_id, magazine_count } => {
            ServerMessage::MagazineUpdate {
                player_id: player_id.clone(),
                magazine_count: *magazine_count,
            }
        }
        GameEventData::WeaponChanged { player_id, weapon } => ServerMessage::WeaponUpdate {
            player_id: player_id.clone(),
            weapon: slot_name(*weapon).to_string(),
        },
        GameEventData::ReloadStarted { player_id, reload_ms } => ServerMessage::ReloadStart {
            player_id: player_id.clone(),
            reload_time: *reload_ms,
        },
        GameEventData::ReloadFinished { player_id } => ServerMessage::ReloadEnd {
            player_id: player_id.clone(),
        },
        GameEventData::ReloadFailed { player_id, reason } => ServerMessage::ReloadFail {
            player_id: player_id.clone(),
            message: reason.clone(),
        },
        GameEventData::PlayerEliminated { player_id, players_left } => {
            ServerMessage::PlayerEliminated {
                player_id: player_id.clone(),
                players_left: *players_left,
            }
        }
        GameEventData::GameOver { winner_id } => ServerMessage::GameOver {
            winner_id: winner_id.clone(),
        },
        GameEventData::ZoneShrunk { center, radius, next_shrink_time } => {
            ServerMessage::ZoneUpdate(ZoneInfo {
                x: center.x,
                y: center.y,
                radius: *radius,
                next_shrink_time: *next_shrink_time,
            })
        }
        GameEventData::ZoneCountdown { next_shrink_time } => ServerMessage::ZoneTimer {
            next_shrink_time: *next_shrink_time,
        },
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
