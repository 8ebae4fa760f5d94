//! Room Registry
//!
//! Creates rooms, routes joins to them and forgets them once their task
//! reports `Disposed`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::info;

use crate::game::state::SessionId;
use crate::game::tick::RoomConfig;
use crate::network::protocol::{
    ErrorCode, JoinRequest, JoinedInfo, Outbound, RoomListing, RoomMetadata, RoomOptions,
    ServerError,
};
use crate::network::room::{spawn_room, Room, RoomError, RoomHandle, RoomPhase};
use crate::ROOM_NAME;

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No room with that id.
    #[error("Room {0} not found")]
    RoomNotFound(String),

    /// Only one room type exists.
    #[error("Unknown room name {0}")]
    InvalidRoomName(String),

    /// A room with that id already exists.
    #[error("Room {0} already exists")]
    DuplicateRoomId(String),

    /// The room refused the join.
    #[error(transparent)]
    Room(#[from] RoomError),
}

impl RegistryError {
    /// Wire error for a lobby reply.
    pub fn to_server_error(&self) -> ServerError {
        let code = match self {
            RegistryError::RoomNotFound(_) => ErrorCode::RoomNotFound,
            RegistryError::InvalidRoomName(_) => ErrorCode::InvalidRoomName,
            RegistryError::DuplicateRoomId(_) => ErrorCode::InternalError,
            RegistryError::Room(RoomError::Full) => ErrorCode::RoomFull,
            RegistryError::Room(RoomError::Locked) => ErrorCode::RoomLocked,
            RegistryError::Room(RoomError::Closed) => ErrorCode::RoomNotFound,
            RegistryError::Room(RoomError::AlreadyJoined(_)) => ErrorCode::AlreadyInRoom,
        };
        ServerError::new(code, self.to_string())
    }
}

/// All live rooms.
pub struct RoomRegistry {
    /// Shared room configuration.
    config: Arc<RoomConfig>,
    /// Rooms by id.
    rooms: RwLock<BTreeMap<String, RoomHandle>>,
    /// Rooms created so far, for default names and unique ids.
    created: AtomicU64,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config: Arc::new(config),
            rooms: RwLock::new(BTreeMap::new()),
            created: AtomicU64::new(0),
        }
    }

    /// Create and start a room.
    pub async fn create_room(&self, options: RoomOptions) -> Result<RoomHandle, RegistryError> {
        let n = self.created.fetch_add(1, Ordering::Relaxed) + 1;
        let id = options
            .room_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let metadata = build_metadata(&options, n);

        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&id) {
            return Err(RegistryError::DuplicateRoomId(id));
        }

        let room = Room::new(id.clone(), metadata, self.config.clone());
        let handle = spawn_room(room);
        rooms.insert(id.clone(), handle.clone());

        info!("Created room {} ({})", id, handle.metadata.name);
        Ok(handle)
    }

    /// Join the first joinable room, creating one if none is.
    pub async fn join_or_create(
        &self,
        request: JoinRequest,
        session_id: SessionId,
        sender: mpsc::Sender<Outbound>,
    ) -> Result<(RoomHandle, JoinedInfo), RegistryError> {
        check_room_name(&request.room_name)?;

        let candidates: Vec<RoomHandle> = {
            let rooms = self.rooms.read().await;
            rooms.values().filter(|h| h.is_joinable()).cloned().collect()
        };
        for handle in candidates {
            // Lost a race for the last slot; try the next room
            if let Ok(info) = handle.join(session_id.clone(), sender.clone()).await {
                return Ok((handle, info));
            }
        }

        self.create_and_join(request, session_id, sender).await
    }

    /// Create a new room and join it.
    pub async fn create_and_join(
        &self,
        request: JoinRequest,
        session_id: SessionId,
        sender: mpsc::Sender<Outbound>,
    ) -> Result<(RoomHandle, JoinedInfo), RegistryError> {
        check_room_name(&request.room_name)?;
        let handle = self.create_room(request.options).await?;
        let info = handle.join(session_id, sender).await?;
        Ok((handle, info))
    }

    /// Join a room by id.
    pub async fn join_by_id(
        &self,
        room_id: &str,
        session_id: SessionId,
        sender: mpsc::Sender<Outbound>,
    ) -> Result<(RoomHandle, JoinedInfo), RegistryError> {
        let handle = self
            .get(room_id)
            .await
            .ok_or_else(|| RegistryError::RoomNotFound(room_id.to_string()))?;
        let info = handle.join(session_id, sender).await?;
        Ok((handle, info))
    }

    /// Get a room by id.
    pub async fn get(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Joinable rooms.
    pub async fn list_rooms(&self) -> Vec<RoomListing> {
        let rooms = self.rooms.read().await;
        rooms
            .values()
            .filter(|h| h.is_joinable())
            .map(RoomHandle::listing)
            .collect()
    }

    /// Live room count.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Drop disposed rooms. Returns how many were removed.
    pub async fn cleanup(&self) -> usize {
        let mut rooms = self.rooms.write().await;
        let before = rooms.len();
        rooms.retain(|_, h| h.status().phase != RoomPhase::Disposed);
        let removed = before - rooms.len();
        if removed > 0 {
            info!("Pruned {} disposed rooms", removed);
        }
        removed
    }
}

fn check_room_name(name: &str) -> Result<(), RegistryError> {
    if name == ROOM_NAME {
        Ok(())
    } else {
        Err(RegistryError::InvalidRoomName(name.to_string()))
    }
}

/// Metadata for the `n`th room, with creation overrides applied.
fn build_metadata(options: &RoomOptions, n: u64) -> RoomMetadata {
    let now = chrono::Utc::now();
    let mut extra = options.metadata.clone();

    let mut take = |key: &str| extra.remove(key).and_then(|v| v.as_str().map(str::to_string));
    let meta_name = take("name");
    let created_at = take("createdAt");
    let unique_id = take("uniqueId");
    extra.remove("gameType");

    RoomMetadata {
        name: options
            .name
            .clone()
            .or(meta_name)
            .unwrap_or_else(|| format!("Room {}", n)),
        created_at: created_at.unwrap_or_else(|| now.to_rfc3339()),
        game_type: ROOM_NAME.to_string(),
        unique_id: unique_id.unwrap_or_else(|| format!("{}-{}", now.timestamp_millis(), n)),
        extra,
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
