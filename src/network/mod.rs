//! Network Layer
//!
//! WebSocket server, lobby routing and per-room actors. All game rules
//! live in `game/`; this layer owns clocks, channels and the wire format.

pub mod protocol;
pub mod registry;
pub mod replication;
pub mod room;
pub mod server;

pub use protocol::{ClientMessage, Outbound, RoomMetadata, ServerMessage};
pub use registry::{RegistryError, RoomRegistry};
pub use replication::{FullState, StatePatch};
pub use room::{Room, RoomError, RoomHandle, RoomPhase};
pub use server::{GameServer, GameServerError, ServerConfig};
