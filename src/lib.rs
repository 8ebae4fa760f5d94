//! # Battle Royale Room Server
//!
//! Authoritative server rooms for a real-time multiplayer battle royale.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  BATTLE ROYALE SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Primitives                               │
//! │  ├── vec2.rs      - 2D float vector                          │
//! │  ├── geometry.rs  - Segment and circle tests                 │
//! │  └── rng.rs       - Per-room Xorshift128+ PRNG               │
//! │                                                              │
//! │  game/            - Room simulation (no clocks, no I/O)      │
//! │  ├── state.rs     - Players, bullets, pickups, zone          │
//! │  ├── weapon.rs    - Balance table                            │
//! │  ├── combat.rs    - Pickup, shoot, reload, drop              │
//! │  ├── ballistics.rs- Bullet travel and hits                   │
//! │  ├── zone.rs      - Safe zone shrink and damage              │
//! │  ├── placement.rs - Spawn and weapon positions               │
//! │  ├── armory.rs    - Weapon pool upkeep                       │
//! │  └── tick.rs      - Authoritative simulation loop            │
//! │                                                              │
//! │  network/         - Networking                               │
//! │  ├── server.rs    - WebSocket server                         │
//! │  ├── protocol.rs  - Message types                            │
//! │  ├── registry.rs  - Room creation and lookup                 │
//! │  ├── room.rs      - Per-room actor                           │
//! │  └── replication.rs - State snapshots and patches            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! Each room is owned by a single task. Ticks, zone steps and player
//! messages for a room are handled one at a time on that task, so room
//! state needs no locks. Rooms share nothing with each other.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::rng::RoomRng;
pub use core::vec2::Vec2;
pub use game::state::{RoomState, SessionId};
pub use game::tick::RoomConfig;
pub use network::{GameServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;

/// The only room type
pub const ROOM_NAME: &str = "battle_royale";
