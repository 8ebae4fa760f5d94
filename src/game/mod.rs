//! Game Logic Module
//!
//! Room simulation, independent of the network. Every function takes the
//! room time explicitly so the whole layer runs without a clock.
//!
//! ## Module Structure
//!
//! - `weapon`: Weapon kinds and the balance table
//! - `state`: Room, player, bullet and pickup state
//! - `events`: Events produced by the simulation
//! - `timers`: Deferred burst rounds and reload completions
//! - `input`: Player actions
//! - `placement`: Spawn and weapon position search
//! - `combat`: Pickup, shoot, reload, drop
//! - `ballistics`: Bullet travel and hits
//! - `zone`: Safe zone countdown and damage
//! - `armory`: Weapon pool upkeep
//! - `tick`: Authoritative simulation loop

pub mod armory;
pub mod ballistics;
pub mod combat;
pub mod events;
pub mod input;
pub mod placement;
pub mod state;
pub mod tick;
pub mod timers;
pub mod weapon;
pub mod zone;

// Re-export key types
pub use events::{GameEvent, GameEventData};
pub use input::{apply_action, PlayerAction};
pub use state::{RoomState, SessionId};
pub use tick::{RoomConfig, TickResult};
pub use weapon::WeaponKind;
