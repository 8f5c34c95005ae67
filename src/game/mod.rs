//! Character simulation modules

pub mod authority;
pub mod character;
pub mod environment;
pub mod events;
pub mod geometry;
pub mod impact;
pub mod input;
pub mod integrator;
pub mod interaction;
pub mod kinematic;
pub mod level;
pub mod movement_config;
pub mod pipeline;
pub mod snapshot;
pub mod vitality;
pub mod world;

pub use character::{Character, CharacterBuilder, SetupError};
pub use level::{Level, LevelError};
pub use movement_config::{CharacterFeatures, MovementConfig};
pub use world::{World, WorldHandle, WorldSettings};

use crate::ws::protocol::ClientMsg;
use uuid::Uuid;

/// Player input received from WebSocket
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub user_id: Uuid,
    pub msg: ClientMsg,
    pub received_at: u64,
}
