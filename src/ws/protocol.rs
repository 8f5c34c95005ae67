//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::input::InputFrame;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Spawn a character in the world
    Join {
        #[serde(default)]
        display_name: Option<String>,
    },

    /// Player input for the current client tick
    Input {
        /// Strictly increasing per connection; older frames are dropped
        seq: u32,
        #[serde(default)]
        frame: InputFrame,
        /// Euler angles in degrees: (pitch, yaw, roll)
        #[serde(default)]
        view_angles: Vec3,
    },

    /// Put the character back on a spawn point
    Respawn,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave the world
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        user_id: Uuid,
        server_time: u64,
        tick_rate: u32,
    },

    /// A character was placed in the world
    Spawned {
        user_id: Uuid,
        display_name: String,
        origin: Vec3,
    },

    /// Player left the world
    PlayerLeft {
        user_id: Uuid,
        reason: String,
    },

    /// World state snapshot (sent at regular intervals)
    Snapshot {
        /// Server tick number
        tick: u64,
        players: Vec<CharacterSnapshot>,
        /// Events that occurred since last snapshot
        events: Vec<GameEvent>,
    },

    /// One-way damage notification for the owning client
    Damaged {
        user_id: Uuid,
        amount: f32,
        /// Whether the client should play the local view punch
        presentation_hint: bool,
    },

    /// One-way heal notification for the owning client
    Healed {
        user_id: Uuid,
        amount: f32,
    },

    /// Error message
    Error {
        user_id: Uuid,
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        user_id: Uuid,
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    /// The only connection that should receive this message, if targeted
    pub fn recipient(&self) -> Option<Uuid> {
        match self {
            ServerMsg::Damaged { user_id, .. }
            | ServerMsg::Healed { user_id, .. }
            | ServerMsg::Error { user_id, .. }
            | ServerMsg::Pong { user_id, .. } => Some(*user_id),
            ServerMsg::Welcome { .. }
            | ServerMsg::Spawned { .. }
            | ServerMsg::PlayerLeft { .. }
            | ServerMsg::Snapshot { .. } => None,
        }
    }

    /// Whether the connection of `user_id` should receive this message
    pub fn is_for(&self, user_id: Uuid) -> bool {
        self.recipient().map_or(true, |recipient| recipient == user_id)
    }
}

/// Replicated character state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSnapshot {
    pub user_id: Uuid,
    /// Collider centre
    pub origin: Vec3,
    pub velocity: Vec3,
    pub view_angles: Vec3,
    pub crouching: bool,
    pub grounded: bool,
    pub underwater: bool,
    pub camera_underwater: bool,
    pub health: f32,
    /// Last processed input sequence
    pub last_input_seq: u32,
}

/// Notable world events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// Hard landing
    FallDamage {
        user_id: Uuid,
        /// Vertical velocity change of the landing
        fall_speed: f32,
        damage: f32,
    },

    /// Character was moved by a trigger or station
    Teleported {
        user_id: Uuid,
        position: Vec3,
    },

    /// Use key pressed on an interactable
    Interacted {
        user_id: Uuid,
        entity: u64,
    },
}
