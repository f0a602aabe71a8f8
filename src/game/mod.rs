//! Game simulation modules

pub mod arena;
pub mod avoidance;
pub mod combat;
pub mod contact;
pub mod events;
pub mod gravity;
pub mod r#match;
pub mod physics;
pub mod preview;
pub mod projectile;
pub mod scheduler;
pub mod ship;

pub use events::{BroadcastSink, CameraDirector, EventSink, GameEvent, RecordingSink};
pub use r#match::{Collaborators, GameMatch, MatchError, MatchHandle, MatchPhase, Trigger};
pub use ship::{PlayerSlot, ShipLoadout};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::util::time::unix_millis;

/// Player input received from the input collaborator
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub player: PlayerSlot,
    pub action: PlayerAction,
    pub received_at: u64,
}

impl PlayerInput {
    pub fn new(player: PlayerSlot, action: PlayerAction) -> Self {
        Self {
            player,
            action,
            received_at: unix_millis(),
        }
    }
}

/// Already-validated player intents
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlayerAction {
    /// `angle` in radians, `power` in `0..=1`
    Fire { angle: f32, power: f32 },
    Move { displacement: Vec2 },
    ExtendMove,
    Detonate,
    Acknowledge,
}
