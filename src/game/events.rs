//! Events emitted by the match and the collaborator seams that consume them

use std::sync::Arc;

use glam::Vec2;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::ship::{PartTag, PlayerSlot};

/// Why a projectile stopped flying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveReason {
    Collision,
    Detonated,
    FuelExhausted,
    LostInSpace,
    FlightTimeout,
}

impl ResolveReason {
    /// Turn-ending resolutions hold the camera on the impact point
    pub fn is_turn_ending(self) -> bool {
        matches!(self, Self::Collision | Self::Detonated)
    }
}

/// How a turn finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Every projectile of the volley resolved
    VolleyResolved,
    Moved,
    /// The turn timer ran out with no action taken
    TimeExpired,
    FlightTimedOut,
}

/// What the struck object was
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImpactTarget {
    Ship { ship: PlayerSlot, part: PartTag },
    Body { index: usize },
    Unknown,
}

/// Game events (fire, damage, destruction, phase changes)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    MatchStarted {
        match_id: Uuid,
        seed: u64,
    },

    /// Arena regenerated for a round
    ArenaReady {
        round: u32,
        bodies: usize,
        spawns: [Vec2; 2],
    },

    PreparationStarted {
        player: PlayerSlot,
        seconds: f32,
    },

    TurnStarted {
        player: PlayerSlot,
        seconds: f32,
    },

    TurnEnded {
        player: PlayerSlot,
        outcome: TurnOutcome,
    },

    ProjectileFired {
        projectile_id: Uuid,
        owner: PlayerSlot,
        position: Vec2,
        velocity: Vec2,
    },

    ProjectileSplit {
        parent_id: Uuid,
        children: [Uuid; 2],
    },

    /// Single termination event for every reason a projectile can end
    ProjectileResolved {
        projectile_id: Uuid,
        owner: PlayerSlot,
        reason: ResolveReason,
        position: Vec2,
        target: ImpactTarget,
    },

    /// Flight trail handed to the owner ship's visuals
    TrailReleased {
        owner: PlayerSlot,
        points: Vec<Vec2>,
    },

    Damage {
        attacker: PlayerSlot,
        target: PlayerSlot,
        amount: f32,
        part: Option<PartTag>,
        critical: bool,
        position: Vec2,
    },

    LastChance {
        ship: PlayerSlot,
    },

    Lifesteal {
        ship: PlayerSlot,
        amount: f32,
    },

    PartDetached {
        ship: PlayerSlot,
        part_index: usize,
        tag: PartTag,
    },

    ShipMoved {
        ship: PlayerSlot,
        from: Vec2,
        to: Vec2,
        moves_remaining: u32,
    },

    ShipDestroyed {
        ship: PlayerSlot,
    },

    RoundEnded {
        round: u32,
        winner: PlayerSlot,
        scores: [u32; 2],
    },

    MatchOver {
        winner: PlayerSlot,
        scores: [u32; 2],
        ended_at: u64,
    },

    SessionEnded,

    ActionRejected {
        player: PlayerSlot,
        reason: String,
    },
}

/// Consumer of game events (visuals, audio, HUD, persistence, network)
pub trait EventSink: Send {
    fn emit(&mut self, event: GameEvent);
}

/// Fans events out over a tokio broadcast channel
pub struct BroadcastSink {
    tx: broadcast::Sender<GameEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<GameEvent>) {
        let (tx, rx) = broadcast::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&mut self, event: GameEvent) {
        // No subscribers is fine; the match does not depend on listeners
        let _ = self.tx.send(event);
    }
}

/// Keeps every event in order; clones share one log. Used by tests and
/// replays.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<GameEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<GameEvent> {
        self.events.lock().clone()
    }

    /// Remove and return everything recorded so far
    pub fn drain(&self) -> Vec<GameEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: GameEvent) {
        self.events.lock().push(event);
    }
}

/// Camera framing requests; framing itself lives in the host
pub trait CameraDirector: Send {
    fn follow(&mut self, projectile_id: Uuid);
    /// Stop following and hold on `point` for `duration_secs`
    fn hold(&mut self, point: Vec2, duration_secs: f32);
}

/// Camera that only logs requests (headless runs)
#[derive(Debug, Default)]
pub struct LoggingCamera;

impl CameraDirector for LoggingCamera {
    fn follow(&mut self, projectile_id: Uuid) {
        debug!(projectile_id = %projectile_id, "Camera follow");
    }

    fn hold(&mut self, point: Vec2, duration_secs: f32) {
        debug!(x = point.x, y = point.y, duration_secs, "Camera hold");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_sink_delivers_to_subscribers() {
        let (mut sink, mut rx) = BroadcastSink::new(8);
        sink.emit(GameEvent::ShipDestroyed {
            ship: PlayerSlot::Two,
        });

        let event = tokio_test::block_on(rx.recv()).unwrap();
        assert_eq!(
            event,
            GameEvent::ShipDestroyed {
                ship: PlayerSlot::Two
            }
        );
    }

    #[test]
    fn broadcast_sink_without_subscribers_does_not_fail() {
        let (mut sink, rx) = BroadcastSink::new(8);
        drop(rx);
        sink.emit(GameEvent::SessionEnded);
    }

    #[test]
    fn recording_sink_clones_share_one_log() {
        let recorder = RecordingSink::new();
        let mut sink = recorder.clone();
        sink.emit(GameEvent::SessionEnded);
        assert_eq!(recorder.events(), vec![GameEvent::SessionEnded]);
        assert_eq!(recorder.drain().len(), 1);
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(GameEvent::ProjectileResolved {
            projectile_id: Uuid::nil(),
            owner: PlayerSlot::One,
            reason: ResolveReason::LostInSpace,
            position: Vec2::new(1.0, 2.0),
            target: ImpactTarget::Unknown,
        })
        .unwrap();
        assert_eq!(json["event_type"], "projectile_resolved");
        assert_eq!(json["reason"], "lost_in_space");
        assert_eq!(json["target"]["kind"], "unknown");
    }

    #[test]
    fn only_collision_and_detonation_end_the_turn_on_impact() {
        assert!(ResolveReason::Collision.is_turn_ending());
        assert!(ResolveReason::Detonated.is_turn_ending());
        assert!(!ResolveReason::FuelExhausted.is_turn_ending());
        assert!(!ResolveReason::LostInSpace.is_turn_ending());
        assert!(!ResolveReason::FlightTimeout.is_turn_ending());
    }
}
