//! Scripted pilot for headless matches
//!
//! Listens to match events and answers each of its turns with a shot at
//! the opponent (with some aim error) or, now and then, a short move.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use orbital_duel::game::{GameEvent, PlayerSlot};
use orbital_duel::game::{PlayerAction, PlayerInput};

const MOVE_CHANCE: f64 = 0.15;
const MOVE_DISTANCE: f32 = 4.0;
const AIM_ERROR: f32 = 0.35;

pub struct ScriptedPilot {
    slot: PlayerSlot,
    rng: ChaCha8Rng,
    input_tx: mpsc::Sender<PlayerInput>,
    positions: [Vec2; 2],
    /// The last action sent was a move
    moved_last: bool,
}

impl ScriptedPilot {
    pub fn new(slot: PlayerSlot, seed: u64, input_tx: mpsc::Sender<PlayerInput>) -> Self {
        Self {
            slot,
            rng: ChaCha8Rng::seed_from_u64(seed),
            input_tx,
            positions: [Vec2::ZERO; 2],
            moved_last: false,
        }
    }

    pub async fn run(mut self, mut events: broadcast::Receiver<GameEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if !self.on_event(event).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(pilot = ?self.slot, skipped, "Pilot fell behind on events");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!(pilot = ?self.slot, "Pilot stopped");
    }

    /// Returns false once the session is over
    async fn on_event(&mut self, event: GameEvent) -> bool {
        match event {
            GameEvent::ArenaReady { spawns, .. } => self.positions = spawns,
            GameEvent::ShipMoved { ship, to, .. } => self.positions[ship.index()] = to,
            GameEvent::TurnStarted { player, .. } if player == self.slot => {
                let action = self.choose_action();
                self.send(action).await;
            }
            // Out of moves: shoot instead
            GameEvent::ActionRejected { player, .. } if player == self.slot && self.moved_last => {
                let action = self.aim();
                self.send(action).await;
            }
            GameEvent::MatchOver { .. } if self.slot == PlayerSlot::One => {
                self.send(PlayerAction::Acknowledge).await;
            }
            GameEvent::SessionEnded => return false,
            _ => {}
        }
        true
    }

    fn choose_action(&mut self) -> PlayerAction {
        if self.rng.gen_bool(MOVE_CHANCE) {
            let heading = Vec2::from_angle(self.rng.gen_range(0.0..std::f32::consts::TAU));
            self.moved_last = true;
            return PlayerAction::Move {
                displacement: heading * MOVE_DISTANCE,
            };
        }
        self.aim()
    }

    fn aim(&mut self) -> PlayerAction {
        self.moved_last = false;
        let to_target =
            self.positions[self.slot.other().index()] - self.positions[self.slot.index()];
        PlayerAction::Fire {
            angle: to_target.y.atan2(to_target.x) + self.rng.gen_range(-AIM_ERROR..AIM_ERROR),
            power: self.rng.gen_range(0.55..1.0),
        }
    }

    async fn send(&self, action: PlayerAction) {
        if self
            .input_tx
            .send(PlayerInput::new(self.slot, action))
            .await
            .is_err()
        {
            debug!(pilot = ?self.slot, "Match closed; input dropped");
        }
    }
}
