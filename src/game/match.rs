//! Match state machine and fixed-rate tick loop
//!
//! `GameMatch` owns every piece of mutable match state and is the only
//! mutator. Phase changes go through `successor`, a pure function over
//! `(MatchPhase, Trigger)`; leaving a phase cancels every timer it owned.

use std::time::Duration;

use glam::Vec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{MatchConfig, PhysicsConfig, ProjectilePreset};
use crate::util::time::{secs_to_ticks, tick_delta, unix_millis, TICK_DURATION_MICROS};

use super::arena::Arena;
use super::combat::{CollisionResolver, Resolution};
use super::contact::{CircleContacts, ContactProbe};
use super::events::{
    CameraDirector, EventSink, GameEvent, LoggingCamera, ResolveReason, TurnOutcome,
};
use super::physics::PhysicsSystem;
use super::preview::{LaunchRequest, TrajectoryPreviewer};
use super::projectile::{Detonation, FlightContext, Projectile, TickOutcome};
use super::scheduler::{Scheduler, TaskId};
use super::ship::{PlayerSlot, Ship, ShipLoadout};
use super::{PlayerAction, PlayerInput};

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Waiting for the match to start
    Setup,
    /// Countdown before the active player's input unlocks
    Preparation,
    /// Active player may fire or move
    PlayerTurn,
    /// Waiting for every projectile of the volley to resolve
    MissileFlight,
    /// A ship was destroyed; pause before the next round
    RoundEnd,
    MatchOver,
}

/// Everything that can move the match between phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    StartMatch,
    PreparationElapsed,
    Fire,
    Move { ends_turn: bool },
    ExtendMove,
    Detonate,
    TurnTimerExpired,
    ProjectileResolved,
    /// Volley counter reached zero. `hold` while the camera lingers on a
    /// turn-ending impact.
    VolleyResolved { hold: bool },
    HoldElapsed,
    FlightTimeout,
    ShipDestroyed,
    RoundResetElapsed { match_won: bool },
    Acknowledge,
}

impl Trigger {
    /// Triggers that hand control to the other player
    pub fn ends_turn(self) -> bool {
        matches!(
            self,
            Trigger::Move { ends_turn: true }
                | Trigger::TurnTimerExpired
                | Trigger::VolleyResolved { hold: false }
                | Trigger::HoldElapsed
                | Trigger::FlightTimeout
        )
    }
}

/// Successor phase for `trigger` in `phase`. Exactly one successor per
/// valid pair; every other pair is rejected.
pub fn successor(phase: MatchPhase, trigger: Trigger) -> Result<MatchPhase, MatchError> {
    use MatchPhase as P;

    let next = match (phase, trigger) {
        (P::Setup, Trigger::StartMatch) => P::Preparation,

        (P::Preparation, Trigger::PreparationElapsed) => P::PlayerTurn,
        // Acting during the countdown cancels it
        (P::Preparation | P::PlayerTurn, Trigger::Fire) => P::MissileFlight,
        (P::Preparation | P::PlayerTurn, Trigger::Move { ends_turn: true }) => P::Preparation,
        (P::Preparation | P::PlayerTurn, Trigger::Move { ends_turn: false }) => P::PlayerTurn,
        (P::Preparation | P::PlayerTurn, Trigger::ExtendMove) => P::PlayerTurn,
        (P::PlayerTurn, Trigger::TurnTimerExpired) => P::Preparation,

        (P::MissileFlight, Trigger::Detonate | Trigger::ProjectileResolved) => P::MissileFlight,
        (P::MissileFlight, Trigger::VolleyResolved { hold: true }) => P::MissileFlight,
        (
            P::MissileFlight,
            Trigger::VolleyResolved { hold: false } | Trigger::HoldElapsed | Trigger::FlightTimeout,
        ) => P::Preparation,
        (P::MissileFlight, Trigger::ShipDestroyed) => P::RoundEnd,

        (P::RoundEnd, Trigger::RoundResetElapsed { match_won: false }) => P::Preparation,
        (P::RoundEnd, Trigger::RoundResetElapsed { match_won: true }) => P::MatchOver,

        (P::MatchOver, Trigger::Acknowledge) => P::Setup,

        _ => return Err(MatchError::InvalidTrigger { phase, trigger }),
    };
    Ok(next)
}

/// Rejected trigger or player action. The match keeps running.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MatchError {
    #[error("{trigger:?} is not valid during {phase:?}")]
    InvalidTrigger { phase: MatchPhase, trigger: Trigger },

    #[error("{0:?} is not the active player")]
    NotActivePlayer(PlayerSlot),

    #[error("{0:?} has no moves remaining this round")]
    NoMovesRemaining(PlayerSlot),

    #[error("{0:?} cannot extend a move")]
    ExtensionUnavailable(PlayerSlot),

    #[error("{0:?} has nothing to detonate")]
    NothingToDetonate(PlayerSlot),
}

/// Countdowns owned by the phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Preparation,
    Turn,
    Flight,
    /// Camera hold on a turn-ending impact
    Hold,
    RoundReset,
}

/// Host-side collaborators handed to the match at construction
pub struct Collaborators {
    pub sink: Box<dyn EventSink>,
    pub camera: Box<dyn CameraDirector>,
    pub contacts: Box<dyn ContactProbe>,
}

impl Collaborators {
    /// Logging camera and circle-overlap contacts around `sink`
    pub fn headless(sink: impl EventSink + 'static) -> Self {
        Self {
            sink: Box::new(sink),
            camera: Box::new(LoggingCamera),
            contacts: Box::new(CircleContacts),
        }
    }
}

/// Handle to a running match
#[derive(Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<PlayerInput>,
}

/// A projectile's end, captured before it is dropped from the flight list
struct Resolved {
    projectile_id: Uuid,
    owner: PlayerSlot,
    trail: Vec<Vec2>,
    resolution: Resolution,
}

impl Resolved {
    fn new(projectile: &Projectile, resolution: Resolution) -> Self {
        Self {
            projectile_id: projectile.id,
            owner: projectile.owner,
            trail: projectile.trail.iter().copied().collect(),
            resolution,
        }
    }
}

/// The authoritative duel
pub struct GameMatch {
    id: Uuid,
    seed: u64,
    config: MatchConfig,
    physics: PhysicsConfig,
    preset: ProjectilePreset,
    phase: MatchPhase,
    /// Bumped on every phase entry; fired timers from an older epoch are
    /// dropped
    epoch: u64,
    tick: u64,
    round: u32,
    scores: [u32; 2],
    active: PlayerSlot,
    ships: Vec<Ship>,
    arena: Arena,
    projectiles: Vec<Projectile>,
    /// Volley counter
    outstanding: u32,
    hold_pending: bool,
    round_loser: Option<PlayerSlot>,
    timers: Scheduler<TimerKind>,
    turn_timer: Option<TaskId>,
    rng: ChaCha8Rng,
    input_rx: mpsc::Receiver<PlayerInput>,
    collaborators: Collaborators,
    session_ended: bool,
}

impl GameMatch {
    /// Create a new match in `Setup`
    pub fn new(
        id: Uuid,
        seed: u64,
        config: MatchConfig,
        physics: PhysicsConfig,
        preset: ProjectilePreset,
        loadouts: [ShipLoadout; 2],
        collaborators: Collaborators,
    ) -> (Self, MatchHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let arena = Arena::generate(&physics, &mut rng);

        let ships = [PlayerSlot::One, PlayerSlot::Two]
            .into_iter()
            .map(|slot| {
                Ship::new(
                    slot,
                    arena.spawns[slot.index()],
                    &loadouts[slot.index()],
                    config.moves_per_round,
                )
            })
            .collect();

        let game_match = Self {
            id,
            seed,
            config,
            physics,
            preset,
            phase: MatchPhase::Setup,
            epoch: 0,
            tick: 0,
            round: 0,
            scores: [0, 0],
            active: PlayerSlot::One,
            ships,
            arena,
            projectiles: Vec::new(),
            outstanding: 0,
            hold_pending: false,
            round_loser: None,
            timers: Scheduler::new(),
            turn_timer: None,
            rng,
            input_rx,
            collaborators,
            session_ended: false,
        };

        (game_match, MatchHandle { id, input_tx })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn scores(&self) -> [u32; 2] {
        self.scores
    }

    pub fn active_player(&self) -> PlayerSlot {
        self.active
    }

    pub fn ships(&self) -> &[Ship] {
        &self.ships
    }

    pub fn ship(&self, slot: PlayerSlot) -> &Ship {
        &self.ships[slot.index()]
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Projectiles of the current volley not yet resolved
    pub fn outstanding(&self) -> u32 {
        self.outstanding
    }

    pub fn ticks_elapsed(&self) -> u64 {
        self.tick
    }

    /// Ticks left on the turn timer, while it runs
    pub fn turn_ticks_remaining(&self) -> Option<u64> {
        self.turn_timer.and_then(|id| self.timers.remaining(id))
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn is_session_ended(&self) -> bool {
        self.session_ended
    }

    /// Replace the arena before the match starts (host-authored layouts)
    pub fn set_arena(&mut self, arena: Arena) -> Result<(), MatchError> {
        if self.phase != MatchPhase::Setup {
            return Err(MatchError::InvalidTrigger {
                phase: self.phase,
                trigger: Trigger::StartMatch,
            });
        }
        for ship in &mut self.ships {
            ship.position = arena.spawns[ship.slot.index()];
        }
        self.arena = arena;
        Ok(())
    }

    /// Setup -> Preparation for round one
    pub fn start(&mut self) -> Result<(), MatchError> {
        successor(self.phase, Trigger::StartMatch)?;

        self.round = 1;
        self.scores = [0, 0];
        self.active = PlayerSlot::One;
        self.session_ended = false;
        let moves = self.config.moves_per_round;
        for ship in &mut self.ships {
            ship.reset_for_round(self.arena.spawns[ship.slot.index()], moves);
        }

        info!(match_id = %self.id, seed = self.seed, "Match started");
        self.emit(GameEvent::MatchStarted {
            match_id: self.id,
            seed: self.seed,
        });
        self.emit_arena_ready();
        self.transition(Trigger::StartMatch)
    }

    /// Run the fixed-rate loop until the session ends or every input
    /// sender is gone
    pub async fn run(mut self) {
        if self.phase == MatchPhase::Setup {
            if let Err(err) = self.start() {
                warn!(match_id = %self.id, error = %err, "Match failed to start");
                return;
            }
        }

        let mut tick_interval = interval(Duration::from_micros(TICK_DURATION_MICROS));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            let connected = self.process_inputs();
            if self.session_ended {
                info!(match_id = %self.id, "Session ended");
                break;
            }

            self.tick();

            if !connected {
                info!(match_id = %self.id, "All players left, ending match");
                break;
            }
        }
    }

    /// Drain queued inputs; false once every sender has been dropped
    fn process_inputs(&mut self) -> bool {
        loop {
            match self.input_rx.try_recv() {
                Ok(input) => {
                    // Rejections are logged and emitted by handle_input
                    let _ = self.handle_input(input);
                }
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Apply one player action
    pub fn handle_input(&mut self, input: PlayerInput) -> Result<(), MatchError> {
        let player = input.player;
        let result = match input.action {
            PlayerAction::Fire { angle, power } => self.fire(player, angle, power),
            PlayerAction::Move { displacement } => self.move_ship(player, displacement),
            PlayerAction::ExtendMove => self.extend_move(player),
            PlayerAction::Detonate => self.detonate(player),
            PlayerAction::Acknowledge => self.acknowledge(),
        };

        if let Err(err) = &result {
            warn!(
                match_id = %self.id,
                player = ?player,
                queued_ms = unix_millis().saturating_sub(input.received_at),
                error = %err,
                "Action rejected"
            );
            self.emit(GameEvent::ActionRejected {
                player,
                reason: err.to_string(),
            });
        }
        result
    }

    /// Preview polyline for a prospective shot by `player`
    pub fn preview(&self, player: PlayerSlot, angle: f32, power: f32) -> Vec<Vec2> {
        let ship = self.ship(player);
        TrajectoryPreviewer::preview(
            LaunchRequest {
                origin: ship.position,
                angle,
                power,
            },
            &self.preset,
            &self.arena.field,
            &self.physics,
            ship.passives.precision_preview,
            tick_delta(),
        )
    }

    /// Launch a volley of the equipped preset
    pub fn fire(&mut self, player: PlayerSlot, angle: f32, power: f32) -> Result<(), MatchError> {
        successor(self.phase, Trigger::Fire)?;
        self.ensure_active(player)?;

        let ship = &self.ships[player.index()];
        let origin = ship.position;
        let avoidance = ship.passives.collision_avoidance;
        let count = self.preset.volley.max(1);
        let input_speed = Projectile::input_speed(power, &self.preset);
        let fan = self.preset.volley_spread_degrees.to_radians();

        let mut fired = Vec::with_capacity(count as usize);
        for i in 0..count {
            let offset = (i as f32 - (count - 1) as f32 / 2.0) * fan;
            let projectile = Projectile::launch(
                player,
                &self.preset,
                origin,
                PhysicsSystem::heading(angle + offset),
                input_speed,
                avoidance,
            );
            fired.push(GameEvent::ProjectileFired {
                projectile_id: projectile.id,
                owner: player,
                position: projectile.position,
                velocity: projectile.velocity,
            });
            self.projectiles.push(projectile);
        }
        self.outstanding = count;
        self.hold_pending = false;

        info!(match_id = %self.id, player = ?player, volley = count, angle, power, "Volley fired");
        for event in fired {
            self.emit(event);
        }
        if let Some(first) = self.projectiles.first() {
            let id = first.id;
            self.collaborators.camera.follow(id);
        }

        self.transition(Trigger::Fire)
    }

    /// Move the active ship by `displacement` (clamped to the move range)
    pub fn move_ship(&mut self, player: PlayerSlot, displacement: Vec2) -> Result<(), MatchError> {
        self.ensure_active(player)?;
        let ends_turn = !self.ships[player.index()].skip_end_turn;
        let trigger = Trigger::Move { ends_turn };
        successor(self.phase, trigger)?;

        let ship = &mut self.ships[player.index()];
        if ship.moves_remaining == 0 {
            return Err(MatchError::NoMovesRemaining(player));
        }

        let from = ship.position;
        ship.position += displacement.clamp_length_max(self.config.max_move_distance);
        ship.moves_remaining -= 1;
        ship.skip_end_turn = false;
        let event = GameEvent::ShipMoved {
            ship: player,
            from,
            to: ship.position,
            moves_remaining: ship.moves_remaining,
        };

        debug!(match_id = %self.id, player = ?player, ends_turn, "Ship moved");
        self.emit(event);

        if ends_turn {
            self.end_turn(trigger, TurnOutcome::Moved)
        } else {
            self.transition(trigger)
        }
    }

    /// Arm move extension so the next move keeps the turn
    pub fn extend_move(&mut self, player: PlayerSlot) -> Result<(), MatchError> {
        successor(self.phase, Trigger::ExtendMove)?;
        self.ensure_active(player)?;

        if !self.ships[player.index()].arm_move_extension() {
            return Err(MatchError::ExtensionUnavailable(player));
        }
        info!(match_id = %self.id, player = ?player, "Move extension armed");
        self.transition(Trigger::ExtendMove)
    }

    /// Manual detonation of every projectile `player` has in flight
    pub fn detonate(&mut self, player: PlayerSlot) -> Result<(), MatchError> {
        successor(self.phase, Trigger::Detonate)?;
        self.ensure_active(player)?;

        let mut resolved = Vec::new();
        let mut spawned = Vec::new();
        let mut splits = Vec::new();

        for projectile in self.projectiles.iter_mut() {
            if projectile.owner != player {
                continue;
            }
            match projectile.detonation() {
                Detonation::Split => {
                    let children = projectile.split();
                    splits.push(GameEvent::ProjectileSplit {
                        parent_id: projectile.id,
                        children: [children[0].id, children[1].id],
                    });
                    spawned.extend(children);
                }
                Detonation::SelfDestruct => {
                    let resolution =
                        CollisionResolver::new(&mut self.ships, &self.physics, &mut self.rng)
                            .self_destruct(projectile, ResolveReason::Detonated);
                    resolved.push(Resolved::new(projectile, resolution));
                }
                Detonation::Ignored => {}
            }
        }

        if splits.is_empty() && resolved.is_empty() {
            return Err(MatchError::NothingToDetonate(player));
        }

        self.outstanding += spawned.len() as u32;
        self.projectiles.extend(spawned);
        for event in splits {
            self.emit(event);
        }

        self.transition(Trigger::Detonate)?;
        self.settle(resolved);
        Ok(())
    }

    /// MatchOver -> Setup; ends the session
    pub fn acknowledge(&mut self) -> Result<(), MatchError> {
        successor(self.phase, Trigger::Acknowledge)?;

        self.scores = [0, 0];
        self.round = 0;
        self.session_ended = true;
        info!(match_id = %self.id, "Match acknowledged");
        self.emit(GameEvent::SessionEnded);
        self.transition(Trigger::Acknowledge)
    }

    /// Advance the match by one fixed tick
    pub fn tick(&mut self) {
        self.tick += 1;
        let dt = tick_delta();

        let epoch = self.epoch;
        for (_, kind) in self.timers.advance() {
            if self.epoch != epoch {
                debug!(match_id = %self.id, ?kind, "Timer dropped: owning phase already exited");
                continue;
            }
            let result = self.on_timer(kind);
            self.log_failure(result);
        }

        for ship in &mut self.ships {
            ship.tick_motion(dt, self.physics.knockback_damping);
            ship.tick_overtime(dt);
        }

        if self.phase == MatchPhase::MissileFlight {
            self.step_projectiles(dt);
        }
    }

    fn on_timer(&mut self, kind: TimerKind) -> Result<(), MatchError> {
        match kind {
            TimerKind::Preparation => self.transition(Trigger::PreparationElapsed),
            TimerKind::Turn => {
                info!(match_id = %self.id, player = ?self.active, "Turn timer expired");
                self.end_turn(Trigger::TurnTimerExpired, TurnOutcome::TimeExpired)
            }
            TimerKind::Flight => self.flight_timeout(),
            TimerKind::Hold => self.end_turn(Trigger::HoldElapsed, TurnOutcome::VolleyResolved),
            TimerKind::RoundReset => self.reset_round(),
        }
    }

    fn step_projectiles(&mut self, dt: f32) {
        let ctx = FlightContext {
            field: &self.arena.field,
            physics: &self.physics,
            center: Vec2::ZERO,
        };

        let mut resolved = Vec::new();
        for projectile in self.projectiles.iter_mut() {
            let resolution = match projectile.tick(&ctx, dt) {
                TickOutcome::Flying => {
                    let contact = self.collaborators.contacts.probe(
                        projectile,
                        &self.ships,
                        &self.arena.field,
                    );
                    match contact {
                        Some(contact) => {
                            CollisionResolver::new(&mut self.ships, &self.physics, &mut self.rng)
                                .resolve_contact(projectile, contact)
                        }
                        None => continue,
                    }
                }
                TickOutcome::FuelExhausted => {
                    CollisionResolver::new(&mut self.ships, &self.physics, &mut self.rng)
                        .self_destruct(projectile, ResolveReason::FuelExhausted)
                }
                TickOutcome::LostInSpace => {
                    CollisionResolver::new(&mut self.ships, &self.physics, &mut self.rng)
                        .retire(projectile, ResolveReason::LostInSpace)
                }
                TickOutcome::Inert => continue,
            };
            resolved.push(Resolved::new(projectile, resolution));
        }

        if !resolved.is_empty() {
            self.settle(resolved);
        }
    }

    /// Publish resolutions, then end the round or the volley if due
    fn settle(&mut self, resolved: Vec<Resolved>) {
        let mut destroyed = None;
        for item in resolved {
            if let Some(slot) = self.publish(item) {
                destroyed.get_or_insert(slot);
            }
        }
        self.projectiles.retain(|p| !p.is_destroyed());

        if let Some(loser) = destroyed {
            self.finish_round(loser);
            return;
        }
        if self.outstanding > 0 || self.phase != MatchPhase::MissileFlight {
            return;
        }

        let result = if self.hold_pending {
            self.timers.cancel_kind(TimerKind::Flight);
            self.timers.schedule(
                TimerKind::Hold,
                secs_to_ticks(self.config.destruction_delay_secs),
            );
            self.transition(Trigger::VolleyResolved { hold: true })
        } else {
            self.end_turn(
                Trigger::VolleyResolved { hold: false },
                TurnOutcome::VolleyResolved,
            )
        };
        self.log_failure(result);
    }

    /// Emit one resolution and count it against the volley. Returns the
    /// first ship it destroyed.
    fn publish(&mut self, item: Resolved) -> Option<PlayerSlot> {
        let Resolved {
            projectile_id,
            owner,
            trail,
            resolution,
        } = item;
        if !resolution.resolved {
            return None;
        }

        for event in resolution.events {
            self.emit(event);
        }
        self.emit(GameEvent::ProjectileResolved {
            projectile_id,
            owner,
            reason: resolution.reason,
            position: resolution.point,
            target: resolution.target,
        });
        self.emit(GameEvent::TrailReleased {
            owner,
            points: trail,
        });

        self.outstanding = self.outstanding.saturating_sub(1);
        if resolution.reason.is_turn_ending() {
            self.hold_pending = true;
            self.collaborators
                .camera
                .hold(resolution.point, self.config.destruction_delay_secs);
        }
        debug!(
            match_id = %self.id,
            projectile_id = %projectile_id,
            reason = ?resolution.reason,
            outstanding = self.outstanding,
            "Projectile resolved"
        );
        let result = self.transition(Trigger::ProjectileResolved);
        self.log_failure(result);

        resolution.destroyed_ships.first().copied()
    }

    fn flight_timeout(&mut self) -> Result<(), MatchError> {
        successor(self.phase, Trigger::FlightTimeout)?;
        info!(match_id = %self.id, in_flight = self.projectiles.len(), "Flight timed out");

        let mut retired = Vec::new();
        let mut resolver = CollisionResolver::new(&mut self.ships, &self.physics, &mut self.rng);
        for projectile in self.projectiles.iter_mut() {
            let resolution = resolver.retire(projectile, ResolveReason::FlightTimeout);
            retired.push(Resolved::new(projectile, resolution));
        }
        for item in retired {
            self.publish(item);
        }

        self.end_turn(Trigger::FlightTimeout, TurnOutcome::FlightTimedOut)
    }

    /// Hand control to the other player. Over-time effects stop on the
    /// ending player and start on the opponent.
    fn end_turn(&mut self, trigger: Trigger, outcome: TurnOutcome) -> Result<(), MatchError> {
        successor(self.phase, trigger)?;

        let ending = self.active;
        self.ships[ending.index()].overtime_active = false;
        self.ships[ending.other().index()].overtime_active = true;
        self.projectiles.clear();
        self.outstanding = 0;
        self.hold_pending = false;

        info!(match_id = %self.id, player = ?ending, ?outcome, "Turn ended");
        self.emit(GameEvent::TurnEnded {
            player: ending,
            outcome,
        });
        self.active = ending.other();
        self.transition(trigger)
    }

    fn finish_round(&mut self, loser: PlayerSlot) {
        let winner = loser.other();
        self.scores[winner.index()] += 1;
        self.round_loser = Some(loser);

        for discarded in self.projectiles.drain(..) {
            debug!(projectile_id = %discarded.id, "Projectile discarded at round end");
        }
        self.outstanding = 0;
        self.hold_pending = false;
        for ship in &mut self.ships {
            ship.overtime_active = false;
        }

        info!(
            match_id = %self.id,
            round = self.round,
            winner = ?winner,
            scores = ?self.scores,
            "Round ended"
        );
        self.emit(GameEvent::RoundEnded {
            round: self.round,
            winner,
            scores: self.scores,
        });
        let result = self.transition(Trigger::ShipDestroyed);
        self.log_failure(result);
    }

    fn reset_round(&mut self) -> Result<(), MatchError> {
        let loser = match self.round_loser.take() {
            Some(loser) => loser,
            None => {
                warn!(match_id = %self.id, "Round reset without a recorded loser");
                self.active
            }
        };
        let winner = loser.other();

        if self.scores[winner.index()] >= self.config.rounds_to_win {
            successor(self.phase, Trigger::RoundResetElapsed { match_won: true })?;
            info!(match_id = %self.id, winner = ?winner, scores = ?self.scores, "Match over");
            self.emit(GameEvent::MatchOver {
                winner,
                scores: self.scores,
                ended_at: unix_millis(),
            });
            return self.transition(Trigger::RoundResetElapsed { match_won: true });
        }

        successor(self.phase, Trigger::RoundResetElapsed { match_won: false })?;
        self.round += 1;
        self.active = loser;
        self.arena = Arena::generate(&self.physics, &mut self.rng);
        let moves = self.config.moves_per_round;
        for ship in &mut self.ships {
            ship.reset_for_round(self.arena.spawns[ship.slot.index()], moves);
        }
        self.emit_arena_ready();
        self.transition(Trigger::RoundResetElapsed { match_won: false })
    }

    /// Apply `trigger`. Entering a phase (or restarting one for the next
    /// player) cancels every pending timer and schedules the new phase's.
    fn transition(&mut self, trigger: Trigger) -> Result<(), MatchError> {
        let next = successor(self.phase, trigger)?;
        if next == self.phase && !trigger.ends_turn() {
            return Ok(());
        }

        self.timers.cancel_all();
        self.turn_timer = None;
        self.epoch += 1;

        debug!(match_id = %self.id, from = ?self.phase, to = ?next, ?trigger, "Phase transition");
        self.phase = next;
        self.enter_phase();
        Ok(())
    }

    fn enter_phase(&mut self) {
        match self.phase {
            MatchPhase::Preparation => {
                let seconds = self.config.preparation_secs;
                self.timers
                    .schedule(TimerKind::Preparation, secs_to_ticks(seconds));
                self.emit(GameEvent::PreparationStarted {
                    player: self.active,
                    seconds,
                });
            }
            MatchPhase::PlayerTurn => {
                let seconds = self.config.turn_secs;
                self.turn_timer = Some(self.timers.schedule(TimerKind::Turn, secs_to_ticks(seconds)));
                self.emit(GameEvent::TurnStarted {
                    player: self.active,
                    seconds,
                });
            }
            MatchPhase::MissileFlight => {
                self.timers.schedule(
                    TimerKind::Flight,
                    secs_to_ticks(self.config.flight_timeout_secs),
                );
            }
            MatchPhase::RoundEnd => {
                self.timers
                    .schedule(TimerKind::RoundReset, secs_to_ticks(self.config.round_end_secs));
            }
            MatchPhase::Setup | MatchPhase::MatchOver => {}
        }
    }

    fn ensure_active(&self, player: PlayerSlot) -> Result<(), MatchError> {
        if player == self.active {
            Ok(())
        } else {
            Err(MatchError::NotActivePlayer(player))
        }
    }

    fn emit_arena_ready(&mut self) {
        let event = GameEvent::ArenaReady {
            round: self.round,
            bodies: self.arena.field.bodies().len(),
            spawns: self.arena.spawns,
        };
        self.emit(event);
    }

    fn emit(&mut self, event: GameEvent) {
        self.collaborators.sink.emit(event);
    }

    fn log_failure(&self, result: Result<(), MatchError>) {
        if let Err(err) = result {
            warn!(match_id = %self.id, phase = ?self.phase, error = %err, "Trigger rejected");
        }
    }
}
