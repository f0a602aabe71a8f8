//! In-flight projectile lifecycle
//!
//! A projectile is `InFlight` until one of its terminal transitions fires,
//! then `Destroyed` for good. Every path that ends a projectile goes
//! through `Projectile::destroy`, which is one-way and idempotent.

use std::collections::VecDeque;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{PhysicsConfig, ProjectilePreset};

use super::avoidance::avoidance_delta;
use super::events::ResolveReason;
use super::gravity::GravityField;
use super::physics::{FlightParams, FlightState, PhysicsSystem};
use super::ship::PlayerSlot;

/// Maximum number of trail points kept for the owner's visual artifact
pub const TRAIL_LENGTH: usize = 64;

/// Projectile lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectileState {
    InFlight,
    Destroyed(ResolveReason),
}

/// What a single flight tick produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Flying,
    /// Fuel ran out; the caller runs the self-destruct blast
    FuelExhausted,
    LostInSpace,
    /// Already destroyed; nothing happened
    Inert,
}

/// What a manual detonation request turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detonation {
    Split,
    SelfDestruct,
    Ignored,
}

/// Shared read-only inputs for a flight tick
pub struct FlightContext<'a> {
    pub field: &'a GravityField,
    pub physics: &'a PhysicsConfig,
    /// Arena center used by the lost-in-space test
    pub center: Vec2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    pub id: Uuid,
    pub owner: PlayerSlot,
    pub position: Vec2,
    pub velocity: Vec2,
    #[serde(skip, default = "default_params")]
    pub params: FlightParams,
    pub fuel: f32,
    pub burn_rate: f32,
    pub payload: f32,
    pub damage_variation: f32,
    pub blast_radius: f32,
    pub self_destruct_factor: f32,
    pub push_strength: f32,
    pub contact_radius: f32,
    pub cluster: bool,
    pub cluster_damage_factor: f32,
    pub spread_degrees: f32,
    /// Predictive avoidance, from the owner's passive
    pub avoidance: bool,
    state: ProjectileState,
    age_ticks: u32,
    lost_ticks: Option<u32>,
    pub trail: VecDeque<Vec2>,
}

fn default_params() -> FlightParams {
    FlightParams::from(&ProjectilePreset::default())
}

impl Projectile {
    /// Input speed handed to the launch routine for a power in `0..=1`
    pub fn input_speed(power: f32, preset: &ProjectilePreset) -> f32 {
        power.clamp(0.0, 1.0) * preset.launch_power_scale
    }

    /// Launch routine: exit speed is half of `input_speed`.
    pub fn launch(
        owner: PlayerSlot,
        preset: &ProjectilePreset,
        origin: Vec2,
        direction: Vec2,
        input_speed: f32,
        avoidance: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            position: origin,
            velocity: PhysicsSystem::launch_velocity(direction, input_speed),
            params: FlightParams::from(preset),
            fuel: preset.fuel,
            burn_rate: preset.burn_rate,
            payload: preset.payload,
            damage_variation: preset.damage_variation,
            blast_radius: preset.blast_radius,
            self_destruct_factor: preset.self_destruct_factor,
            push_strength: preset.push_strength,
            contact_radius: preset.contact_radius,
            cluster: preset.cluster,
            cluster_damage_factor: preset.cluster_damage_factor,
            spread_degrees: preset.spread_degrees,
            avoidance,
            state: ProjectileState::InFlight,
            age_ticks: 0,
            lost_ticks: None,
            trail: VecDeque::from([origin]),
        }
    }

    pub fn state(&self) -> ProjectileState {
        self.state
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self.state, ProjectileState::Destroyed(_))
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    /// Ticks flown since launch
    pub fn age_ticks(&self) -> u32 {
        self.age_ticks
    }

    /// Consecutive ticks the lost-in-space condition has held, if it holds
    pub fn lost_ticks(&self) -> Option<u32> {
        self.lost_ticks
    }

    /// One fixed tick: fuel, integration, avoidance, lost-in-space.
    pub fn tick(&mut self, ctx: &FlightContext<'_>, dt: f32) -> TickOutcome {
        if self.is_destroyed() {
            return TickOutcome::Inert;
        }
        self.age_ticks += 1;

        self.fuel = (self.fuel - self.burn_rate * dt).max(0.0);
        if self.fuel <= 0.0 {
            return TickOutcome::FuelExhausted;
        }

        let next = PhysicsSystem::step(
            FlightState {
                position: self.position,
                velocity: self.velocity,
            },
            &self.params,
            ctx.field,
            dt,
        );
        self.position = next.position;
        self.velocity = next.velocity;

        if self.avoidance {
            self.velocity += avoidance_delta(
                self.position,
                self.velocity,
                ctx.field,
                ctx.physics.lookahead_time,
                ctx.physics.avoidance_buffer,
                ctx.physics.avoidance_strength,
                dt,
            );
        }

        self.record_trail();

        if self.is_adrift(ctx) {
            let held = self.lost_ticks.unwrap_or(0) + 1;
            self.lost_ticks = Some(held);
            let needed = (ctx.physics.lost_delay_secs / dt).round().max(1.0) as u32;
            if held >= needed {
                return TickOutcome::LostInSpace;
            }
        } else {
            self.lost_ticks = None;
        }

        TickOutcome::Flying
    }

    /// Weak pull, far from center, and not heading back.
    fn is_adrift(&self, ctx: &FlightContext<'_>) -> bool {
        let mass = self.params.mass.max(f32::EPSILON);
        let pull = ctx.field.pull(self.position, mass).length() / mass;
        let to_center = ctx.center - self.position;

        pull < ctx.physics.lost_pull_threshold
            && to_center.length() > ctx.physics.lost_distance_threshold
            && self.velocity.dot(to_center) <= 0.0
    }

    fn record_trail(&mut self) {
        if self.trail.len() >= TRAIL_LENGTH {
            self.trail.pop_front();
        }
        self.trail.push_back(self.position);
    }

    /// One-way transition to `Destroyed`. Returns false (and changes
    /// nothing) if the projectile was already destroyed.
    pub fn destroy(&mut self, reason: ResolveReason) -> bool {
        if let ProjectileState::Destroyed(previous) = self.state {
            warn!(
                projectile_id = %self.id,
                ?previous,
                ?reason,
                "Destroy ignored: projectile already destroyed"
            );
            return false;
        }
        debug!(projectile_id = %self.id, ?reason, "Projectile destroyed");
        self.state = ProjectileState::Destroyed(reason);
        true
    }

    /// Decide what a manual detonation does. Requires fuel.
    pub fn detonation(&self) -> Detonation {
        if self.is_destroyed() || self.fuel <= 0.0 {
            Detonation::Ignored
        } else if self.cluster {
            Detonation::Split
        } else {
            Detonation::SelfDestruct
        }
    }

    /// Split into three: this projectile plus two at `±spread_degrees`.
    ///
    /// Side projectiles go through the launch routine at twice the current
    /// speed so they exit at the parent's speed. All three lose `cluster`.
    pub fn split(&mut self) -> [Projectile; 2] {
        let speed = self.speed();
        let heading = self.velocity.try_normalize().unwrap_or(Vec2::X);
        let spread = self.spread_degrees.to_radians();

        self.cluster = false;
        self.payload *= self.cluster_damage_factor;

        let make_side = |angle: f32| {
            let direction = Vec2::from_angle(angle).rotate(heading);
            let mut side = self.clone();
            side.id = Uuid::new_v4();
            side.velocity = PhysicsSystem::launch_velocity(direction, speed * 2.0);
            side.lost_ticks = None;
            side.trail = VecDeque::from([self.position]);
            side
        };

        [make_side(spread), make_side(-spread)]
    }
}
