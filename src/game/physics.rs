//! Projectile flight physics
//!
//! `PhysicsSystem::step` is the single integration step used by both live
//! flight and trajectory preview. Anything that changes flight must change
//! here, or the preview stops matching what the player will see.

use glam::Vec2;

use crate::config::ProjectilePreset;

use super::gravity::GravityField;

/// Position/velocity pair advanced by one step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightState {
    pub position: Vec2,
    pub velocity: Vec2,
}

/// Physical constants of a projectile that the integrator reads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightParams {
    pub mass: f32,
    pub drag: f32,
    pub max_speed: f32,
    pub speed_approach_rate: f32,
}

impl From<&ProjectilePreset> for FlightParams {
    fn from(preset: &ProjectilePreset) -> Self {
        Self {
            mass: preset.mass,
            drag: preset.drag,
            max_speed: preset.max_speed,
            speed_approach_rate: preset.speed_approach_rate,
        }
    }
}

/// Physics system for advancing projectiles
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance one fixed slice: gravity, drag, speed cap, then position.
    pub fn step(
        state: FlightState,
        params: &FlightParams,
        field: &GravityField,
        dt: f32,
    ) -> FlightState {
        // Raw force divided back down so heavier projectiles fall the same
        let mass = params.mass.max(f32::EPSILON);
        let acceleration = field.pull(state.position, mass) / mass;

        let mut velocity = state.velocity + acceleration * dt;
        velocity *= (1.0 - params.drag * dt).max(0.0);

        // Over-speed decays toward the cap instead of snapping to it
        let speed = velocity.length();
        if speed > params.max_speed {
            let capped = velocity / speed * params.max_speed;
            velocity = velocity.lerp(capped, params.speed_approach_rate.clamp(0.0, 1.0));
        }

        FlightState {
            position: state.position + velocity * dt,
            velocity,
        }
    }

    /// Exit velocity of the launch routine.
    ///
    /// The routine halves its input speed; callers that want a given exit
    /// speed must pass twice that value.
    pub fn launch_velocity(direction: Vec2, input_speed: f32) -> Vec2 {
        direction.normalize_or_zero() * (input_speed * 0.5)
    }

    /// Unit vector for an angle in radians
    pub fn heading(angle: f32) -> Vec2 {
        Vec2::new(angle.cos(), angle.sin())
    }
}
