//! Trajectory preview
//!
//! A standalone forward simulation from a candidate launch. It never reads
//! live projectile state; it only shares the launch routine and
//! `PhysicsSystem::step` with real flight.

use glam::Vec2;

use crate::config::{PhysicsConfig, ProjectilePreset};

use super::gravity::GravityField;
use super::physics::{FlightParams, FlightState, PhysicsSystem};
use super::projectile::Projectile;

/// Aim and power for a prospective shot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaunchRequest {
    pub origin: Vec2,
    /// Radians
    pub angle: f32,
    /// `0..=1`
    pub power: f32,
}

pub struct TrajectoryPreviewer;

impl TrajectoryPreviewer {
    /// Number of steps for a preview
    pub fn step_count(physics: &PhysicsConfig, precision: bool) -> usize {
        if precision {
            physics.preview_steps
        } else {
            physics.preview_steps / 2
        }
    }

    /// Polyline starting at the launch point, one point per step. Stops
    /// early if the path enters a body.
    pub fn preview(
        request: LaunchRequest,
        preset: &ProjectilePreset,
        field: &GravityField,
        physics: &PhysicsConfig,
        precision: bool,
        dt: f32,
    ) -> Vec<Vec2> {
        let steps = Self::step_count(physics, precision);
        let params = FlightParams::from(preset);
        let mut state = FlightState {
            position: request.origin,
            velocity: PhysicsSystem::launch_velocity(
                PhysicsSystem::heading(request.angle),
                Projectile::input_speed(request.power, preset),
            ),
        };

        let mut points = Vec::with_capacity(steps + 1);
        points.push(state.position);
        for _ in 0..steps {
            state = PhysicsSystem::step(state, &params, field, dt);
            points.push(state.position);
            if field.body_at(state.position, preset.contact_radius).is_some() {
                break;
            }
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::gravity::Body;
    use crate::game::projectile::{FlightContext, TickOutcome};
    use crate::game::ship::PlayerSlot;

    fn field() -> GravityField {
        GravityField::new(
            2.0,
            vec![
                Body::new(Vec2::new(10.0, 25.0), 600.0, 4.0),
                Body::new(Vec2::new(-15.0, -20.0), 300.0, 3.0),
            ],
        )
    }

    #[test]
    fn preview_matches_live_flight() {
        let preset = ProjectilePreset {
            fuel: 1000.0,
            ..ProjectilePreset::default()
        };
        let physics = PhysicsConfig::default();
        let field = field();
        let dt = 0.02;
        let request = LaunchRequest {
            origin: Vec2::new(-30.0, 0.0),
            angle: 0.3,
            power: 0.7,
        };

        let path = TrajectoryPreviewer::preview(request, &preset, &field, &physics, true, dt);
        assert_eq!(path[0], request.origin);

        let mut live = Projectile::launch(
            PlayerSlot::One,
            &preset,
            request.origin,
            PhysicsSystem::heading(request.angle),
            Projectile::input_speed(request.power, &preset),
            false,
        );
        let ctx = FlightContext {
            field: &field,
            physics: &physics,
            center: Vec2::ZERO,
        };
        for expected in &path[1..] {
            assert_eq!(live.tick(&ctx, dt), TickOutcome::Flying);
            assert!((live.position - *expected).length() < 1e-4);
        }
    }

    #[test]
    fn imprecise_preview_is_half_length() {
        let physics = PhysicsConfig::default();
        let request = LaunchRequest {
            origin: Vec2::ZERO,
            angle: 0.0,
            power: 0.5,
        };
        let preset = ProjectilePreset::default();
        let empty = GravityField::default();
        let full = TrajectoryPreviewer::preview(request, &preset, &empty, &physics, true, 0.02);
        let half = TrajectoryPreviewer::preview(request, &preset, &empty, &physics, false, 0.02);
        assert_eq!(full.len(), physics.preview_steps + 1);
        assert_eq!(half.len(), physics.preview_steps / 2 + 1);
    }

    #[test]
    fn preview_stops_at_body() {
        let physics = PhysicsConfig::default();
        let field = GravityField::new(1.0, vec![Body::new(Vec2::new(10.0, 0.0), 0.0, 2.0)]);
        let request = LaunchRequest {
            origin: Vec2::ZERO,
            angle: 0.0,
            power: 1.0,
        };
        let path = TrajectoryPreviewer::preview(
            request,
            &ProjectilePreset::default(),
            &field,
            &physics,
            true,
            0.02,
        );
        assert!(path.len() < physics.preview_steps + 1);
        assert!(path.last().unwrap().x >= 7.5);
    }
}
