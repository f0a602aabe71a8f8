//! Seeded arena generation
//!
//! A round's arena is a set of bodies plus one spawn point per ship. The
//! same seed always produces the same layout.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::PhysicsConfig;

use super::gravity::{Body, GravityField};

pub const MIN_BODIES: usize = 2;
pub const MAX_BODIES: usize = 5;

const BODY_MASS_RANGE: (f32, f32) = (150.0, 600.0);
const BODY_RADIUS_RANGE: (f32, f32) = (2.5, 6.0);
/// Bodies stay inside this fraction of the arena radius
const BODY_SPREAD: f32 = 0.55;
/// Ships spawn at this fraction of the arena radius
const SPAWN_DISTANCE: f32 = 0.8;
/// Clear space kept between a body's surface and anything else
const CLEARANCE: f32 = 4.0;
const PLACEMENT_ATTEMPTS: usize = 32;

/// Layout of one round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arena {
    pub field: GravityField,
    /// Spawn point per player slot index
    pub spawns: [Vec2; 2],
}

impl Arena {
    /// Bodies and spawns for a new round
    pub fn generate<R: Rng>(physics: &PhysicsConfig, rng: &mut R) -> Self {
        let axis = Vec2::from_angle(rng.gen_range(0.0..std::f32::consts::TAU));
        let spawn_radius = physics.arena_radius * SPAWN_DISTANCE;
        let spawns = [-axis * spawn_radius, axis * spawn_radius];

        let wanted = rng.gen_range(MIN_BODIES..=MAX_BODIES);
        let mut bodies: Vec<Body> = Vec::with_capacity(wanted);
        let spread = physics.arena_radius * BODY_SPREAD;

        for _ in 0..wanted {
            for _ in 0..PLACEMENT_ATTEMPTS {
                let radius = rng.gen_range(BODY_RADIUS_RANGE.0..BODY_RADIUS_RANGE.1);
                let position = random_in_disc(rng, spread);
                if !Self::is_clear(&bodies, &spawns, position, radius) {
                    continue;
                }
                let mass = rng.gen_range(BODY_MASS_RANGE.0..BODY_MASS_RANGE.1);
                bodies.push(Body::new(position, mass, radius));
                break;
            }
        }

        // Dense layouts can starve placement; fall back to a fixed pair
        // on the axis perpendicular to the ships.
        if bodies.len() < MIN_BODIES {
            let normal = axis.perp() * spread * 0.5;
            bodies = vec![
                Body::new(normal, BODY_MASS_RANGE.1, BODY_RADIUS_RANGE.0),
                Body::new(-normal, BODY_MASS_RANGE.1, BODY_RADIUS_RANGE.0),
            ];
        }

        debug!(bodies = bodies.len(), "Arena generated");
        Self {
            field: GravityField::new(physics.gravitational_constant, bodies),
            spawns,
        }
    }

    fn is_clear(bodies: &[Body], spawns: &[Vec2; 2], position: Vec2, radius: f32) -> bool {
        let clear_of_bodies = bodies
            .iter()
            .all(|b| b.position.distance(position) > b.radius + radius + CLEARANCE);
        let clear_of_spawns = spawns
            .iter()
            .all(|s| s.distance(position) > radius + CLEARANCE * 2.0);
        clear_of_bodies && clear_of_spawns
    }
}

fn random_in_disc<R: Rng>(rng: &mut R, radius: f32) -> Vec2 {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let distance = radius * rng.gen::<f32>().sqrt();
    Vec2::from_angle(angle) * distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn same_seed_same_layout() {
        let physics = PhysicsConfig::default();
        let a = Arena::generate(&physics, &mut ChaCha8Rng::seed_from_u64(7));
        let b = Arena::generate(&physics, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a.spawns, b.spawns);
        assert_eq!(a.field.bodies(), b.field.bodies());
    }

    #[test]
    fn layouts_are_well_formed() {
        let physics = PhysicsConfig::default();
        for seed in 0..64 {
            let arena = Arena::generate(&physics, &mut ChaCha8Rng::seed_from_u64(seed));
            let bodies = arena.field.bodies();
            assert!((MIN_BODIES..=MAX_BODIES).contains(&bodies.len()));

            for spawn in arena.spawns {
                assert!((spawn.length() - physics.arena_radius * SPAWN_DISTANCE).abs() < 1e-3);
                assert!(bodies.iter().all(|b| !b.overlaps(spawn, CLEARANCE)));
            }
            for (i, a) in bodies.iter().enumerate() {
                for b in &bodies[i + 1..] {
                    assert!(a.position.distance(b.position) > a.radius + b.radius);
                }
            }
        }
    }

    #[test]
    fn ships_face_each_other_across_center() {
        let physics = PhysicsConfig::default();
        let arena = Arena::generate(&physics, &mut ChaCha8Rng::seed_from_u64(3));
        assert!((arena.spawns[0] + arena.spawns[1]).length() < 1e-3);
    }
}
