//! Massive bodies and the gravity field they produce

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// A stationary planet. Immutable once placed; replaced on round reset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub position: Vec2,
    pub mass: f32,
    pub radius: f32,
}

impl Body {
    pub fn new(position: Vec2, mass: f32, radius: f32) -> Self {
        Self {
            position,
            mass,
            radius,
        }
    }

    /// Whether a circle of `radius` at `point` overlaps this body
    pub fn overlaps(&self, point: Vec2, radius: f32) -> bool {
        let reach = self.radius + radius;
        point.distance_squared(self.position) <= reach * reach
    }
}

/// The set of bodies in the arena plus the gravitational constant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GravityField {
    g: f32,
    bodies: Vec<Body>,
}

impl GravityField {
    pub fn new(g: f32, bodies: Vec<Body>) -> Self {
        Self { g, bodies }
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// Net gravitational force on `test_mass` at `point`.
    ///
    /// Sums `G * M * m / d²` toward every body center. A body exactly at
    /// `point` contributes nothing.
    pub fn pull(&self, point: Vec2, test_mass: f32) -> Vec2 {
        self.bodies.iter().fold(Vec2::ZERO, |acc, body| {
            let offset = body.position - point;
            let distance_sq = offset.length_squared();
            if distance_sq <= f32::EPSILON {
                return acc;
            }
            let magnitude = self.g * body.mass * test_mass / distance_sq;
            acc + offset / distance_sq.sqrt() * magnitude
        })
    }

    /// Index of the first body overlapping a circle at `point`
    pub fn body_at(&self, point: Vec2, radius: f32) -> Option<usize> {
        self.bodies.iter().position(|b| b.overlaps(point, radius))
    }
}
