//! Predictive collision avoidance
//!
//! The only avoidance strategy: project the current velocity forward, find
//! the body hit soonest inside the lookahead horizon, and push sideways
//! away from it. Enabled per ship by the `collision_avoidance` passive.

use glam::Vec2;

use super::gravity::{Body, GravityField};

/// Threat found by the lookahead query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threat {
    pub body_index: usize,
    /// Seconds until the straight-line path enters the buffered body
    pub time_to_collision: f32,
}

/// Smallest positive root of `|p + v·t − c|² = r²`, if any.
pub fn time_to_collision(position: Vec2, velocity: Vec2, center: Vec2, radius: f32) -> Option<f32> {
    let a = velocity.length_squared();
    if a <= f32::EPSILON {
        return None;
    }
    let offset = position - center;
    let b = 2.0 * offset.dot(velocity);
    let c = offset.length_squared() - radius * radius;

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let t1 = (-b - root) / (2.0 * a);
    let t2 = (-b + root) / (2.0 * a);

    [t1, t2].into_iter().filter(|t| *t > 0.0).reduce(f32::min)
}

/// Body with the smallest time-to-collision within `lookahead` seconds.
///
/// Only bodies inside the lookahead sphere (`|v| * lookahead` plus their
/// buffered radius) are considered.
pub fn nearest_threat(
    position: Vec2,
    velocity: Vec2,
    field: &GravityField,
    lookahead: f32,
    buffer: f32,
) -> Option<Threat> {
    let reach = velocity.length() * lookahead;
    field
        .bodies()
        .iter()
        .enumerate()
        .filter(|(_, body)| body.position.distance(position) <= reach + body.radius + buffer)
        .filter_map(|(index, body)| {
            time_to_collision(position, velocity, body.position, body.radius + buffer)
                .filter(|t| *t <= lookahead)
                .map(|t| Threat {
                    body_index: index,
                    time_to_collision: t,
                })
        })
        .min_by(|a, b| a.time_to_collision.total_cmp(&b.time_to_collision))
}

/// Lateral acceleration steering away from `body`, scaled by the ramp
/// `1 − ttc / lookahead`. Always perpendicular to `velocity`.
pub fn steering(
    position: Vec2,
    velocity: Vec2,
    body: &Body,
    threat: Threat,
    lookahead: f32,
    strength: f32,
) -> Vec2 {
    let Some(forward) = velocity.try_normalize() else {
        return Vec2::ZERO;
    };
    let ramp = (1.0 - threat.time_to_collision / lookahead).clamp(0.0, 1.0);

    let mut lateral = forward.perp();
    // Point the lateral away from the side the body sits on
    if lateral.dot(body.position - position) > 0.0 {
        lateral = -lateral;
    }
    lateral * strength * ramp
}

/// Full avoidance pass for one tick: the velocity change to apply.
pub fn avoidance_delta(
    position: Vec2,
    velocity: Vec2,
    field: &GravityField,
    lookahead: f32,
    buffer: f32,
    strength: f32,
    dt: f32,
) -> Vec2 {
    match nearest_threat(position, velocity, field, lookahead, buffer) {
        Some(threat) => {
            let body = &field.bodies()[threat.body_index];
            steering(position, velocity, body, threat, lookahead, strength) * dt
        }
        None => Vec2::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_on_time_to_collision() {
        let t = time_to_collision(Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(50.0, 0.0), 5.0);
        assert!((t.unwrap() - 4.5).abs() < 1e-5);
    }

    #[test]
    fn miss_has_no_root() {
        let t = time_to_collision(Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(50.0, 20.0), 5.0);
        assert_eq!(t, None);
    }

    #[test]
    fn body_behind_is_not_a_threat() {
        let t = time_to_collision(Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(-50.0, 0.0), 5.0);
        assert_eq!(t, None);
    }

    #[test]
    fn picks_soonest_body_in_horizon() {
        let field = GravityField::new(
            1.0,
            vec![
                Body::new(Vec2::new(30.0, 0.5), 10.0, 3.0),
                Body::new(Vec2::new(15.0, -0.5), 10.0, 3.0),
                Body::new(Vec2::new(500.0, 0.0), 10.0, 3.0),
            ],
        );
        let threat = nearest_threat(Vec2::ZERO, Vec2::new(20.0, 0.0), &field, 2.0, 1.0).unwrap();
        assert_eq!(threat.body_index, 1);
    }

    #[test]
    fn beyond_horizon_is_ignored() {
        let field = GravityField::new(1.0, vec![Body::new(Vec2::new(100.0, 0.0), 10.0, 3.0)]);
        assert!(nearest_threat(Vec2::ZERO, Vec2::new(10.0, 0.0), &field, 1.0, 1.0).is_none());
    }

    #[test]
    fn steering_is_lateral_and_away_from_body() {
        let body = Body::new(Vec2::new(10.0, 1.0), 10.0, 3.0);
        let velocity = Vec2::new(10.0, 0.0);
        let threat = Threat {
            body_index: 0,
            time_to_collision: 0.5,
        };
        let push = steering(Vec2::ZERO, velocity, &body, threat, 2.0, 20.0);
        assert!(push.dot(velocity).abs() < 1e-4);
        assert!(push.y < 0.0);
        assert!((push.length() - 15.0).abs() < 1e-4);
    }
}
