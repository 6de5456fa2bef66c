//! Steering rules. Each rule turns a neighbourhood into a bounded
//! acceleration with the same idiom: work out a desired velocity at full
//! speed, subtract the current velocity, clamp to the maximum force.

use glam::Vec2;

use crate::{
    flock::finder::BoidView,
    math_helpers::{distance, VecExt},
};

/// Raw, unweighted output of the three flocking rules for one agent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawForces {
    pub alignment: Vec2,
    pub cohesion: Vec2,
    pub separation: Vec2,
}

impl RawForces {
    pub fn calculate(
        me: &BoidView,
        neighbours: &[BoidView],
        separation_radius: f32,
        min_distance: f32,
        max_speed: f32,
        max_force: f32,
    ) -> Self {
        RawForces {
            alignment: alignment(me, neighbours, max_speed, max_force),
            cohesion: cohesion(me, neighbours, max_speed, max_force),
            separation: separation(
                me,
                neighbours,
                separation_radius,
                min_distance,
                max_speed,
                max_force,
            ),
        }
    }
}

/// Desired velocity minus current velocity, clamped
pub fn steer(desired: Vec2, velocity: Vec2, max_speed: f32, max_force: f32) -> Vec2 {
    (desired.with_length(max_speed) - velocity).limit(max_force)
}

/// Steer towards the average heading of the neighbours
pub fn alignment(me: &BoidView, neighbours: &[BoidView], max_speed: f32, max_force: f32) -> Vec2 {
    if neighbours.is_empty() {
        return Vec2::ZERO;
    }

    let avg = neighbours.iter().fold(Vec2::ZERO, |acc, b| acc + b.velocity) / neighbours.len() as f32;

    steer(avg, me.velocity, max_speed, max_force)
}

/// Steer towards the centroid of the neighbours
pub fn cohesion(me: &BoidView, neighbours: &[BoidView], max_speed: f32, max_force: f32) -> Vec2 {
    if neighbours.is_empty() {
        return Vec2::ZERO;
    }

    let center = neighbours.iter().fold(Vec2::ZERO, |acc, b| acc + b.position) / neighbours.len() as f32;

    steer(center - me.position, me.velocity, max_speed, max_force)
}

/// Steer away from neighbours closer than `separation_radius`, each one
/// weighted by `1/d²`. The distance is floored at `min_distance` so two agents
/// sharing a position cannot blow the force up.
pub fn separation(
    me: &BoidView,
    neighbours: &[BoidView],
    separation_radius: f32,
    min_distance: f32,
    max_speed: f32,
    max_force: f32,
) -> Vec2 {
    let mut sum = Vec2::ZERO;
    let mut count = 0;

    for other in neighbours {
        let d = distance(me.position, other.position);
        if d < separation_radius {
            let d = d.max(min_distance);
            sum += (me.position - other.position) / (d * d);
            count += 1;
        }
    }

    if count > 0 {
        steer(sum / count as f32, me.velocity, max_speed, max_force)
    } else {
        Vec2::ZERO
    }
}

/// Direct steering towards an escape heading, it bypasses composition and
/// uses a wider force cap than the flocking rules.
pub fn escape(velocity: Vec2, heading: f32, target_speed: f32, max_force: f32) -> Vec2 {
    (Vec2::from_angle(heading, target_speed) - velocity).limit(max_force)
}

/// Random directional impulse for a scatter, magnitude drawn by the caller
pub fn scatter_force(impulse: Vec2, max_force: f32, intensity: f32) -> Vec2 {
    impulse.limit(max_force) * intensity
}
