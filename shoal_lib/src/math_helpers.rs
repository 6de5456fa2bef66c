use std::f32::consts::{PI, TAU};

use glam::Vec2;

use crate::options::SpaceBounds;

/// Vector operations the steering code leans on that glam (at the version
/// we pin) does not provide directly.
pub trait VecExt {
    /// Angle of the vector in radians, in (-π, π].
    fn heading(&self) -> f32;
    /// Same direction, length `mag`. A zero vector stays zero.
    fn with_length(&self, mag: f32) -> Self;
    /// Caps the length at `max`; shorter vectors are returned untouched.
    fn limit(&self, max: f32) -> Self;
    /// Vector of length `mag` pointing along `angle`.
    fn from_angle(angle: f32, mag: f32) -> Self;
}

impl VecExt for Vec2 {
    #[inline]
    fn heading(&self) -> f32 {
        self.y.atan2(self.x)
    }

    #[inline]
    fn with_length(&self, mag: f32) -> Self {
        let len = self.length();
        if len > f32::EPSILON {
            *self * (mag / len)
        } else {
            Vec2::ZERO
        }
    }

    #[inline]
    fn limit(&self, max: f32) -> Self {
        self.clamp_length_max(max.max(0.))
    }

    #[inline]
    fn from_angle(angle: f32, mag: f32) -> Self {
        Vec2::new(angle.cos() * mag, angle.sin() * mag)
    }
}

/// Normalizes an angle difference into (-π, π]
pub fn wrap_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.;
    }
    let mut a = angle.rem_euclid(TAU);
    if a > PI {
        a -= TAU;
    }
    a
}

pub fn distance_sq(p1: Vec2, p2: Vec2) -> f32 {
    (p1.x - p2.x).powi(2) + (p1.y - p2.y).powi(2)
}

pub fn distance(p1: Vec2, p2: Vec2) -> f32 {
    distance_sq(p1, p2).sqrt()
}

/// Wraps a single coordinate into `[0, size)`, preserving the overshoot:
/// `size + 1` becomes `1`, `-1` becomes `size - 1`.
#[inline]
pub fn wrap_component(x: f32, size: f32) -> f32 {
    if size <= 0. || !x.is_finite() {
        return 0.;
    }
    if x >= 0. && x < size {
        return x;
    }
    let wrapped = x.rem_euclid(size);
    // a tiny negative overshoot rounds up to `size` itself
    if wrapped >= size {
        0.
    } else {
        wrapped
    }
}

/// Toroidal wrap of a position into the space bounds
pub fn wrap_position(position: Vec2, bounds: &SpaceBounds) -> Vec2 {
    Vec2::new(
        wrap_component(position.x, bounds.width),
        wrap_component(position.y, bounds.height),
    )
}

/// Linear interpolation between two scalars
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
