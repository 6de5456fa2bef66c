//! Turns the raw rule outputs into one acceleration: temporal smoothing,
//! dead zone, crowding-aware reweighting, user weights, scatter blend and the
//! overcrowding escape check, in that order.

use std::time::Duration;

use glam::Vec2;

use crate::{
    behaviour::EscapeReason,
    boid::Boid,
    forces::{scatter_force, RawForces},
    options::{FlockParams, ForceWeights, Modulation, PhysicsConfig},
    random::RandomSource,
};

/// Everything a frame reads but never writes.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub params: &'a FlockParams,
    pub modulation: Modulation,
    pub config: &'a PhysicsConfig,
    pub now: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Composition {
    pub acceleration: Vec2,
    /// final weights the smoothed forces were multiplied by
    pub weights: ForceWeights,
    /// summed magnitude of the weighted flocking forces
    pub total_force: f32,
    pub scatter_intensity: f32,
    pub escape_triggered: bool,
}

/// Blends last frame's forces towards this frame's by `t`
pub fn smooth(previous: &RawForces, raw: &RawForces, t: f32) -> RawForces {
    RawForces {
        alignment: previous.alignment.lerp(raw.alignment, t),
        cohesion: previous.cohesion.lerp(raw.cohesion, t),
        separation: previous.separation.lerp(raw.separation, t),
    }
}

/// Snaps forces weaker than `threshold` to zero
pub fn dead_zone(forces: RawForces, threshold: f32) -> RawForces {
    let snap = |f: Vec2| if f.length() < threshold { Vec2::ZERO } else { f };
    RawForces {
        alignment: snap(forces.alignment),
        cohesion: snap(forces.cohesion),
        separation: snap(forces.separation),
    }
}

/// The harder an agent is pushed apart, the less alignment and cohesion may
/// pull it back in.
pub fn adaptive_weights(separation_magnitude: f32, config: &PhysicsConfig) -> ForceWeights {
    if separation_magnitude > config.separation_high_threshold {
        config.prioritize_high
    } else if separation_magnitude > config.separation_med_threshold {
        config.prioritize_medium
    } else {
        ForceWeights::UNIT
    }
}

/// User weights, with separation boosted by the bass band
pub fn user_weights(params: &FlockParams, modulation: &Modulation, config: &PhysicsConfig) -> ForceWeights {
    let bass_boost = 1. + modulation.bass * config.bass_separation_boost * params.audio_reactivity;
    ForceWeights {
        separation: params.separation_weight * bass_boost,
        ..params.weights()
    }
}

pub fn compose(
    raw: &RawForces,
    boid: &mut Boid,
    in_range: usize,
    ctx: &FrameContext,
    rng: &mut dyn RandomSource,
) -> Composition {
    let config = ctx.config;

    let smoothed = smooth(&boid.force_memory, raw, config.force_smoothing);
    boid.force_memory = smoothed;
    let forces = dead_zone(smoothed, config.dead_zone_threshold);

    let adaptive = adaptive_weights(forces.separation.length(), config);
    let user = user_weights(ctx.params, &ctx.modulation, config);

    let scatter_intensity = boid
        .behavior()
        .scatter_intensity(ctx.now, config.scatter_ease());
    let weights = ForceWeights {
        alignment: adaptive.alignment * user.alignment,
        cohesion: adaptive.cohesion * user.cohesion,
        separation: adaptive.separation * user.separation,
    }
    .scaled(1. - scatter_intensity);

    let alignment = forces.alignment * weights.alignment;
    let cohesion = forces.cohesion * weights.cohesion;
    let separation = forces.separation * weights.separation;

    let scatter = match boid.behavior().scatter_impulse() {
        Some(impulse) if scatter_intensity > 0. => scatter_force(
            impulse,
            ctx.params.max_force * config.scatter_force_multiplier,
            scatter_intensity,
        ),
        _ => Vec2::ZERO,
    };

    let total_force = alignment.length() + cohesion.length() + separation.length();

    let mut escape_triggered = false;
    if boid.behavior().can_escape(ctx.now)
        && (in_range > config.overcrowding_neighbour_limit
            || total_force > config.overcrowding_force_limit)
    {
        escape_triggered = boid.trigger_escape(ctx.now, EscapeReason::Overcrowding, config, rng);
    }

    Composition {
        acceleration: alignment + cohesion + separation + scatter,
        weights,
        total_force,
        scatter_intensity,
        escape_triggered,
    }
}
