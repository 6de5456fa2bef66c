use std::{
    f32::consts::{FRAC_PI_2, TAU},
    time::Duration,
};

use circular_queue::CircularQueue;
use glam::f32::Vec2;

use crate::{
    behaviour::{count_reversals, Behavior, EscapeReason, Transition},
    flock::finder::BoidView,
    forces::RawForces,
    math_helpers::{wrap_angle, wrap_position, VecExt},
    options::{FlockParams, Modulation, PhysicsConfig, SpaceBounds},
    random::RandomSource,
};

/// Which force path moved an agent during its last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteeringPath {
    /// composed alignment, cohesion and separation
    Flocking,
    /// flocking blended with a scatter impulse
    Scatter,
    /// direct steering towards the escape heading
    Escape,
    /// no steering at all
    Drift,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoidMetadata {
    /// neighbours the forces were computed from, capped
    pub n_neighbours: usize,
    /// agents inside the perception radius before the cap
    pub in_range: usize,
    pub acceleration_update: Vec2,
    pub path: SteeringPath,
}

impl Default for BoidMetadata {
    fn default() -> Self {
        Self {
            n_neighbours: 0,
            in_range: 0,
            acceleration_update: Vec2::ZERO,
            path: SteeringPath::Flocking,
        }
    }
}

/// Per-agent look, drawn once at creation. Only a renderer reads it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Appearance {
    pub size: f32,
    pub length: f32,
    pub tail: f32,
    /// phase of the body undulation, radians
    pub animation_offset: f32,
    /// uniform in `[0, 1)`, picks colouring and pattern
    pub variety_seed: f32,
}

impl Appearance {
    pub fn random(config: &PhysicsConfig, rng: &mut dyn RandomSource) -> Self {
        Appearance {
            size: config.size_multiplier.sample(rng),
            length: rng.range(0.85, 1.25),
            tail: rng.range(0.9, 1.8),
            animation_offset: rng.range(0., TAU),
            variety_seed: rng.uniform(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Boid {
    // sequential id starting from 0
    pub id: usize,
    pub position: Vec2,
    pub velocity: Vec2,
    acceleration: Vec2,
    perception_radius: f32,
    /// last frame's smoothed, unweighted flocking forces
    pub(crate) force_memory: RawForces,
    previous_heading: f32,
    heading_history: CircularQueue<f32>,
    speed_multiplier: f32,
    appearance: Appearance,
    behavior: Behavior,
    pub metadata: BoidMetadata,
}

impl Boid {
    /// Creates a new [`Boid`] with its per-agent constants drawn from `rng`.
    pub fn new(
        id: usize,
        position: Vec2,
        velocity: Vec2,
        now: Duration,
        config: &PhysicsConfig,
        rng: &mut dyn RandomSource,
    ) -> Self {
        let appearance = Appearance::random(config, rng);
        let speed_multiplier = config.speed_multiplier.sample(rng);
        let behavior = Behavior::new(now, config, rng);

        Boid {
            id,
            position,
            velocity,
            acceleration: Vec2::ZERO,
            perception_radius: config.perception_radius,
            force_memory: RawForces::default(),
            previous_heading: velocity.heading(),
            heading_history: CircularQueue::with_capacity(config.oscillation_history_length.max(1)),
            speed_multiplier,
            appearance,
            behavior,
            metadata: BoidMetadata::default(),
        }
    }

    /// Random position inside the bounds, random heading at the initial speed
    pub fn spawn(
        id: usize,
        bounds: &SpaceBounds,
        now: Duration,
        config: &PhysicsConfig,
        rng: &mut dyn RandomSource,
    ) -> Self {
        let position = Vec2::new(rng.range(0., bounds.width), rng.range(0., bounds.height));
        let heading = rng.range(0., TAU);
        let velocity = Vec2::from_angle(heading, config.initial_speed.sample(rng));

        Boid::new(id, position, velocity, now, config, rng)
    }

    pub fn view(&self) -> BoidView {
        BoidView {
            position: self.position,
            velocity: self.velocity,
        }
    }

    pub fn heading(&self) -> f32 {
        self.velocity.heading()
    }

    pub fn perception_radius(&self) -> f32 {
        self.perception_radius
    }

    pub fn speed_multiplier(&self) -> f32 {
        self.speed_multiplier
    }

    pub fn appearance(&self) -> &Appearance {
        &self.appearance
    }

    pub fn behavior(&self) -> &Behavior {
        &self.behavior
    }

    /// Direct access to the state machine, for scripted scenarios
    pub fn behavior_mut(&mut self) -> &mut Behavior {
        &mut self.behavior
    }

    pub fn is_escaping(&self) -> bool {
        self.behavior.is_escaping()
    }

    pub fn steering_path(&self) -> SteeringPath {
        self.metadata.path
    }

    pub fn heading_history_len(&self) -> usize {
        self.heading_history.len()
    }

    pub fn apply_force(&mut self, force: Vec2) {
        self.acceleration += force;
    }

    /// Expires finished states, then rolls for new random ones.
    pub fn update_behavior(
        &mut self,
        now: Duration,
        global_scatter_active: bool,
        config: &PhysicsConfig,
        rng: &mut dyn RandomSource,
    ) -> Option<Transition> {
        let expired = self.behavior.expire(now, config, rng);
        if expired == Some(Transition::EscapeEnded) {
            self.heading_history.clear();
        }

        self.behavior
            .roll(now, global_scatter_active, config, rng)
            .or(expired)
    }

    /// Starts an escape off the current heading, returns whether it started.
    pub fn trigger_escape(
        &mut self,
        now: Duration,
        reason: EscapeReason,
        config: &PhysicsConfig,
        rng: &mut dyn RandomSource,
    ) -> bool {
        let heading = self.heading();
        if self.behavior.trigger_escape(now, heading, reason, config, rng) {
            self.heading_history.clear();
            true
        } else {
            false
        }
    }

    /// Speed cap for this frame: the global max, scaled by the agent's own
    /// multiplier, the audio amplitude and the scatter boost.
    pub fn effective_max_speed(
        &self,
        params: &FlockParams,
        modulation: &Modulation,
        scatter_intensity: f32,
        config: &PhysicsConfig,
    ) -> f32 {
        let audio = 1. + modulation.amplitude * params.audio_reactivity;
        let scatter = 1. + config.scatter_speed_boost * scatter_intensity;
        params.max_speed * self.speed_multiplier * audio * scatter
    }

    // Actually shifts the individual's location
    pub fn update_location(
        &mut self,
        max_speed: f32,
        now: Duration,
        config: &PhysicsConfig,
        rng: &mut dyn RandomSource,
    ) {
        let current_heading = self.heading();
        let speed = self.velocity.length();

        // resist sharp turns with a force perpendicular to the velocity
        if speed > config.min_speed_for_damping {
            let heading_change = wrap_angle(current_heading - self.previous_heading);
            let damping = -config.damping_coefficient * heading_change * speed;
            self.acceleration += Vec2::from_angle(current_heading + FRAC_PI_2, damping);
        }
        self.previous_heading = current_heading;

        // semi-implicit: move with last frame's velocity first
        self.position += self.velocity;

        let target = (self.velocity + self.acceleration).limit(max_speed);
        self.velocity = self.velocity.lerp(target, config.velocity_smoothing);

        if config.oscillation_detection {
            self.detect_oscillation(now, config, rng);
        }

        self.acceleration = Vec2::ZERO;
    }

    fn detect_oscillation(&mut self, now: Duration, config: &PhysicsConfig, rng: &mut dyn RandomSource) {
        self.heading_history.push(self.heading());

        if self.heading_history.len() < config.oscillation_check_length {
            return;
        }

        let reversals = count_reversals(
            self.heading_history
                .iter()
                .take(config.oscillation_check_length),
        );

        if reversals >= config.oscillation_reversal_threshold {
            self.trigger_escape(now, EscapeReason::Oscillation, config, rng);
        }
    }

    /// Toroidal wrap into the space
    pub fn wrap(&mut self, bounds: &SpaceBounds) {
        self.position = wrap_position(self.position, bounds);
    }
}
