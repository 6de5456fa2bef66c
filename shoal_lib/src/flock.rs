use std::time::Duration;

use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::{debug_span, info};

use crate::{
    behaviour::{random_impulse, BehaviorState, ScatterOrigin},
    boid::{Boid, SteeringPath},
    clock::{Clock, FrameClock, SystemClock},
    compositor::{compose, FrameContext},
    error::ConfigError,
    forces::{escape, RawForces},
    options::{FlockParams, Modulation, NeighbourSearch, PhysicsConfig, SpaceBounds},
    random::{flock_rng, RandomSource},
};

use self::{
    finder::{BoidView, NeighbourFinder},
    grid_finder::GridFinder,
    naive_finder::NaiveFinder,
};

pub mod finder;
pub mod grid_finder;
pub mod naive_finder;

/// Owns every agent and advances them one frame at a time.
///
/// A frame runs in two phases: first every agent's behaviour and steering is
/// worked out from a snapshot of the previous frame, then all agents move.
/// No agent ever sees another agent's state from the frame being computed.
pub struct Flock<C: Clock = FrameClock, R: RandomSource = Xoshiro256PlusPlus> {
    boids: Vec<Boid>,
    bounds: SpaceBounds,
    config: PhysicsConfig,
    finder: Box<dyn NeighbourFinder>,
    clock: C,
    rng: R,
    snapshot: Vec<BoidView>,
    neighbours: Vec<usize>,
    /// views of the current agent's neighbours
    neighbour_views: Vec<BoidView>,
    global_scatter_active: bool,
    frame: u64,
}

impl Flock<FrameClock, Xoshiro256PlusPlus> {
    /// Flock on a 60 fps frame clock, seeded from `config.seed`
    pub fn new(count: usize, bounds: SpaceBounds, config: PhysicsConfig) -> Result<Self, ConfigError> {
        let rng = flock_rng(config.seed);
        Flock::with_clock_and_rng(count, bounds, config, FrameClock::sixty_fps(), rng)
    }
}

impl Flock<SystemClock, Xoshiro256PlusPlus> {
    /// Flock whose behaviour timers follow the wall clock
    pub fn realtime(count: usize, bounds: SpaceBounds, config: PhysicsConfig) -> Result<Self, ConfigError> {
        let rng = flock_rng(config.seed);
        Flock::with_clock_and_rng(count, bounds, config, SystemClock::new(), rng)
    }
}

impl<C: Clock, R: RandomSource> Flock<C, R> {
    pub fn with_clock_and_rng(
        count: usize,
        bounds: SpaceBounds,
        config: PhysicsConfig,
        clock: C,
        rng: R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        bounds.check()?;

        let finder: Box<dyn NeighbourFinder> = match config.neighbour_search {
            NeighbourSearch::Naive => Box::new(NaiveFinder::new()),
            NeighbourSearch::Grid => Box::new(GridFinder::new(config.perception_radius)),
        };

        let mut flock = Flock {
            boids: Vec::with_capacity(count),
            bounds,
            config,
            finder,
            clock,
            rng,
            snapshot: Vec::with_capacity(count),
            neighbours: Vec::new(),
            neighbour_views: Vec::new(),
            global_scatter_active: false,
            frame: 0,
        };
        flock.spawn_up_to(count);

        Ok(flock)
    }

    pub fn boids(&self) -> &[Boid] {
        &self.boids
    }

    /// Mutable agents, for setting up scenarios
    pub fn boids_mut(&mut self) -> &mut [Boid] {
        &mut self.boids
    }

    pub fn len(&self) -> usize {
        self.boids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boids.is_empty()
    }

    pub fn bounds(&self) -> &SpaceBounds {
        &self.bounds
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Frames computed so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Whether the last frame saw most of the flock scattering
    pub fn global_scatter_active(&self) -> bool {
        self.global_scatter_active
    }

    /// Current scatter intensity of every agent, in agent order
    pub fn scatter_intensities(&self) -> Vec<f32> {
        let now = self.clock.now();
        let ease = self.config.scatter_ease();
        self.boids
            .iter()
            .map(|b| b.behavior().scatter_intensity(now, ease))
            .collect()
    }

    /// Advances the flock by one frame, `amplitude` speeds everyone up
    pub fn update(&mut self, params: &FlockParams, amplitude: f32) {
        self.update_modulated(params, Modulation::amplitude(amplitude));
    }

    pub fn update_modulated(&mut self, params: &FlockParams, modulation: Modulation) {
        self.clock.advance_frame();
        self.frame += 1;
        let now = self.clock.now();

        let Flock {
            boids,
            bounds,
            config,
            finder,
            rng,
            snapshot,
            neighbours,
            neighbour_views,
            global_scatter_active,
            ..
        } = self;

        let ctx = FrameContext {
            params,
            modulation,
            config,
            now,
        };

        *global_scatter_active = is_globally_scattering(boids, now, config);

        snapshot.clear();
        snapshot.extend(boids.iter().map(|b| b.view()));
        finder.rebuild(snapshot, bounds);

        // steering, from the snapshot only
        for (i, boid) in boids.iter_mut().enumerate() {
            let _boid = debug_span!("boid", id = boid.id).entered();
            boid.update_behavior(now, *global_scatter_active, config, rng);

            let in_range = finder.find_into(
                i,
                snapshot,
                boid.perception_radius(),
                config.max_neighbours,
                neighbours,
            );
            boid.metadata.n_neighbours = neighbours.len();
            boid.metadata.in_range = in_range;

            let state = *boid.behavior().state();
            let (acceleration, path) = match state {
                BehaviorState::Escaping { heading, .. } => (
                    escape(
                        boid.velocity,
                        heading,
                        params.max_speed * config.escape_speed_factor,
                        params.max_force * config.escape_force_factor,
                    ),
                    SteeringPath::Escape,
                ),
                BehaviorState::Independent { .. } => (Default::default(), SteeringPath::Drift),
                BehaviorState::Normal | BehaviorState::Scattering { .. } => {
                    neighbour_views.clear();
                    neighbour_views.extend(neighbours.iter().map(|j| snapshot[*j]));
                    let raw = RawForces::calculate(
                        &snapshot[i],
                        neighbour_views,
                        config.separation_radius(boid.perception_radius()),
                        config.separation_min_distance,
                        params.max_speed,
                        params.max_force,
                    );
                    let composition = compose(&raw, boid, in_range, &ctx, rng);
                    let path = if composition.scatter_intensity > 0. {
                        SteeringPath::Scatter
                    } else {
                        SteeringPath::Flocking
                    };
                    (composition.acceleration, path)
                }
            };

            boid.apply_force(acceleration);
            boid.metadata.acceleration_update = acceleration;
            boid.metadata.path = path;
        }

        // movement
        let ease = config.scatter_ease();
        for boid in boids.iter_mut() {
            let _boid = debug_span!("boid", id = boid.id).entered();
            let intensity = boid.behavior().scatter_intensity(now, ease);
            let max_speed = boid.effective_max_speed(params, &modulation, intensity, config);
            boid.update_location(max_speed, now, config, rng);
            boid.wrap(bounds);
        }
    }

    /// Grows or shrinks the flock; surviving agents keep all their state
    pub fn resize(&mut self, count: usize) {
        let before = self.boids.len();
        if count < before {
            self.boids.truncate(count);
        } else {
            self.spawn_up_to(count);
        }
        info!(from = before, to = count, "flock resized");
    }

    /// Replaces every agent with a fresh one, keeping the count
    pub fn reset(&mut self) {
        let count = self.boids.len();
        self.boids.clear();
        self.spawn_up_to(count);
        self.global_scatter_active = false;
        info!(count, "flock reset");
    }

    /// Scatters every agent that is not escaping for `duration`, after which
    /// each one eases back into the flock.
    pub fn trigger_global_scatter(&mut self, duration: Duration) {
        let now = self.clock.now();
        let mut scattered = 0;
        for boid in self.boids.iter_mut() {
            let impulse = random_impulse(&self.config, &mut self.rng);
            if boid
                .behavior_mut()
                .start_scatter(now, duration, impulse, ScatterOrigin::Global)
            {
                scattered += 1;
            }
        }
        info!(?duration, scattered, total = self.boids.len(), "global scatter");
    }

    /// Changes the wrapping space without touching the agents, they are
    /// wrapped into the new space on their next move.
    pub fn set_bounds(&mut self, bounds: SpaceBounds) -> Result<(), ConfigError> {
        bounds.check()?;
        self.bounds = bounds;
        Ok(())
    }

    fn spawn_up_to(&mut self, count: usize) {
        let now = self.clock.now();
        for id in self.boids.len()..count {
            let boid = Boid::spawn(id, &self.bounds, now, &self.config, &mut self.rng);
            self.boids.push(boid);
        }
    }
}

/// More than the configured share of agents scatters harder than the
/// configured intensity.
fn is_globally_scattering(boids: &[Boid], now: Duration, config: &PhysicsConfig) -> bool {
    if boids.is_empty() {
        return false;
    }
    let ease = config.scatter_ease();
    let scattering = boids
        .iter()
        .filter(|b| b.behavior().scatter_intensity(now, ease) > config.global_scatter_intensity)
        .count();

    scattering as f32 > boids.len() as f32 * config.global_scatter_fraction
}
