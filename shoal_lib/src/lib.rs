use error::ConfigError;
use flock::Flock;
use options::{FlockParams, PhysicsConfig, SpaceBounds};
use stats::{FlockObserver, FrameStats};

pub mod behaviour;
pub mod boid;
pub mod clock;
pub mod compositor;
pub mod error;
pub mod flock;
pub mod forces;
pub mod math_helpers;
pub mod options;
pub mod random;
pub mod stats;

/// Runs a headless flock for `no_iter` frames on a frame clock and returns
/// the statistics sampled every `sample_rate` frames.
pub fn run_flock(
    no_iter: u64,
    count: usize,
    bounds: SpaceBounds,
    config: PhysicsConfig,
    params: &FlockParams,
    sample_rate: u64,
) -> Result<Vec<FrameStats>, ConfigError> {
    let mut flock = Flock::new(count, bounds, config)?;
    let capacity = (no_iter / sample_rate.max(1)) as usize + 1;
    let mut observer = FlockObserver::new(sample_rate, capacity);

    (0..no_iter).for_each(|_| {
        flock.update(params, 0.);
        observer.watch(&flock);
    });

    Ok(observer.pop_data())
}
