use std::time::Duration;

use circular_queue::CircularQueue;
use itertools::Itertools;
use serde::Serialize;

use crate::{clock::Clock, flock::Flock, random::RandomSource};

/// Aggregate picture of a flock after a frame.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    pub time: Duration,
    pub count: usize,
    pub mean_neighbours: f32,
    pub min_neighbours: usize,
    pub max_neighbours: usize,
    pub mean_speed: f32,
    pub escaping: usize,
    pub scattering: usize,
    pub independent: usize,
}

impl FrameStats {
    pub fn measure<C: Clock, R: RandomSource>(flock: &Flock<C, R>) -> Self {
        let boids = flock.boids();
        let count = boids.len();
        let n = count.max(1) as f32;
        let (min_neighbours, max_neighbours) = boids
            .iter()
            .map(|b| b.metadata.n_neighbours)
            .minmax()
            .into_option()
            .unwrap_or((0, 0));

        FrameStats {
            frame: flock.frame(),
            time: flock.now(),
            count,
            mean_neighbours: boids.iter().map(|b| b.metadata.n_neighbours as f32).sum::<f32>() / n,
            min_neighbours,
            max_neighbours,
            mean_speed: boids.iter().map(|b| b.velocity.length()).sum::<f32>() / n,
            escaping: boids.iter().filter(|b| b.is_escaping()).count(),
            scattering: boids.iter().filter(|b| b.behavior().is_scattering()).count(),
            independent: boids.iter().filter(|b| b.behavior().is_independent()).count(),
        }
    }
}

/// Samples [`FrameStats`] every `sample_rate` frames and keeps the most recent
/// `capacity` samples.
pub struct FlockObserver {
    samples: CircularQueue<FrameStats>,
    ticker: u64,
    sample_rate: u64,
}

impl FlockObserver {
    pub fn new(sample_rate: u64, capacity: usize) -> Self {
        FlockObserver {
            samples: CircularQueue::with_capacity(capacity.max(1)),
            ticker: 0,
            sample_rate: sample_rate.max(1),
        }
    }

    /// Call once per frame, returns the sample if one was taken
    pub fn watch<C: Clock, R: RandomSource>(&mut self, flock: &Flock<C, R>) -> Option<FrameStats> {
        if !self.should_sample() {
            return None;
        }

        let stats = FrameStats::measure(flock);
        self.samples.push(stats);
        Some(stats)
    }

    pub fn latest(&self) -> Option<&FrameStats> {
        self.samples.iter().next()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn restart(&mut self) {
        self.samples.clear();
        self.ticker = 0;
    }

    /// Returns the kept samples oldest first and forgets them
    pub fn pop_data(&mut self) -> Vec<FrameStats> {
        let data: Vec<FrameStats> = self.samples.iter().rev().copied().collect();
        self.samples.clear();
        data
    }

    fn should_sample(&mut self) -> bool {
        self.ticker += 1;
        self.ticker % self.sample_rate == 0
    }
}
