use crate::{math_helpers::distance_sq, options::SpaceBounds};

use super::finder::{take_nearest, BoidView, NeighbourFinder};

/// A naive implementation of neighbour search, which uses an O(N^2) algorithm
/// for finding every agent's neighbours.
#[derive(Debug, Default)]
pub struct NaiveFinder {
    candidates: Vec<(f32, usize)>,
}

impl NaiveFinder {
    pub fn new() -> Self {
        Default::default()
    }

    /// `candidates` is scratch space, its contents are replaced
    pub fn get_neighbours_naive(
        index: usize,
        snapshot: &[BoidView],
        radius: f32,
        max: usize,
        candidates: &mut Vec<(f32, usize)>,
        out: &mut Vec<usize>,
    ) -> usize {
        let me = snapshot[index].position;
        let radius_sq = radius * radius;

        candidates.clear();
        candidates.extend(
            snapshot
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(i, other)| (distance_sq(me, other.position), i))
                .filter(|(d, _)| *d < radius_sq),
        );

        take_nearest(candidates, max, out)
    }
}

impl NeighbourFinder for NaiveFinder {
    fn rebuild(&mut self, _: &[BoidView], _: &SpaceBounds) {
        () // noop
    }

    fn find_into(
        &mut self,
        index: usize,
        snapshot: &[BoidView],
        radius: f32,
        max: usize,
        out: &mut Vec<usize>,
    ) -> usize {
        NaiveFinder::get_neighbours_naive(index, snapshot, radius, max, &mut self.candidates, out)
    }
}

/// Closest neighbours of agent `index` within `radius`, nearest first,
/// at most `max` of them.
pub fn find_neighbours(index: usize, snapshot: &[BoidView], radius: f32, max: usize) -> Vec<usize> {
    let mut out = Vec::with_capacity(max);
    NaiveFinder::get_neighbours_naive(index, snapshot, radius, max, &mut Vec::new(), &mut out);
    out
}
