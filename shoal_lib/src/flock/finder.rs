use glam::Vec2;

use crate::options::SpaceBounds;

/// Read-only copy of an agent's kinematic state, taken before any agent of
/// the frame moves. Every neighbour query of a frame reads from the same
/// snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoidView {
    pub position: Vec2,
    pub velocity: Vec2,
}

// a finder holds a spatial index over a frame's snapshot and answers
// "who are my closest neighbours" for any agent in it

/// Neighbour search strategy.
///
/// Implementations must agree on results: neighbours strictly inside
/// `radius`, ordered by distance with ties broken by index, at most `max`
/// of them, never the queried agent itself.
pub trait NeighbourFinder {
    /// Indexes the snapshot of the current frame
    fn rebuild(&mut self, snapshot: &[BoidView], bounds: &SpaceBounds);

    /// Fills `out` with indices of the nearest neighbours of `index` and
    /// returns how many agents were inside the radius before truncation.
    fn find_into(
        &mut self,
        index: usize,
        snapshot: &[BoidView],
        radius: f32,
        max: usize,
        out: &mut Vec<usize>,
    ) -> usize;
}

/// Sorts `(distance², index)` candidates, moves the first `max` indices
/// into `out` and returns the candidate count. The candidates are left
/// behind for the caller to reuse.
pub(crate) fn take_nearest(candidates: &mut Vec<(f32, usize)>, max: usize, out: &mut Vec<usize>) -> usize {
    let in_range = candidates.len();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    out.clear();
    out.extend(candidates.iter().take(max).map(|(_, i)| *i));
    in_range
}
