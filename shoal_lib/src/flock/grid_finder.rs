use crate::{math_helpers::distance_sq, options::SpaceBounds};

use super::{
    finder::{take_nearest, BoidView, NeighbourFinder},
    naive_finder::NaiveFinder,
};

/// Uses a uniform grid space division method, where all cells of the
/// underlying table are stored in a 1D array. Agents are counting-sorted into
/// the table every frame, each cell owning a contiguous range of it.
///
/// Uses an Θ(n) algorithm for indexing and an amortized O(1) neighbourhood
/// lookup, each query only visits the 3x3 block around the agent's cell.
#[derive(Debug)]
pub struct GridFinder {
    settings: GridSettings,
    /// minimal cell edge, a radius query must fit into one cell
    cell_size: f32,
    /// for each cell, the range of `table` it owns
    pivots: Vec<GridPivot>,
    /// agent indices ordered by cell
    table: Vec<usize>,
    /// cell of each agent, indexed by agent
    index: Vec<usize>,
    /// per cell scratch for the counting sort
    cursor: Vec<usize>,
    /// per query scratch
    candidates: Vec<(f32, usize)>,
}

/// Beyond this the table outgrows any flock it could index
pub const MAX_AXIS_CELLS: usize = 1 << 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSettings {
    pub x_cell_count: usize,
    pub y_cell_count: usize,
    pub cell_count: usize,
    /// environment x units per grid x cell
    pub x_cell_res: f32,
    /// environment y units per grid y cell
    pub y_cell_res: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, Default)]
struct GridPivot {
    init: usize,
    fin: usize,
}

impl GridFinder {
    /// `cell_size` is the largest radius this grid will be queried with
    pub fn new(cell_size: f32) -> Self {
        GridFinder {
            settings: GridFinder::get_grid_settings(&SpaceBounds::new(1., 1.), cell_size),
            cell_size,
            pivots: Vec::new(),
            table: Vec::new(),
            index: Vec::new(),
            cursor: Vec::new(),
            candidates: Vec::new(),
        }
    }

    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    pub fn get_grid_settings(bounds: &SpaceBounds, cell_size: f32) -> GridSettings {
        // cells are never smaller than the query radius, so the 3x3 block
        // around an agent always covers its whole perception circle
        let x_cell_count = axis_cells(bounds.width, cell_size);
        let y_cell_count = axis_cells(bounds.height, cell_size);

        GridSettings {
            x_cell_count,
            y_cell_count,
            cell_count: x_cell_count * y_cell_count,
            x_cell_res: bounds.width / x_cell_count as f32,
            y_cell_res: bounds.height / y_cell_count as f32,
            width: bounds.width,
            height: bounds.height,
        }
    }

    /// Returns the (column, row) of the cell holding a point, points outside
    /// the space are clamped to the border cells.
    pub fn get_cell(&self, x: f32, y: f32) -> (usize, usize) {
        self.settings.cell(x, y)
    }

    /// Returns "hashed" value representing an index into the 1D cell table,
    /// takes values from 0..(x_cells * y_cells)
    pub fn get_table_index(&self, x: f32, y: f32) -> usize {
        self.settings.table_index(x, y)
    }
}

impl GridSettings {
    pub fn cell(&self, x: f32, y: f32) -> (usize, usize) {
        let cx = ((x / self.x_cell_res).floor().max(0.) as usize).min(self.x_cell_count - 1);
        let cy = ((y / self.y_cell_res).floor().max(0.) as usize).min(self.y_cell_count - 1);
        (cx, cy)
    }

    pub fn table_index(&self, x: f32, y: f32) -> usize {
        let (cx, cy) = self.cell(x, y);
        cx + cy * self.x_cell_count
    }
}

/// Cells along one axis, at least one and never more than [`MAX_AXIS_CELLS`]
fn axis_cells(extent: f32, cell_size: f32) -> usize {
    let cells = (extent / cell_size).floor();
    if cells.is_finite() {
        (cells.max(1.) as usize).min(MAX_AXIS_CELLS)
    } else {
        1
    }
}

impl NeighbourFinder for GridFinder {
    fn rebuild(&mut self, snapshot: &[BoidView], bounds: &SpaceBounds) {
        let new_settings = GridFinder::get_grid_settings(bounds, self.cell_size);
        if new_settings != self.settings || self.pivots.len() != new_settings.cell_count {
            self.settings = new_settings;
            self.pivots = vec![Default::default(); new_settings.cell_count];
        }

        let settings = self.settings;
        self.index.clear();
        self.index
            .extend(snapshot.iter().map(|b| settings.table_index(b.position.x, b.position.y)));

        // count usage per cell, then turn the counts into ranges
        self.cursor.clear();
        self.cursor.resize(settings.cell_count, 0);
        for cell in self.index.iter() {
            self.cursor[*cell] += 1;
        }

        let mut accum = 0;
        for (pivot, cursor) in self.pivots.iter_mut().zip(self.cursor.iter_mut()) {
            pivot.init = accum;
            accum += *cursor;
            pivot.fin = accum;
            *cursor = pivot.init;
        }

        // place agents into their cell's range, keeping index order inside a cell
        self.table.clear();
        self.table.resize(snapshot.len(), 0);
        for (agent, cell) in self.index.iter().enumerate() {
            self.table[self.cursor[*cell]] = agent;
            self.cursor[*cell] += 1;
        }
    }

    fn find_into(
        &mut self,
        index: usize,
        snapshot: &[BoidView],
        radius: f32,
        max: usize,
        out: &mut Vec<usize>,
    ) -> usize {
        // grid is stale or too coarse for this radius, fall back to naive method
        if self.index.len() != snapshot.len()
            || radius > self.settings.x_cell_res
            || radius > self.settings.y_cell_res
        {
            return NaiveFinder::get_neighbours_naive(index, snapshot, radius, max, &mut self.candidates, out);
        }

        let me = snapshot[index].position;
        let radius_sq = radius * radius;
        let (cx, cy) = self.get_cell(me.x, me.y);
        let s = self.settings;

        self.candidates.clear();
        for y in cy.saturating_sub(1)..=(cy + 1).min(s.y_cell_count - 1) {
            for x in cx.saturating_sub(1)..=(cx + 1).min(s.x_cell_count - 1) {
                let pivot = self.pivots[x + y * s.x_cell_count];
                for other in self.table[pivot.init..pivot.fin].iter() {
                    if *other == index {
                        continue;
                    }
                    let d = distance_sq(me, snapshot[*other].position);
                    if d < radius_sq {
                        self.candidates.push((d, *other));
                    }
                }
            }
        }

        take_nearest(&mut self.candidates, max, out)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;
    use rand::Rng;
    use rstest::rstest;

    use super::{GridFinder, MAX_AXIS_CELLS};
    use crate::{
        flock::{
            finder::{BoidView, NeighbourFinder},
            naive_finder::NaiveFinder,
        },
        options::SpaceBounds,
        random::flock_rng,
    };

    #[test]
    fn should_produce_1d_index_inside() {
        let mut grid = GridFinder::new(200.);
        grid.rebuild(&[], &SpaceBounds::new(800., 800.));
        assert_eq!(grid.settings().x_cell_count, 4);
        assert_eq!(grid.get_table_index(700., 700.), 15);
        assert_eq!(grid.get_table_index(0., 0.), 0);
        assert_eq!(grid.get_table_index(250., 10.), 1);
    }

    #[test]
    fn should_clamp_1d_index_outside() {
        let mut grid = GridFinder::new(200.);
        grid.rebuild(&[], &SpaceBounds::new(800., 800.));
        assert_eq!(grid.get_table_index(800., 800.), 15);
        assert_eq!(grid.get_table_index(-5., -5.), 0);
    }

    #[test]
    fn tiny_space_has_single_cell() {
        let settings = GridFinder::get_grid_settings(&SpaceBounds::new(30., 30.), 50.);
        assert_eq!(settings.cell_count, 1);
    }

    #[test]
    fn huge_space_caps_cell_count() {
        let settings = GridFinder::get_grid_settings(&SpaceBounds::new(3e38, 3e38), 1.);
        assert_eq!(settings.x_cell_count, MAX_AXIS_CELLS);
        assert_eq!(settings.cell_count, MAX_AXIS_CELLS * MAX_AXIS_CELLS);

        let settings = GridFinder::get_grid_settings(&SpaceBounds::new(f32::INFINITY, 10.), 5.);
        assert_eq!(settings.x_cell_count, 1);
    }

    #[test]
    fn rebuild_places_every_agent_once() {
        let snapshot: Vec<BoidView> = [(10., 10.), (350., 20.), (15., 12.), (790., 590.), (360., 30.)]
            .iter()
            .map(|(x, y)| BoidView {
                position: Vec2::new(*x, *y),
                velocity: Vec2::ZERO,
            })
            .collect();

        let mut grid = GridFinder::new(100.);
        grid.rebuild(&snapshot, &SpaceBounds::new(800., 600.));

        let mut placed = grid.table.clone();
        placed.sort_unstable();
        assert_eq!(placed, vec![0, 1, 2, 3, 4]);

        // agents of a cell are contiguous and keep their order
        let first = grid.pivots[grid.get_table_index(10., 10.)];
        assert_eq!(&grid.table[first.init..first.fin], &[0, 2]);
        let third = grid.pivots[grid.get_table_index(350., 20.)];
        assert_eq!(&grid.table[third.init..third.fin], &[1, 4]);
    }

    #[test]
    fn reused_grid_follows_the_latest_snapshot() {
        let mut rng = flock_rng(Some(8));
        let bounds = SpaceBounds::new(400., 400.);
        let mut grid = GridFinder::new(40.);
        let mut naive = NaiveFinder::new();
        let (mut from_grid, mut from_naive) = (Vec::new(), Vec::new());

        for count in [200, 50, 120] {
            let snapshot: Vec<BoidView> = (0..count)
                .map(|_| BoidView {
                    position: Vec2::new(rng.gen::<f32>() * 400., rng.gen::<f32>() * 400.),
                    velocity: Vec2::ZERO,
                })
                .collect();
            grid.rebuild(&snapshot, &bounds);

            for i in 0..snapshot.len() {
                let n_grid = grid.find_into(i, &snapshot, 40., 8, &mut from_grid);
                let n_naive = naive.find_into(i, &snapshot, 40., 8, &mut from_naive);
                assert_eq!(n_grid, n_naive);
                assert_eq!(from_grid, from_naive);
            }
        }
    }

    #[rstest]
    #[case(800., 600., 50.)]
    #[case(120., 90., 50.)]
    #[case(1000., 1000., 33.)]
    fn agrees_with_naive_search(#[case] width: f32, #[case] height: f32, #[case] radius: f32) {
        let mut rng = flock_rng(Some(3));
        let snapshot: Vec<BoidView> = (0..300)
            .map(|_| BoidView {
                position: Vec2::new(rng.gen::<f32>() * width, rng.gen::<f32>() * height),
                velocity: Vec2::ZERO,
            })
            .collect();

        let bounds = SpaceBounds::new(width, height);
        let mut grid = GridFinder::new(radius);
        grid.rebuild(&snapshot, &bounds);

        let (mut from_grid, mut from_naive) = (Vec::new(), Vec::new());
        for i in 0..snapshot.len() {
            let n_grid = grid.find_into(i, &snapshot, radius, 8, &mut from_grid);
            let n_naive = NaiveFinder::new().find_into(i, &snapshot, radius, 8, &mut from_naive);
            assert_eq!(n_grid, n_naive);
            assert_eq!(from_grid, from_naive);
        }
    }
}
