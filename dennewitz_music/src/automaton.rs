// The automaton: a toroidal Life grid plus a parallel cell-age grid.
//
// Cells are stored row-major in a flat `Vec<u8>` (0 = dead, 1 = alive) with
// a matching `Vec<u32>` of ages. Both wrap at the edges: neighbor lookups
// and external coordinates are taken modulo the grid size.
//
// Each generation applies Conway's B3/S23 rule, then independently flips
// each cell with probability `mutation_rate`. Ages count generations a cell
// has been continuously alive: 1 on birth, +1 on survival, 0 when dead. The
// invariant `age > 0 <=> alive` holds after every operation in this module.
//
// The automaton is the only owner of the grid. The scanner and trajectory
// generators read it through `&Automaton` between generations; the
// sequencer is the only writer.

use dennewitz_prng::CellRng;

/// Probability threshold for a random starting grid: a cell is alive when
/// its uniform draw exceeds this value (about 18% live cells).
const RANDOM_FILL_THRESHOLD: f64 = 0.82;

/// Map a possibly negative or out-of-range coordinate onto `0..size`.
pub fn wrap(i: isize, size: usize) -> usize {
    i.rem_euclid(size as isize) as usize
}

/// A square toroidal Life grid with per-cell ages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Automaton {
    size: usize,
    cells: Vec<u8>,
    ages: Vec<u32>,
}

impl Automaton {
    /// An all-dead grid of `size` x `size` cells.
    pub fn empty(size: usize) -> Self {
        Automaton {
            size,
            cells: vec![0; size * size],
            ages: vec![0; size * size],
        }
    }

    /// A grid seeded from a text seed. The same seed and size always give
    /// the same grid. Live cells start with age 1.
    pub fn random(size: usize, seed: &str) -> Self {
        let mut rng = CellRng::from_seed_str(seed);
        let mut grid = Automaton::empty(size);
        for i in 0..size * size {
            if rng.next_f64() > RANDOM_FILL_THRESHOLD {
                grid.cells[i] = 1;
                grid.ages[i] = 1;
            }
        }
        grid
    }

    /// A grid with exactly the given `(x, y)` cells alive, each with age 1.
    /// Coordinates wrap.
    pub fn with_live_cells(size: usize, live: &[(usize, usize)]) -> Self {
        let mut grid = Automaton::empty(size);
        for &(x, y) in live {
            grid.set_cell(x as isize, y as isize, true);
        }
        grid
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Row-major cell states.
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Row-major cell ages, parallel to `cells()`.
    pub fn ages(&self) -> &[u32] {
        &self.ages
    }

    fn index(&self, x: isize, y: isize) -> usize {
        wrap(y, self.size) * self.size + wrap(x, self.size)
    }

    /// Whether the cell at `(x, y)` is alive. Coordinates wrap.
    pub fn is_alive(&self, x: isize, y: isize) -> bool {
        self.size > 0 && self.cells[self.index(x, y)] == 1
    }

    /// Age of the cell at `(x, y)`. Coordinates wrap.
    pub fn age(&self, x: isize, y: isize) -> u32 {
        if self.size == 0 {
            return 0;
        }
        self.ages[self.index(x, y)]
    }

    /// Paint a single cell. A newly painted live cell gets age 1; painting
    /// an already-live cell alive keeps its age.
    pub fn set_cell(&mut self, x: isize, y: isize, alive: bool) {
        if self.size == 0 {
            return;
        }
        let i = self.index(x, y);
        match (alive, self.cells[i] == 1) {
            (true, false) => {
                self.cells[i] = 1;
                self.ages[i] = 1;
            }
            (false, _) => {
                self.cells[i] = 0;
                self.ages[i] = 0;
            }
            (true, true) => {}
        }
    }

    /// Kill every cell.
    pub fn clear(&mut self) {
        self.cells.fill(0);
        self.ages.fill(0);
    }

    pub fn live_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c == 1).count()
    }

    /// All live cells as `(x, y)`, in row-major order.
    pub fn live_cells(&self) -> Vec<(usize, usize)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == 1)
            .map(|(i, _)| (i % self.size, i / self.size))
            .collect()
    }

    /// Mean `(x, y)` of all live cells, or `None` if the grid is dead.
    /// This is a plain mean, not a circular one: a cluster straddling the
    /// wrap seam averages toward the middle of the grid.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        let live = self.live_cells();
        if live.is_empty() {
            return None;
        }
        let n = live.len() as f64;
        let (sx, sy) = live
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x as f64, sy + y as f64));
        Some((sx / n, sy / n))
    }

    /// Advance one generation in place.
    pub fn step(&mut self, mutation_rate: f64, rng: &mut CellRng) {
        let (cells, ages) = advance(&self.cells, &self.ages, self.size, mutation_rate, rng);
        self.cells = cells;
        self.ages = ages;
    }

    /// Compact text rendering (`#` alive, `.` dead), one line per row.
    pub fn summary(&self) -> String {
        let mut out = String::with_capacity(self.size * (self.size + 1));
        for row in self.cells.chunks(self.size.max(1)) {
            out.extend(row.iter().map(|&c| if c == 1 { '#' } else { '.' }));
            out.push('\n');
        }
        out
    }
}

/// Compute the next generation of a row-major toroidal grid.
///
/// Live cells with 2 or 3 live neighbors survive and age by one; other live
/// cells die (age 0). Dead cells with exactly 3 neighbors are born (age 1).
/// Afterwards each cell flips with probability `mutation_rate`, taking age 1
/// if it flipped to alive and 0 if it flipped to dead. No random draws are
/// made when `mutation_rate <= 0`.
pub fn advance(
    cells: &[u8],
    ages: &[u32],
    size: usize,
    mutation_rate: f64,
    rng: &mut CellRng,
) -> (Vec<u8>, Vec<u32>) {
    let mut next = cells.to_vec();
    let mut next_ages = ages.to_vec();
    let n = size as isize;

    for y in 0..n {
        for x in 0..n {
            let mut neighbors = 0;
            for dy in -1..=1 {
                let row = wrap(y + dy, size) * size;
                for dx in -1..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    if cells[row + wrap(x + dx, size)] == 1 {
                        neighbors += 1;
                    }
                }
            }

            let i = (y * n + x) as usize;
            if cells[i] == 1 {
                if neighbors == 2 || neighbors == 3 {
                    next_ages[i] = ages[i].saturating_add(1);
                } else {
                    next[i] = 0;
                    next_ages[i] = 0;
                }
            } else if neighbors == 3 {
                next[i] = 1;
                next_ages[i] = 1;
            } else {
                next_ages[i] = 0;
            }

            if mutation_rate > 0.0 && rng.random_bool(mutation_rate) {
                next[i] ^= 1;
                next_ages[i] = u32::from(next[i]);
            }
        }
    }

    (next, next_ages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_age_invariant(grid: &Automaton) {
        for (i, (&c, &a)) in grid.cells().iter().zip(grid.ages()).enumerate() {
            assert_eq!(c == 1, a > 0, "cell {i}: alive={c} age={a}");
        }
    }

    #[test]
    fn dead_grid_stays_dead_without_mutation() {
        let mut rng = CellRng::new(1);
        for size in [1, 3, 16, 32] {
            let mut grid = Automaton::empty(size);
            for _ in 0..10 {
                grid.step(0.0, &mut rng);
            }
            assert_eq!(grid.live_count(), 0, "size {size}");
        }
    }

    #[test]
    fn block_survives_and_ages() {
        let mut rng = CellRng::new(1);
        let mut grid = Automaton::with_live_cells(8, &[(2, 2), (3, 2), (2, 3), (3, 3)]);
        for generation in 2..6 {
            grid.step(0.0, &mut rng);
            assert_eq!(grid.live_count(), 4);
            assert_eq!(grid.age(2, 2), generation);
            assert_eq!(grid.age(3, 3), generation);
        }
    }

    #[test]
    fn lonely_and_crowded_cells_die() {
        let mut rng = CellRng::new(1);
        let mut lonely = Automaton::with_live_cells(8, &[(4, 4)]);
        lonely.step(0.0, &mut rng);
        assert!(!lonely.is_alive(4, 4));
        assert_eq!(lonely.age(4, 4), 0);

        // Center of a plus shape has 4 neighbors.
        let mut crowded =
            Automaton::with_live_cells(8, &[(4, 4), (3, 4), (5, 4), (4, 3), (4, 5)]);
        crowded.step(0.0, &mut rng);
        assert!(!crowded.is_alive(4, 4));
        assert_eq!(crowded.age(4, 4), 0);
    }

    #[test]
    fn blinker_oscillates_with_birth_ages() {
        let mut rng = CellRng::new(1);
        let mut grid = Automaton::with_live_cells(8, &[(3, 4), (4, 4), (5, 4)]);
        grid.step(0.0, &mut rng);
        // Vertical phase: center survived, ends were born.
        assert!(grid.is_alive(4, 3) && grid.is_alive(4, 4) && grid.is_alive(4, 5));
        assert!(!grid.is_alive(3, 4) && !grid.is_alive(5, 4));
        assert_eq!(grid.age(4, 4), 2);
        assert_eq!(grid.age(4, 3), 1);
        assert_eq!(grid.age(4, 5), 1);
        assert_age_invariant(&grid);
    }

    #[test]
    fn neighbors_wrap_across_edges() {
        let mut rng = CellRng::new(1);
        // A blinker lying across the left/right seam of row 0.
        let mut grid = Automaton::with_live_cells(6, &[(5, 0), (0, 0), (1, 0)]);
        grid.step(0.0, &mut rng);
        assert!(grid.is_alive(0, 5), "birth above row 0 wraps to the bottom row");
        assert!(grid.is_alive(0, 0));
        assert!(grid.is_alive(0, 1));
        assert_eq!(grid.live_count(), 3);
    }

    #[test]
    fn full_mutation_flips_every_cell() {
        let mut rng = CellRng::new(7);
        let mut grid = Automaton::with_live_cells(4, &[(0, 0)]);
        grid.step(1.0, &mut rng);
        // The lone cell died by rule, then flipped back alive as a birth.
        assert!(grid.is_alive(0, 0));
        assert_eq!(grid.age(0, 0), 1);
        assert_eq!(grid.live_count(), 16);
        assert_age_invariant(&grid);
    }

    #[test]
    fn age_invariant_holds_under_mutation() {
        let mut rng = CellRng::new(99);
        let mut grid = Automaton::random(16, "invariant");
        for _ in 0..25 {
            grid.step(0.05, &mut rng);
            assert_age_invariant(&grid);
        }
    }

    #[test]
    fn random_grid_is_reproducible() {
        let a = Automaton::random(32, "dennewitz");
        let b = Automaton::random(32, "dennewitz");
        let c = Automaton::random(32, "other seed");
        assert_eq!(a, b);
        assert_ne!(a, c);
        let fill = a.live_count() as f64 / (32.0 * 32.0);
        assert!((0.1..0.26).contains(&fill), "unexpected fill {fill}");
        assert_age_invariant(&a);
    }

    #[test]
    fn set_cell_keeps_age_invariant() {
        let mut grid = Automaton::empty(4);
        grid.set_cell(-1, -1, true);
        assert!(grid.is_alive(3, 3));
        assert_eq!(grid.age(3, 3), 1);
        grid.set_cell(3, 3, false);
        assert_eq!(grid.age(3, 3), 0);
        assert_age_invariant(&grid);
    }

    #[test]
    fn centroid_of_dead_grid_is_none() {
        assert_eq!(Automaton::empty(8).centroid(), None);
        let grid = Automaton::with_live_cells(8, &[(1, 2), (3, 6)]);
        assert_eq!(grid.centroid(), Some((2.0, 4.0)));
    }

    #[test]
    fn summary_renders_rows() {
        let grid = Automaton::with_live_cells(3, &[(0, 0), (2, 1)]);
        assert_eq!(grid.summary(), "#..\n..#\n...\n");
    }
}
