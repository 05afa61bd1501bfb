// Scan-cursor trajectories.
//
// The scanner reads the grid around a cursor. Besides following the live-cell
// centroid or an externally supplied (manual) position, the cursor can be
// driven by one of three small dynamical systems, each advanced once per
// sequencer step:
//
// - `Wanderer`: drifts toward nearby live cells under inverse-square
//   attraction, with momentum and random jitter, at constant speed on the
//   torus.
// - `Attractor`: a Lorenz system integrated with a small Euler step; its x/y
//   excursions are mapped onto the grid.
// - `Bounce`: straight-line motion reflecting off the grid edges.
//
// Each generator is a small `Copy` value. `step` takes the current state
// (plus the automaton snapshot where needed) and returns the next state;
// nothing is shared between generators or between sequencers.

use crate::automaton::Automaton;
use dennewitz_prng::CellRng;
use serde::{Deserialize, Serialize};

/// Live cells farther than this (in cells, toroidal distance) exert no pull.
pub const WANDER_RADIUS: f64 = 8.0;
/// Cells per step travelled by the wanderer.
const WANDER_SPEED: f64 = 0.5;
/// Fraction of the previous velocity kept each step.
const VELOCITY_DECAY: f64 = 0.85;
const GRAVITY_WEIGHT: f64 = 0.4;
const JITTER_WEIGHT: f64 = 0.3;

/// Classic Lorenz parameters.
const LORENZ_SIGMA: f64 = 10.0;
const LORENZ_RHO: f64 = 28.0;
const LORENZ_BETA: f64 = 8.0 / 3.0;
const LORENZ_DT: f64 = 0.005;
const LORENZ_SUBSTEPS: usize = 3;
/// Typical half-ranges of the Lorenz x and y variables.
const LORENZ_X_RANGE: f64 = 20.0;
const LORENZ_Y_RANGE: f64 = 27.0;

/// Per-step displacement of the bouncing cursor.
const BOUNCE_VELOCITY: (f64, f64) = (0.3, 0.3);

/// Where the scan cursor comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    /// Mean position of all live cells (grid center when none).
    Centroid,
    /// Externally supplied position; switches the scanner to harmonic-space
    /// sampling.
    Manual,
    Wanderer,
    Attractor,
    Bounce,
}

impl ControlMode {
    pub const ALL: [ControlMode; 5] = [
        ControlMode::Centroid,
        ControlMode::Manual,
        ControlMode::Wanderer,
        ControlMode::Attractor,
        ControlMode::Bounce,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ControlMode::Centroid => "centroid",
            ControlMode::Manual => "manual",
            ControlMode::Wanderer => "wanderer",
            ControlMode::Attractor => "attractor",
            ControlMode::Bounce => "bounce",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

/// A continuous position on the grid, in cell units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanPosition {
    pub x: f64,
    pub y: f64,
}

impl ScanPosition {
    pub fn new(x: f64, y: f64) -> Self {
        ScanPosition { x, y }
    }

    pub fn center(size: usize) -> Self {
        let c = size as f64 / 2.0;
        ScanPosition { x: c, y: c }
    }
}

/// Signed shortest displacement from `from` to `to` on a ring of length `size`.
pub fn toroidal_delta(from: f64, to: f64, size: f64) -> f64 {
    let d = to - from;
    d - size * (d / size).round()
}

fn wrap_coord(v: f64, size: f64) -> f64 {
    let w = v.rem_euclid(size);
    // rem_euclid can round up to exactly `size` for tiny negative inputs.
    if w >= size { 0.0 } else { w }
}

/// Unit vector of summed inverse-square pulls toward live cells within
/// `WANDER_RADIUS` of `(x, y)`, or `(0, 0)` if nothing is in range.
pub fn gravity_direction(x: f64, y: f64, grid: &Automaton) -> (f64, f64) {
    let size = grid.size() as f64;
    let r2 = WANDER_RADIUS * WANDER_RADIUS;
    let (mut gx, mut gy) = (0.0, 0.0);
    for (cx, cy) in grid.live_cells() {
        let dx = toroidal_delta(x, cx as f64, size);
        let dy = toroidal_delta(y, cy as f64, size);
        let d2 = dx * dx + dy * dy;
        if d2 == 0.0 || d2 > r2 {
            continue;
        }
        // Unit direction scaled by 1/d^2.
        let d3 = d2 * d2.sqrt();
        gx += dx / d3;
        gy += dy / d3;
    }
    let mag = gx.hypot(gy);
    if mag > 0.0 { (gx / mag, gy / mag) } else { (0.0, 0.0) }
}

/// A cursor pulled toward nearby life.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wanderer {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

impl Wanderer {
    pub fn new(size: usize) -> Self {
        let c = ScanPosition::center(size);
        Wanderer {
            x: c.x,
            y: c.y,
            vx: WANDER_SPEED,
            vy: 0.0,
        }
    }

    pub fn position(&self) -> ScanPosition {
        ScanPosition::new(self.x, self.y)
    }

    pub fn step(&self, grid: &Automaton, rng: &mut CellRng) -> Wanderer {
        let size = grid.size() as f64;
        if size == 0.0 {
            return *self;
        }
        let (gx, gy) = gravity_direction(self.x, self.y, grid);
        let (jx, jy) = rng.unit_vector();

        let mut vx = VELOCITY_DECAY * self.vx + GRAVITY_WEIGHT * gx + JITTER_WEIGHT * jx;
        let mut vy = VELOCITY_DECAY * self.vy + GRAVITY_WEIGHT * gy + JITTER_WEIGHT * jy;
        let speed = vx.hypot(vy);
        if speed > 0.0 {
            vx *= WANDER_SPEED / speed;
            vy *= WANDER_SPEED / speed;
        } else {
            vx = WANDER_SPEED * jx;
            vy = WANDER_SPEED * jy;
        }

        Wanderer {
            x: wrap_coord(self.x + vx, size),
            y: wrap_coord(self.y + vy, size),
            vx,
            vy,
        }
    }
}

/// A Lorenz-attractor cursor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attractor {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub grid_x: f64,
    pub grid_y: f64,
}

impl Attractor {
    pub fn new(size: usize) -> Self {
        let c = ScanPosition::center(size);
        Attractor {
            x: 1.0,
            y: 1.0,
            z: 1.0,
            grid_x: c.x,
            grid_y: c.y,
        }
    }

    pub fn position(&self) -> ScanPosition {
        ScanPosition::new(self.grid_x, self.grid_y)
    }

    pub fn step(&self, size: usize) -> Attractor {
        let (mut x, mut y, mut z) = (self.x, self.y, self.z);
        for _ in 0..LORENZ_SUBSTEPS {
            let dx = LORENZ_SIGMA * (y - x);
            let dy = x * (LORENZ_RHO - z) - y;
            let dz = x * y - LORENZ_BETA * z;
            x += dx * LORENZ_DT;
            y += dy * LORENZ_DT;
            z += dz * LORENZ_DT;
        }

        let max = (size as f64 - 1.0).max(0.0);
        let map = |v: f64, range: f64| ((v + range) / (2.0 * range) * size as f64).clamp(0.0, max);
        Attractor {
            x,
            y,
            z,
            grid_x: map(x, LORENZ_X_RANGE),
            grid_y: map(y, LORENZ_Y_RANGE),
        }
    }
}

/// A cursor moving in a straight line and reflecting off the grid edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounce {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

impl Bounce {
    pub fn new(size: usize) -> Self {
        let c = ScanPosition::center(size);
        Bounce {
            x: c.x,
            y: c.y,
            vx: BOUNCE_VELOCITY.0,
            vy: BOUNCE_VELOCITY.1,
        }
    }

    pub fn position(&self) -> ScanPosition {
        ScanPosition::new(self.x, self.y)
    }

    pub fn step(&self, size: usize) -> Bounce {
        let max = (size as f64 - 1.0).max(0.0);
        let (x, vx) = reflect(self.x + self.vx, self.vx, max);
        let (y, vy) = reflect(self.y + self.vy, self.vy, max);
        Bounce { x, y, vx, vy }
    }
}

fn reflect(pos: f64, vel: f64, max: f64) -> (f64, f64) {
    if pos < 0.0 {
        ((-pos).min(max), -vel)
    } else if pos > max {
        ((2.0 * max - pos).max(0.0), -vel)
    } else {
        (pos, vel)
    }
}

/// The persistent state of every trajectory generator for one sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trajectories {
    pub wanderer: Wanderer,
    pub attractor: Attractor,
    pub bounce: Bounce,
}

impl Trajectories {
    pub fn new(size: usize) -> Self {
        Trajectories {
            wanderer: Wanderer::new(size),
            attractor: Attractor::new(size),
            bounce: Bounce::new(size),
        }
    }

    /// Advance the generator driving `mode`. Centroid and manual modes have
    /// no generator and leave the state untouched.
    pub fn advance(&mut self, mode: ControlMode, grid: &Automaton, rng: &mut CellRng) {
        match mode {
            ControlMode::Wanderer => self.wanderer = self.wanderer.step(grid, rng),
            ControlMode::Attractor => self.attractor = self.attractor.step(grid.size()),
            ControlMode::Bounce => self.bounce = self.bounce.step(grid.size()),
            ControlMode::Centroid | ControlMode::Manual => {}
        }
    }

    /// Current position of the generator driving `mode`, if it has one.
    pub fn position(&self, mode: ControlMode) -> Option<ScanPosition> {
        match mode {
            ControlMode::Wanderer => Some(self.wanderer.position()),
            ControlMode::Attractor => Some(self.attractor.position()),
            ControlMode::Bounce => Some(self.bounce.position()),
            ControlMode::Centroid | ControlMode::Manual => None,
        }
    }
}
