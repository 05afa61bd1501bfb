// The scanner: turning grid state around the cursor into pitch candidates.
//
// Two sampling strategies, picked by control mode:
//
// - Column scan (every automatic mode): a three-column, full-height window
//   centered on the cursor's rounded column. Each live cell becomes a scale
//   degree by its height, spanning `NUM_OCTAVES` octaves from the bottom row
//   to the top. The center column plays at full volume, the flanks softer.
// - Harmonic space (manual mode): the cursor's height picks a root degree
//   and its horizontal distance from the center opens the voicing. The
//   fifteen degrees around the root are candidates, but each only sounds if
//   a live cell sits near the grid row that degree maps to.
//
// Candidates are deduplicated at cent resolution, sorted from highest to
// lowest and capped at `MAX_CANDIDATES`, which bounds the search done later
// by the consonance engine.

use crate::automaton::{Automaton, wrap};
use crate::scale::{BASE_OCTAVE, NUM_OCTAVES, ScaleDef, frequency_to_semitone};
use crate::trajectory::{ControlMode, ScanPosition, Trajectories};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Most candidates a single scan can yield.
pub const MAX_CANDIDATES: usize = 8;

const CENTER_VOLUME: f64 = 1.0;
const FLANK_VOLUME: f64 = 0.6;

/// Half-width of the square window used for harmonic-space density.
const DENSITY_RADIUS: isize = 5;
/// Degrees either side of the root considered in harmonic space.
const DEGREE_SPAN: isize = 7;
/// Rows searched (nearest first) when gating a harmonic-space degree.
const GATE_ROWS: [isize; 7] = [0, -1, 1, -2, 2, -3, 3];
const GATE_COLS: [isize; 3] = [0, -1, 1];

/// A pitch proposed by one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteCandidate {
    /// Exact frequency in Hz.
    pub frequency: f64,
    /// Nearest semitone number (69 = A440).
    pub pitch: u8,
    /// Loudness weight in (0, 1].
    pub volume: f64,
    /// Grid row of the cell that produced the note.
    pub row: usize,
    /// Grid column of the cell that produced the note.
    pub col: usize,
    /// Age of that cell in generations.
    pub age: u32,
}

/// Everything one scan produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Candidates, highest frequency first.
    pub notes: Vec<NoteCandidate>,
    /// The cursor position that was scanned.
    pub position: ScanPosition,
    /// Live cells in the sampled window divided by the window's area.
    pub density: f64,
    /// Live cells counted in the sampled window.
    pub live_count: usize,
}

/// Decide where to scan. Manual mode uses the supplied position, trajectory
/// modes use their generator, and centroid mode (or a generator-less mode)
/// follows the mean of the live cells, falling back to the grid center.
pub fn resolve_position(
    mode: ControlMode,
    grid: &Automaton,
    manual: ScanPosition,
    trajectories: &Trajectories,
) -> ScanPosition {
    if mode == ControlMode::Manual {
        return manual;
    }
    if let Some(pos) = trajectories.position(mode) {
        return pos;
    }
    grid.centroid()
        .map(|(x, y)| ScanPosition::new(x, y))
        .unwrap_or_else(|| ScanPosition::center(grid.size()))
}

/// Scan the grid at `position` using the sampling strategy of `mode`.
pub fn scan(
    grid: &Automaton,
    scale: &ScaleDef,
    mode: ControlMode,
    position: ScanPosition,
) -> ScanResult {
    if grid.size() == 0 || scale.is_empty() {
        return ScanResult {
            notes: Vec::new(),
            position,
            density: 0.0,
            live_count: 0,
        };
    }
    match mode {
        ControlMode::Manual => scan_harmonic_space(grid, scale, position),
        _ => scan_columns(grid, scale, position),
    }
}

/// Degree index (0 at the bottom, `3 * scale_len - 1` at the top) for a
/// vertical position.
fn note_index(y: f64, size: usize, scale_len: usize) -> usize {
    let span = scale_len * NUM_OCTAVES;
    let raw = ((1.0 - y / size as f64) * span as f64).floor();
    (raw.max(0.0) as usize).min(span - 1)
}

/// Grid row whose cells map to degree index `index`. Indices outside the
/// scanned range wrap around the torus.
fn degree_row(index: isize, size: usize, scale_len: usize) -> isize {
    let span = (scale_len * NUM_OCTAVES) as f64;
    ((1.0 - (index as f64 + 0.5) / span) * size as f64).floor() as isize
}

fn candidate(
    grid: &Automaton,
    scale: &ScaleDef,
    index: isize,
    lift: i32,
    volume: f64,
    (col, row): (usize, usize),
) -> NoteCandidate {
    let len = scale.len() as isize;
    let octave = BASE_OCTAVE + index.div_euclid(len) as i32 + lift;
    let degree = index.rem_euclid(len) as usize;
    let (frequency, pitch) = scale.degree_to_frequency(octave, degree);
    NoteCandidate {
        frequency,
        pitch,
        volume,
        row,
        col,
        age: grid.age(col as isize, row as isize),
    }
}

fn scan_columns(grid: &Automaton, scale: &ScaleDef, position: ScanPosition) -> ScanResult {
    let size = grid.size();
    let center = position.x.round() as isize;
    let mut notes = Vec::new();
    let mut live_count: usize = 0;

    for dc in -1..=1 {
        let col = wrap(center + dc, size);
        let volume = if dc == 0 { CENTER_VOLUME } else { FLANK_VOLUME };
        for row in 0..size {
            if !grid.is_alive(col as isize, row as isize) {
                continue;
            }
            live_count += 1;
            let index = note_index(row as f64, size, scale.len()) as isize;
            notes.push(candidate(grid, scale, index, 0, volume, (col, row)));
        }
    }

    ScanResult {
        notes: finish(notes),
        position,
        density: live_count as f64 / (3 * size) as f64,
        live_count,
    }
}

fn scan_harmonic_space(grid: &Automaton, scale: &ScaleDef, position: ScanPosition) -> ScanResult {
    let size = grid.size();
    let half = size as f64 / 2.0;
    let cx = position.x.round() as isize;
    let cy = position.y.round() as isize;
    let root = note_index(position.y.clamp(0.0, size as f64), size, scale.len()) as isize;
    let spread = ((position.x - half).abs() / half).clamp(0.0, 1.0);

    let mut notes = Vec::new();
    for k in -DEGREE_SPAN..=DEGREE_SPAN {
        let index = root + k;
        let row = degree_row(index, size, scale.len());
        let Some(gate) = gate_cell(grid, cx, row) else {
            continue;
        };
        // Wider cursor positions push the upper degrees up an octave.
        let lift = if k > 0 { (spread * k as f64 / 4.0).floor() as i32 } else { 0 };
        let volume = if k >= 0 && k % 2 == 0 { CENTER_VOLUME } else { FLANK_VOLUME };
        notes.push(candidate(grid, scale, index, lift, volume, gate));
    }

    let mut live_count: usize = 0;
    for dy in -DENSITY_RADIUS..=DENSITY_RADIUS {
        for dx in -DENSITY_RADIUS..=DENSITY_RADIUS {
            if grid.is_alive(cx + dx, cy + dy) {
                live_count += 1;
            }
        }
    }
    let side = (2 * DENSITY_RADIUS + 1) as f64;

    ScanResult {
        notes: finish(notes),
        position,
        // Grids smaller than the window count wrapped cells twice.
        density: (live_count as f64 / (side * side)).min(1.0),
        live_count,
    }
}

/// Nearest live cell (as `(col, row)`) within 3 rows and 1 column of
/// `(col, row)`.
fn gate_cell(grid: &Automaton, col: isize, row: isize) -> Option<(usize, usize)> {
    let size = grid.size();
    GATE_ROWS.iter().find_map(|&dy| {
        GATE_COLS
            .iter()
            .find(|&&dx| grid.is_alive(col + dx, row + dy))
            .map(|&dx| (wrap(col + dx, size), wrap(row + dy, size)))
    })
}

/// Drop candidates within a cent of an earlier one, sort highest first and
/// cap the list.
fn finish(notes: Vec<NoteCandidate>) -> Vec<NoteCandidate> {
    let mut seen = HashSet::new();
    let mut unique: Vec<NoteCandidate> = notes
        .into_iter()
        .filter(|n| seen.insert((frequency_to_semitone(n.frequency) * 100.0).round() as i64))
        .collect();
    unique.sort_by(|a, b| b.frequency.total_cmp(&a.frequency));
    unique.truncate(MAX_CANDIDATES);
    unique
}
