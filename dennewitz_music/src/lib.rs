// Dennewitz: a generative sequencer that plays Conway's Game of Life.
//
// A toroidal Life grid evolves under the sequencer clock. Each step, a scan
// cursor samples the grid near its position; live cells become pitches in
// the active scale, cell age becomes note length and local density drives
// how many notes sound and how loud. Selected notes are played as voiced
// chords, a melodic line or an arpeggio, and can be recorded to a Standard
// MIDI File with pitch bends for microtonal scales.
//
// Architecture:
// - automaton.rs: B3/S23 grid with per-cell ages and random mutation
// - scale.rs: Equal-tempered, quarter-tone and just-intonation scales
// - trajectory.rs: Scan cursor sources (centroid, manual, wanderer,
//   Lorenz attractor, bounce)
// - scanner.rs: Grid window -> pitch candidates + density
// - consonance.rs: Greedy note selection and exhaustive chord voicing
// - melody.rs: Melodic line state machine
// - arpeggio.rs: Density-driven arpeggio patterns
// - dynamics.rs: Density -> volume, velocity, rests
// - midi.rs: Event recording and SMF export (via `midly`)
// - sequencer.rs: Per-step orchestration, loop lock and loop export
// - config.rs: JSON configuration and validation
//
// Randomness comes only from `dennewitz_prng`, so a config (including its
// seed string) fully determines a performance.

pub mod arpeggio;
pub mod automaton;
pub mod config;
pub mod consonance;
pub mod dynamics;
pub mod melody;
pub mod midi;
pub mod scale;
pub mod scanner;
pub mod sequencer;
pub mod trajectory;
