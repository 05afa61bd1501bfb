// Melodic line: one note (or a rest) per step, chosen from the selected
// candidates by a small state machine.
//
// The state remembers the last pitch, the preferred direction of motion and
// two counters. Stepwise motion scores best, continuing in the current
// direction earns a bonus, and after a long run without a leap the machine
// starts rewarding one. Rests are forced when the line has run long, or
// sooner if the texture has thinned out.
//
// `MelodicState` is a plain value owned by whoever renders the line, so
// several independent lines can run side by side.

use crate::consonance::interval_score;
use crate::scanner::NoteCandidate;
use serde::{Deserialize, Serialize};

/// Largest interval (semitones) still counted as stepwise.
const STEP_LIMIT: u8 = 4;
const SKIP_LIMIT: u8 = 7;
const DIRECTION_BONUS: f64 = 2.0;
const LEAP_BONUS: f64 = 4.0;
const LEAP_AFTER_STEPS: u32 = 8;
const LEAP_MIN_DISTANCE: u8 = 5;
const CONSONANCE_WEIGHT: f64 = 0.5;

/// Rest if sparse (fewer than `SPARSE_CANDIDATES`) after this many notes.
const SPARSE_REST_AFTER: u32 = 6;
const SPARSE_CANDIDATES: usize = 3;
/// Rest unconditionally after this many notes.
const FORCED_REST_AFTER: u32 = 10;

/// Direction of melodic motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

/// Persistent state of one melodic line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MelodicState {
    pub last_pitch: Option<u8>,
    pub direction: Direction,
    pub steps_since_rest: u32,
    pub steps_since_leap: u32,
}

impl Default for MelodicState {
    fn default() -> Self {
        MelodicState {
            last_pitch: None,
            direction: Direction::Up,
            steps_since_rest: 0,
            steps_since_leap: 0,
        }
    }
}

/// The outcome of one melodic step.
#[derive(Debug, Clone, PartialEq)]
pub struct MelodicChoice {
    /// The chosen note, or `None` for a rest.
    pub note: Option<NoteCandidate>,
    /// Multiplier for the base note duration.
    pub duration: f64,
}

impl MelodicChoice {
    fn rest() -> Self {
        MelodicChoice {
            note: None,
            duration: 1.0,
        }
    }

    fn play(note: &NoteCandidate) -> Self {
        MelodicChoice {
            note: Some(note.clone()),
            duration: age_to_duration(note.age),
        }
    }
}

/// Duration multiplier for a note from a cell of the given age: long-lived
/// cells hold longer.
pub fn age_to_duration(age: u32) -> f64 {
    if age > 3 {
        1.5
    } else if age > 1 {
        1.0
    } else {
        0.6
    }
}

/// Advance the line by one step. `candidates` should be sorted highest first.
pub fn choose_melodic_note(
    candidates: &[NoteCandidate],
    state: &mut MelodicState,
) -> MelodicChoice {
    if candidates.is_empty()
        || (state.steps_since_rest > SPARSE_REST_AFTER && candidates.len() < SPARSE_CANDIDATES)
        || state.steps_since_rest > FORCED_REST_AFTER
    {
        state.steps_since_rest = 0;
        return MelodicChoice::rest();
    }

    let Some(last) = state.last_pitch else {
        let note = &candidates[candidates.len() / 2];
        state.last_pitch = Some(note.pitch);
        state.steps_since_rest += 1;
        state.steps_since_leap += 1;
        return MelodicChoice::play(note);
    };

    let mut best = &candidates[0];
    let mut best_score = f64::NEG_INFINITY;
    for candidate in candidates {
        let score = score_candidate(candidate, last, state);
        if score > best_score {
            best_score = score;
            best = candidate;
        }
    }

    if best.pitch != last {
        state.direction = if best.pitch > last {
            Direction::Up
        } else {
            Direction::Down
        };
    }
    if best.pitch.abs_diff(last) > STEP_LIMIT {
        state.steps_since_leap = 0;
    } else {
        state.steps_since_leap += 1;
    }
    state.last_pitch = Some(best.pitch);
    state.steps_since_rest += 1;

    MelodicChoice::play(best)
}

fn score_candidate(candidate: &NoteCandidate, last: u8, state: &MelodicState) -> f64 {
    let dist = candidate.pitch.abs_diff(last);
    let mut score = if dist <= STEP_LIMIT {
        10.0 - dist as f64
    } else if dist <= SKIP_LIMIT {
        3.0
    } else {
        1.0
    };

    let continues = match state.direction {
        Direction::Up => candidate.pitch > last,
        Direction::Down => candidate.pitch < last,
    };
    if continues {
        score += DIRECTION_BONUS;
    }
    if state.steps_since_leap > LEAP_AFTER_STEPS && dist > LEAP_MIN_DISTANCE {
        score += LEAP_BONUS;
    }
    score += interval_score(candidate.pitch, last) * CONSONANCE_WEIGHT;

    score * candidate.volume
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(pitch: u8, age: u32) -> NoteCandidate {
        NoteCandidate {
            frequency: crate::scale::semitone_to_frequency(pitch as f64),
            pitch,
            volume: 1.0,
            row: 0,
            col: 0,
            age,
        }
    }

    fn state_at(last: u8, direction: Direction) -> MelodicState {
        MelodicState {
            last_pitch: Some(last),
            direction,
            steps_since_rest: 1,
            steps_since_leap: 1,
        }
    }

    #[test]
    fn empty_input_rests_and_resets() {
        let mut state = state_at(60, Direction::Up);
        state.steps_since_rest = 5;
        let choice = choose_melodic_note(&[], &mut state);
        assert_eq!(choice, MelodicChoice { note: None, duration: 1.0 });
        assert_eq!(state.steps_since_rest, 0);
        assert_eq!(state.last_pitch, Some(60));
    }

    #[test]
    fn first_note_takes_middle_candidate() {
        let mut state = MelodicState::default();
        let notes = vec![note(72, 0), note(67, 4), note(64, 0), note(60, 0)];
        let choice = choose_melodic_note(&notes, &mut state);
        assert_eq!(choice.note.map(|n| n.pitch), Some(64));
        assert_eq!(choice.duration, 0.6);
        assert_eq!(state.last_pitch, Some(64));
        assert_eq!(state.steps_since_rest, 1);
        assert_eq!(state.steps_since_leap, 1);
    }

    #[test]
    fn prefers_steps_in_current_direction() {
        let notes = vec![note(62, 0), note(58, 0)];
        // Both two semitones away; direction decides.
        let mut up = state_at(60, Direction::Up);
        assert_eq!(choose_melodic_note(&notes, &mut up).note.map(|n| n.pitch), Some(62));
        let mut down = state_at(60, Direction::Down);
        assert_eq!(choose_melodic_note(&notes, &mut down).note.map(|n| n.pitch), Some(58));
        assert_eq!(down.direction, Direction::Down);
    }

    #[test]
    fn repeated_pitch_keeps_direction() {
        let notes = vec![note(60, 0)];
        let mut state = state_at(60, Direction::Down);
        choose_melodic_note(&notes, &mut state);
        assert_eq!(state.direction, Direction::Down);
        assert_eq!(state.steps_since_leap, 2);
    }

    #[test]
    fn long_runs_invite_a_leap() {
        // 77: 1 (distance) + 2 (direction) + 5 (octave) = 8
        // 66: 9 + 2 + 0.5 = 11.5
        let notes = vec![note(77, 0), note(66, 0)];
        let mut fresh = state_at(65, Direction::Up);
        assert_eq!(choose_melodic_note(&notes, &mut fresh).note.map(|n| n.pitch), Some(66));

        // After a long stepwise run, an octave-and-a-bit leap wins instead.
        let notes = vec![note(77, 0), note(67, 0)];
        let mut stale = state_at(65, Direction::Down);
        stale.steps_since_leap = 9;
        // 77: 1 + 4 + 5 (octave) = 10; 67: 8 + 1.5 = 9.5
        let choice = choose_melodic_note(&notes, &mut stale);
        assert_eq!(choice.note.map(|n| n.pitch), Some(77));
        assert_eq!(stale.steps_since_leap, 0);
        assert_eq!(stale.direction, Direction::Up);
    }

    #[test]
    fn volume_scales_preference() {
        let mut quiet = note(62, 0);
        quiet.volume = 0.6;
        let notes = vec![quiet, note(57, 0)];
        let mut state = state_at(60, Direction::Up);
        // 62: (8 + 2 + 1.5) * 0.6 = 6.9; 57: 7 + 2.5 = 9.5
        assert_eq!(choose_melodic_note(&notes, &mut state).note.map(|n| n.pitch), Some(57));
    }

    #[test]
    fn sparse_input_forces_rest_after_six() {
        let notes = vec![note(62, 0), note(60, 0)];
        let mut state = state_at(60, Direction::Up);
        state.steps_since_rest = 7;
        assert!(choose_melodic_note(&notes, &mut state).note.is_none());
        assert_eq!(state.steps_since_rest, 0);

        let dense = vec![note(64, 0), note(62, 0), note(60, 0)];
        state.steps_since_rest = 7;
        assert!(choose_melodic_note(&dense, &mut state).note.is_some());
    }

    #[test]
    fn long_lines_are_broken_by_rest() {
        let notes = vec![note(64, 0), note(62, 0), note(60, 0)];
        let mut state = MelodicState::default();
        let played = (0..20)
            .take_while(|_| choose_melodic_note(&notes, &mut state).note.is_some())
            .count();
        assert_eq!(played, 11);
        assert_eq!(state.steps_since_rest, 0);
    }

    #[test]
    fn duration_follows_age() {
        assert_eq!(age_to_duration(0), 0.6);
        assert_eq!(age_to_duration(1), 0.6);
        assert_eq!(age_to_duration(2), 1.0);
        assert_eq!(age_to_duration(3), 1.0);
        assert_eq!(age_to_duration(4), 1.5);
    }
}
