// Consonance engine: which of the scanned candidates actually sound.
//
// Two stages with deliberately different search strategies:
//
// - `select_by_consonance` thins a scan down to a density-dependent number
//   of notes. It is greedy: seed with the highest candidate, then keep adding
//   whichever remaining candidate scores best against the notes picked so
//   far (pairwise consonance, register spread, cell age).
// - `voice_chord` picks the voicing actually played in chord treatment. With
//   at most `MAX_CANDIDATES` inputs there are no more than C(8,5) subsets of
//   any one size, so it enumerates all subsets of 3 to 5 notes in
//   lexicographic index order and keeps the best. Ties go to the subset
//   found first, which callers rely on.
//
// Interval weights are indexed by semitone distance mod 12. Inversions get
// similar weights (a major sixth scores like a major third).

use crate::scanner::NoteCandidate;

/// Consonance weight by semitone distance mod 12.
const INTERVAL_SCORES: [f64; 12] = [
    10.0, // unison / octave
    1.0,  // minor 2nd
    3.0,  // major 2nd
    5.0,  // minor 3rd
    6.0,  // major 3rd
    7.0,  // perfect 4th
    1.0,  // tritone
    8.0,  // perfect 5th
    4.0,  // minor 6th
    6.0,  // major 6th
    3.0,  // minor 7th
    2.0,  // major 7th
];

const SPREAD_WEIGHT: f64 = 0.3;
const AGE_WEIGHT: f64 = 0.2;
const MAX_AGE_BONUS: u32 = 5;

const MIN_VOICES: usize = 3;
const MAX_VOICES: usize = 5;
const MOVEMENT_WEIGHT: f64 = 1.5;
const COMMON_TONE_BONUS: f64 = 4.0;
/// Pitches below this (B3) are "low register" for the mud penalty.
const MUDDY_CEILING: u8 = 59;
/// Low-register pairs closer than this many semitones are penalized.
const MUDDY_SPACING: u8 = 3;
const MUDDY_PENALTY: f64 = 8.0;

/// Consonance weight of the interval between two semitone numbers.
pub fn interval_score(a: u8, b: u8) -> f64 {
    INTERVAL_SCORES[(a.abs_diff(b) % 12) as usize]
}

/// Sum of volume-weighted interval scores over every pair of notes.
pub fn pairwise_consonance<'a, I>(notes: I) -> f64
where
    I: IntoIterator<Item = &'a NoteCandidate>,
    I::IntoIter: Clone,
{
    let iter = notes.into_iter();
    let mut score = 0.0;
    for (i, a) in iter.clone().enumerate() {
        for b in iter.clone().skip(i + 1) {
            score += interval_score(a.pitch, b.pitch) * a.volume * b.volume;
        }
    }
    score
}

/// How many notes a scan at `density` should keep: 2 for a near-empty
/// window, growing by one per 1/24 of density, capped at `max_notes`.
pub fn target_note_count(max_notes: usize, density: f64) -> usize {
    let wanted = (2.0 + density * 24.0).round().max(2.0) as usize;
    wanted.min(max_notes)
}

/// Greedily pick a consonant subset of `candidates` (sorted highest first).
///
/// Returns the candidates unchanged when there are no more than the target
/// count. When `min_consonance` is positive, a candidate forming any interval
/// weaker than it with an already chosen note is skipped, and selection stops
/// early once nothing qualifies. The result is sorted highest first.
pub fn select_by_consonance(
    candidates: &[NoteCandidate],
    max_notes: usize,
    density: f64,
    min_consonance: f64,
) -> Vec<NoteCandidate> {
    let target = target_note_count(max_notes, density);
    if candidates.len() <= target {
        return candidates.to_vec();
    }
    if target == 0 {
        return Vec::new();
    }

    let mut selected = vec![candidates[0].clone()];
    let mut remaining: Vec<&NoteCandidate> = candidates[1..].iter().collect();

    while selected.len() < target && !remaining.is_empty() {
        let mean_pitch =
            selected.iter().map(|n| n.pitch as f64).sum::<f64>() / selected.len() as f64;

        let mut best: Option<(usize, f64)> = None;
        for (idx, candidate) in remaining.iter().enumerate() {
            if min_consonance > 0.0
                && selected
                    .iter()
                    .any(|s| interval_score(candidate.pitch, s.pitch) < min_consonance)
            {
                continue;
            }

            let mut score: f64 = selected
                .iter()
                .map(|s| interval_score(candidate.pitch, s.pitch) * candidate.volume * s.volume)
                .sum();
            score += (candidate.pitch as f64 - mean_pitch).abs() * SPREAD_WEIGHT;
            score += candidate.age.min(MAX_AGE_BONUS) as f64 * AGE_WEIGHT;

            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((idx, score));
            }
        }

        let Some((idx, _)) = best else {
            break;
        };
        selected.push(remaining.remove(idx).clone());
    }

    sort_descending(&mut selected);
    selected
}

/// A chord voicing and the score that won it.
#[derive(Debug, Clone, PartialEq)]
pub struct VoicedChord {
    /// Chosen notes, highest first.
    pub notes: Vec<NoteCandidate>,
    /// Raw pairwise consonance for small inputs, otherwise the full
    /// voicing score (consonance, voice leading and register penalties).
    pub consonance: f64,
}

impl VoicedChord {
    pub fn pitches(&self) -> Vec<u8> {
        self.notes.iter().map(|n| n.pitch).collect()
    }
}

/// Choose the best 3 to 5 note voicing of `candidates`, given the pitches
/// of the previous voicing (empty when there was none).
///
/// Three or fewer candidates come back as they are.
pub fn voice_chord(candidates: &[NoteCandidate], previous: &[u8]) -> VoicedChord {
    if candidates.len() <= MIN_VOICES {
        return VoicedChord {
            notes: candidates.to_vec(),
            consonance: pairwise_consonance(candidates),
        };
    }

    let mut best_indices: Vec<usize> = (0..MIN_VOICES).collect();
    let mut best_score = f64::NEG_INFINITY;

    let largest = MAX_VOICES.min(candidates.len());
    for size in MIN_VOICES..=largest {
        for indices in Combinations::new(candidates.len(), size) {
            let score = voicing_score(candidates, &indices, previous);
            if score > best_score {
                best_score = score;
                best_indices = indices;
            }
        }
    }

    let mut notes: Vec<NoteCandidate> =
        best_indices.iter().map(|&i| candidates[i].clone()).collect();
    sort_descending(&mut notes);
    VoicedChord {
        notes,
        consonance: best_score,
    }
}

fn voicing_score(candidates: &[NoteCandidate], indices: &[usize], previous: &[u8]) -> f64 {
    let subset = || indices.iter().map(|&i| &candidates[i]);
    let mut score = pairwise_consonance(subset());

    if !previous.is_empty() {
        let mut movement = 0u32;
        let mut common_tones = 0u32;
        for note in subset() {
            let mut nearest = u8::MAX;
            for &prev in previous {
                let dist = note.pitch.abs_diff(prev);
                nearest = nearest.min(dist);
                if dist == 0 {
                    common_tones += 1;
                }
            }
            movement += nearest as u32;
        }
        score -= movement as f64 * MOVEMENT_WEIGHT;
        score += common_tones as f64 * COMMON_TONE_BONUS;
    }

    for (i, a) in subset().enumerate() {
        for b in subset().skip(i + 1) {
            if a.pitch < MUDDY_CEILING
                && b.pitch < MUDDY_CEILING
                && a.pitch.abs_diff(b.pitch) < MUDDY_SPACING
            {
                score -= MUDDY_PENALTY;
            }
        }
    }

    score
}

fn sort_descending(notes: &mut [NoteCandidate]) {
    notes.sort_by(|a, b| b.frequency.total_cmp(&a.frequency));
}

/// k-element index combinations of 0..n in lexicographic order.
struct Combinations {
    n: usize,
    indices: Vec<usize>,
    done: bool,
}

impl Combinations {
    fn new(n: usize, k: usize) -> Self {
        Combinations {
            n,
            indices: (0..k).collect(),
            done: k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.done {
            return None;
        }
        let current = self.indices.clone();

        // Advance the rightmost index that still has room.
        let k = self.indices.len();
        match (0..k).rev().find(|&i| self.indices[i] != i + self.n - k) {
            Some(i) => {
                self.indices[i] += 1;
                for j in i + 1..k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
            }
            None => self.done = true,
        }
        Some(current)
    }
}
