// Pitch systems: equal-tempered, quarter-tone and just-intonation scales.
//
// A scale is either a list of semitone offsets from the octave root (which
// may be fractional, as in the 24-EDO quarter-tone scale) or a list of
// frequency ratios over the octave root (just intonation). Both shapes are
// dispatched through the single `degree_to_frequency` operation.
//
// Octave numbering puts the root of octave `O` at semitone `12 * O` in the
// A440 numbering where semitone 69 is 440 Hz, so octave 5 starts at 60.
// Ratio scales use the same roots, which keeps them comparable with the
// semitone scales in the consonance tables.
//
// The scale table is fixed at startup. Configuration resolves a scale id
// once through `lookup`; the sequencer then holds a `&'static ScaleDef`.

use serde::Serialize;

/// Octave of the lowest scanned row. The scanner spans three octaves above it.
pub const BASE_OCTAVE: i32 = 3;

/// How many octaves the scanner spreads over the grid height.
pub const NUM_OCTAVES: usize = 3;

/// Reference pitch: semitone 69 sounds at 440 Hz.
const A4_HZ: f64 = 440.0;
const A4_SEMITONE: f64 = 69.0;

/// The two payload shapes a scale can have.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Tuning {
    /// Offsets in (possibly fractional) semitones from the octave root.
    Semitone(&'static [f64]),
    /// Frequency ratios relative to the octave root.
    Ratio(&'static [f64]),
}

/// A named, immutable scale definition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaleDef {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub tuning: Tuning,
}

const QUARTER_TONES: [f64; 24] = [
    0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5, 5.0, 5.5, 6.0, 6.5, 7.0, 7.5, 8.0, 8.5, 9.0,
    9.5, 10.0, 10.5, 11.0, 11.5,
];

/// Every scale the composer knows: twelve equal-tempered scales, two
/// just-intonation scales and the quarter-tone scale.
pub static SCALES: [ScaleDef; 15] = [
    ScaleDef {
        id: "diatonic",
        label: "Diatonic",
        description: "Standard 7-note major scale",
        tuning: Tuning::Semitone(&[0.0, 2.0, 4.0, 5.0, 7.0, 9.0, 11.0]),
    },
    ScaleDef {
        id: "pentatonic",
        label: "Pentatonic",
        description: "Universal 5-note scale",
        tuning: Tuning::Semitone(&[0.0, 2.0, 4.0, 7.0, 9.0]),
    },
    ScaleDef {
        id: "minor-pentatonic",
        label: "Minor Pentatonic",
        description: "Five notes with a minor third",
        tuning: Tuning::Semitone(&[0.0, 3.0, 5.0, 7.0, 10.0]),
    },
    ScaleDef {
        id: "chromatic",
        label: "Chromatic",
        description: "All 12 semitones",
        tuning: Tuning::Semitone(&[
            0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0,
        ]),
    },
    ScaleDef {
        id: "dorian",
        label: "Dorian",
        description: "Minor scale with raised 6th",
        tuning: Tuning::Semitone(&[0.0, 2.0, 3.0, 5.0, 7.0, 9.0, 10.0]),
    },
    ScaleDef {
        id: "phrygian",
        label: "Phrygian",
        description: "Minor scale with lowered 2nd",
        tuning: Tuning::Semitone(&[0.0, 1.0, 3.0, 5.0, 7.0, 8.0, 10.0]),
    },
    ScaleDef {
        id: "lydian",
        label: "Lydian",
        description: "Major scale with raised 4th",
        tuning: Tuning::Semitone(&[0.0, 2.0, 4.0, 6.0, 7.0, 9.0, 11.0]),
    },
    ScaleDef {
        id: "mixolydian",
        label: "Mixolydian",
        description: "Major scale with lowered 7th",
        tuning: Tuning::Semitone(&[0.0, 2.0, 4.0, 5.0, 7.0, 9.0, 10.0]),
    },
    ScaleDef {
        id: "aeolian",
        label: "Aeolian",
        description: "Natural minor",
        tuning: Tuning::Semitone(&[0.0, 2.0, 3.0, 5.0, 7.0, 8.0, 10.0]),
    },
    ScaleDef {
        id: "locrian",
        label: "Locrian",
        description: "Diminished fifth, lowered 2nd",
        tuning: Tuning::Semitone(&[0.0, 1.0, 3.0, 5.0, 6.0, 8.0, 10.0]),
    },
    ScaleDef {
        id: "harmonic-minor",
        label: "Harmonic Minor",
        description: "Natural minor with raised 7th",
        tuning: Tuning::Semitone(&[0.0, 2.0, 3.0, 5.0, 7.0, 8.0, 11.0]),
    },
    ScaleDef {
        id: "whole-tone",
        label: "Whole Tone",
        description: "Six equal whole steps",
        tuning: Tuning::Semitone(&[0.0, 2.0, 4.0, 6.0, 8.0, 10.0]),
    },
    ScaleDef {
        id: "just-simple",
        label: "Just Simple",
        description: "Pure ratios (3:2, 5:4, 6:5)",
        tuning: Tuning::Ratio(&[
            1.0,
            9.0 / 8.0,
            5.0 / 4.0,
            4.0 / 3.0,
            3.0 / 2.0,
            5.0 / 3.0,
            15.0 / 8.0,
        ]),
    },
    ScaleDef {
        id: "just-extended",
        label: "Just Extended",
        description: "Higher primes (7, 11, 13-limit)",
        tuning: Tuning::Ratio(&[
            1.0,
            8.0 / 7.0,
            7.0 / 6.0,
            11.0 / 8.0,
            3.0 / 2.0,
            13.0 / 8.0,
            7.0 / 4.0,
        ]),
    },
    ScaleDef {
        id: "quarter-tone",
        label: "Quarter-tone (24-EDO)",
        description: "24 equal divisions of the octave",
        tuning: Tuning::Semitone(&QUARTER_TONES),
    },
];

/// Find a scale by id.
pub fn lookup(id: &str) -> Option<&'static ScaleDef> {
    SCALES.iter().find(|s| s.id == id)
}

impl ScaleDef {
    /// Number of degrees per octave.
    pub fn len(&self) -> usize {
        match self.tuning {
            Tuning::Semitone(offsets) => offsets.len(),
            Tuning::Ratio(ratios) => ratios.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the scale cannot be played exactly on a 12-tone keyboard:
    /// any ratio scale, or any fractional semitone offset.
    pub fn is_microtonal(&self) -> bool {
        match self.tuning {
            Tuning::Ratio(_) => true,
            Tuning::Semitone(offsets) => offsets.iter().any(|o| o.fract() != 0.0),
        }
    }

    /// Frequency (Hz) and nearest semitone number of `degree` in `octave`.
    ///
    /// Degrees past the end of the scale wrap within the same octave. The
    /// semitone number saturates to 0..=127.
    pub fn degree_to_frequency(&self, octave: i32, degree: usize) -> (f64, u8) {
        let root = 12.0 * octave as f64;
        match self.tuning {
            Tuning::Semitone(offsets) => {
                let semitone = offsets[degree % offsets.len()] + root;
                (semitone_to_frequency(semitone), clamp_semitone(semitone.round()))
            }
            Tuning::Ratio(ratios) => {
                let freq = semitone_to_frequency(root) * ratios[degree % ratios.len()];
                (freq, nearest_semitone(freq))
            }
        }
    }
}

/// Frequency of a (possibly fractional) semitone number.
pub fn semitone_to_frequency(semitone: f64) -> f64 {
    A4_HZ * ((semitone - A4_SEMITONE) / 12.0).exp2()
}

/// Exact (fractional) semitone number of a frequency.
pub fn frequency_to_semitone(freq: f64) -> f64 {
    12.0 * (freq / A4_HZ).log2() + A4_SEMITONE
}

/// Nearest semitone number of a frequency, saturated to 0..=127.
/// Non-positive and non-finite frequencies map to 0.
pub fn nearest_semitone(freq: f64) -> u8 {
    if freq.is_nan() || freq <= 0.0 || freq.is_infinite() {
        return 0;
    }
    clamp_semitone(frequency_to_semitone(freq).round())
}

fn clamp_semitone(semitone: f64) -> u8 {
    semitone.clamp(0.0, 127.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale(id: &str) -> &'static ScaleDef {
        lookup(id).unwrap()
    }

    #[test]
    fn table_has_expected_shape() {
        let ratio = SCALES.iter().filter(|s| matches!(s.tuning, Tuning::Ratio(_))).count();
        assert_eq!(SCALES.len(), 15);
        assert_eq!(ratio, 2);
        assert!(SCALES.iter().all(|s| !s.is_empty()));
        assert_eq!(scale("quarter-tone").len(), 24);
    }

    #[test]
    fn unknown_scale_does_not_resolve() {
        assert!(lookup("bohlen-pierce").is_none());
    }

    #[test]
    fn a440_is_sixth_degree_of_octave_five() {
        let (freq, semitone) = scale("diatonic").degree_to_frequency(5, 5);
        assert!((freq - 440.0).abs() < 1e-9);
        assert_eq!(semitone, 69);
    }

    #[test]
    fn degrees_wrap_within_octave() {
        let s = scale("pentatonic");
        assert_eq!(s.degree_to_frequency(4, 7), s.degree_to_frequency(4, 2));
    }

    #[test]
    fn ratio_scale_roots_match_semitone_roots() {
        for octave in 3..7 {
            let (just, _) = scale("just-simple").degree_to_frequency(octave, 0);
            let (tempered, _) = scale("diatonic").degree_to_frequency(octave, 0);
            assert!((just - tempered).abs() < 1e-9, "octave {octave}");
        }
    }

    #[test]
    fn just_fifth_is_three_halves_of_root() {
        let s = scale("just-simple");
        let (root, _) = s.degree_to_frequency(5, 0);
        let (fifth, semitone) = s.degree_to_frequency(5, 4);
        assert!((fifth / root - 1.5).abs() < 1e-12);
        // 3:2 is two cents sharp of an equal-tempered fifth.
        assert_eq!(semitone, 67);
    }

    #[test]
    fn quarter_tone_degrees_are_fractional() {
        let s = scale("quarter-tone");
        let (freq, _) = s.degree_to_frequency(5, 1);
        assert!((frequency_to_semitone(freq) - 60.5).abs() < 1e-9);
    }

    #[test]
    fn microtonal_detection() {
        assert!(!scale("diatonic").is_microtonal());
        assert!(!scale("chromatic").is_microtonal());
        assert!(scale("just-extended").is_microtonal());
        assert!(scale("quarter-tone").is_microtonal());
    }

    #[test]
    fn nearest_semitone_saturates() {
        assert_eq!(nearest_semitone(440.0), 69);
        assert_eq!(nearest_semitone(1.0), 0);
        assert_eq!(nearest_semitone(100_000.0), 127);
        assert_eq!(nearest_semitone(0.0), 0);
        assert_eq!(nearest_semitone(f64::NAN), 0);
    }
}
