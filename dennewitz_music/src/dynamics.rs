// Loudness from density.
//
// Density is squashed through a soft knee (silent below 0.03, saturated
// above 0.5, a 0.7 power curve between) and mapped onto a volume band
// centered on 0.5 whose width is the sensitivity: at 0 everything plays at
// 0.5, at 1 the band spans 0.05..0.95. Sudden density changes and the
// metric position add accents on top of the base velocity.

use serde::{Deserialize, Serialize};

const SILENCE: f64 = 0.03;
const SATURATION: f64 = 0.5;
const KNEE: f64 = 0.7;
const CENTER_VOLUME: f64 = 0.5;
const HALF_RANGE: f64 = 0.45;
/// Sensitivities at or below this never rest on silence.
const REST_SENSITIVITY: f64 = 0.3;

/// (density change threshold, accent), largest first.
const CHANGE_ACCENTS: [(f64, f64); 3] = [(0.1, 30.0), (0.06, 20.0), (0.03, 10.0)];
const BAR_ACCENT: f64 = 12.0;
const BEAT_ACCENT: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dynamics {
    /// Overall volume in 0..1.
    pub volume: f64,
    /// MIDI velocity, 0..=127.
    pub velocity: u8,
    /// True when the step should be silent.
    pub rest: bool,
}

/// Density mapped onto 0..1 through the soft knee.
pub fn normalize_density(density: f64) -> f64 {
    if density < SILENCE {
        0.0
    } else if density > SATURATION {
        1.0
    } else {
        ((density - SILENCE) / (SATURATION - SILENCE)).powf(KNEE)
    }
}

/// Dynamics for one step. `previous` is the density of the previous step,
/// if there was one; `step` counts sixteenth notes from the start.
pub fn compute_dynamics(
    density: f64,
    previous: Option<f64>,
    step: u64,
    sensitivity: f64,
) -> Dynamics {
    let half_range = sensitivity * HALF_RANGE;
    let volume = CENTER_VOLUME - half_range + normalize_density(density) * half_range * 2.0;

    let accent = previous
        .map(|prev| (density - prev).abs())
        .and_then(|change| CHANGE_ACCENTS.iter().find(|(threshold, _)| change > *threshold))
        .map_or(0.0, |&(_, accent)| accent);

    let metric = if step % 16 == 0 {
        BAR_ACCENT
    } else if step % 4 == 0 {
        BEAT_ACCENT
    } else {
        0.0
    };

    let velocity = (volume * 100.0).round() + ((accent + metric) * sensitivity).round();

    Dynamics {
        volume,
        velocity: velocity.clamp(0.0, 127.0) as u8,
        rest: density < SILENCE && sensitivity > REST_SENSITIVITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn density_at_threshold_does_not_rest() {
        let d = compute_dynamics(0.03, Some(0.03), 0, 0.5);
        assert!(!d.rest);
        assert!((d.volume - 0.275).abs() < 1e-12);
    }

    #[test]
    fn silence_rests_only_when_sensitive() {
        assert!(compute_dynamics(0.0, None, 1, 0.31).rest);
        assert!(!compute_dynamics(0.0, None, 1, 0.3).rest);
        assert!(!compute_dynamics(0.0, None, 1, 0.0).rest);
    }

    #[test]
    fn zero_sensitivity_is_flat() {
        for density in [0.0, 0.1, 0.4, 0.9] {
            let d = compute_dynamics(density, Some(0.0), 16, 0.0);
            assert_eq!(d.volume, 0.5);
            assert_eq!(d.velocity, 50);
        }
    }

    #[test]
    fn full_sensitivity_spans_band() {
        let quiet = compute_dynamics(0.01, None, 1, 1.0);
        let loud = compute_dynamics(0.8, None, 1, 1.0);
        assert!((quiet.volume - 0.05).abs() < 1e-12);
        assert!((loud.volume - 0.95).abs() < 1e-12);
        assert_eq!(loud.velocity, 95);
    }

    #[test]
    fn knee_is_monotonic() {
        let mut last = 0.0;
        for i in 0..=60 {
            let n = normalize_density(i as f64 / 100.0);
            assert!(n >= last);
            last = n;
        }
        assert_eq!(normalize_density(0.5), 1.0);
    }

    #[test]
    fn density_jumps_accent() {
        let base = |prev| compute_dynamics(0.2, prev, 1, 1.0).velocity;
        let none = base(None);
        assert_eq!(base(Some(0.2)), none);
        assert_eq!(base(Some(0.16)), none + 10);
        assert_eq!(base(Some(0.12)), none + 20);
        assert_eq!(base(Some(0.05)), none + 30);
    }

    #[test]
    fn metric_accents() {
        let at = |step| compute_dynamics(0.2, None, step, 1.0).velocity;
        assert_eq!(at(16), at(1) + 12);
        assert_eq!(at(4), at(1) + 6);
        assert_eq!(at(0), at(32));
    }

    #[test]
    fn velocity_saturates() {
        let d = compute_dynamics(1.0, Some(0.0), 0, 1.0);
        assert_eq!(d.velocity, 127);
    }
}
