// Sequencer configuration.
//
// Every knob a performance needs lives in `SequencerConfig`, loaded from
// JSON. Missing fields take their defaults, so a config file only has to
// name what it changes. `validate` resolves the scale id and range-checks
// every field; `Sequencer::new` runs it, so a bad scale id is reported
// before the first tick rather than in the middle of a performance.

use crate::midi;
use crate::scale::{self, ScaleDef};
use crate::sequencer::Treatment;
use crate::trajectory::ControlMode;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown scale `{0}`")]
    UnknownScale(String),
    #[error("tempo must be a positive BPM that fits a MIDI tempo event, got {0}")]
    InvalidTempo(f64),
    #[error("dynamic sensitivity must be within 0..=1, got {0}")]
    InvalidSensitivity(f64),
    #[error("mutation rate must be within 0..1, got {0}")]
    InvalidMutationRate(f64),
    #[error("grid size must be positive")]
    InvalidGridSize(usize),
    #[error("loop length must be at least one step")]
    InvalidLoopLength(usize),
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Everything that shapes a performance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Beats (quarter notes) per minute. A step is a sixteenth note.
    pub tempo: f64,
    /// Scale id, see `scale::SCALES`.
    pub scale: String,
    pub treatment: Treatment,
    pub control_mode: ControlMode,
    /// Width of the dynamic range, 0 (flat) to 1 (full).
    pub dynamic_sensitivity: f64,
    /// Per-cell probability of flipping each generation.
    pub mutation_rate: f64,
    /// Side length of the square grid.
    pub grid_size: usize,
    /// Steps captured by the loop buffer.
    pub loop_steps: usize,
    /// Replay the captured loop instead of scanning.
    pub loop_lock: bool,
    /// Seed string for the initial grid and the mutation stream.
    pub seed: String,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        SequencerConfig {
            tempo: 120.0,
            scale: "pentatonic".into(),
            treatment: Treatment::Arpeggio,
            control_mode: ControlMode::Centroid,
            dynamic_sensitivity: 0.7,
            mutation_rate: 0.001,
            grid_size: 32,
            loop_steps: 16,
            loop_lock: false,
            seed: "dennewitz".into(),
        }
    }
}

impl SequencerConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file. The result is not yet validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&json)?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Check every field and resolve the scale.
    pub fn validate(&self) -> Result<&'static ScaleDef, ConfigError> {
        if midi::micros_per_beat(self.tempo).is_none() {
            return Err(ConfigError::InvalidTempo(self.tempo));
        }
        if !(0.0..=1.0).contains(&self.dynamic_sensitivity) {
            return Err(ConfigError::InvalidSensitivity(self.dynamic_sensitivity));
        }
        if !(0.0..1.0).contains(&self.mutation_rate) {
            return Err(ConfigError::InvalidMutationRate(self.mutation_rate));
        }
        if self.grid_size == 0 {
            return Err(ConfigError::InvalidGridSize(self.grid_size));
        }
        if self.loop_steps == 0 {
            return Err(ConfigError::InvalidLoopLength(self.loop_steps));
        }
        scale::lookup(&self.scale).ok_or_else(|| ConfigError::UnknownScale(self.scale.clone()))
    }

    /// Seconds per sequencer step (a sixteenth note).
    pub fn step_duration(&self) -> f64 {
        60.0 / self.tempo / 4.0
    }
}
