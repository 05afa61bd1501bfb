// The step sequencer: one tick of the whole pipeline.
//
// Each tick is a sixteenth note. In order, a tick:
//
// 1. advances the automaton by one generation on every fourth step,
// 2. advances the trajectory generator of the active control mode,
// 3. resolves the scan position and scans the grid (or, with loop lock
//    engaged and a full loop captured, replays the next captured scan),
// 4. renders the scan with the configured treatment into scheduled notes.
//
// Rendering is split out into `Voicing`, which carries only the state the
// treatments need between steps (previous chord, melodic line, previous
// density). `export_loop` uses a fresh `Voicing` to re-render a captured
// loop from step 0, independent of the live performance.
//
// The sequencer never reads a clock. The caller passes the time of each
// tick and decides what to do with the scheduled notes; `record_notes`
// feeds them to an `EventRecorder`.

use crate::arpeggio::{self, ArpPattern};
use crate::automaton::Automaton;
use crate::config::{ConfigError, SequencerConfig};
use crate::consonance::{select_by_consonance, voice_chord};
use crate::dynamics::{Dynamics, compute_dynamics};
use crate::melody::{MelodicState, choose_melodic_note};
use crate::midi::{EventRecorder, ExportError, micros_per_beat};
use crate::scale::ScaleDef;
use crate::scanner::{MAX_CANDIDATES, NoteCandidate, ScanResult, resolve_position, scan};
use crate::trajectory::{ControlMode, ScanPosition, Trajectories};
use dennewitz_prng::CellRng;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Steps per automaton generation.
pub const STEPS_PER_GENERATION: u64 = 4;

const CHORD_STEPS: f64 = 2.0;
const LINE_STEPS: f64 = 3.0;
const ARPEGGIO_STEPS: f64 = 2.0;

/// How the selected notes of a step are played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Treatment {
    /// A voiced chord of 3 to 5 notes.
    Chord,
    /// A single melodic line.
    Line,
    /// One note per step walking an arpeggio pattern.
    Arpeggio,
}

impl Treatment {
    pub const ALL: [Treatment; 3] = [Treatment::Chord, Treatment::Line, Treatment::Arpeggio];

    pub fn name(self) -> &'static str {
        match self {
            Treatment::Chord => "chord",
            Treatment::Line => "line",
            Treatment::Arpeggio => "arpeggio",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

/// A note the caller should play.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledNote {
    pub frequency: f64,
    pub pitch: u8,
    /// Start time in seconds, on the caller's clock.
    pub time: f64,
    /// Length in seconds.
    pub duration: f64,
    pub velocity: u8,
}

/// Everything one tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub step: u64,
    pub scan: ScanResult,
    pub dynamics: Dynamics,
    pub notes: Vec<ScheduledNote>,
    /// True when the scan came from the locked loop instead of the grid.
    pub replayed: bool,
}

/// Cross-step state of the treatments.
#[derive(Debug, Clone, Default)]
pub struct Voicing {
    previous_chord: Vec<u8>,
    melody: MelodicState,
    previous_density: Option<f64>,
}

impl Voicing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render one scan. `step_duration` is the length of a step in seconds.
    pub fn render(
        &mut self,
        scan: &ScanResult,
        step: u64,
        time: f64,
        treatment: Treatment,
        sensitivity: f64,
        step_duration: f64,
    ) -> (Dynamics, Vec<ScheduledNote>) {
        let selected = select_by_consonance(&scan.notes, MAX_CANDIDATES, scan.density, 0.0);
        let dynamics = compute_dynamics(scan.density, self.previous_density, step, sensitivity);
        self.previous_density = Some(scan.density);

        if dynamics.rest || selected.is_empty() {
            return (dynamics, Vec::new());
        }

        let velocity = dynamics.velocity.min(127);
        let schedule = |note: &NoteCandidate, duration: f64| ScheduledNote {
            frequency: note.frequency,
            pitch: note.pitch,
            time,
            duration,
            velocity,
        };

        let notes: Vec<ScheduledNote> = match treatment {
            Treatment::Chord => {
                let chord = voice_chord(&selected, &self.previous_chord);
                self.previous_chord = chord.pitches();
                chord
                    .notes
                    .iter()
                    .map(|n| schedule(n, step_duration * CHORD_STEPS))
                    .collect()
            }
            Treatment::Line => {
                let choice = choose_melodic_note(&selected, &mut self.melody);
                choice
                    .note
                    .iter()
                    .map(|n| schedule(n, step_duration * LINE_STEPS * choice.duration))
                    .collect()
            }
            Treatment::Arpeggio => {
                let pattern = ArpPattern::for_density(scan.density);
                pattern
                    .note_index(step, selected.len())
                    .map(|idx| &selected[idx])
                    .map(|n| {
                        let hold = arpeggio::hold_factor(n.age);
                        vec![schedule(n, step_duration * ARPEGGIO_STEPS * hold)]
                    })
                    .unwrap_or_default()
            }
        };
        (dynamics, notes)
    }
}

/// Record scheduled notes. Does nothing unless the recorder is active.
pub fn record_notes(recorder: &mut EventRecorder, notes: &[ScheduledNote]) {
    for note in notes {
        recorder.record_note(note.frequency, note.time, note.duration, note.velocity);
    }
}

/// Render a captured loop from step 0 with fresh state and export it as SMF.
///
/// The recorder runs single-channel unless the scale needs pitch bends.
pub fn export_loop(
    scans: &[ScanResult],
    config: &SequencerConfig,
    scale: &ScaleDef,
) -> Result<Vec<u8>, ExportError> {
    if micros_per_beat(config.tempo).is_none() {
        return Err(ExportError::InvalidTempo(config.tempo));
    }
    let step_duration = config.step_duration();
    let mut recorder = EventRecorder::new();
    recorder.set_single_channel(!scale.is_microtonal());
    recorder.start(0.0);

    let mut voicing = Voicing::new();
    for (step, scan) in scans.iter().enumerate() {
        let step = step as u64;
        let (_, notes) = voicing.render(
            scan,
            step,
            step as f64 * step_duration,
            config.treatment,
            config.dynamic_sensitivity,
            step_duration,
        );
        record_notes(&mut recorder, &notes);
    }

    recorder.stop();
    info!("exporting {}-step loop in {}", scans.len(), scale.id);
    recorder.export_smf(config.tempo)
}

/// A running performance.
#[derive(Debug, Clone)]
pub struct Sequencer {
    config: SequencerConfig,
    scale: &'static ScaleDef,
    grid: Automaton,
    rng: CellRng,
    trajectories: Trajectories,
    manual: ScanPosition,
    voicing: Voicing,
    step: u64,
    loop_buffer: VecDeque<ScanResult>,
    loop_cursor: usize,
}

impl Sequencer {
    /// Build a sequencer from a config, validating it first. The grid is
    /// seeded from the config's seed string.
    pub fn new(config: SequencerConfig) -> Result<Self, ConfigError> {
        let scale = config.validate()?;
        let grid = Automaton::random(config.grid_size, &config.seed);
        let rng = CellRng::from_seed_str(&format!("{}/mutation", config.seed));
        info!(
            "sequencer: {} scale, {} treatment, {} mode, {}x{} grid, {} live cells",
            scale.id,
            config.treatment.name(),
            config.control_mode.name(),
            config.grid_size,
            config.grid_size,
            grid.live_count()
        );
        Ok(Sequencer {
            trajectories: Trajectories::new(config.grid_size),
            manual: ScanPosition::center(config.grid_size),
            config,
            scale,
            grid,
            rng,
            voicing: Voicing::new(),
            step: 0,
            loop_buffer: VecDeque::new(),
            loop_cursor: 0,
        })
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    pub fn scale(&self) -> &'static ScaleDef {
        self.scale
    }

    /// Steps taken so far.
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn step_duration(&self) -> f64 {
        self.config.step_duration()
    }

    pub fn automaton(&self) -> &Automaton {
        &self.grid
    }

    /// Mutable access for painting cells between ticks.
    pub fn automaton_mut(&mut self) -> &mut Automaton {
        &mut self.grid
    }

    pub fn set_manual_position(&mut self, position: ScanPosition) {
        self.manual = position;
    }

    pub fn set_control_mode(&mut self, mode: ControlMode) {
        self.config.control_mode = mode;
    }

    pub fn set_treatment(&mut self, treatment: Treatment) {
        self.config.treatment = treatment;
    }

    /// Engaging the lock starts a fresh capture; releasing it keeps the
    /// buffer rolling.
    pub fn set_loop_lock(&mut self, locked: bool) {
        if locked && !self.config.loop_lock {
            self.loop_buffer.clear();
            self.loop_cursor = 0;
        }
        self.config.loop_lock = locked;
    }

    /// True once the buffer holds `loop_steps` scans.
    pub fn loop_full(&self) -> bool {
        self.loop_buffer.len() >= self.config.loop_steps
    }

    /// Captured scans, oldest first.
    pub fn loop_buffer(&self) -> Vec<ScanResult> {
        self.loop_buffer.iter().cloned().collect()
    }

    /// Export the captured loop, see `export_loop`.
    pub fn export_loop(&self) -> Result<Vec<u8>, ExportError> {
        export_loop(&self.loop_buffer(), &self.config, self.scale)
    }

    /// Run one step at `time` seconds.
    pub fn tick(&mut self, time: f64) -> StepOutput {
        let step = self.step;
        let mode = self.config.control_mode;

        if step % STEPS_PER_GENERATION == 0 {
            self.grid.step(self.config.mutation_rate, &mut self.rng);
            trace!(
                "generation at step {step}: {} live\n{}",
                self.grid.live_count(),
                self.grid.summary()
            );
        }
        self.trajectories.advance(mode, &self.grid, &mut self.rng);

        let (scan, replayed) = self.next_scan(mode);
        let (dynamics, notes) = self.voicing.render(
            &scan,
            step,
            time,
            self.config.treatment,
            self.config.dynamic_sensitivity,
            self.step_duration(),
        );
        debug!(
            "step {step}: {} candidates, density {:.3}, {} notes{}",
            scan.notes.len(),
            scan.density,
            notes.len(),
            if replayed { " (loop)" } else { "" }
        );

        self.step += 1;
        StepOutput {
            step,
            scan,
            dynamics,
            notes,
            replayed,
        }
    }

    fn next_scan(&mut self, mode: ControlMode) -> (ScanResult, bool) {
        if self.config.loop_lock && self.loop_full() {
            let len = self.loop_buffer.len();
            let replay = self.loop_buffer[self.loop_cursor % len].clone();
            self.loop_cursor = (self.loop_cursor + 1) % len;
            return (replay, true);
        }

        let position = resolve_position(mode, &self.grid, self.manual, &self.trajectories);
        let result = scan(&self.grid, self.scale, mode, position);

        self.loop_buffer.push_back(result.clone());
        if self.config.loop_lock {
            if self.loop_full() {
                info!("loop of {} steps captured", self.config.loop_steps);
            }
        } else {
            while self.loop_buffer.len() > self.config.loop_steps {
                self.loop_buffer.pop_front();
            }
        }
        (result, false)
    }
}
