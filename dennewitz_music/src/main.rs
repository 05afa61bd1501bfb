// Dennewitz CLI entry point.
//
// Runs a sequencer offline for a fixed number of steps and writes what it
// played to a MIDI file. Time advances by one step duration per tick, so
// the result is the same as a live run with the same config and seed.
//
// Usage:
//   cargo run -p dennewitz_music --bin compose -- [--config FILE] [--output out.mid]
//     [--steps N] [--seed TEXT] [--scale ID] [--treatment chord|line|arpeggio]
//     [--mode centroid|manual|wanderer|attractor|bounce] [--tempo BPM]
//     [--grid-size N] [--loop-only]
//
// Flags override values from the config file. `--loop-only` engages loop
// lock from the first step and exports just the captured loop.

use clap::Parser;
use dennewitz_music::config::{ConfigError, SequencerConfig};
use dennewitz_music::midi::{EventRecorder, write_midi};
use dennewitz_music::scale::SCALES;
use dennewitz_music::sequencer::{Sequencer, Treatment, record_notes};
use dennewitz_music::trajectory::ControlMode;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "compose", version, about = "Render a Game of Life performance to MIDI")]
struct Args {
    /// JSON config file; missing fields use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output MIDI file
    #[arg(long, short, default_value = "dennewitz.mid")]
    output: PathBuf,

    /// Number of sixteenth-note steps to run
    #[arg(long, default_value_t = 256)]
    steps: u64,

    /// Seed text for the initial grid
    #[arg(long)]
    seed: Option<String>,

    /// Scale id (e.g. diatonic, pentatonic, just-simple, quarter-tone)
    #[arg(long)]
    scale: Option<String>,

    #[arg(long, value_parser = parse_treatment)]
    treatment: Option<Treatment>,

    /// Scan cursor source
    #[arg(long, value_parser = parse_mode)]
    mode: Option<ControlMode>,

    /// Beats per minute
    #[arg(long)]
    tempo: Option<f64>,

    #[arg(long)]
    grid_size: Option<usize>,

    /// Export only the captured loop
    #[arg(long)]
    loop_only: bool,
}

fn parse_treatment(name: &str) -> Result<Treatment, String> {
    Treatment::from_name(name).ok_or_else(|| "expected one of chord, line, arpeggio".to_string())
}

fn parse_mode(name: &str) -> Result<ControlMode, String> {
    ControlMode::from_name(name)
        .ok_or_else(|| "expected one of centroid, manual, wanderer, attractor, bounce".to_string())
}

fn build_config(args: &Args) -> Result<SequencerConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => SequencerConfig::load(path)?,
        None => SequencerConfig::default(),
    };
    if let Some(seed) = &args.seed {
        config.seed = seed.clone();
    }
    if let Some(scale) = &args.scale {
        config.scale = scale.clone();
    }
    if let Some(treatment) = args.treatment {
        config.treatment = treatment;
    }
    if let Some(mode) = args.mode {
        config.control_mode = mode;
    }
    if let Some(tempo) = args.tempo {
        config.tempo = tempo;
    }
    if let Some(size) = args.grid_size {
        config.grid_size = size;
    }
    if args.loop_only {
        config.loop_lock = true;
    }
    Ok(config)
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = build_config(args)?;
    let mut sequencer = Sequencer::new(config)?;
    let step_duration = sequencer.step_duration();

    let mut recorder = EventRecorder::new();
    recorder.set_single_channel(!sequencer.scale().is_microtonal());
    recorder.start(0.0);

    let mut played = 0usize;
    for step in 0..args.steps {
        let out = sequencer.tick(step as f64 * step_duration);
        played += out.notes.len();
        record_notes(&mut recorder, &out.notes);
    }
    recorder.stop();
    info!(
        "{} steps, {} notes, {} live cells at the end",
        args.steps,
        played,
        sequencer.automaton().live_count()
    );

    let tempo = sequencer.config().tempo;
    if args.loop_only {
        if !sequencer.loop_full() {
            warn!(
                "only {} of {} loop steps captured",
                sequencer.loop_buffer().len(),
                sequencer.config().loop_steps
            );
        }
        let bytes = sequencer.export_loop()?;
        std::fs::write(&args.output, &bytes)?;
        info!("wrote {} bytes of MIDI to {}", bytes.len(), args.output.display());
    } else {
        write_midi(&recorder, tempo, &args.output)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            if let Some(ConfigError::UnknownScale(_)) = e.downcast_ref::<ConfigError>() {
                let ids: Vec<&str> = SCALES.iter().map(|s| s.id).collect();
                error!("available scales: {}", ids.join(", "));
            }
            ExitCode::FAILURE
        }
    }
}
