// MIDI recording and Standard MIDI File export.
//
// `EventRecorder` collects timed note-on/note-off/pitch-bend events while a
// performance runs, then `export_smf` renders them as a format 0 (single
// track) SMF at 480 ticks per quarter note using the `midly` crate.
//
// Microtonal pitches are played as the nearest MIDI note plus a pitch bend.
// Every channel's bend range is set to two semitones at the top of the file,
// so a bend of 8192 + cents / 200 * 8192 lands on the exact pitch. Because a
// bend affects the whole channel, notes rotate through the 15 melodic
// channels (9 is percussion). For 12-tone scales the recorder can run in
// single-channel mode where everything goes to channel 0.
//
// Time is seconds relative to `start`; ticks are derived at export time from
// the tempo, so the same log can be exported at any tempo.

use crate::scale::frequency_to_semitone;
use log::{debug, info};
use midly::{
    Format, Header, MetaMessage, MidiMessage, PitchBend, Smf, Timing, Track, TrackEvent,
    TrackEventKind,
    num::{u4, u7, u14, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output.
pub const TICKS_PER_QUARTER: u16 = 480;

const CHANNELS: u8 = 16;
const PERCUSSION_CHANNEL: u8 = 9;

/// Pitch-bend value meaning "no bend".
pub const BEND_CENTER: u16 = 8192;
const BEND_MAX: u16 = 16383;
/// Bend range (semitones) programmed on every channel.
const BEND_RANGE_SEMITONES: u8 = 2;
/// Deviations at or below this many cents are played unbent.
const BEND_THRESHOLD_CENTS: f64 = 0.5;

const MAX_TEMPO_MICROS: u32 = 0xFF_FFFF;
const MAX_DELTA: i64 = 0x0FFF_FFFF;

// Registered parameter numbers (RPN 0,0 = pitch-bend sensitivity).
const CC_DATA_ENTRY: u8 = 6;
const CC_DATA_ENTRY_FINE: u8 = 38;
const CC_RPN_LSB: u8 = 100;
const CC_RPN_MSB: u8 = 101;

/// Microseconds per quarter note at `tempo` BPM, or `None` when that does
/// not fit the 24-bit tempo meta event (roughly 3.58 to 120 million BPM).
pub fn micros_per_beat(tempo: f64) -> Option<u32> {
    if !tempo.is_finite() || tempo <= 0.0 {
        return None;
    }
    let micros = (60_000_000.0 / tempo).round();
    (1.0..=MAX_TEMPO_MICROS as f64)
        .contains(&micros)
        .then_some(micros as u32)
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("tempo {0} BPM cannot be written as a MIDI tempo")]
    InvalidTempo(f64),
    #[error("failed to write MIDI data: {0}")]
    Io(#[from] std::io::Error),
}

/// What happens at a recorded instant. Variant order is the tie-break at
/// equal times: bends first so a note starts already in tune, then note-offs
/// so a repeated key on the same channel is released before it restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    PitchBend { value: u16 },
    NoteOff { key: u8 },
    NoteOn { key: u8, velocity: u8 },
}

impl EventKind {
    fn priority(&self) -> u8 {
        match self {
            EventKind::PitchBend { .. } => 0,
            EventKind::NoteOff { .. } => 1,
            EventKind::NoteOn { .. } => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEvent {
    /// Seconds since the recording started.
    pub time: f64,
    pub channel: u8,
    pub kind: EventKind,
}

/// A frequency expressed as a MIDI note plus deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MicrotonalPitch {
    /// Nearest MIDI note, 0..=127.
    pub note: u8,
    /// Deviation of the frequency from `note`, in cents.
    pub cents: f64,
    /// Pitch-bend value reaching the frequency with a two-semitone range,
    /// 0..=16383.
    pub bend: u16,
}

/// Split a frequency into the nearest MIDI note and the bend that corrects
/// it. Out-of-range frequencies saturate; non-positive or non-finite ones
/// map to an unbent note 0.
pub fn freq_to_microtonal_midi(freq: f64) -> MicrotonalPitch {
    let exact = frequency_to_semitone(freq);
    if !exact.is_finite() {
        return MicrotonalPitch {
            note: 0,
            cents: 0.0,
            bend: BEND_CENTER,
        };
    }
    let note = exact.round().clamp(0.0, 127.0);
    let cents = (exact - note) * 100.0;
    let offset = (cents / (BEND_RANGE_SEMITONES as f64 * 100.0) * BEND_CENTER as f64).round();
    let bend = (BEND_CENTER as f64 + offset).clamp(0.0, BEND_MAX as f64);
    MicrotonalPitch {
        note: note as u8,
        cents,
        bend: bend as u16,
    }
}

/// Convert seconds to ticks at `tempo` BPM.
pub fn seconds_to_ticks(seconds: f64, tempo: f64) -> i64 {
    (seconds / 60.0 * tempo * TICKS_PER_QUARTER as f64).round() as i64
}

/// Records notes played during a performance.
#[derive(Debug, Clone)]
pub struct EventRecorder {
    events: Vec<TimedEvent>,
    start_time: f64,
    active: bool,
    single_channel: bool,
    next_channel: u8,
    /// Last bend sent on each channel.
    channel_bends: [u16; CHANNELS as usize],
}

impl Default for EventRecorder {
    fn default() -> Self {
        EventRecorder {
            events: Vec::new(),
            start_time: 0.0,
            active: false,
            single_channel: false,
            next_channel: 0,
            channel_bends: [BEND_CENTER; CHANNELS as usize],
        }
    }
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a fresh recording. Clears the log and the channel allocator.
    pub fn start(&mut self, time: f64) {
        self.events.clear();
        self.start_time = time;
        self.active = true;
        self.next_channel = 0;
        self.channel_bends = [BEND_CENTER; CHANNELS as usize];
        info!("recording started at {time:.3}s");
    }

    pub fn stop(&mut self) {
        if self.active {
            info!("recording stopped with {} events", self.events.len());
        }
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Events in recording order (not sorted).
    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    /// Route every note to channel 0. Only sensible for 12-tone material,
    /// since overlapping bent notes would detune each other.
    pub fn set_single_channel(&mut self, single: bool) {
        self.single_channel = single;
    }

    pub fn single_channel(&self) -> bool {
        self.single_channel
    }

    /// Record one note. Ignored unless recording.
    pub fn record_note(&mut self, freq: f64, time: f64, duration: f64, velocity: u8) {
        if !self.active {
            return;
        }
        let pitch = freq_to_microtonal_midi(freq);
        let channel = self.allocate_channel();
        let start = time - self.start_time;

        // A channel keeps its last bend, so an in-tune note on a channel
        // that was bent earlier gets an explicit center bend.
        let bent = pitch.cents.abs() > BEND_THRESHOLD_CENTS;
        let bend = if bent { pitch.bend } else { BEND_CENTER };
        if bent || self.channel_bends[channel as usize] != bend {
            self.events.push(TimedEvent {
                time: start,
                channel,
                kind: EventKind::PitchBend { value: bend },
            });
            self.channel_bends[channel as usize] = bend;
        }

        self.events.push(TimedEvent {
            time: start,
            channel,
            kind: EventKind::NoteOn {
                key: pitch.note,
                velocity: velocity.min(127),
            },
        });
        self.events.push(TimedEvent {
            time: start + duration.max(0.0),
            channel,
            kind: EventKind::NoteOff { key: pitch.note },
        });
    }

    fn allocate_channel(&mut self) -> u8 {
        if self.single_channel {
            return 0;
        }
        let channel = self.next_channel;
        self.next_channel = (self.next_channel + 1) % CHANNELS;
        if self.next_channel == PERCUSSION_CHANNEL {
            self.next_channel += 1;
        }
        channel
    }

    /// Events sorted by time, bends before note-offs before note-ons.
    pub fn sorted_events(&self) -> Vec<TimedEvent> {
        let mut sorted = self.events.clone();
        sorted.sort_by(|a, b| {
            a.time
                .total_cmp(&b.time)
                .then(a.kind.priority().cmp(&b.kind.priority()))
        });
        sorted
    }

    /// Render the log as a format 0 SMF.
    pub fn export_smf(&self, tempo: f64) -> Result<Vec<u8>, ExportError> {
        let micros = micros_per_beat(tempo).ok_or(ExportError::InvalidTempo(tempo))?;

        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
        ));
        let mut track: Track<'static> = Vec::new();

        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros))),
        });
        push_bend_range(&mut track);

        let mut prev_tick = 0i64;
        for event in self.sorted_events() {
            let tick = seconds_to_ticks(event.time, tempo);
            let delta = (tick - prev_tick).max(0);
            prev_tick = tick;
            track.push(TrackEvent {
                delta: u28::new(delta.min(MAX_DELTA) as u32),
                kind: TrackEventKind::Midi {
                    channel: u4::new(event.channel.min(CHANNELS - 1)),
                    message: to_midi_message(event.kind),
                },
            });
        }

        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        smf.tracks.push(track);

        let mut buf = Vec::new();
        smf.write_std(&mut buf)?;
        debug!(
            "exported {} events at {tempo} BPM ({} bytes)",
            self.events.len(),
            buf.len()
        );
        Ok(buf)
    }
}

/// RPN 0,0 on every channel: pitch-bend range of two semitones.
fn push_bend_range(track: &mut Track<'static>) {
    let settings = [
        (CC_RPN_MSB, 0),
        (CC_RPN_LSB, 0),
        (CC_DATA_ENTRY, BEND_RANGE_SEMITONES),
        (CC_DATA_ENTRY_FINE, 0),
    ];
    for channel in 0..CHANNELS {
        for (controller, value) in settings {
            track.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel: u4::new(channel),
                    message: MidiMessage::Controller {
                        controller: u7::new(controller),
                        value: u7::new(value),
                    },
                },
            });
        }
    }
}

fn to_midi_message(kind: EventKind) -> MidiMessage {
    match kind {
        EventKind::PitchBend { value } => MidiMessage::PitchBend {
            bend: PitchBend(u14::new(value.min(BEND_MAX))),
        },
        EventKind::NoteOff { key } => MidiMessage::NoteOff {
            key: u7::new(key.min(127)),
            vel: u7::new(0),
        },
        EventKind::NoteOn { key, velocity } => MidiMessage::NoteOn {
            key: u7::new(key.min(127)),
            vel: u7::new(velocity.min(127)),
        },
    }
}

/// Export a recording and write it to a file.
pub fn write_midi(recorder: &EventRecorder, tempo: f64, path: &Path) -> Result<(), ExportError> {
    let bytes = recorder.export_smf(tempo)?;
    std::fs::write(path, &bytes)?;
    info!("wrote {} bytes of MIDI to {}", bytes.len(), path.display());
    Ok(())
}
