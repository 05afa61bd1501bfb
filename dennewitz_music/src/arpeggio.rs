// Arpeggio pattern bank.
//
// Each pattern is a fixed walk over four voice slots. The sequencer picks a
// pattern from the scan density every step, takes the slot for the current
// step and wraps it into the selected notes, so a pattern still works when
// fewer than four notes are available.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArpPattern {
    Pendulum,
    Ascending,
    Descending,
    Skip,
    Spiral,
}

impl ArpPattern {
    pub const ALL: [ArpPattern; 5] = [
        ArpPattern::Pendulum,
        ArpPattern::Ascending,
        ArpPattern::Descending,
        ArpPattern::Skip,
        ArpPattern::Spiral,
    ];

    /// Voice slots visited, in order.
    pub fn steps(self) -> &'static [usize] {
        match self {
            ArpPattern::Pendulum => &[3, 2, 1, 0, 1, 2],
            ArpPattern::Ascending => &[0, 1, 2, 3],
            ArpPattern::Descending => &[3, 2, 1, 0],
            ArpPattern::Skip => &[0, 2, 1, 3, 0, 3],
            ArpPattern::Spiral => &[0, 3, 1, 2],
        }
    }

    /// Sparse textures get gentle patterns, dense ones energetic patterns.
    pub fn for_density(density: f64) -> ArpPattern {
        if density < 0.05 {
            ArpPattern::Pendulum
        } else if density < 0.12 {
            ArpPattern::Ascending
        } else if density < 0.22 {
            ArpPattern::Spiral
        } else if density < 0.35 {
            ArpPattern::Descending
        } else {
            ArpPattern::Skip
        }
    }

    /// Index into `note_count` selected notes at `step`, or `None` if there
    /// are no notes.
    pub fn note_index(self, step: u64, note_count: usize) -> Option<usize> {
        if note_count == 0 {
            return None;
        }
        let steps = self.steps();
        let slot = steps[(step % steps.len() as u64) as usize];
        Some(slot % note_count)
    }
}

/// Duration multiplier for an arpeggiated note from a cell of this age.
pub fn hold_factor(age: u32) -> f64 {
    if age > 3 {
        1.4
    } else if age > 1 {
        1.0
    } else {
        0.6
    }
}
