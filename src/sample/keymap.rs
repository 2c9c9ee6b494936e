// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Maps MIDI note numbers to the sample buffers eligible to render them.

use std::sync::Arc;

use tracing::info;

use super::SampleBuffer;
use crate::tuning::{note_to_hz, TuningTable};
use crate::MIDI_NOTE_COUNT;

/// 128 insertion-ordered slots of buffer references plus a validity flag.
///
/// The map is only rebuilt while no voice is active, so lookups on the
/// event path see a fully constructed generation. Within a slot, insertion
/// order is load order, and velocity resolution is first-match, so load
/// order is semantically significant.
#[derive(Clone, Debug)]
pub struct KeyMap {
    slots: Vec<Vec<Arc<SampleBuffer>>>,
    valid: bool,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self {
            slots: vec![Vec::new(); MIDI_NOTE_COUNT],
            valid: false,
        }
    }
}

impl KeyMap {
    /// Returns true once a build has completed since the last invalidation.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Invalidates the map and clears every slot.
    pub fn invalidate(&mut self) {
        self.valid = false;
        for slot in &mut self.slots {
            slot.clear();
        }
    }

    /// Rebuilds the map so every note is served by the loaded buffer(s)
    /// closest in pitch.
    ///
    /// Distance is measured against the 12-TET frequency of each buffer's
    /// root note, not its possibly overridden root frequency, so ordering
    /// stays consistent across retuned buffers. Ties all land in the slot.
    pub fn build_simple(&mut self, buffers: &[Arc<SampleBuffer>], tuning: &TuningTable) {
        self.invalidate();

        for note in 0..MIDI_NOTE_COUNT {
            let note_frequency = tuning.frequency(note as u8);

            let mut min_distance = f32::MAX;
            for buffer in buffers {
                let distance = (note_to_hz(f32::from(buffer.root_note())) - note_frequency).abs();
                if distance < min_distance {
                    min_distance = distance;
                }
            }

            for buffer in buffers {
                let distance = (note_to_hz(f32::from(buffer.root_note())) - note_frequency).abs();
                if distance == min_distance {
                    self.slots[note].push(buffer.clone());
                }
            }
        }

        self.valid = true;
        info!(buffers = buffers.len(), "Built nearest-pitch keymap");
    }

    /// Rebuilds the map from each buffer's explicit note range.
    ///
    /// A buffer lands in every slot whose tuned frequency falls inside the
    /// inclusive `[min_note, max_note]` interval; overlaps produce multiple
    /// entries resolved later by velocity.
    pub fn build_from_ranges(&mut self, buffers: &[Arc<SampleBuffer>], tuning: &TuningTable) {
        self.invalidate();

        for note in 0..MIDI_NOTE_COUNT {
            let note_frequency = tuning.frequency(note as u8);
            for buffer in buffers {
                let min_frequency = note_to_hz(f32::from(buffer.min_note()));
                let max_frequency = note_to_hz(f32::from(buffer.max_note()));
                if note_frequency >= min_frequency && note_frequency <= max_frequency {
                    self.slots[note].push(buffer.clone());
                }
            }
        }

        self.valid = true;
        info!(buffers = buffers.len(), "Built range keymap");
    }

    /// Resolves a note and velocity to the best available buffer.
    ///
    /// A slot with a single entry returns it without consulting velocity.
    /// Otherwise the first entry (in load order) that is velocity-
    /// unconstrained or whose range contains the velocity wins.
    pub fn lookup(&self, note: u8, velocity: u8) -> Option<Arc<SampleBuffer>> {
        let slot = &self.slots[usize::from(note)];
        if slot.len() == 1 {
            return Some(slot[0].clone());
        }
        slot.iter()
            .find(|buffer| buffer.accepts_velocity(velocity))
            .cloned()
    }

    /// The buffers mapped to one note, in insertion order.
    pub fn slot(&self, note: u8) -> &[Arc<SampleBuffer>] {
        &self.slots[usize::from(note)]
    }
}
