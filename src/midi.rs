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

//! Raw MIDI ingestion for the sampler engine.

use midly::live::LiveEvent;
use midly::MidiMessage;
use tracing::debug;

use crate::engine::Sampler;

/// The sustain pedal controller number.
const CC_SUSTAIN: u8 = 64;

impl Sampler {
    /// Processes one raw MIDI message.
    ///
    /// Note On with velocity zero is treated as Note Off, per convention.
    /// The sustain pedal follows CC 64 with the usual half-way threshold.
    /// Channel information and all other messages are ignored.
    pub fn process_midi_event(&mut self, raw_event: &[u8]) {
        let event = match LiveEvent::parse(raw_event) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = ?e, "Failed to parse MIDI event");
                return;
            }
        };

        let LiveEvent::Midi { message, .. } = event else {
            return;
        };
        match message {
            MidiMessage::NoteOn { key, vel } if u8::from(vel) > 0 => {
                self.play_note(u8::from(key), u8::from(vel));
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                self.stop_note(u8::from(key), false);
            }
            MidiMessage::Controller { controller, value } if u8::from(controller) == CC_SUSTAIN => {
                self.sustain_pedal(u8::from(value) >= 64);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{Renderer, Sampler};
    use crate::sample::{SampleData, SampleDescriptor};

    fn configured_sampler() -> (Sampler, Renderer) {
        let (mut sampler, renderer) = Sampler::new(44100.0);
        let pcm = vec![0.5f32; 256];
        sampler.load_sample_data(&SampleData {
            sample_rate: 44100.0,
            channel_count: 1,
            is_interleaved: false,
            frame_count: 256,
            pcm: &pcm,
            descriptor: SampleDescriptor::default(),
        });
        sampler.build_key_map();
        (sampler, renderer)
    }

    #[test]
    fn test_note_on_starts_voice() {
        let (mut sampler, _renderer) = configured_sampler();
        sampler.process_midi_event(&[0x90, 60, 100]);
        assert_eq!(sampler.active_voice_count(), 1);
        assert_eq!(sampler.last_played_note(), 60);
    }

    #[test]
    fn test_note_on_zero_velocity_is_note_off() {
        let (mut sampler, _renderer) = configured_sampler();
        sampler.process_midi_event(&[0x90, 60, 100]);
        sampler.process_midi_event(&[0x90, 60, 0]);
        // The release keeps the slot assigned until the renderer reaps it,
        // but a second press must not allocate a second slot.
        sampler.process_midi_event(&[0x90, 60, 100]);
        assert_eq!(sampler.active_voice_count(), 1);
    }

    #[test]
    fn test_sustain_cc_threshold() {
        let (mut sampler, _renderer) = configured_sampler();
        sampler.process_midi_event(&[0xB0, 64, 127]);
        sampler.process_midi_event(&[0x90, 60, 100]);
        sampler.process_midi_event(&[0x80, 60, 0]);
        // Note Off while the pedal is down leaves the voice assigned.
        assert_eq!(sampler.active_voice_count(), 1);
    }

    #[test]
    fn test_garbage_is_ignored() {
        let (mut sampler, _renderer) = configured_sampler();
        sampler.process_midi_event(&[0x01]);
        sampler.process_midi_event(&[]);
        assert_eq!(sampler.active_voice_count(), 0);
    }
}
