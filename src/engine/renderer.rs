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

//! The audio-thread half of the sampler engine.

use std::sync::Arc;

use crossbeam_channel::Receiver;

use super::command::VoiceCommand;
use super::params::SharedParams;
use super::VoiceTable;
use crate::dsp::lfo::Lfo;
use crate::voice::{BlockParams, SamplerVoice};
use crate::{CHUNK_SIZE, MAX_POLYPHONY};

/// Vibrato LFO frequency in Hz.
const VIBRATO_HZ: f32 = 5.0;

/// Owns the voice pool and renders it block by block.
///
/// Everything here runs on the audio thread. Pending voice commands are
/// drained at the start of each block; the only writes visible to the
/// control side are idle markers published into the shared voice table.
/// The render path never allocates and never blocks.
pub struct Renderer {
    voices: Vec<SamplerVoice>,
    lfo: Lfo,
    params: Arc<SharedParams>,
    table: Arc<VoiceTable>,
    commands: Receiver<VoiceCommand>,
    sample_rate: f32,
}

impl Renderer {
    pub(crate) fn new(
        sample_rate: f32,
        params: Arc<SharedParams>,
        table: Arc<VoiceTable>,
        commands: Receiver<VoiceCommand>,
    ) -> Self {
        let mut lfo = Lfo::default();
        lfo.init(sample_rate / CHUNK_SIZE as f32, VIBRATO_HZ);
        Self {
            voices: (0..MAX_POLYPHONY).map(|_| SamplerVoice::new(sample_rate)).collect(),
            lfo,
            params,
            table,
            commands,
            sample_rate,
        }
    }

    /// Mixes one block of all active voices into the output buffers.
    ///
    /// The block length is the shorter of the two buffers, at most
    /// [`CHUNK_SIZE`] frames; hosts split larger callbacks into chunks.
    /// Output is accumulated, so callers zero the buffers beforehand.
    pub fn render(&mut self, out_left: &mut [f32], out_right: &mut [f32]) {
        let sample_count = out_left.len().min(out_right.len()).min(CHUNK_SIZE);

        self.drain_commands();

        let stopping = self.table.is_stopping();
        let pitch_deviation =
            self.params.pitch_offset() + self.params.vibrato_depth() * self.lfo.next_sample();
        let block = BlockParams {
            master_volume: self.params.master_volume(),
            pitch_deviation,
            cutoff_multiple: if self.params.is_filter_enabled() {
                self.params.cutoff_multiple()
            } else {
                -1.0
            },
            key_tracking: self.params.key_tracking(),
            cutoff_envelope_strength: self.params.cutoff_envelope_strength(),
            filter_envelope_velocity_scaling: self.params.filter_envelope_velocity_scaling(),
            linear_resonance: self.params.linear_resonance(),
            glide_sec_per_octave: self.params.glide_rate(),
        };
        // In legato mono mode a voice survives its sample running out so
        // the next transition still has something to glide.
        let allow_sample_runout = !(self.params.is_monophonic() && self.params.is_legato());

        for slot in 0..self.voices.len() {
            let voice = &mut self.voices[slot];
            if voice.note_number() < 0 {
                continue;
            }
            let done = stopping
                || voice.prep_to_get_samples(&block)
                || (voice.get_samples(sample_count, out_left, out_right) && allow_sample_runout);
            if done {
                voice.stop();
                self.table.publish_idle(slot);
            }
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: VoiceCommand) {
        match command {
            VoiceCommand::Start { slot, note, frequency, velocity01, buffer } => {
                self.voices[slot].start(note, frequency, velocity01, buffer);
            }
            VoiceCommand::RestartNote { slot, note, frequency, velocity01, buffer } => {
                let voice = &mut self.voices[slot];
                if voice.note_number() >= 0 {
                    voice.restart_new_note(note, frequency, velocity01, buffer);
                } else {
                    // The voice finished between dispatch and this block.
                    voice.start(note, frequency, velocity01, buffer);
                }
            }
            VoiceCommand::RestartLegato { slot, note, frequency } => {
                let voice = &mut self.voices[slot];
                if voice.note_number() >= 0 {
                    voice.restart_new_note_legato(note, frequency);
                } else {
                    // Nothing left to glide from; release the claim.
                    self.table.publish_idle(slot);
                }
            }
            VoiceCommand::RestartSame { slot, velocity01, buffer } => {
                let voice = &mut self.voices[slot];
                if voice.note_number() >= 0 {
                    voice.restart_same_note(velocity01, buffer);
                }
            }
            VoiceCommand::Release { slot, loop_thru_release } => {
                let voice = &mut self.voices[slot];
                if voice.note_number() >= 0 {
                    voice.release(loop_thru_release);
                }
            }
            VoiceCommand::Kill { slot } => {
                self.voices[slot].stop();
                self.table.publish_idle(slot);
            }
            VoiceCommand::SetAmpAdsr(params) => {
                for voice in &mut self.voices {
                    voice.update_amp_adsr_parameters(&params);
                }
            }
            VoiceCommand::SetFilterAdsr(params) => {
                for voice in &mut self.voices {
                    voice.update_filter_adsr_parameters(&params);
                }
            }
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    #[cfg(test)]
    pub(crate) fn voice(&self, slot: usize) -> &SamplerVoice {
        &self.voices[slot]
    }
}
