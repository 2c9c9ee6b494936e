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

//! One unit of polyphony: a sample playback head, amplitude and filter
//! envelopes, and a stereo resonant low-pass, all advanced in lock-step by
//! the renderer.

use std::sync::Arc;

use crate::dsp::envelope::{AdsrEnvelope, AdsrParameters};
use crate::dsp::filter::ResonantLowPass;
use crate::dsp::oscillator::SampleOscillator;
use crate::sample::SampleBuffer;
use crate::CHUNK_SIZE;

/// Engine-wide values a voice needs for one render block.
#[derive(Clone, Copy, Debug)]
pub struct BlockParams {
    pub master_volume: f32,
    /// Semitones of pitch deviation shared by all voices (global offset
    /// plus vibrato).
    pub pitch_deviation: f32,
    /// Negative disables the filter for this block.
    pub cutoff_multiple: f32,
    pub key_tracking: f32,
    pub cutoff_envelope_strength: f32,
    pub filter_envelope_velocity_scaling: f32,
    pub linear_resonance: f32,
    /// Seconds per octave of pitch glide; zero or less jumps immediately.
    pub glide_sec_per_octave: f32,
}

/// A single sampler voice.
///
/// `note_number` is negative while the slot is idle. The renderer owns all
/// of this state; the control side only observes note numbers through the
/// engine's shared table.
pub struct SamplerVoice {
    note_number: i32,
    /// Current sounding frequency; glides toward `target_frequency`.
    note_frequency: f32,
    target_frequency: f32,
    velocity01: f32,
    sample: Option<Arc<SampleBuffer>>,
    oscillator: SampleOscillator,
    amp_envelope: AdsrEnvelope,
    filter_envelope: AdsrEnvelope,
    left_filter: ResonantLowPass,
    right_filter: ResonantLowPass,
    /// Whether the playback head wraps the buffer's loop; cleared on
    /// release unless the engine is set to loop through release.
    looping: bool,
    filter_active: bool,
    block_gain: f32,
    sample_rate: f32,
}

impl SamplerVoice {
    pub fn new(sample_rate: f32) -> Self {
        let envelope_rate = sample_rate / CHUNK_SIZE as f32;
        Self {
            note_number: -1,
            note_frequency: 0.0,
            target_frequency: 0.0,
            velocity01: 0.0,
            sample: None,
            oscillator: SampleOscillator::default(),
            amp_envelope: AdsrEnvelope::new(envelope_rate),
            filter_envelope: AdsrEnvelope::new(envelope_rate),
            left_filter: ResonantLowPass::new(sample_rate),
            right_filter: ResonantLowPass::new(sample_rate),
            looping: false,
            filter_active: false,
            block_gain: 0.0,
            sample_rate,
        }
    }

    /// The note this voice is playing, negative when idle.
    pub fn note_number(&self) -> i32 {
        self.note_number
    }

    /// Starts a fresh note from silence.
    pub fn start(&mut self, note: u8, note_frequency: f32, velocity01: f32, buffer: Arc<SampleBuffer>) {
        self.oscillator.start(&buffer, self.sample_rate);
        self.looping = buffer.is_looping();
        self.left_filter.reset();
        self.right_filter.reset();
        self.amp_envelope.start();
        self.filter_envelope.start();
        self.note_number = i32::from(note);
        self.note_frequency = note_frequency;
        self.target_frequency = note_frequency;
        self.velocity01 = velocity01;
        self.sample = Some(buffer);
    }

    /// Cuts over to a new note on a sounding voice, retriggering the
    /// envelopes from their current levels so the restart does not click.
    pub fn restart_new_note(
        &mut self,
        note: u8,
        note_frequency: f32,
        velocity01: f32,
        buffer: Arc<SampleBuffer>,
    ) {
        self.oscillator.start(&buffer, self.sample_rate);
        self.looping = buffer.is_looping();
        self.amp_envelope.retrigger();
        self.filter_envelope.retrigger();
        self.note_number = i32::from(note);
        self.target_frequency = note_frequency;
        self.velocity01 = velocity01;
        self.sample = Some(buffer);
    }

    /// Changes note without touching envelopes or the playback head; the
    /// pitch glides to the new target.
    pub fn restart_new_note_legato(&mut self, note: u8, note_frequency: f32) {
        self.note_number = i32::from(note);
        self.target_frequency = note_frequency;
    }

    /// Retriggers the same note, possibly with a different velocity layer.
    pub fn restart_same_note(&mut self, velocity01: f32, buffer: Arc<SampleBuffer>) {
        self.oscillator.start(&buffer, self.sample_rate);
        self.looping = buffer.is_looping();
        self.amp_envelope.retrigger();
        self.filter_envelope.retrigger();
        self.velocity01 = velocity01;
        self.sample = Some(buffer);
    }

    /// Enters the release stage. Unless `loop_thru_release` is set the
    /// playback head stops looping and runs to the end of the buffer.
    pub fn release(&mut self, loop_thru_release: bool) {
        if !loop_thru_release {
            self.looping = false;
        }
        self.amp_envelope.release();
        self.filter_envelope.release();
    }

    /// Immediately silences and frees the voice.
    pub fn stop(&mut self) {
        self.note_number = -1;
        self.sample = None;
        self.amp_envelope.stop();
        self.filter_envelope.stop();
        self.block_gain = 0.0;
    }

    /// Per-block preparation: advance envelopes and glide, compute the
    /// block gain, pitch increment, and filter coefficients. Returns true
    /// when the amplitude envelope has finished and the voice should be
    /// stopped.
    pub fn prep_to_get_samples(&mut self, params: &BlockParams) -> bool {
        if self.amp_envelope.is_idle() {
            return true;
        }
        let Some(buffer) = self.sample.clone() else {
            return true;
        };

        self.advance_glide(params.glide_sec_per_octave);

        let amp = self.amp_envelope.next_level();
        self.block_gain = params.master_volume * self.velocity01 * amp;

        let filter_env = self.filter_envelope.next_level();
        self.oscillator
            .set_pitch(&buffer, self.note_frequency, params.pitch_deviation);

        if params.cutoff_multiple < 0.0 {
            self.filter_active = false;
        } else {
            self.filter_active = true;
            let velocity_scaled_env = filter_env
                * (1.0 - params.filter_envelope_velocity_scaling * (1.0 - self.velocity01));
            let cutoff_hz = self.note_frequency
                * params.key_tracking
                * (1.0 + params.cutoff_multiple
                    + params.cutoff_envelope_strength * velocity_scaled_env);
            self.left_filter.set(cutoff_hz, params.linear_resonance);
            self.right_filter.set(cutoff_hz, params.linear_resonance);
        }
        false
    }

    /// Mixes up to `sample_count` frames into the output buffers. Returns
    /// true when the playback head ran out of sample data.
    pub fn get_samples(
        &mut self,
        sample_count: usize,
        out_left: &mut [f32],
        out_right: &mut [f32],
    ) -> bool {
        let Some(buffer) = self.sample.clone() else {
            return true;
        };

        for i in 0..sample_count.min(out_left.len()).min(out_right.len()) {
            let Some((left, right)) = self.oscillator.next_frame(&buffer, self.looping) else {
                return true;
            };
            let mut left = left * self.block_gain;
            let mut right = right * self.block_gain;
            if self.filter_active {
                left = self.left_filter.process(left);
                right = self.right_filter.process(right);
            }
            out_left[i] += left;
            out_right[i] += right;
        }
        false
    }

    /// Refreshes cached amplitude envelope coefficients from the shared
    /// settings.
    pub fn update_amp_adsr_parameters(&mut self, params: &AdsrParameters) {
        self.amp_envelope.set_parameters(params);
    }

    /// Refreshes cached filter envelope coefficients from the shared
    /// settings.
    pub fn update_filter_adsr_parameters(&mut self, params: &AdsrParameters) {
        self.filter_envelope.set_parameters(params);
    }

    fn advance_glide(&mut self, glide_sec_per_octave: f32) {
        if self.note_frequency == self.target_frequency {
            return;
        }
        if glide_sec_per_octave <= 0.0 || self.note_frequency <= 0.0 {
            self.note_frequency = self.target_frequency;
            return;
        }

        let block_seconds = CHUNK_SIZE as f32 / self.sample_rate;
        let max_octaves = block_seconds / glide_sec_per_octave;
        let remaining_octaves = (self.target_frequency / self.note_frequency).log2();
        if remaining_octaves.abs() <= max_octaves {
            self.note_frequency = self.target_frequency;
        } else {
            self.note_frequency *= (max_octaves * remaining_octaves.signum()).exp2();
        }
    }

    #[cfg(test)]
    pub(crate) fn amp_stage(&self) -> crate::dsp::envelope::EnvelopeStage {
        self.amp_envelope.stage()
    }

    #[cfg(test)]
    pub(crate) fn sample(&self) -> Option<&Arc<SampleBuffer>> {
        self.sample.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn note_frequency(&self) -> f32 {
        self.note_frequency
    }

    #[cfg(test)]
    pub(crate) fn target_frequency(&self) -> f32 {
        self.target_frequency
    }
}
