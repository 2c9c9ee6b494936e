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

//! YAML patch descriptions: which WAV files to load, how they map onto the
//! keyboard, and the envelope settings to apply.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::Sampler;
use crate::sample::{load_wav_file, SampleDescriptor, SampleLoadError};
use crate::tuning::note_to_hz;

/// Typed error for patch load/parse failures so callers can distinguish
/// missing files from parse errors without string matching.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("error reading patch file: {0}")]
    Io(#[from] std::io::Error),

    #[error("error parsing patch file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("error loading sample: {0}")]
    Sample(#[from] SampleLoadError),
}

/// How the keymap is built after the patch's samples are loaded.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeymapMode {
    /// Every note maps to the nearest loaded sample by pitch.
    #[default]
    Simple,
    /// Notes map from each sample's explicit key range.
    Ranges,
}

/// A YAML representation of one sample entry in a patch.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PatchSample {
    /// The WAV file for this sample, relative to the patch file.
    file: String,

    /// The MIDI note the sample was recorded at.
    root_note: u8,

    /// Recorded pitch in Hz; defaults to the root note's 12-TET value.
    root_frequency: Option<f32>,

    /// Key range (inclusive). Defaults to the whole keyboard.
    #[serde(default)]
    min_note: u8,
    #[serde(default = "default_max_note")]
    max_note: u8,

    /// Velocity range (inclusive); omit both for "any velocity".
    #[serde(default = "default_velocity_bound")]
    min_velocity: i32,
    #[serde(default = "default_velocity_bound")]
    max_velocity: i32,

    /// Loop configuration. Loop points of 1.0 or less are fractions of the
    /// sample length.
    #[serde(default)]
    looping: bool,
    #[serde(default)]
    loop_start: f32,
    #[serde(default = "default_loop_end")]
    loop_end: f32,
}

fn default_max_note() -> u8 {
    127
}

fn default_velocity_bound() -> i32 {
    -1
}

fn default_loop_end() -> f32 {
    1.0
}

impl PatchSample {
    fn descriptor(&self) -> SampleDescriptor {
        SampleDescriptor {
            root_note: self.root_note,
            root_frequency: self
                .root_frequency
                .unwrap_or_else(|| note_to_hz(f32::from(self.root_note))),
            min_note: self.min_note,
            max_note: self.max_note,
            min_velocity: self.min_velocity,
            max_velocity: self.max_velocity,
            is_looping: self.looping,
            loop_start_point: self.loop_start,
            loop_end_point: self.loop_end,
            ..SampleDescriptor::default()
        }
    }
}

/// Envelope settings for a patch.
#[derive(Deserialize, Serialize, Clone, Copy, Debug)]
pub struct EnvelopeSettings {
    #[serde(default)]
    pub attack: f32,
    #[serde(default)]
    pub decay: f32,
    #[serde(default = "default_sustain")]
    pub sustain: f32,
    #[serde(default)]
    pub release: f32,
}

fn default_sustain() -> f32 {
    1.0
}

/// A YAML representation of a complete sampler patch.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Patch {
    /// Samples to load, in order. Order matters for velocity overlaps.
    samples: Vec<PatchSample>,

    /// Keymap construction mode.
    #[serde(default)]
    keymap: KeymapMode,

    /// Amplitude envelope; omitted means an organ-style instant envelope.
    amplitude_envelope: Option<EnvelopeSettings>,

    /// Filter envelope. Presence also enables the filter.
    filter_envelope: Option<EnvelopeSettings>,
}

impl Patch {
    /// Parses a patch from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Patch, PatchError> {
        let patch = serde_yaml::from_str(&fs::read_to_string(path)?)?;
        Ok(patch)
    }

    /// Loads every referenced WAV into the sampler, builds the keymap, and
    /// applies the envelope settings.
    ///
    /// Relative sample paths resolve against `base_path`.
    pub fn apply(&self, sampler: &mut Sampler, base_path: &Path) -> Result<(), PatchError> {
        for sample in &self.samples {
            let file = Path::new(&sample.file);
            let full_path: PathBuf = if file.is_absolute() {
                file.to_path_buf()
            } else {
                base_path.join(file)
            };
            let data = load_wav_file(&full_path)?;
            sampler.load_sample_data(&data.with_descriptor(sample.descriptor()));
        }

        match self.keymap {
            KeymapMode::Simple => sampler.build_simple_key_map(),
            KeymapMode::Ranges => sampler.build_key_map(),
        }

        if let Some(envelope) = self.amplitude_envelope {
            sampler.set_amp_attack_seconds(envelope.attack);
            sampler.set_amp_decay_seconds(envelope.decay);
            sampler.set_amp_sustain_fraction(envelope.sustain);
            sampler.set_amp_release_seconds(envelope.release);
        }
        if let Some(envelope) = self.filter_envelope {
            sampler.set_filter_attack_seconds(envelope.attack);
            sampler.set_filter_decay_seconds(envelope.decay);
            sampler.set_filter_sustain_fraction(envelope.sustain);
            sampler.set_filter_release_seconds(envelope.release);
            sampler.set_filter_enabled(true);
        }

        info!(
            samples = self.samples.len(),
            keymap = ?self.keymap,
            "Patch applied"
        );
        Ok(())
    }
}
