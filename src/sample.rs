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

//! Sample assets: PCM buffers, their key/velocity mapping metadata, the
//! keymap that resolves notes to buffers, and WAV loading.

use crate::tuning::note_to_hz;

pub mod buffer;
pub mod keymap;
pub mod loader;

pub use buffer::SampleBuffer;
pub use keymap::KeyMap;
pub use loader::{load_wav_file, SampleLoadError};

/// Mapping metadata describing how one sample asset responds to notes and
/// velocities.
///
/// A negative velocity bound means the sample is unconstrained by velocity.
/// `start_point`/`end_point` of zero mean "use the whole buffer". Loop
/// points of 1.0 or less are fractions of the end point; larger values are
/// absolute frame indices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleDescriptor {
    pub root_note: u8,
    pub root_frequency: f32,
    pub min_note: u8,
    pub max_note: u8,
    pub min_velocity: i32,
    pub max_velocity: i32,
    pub start_point: f32,
    pub end_point: f32,
    pub is_looping: bool,
    pub loop_start_point: f32,
    pub loop_end_point: f32,
}

impl Default for SampleDescriptor {
    fn default() -> Self {
        Self {
            root_note: 60,
            root_frequency: note_to_hz(60.0),
            min_note: 0,
            max_note: 127,
            min_velocity: -1,
            max_velocity: -1,
            start_point: 0.0,
            end_point: 0.0,
            is_looping: false,
            loop_start_point: 0.0,
            loop_end_point: 0.0,
        }
    }
}

/// PCM data plus its descriptor, ready to be loaded into the engine.
///
/// The PCM slice holds `frame_count * channel_count` samples, interleaved
/// or planar per `is_interleaved`.
pub struct SampleData<'a> {
    pub sample_rate: f32,
    pub channel_count: u16,
    pub is_interleaved: bool,
    pub frame_count: usize,
    pub pcm: &'a [f32],
    pub descriptor: SampleDescriptor,
}

/// Owned PCM produced by the loader, pairable with a descriptor for
/// loading.
#[derive(Clone, Debug)]
pub struct OwnedSampleData {
    pub sample_rate: f32,
    pub channel_count: u16,
    pub frame_count: usize,
    /// Interleaved samples.
    pub pcm: Vec<f32>,
}

impl OwnedSampleData {
    /// Borrows this PCM with the given mapping metadata attached.
    pub fn with_descriptor(&self, descriptor: SampleDescriptor) -> SampleData<'_> {
        SampleData {
            sample_rate: self.sample_rate,
            channel_count: self.channel_count,
            is_interleaved: true,
            frame_count: self.frame_count,
            pcm: &self.pcm,
            descriptor,
        }
    }
}
