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

//! A key- and velocity-mapped polyphonic sampler engine.
//!
//! Note events (note on/off, sustain pedal) arrive on a control thread and
//! are resolved against a keymap of loaded sample buffers; a fixed pool of
//! voices renders the result as a stereo float stream on a real-time audio
//! thread. The two sides are decoupled by a lock-free command channel and a
//! shared table of per-voice note numbers, so the audio path never locks or
//! allocates.

pub mod config;
pub mod dsp;
pub mod engine;
mod midi;
pub mod pedal;
pub mod sample;
#[cfg(test)]
mod testutil;
pub mod tuning;
pub mod voice;

pub use engine::{Renderer, Sampler};

/// Number of voices available for simultaneous playback.
pub const MAX_POLYPHONY: usize = 64;

/// MIDI offers 128 distinct note numbers.
pub const MIDI_NOTE_COUNT: usize = 128;

/// The block size, in sample frames, at which envelopes and the vibrato LFO
/// advance. Hosts should feed the renderer buffers of at most this many
/// frames per call.
pub const CHUNK_SIZE: usize = 16;
