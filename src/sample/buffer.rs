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

//! An immutable PCM asset plus its mapping metadata.

use super::SampleData;

/// A loaded sample, stored deinterleaved, shared by reference with every
/// voice that plays it.
///
/// Buffers are immutable once published into a keymap generation; all
/// mutation happens at load time.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    sample_rate: f32,
    /// Planar channel data; one or two channels.
    channels: Vec<Vec<f32>>,
    frame_count: usize,

    min_note: u8,
    max_note: u8,
    /// Negative means unconstrained by velocity.
    min_velocity: i32,
    max_velocity: i32,
    root_note: u8,
    root_frequency: f32,

    start_point: f32,
    end_point: f32,
    is_looping: bool,
    loop_start_point: f32,
    loop_end_point: f32,
}

impl SampleBuffer {
    /// Builds a buffer from raw PCM and a descriptor, deinterleaving if
    /// needed and resolving start/end/loop points.
    pub fn from_data(data: &SampleData) -> Self {
        let frame_count = data.frame_count;
        let channel_count = usize::from(data.channel_count.clamp(1, 2));

        let mut channels: Vec<Vec<f32>> = (0..channel_count)
            .map(|_| Vec::with_capacity(frame_count))
            .collect();
        if data.is_interleaved {
            for frame in 0..frame_count {
                for (channel, samples) in channels.iter_mut().enumerate() {
                    samples.push(data.pcm[frame * channel_count + channel]);
                }
            }
        } else {
            for (channel, samples) in channels.iter_mut().enumerate() {
                let start = channel * frame_count;
                samples.extend_from_slice(&data.pcm[start..start + frame_count]);
            }
        }

        let descriptor = &data.descriptor;
        let mut start_point = 0.0;
        let mut end_point = frame_count as f32;
        if descriptor.start_point > 0.0 {
            start_point = descriptor.start_point;
        }
        if descriptor.end_point > 0.0 {
            end_point = descriptor.end_point;
        }

        // Loop points of 1.0 or less are fractions of the end point; larger
        // values are absolute frame indices. Only meaningful when looping.
        let mut loop_start_point = 0.0;
        let mut loop_end_point = 0.0;
        if descriptor.is_looping {
            loop_start_point = if descriptor.loop_start_point > 1.0 {
                descriptor.loop_start_point
            } else {
                end_point * descriptor.loop_start_point
            };
            loop_end_point = if descriptor.loop_end_point > 1.0 {
                descriptor.loop_end_point
            } else {
                end_point * descriptor.loop_end_point
            };
        }

        Self {
            sample_rate: data.sample_rate,
            channels,
            frame_count,
            min_note: descriptor.min_note,
            max_note: descriptor.max_note,
            min_velocity: descriptor.min_velocity,
            max_velocity: descriptor.max_velocity,
            root_note: descriptor.root_note,
            root_frequency: descriptor.root_frequency,
            start_point,
            end_point,
            is_looping: descriptor.is_looping,
            loop_start_point,
            loop_end_point,
        }
    }

    /// Returns true when this buffer accepts the given velocity: either
    /// bound negative means unconstrained.
    pub fn accepts_velocity(&self, velocity: u8) -> bool {
        if self.min_velocity < 0 || self.max_velocity < 0 {
            return true;
        }
        let velocity = i32::from(velocity);
        velocity >= self.min_velocity && velocity <= self.max_velocity
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Left channel data.
    pub fn left(&self) -> &[f32] {
        &self.channels[0]
    }

    /// Right channel data; mono buffers return the left channel.
    pub fn right(&self) -> &[f32] {
        self.channels.get(1).unwrap_or(&self.channels[0])
    }

    pub fn min_note(&self) -> u8 {
        self.min_note
    }

    pub fn max_note(&self) -> u8 {
        self.max_note
    }

    pub fn min_velocity(&self) -> i32 {
        self.min_velocity
    }

    pub fn max_velocity(&self) -> i32 {
        self.max_velocity
    }

    pub fn root_note(&self) -> u8 {
        self.root_note
    }

    pub fn root_frequency(&self) -> f32 {
        self.root_frequency
    }

    pub fn start_point(&self) -> f32 {
        self.start_point
    }

    pub fn end_point(&self) -> f32 {
        self.end_point
    }

    pub fn is_looping(&self) -> bool {
        self.is_looping
    }

    pub fn loop_start_point(&self) -> f32 {
        self.loop_start_point
    }

    pub fn loop_end_point(&self) -> f32 {
        self.loop_end_point
    }
}
