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

//! Per-voice sample playback head.

use crate::sample::SampleBuffer;

/// Reads a sample buffer at an arbitrary rate with linear interpolation.
///
/// The playback increment combines the buffer-to-output sample-rate ratio
/// with the ratio of the desired pitch to the buffer's recorded root
/// frequency, plus a per-block pitch deviation in semitones (vibrato and
/// global pitch offset).
#[derive(Clone, Debug, Default)]
pub struct SampleOscillator {
    /// Current position, in buffer frames.
    position: f64,
    /// Frames advanced per output sample.
    increment: f64,
    /// Buffer sample rate over output sample rate.
    rate_ratio: f64,
}

impl SampleOscillator {
    /// Rewinds to the buffer's start point and captures the rate ratio.
    pub fn start(&mut self, buffer: &SampleBuffer, output_rate: f32) {
        self.position = f64::from(buffer.start_point());
        self.rate_ratio = if output_rate > 0.0 {
            f64::from(buffer.sample_rate()) / f64::from(output_rate)
        } else {
            1.0
        };
        self.increment = self.rate_ratio;
    }

    /// Recomputes the increment for the current block.
    pub fn set_pitch(&mut self, buffer: &SampleBuffer, note_hz: f32, pitch_deviation_semitones: f32) {
        let root = buffer.root_frequency();
        let pitch_ratio = if root > 0.0 { note_hz / root } else { 1.0 };
        let deviation = (pitch_deviation_semitones / 12.0).exp2();
        self.increment = self.rate_ratio * f64::from(pitch_ratio * deviation);
    }

    /// Produces the next stereo frame, or `None` once the head has passed
    /// the buffer's end point.
    ///
    /// When `looping` is set the head wraps from the loop end back to the
    /// loop start instead of running out.
    pub fn next_frame(&mut self, buffer: &SampleBuffer, looping: bool) -> Option<(f32, f32)> {
        if looping {
            let loop_start = f64::from(buffer.loop_start_point());
            let loop_end = f64::from(buffer.loop_end_point());
            let span = loop_end - loop_start;
            if span > 0.0 {
                while self.position >= loop_end {
                    self.position -= span;
                }
            }
        }

        if self.position >= f64::from(buffer.end_point()) {
            return None;
        }

        let index = self.position as usize;
        let last = buffer.frame_count().saturating_sub(1);
        if index > last {
            return None;
        }
        let next_index = (index + 1).min(last);
        let fraction = (self.position - index as f64) as f32;

        let left = interpolate(buffer.left(), index, next_index, fraction);
        let right = interpolate(buffer.right(), index, next_index, fraction);

        self.position += self.increment;
        Some((left, right))
    }

    #[cfg(test)]
    pub(crate) fn position(&self) -> f64 {
        self.position
    }
}

fn interpolate(samples: &[f32], index: usize, next_index: usize, fraction: f32) -> f32 {
    let a = samples[index];
    let b = samples[next_index];
    a + (b - a) * fraction
}
