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

//! Wavetable low-frequency oscillator used for vibrato.

use std::f32::consts::TAU;

const TABLE_SIZE: usize = 256;

/// A sinusoid wavetable oscillator ticked once per render block.
///
/// The rate passed to [`Lfo::init`] is the block rate
/// (`sample_rate / CHUNK_SIZE`), not the audio sample rate.
#[derive(Clone, Debug)]
pub struct Lfo {
    table: Vec<f32>,
    phase: f32,
    increment: f32,
}

impl Default for Lfo {
    fn default() -> Self {
        let table = (0..TABLE_SIZE)
            .map(|i| (TAU * i as f32 / TABLE_SIZE as f32).sin())
            .collect();
        Self {
            table,
            phase: 0.0,
            increment: 0.0,
        }
    }
}

impl Lfo {
    /// Sets the oscillation frequency given the update rate in blocks per
    /// second.
    pub fn init(&mut self, rate: f32, frequency_hz: f32) {
        self.increment = if rate > 0.0 { frequency_hz / rate } else { 0.0 };
        self.phase = 0.0;
    }

    /// Returns the current sample and advances the phase by one block.
    pub fn next_sample(&mut self) -> f32 {
        let position = self.phase * TABLE_SIZE as f32;
        let index = position as usize % TABLE_SIZE;
        let next_index = (index + 1) % TABLE_SIZE;
        let fraction = position - position.floor();
        let sample = self.table[index] + (self.table[next_index] - self.table[index]) * fraction;

        self.phase += self.increment;
        self.phase -= self.phase.floor();
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_zero_crossing() {
        let mut lfo = Lfo::default();
        lfo.init(2756.25, 5.0);
        assert!(lfo.next_sample().abs() < 1e-3);
    }

    #[test]
    fn test_output_is_bounded_sinusoid() {
        let mut lfo = Lfo::default();
        lfo.init(100.0, 5.0);

        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for _ in 0..200 {
            let sample = lfo.next_sample();
            min = min.min(sample);
            max = max.max(sample);
        }
        assert!(max > 0.9 && max <= 1.0 + 1e-6);
        assert!(min < -0.9 && min >= -1.0 - 1e-6);
    }

    #[test]
    fn test_zero_rate_is_silent_dc() {
        let mut lfo = Lfo::default();
        lfo.init(0.0, 5.0);
        for _ in 0..10 {
            assert!(lfo.next_sample().abs() < 1e-3);
        }
    }
}
