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

//! Per-voice resonant low-pass filter.

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F32};

/// Minimum cutoff frequency in Hz.
const MIN_CUTOFF_HZ: f32 = 20.0;

/// Floor for the linear resonance control; smaller values would push Q
/// toward infinity.
const MIN_LINEAR_RESONANCE: f32 = 0.05;

/// A 2nd-order resonant low-pass built on a biquad section.
///
/// `linear_resonance` is the linear gain at the cutoff: 1.0 is a flat
/// Butterworth response, values toward zero sharpen the resonant peak.
#[derive(Clone, Debug)]
pub struct ResonantLowPass {
    filter: DirectForm2Transposed<f32>,
    coefficients: Coefficients<f32>,
    sample_rate: f32,
}

impl ResonantLowPass {
    pub fn new(sample_rate: f32) -> Self {
        // Safe starting point well inside the audio band.
        let coefficients = Coefficients::<f32>::from_params(
            Type::LowPass,
            sample_rate.hz(),
            1_000.0f32.hz(),
            Q_BUTTERWORTH_F32,
        )
        .unwrap_or_else(|_| Coefficients {
            a1: 0.0,
            a2: 0.0,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
        });
        Self {
            filter: DirectForm2Transposed::<f32>::new(coefficients),
            coefficients,
            sample_rate,
        }
    }

    /// Clears the filter memory, keeping the current coefficients.
    pub fn reset(&mut self) {
        self.filter = DirectForm2Transposed::<f32>::new(self.coefficients);
    }

    /// Retunes the filter for the current block.
    pub fn set(&mut self, cutoff_hz: f32, linear_resonance: f32) {
        let cutoff = cutoff_hz.clamp(MIN_CUTOFF_HZ, self.sample_rate * 0.45);
        let q = Q_BUTTERWORTH_F32 / linear_resonance.max(MIN_LINEAR_RESONANCE);
        if let Ok(coefficients) =
            Coefficients::<f32>::from_params(Type::LowPass, self.sample_rate.hz(), cutoff.hz(), q)
        {
            self.coefficients = coefficients;
            self.filter.update_coefficients(coefficients);
        }
    }

    /// Runs one sample through the filter.
    pub fn process(&mut self, sample: f32) -> f32 {
        self.filter.run(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Feeds an equal-amplitude mix of a low and a high sinusoid through the
    /// filter and returns the RMS of each after settling.
    fn measure(filter: &mut ResonantLowPass, low_hz: f32, high_hz: f32, rate: f32) -> (f32, f32) {
        let samples = rate as usize;
        let mut low_out = 0.0f64;
        let mut high_out = 0.0f64;
        for i in 0..samples {
            let t = i as f32 / rate;
            let low = (std::f32::consts::TAU * low_hz * t).sin();
            let high = (std::f32::consts::TAU * high_hz * t).sin();
            let out = filter.process(low + high);
            if i > samples / 2 {
                // Crude split: correlate output against each input.
                low_out += f64::from(out * low);
                high_out += f64::from(out * high);
            }
        }
        (low_out.abs() as f32, high_out.abs() as f32)
    }

    #[test]
    fn test_passes_low_attenuates_high() {
        let mut filter = ResonantLowPass::new(44100.0);
        filter.set(500.0, 1.0);

        let (low, high) = measure(&mut filter, 100.0, 8_000.0, 44100.0);
        assert!(low > 10.0 * high, "low={low} high={high}");
    }

    #[test]
    fn test_extreme_cutoff_is_clamped() {
        let mut filter = ResonantLowPass::new(44100.0);
        // Neither call may panic or produce NaN.
        filter.set(0.0, 1.0);
        assert!(filter.process(1.0).is_finite());
        filter.set(1_000_000.0, 0.0);
        assert!(filter.process(1.0).is_finite());
    }
}
