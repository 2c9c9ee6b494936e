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

//! Block-rate ADSR envelopes.
//!
//! Envelopes advance once per render block rather than once per sample, so
//! their update rate is `sample_rate / CHUNK_SIZE`.

/// Attack/decay/sustain/release settings shared by every voice.
///
/// Setters clamp out-of-range values rather than failing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdsrParameters {
    attack_seconds: f32,
    decay_seconds: f32,
    sustain_fraction: f32,
    release_seconds: f32,
}

impl Default for AdsrParameters {
    fn default() -> Self {
        Self {
            attack_seconds: 0.0,
            decay_seconds: 0.0,
            sustain_fraction: 1.0,
            release_seconds: 0.0,
        }
    }
}

impl AdsrParameters {
    pub fn attack_seconds(&self) -> f32 {
        self.attack_seconds
    }

    pub fn set_attack_seconds(&mut self, seconds: f32) {
        self.attack_seconds = seconds.max(0.0);
    }

    pub fn decay_seconds(&self) -> f32 {
        self.decay_seconds
    }

    pub fn set_decay_seconds(&mut self, seconds: f32) {
        self.decay_seconds = seconds.max(0.0);
    }

    pub fn sustain_fraction(&self) -> f32 {
        self.sustain_fraction
    }

    pub fn set_sustain_fraction(&mut self, fraction: f32) {
        self.sustain_fraction = fraction.clamp(0.0, 1.0);
    }

    pub fn release_seconds(&self) -> f32 {
        self.release_seconds
    }

    pub fn set_release_seconds(&mut self, seconds: f32) {
        self.release_seconds = seconds.max(0.0);
    }
}

/// Envelope stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// One ADSR envelope instance with cached per-stage step sizes.
///
/// Linear segments. A zero-length stage completes on its first update.
/// Retriggering continues the attack from the current level so restarts do
/// not click.
#[derive(Clone, Debug)]
pub struct AdsrEnvelope {
    params: AdsrParameters,
    /// Updates per second (block rate, not sample rate).
    rate: f32,
    stage: EnvelopeStage,
    level: f32,
    attack_step: f32,
    decay_step: f32,
    /// Computed when release begins, from the level at that moment.
    release_step: f32,
}

impl AdsrEnvelope {
    /// Creates an idle envelope updating at the given block rate.
    pub fn new(rate: f32) -> Self {
        let mut envelope = Self {
            params: AdsrParameters::default(),
            rate,
            stage: EnvelopeStage::Idle,
            level: 0.0,
            attack_step: f32::INFINITY,
            decay_step: f32::INFINITY,
            release_step: f32::INFINITY,
        };
        envelope.recalculate_steps();
        envelope
    }

    /// Replaces the envelope settings, keeping the current stage and level.
    pub fn set_parameters(&mut self, params: &AdsrParameters) {
        self.params = *params;
        self.recalculate_steps();
    }

    /// Changes the update rate (blocks per second).
    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate;
        self.recalculate_steps();
    }

    fn recalculate_steps(&mut self) {
        self.attack_step = step_for(1.0, self.params.attack_seconds, self.rate);
        self.decay_step = step_for(
            1.0 - self.params.sustain_fraction,
            self.params.decay_seconds,
            self.rate,
        );
    }

    /// Starts a fresh note from silence.
    pub fn start(&mut self) {
        self.level = 0.0;
        self.stage = EnvelopeStage::Attack;
    }

    /// Retriggers from the current level.
    pub fn retrigger(&mut self) {
        self.stage = EnvelopeStage::Attack;
    }

    /// Begins the release stage, sloping from wherever the level is now.
    pub fn release(&mut self) {
        if self.stage == EnvelopeStage::Idle {
            return;
        }
        self.release_step = step_for(self.level, self.params.release_seconds, self.rate);
        self.stage = EnvelopeStage::Release;
    }

    /// Immediately silences the envelope.
    pub fn stop(&mut self) {
        self.level = 0.0;
        self.stage = EnvelopeStage::Idle;
    }

    pub fn is_idle(&self) -> bool {
        self.stage == EnvelopeStage::Idle
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Advances the envelope by one block and returns the new level.
    pub fn next_level(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }
            EnvelopeStage::Attack => {
                self.level += self.attack_step;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvelopeStage::Decay;
                }
            }
            EnvelopeStage::Decay => {
                self.level -= self.decay_step;
                if self.level <= self.params.sustain_fraction {
                    self.level = self.params.sustain_fraction;
                    self.stage = EnvelopeStage::Sustain;
                }
            }
            EnvelopeStage::Sustain => {
                // Track the shared sustain setting so live edits are heard.
                self.level = self.params.sustain_fraction;
            }
            EnvelopeStage::Release => {
                self.level -= self.release_step;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }
        self.level
    }
}

/// Step size that spans `distance` in `seconds` at `rate` updates/second.
/// Zero-length stages produce an infinite step, completing immediately.
fn step_for(distance: f32, seconds: f32, rate: f32) -> f32 {
    if seconds <= 0.0 || rate <= 0.0 {
        return f32::INFINITY;
    }
    (distance / (seconds * rate)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 44.1kHz at a 16-frame block size.
    const RATE: f32 = 44100.0 / 16.0;

    #[test]
    fn test_default_envelope_jumps_to_sustain() {
        let mut envelope = AdsrEnvelope::new(RATE);
        envelope.start();

        // Zero attack and decay with full sustain: audible on the first block.
        assert_eq!(envelope.next_level(), 1.0);
        assert_eq!(envelope.stage(), EnvelopeStage::Decay);
        assert_eq!(envelope.next_level(), 1.0);
        assert_eq!(envelope.stage(), EnvelopeStage::Sustain);
    }

    #[test]
    fn test_attack_ramps_linearly() {
        let mut params = AdsrParameters::default();
        params.set_attack_seconds(1.0);
        let mut envelope = AdsrEnvelope::new(RATE);
        envelope.set_parameters(&params);
        envelope.start();

        let first = envelope.next_level();
        let second = envelope.next_level();
        assert!(first > 0.0 && first < 1.0);
        assert!((second - 2.0 * first).abs() < 1e-5);
        assert_eq!(envelope.stage(), EnvelopeStage::Attack);
    }

    #[test]
    fn test_decay_settles_on_sustain() {
        let mut params = AdsrParameters::default();
        params.set_decay_seconds(0.01);
        params.set_sustain_fraction(0.5);
        let mut envelope = AdsrEnvelope::new(RATE);
        envelope.set_parameters(&params);
        envelope.start();

        for _ in 0..1000 {
            envelope.next_level();
        }
        assert_eq!(envelope.stage(), EnvelopeStage::Sustain);
        assert_eq!(envelope.level(), 0.5);
    }

    #[test]
    fn test_release_reaches_idle() {
        let mut params = AdsrParameters::default();
        params.set_release_seconds(0.01);
        let mut envelope = AdsrEnvelope::new(RATE);
        envelope.set_parameters(&params);
        envelope.start();
        envelope.next_level();

        envelope.release();
        assert_eq!(envelope.stage(), EnvelopeStage::Release);
        for _ in 0..1000 {
            envelope.next_level();
        }
        assert!(envelope.is_idle());
        assert_eq!(envelope.level(), 0.0);
    }

    #[test]
    fn test_retrigger_keeps_level() {
        let mut params = AdsrParameters::default();
        params.set_attack_seconds(1.0);
        let mut envelope = AdsrEnvelope::new(RATE);
        envelope.set_parameters(&params);
        envelope.start();
        for _ in 0..100 {
            envelope.next_level();
        }
        let level = envelope.level();
        assert!(level > 0.0);

        envelope.retrigger();
        assert!(envelope.level() >= level);
        assert_eq!(envelope.stage(), EnvelopeStage::Attack);
    }

    #[test]
    fn test_setters_clamp() {
        let mut params = AdsrParameters::default();
        params.set_attack_seconds(-1.0);
        params.set_sustain_fraction(2.0);
        params.set_release_seconds(-0.5);

        assert_eq!(params.attack_seconds(), 0.0);
        assert_eq!(params.sustain_fraction(), 1.0);
        assert_eq!(params.release_seconds(), 0.0);
    }
}
