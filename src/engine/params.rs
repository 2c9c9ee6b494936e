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

//! Global scalar controls shared between the control and audio contexts.
//!
//! Each value is an independent atomic; the renderer takes a relaxed
//! snapshot once per block. Tearing across parameters between blocks is
//! acceptable, a parameter is never torn within itself.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// An f32 stored bit-cast in an `AtomicU32`.
#[derive(Debug)]
pub(crate) struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

macro_rules! shared_scalar {
    ($field:ident, $getter:ident, $setter:ident, f32) => {
        pub(crate) fn $getter(&self) -> f32 {
            self.$field.load()
        }

        pub(crate) fn $setter(&self, value: f32) {
            self.$field.store(value);
        }
    };
    ($field:ident, $getter:ident, $setter:ident, bool) => {
        pub(crate) fn $getter(&self) -> bool {
            self.$field.load(Ordering::Relaxed)
        }

        pub(crate) fn $setter(&self, value: bool) {
            self.$field.store(value, Ordering::Relaxed);
        }
    };
}

/// The engine's global controls.
#[derive(Debug)]
pub(crate) struct SharedParams {
    master_volume: AtomicF32,
    pitch_offset: AtomicF32,
    vibrato_depth: AtomicF32,
    glide_rate: AtomicF32,
    portamento_rate: AtomicF32,
    cutoff_multiple: AtomicF32,
    key_tracking: AtomicF32,
    cutoff_envelope_strength: AtomicF32,
    filter_envelope_velocity_scaling: AtomicF32,
    linear_resonance: AtomicF32,
    is_monophonic: AtomicBool,
    is_legato: AtomicBool,
    loop_thru_release: AtomicBool,
    is_filter_enabled: AtomicBool,
}

impl Default for SharedParams {
    fn default() -> Self {
        Self {
            master_volume: AtomicF32::new(1.0),
            pitch_offset: AtomicF32::new(0.0),
            vibrato_depth: AtomicF32::new(0.0),
            // 0 sec/octave means "no glide".
            glide_rate: AtomicF32::new(0.0),
            portamento_rate: AtomicF32::new(1.0),
            cutoff_multiple: AtomicF32::new(4.0),
            key_tracking: AtomicF32::new(1.0),
            cutoff_envelope_strength: AtomicF32::new(20.0),
            filter_envelope_velocity_scaling: AtomicF32::new(0.0),
            linear_resonance: AtomicF32::new(0.5),
            is_monophonic: AtomicBool::new(false),
            is_legato: AtomicBool::new(false),
            loop_thru_release: AtomicBool::new(false),
            is_filter_enabled: AtomicBool::new(false),
        }
    }
}

impl SharedParams {
    shared_scalar!(master_volume, master_volume, set_master_volume, f32);
    shared_scalar!(pitch_offset, pitch_offset, set_pitch_offset, f32);
    shared_scalar!(vibrato_depth, vibrato_depth, set_vibrato_depth, f32);
    shared_scalar!(glide_rate, glide_rate, set_glide_rate, f32);
    shared_scalar!(portamento_rate, portamento_rate, set_portamento_rate, f32);
    shared_scalar!(cutoff_multiple, cutoff_multiple, set_cutoff_multiple, f32);
    shared_scalar!(key_tracking, key_tracking, set_key_tracking, f32);
    shared_scalar!(
        cutoff_envelope_strength,
        cutoff_envelope_strength,
        set_cutoff_envelope_strength,
        f32
    );
    shared_scalar!(
        filter_envelope_velocity_scaling,
        filter_envelope_velocity_scaling,
        set_filter_envelope_velocity_scaling,
        f32
    );
    shared_scalar!(linear_resonance, linear_resonance, set_linear_resonance, f32);
    shared_scalar!(is_monophonic, is_monophonic, set_monophonic, bool);
    shared_scalar!(is_legato, is_legato, set_legato, bool);
    shared_scalar!(loop_thru_release, loop_thru_release, set_loop_thru_release, bool);
    shared_scalar!(is_filter_enabled, is_filter_enabled, set_filter_enabled, bool);
}
