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

//! End-to-end engine behavior: dispatch policies, pedal interaction,
//! polyphony limits, and the stop-all barrier.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::{Renderer, Sampler};
use crate::dsp::envelope::EnvelopeStage;
use crate::sample::{SampleData, SampleDescriptor};
use crate::testutil;
use crate::{CHUNK_SIZE, MAX_POLYPHONY};

const SAMPLE_RATE: f32 = 44100.0;

fn engine() -> (Sampler, Renderer) {
    Sampler::new(SAMPLE_RATE)
}

fn load_sine(sampler: &mut Sampler, descriptor: SampleDescriptor, frames: usize) {
    let pcm: Vec<f32> = (0..frames)
        .map(|i| (std::f32::consts::TAU * 261.63 * i as f32 / SAMPLE_RATE).sin())
        .collect();
    sampler.load_sample_data(&SampleData {
        sample_rate: SAMPLE_RATE,
        channel_count: 1,
        is_interleaved: false,
        frame_count: frames,
        pcm: &pcm,
        descriptor,
    });
}

/// One full-range buffer rooted at middle C, looping so held notes sustain
/// across arbitrarily many blocks.
fn load_default_sine(sampler: &mut Sampler) {
    load_sine(
        sampler,
        SampleDescriptor {
            is_looping: true,
            loop_start_point: 0.0,
            loop_end_point: 1.0,
            ..SampleDescriptor::default()
        },
        4096,
    );
}

fn render_block(renderer: &mut Renderer) -> (Vec<f32>, Vec<f32>) {
    let mut left = vec![0.0; CHUNK_SIZE];
    let mut right = vec![0.0; CHUNK_SIZE];
    renderer.render(&mut left, &mut right);
    (left, right)
}

#[test]
fn test_single_buffer_renders_stereo() {
    let (mut sampler, mut renderer) = engine();
    load_sine(&mut sampler, SampleDescriptor::default(), 4096);
    sampler.build_key_map();

    sampler.play_note(72, 100);
    assert_eq!(sampler.active_voice_count(), 1);
    assert_eq!(sampler.table().note(0), 72);

    let (left, right) = render_block(&mut renderer);
    assert_eq!(renderer.voice(0).note_number(), 72);
    assert!(left.iter().any(|s| s.abs() > 0.0));
    assert!(right.iter().any(|s| s.abs() > 0.0));
}

#[test]
fn test_play_before_keymap_is_a_no_op() {
    let (mut sampler, mut renderer) = engine();
    load_sine(&mut sampler, SampleDescriptor::default(), 256);

    sampler.play_note(60, 100);
    assert_eq!(sampler.active_voice_count(), 0);

    let (left, _) = render_block(&mut renderer);
    assert!(left.iter().all(|s| *s == 0.0));
}

#[test]
fn test_play_with_no_buffers_is_a_no_op() {
    let (mut sampler, _renderer) = engine();
    sampler.build_key_map();
    sampler.play_note(60, 100);
    assert_eq!(sampler.active_voice_count(), 0);
}

#[test]
fn test_velocity_layers_select_and_restart() {
    let (mut sampler, mut renderer) = engine();
    let soft = SampleDescriptor {
        min_velocity: 1,
        max_velocity: 63,
        is_looping: true,
        loop_end_point: 1.0,
        ..SampleDescriptor::default()
    };
    let loud = SampleDescriptor {
        min_velocity: 64,
        max_velocity: 127,
        is_looping: true,
        loop_end_point: 1.0,
        ..SampleDescriptor::default()
    };
    load_sine(&mut sampler, soft, 4096);
    load_sine(&mut sampler, loud, 4096);
    sampler.build_key_map();

    sampler.play_note(60, 40);
    render_block(&mut renderer);
    assert!(Arc::ptr_eq(
        renderer.voice(0).sample().unwrap(),
        &sampler.buffers()[0]
    ));

    // Same note at a harder velocity restarts the same slot with the loud
    // layer rather than allocating a second voice.
    sampler.play_note(60, 100);
    render_block(&mut renderer);
    assert_eq!(sampler.active_voice_count(), 1);
    assert_eq!(renderer.voice(0).note_number(), 60);
    assert!(Arc::ptr_eq(
        renderer.voice(0).sample().unwrap(),
        &sampler.buffers()[1]
    ));
}

#[test]
fn test_polyphony_fills_slots_in_order() {
    let (mut sampler, mut renderer) = engine();
    load_default_sine(&mut sampler);
    sampler.build_key_map();

    for note in 60..64 {
        sampler.play_note(note, 100);
    }
    render_block(&mut renderer);

    for slot in 0..4 {
        assert_eq!(renderer.voice(slot).note_number(), 60 + slot as i32);
    }
    assert_eq!(sampler.active_voice_count(), 4);
}

#[test]
fn test_at_most_one_voice_per_note() {
    let (mut sampler, mut renderer) = engine();
    load_default_sine(&mut sampler);
    sampler.build_key_map();

    sampler.play_note(60, 100);
    sampler.play_note(60, 100);
    render_block(&mut renderer);
    assert_eq!(sampler.active_voice_count(), 1);
}

#[test]
fn test_voice_exhaustion_drops_the_65th_note() {
    let (mut sampler, _renderer) = engine();
    load_default_sine(&mut sampler);
    sampler.build_key_map();

    for note in 0..=MAX_POLYPHONY as u8 {
        sampler.play_note(note, 100);
    }
    assert_eq!(sampler.active_voice_count(), MAX_POLYPHONY);
    // Note 64 lost the race for a slot; notes 0..63 are all assigned.
    assert!(sampler.table().find_voice_playing(64).is_none());
}

#[test]
fn test_immediate_stop_frees_slot_within_one_block() {
    let (mut sampler, mut renderer) = engine();
    load_default_sine(&mut sampler);
    sampler.build_key_map();

    sampler.play_note(60, 100);
    render_block(&mut renderer);
    assert_eq!(sampler.active_voice_count(), 1);

    sampler.stop_note(60, true);
    render_block(&mut renderer);
    assert_eq!(sampler.active_voice_count(), 0);
    assert!(renderer.voice(0).note_number() < 0);
}

#[test]
fn test_release_runs_envelope_out() {
    let (mut sampler, mut renderer) = engine();
    load_default_sine(&mut sampler);
    sampler.build_key_map();
    sampler.set_amp_release_seconds(0.01);

    sampler.play_note(60, 100);
    render_block(&mut renderer);
    sampler.stop_note(60, false);

    // ~28 release blocks at 0.01s; give it room and require eventual reap.
    for _ in 0..100 {
        render_block(&mut renderer);
    }
    assert_eq!(sampler.active_voice_count(), 0);
}

#[test]
fn test_sustain_pedal_defers_note_off() {
    let (mut sampler, mut renderer) = engine();
    load_default_sine(&mut sampler);
    sampler.build_key_map();
    sampler.set_amp_release_seconds(0.5);

    sampler.sustain_pedal(true);
    sampler.play_note(60, 100);
    render_block(&mut renderer);
    render_block(&mut renderer);

    sampler.stop_note(60, false);
    render_block(&mut renderer);
    // Key-up with the pedal down: still sounding, not in release.
    assert_eq!(sampler.active_voice_count(), 1);
    assert_ne!(renderer.voice(0).amp_stage(), EnvelopeStage::Release);

    sampler.sustain_pedal(false);
    render_block(&mut renderer);
    assert_eq!(renderer.voice(0).amp_stage(), EnvelopeStage::Release);
}

#[test]
fn test_mono_legato_transition_and_fallback() {
    let (mut sampler, mut renderer) = engine();
    load_default_sine(&mut sampler);
    sampler.build_key_map();
    sampler.set_monophonic(true);
    sampler.set_legato(true);
    sampler.set_amp_sustain_fraction(0.8);

    sampler.play_note(60, 100);
    render_block(&mut renderer);
    render_block(&mut renderer);
    render_block(&mut renderer);
    assert_eq!(renderer.voice(0).amp_stage(), EnvelopeStage::Sustain);

    // Second key while the first is held: same voice changes pitch with no
    // envelope retrigger.
    sampler.play_note(64, 100);
    render_block(&mut renderer);
    assert_eq!(sampler.active_voice_count(), 1);
    assert_eq!(renderer.voice(0).note_number(), 64);
    assert_eq!(renderer.voice(0).amp_stage(), EnvelopeStage::Sustain);

    // Releasing the second key falls back to the still-held first key.
    sampler.stop_note(64, false);
    render_block(&mut renderer);
    assert_eq!(renderer.voice(0).note_number(), 60);
    assert_eq!(renderer.voice(0).amp_stage(), EnvelopeStage::Sustain);
}

#[test]
fn test_mono_non_legato_retriggers() {
    let (mut sampler, mut renderer) = engine();
    load_default_sine(&mut sampler);
    sampler.build_key_map();
    sampler.set_monophonic(true);
    sampler.set_amp_sustain_fraction(0.8);

    sampler.play_note(60, 100);
    render_block(&mut renderer);
    render_block(&mut renderer);
    render_block(&mut renderer);
    assert_eq!(renderer.voice(0).amp_stage(), EnvelopeStage::Sustain);

    // A slow attack makes the retrigger observable as a fresh attack stage.
    sampler.set_amp_attack_seconds(0.5);
    sampler.play_note(64, 100);
    render_block(&mut renderer);

    assert_eq!(sampler.active_voice_count(), 1);
    assert_eq!(renderer.voice(0).note_number(), 64);
    assert_eq!(renderer.voice(0).amp_stage(), EnvelopeStage::Attack);
}

#[test]
fn test_mono_has_at_most_one_active_voice() {
    let (mut sampler, mut renderer) = engine();
    load_default_sine(&mut sampler);
    sampler.build_key_map();
    sampler.set_monophonic(true);

    for note in [60u8, 64, 67, 72] {
        sampler.play_note(note, 100);
        render_block(&mut renderer);
        assert_eq!(sampler.active_voice_count(), 1);
    }
    assert_eq!(renderer.voice(0).note_number(), 72);
}

#[test]
fn test_sample_runout_reaps_voice_in_poly_mode() {
    let (mut sampler, mut renderer) = engine();
    // Short one-shot: 64 frames is four blocks at unity rate.
    load_sine(&mut sampler, SampleDescriptor::default(), 64);
    sampler.build_key_map();

    sampler.play_note(60, 100);
    for _ in 0..8 {
        render_block(&mut renderer);
    }
    assert_eq!(sampler.active_voice_count(), 0);
}

#[test]
fn test_mono_legato_voice_survives_runout() {
    let (mut sampler, mut renderer) = engine();
    load_sine(&mut sampler, SampleDescriptor::default(), 64);
    sampler.build_key_map();
    sampler.set_monophonic(true);
    sampler.set_legato(true);

    sampler.play_note(60, 100);
    for _ in 0..8 {
        render_block(&mut renderer);
    }
    // The buffer has run dry but the voice stays claimable for the next
    // legato transition.
    assert_eq!(sampler.active_voice_count(), 1);
}

#[test]
fn test_last_played_note_tracks_starts_and_restarts() {
    let (mut sampler, mut renderer) = engine();
    load_default_sine(&mut sampler);
    sampler.build_key_map();
    assert!(sampler.last_played_note() < 0);

    sampler.play_note(60, 100);
    assert_eq!(sampler.last_played_note(), 60);
    sampler.play_note(64, 100);
    assert_eq!(sampler.last_played_note(), 64);
    render_block(&mut renderer);
    sampler.play_note(60, 50);
    assert_eq!(sampler.last_played_note(), 60);
}

#[test]
fn test_retuned_note_takes_effect_on_next_event() {
    let (mut sampler, mut renderer) = engine();
    load_default_sine(&mut sampler);
    sampler.build_key_map();

    sampler.set_note_frequency(60, 300.0);
    sampler.play_note(60, 100);
    render_block(&mut renderer);
    assert_eq!(renderer.voice(0).note_frequency(), 300.0);
}

#[test]
fn test_stop_all_voices_quiesces_and_blocks_new_notes() {
    let _ = tracing_subscriber::fmt::try_init();
    let (mut sampler, mut renderer) = engine();
    load_default_sine(&mut sampler);
    sampler.build_key_map();

    let done = Arc::new(AtomicBool::new(false));
    let render_done = done.clone();
    let render_thread = thread::spawn(move || {
        let mut left = [0.0f32; CHUNK_SIZE];
        let mut right = [0.0f32; CHUNK_SIZE];
        while !render_done.load(Ordering::Relaxed) {
            left.fill(0.0);
            right.fill(0.0);
            renderer.render(&mut left, &mut right);
            thread::sleep(Duration::from_micros(250));
        }
        renderer
    });

    for note in 60..70 {
        sampler.play_note(note, 100);
    }
    assert_eq!(sampler.active_voice_count(), 10);

    sampler.stop_all_voices();
    assert_eq!(sampler.active_voice_count(), 0);

    // The barrier holds until restart_voices.
    sampler.play_note(72, 100);
    assert_eq!(sampler.active_voice_count(), 0);

    sampler.restart_voices();
    sampler.play_note(72, 100);
    assert_eq!(sampler.active_voice_count(), 1);
    testutil::eventually(
        || sampler.active_voice_count() == 1,
        "voice did not survive restart",
    );

    done.store(true, Ordering::Relaxed);
    let mut renderer = render_thread.join().unwrap();
    // One more block guarantees the queued start has been applied.
    let mut left = [0.0f32; CHUNK_SIZE];
    let mut right = [0.0f32; CHUNK_SIZE];
    renderer.render(&mut left, &mut right);
    assert_eq!(renderer.voice(0).note_number(), 72);
}

#[test]
fn test_unload_all_samples_invalidates_keymap() {
    let (mut sampler, _renderer) = engine();
    load_default_sine(&mut sampler);
    sampler.build_key_map();
    assert!(sampler.is_key_map_valid());

    sampler.unload_all_samples();
    assert!(!sampler.is_key_map_valid());
    sampler.play_note(60, 100);
    assert_eq!(sampler.active_voice_count(), 0);
}

#[test]
fn test_adsr_setters_round_trip() {
    let (mut sampler, _renderer) = engine();
    sampler.set_amp_attack_seconds(0.1);
    sampler.set_amp_decay_seconds(0.2);
    sampler.set_amp_sustain_fraction(0.5);
    sampler.set_amp_release_seconds(0.3);
    assert_eq!(sampler.amp_attack_seconds(), 0.1);
    assert_eq!(sampler.amp_decay_seconds(), 0.2);
    assert_eq!(sampler.amp_sustain_fraction(), 0.5);
    assert_eq!(sampler.amp_release_seconds(), 0.3);

    sampler.set_filter_attack_seconds(0.4);
    assert_eq!(sampler.filter_attack_seconds(), 0.4);

    // Clamped rather than rejected.
    sampler.set_amp_sustain_fraction(1.5);
    assert_eq!(sampler.amp_sustain_fraction(), 1.0);
}

#[test]
fn test_vibrato_modulates_pitch() {
    let (mut sampler, mut renderer) = engine();
    load_default_sine(&mut sampler);
    sampler.build_key_map();
    sampler.set_vibrato_depth(0.5);

    sampler.play_note(60, 100);
    // Collect a few hundred blocks; with vibrato the per-block output
    // differs between LFO phases, without it the loop is periodic.
    let mut energies = Vec::new();
    for _ in 0..300 {
        let (left, _) = render_block(&mut renderer);
        energies.push(left.iter().map(|s| s.abs()).sum::<f32>());
    }
    let min = energies.iter().cloned().fold(f32::MAX, f32::min);
    let max = energies.iter().cloned().fold(f32::MIN, f32::max);
    assert!(max - min > 1e-3);
}
