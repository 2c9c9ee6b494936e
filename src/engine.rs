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

//! The sampler engine's control surface.
//!
//! [`Sampler`] lives on the event/control thread: it owns the sample
//! buffers, keymap, tuning, and pedal state, and translates note events
//! into voice transitions. Its counterpart [`Renderer`] lives on the audio
//! thread. The two share a table of per-voice note numbers (the
//! synchronization word for each slot) and a bounded command channel:
//! the control side claims an idle slot by storing its note number, and
//! only the renderer stores the idle marker back when a voice finishes.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use crate::dsp::envelope::AdsrParameters;
use crate::pedal::SustainPedalLogic;
use crate::sample::{KeyMap, SampleBuffer, SampleData};
use crate::tuning::TuningTable;
use crate::{MAX_POLYPHONY, MIDI_NOTE_COUNT};

use self::command::{VoiceCommand, COMMAND_QUEUE_CAPACITY};
use self::params::SharedParams;

pub(crate) mod command;
mod params;
pub mod renderer;
#[cfg(test)]
mod tests;

pub use renderer::Renderer;

/// Marker stored in the voice table while a slot is idle.
const IDLE: i32 = -1;

/// Interval between quiescence polls in [`Sampler::stop_all_voices`].
const STOP_POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Velocity used when a released mono note falls back to a still-held key.
const HELD_KEY_VELOCITY: u8 = 100;

/// Cross-thread view of the voice pool: one note number per slot plus the
/// stop-all barrier flag.
pub(crate) struct VoiceTable {
    notes: [AtomicI32; MAX_POLYPHONY],
    stopping_all_voices: AtomicBool,
}

impl Default for VoiceTable {
    fn default() -> Self {
        Self {
            notes: std::array::from_fn(|_| AtomicI32::new(IDLE)),
            stopping_all_voices: AtomicBool::new(false),
        }
    }
}

impl VoiceTable {
    pub(crate) fn note(&self, slot: usize) -> i32 {
        self.notes[slot].load(Ordering::Acquire)
    }

    /// Control side: record the note a slot is being asked to play.
    pub(crate) fn claim(&self, slot: usize, note: i32) {
        self.notes[slot].store(note, Ordering::Release);
    }

    /// Audio side: publish that a slot has gone idle.
    pub(crate) fn publish_idle(&self, slot: usize) {
        self.notes[slot].store(IDLE, Ordering::Release);
    }

    pub(crate) fn find_voice_playing(&self, note: u8) -> Option<usize> {
        let note = i32::from(note);
        (0..MAX_POLYPHONY).find(|slot| self.note(*slot) == note)
    }

    pub(crate) fn first_idle(&self) -> Option<usize> {
        (0..MAX_POLYPHONY).find(|slot| self.note(*slot) < 0)
    }

    pub(crate) fn active_count(&self) -> usize {
        (0..MAX_POLYPHONY).filter(|slot| self.note(*slot) >= 0).count()
    }

    pub(crate) fn is_stopping(&self) -> bool {
        self.stopping_all_voices.load(Ordering::Acquire)
    }

    fn begin_stop_all(&self) {
        self.stopping_all_voices.store(true, Ordering::Release);
    }

    fn end_stop_all(&self) {
        self.stopping_all_voices.store(false, Ordering::Release);
    }
}

/// The control-side half of the sampler engine.
///
/// Constructed together with its [`Renderer`]; see [`Sampler::new`]. All
/// methods are intended for a single control thread. Keymap construction
/// and sample loading must only happen while no voice is active; quiesce
/// with [`Sampler::stop_all_voices`] first.
pub struct Sampler {
    sample_rate: f32,
    buffers: Vec<Arc<SampleBuffer>>,
    keymap: KeyMap,
    tuning: TuningTable,
    pedal: SustainPedalLogic,
    last_played_note: i32,
    amp_adsr: AdsrParameters,
    filter_adsr: AdsrParameters,
    params: Arc<SharedParams>,
    table: Arc<VoiceTable>,
    commands: Sender<VoiceCommand>,
}

impl Sampler {
    /// Creates a sampler and its renderer for the given sample rate.
    pub fn new(sample_rate: f32) -> (Sampler, Renderer) {
        let params = Arc::new(SharedParams::default());
        let table = Arc::new(VoiceTable::default());
        let (sender, receiver) = crossbeam_channel::bounded(COMMAND_QUEUE_CAPACITY);

        let renderer = Renderer::new(sample_rate, params.clone(), table.clone(), receiver);
        let sampler = Sampler {
            sample_rate,
            buffers: Vec::new(),
            keymap: KeyMap::default(),
            tuning: TuningTable::default(),
            pedal: SustainPedalLogic::default(),
            last_played_note: -1,
            amp_adsr: AdsrParameters::default(),
            filter_adsr: AdsrParameters::default(),
            params,
            table,
            commands: sender,
        };
        info!(sample_rate, "Sampler engine created");
        (sampler, renderer)
    }

    /// Loads one sample buffer from a descriptor and raw PCM. Load order
    /// is significant: velocity overlaps resolve to the earliest match.
    pub fn load_sample_data(&mut self, data: &SampleData) {
        let buffer = Arc::new(SampleBuffer::from_data(data));
        debug!(
            root_note = buffer.root_note(),
            min_note = buffer.min_note(),
            max_note = buffer.max_note(),
            min_velocity = buffer.min_velocity(),
            max_velocity = buffer.max_velocity(),
            frames = buffer.frame_count(),
            "Sample buffer loaded"
        );
        self.buffers.push(buffer);
    }

    /// Unloads every sample and invalidates the keymap. Callers must
    /// quiesce with [`Sampler::stop_all_voices`] first.
    pub fn unload_all_samples(&mut self) {
        self.keymap.invalidate();
        self.buffers.clear();
    }

    /// Maps every note to the loaded buffer(s) nearest in pitch.
    pub fn build_simple_key_map(&mut self) {
        self.keymap.build_simple(&self.buffers, &self.tuning);
    }

    /// Maps notes from each buffer's explicit key range.
    pub fn build_key_map(&mut self) {
        self.keymap.build_from_ranges(&self.buffers, &self.tuning);
    }

    /// Returns true when a keymap build has completed.
    pub fn is_key_map_valid(&self) -> bool {
        self.keymap.is_valid()
    }

    /// Overrides the tuning of one note; effective on the next note event.
    pub fn set_note_frequency(&mut self, note: u8, frequency: f32) {
        self.tuning.set_frequency(note, frequency);
    }

    /// Handles a key press.
    pub fn play_note(&mut self, note: u8, velocity: u8) {
        // Capture before recording this key, so legato can tell whether
        // some other key was already held.
        let another_key_was_down = self.pedal.is_any_key_down();
        self.pedal.key_down_action(note);
        self.play(note, velocity, another_key_was_down);
    }

    /// Handles a key release. Non-immediate stops may be deferred by the
    /// sustain pedal.
    pub fn stop_note(&mut self, note: u8, immediate: bool) {
        if immediate || self.pedal.key_up_action(note) {
            self.stop(note, immediate);
        }
    }

    /// Handles the sustain pedal. Raising the pedal releases every note it
    /// was holding.
    pub fn sustain_pedal(&mut self, down: bool) {
        if down {
            self.pedal.pedal_down();
        } else {
            for note in 0..MIDI_NOTE_COUNT as u8 {
                if self.pedal.is_note_sustaining(note) {
                    self.stop(note, false);
                }
            }
            self.pedal.pedal_up();
        }
    }

    fn play(&mut self, note: u8, velocity: u8, another_key_was_down: bool) {
        if self.table.is_stopping() {
            return;
        }
        if !self.keymap.is_valid() || self.buffers.is_empty() {
            debug!(note, "Note dropped: no keymap");
            return;
        }
        let frequency = self.tuning.frequency(note);
        let velocity01 = f32::from(velocity) / 127.0;

        if self.params.is_monophonic() {
            if self.params.is_legato() && another_key_was_down {
                if self.table.note(0) >= 0 {
                    self.transition(0, VoiceCommand::RestartLegato { slot: 0, note, frequency });
                } else {
                    let Some(buffer) = self.keymap.lookup(note, velocity) else {
                        return;
                    };
                    self.transition(
                        0,
                        VoiceCommand::Start { slot: 0, note, frequency, velocity01, buffer },
                    );
                }
            } else {
                // Monophonic but not legato: always a fresh attack.
                let Some(buffer) = self.keymap.lookup(note, velocity) else {
                    return;
                };
                let command = if self.table.note(0) >= 0 {
                    VoiceCommand::RestartNote { slot: 0, note, frequency, velocity01, buffer }
                } else {
                    VoiceCommand::Start { slot: 0, note, frequency, velocity01, buffer }
                };
                self.transition(0, command);
            }
            self.last_played_note = i32::from(note);
            return;
        }

        // Polyphonic: a note already sounding restarts in place.
        if let Some(slot) = self.table.find_voice_playing(note) {
            let Some(buffer) = self.keymap.lookup(note, velocity) else {
                return;
            };
            self.send(VoiceCommand::RestartSame { slot, velocity01, buffer });
            self.last_played_note = i32::from(note);
            return;
        }

        let Some(slot) = self.table.first_idle() else {
            debug!(note, "Note dropped: all voices in use");
            return;
        };
        let Some(buffer) = self.keymap.lookup(note, velocity) else {
            return;
        };
        self.transition(slot, VoiceCommand::Start { slot, note, frequency, velocity01, buffer });
        self.last_played_note = i32::from(note);
    }

    fn stop(&mut self, note: u8, immediate: bool) {
        let Some(slot) = self.table.find_voice_playing(note) else {
            return;
        };

        if immediate {
            self.send(VoiceCommand::Kill { slot });
            return;
        }

        if self.params.is_monophonic() {
            let held_key = self.pedal.first_key_down();
            if held_key < 0 {
                self.send(VoiceCommand::Release {
                    slot,
                    loop_thru_release: self.params.loop_thru_release(),
                });
            } else if self.params.is_legato() {
                let key = held_key as u8;
                self.transition(
                    slot,
                    VoiceCommand::RestartLegato {
                        slot,
                        note: key,
                        frequency: self.tuning.frequency(key),
                    },
                );
            } else {
                // Fall back to the held key with a fresh attack.
                let key = held_key as u8;
                let Some(buffer) = self.keymap.lookup(key, HELD_KEY_VELOCITY) else {
                    return;
                };
                self.transition(
                    slot,
                    VoiceCommand::RestartNote {
                        slot,
                        note: key,
                        frequency: self.tuning.frequency(key),
                        velocity01: f32::from(HELD_KEY_VELOCITY) / 127.0,
                        buffer,
                    },
                );
            }
        } else {
            self.send(VoiceCommand::Release {
                slot,
                loop_thru_release: self.params.loop_thru_release(),
            });
        }
    }

    /// Claims the slot for the command's note, then queues it; rolls the
    /// claim back if the queue is full.
    fn transition(&mut self, slot: usize, command: VoiceCommand) {
        let claimed = match &command {
            VoiceCommand::Start { note, .. }
            | VoiceCommand::RestartNote { note, .. }
            | VoiceCommand::RestartLegato { note, .. } => i32::from(*note),
            _ => self.table.note(slot),
        };
        let previous = self.table.note(slot);
        self.table.claim(slot, claimed);
        if !self.send(command) {
            self.table.claim(slot, previous);
        }
    }

    fn send(&self, command: VoiceCommand) -> bool {
        match self.commands.try_send(command) {
            Ok(()) => true,
            Err(_) => {
                warn!("Voice command queue full; event dropped");
                false
            }
        }
    }

    /// Quiesces the voice pool: blocks new notes, asks the renderer to kill
    /// every active voice, and returns once all slots are idle.
    ///
    /// The in-flight render block completes; the barrier takes effect at
    /// the next block boundary, so the audio thread must keep ticking while
    /// this spins.
    pub fn stop_all_voices(&self) {
        self.table.begin_stop_all();
        while self.table.active_count() > 0 {
            spin_sleep::sleep(STOP_POLL_INTERVAL);
        }
        info!("All voices stopped");
    }

    /// Allows notes to start again after [`Sampler::stop_all_voices`].
    pub fn restart_voices(&self) {
        self.table.end_stop_all();
    }

    /// Number of slots currently assigned to a note (sounding or releasing).
    pub fn active_voice_count(&self) -> usize {
        self.table.active_count()
    }

    /// The most recently started note, negative before any note has played.
    pub fn last_played_note(&self) -> i32 {
        self.last_played_note
    }

    // Amplitude envelope settings. Each setter pushes the refresh to every
    // voice at the next block boundary.

    pub fn amp_attack_seconds(&self) -> f32 {
        self.amp_adsr.attack_seconds()
    }

    pub fn set_amp_attack_seconds(&mut self, seconds: f32) {
        self.amp_adsr.set_attack_seconds(seconds);
        self.send(VoiceCommand::SetAmpAdsr(self.amp_adsr));
    }

    pub fn amp_decay_seconds(&self) -> f32 {
        self.amp_adsr.decay_seconds()
    }

    pub fn set_amp_decay_seconds(&mut self, seconds: f32) {
        self.amp_adsr.set_decay_seconds(seconds);
        self.send(VoiceCommand::SetAmpAdsr(self.amp_adsr));
    }

    pub fn amp_sustain_fraction(&self) -> f32 {
        self.amp_adsr.sustain_fraction()
    }

    pub fn set_amp_sustain_fraction(&mut self, fraction: f32) {
        self.amp_adsr.set_sustain_fraction(fraction);
        self.send(VoiceCommand::SetAmpAdsr(self.amp_adsr));
    }

    pub fn amp_release_seconds(&self) -> f32 {
        self.amp_adsr.release_seconds()
    }

    pub fn set_amp_release_seconds(&mut self, seconds: f32) {
        self.amp_adsr.set_release_seconds(seconds);
        self.send(VoiceCommand::SetAmpAdsr(self.amp_adsr));
    }

    // Filter envelope settings.

    pub fn filter_attack_seconds(&self) -> f32 {
        self.filter_adsr.attack_seconds()
    }

    pub fn set_filter_attack_seconds(&mut self, seconds: f32) {
        self.filter_adsr.set_attack_seconds(seconds);
        self.send(VoiceCommand::SetFilterAdsr(self.filter_adsr));
    }

    pub fn filter_decay_seconds(&self) -> f32 {
        self.filter_adsr.decay_seconds()
    }

    pub fn set_filter_decay_seconds(&mut self, seconds: f32) {
        self.filter_adsr.set_decay_seconds(seconds);
        self.send(VoiceCommand::SetFilterAdsr(self.filter_adsr));
    }

    pub fn filter_sustain_fraction(&self) -> f32 {
        self.filter_adsr.sustain_fraction()
    }

    pub fn set_filter_sustain_fraction(&mut self, fraction: f32) {
        self.filter_adsr.set_sustain_fraction(fraction);
        self.send(VoiceCommand::SetFilterAdsr(self.filter_adsr));
    }

    pub fn filter_release_seconds(&self) -> f32 {
        self.filter_adsr.release_seconds()
    }

    pub fn set_filter_release_seconds(&mut self, seconds: f32) {
        self.filter_adsr.set_release_seconds(seconds);
        self.send(VoiceCommand::SetFilterAdsr(self.filter_adsr));
    }

    // Global scalar controls.

    pub fn master_volume(&self) -> f32 {
        self.params.master_volume()
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.params.set_master_volume(volume);
    }

    pub fn pitch_offset(&self) -> f32 {
        self.params.pitch_offset()
    }

    pub fn set_pitch_offset(&mut self, semitones: f32) {
        self.params.set_pitch_offset(semitones);
    }

    pub fn vibrato_depth(&self) -> f32 {
        self.params.vibrato_depth()
    }

    pub fn set_vibrato_depth(&mut self, semitones: f32) {
        self.params.set_vibrato_depth(semitones);
    }

    pub fn glide_rate(&self) -> f32 {
        self.params.glide_rate()
    }

    pub fn set_glide_rate(&mut self, sec_per_octave: f32) {
        self.params.set_glide_rate(sec_per_octave);
    }

    pub fn portamento_rate(&self) -> f32 {
        self.params.portamento_rate()
    }

    pub fn set_portamento_rate(&mut self, rate: f32) {
        self.params.set_portamento_rate(rate);
    }

    pub fn is_monophonic(&self) -> bool {
        self.params.is_monophonic()
    }

    pub fn set_monophonic(&mut self, monophonic: bool) {
        self.params.set_monophonic(monophonic);
    }

    pub fn is_legato(&self) -> bool {
        self.params.is_legato()
    }

    pub fn set_legato(&mut self, legato: bool) {
        self.params.set_legato(legato);
    }

    pub fn cutoff_multiple(&self) -> f32 {
        self.params.cutoff_multiple()
    }

    pub fn set_cutoff_multiple(&mut self, multiple: f32) {
        self.params.set_cutoff_multiple(multiple);
    }

    pub fn key_tracking(&self) -> f32 {
        self.params.key_tracking()
    }

    pub fn set_key_tracking(&mut self, tracking: f32) {
        self.params.set_key_tracking(tracking);
    }

    pub fn cutoff_envelope_strength(&self) -> f32 {
        self.params.cutoff_envelope_strength()
    }

    pub fn set_cutoff_envelope_strength(&mut self, strength: f32) {
        self.params.set_cutoff_envelope_strength(strength);
    }

    pub fn filter_envelope_velocity_scaling(&self) -> f32 {
        self.params.filter_envelope_velocity_scaling()
    }

    pub fn set_filter_envelope_velocity_scaling(&mut self, scaling: f32) {
        self.params.set_filter_envelope_velocity_scaling(scaling);
    }

    pub fn linear_resonance(&self) -> f32 {
        self.params.linear_resonance()
    }

    pub fn set_linear_resonance(&mut self, resonance: f32) {
        self.params.set_linear_resonance(resonance);
    }

    pub fn loop_thru_release(&self) -> bool {
        self.params.loop_thru_release()
    }

    pub fn set_loop_thru_release(&mut self, loop_thru_release: bool) {
        self.params.set_loop_thru_release(loop_thru_release);
    }

    pub fn is_filter_enabled(&self) -> bool {
        self.params.is_filter_enabled()
    }

    pub fn set_filter_enabled(&mut self, enabled: bool) {
        self.params.set_filter_enabled(enabled);
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    #[cfg(test)]
    pub(crate) fn buffers(&self) -> &[Arc<SampleBuffer>] {
        &self.buffers
    }

    #[cfg(test)]
    pub(crate) fn table(&self) -> &VoiceTable {
        &self.table
    }
}
