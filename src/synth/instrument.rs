// Instrument - a configurable pool of voices for one track role

use crate::composition::{InstrumentConfig, TrackRole};

use super::voice::Voice;

/// Voices available to a polyphonic instrument.
const POLY_VOICES: usize = 8;

pub struct Instrument {
    role: TrackRole,
    config: InstrumentConfig,
    voices: Vec<Voice>,
    age_counter: u64,
    sample_rate: f32,
}

impl Instrument {
    pub fn new(role: TrackRole, config: InstrumentConfig, sample_rate: f32) -> Self {
        let pool = Self::pool_size(&config);
        Self {
            role,
            config,
            voices: (0..pool).map(|_| Voice::new(sample_rate)).collect(),
            age_counter: 0,
            sample_rate,
        }
    }

    fn pool_size(config: &InstrumentConfig) -> usize {
        if config.family.is_polyphonic() {
            POLY_VOICES
        } else {
            1
        }
    }

    pub fn role(&self) -> TrackRole {
        self.role
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    /// Swap in a new timbre. Idempotent, safe mid-playback: ringing voices
    /// are left alone and the new settings apply from the next trigger.
    pub fn configure(&mut self, config: &InstrumentConfig) {
        if *config == self.config {
            return;
        }
        let pool = Self::pool_size(config);
        if pool != self.voices.len() {
            // Validation keeps the role's polyphony class stable, so this
            // only happens across loads where playback is already stopped.
            self.voices = (0..pool).map(|_| Voice::new(self.sample_rate)).collect();
        }
        self.config = config.clone();
    }

    pub fn note_on(&mut self, midi: u8, velocity: f32) {
        self.age_counter = self.age_counter.wrapping_add(1);

        if let Some(index) = self.voices.iter().position(|v| !v.is_active()) {
            self.voices[index].note_on(&self.config, midi, velocity, self.age_counter);
            return;
        }

        // Voice stealing: prefer a releasing voice, then the oldest.
        let victim = self.find_voice_to_steal();
        self.voices[victim].note_on(&self.config, midi, velocity, self.age_counter);
    }

    fn find_voice_to_steal(&self) -> usize {
        let mut best_index = 0;
        let mut best_releasing = false;
        let mut best_age = u64::MAX;

        for (index, voice) in self.voices.iter().enumerate() {
            let releasing = voice.is_releasing();
            let steal = if releasing != best_releasing {
                releasing
            } else {
                voice.age() < best_age
            };
            if steal {
                best_index = index;
                best_releasing = releasing;
                best_age = voice.age();
            }
        }

        best_index
    }

    pub fn note_off(&mut self, midi: u8) {
        for voice in &mut self.voices {
            if voice.is_active() && voice.midi() == midi {
                voice.note_off();
            }
        }
    }

    /// Release every held voice (pause/stop: tails ring out).
    pub fn release_all(&mut self) {
        for voice in &mut self.voices {
            voice.note_off();
        }
    }

    /// Hard-stop every voice (load teardown: no tail may survive).
    pub fn silence(&mut self) {
        for voice in &mut self.voices {
            voice.silence();
        }
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    pub fn next_sample(&mut self) -> f32 {
        // Mix all voices with a fixed headroom factor
        self.voices.iter_mut().map(|v| v.next_sample()).sum::<f32>() * 0.25
    }
}
