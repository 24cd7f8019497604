// Instrument bank - one configurable sound generator per track role
//
// Melody, harmony and bass are reconfigured from the composition document.
// The rhythm role is not configurable: it always uses a fixed low membrane
// kick plus a fixed metallic accent voice, both pre-rendered as short decay
// tables (no per-document timbre data exists for rhythm).

use log::debug;

use crate::composition::{
    InstrumentConfig, InstrumentFamily, OscillatorShape, TrackRole,
};

use super::instrument::Instrument;

/// One mono sample per signal source, before any gain or ambience. The
/// mixer routes kick and metal differently, so rhythm contributes two
/// fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleSamples {
    pub melody: f32,
    pub harmony: f32,
    pub bass: f32,
    pub kick: f32,
    pub metal: f32,
}

/// A one-shot percussive voice playing a pre-rendered decay table.
/// Triggering rewinds the table; there is no note-off.
struct PercussionVoice {
    samples: Vec<f32>,
    position: usize,
    velocity: f32,
}

impl PercussionVoice {
    /// Low membrane kick: a sine that sweeps down onto its fundamental with
    /// an exponential decay.
    fn kick(sample_rate: f32) -> Self {
        let length = (0.18 * sample_rate) as usize;
        let mut samples = Vec::with_capacity(length);
        let mut phase = 0.0f32;
        for i in 0..length {
            let t = i as f32 / length as f32;
            let envelope = (-t * 7.0).exp();
            // Pitch falls from ~150Hz to ~52Hz over the first quarter
            let freq = 52.0 + 98.0 * (-t * 18.0).exp();
            phase += freq / sample_rate;
            samples.push((phase * std::f32::consts::TAU).sin() * envelope);
        }
        Self {
            samples,
            position: usize::MAX,
            velocity: 0.0,
        }
    }

    /// Metallic accent: inharmonic square partials with a very fast decay,
    /// hi-hat-like.
    fn metallic(sample_rate: f32) -> Self {
        let length = (0.06 * sample_rate) as usize;
        let partials = [3371.0f32, 4473.0, 5891.0, 7529.0];
        let mut samples = Vec::with_capacity(length);
        for i in 0..length {
            let t = i as f32 / length as f32;
            let envelope = (-t * 9.0).exp();
            let mut sum = 0.0;
            for &freq in &partials {
                let phase = (i as f32 * freq / sample_rate).fract();
                sum += if phase < 0.5 { 1.0 } else { -1.0 };
            }
            samples.push(sum / partials.len() as f32 * envelope * 0.5);
        }
        Self {
            samples,
            position: usize::MAX,
            velocity: 0.0,
        }
    }

    fn trigger(&mut self, velocity: f32) {
        self.position = 0;
        self.velocity = velocity.clamp(0.0, 1.0);
    }

    fn silence(&mut self) {
        self.position = usize::MAX;
    }

    #[inline]
    fn next_sample(&mut self) -> f32 {
        if self.position < self.samples.len() {
            let sample = self.samples[self.position] * self.velocity;
            self.position += 1;
            sample
        } else {
            0.0
        }
    }
}

pub struct InstrumentBank {
    melody: Instrument,
    harmony: Instrument,
    bass: Instrument,
    kick: PercussionVoice,
    metal: PercussionVoice,
}

impl InstrumentBank {
    pub fn new(sample_rate: f32) -> Self {
        let poly = |shape| InstrumentConfig {
            family: InstrumentFamily::Polyphonic,
            oscillator_shape: shape,
            envelope: None,
        };
        Self {
            melody: Instrument::new(TrackRole::Melody, poly(OscillatorShape::Triangle), sample_rate),
            harmony: Instrument::new(TrackRole::Harmony, poly(OscillatorShape::Sine), sample_rate),
            bass: Instrument::new(
                TrackRole::Bass,
                InstrumentConfig {
                    family: InstrumentFamily::SimpleTone,
                    oscillator_shape: OscillatorShape::Square,
                    envelope: None,
                },
                sample_rate,
            ),
            kick: PercussionVoice::kick(sample_rate),
            metal: PercussionVoice::metallic(sample_rate),
        }
    }

    fn instrument_mut(&mut self, role: TrackRole) -> Option<&mut Instrument> {
        match role {
            TrackRole::Melody => Some(&mut self.melody),
            TrackRole::Harmony => Some(&mut self.harmony),
            TrackRole::Bass => Some(&mut self.bass),
            TrackRole::Rhythm => None,
        }
    }

    /// Apply a timbre to a melodic role. Rhythm is fixed and silently keeps
    /// its built-in voices.
    pub fn configure(&mut self, role: TrackRole, config: &InstrumentConfig) {
        if let Some(instrument) = self.instrument_mut(role) {
            instrument.configure(config);
            debug!("configured {} as {:?}", role.name(), config.family);
        }
    }

    /// Trigger a note onset. A chord sent to bass is reduced to its first
    /// listed pitch: the bass instrument is single-voice and this is a
    /// graceful-degradation policy rather than an error.
    pub fn note_on(&mut self, role: TrackRole, pitches: &[u8], velocity: f32) {
        let chord = match role {
            TrackRole::Bass => &pitches[..pitches.len().min(1)],
            _ => pitches,
        };
        if let Some(instrument) = self.instrument_mut(role) {
            for &midi in chord {
                instrument.note_on(midi, velocity);
            }
        }
    }

    pub fn note_off(&mut self, role: TrackRole, pitches: &[u8]) {
        let chord = match role {
            TrackRole::Bass => &pitches[..pitches.len().min(1)],
            _ => pitches,
        };
        if let Some(instrument) = self.instrument_mut(role) {
            for &midi in chord {
                instrument.note_off(midi);
            }
        }
    }

    pub fn trigger_kick(&mut self, velocity: f32) {
        self.kick.trigger(velocity);
    }

    pub fn trigger_metal(&mut self, velocity: f32) {
        self.metal.trigger(velocity);
    }

    /// Release every held note; tails ring out (pause/stop).
    pub fn release_all(&mut self) {
        self.melody.release_all();
        self.harmony.release_all();
        self.bass.release_all();
    }

    /// Hard-stop everything (load teardown).
    pub fn silence(&mut self) {
        self.melody.silence();
        self.harmony.silence();
        self.bass.silence();
        self.kick.silence();
        self.metal.silence();
    }

    pub fn active_voice_count(&self) -> usize {
        self.melody.active_voice_count()
            + self.harmony.active_voice_count()
            + self.bass.active_voice_count()
    }

    pub fn next_sample(&mut self) -> RoleSamples {
        RoleSamples {
            melody: self.melody.next_sample(),
            harmony: self.harmony.next_sample(),
            bass: self.bass.next_sample(),
            kick: self.kick.next_sample(),
            metal: self.metal.next_sample(),
        }
    }
}
