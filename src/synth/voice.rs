// Voice - one sounding note, synthesized per instrument family

use crate::composition::{InstrumentConfig, InstrumentFamily, OscillatorShape};
use crate::composition::pitch::midi_to_freq;

use super::envelope::{Adsr, AdsrParams};
use super::oscillator::Oscillator;

/// Synthesis algorithm selected by the instrument family. `Polyphonic` is a
/// pool-size property, not a sound, so its voices render as simple tones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoiceAlgorithm {
    SimpleTone,
    AmplitudeModulated,
    FrequencyModulated,
    Duo,
    Membrane,
}

impl VoiceAlgorithm {
    fn for_family(family: InstrumentFamily) -> Self {
        match family {
            InstrumentFamily::SimpleTone | InstrumentFamily::Polyphonic => {
                VoiceAlgorithm::SimpleTone
            }
            InstrumentFamily::AmplitudeModulated => VoiceAlgorithm::AmplitudeModulated,
            InstrumentFamily::FrequencyModulated => VoiceAlgorithm::FrequencyModulated,
            InstrumentFamily::Duo => VoiceAlgorithm::Duo,
            InstrumentFamily::MembranePercussion => VoiceAlgorithm::Membrane,
        }
    }

    /// Envelope used when the document supplies none.
    fn default_envelope(self) -> AdsrParams {
        match self {
            VoiceAlgorithm::Membrane => AdsrParams::new(0.001, 0.3, 0.0, 0.1),
            _ => AdsrParams::default(),
        }
    }
}

// Modulator tuning shared by all AM/FM voices
const MOD_HARMONICITY: f32 = 2.0;
const FM_DEPTH: f32 = 0.6;
const DUO_DETUNE: f32 = 1.008;
const MEMBRANE_SWEEP_START: f32 = 2.5;

pub struct Voice {
    algorithm: VoiceAlgorithm,
    carrier: Oscillator,
    modulator: Oscillator,
    envelope: Adsr,
    midi: u8,
    velocity: f32,
    held: bool,
    age: u64,
    base_freq: f32,
    sweep: f32,
    sweep_decay: f32,
}

impl Voice {
    pub fn new(sample_rate: f32) -> Self {
        // Membrane pitch sweep falls toward the base frequency over ~40ms
        let sweep_decay = (-1.0 / (0.04 * sample_rate)).exp();
        Self {
            algorithm: VoiceAlgorithm::SimpleTone,
            carrier: Oscillator::new(OscillatorShape::Sine, sample_rate),
            modulator: Oscillator::new(OscillatorShape::Sine, sample_rate),
            envelope: Adsr::new(AdsrParams::default(), sample_rate),
            midi: 0,
            velocity: 0.0,
            held: false,
            age: 0,
            base_freq: 0.0,
            sweep: 1.0,
            sweep_decay,
        }
    }

    /// Start a note under the given timbre. The voice is fully re-primed
    /// from the config here, which is what makes instrument reconfiguration
    /// idempotent and click-free for ringing voices: they simply keep their
    /// old settings until retriggered.
    pub fn note_on(&mut self, config: &InstrumentConfig, midi: u8, velocity: f32, age: u64) {
        self.algorithm = VoiceAlgorithm::for_family(config.family);
        self.midi = midi;
        self.velocity = velocity.clamp(0.0, 1.0);
        self.held = true;
        self.age = age;
        self.base_freq = midi_to_freq(midi);
        self.sweep = MEMBRANE_SWEEP_START;

        self.carrier.set_shape(config.oscillator_shape);
        self.carrier.set_frequency(self.base_freq);
        self.carrier.reset();

        match self.algorithm {
            VoiceAlgorithm::AmplitudeModulated | VoiceAlgorithm::FrequencyModulated => {
                self.modulator.set_shape(OscillatorShape::Sine);
                self.modulator.set_frequency(self.base_freq * MOD_HARMONICITY);
                self.modulator.reset();
            }
            VoiceAlgorithm::Duo => {
                self.modulator.set_shape(config.oscillator_shape);
                self.modulator.set_frequency(self.base_freq * DUO_DETUNE);
                self.modulator.reset();
            }
            _ => {}
        }

        let params = config
            .envelope
            .as_ref()
            .map(AdsrParams::from)
            .unwrap_or_else(|| self.algorithm.default_envelope());
        self.envelope.set_params(params);
        self.envelope.note_on();
    }

    pub fn note_off(&mut self) {
        self.held = false;
        self.envelope.note_off();
    }

    /// Active while the envelope still sounds, including the release tail.
    pub fn is_active(&self) -> bool {
        self.envelope.is_active()
    }

    /// Note off already received but still ringing out.
    pub fn is_releasing(&self) -> bool {
        !self.held && self.envelope.is_active()
    }

    pub fn midi(&self) -> u8 {
        self.midi
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    /// Hard-stop the voice. Teardown only.
    pub fn silence(&mut self) {
        self.held = false;
        self.envelope.reset();
    }

    pub fn next_sample(&mut self) -> f32 {
        let env = self.envelope.process();
        if env == 0.0 && !self.envelope.is_active() {
            return 0.0;
        }

        let sample = match self.algorithm {
            VoiceAlgorithm::SimpleTone => self.carrier.next_sample(),
            VoiceAlgorithm::AmplitudeModulated => {
                let modulation = 0.5 * (1.0 + self.modulator.next_sample());
                self.carrier.next_sample() * modulation
            }
            VoiceAlgorithm::FrequencyModulated => {
                let modulation = self.modulator.next_sample();
                self.carrier
                    .set_frequency(self.base_freq * (1.0 + FM_DEPTH * modulation));
                self.carrier.next_sample()
            }
            VoiceAlgorithm::Duo => {
                0.5 * (self.carrier.next_sample() + self.modulator.next_sample())
            }
            VoiceAlgorithm::Membrane => {
                self.sweep = 1.0 + (self.sweep - 1.0) * self.sweep_decay;
                self.carrier.set_frequency(self.base_freq * self.sweep);
                self.carrier.next_sample()
            }
        };

        sample * self.velocity * env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    fn config(family: InstrumentFamily) -> InstrumentConfig {
        InstrumentConfig {
            family,
            oscillator_shape: OscillatorShape::Sine,
            envelope: None,
        }
    }

    #[test]
    fn test_silent_until_triggered() {
        let mut voice = Voice::new(SAMPLE_RATE);
        assert!(!voice.is_active());
        for _ in 0..100 {
            assert_eq!(voice.next_sample(), 0.0);
        }
    }

    #[test]
    fn test_every_family_produces_bounded_output() {
        for family in [
            InstrumentFamily::SimpleTone,
            InstrumentFamily::AmplitudeModulated,
            InstrumentFamily::FrequencyModulated,
            InstrumentFamily::Duo,
            InstrumentFamily::MembranePercussion,
            InstrumentFamily::Polyphonic,
        ] {
            let mut voice = Voice::new(SAMPLE_RATE);
            voice.note_on(&config(family), 60, 1.0, 1);
            let mut peak: f32 = 0.0;
            for _ in 0..4410 {
                let sample = voice.next_sample();
                assert!(sample.is_finite(), "{:?} produced non-finite sample", family);
                peak = peak.max(sample.abs());
            }
            assert!(peak > 0.01, "{:?} produced silence", family);
            assert!(peak <= 1.0 + 1e-3, "{:?} exceeded unit range: {}", family, peak);
        }
    }

    #[test]
    fn test_release_rings_then_stops() {
        let mut voice = Voice::new(SAMPLE_RATE);
        voice.note_on(&config(InstrumentFamily::SimpleTone), 69, 0.8, 1);
        for _ in 0..2000 {
            voice.next_sample();
        }
        voice.note_off();
        assert!(voice.is_releasing());
        for _ in 0..(SAMPLE_RATE as usize) {
            voice.next_sample();
        }
        assert!(!voice.is_active());
    }

    #[test]
    fn test_velocity_scales_amplitude() {
        let mut loud = Voice::new(SAMPLE_RATE);
        let mut soft = Voice::new(SAMPLE_RATE);
        loud.note_on(&config(InstrumentFamily::SimpleTone), 60, 1.0, 1);
        soft.note_on(&config(InstrumentFamily::SimpleTone), 60, 0.2, 1);
        let mut loud_peak: f32 = 0.0;
        let mut soft_peak: f32 = 0.0;
        for _ in 0..4410 {
            loud_peak = loud_peak.max(loud.next_sample().abs());
            soft_peak = soft_peak.max(soft.next_sample().abs());
        }
        assert!(loud_peak > soft_peak * 2.0);
    }

    #[test]
    fn test_membrane_decays_without_note_off() {
        let mut voice = Voice::new(SAMPLE_RATE);
        voice.note_on(&config(InstrumentFamily::MembranePercussion), 36, 1.0, 1);
        for _ in 0..(SAMPLE_RATE * 0.6) as usize {
            voice.next_sample();
        }
        assert!(!voice.is_active());
    }
}
