// Linear ADSR amplitude envelope, one instance per voice.
//
// Segments are walked with per-sample slopes rather than elapsed-time
// ratios, so parameter changes between buffers take effect on the very
// next sample.

use crate::composition::EnvelopeConfig;

const MIN_SEGMENT_SECONDS: f32 = 0.001;
const MAX_SEGMENT_SECONDS: f32 = 5.0;

/// ADSR parameters, times in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrParams {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl AdsrParams {
    /// Create ADSR parameters with range clamping
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack: attack.clamp(MIN_SEGMENT_SECONDS, MAX_SEGMENT_SECONDS),
            decay: decay.clamp(MIN_SEGMENT_SECONDS, MAX_SEGMENT_SECONDS),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.clamp(MIN_SEGMENT_SECONDS, MAX_SEGMENT_SECONDS),
        }
    }
}

impl Default for AdsrParams {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.3,
        }
    }
}

impl From<&EnvelopeConfig> for AdsrParams {
    fn from(config: &EnvelopeConfig) -> Self {
        Self::new(config.attack, config.decay, config.sustain, config.release)
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

pub struct Adsr {
    params: AdsrParams,
    stage: Stage,
    level: f32,
    sample_rate: f32,
    // Fixed at note_off so the release always lasts `params.release`
    // seconds no matter what level it started from.
    release_step: f32,
}

impl Adsr {
    pub fn new(params: AdsrParams, sample_rate: f32) -> Self {
        Self {
            params,
            stage: Stage::Idle,
            level: 0.0,
            sample_rate,
            release_step: 0.0,
        }
    }

    pub fn set_params(&mut self, params: AdsrParams) {
        self.params = params;
    }

    /// Start the attack phase, ramping up from the current level
    pub fn note_on(&mut self) {
        self.stage = Stage::Attack;
    }

    /// Start the release phase from the current level
    pub fn note_off(&mut self) {
        if !matches!(self.stage, Stage::Idle) {
            self.release_step = self.level / (self.params.release * self.sample_rate).max(1.0);
            self.stage = Stage::Release;
        }
    }

    /// Process one sample; returns the envelope value in [0, 1]
    pub fn process(&mut self) -> f32 {
        match self.stage {
            Stage::Idle => {
                self.level = 0.0;
            }

            Stage::Attack => {
                self.level += 1.0 / (self.params.attack * self.sample_rate).max(1.0);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                }
            }

            Stage::Decay => {
                let step =
                    (1.0 - self.params.sustain) / (self.params.decay * self.sample_rate).max(1.0);
                self.level -= step;
                if self.level <= self.params.sustain {
                    self.level = self.params.sustain;
                    self.stage = Stage::Sustain;
                }
            }

            Stage::Sustain => {
                self.level = self.params.sustain;
                // A zero-sustain envelope (percussive) goes idle once decay
                // completes so the voice can be reused immediately.
                if self.params.sustain <= 0.0 {
                    self.stage = Stage::Idle;
                }
            }

            Stage::Release => {
                self.level -= self.release_step;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = Stage::Idle;
                }
            }
        }

        self.level
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.stage, Stage::Idle)
    }

    pub fn current_value(&self) -> f32 {
        self.level
    }

    /// Hard reset to idle (teardown only; audible as a cut if ringing)
    pub fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.level = 0.0;
        self.release_step = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SAMPLE_RATE: f32 = 48000.0;

    #[test]
    fn test_params_clamping() {
        let params = AdsrParams::new(-1.0, 10.0, 1.5, 0.0001);
        assert!(params.attack >= MIN_SEGMENT_SECONDS);
        assert!(params.decay <= MAX_SEGMENT_SECONDS);
        assert!(params.sustain <= 1.0);
        assert!(params.release >= MIN_SEGMENT_SECONDS);
    }

    #[test]
    fn test_starts_idle() {
        let envelope = Adsr::new(AdsrParams::default(), TEST_SAMPLE_RATE);
        assert!(!envelope.is_active());
        assert_eq!(envelope.current_value(), 0.0);
    }

    #[test]
    fn test_attack_reaches_peak_then_decays_to_sustain() {
        let params = AdsrParams::new(0.01, 0.02, 0.5, 0.1);
        let mut envelope = Adsr::new(params, TEST_SAMPLE_RATE);
        envelope.note_on();

        let attack_samples = (0.01 * TEST_SAMPLE_RATE) as usize;
        for _ in 0..attack_samples {
            envelope.process();
        }
        assert!((envelope.current_value() - 1.0).abs() < 0.01);

        let decay_samples = (0.02 * TEST_SAMPLE_RATE) as usize;
        for _ in 0..decay_samples + 10 {
            envelope.process();
        }
        assert!((envelope.current_value() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_release_to_idle() {
        let params = AdsrParams::new(0.001, 0.001, 0.5, 0.01);
        let mut envelope = Adsr::new(params, TEST_SAMPLE_RATE);
        envelope.note_on();
        for _ in 0..1000 {
            envelope.process();
        }
        envelope.note_off();
        for _ in 0..(0.01 * TEST_SAMPLE_RATE) as usize + 100 {
            envelope.process();
        }
        assert!(!envelope.is_active());
        assert_eq!(envelope.current_value(), 0.0);
    }

    #[test]
    fn test_release_starts_from_current_level() {
        // Releasing mid-attack must fall from where the attack got to, not
        // from full level, or a short note pops.
        let params = AdsrParams::new(0.1, 0.1, 0.8, 0.05);
        let mut envelope = Adsr::new(params, TEST_SAMPLE_RATE);
        envelope.note_on();
        for _ in 0..200 {
            envelope.process();
        }
        let level_at_release = envelope.current_value();
        assert!(level_at_release < 0.5);
        envelope.note_off();
        let next = envelope.process();
        assert!(next <= level_at_release + 0.01);
    }

    #[test]
    fn test_zero_sustain_goes_idle() {
        let params = AdsrParams::new(0.001, 0.01, 0.0, 0.01);
        let mut envelope = Adsr::new(params, TEST_SAMPLE_RATE);
        envelope.note_on();
        for _ in 0..(0.02 * TEST_SAMPLE_RATE) as usize {
            envelope.process();
        }
        assert!(!envelope.is_active());
    }
}
