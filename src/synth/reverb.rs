// Ambience - Freeverb-style reverb shared by the melodic and metallic paths
//
// Mono simplification of the Freeverb algorithm by Jezar at Dreampoint
// (public domain): parallel comb filters with damped feedback into series
// allpass filters, with a dry/wet mix. Delay lines are allocated once at
// creation; processing never allocates.

// Freeverb delay lengths at 44.1kHz, chosen to avoid resonances and give
// a smooth decay. Scaled for other sample rates.
const COMB_TUNINGS: [usize; 4] = [1116, 1188, 1277, 1356];
const ALLPASS_TUNINGS: [usize; 2] = [556, 441];

const SCALE_WET: f32 = 3.0;
const SCALE_DAMPING: f32 = 0.4;
const SCALE_ROOM: f32 = 0.28;
const OFFSET_ROOM: f32 = 0.7;
const ALLPASS_FEEDBACK: f32 = 0.5;

/// Ambience parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbParams {
    /// Room size (0.0 - 1.0)
    pub room_size: f32,
    /// High-frequency damping in the feedback loop (0.0 - 1.0)
    pub damping: f32,
    /// Dry/wet mix (0.0 = fully dry, 1.0 = fully wet)
    pub mix: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            room_size: 0.5,
            damping: 0.5,
            mix: 0.25,
        }
    }
}

struct Comb {
    line: Vec<f32>,
    head: usize,
    feedback: f32,
    damping: f32,
    lowpass: f32,
}

impl Comb {
    fn new(length: usize) -> Self {
        Self {
            line: vec![0.0; length.max(1)],
            head: 0,
            feedback: 0.0,
            damping: 0.0,
            lowpass: 0.0,
        }
    }

    #[inline]
    fn tick(&mut self, input: f32) -> f32 {
        let out = self.line[self.head];
        // One-pole low-pass in the feedback path (damping)
        self.lowpass = out + (self.lowpass - out) * self.damping;
        self.line[self.head] = input + self.lowpass * self.feedback;
        self.head += 1;
        if self.head == self.line.len() {
            self.head = 0;
        }
        out
    }

    fn clear(&mut self) {
        self.line.fill(0.0);
        self.head = 0;
        self.lowpass = 0.0;
    }
}

struct Allpass {
    line: Vec<f32>,
    head: usize,
}

impl Allpass {
    fn new(length: usize) -> Self {
        Self {
            line: vec![0.0; length.max(1)],
            head: 0,
        }
    }

    #[inline]
    fn tick(&mut self, input: f32) -> f32 {
        let delayed = self.line[self.head];
        self.line[self.head] = input + delayed * ALLPASS_FEEDBACK;
        self.head += 1;
        if self.head == self.line.len() {
            self.head = 0;
        }
        delayed - input
    }

    fn clear(&mut self) {
        self.line.fill(0.0);
        self.head = 0;
    }
}

pub struct Reverb {
    params: ReverbParams,
    combs: [Comb; 4],
    allpasses: [Allpass; 2],
    wet_gain: f32,
}

impl Reverb {
    pub fn new(params: ReverbParams, sample_rate: f32) -> Self {
        let scale = sample_rate / 44100.0;
        let scaled = |length: usize| (length as f32 * scale) as usize;

        let mut reverb = Self {
            params,
            combs: COMB_TUNINGS.map(|length| Comb::new(scaled(length))),
            allpasses: ALLPASS_TUNINGS.map(|length| Allpass::new(scaled(length))),
            wet_gain: 0.0,
        };
        reverb.retune();
        reverb
    }

    fn retune(&mut self) {
        let feedback = self.params.room_size * SCALE_ROOM + OFFSET_ROOM;
        let damping = self.params.damping * SCALE_DAMPING;
        for comb in &mut self.combs {
            comb.feedback = feedback;
            comb.damping = damping;
        }
        self.wet_gain = SCALE_WET / self.combs.len() as f32;
    }

    /// Clear all delayed samples. Used when a new composition loads so no
    /// tail from the superseded one survives.
    pub fn reset(&mut self) {
        for comb in &mut self.combs {
            comb.clear();
        }
        for allpass in &mut self.allpasses {
            allpass.clear();
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let mut wet: f32 = self.combs.iter_mut().map(|comb| comb.tick(input)).sum();
        wet *= self.wet_gain;
        for allpass in &mut self.allpasses {
            wet = allpass.tick(wet);
        }
        input + (wet - input) * self.params.mix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_in_silence_out() {
        let mut reverb = Reverb::new(ReverbParams::default(), 44100.0);
        for _ in 0..10000 {
            assert_eq!(reverb.process(0.0), 0.0);
        }
    }

    #[test]
    fn test_impulse_produces_tail() {
        let mut reverb = Reverb::new(ReverbParams::default(), 44100.0);
        reverb.process(1.0);
        let mut tail_energy = 0.0;
        for _ in 0..44100 {
            tail_energy += reverb.process(0.0).abs();
        }
        assert!(tail_energy > 0.1, "expected an audible tail, got {}", tail_energy);
    }

    #[test]
    fn test_tail_decays() {
        let mut reverb = Reverb::new(ReverbParams::default(), 44100.0);
        reverb.process(1.0);
        // Two seconds in, the tail should be essentially gone
        for _ in 0..88200 {
            reverb.process(0.0);
        }
        let mut late = 0.0f32;
        for _ in 0..4410 {
            late = late.max(reverb.process(0.0).abs());
        }
        assert!(late < 0.01, "tail did not decay: {}", late);
    }

    #[test]
    fn test_reset_clears_tail() {
        let mut reverb = Reverb::new(ReverbParams::default(), 44100.0);
        for _ in 0..1000 {
            reverb.process(0.8);
        }
        reverb.reset();
        assert_eq!(reverb.process(0.0), 0.0);
    }
}
