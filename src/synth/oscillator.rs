// Oscillator - waveform generator with a normalized phase accumulator

use std::f32::consts::TAU;

use crate::composition::OscillatorShape;

pub struct Oscillator {
    shape: OscillatorShape,
    phase: f32,
    phase_increment: f32,
    sample_rate: f32,
}

impl Oscillator {
    pub fn new(shape: OscillatorShape, sample_rate: f32) -> Self {
        Self {
            shape,
            phase: 0.0,
            phase_increment: 0.0,
            sample_rate,
        }
    }

    pub fn set_shape(&mut self, shape: OscillatorShape) {
        self.shape = shape;
    }

    pub fn set_frequency(&mut self, freq: f32) {
        self.phase_increment = freq / self.sample_rate;
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    pub fn next_sample(&mut self) -> f32 {
        let sample = match self.shape {
            OscillatorShape::Sine => (TAU * self.phase).sin(),
            OscillatorShape::Square => {
                if self.phase < 0.5 { 1.0 } else { -1.0 }
            }
            OscillatorShape::Sawtooth => 2.0 * self.phase - 1.0,
            OscillatorShape::Triangle => 1.0 - 4.0 * (self.phase - 0.5).abs(),
        };

        self.phase = (self.phase + self.phase_increment).fract();

        sample
    }
}
