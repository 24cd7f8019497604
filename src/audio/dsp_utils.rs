//! Small DSP helpers shared by the render path.

/// Threshold below which a sample is treated as silence. Denormal floats
/// cost dearly on some CPUs inside feedback loops.
const DENORMAL_THRESHOLD: f32 = 1.0e-15;

#[inline]
pub fn flush_denormals_to_zero(x: f32) -> f32 {
    if x.abs() < DENORMAL_THRESHOLD { 0.0 } else { x }
}

/// Soft limiter on the master sum. tanh stays transparent below ~-6dBFS
/// and rounds off anything hotter instead of hard-clipping.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    x.tanh()
}

/// One-pole lowpass over a control value, used to de-zipper gain moves.
#[derive(Debug, Clone, Copy)]
pub struct OnePoleSmoother {
    current: f32,
    coeff: f32,
}

impl OnePoleSmoother {
    /// `time_constant_ms` is the time to cover ~63% of a step.
    pub fn new(initial: f32, time_constant_ms: f32, sample_rate: f32) -> Self {
        let samples = (time_constant_ms * 0.001 * sample_rate).max(1.0);
        Self {
            current: initial,
            coeff: (-1.0 / samples).exp(),
        }
    }

    #[inline]
    pub fn next(&mut self, target: f32) -> f32 {
        self.current = target + (self.current - target) * self.coeff;
        self.current = flush_denormals_to_zero(self.current);
        self.current
    }

    pub fn snap_to(&mut self, value: f32) {
        self.current = value;
    }

    pub fn current(&self) -> f32 {
        self.current
    }
}
