//! Loop transport.
//!
//! Position is a running count of sixteenth notes as f64, wrapped into the
//! four-bar loop by the consumers. Tempo changes glide toward the target
//! over ~80ms so a dragged slider bends the groove instead of snapping it.

use crate::audio::parameters::AtomicF32;
use crate::composition::time::LOOP_SIXTEENTHS;

/// Seconds a tempo move takes to settle (one time constant).
const BPM_RAMP_SECONDS: f32 = 0.08;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Running,
    Paused,
}

/// The scheduling window covered by one buffer, in sixteenths.
#[derive(Debug, Clone, Copy)]
pub struct BufferWindow {
    /// Loop position at the first frame of the buffer, in [0, 64).
    pub start: f64,
    /// Sixteenths spanned by the buffer.
    pub advance: f64,
    /// Per-frame step, for converting event offsets to frame offsets.
    pub sixteenths_per_frame: f64,
}

pub struct Transport {
    state: TransportState,
    /// Loop position in sixteenths, kept in [0, 64).
    position: f64,
    /// Tempo actually driving the clock, chasing `bpm_target`.
    bpm_current: f32,
    sample_rate: f64,
}

impl Transport {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            state: TransportState::Stopped,
            position: 0.0,
            bpm_current: 120.0,
            sample_rate: sample_rate as f64,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn position_sixteenths(&self) -> f64 {
        self.position
    }

    pub fn bpm_current(&self) -> f32 {
        self.bpm_current
    }

    pub fn play(&mut self) {
        if self.state == TransportState::Stopped {
            self.position = 0.0;
        }
        self.state = TransportState::Running;
    }

    pub fn pause(&mut self) {
        if self.state == TransportState::Running {
            self.state = TransportState::Paused;
        }
    }

    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.position = 0.0;
    }

    /// Snap the clock onto a tempo without ramping (used at load).
    pub fn snap_bpm(&mut self, bpm: f32) {
        self.bpm_current = bpm;
    }

    /// Advance the clock by one buffer of `frames`, chasing the shared
    /// tempo target. Returns the window to schedule, or None while not
    /// running.
    pub fn advance(&mut self, frames: usize, bpm_target: &AtomicF32) -> Option<BufferWindow> {
        // One first-order step per buffer approximates the per-sample ramp
        // closely enough at callback block sizes.
        let alpha = (frames as f32 / (BPM_RAMP_SECONDS * self.sample_rate as f32)).min(1.0);
        self.bpm_current += (bpm_target.load() - self.bpm_current) * alpha;

        if self.state != TransportState::Running {
            return None;
        }

        // sixteenths per second = bpm / 60 * 4
        let sixteenths_per_frame = self.bpm_current as f64 / 60.0 * 4.0 / self.sample_rate;
        let advance = sixteenths_per_frame * frames as f64;
        let start = self.position;
        self.position = (self.position + advance).rem_euclid(LOOP_SIXTEENTHS);

        Some(BufferWindow {
            start,
            advance,
            sixteenths_per_frame,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    #[test]
    fn test_stopped_transport_yields_no_window() {
        let mut transport = Transport::new(SAMPLE_RATE);
        let bpm = AtomicF32::new(120.0);
        assert!(transport.advance(512, &bpm).is_none());
        assert_eq!(transport.position_sixteenths(), 0.0);
    }

    #[test]
    fn test_pause_holds_position_stop_rewinds() {
        let mut transport = Transport::new(SAMPLE_RATE);
        let bpm = AtomicF32::new(120.0);
        transport.play();
        for _ in 0..20 {
            transport.advance(512, &bpm);
        }
        let held = transport.position_sixteenths();
        assert!(held > 0.0);

        transport.pause();
        assert!(transport.advance(512, &bpm).is_none());
        assert_eq!(transport.position_sixteenths(), held);

        transport.play();
        assert_eq!(transport.position_sixteenths(), held);

        transport.stop();
        assert_eq!(transport.position_sixteenths(), 0.0);
    }

    #[test]
    fn test_position_wraps_at_loop_end() {
        let mut transport = Transport::new(SAMPLE_RATE);
        let bpm = AtomicF32::new(120.0);
        transport.snap_bpm(120.0);
        transport.play();
        // 64 sixteenths at 120bpm = 8 seconds
        let total_frames = (8.0 * SAMPLE_RATE as f64) as usize + 4096;
        let mut frames = 0;
        while frames < total_frames {
            transport.advance(512, &bpm);
            frames += 512;
        }
        let pos = transport.position_sixteenths();
        assert!((0.0..LOOP_SIXTEENTHS).contains(&pos));
    }

    #[test]
    fn test_tempo_ramps_toward_target() {
        let mut transport = Transport::new(SAMPLE_RATE);
        let bpm = AtomicF32::new(120.0);
        transport.snap_bpm(120.0);
        transport.play();
        bpm.store(180.0);
        transport.advance(512, &bpm);
        let after_one = transport.bpm_current();
        assert!(after_one > 120.0 && after_one < 180.0);
        // Well past the ramp time constant it should have settled
        for _ in 0..100 {
            transport.advance(512, &bpm);
        }
        assert!((transport.bpm_current() - 180.0).abs() < 0.5);
    }

    #[test]
    fn test_window_advance_matches_tempo() {
        let mut transport = Transport::new(SAMPLE_RATE);
        let bpm = AtomicF32::new(120.0);
        transport.snap_bpm(120.0);
        transport.play();
        let window = transport.advance(44100, &bpm).unwrap();
        // One second at 120bpm covers 8 sixteenths
        assert!((window.advance - 8.0).abs() < 1.0e-6);
    }
}
