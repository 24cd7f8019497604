//! Master mix bus.
//!
//! Routing: melody, harmony and the metallic accent pass through their
//! faders into a shared ambience (reverb); bass and the kick stay dry so
//! the low end keeps its definition. The dry low branch is summed with the
//! ambience output, soft-clipped, then tapped for the analysis ring and an
//! optional capture sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ringbuf::{
    HeapCons, HeapProd, HeapRb,
    traits::{Producer, Split},
};

use crate::composition::TrackRole;
use crate::synth::{Reverb, ReverbParams, RoleSamples};

use super::dsp_utils::{OnePoleSmoother, soft_clip};
use super::parameters::{DEFAULT_GAIN_DB, SharedParams};

/// Length of the analysis snapshot handed to visualisers.
pub const ANALYSIS_SIZE: usize = 256;

/// Fader smoothing time. Long enough to de-zipper, short enough to feel
/// immediate under a dragged slider.
const GAIN_SMOOTHING_MS: f32 = 15.0;

#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

struct CaptureTap {
    producer: HeapProd<f32>,
    remaining: usize,
    done: Arc<AtomicBool>,
}

pub struct MixMaster {
    gain_smoothers: [OnePoleSmoother; 4],
    reverb: Reverb,
    analysis: [f32; ANALYSIS_SIZE],
    analysis_pos: usize,
    capture: Option<CaptureTap>,
}

impl MixMaster {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            gain_smoothers: DEFAULT_GAIN_DB
                .map(|db| OnePoleSmoother::new(db_to_linear(db), GAIN_SMOOTHING_MS, sample_rate)),
            reverb: Reverb::new(ReverbParams::default(), sample_rate),
            analysis: [0.0; ANALYSIS_SIZE],
            analysis_pos: 0,
            capture: None,
        }
    }

    /// Mix one frame of per-role samples down to the mono master output.
    #[inline]
    pub fn process(&mut self, roles: RoleSamples, params: &SharedParams) -> f32 {
        let melody_gain =
            self.gain_smoothers[TrackRole::Melody.index()].next(db_to_linear(params.gain_db(TrackRole::Melody)));
        let harmony_gain =
            self.gain_smoothers[TrackRole::Harmony.index()].next(db_to_linear(params.gain_db(TrackRole::Harmony)));
        let bass_gain =
            self.gain_smoothers[TrackRole::Bass.index()].next(db_to_linear(params.gain_db(TrackRole::Bass)));
        let rhythm_gain =
            self.gain_smoothers[TrackRole::Rhythm.index()].next(db_to_linear(params.gain_db(TrackRole::Rhythm)));

        let ambience_in =
            roles.melody * melody_gain + roles.harmony * harmony_gain + roles.metal * rhythm_gain;
        let dry_low = roles.bass * bass_gain + roles.kick * rhythm_gain;

        let out = soft_clip(self.reverb.process(ambience_in) + dry_low);

        self.analysis[self.analysis_pos] = out;
        self.analysis_pos = (self.analysis_pos + 1) % ANALYSIS_SIZE;

        if let Some(tap) = &mut self.capture {
            if tap.remaining > 0 {
                // Capacity covers the whole capture, push cannot fail
                let _ = tap.producer.try_push(out);
                tap.remaining -= 1;
                if tap.remaining == 0 {
                    tap.done.store(true, Ordering::Release);
                }
            }
        }

        out
    }

    /// Most recent master samples, oldest first.
    pub fn analysis_snapshot(&self) -> [f32; ANALYSIS_SIZE] {
        let mut snapshot = [0.0; ANALYSIS_SIZE];
        for (i, slot) in snapshot.iter_mut().enumerate() {
            *slot = self.analysis[(self.analysis_pos + i) % ANALYSIS_SIZE];
        }
        snapshot
    }

    /// Arm a capture of exactly `total_frames` master samples. The ring is
    /// sized for the full capture up front so the mix path never blocks or
    /// drops. Returns the consumer end and a flag raised once the last
    /// frame is in.
    pub fn begin_capture(&mut self, total_frames: usize) -> (HeapCons<f32>, Arc<AtomicBool>) {
        let (producer, consumer) = HeapRb::<f32>::new(total_frames.max(1)).split();
        let done = Arc::new(AtomicBool::new(false));
        self.capture = Some(CaptureTap {
            producer,
            remaining: total_frames,
            done: Arc::clone(&done),
        });
        (consumer, done)
    }

    pub fn cancel_capture(&mut self) {
        self.capture = None;
    }

    pub fn capture_active(&self) -> bool {
        self.capture.as_ref().is_some_and(|tap| tap.remaining > 0)
    }

    /// Teardown between documents: clears the ambience tail and the
    /// analysis ring so nothing from the previous piece leaks through.
    pub fn reset(&mut self) {
        self.reverb.reset();
        self.analysis = [0.0; ANALYSIS_SIZE];
        self.analysis_pos = 0;
        for (smoother, &db) in self.gain_smoothers.iter_mut().zip(DEFAULT_GAIN_DB.iter()) {
            smoother.snap_to(db_to_linear(db));
        }
    }
}
