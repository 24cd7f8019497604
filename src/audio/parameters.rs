//! Lock-free parameters shared between the control surface and the render
//! path. Everything here is a plain f32 stored as bits in an AtomicU32 so
//! the audio callback never takes a lock to read a knob.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::composition::TrackRole;

/// An f32 readable and writable from any thread without locking.
/// Relaxed ordering is enough: each parameter is independent and a reader
/// only ever needs *some* recent value.
#[derive(Debug)]
pub struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

pub const DEFAULT_BPM: f32 = 120.0;

/// Per-role default fader positions in dB. Melody forward, rhythm tucked
/// back, nothing at unity so the tanh stage stays mostly transparent.
pub const DEFAULT_GAIN_DB: [f32; 4] = [-8.0, -12.0, -10.0, -14.0];

/// The live control set: tempo target plus one fader per track role.
/// Transpose is intentionally absent - it rebuilds schedules under the
/// core lock instead of being read per-sample.
#[derive(Debug)]
pub struct SharedParams {
    pub bpm: AtomicF32,
    gains_db: [AtomicF32; 4],
}

impl SharedParams {
    pub fn new() -> Self {
        Self {
            bpm: AtomicF32::new(DEFAULT_BPM),
            gains_db: DEFAULT_GAIN_DB.map(AtomicF32::new),
        }
    }

    pub fn gain_db(&self, role: TrackRole) -> f32 {
        self.gains_db[role.index()].load()
    }

    pub fn set_gain_db(&self, role: TrackRole, db: f32) {
        self.gains_db[role.index()].store(db);
    }

    pub fn reset_gains(&self) {
        for (atomic, &db) in self.gains_db.iter().zip(DEFAULT_GAIN_DB.iter()) {
            atomic.store(db);
        }
    }
}

impl Default for SharedParams {
    fn default() -> Self {
        Self::new()
    }
}
