//! Engine facade.
//!
//! One object owning the device stream, the shared render core and the
//! lock-free parameter set. Control calls take the core mutex briefly
//! from the caller's thread; the audio callback skips a buffer (silence)
//! if it loses that race, so no call here can glitch mid-buffer state.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{info, warn};
use ringbuf::traits::Consumer;

use crate::audio::export::encode_wav;
use crate::audio::mixer::ANALYSIS_SIZE;
use crate::audio::{DeviceStream, RenderCore, SharedParams};
use crate::composition::time::loop_seconds;
use crate::composition::validate::{BPM_MAX, BPM_MIN};
use crate::composition::{Composition, TrackRole, validate};
use crate::error::EngineError;
use crate::generator::SketchGenerator;
use crate::sequencer::TransportState;

/// Silence appended after the final loop pass so releases and ambience
/// ring out in the exported file.
const EXPORT_TAIL_SECONDS: f64 = 1.5;

/// Capture drain cadence during export.
const EXPORT_POLL: Duration = Duration::from_millis(25);

/// Export is abandoned if the capture takes longer than this multiple of
/// the expected real-time duration.
const EXPORT_TIMEOUT_FACTOR: f64 = 2.0;

pub const TRANSPOSE_LIMIT: i8 = 12;
pub const GAIN_DB_MIN: f32 = -40.0;
pub const GAIN_DB_MAX: f32 = 0.0;

/// A finished export: suggested file name plus complete WAV contents.
pub struct ExportedAudio {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

pub struct Engine {
    core: Option<Arc<Mutex<RenderCore>>>,
    stream: Option<DeviceStream>,
    params: Arc<SharedParams>,
    transpose: i8,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            core: None,
            stream: None,
            params: Arc::new(SharedParams::new()),
            transpose: 0,
        }
    }

    /// Open the output device and start the callback. Idempotent: a
    /// second call on a live engine does nothing.
    pub fn init(&mut self) -> Result<(), EngineError> {
        if self.stream.is_some() {
            return Ok(());
        }
        // The core's sample rate must match the device's, so it is built
        // here rather than in new()
        let core = Arc::new(Mutex::new(RenderCore::new(44100.0)));
        let stream = DeviceStream::open(Arc::clone(&core), Arc::clone(&self.params))?;
        if stream.sample_rate() != 44100.0 {
            let rebuilt = RenderCore::new(stream.sample_rate());
            *self.lock_of(&core) = rebuilt;
        }
        info!("engine initialized at {} Hz", stream.sample_rate());
        self.core = Some(core);
        self.stream = Some(stream);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.stream.is_some()
    }

    fn lock_of<'a>(&self, core: &'a Arc<Mutex<RenderCore>>) -> std::sync::MutexGuard<'a, RenderCore> {
        // A poisoned mutex means the audio callback panicked; the state
        // itself is still coherent enough to keep driving
        core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ready_core(&self) -> Result<&Arc<Mutex<RenderCore>>, EngineError> {
        self.core
            .as_ref()
            .ok_or(EngineError::State("engine not initialized"))
    }

    /// Install a validated composition, replacing whatever was loaded.
    /// Playback stops, position rewinds, transpose and faders return to
    /// their defaults, and the piece's own tempo becomes the target.
    pub fn load_composition(&mut self, composition: Composition) -> Result<(), EngineError> {
        validate(&composition)?;
        let core = Arc::clone(self.ready_core()?);
        self.params.bpm.store(composition.bpm as f32);
        self.params.reset_gains();
        self.transpose = 0;
        let mut guard = self.lock_of(&core);
        guard.load(composition, 0);
        info!(
            "loaded \"{}\"",
            guard.composition().map(|c| c.title.as_str()).unwrap_or("")
        );
        Ok(())
    }

    /// Parse and install an edited document. On any parse or validation
    /// failure the previously loaded piece keeps playing untouched.
    pub fn load_edited(&mut self, json: &str) -> Result<(), EngineError> {
        let composition = Composition::from_json(json)?;
        self.load_composition(composition)
    }

    /// Run a generator against a prompt and install the result.
    pub fn load_generated(
        &mut self,
        generator: &dyn SketchGenerator,
        prompt: &str,
    ) -> Result<(), EngineError> {
        let composition = generator.generate(prompt)?;
        self.load_composition(composition)
    }

    /// Start or resume looping playback. Opens the device first if the
    /// engine was never initialized. Deliberately stricter than a silent
    /// start: with no composition loaded this returns a state error, so
    /// a caller wiring up a play button hears about the missing document
    /// instead of looping silence.
    pub fn play(&mut self) -> Result<(), EngineError> {
        self.init()?;
        let core = self.ready_core()?;
        let mut guard = self.lock_of(core);
        if guard.composition().is_none() {
            return Err(EngineError::State("no composition loaded"));
        }
        guard.play();
        Ok(())
    }

    /// Freeze the loop in place. Held notes release and ring out. A no-op
    /// before initialization.
    pub fn pause(&mut self) {
        if let Some(core) = &self.core {
            self.lock_of(core).pause();
        }
    }

    /// Halt and rewind to the top of the loop. A no-op before
    /// initialization.
    pub fn stop(&mut self) {
        if let Some(core) = &self.core {
            self.lock_of(core).stop();
        }
    }

    pub fn transport_state(&self) -> TransportState {
        match &self.core {
            Some(core) => self.lock_of(core).transport_state(),
            None => TransportState::Stopped,
        }
    }

    /// Current loop position in sixteenth notes, [0, 64).
    pub fn position_sixteenths(&self) -> f64 {
        match &self.core {
            Some(core) => self.lock_of(core).position_sixteenths(),
            None => 0.0,
        }
    }

    /// Retarget the tempo; playback glides there over ~80ms. Out-of-range
    /// values clamp to the valid tempo range.
    pub fn set_bpm(&self, bpm: f32) {
        self.params.bpm.store(bpm.clamp(BPM_MIN as f32, BPM_MAX as f32));
    }

    pub fn bpm(&self) -> f32 {
        self.params.bpm.load()
    }

    /// Shift every pitched part by whole semitones. Sounding notes keep
    /// their pitch until released; the change applies from the next
    /// trigger on.
    pub fn set_transpose(&mut self, semitones: i8) {
        let clamped = semitones.clamp(-TRANSPOSE_LIMIT, TRANSPOSE_LIMIT);
        if clamped != semitones {
            warn!("transpose {} clamped to {}", semitones, clamped);
        }
        self.transpose = clamped;
        if let Some(core) = &self.core {
            self.lock_of(core).set_transpose(clamped);
        }
    }

    pub fn transpose(&self) -> i8 {
        self.transpose
    }

    /// Set a track fader in dB, clamped to [-40, 0].
    pub fn set_volume(&self, role: TrackRole, db: f32) {
        self.params.set_gain_db(role, db.clamp(GAIN_DB_MIN, GAIN_DB_MAX));
    }

    pub fn volume(&self, role: TrackRole) -> f32 {
        self.params.gain_db(role)
    }

    /// The most recent master output samples, oldest first, for display.
    pub fn waveform(&self) -> [f32; ANALYSIS_SIZE] {
        match &self.core {
            Some(core) => self.lock_of(core).analysis(),
            None => [0.0; ANALYSIS_SIZE],
        }
    }

    /// The loaded document re-serialized as pretty JSON.
    pub fn project_json(&self) -> Result<String, EngineError> {
        let core = self.ready_core()?;
        let guard = self.lock_of(core);
        let composition = guard
            .composition()
            .ok_or(EngineError::State("no composition loaded"))?;
        Ok(composition.to_json_pretty()?)
    }

    /// Record one full pass of the loop plus a release tail and encode it
    /// as a 16-bit mono WAV. The capture rides the live render path, so
    /// the file contains exactly what a listener would have heard,
    /// including the current tempo, transpose and fader settings.
    ///
    /// Blocks the calling thread for roughly the loop duration while the
    /// recording plays through. Call it from a worker thread, not the UI
    /// thread.
    pub fn export_audio(&mut self) -> Result<ExportedAudio, EngineError> {
        let sample_rate = self
            .stream
            .as_ref()
            .ok_or(EngineError::State("engine not initialized"))?
            .sample_rate();
        let core = Arc::clone(self.ready_core()?);

        let bpm = self.params.bpm.load();
        let seconds = loop_seconds(bpm as f64) + EXPORT_TAIL_SECONDS;
        let total_frames = (seconds * sample_rate as f64) as usize;

        let (mut consumer, done, file_name) = {
            let mut guard = self.lock_of(&core);
            let file_name = guard
                .composition()
                .ok_or(EngineError::State("no composition loaded"))?
                .export_file_name();
            // Hard teardown, not a graceful stop: release tails or a
            // charged ambience line would ring into the armed capture.
            guard.halt();
            let (consumer, done) = guard.begin_capture(total_frames);
            guard.play();
            (consumer, done, file_name)
        };

        info!("exporting {:.2}s ({} frames) to {}", seconds, total_frames, file_name);

        let mut samples = Vec::with_capacity(total_frames);
        let deadline = Instant::now() + Duration::from_secs_f64(seconds * EXPORT_TIMEOUT_FACTOR);
        loop {
            while let Some(sample) = consumer.try_pop() {
                samples.push(sample);
            }
            if samples.len() >= total_frames && done.load(std::sync::atomic::Ordering::Acquire) {
                break;
            }
            if Instant::now() > deadline {
                let mut guard = self.lock_of(&core);
                guard.cancel_capture();
                guard.stop();
                return Err(EngineError::Capture(format!(
                    "device delivered {} of {} frames before timeout",
                    samples.len(),
                    total_frames
                )));
            }
            std::thread::sleep(EXPORT_POLL);
        }

        self.lock_of(&core).stop();
        let bytes = encode_wav(&samples, sample_rate as u32)?;
        Ok(ExportedAudio { file_name, bytes })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
