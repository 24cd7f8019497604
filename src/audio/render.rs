//! Offline-drivable render core.
//!
//! Everything that produces sound lives here, behind a single `process`
//! call that fills a mono buffer. The device stream drives it in real
//! time; the exporter and the tests drive the same code without a device,
//! so rendered output is bit-identical either way.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use ringbuf::HeapCons;

use crate::composition::{Composition, TrackRole};
use crate::sequencer::{
    PartScheduler, RhythmScheduler, Transport, TransportState, TriggerEvent,
    TriggerKind, build_part_schedulers,
};
use crate::synth::InstrumentBank;

use super::mixer::{ANALYSIS_SIZE, MixMaster};
use super::parameters::SharedParams;

/// Scratch capacity for one buffer's triggers. Generous: a dense document
/// stays well under this even at extreme tempos.
const EVENT_SCRATCH: usize = 256;

pub struct RenderCore {
    transport: Transport,
    bank: InstrumentBank,
    mixer: MixMaster,
    part_schedulers: Vec<PartScheduler>,
    rhythm: RhythmScheduler,
    composition: Option<Composition>,
    transpose: i8,
    events: Vec<TriggerEvent>,
}

impl RenderCore {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            transport: Transport::new(sample_rate),
            bank: InstrumentBank::new(sample_rate),
            mixer: MixMaster::new(sample_rate),
            part_schedulers: Vec::new(),
            rhythm: RhythmScheduler::new(false),
            composition: None,
            transpose: 0,
            events: Vec::with_capacity(EVENT_SCRATCH),
        }
    }

    /// Fill `output` with mono master samples. Runs with no allocation on
    /// the hot path; the stream callback calls this under try_lock.
    pub fn process(&mut self, output: &mut [f32], params: &SharedParams) {
        if output.is_empty() {
            return;
        }
        self.events.clear();

        if let Some(window) = self.transport.advance(output.len(), &params.bpm) {
            for scheduler in &mut self.part_schedulers {
                scheduler.collect(&window, &mut self.events);
            }
            self.rhythm.collect(&window, &mut self.events);

            // Stamp collection order so the unstable sort keeps same-frame
            // events stable (offs before re-attacks, document order).
            let last = output.len() - 1;
            for (i, event) in self.events.iter_mut().enumerate() {
                event.seq = i as u32;
                event.frame = event.frame.min(last);
            }
            self.events.sort_unstable_by_key(|e| (e.frame, e.seq));
        }

        let mut next = 0;
        for (i, out) in output.iter_mut().enumerate() {
            while next < self.events.len() && self.events[next].frame <= i {
                let event = self.events[next];
                next += 1;
                self.dispatch(event);
            }
            *out = self.mixer.process(self.bank.next_sample(), params);
        }
    }

    fn dispatch(&mut self, event: TriggerEvent) {
        match event.kind {
            TriggerKind::NoteOn { pitches, velocity } => {
                self.bank.note_on(event.role, pitches.as_slice(), velocity);
            }
            TriggerKind::NoteOff { pitches } => {
                self.bank.note_off(event.role, pitches.as_slice());
            }
            TriggerKind::Kick { velocity } => self.bank.trigger_kick(velocity),
            TriggerKind::Metal { velocity } => self.bank.trigger_metal(velocity),
        }
    }

    /// Swap in a new document. Tears the old piece down completely before
    /// anything from the new one can sound: the very next buffer is built
    /// solely from the new schedules, with no stale voices, held notes or
    /// ambience tail.
    pub fn load(&mut self, composition: Composition, transpose: i8) {
        self.transport.stop();
        self.transport.snap_bpm(composition.bpm as f32);
        self.bank.silence();
        self.mixer.cancel_capture();
        self.mixer.reset();
        self.transpose = transpose;

        for role in [TrackRole::Melody, TrackRole::Harmony, TrackRole::Bass] {
            if let Some(track) = composition.tracks.pitched(role) {
                self.bank.configure(role, &track.instrument);
            }
        }
        self.part_schedulers = build_part_schedulers(&composition, transpose);
        self.rhythm = RhythmScheduler::new(composition.tracks.rhythm.active);
        self.composition = Some(composition);
    }

    /// Re-resolve schedules after a transpose change. Playing notes keep
    /// their old pitch until released; the collected active-note state is
    /// carried by the instruments, so only future triggers shift.
    pub fn set_transpose(&mut self, transpose: i8) {
        if transpose == self.transpose {
            return;
        }
        self.transpose = transpose;
        if let Some(composition) = &self.composition {
            self.bank.release_all();
            self.part_schedulers = build_part_schedulers(composition, transpose);
        }
    }

    pub fn transpose(&self) -> i8 {
        self.transpose
    }

    pub fn composition(&self) -> Option<&Composition> {
        self.composition.as_ref()
    }

    pub fn play(&mut self) {
        self.transport.play();
    }

    pub fn pause(&mut self) {
        self.transport.pause();
        self.bank.release_all();
        for scheduler in &mut self.part_schedulers {
            scheduler.reset();
        }
    }

    pub fn stop(&mut self) {
        self.transport.stop();
        self.bank.release_all();
        for scheduler in &mut self.part_schedulers {
            scheduler.reset();
        }
    }

    /// Stop and flatten everything at once: no release tails, no ambience
    /// ring. The exporter runs this before arming its capture so nothing
    /// from prior playback leaks into the recording.
    pub fn halt(&mut self) {
        self.stop();
        self.bank.silence();
        self.mixer.reset();
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn position_sixteenths(&self) -> f64 {
        self.transport.position_sixteenths()
    }

    pub fn bpm_current(&self) -> f32 {
        self.transport.bpm_current()
    }

    pub fn analysis(&self) -> [f32; ANALYSIS_SIZE] {
        self.mixer.analysis_snapshot()
    }

    pub fn begin_capture(&mut self, total_frames: usize) -> (HeapCons<f32>, Arc<AtomicBool>) {
        self.mixer.begin_capture(total_frames)
    }

    pub fn cancel_capture(&mut self) {
        self.mixer.cancel_capture();
    }
}
