//! Per-part note scheduling.
//!
//! Schedules are rebuilt whenever the document or the transpose changes,
//! so the render path only ever walks flat, pre-resolved event lists. All
//! trigger tests are done on loop-wrapped offsets: an event fires exactly
//! once per pass even when the buffer straddles the loop seam.

use log::warn;

use crate::composition::pitch::{pitch_to_midi, transpose_midi};
use crate::composition::time::{
    LOOP_SIXTEENTHS, duration_sixteenths, position_sixteenths,
};
use crate::composition::{Composition, PitchedTrack, TrackRole};

use super::transport::BufferWindow;

/// Fixed-capacity chord, sized for the widest voicing an instrument pool
/// can sound at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchSet {
    pitches: [u8; 8],
    len: u8,
}

impl PitchSet {
    pub fn from_slice(midi: &[u8]) -> Self {
        let mut pitches = [0u8; 8];
        let len = midi.len().min(8);
        pitches[..len].copy_from_slice(&midi[..len]);
        Self {
            pitches,
            len: len as u8,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.pitches[..self.len as usize]
    }
}

#[derive(Debug, Clone, Copy)]
pub enum TriggerKind {
    NoteOn { pitches: PitchSet, velocity: f32 },
    NoteOff { pitches: PitchSet },
    Kick { velocity: f32 },
    Metal { velocity: f32 },
}

#[derive(Debug, Clone, Copy)]
pub struct TriggerEvent {
    /// Frame offset inside the current buffer.
    pub frame: usize,
    pub role: TrackRole,
    pub kind: TriggerKind,
    /// Collection order, used to keep same-frame events stable under an
    /// unstable sort.
    pub seq: u32,
}

/// A note resolved to loop coordinates: positions in sixteenths, pitches
/// as transposed MIDI numbers.
#[derive(Debug, Clone, Copy)]
struct ScheduledNote {
    start: f64,
    /// Loop-wrapped end position.
    end: f64,
    pitches: PitchSet,
    velocity: f32,
}

#[derive(Debug, Clone, Copy)]
struct ActiveNote {
    end: f64,
    pitches: PitchSet,
}

/// Schedule for one pitched part.
pub struct PartScheduler {
    role: TrackRole,
    notes: Vec<ScheduledNote>,
    active: Vec<ActiveNote>,
}

impl PartScheduler {
    /// Resolve a track's raw note list against a transpose offset. Entries
    /// the parser rejects are skipped with a warning; validation upstream
    /// makes that path unreachable for accepted documents.
    pub fn new(role: TrackRole, track: &PitchedTrack, transpose: i8) -> Self {
        let mut notes = Vec::with_capacity(track.notes.len());
        for event in &track.notes {
            let (Some(start), Some(duration)) = (
                position_sixteenths(&event.time),
                duration_sixteenths(&event.duration),
            ) else {
                warn!("{}: skipping unparseable note at {:?}", role.name(), event.time);
                continue;
            };
            let mut midi = [0u8; 8];
            let mut len = 0usize;
            for pitch in event.note.pitches() {
                let Some(m) = pitch_to_midi(pitch) else {
                    warn!("{}: skipping bad pitch {:?}", role.name(), pitch);
                    len = 0;
                    break;
                };
                if len < 8 {
                    midi[len] = transpose_midi(m, transpose);
                    len += 1;
                }
            }
            if len == 0 {
                continue;
            }
            // Positions past bar 4 are schema-legal but fall outside the
            // loop window, so they never sound.
            if start >= LOOP_SIXTEENTHS {
                continue;
            }
            notes.push(ScheduledNote {
                start,
                end: (start + duration).rem_euclid(LOOP_SIXTEENTHS),
                pitches: PitchSet::from_slice(&midi[..len]),
                velocity: event.velocity,
            });
        }
        // Document order breaks ties at equal positions
        notes.sort_by(|a, b| a.start.total_cmp(&b.start));
        let active = Vec::with_capacity(notes.len().max(4));
        Self { role, notes, active }
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Forget held notes without emitting offs (the caller silences the
    /// instruments directly).
    pub fn reset(&mut self) {
        self.active.clear();
    }

    /// Emit the triggers falling inside `window`. Note-offs come first so
    /// a re-struck pitch releases before it re-attacks.
    pub fn collect(&mut self, window: &BufferWindow, out: &mut Vec<TriggerEvent>) {
        let mut i = 0;
        while i < self.active.len() {
            let offset = (self.active[i].end - window.start).rem_euclid(LOOP_SIXTEENTHS);
            if offset < window.advance {
                let note = self.active.swap_remove(i);
                out.push(TriggerEvent {
                    frame: frame_of(offset, window),
                    role: self.role,
                    kind: TriggerKind::NoteOff { pitches: note.pitches },
                    seq: 0,
                });
            } else {
                i += 1;
            }
        }

        for note in &self.notes {
            let offset = (note.start - window.start).rem_euclid(LOOP_SIXTEENTHS);
            if offset >= window.advance {
                continue;
            }
            out.push(TriggerEvent {
                frame: frame_of(offset, window),
                role: self.role,
                kind: TriggerKind::NoteOn {
                    pitches: note.pitches,
                    velocity: note.velocity,
                },
                seq: 0,
            });
            let end_offset = (note.end - window.start).rem_euclid(LOOP_SIXTEENTHS);
            if end_offset < window.advance && end_offset >= offset {
                // The whole note fits inside this buffer
                out.push(TriggerEvent {
                    frame: frame_of(end_offset, window),
                    role: self.role,
                    kind: TriggerKind::NoteOff { pitches: note.pitches },
                    seq: 0,
                });
            } else {
                self.active.push(ActiveNote {
                    end: note.end,
                    pitches: note.pitches,
                });
            }
        }
    }
}

#[inline]
fn frame_of(offset_sixteenths: f64, window: &BufferWindow) -> usize {
    (offset_sixteenths / window.sixteenths_per_frame) as usize
}

/// Velocities for the built-in percussion lattice.
const KICK_VELOCITY: f32 = 0.9;
const METAL_VELOCITY: f32 = 0.55;

/// Kick lands on every beat, the metallic accent on the off-beat
/// eighths, giving a plain four-on-the-floor scaffold under any piece.
const KICK_STEPS: [f64; 4] = [0.0, 4.0, 8.0, 12.0];
const METAL_STEPS: [f64; 4] = [2.0, 6.0, 10.0, 14.0];

/// Fixed rhythm lattice, engaged by the document's rhythm track flag.
pub struct RhythmScheduler {
    active: bool,
}

impl RhythmScheduler {
    pub fn new(active: bool) -> Self {
        Self { active }
    }

    pub fn collect(&self, window: &BufferWindow, out: &mut Vec<TriggerEvent>) {
        if !self.active {
            return;
        }
        for bar in 0..4 {
            let bar_start = bar as f64 * 16.0;
            for &step in &KICK_STEPS {
                let offset = (bar_start + step - window.start).rem_euclid(LOOP_SIXTEENTHS);
                if offset < window.advance {
                    out.push(TriggerEvent {
                        frame: frame_of(offset, window),
                        role: TrackRole::Rhythm,
                        kind: TriggerKind::Kick { velocity: KICK_VELOCITY },
                        seq: 0,
                    });
                }
            }
            for &step in &METAL_STEPS {
                let offset = (bar_start + step - window.start).rem_euclid(LOOP_SIXTEENTHS);
                if offset < window.advance {
                    out.push(TriggerEvent {
                        frame: frame_of(offset, window),
                        role: TrackRole::Rhythm,
                        kind: TriggerKind::Metal { velocity: METAL_VELOCITY },
                        seq: 0,
                    });
                }
            }
        }
    }
}

/// Build the pitched-part schedules for a document. Parts without notes
/// get no scheduler at all.
pub fn build_part_schedulers(composition: &Composition, transpose: i8) -> Vec<PartScheduler> {
    let mut schedulers = Vec::new();
    for role in [TrackRole::Melody, TrackRole::Harmony, TrackRole::Bass] {
        if let Some(track) = composition.tracks.pitched(role) {
            let scheduler = PartScheduler::new(role, track, transpose);
            if !scheduler.is_empty() {
                schedulers.push(scheduler);
            }
        }
    }
    schedulers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::{NoteEvent, NoteValue};

    fn track(notes: Vec<NoteEvent>) -> PitchedTrack {
        PitchedTrack {
            instrument: crate::composition::InstrumentConfig {
                family: crate::composition::InstrumentFamily::Polyphonic,
                oscillator_shape: crate::composition::OscillatorShape::Sine,
                envelope: None,
            },
            notes,
        }
    }

    fn note(time: &str, pitch: &str, duration: &str) -> NoteEvent {
        NoteEvent {
            time: time.to_string(),
            note: NoteValue::Single(pitch.to_string()),
            duration: duration.to_string(),
            velocity: 0.8,
        }
    }

    fn window(start: f64, advance: f64) -> BufferWindow {
        BufferWindow {
            start,
            advance,
            sixteenths_per_frame: advance / 512.0,
        }
    }

    fn count_ons(events: &[TriggerEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e.kind, TriggerKind::NoteOn { .. }))
            .count()
    }

    #[test]
    fn test_note_fires_once_across_adjacent_windows() {
        let mut scheduler =
            PartScheduler::new(TrackRole::Melody, &track(vec![note("0:1:0", "C4", "8n")]), 0);
        let mut events = Vec::new();
        // Note sits at position 4.0; sweep the loop in 0.5-sixteenth windows
        let mut fired = 0;
        let mut pos = 0.0;
        while pos < LOOP_SIXTEENTHS {
            events.clear();
            scheduler.collect(&window(pos, 0.5), &mut events);
            fired += count_ons(&events);
            pos += 0.5;
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_event_on_loop_seam_fires_once_per_pass() {
        let mut scheduler =
            PartScheduler::new(TrackRole::Melody, &track(vec![note("0:0:0", "C4", "16n")]), 0);
        let mut events = Vec::new();
        // A window straddling the seam covers position 0.0
        scheduler.collect(&window(63.5, 1.0), &mut events);
        assert_eq!(count_ons(&events), 1);
        events.clear();
        // The next window must not re-fire it
        scheduler.collect(&window(0.5, 1.0), &mut events);
        assert_eq!(count_ons(&events), 0);
    }

    #[test]
    fn test_last_slot_note_fires() {
        // 3:3:3 is the final sixteenth of the loop, position 63.0
        let mut scheduler =
            PartScheduler::new(TrackRole::Melody, &track(vec![note("3:3:3", "A4", "16n")]), 0);
        let mut events = Vec::new();
        scheduler.collect(&window(62.8, 0.5), &mut events);
        assert_eq!(count_ons(&events), 1);
    }

    #[test]
    fn test_note_past_bar_four_never_fires() {
        // "4:0:0" is position 64.0, outside the loop window entirely
        let mut scheduler = PartScheduler::new(
            TrackRole::Melody,
            &track(vec![note("4:0:0", "C4", "8n"), note("7:2:1", "E4", "4n")]),
            0,
        );
        assert!(scheduler.is_empty());
        let mut events = Vec::new();
        let mut pos = 0.0;
        while pos < LOOP_SIXTEENTHS {
            scheduler.collect(&window(pos, 1.0), &mut events);
            pos += 1.0;
        }
        assert!(events.is_empty());
    }

    #[test]
    fn test_note_off_emitted_after_duration() {
        let mut scheduler =
            PartScheduler::new(TrackRole::Melody, &track(vec![note("0:0:0", "C4", "4n")]), 0);
        let mut events = Vec::new();
        scheduler.collect(&window(0.0, 1.0), &mut events);
        assert_eq!(count_ons(&events), 1);
        // "4n" = 4 sixteenths, so the off falls in the window covering 4.0
        events.clear();
        scheduler.collect(&window(3.5, 1.0), &mut events);
        assert!(events.iter().any(|e| matches!(e.kind, TriggerKind::NoteOff { .. })));
    }

    #[test]
    fn test_short_note_inside_one_window_gets_both_triggers() {
        let mut scheduler =
            PartScheduler::new(TrackRole::Melody, &track(vec![note("0:0:0", "C4", "32n")]), 0);
        let mut events = Vec::new();
        scheduler.collect(&window(0.0, 2.0), &mut events);
        assert_eq!(count_ons(&events), 1);
        assert!(events.iter().any(|e| matches!(e.kind, TriggerKind::NoteOff { .. })));
    }

    #[test]
    fn test_transpose_shifts_pitches() {
        let mut scheduler =
            PartScheduler::new(TrackRole::Melody, &track(vec![note("0:0:0", "C4", "8n")]), 7);
        let mut events = Vec::new();
        scheduler.collect(&window(0.0, 1.0), &mut events);
        let TriggerKind::NoteOn { pitches, .. } = events[0].kind else {
            panic!("expected a note-on");
        };
        // C4 = 60, up a fifth = 67
        assert_eq!(pitches.as_slice(), &[67]);
    }

    #[test]
    fn test_rhythm_lattice_counts() {
        let scheduler = RhythmScheduler::new(true);
        let mut kicks = 0;
        let mut metals = 0;
        let mut events = Vec::new();
        let mut pos = 0.0;
        while pos < LOOP_SIXTEENTHS {
            events.clear();
            scheduler.collect(&window(pos, 1.0), &mut events);
            for event in &events {
                match event.kind {
                    TriggerKind::Kick { .. } => kicks += 1,
                    TriggerKind::Metal { .. } => metals += 1,
                    _ => {}
                }
            }
            pos += 1.0;
        }
        assert_eq!(kicks, 16);
        assert_eq!(metals, 16);
    }

    #[test]
    fn test_inactive_rhythm_is_silent() {
        let scheduler = RhythmScheduler::new(false);
        let mut events = Vec::new();
        scheduler.collect(&window(0.0, 64.0), &mut events);
        assert!(events.is_empty());
    }
}
