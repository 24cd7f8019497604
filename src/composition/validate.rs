// Structural validation for composition documents
//
// Pure checks, no side effects: every failure names the offending field so
// the UI can point at the exact edit that broke the document.

use thiserror::Error;

use super::pitch::pitch_to_midi;
use super::time::{duration_sixteenths, position_sixteenths};
use super::types::{Composition, InstrumentFamily, PitchedTrack, TrackRole};

/// BPM bounds accepted by the engine.
pub const BPM_MIN: u16 = 20;
pub const BPM_MAX: u16 = 300;

/// A document failed schema or range checks. Never reaches the engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StructuralError {
    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("title must not be empty")]
    EmptyTitle,

    #[error("bpm: {0} outside {BPM_MIN}..={BPM_MAX}")]
    BpmOutOfRange(u16),

    #[error("{field}: velocity {value} outside 0.0..=1.0")]
    VelocityOutOfRange { field: String, value: f32 },

    #[error("{field}: {value:?} is not a valid bar:beat:sixteenth position")]
    BadTime { field: String, value: String },

    #[error("{field}: {value:?} is not a valid note-length token")]
    BadDuration { field: String, value: String },

    #[error("{field}: {value:?} is not a valid pitch")]
    BadPitch { field: String, value: String },

    #[error("{field}: chords require at least one pitch")]
    EmptyChord { field: String },

    #[error("{field}: {family:?} cannot sound chords; melody and harmony need a polyphonic family")]
    NotPolyphonic {
        field: String,
        family: InstrumentFamily,
    },

    #[error("{field}: {family:?} is not a single-voice family; bass needs one")]
    NotSingleVoice {
        field: String,
        family: InstrumentFamily,
    },
}

/// Validate a deserialized composition. `Composition::from_json` runs this;
/// hand-constructed documents should call it before loading.
pub fn validate(composition: &Composition) -> Result<(), StructuralError> {
    if composition.title.trim().is_empty() {
        return Err(StructuralError::EmptyTitle);
    }
    if !(BPM_MIN..=BPM_MAX).contains(&composition.bpm) {
        return Err(StructuralError::BpmOutOfRange(composition.bpm));
    }

    for role in [TrackRole::Melody, TrackRole::Harmony, TrackRole::Bass] {
        let track = composition
            .tracks
            .pitched(role)
            .ok_or_else(|| StructuralError::Malformed(format!("tracks.{} missing", role.name())))?;
        validate_pitched_track(role, track)?;
    }

    Ok(())
}

fn validate_pitched_track(role: TrackRole, track: &PitchedTrack) -> Result<(), StructuralError> {
    let family = track.instrument.family;
    let instrument_field = format!("tracks.{}.instrument.family", role.name());

    match role {
        TrackRole::Melody | TrackRole::Harmony if !family.is_polyphonic() => {
            return Err(StructuralError::NotPolyphonic {
                field: instrument_field,
                family,
            });
        }
        TrackRole::Bass if !family.is_single_voice() => {
            return Err(StructuralError::NotSingleVoice {
                field: instrument_field,
                family,
            });
        }
        _ => {}
    }

    for (index, note) in track.notes.iter().enumerate() {
        let field = |leaf: &str| format!("tracks.{}.notes[{}].{}", role.name(), index, leaf);

        if position_sixteenths(&note.time).is_none() {
            return Err(StructuralError::BadTime {
                field: field("time"),
                value: note.time.clone(),
            });
        }
        if duration_sixteenths(&note.duration).is_none() {
            return Err(StructuralError::BadDuration {
                field: field("duration"),
                value: note.duration.clone(),
            });
        }
        if !(0.0..=1.0).contains(&note.velocity) {
            return Err(StructuralError::VelocityOutOfRange {
                field: field("velocity"),
                value: note.velocity,
            });
        }
        let pitches = note.note.pitches();
        if pitches.is_empty() {
            return Err(StructuralError::EmptyChord {
                field: field("note"),
            });
        }
        for pitch in pitches {
            if pitch_to_midi(pitch).is_none() {
                return Err(StructuralError::BadPitch {
                    field: field("note"),
                    value: pitch.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::types::*;

    fn minimal() -> Composition {
        let poly = InstrumentConfig {
            family: InstrumentFamily::Polyphonic,
            oscillator_shape: OscillatorShape::Sine,
            envelope: None,
        };
        Composition {
            title: "Test".to_string(),
            description: String::new(),
            bpm: 120,
            key: "C Major".to_string(),
            tracks: Tracks {
                melody: PitchedTrack {
                    instrument: poly.clone(),
                    notes: vec![NoteEvent {
                        time: "0:0:0".to_string(),
                        note: NoteValue::Single("C4".to_string()),
                        duration: "4n".to_string(),
                        velocity: 0.8,
                    }],
                },
                harmony: PitchedTrack {
                    instrument: poly,
                    notes: vec![],
                },
                bass: PitchedTrack {
                    instrument: InstrumentConfig {
                        family: InstrumentFamily::SimpleTone,
                        oscillator_shape: OscillatorShape::Square,
                        envelope: None,
                    },
                    notes: vec![],
                },
                rhythm: RhythmTrack {
                    pattern: "basic".to_string(),
                    active: false,
                },
            },
        }
    }

    #[test]
    fn test_minimal_is_valid() {
        assert!(validate(&minimal()).is_ok());
    }

    #[test]
    fn test_bpm_range() {
        let mut comp = minimal();
        comp.bpm = 10;
        assert_eq!(validate(&comp), Err(StructuralError::BpmOutOfRange(10)));
        comp.bpm = 301;
        assert!(validate(&comp).is_err());
        comp.bpm = 20;
        assert!(validate(&comp).is_ok());
    }

    #[test]
    fn test_velocity_range_names_field() {
        let mut comp = minimal();
        comp.tracks.melody.notes[0].velocity = 1.5;
        match validate(&comp) {
            Err(StructuralError::VelocityOutOfRange { field, value }) => {
                assert_eq!(field, "tracks.melody.notes[0].velocity");
                assert_eq!(value, 1.5);
            }
            other => panic!("expected velocity error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_time_and_duration() {
        let mut comp = minimal();
        comp.tracks.melody.notes[0].time = "0:9:0".to_string();
        assert!(matches!(validate(&comp), Err(StructuralError::BadTime { .. })));

        let mut comp = minimal();
        comp.tracks.melody.notes[0].duration = "3n".to_string();
        assert!(matches!(
            validate(&comp),
            Err(StructuralError::BadDuration { .. })
        ));
    }

    #[test]
    fn test_bad_pitch_in_chord() {
        let mut comp = minimal();
        comp.tracks.melody.notes[0].note =
            NoteValue::Chord(vec!["C4".to_string(), "X2".to_string()]);
        match validate(&comp) {
            Err(StructuralError::BadPitch { value, .. }) => assert_eq!(value, "X2"),
            other => panic!("expected pitch error, got {:?}", other),
        }
    }

    #[test]
    fn test_melody_requires_polyphonic_family() {
        let mut comp = minimal();
        comp.tracks.melody.instrument.family = InstrumentFamily::Duo;
        assert!(matches!(
            validate(&comp),
            Err(StructuralError::NotPolyphonic { .. })
        ));
    }

    #[test]
    fn test_bass_rejects_polyphonic_family() {
        let mut comp = minimal();
        comp.tracks.bass.instrument.family = InstrumentFamily::Polyphonic;
        assert!(matches!(
            validate(&comp),
            Err(StructuralError::NotSingleVoice { .. })
        ));
    }

    #[test]
    fn test_bass_chord_is_structurally_valid() {
        // Chord-to-first-voice reduction is a playback policy, not a
        // validation failure.
        let mut comp = minimal();
        comp.tracks.bass.notes.push(NoteEvent {
            time: "0:0:0".to_string(),
            note: NoteValue::Chord(vec!["C3".to_string(), "E3".to_string()]),
            duration: "4n".to_string(),
            velocity: 0.9,
        });
        assert!(validate(&comp).is_ok());
    }
}
