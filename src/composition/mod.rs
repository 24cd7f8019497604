// Composition document - data model, symbolic time, pitch arithmetic and
// structural validation

pub mod pitch;
pub mod time;
pub mod types;
pub mod validate;

pub use types::{
    Composition, EnvelopeConfig, InstrumentConfig, InstrumentFamily, NoteEvent, NoteValue,
    OscillatorShape, PitchedTrack, RhythmTrack, TrackRole, Tracks,
};
pub use validate::{StructuralError, validate};
