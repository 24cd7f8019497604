// LoopSketch - playback and editing engine for short loopable sketches

pub mod audio;
pub mod composition;
pub mod engine;
pub mod error;
pub mod generator;
pub mod sequencer;
pub mod synth;

// Re-export commonly used types for convenience
pub use audio::RenderCore;
pub use audio::mixer::ANALYSIS_SIZE;
pub use audio::parameters::SharedParams;
pub use composition::{
    Composition, InstrumentConfig, InstrumentFamily, NoteEvent, NoteValue,
    OscillatorShape, StructuralError, TrackRole, validate,
};
pub use engine::{Engine, ExportedAudio};
pub use error::EngineError;
pub use generator::{GenerationError, SketchGenerator};
pub use sequencer::{Transport, TransportState};
