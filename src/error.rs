use thiserror::Error;

use crate::composition::StructuralError;
use crate::generator::GenerationError;

/// Errors surfaced by the engine facade.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("invalid composition: {0}")]
    Structural(#[from] StructuralError),

    #[error("engine not ready: {0}")]
    State(&'static str),

    #[error("audio device error: {0}")]
    Device(String),

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("encoding failed: {0}")]
    Encoding(#[from] hound::Error),
}
