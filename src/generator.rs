// External generator interface - text prompt in, composition document out
//
// The generation step itself (text-to-structured-data) lives outside this
// crate; the engine only consumes its result and surfaces its failures
// unchanged. No retry policy here.

use thiserror::Error;

use crate::composition::Composition;

/// The external service failed or returned something unusable. Retry-worthy
/// from the user's perspective; the engine performs no state change.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("generation failed: {0}")]
pub struct GenerationError(pub String);

/// A natural-language-to-composition generator.
pub trait SketchGenerator {
    /// Produce a composition for a scene description. Implementations are
    /// expected to return structurally valid documents; the engine validates
    /// again on load regardless.
    fn generate(&self, prompt: &str) -> Result<Composition, GenerationError>;
}

/// Closures work as generators, which keeps tests and offline tooling short.
impl<F> SketchGenerator for F
where
    F: Fn(&str) -> Result<Composition, GenerationError>,
{
    fn generate(&self, prompt: &str) -> Result<Composition, GenerationError> {
        self(prompt)
    }
}
