// Composition document - the data-only musical description the engine
// consumes. Produced by the external generator or by hand-editing; always
// validated before it reaches the engine.
//
// Musical time, durations and pitches are kept as their raw document
// strings so a saved project file reloads byte-for-byte; they are parsed by
// the validator and again when schedulers are rebuilt.

use serde::{Deserialize, Serialize};

use super::validate::{self, StructuralError};

/// The four fixed track roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackRole {
    Melody,
    Harmony,
    Bass,
    Rhythm,
}

impl TrackRole {
    pub const ALL: [TrackRole; 4] = [
        TrackRole::Melody,
        TrackRole::Harmony,
        TrackRole::Bass,
        TrackRole::Rhythm,
    ];

    /// Stable index for per-role parameter arrays.
    pub fn index(self) -> usize {
        match self {
            TrackRole::Melody => 0,
            TrackRole::Harmony => 1,
            TrackRole::Bass => 2,
            TrackRole::Rhythm => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TrackRole::Melody => "melody",
            TrackRole::Harmony => "harmony",
            TrackRole::Bass => "bass",
            TrackRole::Rhythm => "rhythm",
        }
    }
}

/// Sound-generator family for a track instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstrumentFamily {
    SimpleTone,
    AmplitudeModulated,
    FrequencyModulated,
    Duo,
    MembranePercussion,
    Polyphonic,
}

impl InstrumentFamily {
    /// Whether this family can sound several voices at once.
    pub fn is_polyphonic(self) -> bool {
        matches!(self, InstrumentFamily::Polyphonic)
    }

    /// Whether this family is a single-voice generator (required for bass).
    pub fn is_single_voice(self) -> bool {
        !self.is_polyphonic()
    }
}

/// Oscillator waveform shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OscillatorShape {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

/// Attack/decay/sustain/release envelope, times in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeConfig {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

/// Timbre descriptor for one track instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub family: InstrumentFamily,
    #[serde(rename = "oscillatorShape")]
    pub oscillator_shape: OscillatorShape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope: Option<EnvelopeConfig>,
}

/// A single pitch or a simultaneous chord.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NoteValue {
    Single(String),
    Chord(Vec<String>),
}

impl NoteValue {
    /// The pitch strings, in document order (a single pitch is a one-element
    /// slice).
    pub fn pitches(&self) -> &[String] {
        match self {
            NoteValue::Single(p) => std::slice::from_ref(p),
            NoteValue::Chord(ps) => ps,
        }
    }
}

/// One scheduled note: symbolic time, pitch(es), symbolic duration,
/// velocity in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub time: String,
    pub note: NoteValue,
    pub duration: String,
    pub velocity: f32,
}

/// A melodic/harmonic/bass track: instrument timbre plus an ordered note
/// list. An empty note list is silence, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchedTrack {
    pub instrument: InstrumentConfig,
    #[serde(default)]
    pub notes: Vec<NoteEvent>,
}

/// The rhythm track carries no notes: its pattern is a fixed built-in
/// kick/hat loop toggled on or off. The pattern string is descriptive only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhythmTrack {
    pub pattern: String,
    pub active: bool,
}

/// The four fixed tracks of a composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracks {
    pub melody: PitchedTrack,
    pub harmony: PitchedTrack,
    pub bass: PitchedTrack,
    pub rhythm: RhythmTrack,
}

impl Tracks {
    /// The pitched track for a melodic role; None for rhythm.
    pub fn pitched(&self, role: TrackRole) -> Option<&PitchedTrack> {
        match role {
            TrackRole::Melody => Some(&self.melody),
            TrackRole::Harmony => Some(&self.harmony),
            TrackRole::Bass => Some(&self.bass),
            TrackRole::Rhythm => None,
        }
    }
}

/// A complete composition document. The loop window is fixed at 4 bars for
/// every composition regardless of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub bpm: u16,
    pub key: String,
    pub tracks: Tracks,
}

impl Composition {
    /// Parse and structurally validate a JSON document. The engine never
    /// receives a composition that did not pass this.
    pub fn from_json(text: &str) -> Result<Composition, StructuralError> {
        let composition: Composition =
            serde_json::from_str(text).map_err(|e| StructuralError::Malformed(e.to_string()))?;
        validate::validate(&composition)?;
        Ok(composition)
    }

    /// Serialize for the project file: pretty-printed, reloadable through
    /// [`Composition::from_json`] byte-for-byte.
    pub fn to_json_pretty(&self) -> Result<String, StructuralError> {
        serde_json::to_string_pretty(self).map_err(|e| StructuralError::Malformed(e.to_string()))
    }

    /// Suggested file name for an exported audio capture, derived from the
    /// title ("Slow Sad Piano" -> "slow-sad-piano.wav").
    pub fn export_file_name(&self) -> String {
        let mut slug = String::new();
        for ch in self.title.chars() {
            if ch.is_ascii_alphanumeric() {
                slug.push(ch.to_ascii_lowercase());
            } else if (ch.is_whitespace() || ch == '-' || ch == '_') && !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let slug = slug.trim_matches('-');
        if slug.is_empty() {
            "sketch.wav".to_string()
        } else {
            format!("{slug}.wav")
        }
    }
}
