// Pitch - Note-name strings, MIDI numbers and semitone transposition

/// Parse a note-name-plus-octave string ("C4", "F#3", "Bb2") into a MIDI
/// note number. Octaves follow the MIDI convention where C4 = 60; negative
/// octaves down to C-1 = 0 are accepted.
pub fn pitch_to_midi(text: &str) -> Option<u8> {
    let mut chars = text.trim().chars();
    let letter = chars.next()?;
    let semitone: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let rest: String = chars.collect();
    let (accidental, octave_text) = match rest.chars().next() {
        Some('#') => (1, &rest[1..]),
        Some('b') => (-1, &rest[1..]),
        _ => (0, rest.as_str()),
    };
    let octave: i32 = octave_text.parse().ok()?;
    let midi = (octave + 1) * 12 + semitone + accidental;
    u8::try_from(midi).ok().filter(|&m| m <= 127)
}

/// Render a MIDI note number as a pitch string. Black keys render as sharps,
/// so transposing "B3" by +2 yields "C#4".
pub fn midi_to_pitch(midi: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let octave = midi as i32 / 12 - 1;
    format!("{}{}", NAMES[midi as usize % 12], octave)
}

/// Shift a MIDI note by a signed number of semitones, clamped to the MIDI
/// range. Pitch-class arithmetic falls out of the MIDI numbering: letter
/// name and octave both change correctly.
pub fn transpose_midi(midi: u8, semitones: i8) -> u8 {
    (midi as i32 + semitones as i32).clamp(0, 127) as u8
}

/// Frequency in Hz of a MIDI note (A4 = 440 Hz equal temperament).
pub fn midi_to_freq(midi: u8) -> f32 {
    440.0 * 2_f32.powf((midi as f32 - 69.0) / 12.0)
}
