// Musical time - Symbolic positions and note lengths
// Positions are "bar:beat:sixteenth" strings, durations are note-length
// tokens; both resolve to sixteenth ticks and only become seconds at
// schedule time, relative to the current tempo.

/// Beats per bar. The loop window is always 4/4.
pub const BEATS_PER_BAR: u32 = 4;

/// Sixteenths per beat.
pub const SIXTEENTHS_PER_BEAT: u32 = 4;

/// Length of the fixed loop window in bars (bars 0..4).
pub const LOOP_BARS: u32 = 4;

/// Length of the fixed loop window in sixteenths.
pub const LOOP_SIXTEENTHS: f64 = (LOOP_BARS * BEATS_PER_BAR * SIXTEENTHS_PER_BEAT) as f64;

/// Parse a "bar:beat:sixteenth" position into sixteenth ticks from bar 0.
///
/// All three fields are zero-based. Beat and sixteenth must stay inside one
/// bar (0..4); the bar number is unrestricted, positions beyond bar 3 simply
/// fall outside the audible loop window.
pub fn position_sixteenths(text: &str) -> Option<f64> {
    let mut parts = text.split(':');
    let bar: u32 = parts.next()?.trim().parse().ok()?;
    let beat: u32 = parts.next()?.trim().parse().ok()?;
    let sixteenth: u32 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    if beat >= BEATS_PER_BAR || sixteenth >= SIXTEENTHS_PER_BEAT {
        return None;
    }
    Some((bar * BEATS_PER_BAR * SIXTEENTHS_PER_BEAT + beat * SIXTEENTHS_PER_BEAT + sixteenth) as f64)
}

/// Parse a note-length token ("1n", "2n", "4n", "8n", "16n", "32n", plus
/// dotted variants like "4n.") into sixteenth ticks.
pub fn duration_sixteenths(token: &str) -> Option<f64> {
    let trimmed = token.trim();
    let (base, dotted) = match trimmed.strip_suffix('.') {
        Some(rest) => (rest, true),
        None => (trimmed, false),
    };
    let sixteenths = match base {
        "1n" => 16.0,
        "2n" => 8.0,
        "4n" => 4.0,
        "8n" => 2.0,
        "16n" => 1.0,
        "32n" => 0.5,
        _ => return None,
    };
    Some(if dotted { sixteenths * 1.5 } else { sixteenths })
}

/// Duration of one sixteenth in seconds at the given tempo.
pub fn sixteenth_seconds(bpm: f64) -> f64 {
    60.0 / bpm / SIXTEENTHS_PER_BEAT as f64
}

/// Duration of the full 4-bar loop in seconds at the given tempo.
pub fn loop_seconds(bpm: f64) -> f64 {
    LOOP_SIXTEENTHS * sixteenth_seconds(bpm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_parsing() {
        assert_eq!(position_sixteenths("0:0:0"), Some(0.0));
        assert_eq!(position_sixteenths("0:1:0"), Some(4.0));
        assert_eq!(position_sixteenths("2:1:3"), Some(39.0));
        assert_eq!(position_sixteenths("3:3:3"), Some(63.0));
        // Outside the loop window but still well-formed
        assert_eq!(position_sixteenths("7:0:0"), Some(112.0));
    }

    #[test]
    fn test_position_rejects_malformed() {
        assert_eq!(position_sixteenths(""), None);
        assert_eq!(position_sixteenths("1:2"), None);
        assert_eq!(position_sixteenths("1:2:3:4"), None);
        assert_eq!(position_sixteenths("a:b:c"), None);
        // Beat and sixteenth must stay inside one bar
        assert_eq!(position_sixteenths("0:4:0"), None);
        assert_eq!(position_sixteenths("0:0:4"), None);
    }

    #[test]
    fn test_duration_tokens() {
        assert_eq!(duration_sixteenths("1n"), Some(16.0));
        assert_eq!(duration_sixteenths("4n"), Some(4.0));
        assert_eq!(duration_sixteenths("16n"), Some(1.0));
        assert_eq!(duration_sixteenths("4n."), Some(6.0));
        assert_eq!(duration_sixteenths("8n."), Some(3.0));
        assert_eq!(duration_sixteenths("3n"), None);
        assert_eq!(duration_sixteenths("quarter"), None);
    }

    #[test]
    fn test_loop_duration() {
        // 4 bars of 4/4 at 120 BPM = 8 seconds
        assert!((loop_seconds(120.0) - 8.0).abs() < 1e-9);
        // 70 BPM => ~13.71s
        assert!((loop_seconds(70.0) - 4.0 * 4.0 * 60.0 / 70.0).abs() < 1e-9);
    }
}
