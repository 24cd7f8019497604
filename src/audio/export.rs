//! WAV encoding for captured audio.
//!
//! The engine captures the master output in real time (the render that is
//! exported is the same render the listener heard); this module only turns
//! the captured f32 samples into a finished in-memory WAV file.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::EngineError;

pub const EXPORT_BIT_DEPTH: u16 = 16;

/// Encode mono f32 samples to a complete 16-bit PCM WAV file in memory.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, EngineError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: EXPORT_BIT_DEPTH,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(&mut cursor, spec)?;
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;

    #[test]
    fn test_encode_produces_readable_wav() {
        let samples: Vec<f32> = (0..4410)
            .map(|i| (i as f32 * 440.0 / 44100.0 * std::f32::consts::TAU).sin() * 0.5)
            .collect();
        let bytes = encode_wav(&samples, 44100).unwrap();

        let reader = WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 4410);
    }

    #[test]
    fn test_encode_clamps_out_of_range() {
        let bytes = encode_wav(&[2.0, -2.0], 44100).unwrap();
        let mut reader = WavReader::new(Cursor::new(bytes)).unwrap();
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded[0], i16::MAX);
        assert_eq!(decoded[1], -i16::MAX);
    }

    #[test]
    fn test_encode_empty_capture() {
        let bytes = encode_wav(&[], 48000).unwrap();
        let reader = WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len(), 0);
    }
}
