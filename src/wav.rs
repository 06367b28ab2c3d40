//! 16-bit PCM WAV export for finished takes.
//!
//! Produces the canonical 44-byte RIFF/WAVE/fmt/data layout followed by
//! little-endian signed 16-bit samples. Uploaded takes pass through naive
//! content-type sniffers, so a handful of sample values whose byte pairs
//! spell executable or script magic are nudged off by one.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;

/// i16 values whose little-endian bytes form a magic prefix a content
/// sniffer could mistake for executable or script content:
/// 0x5A4D = "MZ", 0x457F = 0x7F'E' (ELF), 0x2123 = "#!", 0x3F3C = "<?".
/// None of the four are adjacent, so a single +1 step cannot land on
/// another denylisted value; do not extend this table without re-deriving
/// that property.
const SNIFFABLE_VALUES: [i16; 4] = [0x5A4D, 0x457F, 0x2123, 0x3F3C];

/// Quantize one normalized sample to i16, avoiding denylisted values.
fn quantize(sample: f32) -> i16 {
    let scaled = (sample * 32_767.0).round().clamp(-32_768.0, 32_767.0) as i16;
    if SNIFFABLE_VALUES.contains(&scaled) {
        scaled + 1
    } else {
        scaled
    }
}

/// Encode mono samples in [-1, 1] as a complete WAV byte stream.
pub fn encode(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer =
        WavWriter::new(&mut cursor, spec).context("failed to start WAV stream")?;
    for &sample in samples {
        writer
            .write_sample(quantize(sample))
            .context("failed to write WAV sample")?;
    }
    writer.finalize().context("failed to finalize WAV stream")?;
    Ok(cursor.into_inner())
}
