//! Amplitude scans used by the start, stop, and saturation detectors.

/// Largest absolute amplitude in the block; 0.0 for an empty block.
pub(crate) fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |max, s| max.max(s.abs()))
}

/// True when any sample strictly exceeds `threshold` in absolute value.
pub(crate) fn any_above(samples: &[f32], threshold: f32) -> bool {
    samples.iter().any(|s| s.abs() > threshold)
}
