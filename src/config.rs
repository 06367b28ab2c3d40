//! Engine configuration and the optional-field overlay used by `setConfig`.

use anyhow::{bail, Result};
use serde::Deserialize;

const DEFAULT_SATURATION_THRESHOLD: f32 = 0.99;
const DEFAULT_START_THRESHOLD: f32 = 0.1;
const DEFAULT_STOP_THRESHOLD: f32 = 0.05;
const DEFAULT_STOP_DURATION: f32 = 0.3;
const DEFAULT_MARGIN_BEFORE: f32 = 0.25;
const DEFAULT_MARGIN_AFTER: f32 = 0.25;
const DEFAULT_MIN_DURATION: f32 = 0.15;
const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// What to do with a take once a sample has exceeded the saturation ceiling.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SaturatePolicy {
    /// Report `Saturated` but still deliver the take.
    #[default]
    None,
    /// Terminate the take immediately; it is never delivered.
    Cancel,
    /// Finish the take normally but discard it at stop time.
    Discard,
}

/// Tunable parameters for one engine instance.
///
/// Snapshotted per block: updates arriving mid-take apply from the next
/// block onward, never retroactively.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Arm the pre-roll: `start` enters Listening and waits for speech.
    pub auto_start: bool,
    /// Auto-terminate the take once trailing silence lasts `stop_duration`.
    pub auto_stop: bool,
    pub on_saturate: SaturatePolicy,
    /// Absolute amplitude above which a sample counts as clipped.
    pub saturation_threshold: f32,
    /// Absolute amplitude above which speech onset is detected.
    pub start_threshold: f32,
    /// Block peak below which the block counts toward trailing silence.
    pub stop_threshold: f32,
    /// Seconds of continuous silence that end the take when `auto_stop`.
    pub stop_duration: f32,
    /// Seconds of pre-roll audio kept before detected speech onset.
    pub margin_before: f32,
    /// Seconds of silence kept after the detected cutoff.
    pub margin_after: f32,
    /// Takes shorter than this are canceled as too short.
    pub min_duration: f32,
    /// Hard cap on take duration in seconds; 0 disables the limit.
    pub time_limit: f32,
    /// Samples per second of the incoming stream, set by the host adapter.
    pub sample_rate: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_start: false,
            auto_stop: false,
            on_saturate: SaturatePolicy::None,
            saturation_threshold: DEFAULT_SATURATION_THRESHOLD,
            start_threshold: DEFAULT_START_THRESHOLD,
            stop_threshold: DEFAULT_STOP_THRESHOLD,
            stop_duration: DEFAULT_STOP_DURATION,
            margin_before: DEFAULT_MARGIN_BEFORE,
            margin_after: DEFAULT_MARGIN_AFTER,
            min_duration: DEFAULT_MIN_DURATION,
            time_limit: 0.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl EngineConfig {
    /// Overlay the fields present in `patch` onto this configuration.
    pub fn apply(&mut self, patch: &ConfigPatch) {
        if let Some(value) = patch.auto_start {
            self.auto_start = value;
        }
        if let Some(value) = patch.auto_stop {
            self.auto_stop = value;
        }
        if let Some(value) = patch.on_saturate {
            self.on_saturate = value;
        }
        if let Some(value) = patch.saturation_threshold {
            self.saturation_threshold = value;
        }
        if let Some(value) = patch.start_threshold {
            self.start_threshold = value;
        }
        if let Some(value) = patch.stop_threshold {
            self.stop_threshold = value;
        }
        if let Some(value) = patch.stop_duration {
            self.stop_duration = value;
        }
        if let Some(value) = patch.margin_before {
            self.margin_before = value;
        }
        if let Some(value) = patch.margin_after {
            self.margin_after = value;
        }
        if let Some(value) = patch.min_duration {
            self.min_duration = value;
        }
        if let Some(value) = patch.time_limit {
            self.time_limit = value;
        }
        if let Some(value) = patch.sample_rate {
            self.sample_rate = value;
        }
    }

    /// Check value ranges before the configuration reaches the engine.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("saturationThreshold", self.saturation_threshold),
            ("startThreshold", self.start_threshold),
            ("stopThreshold", self.stop_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{name} must be between 0.0 and 1.0, got {value}");
            }
        }
        for (name, value) in [
            ("stopDuration", self.stop_duration),
            ("marginBefore", self.margin_before),
            ("marginAfter", self.margin_after),
            ("minDuration", self.min_duration),
            ("timeLimit", self.time_limit),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("{name} must be a non-negative number of seconds, got {value}");
            }
        }
        if !(8_000..=192_000).contains(&self.sample_rate) {
            bail!(
                "sampleRate must be between 8000 and 192000 Hz, got {}",
                self.sample_rate
            );
        }
        Ok(())
    }
}

/// Partial configuration: every field optional, keys matching the public
/// `setConfig` surface. Unknown keys are rejected rather than ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ConfigPatch {
    pub auto_start: Option<bool>,
    pub auto_stop: Option<bool>,
    pub on_saturate: Option<SaturatePolicy>,
    pub saturation_threshold: Option<f32>,
    pub start_threshold: Option<f32>,
    pub stop_threshold: Option<f32>,
    pub stop_duration: Option<f32>,
    pub margin_before: Option<f32>,
    pub margin_after: Option<f32>,
    pub min_duration: Option<f32>,
    pub time_limit: Option<f32>,
    pub sample_rate: Option<u32>,
}

impl ConfigPatch {
    /// Parse a patch from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
