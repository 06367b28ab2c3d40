//! Voice-activity-gated recording engine.
//!
//! Turns a continuous stream of mono sample blocks into discrete, trimmed
//! takes. An amplitude-threshold state machine detects start of speech,
//! auto-stops on trailing silence, and rejects clipped or too-short takes;
//! explicit start/pause/stop/cancel commands stay available throughout.

mod buffer;
mod level;
mod machine;

pub use buffer::{Take, TakeBuffer};
pub use machine::{feed_pcm, EngineState, RecorderEngine};
