//! voicegate: voice-activity-gated audio capture.
//!
//! Feed mono sample blocks in, get trimmed takes out. The engine arms on
//! `start`, optionally waits for speech onset, auto-stops on trailing
//! silence, and rejects clipped or too-short takes. Hosts drive it either
//! directly ([`engine::RecorderEngine`]) or through a worker thread
//! ([`worker::spawn`]) fed by the microphone adapter ([`input::MicSource`]).

pub mod config;
pub mod engine;
pub mod hub;
pub mod input;
pub mod protocol;
pub mod telemetry;
pub mod wav;
pub mod worker;

pub use config::{ConfigPatch, EngineConfig, SaturatePolicy};
pub use engine::{EngineState, RecorderEngine, Take};
pub use hub::{EventHub, HostEvent, HostEventKind};
pub use protocol::{CancelReason, Command, EngineEvent};
pub use worker::{EngineHandle, EngineWorker};
