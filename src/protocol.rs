//! Command and event types exchanged between a host and the engine.
//!
//! Commands flow into the worker over the control channel; events flow back
//! out in the exact order the state machine generated them.

use crate::config::ConfigPatch;
use crate::engine::Take;
use std::sync::Arc;

/// Inbound control message, applied atomically between blocks.
#[derive(Debug, Clone)]
pub enum Command {
    Start,
    Pause,
    Stop,
    Cancel,
    Toggle,
    SetConfig(ConfigPatch),
    /// Release the worker; the engine becomes inert afterwards.
    Close,
}

/// Why a take was canceled instead of delivered.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// The host asked for a forced cancel.
    Asked,
    /// A sample tripped the saturation ceiling and the policy discards takes.
    Saturated,
    /// The take ended below the configured minimum duration.
    TooShort,
}

impl CancelReason {
    pub fn label(self) -> &'static str {
        match self {
            CancelReason::Asked => "asked",
            CancelReason::Saturated => "saturated",
            CancelReason::TooShort => "too_short",
        }
    }
}

/// Outbound engine event. Terminal events (`Stopped`, `Canceled`) are
/// emitted exactly once per take.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Recording began, either directly or after speech onset in pre-roll.
    Started,
    /// A pre-roll block was observed without detecting speech.
    Listening { block: Arc<[f32]> },
    /// A block was committed to the take.
    Recording { block: Arc<[f32]>, duration: f32 },
    /// A sample exceeded the saturation ceiling; sticky for the take.
    Saturated,
    Paused,
    /// The take completed; buffer ownership transfers to the host.
    Stopped { take: Take },
    Canceled { reason: CancelReason },
}

impl EngineEvent {
    pub fn label(&self) -> &'static str {
        match self {
            EngineEvent::Started => "started",
            EngineEvent::Listening { .. } => "listening",
            EngineEvent::Recording { .. } => "recording",
            EngineEvent::Saturated => "saturated",
            EngineEvent::Paused => "paused",
            EngineEvent::Stopped { .. } => "stopped",
            EngineEvent::Canceled { .. } => "canceled",
        }
    }
}
