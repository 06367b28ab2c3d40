//! Host-side event fan-out with sticky replay.
//!
//! The readiness of the audio source is decided once per session, possibly
//! before the application has attached its handlers. Sticky kinds cache
//! their last payload and replay it synchronously to late subscribers;
//! everything else is fire-and-forget.

use crate::protocol::EngineEvent;
use std::collections::HashMap;

/// Everything a host application can observe: engine events plus the
/// one-time readiness report from the audio source.
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// The audio source is open and delivering blocks at this rate.
    Ready { sample_rate: u32 },
    /// The audio source could not be opened; the engine is never started.
    ReadyFail { message: String },
    Engine(EngineEvent),
}

/// Subscription key for [`EventHub`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HostEventKind {
    Ready,
    ReadyFail,
    Started,
    Listening,
    Recording,
    Saturated,
    Paused,
    Stopped,
    Canceled,
}

/// Event kinds that cache their last payload for late subscribers.
const STICKY_KINDS: &[HostEventKind] = &[HostEventKind::Ready, HostEventKind::ReadyFail];

impl HostEvent {
    pub fn kind(&self) -> HostEventKind {
        match self {
            HostEvent::Ready { .. } => HostEventKind::Ready,
            HostEvent::ReadyFail { .. } => HostEventKind::ReadyFail,
            HostEvent::Engine(event) => match event {
                EngineEvent::Started => HostEventKind::Started,
                EngineEvent::Listening { .. } => HostEventKind::Listening,
                EngineEvent::Recording { .. } => HostEventKind::Recording,
                EngineEvent::Saturated => HostEventKind::Saturated,
                EngineEvent::Paused => HostEventKind::Paused,
                EngineEvent::Stopped { .. } => HostEventKind::Stopped,
                EngineEvent::Canceled { .. } => HostEventKind::Canceled,
            },
        }
    }
}

type Handler = Box<dyn FnMut(&HostEvent) + Send>;

/// Per-kind subscriber lists with sticky replay for one-time events.
#[derive(Default)]
pub struct EventHub {
    handlers: HashMap<HostEventKind, Vec<Handler>>,
    sticky: HashMap<HostEventKind, HostEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a handler. If the kind is sticky and has already fired, the
    /// handler sees the cached payload immediately.
    pub fn on<F>(&mut self, kind: HostEventKind, mut handler: F) -> &mut Self
    where
        F: FnMut(&HostEvent) + Send + 'static,
    {
        if let Some(event) = self.sticky.get(&kind) {
            handler(event);
        }
        self.handlers.entry(kind).or_default().push(Box::new(handler));
        self
    }

    /// Detach every handler for a kind.
    pub fn off(&mut self, kind: HostEventKind) -> &mut Self {
        self.handlers.remove(&kind);
        self
    }

    /// Deliver an event to its subscribers, in subscription order.
    pub fn fire(&mut self, event: HostEvent) {
        let kind = event.kind();
        if let Some(handlers) = self.handlers.get_mut(&kind) {
            for handler in handlers.iter_mut() {
                handler(&event);
            }
        }
        if STICKY_KINDS.contains(&kind) {
            self.sticky.insert(kind, event);
        }
    }

    /// Drop all handlers and cached payloads, in preparation for teardown.
    pub fn clear(&mut self) {
        self.handlers.clear();
        self.sticky.clear();
    }
}
