//! The per-block recording state machine.
//!
//! Consumes raw audio blocks plus host commands and produces ordered engine
//! events. Each take owns a fresh [`TakeBuffer`]; the buffer leaves the
//! engine inside the terminal `Stopped` event or is dropped on cancel.

use super::buffer::TakeBuffer;
use super::level::{any_above, peak};
use crate::config::{EngineConfig, SaturatePolicy};
use crate::protocol::{CancelReason, Command, EngineEvent};
use crossbeam_channel::Sender;
use std::sync::Arc;
use tracing::debug;

/// Engine lifecycle states.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EngineState {
    /// No take in flight; the initial and terminal state of every take.
    Stopped,
    /// Pre-roll: buffering the last `margin_before` seconds, waiting for
    /// speech onset.
    Listening,
    Recording,
    /// Take retained, incoming blocks ignored until resumed.
    Paused,
}

/// Voice-activity-gated capture engine.
///
/// Not reentrant: one logical worker calls [`process`](Self::process) once
/// per block, strictly in arrival order, and applies commands only between
/// blocks. Several engines may coexist; there is no process-wide state.
pub struct RecorderEngine {
    config: EngineConfig,
    state: EngineState,
    take: Option<TakeBuffer>,
    silence_run: usize,
    saturated: bool,
    events: Sender<EngineEvent>,
}

impl RecorderEngine {
    pub fn new(config: EngineConfig, events: Sender<EngineEvent>) -> Self {
        Self {
            config,
            state: EngineState::Stopped,
            take: None,
            silence_run: 0,
            saturated: false,
            events,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Duration of the take in flight, in seconds.
    pub fn recording_time(&self) -> f32 {
        self.take.as_ref().map(TakeBuffer::duration).unwrap_or(0.0)
    }

    /// Apply one host command. Returns false for commands that are no-ops in
    /// the current state ("already active", "already stopped").
    pub fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Start => self.start(),
            Command::Pause => self.pause(),
            Command::Stop => self.stop(),
            Command::Cancel => self.cancel(),
            Command::Toggle => self.toggle(),
            Command::SetConfig(patch) => {
                self.config.apply(&patch);
                true
            }
            Command::Close => self.close(),
        }
    }

    /// Begin a take, or resume a paused one.
    pub fn start(&mut self) -> bool {
        match self.state {
            EngineState::Listening | EngineState::Recording => false,
            EngineState::Stopped => {
                self.take = Some(TakeBuffer::new(self.config.sample_rate));
                self.silence_run = 0;
                self.saturated = false;

                if self.config.auto_start {
                    debug!(state = "listening", "take armed, waiting for speech");
                    self.state = EngineState::Listening;
                } else {
                    self.state = EngineState::Recording;
                    self.emit(EngineEvent::Started);
                }
                true
            }
            EngineState::Paused => {
                // Resume keeps the buffer and counters untouched.
                self.state = EngineState::Recording;
                self.emit(EngineEvent::Started);
                true
            }
        }
    }

    /// Suspend the take. Pausing the pre-roll has no meaning, so Listening
    /// drops straight back to Stopped and the buffered margin is discarded.
    pub fn pause(&mut self) -> bool {
        match self.state {
            EngineState::Stopped | EngineState::Paused => false,
            EngineState::Listening => {
                self.take = None;
                self.state = EngineState::Stopped;
                self.emit(EngineEvent::Paused);
                true
            }
            EngineState::Recording => {
                self.state = EngineState::Paused;
                self.emit(EngineEvent::Paused);
                true
            }
        }
    }

    /// End the take through the normal quality cascade.
    pub fn stop(&mut self) -> bool {
        self.finish(false)
    }

    /// End the take, discarding it unconditionally.
    pub fn cancel(&mut self) -> bool {
        self.finish(true)
    }

    /// Stop when active, start otherwise.
    pub fn toggle(&mut self) -> bool {
        match self.state {
            EngineState::Listening | EngineState::Recording => self.stop(),
            EngineState::Stopped | EngineState::Paused => self.start(),
        }
    }

    /// Drop any take in flight and go inert. No terminal event is emitted;
    /// the host is tearing the engine down.
    pub fn close(&mut self) -> bool {
        self.take = None;
        self.state = EngineState::Stopped;
        true
    }

    /// Feed one block of mono samples. Blocks arriving while Stopped or
    /// Paused are ignored.
    pub fn process(&mut self, block: Arc<[f32]>) {
        match self.state {
            EngineState::Listening => self.listen_block(block),
            EngineState::Recording => self.record_block(block),
            EngineState::Stopped | EngineState::Paused => {}
        }
    }

    /// Pre-roll: detect speech onset, otherwise keep a rolling margin.
    fn listen_block(&mut self, block: Arc<[f32]>) {
        if any_above(&block, self.config.start_threshold) {
            self.state = EngineState::Recording;
            self.emit(EngineEvent::Started);
            // Re-dispatch the same block so no sample is lost at the
            // listening -> recording boundary.
            self.record_block(block);
            return;
        }

        if self.config.margin_before > 0.0 {
            if let Some(take) = self.take.as_mut() {
                take.push(block.clone(), Some(self.config.margin_before));
            }
        }
        self.emit(EngineEvent::Listening { block });
    }

    /// Commit a block to the take, then run the saturation, auto-stop, and
    /// time-limit detectors in that order.
    fn record_block(&mut self, block: Arc<[f32]>) {
        let Some(take) = self.take.as_mut() else {
            return;
        };
        take.push(block.clone(), None);
        let duration = take.duration();
        self.emit(EngineEvent::Recording {
            block: block.clone(),
            duration,
        });

        if any_above(&block, self.config.saturation_threshold) {
            self.saturated = true;
            self.emit(EngineEvent::Saturated);
            if self.config.on_saturate == SaturatePolicy::Cancel {
                self.finish(false);
                return;
            }
        }

        if self.config.auto_stop {
            let block_peak = peak(&block);
            if block_peak < self.config.stop_threshold {
                self.silence_run += block.len();
                let rate = self.config.sample_rate as f32;
                if self.silence_run as f32 >= self.config.stop_duration * rate {
                    // Keep margin_after seconds of the detected silence.
                    let trim = (self.config.stop_duration - self.config.margin_after).max(0.0);
                    if let Some(take) = self.take.as_mut() {
                        take.trim_back(trim);
                    }
                    self.finish(false);
                    return;
                }
            } else {
                self.silence_run = 0;
            }
        }

        if self.config.time_limit > 0.0 && duration >= self.config.time_limit {
            self.finish(false);
        }
    }

    /// Terminal cascade, evaluated in order: forced cancel, saturation
    /// policy, minimum duration, normal delivery. Exactly one terminal event
    /// per take; the engine always ends up Stopped.
    fn finish(&mut self, forced: bool) -> bool {
        if self.state == EngineState::Stopped {
            return false;
        }

        let take = self.take.take();
        let reason = if forced {
            Some(CancelReason::Asked)
        } else if self.saturated && self.config.on_saturate != SaturatePolicy::None {
            Some(CancelReason::Saturated)
        } else if take.as_ref().map(TakeBuffer::duration).unwrap_or(0.0) < self.config.min_duration
        {
            Some(CancelReason::TooShort)
        } else {
            None
        };

        self.state = EngineState::Stopped;
        self.silence_run = 0;

        match (reason, take) {
            (Some(reason), _) => {
                debug!(reason = reason.label(), "take canceled");
                self.emit(EngineEvent::Canceled { reason });
            }
            (None, Some(take)) => {
                let take = take.into_take();
                debug!(duration = take.duration(), "take delivered");
                self.emit(EngineEvent::Stopped { take });
            }
            // Unreachable in practice: an active state always owns a take.
            (None, None) => {
                self.emit(EngineEvent::Canceled {
                    reason: CancelReason::TooShort,
                });
            }
        }
        true
    }

    // Event delivery is fire-and-forget; a host that dropped its receiver
    // only loses events, never wedges the audio path.
    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }
}

/// Drive an engine from a flat PCM buffer, cut into `block_samples` blocks.
/// Mirrors the per-callback delivery of a live stream so scenarios can run
/// without an audio device.
pub fn feed_pcm(engine: &mut RecorderEngine, samples: &[f32], block_samples: usize) {
    let block_samples = block_samples.max(1);
    for chunk in samples.chunks(block_samples) {
        engine.process(Arc::from(chunk));
    }
}
