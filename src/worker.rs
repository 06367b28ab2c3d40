//! Channel plumbing between a control context and the block-processing loop.
//!
//! One worker thread owns the engine. Blocks arrive over a bounded channel
//! fed by the audio callback; commands arrive over a separate unbounded
//! channel and are all drained before the next block is touched, so a
//! command is never applied partway through a block and `Cancel` always
//! beats any in-flight auto-stop bookkeeping.

use crate::config::{ConfigPatch, EngineConfig};
use crate::engine::RecorderEngine;
use crate::protocol::{Command, EngineEvent};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Default capacity of the block channel. At typical callback sizes this is
/// a comfortable buffer without letting latency grow unbounded.
pub const DEFAULT_BLOCK_CAPACITY: usize = 64;

/// How long the worker waits for a block before rechecking for commands.
const COMMAND_POLL: Duration = Duration::from_millis(20);

/// Control-side handle to a running engine worker.
///
/// Cloneable; every clone feeds the same engine. Command submission is
/// fire-and-forget: a command sent after `close` is silently dropped.
#[derive(Clone)]
pub struct EngineHandle {
    commands: Sender<Command>,
    blocks: Sender<Arc<[f32]>>,
}

impl EngineHandle {
    pub fn start(&self) {
        self.send(Command::Start);
    }

    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    pub fn cancel(&self) {
        self.send(Command::Cancel);
    }

    pub fn toggle(&self) {
        self.send(Command::Toggle);
    }

    pub fn set_config(&self, patch: ConfigPatch) {
        self.send(Command::SetConfig(patch));
    }

    pub fn close(&self) {
        self.send(Command::Close);
    }

    pub fn send(&self, command: Command) {
        let _ = self.commands.send(command);
    }

    /// Submit one audio block. Returns false when the worker is saturated
    /// and the block was dropped; the audio callback must never block here.
    pub fn push_block(&self, block: Arc<[f32]>) -> bool {
        self.blocks.try_send(block).is_ok()
    }

    /// Sender half of the block channel, for producers that want to hold it
    /// directly (the microphone dispatcher).
    pub fn block_sender(&self) -> Sender<Arc<[f32]>> {
        self.blocks.clone()
    }
}

/// A spawned engine worker: the control handle, the event stream, and the
/// join handle for teardown.
pub struct EngineWorker {
    pub handle: EngineHandle,
    pub events: Receiver<EngineEvent>,
    pub thread: thread::JoinHandle<()>,
}

impl EngineWorker {
    /// Send `Close` and wait for the worker to exit.
    pub fn shutdown(self) {
        self.handle.close();
        let _ = self.thread.join();
    }
}

/// Spawn a worker thread owning a fresh engine with `config`.
pub fn spawn(config: EngineConfig) -> EngineWorker {
    spawn_with_capacity(config, DEFAULT_BLOCK_CAPACITY)
}

/// Spawn with an explicit block-channel capacity.
pub fn spawn_with_capacity(config: EngineConfig, block_capacity: usize) -> EngineWorker {
    let (command_tx, command_rx) = unbounded::<Command>();
    let (block_tx, block_rx) = bounded::<Arc<[f32]>>(block_capacity.max(1));
    let (event_tx, event_rx) = unbounded::<EngineEvent>();

    let thread = thread::Builder::new()
        .name("voicegate-engine".into())
        .spawn(move || {
            let engine = RecorderEngine::new(config, event_tx);
            run(engine, command_rx, block_rx);
        })
        // Thread names are best-effort; spawn itself only fails when the OS
        // is out of resources, which is fatal for a capture session anyway.
        .unwrap_or_else(|err| panic!("failed to spawn engine worker: {err}"));

    EngineWorker {
        handle: EngineHandle {
            commands: command_tx,
            blocks: block_tx,
        },
        events: event_rx,
        thread,
    }
}

/// The single-consumer processing loop.
fn run(mut engine: RecorderEngine, commands: Receiver<Command>, blocks: Receiver<Arc<[f32]>>) {
    loop {
        // Apply every pending command before the next block.
        loop {
            match commands.try_recv() {
                Ok(Command::Close) => {
                    engine.close();
                    debug!("engine worker closed");
                    return;
                }
                Ok(command) => {
                    engine.apply(command);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    engine.close();
                    return;
                }
            }
        }

        match blocks.recv_timeout(COMMAND_POLL) {
            Ok(block) => engine.process(block),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                engine.close();
                debug!("block channel disconnected, engine worker exiting");
                return;
            }
        }
    }
}
