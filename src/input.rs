//! Microphone host adapter: turns a cpal input stream into the engine's
//! mono block feed.
//!
//! The engine never touches the device. This module enumerates inputs,
//! normalizes the sample format, downmixes to mono, and pushes fixed-size
//! blocks into the worker's bounded channel without ever blocking the audio
//! callback.

use crossbeam_channel::{Sender, TrySendError};
use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Block size handed to the engine, in samples. Matches the granularity of
/// a typical audio-worklet callback.
pub const DEFAULT_BLOCK_SAMPLES: usize = 128;

/// Downmix interleaved multi-channel input to mono while applying the
/// format converter, so the engine always sees one channel of f32.
fn append_downmixed_samples<T, F>(buf: &mut Vec<f32>, data: &[T], channels: usize, mut convert: F)
where
    T: Copy,
    F: FnMut(T) -> f32,
{
    if channels <= 1 {
        buf.extend(data.iter().copied().map(&mut convert));
        return;
    }

    // Average each interleaved frame.
    let mut acc = 0.0f32;
    let mut count = 0usize;
    for sample in data.iter().copied() {
        acc += convert(sample);
        count += 1;
        if count == channels {
            buf.push(acc / channels as f32);
            acc = 0.0;
            count = 0;
        }
    }
    if count > 0 {
        buf.push(acc / count as f32);
    }
}

/// Accumulates downmixed samples and emits fixed-size blocks. Runs inside
/// the audio callback: `try_send` only, drops are counted, never blocks.
struct BlockDispatcher {
    block_samples: usize,
    pending: Vec<f32>,
    scratch: Vec<f32>,
    sender: Sender<Arc<[f32]>>,
    dropped: Arc<AtomicUsize>,
}

impl BlockDispatcher {
    fn new(block_samples: usize, sender: Sender<Arc<[f32]>>, dropped: Arc<AtomicUsize>) -> Self {
        Self {
            block_samples: block_samples.max(1),
            pending: Vec::with_capacity(block_samples),
            scratch: Vec::new(),
            sender,
            dropped,
        }
    }

    fn push<T, F>(&mut self, data: &[T], channels: usize, convert: F)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        self.scratch.clear();
        append_downmixed_samples(&mut self.scratch, data, channels, convert);
        self.pending.extend_from_slice(&self.scratch);

        while self.pending.len() >= self.block_samples {
            let block: Arc<[f32]> = self
                .pending
                .drain(..self.block_samples)
                .collect::<Vec<f32>>()
                .into();
            if let Err(err) = self.sender.try_send(block) {
                match err {
                    TrySendError::Full(_) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    TrySendError::Disconnected(_) => break,
                }
            }
        }
    }
}

/// Audio input device wrapper.
pub struct MicSource {
    device: cpal::Device,
}

/// A live input stream feeding an engine worker. Capture stops when this is
/// dropped; `cpal::Stream` is not `Send`, so it stays on the opening thread.
pub struct MicStream {
    stream: cpal::Stream,
    sample_rate: u32,
    dropped: Arc<AtomicUsize>,
}

impl MicStream {
    /// Session sample rate the host must hand to the engine configuration.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Blocks dropped because the worker channel was full.
    pub fn dropped_blocks(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn pause(&self) -> Result<()> {
        self.stream.pause().context("failed to pause input stream")
    }
}

impl MicSource {
    /// List microphone names so a host can expose a device selector.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Open a source, optionally forcing a specific device by name.
    pub fn open(preferred_device: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => {
                let mut devices = host.input_devices().context("no input devices available")?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| anyhow!("input device '{name}' not found"))?
            }
            None => host
                .default_input_device()
                .context("no default input device available")?,
        };
        Ok(Self { device })
    }

    /// Name of the active input device.
    pub fn name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }

    /// Native sample rate of the device's default input configuration.
    pub fn sample_rate(&self) -> Result<u32> {
        let config = self
            .device
            .default_input_config()
            .context("failed to query input configuration")?;
        Ok(config.sample_rate().0)
    }

    /// Start capturing: one mono block of `block_samples` samples is pushed
    /// into `sender` per filled window, at the device's native rate.
    pub fn stream_blocks(
        &self,
        sender: Sender<Arc<[f32]>>,
        block_samples: usize,
    ) -> Result<MicStream> {
        let default_config = self
            .device
            .default_input_config()
            .context("failed to query input configuration")?;
        let format = default_config.sample_format();
        let device_config: StreamConfig = default_config.into();
        let sample_rate = device_config.sample_rate.0;
        let channels = usize::from(device_config.channels.max(1));

        let dropped = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(Mutex::new(BlockDispatcher::new(
            block_samples,
            sender,
            dropped.clone(),
        )));

        let err_fn = |err| warn!(error = %err, "audio stream error");
        let stream = match format {
            SampleFormat::F32 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[f32], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| sample);
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::I16 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[i16], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| sample as f32 / 32_768.0);
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::U16 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[u16], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| {
                                (sample as f32 - 32_768.0) / 32_768.0
                            });
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            other => return Err(anyhow!("unsupported sample format: {other:?}")),
        };

        stream.play().context("failed to start input stream")?;

        Ok(MicStream {
            stream,
            sample_rate,
            dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn downmixes_multi_channel_audio() {
        let mut buf = Vec::new();
        let samples = [1.0f32, -1.0, 0.5, 0.5];
        append_downmixed_samples(&mut buf, &samples, 2, |sample| sample);
        assert_eq!(buf, vec![0.0, 0.5]);
    }

    #[test]
    fn preserves_single_channel_audio() {
        let mut buf = Vec::new();
        let samples = [0.1f32, 0.2, 0.3];
        append_downmixed_samples(&mut buf, &samples, 1, |sample| sample);
        assert_eq!(buf, samples);
    }

    #[test]
    fn dispatcher_emits_fixed_size_blocks() {
        let (tx, rx) = bounded(8);
        let dropped = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = BlockDispatcher::new(4, tx, dropped.clone());

        dispatcher.push(&[0.1f32; 6], 1, |s| s);
        assert_eq!(rx.try_recv().unwrap().len(), 4);
        assert!(rx.try_recv().is_err(), "partial window stays pending");

        dispatcher.push(&[0.1f32; 2], 1, |s| s);
        assert_eq!(rx.try_recv().unwrap().len(), 4);
        assert_eq!(dropped.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn dispatcher_counts_drops_when_channel_full() {
        let (tx, rx) = bounded(1);
        let dropped = Arc::new(AtomicUsize::new(0));
        let mut dispatcher = BlockDispatcher::new(2, tx, dropped.clone());

        dispatcher.push(&[0.1f32; 8], 1, |s| s);
        assert_eq!(dropped.load(Ordering::Relaxed), 3);
        assert_eq!(rx.try_recv().unwrap().len(), 2);
    }
}
