//! Rolling, trimmable storage for one in-flight take.
//!
//! Blocks arrive once per audio callback and are kept as shared slices
//! instead of being flattened eagerly, so the per-block cost stays bounded
//! no matter how long the take runs. Trims narrow the boundary block by
//! adjusting its sub-range; samples are only copied once, on read.

use std::collections::VecDeque;
use std::sync::Arc;

/// One appended block, narrowed to `start..end` by trims.
struct BlockSlice {
    data: Arc<[f32]>,
    start: usize,
    end: usize,
}

impl BlockSlice {
    fn new(data: Arc<[f32]>) -> Self {
        let end = data.len();
        Self {
            data,
            start: 0,
            end,
        }
    }

    fn len(&self) -> usize {
        self.end - self.start
    }

    fn as_slice(&self) -> &[f32] {
        &self.data[self.start..self.end]
    }
}

/// Append-only sequence of sample blocks with sample-exact trimming.
///
/// Owned exclusively by the engine while a take is in flight; converted into
/// a [`Take`] when the take completes.
pub struct TakeBuffer {
    sample_rate: u32,
    blocks: VecDeque<BlockSlice>,
    len: usize,
}

impl TakeBuffer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            blocks: VecDeque::new(),
            len: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn duration(&self) -> f32 {
        self.len as f32 / self.sample_rate as f32
    }

    /// Append a block. When `rolling` is set and the buffer now holds more
    /// than `rolling` seconds, the oldest excess is trimmed away immediately,
    /// keeping only the most recent window. Returns the new length.
    pub fn push(&mut self, block: Arc<[f32]>, rolling: Option<f32>) -> usize {
        self.len += block.len();
        self.blocks.push_back(BlockSlice::new(block));

        if let Some(rolling) = rolling {
            let duration = self.duration();
            if duration > rolling {
                self.trim_front(duration - rolling);
            }
        }

        self.len
    }

    /// Drop `round(duration * sample_rate)` samples from the front.
    pub fn trim_front(&mut self, duration: f32) {
        let mut remove = self.samples_for(duration);
        if remove >= self.len {
            self.clear();
            return;
        }

        self.len -= remove;
        while remove > 0 {
            let front_len = match self.blocks.front() {
                Some(block) => block.len(),
                None => break,
            };
            if remove >= front_len {
                remove -= front_len;
                self.blocks.pop_front();
            } else {
                if let Some(block) = self.blocks.front_mut() {
                    block.start += remove;
                }
                remove = 0;
            }
        }
    }

    /// Drop `round(duration * sample_rate)` samples from the back.
    pub fn trim_back(&mut self, duration: f32) {
        let mut remove = self.samples_for(duration);
        if remove >= self.len {
            self.clear();
            return;
        }

        self.len -= remove;
        while remove > 0 {
            let back_len = match self.blocks.back() {
                Some(block) => block.len(),
                None => break,
            };
            if remove >= back_len {
                remove -= back_len;
                self.blocks.pop_back();
            } else {
                if let Some(block) = self.blocks.back_mut() {
                    block.end -= remove;
                }
                remove = 0;
            }
        }
    }

    /// Flatten every block in append order. Pure read, single copy.
    pub fn samples(&self) -> Vec<f32> {
        let mut flattened = Vec::with_capacity(self.len);
        for block in &self.blocks {
            flattened.extend_from_slice(block.as_slice());
        }
        flattened
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.len = 0;
    }

    /// Hand the finished audio to the host.
    pub fn into_take(self) -> Take {
        let samples = self.samples();
        Take {
            samples,
            sample_rate: self.sample_rate,
        }
    }

    fn samples_for(&self, duration: f32) -> usize {
        (duration * self.sample_rate as f32).round().max(0.0) as usize
    }
}

/// A finished recording: flattened mono samples plus the session rate.
///
/// The engine transfers ownership inside the `Stopped` event and keeps no
/// reference afterwards.
#[derive(Debug, Clone)]
pub struct Take {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Take {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Encode as a 16-bit PCM WAV byte stream.
    pub fn to_wav(&self) -> anyhow::Result<Vec<u8>> {
        crate::wav::encode(&self.samples, self.sample_rate)
    }
}
