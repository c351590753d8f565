use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::ring_buffer::SampleConsumer;

/// Result of rendering one host block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    Filled,
    /// Not enough buffered data; the block was zeroed
    Silence,
}

/// Block counters, readable from any thread while the callback runs
#[derive(Debug, Default)]
pub struct CallbackStats {
    filled: AtomicU64,
    silent: AtomicU64,
}

impl CallbackStats {
    pub fn filled(&self) -> u64 {
        self.filled.load(Ordering::Relaxed)
    }

    pub fn silent(&self) -> u64 {
        self.silent.load(Ordering::Relaxed)
    }

    fn record(&self, outcome: BlockOutcome) {
        match outcome {
            BlockOutcome::Filled => self.filled.fetch_add(1, Ordering::Relaxed),
            BlockOutcome::Silence => self.silent.fetch_add(1, Ordering::Relaxed),
        };
    }
}

/// Adapts the sample ring buffer to a stereo host callback
///
/// Owns the consumer half. Each render pulls exactly one block of interleaved
/// samples; an underrun turns into a silent block and leaves the buffer untouched.
#[derive(Debug)]
pub struct StereoCallback {
    consumer: SampleConsumer,
    scratch: Vec<f32>,
    stats: Arc<CallbackStats>,
}

impl StereoCallback {
    pub fn new(consumer: SampleConsumer, block_size: usize) -> Self {
        Self {
            consumer,
            scratch: vec![0.0; 2 * block_size],
            stats: Arc::new(CallbackStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<CallbackStats> {
        Arc::clone(&self.stats)
    }

    // Pulls `frames` stereo frames into the scratch buffer
    fn pull(&mut self, frames: usize) -> BlockOutcome {
        let needed = 2 * frames;
        // Only grows if the host exceeds the configured block size
        if self.scratch.len() < needed {
            self.scratch.resize(needed, 0.0);
        }

        let outcome = match self.consumer.dequeue_into(&mut self.scratch[..needed]) {
            Ok(()) => BlockOutcome::Filled,
            Err(_) => BlockOutcome::Silence,
        };
        self.stats.record(outcome);
        outcome
    }

    /// Fills `left` and `right` with one block
    ///
    /// Both slices are expected to have the same length; any excess in the longer
    /// one is zeroed.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) -> BlockOutcome {
        let frames = left.len().min(right.len());
        left[frames..].fill(0.0);
        right[frames..].fill(0.0);

        let outcome = self.pull(frames);
        match outcome {
            BlockOutcome::Filled => {
                let frames_in = self.scratch[..2 * frames].chunks_exact(2);
                for ((l, r), frame) in left.iter_mut().zip(right.iter_mut()).zip(frames_in) {
                    *l = frame[0];
                    *r = frame[1];
                }
            }
            BlockOutcome::Silence => {
                left[..frames].fill(0.0);
                right[..frames].fill(0.0);
            }
        }
        outcome
    }

    /// Fills an interleaved host buffer with `channels` samples per frame
    ///
    /// Left and right go to the first two channels, further channels get silence.
    /// A mono host receives the average of both.
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) -> BlockOutcome {
        if channels == 0 {
            out.fill(0.0);
            self.stats.record(BlockOutcome::Silence);
            return BlockOutcome::Silence;
        }

        let frames = out.len() / channels;
        let outcome = self.pull(frames);
        if outcome == BlockOutcome::Silence {
            out.fill(0.0);
            return outcome;
        }

        for (frame, stereo) in out
            .chunks_mut(channels)
            .zip(self.scratch[..2 * frames].chunks_exact(2))
        {
            let (l, r) = (stereo[0], stereo[1]);
            if channels == 1 {
                frame[0] = 0.5 * (l + r);
                continue;
            }
            frame[0] = l;
            frame[1] = r;
            frame[2..].fill(0.0);
        }
        // Trailing partial frame
        out[frames * channels..].fill(0.0);
        outcome
    }
}
