use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::AudioError;

/// Overrun and underrun counters of one ring buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RingStats {
    /// Samples discarded by drop-oldest
    pub overruns: u64,
    /// Reads rejected for lack of data
    pub underruns: u64,
}

// Cursors are monotonic sample counts; slots are addressed modulo capacity.
// `write` is only stored by the producer. `read` is advanced by the consumer and,
// when the buffer is full, by the producer dropping the oldest sample.
#[derive(Debug)]
struct Shared {
    slots: Box<[AtomicU32]>,
    write: AtomicUsize,
    read: AtomicUsize,
    overruns: AtomicU64,
    underruns: AtomicU64,
}

impl Shared {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn available(&self) -> usize {
        let read = self.read.load(Ordering::Acquire);
        self.write.load(Ordering::Acquire).saturating_sub(read)
    }

    fn stats(&self) -> RingStats {
        RingStats {
            overruns: self.overruns.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
        }
    }
}

/// Writing half of a sample ring buffer
///
/// Not `Clone`: there is exactly one producer per buffer.
#[derive(Debug)]
pub struct SampleProducer {
    shared: Arc<Shared>,
}

/// Reading half of a sample ring buffer, owned by the audio callback
#[derive(Debug)]
pub struct SampleConsumer {
    shared: Arc<Shared>,
}

/// Creates a buffer holding up to `capacity` samples
///
/// Stereo data is interleaved, so a capacity of `2 * n` holds `n` frames.
pub fn ring_buffer(capacity: usize) -> Result<(SampleProducer, SampleConsumer), AudioError> {
    if capacity == 0 {
        return Err(AudioError::InvalidCapacity(capacity));
    }

    let slots = (0..capacity).map(|_| AtomicU32::new(0)).collect();
    let shared = Arc::new(Shared {
        slots,
        write: AtomicUsize::new(0),
        read: AtomicUsize::new(0),
        overruns: AtomicU64::new(0),
        underruns: AtomicU64::new(0),
    });

    Ok((
        SampleProducer {
            shared: Arc::clone(&shared),
        },
        SampleConsumer { shared },
    ))
}

impl SampleProducer {
    /// Appends one sample; returns `true` if the oldest sample had to be dropped
    pub fn push(&mut self, sample: f32) -> bool {
        let shared = &*self.shared;
        let write = shared.write.load(Ordering::Relaxed);
        let mut dropped = false;

        loop {
            let read = shared.read.load(Ordering::Acquire);
            if write - read < shared.capacity() {
                break;
            }
            // Full. A failed exchange means the consumer just freed space.
            if shared
                .read
                .compare_exchange(read, read + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                shared.overruns.fetch_add(1, Ordering::Relaxed);
                dropped = true;
                break;
            }
        }

        shared.slots[write % shared.capacity()].store(sample.to_bits(), Ordering::Relaxed);
        shared.write.store(write + 1, Ordering::Release);
        dropped
    }

    /// Appends all samples in order; returns how many old samples were dropped
    pub fn push_slice(&mut self, samples: &[f32]) -> usize {
        samples.iter().filter(|&&sample| self.push(sample)).count()
    }

    pub fn available(&self) -> usize {
        self.shared.available()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    pub fn stats(&self) -> RingStats {
        self.shared.stats()
    }
}

impl SampleConsumer {
    /// Fills `out` with the oldest `out.len()` samples
    ///
    /// All or nothing: with fewer samples buffered this fails with
    /// [`AudioError::Underrun`] and the buffer is left untouched. Never allocates.
    pub fn dequeue_into(&mut self, out: &mut [f32]) -> Result<(), AudioError> {
        let shared = &*self.shared;
        let requested = out.len();

        loop {
            let read = shared.read.load(Ordering::Acquire);
            let write = shared.write.load(Ordering::Acquire);
            let available = write.saturating_sub(read);

            if available < requested {
                shared.underruns.fetch_add(1, Ordering::Relaxed);
                return Err(AudioError::Underrun {
                    requested,
                    available,
                });
            }

            for (offset, sample) in out.iter_mut().enumerate() {
                let bits = shared.slots[(read + offset) % shared.capacity()].load(Ordering::Relaxed);
                *sample = f32::from_bits(bits);
            }

            // The producer may have dropped (and overwritten) samples during the copy
            if shared
                .read
                .compare_exchange(read, read + requested, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    pub fn dequeue_batch(&mut self, n: usize) -> Result<Vec<f32>, AudioError> {
        let mut batch = vec![0.0; n];
        self.dequeue_into(&mut batch)?;
        Ok(batch)
    }

    pub fn available(&self) -> usize {
        self.shared.available()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    pub fn stats(&self) -> RingStats {
        self.shared.stats()
    }
}
