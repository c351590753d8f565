//! Real-time audio path
//!
//! A producer (the emulation core, here a test tone) pushes interleaved stereo
//! samples into a fixed-capacity ring buffer; the host audio callback drains one
//! block per invocation and splits it into left/right channels.
//!
//! ```text
//! ToneGenerator ──push_slice──► RingBuffer ──dequeue──► StereoCallback ──► cpal
//!  (frame task)                 (lock-free)             (audio thread)
//! ```
//!
//! The callback side never allocates, locks or logs. A shortfall becomes a silent
//! block; a full buffer drops its oldest samples.

pub mod callback;
pub mod output;
pub mod ring_buffer;
pub mod tone;

pub use callback::{BlockOutcome, CallbackStats, StereoCallback};
pub use output::AudioOutput;
pub use ring_buffer::{ring_buffer, RingStats, SampleConsumer, SampleProducer};
pub use tone::ToneGenerator;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum AudioError {
    /// Fewer samples buffered than a read asked for; nothing was consumed
    #[error("Buffer underrun: requested {requested} samples, {available} available")]
    Underrun { requested: usize, available: usize },

    #[error("Invalid ring buffer capacity: {0}")]
    InvalidCapacity(usize),

    #[error("No audio output device available")]
    NoOutputDevice,

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Unsupported stream format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio stream error: {0}")]
    Stream(String),
}
