//! padstream - Gamepad event normalization and low-latency audio output
//!
//! The `controller` subsystem polls gamepads once per display frame and emits
//! normalized events; the `audio` subsystem moves generated samples to the output
//! device through a drop-oldest ring buffer.

pub mod audio;
pub mod config;
pub mod controller;
