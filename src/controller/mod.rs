//! Controller subsystem for gamepad input handling
//!
//! Turns raw gamepad hardware state into normalized press/release/move events:
//!
//! 1. [`snapshot`] - Raw device state mapped to an immutable snapshot
//! 2. [`filter`] - Hysteresis and epsilon filters for analog readings
//! 3. [`diff`] - Snapshot diffing into change events
//! 4. [`gamepad`] - Per-device lifecycle state machine
//! 5. [`hub`] - Frame-driven poll scheduler for all devices
//! 6. [`collector`] / [`controller_handle`] - gilrs backend and lifecycle API
//!
//! # Architecture
//!
//! ```text
//! gilrs ──► Snapshot ──► Filter + Diff ──► ControllerEvent
//!           (per tick)   (vs. baseline)    (mpsc channel)
//! ```
//!
//! Polling runs once per display frame and pauses while the host lacks focus.

pub mod collector;
pub mod controller_handle;
pub mod diff;
pub mod filter;
pub mod gamepad;
pub mod hub;
pub mod profile;
pub mod snapshot;
