//! Dead-zone and threshold filtering for analog readings
//!
//! Both filters are pure functions without hidden state. The caller keeps the prior
//! discrete state and hands it back in through [`ButtonVerdict::resolve`].

use crate::controller::snapshot::StickAxes;

/// A button reading above this value counts as pressed
pub const PRESS_THRESHOLD: f32 = 0.7;

/// A button reading below this value counts as released
pub const RELEASE_THRESHOLD: f32 = 0.1;

/// Smallest difference between two analog readings that counts as a change
pub const AXIS_EPSILON: f32 = 0.01;

/// Discrete outcome of a single analog button reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonVerdict {
    Pressed,
    Released,
    /// The reading lies in the hysteresis band, the prior state stays in effect
    NoVerdict,
}

impl ButtonVerdict {
    pub fn resolve(self, prior_pressed: bool) -> bool {
        match self {
            ButtonVerdict::Pressed => true,
            ButtonVerdict::Released => false,
            ButtonVerdict::NoVerdict => prior_pressed,
        }
    }
}

pub fn button_verdict(value: f32) -> ButtonVerdict {
    if value > PRESS_THRESHOLD {
        ButtonVerdict::Pressed
    } else if value < RELEASE_THRESHOLD {
        ButtonVerdict::Released
    } else {
        ButtonVerdict::NoVerdict
    }
}

pub fn is_near_enough(a: f32, b: f32) -> bool {
    (a - b).abs() < AXIS_EPSILON
}

/// Sticks report continuous noise at rest; only deltas of at least [`AXIS_EPSILON`] move
pub fn axes_moved(previous: StickAxes, current: StickAxes) -> bool {
    !is_near_enough(previous.x, current.x) || !is_near_enough(previous.y, current.y)
}
