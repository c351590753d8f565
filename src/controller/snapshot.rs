use serde::{Deserialize, Serialize};
use std::fmt;

use crate::controller::controller_handle::InputError;
use crate::controller::profile::{DeviceProfile, LogicalButton, Stick};

/// Stable identifier of a physical device for the lifetime of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pad#{}", self.0)
    }
}

// Stick position, both components in [-1, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StickAxes {
    pub x: f32,
    pub y: f32,
}

// Per-button reading, value in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ButtonData {
    pub pressed: bool,
    pub touched: bool,
    pub value: f32,
}

/// Button as reported by the hardware, addressed by raw index
pub type RawButton = ButtonData;

/// Unmapped hardware state of one device at one instant
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawDeviceState {
    pub axes: Vec<f32>,
    pub buttons: Vec<RawButton>,
}

/// Device connect/disconnect notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected(DeviceId),
    Disconnected(DeviceId),
}

/// Source of raw device readings and hot-plug notifications
///
/// Implemented by the gilrs collector for real hardware and by in-memory fakes in tests.
pub trait GamepadSource {
    /// Next pending connect/disconnect notification, if any
    fn next_connection(&mut self) -> Option<ConnectionEvent>;

    /// Current raw state, or `None` once the device is no longer enumerable
    fn read_raw(&self, device: DeviceId) -> Option<RawDeviceState>;
}

/// Immutable capture of all mapped axes and buttons of one device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    axes: [StickAxes; 2],
    buttons: Vec<(LogicalButton, ButtonData)>,
}

impl DeviceSnapshot {
    /// Maps a raw reading through the profile table
    ///
    /// Raw indices the profile doesn't know are skipped; profile entries the
    /// hardware doesn't report get a released default.
    pub fn from_raw(raw: &RawDeviceState, profile: &DeviceProfile) -> Self {
        let axis = |index: usize| raw.axes.get(index).copied().unwrap_or(0.0);

        let mut axes = [StickAxes::default(); 2];
        for stick in Stick::ALL {
            let pair = profile.stick_axes(stick);
            axes[stick.index()] = StickAxes {
                x: axis(pair.x),
                y: axis(pair.y),
            };
        }

        let buttons = profile
            .buttons()
            .iter()
            .map(|(index, button)| (*button, raw.buttons.get(*index).copied().unwrap_or_default()))
            .collect();

        Self { axes, buttons }
    }

    pub fn axes(&self, stick: Stick) -> StickAxes {
        self.axes[stick.index()]
    }

    pub fn button(&self, button: LogicalButton) -> Option<ButtonData> {
        self.buttons
            .iter()
            .find(|(name, _)| *name == button)
            .map(|(_, data)| *data)
    }

    /// Buttons in profile table order
    pub fn buttons(&self) -> impl Iterator<Item = (LogicalButton, ButtonData)> + '_ {
        self.buttons.iter().copied()
    }

    /// Copy of this snapshot with one stick replaced
    pub fn with_axes(&self, stick: Stick, axes: StickAxes) -> Self {
        let mut next = self.clone();
        next.axes[stick.index()] = axes;
        next
    }

    /// Copy of this snapshot with one button entry replaced
    pub fn with_button(&self, button: LogicalButton, data: ButtonData) -> Self {
        let mut next = self.clone();
        if let Some(entry) = next.buttons.iter_mut().find(|(name, _)| *name == button) {
            entry.1 = data;
        }
        next
    }

    pub(crate) fn map_buttons(&self, f: impl Fn(LogicalButton, ButtonData) -> ButtonData) -> Self {
        Self {
            axes: self.axes,
            buttons: self
                .buttons
                .iter()
                .map(|(name, data)| (*name, f(*name, *data)))
                .collect(),
        }
    }
}

/// Reads the current snapshot of `device`
///
/// A device that disappeared between polls yields [`InputError::DeviceUnavailable`];
/// the disconnect notification takes care of tearing the controller down.
pub fn read_snapshot<S: GamepadSource + ?Sized>(
    source: &S,
    device: DeviceId,
    profile: &DeviceProfile,
) -> Result<DeviceSnapshot, InputError> {
    source
        .read_raw(device)
        .map(|raw| DeviceSnapshot::from_raw(&raw, profile))
        .ok_or(InputError::DeviceUnavailable(device))
}
