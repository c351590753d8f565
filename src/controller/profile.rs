use serde::{Deserialize, Serialize};
use std::fmt;

/// Vendor-neutral button identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogicalButton {
    A,
    B,
    X,
    Y,
    LBumper,
    RBumper,
    LTrigger,
    RTrigger,
    View,
    Menu,
    LAxes,
    RAxes,
    Up,
    Down,
    Left,
    Right,
    Xbox,
    DPad,
}

impl fmt::Display for LogicalButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogicalButton::A => "a",
            LogicalButton::B => "b",
            LogicalButton::X => "x",
            LogicalButton::Y => "y",
            LogicalButton::LBumper => "lBumper",
            LogicalButton::RBumper => "rBumper",
            LogicalButton::LTrigger => "lTrigger",
            LogicalButton::RTrigger => "rTrigger",
            LogicalButton::View => "view",
            LogicalButton::Menu => "menu",
            LogicalButton::LAxes => "lAxes",
            LogicalButton::RAxes => "rAxes",
            LogicalButton::Up => "up",
            LogicalButton::Down => "down",
            LogicalButton::Left => "left",
            LogicalButton::Right => "right",
            LogicalButton::Xbox => "xbox",
            LogicalButton::DPad => "dPad",
        };
        write!(f, "{}", name)
    }
}

// Analog stick identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stick {
    Left,
    Right,
}

impl Stick {
    /// Sticks in emission order
    pub const ALL: [Stick; 2] = [Stick::Left, Stick::Right];

    pub(crate) fn index(self) -> usize {
        match self {
            Stick::Left => 0,
            Stick::Right => 1,
        }
    }
}

impl fmt::Display for Stick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stick::Left => write!(f, "left"),
            Stick::Right => write!(f, "right"),
        }
    }
}

/// Known controller families, each with a static button table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceFamily {
    #[default]
    Xbox,
}

/// Raw axis indices of one stick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisPair {
    pub x: usize,
    pub y: usize,
}

/// Static mapping from raw hardware indices to logical controls
///
/// The button table order is also the order in which button events of a single
/// tick are emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    family: DeviceFamily,
    buttons: Vec<(usize, LogicalButton)>,
    sticks: [AxisPair; 2],
    analog: Vec<LogicalButton>,
}

impl DeviceProfile {
    pub fn for_family(family: DeviceFamily) -> Self {
        match family {
            DeviceFamily::Xbox => Self::xbox(),
        }
    }

    pub fn xbox() -> Self {
        use LogicalButton::*;

        let table = [
            A, B, X, Y, LBumper, RBumper, LTrigger, RTrigger, View, Menu, LAxes, RAxes, Up, Down,
            Left, Right, Xbox, DPad,
        ];

        Self {
            family: DeviceFamily::Xbox,
            buttons: table.into_iter().enumerate().collect(),
            sticks: [AxisPair { x: 0, y: 1 }, AxisPair { x: 2, y: 3 }],
            analog: vec![LTrigger, RTrigger],
        }
    }

    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    /// `(raw index, logical button)` entries in table order
    pub fn buttons(&self) -> &[(usize, LogicalButton)] {
        &self.buttons
    }

    pub fn stick_axes(&self, stick: Stick) -> AxisPair {
        self.sticks[stick.index()]
    }

    /// Analog buttons also report value changes, not only pressed/released flips
    pub fn is_analog(&self, button: LogicalButton) -> bool {
        self.analog.contains(&button)
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::xbox()
    }
}
