//! Snapshot diffing
//!
//! Turns two consecutive snapshots into the list of change events plus the next
//! baseline. The baseline only takes over the entries that produced an event, so a
//! button resting in the hysteresis band keeps its stored discrete state.

use serde::{Deserialize, Serialize};

use crate::controller::filter::{axes_moved, button_verdict, is_near_enough};
use crate::controller::profile::{DeviceProfile, LogicalButton, Stick};
use crate::controller::snapshot::{ButtonData, DeviceSnapshot, StickAxes};

/// Normalized input event
///
/// `Connected` and `Disconnected` come from the scheduler when a controller is
/// attached or disposed; the diff only produces the other three.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    Connected,
    Disconnected,
    Press { button: LogicalButton, data: ButtonData },
    Release { button: LogicalButton, data: ButtonData },
    Move { stick: Stick, axes: StickAxes },
}

impl InputEvent {
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, InputEvent::Connected | InputEvent::Disconnected)
    }
}

/// Result of comparing a new snapshot against the stored baseline
#[derive(Debug, Clone, PartialEq)]
pub struct Diff {
    pub events: Vec<InputEvent>,
    pub baseline: DeviceSnapshot,
}

/// First baseline of a device
///
/// Dead-band readings have no prior state to fall back to, so the raw `pressed`
/// flag decides.
pub fn seed(current: &DeviceSnapshot) -> DeviceSnapshot {
    current.map_buttons(|_, raw| ButtonData {
        pressed: button_verdict(raw.value).resolve(raw.pressed),
        ..raw
    })
}

pub fn diff(previous: &DeviceSnapshot, current: &DeviceSnapshot, profile: &DeviceProfile) -> Diff {
    let mut baseline = previous.clone();
    let mut events = Vec::new();

    // Sticks first, left before right
    for stick in Stick::ALL {
        let axes = current.axes(stick);
        if axes_moved(previous.axes(stick), axes) {
            events.push(InputEvent::Move { stick, axes });
            baseline = baseline.with_axes(stick, axes);
        }
    }

    for (button, raw) in current.buttons() {
        let stored = previous.button(button).unwrap_or_default();
        let data = ButtonData {
            pressed: button_verdict(raw.value).resolve(stored.pressed),
            touched: raw.touched,
            value: raw.value,
        };

        let changed = data.pressed != stored.pressed
            || data.touched != stored.touched
            || (profile.is_analog(button) && !is_near_enough(data.value, stored.value));
        if !changed {
            continue;
        }

        if data.pressed || data.touched {
            events.push(InputEvent::Press { button, data });
        } else {
            events.push(InputEvent::Release { button, data });
        }
        baseline = baseline.with_button(button, data);
    }

    Diff { events, baseline }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::snapshot::{RawButton, RawDeviceState};

    fn snapshot_with(axes: [f32; 4], button_values: &[(usize, f32)]) -> DeviceSnapshot {
        let mut raw = RawDeviceState {
            axes: axes.to_vec(),
            buttons: vec![RawButton::default(); 18],
        };
        for (index, value) in button_values {
            raw.buttons[*index] = RawButton {
                pressed: *value > 0.5,
                touched: false,
                value: *value,
            };
        }
        DeviceSnapshot::from_raw(&raw, &DeviceProfile::xbox())
    }

    fn button_a(value: f32) -> DeviceSnapshot {
        snapshot_with([0.0; 4], &[(0, value)])
    }

    /// Feeds `readings` through seed + diff and collects every emitted event
    fn run(readings: &[DeviceSnapshot]) -> (Vec<Vec<InputEvent>>, DeviceSnapshot) {
        let profile = DeviceProfile::xbox();
        let mut baseline = seed(&readings[0]);
        let mut per_tick = Vec::new();
        for reading in &readings[1..] {
            let step = diff(&baseline, reading, &profile);
            per_tick.push(step.events);
            baseline = step.baseline;
        }
        (per_tick, baseline)
    }

    #[test]
    fn hysteresis_suppresses_chatter() {
        let readings: Vec<_> = [0.0, 0.8, 0.75, 0.05].into_iter().map(button_a).collect();

        let (ticks, _) = run(&readings);

        assert_eq!(ticks.len(), 3);
        assert!(matches!(
            ticks[0].as_slice(),
            [InputEvent::Press { button: LogicalButton::A, data }] if data.pressed
        ));
        assert!(ticks[1].is_empty());
        assert!(matches!(
            ticks[2].as_slice(),
            [InputEvent::Release { button: LogicalButton::A, data }] if !data.pressed
        ));
    }

    #[test]
    fn dead_band_keeps_pressed_state() {
        let mut value = 0.1;
        while value <= 0.7 {
            let (ticks, baseline) = run(&[button_a(0.0), button_a(1.0), button_a(value)]);

            assert!(ticks[1].is_empty(), "value {} emitted {:?}", value, ticks[1]);
            assert_eq!(baseline.button(LogicalButton::A).map(|b| b.pressed), Some(true));
            value += 0.05;
        }
    }

    #[test]
    fn dead_band_keeps_released_state() {
        let (ticks, baseline) = run(&[button_a(0.0), button_a(0.5)]);

        assert!(ticks[0].is_empty());
        assert_eq!(baseline.button(LogicalButton::A).map(|b| b.pressed), Some(false));
    }

    #[test]
    fn each_stick_step_past_epsilon_moves() {
        let readings = [
            snapshot_with([0.0, 0.0, 0.0, 0.0], &[]),
            snapshot_with([0.02, 0.0, 0.0, 0.0], &[]),
            snapshot_with([0.02, 0.02, 0.0, 0.0], &[]),
        ];

        let (ticks, _) = run(&readings);

        assert_eq!(
            ticks[0],
            vec![InputEvent::Move {
                stick: Stick::Left,
                axes: StickAxes { x: 0.02, y: 0.0 }
            }]
        );
        assert_eq!(
            ticks[1],
            vec![InputEvent::Move {
                stick: Stick::Left,
                axes: StickAxes { x: 0.02, y: 0.02 }
            }]
        );
    }

    #[test]
    fn stick_noise_below_epsilon_is_ignored() {
        let (ticks, baseline) = run(&[
            snapshot_with([0.0; 4], &[]),
            snapshot_with([0.009, -0.009, 0.005, 0.0], &[]),
        ]);

        assert!(ticks[0].is_empty());
        assert_eq!(baseline.axes(Stick::Left), StickAxes::default());
    }

    #[test]
    fn slow_drift_is_measured_against_stored_value() {
        // Each step stays below epsilon, the stored value does not follow it
        let readings = [
            snapshot_with([0.0; 4], &[]),
            snapshot_with([0.006, 0.0, 0.0, 0.0], &[]),
            snapshot_with([0.012, 0.0, 0.0, 0.0], &[]),
        ];

        let (ticks, _) = run(&readings);

        assert!(ticks[0].is_empty());
        assert_eq!(ticks[1].len(), 1);
    }

    #[test]
    fn only_the_moved_stick_is_replaced() {
        let profile = DeviceProfile::xbox();
        let previous = seed(&snapshot_with([0.0; 4], &[]));
        let current = snapshot_with([0.5, 0.5, 0.005, 0.0], &[]);

        let step = diff(&previous, &current, &profile);

        assert_eq!(step.baseline.axes(Stick::Left), StickAxes { x: 0.5, y: 0.5 });
        assert_eq!(step.baseline.axes(Stick::Right), StickAxes::default());
    }

    #[test]
    fn sticks_precede_buttons_in_table_order() {
        let profile = DeviceProfile::xbox();
        let previous = seed(&snapshot_with([0.0; 4], &[]));
        let current = snapshot_with([0.0, 0.0, 0.3, 0.0], &[(9, 1.0), (0, 1.0), (3, 1.0)]);

        let step = diff(&previous, &current, &profile);

        let order: Vec<String> = step
            .events
            .iter()
            .map(|event| match event {
                InputEvent::Move { stick, .. } => format!("move:{}", stick),
                InputEvent::Press { button, .. } => format!("press:{}", button),
                InputEvent::Release { button, .. } => format!("release:{}", button),
                other => format!("{:?}", other),
            })
            .collect();
        assert_eq!(order, vec!["move:right", "press:a", "press:y", "press:menu"]);
    }

    #[test]
    fn analog_trigger_reports_value_changes() {
        let profile = DeviceProfile::xbox();
        let previous = seed(&snapshot_with([0.0; 4], &[(6, 0.8)]));
        let current = snapshot_with([0.0; 4], &[(6, 0.5)]);

        let step = diff(&previous, &current, &profile);

        assert!(matches!(
            step.events.as_slice(),
            [InputEvent::Press { button: LogicalButton::LTrigger, data }]
                if data.pressed && data.value == 0.5
        ));
        assert_eq!(
            step.baseline.button(LogicalButton::LTrigger).map(|b| b.pressed),
            Some(true)
        );
    }

    #[test]
    fn touch_alone_counts_as_press() {
        let profile = DeviceProfile::xbox();
        let previous = seed(&snapshot_with([0.0; 4], &[]));
        let mut raw = RawDeviceState {
            axes: vec![0.0; 4],
            buttons: vec![RawButton::default(); 18],
        };
        raw.buttons[2].touched = true;
        let current = DeviceSnapshot::from_raw(&raw, &profile);

        let step = diff(&previous, &current, &profile);

        assert!(matches!(
            step.events.as_slice(),
            [InputEvent::Press { button: LogicalButton::X, data }] if data.touched && !data.pressed
        ));
    }

    #[test]
    fn seed_resolves_dead_band_from_raw_flag() {
        let mut raw = RawDeviceState {
            axes: vec![0.0; 4],
            buttons: vec![RawButton::default(); 18],
        };
        raw.buttons[0] = RawButton {
            pressed: true,
            touched: false,
            value: 0.4,
        };
        raw.buttons[1] = RawButton {
            pressed: true,
            touched: false,
            value: 0.0,
        };

        let baseline = seed(&DeviceSnapshot::from_raw(&raw, &DeviceProfile::xbox()));

        assert_eq!(baseline.button(LogicalButton::A).map(|b| b.pressed), Some(true));
        assert_eq!(baseline.button(LogicalButton::B).map(|b| b.pressed), Some(false));
    }
}
