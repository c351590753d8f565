use chrono::{DateTime, Local};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::controller_handle::InputError;
use crate::controller::diff::{diff, seed, InputEvent};
use crate::controller::profile::DeviceProfile;
use crate::controller::snapshot::{DeviceId, DeviceSnapshot};

/// Event emitted by one attached controller
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerEvent {
    pub device: DeviceId,
    pub event: InputEvent,
    pub timestamp: DateTime<Local>,
}

/// Registration of a controller in the poll schedule
///
/// Child of the scheduler's root token, so shutting the scheduler down cancels every
/// registration at once.
#[derive(Debug, Clone)]
pub struct PollHandle {
    token: CancellationToken,
}

impl PollHandle {
    pub fn new(schedule: &CancellationToken) -> Self {
        Self {
            token: schedule.child_token(),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug, Clone)]
pub enum ControllerState {
    Unattached,
    Attached {
        poll: PollHandle,
        previous: Option<DeviceSnapshot>,
    },
    Disposed,
}

/// What a single poll did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Not attached, disposed or unscheduled; nothing read
    Skipped,
    /// First reading stored as baseline
    Seeded,
    /// `emitted` events were delivered, `dropped` were lost to a full channel
    Diffed { emitted: usize, dropped: usize },
    /// Device not enumerable anymore, waiting for the disconnect notification
    Unavailable,
}

/// Per-device input diff engine
#[derive(Debug)]
pub struct GamepadController {
    device: DeviceId,
    profile: Arc<DeviceProfile>,
    state: ControllerState,
    events: mpsc::Sender<ControllerEvent>,
}

impl GamepadController {
    pub fn new(
        device: DeviceId,
        profile: Arc<DeviceProfile>,
        events: mpsc::Sender<ControllerEvent>,
    ) -> Self {
        Self {
            device,
            profile,
            state: ControllerState::Unattached,
            events,
        }
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self.state, ControllerState::Disposed)
    }

    pub fn has_baseline(&self) -> bool {
        matches!(
            self.state,
            ControllerState::Attached {
                previous: Some(_),
                ..
            }
        )
    }

    pub fn attach(&mut self, poll: PollHandle) -> Result<(), InputError> {
        match self.state {
            ControllerState::Unattached => {
                info!("Attaching controller {}", self.device);
                self.state = ControllerState::Attached {
                    poll,
                    previous: None,
                };
                Ok(())
            }
            ControllerState::Attached { .. } => Err(InputError::InvalidTransition(format!(
                "controller {} is already attached",
                self.device
            ))),
            ControllerState::Disposed => Err(InputError::InvalidTransition(format!(
                "controller {} is disposed",
                self.device
            ))),
        }
    }

    /// Advances the controller by one tick
    pub fn poll(&mut self, reading: Result<DeviceSnapshot, InputError>) -> PollOutcome {
        let ControllerState::Attached { poll, previous } = &mut self.state else {
            return PollOutcome::Skipped;
        };
        if poll.is_cancelled() {
            return PollOutcome::Skipped;
        }

        let current = match reading {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!("Poll of {} found no device: {}", self.device, e);
                return PollOutcome::Unavailable;
            }
        };

        let Some(baseline) = previous.take() else {
            debug!("Seeding baseline for {}", self.device);
            *previous = Some(seed(&current));
            return PollOutcome::Seeded;
        };

        let step = diff(&baseline, &current, &self.profile);
        *previous = Some(step.baseline);

        let timestamp = Local::now();
        let mut emitted = 0;
        let mut dropped = 0;
        for event in step.events {
            debug!("{} -> {:?}", self.device, event);
            let event = ControllerEvent {
                device: self.device,
                event,
                timestamp,
            };
            match self.events.try_send(event) {
                Ok(()) => emitted += 1,
                Err(e) => {
                    let e = InputError::ChannelError(e.to_string());
                    warn!("Dropping event of {}: {}", self.device, e);
                    dropped += 1;
                }
            }
        }

        PollOutcome::Diffed { emitted, dropped }
    }

    /// Cancels the poll registration and enters the terminal state
    pub fn dispose(&mut self) {
        if let ControllerState::Attached { poll, .. } = &self.state {
            poll.cancel();
        }
        if !self.is_disposed() {
            info!("Disposing controller {}", self.device);
        }
        self.state = ControllerState::Disposed;
    }
}

impl Drop for GamepadController {
    fn drop(&mut self) {
        if let ControllerState::Attached { poll, .. } = &self.state {
            poll.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::profile::{LogicalButton, Stick};
    use crate::controller::snapshot::{RawButton, RawDeviceState};

    fn reading(axes: [f32; 4], a_value: f32) -> Result<DeviceSnapshot, InputError> {
        let mut raw = RawDeviceState {
            axes: axes.to_vec(),
            buttons: vec![RawButton::default(); 18],
        };
        raw.buttons[0] = RawButton {
            pressed: a_value > 0.5,
            touched: false,
            value: a_value,
        };
        Ok(DeviceSnapshot::from_raw(&raw, &DeviceProfile::xbox()))
    }

    fn attached() -> (GamepadController, mpsc::Receiver<ControllerEvent>, CancellationToken) {
        let (tx, rx) = mpsc::channel(64);
        let schedule = CancellationToken::new();
        let mut controller = GamepadController::new(DeviceId(1), Arc::new(DeviceProfile::xbox()), tx);
        controller
            .attach(PollHandle::new(&schedule))
            .expect("fresh controller attaches");
        (controller, rx, schedule)
    }

    #[test]
    fn first_poll_seeds_without_events() {
        let (mut controller, mut rx, _schedule) = attached();

        // Stick deflected and button held from the start
        let outcome = controller.poll(reading([0.9, -0.9, 0.3, 0.3], 1.0));

        assert_eq!(outcome, PollOutcome::Seeded);
        assert!(controller.has_baseline());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn later_polls_emit_changes() {
        let (mut controller, mut rx, _schedule) = attached();
        controller.poll(reading([0.0; 4], 0.0));

        let outcome = controller.poll(reading([0.5, 0.0, 0.0, 0.0], 1.0));

        assert_eq!(outcome, PollOutcome::Diffed { emitted: 2, dropped: 0 });
        let first = rx.try_recv().expect("move event");
        assert_eq!(first.device, DeviceId(1));
        assert!(matches!(first.event, InputEvent::Move { stick: Stick::Left, .. }));
        let second = rx.try_recv().expect("press event");
        assert!(matches!(
            second.event,
            InputEvent::Press {
                button: LogicalButton::A,
                ..
            }
        ));
    }

    #[test]
    fn unattached_controller_skips() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut controller = GamepadController::new(DeviceId(2), Arc::new(DeviceProfile::xbox()), tx);

        assert_eq!(controller.poll(reading([0.0; 4], 1.0)), PollOutcome::Skipped);
        assert!(!controller.has_baseline());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unavailable_device_keeps_baseline() {
        let (mut controller, mut rx, _schedule) = attached();
        controller.poll(reading([0.0; 4], 0.0));

        let outcome = controller.poll(Err(InputError::DeviceUnavailable(DeviceId(1))));

        assert_eq!(outcome, PollOutcome::Unavailable);
        assert!(controller.has_baseline());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn disposed_controller_never_emits() {
        let (mut controller, mut rx, _schedule) = attached();
        controller.poll(reading([0.0; 4], 0.0));

        controller.dispose();

        assert_eq!(controller.poll(reading([1.0; 4], 1.0)), PollOutcome::Skipped);
        assert!(controller.is_disposed());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dispose_cancels_poll_handle() {
        let (tx, _rx) = mpsc::channel(8);
        let schedule = CancellationToken::new();
        let poll = PollHandle::new(&schedule);
        let observer = poll.clone();
        let mut controller = GamepadController::new(DeviceId(4), Arc::new(DeviceProfile::xbox()), tx);
        controller.attach(poll).expect("attach");

        controller.dispose();

        assert!(observer.is_cancelled());
        assert!(!schedule.is_cancelled());
    }

    #[test]
    fn cancelled_schedule_stops_polling() {
        let (mut controller, mut rx, schedule) = attached();
        controller.poll(reading([0.0; 4], 0.0));

        schedule.cancel();

        assert_eq!(controller.poll(reading([1.0; 4], 1.0)), PollOutcome::Skipped);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn disposed_controller_cannot_reattach() {
        let (mut controller, _rx, schedule) = attached();
        controller.dispose();

        let result = controller.attach(PollHandle::new(&schedule));

        assert!(matches!(result, Err(InputError::InvalidTransition(_))));
    }

    #[test]
    fn full_channel_drops_without_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let schedule = CancellationToken::new();
        let mut controller = GamepadController::new(DeviceId(5), Arc::new(DeviceProfile::xbox()), tx);
        controller.attach(PollHandle::new(&schedule)).expect("attach");
        controller.poll(reading([0.0; 4], 0.0));

        let outcome = controller.poll(reading([0.5, 0.5, 0.5, 0.5], 1.0));

        // Two sticks and one button changed, only the first event fits
        assert_eq!(outcome, PollOutcome::Diffed { emitted: 1, dropped: 2 });
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
