use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use statum::{machine, state};
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::InputSettings;
use crate::controller::gamepad::ControllerEvent;
use crate::controller::hub::{GamepadHub, HubCommand};
use crate::controller::profile::DeviceProfile;
use crate::controller::snapshot::{
    ConnectionEvent, DeviceId, GamepadSource, RawButton, RawDeviceState,
};

// Axes in standard gamepad order: left x/y, right x/y
const STANDARD_AXES: [Axis; 4] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::RightStickX,
    Axis::RightStickY,
];

// Buttons in standard gamepad index order
const STANDARD_BUTTONS: [Button; 17] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
    Button::Mode,
];

// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize collector: {0}")]
    InitializationError(String),
}

/// gilrs-backed device source
///
/// gilrs handles are only valid while the pad is connected, so devices are
/// re-located by id on every read.
#[derive(Debug)]
pub struct GilrsSource {
    gilrs: Gilrs,
    known: HashMap<DeviceId, GamepadId>,
}

impl GilrsSource {
    pub fn new() -> Result<Self, CollectorError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(CollectorError::InitializationError(e.to_string()));
            }
        };

        Ok(Self {
            gilrs,
            known: HashMap::new(),
        })
    }

    fn register(&mut self, id: GamepadId) -> DeviceId {
        let device = DeviceId(usize::from(id));
        self.known.insert(device, id);
        device
    }

    /// Gamepads already present at start-up; gilrs only reports hot-plugs as events
    pub fn connected_devices(&mut self) -> Vec<DeviceId> {
        let present: Vec<(GamepadId, String)> = self
            .gilrs
            .gamepads()
            .map(|(id, gamepad)| (id, gamepad.name().to_string()))
            .collect();

        if present.is_empty() {
            warn!("No gamepad connected, waiting for hot-plug");
        }

        present
            .into_iter()
            .map(|(id, name)| {
                let device = self.register(id);
                info!("Found gamepad {} ({})", device, name);
                device
            })
            .collect()
    }
}

impl GamepadSource for GilrsSource {
    fn next_connection(&mut self) -> Option<ConnectionEvent> {
        // Draining every event keeps gilrs' cached state current
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => {
                    let device = self.register(id);
                    info!("Controller connected: {}", device);
                    return Some(ConnectionEvent::Connected(device));
                }
                EventType::Disconnected => {
                    let device = DeviceId(usize::from(id));
                    self.known.remove(&device);
                    warn!("Controller disconnected: {}", device);
                    return Some(ConnectionEvent::Disconnected(device));
                }
                _ => {}
            }
        }
        None
    }

    fn read_raw(&self, device: DeviceId) -> Option<RawDeviceState> {
        let id = self.known.get(&device)?;
        let gamepad = self.gilrs.connected_gamepad(*id)?;

        let axes = STANDARD_AXES
            .iter()
            .map(|axis| {
                let value = gamepad.axis_data(*axis).map_or(0.0, |data| data.value());
                // gilrs reports up as positive, the standard layout down
                match axis {
                    Axis::LeftStickY | Axis::RightStickY => -value,
                    _ => value,
                }
            })
            .collect();

        let buttons = STANDARD_BUTTONS
            .iter()
            .map(|button| {
                gamepad
                    .button_data(*button)
                    .map_or(RawButton::default(), |data| RawButton {
                        pressed: data.is_pressed(),
                        touched: false,
                        value: data.value(),
                    })
            })
            .collect();

        Some(RawDeviceState { axes, buttons })
    }
}

// Define collector states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum CollectionState {
    Initializing,
    Collecting,
}

#[machine]
#[derive(Debug)]
pub struct InputCollector<S: CollectionState> {
    // Scheduler owning the gilrs source and all controllers
    hub: GamepadHub<GilrsSource>,

    // Input settings
    settings: InputSettings,
}

impl InputCollector<Initializing> {
    pub fn create(
        settings: InputSettings,
        event_sender: mpsc::Sender<ControllerEvent>,
        focus: watch::Receiver<bool>,
    ) -> Result<Self, CollectorError> {
        debug!("Creating Input Collector with settings: {:?}", settings);

        let source = GilrsSource::new()?;
        let hub = GamepadHub::new(
            source,
            DeviceProfile::for_family(settings.device_family),
            event_sender,
            focus,
            settings.pause_when_unfocused,
        );

        Ok(Self::new(hub, settings))
    }

    // Attach already-connected pads and transition to Collecting state
    pub fn initialize(mut self) -> InputCollector<Collecting> {
        let devices = self.hub.source_mut().connected_devices();
        for device in devices {
            self.hub.attach(device);
        }

        info!(
            "Input Collector initialized with {} controllers, transitioning to Collecting state",
            self.hub.attached_devices().len()
        );
        self.transition()
    }
}

impl InputCollector<Collecting> {
    /// Runs the poll loop until `shutdown` fires
    pub async fn run(self, commands: mpsc::Receiver<HubCommand>, shutdown: CancellationToken) {
        let frame_interval = self.settings.frame_interval();
        self.hub.run(frame_interval, commands, shutdown).await;
        info!("Input Collector stopped");
    }
}
