//! Poll scheduler for all attached controllers
//!
//! One hub owns the device source and every controller. It is advanced by a single
//! cooperative task, so hot-plug handling, disposal commands and polling never
//! interleave within a tick.
//!
//! ```text
//! frame interval ──► tick() ──► drain connect/disconnect ──► poll each controller
//!                                                             │
//! HubCommand ──► dispose (between ticks)                      ▼
//!                                                      mpsc<ControllerEvent>
//! ```

use chrono::Local;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::controller_handle::InputError;
use crate::controller::diff::InputEvent;
use crate::controller::gamepad::{ControllerEvent, GamepadController, PollHandle, PollOutcome};
use crate::controller::profile::DeviceProfile;
use crate::controller::snapshot::{read_snapshot, ConnectionEvent, DeviceId, GamepadSource};

/// Requests processed by the hub between ticks
#[derive(Debug)]
pub enum HubCommand {
    /// Dispose one controller; `ack` reports whether it was attached
    Dispose {
        device: DeviceId,
        ack: oneshot::Sender<bool>,
    },
    /// Currently attached devices
    ListDevices { reply: oneshot::Sender<Vec<DeviceId>> },
}

/// Summary of one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub attached: usize,
    pub detached: usize,
    pub polled: usize,
    pub emitted: usize,
    pub dropped: usize,
    pub unfocused: bool,
}

#[derive(Debug)]
pub struct GamepadHub<S: GamepadSource> {
    source: S,
    profile: Arc<DeviceProfile>,
    controllers: BTreeMap<DeviceId, GamepadController>,
    events: mpsc::Sender<ControllerEvent>,
    schedule: CancellationToken,
    focus: watch::Receiver<bool>,
    pause_when_unfocused: bool,
}

impl<S: GamepadSource> GamepadHub<S> {
    pub fn new(
        source: S,
        profile: DeviceProfile,
        events: mpsc::Sender<ControllerEvent>,
        focus: watch::Receiver<bool>,
        pause_when_unfocused: bool,
    ) -> Self {
        debug!(
            "Creating gamepad hub for {:?} devices (pause when unfocused: {})",
            profile.family(),
            pause_when_unfocused
        );
        Self {
            source,
            profile: Arc::new(profile),
            controllers: BTreeMap::new(),
            events,
            schedule: CancellationToken::new(),
            focus,
            pause_when_unfocused,
        }
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn attached_devices(&self) -> Vec<DeviceId> {
        self.controllers.keys().copied().collect()
    }

    pub fn controller(&self, device: DeviceId) -> Option<&GamepadController> {
        self.controllers.get(&device)
    }

    /// Creates a controller for `device` and schedules it; returns false if one exists
    pub fn attach(&mut self, device: DeviceId) -> bool {
        if self.controllers.contains_key(&device) {
            warn!("Controller {} already attached, ignoring connect", device);
            return false;
        }

        let mut controller =
            GamepadController::new(device, Arc::clone(&self.profile), self.events.clone());
        if let Err(e) = controller.attach(PollHandle::new(&self.schedule)) {
            warn!("Failed to attach {}: {}", device, e);
            return false;
        }

        self.controllers.insert(device, controller);
        info!(
            "Controller {} attached ({} total)",
            device,
            self.controllers.len()
        );
        self.notify(device, InputEvent::Connected);
        true
    }

    /// Disposes and forgets the controller of `device`
    ///
    /// Completes before returning; no later tick can reach the controller.
    pub fn dispose(&mut self, device: DeviceId) -> bool {
        match self.controllers.remove(&device) {
            Some(mut controller) => {
                controller.dispose();
                self.notify(device, InputEvent::Disconnected);
                true
            }
            None => {
                debug!("Dispose requested for unknown controller {}", device);
                false
            }
        }
    }

    pub fn dispose_all(&mut self) {
        info!("Disposing {} controllers", self.controllers.len());
        for (device, mut controller) in std::mem::take(&mut self.controllers) {
            controller.dispose();
            self.notify(device, InputEvent::Disconnected);
        }
        self.schedule.cancel();
    }

    // Lifecycle notification, delivered like any other event
    fn notify(&self, device: DeviceId, event: InputEvent) {
        let event = ControllerEvent {
            device,
            event,
            timestamp: Local::now(),
        };
        if let Err(e) = self.events.try_send(event) {
            let e = InputError::ChannelError(e.to_string());
            warn!("Dropping lifecycle event of {}: {}", device, e);
        }
    }

    fn is_focused(&self) -> bool {
        !self.pause_when_unfocused || *self.focus.borrow()
    }

    /// One scheduler step: hot-plug handling, then one poll per controller
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        while let Some(connection) = self.source.next_connection() {
            match connection {
                ConnectionEvent::Connected(device) => {
                    if self.attach(device) {
                        report.attached += 1;
                    }
                }
                ConnectionEvent::Disconnected(device) => {
                    if self.dispose(device) {
                        report.detached += 1;
                    }
                }
            }
        }

        if !self.is_focused() {
            report.unfocused = true;
            return report;
        }

        for (device, controller) in self.controllers.iter_mut() {
            let reading = read_snapshot(&self.source, *device, &self.profile);
            match controller.poll(reading) {
                PollOutcome::Diffed { emitted, dropped } => {
                    report.polled += 1;
                    report.emitted += emitted;
                    report.dropped += dropped;
                }
                PollOutcome::Seeded => report.polled += 1,
                PollOutcome::Unavailable => {
                    warn!("Controller {} unreachable, awaiting disconnect", device)
                }
                PollOutcome::Skipped => {}
            }
        }

        report
    }

    fn handle_command(&mut self, command: HubCommand) {
        match command {
            HubCommand::Dispose { device, ack } => {
                let disposed = self.dispose(device);
                // Requester may have given up waiting
                let _ = ack.send(disposed);
            }
            HubCommand::ListDevices { reply } => {
                let _ = reply.send(self.attached_devices());
            }
        }
    }

    /// Cooperative poll loop, one tick per frame interval
    pub async fn run(
        mut self,
        frame_interval: Duration,
        mut commands: mpsc::Receiver<HubCommand>,
        shutdown: CancellationToken,
    ) {
        info!(
            "Starting poll loop with {:.2}ms frame interval",
            frame_interval.as_secs_f64() * 1000.0
        );

        let mut interval_timer = tokio::time::interval(frame_interval);
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Stats for periodic logging
        let mut ticks = 0u64;
        let mut unfocused_ticks = 0u64;
        let mut total_events = 0usize;
        let mut dropped_events = 0usize;
        let mut last_stats_time = Local::now();
        let stats_interval = chrono::Duration::seconds(30);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Poll loop shutting down");
                    break;
                }
                Some(command) = commands.recv() => {
                    debug!("Hub command: {:?}", command);
                    self.handle_command(command);
                }
                _ = interval_timer.tick() => {
                    let report = self.tick();
                    ticks += 1;
                    total_events += report.emitted;
                    dropped_events += report.dropped;
                    if report.unfocused {
                        unfocused_ticks += 1;
                    }
                }
            }

            let now = Local::now();
            if now - last_stats_time > stats_interval {
                let elapsed_seconds = (now - last_stats_time).num_seconds().max(1);
                info!(
                    "Poll stats: {} ticks ({} unfocused), {} events ({} dropped) in {} seconds, {} controllers",
                    ticks,
                    unfocused_ticks,
                    total_events,
                    dropped_events,
                    elapsed_seconds,
                    self.controllers.len()
                );
                ticks = 0;
                unfocused_ticks = 0;
                total_events = 0;
                dropped_events = 0;
                last_stats_time = now;
            }
        }

        self.dispose_all();
    }
}
