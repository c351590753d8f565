//! Controller Handle - Unified API for gamepad input
//!
//! Owns the lifecycle of the input collector task: spawning, focus changes,
//! per-device disposal and shutdown. Events reach the application through the
//! `mpsc` sender passed to [`ControllerHandle::spawn`].
//!

use std::future::Future;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::InputSettings;
use crate::controller::collector::{CollectorError, InputCollector};
use crate::controller::gamepad::ControllerEvent;
use crate::controller::hub::HubCommand;
use crate::controller::snapshot::DeviceId;

/// Errors of the input diff engine
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// The device is no longer enumerable
    ///
    /// Non-fatal. The poll is skipped and the disconnect notification removes the
    /// controller.
    #[error("Device {0} is unavailable")]
    DeviceUnavailable(DeviceId),

    /// Lifecycle call that the current controller state does not allow
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    /// Event channel closed or full
    #[error("Channel error: {0}")]
    ChannelError(String),
}

/// Errors that can occur during controller initialization or operation
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Error from the collection subsystem
    ///
    /// Typically indicates that the platform gamepad backend could not be opened.
    #[error("Collector error: {0}")]
    CollectorError(#[from] CollectorError),

    /// Error from the diff engine
    #[error("Input error: {0}")]
    InputError(#[from] InputError),

    /// The collector task is gone or stopped answering
    #[error("Channel error: {0}")]
    ChannelError(String),
}

/// Handle for managing the controller subsystem lifecycle
///
/// # Threading Model
///
/// Spawns one tokio task that owns gilrs and every controller. All requests made
/// through this handle are queued to that task and applied between two poll ticks.
///
/// # Resource Management
///
/// [`ControllerHandle::shutdown`] disposes every controller and waits for the task.
/// Dropping the handle cancels the task without waiting.
pub struct ControllerHandle {
    commands: mpsc::Sender<HubCommand>,
    focus: watch::Sender<bool>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ControllerHandle {
    /// Spawns the controller subsystem
    ///
    /// # Arguments
    ///
    /// * `settings` - Optional configuration; uses defaults if None
    /// * `sender` - Channel receiving normalized controller events
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::CollectorError`] when the gamepad backend fails to open.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let (tx, mut rx) = mpsc::channel(1000);
    /// let handle = ControllerHandle::spawn(None, tx)?;
    ///
    /// while let Some(event) = rx.recv().await {
    ///     println!("{:?}", event);
    /// }
    /// ```
    pub fn spawn(
        settings: Option<InputSettings>,
        sender: mpsc::Sender<ControllerEvent>,
    ) -> Result<Self, ControllerError> {
        info!("Initializing Controller system with settings: {:?}", settings);

        let settings = settings.unwrap_or_default();

        let (focus_tx, focus_rx) = watch::channel(true);
        let collector = InputCollector::create(settings, sender, focus_rx)?;
        info!("Successfully created InputCollector instance");

        let handle = Self::launch(focus_tx, move |commands, shutdown| async move {
            let collecting = collector.initialize();
            collecting.run(commands, shutdown).await;
        });

        info!("Controller system initialized successfully");
        Ok(handle)
    }

    // Spawns the poll loop built by `body` and wires the command and shutdown channels to it
    fn launch<F, Fut>(focus: watch::Sender<bool>, body: F) -> Self
    where
        F: FnOnce(mpsc::Receiver<HubCommand>, CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::channel(32);
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(body(command_rx, shutdown.clone()));
        debug!("Tokio task spawned with handle: {:?}", task);

        Self {
            commands: command_tx,
            focus,
            shutdown,
            task: Some(task),
        }
    }

    /// Host focus signal; while `false`, polling pauses (if configured)
    pub fn set_focus(&self, focused: bool) {
        debug!("Host focus changed: {}", focused);
        self.focus.send_replace(focused);
    }

    /// Disposes the controller of `device`
    ///
    /// Resolves once the collector has applied the disposal; from then on no event
    /// of that device is emitted. Returns whether a controller was attached.
    pub async fn dispose(&self, device: DeviceId) -> Result<bool, ControllerError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.commands
            .send(HubCommand::Dispose { device, ack: ack_tx })
            .await
            .map_err(|e| ControllerError::ChannelError(e.to_string()))?;

        ack_rx
            .await
            .map_err(|e| ControllerError::ChannelError(e.to_string()))
    }

    pub async fn attached_devices(&self) -> Result<Vec<DeviceId>, ControllerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(HubCommand::ListDevices { reply: reply_tx })
            .await
            .map_err(|e| ControllerError::ChannelError(e.to_string()))?;

        reply_rx
            .await
            .map_err(|e| ControllerError::ChannelError(e.to_string()))
    }

    /// Disposes every controller and waits for the collector task to finish
    pub async fn shutdown(mut self) {
        info!("Shutting down controller system");
        self.shutdown.cancel();

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Collector task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            warn!("Controller handle dropped without shutdown");
            self.shutdown.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::diff::InputEvent;
    use crate::controller::hub::GamepadHub;
    use crate::controller::profile::DeviceProfile;
    use crate::controller::snapshot::fake::FakeSource;
    use std::time::Duration;

    #[tokio::test]
    async fn requests_are_applied_by_the_poll_task() {
        let (tx, mut rx) = mpsc::channel(64);
        let (focus_tx, focus_rx) = watch::channel(true);
        let focus_observer = focus_rx.clone();

        let mut source = FakeSource::default();
        source.plug(DeviceId(0));
        source.plug(DeviceId(1));
        let mut hub = GamepadHub::new(source, DeviceProfile::xbox(), tx, focus_rx, true);
        hub.tick();

        let handle = ControllerHandle::launch(focus_tx, move |commands, shutdown| {
            hub.run(Duration::from_millis(5), commands, shutdown)
        });

        assert_eq!(
            handle.attached_devices().await.expect("poll task running"),
            vec![DeviceId(0), DeviceId(1)]
        );
        assert!(handle.dispose(DeviceId(0)).await.expect("dispose acknowledged"));
        assert!(!handle.dispose(DeviceId(0)).await.expect("dispose acknowledged"));
        assert_eq!(
            handle.attached_devices().await.expect("poll task running"),
            vec![DeviceId(1)]
        );

        handle.set_focus(false);
        assert!(!*focus_observer.borrow());

        handle.shutdown().await;

        let events: Vec<(DeviceId, InputEvent)> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| (e.device, e.event))
            .collect();
        assert_eq!(
            events,
            vec![
                (DeviceId(0), InputEvent::Connected),
                (DeviceId(1), InputEvent::Connected),
                (DeviceId(0), InputEvent::Disconnected),
                (DeviceId(1), InputEvent::Disconnected),
            ]
        );
    }

    #[tokio::test]
    async fn requests_fail_once_the_task_is_gone() {
        let (focus_tx, _focus_rx) = watch::channel(true);

        // A task that exits immediately drops the command receiver
        let handle = ControllerHandle::launch(focus_tx, |commands, _shutdown| async move {
            drop(commands);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(matches!(
            handle.dispose(DeviceId(0)).await,
            Err(ControllerError::ChannelError(_))
        ));
        handle.shutdown().await;
    }
}
