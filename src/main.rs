use color_eyre::{eyre::eyre, Result};
use padstream::audio::{ring_buffer, AudioOutput, StereoCallback, ToneGenerator};
use padstream::config::AppConfig;
use padstream::controller::controller_handle::ControllerHandle;
use padstream::controller::diff::InputEvent;
use padstream::controller::profile::LogicalButton;
use std::time::Duration;
#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const STATS_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = AppConfig::load_or_default().await?;
    info!("Loaded configuration: {:?}", config);

    let (event_tx, mut event_rx) = mpsc::channel(config.input.event_buffer);

    // Start gamepad polling
    let controller_handle = ControllerHandle::spawn(Some(config.input.clone()), event_tx)
        .map_err(|e| eyre!("Failed to spawn controller: {}", e))?;

    // Audio path: tone -> ring buffer -> host callback
    let (mut producer, consumer) = ring_buffer(config.audio.ring_capacity)
        .map_err(|e| eyre!("Failed to create audio buffer: {}", e))?;
    let callback = StereoCallback::new(consumer, config.audio.block_size);
    let callback_stats = callback.stats();

    let _output = match AudioOutput::start(&config.audio, callback) {
        Ok(output) => {
            info!(
                "Playing on {} ({} channels)",
                output.device_name(),
                output.channels()
            );
            Some(output)
        }
        Err(e) => {
            warn!("Audio output unavailable, continuing without sound: {}", e);
            None
        }
    };

    let mut tone = ToneGenerator::new(config.audio.sample_rate, config.input.poll_rate_hz);
    info!(
        "Test tone ready: {} frames per burst, hold A to play",
        tone.frames_per_burst()
    );

    let mut frame = tokio::time::interval(config.input.frame_interval());
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stats = tokio::time::interval(STATS_INTERVAL);
    stats.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut focus_signals = FocusSignals::install();

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!("Failed to listen for ctrl-c: {}", e);
                }
                info!("Shutdown requested");
                break;
            }
            focused = focus_signals.next() => {
                info!("Host focus {}", if focused { "gained" } else { "lost" });
                controller_handle.set_focus(focused);
            }
            Some(event) = event_rx.recv() => {
                if event.event.is_lifecycle() {
                    info!("{} {:?}", event.device, event.event);
                    continue;
                }
                debug!(
                    "[{}] {}: {:?}",
                    event.timestamp.format("%H:%M:%S%.3f"),
                    event.device,
                    event.event
                );

                // The guide button releases its pad until it is plugged in again
                if let InputEvent::Press { button: LogicalButton::Xbox, .. } = event.event {
                    match controller_handle.dispose(event.device).await {
                        Ok(true) => info!("Released {}", event.device),
                        Ok(false) => debug!("{} was already released", event.device),
                        Err(e) => warn!("Failed to release {}: {}", event.device, e),
                    }
                    continue;
                }

                if tone.apply(&event.event) {
                    debug!(
                        "Tone {} at {:.1}Hz",
                        if tone.is_gated() { "on" } else { "off" },
                        tone.frequency()
                    );
                }
            }
            _ = frame.tick() => {
                let dropped = tone.produce(&mut producer);
                if dropped > 0 {
                    debug!("Audio buffer full, dropped {} samples", dropped);
                }
            }
            _ = stats.tick() => {
                match controller_handle.attached_devices().await {
                    Ok(devices) => info!("Attached controllers: {:?}", devices),
                    Err(e) => warn!("Failed to list controllers: {}", e),
                }
                let ring = producer.stats();
                info!(
                    "Audio stats - blocks filled: {}, silent: {}, buffered: {}/{}, overruns: {}, underruns: {}",
                    callback_stats.filled(),
                    callback_stats.silent(),
                    producer.available(),
                    producer.capacity(),
                    ring.overruns,
                    ring.underruns
                );
            }
        }
    }

    controller_handle.shutdown().await;
    info!("Goodbye");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

/// Host focus driven by Unix signals: SIGUSR1 drops focus, SIGUSR2 restores it
struct FocusSignals {
    #[cfg(unix)]
    signals: Option<(Signal, Signal)>,
}

impl FocusSignals {
    #[cfg(unix)]
    fn install() -> Self {
        let signals = match (
            signal(SignalKind::user_defined1()),
            signal(SignalKind::user_defined2()),
        ) {
            (Ok(lost), Ok(gained)) => Some((lost, gained)),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to install focus signal handlers: {}", e);
                None
            }
        };
        Self { signals }
    }

    #[cfg(not(unix))]
    fn install() -> Self {
        Self {}
    }

    /// Waits for the next focus change
    #[cfg(unix)]
    async fn next(&mut self) -> bool {
        let Some((lost, gained)) = self.signals.as_mut() else {
            return std::future::pending().await;
        };
        tokio::select! {
            Some(()) = lost.recv() => false,
            Some(()) = gained.recv() => true,
            else => std::future::pending().await,
        }
    }

    #[cfg(not(unix))]
    async fn next(&mut self) -> bool {
        std::future::pending().await
    }
}
