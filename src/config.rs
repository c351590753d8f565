use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::controller::profile::DeviceFamily;

const CONFIG_DIR: &str = "padstream";
const CONFIG_FILE: &str = "config.toml";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub input: InputSettings,
    pub audio: AudioSettings,
}

/// Gamepad polling settings
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InputSettings {
    /// Poll ticks per second, normally the display refresh rate
    pub poll_rate_hz: u32,
    pub device_family: DeviceFamily,
    /// Stop polling while the host window has no focus
    pub pause_when_unfocused: bool,
    /// Capacity of the controller event channel
    pub event_buffer: usize,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            poll_rate_hz: 60,
            device_family: DeviceFamily::Xbox,
            pause_when_unfocused: true,
            event_buffer: 1000,
        }
    }
}

impl InputSettings {
    /// One display frame at the configured refresh rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.poll_rate_hz.max(1)))
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AudioSettings {
    pub sample_rate: u32,
    /// Frames per host callback
    pub block_size: usize,
    /// Ring buffer size in samples (interleaved, so two per stereo frame)
    pub ring_capacity: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            block_size: 1024,
            ring_capacity: 8192,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        let input = &self.input;
        let audio = &self.audio;

        if !(1..=1000).contains(&input.poll_rate_hz) {
            return Err(eyre!(
                "poll_rate_hz must be within 1..=1000, got {}",
                input.poll_rate_hz
            ));
        }
        if input.event_buffer == 0 {
            return Err(eyre!("event_buffer must not be zero"));
        }
        if audio.sample_rate == 0 {
            return Err(eyre!("sample_rate must not be zero"));
        }
        if !audio.block_size.is_power_of_two() {
            return Err(eyre!(
                "block_size must be a power of two, got {}",
                audio.block_size
            ));
        }
        // One block of stereo frames is 2 * block_size samples
        if audio.ring_capacity / 2 < audio.block_size {
            return Err(eyre!(
                "ring_capacity {} cannot hold one stereo block of {} frames",
                audio.ring_capacity,
                audio.block_size
            ));
        }

        Ok(())
    }

    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Loads the config from the default location, writing defaults on first run
    pub async fn load_or_default() -> Result<Self> {
        Self::load_from(&Self::default_path()).await
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?;

        if !exists {
            info!("No config at {}, writing defaults", path.display());
            let config = Self::default();
            config.save_to(path).await?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file: {}", e))?;
        let config: Self =
            toml::from_str(&content).map_err(|e| eyre!("Failed to parse config file: {}", e))?;
        config.validate()?;

        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize config: {}", e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file: {}", e))?;

        Ok(())
    }
}
