use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, Stream, StreamConfig};
use tracing::{debug, error, info};

use super::callback::StereoCallback;
use super::AudioError;
use crate::config::AudioSettings;

/// Running output stream on the default device
///
/// Audio plays as long as this value lives.
pub struct AudioOutput {
    _stream: Stream,
    device_name: String,
    channels: u16,
}

impl AudioOutput {
    /// Opens the default output device and starts pulling blocks from `callback`
    pub fn start(settings: &AudioSettings, callback: StereoCallback) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio device: {}", device_name);

        let channels = output_channels(&device, settings.sample_rate)?;
        let block_frames = u32::try_from(settings.block_size)
            .map_err(|_| AudioError::Device(format!("block size {} too large", settings.block_size)))?;

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(settings.sample_rate),
            buffer_size: BufferSize::Fixed(block_frames),
        };
        info!(
            "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
            channels,
            settings.sample_rate,
            block_frames,
            block_frames as f32 / settings.sample_rate as f32 * 1000.0
        );

        let mut callback = callback;
        let host_channels = usize::from(channels);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    callback.render_interleaved(data, host_channels);
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        info!("Audio stream started");

        Ok(Self {
            _stream: stream,
            device_name,
            channels,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// Channel count of an f32 output config covering the requested rate, stereo preferred
fn output_channels(device: &cpal::Device, sample_rate: u32) -> Result<u16, AudioError> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::Device(e.to_string()))?
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&sample_rate))
        .collect();
    debug!("{} matching f32 output configs", supported.len());

    supported
        .iter()
        .find(|c| c.channels() == 2)
        .or_else(|| supported.iter().find(|c| c.channels() > 2))
        .or_else(|| supported.first())
        .map(|c| c.channels())
        .ok_or_else(|| {
            AudioError::UnsupportedFormat(format!("no f32 output config at {}Hz", sample_rate))
        })
}
