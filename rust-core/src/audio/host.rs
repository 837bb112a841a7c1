//! Duplex audio host using cpal
//!
//! Opens the default input and output devices, forwards the first captured
//! channel through a sample ring to the output callback and runs the
//! transfer-function engine there. The engine's output goes to every output
//! channel.

use super::buffer::{AudioConsumer, AudioProducer, AudioRingBuffer};
use super::engine::TransferEngine;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig, SupportedStreamConfig};
use thiserror::Error;

/// Frames processed per engine call when the device hands over a larger block
const MAX_CHUNK_FRAMES: usize = 4096;

/// Captured frames kept queued before older ones are dropped
const MAX_CAPTURE_BACKLOG: usize = 4 * MAX_CHUNK_FRAMES;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio {0} device found")]
    NoDevice(&'static str),

    #[error("Failed to get device name: {0}")]
    DeviceName(String),

    #[error("Failed to get default config: {0}")]
    DefaultConfig(String),

    #[error("Failed to build stream: {0}")]
    BuildStream(String),

    #[error("Failed to play stream: {0}")]
    PlayStream(String),

    #[error("Input runs at {input} Hz but output at {output} Hz; set both devices to the same rate")]
    SampleRateMismatch { input: u32, output: u32 },
}

/// Audio device information
#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

struct Endpoint {
    device: Device,
    config: SupportedStreamConfig,
    info: AudioDeviceInfo,
}

impl Endpoint {
    fn input(device: Device) -> Result<Self, AudioError> {
        let config = device
            .default_input_config()
            .map_err(|e| AudioError::DefaultConfig(e.to_string()))?;
        Self::with_config(device, config)
    }

    fn output(device: Device) -> Result<Self, AudioError> {
        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DefaultConfig(e.to_string()))?;
        Self::with_config(device, config)
    }

    fn with_config(device: Device, config: SupportedStreamConfig) -> Result<Self, AudioError> {
        let name = device
            .name()
            .map_err(|e| AudioError::DeviceName(e.to_string()))?;
        let info = AudioDeviceInfo {
            name,
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
        };
        Ok(Self {
            device,
            config,
            info,
        })
    }
}

/// Default input and output devices, running the engine once started
pub struct AudioHost {
    input: Endpoint,
    output: Endpoint,
    streams: Option<(Stream, Stream)>,
}

impl AudioHost {
    /// Open the default input and output devices
    ///
    /// Both must run at the same sample rate; build the engine with
    /// [`AudioHost::sample_rate`] afterwards.
    pub fn open_default() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let input = host
            .default_input_device()
            .ok_or(AudioError::NoDevice("input"))?;
        let output = host
            .default_output_device()
            .ok_or(AudioError::NoDevice("output"))?;

        let input = Endpoint::input(input)?;
        let output = Endpoint::output(output)?;

        if input.info.sample_rate != output.info.sample_rate {
            return Err(AudioError::SampleRateMismatch {
                input: input.info.sample_rate,
                output: output.info.sample_rate,
            });
        }

        log::info!(
            "Audio host: in '{}' ({} ch), out '{}' ({} ch) at {} Hz",
            input.info.name,
            input.info.channels,
            output.info.name,
            output.info.channels,
            output.info.sample_rate
        );

        Ok(Self {
            input,
            output,
            streams: None,
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.output.info.sample_rate as f64
    }

    pub fn input_info(&self) -> &AudioDeviceInfo {
        &self.input.info
    }

    pub fn output_info(&self) -> &AudioDeviceInfo {
        &self.output.info
    }

    pub fn is_running(&self) -> bool {
        self.streams.is_some()
    }

    /// Build both streams around `engine` and start them
    ///
    /// A running pair of streams is replaced.
    pub fn start(&mut self, engine: TransferEngine) -> Result<(), AudioError> {
        self.streams = None;

        let (producer, consumer) = AudioRingBuffer::new(2 * MAX_CAPTURE_BACKLOG).split();
        let input_stream = self.build_input(producer)?;
        let output_stream = self.build_output(consumer, engine)?;

        input_stream
            .play()
            .map_err(|e| AudioError::PlayStream(e.to_string()))?;
        output_stream
            .play()
            .map_err(|e| AudioError::PlayStream(e.to_string()))?;

        self.streams = Some((input_stream, output_stream));
        Ok(())
    }

    /// Pause both streams without tearing them down
    pub fn pause(&self) -> Result<(), AudioError> {
        if let Some((input, output)) = &self.streams {
            input
                .pause()
                .map_err(|e| AudioError::PlayStream(e.to_string()))?;
            output
                .pause()
                .map_err(|e| AudioError::PlayStream(e.to_string()))?;
        }
        Ok(())
    }

    /// Restart streams paused with [`AudioHost::pause`]
    pub fn resume(&self) -> Result<(), AudioError> {
        if let Some((input, output)) = &self.streams {
            input
                .play()
                .map_err(|e| AudioError::PlayStream(e.to_string()))?;
            output
                .play()
                .map_err(|e| AudioError::PlayStream(e.to_string()))?;
        }
        Ok(())
    }

    /// Drop both streams, and with them the engine
    pub fn stop(&mut self) {
        if self.streams.take().is_some() {
            log::info!("Audio host stopped");
        }
    }

    fn build_input(&self, mut producer: AudioProducer) -> Result<Stream, AudioError> {
        let config: StreamConfig = self.input.config.clone().into();
        let channels = config.channels as usize;

        self.input
            .device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    producer.write_channel(data, channels, 0);
                },
                move |err| {
                    log::error!("Audio input error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::BuildStream(e.to_string()))
    }

    fn build_output(
        &self,
        mut consumer: AudioConsumer,
        mut engine: TransferEngine,
    ) -> Result<Stream, AudioError> {
        let config: StreamConfig = self.output.config.clone().into();
        let channels = (config.channels as usize).max(1);

        let mut captured = vec![0.0f32; MAX_CHUNK_FRAMES];
        let mut rendered = vec![0.0f32; MAX_CHUNK_FRAMES];

        self.output
            .device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    consumer.trim_to(MAX_CAPTURE_BACKLOG);

                    for block in data.chunks_mut(MAX_CHUNK_FRAMES * channels) {
                        let frames = block.len() / channels;
                        let input = &mut captured[..frames];
                        let output = &mut rendered[..frames];

                        consumer.read_padded(input);
                        engine.process(input, output);

                        let interleaved = block.chunks_exact_mut(channels);
                        for (frame, &sample) in interleaved.zip(output.iter()) {
                            frame.fill(sample);
                        }
                    }
                },
                move |err| {
                    log::error!("Audio output error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::BuildStream(e.to_string()))
    }
}

/// List available audio input devices
pub fn list_input_devices() -> Result<Vec<AudioDeviceInfo>, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::DeviceName(e.to_string()))?;

    Ok(devices
        .filter_map(|device| Endpoint::input(device).ok())
        .map(|endpoint| endpoint.info)
        .collect())
}

/// List available audio output devices
pub fn list_output_devices() -> Result<Vec<AudioDeviceInfo>, AudioError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::DeviceName(e.to_string()))?;

    Ok(devices
        .filter_map(|device| Endpoint::output(device).ok())
        .map(|endpoint| endpoint.info)
        .collect())
}
