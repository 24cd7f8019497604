//! Device output stream.
//!
//! The callback runs the render core under `try_lock`. Control-surface
//! calls hold the same lock briefly from their own thread; if a callback
//! loses the race it writes silence for that buffer instead of blocking.
//! All synthesis happens in f32; conversion to the device's sample format
//! happens at the write into the output buffer.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
};
use log::{error, info};
use std::sync::{Arc, Mutex};

use super::parameters::SharedParams;
use super::render::RenderCore;
use crate::error::EngineError;

/// Mono scratch capacity. Callbacks asking for more grow it once, outside
/// the steady state.
const SCRATCH_FRAMES: usize = 8192;

/// An open output stream feeding from a shared render core.
pub struct DeviceStream {
    _device: Device,
    _stream: Stream,
    sample_rate: f32,
}

impl DeviceStream {
    pub fn open(
        core: Arc<Mutex<RenderCore>>,
        params: Arc<SharedParams>,
    ) -> Result<Self, EngineError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| EngineError::Device("no output device found".to_string()))?;

        let supported_config = device
            .default_output_config()
            .map_err(|e| EngineError::Device(format!("default config: {}", e)))?;

        let sample_format = supported_config.sample_format();
        let sample_rate = supported_config.sample_rate().0 as f32;
        let channels = supported_config.channels() as usize;
        let config: StreamConfig = supported_config.into();

        info!(
            "output device: {} ({:?}, {} Hz, {} ch)",
            device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_format,
            sample_rate,
            channels
        );

        let stream = match sample_format {
            SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config, channels, core, params)
            }
            SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config, channels, core, params)
            }
            SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config, channels, core, params)
            }
            other => {
                return Err(EngineError::Device(format!(
                    "unsupported sample format: {:?}",
                    other
                )));
            }
        }?;

        stream
            .play()
            .map_err(|e| EngineError::Device(format!("stream start: {}", e)))?;

        Ok(Self {
            _device: device,
            _stream: stream,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        channels: usize,
        core: Arc<Mutex<RenderCore>>,
        params: Arc<SharedParams>,
    ) -> Result<Stream, EngineError>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        let mut mono = vec![0.0f32; SCRATCH_FRAMES];
        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // ========== SACRED ZONE ==========
                    // No allocations, no I/O, no blocking locks
                    let frames = data.len() / channels.max(1);
                    if frames > mono.len() {
                        // First oversized callback only
                        mono.resize(frames, 0.0);
                    }

                    if let Ok(mut core) = core.try_lock() {
                        core.process(&mut mono[..frames], &params);
                        for (frame, &sample) in
                            data.chunks_mut(channels).zip(mono[..frames].iter())
                        {
                            for out in frame.iter_mut() {
                                *out = T::from_sample(sample);
                            }
                        }
                    } else {
                        // Control thread holds the core, output silence
                        for sample in data.iter_mut() {
                            *sample = Sample::from_sample::<f32>(0.0);
                        }
                    }
                    // ========== SACRED ZONE END ==========
                },
                move |err| {
                    // Runs outside the audio callback, I/O is fine here
                    error!("audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| EngineError::Device(format!("stream creation: {}", e)))?;

        Ok(stream)
    }
}
