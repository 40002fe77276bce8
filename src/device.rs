//! Real-time output through the default audio device (cpal).
//!
//! The output callback owns nothing but a handle to the shared engine: each
//! time the host asks for audio it locks the engine and renders straight
//! into the device buffer. Everything else (notes, songs, levels) happens
//! on the control thread between callbacks.

use std::sync::{Arc, Mutex, MutexGuard};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::dsp::engine::AudioEngine;
use crate::error::EngineError;

/// An engine wired to a running output stream.
pub struct OutputDevice {
    engine: Arc<Mutex<AudioEngine>>,
    channels: usize,
    _stream: cpal::Stream,
}

fn device_error(err: impl std::fmt::Display) -> EngineError {
    EngineError::Device(err.to_string())
}

impl OutputDevice {
    /// Open the default output device, build an engine at its sample rate
    /// and start streaming. The engine is resumed once the stream plays.
    pub fn open(mut config: EngineConfig) -> Result<Self, EngineError> {
        let host = cpal::default_host();
        info!("Audio host: {:?}", host.id());

        let device = host
            .default_output_device()
            .ok_or_else(|| EngineError::Device("no audio output device found".to_string()))?;
        info!("Audio device: {}", device.name().map_err(device_error)?);

        let supported = device.default_output_config().map_err(device_error)?;
        let channels = supported.channels() as usize;
        config.sample_rate = supported.sample_rate().0 as f64;

        let engine = Arc::new(Mutex::new(AudioEngine::new(config)?));
        let stream_config: cpal::StreamConfig = supported.clone().into();

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, Arc::clone(&engine), channels),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, Arc::clone(&engine), channels),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, Arc::clone(&engine), channels),
            other => Err(EngineError::Device(format!("unsupported sample format {other:?}"))),
        }?;
        stream.play().map_err(device_error)?;

        let output = OutputDevice {
            engine,
            channels,
            _stream: stream,
        };
        output.lock()?.resume();
        info!(channels, "Audio stream started");
        Ok(output)
    }

    /// Lock the engine for control calls. Keep the guard short-lived; the
    /// audio callback waits on it.
    pub fn lock(&self) -> Result<MutexGuard<'_, AudioEngine>, EngineError> {
        self.engine
            .lock()
            .map_err(|_| EngineError::Device("engine lock poisoned".to_string()))
    }

    pub fn engine(&self) -> Arc<Mutex<AudioEngine>> {
        Arc::clone(&self.engine)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    engine: Arc<Mutex<AudioEngine>>,
    channels: usize,
) -> Result<cpal::Stream, EngineError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut stereo: Vec<f32> = Vec::new();
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels.max(1);
                stereo.resize(frames * 2, 0.0);
                match engine.lock() {
                    Ok(mut engine) => engine.render(&mut stereo),
                    Err(_) => stereo.fill(0.0),
                }
                write_frames(data, &stereo, channels);
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(device_error)
}

/// Spread interleaved stereo over the device layout: mono gets the average,
/// extra channels stay silent.
fn write_frames<T>(data: &mut [T], stereo: &[f32], channels: usize)
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    for (frame, lr) in data.chunks_mut(channels.max(1)).zip(stereo.chunks_exact(2)) {
        match frame {
            [mono] => *mono = T::from_sample(0.5 * (lr[0] + lr[1])),
            [left, right, rest @ ..] => {
                *left = T::from_sample(lr[0]);
                *right = T::from_sample(lr[1]);
                for sample in rest {
                    *sample = T::from_sample(0.0);
                }
            }
            [] => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_to_mono_averages() {
        let mut out = [0.0f32; 2];
        write_frames(&mut out, &[0.2, 0.4, -1.0, 1.0], 1);
        assert!((out[0] - 0.3).abs() < 1e-6);
        assert_eq!(out[1], 0.0);
    }

    #[test]
    fn surround_layout_zeroes_extra_channels() {
        let mut out = [9.0f32; 8];
        write_frames(&mut out, &[0.1, 0.2, 0.3, 0.4], 4);
        assert_eq!(out, [0.1, 0.2, 0.0, 0.0, 0.3, 0.4, 0.0, 0.0]);
    }

    #[test]
    fn integer_formats_convert() {
        let mut out = [0i16; 2];
        write_frames(&mut out, &[1.0, -1.0], 2);
        assert_eq!(out[0], i16::MAX);
        assert!(out[1] <= -i16::MAX);
    }
}
