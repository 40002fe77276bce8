//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Construction-time settings for [`AudioEngine`](crate::dsp::engine::AudioEngine).
///
/// Every field has a default, so a JSON document only needs the keys it
/// wants to change (`{"sampleRate": 48000}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: f64,
    /// Initial master gain [0, 1].
    pub master_volume: f64,
    /// Initial wet level [0, 1].
    pub reverb_amount: f64,
    /// Length of the generated impulse response in seconds.
    pub reverb_seconds: f64,
    /// Power-law exponent shaping the impulse response decay.
    pub reverb_decay: f64,
    /// Analyzer transform window (power of two).
    pub fft_size: usize,
    /// Analyzer temporal smoothing in [0, 1).
    pub smoothing_time_constant: f64,
    pub min_decibels: f64,
    pub max_decibels: f64,
    /// Seed for every noise source (percussion, impulse response).
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: 44100.0,
            master_volume: 0.8,
            reverb_amount: 0.0,
            reverb_seconds: 2.5,
            reverb_decay: 2.0,
            fft_size: 2048,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            seed: 0x5EED_CAFE,
        }
    }
}

impl EngineConfig {
    /// Config with defaults at a specific sample rate.
    pub fn with_sample_rate(sample_rate: f64) -> Self {
        EngineConfig {
            sample_rate,
            ..Default::default()
        }
    }

    /// Parse and validate a JSON config document.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if !self.fft_size.is_power_of_two() || !(32..=32768).contains(&self.fft_size) {
            return Err(EngineError::InvalidConfig(format!(
                "fft size must be a power of two in 32..=32768, got {}",
                self.fft_size
            )));
        }
        if !(0.0..1.0).contains(&self.smoothing_time_constant) {
            return Err(EngineError::InvalidConfig(format!(
                "smoothing time constant must be in [0, 1), got {}",
                self.smoothing_time_constant
            )));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(EngineError::InvalidConfig(format!(
                "min decibels ({}) must be below max decibels ({})",
                self.min_decibels, self.max_decibels
            )));
        }
        if !(self.reverb_seconds.is_finite() && self.reverb_seconds > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "reverb length must be positive, got {}",
                self.reverb_seconds
            )));
        }
        Ok(())
    }
}
