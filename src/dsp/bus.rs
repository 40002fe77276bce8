//! Signal bus — the fixed effect chain every voice feeds into.
//!
//! ```text
//! voices ─▶ compressor ─┬─▶ dry gain ──────────┬─▶ master gain ─▶ analyzer ─▶ out
//!                       └─▶ reverb ─▶ wet gain ─┘
//! ```
//!
//! The topology is built once. Only the three gain levels change at run
//! time, and they always move through a 20 ms one-pole smoother.

use crate::config::EngineConfig;

use super::analyzer::Analyzer;
use super::compressor::Compressor;
use super::noise::NoiseGenerator;
use super::param::Smoothed;
use super::reverb::ConvolutionReverb;

/// Time constant for master/dry/wet level changes.
pub const LEVEL_TIME_CONSTANT: f64 = 0.02;

pub struct Bus {
    compressor: Compressor,
    reverb: ConvolutionReverb,
    dry: Smoothed,
    wet: Smoothed,
    master: Smoothed,
    analyzer: Analyzer,
}

impl Bus {
    pub fn new(config: &EngineConfig, noise: &mut NoiseGenerator) -> Self {
        let sr = config.sample_rate;
        let impulse = noise.impulse_response(config.reverb_seconds, config.reverb_decay, sr);
        let (dry, wet) = mix_levels(config.reverb_amount);
        Bus {
            compressor: Compressor::new(sr),
            reverb: ConvolutionReverb::new(&impulse, sr),
            dry: Smoothed::new(dry, LEVEL_TIME_CONSTANT, sr),
            wet: Smoothed::new(wet, LEVEL_TIME_CONSTANT, sr),
            master: Smoothed::new(config.master_volume.clamp(0.0, 1.0), LEVEL_TIME_CONSTANT, sr),
            analyzer: Analyzer::new(config),
        }
    }

    /// Clamp to [0, 1] and glide toward it.
    pub fn set_master_volume(&mut self, volume: f64) {
        self.master.set_target(volume.clamp(0.0, 1.0));
    }

    /// Clamp to [0, 1]; wet follows the amount, dry keeps at least half.
    pub fn set_reverb_amount(&mut self, amount: f64) {
        let (dry, wet) = mix_levels(amount);
        self.dry.set_target(dry);
        self.wet.set_target(wet);
    }

    pub fn master_volume(&self) -> f64 {
        self.master.target()
    }

    pub fn dry_level(&self) -> f64 {
        self.dry.target()
    }

    pub fn wet_level(&self) -> f64 {
        self.wet.target()
    }

    /// Gain reduction currently applied by the compressor, in dB.
    pub fn compressor_reduction(&self) -> f64 {
        self.compressor.reduction()
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn analyzer_mut(&mut self) -> &mut Analyzer {
        &mut self.analyzer
    }

    /// Run one frame of summed voice output through the chain.
    #[inline]
    pub fn process(&mut self, left: f64, right: f64) -> (f32, f32) {
        let (cl, cr) = self.compressor.process(left, right);
        let (rl, rr) = self.reverb.process(cl, cr);
        let dry = self.dry.next_value();
        let wet = self.wet.next_value();
        let master = self.master.next_value();

        let out_l = ((cl * dry + rl * wet) * master) as f32;
        let out_r = ((cr * dry + rr * wet) * master) as f32;
        self.analyzer.push(0.5 * (out_l + out_r));
        (out_l, out_r)
    }
}

/// (dry, wet) for a reverb amount.
fn mix_levels(amount: f64) -> (f64, f64) {
    let wet = amount.clamp(0.0, 1.0);
    (1.0 - wet * 0.5, wet)
}
