//! Compressor — bus dynamics processing for audio leveling.
//!
//! Feed-forward peak compressor with a soft knee. Settings are fixed when
//! the engine is built; every voice passes through it.

/// Threshold in dB.
pub const THRESHOLD_DB: f64 = -18.0;
/// Knee width in dB.
pub const KNEE_DB: f64 = 12.0;
/// Compression ratio (6:1).
pub const RATIO: f64 = 6.0;
/// Attack time in seconds.
pub const ATTACK: f64 = 0.003;
/// Release time in seconds.
pub const RELEASE: f64 = 0.15;

/// A stereo dynamics compressor with linked channels.
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold: f64,
    knee: f64,
    ratio: f64,
    attack_coef: f64,
    release_coef: f64,

    // Current envelope level (linear)
    envelope: f64,
}

impl Compressor {
    pub fn new(sample_rate: f64) -> Self {
        Compressor {
            threshold: THRESHOLD_DB,
            knee: KNEE_DB,
            ratio: RATIO,
            attack_coef: (-1.0 / (ATTACK * sample_rate)).exp(),
            release_coef: (-1.0 / (RELEASE * sample_rate)).exp(),
            envelope: 0.0,
        }
    }

    /// Convert linear amplitude to dB.
    #[inline]
    fn linear_to_db(linear: f64) -> f64 {
        if linear <= 1e-6 {
            -120.0
        } else {
            20.0 * linear.log10()
        }
    }

    /// Gain change in dB (zero or negative) for an input level in dB.
    #[inline]
    fn compute_gain(&self, input_db: f64) -> f64 {
        let slope = 1.0 / self.ratio - 1.0;
        let over = input_db - self.threshold;
        let half_knee = self.knee / 2.0;

        if over <= -half_knee {
            0.0
        } else if over >= half_knee {
            slope * over
        } else {
            // quadratic blend across the knee
            let x = over + half_knee;
            slope * x * x / (2.0 * self.knee)
        }
    }

    /// Process a stereo sample pair.
    #[inline]
    pub fn process(&mut self, left: f64, right: f64) -> (f64, f64) {
        let input_level = left.abs().max(right.abs());

        let coef = if input_level > self.envelope {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.envelope = coef * self.envelope + (1.0 - coef) * input_level;

        let gain_db = self.compute_gain(Self::linear_to_db(self.envelope));
        let gain = 10.0_f64.powf(gain_db / 20.0);

        (left * gain, right * gain)
    }

    /// Current gain reduction in dB (positive number, for metering).
    pub fn reduction(&self) -> f64 {
        -self.compute_gain(Self::linear_to_db(self.envelope))
    }
}
