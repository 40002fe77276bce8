//! Anti-aliased oscillators using PolyBLEP.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Supported waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// Parse a waveform name ("sine", "square", "sawtooth"/"saw", "triangle").
    pub fn from_name(name: &str) -> Option<Waveform> {
        match name {
            "sine" => Some(Waveform::Sine),
            "square" => Some(Waveform::Square),
            "sawtooth" | "saw" => Some(Waveform::Sawtooth),
            "triangle" => Some(Waveform::Triangle),
            _ => None,
        }
    }
}

/// A band-limited oscillator with anti-aliasing (PolyBLEP).
///
/// Every shape starts at its zero crossing (square starts high), so a
/// freshly started oscillator does not click.
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: f64,
    pub detune: f64, // in cents
    phase: f64,
    sample_rate: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, sample_rate: f64) -> Self {
        Oscillator {
            waveform,
            frequency: 440.0,
            detune: 0.0,
            phase: 0.0,
            sample_rate,
        }
    }

    /// Effective frequency accounting for detune (in cents).
    fn effective_freq(&self) -> f64 {
        self.frequency * (2.0_f64).powf(self.detune / 1200.0)
    }

    /// Phase increment per sample.
    fn phase_inc(&self) -> f64 {
        self.effective_freq() / self.sample_rate
    }

    /// Generate the next sample.
    pub fn next_sample(&mut self) -> f64 {
        let inc = self.phase_inc();
        let sample = match self.waveform {
            Waveform::Sine => self.sine(),
            Waveform::Sawtooth => self.sawtooth(inc),
            Waveform::Square => self.square(inc),
            Waveform::Triangle => self.triangle(),
        };

        self.phase += inc;
        if self.phase >= 1.0 {
            self.phase -= self.phase.floor();
        }

        sample
    }

    fn sine(&self) -> f64 {
        (2.0 * PI * self.phase).sin()
    }

    /// Rising ramp offset by half a cycle so it starts at 0; PolyBLEP
    /// corrects the drop at phase 0.5.
    fn sawtooth(&self, inc: f64) -> f64 {
        let t = (self.phase + 0.5) % 1.0;
        let naive = 2.0 * t - 1.0;
        naive - poly_blep(t, inc)
    }

    /// Square wave via two sawtooth waves with PolyBLEP.
    fn square(&self, inc: f64) -> f64 {
        let mut value = if self.phase < 0.5 { 1.0 } else { -1.0 };
        value += poly_blep(self.phase, inc);
        value -= poly_blep((self.phase + 0.5) % 1.0, inc);
        value
    }

    /// Piecewise linear: 0 → +1 → -1 → 0 over one cycle.
    fn triangle(&self) -> f64 {
        let t = (self.phase + 0.25) % 1.0;
        1.0 - 4.0 * (t - 0.5).abs()
    }
}

/// PolyBLEP (Polynomial Band-Limited Step) anti-aliasing correction.
///
/// `t` is the phase [0, 1), `dt` is the phase increment per sample.
/// Returns a correction value to subtract from the naive waveform
/// at discontinuities.
fn poly_blep(t: f64, dt: f64) -> f64 {
    if t < dt {
        // Just after the discontinuity
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        // Just before the next discontinuity
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}
