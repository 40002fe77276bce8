//! Biquad filter — matches browser BiquadFilterNode coefficients.

use std::f64::consts::PI;

/// Filter type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterType {
    Highpass,
    /// Constant 0 dB peak gain at the center frequency.
    Bandpass,
}

/// A biquad IIR filter (2nd order).
///
/// Implements the standard Direct Form II Transposed structure.
/// Coefficient formulas from the Audio EQ Cookbook (Robert Bristow-Johnson).
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    pub filter_type: FilterType,
    pub frequency: f64,
    pub q: f64,

    // Coefficients
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    // State (Direct Form II Transposed)
    z1: f64,
    z2: f64,
}

impl BiquadFilter {
    /// Q defaults to the browser node's 1.0 when `q` is `None`.
    pub fn new(filter_type: FilterType, frequency: f64, q: Option<f64>, sample_rate: f64) -> Self {
        let mut f = BiquadFilter {
            filter_type,
            frequency,
            q: q.unwrap_or(1.0),
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        };
        f.update_coefficients(sample_rate);
        f
    }

    /// Recompute filter coefficients from current parameters.
    fn update_coefficients(&mut self, sample_rate: f64) {
        let nyquist = sample_rate / 2.0;
        let w0 = 2.0 * PI * self.frequency.clamp(1.0, nyquist * 0.999) / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * self.q.max(1e-4));

        let (b0, b1, b2) = match self.filter_type {
            FilterType::Highpass => {
                let b0 = (1.0 + cos_w0) / 2.0;
                (b0, -(1.0 + cos_w0), b0)
            }
            FilterType::Bandpass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        // Normalize by a0
        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }

    /// Process a single sample through the filter.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak_response(f: &mut BiquadFilter, freq: f64, sample_rate: f64) -> f64 {
        let mut max_out = 0.0_f64;
        let n = (sample_rate * 0.2) as usize;
        for i in 0..n {
            let t = i as f64 / sample_rate;
            let out = f.process((2.0 * PI * freq * t).sin());
            if i > n / 2 {
                // skip transient
                max_out = max_out.max(out.abs());
            }
        }
        max_out
    }

    #[test]
    fn highpass_blocks_dc() {
        let mut f = BiquadFilter::new(FilterType::Highpass, 7000.0, None, 44100.0);
        let mut output = 0.0;
        for _ in 0..1000 {
            output = f.process(1.0);
        }
        assert!(output.abs() < 0.001, "Highpass should block DC, got {output}");
    }

    #[test]
    fn highpass_7k_passes_treble_cuts_bass() {
        let sr = 44100.0;
        let low = peak_response(&mut BiquadFilter::new(FilterType::Highpass, 7000.0, None, sr), 500.0, sr);
        let high = peak_response(&mut BiquadFilter::new(FilterType::Highpass, 7000.0, None, sr), 15000.0, sr);
        assert!(low < 0.01, "500 Hz should be cut, got {low}");
        assert!(high > 0.8, "15 kHz should pass, got {high}");
    }

    #[test]
    fn bandpass_unity_at_center() {
        let sr = 44100.0;
        let center = peak_response(&mut BiquadFilter::new(FilterType::Bandpass, 2000.0, Some(1.5), sr), 2000.0, sr);
        let far = peak_response(&mut BiquadFilter::new(FilterType::Bandpass, 2000.0, Some(1.5), sr), 100.0, sr);
        assert!((center - 1.0).abs() < 0.02, "center gain should be ~1, got {center}");
        assert!(far < 0.1, "100 Hz should be attenuated, got {far}");
    }

    #[test]
    fn frequency_above_nyquist_stays_finite() {
        let mut f = BiquadFilter::new(FilterType::Highpass, 7000.0, None, 8000.0);
        for i in 0..10000 {
            let input = if i % 100 == 0 { 1.0 } else { 0.0 };
            let out = f.process(input);
            assert!(out.is_finite(), "Filter output not finite at sample {i}");
        }
    }
}
