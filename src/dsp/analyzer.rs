//! Analyzer — byte snapshots of the final mix for visualizers.
//!
//! The analyzer keeps the most recent `fft_size` mono samples. Callers poll
//! it (typically once per display frame); nothing is pushed or queued.
//! Byte mapping follows the browser AnalyserNode conventions.

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::config::EngineConfig;

pub struct Analyzer {
    fft_size: usize,
    smoothing: f64,
    min_decibels: f64,
    max_decibels: f64,
    /// Circular buffer of recent samples; `write` is the oldest slot.
    ring: Vec<f32>,
    write: usize,
    window: Vec<f64>,
    /// Smoothed magnitudes, one per bin.
    magnitudes: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
}

impl Analyzer {
    pub fn new(config: &EngineConfig) -> Self {
        let n = config.fft_size;
        let fft = FftPlanner::<f64>::new().plan_fft_forward(n);
        Analyzer {
            fft_size: n,
            smoothing: config.smoothing_time_constant,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            ring: vec![0.0; n],
            write: 0,
            window: blackman(n),
            magnitudes: vec![0.0; n / 2],
            fft,
            buffer: vec![Complex::new(0.0, 0.0); n],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Record one sample of the mixed signal.
    #[inline]
    pub fn push(&mut self, sample: f32) {
        self.ring[self.write] = sample;
        self.write = (self.write + 1) % self.fft_size;
    }

    /// Samples oldest-first.
    fn samples(&self) -> impl Iterator<Item = f32> + '_ {
        self.ring[self.write..]
            .iter()
            .chain(&self.ring[..self.write])
            .copied()
    }

    /// Byte magnitude spectrum, `frequency_bin_count` entries.
    ///
    /// Each call folds the current window into the smoothed spectrum, so
    /// polling rate affects smoothing just like in a browser.
    pub fn frequency_data(&mut self) -> Vec<u8> {
        let mut out = vec![0; self.frequency_bin_count()];
        self.fill_frequency_data(&mut out);
        out
    }

    /// Like [`frequency_data`](Self::frequency_data), writing into `out`
    /// (truncated to whichever is shorter).
    pub fn fill_frequency_data(&mut self, out: &mut [u8]) {
        let windowed: Vec<Complex<f64>> = self
            .samples()
            .zip(&self.window)
            .map(|(s, w)| Complex::new(s as f64 * w, 0.0))
            .collect();
        self.buffer.copy_from_slice(&windowed);
        self.fft.process(&mut self.buffer);

        let n = self.fft_size as f64;
        let range = self.max_decibels - self.min_decibels;
        for (k, magnitude) in self.magnitudes.iter_mut().enumerate() {
            let current = self.buffer[k].norm() / n;
            *magnitude = self.smoothing * *magnitude + (1.0 - self.smoothing) * current;
        }
        for (byte, &magnitude) in out.iter_mut().zip(&self.magnitudes) {
            let db = if magnitude > 0.0 {
                20.0 * magnitude.log10()
            } else {
                f64::NEG_INFINITY
            };
            let scaled = 255.0 * (db - self.min_decibels) / range;
            *byte = scaled.clamp(0.0, 255.0) as u8;
        }
    }

    /// Byte waveform, `fft_size` entries, 128 = silence.
    pub fn waveform_data(&self) -> Vec<u8> {
        let mut out = vec![0; self.fft_size];
        self.fill_waveform_data(&mut out);
        out
    }

    pub fn fill_waveform_data(&self, out: &mut [u8]) {
        for (byte, s) in out.iter_mut().zip(self.samples()) {
            *byte = (128.0 * (1.0 + s)).clamp(0.0, 255.0) as u8;
        }
    }
}

fn blackman(n: usize) -> Vec<f64> {
    let alpha = 0.16;
    let a0 = 0.5 * (1.0 - alpha);
    let a1 = 0.5;
    let a2 = 0.5 * alpha;
    (0..n)
        .map(|i| {
            let x = i as f64 / n as f64;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer(fft_size: usize, smoothing: f64) -> Analyzer {
        Analyzer::new(&EngineConfig {
            sample_rate: 8000.0,
            fft_size,
            smoothing_time_constant: smoothing,
            ..Default::default()
        })
    }

    #[test]
    fn silence_snapshots() {
        let mut a = analyzer(256, 0.8);
        let freq = a.frequency_data();
        assert_eq!(freq.len(), 128);
        assert!(freq.iter().all(|&b| b == 0));
        let wave = a.waveform_data();
        assert_eq!(wave.len(), 256);
        assert!(wave.iter().all(|&b| b == 128));
    }

    #[test]
    fn sine_peaks_in_its_bin() {
        let mut a = analyzer(256, 0.0);
        // 1 kHz at 8 kHz with 256 bins of 31.25 Hz → bin 32
        for i in 0..256 {
            a.push((2.0 * PI * 1000.0 * i as f64 / 8000.0).sin() as f32 * 0.05);
        }
        let freq = a.frequency_data();
        let (peak_bin, &peak) = freq
            .iter()
            .enumerate()
            .max_by_key(|&(_, b)| *b)
            .expect("non-empty");
        assert_eq!(peak_bin, 32);
        assert!(peak > 200, "peak byte {peak}");
        assert!(freq[100] < peak / 2);
    }

    #[test]
    fn waveform_is_oldest_first() {
        let mut a = analyzer(32, 0.0);
        for i in 0..40 {
            a.push(if i == 39 { 1.0 } else { -1.0 });
        }
        let wave = a.waveform_data();
        assert_eq!(wave[31], 255, "newest sample last");
        assert_eq!(wave[0], 0);
    }

    #[test]
    fn smoothing_lags_changes() {
        let mut smooth = analyzer(256, 0.8);
        let mut raw = analyzer(256, 0.0);
        for i in 0..256 {
            let s = (2.0 * PI * 1000.0 * i as f64 / 8000.0).sin() as f32 * 0.05;
            smooth.push(s);
            raw.push(s);
        }
        let smoothed = smooth.frequency_data()[32];
        let unsmoothed = raw.frequency_data()[32];
        assert!(smoothed < unsmoothed, "{smoothed} should lag {unsmoothed}");
        // polling repeatedly converges
        let mut last = smoothed;
        for _ in 0..50 {
            last = smooth.frequency_data()[32];
        }
        assert!(last.abs_diff(unsmoothed) <= 1);
    }
}
