//! Reverb — stereo convolution with a generated impulse response.
//!
//! Uniformly partitioned overlap-save convolution: the impulse response is
//! cut into blocks, each block's spectrum is multiplied against the
//! matching delayed input spectrum, and the sum is transformed back once
//! per block. Output lags input by one block.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Partition length in samples (and the reverb's latency).
pub const BLOCK_SIZE: usize = 512;

/// Browser convolvers scale normalized responses by -58 dB.
const GAIN_CALIBRATION: f32 = 0.001_25;
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44100.0;
const MIN_POWER: f32 = 0.000_125;

/// One channel of partitioned convolution.
struct ChannelConvolver {
    /// Spectra of the zero-padded impulse partitions.
    partitions: Vec<Vec<Complex<f32>>>,
    /// Input spectra, newest at `head`.
    history: Vec<Vec<Complex<f32>>>,
    head: usize,
    /// Previous block followed by the block being filled.
    window: Vec<f32>,
    output: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    accum: Vec<Complex<f32>>,
}

impl ChannelConvolver {
    fn new(impulse: &[f32], scale: f32, fft: &dyn Fft<f32>, scratch: &mut [Complex<f32>]) -> Self {
        let fft_len = 2 * BLOCK_SIZE;
        let partitions: Vec<Vec<Complex<f32>>> = impulse
            .chunks(BLOCK_SIZE)
            .map(|chunk| {
                let mut spectrum = vec![Complex::new(0.0, 0.0); fft_len];
                for (slot, &h) in spectrum.iter_mut().zip(chunk) {
                    slot.re = h * scale;
                }
                fft.process_with_scratch(&mut spectrum, scratch);
                spectrum
            })
            .collect();
        let count = partitions.len().max(1);

        ChannelConvolver {
            partitions,
            history: vec![vec![Complex::new(0.0, 0.0); fft_len]; count],
            head: 0,
            window: vec![0.0; fft_len],
            output: vec![0.0; BLOCK_SIZE],
            spectrum: vec![Complex::new(0.0, 0.0); fft_len],
            accum: vec![Complex::new(0.0, 0.0); fft_len],
        }
    }

    fn process_block(&mut self, fft: &dyn Fft<f32>, ifft: &dyn Fft<f32>, scratch: &mut [Complex<f32>]) {
        for (slot, &x) in self.spectrum.iter_mut().zip(&self.window) {
            *slot = Complex::new(x, 0.0);
        }
        fft.process_with_scratch(&mut self.spectrum, scratch);

        let count = self.history.len();
        self.head = (self.head + count - 1) % count;
        self.history[self.head].copy_from_slice(&self.spectrum);

        self.accum.fill(Complex::new(0.0, 0.0));
        for (k, partition) in self.partitions.iter().enumerate() {
            let input = &self.history[(self.head + k) % count];
            for ((acc, x), h) in self.accum.iter_mut().zip(input).zip(partition) {
                *acc += x * h;
            }
        }
        ifft.process_with_scratch(&mut self.accum, scratch);

        // Only the second half of a circular frame is alias-free.
        let norm = 1.0 / (2 * BLOCK_SIZE) as f32;
        for (out, y) in self.output.iter_mut().zip(&self.accum[BLOCK_SIZE..]) {
            *out = y.re * norm;
        }
        self.window.copy_within(BLOCK_SIZE.., 0);
    }
}

/// Stereo convolution reverb. Left input convolves with the left response,
/// right with the right.
pub struct ConvolutionReverb {
    channels: [ChannelConvolver; 2],
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    position: usize,
}

impl ConvolutionReverb {
    /// Build from a stereo impulse response, normalized the way browser
    /// convolvers normalize theirs.
    pub fn new(impulse: &[Vec<f32>; 2], sample_rate: f64) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(2 * BLOCK_SIZE);
        let ifft = planner.plan_fft_inverse(2 * BLOCK_SIZE);
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len());
        let mut scratch = vec![Complex::new(0.0, 0.0); scratch_len];

        let scale = normalization_scale(impulse, sample_rate as f32);
        let left = ChannelConvolver::new(&impulse[0], scale, fft.as_ref(), &mut scratch);
        let right = ChannelConvolver::new(&impulse[1], scale, fft.as_ref(), &mut scratch);

        ConvolutionReverb {
            channels: [left, right],
            fft,
            ifft,
            scratch,
            position: 0,
        }
    }

    /// Push one stereo frame in, get the (block-delayed) wet frame out.
    #[inline]
    pub fn process(&mut self, left: f64, right: f64) -> (f64, f64) {
        let pos = self.position;
        let out = (
            self.channels[0].output[pos] as f64,
            self.channels[1].output[pos] as f64,
        );
        self.channels[0].window[BLOCK_SIZE + pos] = left as f32;
        self.channels[1].window[BLOCK_SIZE + pos] = right as f32;

        self.position += 1;
        if self.position == BLOCK_SIZE {
            self.position = 0;
            for channel in self.channels.iter_mut() {
                channel.process_block(self.fft.as_ref(), self.ifft.as_ref(), &mut self.scratch);
            }
        }
        out
    }
}

fn normalization_scale(impulse: &[Vec<f32>; 2], sample_rate: f32) -> f32 {
    let len = impulse[0].len().max(1);
    let power: f32 = impulse.iter().flatten().map(|s| s * s).sum();
    let power = (power / (impulse.len() * len) as f32).sqrt().max(MIN_POWER);
    GAIN_CALIBRATION / power * GAIN_CALIBRATION_SAMPLE_RATE / sample_rate
}
