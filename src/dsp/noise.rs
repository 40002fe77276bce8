//! Noise sources — white-noise buffers and the procedural reverb impulse.

use std::sync::Arc;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Seeded white-noise generator shared by every noise consumer in an engine.
#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    rng: StdRng,
}

impl NoiseGenerator {
    pub fn new(seed: u64) -> Self {
        NoiseGenerator {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Next uniform sample in [-1, 1).
    pub fn next_sample(&mut self) -> f64 {
        self.rng.gen_range(-1.0..1.0)
    }

    /// A mono buffer of `seconds` of white noise.
    pub fn buffer(&mut self, seconds: f64, sample_rate: f64) -> Arc<[f64]> {
        let len = (seconds * sample_rate).round() as usize;
        (0..len).map(|_| self.next_sample()).collect()
    }

    /// Stereo impulse response: noise shaped by `(1 - n/len)^decay`.
    pub fn impulse_response(
        &mut self,
        seconds: f64,
        decay: f64,
        sample_rate: f64,
    ) -> [Vec<f32>; 2] {
        let len = (seconds * sample_rate).round() as usize;
        let mut channel = || -> Vec<f32> {
            (0..len)
                .map(|i| {
                    let shape = (1.0 - i as f64 / len as f64).powf(decay);
                    (self.next_sample() * shape) as f32
                })
                .collect()
        };
        let left = channel();
        let right = channel();
        [left, right]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_length_and_range() {
        let mut noise = NoiseGenerator::new(1);
        let buf = noise.buffer(0.2, 8000.0);
        assert_eq!(buf.len(), 1600);
        assert!(buf.iter().all(|s| (-1.0..1.0).contains(s)));
        assert!(buf.iter().any(|s| s.abs() > 0.5), "noise should not be silent");
    }

    #[test]
    fn same_seed_same_noise() {
        let a = NoiseGenerator::new(42).buffer(0.01, 8000.0);
        let b = NoiseGenerator::new(42).buffer(0.01, 8000.0);
        assert_eq!(a, b);
    }

    #[test]
    fn impulse_decays_and_channels_differ() {
        let [left, right] = NoiseGenerator::new(7).impulse_response(1.0, 2.0, 8000.0);
        assert_eq!(left.len(), 8000);
        assert_eq!(right.len(), 8000);
        assert_ne!(left, right, "channels should be decorrelated");

        let head: f32 = left[..800].iter().map(|s| s.abs()).sum();
        let tail: f32 = left[7200..].iter().map(|s| s.abs()).sum();
        assert!(tail < head * 0.05, "tail {tail} should be far below head {head}");
    }
}
