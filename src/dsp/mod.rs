//! DSP Engine — pure Rust real-time synthesis.
//!
//! Leaf generators (oscillators, noise, filters) feed voices; voices feed
//! the fixed bus (compressor, convolution reverb, master gain, analyzer);
//! [`engine::AudioEngine`] ties them together behind a pull-based render
//! call that a browser AudioWorklet or a native output stream drives.

pub mod analyzer;
pub mod bus;
pub mod compressor;
pub mod engine;
pub mod envelope;
pub mod filter;
pub mod noise;
pub mod oscillator;
pub mod param;
pub mod percussion;
pub mod reverb;
pub mod voice;
