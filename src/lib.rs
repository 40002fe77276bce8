pub mod config;
#[cfg(feature = "device")]
pub mod device;
pub mod dsp;
pub mod error;
pub mod pitch;
pub mod scheduler;
pub mod song;
pub mod wasm;

use wasm_bindgen::prelude::*;

pub use crate::config::EngineConfig;
pub use crate::dsp::engine::{AudioEngine, NoteConfig};
pub use crate::dsp::oscillator::Waveform;
pub use crate::dsp::percussion::Percussion;
pub use crate::error::EngineError;
pub use crate::scheduler::{ArpeggioConfig, NotePlayer, PlaybackHandle, Scheduler};
pub use crate::song::{Song, SongMetadata, SongNote};

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the pulsesynth-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Resolve a pitch name and play it once with default note settings.
/// Unknown names are ignored; returns whether a note was played.
pub fn play_pitch(engine: &mut AudioEngine, name: &str) -> bool {
    match pitch::frequency(name) {
        Some(frequency) => {
            engine.play_note(NoteConfig::new(frequency));
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn play_pitch_skips_unknown_names() {
        let mut engine = AudioEngine::new(EngineConfig {
            sample_rate: 8000.0,
            reverb_seconds: 0.25,
            fft_size: 256,
            ..Default::default()
        })
        .expect("valid config");
        assert!(play_pitch(&mut engine, "C#4"));
        assert!(!play_pitch(&mut engine, "C9"));
        assert!(!play_pitch(&mut engine, "middle C"));
        assert_eq!(engine.active_voice_count(), 1);
    }
}
