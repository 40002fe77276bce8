//! Browser bindings.
//!
//! A page creates one [`WasmSynth`], pulls audio blocks from it inside an
//! AudioWorklet (`render`), and drives it from UI events. Song callbacks
//! cannot call back into JS from the audio thread, so played notes are
//! queued and collected with `takePlayedNotes`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;

use crate::config::EngineConfig;
use crate::dsp::engine::{AudioEngine, NoteConfig};
use crate::dsp::oscillator::Waveform;
use crate::pitch;
use crate::scheduler::{ArpeggioConfig, PlaybackHandle, Scheduler};
use crate::song::{self, Song};

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{err}"))
}

#[wasm_bindgen]
pub struct WasmSynth {
    engine: AudioEngine,
    scheduler: Scheduler<AudioEngine>,
    song: Option<PlaybackHandle>,
    arpeggio: Option<PlaybackHandle>,
    played: Rc<RefCell<Vec<String>>>,
    song_finished: Rc<Cell<bool>>,
}

#[wasm_bindgen]
impl WasmSynth {
    /// Build from an optional JSON [`EngineConfig`].
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<WasmSynth, JsValue> {
        let config = match config_json {
            Some(json) => EngineConfig::from_json(&json).map_err(js_error)?,
            None => EngineConfig::default(),
        };
        Ok(WasmSynth {
            engine: AudioEngine::new(config).map_err(js_error)?,
            scheduler: Scheduler::new(),
            song: None,
            arpeggio: None,
            played: Rc::new(RefCell::new(Vec::new())),
            song_finished: Rc::new(Cell::new(false)),
        })
    }

    pub fn resume(&mut self) {
        self.engine.resume();
    }

    pub fn suspend(&mut self) {
        self.engine.suspend();
    }

    #[wasm_bindgen(js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    #[wasm_bindgen(js_name = currentTime)]
    pub fn current_time(&self) -> f64 {
        self.engine.current_time()
    }

    #[wasm_bindgen(js_name = sampleRate)]
    pub fn sample_rate(&self) -> f64 {
        self.engine.sample_rate()
    }

    /// Run due scheduler tasks, then render `frames` interleaved stereo frames.
    pub fn render(&mut self, frames: usize) -> Vec<f32> {
        self.tick();
        let mut out = vec![0.0; frames * 2];
        self.engine.render(&mut out);
        out
    }

    /// Advance the song scheduler to the engine clock.
    pub fn tick(&mut self) -> usize {
        let now = self.engine.current_time();
        self.scheduler.advance_to(now, &mut self.engine)
    }

    /// Play a one-shot note from a `NoteConfig`-shaped object.
    #[wasm_bindgen(js_name = playNote)]
    pub fn play_note(&mut self, note: JsValue) -> Result<(), JsValue> {
        let note: NoteConfig = serde_wasm_bindgen::from_value(note).map_err(js_error)?;
        self.engine.play_note(note);
        Ok(())
    }

    /// Hold a note by pitch name; the name is also its id. Unknown names
    /// are ignored.
    #[wasm_bindgen(js_name = startNote)]
    pub fn start_note(&mut self, note: &str, wave: Option<String>, volume: Option<f64>) {
        let Some(frequency) = pitch::frequency(note) else {
            return;
        };
        let wave = wave.as_deref().and_then(Waveform::from_name).unwrap_or_default();
        self.engine.start_note(note, frequency, wave, volume.unwrap_or(0.5));
    }

    #[wasm_bindgen(js_name = stopNote)]
    pub fn stop_note(&mut self, id: &str) {
        self.engine.stop_note(id);
    }

    #[wasm_bindgen(js_name = stopAllNotes)]
    pub fn stop_all_notes(&mut self) {
        self.engine.stop_all_notes();
    }

    /// Trigger `kick`, `snare`, `hihat`, `openhh` or `clap`.
    pub fn trigger(&mut self, name: &str) -> Result<(), JsValue> {
        self.engine.trigger_percussion_named(name).map_err(js_error)
    }

    #[wasm_bindgen(js_name = setMasterVolume)]
    pub fn set_master_volume(&mut self, volume: f64) {
        self.engine.set_master_volume(volume);
    }

    #[wasm_bindgen(js_name = setReverbAmount)]
    pub fn set_reverb_amount(&mut self, amount: f64) {
        self.engine.set_reverb_amount(amount);
    }

    /// Play a bundled song. Returns false for an unknown id.
    #[wasm_bindgen(js_name = playDemo)]
    pub fn play_demo(&mut self, id: &str) -> Result<bool, JsValue> {
        match song::find_demo(id).map_err(js_error)? {
            Some(song) => {
                self.start_song(&song);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Play a song given as JSON.
    #[wasm_bindgen(js_name = playSongJson)]
    pub fn play_song_json(&mut self, json: &str) -> Result<(), JsValue> {
        let song = Song::from_json(json).map_err(js_error)?;
        self.start_song(&song);
        Ok(())
    }

    #[wasm_bindgen(js_name = stopSong)]
    pub fn stop_song(&mut self) {
        if let Some(handle) = self.song.take() {
            self.scheduler.cancel(&handle);
        }
    }

    #[wasm_bindgen(js_name = songFinished)]
    pub fn song_finished(&self) -> bool {
        self.song_finished.get()
    }

    /// Pitch names played by the song since the last call.
    #[wasm_bindgen(js_name = takePlayedNotes)]
    pub fn take_played_notes(&mut self) -> Vec<String> {
        std::mem::take(&mut *self.played.borrow_mut())
    }

    /// Start the arpeggiator over an array of pitch names, replacing any
    /// running one.
    #[wasm_bindgen(js_name = playArpeggio)]
    pub fn play_arpeggio(
        &mut self,
        notes: JsValue,
        wave: Option<String>,
        interval_ms: Option<f64>,
        volume: Option<f64>,
    ) -> Result<(), JsValue> {
        let notes: Vec<String> = serde_wasm_bindgen::from_value(notes).map_err(js_error)?;
        let defaults = ArpeggioConfig::default();
        let config = ArpeggioConfig {
            wave: wave.as_deref().and_then(Waveform::from_name).unwrap_or(defaults.wave),
            interval: interval_ms.map_or(defaults.interval, |ms| ms / 1000.0),
            volume: volume.unwrap_or(defaults.volume),
        };
        self.stop_arpeggio();
        let names: Vec<&str> = notes.iter().map(String::as_str).collect();
        self.arpeggio = Some(self.scheduler.play_arpeggio(&names, config));
        Ok(())
    }

    #[wasm_bindgen(js_name = stopArpeggio)]
    pub fn stop_arpeggio(&mut self) {
        if let Some(handle) = self.arpeggio.take() {
            self.scheduler.cancel(&handle);
        }
    }

    #[wasm_bindgen(js_name = frequencyData)]
    pub fn frequency_data(&mut self) -> Vec<u8> {
        self.engine.frequency_data()
    }

    #[wasm_bindgen(js_name = waveformData)]
    pub fn waveform_data(&self) -> Vec<u8> {
        self.engine.waveform_data()
    }

    #[wasm_bindgen(js_name = frequencyBinCount)]
    pub fn frequency_bin_count(&self) -> usize {
        self.engine.analyzer().frequency_bin_count()
    }

    #[wasm_bindgen(js_name = activeVoiceCount)]
    pub fn active_voice_count(&self) -> usize {
        self.engine.active_voice_count()
    }
}

impl WasmSynth {
    /// Replace the running song with `song`, starting now.
    fn start_song(&mut self, song: &Song) {
        self.stop_song();
        self.song_finished.set(false);
        self.played.borrow_mut().clear();

        let played = Rc::clone(&self.played);
        let finished = Rc::clone(&self.song_finished);
        let now = self.engine.current_time();
        self.scheduler.advance_to(now, &mut self.engine);
        self.song = Some(self.scheduler.play_song(
            song,
            Some(Box::new(move |note: &str| played.borrow_mut().push(note.to_string()))),
            Some(Box::new(move || finished.set(true))),
        ));
    }
}

/// The bundled catalog as an array of song objects.
#[wasm_bindgen(js_name = demoSongs)]
pub fn demo_songs() -> Result<JsValue, JsValue> {
    let songs = song::demo_songs().map_err(js_error)?;
    serde_wasm_bindgen::to_value(&songs).map_err(js_error)
}

/// Frequency of a pitch name, or undefined.
#[wasm_bindgen(js_name = noteFrequency)]
pub fn note_frequency(name: &str) -> Option<f64> {
    pitch::frequency(name)
}
