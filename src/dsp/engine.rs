//! Audio Engine — the facade callers drive.
//!
//! The engine owns the signal bus, an arena of live voices and the registry
//! of held notes. Callers issue note, percussion and level requests between
//! render calls; the host pulls stereo frames with [`AudioEngine::render`]
//! or [`AudioEngine::render_block`]. Engine time is the number of frames
//! rendered so far divided by the sample rate, and every voice is scheduled
//! against it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::config::EngineConfig;
use crate::error::EngineError;

use super::analyzer::Analyzer;
use super::bus::Bus;
use super::envelope::Envelope;
use super::noise::NoiseGenerator;
use super::oscillator::Waveform;
use super::percussion::Percussion;
use super::voice::{Voice, VoiceId};

/// One-shot voices run this long past their nominal duration so the
/// release tail is never cut.
pub const NOTE_TAIL: f64 = 0.05;
/// Detune (cents) of the two oscillators behind a held note.
pub const HELD_DETUNE: f64 = 6.0;
/// Attack ramp of a held note.
pub const HELD_ATTACK: f64 = 0.015;
/// Time constant of the fade applied when a held note is released.
pub const HELD_RELEASE_TIME_CONSTANT: f64 = 0.05;
/// Delay between releasing a held note and stopping its oscillators.
pub const HELD_STOP_GRACE: f64 = 0.3;

/// Parameters of a one-shot note.
///
/// Deserializes from camelCase JSON with every field optional, which is how
/// the WASM facade receives it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NoteConfig {
    /// Hz, must be positive.
    pub frequency: f64,
    pub wave: Waveform,
    pub volume: f64,
    /// Seconds from start until the envelope reaches zero.
    pub duration: f64,
    pub attack: f64,
    pub decay: f64,
    /// Fraction of `volume` held after the decay.
    pub sustain: f64,
    pub release: f64,
    /// Cents.
    pub detune: f64,
    /// Stereo position in [-1, 1].
    pub pan: f64,
}

impl NoteConfig {
    /// Defaults for everything but the pitch.
    pub fn new(frequency: f64) -> Self {
        NoteConfig {
            frequency,
            ..Default::default()
        }
    }

    /// Replace non-finite levels and timings with their defaults.
    fn sanitized(self) -> Self {
        let defaults = NoteConfig::default();
        let pick = |value: f64, default: f64| if value.is_finite() { value } else { default };
        NoteConfig {
            volume: pick(self.volume, defaults.volume),
            duration: pick(self.duration, defaults.duration),
            attack: pick(self.attack, defaults.attack),
            decay: pick(self.decay, defaults.decay),
            sustain: pick(self.sustain, defaults.sustain),
            release: pick(self.release, defaults.release),
            detune: pick(self.detune, defaults.detune),
            pan: pick(self.pan, defaults.pan),
            ..self
        }
    }

    fn envelope(&self) -> Envelope {
        Envelope {
            volume: self.volume,
            attack: self.attack,
            decay: self.decay,
            sustain: self.sustain,
            release: self.release,
            duration: self.duration,
        }
    }
}

impl Default for NoteConfig {
    fn default() -> Self {
        NoteConfig {
            frequency: 440.0,
            wave: Waveform::Sine,
            volume: 0.5,
            duration: 0.5,
            attack: 0.01,
            decay: 0.1,
            sustain: 0.7,
            release: 0.3,
            detune: 0.0,
            pan: 0.0,
        }
    }
}

/// The real-time synthesis engine.
pub struct AudioEngine {
    config: EngineConfig,
    sample_rate: f64,
    /// Frames rendered while running.
    frames: u64,
    running: bool,
    bus: Bus,
    noise: NoiseGenerator,
    voices: Vec<(VoiceId, Voice)>,
    /// Held note id → the voice currently sounding it.
    held: HashMap<String, VoiceId>,
    next_voice_id: VoiceId,
}

impl AudioEngine {
    /// Build the engine and its bus. The engine starts suspended.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let mut noise = NoiseGenerator::new(config.seed);
        let bus = Bus::new(&config, &mut noise);
        info!(
            sample_rate = config.sample_rate,
            fft_size = config.fft_size,
            "audio engine created"
        );
        Ok(AudioEngine {
            sample_rate: config.sample_rate,
            config,
            frames: 0,
            running: false,
            bus,
            noise,
            voices: Vec::new(),
            held: HashMap::new(),
            next_voice_id: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Engine clock in seconds.
    pub fn current_time(&self) -> f64 {
        self.frames as f64 / self.sample_rate
    }

    pub fn resume(&mut self) {
        if !self.running {
            self.running = true;
            info!(time = self.current_time(), "audio engine resumed");
        }
    }

    /// Output silence and freeze the clock until the next `resume`.
    pub fn suspend(&mut self) {
        if self.running {
            self.running = false;
            info!(time = self.current_time(), "audio engine suspended");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn add_voice(&mut self, voice: Voice) -> VoiceId {
        let id = self.next_voice_id;
        self.next_voice_id += 1;
        trace!(voice = id, stop = ?voice.stop_time(), "voice scheduled");
        self.voices.push((id, voice));
        id
    }

    fn voice_mut(&mut self, id: VoiceId) -> Option<&mut Voice> {
        self.voices
            .iter_mut()
            .find(|(vid, _)| *vid == id)
            .map(|(_, voice)| voice)
    }

    /// Fire-and-forget note shaped by the ADSR envelope.
    pub fn play_note(&mut self, note: NoteConfig) {
        if !(note.frequency.is_finite() && note.frequency > 0.0) {
            debug!(frequency = note.frequency, "ignoring note with invalid frequency");
            return;
        }
        let note = note.sanitized();
        let now = self.current_time();
        let stop = now + note.duration.max(0.0) + NOTE_TAIL;
        let mut voice = Voice::oscillator(note.wave, note.frequency, note.detune, self.sample_rate)
            .with_pan(note.pan)
            .scheduled(now, stop);
        note.envelope().apply(voice.gain_mut(), now);
        self.add_voice(voice);
    }

    /// Start a sustained note under `id`, replacing any note already held
    /// under it.
    pub fn start_note(&mut self, id: &str, frequency: f64, wave: Waveform, volume: f64) -> Option<VoiceId> {
        if !(frequency.is_finite() && frequency > 0.0) {
            debug!(id, frequency, "ignoring held note with invalid frequency");
            return None;
        }
        self.stop_note(id);
        let now = self.current_time();
        let mut voice = Voice::unison(wave, frequency, &[-HELD_DETUNE, HELD_DETUNE], self.sample_rate);
        let gain = voice.gain_mut();
        gain.set_value_at(0.0, now);
        gain.linear_ramp_to(volume * 0.5, now + HELD_ATTACK);
        voice.start(now);

        let voice_id = self.add_voice(voice);
        self.held.insert(id.to_string(), voice_id);
        debug!(id, frequency, ?wave, voice = voice_id, "held note started");
        Some(voice_id)
    }

    /// Release the note held under `id`. Unknown ids are ignored.
    ///
    /// The id is free again immediately; the old voice fades out and its
    /// oscillators stop after a short grace period.
    pub fn stop_note(&mut self, id: &str) {
        let Some(voice_id) = self.held.remove(id) else {
            return;
        };
        let now = self.current_time();
        debug!(id, voice = voice_id, "held note released");
        let Some(voice) = self.voice_mut(voice_id) else {
            return;
        };
        let gain = voice.gain_mut();
        gain.cancel_and_hold_at(now);
        gain.set_target_at(0.0, now, HELD_RELEASE_TIME_CONSTANT);
        if let Err(err) = voice.stop(now + HELD_STOP_GRACE) {
            trace!(voice = voice_id, %err, "ignoring stop of finished voice");
        }
    }

    /// Release every held note.
    pub fn stop_all_notes(&mut self) {
        let ids: Vec<String> = self.held.keys().cloned().collect();
        for id in ids {
            self.stop_note(&id);
        }
    }

    pub fn trigger_percussion(&mut self, sound: Percussion) {
        let now = self.current_time();
        debug!(%sound, time = now, "percussion triggered");
        for voice in sound.voices(now, self.sample_rate, &mut self.noise) {
            self.add_voice(voice);
        }
    }

    /// Trigger a percussion sound by its pad name (`kick`, `snare`, `hihat`,
    /// `openhh`, `clap`).
    pub fn trigger_percussion_named(&mut self, name: &str) -> Result<(), EngineError> {
        let sound: Percussion = name.parse()?;
        self.trigger_percussion(sound);
        Ok(())
    }

    pub fn set_master_volume(&mut self, volume: f64) {
        self.bus.set_master_volume(volume);
        debug!(volume = self.bus.master_volume(), "master volume set");
    }

    pub fn set_reverb_amount(&mut self, amount: f64) {
        self.bus.set_reverb_amount(amount);
        debug!(
            dry = self.bus.dry_level(),
            wet = self.bus.wet_level(),
            "reverb amount set"
        );
    }

    /// Target master level (after clamping).
    pub fn master_volume(&self) -> f64 {
        self.bus.master_volume()
    }

    pub fn dry_level(&self) -> f64 {
        self.bus.dry_level()
    }

    pub fn wet_level(&self) -> f64 {
        self.bus.wet_level()
    }

    pub fn compressor_reduction(&self) -> f64 {
        self.bus.compressor_reduction()
    }

    #[inline]
    fn next_frame(&mut self) -> (f32, f32) {
        if !self.running {
            return (0.0, 0.0);
        }
        let t = self.current_time();
        let (mut left, mut right) = (0.0, 0.0);
        for (_, voice) in self.voices.iter_mut() {
            let (l, r) = voice.next_frame(t);
            left += l;
            right += r;
        }
        self.frames += 1;
        self.bus.process(left, right)
    }

    /// Drop finished voices and automation that is already in the past.
    fn end_block(&mut self) {
        let now = self.current_time();
        let before = self.voices.len();
        self.voices.retain(|(_, voice)| !voice.is_finished(now));
        for (_, voice) in self.voices.iter_mut() {
            voice.prune(now);
        }
        let reaped = before - self.voices.len();
        if reaped > 0 {
            trace!(reaped, live = self.voices.len(), "voices reaped");
        }
    }

    /// Fill `out` with interleaved stereo frames. A trailing odd sample is
    /// zeroed.
    pub fn render(&mut self, out: &mut [f32]) {
        let mut frames = out.chunks_exact_mut(2);
        for frame in &mut frames {
            let (l, r) = self.next_frame();
            frame[0] = l;
            frame[1] = r;
        }
        frames.into_remainder().fill(0.0);
        self.end_block();
    }

    /// Fill planar buffers; renders as many frames as the shorter one holds.
    pub fn render_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            (*l, *r) = self.next_frame();
        }
        self.end_block();
    }

    pub fn analyzer(&self) -> &Analyzer {
        self.bus.analyzer()
    }

    /// Byte spectrum of the mixed output.
    pub fn frequency_data(&mut self) -> Vec<u8> {
        self.bus.analyzer_mut().frequency_data()
    }

    /// Byte waveform of the mixed output.
    pub fn waveform_data(&self) -> Vec<u8> {
        self.bus.analyzer().waveform_data()
    }

    pub fn fill_frequency_data(&mut self, out: &mut [u8]) {
        self.bus.analyzer_mut().fill_frequency_data(out);
    }

    pub fn fill_waveform_data(&self, out: &mut [u8]) {
        self.bus.analyzer().fill_waveform_data(out);
    }

    /// Voices still in the arena, including fading and scheduled ones.
    pub fn active_voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn held_note_count(&self) -> usize {
        self.held.len()
    }

    pub fn is_held(&self, id: &str) -> bool {
        self.held.contains_key(id)
    }

    pub fn held_voice(&self, id: &str) -> Option<VoiceId> {
        self.held.get(id).copied()
    }
}
