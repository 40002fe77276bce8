//! Voice — one sounding unit: sources → optional filter → gain → optional pan.

use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use crate::error::VoiceError;

use super::filter::BiquadFilter;
use super::oscillator::{Oscillator, Waveform};
use super::param::Param;

/// Engine-unique voice handle.
pub type VoiceId = u64;

/// Signal generator feeding a voice.
#[derive(Debug, Clone)]
enum Source {
    Oscillator { osc: Oscillator, frequency: Param },
    /// One-shot buffer playback; silent once the buffer runs out.
    Noise { buffer: Arc<[f64]>, position: usize },
}

impl Source {
    fn next_sample(&mut self, t: f64) -> f64 {
        match self {
            Source::Oscillator { osc, frequency } => {
                osc.frequency = frequency.value_at(t);
                osc.next_sample()
            }
            Source::Noise { buffer, position } => {
                let s = buffer.get(*position).copied().unwrap_or(0.0);
                *position += 1;
                s
            }
        }
    }
}

/// A voice with a start/stop lifecycle on the engine clock.
///
/// All sources share one gain stage. Before `start` and from `stop` onward
/// the voice is silent; once stopped it reports finished and the engine
/// drops it.
#[derive(Debug, Clone)]
pub struct Voice {
    sources: Vec<Source>,
    filter: Option<BiquadFilter>,
    gain: Param,
    /// Equal-power (left, right) gains; `None` sends the mono signal to both.
    pan: Option<(f64, f64)>,
    start_time: f64,
    stop_time: Option<f64>,
}

impl Voice {
    fn with_sources(sources: Vec<Source>) -> Self {
        Voice {
            sources,
            filter: None,
            gain: Param::new(1.0),
            pan: None,
            start_time: 0.0,
            stop_time: None,
        }
    }

    /// A single oscillator voice.
    pub fn oscillator(waveform: Waveform, frequency: f64, detune: f64, sample_rate: f64) -> Self {
        Voice::unison(waveform, frequency, &[detune], sample_rate)
    }

    /// One oscillator per detune amount (cents), all at `frequency`.
    pub fn unison(waveform: Waveform, frequency: f64, detunes: &[f64], sample_rate: f64) -> Self {
        let sources = detunes
            .iter()
            .map(|&detune| {
                let mut osc = Oscillator::new(waveform, sample_rate);
                osc.detune = detune;
                Source::Oscillator {
                    osc,
                    frequency: Param::new(frequency),
                }
            })
            .collect();
        Voice::with_sources(sources)
    }

    /// Plays `buffer` once.
    pub fn noise(buffer: Arc<[f64]>) -> Self {
        Voice::with_sources(vec![Source::Noise {
            buffer,
            position: 0,
        }])
    }

    pub fn with_filter(mut self, filter: BiquadFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Stereo position in [-1, 1] (clamped).
    pub fn with_pan(mut self, pan: f64) -> Self {
        let x = (pan.clamp(-1.0, 1.0) + 1.0) / 2.0;
        self.pan = Some(((x * FRAC_PI_2).cos(), (x * FRAC_PI_2).sin()));
        self
    }

    pub fn gain_mut(&mut self) -> &mut Param {
        &mut self.gain
    }

    /// Frequency automation of every oscillator source.
    pub fn frequencies_mut(&mut self) -> impl Iterator<Item = &mut Param> {
        self.sources.iter_mut().filter_map(|s| match s {
            Source::Oscillator { frequency, .. } => Some(frequency),
            Source::Noise { .. } => None,
        })
    }

    /// One-shot lifetime for a voice that has not been scheduled yet.
    pub fn scheduled(mut self, start: f64, stop: f64) -> Self {
        self.start_time = start;
        self.stop_time = Some(stop.max(start));
        self
    }

    pub fn start(&mut self, at: f64) {
        self.start_time = at;
    }

    /// Schedule the end of the voice. A voice can only be stopped once.
    pub fn stop(&mut self, at: f64) -> Result<(), VoiceError> {
        if self.stop_time.is_some() {
            return Err(VoiceError::AlreadyStopped);
        }
        self.stop_time = Some(at.max(self.start_time));
        Ok(())
    }

    pub fn stop_time(&self) -> Option<f64> {
        self.stop_time
    }

    pub fn is_finished(&self, t: f64) -> bool {
        self.stop_time.is_some_and(|stop| t >= stop)
    }

    fn is_sounding(&self, t: f64) -> bool {
        t >= self.start_time && !self.is_finished(t)
    }

    /// Render the stereo frame at engine time `t`.
    pub fn next_frame(&mut self, t: f64) -> (f64, f64) {
        if !self.is_sounding(t) {
            return (0.0, 0.0);
        }
        let mut s: f64 = self.sources.iter_mut().map(|src| src.next_sample(t)).sum();
        if let Some(filter) = self.filter.as_mut() {
            s = filter.process(s);
        }
        s *= self.gain.value_at(t);
        match self.pan {
            Some((left, right)) => (s * left, s * right),
            None => (s, s),
        }
    }

    /// Forget automation that is already in the past.
    pub fn prune(&mut self, t: f64) {
        self.gain.prune_before(t);
        for frequency in self.frequencies_mut() {
            frequency.prune_before(t);
        }
    }
}
