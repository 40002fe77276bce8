//! Percussion — fixed one-shot drum recipes built from voices.

use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

use super::filter::{BiquadFilter, FilterType};
use super::noise::NoiseGenerator;
use super::oscillator::Waveform;
use super::voice::Voice;

/// Exponential ramps decay toward this instead of zero.
pub const SILENCE_FLOOR: f64 = 0.001;

/// The drum sounds the engine can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Percussion {
    Kick,
    Snare,
    HiHat { open: bool },
    Clap,
}

impl Percussion {
    /// Time from trigger until every source of the sound has stopped.
    pub fn duration(self) -> f64 {
        match self {
            Percussion::Kick => 0.4,
            Percussion::Snare => 0.22,
            Percussion::HiHat { open: false } => 0.10,
            Percussion::HiHat { open: true } => 0.42,
            Percussion::Clap => 0.12,
        }
    }

    /// Build the voices for one hit starting at engine time `now`.
    pub fn voices(self, now: f64, sample_rate: f64, noise: &mut NoiseGenerator) -> Vec<Voice> {
        match self {
            Percussion::Kick => vec![kick(now, sample_rate)],
            Percussion::Snare => snare(now, sample_rate, noise),
            Percussion::HiHat { open } => vec![hihat(now, open, sample_rate, noise)],
            Percussion::Clap => clap(now, sample_rate, noise),
        }
    }
}

impl FromStr for Percussion {
    type Err = EngineError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "kick" => Ok(Percussion::Kick),
            "snare" => Ok(Percussion::Snare),
            "hihat" => Ok(Percussion::HiHat { open: false }),
            "openhh" | "open-hihat" => Ok(Percussion::HiHat { open: true }),
            "clap" => Ok(Percussion::Clap),
            other => Err(EngineError::UnknownPercussion(other.to_string())),
        }
    }
}

impl fmt::Display for Percussion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Percussion::Kick => "kick",
            Percussion::Snare => "snare",
            Percussion::HiHat { open: false } => "hihat",
            Percussion::HiHat { open: true } => "openhh",
            Percussion::Clap => "clap",
        };
        f.write_str(name)
    }
}

/// Gain starts at `peak` and decays exponentially to the floor by `end`.
fn decay(voice: &mut Voice, peak: f64, start: f64, end: f64) {
    let gain = voice.gain_mut();
    gain.set_value_at(peak, start);
    gain.exponential_ramp_to(SILENCE_FLOOR, end);
}

/// Sine sweeping 150 → 30 Hz.
fn kick(now: f64, sample_rate: f64) -> Voice {
    let mut voice = Voice::oscillator(Waveform::Sine, 150.0, 0.0, sample_rate).scheduled(now, now + 0.4);
    for frequency in voice.frequencies_mut() {
        frequency.set_value_at(150.0, now);
        frequency.exponential_ramp_to(30.0, now + 0.35);
    }
    decay(&mut voice, 1.0, now, now + 0.4);
    voice
}

/// Noise burst layered over a 200 Hz triangle body.
fn snare(now: f64, sample_rate: f64, noise: &mut NoiseGenerator) -> Vec<Voice> {
    let mut rattle = Voice::noise(noise.buffer(0.2, sample_rate)).scheduled(now, now + 0.22);
    decay(&mut rattle, 0.8, now, now + 0.2);

    let mut body = Voice::oscillator(Waveform::Triangle, 200.0, 0.0, sample_rate).scheduled(now, now + 0.14);
    decay(&mut body, 0.7, now, now + 0.12);

    vec![rattle, body]
}

/// High-passed noise; open hats ring longer.
fn hihat(now: f64, open: bool, sample_rate: f64, noise: &mut NoiseGenerator) -> Voice {
    let (ring, buffer_len) = if open { (0.4, 0.45) } else { (0.08, 0.12) };
    let filter = BiquadFilter::new(FilterType::Highpass, 7000.0, None, sample_rate);
    let mut voice = Voice::noise(noise.buffer(buffer_len, sample_rate))
        .with_filter(filter)
        .scheduled(now, now + ring + 0.02);
    decay(&mut voice, 0.5, now, now + ring);
    voice
}

/// Three band-passed bursts 10 ms apart.
fn clap(now: f64, sample_rate: f64, noise: &mut NoiseGenerator) -> Vec<Voice> {
    [0.0, 0.01, 0.02]
        .iter()
        .map(|offset| {
            let t = now + offset;
            let filter = BiquadFilter::new(FilterType::Bandpass, 2000.0, Some(1.5), sample_rate);
            let mut voice = Voice::noise(noise.buffer(0.1, sample_rate))
                .with_filter(filter)
                .scheduled(t, t + 0.1);
            decay(&mut voice, 0.6, t, t + 0.08);
            voice
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;

    fn hit(p: Percussion) -> Vec<Voice> {
        p.voices(1.0, SR, &mut NoiseGenerator::new(3))
    }

    /// Mixed mono output of the voices over `[from, from + seconds)`.
    fn render(voices: &mut [Voice], from: f64, seconds: f64) -> Vec<f64> {
        let n = (seconds * SR).round() as usize;
        (0..n)
            .map(|i| {
                let t = from + i as f64 / SR;
                voices.iter_mut().map(|v| v.next_frame(t).0).sum()
            })
            .collect()
    }

    fn rms(samples: &[f64]) -> f64 {
        (samples.iter().map(|s| s * s).sum::<f64>() / samples.len().max(1) as f64).sqrt()
    }

    const ALL: [Percussion; 5] = [
        Percussion::Kick,
        Percussion::Snare,
        Percussion::HiHat { open: false },
        Percussion::HiHat { open: true },
        Percussion::Clap,
    ];

    #[test]
    fn every_sound_terminates_within_its_window() {
        for p in ALL {
            let voices = hit(p);
            assert!(!voices.is_empty());
            let end = 1.0 + p.duration();
            for v in &voices {
                let stop = v.stop_time().expect("percussion voices are always stopped");
                assert!(stop <= end + 1e-9, "{p}: stop {stop} after {end}");
                assert!(v.is_finished(end + 1e-9));
            }
        }
    }

    #[test]
    fn every_sound_is_audible_then_fades() {
        for p in ALL {
            let mut voices = hit(p);
            let early = render(&mut voices, 1.0, 0.03);
            let late_start = 1.0 + p.duration() * 0.8;
            let mut voices = hit(p);
            render(&mut voices, 1.0, p.duration() * 0.8);
            let late = render(&mut voices, late_start, p.duration() * 0.2);
            assert!(rms(&early) > 0.01, "{p} should be audible, rms {}", rms(&early));
            assert!(rms(&late) < rms(&early) * 0.5, "{p} should fade");
        }
    }

    #[test]
    fn silent_before_trigger_time() {
        let mut voices = hit(Percussion::Snare);
        let before = render(&mut voices, 0.5, 0.5);
        assert!(before.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn kick_frequency_sweeps_down() {
        let mut voice = kick(0.0, SR);
        let samples: Vec<f64> = (0..(0.4 * SR) as usize)
            .map(|i| voice.next_frame(i as f64 / SR).0)
            .collect();
        let crossings = |s: &[f64]| s.windows(2).filter(|w| w[0] < 0.0 && w[1] >= 0.0).count();
        let window = |from: f64, to: f64| &samples[(from * SR) as usize..(to * SR) as usize];
        let first = crossings(window(0.0, 0.05));
        let last = crossings(window(0.30, 0.35));
        assert!(first > last, "kick should sweep down: {first} vs {last}");
    }

    #[test]
    fn clap_has_three_staggered_bursts() {
        let voices = hit(Percussion::Clap);
        assert_eq!(voices.len(), 3);
        let stops: Vec<f64> = voices.iter().filter_map(|v| v.stop_time()).collect();
        for (stop, offset) in stops.iter().zip([0.0, 0.01, 0.02]) {
            assert!((stop - (1.0 + offset + 0.1)).abs() < 1e-9);
        }
    }

    #[test]
    fn names_parse_and_display() {
        for p in ALL {
            let parsed: Percussion = p.to_string().parse().expect("round trip");
            assert_eq!(parsed, p);
        }
        assert_eq!("open-hihat".parse::<Percussion>().ok(), Some(Percussion::HiHat { open: true }));
        let err = "cowbell".parse::<Percussion>().unwrap_err();
        assert!(matches!(err, EngineError::UnknownPercussion(name) if name == "cowbell"));
    }
}
