//! ADSR envelope — a gain schedule for fixed-length notes.
//!
//! The envelope is pure: it turns note timing into breakpoints, and the
//! caller writes them into a gain [`Param`].

use super::param::Param;

/// How a breakpoint is reached from the previous one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    /// Jump to the value.
    Set,
    /// Linear ramp ending at the value.
    Linear,
}

/// One point of the gain curve, relative to the note start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breakpoint {
    pub offset: f64,
    pub value: f64,
    pub segment: Segment,
}

/// ADSR shape for a note of known total duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    /// Peak gain.
    pub volume: f64,
    /// Attack time in seconds.
    pub attack: f64,
    /// Decay time in seconds.
    pub decay: f64,
    /// Sustain level as a fraction of `volume` [0, 1].
    pub sustain: f64,
    /// Release time in seconds.
    pub release: f64,
    /// Total note length in seconds; the curve reaches 0 here.
    pub duration: f64,
}

impl Envelope {
    /// Breakpoints in chronological order.
    ///
    /// Timings that do not fit the duration are clamped: attack first, then
    /// decay, are cut to fit inside `duration`; release is cut to
    /// `duration`; the hold never starts before the decay has ended, so
    /// an oversized release is shortened rather than reordered.
    /// Non-finite timings count as zero.
    pub fn breakpoints(&self) -> [Breakpoint; 5] {
        let duration = fit(self.duration, f64::MAX);
        let attack = fit(self.attack, duration);
        let decay = fit(self.decay, duration - attack);
        let release = fit(self.release, duration);
        let decay_end = attack + decay;
        let hold_start = (duration - release).max(decay_end);
        let sustain_level = self.volume * self.sustain.clamp(0.0, 1.0);

        [
            Breakpoint { offset: 0.0, value: 0.0, segment: Segment::Set },
            Breakpoint { offset: attack, value: self.volume, segment: Segment::Linear },
            Breakpoint { offset: decay_end, value: sustain_level, segment: Segment::Linear },
            Breakpoint { offset: hold_start, value: sustain_level, segment: Segment::Set },
            Breakpoint { offset: duration, value: 0.0, segment: Segment::Linear },
        ]
    }

    /// Write the schedule into `gain`, starting at engine time `start`.
    pub fn apply(&self, gain: &mut Param, start: f64) {
        for bp in self.breakpoints() {
            let time = start + bp.offset;
            match bp.segment {
                Segment::Set => gain.set_value_at(bp.value, time),
                Segment::Linear => gain.linear_ramp_to(bp.value, time),
            }
        }
    }
}

fn fit(seconds: f64, limit: f64) -> f64 {
    if seconds.is_finite() { seconds.max(0.0).min(limit) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(attack: f64, decay: f64, release: f64, duration: f64) -> Envelope {
        Envelope {
            volume: 0.5,
            attack,
            decay,
            sustain: 0.7,
            release,
            duration,
        }
    }

    fn gain_curve(e: &Envelope) -> Param {
        let mut p = Param::new(1.0);
        e.apply(&mut p, 0.0);
        p
    }

    #[test]
    fn breakpoints_for_default_note() {
        let bps = env(0.01, 0.1, 0.3, 0.5).breakpoints();
        let expected = [0.0, 0.01, 0.11, 0.2, 0.5];
        for (bp, want) in bps.iter().zip(expected) {
            assert!((bp.offset - want).abs() < 1e-12, "offset {} != {want}", bp.offset);
        }
        assert_eq!(bps[1].value, 0.5);
        assert!((bps[2].value - 0.35).abs() < 1e-12);
        assert_eq!(bps[3].value, bps[2].value);
        assert_eq!(bps[4].value, 0.0);
    }

    #[test]
    fn gain_shape_over_time() {
        let p = gain_curve(&env(0.1, 0.1, 0.2, 1.0));
        assert_eq!(p.value_at(0.0), 0.0);
        assert!((p.value_at(0.05) - 0.25).abs() < 1e-9, "half-way up the attack");
        assert!((p.value_at(0.1) - 0.5).abs() < 1e-9, "peak");
        assert!((p.value_at(0.5) - 0.35).abs() < 1e-9, "sustain hold");
        assert!((p.value_at(0.9) - 0.175).abs() < 1e-9, "half-way through release");
        assert_eq!(p.value_at(1.0), 0.0);
        assert_eq!(p.value_at(2.0), 0.0);
    }

    #[test]
    fn always_chronological() {
        let cases = [
            env(0.4, 0.4, 0.3, 0.5),
            env(2.0, 0.1, 0.1, 0.5),
            env(0.1, 0.1, 5.0, 0.5),
            env(0.0, 0.0, 0.0, 0.0),
            env(0.3, 0.3, 0.3, 0.5),
        ];
        for e in cases {
            let bps = e.breakpoints();
            for pair in bps.windows(2) {
                assert!(pair[0].offset <= pair[1].offset, "{e:?} -> {bps:?}");
            }
            assert!(bps[4].offset <= e.duration.max(0.0));
        }
    }

    #[test]
    fn oversized_attack_is_clamped_to_duration() {
        let bps = env(2.0, 0.1, 0.1, 0.5).breakpoints();
        assert_eq!(bps[1].offset, 0.5);
        assert_eq!(bps[2].offset, 0.5);
        assert_eq!(bps[3].offset, 0.5);
    }

    #[test]
    fn hold_never_precedes_decay_end() {
        let bps = env(0.2, 0.2, 0.3, 0.5).breakpoints();
        assert_eq!(bps[2].offset, 0.4);
        assert_eq!(bps[3].offset, 0.4, "hold starts where decay ends");
        let p = gain_curve(&env(0.2, 0.2, 0.3, 0.5));
        assert!(p.value_at(0.45) > 0.0 && p.value_at(0.45) < 0.35);
    }

    #[test]
    fn non_finite_timings_count_as_zero() {
        let bps = env(f64::NAN, 0.1, f64::INFINITY, 0.5).breakpoints();
        let offsets: Vec<f64> = bps.iter().map(|bp| bp.offset).collect();
        assert_eq!(offsets, [0.0, 0.0, 0.1, 0.5, 0.5]);

        let collapsed = env(0.1, 0.1, 0.1, f64::NAN).breakpoints();
        assert!(collapsed.iter().all(|bp| bp.offset == 0.0));
    }
}
