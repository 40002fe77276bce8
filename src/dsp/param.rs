//! Parameter automation — timed breakpoints and one-pole smoothing.
//!
//! [`Param`] mirrors the automation model of a browser audio graph: values
//! are set or ramped at absolute engine times and evaluated per sample.
//! [`Smoothed`] is the first-order filter used for global levels.

/// One automation event on a [`Param`] timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Event {
    SetValue { time: f64, value: f64 },
    LinearRamp { time: f64, value: f64 },
    ExponentialRamp { time: f64, value: f64 },
    SetTarget { time: f64, target: f64, time_constant: f64 },
}

impl Event {
    fn time(&self) -> f64 {
        match *self {
            Event::SetValue { time, .. }
            | Event::LinearRamp { time, .. }
            | Event::ExponentialRamp { time, .. }
            | Event::SetTarget { time, .. } => time,
        }
    }

    fn is_ramp(&self) -> bool {
        matches!(self, Event::LinearRamp { .. } | Event::ExponentialRamp { .. })
    }
}

/// An automatable control value.
#[derive(Debug, Clone)]
pub struct Param {
    default: f64,
    events: Vec<Event>,
}

impl Param {
    pub fn new(default: f64) -> Self {
        Param {
            default,
            events: Vec::new(),
        }
    }

    /// Jump to `value` at `time`.
    pub fn set_value_at(&mut self, value: f64, time: f64) {
        self.insert(Event::SetValue { time, value });
    }

    /// Ramp linearly from the previous event to `value`, arriving at `time`.
    pub fn linear_ramp_to(&mut self, value: f64, time: f64) {
        self.insert(Event::LinearRamp { time, value });
    }

    /// Ramp exponentially from the previous event to `value`, arriving at
    /// `time`. Both ends must be non-zero with the same sign; otherwise the
    /// previous value holds until `time`, then jumps.
    pub fn exponential_ramp_to(&mut self, value: f64, time: f64) {
        self.insert(Event::ExponentialRamp { time, value });
    }

    /// Approach `target` from `time` onward with the given time constant.
    pub fn set_target_at(&mut self, target: f64, time: f64, time_constant: f64) {
        self.insert(Event::SetTarget {
            time,
            target,
            time_constant,
        });
    }

    /// Drop everything scheduled after `time` and hold the value the
    /// timeline had reached there.
    pub fn cancel_and_hold_at(&mut self, time: f64) {
        let value = self.value_at(time);
        let keep = self.events.partition_point(|e| e.time() <= time);
        self.events.truncate(keep);
        self.insert(Event::SetValue { time, value });
    }

    /// Events at the same time keep insertion order.
    fn insert(&mut self, event: Event) {
        let idx = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(idx, event);
    }

    /// Value of the parameter at engine time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        let mut value = self.default;
        let mut prev_time = 0.0;

        for (i, event) in self.events.iter().enumerate() {
            let time = event.time();
            if time > t {
                if event.is_ramp() {
                    return ramp_value(event, prev_time, value, t);
                }
                break;
            }
            match *event {
                Event::SetValue { value: v, .. }
                | Event::LinearRamp { value: v, .. }
                | Event::ExponentialRamp { value: v, .. } => {
                    value = v;
                }
                Event::SetTarget {
                    target,
                    time_constant,
                    ..
                } => {
                    // The target curve runs until the next event takes over.
                    let until = self.events.get(i + 1).map_or(t, |next| next.time().min(t));
                    value = approach(value, target, until - time, time_constant);
                }
            }
            prev_time = time;
        }
        value
    }

    /// Drop events that can no longer influence values at or after `t`.
    pub fn prune_before(&mut self, t: f64) {
        let settled = self.events.partition_point(|e| e.time() <= t);
        if settled < 2 {
            return;
        }
        // Collapse everything up to the last settled event into a set-value,
        // except a trailing set-target whose curve is still running.
        let last = self.events[settled - 1];
        if matches!(last, Event::SetTarget { .. }) {
            return;
        }
        let value = self.value_at(last.time());
        self.events.drain(..settled);
        self.events.insert(
            0,
            Event::SetValue {
                time: last.time(),
                value,
            },
        );
    }

    /// True once no event is scheduled after `t`.
    pub fn is_settled(&self, t: f64) -> bool {
        self.events.last().is_none_or(|e| e.time() <= t)
    }
}

fn ramp_value(event: &Event, t0: f64, v0: f64, t: f64) -> f64 {
    match *event {
        Event::LinearRamp { time: t1, value: v1 } => {
            if t1 <= t0 {
                return v1;
            }
            let frac = (t - t0) / (t1 - t0);
            v0 + (v1 - v0) * frac
        }
        Event::ExponentialRamp { time: t1, value: v1 } => {
            if t1 <= t0 || v0 == 0.0 || v1 == 0.0 || v0.signum() != v1.signum() {
                return v0;
            }
            let frac = (t - t0) / (t1 - t0);
            v0 * (v1 / v0).powf(frac)
        }
        _ => v0,
    }
}

/// First-order approach from `from` toward `to` after `elapsed` seconds.
fn approach(from: f64, to: f64, elapsed: f64, time_constant: f64) -> f64 {
    if time_constant <= 0.0 {
        return to;
    }
    to + (from - to) * (-elapsed.max(0.0) / time_constant).exp()
}

/// A level that follows its target through a one-pole filter, one sample
/// at a time. Used for master and wet/dry gains so changes never click.
#[derive(Debug, Clone)]
pub struct Smoothed {
    current: f64,
    target: f64,
    coef: f64,
}

impl Smoothed {
    pub fn new(value: f64, time_constant: f64, sample_rate: f64) -> Self {
        Smoothed {
            current: value,
            target: value,
            coef: (-1.0 / (time_constant * sample_rate)).exp(),
        }
    }

    pub fn set_target(&mut self, target: f64) {
        self.target = target;
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    #[inline]
    pub fn next_value(&mut self) -> f64 {
        self.current = self.target + (self.current - self.target) * self.coef;
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn default_without_events() {
        let p = Param::new(0.25);
        assert_eq!(p.value_at(0.0), 0.25);
        assert_eq!(p.value_at(10.0), 0.25);
    }

    #[test]
    fn linear_ramp_interpolates() {
        let mut p = Param::new(1.0);
        p.set_value_at(0.0, 1.0);
        p.linear_ramp_to(1.0, 2.0);
        assert_eq!(p.value_at(0.5), 1.0, "default holds before the first event");
        assert!(close(p.value_at(1.0), 0.0));
        assert!(close(p.value_at(1.5), 0.5));
        assert!(close(p.value_at(2.0), 1.0));
        assert!(close(p.value_at(3.0), 1.0));
    }

    #[test]
    fn exponential_ramp_is_geometric() {
        let mut p = Param::new(0.0);
        p.set_value_at(1.0, 0.0);
        p.exponential_ramp_to(0.01, 1.0);
        assert!(close(p.value_at(0.5), 0.1), "midpoint should be 0.1, got {}", p.value_at(0.5));
        assert!(close(p.value_at(1.0), 0.01));
    }

    #[test]
    fn exponential_ramp_to_zero_holds_then_jumps() {
        let mut p = Param::new(0.0);
        p.set_value_at(1.0, 0.0);
        p.exponential_ramp_to(0.0, 1.0);
        assert_eq!(p.value_at(0.99), 1.0);
        assert_eq!(p.value_at(1.0), 0.0);
    }

    #[test]
    fn set_target_decays_by_time_constant() {
        let mut p = Param::new(0.0);
        p.set_value_at(1.0, 0.0);
        p.set_target_at(0.0, 1.0, 0.05);
        assert!(close(p.value_at(1.0), 1.0));
        let one_tau = p.value_at(1.05);
        assert!((one_tau - (-1.0f64).exp()).abs() < 1e-9, "got {one_tau}");
        assert!(p.value_at(1.5) < 1e-4);
    }

    #[test]
    fn set_target_interrupts_ramp_in_progress() {
        let mut p = Param::new(0.0);
        p.set_value_at(0.0, 0.0);
        p.linear_ramp_to(1.0, 1.0);
        p.set_target_at(0.0, 2.0, 0.1);
        assert!(close(p.value_at(2.0), 1.0));
        assert!(p.value_at(3.0) < 1e-4);
    }

    #[test]
    fn cancel_and_hold_freezes_ramp_mid_way() {
        let mut p = Param::new(0.0);
        p.set_value_at(0.0, 0.0);
        p.linear_ramp_to(1.0, 1.0);
        p.cancel_and_hold_at(0.25);
        assert!(close(p.value_at(0.25), 0.25));
        assert!(close(p.value_at(5.0), 0.25), "the ramp after the hold is gone");
        p.set_target_at(0.0, 0.25, 0.1);
        assert!(p.value_at(2.0) < 1e-6);
    }

    #[test]
    fn same_time_events_keep_insertion_order() {
        let mut p = Param::new(0.0);
        p.set_value_at(0.3, 1.0);
        p.set_value_at(0.6, 1.0);
        assert_eq!(p.value_at(1.0), 0.6);
    }

    #[test]
    fn prune_keeps_values() {
        let mut p = Param::new(0.0);
        p.set_value_at(0.0, 0.0);
        p.linear_ramp_to(1.0, 1.0);
        p.linear_ramp_to(0.5, 2.0);
        p.linear_ramp_to(0.0, 3.0);
        let before: Vec<f64> = (20..=30).map(|i| p.value_at(i as f64 * 0.1)).collect();
        p.prune_before(2.0);
        let after: Vec<f64> = (20..=30).map(|i| p.value_at(i as f64 * 0.1)).collect();
        for (a, b) in before.iter().zip(&after) {
            assert!(close(*a, *b), "{a} != {b}");
        }
        assert!(p.is_settled(3.0));
        assert!(!p.is_settled(2.5));
    }

    #[test]
    fn smoothed_approaches_target() {
        let mut s = Smoothed::new(0.0, 0.02, 8000.0);
        s.set_target(1.0);
        // one time constant = 160 samples
        let mut v = 0.0;
        for _ in 0..160 {
            v = s.next_value();
        }
        assert!((v - (1.0 - (-1.0f64).exp())).abs() < 0.01, "got {v}");
        for _ in 0..8000 {
            v = s.next_value();
        }
        assert!((v - 1.0).abs() < 1e-6);
        assert_eq!(s.target(), 1.0);
    }
}
