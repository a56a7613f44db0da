use crate::foundation::error::{PeekabooError, PeekabooResult};

/// One automation event on an [`AudioParam`]. Times are absolute audio-context seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Automation {
    /// Jump to `value` at `time`.
    SetValue { value: f64, time: f64 },
    /// Linear ramp from the previous event to `value`, arriving at `end`.
    LinearRamp { value: f64, end: f64 },
    /// Exponential ramp from the previous event to `value`, arriving at `end`.
    ExponentialRamp { value: f64, end: f64 },
    /// Exponential approach towards `target` starting at `time`.
    SetTarget {
        target: f64,
        time: f64,
        time_constant: f64,
    },
}

impl Automation {
    fn time(&self) -> f64 {
        match *self {
            Self::SetValue { time, .. } | Self::SetTarget { time, .. } => time,
            Self::LinearRamp { end, .. } | Self::ExponentialRamp { end, .. } => end,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Curve {
    Hold(f64),
    Target {
        from: f64,
        target: f64,
        start: f64,
        time_constant: f64,
    },
}

impl Curve {
    fn eval(self, t: f64) -> f64 {
        match self {
            Self::Hold(v) => v,
            Self::Target {
                from,
                target,
                start,
                time_constant,
            } => target + (from - target) * (-(t - start).max(0.0) / time_constant).exp(),
        }
    }
}

/// A sample-accurate automatable parameter (gain, detune, ...).
///
/// Events are kept sorted by time; evaluation is pure, so the same timeline always renders the
/// same samples.
#[derive(Clone, Debug)]
pub struct AudioParam {
    default: f64,
    events: Vec<Automation>,
}

impl AudioParam {
    pub fn new(default: f64) -> Self {
        Self {
            default,
            events: Vec::new(),
        }
    }

    /// Jump to `value` at `time`.
    pub fn set_value_at_time(&mut self, value: f64, time: f64) -> PeekabooResult<&mut Self> {
        self.insert(Automation::SetValue { value, time })
    }

    /// Ramp linearly from the previous event to `value`, arriving at `end`.
    pub fn linear_ramp_to_value_at_time(
        &mut self,
        value: f64,
        end: f64,
    ) -> PeekabooResult<&mut Self> {
        self.insert(Automation::LinearRamp { value, end })
    }

    /// Ramp exponentially to `value`, arriving at `end`.
    ///
    /// `value` must be strictly positive.
    pub fn exponential_ramp_to_value_at_time(
        &mut self,
        value: f64,
        end: f64,
    ) -> PeekabooResult<&mut Self> {
        if value <= 0.0 {
            return Err(PeekabooError::audio(
                "exponential ramp target must be strictly positive",
            ));
        }
        self.insert(Automation::ExponentialRamp { value, end })
    }

    /// Approach `target` exponentially from `time` on, with `time_constant` seconds per 1/e step.
    pub fn set_target_at_time(
        &mut self,
        target: f64,
        time: f64,
        time_constant: f64,
    ) -> PeekabooResult<&mut Self> {
        if time_constant <= 0.0 {
            return Err(PeekabooError::audio("time constant must be positive"));
        }
        self.insert(Automation::SetTarget {
            target,
            time,
            time_constant,
        })
    }

    pub fn events(&self) -> &[Automation] {
        &self.events
    }

    fn insert(&mut self, ev: Automation) -> PeekabooResult<&mut Self> {
        let values_finite = match ev {
            Automation::SetValue { value, time } => value.is_finite() && time.is_finite(),
            Automation::LinearRamp { value, end } | Automation::ExponentialRamp { value, end } => {
                value.is_finite() && end.is_finite()
            }
            Automation::SetTarget {
                target,
                time,
                time_constant,
            } => target.is_finite() && time.is_finite() && time_constant.is_finite(),
        };
        if !values_finite || ev.time() < 0.0 {
            return Err(PeekabooError::audio(format!(
                "invalid automation event {ev:?}"
            )));
        }
        let at = self.events.partition_point(|e| e.time() <= ev.time());
        self.events.insert(at, ev);
        Ok(self)
    }

    /// Parameter value at absolute time `t`.
    pub fn value_at(&self, t: f64) -> f64 {
        let mut curve = Curve::Hold(self.default);
        let mut last_time = 0.0;

        for ev in &self.events {
            match *ev {
                Automation::SetValue { value, time } => {
                    if t < time {
                        return curve.eval(t);
                    }
                    curve = Curve::Hold(value);
                    last_time = time;
                }
                Automation::SetTarget {
                    target,
                    time,
                    time_constant,
                } => {
                    if t < time {
                        return curve.eval(t);
                    }
                    curve = Curve::Target {
                        from: curve.eval(time),
                        target,
                        start: time,
                        time_constant,
                    };
                    last_time = time;
                }
                Automation::LinearRamp { value, end } => {
                    let from = curve.eval(last_time);
                    if t < end {
                        let span = end - last_time;
                        if span <= 0.0 {
                            return value;
                        }
                        let k = ((t - last_time) / span).clamp(0.0, 1.0);
                        return from + (value - from) * k;
                    }
                    curve = Curve::Hold(value);
                    last_time = end;
                }
                Automation::ExponentialRamp { value, end } => {
                    let from = curve.eval(last_time);
                    if t < end {
                        let span = end - last_time;
                        if span <= 0.0 {
                            return value;
                        }
                        // A ramp from zero or across a sign change holds until its end time.
                        if from <= 0.0 {
                            return from;
                        }
                        let k = ((t - last_time) / span).clamp(0.0, 1.0);
                        return from * (value / from).powf(k);
                    }
                    curve = Curve::Hold(value);
                    last_time = end;
                }
            }
        }
        curve.eval(t)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/param.rs"]
mod tests;
