use std::collections::VecDeque;

use crate::audio::schedule::PulseSchedule;
use crate::foundation::math::{clamp01, lerp};

/// How early before its onset a pulse starts opening the mouth.
pub const PULSE_EARLY_S: f64 = 0.03;
/// How long after its onset a pulse keeps contributing.
pub const PULSE_LATE_S: f64 = 0.6;
/// Mouth openness while singing with no pulse in range.
pub const MOUTH_IDLE: f64 = 0.12;
/// Largest envelope contribution on top of [`MOUTH_IDLE`].
pub const MOUTH_RANGE: f64 = 0.38;
/// Mouth openness when nothing is playing.
pub const MOUTH_REST: f64 = 0.08;

fn envelope(dt: f64) -> Option<f64> {
    if (-PULSE_EARLY_S..PULSE_LATE_S).contains(&dt) {
        Some(clamp01(1.0 - dt / PULSE_LATE_S))
    } else {
        None
    }
}

/// Mouth openness from a plain scan over `onsets`.
pub fn mouth_openness(onsets: &[f64], audio_now: f64) -> f64 {
    onsets
        .iter()
        .filter_map(|&p| envelope(audio_now - p))
        .fold(MOUTH_IDLE, |open, env| open.max(lerp(MOUTH_IDLE, MOUTH_IDLE + MOUTH_RANGE, env)))
}

/// Sliding window over the pulse schedule.
///
/// Only pulses that can still contribute are kept in `active`; upcoming ones wait in `pending`
/// and expired ones are dropped, so each frame looks at a handful of onsets. Audio time is
/// expected to be non-decreasing between calls to [`PulseWindow::advance`].
#[derive(Clone, Debug, Default)]
pub struct PulseWindow {
    pending: VecDeque<f64>,
    active: VecDeque<f64>,
}

impl PulseWindow {
    pub fn new(schedule: &PulseSchedule) -> Self {
        Self {
            pending: schedule.onsets().iter().copied().collect(),
            active: VecDeque::new(),
        }
    }

    /// Admit pulses entering the window and evict the ones that left it.
    pub fn advance(&mut self, audio_now: f64) {
        while let Some(&p) = self.pending.front() {
            if p - audio_now > PULSE_EARLY_S {
                break;
            }
            self.pending.pop_front();
            self.active.push_back(p);
        }
        while let Some(&p) = self.active.front() {
            if audio_now - p < PULSE_LATE_S {
                break;
            }
            self.active.pop_front();
        }
    }

    /// Advance to `audio_now` and return the mouth openness there.
    pub fn sample(&mut self, audio_now: f64) -> f64 {
        self.advance(audio_now);
        self.active
            .iter()
            .filter_map(|&p| envelope(audio_now - p))
            .fold(MOUTH_IDLE, |open, env| open.max(lerp(MOUTH_IDLE, MOUTH_IDLE + MOUTH_RANGE, env)))
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/eval/pulses.rs"]
mod tests;
