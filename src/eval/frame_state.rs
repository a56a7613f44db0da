use crate::eval::pulses::MOUTH_REST;
use crate::song::melody::{BEAT, Song};

/// Seconds before the end of the song when confetti starts.
pub const CONFETTI_LEAD_S: f64 = 2.0;
/// Peekaboo flicker period during the last line.
pub const PEEKABOO_FLICKER_S: f64 = 0.6;

const BLINK_THRESHOLD: f64 = 0.94;

/// Everything the scene drawer needs for one frame.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct FrameState {
    /// Seconds since the session started.
    pub elapsed: f64,
    pub active_line: Option<usize>,
    pub progress: f64,
    pub mouth_open: f64,
    /// Vertical offset of the character, in device pixels.
    pub bob: f64,
    /// Character rotation, in radians.
    pub tilt: f64,
    pub eye_open: f64,
    /// Hands cover the eyes.
    pub peekaboo: bool,
    pub confetti: bool,
}

impl FrameState {
    /// Evaluate the frame at `elapsed` seconds with a mouth openness already sampled from the
    /// pulse window.
    pub fn evaluate(song: &Song, elapsed: f64, mouth_open: f64) -> Self {
        let active_line = song.active_line(elapsed);
        Self {
            elapsed,
            active_line,
            progress: song.progress(elapsed),
            mouth_open,
            bob: bob(elapsed),
            tilt: tilt(elapsed),
            eye_open: eye_open(elapsed),
            peekaboo: is_peekaboo(song, elapsed, active_line),
            confetti: elapsed > song.total_duration - CONFETTI_LEAD_S,
        }
    }

    /// The still frame shown while nothing plays.
    pub fn at_rest(song: &Song) -> Self {
        Self::evaluate(song, 0.0, MOUTH_REST)
    }
}

/// Vertical sway in pixels, at most 4 either way.
pub fn bob(t: f64) -> f64 {
    (t * 2.0).sin() * 4.0
}

/// Body rotation in radians.
pub fn tilt(t: f64) -> f64 {
    (t * 1.2).sin() * 0.06
}

/// Eye openness, dipping briefly whenever two slow sines line up.
pub fn eye_open(t: f64) -> f64 {
    let phase = ((t * 2.7).sin() + (t * 3.13 + 1.0).sin()) * 0.5;
    let blink = if phase > BLINK_THRESHOLD { 0.1 } else { 1.0 };
    f64::max(0.12, 0.5 * blink)
}

/// Hands over the eyes for the first two beats, then flickering through the final line.
pub fn is_peekaboo(song: &Song, t: f64, active_line: Option<usize>) -> bool {
    if t < 2.0 * BEAT {
        return true;
    }
    active_line.is_some()
        && active_line == song.last_line_index()
        && t.rem_euclid(PEEKABOO_FLICKER_S) < PEEKABOO_FLICKER_S / 2.0
}

#[cfg(test)]
#[path = "../../tests/unit/eval/frame_state.rs"]
mod tests;
