use crate::audio::context::{AudioContext, Voice};
use crate::audio::osc::{Vibrato, Waveform};
use crate::audio::param::AudioParam;
use crate::foundation::error::PeekabooResult;
use crate::song::melody::{BEAT, Song};

const PAD_FREQ_HZ: f64 = 196.0; // G3
const PAD_LEVEL: f64 = 0.02;
const PAD_FLOOR: f64 = 0.0001;
const PAD_FADE_LEAD_S: f64 = 1.2;
const PAD_FADE_TC_S: f64 = 0.6;
const PAD_TAIL_S: f64 = 1.0;

const VIBRATO_HZ: f64 = 5.5;
const VIBRATO_CENTS: f64 = 6.0;
const VIBRATO_TAIL_S: f64 = 0.05;

const ENV_FLOOR: f64 = 0.00001;
const ENV_MIN_PEAK: f64 = 0.00002;
const ATTACK_S: f64 = 0.008;
const RELEASE_S: f64 = 0.06;
const RELEASE_TC_S: f64 = 0.03;
const NOTE_TAIL_S: f64 = 0.1;

/// Absolute audio-clock onsets that drive the mouth animation, in schedule order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PulseSchedule {
    onsets: Vec<f64>,
}

impl PulseSchedule {
    /// Insert `onset`, keeping the schedule sorted.
    pub fn push(&mut self, onset: f64) {
        let at = self.onsets.partition_point(|&p| p <= onset);
        self.onsets.insert(at, onset);
    }

    /// Onsets sorted ascending.
    pub fn onsets(&self) -> &[f64] {
        &self.onsets
    }

    pub fn len(&self) -> usize {
        self.onsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.onsets.is_empty()
    }
}

/// Queue the whole song on `ctx` starting at absolute context time `start`.
///
/// One enveloped triangle voice per note plus a quiet sine pad underneath. Returns the onset of
/// every note for the mouth animation. The context must already be running.
pub fn schedule_song(ctx: &mut AudioContext, start: f64, song: &Song) -> PeekabooResult<PulseSchedule> {
    let total = song.total_duration;

    let mut pad_gain = AudioParam::new(1.0);
    pad_gain
        .set_value_at_time(PAD_FLOOR, start)?
        .linear_ramp_to_value_at_time(PAD_LEVEL, start + 2.0 * BEAT)?
        .set_target_at_time(0.0, start + total - PAD_FADE_LEAD_S, PAD_FADE_TC_S)?;
    ctx.add_voice(Voice {
        waveform: Waveform::Sine,
        freq_hz: PAD_FREQ_HZ,
        gain: pad_gain,
        vibrato: None,
        start,
        stop: start + total + PAD_TAIL_S,
    })?;

    let mut pulses = PulseSchedule::default();
    for note in &song.notes {
        let on = start + note.onset;
        let off = on + note.duration;

        let mut gain = AudioParam::new(1.0);
        gain.set_value_at_time(ENV_FLOOR, on)?
            .exponential_ramp_to_value_at_time(note.gain.max(ENV_MIN_PEAK), on + ATTACK_S)?
            .set_target_at_time(ENV_FLOOR, off - RELEASE_S, RELEASE_TC_S)?;

        ctx.add_voice(Voice {
            waveform: Waveform::Triangle,
            freq_hz: note.freq_hz,
            gain,
            vibrato: Some(Vibrato {
                rate_hz: VIBRATO_HZ,
                depth_cents: VIBRATO_CENTS,
                start: on,
                stop: off + VIBRATO_TAIL_S,
            }),
            start: on,
            stop: off + NOTE_TAIL_S,
        })?;

        pulses.push(on);
    }

    tracing::debug!(
        start,
        voices = song.notes.len() + 1,
        "scheduled song on audio context"
    );
    Ok(pulses)
}

/// Last context time at which the scheduled song still produces sound.
pub fn schedule_end(start: f64, song: &Song) -> f64 {
    start + song.total_duration + PAD_TAIL_S
}

#[cfg(test)]
#[path = "../../tests/unit/audio/schedule.rs"]
mod tests;
