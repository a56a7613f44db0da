use std::sync::Arc;

use crate::audio::osc::{Oscillator, Vibrato, Waveform};
use crate::audio::param::AudioParam;
use crate::foundation::clock::Clock;
use crate::foundation::error::{PeekabooError, PeekabooResult};

/// Default audio-context sample rate.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
/// Output channel count of the destination tap.
pub const OUTPUT_CHANNELS: u16 = 2;
const MASTER_GAIN: f64 = 0.9;

/// Lifecycle of an [`AudioContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioState {
    Suspended,
    Running,
    Closed,
}

/// One scheduled tone generator: oscillator -> gain -> master.
#[derive(Clone, Debug)]
pub struct Voice {
    pub waveform: Waveform,
    pub freq_hz: f64,
    pub gain: AudioParam,
    pub vibrato: Option<Vibrato>,
    pub start: f64,
    pub stop: f64,
}

/// Native stand-in for a Web Audio context: a clocked, sample-accurate oscillator graph.
///
/// Voices are fire-and-forget: once added they cannot be edited, only disconnected all at once
/// with [`AudioContext::disconnect_all`].
#[derive(Debug)]
pub struct AudioContext {
    sample_rate: u32,
    master_gain: f64,
    clock: Arc<dyn Clock>,
    state: AudioState,
    /// Context time while suspended, or the clock reading of context time zero while running.
    anchor: f64,
    voices: Vec<Voice>,
}

impl AudioContext {
    /// A suspended context at time zero. Call [`AudioContext::resume`] before scheduling.
    pub fn new(clock: Arc<dyn Clock>, sample_rate: u32) -> PeekabooResult<Self> {
        if sample_rate == 0 {
            return Err(PeekabooError::validation(
                "audio sample rate must be non-zero",
            ));
        }
        Ok(Self {
            sample_rate,
            master_gain: MASTER_GAIN,
            clock,
            state: AudioState::Suspended,
            anchor: 0.0,
            voices: Vec::new(),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn state(&self) -> AudioState {
        self.state
    }

    /// Context time in seconds. Frozen while suspended.
    pub fn current_time(&self) -> f64 {
        match self.state {
            AudioState::Running => self.clock.now() - self.anchor,
            AudioState::Suspended | AudioState::Closed => self.anchor,
        }
    }

    /// Start the context time moving again from where it was frozen.
    pub fn resume(&mut self) -> PeekabooResult<()> {
        match self.state {
            AudioState::Running => Ok(()),
            AudioState::Suspended => {
                self.anchor = self.clock.now() - self.anchor;
                self.state = AudioState::Running;
                tracing::debug!(sample_rate = self.sample_rate, "audio context running");
                Ok(())
            }
            AudioState::Closed => Err(PeekabooError::audio("audio context is closed")),
        }
    }

    pub fn suspend(&mut self) {
        if self.state == AudioState::Running {
            self.anchor = self.clock.now() - self.anchor;
            self.state = AudioState::Suspended;
        }
    }

    /// Drop every voice. A closed context cannot be resumed.
    pub fn close(&mut self) {
        if self.state == AudioState::Running {
            self.anchor = self.clock.now() - self.anchor;
        }
        self.voices.clear();
        self.state = AudioState::Closed;
    }

    /// Queue a voice. The context must be running.
    pub fn add_voice(&mut self, voice: Voice) -> PeekabooResult<()> {
        if self.state != AudioState::Running {
            return Err(PeekabooError::audio(format!(
                "cannot schedule on a {:?} audio context",
                self.state
            )));
        }
        let window_ok = voice.start.is_finite()
            && voice.stop.is_finite()
            && voice.start >= 0.0
            && voice.stop > voice.start;
        if !window_ok || voice.freq_hz <= 0.0 {
            return Err(PeekabooError::audio(format!(
                "invalid voice window [{}, {}) at {} Hz",
                voice.start, voice.stop, voice.freq_hz
            )));
        }
        self.voices.push(voice);
        Ok(())
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Stop and drop every scheduled voice.
    pub fn disconnect_all(&mut self) {
        if !self.voices.is_empty() {
            tracing::debug!(voices = self.voices.len(), "disconnecting audio voices");
        }
        self.voices.clear();
    }

    /// Render the master bus over `[from, from + duration)` context seconds as interleaved stereo.
    ///
    /// This is the stream-destination tap the recorder muxes with the captured frames.
    pub fn render_destination(&self, from: f64, duration: f64) -> PeekabooResult<Vec<f32>> {
        if !from.is_finite() || !duration.is_finite() || duration < 0.0 {
            return Err(PeekabooError::audio("invalid destination render window"));
        }
        let sr = f64::from(self.sample_rate);
        let frames = (duration * sr).round() as usize;
        let first = (from * sr).round() as i64;
        let mut bus = vec![0.0f64; frames];

        for voice in &self.voices {
            mix_voice(&mut bus, voice, first, sr);
        }

        let channels = usize::from(OUTPUT_CHANNELS);
        let mut out = Vec::with_capacity(frames * channels);
        for s in bus {
            let v = (s * self.master_gain).clamp(-1.0, 1.0) as f32;
            for _ in 0..channels {
                out.push(v);
            }
        }
        Ok(out)
    }
}

fn mix_voice(bus: &mut [f64], voice: &Voice, first_sample: i64, sr: f64) {
    let v_start = (voice.start * sr).ceil() as i64;
    let v_stop = (voice.stop * sr).ceil() as i64;
    let lo = v_start.max(first_sample);
    let hi = v_stop.min(first_sample + bus.len() as i64);
    if lo >= hi {
        return;
    }

    // Advance the oscillator from its own start so the phase does not depend on the window.
    let mut osc = Oscillator::new(voice.waveform, voice.freq_hz);
    for n in v_start..lo {
        let t = n as f64 / sr;
        osc.next_sample(detune_at(voice, t), sr);
    }

    for n in lo..hi {
        let t = n as f64 / sr;
        let s = osc.next_sample(detune_at(voice, t), sr) * voice.gain.value_at(t);
        bus[(n - first_sample) as usize] += s;
    }
}

fn detune_at(voice: &Voice, t: f64) -> f64 {
    voice.vibrato.map(|v| v.detune_cents(t)).unwrap_or(0.0)
}

#[cfg(test)]
#[path = "../../tests/unit/audio/context.rs"]
mod tests;
