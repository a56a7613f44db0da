use std::f64::consts::TAU;

/// Oscillator waveform. Phase is in cycles (`0..1`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Waveform {
    Sine,
    Triangle,
}

impl Waveform {
    /// Sample the waveform at `phase` cycles. Both shapes start at zero and rise.
    pub fn sample(self, phase: f64) -> f64 {
        match self {
            Self::Sine => (TAU * phase).sin(),
            Self::Triangle => 1.0 - 4.0 * ((phase + 0.25).rem_euclid(1.0) - 0.5).abs(),
        }
    }
}

/// Sine LFO routed into an oscillator's detune, in cents.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vibrato {
    pub rate_hz: f64,
    pub depth_cents: f64,
    pub start: f64,
    pub stop: f64,
}

impl Vibrato {
    pub fn detune_cents(&self, t: f64) -> f64 {
        if t < self.start || t >= self.stop {
            return 0.0;
        }
        self.depth_cents * (TAU * self.rate_hz * (t - self.start)).sin()
    }
}

/// Phase-accumulating oscillator.
#[derive(Clone, Debug)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub freq_hz: f64,
    phase: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, freq_hz: f64) -> Self {
        Self {
            waveform,
            freq_hz,
            phase: 0.0,
        }
    }

    /// Emit one sample and advance by one sample period with the given detune.
    pub fn next_sample(&mut self, detune_cents: f64, sample_rate: f64) -> f64 {
        let out = self.waveform.sample(self.phase);
        let freq = self.freq_hz * 2f64.powf(detune_cents / 1200.0);
        self.phase = (self.phase + freq / sample_rate).rem_euclid(1.0);
        out
    }
}
