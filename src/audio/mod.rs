//! Audio subsystem: automation, oscillators, the clocked context and the song schedule.

/// Clocked oscillator graph and its destination tap.
pub mod context;
/// Waveforms and vibrato.
pub mod osc;
/// Parameter automation timelines.
pub mod param;
/// Raw PCM file helpers.
pub mod pcm;
/// Song scheduling and mouth pulses.
pub mod schedule;
