//! Per-frame evaluation: lip-sync pulses, secondary motion and the confetti burst.

pub mod confetti;
pub mod frame_state;
pub mod pulses;
