//! Peekaboo is a lip-synced cartoon singer.
//!
//! A fixed nursery-rhyme melody is synthesized on a clocked oscillator graph, a singer is drawn
//! every frame on the CPU with `vello_cpu`, and recordings are muxed to WebM through `ffmpeg`.
//!
//! - Build a [`StageConfig`] (or load one from JSON)
//! - Create a [`Stage`] and start a preview or a recording
//! - Poll [`Stage::status`] or wait for the session with [`Stage::wait_idle`]
#![forbid(unsafe_code)]

/// Oscillators, automation and the song schedule.
pub mod audio;
/// Output formats and recorders.
pub mod capture;
pub mod eval;
pub mod foundation;
/// Scene layout and rasterization.
pub mod render;
pub mod session;
pub mod song;

pub use crate::foundation::clock::{Clock, ManualClock, ScaledClock, SystemClock};
pub use crate::foundation::core::{Canvas, Fps, FrameIndex, Rgba8};
pub use crate::foundation::error::{PeekabooError, PeekabooResult};

pub use crate::capture::format::OutputFormat;
pub use crate::capture::{CaptureBackend, FfmpegBackend, MemoryBackend};
pub use crate::eval::frame_state::FrameState;
pub use crate::render::{FrameRGBA, StageRenderer};
pub use crate::session::{RecordingInfo, SessionMode, Stage, StageConfig, StageStatus};
pub use crate::song::melody::{Song, build_song};
