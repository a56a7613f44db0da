//! Session control: configuration, the per-session render loop, auto-stop and the [`Stage`].

pub mod cancel;
pub mod config;
pub mod render_loop;
pub mod stage;
pub mod timer;

pub use config::StageConfig;
pub use stage::{LiveResources, RecordingInfo, SessionMode, Stage, StageStatus};
