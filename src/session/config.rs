use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::foundation::{
    core::{Canvas, Fps},
    error::{PeekabooError, PeekabooResult},
};

/// Largest device pixel ratio honoured.
pub const MAX_PIXEL_RATIO: f64 = 2.0;

/// Stage settings, loadable from JSON. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageConfig {
    /// Logical width; the canvas is `width * pixel_ratio` device pixels.
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
    pub fps: u32,
    pub sample_rate: u32,
    pub record_audio_lead_s: f64,
    pub preview_audio_lead_s: f64,
    pub record_stop_margin_s: f64,
    pub preview_stop_margin_s: f64,
    pub chunk_timeslice_ms: u64,
    /// Bits per second.
    pub video_bitrate: u32,
    pub output_dir: PathBuf,
    pub file_stem: String,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            width: 960,
            height: 540,
            pixel_ratio: 1.0,
            fps: 60,
            sample_rate: crate::audio::context::DEFAULT_SAMPLE_RATE,
            record_audio_lead_s: 0.12,
            preview_audio_lead_s: 0.08,
            record_stop_margin_s: 0.5,
            preview_stop_margin_s: 0.3,
            chunk_timeslice_ms: 250,
            video_bitrate: 6_000_000,
            output_dir: PathBuf::from("."),
            file_stem: "peekaboo-johny".to_string(),
        }
    }
}

impl StageConfig {
    /// Parse JSON, filling omitted fields from [`StageConfig::default`], then validate.
    pub fn from_reader<R: std::io::Read>(r: R) -> PeekabooResult<Self> {
        let cfg: StageConfig = serde_json::from_reader(r)
            .map_err(|e| PeekabooError::serde(format!("parse stage config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> PeekabooResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            PeekabooError::validation(format!("open stage config '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Reject configs a session could not run with: empty or oversized canvases, zero rates,
    /// negative leads or margins, and file stems containing path separators.
    pub fn validate(&self) -> PeekabooResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PeekabooError::validation("stage width/height must be non-zero"));
        }
        if !self.pixel_ratio.is_finite() || self.pixel_ratio <= 0.0 {
            return Err(PeekabooError::validation("pixel_ratio must be positive"));
        }
        let canvas = self.canvas();
        let max_side = u32::from(u16::MAX);
        if canvas.width < 2 || canvas.height < 2 || canvas.width > max_side || canvas.height > max_side
        {
            return Err(PeekabooError::validation(format!(
                "canvas {}x{} is out of range",
                canvas.width, canvas.height
            )));
        }
        if self.fps == 0 {
            return Err(PeekabooError::validation("fps must be non-zero"));
        }
        if self.sample_rate == 0 {
            return Err(PeekabooError::validation("sample_rate must be non-zero"));
        }
        let leads = [
            self.record_audio_lead_s,
            self.preview_audio_lead_s,
            self.record_stop_margin_s,
            self.preview_stop_margin_s,
        ];
        if leads.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(PeekabooError::validation(
                "audio leads and stop margins must be finite and non-negative",
            ));
        }
        if self.chunk_timeslice_ms == 0 {
            return Err(PeekabooError::validation("chunk_timeslice_ms must be non-zero"));
        }
        if self.video_bitrate == 0 {
            return Err(PeekabooError::validation("video_bitrate must be non-zero"));
        }
        if self.file_stem.is_empty() || self.file_stem.contains(['/', '\\']) {
            return Err(PeekabooError::validation(
                "file_stem must be a plain, non-empty file name",
            ));
        }
        Ok(())
    }

    /// Device-pixel canvas, rounded down to even sizes for yuv420p.
    pub fn canvas(&self) -> Canvas {
        let ratio = self.pixel_ratio.min(MAX_PIXEL_RATIO);
        let even = |logical: u32| ((f64::from(logical) * ratio).floor() as u32) & !1;
        Canvas {
            width: even(self.width),
            height: even(self.height),
        }
    }

    pub fn frame_rate(&self) -> PeekabooResult<Fps> {
        Fps::new(self.fps, 1)
    }

    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.chunk_timeslice_ms)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/config.rs"]
mod tests;
