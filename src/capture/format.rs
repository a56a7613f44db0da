use std::collections::BTreeSet;
use std::process::{Command, Stdio};

use crate::foundation::error::{PeekabooError, PeekabooResult};

/// A container/codec combination the recorder can be asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct OutputFormat {
    /// MIME type as a browser recorder would name it.
    pub mime: &'static str,
    pub extension: &'static str,
    /// ffmpeg muxer name.
    pub muxer: &'static str,
    /// ffmpeg video encoder, or the muxer default when `None`.
    pub video_encoder: Option<&'static str>,
    /// ffmpeg audio encoder, or the muxer default when `None`.
    pub audio_encoder: Option<&'static str>,
}

/// First choice.
pub const WEBM_VP9_OPUS: OutputFormat = OutputFormat {
    mime: "video/webm;codecs=vp9,opus",
    extension: "webm",
    muxer: "webm",
    video_encoder: Some("libvpx-vp9"),
    audio_encoder: Some("libopus"),
};

pub const WEBM_VP8_OPUS: OutputFormat = OutputFormat {
    mime: "video/webm;codecs=vp8,opus",
    extension: "webm",
    muxer: "webm",
    video_encoder: Some("libvpx"),
    audio_encoder: Some("libopus"),
};

pub const WEBM: OutputFormat = OutputFormat {
    mime: "video/webm",
    extension: "webm",
    muxer: "webm",
    video_encoder: None,
    audio_encoder: None,
};

pub const WEBM_H264_OPUS: OutputFormat = OutputFormat {
    mime: "video/webm;codecs=h264,opus",
    extension: "webm",
    muxer: "webm",
    video_encoder: Some("libx264"),
    audio_encoder: Some("libopus"),
};

/// Negotiation order, most preferred first.
pub const PREFERRED_FORMATS: [OutputFormat; 4] =
    [WEBM_VP9_OPUS, WEBM_VP8_OPUS, WEBM, WEBM_H264_OPUS];

/// Used when nothing in [`PREFERRED_FORMATS`] is reported as supported.
pub const FALLBACK_FORMAT: OutputFormat = WEBM;

/// Video encoders the WebM muxer accepts.
const WEBM_VIDEO_ENCODERS: [&str; 3] = ["libvpx", "libvpx-vp9", "libaom-av1"];

/// Answers "can this format be recorded here?".
pub trait CodecProbe {
    fn is_supported(&self, format: &OutputFormat) -> bool;
}

impl<F> CodecProbe for F
where
    F: Fn(&OutputFormat) -> bool,
{
    fn is_supported(&self, format: &OutputFormat) -> bool {
        self(format)
    }
}

/// First supported entry of [`PREFERRED_FORMATS`], or [`FALLBACK_FORMAT`].
///
/// The fallback is not verified; recording with it may still fail to start.
pub fn pick_supported_format(probe: &dyn CodecProbe) -> OutputFormat {
    match PREFERRED_FORMATS.iter().find(|f| probe.is_supported(f)) {
        Some(format) => {
            tracing::debug!(mime = format.mime, "negotiated recording format");
            *format
        }
        None => {
            tracing::warn!(
                mime = FALLBACK_FORMAT.mime,
                "no preferred recording format reported as supported; falling back"
            );
            FALLBACK_FORMAT
        }
    }
}

/// Support answers from the local `ffmpeg` build.
#[derive(Clone, Debug, Default)]
pub struct FfmpegProbe {
    encoders: BTreeSet<String>,
    muxers: BTreeSet<String>,
}

impl FfmpegProbe {
    /// Query `ffmpeg -encoders` and `ffmpeg -muxers`.
    pub fn detect() -> PeekabooResult<Self> {
        let encoders = ffmpeg_listing("-encoders")?;
        let muxers = ffmpeg_listing("-muxers")?;
        Ok(Self::from_listings(&encoders, &muxers))
    }

    /// Build a probe from captured `-encoders` / `-muxers` output.
    pub fn from_listings(encoders: &str, muxers: &str) -> Self {
        Self {
            encoders: parse_listing(encoders),
            muxers: parse_listing(muxers),
        }
    }

    pub fn has_encoder(&self, name: &str) -> bool {
        self.encoders.contains(name)
    }

    pub fn has_muxer(&self, name: &str) -> bool {
        self.muxers.contains(name)
    }
}

impl CodecProbe for FfmpegProbe {
    fn is_supported(&self, format: &OutputFormat) -> bool {
        if !self.has_muxer(format.muxer) {
            return false;
        }
        let video_ok = match format.video_encoder {
            Some(enc) => {
                self.has_encoder(enc)
                    && (format.muxer != "webm" || WEBM_VIDEO_ENCODERS.contains(&enc))
            }
            None => true,
        };
        let audio_ok = format.audio_encoder.is_none_or(|enc| self.has_encoder(enc));
        video_ok && audio_ok
    }
}

fn ffmpeg_listing(flag: &str) -> PeekabooResult<String> {
    let out = Command::new("ffmpeg")
        .args(["-hide_banner", flag])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| PeekabooError::capture(format!("failed to run ffmpeg {flag}: {e}")))?;
    if !out.status.success() {
        return Err(PeekabooError::capture(format!(
            "ffmpeg {flag} exited with status {}",
            out.status
        )));
    }
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

/// Names from an ffmpeg capability table: rows after the `--` separator, flags then name.
fn parse_listing(text: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut in_table = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if !in_table {
            in_table = trimmed.starts_with("--");
            continue;
        }
        let mut cols = trimmed.split_whitespace();
        let (Some(_flags), Some(name)) = (cols.next(), cols.next()) else {
            continue;
        };
        names.extend(name.split(',').map(str::to_owned));
    }
    names
}

#[cfg(test)]
#[path = "../../tests/unit/capture/format.rs"]
mod tests;
