//! Capture pipeline: format negotiation, recorders and the capture lifecycle.

pub mod ffmpeg;
pub mod format;
pub mod recorder;
pub mod state;

use format::{CodecProbe, FALLBACK_FORMAT, FfmpegProbe, OutputFormat, pick_supported_format};
use recorder::{MemoryRecorder, Recorder};

/// Where recordings are produced: picks the format and hands out fresh recorders.
pub trait CaptureBackend: Send + Sync + std::fmt::Debug {
    /// Negotiate the output format for the next recording.
    fn negotiate(&self) -> OutputFormat;
    /// A recorder ready for [`Recorder::begin`].
    fn recorder(&self) -> Box<dyn Recorder>;
}

/// Records through the system `ffmpeg`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegBackend;

impl CaptureBackend for FfmpegBackend {
    fn negotiate(&self) -> OutputFormat {
        match FfmpegProbe::detect() {
            Ok(probe) => pick_supported_format(&probe),
            Err(err) => {
                tracing::warn!(error = %err, "could not probe ffmpeg; using fallback format");
                FALLBACK_FORMAT
            }
        }
    }

    fn recorder(&self) -> Box<dyn Recorder> {
        Box::new(ffmpeg::FfmpegRecorder::new([0x0b, 0x17, 0x36, 0xff]))
    }
}

/// Records frame digests in memory; see [`MemoryRecorder`].
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    /// MIME types reported as supported; `None` supports everything.
    supported: Option<Vec<&'static str>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn supporting(mimes: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            supported: Some(mimes.into_iter().collect()),
        }
    }
}

impl CodecProbe for MemoryBackend {
    fn is_supported(&self, format: &OutputFormat) -> bool {
        self.supported
            .as_ref()
            .is_none_or(|mimes| mimes.contains(&format.mime))
    }
}

impl CaptureBackend for MemoryBackend {
    fn negotiate(&self) -> OutputFormat {
        pick_supported_format(self)
    }

    fn recorder(&self) -> Box<dyn Recorder> {
        Box::new(MemoryRecorder::new())
    }
}
