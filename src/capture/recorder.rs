use std::hash::{DefaultHasher, Hash, Hasher};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{
    capture::format::OutputFormat,
    foundation::{
        core::{Fps, FrameIndex},
        error::{PeekabooError, PeekabooResult},
        math::format_megabytes,
    },
    render::FrameRGBA,
};

/// One slice of encoded container bytes.
pub type Chunk = Vec<u8>;

/// Raw PCM audio fed to the recorder alongside the frames.
#[derive(Clone, Debug)]
pub struct AudioInput {
    /// Interleaved `f32le` samples.
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Configuration handed to [`Recorder::begin`].
#[derive(Clone, Debug)]
pub struct RecorderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub format: OutputFormat,
    /// Target video bitrate in bits per second.
    pub video_bitrate: u32,
    /// How often encoded bytes are handed out as a chunk.
    pub timeslice: Duration,
    pub audio: Option<AudioInput>,
}

impl RecorderConfig {
    pub fn validate(&self) -> PeekabooResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(PeekabooError::validation(
                "recorder width/height must be non-zero",
            ));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(PeekabooError::validation(
                "recorder width/height must be even (required for yuv420p output)",
            ));
        }
        if self.video_bitrate == 0 {
            return Err(PeekabooError::validation("video bitrate must be non-zero"));
        }
        if self.timeslice.is_zero() {
            return Err(PeekabooError::validation("chunk timeslice must be non-zero"));
        }
        if let Some(audio) = &self.audio
            && (audio.sample_rate == 0 || audio.channels == 0)
        {
            return Err(PeekabooError::validation(
                "audio sample rate and channel count must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Consumes frames in slot order and produces encoded chunks.
///
/// `push_frame` is called with strictly increasing indices, one per `1/fps` slot.
pub trait Recorder: Send {
    /// Called once before any frame.
    fn begin(&mut self, cfg: RecorderConfig) -> PeekabooResult<()>;
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> PeekabooResult<()>;
    /// Chunks completed since the last call.
    fn take_chunks(&mut self) -> Vec<Chunk>;
    /// Flush and close; returns the chunks not yet taken.
    fn finish(&mut self) -> PeekabooResult<Vec<Chunk>>;
}

/// Chunks received so far, in arrival order.
#[derive(Clone, Debug, Default)]
pub struct RecordingBuffer {
    chunks: Vec<Chunk>,
}

impl RecordingBuffer {
    /// Append one chunk. Empty chunks are dropped.
    pub fn push(&mut self, chunk: Chunk) {
        if !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    pub fn extend(&mut self, chunks: impl IntoIterator<Item = Chunk>) {
        for c in chunks {
            self.push(c);
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Concatenate every chunk into one recording.
    pub fn into_recording(self, format: OutputFormat) -> Recording {
        Recording {
            bytes: self.chunks.concat(),
            format,
        }
    }
}

/// A finished capture.
#[derive(Clone, Debug)]
pub struct Recording {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
}

impl Recording {
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Size in megabytes with two decimals, e.g. `"1.42 MB"`.
    pub fn size_label(&self) -> String {
        format_megabytes(self.size_bytes())
    }

    /// `<stem>.<ext>` with the format's extension.
    pub fn file_name(&self, stem: &str) -> String {
        format!("{stem}.{}", self.format.extension)
    }

    /// Write to `<dir>/<stem>.<ext>`, replacing any previous file.
    pub fn write_to_dir(&self, dir: &Path, stem: &str) -> PeekabooResult<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|e| {
            PeekabooError::capture(format!(
                "failed to create output directory '{}': {e}",
                dir.display()
            ))
        })?;
        let path = dir.join(self.file_name(stem));
        std::fs::write(&path, &self.bytes).map_err(|e| {
            PeekabooError::capture(format!(
                "failed to write recording '{}': {e}",
                path.display()
            ))
        })?;
        Ok(path)
    }
}

/// Maps session time onto constant-rate frame slots.
///
/// Each rendered frame fills every slot that became due since the previous one, so a slow frame
/// is repeated and a fast one may fill none.
#[derive(Clone, Copy, Debug)]
pub struct FrameSlots {
    fps: Fps,
    next: u64,
}

impl FrameSlots {
    pub fn new(fps: Fps) -> Self {
        Self { fps, next: 0 }
    }

    /// Slots due at `elapsed` seconds that have not been filled yet.
    pub fn due(&mut self, elapsed: f64) -> Range<u64> {
        if !elapsed.is_finite() || elapsed < 0.0 {
            return self.next..self.next;
        }
        let end = self.fps.secs_to_frames_floor(elapsed) + 1;
        let start = self.next;
        self.next = self.next.max(end);
        start..self.next
    }

    /// Number of slots handed out so far.
    pub fn filled(&self) -> u64 {
        self.next
    }
}

const MEMORY_MAGIC: &[u8; 4] = b"PKBO";
/// Header chunk size: magic, width, height, fps num/den, audio byte count.
pub const MEMORY_HEADER_LEN: usize = 4 + 4 * 4 + 8;
/// Per-frame record size: slot index, width, height, content hash.
pub const MEMORY_RECORD_LEN: usize = 8 + 4 + 4 + 8;

/// Per-frame digest written by [`MemoryRecorder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRecord {
    pub idx: u64,
    pub width: u32,
    pub height: u32,
    pub hash: u64,
}

/// Header written by [`MemoryRecorder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryHeader {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
    pub audio_bytes: u64,
}

/// In-process recorder that packs compact per-frame digests into chunks.
///
/// Useful for dry runs and tests: it follows the same chunking and ordering rules as the
/// ffmpeg recorder without encoding anything.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    cfg: Option<RecorderConfig>,
    pending: Vec<u8>,
    pending_frames: u64,
    ready: Vec<Chunk>,
    last_idx: Option<FrameIndex>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a finished memory recording back into its header and frame records.
    pub fn decode(bytes: &[u8]) -> PeekabooResult<(MemoryHeader, Vec<FrameRecord>)> {
        if bytes.len() < MEMORY_HEADER_LEN || &bytes[..4] != MEMORY_MAGIC {
            return Err(PeekabooError::capture("not a memory recording"));
        }
        let u32_at =
            |b: &[u8], at: usize| u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]]);
        let u64_at = |b: &[u8], at: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&b[at..at + 8]);
            u64::from_le_bytes(raw)
        };

        let header = MemoryHeader {
            width: u32_at(bytes, 4),
            height: u32_at(bytes, 8),
            fps: Fps::new(u32_at(bytes, 12), u32_at(bytes, 16))?,
            audio_bytes: u64_at(bytes, 20),
        };

        let body = &bytes[MEMORY_HEADER_LEN..];
        if !body.len().is_multiple_of(MEMORY_RECORD_LEN) {
            return Err(PeekabooError::capture("truncated memory recording"));
        }
        let records = body
            .chunks_exact(MEMORY_RECORD_LEN)
            .map(|r| FrameRecord {
                idx: u64_at(r, 0),
                width: u32_at(r, 8),
                height: u32_at(r, 12),
                hash: u64_at(r, 16),
            })
            .collect();
        Ok((header, records))
    }

    fn flush_pending(&mut self) {
        if !self.pending.is_empty() {
            self.ready.push(std::mem::take(&mut self.pending));
        }
        self.pending_frames = 0;
    }
}

impl Recorder for MemoryRecorder {
    fn begin(&mut self, cfg: RecorderConfig) -> PeekabooResult<()> {
        cfg.validate()?;
        let audio_bytes = match &cfg.audio {
            Some(audio) => std::fs::metadata(&audio.path)
                .map_err(|e| {
                    PeekabooError::capture(format!(
                        "audio input '{}' is not readable: {e}",
                        audio.path.display()
                    ))
                })?
                .len(),
            None => 0,
        };

        let mut header = Vec::with_capacity(MEMORY_HEADER_LEN);
        header.extend_from_slice(MEMORY_MAGIC);
        header.extend_from_slice(&cfg.width.to_le_bytes());
        header.extend_from_slice(&cfg.height.to_le_bytes());
        header.extend_from_slice(&cfg.fps.num.to_le_bytes());
        header.extend_from_slice(&cfg.fps.den.to_le_bytes());
        header.extend_from_slice(&audio_bytes.to_le_bytes());

        self.ready = vec![header];
        self.pending.clear();
        self.pending_frames = 0;
        self.last_idx = None;
        self.cfg = Some(cfg);
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> PeekabooResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| PeekabooError::capture("memory recorder not started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(PeekabooError::capture(
                "memory recorder received out-of-order frame index",
            ));
        }
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(PeekabooError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        self.last_idx = Some(idx);

        let mut hasher = DefaultHasher::new();
        frame.data.hash(&mut hasher);
        self.pending.extend_from_slice(&idx.0.to_le_bytes());
        self.pending.extend_from_slice(&frame.width.to_le_bytes());
        self.pending.extend_from_slice(&frame.height.to_le_bytes());
        self.pending.extend_from_slice(&hasher.finish().to_le_bytes());

        self.pending_frames += 1;
        if self.pending_frames >= frames_per_slice(cfg) {
            self.flush_pending();
        }
        Ok(())
    }

    fn take_chunks(&mut self) -> Vec<Chunk> {
        std::mem::take(&mut self.ready)
    }

    fn finish(&mut self) -> PeekabooResult<Vec<Chunk>> {
        if self.cfg.take().is_none() {
            return Err(PeekabooError::capture("memory recorder not started"));
        }
        self.flush_pending();
        Ok(self.take_chunks())
    }
}

fn frames_per_slice(cfg: &RecorderConfig) -> u64 {
    let exact = cfg.timeslice.as_secs_f64() * cfg.fps.as_f64();
    (exact - 1e-9).ceil().max(1.0) as u64
}

#[cfg(test)]
#[path = "../../tests/unit/capture/recorder.rs"]
mod tests;
