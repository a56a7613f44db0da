use std::io::{Read, Write as _};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::{
    capture::recorder::{Chunk, Recorder, RecorderConfig},
    foundation::{
        core::{Fps, FrameIndex},
        error::{PeekabooError, PeekabooResult},
        math::mul_div255_u16,
    },
    render::FrameRGBA,
};

const STDOUT_READ_BUF: usize = 64 * 1024;

/// Recorder that spawns the system `ffmpeg` and streams raw frames to stdin.
///
/// The container is written to ffmpeg's stdout and handed out in timeslice-sized chunks by a
/// drain thread; audio comes from the raw PCM file named in [`RecorderConfig::audio`].
pub struct FfmpegRecorder {
    bg_rgba: [u8; 4],

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout_drain: Option<JoinHandle<std::io::Result<()>>>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    chunks: Option<Receiver<Chunk>>,

    scratch: Vec<u8>,
    cfg: Option<RecorderConfig>,
    last_idx: Option<FrameIndex>,
}

impl std::fmt::Debug for FfmpegRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegRecorder")
            .field("running", &self.child.is_some())
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl Default for FfmpegRecorder {
    fn default() -> Self {
        Self::new([0, 0, 0, 255])
    }
}

impl FfmpegRecorder {
    /// `bg_rgba` is the straight-alpha colour transparent pixels are flattened over.
    pub fn new(bg_rgba: [u8; 4]) -> Self {
        Self {
            bg_rgba,
            child: None,
            stdin: None,
            stdout_drain: None,
            stderr_drain: None,
            chunks: None,
            scratch: Vec::new(),
            cfg: None,
            last_idx: None,
        }
    }

    fn command(cfg: &RecorderConfig) -> Command {
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Raw frames are flattened to opaque RGBA before they reach stdin.
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
        ]);
        push_input_fps(&mut cmd, cfg.fps);
        cmd.args(["-i", "pipe:0"]);

        if let Some(audio) = cfg.audio.as_ref() {
            cmd.args([
                "-f",
                "f32le",
                "-ar",
                &audio.sample_rate.to_string(),
                "-ac",
                &audio.channels.to_string(),
                "-i",
            ])
            .arg(&audio.path);
        }

        if let Some(enc) = cfg.format.video_encoder {
            cmd.args(["-c:v", enc]);
            if enc.starts_with("libvpx") {
                cmd.args(["-deadline", "realtime", "-cpu-used", "8"]);
            }
        }
        cmd.args([
            "-pix_fmt",
            "yuv420p",
            "-b:v",
            &cfg.video_bitrate.to_string(),
        ]);

        if cfg.audio.is_some() {
            if let Some(enc) = cfg.format.audio_encoder {
                cmd.args(["-c:a", enc]);
            }
            cmd.arg("-shortest");
        } else {
            cmd.arg("-an");
        }

        cmd.args(["-f", cfg.format.muxer, "pipe:1"]);
        cmd
    }
}

impl Recorder for FfmpegRecorder {
    fn begin(&mut self, cfg: RecorderConfig) -> PeekabooResult<()> {
        cfg.validate()?;
        if self.child.is_some() {
            return Err(PeekabooError::capture("ffmpeg recorder is already running"));
        }
        if let Some(audio) = cfg.audio.as_ref()
            && !audio.path.is_file()
        {
            return Err(PeekabooError::capture(format!(
                "audio input '{}' does not exist",
                audio.path.display()
            )));
        }
        if !is_ffmpeg_on_path() {
            return Err(PeekabooError::capture(
                "ffmpeg is required for recording, but was not found on PATH",
            ));
        }

        let mut child = Self::command(&cfg).spawn().map_err(|e| {
            PeekabooError::capture(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PeekabooError::capture("failed to open ffmpeg stdin (unexpected)"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PeekabooError::capture("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| PeekabooError::capture("failed to open ffmpeg stderr (unexpected)"))?;

        let (tx, rx) = mpsc::channel();
        let timeslice = cfg.timeslice;
        let stdout_drain = std::thread::spawn(move || drain_stdout(stdout, timeslice, tx));
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        tracing::debug!(
            mime = cfg.format.mime,
            width = cfg.width,
            height = cfg.height,
            audio = cfg.audio.is_some(),
            "ffmpeg recorder started"
        );

        self.scratch = vec![0u8; (cfg.width * cfg.height * 4) as usize];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stdout_drain = Some(stdout_drain);
        self.stderr_drain = Some(stderr_drain);
        self.chunks = Some(rx);
        self.cfg = Some(cfg);
        self.last_idx = None;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> PeekabooResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| PeekabooError::capture("ffmpeg recorder not started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(PeekabooError::capture(
                "ffmpeg recorder received out-of-order frame index",
            ));
        }
        self.last_idx = Some(idx);

        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(PeekabooError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(PeekabooError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        if frame.premultiplied {
            flatten_premul_over_bg_to_opaque_rgba8(&mut self.scratch, &frame.data, self.bg_rgba)?;
        } else {
            self.scratch.copy_from_slice(&frame.data);
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(PeekabooError::capture("ffmpeg recorder is already finalized"));
        };
        stdin.write_all(&self.scratch).map_err(|e| {
            PeekabooError::capture(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    fn take_chunks(&mut self) -> Vec<Chunk> {
        match self.chunks.as_ref() {
            Some(rx) => rx.try_iter().collect(),
            None => Vec::new(),
        }
    }

    fn finish(&mut self) -> PeekabooResult<Vec<Chunk>> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| PeekabooError::capture("ffmpeg recorder not started"))?;

        let status = child.wait().map_err(|e| {
            PeekabooError::capture(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        if let Some(handle) = self.stdout_drain.take() {
            handle
                .join()
                .map_err(|_| PeekabooError::capture("ffmpeg stdout drain thread panicked"))?
                .map_err(|e| PeekabooError::capture(format!("ffmpeg stdout read failed: {e}")))?;
        }
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PeekabooError::capture("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| PeekabooError::capture(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        let rest = self.take_chunks();
        self.chunks = None;
        self.cfg = None;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(PeekabooError::capture(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        Ok(rest)
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Forward ffmpeg's stdout as chunks, one per elapsed timeslice, plus a final partial one.
fn drain_stdout(
    mut stdout: impl Read,
    timeslice: Duration,
    tx: mpsc::Sender<Chunk>,
) -> std::io::Result<()> {
    let mut buf = vec![0u8; STDOUT_READ_BUF];
    let mut pending = Vec::new();
    let mut slice_start = Instant::now();
    loop {
        let n = stdout.read(&mut buf)?;
        if n == 0 {
            break;
        }
        pending.extend_from_slice(&buf[..n]);
        if slice_start.elapsed() >= timeslice {
            // Receiver gone means the recorder was dropped; keep draining so ffmpeg can exit.
            let _ = tx.send(std::mem::take(&mut pending));
            slice_start = Instant::now();
        }
    }
    if !pending.is_empty() {
        let _ = tx.send(pending);
    }
    Ok(())
}

fn push_input_fps(cmd: &mut Command, fps: Fps) {
    // `-r` before `-i` sets the rawvideo input rate.
    cmd.args(["-r", &format!("{}/{}", fps.num, fps.den)]);
}

/// Composite premultiplied RGBA8 over an opaque `bg_rgba`, producing opaque RGBA8.
pub fn flatten_premul_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> PeekabooResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(PeekabooError::validation(
            "flatten_premul_over_bg_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = bg_rgba[0] as u16;
    let bg_g = bg_rgba[1] as u16;
    let bg_b = bg_rgba[2] as u16;

    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = s[3] as u16;
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255u16 - a;
        d[0] = (s[0] as u16 + mul_div255_u16(bg_r, inv)).min(255) as u8;
        d[1] = (s[1] as u16 + mul_div255_u16(bg_g, inv)).min(255) as u8;
        d[2] = (s[2] as u16 + mul_div255_u16(bg_b, inv)).min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> PeekabooResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
