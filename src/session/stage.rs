use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::{
    audio::{
        context::{AudioContext, AudioState, OUTPUT_CHANNELS},
        pcm::TempPcmFile,
        schedule::schedule_song,
    },
    capture::{
        CaptureBackend, FfmpegBackend,
        format::OutputFormat,
        recorder::{AudioInput, RecorderConfig},
        state::CaptureState,
    },
    eval::pulses::PulseWindow,
    foundation::{
        clock::Clock,
        error::{PeekabooError, PeekabooResult},
    },
    render::StageRenderer,
    session::{
        cancel::CancelToken,
        config::StageConfig,
        render_loop::{
            CaptureSink, LiveCounters, LiveGuard, LoopOutcome, RenderLoop, Resource, SharedReport,
            TickReport,
        },
        timer::AutoStopTimer,
    },
    song::melody::{Song, build_song},
};

/// What a session was started for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum SessionMode {
    Preview,
    Record,
}

/// A finished recording on disk.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RecordingInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// E.g. `"1.42 MB"`.
    pub size_label: String,
    pub format: OutputFormat,
}

/// Snapshot of what the stage is doing.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct StageStatus {
    pub is_playing: bool,
    pub is_recording: bool,
    /// Video time of the latest frame. The first note sounds at the session's audio lead.
    pub elapsed: f64,
    pub progress: f64,
    pub active_line: Option<usize>,
    pub mouth_open: f64,
    pub frames_rendered: u64,
    pub last_recording: Option<RecordingInfo>,
}

/// Threads and streams alive right now.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiveResources {
    pub render_loops: usize,
    pub capture_streams: usize,
    pub timers: usize,
}

impl LiveResources {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

/// Called with every recording written to disk.
pub type RecordingHook = Box<dyn Fn(&RecordingInfo) + Send + Sync>;

struct Session {
    id: u64,
    mode: SessionMode,
    token: CancelToken,
    render_loop: Option<JoinHandle<PeekabooResult<LoopOutcome>>>,
    timer: Option<AutoStopTimer>,
    capture_state: CaptureState,
    format: Option<OutputFormat>,
    // Kept alive until the recorder has been finished.
    audio_tap: Option<TempPcmFile>,
}

struct StageInner {
    config: StageConfig,
    song: Arc<Song>,
    clock: Arc<dyn Clock>,
    backend: Arc<dyn CaptureBackend>,
    audio: Mutex<Option<AudioContext>>,
    session: Mutex<Option<Session>>,
    // Serializes start/stop commands; the auto-stop path never takes it.
    commands: Mutex<()>,
    next_id: AtomicU64,
    report: SharedReport,
    last_recording: Mutex<Option<RecordingInfo>>,
    counters: Arc<LiveCounters>,
    on_recording: Mutex<Option<RecordingHook>>,
    // Sessions started and not yet fully shut down.
    open_sessions: Mutex<usize>,
    idle: Condvar,
}

/// Owns at most one playback session and the last recording.
///
/// Every command first tears down the current session completely (loop joined, timer joined,
/// recorder finished), so nothing from an earlier session outlives the start of the next one.
pub struct Stage {
    inner: Arc<StageInner>,
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("config", &self.inner.config)
            .field("backend", &self.inner.backend)
            .finish_non_exhaustive()
    }
}

impl Stage {
    /// A stage that records through the system `ffmpeg`.
    pub fn new(config: StageConfig, clock: Arc<dyn Clock>) -> PeekabooResult<Self> {
        Self::with_backend(config, clock, Arc::new(FfmpegBackend))
    }

    /// A stage that records through `backend`. Fails if `config` does not validate.
    pub fn with_backend(
        config: StageConfig,
        clock: Arc<dyn Clock>,
        backend: Arc<dyn CaptureBackend>,
    ) -> PeekabooResult<Self> {
        config.validate()?;
        let song = build_song();
        song.validate()?;
        Ok(Self {
            inner: Arc::new(StageInner {
                config,
                song: Arc::new(song),
                clock,
                backend,
                audio: Mutex::new(None),
                session: Mutex::new(None),
                commands: Mutex::new(()),
                next_id: AtomicU64::new(1),
                report: SharedReport::default(),
                last_recording: Mutex::new(None),
                counters: Arc::new(LiveCounters::default()),
                on_recording: Mutex::new(None),
                open_sessions: Mutex::new(0),
                idle: Condvar::new(),
            }),
        })
    }

    pub fn config(&self) -> &StageConfig {
        &self.inner.config
    }

    pub fn song(&self) -> &Song {
        &self.inner.song
    }

    /// Register a callback for finished recordings.
    ///
    /// The hook runs on the thread that stopped the session and must not start a new one.
    pub fn on_recording(&self, hook: impl Fn(&RecordingInfo) + Send + Sync + 'static) {
        *lock(&self.inner.on_recording) = Some(Box::new(hook));
    }

    /// Start a preview session, replacing any current one. Returns the session id.
    #[tracing::instrument(skip(self))]
    pub fn start_playback(&self) -> PeekabooResult<u64> {
        let _cmd = lock(&self.inner.commands);
        self.inner.teardown_current();
        self.inner.wait_until_idle();
        Arc::clone(&self.inner).start(SessionMode::Preview)
    }

    /// Start a recording session, replacing any current one. Returns the session id.
    ///
    /// Fails without starting anything when the recorder cannot be set up.
    #[tracing::instrument(skip(self))]
    pub fn start_recording(&self) -> PeekabooResult<u64> {
        let _cmd = lock(&self.inner.commands);
        self.inner.teardown_current();
        self.inner.wait_until_idle();
        Arc::clone(&self.inner).start(SessionMode::Record)
    }

    /// Stop whatever is running. Returns the recording it produced, if any.
    pub fn stop(&self) -> PeekabooResult<Option<RecordingInfo>> {
        let _cmd = lock(&self.inner.commands);
        match self.inner.take_session(None) {
            Some(session) => self.inner.shutdown(session),
            None => Ok(None),
        }
    }

    /// Stop session `id` if it is still the current one.
    pub fn stop_session(&self, id: u64) -> PeekabooResult<Option<RecordingInfo>> {
        self.inner.stop_session(id)
    }

    /// Session flags plus the latest frame report. Report fields keep their last values after a
    /// session ends.
    pub fn status(&self) -> StageStatus {
        let (is_playing, is_recording) = match lock(&self.inner.session).as_ref() {
            Some(s) => (true, s.capture_state.is_recording()),
            None => (false, false),
        };
        let report = *lock(&self.inner.report);
        StageStatus {
            is_playing,
            is_recording,
            elapsed: report.elapsed,
            progress: report.progress,
            active_line: report.active_line,
            mouth_open: report.mouth_open,
            frames_rendered: report.frames_rendered,
            last_recording: lock(&self.inner.last_recording).clone(),
        }
    }

    /// Block until every session has been fully shut down, recordings included.
    ///
    /// `timeout` is real time. Returns `false` if it elapsed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let open = lock(&self.inner.open_sessions);
        let (open, _) = self
            .inner
            .idle
            .wait_timeout_while(open, timeout, |n| *n > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *open == 0
    }

    /// Id of the current session, if any.
    pub fn current_session(&self) -> Option<u64> {
        lock(&self.inner.session).as_ref().map(|s| s.id)
    }

    /// Render loops, capture streams and timers alive right now.
    pub fn live_resources(&self) -> LiveResources {
        let c = &self.inner.counters;
        LiveResources {
            render_loops: c.get(Resource::RenderLoop),
            capture_streams: c.get(Resource::CaptureStream),
            timers: c.get(Resource::Timer),
        }
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(error = %err, "stopping stage on drop failed");
        }
        if let Some(ctx) = lock(&self.inner.audio).as_mut() {
            ctx.close();
        }
    }
}

impl StageInner {
    fn start(self: Arc<Self>, mode: SessionMode) -> PeekabooResult<u64> {
        let cfg = &self.config;
        let song = Arc::clone(&self.song);
        let fps = cfg.frame_rate()?;
        let canvas = cfg.canvas();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let lead = match mode {
            SessionMode::Preview => cfg.preview_audio_lead_s,
            SessionMode::Record => cfg.record_audio_lead_s,
        };
        let margin = match mode {
            SessionMode::Preview => cfg.preview_stop_margin_s,
            SessionMode::Record => cfg.record_stop_margin_s,
        };

        let renderer = StageRenderer::new(canvas)?;
        let mut capture_state = CaptureState::Idle;

        let (pulses, audio_now, audio_offset, audio_tap) = {
            let mut audio = lock(&self.audio);
            let ctx = ensure_audio(&mut audio, &self.clock, cfg.sample_rate)?;
            ctx.disconnect_all();

            // Both readings describe the same instant: the start of the audio window.
            let clock_now = self.clock.now();
            let audio_now = ctx.current_time();
            let audio_offset = audio_now - clock_now;
            let audio_start = audio_now + lead;
            let mut pulses = schedule_song(ctx, audio_start, &song)?;
            if mode == SessionMode::Preview {
                // Opens the mouth right as the audio starts.
                pulses.push(audio_start);
            }

            let audio_tap = match mode {
                SessionMode::Preview => None,
                SessionMode::Record => {
                    let pcm = ctx
                        .render_destination(audio_now, lead + song.total_duration + margin)
                        .and_then(|pcm| TempPcmFile::create("tap", &pcm))
                        .map_err(|e| {
                            ctx.disconnect_all();
                            PeekabooError::capture(format!("audio tap unavailable: {e}"))
                        })?;
                    Some(pcm)
                }
            };
            (pulses, audio_now, audio_offset, audio_tap)
        };

        let mut format = None;
        let capture = match (&mode, &audio_tap) {
            (SessionMode::Record, Some(tap)) => {
                let negotiated = self.backend.negotiate();
                let mut recorder = self.backend.recorder();
                let begun = capture_state.begin().and_then(|()| {
                    recorder.begin(RecorderConfig {
                        width: canvas.width,
                        height: canvas.height,
                        fps,
                        format: negotiated,
                        video_bitrate: cfg.video_bitrate,
                        timeslice: cfg.timeslice(),
                        audio: Some(AudioInput {
                            path: tap.path().to_path_buf(),
                            sample_rate: cfg.sample_rate,
                            channels: OUTPUT_CHANNELS,
                        }),
                    })
                });
                if let Err(err) = begun {
                    capture_state.abort();
                    self.release_audio();
                    tracing::error!(error = %err, "recording failed to start");
                    return Err(match err {
                        PeekabooError::Capture(_) => err,
                        other => PeekabooError::capture(other.to_string()),
                    });
                }
                format = Some(negotiated);
                Some(CaptureSink::new(
                    recorder,
                    fps,
                    LiveGuard::acquire(&self.counters, Resource::CaptureStream),
                ))
            }
            _ => None,
        };

        *lock(&self.report) = TickReport::default();
        let token = CancelToken::new();
        // Video time zero is the start of the audio window, however long setup took. The first
        // tick fills the slots it missed with its own frame.
        let session_start = audio_now - audio_offset;
        let mut render_loop = RenderLoop::new(
            song,
            renderer,
            PulseWindow::new(&pulses),
            session_start,
            audio_offset,
            Arc::clone(&self.report),
        );
        if let Some(capture) = capture {
            render_loop = render_loop.with_capture(capture);
        }

        let loop_handle = render_loop.spawn(
            Arc::clone(&self.clock),
            token.clone(),
            fps,
            LiveGuard::acquire(&self.counters, Resource::RenderLoop),
        );
        let loop_handle = match loop_handle {
            Ok(handle) => handle,
            Err(err) => {
                self.release_audio();
                return Err(err);
            }
        };

        let deadline = session_start + self.song.total_duration + margin;
        let weak: Weak<StageInner> = Arc::downgrade(&self);
        let timer = AutoStopTimer::spawn(
            Arc::clone(&self.clock),
            token.clone(),
            deadline,
            LiveGuard::acquire(&self.counters, Resource::Timer),
            move || {
                if let Some(inner) = weak.upgrade()
                    && let Err(err) = inner.stop_session(id)
                {
                    tracing::error!(session = id, error = %err, "auto-stop failed");
                }
            },
        );

        *lock(&self.open_sessions) += 1;
        let mut session = Session {
            id,
            mode,
            token,
            render_loop: Some(loop_handle),
            timer: None,
            capture_state,
            format,
            audio_tap,
        };
        match timer {
            Ok(timer) => session.timer = Some(timer),
            Err(err) => {
                self.shutdown(session)?;
                return Err(err);
            }
        }

        tracing::info!(
            session = id,
            ?mode,
            audio_start = audio_now + lead,
            pulses = pulses.len(),
            "session started"
        );
        tracing::debug!(
            session = id,
            width = canvas.width,
            height = canvas.height,
            fps = cfg.fps,
            mime = format.map(|f| f.mime),
            "session details"
        );

        *lock(&self.session) = Some(session);
        Ok(id)
    }

    /// Take the current session out of its slot; with `Some(id)`, only if it is that session.
    fn take_session(&self, id: Option<u64>) -> Option<Session> {
        let mut slot = lock(&self.session);
        match (slot.as_ref(), id) {
            (Some(s), Some(want)) if s.id != want => None,
            _ => slot.take(),
        }
    }

    fn stop_session(&self, id: u64) -> PeekabooResult<Option<RecordingInfo>> {
        match self.take_session(Some(id)) {
            Some(session) => self.shutdown(session),
            None => {
                tracing::debug!(session = id, "stop for a finished session ignored");
                Ok(None)
            }
        }
    }

    fn teardown_current(&self) {
        if let Some(session) = self.take_session(None)
            && let Err(err) = self.shutdown(session)
        {
            tracing::warn!(error = %err, "previous session did not shut down cleanly");
        }
    }

    /// Block until sessions taken by other threads (auto-stop) have finished shutting down.
    fn wait_until_idle(&self) {
        let open = lock(&self.open_sessions);
        let _open = self
            .idle
            .wait_while(open, |n| *n > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    fn shutdown(&self, session: Session) -> PeekabooResult<Option<RecordingInfo>> {
        let result = self.shutdown_session(session);
        let mut open = lock(&self.open_sessions);
        *open = open.saturating_sub(1);
        self.idle.notify_all();
        result
    }

    fn shutdown_session(&self, mut session: Session) -> PeekabooResult<Option<RecordingInfo>> {
        session.token.cancel();

        let outcome = match session.render_loop.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PeekabooError::render("render loop thread panicked"))
                .and_then(|r| r),
            None => Ok(LoopOutcome {
                frames_rendered: 0,
                capture: None,
            }),
        };
        if let Some(timer) = session.timer.take() {
            timer.join();
        }
        self.release_audio();

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                session.capture_state.abort();
                return Err(err);
            }
        };

        let info = match (outcome.capture, session.format) {
            (Some(capture), Some(format)) => {
                session.capture_state.finalize()?;
                let buffer = capture.finish()?;
                let chunks = buffer.chunk_count();
                let recording = buffer.into_recording(format);
                let path =
                    recording.write_to_dir(&self.config.output_dir, &self.config.file_stem)?;
                session.capture_state.complete()?;

                let info = RecordingInfo {
                    path,
                    size_bytes: recording.size_bytes(),
                    size_label: recording.size_label(),
                    format,
                };
                tracing::info!(
                    session = session.id,
                    path = %info.path.display(),
                    size = %info.size_label,
                    chunks,
                    "recording saved"
                );
                *lock(&self.last_recording) = Some(info.clone());
                if let Some(hook) = lock(&self.on_recording).as_ref() {
                    hook(&info);
                }
                Some(info)
            }
            _ => None,
        };

        drop(session.audio_tap.take());
        tracing::info!(
            session = session.id,
            mode = ?session.mode,
            frames = outcome.frames_rendered,
            "session stopped"
        );
        Ok(info)
    }

    fn release_audio(&self) {
        if let Some(ctx) = lock(&self.audio).as_mut() {
            ctx.disconnect_all();
        }
    }
}

fn ensure_audio<'a>(
    slot: &'a mut Option<AudioContext>,
    clock: &Arc<dyn Clock>,
    sample_rate: u32,
) -> PeekabooResult<&'a mut AudioContext> {
    let reusable = slot
        .as_ref()
        .is_some_and(|ctx| ctx.state() != AudioState::Closed && ctx.sample_rate() == sample_rate);
    if !reusable {
        *slot = Some(AudioContext::new(Arc::clone(clock), sample_rate)?);
    }
    let ctx = slot
        .as_mut()
        .ok_or_else(|| PeekabooError::audio("audio context unavailable"))?;
    if ctx.state() != AudioState::Running {
        ctx.resume()?;
    }
    Ok(ctx)
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "../../tests/unit/session/stage.rs"]
mod tests;
