use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::{
    capture::recorder::{FrameSlots, Recorder, RecordingBuffer},
    eval::{frame_state::FrameState, pulses::PulseWindow},
    foundation::{
        clock::Clock,
        core::{Fps, FrameIndex},
        error::{PeekabooError, PeekabooResult},
    },
    render::StageRenderer,
    session::cancel::CancelToken,
    song::melody::Song,
};

/// Shortest real sleep between ticks, so clocks that never advance on their own do not spin.
pub const MIN_TICK_WAIT: Duration = Duration::from_millis(1);

/// Counts of threads and streams currently alive, for leak checks.
#[derive(Debug, Default)]
pub struct LiveCounters {
    render_loops: AtomicUsize,
    capture_streams: AtomicUsize,
    timers: AtomicUsize,
}

#[derive(Clone, Copy, Debug)]
pub enum Resource {
    RenderLoop,
    CaptureStream,
    Timer,
}

impl LiveCounters {
    fn counter(&self, kind: Resource) -> &AtomicUsize {
        match kind {
            Resource::RenderLoop => &self.render_loops,
            Resource::CaptureStream => &self.capture_streams,
            Resource::Timer => &self.timers,
        }
    }

    pub fn get(&self, kind: Resource) -> usize {
        self.counter(kind).load(Ordering::Acquire)
    }
}

/// Holds one unit of a [`Resource`] count until dropped.
#[derive(Debug)]
pub struct LiveGuard {
    counters: Arc<LiveCounters>,
    kind: Resource,
}

impl LiveGuard {
    /// Count one more `kind` until the guard drops.
    pub fn acquire(counters: &Arc<LiveCounters>, kind: Resource) -> Self {
        counters.counter(kind).fetch_add(1, Ordering::AcqRel);
        Self {
            counters: Arc::clone(counters),
            kind,
        }
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.counters.counter(self.kind).fetch_sub(1, Ordering::AcqRel);
    }
}

/// Latest state published by the loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct TickReport {
    pub elapsed: f64,
    pub progress: f64,
    pub active_line: Option<usize>,
    pub mouth_open: f64,
    pub frames_rendered: u64,
    pub frames_captured: u64,
}

pub type SharedReport = Arc<Mutex<TickReport>>;

/// Recorder plus the constant-rate slot bookkeeping feeding it.
pub struct CaptureSink {
    recorder: Box<dyn Recorder>,
    slots: FrameSlots,
    buffer: RecordingBuffer,
    _stream: LiveGuard,
}

impl std::fmt::Debug for CaptureSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSink")
            .field("slots", &self.slots)
            .field("buffered_bytes", &self.buffer.total_bytes())
            .finish_non_exhaustive()
    }
}

impl CaptureSink {
    /// Wrap a recorder that has already been started with [`Recorder::begin`].
    pub fn new(mut recorder: Box<dyn Recorder>, fps: Fps, stream: LiveGuard) -> Self {
        let mut buffer = RecordingBuffer::default();
        buffer.extend(recorder.take_chunks());
        Self {
            recorder,
            slots: FrameSlots::new(fps),
            buffer,
            _stream: stream,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.slots.filled()
    }

    /// Close the recorder and return every chunk it produced.
    pub fn finish(mut self) -> PeekabooResult<RecordingBuffer> {
        let rest = self.recorder.finish()?;
        self.buffer.extend(rest);
        Ok(self.buffer)
    }
}

/// What the loop hands back once cancelled.
#[derive(Debug)]
pub struct LoopOutcome {
    pub frames_rendered: u64,
    pub capture: Option<CaptureSink>,
}

/// Per-session frame driver: evaluates, draws and optionally captures one frame per tick.
pub struct RenderLoop {
    song: Arc<Song>,
    renderer: StageRenderer,
    pulses: PulseWindow,
    session_start: f64,
    audio_offset: f64,
    capture: Option<CaptureSink>,
    report: SharedReport,
    frames_rendered: u64,
}

impl RenderLoop {
    /// `audio_offset` converts loop clock time into audio context time.
    pub fn new(
        song: Arc<Song>,
        renderer: StageRenderer,
        pulses: PulseWindow,
        session_start: f64,
        audio_offset: f64,
        report: SharedReport,
    ) -> Self {
        Self {
            song,
            renderer,
            pulses,
            session_start,
            audio_offset,
            capture: None,
            report,
            frames_rendered: 0,
        }
    }

    pub fn with_capture(mut self, capture: CaptureSink) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Render the frame for clock time `now` and feed every capture slot it covers.
    pub fn tick(&mut self, now: f64) -> PeekabooResult<FrameState> {
        let elapsed = now - self.session_start;
        let mouth_open = self.pulses.sample(now + self.audio_offset);
        let state = FrameState::evaluate(&self.song, elapsed, mouth_open);
        let frame = self.renderer.render(&state)?;
        self.frames_rendered += 1;

        let mut frames_captured = 0;
        if let Some(capture) = self.capture.as_mut() {
            for idx in capture.slots.due(elapsed) {
                capture.recorder.push_frame(FrameIndex(idx), &frame)?;
            }
            let chunks = capture.recorder.take_chunks();
            capture.buffer.extend(chunks);
            frames_captured = capture.frames_captured();
        }

        let mut report = self.report.lock().unwrap_or_else(PoisonError::into_inner);
        *report = TickReport {
            elapsed,
            progress: state.progress,
            active_line: state.active_line,
            mouth_open,
            frames_rendered: self.frames_rendered,
            frames_captured,
        };
        Ok(state)
    }

    /// Tick once per frame period until `token` is cancelled, then capture up to the stop time.
    pub fn run(
        mut self,
        clock: &dyn Clock,
        token: &CancelToken,
        fps: Fps,
    ) -> PeekabooResult<LoopOutcome> {
        let period = fps.frame_duration_secs();
        while !token.is_cancelled() {
            let now = clock.now();
            self.tick(now)?;
            let remaining = now + period - clock.now();
            let wait = clock.real_duration(remaining).max(MIN_TICK_WAIT);
            if token.wait_timeout(wait) {
                break;
            }
        }
        if self.capture.is_some() {
            self.tick(clock.now())?;
        }
        Ok(LoopOutcome {
            frames_rendered: self.frames_rendered,
            capture: self.capture,
        })
    }

    /// Run on a dedicated thread.
    pub fn spawn(
        self,
        clock: Arc<dyn Clock>,
        token: CancelToken,
        fps: Fps,
        guard: LiveGuard,
    ) -> PeekabooResult<JoinHandle<PeekabooResult<LoopOutcome>>> {
        std::thread::Builder::new()
            .name("peekaboo-render".to_string())
            .spawn(move || {
                let _guard = guard;
                let outcome = self.run(clock.as_ref(), &token, fps);
                if let Err(err) = &outcome {
                    tracing::error!(error = %err, "render loop failed");
                }
                outcome
            })
            .map_err(|e| PeekabooError::render(format!("failed to spawn render loop: {e}")))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/render_loop.rs"]
mod tests;
