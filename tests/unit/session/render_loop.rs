use super::*;
use crate::audio::schedule::PulseSchedule;
use crate::capture::format::WEBM_VP9_OPUS;
use crate::capture::recorder::{MemoryRecorder, RecorderConfig};
use crate::eval::pulses::{MOUTH_IDLE, MOUTH_RANGE};
use crate::foundation::clock::{ManualClock, ScaledClock};
use crate::foundation::core::Canvas;
use crate::song::melody::build_song;

const CANVAS: Canvas = Canvas {
    width: 64,
    height: 48,
};

fn render_loop(pulses: &[f64], report: SharedReport) -> RenderLoop {
    let mut schedule = PulseSchedule::default();
    for &p in pulses {
        schedule.push(p);
    }
    RenderLoop::new(
        Arc::new(build_song()),
        StageRenderer::new(CANVAS).unwrap(),
        PulseWindow::new(&schedule),
        10.0,
        -9.5,
        report,
    )
}

fn memory_sink(counters: &Arc<LiveCounters>, fps: Fps) -> CaptureSink {
    let mut rec = MemoryRecorder::new();
    rec.begin(RecorderConfig {
        width: CANVAS.width,
        height: CANVAS.height,
        fps,
        format: WEBM_VP9_OPUS,
        video_bitrate: 1_000_000,
        timeslice: Duration::from_millis(250),
        audio: None,
    })
    .unwrap();
    CaptureSink::new(
        Box::new(rec),
        fps,
        LiveGuard::acquire(counters, Resource::CaptureStream),
    )
}

#[test]
fn tick_publishes_state_in_session_time() {
    let report = SharedReport::default();
    // Audio time runs 9.5 s behind the loop clock; the pulse sits at audio 1.0 = loop 10.5.
    let mut lp = render_loop(&[1.0], Arc::clone(&report));

    let state = lp.tick(10.5).unwrap();
    assert!((state.elapsed - 0.5).abs() < 1e-12);
    assert!((state.mouth_open - (MOUTH_IDLE + MOUTH_RANGE)).abs() < 1e-12);

    let r = *report.lock().unwrap();
    assert_eq!(r.frames_rendered, 1);
    assert_eq!(r.frames_captured, 0);
    assert_eq!(r.active_line, Some(0));

    lp.tick(12.0).unwrap();
    let r = *report.lock().unwrap();
    assert_eq!(r.frames_rendered, 2);
    assert_eq!(r.mouth_open, MOUTH_IDLE);
    assert_eq!(r.active_line, Some(1));
}

#[test]
fn capture_fills_constant_rate_slots() {
    let counters = Arc::new(LiveCounters::default());
    let fps = Fps::new(10, 1).unwrap();
    let mut lp =
        render_loop(&[], SharedReport::default()).with_capture(memory_sink(&counters, fps));
    assert_eq!(counters.get(Resource::CaptureStream), 1);

    // Uneven ticks: 0.0, 0.02, 0.33, 1.0 seconds into the session.
    for t in [10.0, 10.02, 10.33, 11.0] {
        lp.tick(t).unwrap();
    }
    let sink = lp.capture.take().unwrap();
    assert_eq!(sink.frames_captured(), 11);

    let buffer = sink.finish().unwrap();
    assert_eq!(counters.get(Resource::CaptureStream), 0);
    let recording = buffer.into_recording(WEBM_VP9_OPUS);
    let (_, records) = MemoryRecorder::decode(&recording.bytes).unwrap();
    assert_eq!(records.len(), 11);
    // Slots 1..=3 repeat the 0.33 s frame.
    assert_eq!(records[1].hash, records[3].hash);
    assert!(records.iter().enumerate().all(|(i, r)| r.idx == i as u64));
}

#[test]
fn run_stops_on_cancel_and_releases_the_loop() {
    let counters = Arc::new(LiveCounters::default());
    let clock: Arc<dyn Clock> = Arc::new(ScaledClock::new(1.0));
    let token = CancelToken::new();
    let report = SharedReport::default();
    let lp = render_loop(&[], Arc::clone(&report));
    let lp = RenderLoop {
        session_start: clock.now(),
        ..lp
    };

    let handle = lp
        .spawn(
            Arc::clone(&clock),
            token.clone(),
            Fps::new(60, 1).unwrap(),
            LiveGuard::acquire(&counters, Resource::RenderLoop),
        )
        .unwrap();
    assert_eq!(counters.get(Resource::RenderLoop), 1);

    std::thread::sleep(Duration::from_millis(100));
    token.cancel();
    let outcome = handle.join().unwrap().unwrap();
    assert!(outcome.frames_rendered >= 1);
    assert!(outcome.capture.is_none());
    assert_eq!(counters.get(Resource::RenderLoop), 0);
    assert_eq!(report.lock().unwrap().frames_rendered, outcome.frames_rendered);
}

#[test]
fn run_with_a_frozen_clock_still_yields() {
    let clock = ManualClock::new(10.0);
    let token = CancelToken::new();
    token.cancel();
    let counters = Arc::new(LiveCounters::default());
    let fps = Fps::new(30, 1).unwrap();
    let lp = render_loop(&[], SharedReport::default()).with_capture(memory_sink(&counters, fps));

    let outcome = lp.run(&clock, &token, fps).unwrap();
    // Cancelled before the first tick: only the closing capture frame is rendered.
    assert_eq!(outcome.frames_rendered, 1);
    assert_eq!(outcome.capture.as_ref().unwrap().frames_captured(), 1);
}
