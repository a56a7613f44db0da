use super::*;
use crate::foundation::clock::ManualClock;
use crate::song::melody::build_song;
use std::sync::Arc;

fn song_pulses(start: f64) -> PulseSchedule {
    use crate::audio::context::AudioContext;
    use crate::audio::schedule::schedule_song;

    let clock = Arc::new(ManualClock::new(0.0));
    let mut ctx = AudioContext::new(clock, 8_000).unwrap();
    ctx.resume().unwrap();
    schedule_song(&mut ctx, start, &build_song()).unwrap()
}

#[test]
fn idle_without_pulses() {
    assert_eq!(mouth_openness(&[], 3.0), MOUTH_IDLE);
    let mut w = PulseWindow::default();
    assert_eq!(w.sample(3.0), MOUTH_IDLE);
}

#[test]
fn envelope_peaks_at_onset_and_decays() {
    let onsets = [1.0];
    assert!((mouth_openness(&onsets, 1.0) - (MOUTH_IDLE + MOUTH_RANGE)).abs() < 1e-12);
    assert!((mouth_openness(&onsets, 1.3) - (MOUTH_IDLE + MOUTH_RANGE * 0.5)).abs() < 1e-12);
    assert_eq!(mouth_openness(&onsets, 1.6), MOUTH_IDLE);
    assert_eq!(mouth_openness(&onsets, 0.9), MOUTH_IDLE);
    // Opening slightly early never exceeds the peak.
    assert!((mouth_openness(&onsets, 0.98) - (MOUTH_IDLE + MOUTH_RANGE)).abs() < 1e-12);
}

#[test]
fn openness_stays_in_range() {
    let pulses = song_pulses(0.12);
    let mut t = 0.0;
    while t < 23.0 {
        let m = mouth_openness(pulses.onsets(), t);
        assert!(m >= MOUTH_IDLE && m <= MOUTH_IDLE + MOUTH_RANGE + 1e-12);
        t += 0.005;
    }
}

#[test]
fn sliding_window_matches_full_scan() {
    let pulses = song_pulses(0.08);
    let mut w = PulseWindow::new(&pulses);
    let mut max_active = 0;
    let mut t = 0.0;
    while t < 23.0 {
        let fast = w.sample(t);
        let slow = mouth_openness(pulses.onsets(), t);
        assert!((fast - slow).abs() < 1e-12, "t={t}: {fast} vs {slow}");
        max_active = max_active.max(w.active_len());
        t += 1.0 / 60.0;
    }
    // Eighth notes at 96 BPM: at most a couple of onsets fit in the window at once.
    assert!(max_active <= 4);
    assert_eq!(w.pending_len(), 0);
    assert_eq!(w.active_len(), 0);
}

#[test]
fn window_returns_to_idle_after_last_pulse() {
    let mut schedule = PulseSchedule::default();
    schedule.push(0.5);
    let mut w = PulseWindow::new(&schedule);
    assert!(w.sample(0.5) > MOUTH_IDLE);
    assert_eq!(w.sample(1.2), MOUTH_IDLE);
    assert_eq!(w.active_len(), 0);
}
