use super::*;
use crate::foundation::clock::ManualClock;

fn running_ctx(clock: &Arc<ManualClock>) -> AudioContext {
    let mut ctx = AudioContext::new(clock.clone(), 1_000).unwrap();
    ctx.resume().unwrap();
    ctx
}

fn tone(start: f64, stop: f64) -> Voice {
    Voice {
        waveform: Waveform::Sine,
        freq_hz: 50.0,
        gain: AudioParam::new(0.5),
        vibrato: None,
        start,
        stop,
    }
}

#[test]
fn current_time_is_frozen_until_resumed() {
    let clock = Arc::new(ManualClock::new(5.0));
    let mut ctx = AudioContext::new(clock.clone(), 48_000).unwrap();
    assert_eq!(ctx.state(), AudioState::Suspended);
    assert_eq!(ctx.current_time(), 0.0);

    clock.advance(1.0);
    assert_eq!(ctx.current_time(), 0.0);

    ctx.resume().unwrap();
    clock.advance(2.0);
    assert_eq!(ctx.current_time(), 2.0);

    ctx.suspend();
    clock.advance(10.0);
    assert_eq!(ctx.current_time(), 2.0);

    ctx.resume().unwrap();
    clock.advance(1.0);
    assert_eq!(ctx.current_time(), 3.0);
}

#[test]
fn scheduling_requires_a_running_context() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut ctx = AudioContext::new(clock.clone(), 1_000).unwrap();
    assert!(ctx.add_voice(tone(0.0, 1.0)).is_err());

    ctx.resume().unwrap();
    ctx.add_voice(tone(0.0, 1.0)).unwrap();
    assert_eq!(ctx.voice_count(), 1);

    ctx.close();
    assert_eq!(ctx.voice_count(), 0);
    assert!(ctx.resume().is_err());
    assert!(ctx.add_voice(tone(0.0, 1.0)).is_err());
}

#[test]
fn invalid_voice_windows_are_rejected() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut ctx = running_ctx(&clock);
    assert!(ctx.add_voice(tone(1.0, 1.0)).is_err());
    assert!(ctx.add_voice(tone(-1.0, 1.0)).is_err());
    assert!(ctx.add_voice(tone(0.0, f64::NAN)).is_err());
}

#[test]
fn destination_is_silent_outside_voice_windows() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut ctx = running_ctx(&clock);
    ctx.add_voice(tone(1.0, 2.0)).unwrap();

    let pcm = ctx.render_destination(0.0, 3.0).unwrap();
    assert_eq!(pcm.len(), 3_000 * 2);

    let frame = |i: usize| pcm[i * 2];
    assert!((0..1_000).all(|i| frame(i) == 0.0));
    assert!((2_000..3_000).all(|i| frame(i) == 0.0));
    let peak = (1_000..2_000).map(|i| frame(i).abs()).fold(0.0f32, f32::max);
    assert!(peak > 0.4 && peak <= 0.5 * 0.9 + 1e-6);
    // Stereo channels carry the same signal.
    assert!(pcm.chunks_exact(2).all(|c| c[0] == c[1]));
}

#[test]
fn destination_windows_line_up() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut ctx = running_ctx(&clock);
    ctx.add_voice(tone(0.0, 2.0)).unwrap();

    let whole = ctx.render_destination(0.0, 2.0).unwrap();
    let tail = ctx.render_destination(1.0, 1.0).unwrap();
    assert_eq!(&whole[2_000..], &tail[..]);
}

#[test]
fn disconnect_all_silences_the_graph() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut ctx = running_ctx(&clock);
    ctx.add_voice(tone(0.0, 1.0)).unwrap();
    ctx.disconnect_all();
    let pcm = ctx.render_destination(0.0, 1.0).unwrap();
    assert!(pcm.iter().all(|s| *s == 0.0));
}

#[test]
fn output_is_clamped() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut ctx = running_ctx(&clock);
    for _ in 0..10 {
        ctx.add_voice(Voice {
            gain: AudioParam::new(1.0),
            ..tone(0.0, 1.0)
        })
        .unwrap();
    }
    let pcm = ctx.render_destination(0.0, 1.0).unwrap();
    assert!(pcm.iter().all(|s| (-1.0..=1.0).contains(s)));
    assert!(pcm.iter().any(|s| *s == 1.0));
}
