use super::*;
use crate::song::melody::build_song;

#[test]
fn rest_frame_covers_the_eyes_with_a_closed_mouth() {
    let song = build_song();
    let f = FrameState::at_rest(&song);
    assert_eq!(f.elapsed, 0.0);
    assert_eq!(f.mouth_open, MOUTH_REST);
    assert!(f.peekaboo);
    assert!(!f.confetti);
    assert_eq!(f.active_line, Some(0));
    assert_eq!(f.progress, 0.0);
}

#[test]
fn motion_matches_closed_forms() {
    let t = 1.7;
    assert!((bob(t) - (3.4f64).sin() * 4.0).abs() < 1e-12);
    assert!((tilt(t) - (2.04f64).sin() * 0.06).abs() < 1e-12);
    for i in 0..2000 {
        let t = i as f64 * 0.01;
        assert!(bob(t).abs() <= 4.0);
        assert!(tilt(t).abs() <= 0.06);
    }
}

#[test]
fn eyes_blink_only_occasionally() {
    let mut closed = 0;
    let samples = 60 * 22;
    for i in 0..samples {
        let e = eye_open(i as f64 / 60.0);
        assert!(e == 0.5 || e == 0.12, "eye_open {e}");
        if e < 0.5 {
            closed += 1;
        }
    }
    assert!(closed > 0);
    assert!(closed < samples / 5);
}

#[test]
fn peekaboo_in_the_intro_and_flickering_at_the_end() {
    let song = build_song();
    assert!(is_peekaboo(&song, 0.5, song.active_line(0.5)));
    assert!(!is_peekaboo(&song, 2.0 * BEAT + 0.01, song.active_line(2.0 * BEAT + 0.01)));

    let last_start = song.lyric_lines[song.lyric_lines.len() - 1].onset;
    let mut covered = 0;
    let mut open = 0;
    let mut t = last_start + 0.1;
    while t < song.total_duration {
        if is_peekaboo(&song, t, song.active_line(t)) {
            covered += 1;
        } else {
            open += 1;
        }
        t += 0.05;
    }
    assert!(covered > 0 && open > 0);
}

#[test]
fn confetti_only_in_the_last_two_seconds() {
    let song = build_song();
    let mouth = 0.12;
    assert!(!FrameState::evaluate(&song, song.total_duration - 2.1, mouth).confetti);
    assert!(FrameState::evaluate(&song, song.total_duration - 1.9, mouth).confetti);
    let end = FrameState::evaluate(&song, song.total_duration, mouth);
    assert!(end.confetti);
    assert_eq!(end.progress, 1.0);
    assert_eq!(end.active_line, song.last_line_index());
}
