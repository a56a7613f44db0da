use super::*;

#[test]
fn built_song_is_valid_and_deterministic() {
    let a = build_song();
    let b = build_song();
    a.validate().unwrap();
    assert_eq!(a.notes, b.notes);
    assert_eq!(a.lyric_lines, b.lyric_lines);
    assert_eq!(a.notes.len(), 55);
    assert_eq!(a.lyric_lines.len(), 9);
    assert!((a.total_duration - 21.5625).abs() < 1e-12);
}

#[test]
fn equal_tempered_tuning_matches_reference() {
    assert!((semitone_freq(0) - 440.0).abs() < 1e-9);
    assert!((semitone_freq(12) - 880.0).abs() < 1e-9);
    assert!((semitone_freq(-9) - 261.6255653).abs() < 1e-6);
    assert!((semitone_freq(3) - 523.2511306).abs() < 1e-6);
}

#[test]
fn song_starts_with_peekaboo_flourish() {
    let song = build_song();
    assert_eq!(song.notes[0].onset, 0.0);
    assert!((song.notes[0].freq_hz - semitone_freq(-2)).abs() < 1e-9);
    assert!((song.notes[1].freq_hz - semitone_freq(3)).abs() < 1e-9);
    assert!((song.notes[1].onset - 0.5 * BEAT).abs() < 1e-12);
}

#[test]
fn final_phrase_is_accented() {
    let song = build_song();
    let accented: Vec<_> = song.notes.iter().filter(|n| n.gain > 0.2).collect();
    assert_eq!(accented.len(), 6);
    assert!(accented.iter().all(|n| n.onset >= 30.0 * BEAT));
}

#[test]
fn active_line_follows_the_schedule() {
    let song = build_song();
    assert_eq!(song.active_line(0.0), Some(0));
    assert_eq!(song.lyric_lines[0].text, "Peekaboo!");
    assert_eq!(song.active_line(2.0 * BEAT), Some(1));
    assert_eq!(song.lyric_lines[1].text, "Johny Johny");
    assert_eq!(song.active_line(song.total_duration), song.last_line_index());
    assert_eq!(song.active_line(-0.1), None);
    assert_eq!(song.active_line(song.total_duration + 0.1), None);
}

#[test]
fn active_line_tail_keeps_previous_line_only_past_the_last_onset() {
    let song = build_song();
    // Just past the end of "Peekaboo!" but inside its tail: the newer line wins.
    assert_eq!(song.active_line(2.0 * BEAT + 0.01), Some(1));
    // Every sampled time inside the song maps to the unique line whose window contains it.
    let mut t = 0.0;
    while t <= song.total_duration {
        let idx = song.active_line(t).unwrap();
        let line = song.lyric_lines[idx];
        assert!(t >= line.onset && t <= line.end() + LINE_TAIL_S);
        if let Some(next) = song.lyric_lines.get(idx + 1) {
            assert!(t < next.onset);
        }
        t += 0.01;
    }
}

#[test]
fn progress_is_clamped_and_monotonic() {
    let song = build_song();
    assert_eq!(song.progress(-1.0), 0.0);
    assert_eq!(song.progress(song.total_duration * 2.0), 1.0);
    let mut prev = 0.0;
    for i in 0..=300 {
        let p = song.progress(i as f64 * 0.1);
        assert!(p >= prev);
        prev = p;
    }
}

#[test]
fn validate_rejects_out_of_order_notes() {
    let mut song = build_song();
    song.notes.swap(0, 5);
    assert!(song.validate().is_err());

    let mut song = build_song();
    song.total_duration = 1.0;
    assert!(song.validate().is_err());
}
