use crate::foundation::error::{PeekabooError, PeekabooResult};

/// Tempo of the song.
pub const BPM: f64 = 96.0;
/// Seconds per beat.
pub const BEAT: f64 = 60.0 / BPM;
/// Reference pitch for equal-tempered tuning.
pub const A4_HZ: f64 = 440.0;
/// Grace period after a lyric line ends during which it is still considered active.
pub const LINE_TAIL_S: f64 = 0.05;

const DEFAULT_GAIN: f64 = 0.16;
const ACCENT_GAIN: f64 = 0.22;
const TOTAL_BEATS: f64 = 34.5;

/// Frequency `n` equal-tempered semitones away from A4.
pub fn semitone_freq(n: i32) -> f64 {
    A4_HZ * 2f64.powf(f64::from(n) / 12.0)
}

/// One tone event. Times are seconds from song start.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct Note {
    pub freq_hz: f64,
    pub onset: f64,
    pub duration: f64,
    pub gain: f64,
}

impl Note {
    pub fn end(&self) -> f64 {
        self.onset + self.duration
    }
}

/// One line of lyrics shown while it is being sung.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct LyricLine {
    pub text: &'static str,
    pub onset: f64,
    pub duration: f64,
}

impl LyricLine {
    pub fn end(&self) -> f64 {
        self.onset + self.duration
    }

    fn contains(&self, t: f64) -> bool {
        t >= self.onset && t <= self.end() + LINE_TAIL_S
    }
}

/// The complete, immutable song.
#[derive(Clone, Debug, serde::Serialize)]
pub struct Song {
    pub notes: Vec<Note>,
    pub lyric_lines: Vec<LyricLine>,
    pub total_duration: f64,
}

impl Song {
    /// Index of the lyric line active at `t` seconds.
    ///
    /// Lines are scanned newest-first so the later line wins inside the short tail overlap at
    /// each boundary.
    pub fn active_line(&self, t: f64) -> Option<usize> {
        self.lyric_lines.iter().rposition(|line| line.contains(t))
    }

    /// Song progress at `t` seconds, clamped to `0..=1`.
    pub fn progress(&self, t: f64) -> f64 {
        if self.total_duration <= 0.0 {
            return 1.0;
        }
        (t / self.total_duration).clamp(0.0, 1.0)
    }

    /// Index of the final lyric line, which is held until the song ends.
    pub fn last_line_index(&self) -> Option<usize> {
        self.lyric_lines.len().checked_sub(1)
    }

    /// Check that the duration is positive, notes and lines are in onset order, notes have a
    /// positive length and pitch, and no line runs past the end of the song.
    pub fn validate(&self) -> PeekabooResult<()> {
        if !self.total_duration.is_finite() || self.total_duration <= 0.0 {
            return Err(PeekabooError::validation(
                "song total duration must be positive",
            ));
        }

        let mut prev = 0.0;
        for n in &self.notes {
            if n.onset < prev {
                return Err(PeekabooError::validation("notes must be ordered by onset"));
            }
            if n.onset < 0.0 || n.duration <= 0.0 || n.freq_hz <= 0.0 {
                return Err(PeekabooError::validation(format!(
                    "invalid note at {:.3}s",
                    n.onset
                )));
            }
            if !(0.0..=1.0).contains(&n.gain) {
                return Err(PeekabooError::validation("note gain must be within 0..=1"));
            }
            if n.end() > self.total_duration {
                return Err(PeekabooError::validation(
                    "note extends past the song duration",
                ));
            }
            prev = n.onset;
        }

        prev = 0.0;
        for line in &self.lyric_lines {
            if line.onset < prev || line.duration <= 0.0 {
                return Err(PeekabooError::validation(format!(
                    "lyric line '{}' is out of order",
                    line.text
                )));
            }
            if line.end() > self.total_duration {
                return Err(PeekabooError::validation(format!(
                    "lyric line '{}' extends past the song duration",
                    line.text
                )));
            }
            prev = line.onset;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
enum Pitch {
    C4,
    D4,
    E4,
    F4,
    G4,
    A4,
    C5,
}

impl Pitch {
    fn freq_hz(self) -> f64 {
        semitone_freq(match self {
            Self::C4 => -9,
            Self::D4 => -7,
            Self::E4 => -5,
            Self::F4 => -4,
            Self::G4 => -2,
            Self::A4 => 0,
            Self::C5 => 3,
        })
    }
}

struct NoteTable(Vec<Note>);

impl NoteTable {
    fn push(&mut self, pitch: Pitch, start_beats: f64, dur_beats: f64, gain: f64) {
        self.0.push(Note {
            freq_hz: pitch.freq_hz(),
            onset: start_beats * BEAT,
            duration: dur_beats * BEAT,
            gain,
        });
    }

    /// Eighth notes starting at `start_beats`, the last one held for `tail_beats`.
    fn phrase(&mut self, start_beats: f64, pitches: &[Pitch], tail_beats: f64) {
        for (i, &p) in pitches.iter().enumerate() {
            let dur = if i + 1 == pitches.len() {
                tail_beats
            } else {
                0.5
            };
            self.push(p, start_beats + 0.5 * i as f64, dur, DEFAULT_GAIN);
        }
    }
}

/// Build the fixed song: "Peekaboo!" flourish, then "Johny Johny Yes Papa" in C major.
pub fn build_song() -> Song {
    use Pitch::*;

    let line = |text, start_beats: f64, dur_beats: f64| LyricLine {
        text,
        onset: start_beats * BEAT,
        duration: dur_beats * BEAT,
    };
    let lyric_lines = vec![
        line("Peekaboo!", 0.0, 2.0),
        line("Johny Johny", 2.0, 4.0),
        line("Yes Papa", 6.0, 4.0),
        line("Eating sugar?", 10.0, 4.0),
        line("No, Papa", 14.0, 4.0),
        line("Telling lies?", 18.0, 4.0),
        line("No, Papa", 22.0, 4.0),
        line("Open your mouth", 26.0, 4.0),
        // Held through the outro so the last line stays active until the song ends.
        line("Ha ha ha!", 30.0, TOTAL_BEATS - 30.0),
    ];

    let answer = [G4, A4, G4, F4, E4, C4];
    let question = [C4, C4, D4, E4, E4, D4, C4];

    let mut t = NoteTable(Vec::with_capacity(64));
    t.phrase(0.0, &[G4, C5], 0.5);
    t.phrase(2.0, &[C4, E4, G4, E4, C4, E4, G4, E4], 0.5);
    t.phrase(6.0, &answer, 1.5);
    t.phrase(10.0, &question, 1.0);
    t.phrase(14.0, &answer, 1.5);
    t.phrase(18.0, &question, 1.0);
    t.phrase(22.0, &answer, 1.5);
    t.phrase(26.0, &[C4, D4, E4, G4, E4, D4, C4], 1.0);

    for (pitch, start, dur) in [
        (C4, 30.0, 0.4),
        (C4, 30.6, 0.4),
        (C4, 31.2, 0.8),
        (G4, 32.2, 0.4),
        (E4, 32.8, 0.4),
        (C4, 33.4, 0.8),
    ] {
        t.push(pitch, start, dur, ACCENT_GAIN);
    }

    Song {
        notes: t.0,
        lyric_lines,
        total_duration: TOTAL_BEATS * BEAT,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/song/melody.rs"]
mod tests;
