use std::{fmt, str::FromStr};

/// Note names in pitch-class order.
const NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A4: MIDI 69, 440 Hz.
pub const CONCERT_A: Note = Note { midi: 69 };

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid note name {0:?}")]
pub struct NoteError(pub String);

/// A keyboard note, identified by its MIDI number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Note {
    midi: i32,
}

impl Note {
    pub fn from_midi(midi: i32) -> Self {
        Self { midi }
    }

    /// Parse a name like `"A4"` or `"C#-1"`, falling back to A4.
    pub fn parse_or_a4(name: &str) -> Self {
        match name.parse() {
            Ok(note) => note,
            Err(err) => {
                tracing::warn!(%err, "falling back to A4");
                CONCERT_A
            }
        }
    }

    pub fn midi(&self) -> i32 {
        self.midi
    }

    pub fn pitch_class(&self) -> usize {
        self.midi.rem_euclid(12) as usize
    }

    pub fn octave(&self) -> i32 {
        self.midi.div_euclid(12) - 1
    }

    /// Equal-tempered frequency; non-finite results fall back to 440 Hz.
    pub fn frequency(&self) -> f32 {
        let hz = 440.0 * 2.0_f32.powf((self.midi as f32 - 69.0) / 12.0);
        if hz.is_finite() && hz > 0.0 {
            hz
        } else {
            440.0
        }
    }
}

impl FromStr for Note {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || NoteError(s.to_owned());

        let letter_len = if s.get(1..2) == Some("#") { 2 } else { 1 };
        let (name, octave) = (s.get(..letter_len).ok_or_else(err)?, s.get(letter_len..).ok_or_else(err)?);

        let class = NAMES.iter().position(|n| *n == name).ok_or_else(err)?;
        let digits = octave.strip_prefix('-').unwrap_or(octave);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let octave: i32 = octave.parse().map_err(|_| err())?;

        Ok(Self {
            midi: 12 * (octave + 1) + class as i32,
        })
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", NAMES[self.pitch_class()], self.octave())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_sharps() {
        assert_eq!("A4".parse::<Note>().map(|n| n.midi()), Ok(69));
        assert_eq!("C4".parse::<Note>().map(|n| n.midi()), Ok(60));
        assert_eq!("C#3".parse::<Note>().map(|n| n.midi()), Ok(49));
        assert_eq!("C-1".parse::<Note>().map(|n| n.midi()), Ok(0));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "H4", "A", "Db4", "A4x", "#4", "a4", "A+4"] {
            assert!(bad.parse::<Note>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn invalid_names_sound_as_concert_a() {
        let note = Note::parse_or_a4("not a note");
        assert_eq!(note, CONCERT_A);
        assert!((note.frequency() - 440.0).abs() < 1e-3);
    }

    #[test]
    fn frequencies_follow_equal_temperament() {
        let c4 = Note::parse_or_a4("C4");
        assert!((c4.frequency() - 261.626).abs() < 0.01);
        let a5 = Note::parse_or_a4("A5");
        assert!((a5.frequency() - 880.0).abs() < 0.01);
    }

    #[test]
    fn display_round_trips() {
        for name in ["C4", "F#2", "B-1", "G#7"] {
            assert_eq!(Note::parse_or_a4(name).to_string(), name);
        }
    }
}
