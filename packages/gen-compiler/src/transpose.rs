//! # Transposition
//!
//! Intervals, spelled pitches and key re-derivation for transposing
//! instruments. Documents always store concert pitch; the emitter and the
//! playback engine transpose at render time.
//!
//! An [`Interval`] moves both the letter (diatonic steps) and the pitch
//! (chromatic semitones), so spelling survives transposition: concert `F#`
//! for a Bb instrument is written `G#`, never `Ab`.
//!
//! Keys move on the circle of fifths by [`Interval::fifths`]. When the
//! written key would leave the -7..7 range, the whole measure is respelled
//! enharmonically by a diminished second (see [`Transposition::written_key`]).

use crate::ast::{midi_number, KeySignature, NoteName};

/// Diatonic steps plus chromatic semitones, e.g. a major second is (1, 2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interval {
    pub diatonic: i8,
    pub chromatic: i8,
}

impl Interval {
    pub const UNISON: Interval = Interval::new(0, 0);
    pub const MAJOR_SECOND: Interval = Interval::new(1, 2);
    pub const MINOR_THIRD: Interval = Interval::new(2, 3);
    pub const PERFECT_FIFTH: Interval = Interval::new(4, 7);
    pub const MAJOR_SIXTH: Interval = Interval::new(5, 9);
    /// Same pitch, next letter up (B# -> C)
    pub const DIMINISHED_SECOND: Interval = Interval::new(1, 0);

    pub const fn new(diatonic: i8, chromatic: i8) -> Self {
        Self {
            diatonic,
            chromatic,
        }
    }

    /// Movement on the circle of fifths this interval causes
    pub fn fifths(&self) -> i8 {
        7 * self.chromatic - 12 * self.diatonic
    }

    pub fn inverse(&self) -> Self {
        Self::new(-self.diatonic, -self.chromatic)
    }

    pub fn compose(&self, other: Interval) -> Self {
        Self::new(self.diatonic + other.diatonic, self.chromatic + other.chromatic)
    }
}

/// A pitch with explicit spelling. Octave 0 is the octave of middle C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpelledPitch {
    pub name: NoteName,
    pub alter: i8,
    pub octave: i8,
}

impl SpelledPitch {
    pub fn new(name: NoteName, alter: i8, octave: i8) -> Self {
        Self {
            name,
            alter,
            octave,
        }
    }

    pub fn midi(&self) -> i32 {
        midi_number(self.name, self.alter, self.octave)
    }

    pub fn transpose(&self, interval: Interval) -> Self {
        let steps = self.octave as i32 * 7 + self.name.step_index() + interval.diatonic as i32;
        let name = NoteName::from_step_index(steps);
        let octave = steps.div_euclid(7).clamp(i8::MIN.into(), i8::MAX.into()) as i8;
        let target = self.midi() + interval.chromatic as i32;
        let alter = (target - midi_number(name, 0, octave)) as i8;
        Self {
            name,
            alter,
            octave,
        }
    }

    /// MusicXML octave number (middle C octave is 4)
    pub fn musicxml_octave(&self) -> i32 {
        self.octave as i32 + 4
    }
}

/// Written-pitch transposition for an instrument family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transposition {
    /// Interval from concert to written pitch
    pub interval: Interval,
}

impl Transposition {
    /// Transposition for the key an instrument is pitched in.
    /// Returns `None` for concert pitch (`C`) and for unknown keys.
    pub fn for_key(viewed_key: &str) -> Option<Self> {
        let interval = match viewed_key.trim() {
            "Bb" => Interval::MAJOR_SECOND,
            "Eb" => Interval::MAJOR_SIXTH,
            "F" => Interval::PERFECT_FIFTH,
            "A" => Interval::MINOR_THIRD,
            _ => return None,
        };
        Some(Self { interval })
    }

    /// Key after moving by this transposition, without range wrapping
    pub fn transpose_key(&self, key: KeySignature) -> KeySignature {
        KeySignature {
            fifths: key.fifths + self.interval.fifths(),
            mode: key.mode,
        }
    }

    /// Displayable written key for a concert key, and the interval notes in
    /// that key must be moved by so they agree with it.
    ///
    /// Keys beyond seven sharps or flats are respelled enharmonically
    /// (e.g. concert E major for an Eb instrument is C# major, not Db major
    /// with its notes spelled as C#).
    pub fn written_key(&self, key: KeySignature) -> (KeySignature, Interval) {
        let mut interval = self.interval;
        let mut written = self.transpose_key(key);
        while written.fifths > 7 {
            interval = interval.compose(Interval::DIMINISHED_SECOND);
            written.fifths -= 12;
        }
        while written.fifths < -7 {
            interval = interval.compose(Interval::DIMINISHED_SECOND.inverse());
            written.fifths += 12;
        }
        (written, interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_fifths() {
        assert_eq!(Interval::MAJOR_SECOND.fifths(), 2);
        assert_eq!(Interval::MAJOR_SIXTH.fifths(), 3);
        assert_eq!(Interval::PERFECT_FIFTH.fifths(), 1);
        assert_eq!(Interval::MINOR_THIRD.fifths(), -3);
        assert_eq!(Interval::DIMINISHED_SECOND.fifths(), -12);
    }

    #[test]
    fn test_transpose_pitch_keeps_spelling() {
        let f_sharp = SpelledPitch::new(NoteName::F, 1, 0);
        let written = f_sharp.transpose(Interval::MAJOR_SECOND);
        assert_eq!(written, SpelledPitch::new(NoteName::G, 1, 0));

        let b_flat = SpelledPitch::new(NoteName::B, -1, 0);
        let written = b_flat.transpose(Interval::MAJOR_SECOND);
        assert_eq!(written, SpelledPitch::new(NoteName::C, 0, 1));
    }

    #[test]
    fn test_transpose_eb_instrument_crosses_octave() {
        let c = SpelledPitch::new(NoteName::C, 0, 0);
        let written = c.transpose(Interval::MAJOR_SIXTH);
        assert_eq!(written, SpelledPitch::new(NoteName::A, 0, 0));
        let g = SpelledPitch::new(NoteName::G, 0, 0);
        assert_eq!(
            g.transpose(Interval::MAJOR_SIXTH),
            SpelledPitch::new(NoteName::E, 0, 1)
        );
    }

    #[test]
    fn test_round_trip_restores_pitch_and_key() {
        let t = Transposition::for_key("Eb").unwrap();
        let key = KeySignature::major(5);
        let there = t.transpose_key(key);
        let back = Transposition {
            interval: t.interval.inverse(),
        }
        .transpose_key(there);
        assert_eq!(back, key);

        let pitch = SpelledPitch::new(NoteName::E, -1, -1);
        assert_eq!(
            pitch.transpose(t.interval).transpose(t.interval.inverse()),
            pitch
        );
    }

    #[test]
    fn test_written_key_wraps_enharmonically() {
        let t = Transposition::for_key("Eb").unwrap();
        // E major (4 sharps) + 3 = 7 sharps: in range
        let (written, interval) = t.written_key(KeySignature::major(4));
        assert_eq!(written.fifths, 7);
        assert_eq!(interval, Interval::MAJOR_SIXTH);

        // B major (5 sharps) + 3 = 8 sharps: respelled as 4 flats
        let (written, interval) = t.written_key(KeySignature::major(5));
        assert_eq!(written.fifths, -4);
        let b = SpelledPitch::new(NoteName::B, 0, 0);
        assert_eq!(b.transpose(interval), SpelledPitch::new(NoteName::A, -1, 1));
    }

    #[test]
    fn test_unknown_and_concert_keys() {
        assert_eq!(Transposition::for_key("C"), None);
        assert_eq!(Transposition::for_key("X"), None);
        assert_eq!(
            Transposition::for_key("F").map(|t| t.interval),
            Some(Interval::PERFECT_FIFTH)
        );
    }
}
