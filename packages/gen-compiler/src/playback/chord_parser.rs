//! Chord symbol voicing for MIDI playback
//!
//! Turns chord annotations (C, Am, G7, Dm7/F, etc.) into MIDI note sets for accompaniment.

use crate::ast::{Accidental, ChordAnnotation, ChordAttachment, NoteName};
use crate::chord::ChordQuality;
use crate::parser::parse_chord_symbol as split_symbol;

/// MIDI number of C3, the octave chord roots are voiced in
const CHORD_ROOT_C: i32 = 48;

fn pitch_class(name: NoteName, accidental: Option<Accidental>) -> i32 {
    name.semitone() + accidental.map_or(0, |a| a.alter() as i32)
}

/// Voice a chord annotation as ascending MIDI notes.
///
/// The root sits in the C3 octave (MIDI 48-59) with the quality's intervals
/// stacked above it. A slash bass is placed an octave below the root's octave.
pub fn voice_chord(chord: &ChordAnnotation) -> Vec<u8> {
    let root = CHORD_ROOT_C + pitch_class(chord.root, chord.root_accidental);
    let quality = ChordQuality::parse(&chord.quality);

    let bass = chord
        .bass
        .map(|(name, accidental)| CHORD_ROOT_C - 12 + pitch_class(name, accidental));
    bass.into_iter()
        .chain(quality.intervals.iter().map(|interval| root + interval))
        .map(|midi| midi.clamp(0, 127) as u8)
        .collect()
}

/// Parse a chord symbol into MIDI notes
///
/// Returns an empty Vec when the symbol has no valid root. Unknown quality
/// text falls back to a major triad.
///
/// # Examples
/// ```
/// use gen_core::playback::parse_chord_symbol;
///
/// // C major: C3, E3, G3
/// assert_eq!(parse_chord_symbol("C"), vec![48, 52, 55]);
///
/// // G7: G3, B3, D4, F4
/// assert_eq!(parse_chord_symbol("G7"), vec![55, 59, 62, 65]);
///
/// // F# major: F#3, A#3, C#4
/// assert_eq!(parse_chord_symbol("F#"), vec![54, 58, 61]);
///
/// // C/E: E2 under a C3 triad
/// assert_eq!(parse_chord_symbol("C/E"), vec![40, 48, 52, 55]);
/// ```
pub fn parse_chord_symbol(chord_symbol: &str) -> Vec<u8> {
    split_symbol(chord_symbol, ChordAttachment::Attached)
        .map(|chord| voice_chord(&chord))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triads() {
        assert_eq!(parse_chord_symbol("C"), vec![48, 52, 55]);
        assert_eq!(parse_chord_symbol("Dm"), vec![50, 53, 57]);
        assert_eq!(parse_chord_symbol("Bdim"), vec![59, 62, 65]);
        assert_eq!(parse_chord_symbol("Eaug"), vec![52, 56, 60]);
    }

    #[test]
    fn test_sevenths() {
        assert_eq!(parse_chord_symbol("Cmaj7"), vec![48, 52, 55, 59]);
        assert_eq!(parse_chord_symbol("Am7"), vec![57, 60, 64, 67]);
    }

    #[test]
    fn test_flat_root_stays_in_octave() {
        assert_eq!(parse_chord_symbol("Bb"), vec![58, 62, 65]);
        // Cb is B below C3
        assert_eq!(parse_chord_symbol("Cb")[0], 47);
    }

    #[test]
    fn test_unknown_quality_is_major() {
        assert_eq!(parse_chord_symbol("Cxyz"), vec![48, 52, 55]);
    }

    #[test]
    fn test_invalid_root() {
        assert!(parse_chord_symbol("").is_empty());
        assert!(parse_chord_symbol("H7").is_empty());
    }

    #[test]
    fn test_slash_bass_below() {
        assert_eq!(parse_chord_symbol("Dm7/G"), vec![43, 50, 53, 57, 60]);
    }
}
