//! Playback data type definitions
//!
//! This module defines the types used for MIDI playback and visual note highlighting.
//! Times are exact fractions internally and serialize as floating point beats.

use crate::ast::SwingType;
use num_rational::Rational64;
use serde::{Serialize, Serializer};

/// Approximate a beat fraction as `f64`
pub fn beats_to_f64(beats: Rational64) -> f64 {
    *beats.numer() as f64 / *beats.denom() as f64
}

fn serialize_beats<S: Serializer>(beats: &Rational64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(beats_to_f64(*beats))
}

/// Playback data for a single note
///
/// Contains everything needed for both audio playback and visual highlighting.
///
/// # Fields
/// - `concert_pitch_midi`: Sounding MIDI note for audio playback (unaffected by clef or transposition)
/// - `display_pitch_midi`: MIDI note of the pitch as written on the staff
/// - `start_beat`: Playback start in tempo beats (true tuplet timing, repeats expanded)
/// - `duration_beat`: Playback length in tempo beats, tied continuations included
/// - `measure_number`: Which measure this note is in (1-indexed, as written)
/// - `beat_in_measure`: Offset within the measure in time-signature beats
/// - `display_time`: Quantized position in quarter notes along the written score
/// - `match_key`: `"{display_pitch_midi}_{display_time:.3}"`, for matching rendered noteheads
///
/// # Concert vs Display Pitch
/// - Treble clef C4 = 60 for both
/// - Bass clef C4 sounds 60 but displays 36 (two octaves lower on the staff)
/// - Bb transposition: concert C4 sounds 60 but displays D4 = 62
///
/// # Tuplet Timing
/// - `start_beat` and `duration_beat` use exact tuplet math (1/3 beat per triplet eighth)
/// - `display_time` uses the MusicXML divisions, so it matches the rendered
///   score inside irregular tuplets
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackNote {
    pub concert_pitch_midi: u8,
    pub display_pitch_midi: u8,
    #[serde(serialize_with = "serialize_beats")]
    pub start_beat: Rational64,
    #[serde(serialize_with = "serialize_beats")]
    pub duration_beat: Rational64,
    pub measure_number: usize,
    #[serde(serialize_with = "serialize_beats")]
    pub beat_in_measure: Rational64,
    pub display_time: f64,
    pub match_key: String,
}

/// Playback data for a chord (multiple notes played simultaneously)
///
/// Used for chord accompaniment in lead sheet style.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackChord {
    /// MIDI notes, ascending; slash bass first
    pub pitch_midi_set: Vec<u8>,
    #[serde(serialize_with = "serialize_beats")]
    pub start_beat: Rational64,
    #[serde(serialize_with = "serialize_beats")]
    pub duration_beat: Rational64,
    pub display_time: f64,
}

/// Complete playback data for a score
///
/// # Fields
/// - `tempo`: Tempo BPM as written (counts tempo-unit beats)
/// - `quarter_note_bpm`: The same tempo in quarter notes per minute
/// - `swing`: Swing feel for the scheduler; omitted when straight
/// - `notes`: Notes in performance order
/// - `chords`: Chord accompaniment in performance order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackData {
    pub tempo: u16,
    pub quarter_note_bpm: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swing: Option<SwingType>,
    pub notes: Vec<PlaybackNote>,
    pub chords: Vec<PlaybackChord>,
}
