//! Playback data generation engine
//!
//! Converts a Gen document into MIDI playback data with exact timing for
//! audio playback and quantized positions for visual note highlighting.

use super::chord_parser::voice_chord;
use super::types::{PlaybackChord, PlaybackData, PlaybackNote};
use crate::api::RenderOptions;
use crate::ast::{ChordAttachment, Document, ElementKind, Ending, Measure};
use crate::musicxml::{measure_divisions, DIVISIONS};
use num_rational::Rational64;

/// Expand repeats and volta endings into the order measures are performed in.
///
/// - `||: A B :||` plays A B A B
/// - `||: A 1. B :|| 2. C` plays A B A C
/// - `:||` without a start repeats from the beginning of the score, or from
///   the measure after the previous repeat
fn performance_order(measures: &[Measure]) -> Vec<usize> {
    let mut order = Vec::with_capacity(measures.len());
    let mut section_start = 0;
    let mut i = 0;

    while i < measures.len() {
        let measure = &measures[i];
        if measure.repeat_start {
            section_start = i;
        }
        order.push(i);
        i += 1;
        if !measure.repeat_end {
            continue;
        }

        if measure.ending() == Some(Ending::First) {
            // Second time through: the main section, then the second ending
            let first_ending = (section_start..i)
                .find(|&j| measures[j].ending() == Some(Ending::First))
                .unwrap_or(i - 1);
            order.extend(section_start..first_ending);
            while i < measures.len() && measures[i].ending() == Some(Ending::Second) {
                order.push(i);
                i += 1;
            }
        } else {
            order.extend(section_start..i);
        }
        section_start = i;
    }

    order
}

/// Quantized start of every measure along the written score, in divisions
fn measure_display_offsets(measures: &[Measure]) -> Vec<i64> {
    let mut offset = 0;
    measures
        .iter()
        .map(|measure| {
            let start = offset;
            offset += measure_divisions(&measure.elements).iter().sum::<i64>();
            start
        })
        .collect()
}

fn divisions_to_quarters(divisions: i64) -> f64 {
    divisions as f64 / DIVISIONS as f64
}

/// Generate playback data for a parsed document
///
/// # Timing System
/// Two separate timing tracks are kept:
///
/// ## 1. Playback time (`start_beat`, `duration_beat`)
/// - Exact fractions in tempo beats, repeats expanded
/// - True tuplet durations: a triplet eighth under a quarter tempo is 1/3 beat
///
/// ## 2. Display time (`display_time`)
/// - Quarter notes along the written score, repeats not expanded
/// - Uses the MusicXML divisions of each element, so it agrees with the
///   rendered notation inside irregular tuplets
///
/// # Tie Handling
/// - A tied run produces one event at the first note's start
/// - Its duration is the sum of the whole run
/// - Continuation notes produce no event of their own
/// - A tie only merges notes whose concert pitch is equal
pub fn playback_data(document: &Document, options: &RenderOptions) -> PlaybackData {
    let measures = &document.measures;
    let time_signature = document.metadata.time_signature;
    let tempo = document.tempo();
    let beat = tempo.beat_length();
    let ts_beat = Rational64::new(1, time_signature.beat_type as i64);
    let keys = document.active_keys();
    let display_offsets = measure_display_offsets(measures);

    let mut notes: Vec<PlaybackNote> = Vec::new();
    let mut chords = Vec::new();
    let mut cursor = Rational64::from_integer(0);
    // (index into notes, concert MIDI) of a run still waiting for its continuation
    let mut pending_tie: Option<(usize, u8)> = None;

    let order = performance_order(measures);
    for &index in &order {
        let measure = &measures[index];
        let key = keys[index];
        let (_, interval) = options.written_key(key);
        let mut position = Rational64::from_integer(0);
        let mut display_position = display_offsets[index];
        let display_lengths = measure_divisions(&measure.elements);

        for (element, display_length) in measure.elements.iter().zip(display_lengths) {
            let length = element.rhythm.real();
            let start_beat = cursor / beat;
            let display_time = divisions_to_quarters(display_position);

            if let Some(chord) = &element.chord {
                let chord_length = match chord.attachment {
                    ChordAttachment::Attached => length,
                    ChordAttachment::Standalone(rhythm) => rhythm.real(),
                };
                chords.push(PlaybackChord {
                    pitch_midi_set: voice_chord(chord),
                    start_beat,
                    duration_beat: chord_length / beat,
                    display_time,
                });
            }

            match &element.kind {
                ElementKind::Note(note) => {
                    let concert = options.concert_pitch(document, index, note, &key);
                    let concert_midi = concert.midi().clamp(0, 127) as u8;

                    let continues_run = match pending_tie {
                        Some((idx, midi)) if note.tie_stop && midi == concert_midi => Some(idx),
                        _ => None,
                    };
                    let event = match continues_run {
                        Some(idx) => {
                            notes[idx].duration_beat += length / beat;
                            idx
                        }
                        None => {
                            let display = options.display_pitch(concert, interval);
                            let display_midi = display.midi().clamp(0, 127) as u8;
                            notes.push(PlaybackNote {
                                concert_pitch_midi: concert_midi,
                                display_pitch_midi: display_midi,
                                start_beat,
                                duration_beat: length / beat,
                                measure_number: index + 1,
                                beat_in_measure: position / ts_beat,
                                display_time,
                                match_key: format!("{}_{:.3}", display_midi, display_time),
                            });
                            notes.len() - 1
                        }
                    };
                    pending_tie = note.tie_start.then_some((event, concert_midi));
                }
                ElementKind::Rest => pending_tie = None,
            }

            cursor += length;
            position += length;
            display_position += display_length;
        }
    }

    log::debug!(
        "playback: {} measures performed, {} notes, {} chords",
        order.len(),
        notes.len(),
        chords.len()
    );

    PlaybackData {
        tempo: tempo.bpm,
        quarter_note_bpm: tempo.to_quarter_note_bpm(),
        swing: document.metadata.swing,
        notes,
        chords,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn order(source: &str) -> Vec<usize> {
        performance_order(&parse(source).unwrap().measures)
    }

    #[test]
    fn test_order_without_repeats() {
        assert_eq!(order("C C C C\nD D D D"), vec![0, 1]);
    }

    #[test]
    fn test_order_simple_repeat() {
        assert_eq!(order("A A A A\n||: C C C C\nD D D D :||\nE E E E"), vec![0, 1, 2, 1, 2, 3]);
    }

    #[test]
    fn test_order_repeat_end_without_start() {
        assert_eq!(order("C C C C\nD D D D :||\nE E E E"), vec![0, 1, 0, 1, 2]);
    }

    #[test]
    fn test_order_volta() {
        assert_eq!(
            order("||: C C C C\n1. D D D D :||\n2. E E E E\nF F F F"),
            vec![0, 1, 0, 2, 3]
        );
    }

    #[test]
    fn test_order_multi_measure_endings() {
        let source = "||: C C C C\n1. D D D D\nD D D D :||\n2. E E E E\n2. E E E E\nF F F F";
        assert_eq!(order(source), vec![0, 1, 2, 0, 3, 4, 5]);
    }

    #[test]
    fn test_order_consecutive_repeats() {
        assert_eq!(
            order("||: C C C C :||\n||: D D D D :||"),
            vec![0, 0, 1, 1]
        );
    }
}
