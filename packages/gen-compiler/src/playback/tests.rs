use super::*;
use crate::api::RenderOptions;
use crate::ast::SwingType;
use num_rational::Rational64;

fn beats(numer: i64, denom: i64) -> Rational64 {
    Rational64::new(numer, denom)
}

fn play(source: &str) -> PlaybackData {
    generate_playback_data(source, &RenderOptions::default()).unwrap()
}

fn play_with(source: &str, options: RenderOptions) -> PlaybackData {
    generate_playback_data(source, &options).unwrap()
}

fn concert(data: &PlaybackData) -> Vec<u8> {
    data.notes.iter().map(|n| n.concert_pitch_midi).collect()
}

#[test]
fn test_playback_basic_timing() {
    let source = r#"---
tempo: 120
---
C C G G
"#;
    let data = play(source);

    assert_eq!(data.tempo, 120);
    assert_eq!(concert(&data), vec![60, 60, 67, 67]);
    for (i, note) in data.notes.iter().enumerate() {
        assert_eq!(note.start_beat, beats(i as i64, 1));
        assert_eq!(note.duration_beat, beats(1, 1));
    }
}

#[test]
fn test_playback_midi_notes() {
    let data = play("C D E F\nG A B C^");
    // C4=60 through C5=72
    assert_eq!(concert(&data), vec![60, 62, 64, 65, 67, 69, 71, 72]);
}

#[test]
fn test_playback_with_ties() {
    let data = play("C-C $p");

    // One event for the tied pair, none for the rest
    assert_eq!(data.notes.len(), 1);
    assert_eq!(data.notes[0].start_beat, beats(0, 1));
    assert_eq!(data.notes[0].duration_beat, beats(2, 1));
}

#[test]
fn test_tie_across_barline() {
    let data = play("C D E F-\nF G A B");
    assert_eq!(data.notes.len(), 7);
    assert_eq!(data.notes[3].concert_pitch_midi, 65);
    assert_eq!(data.notes[3].duration_beat, beats(2, 1));
    assert_eq!(data.notes[3].measure_number, 1);
    assert_eq!(data.notes[4].start_beat, beats(5, 1));
}

#[test]
fn test_tie_chain_merges_whole_run() {
    let data = play("C-C-C-C");
    assert_eq!(data.notes.len(), 1);
    assert_eq!(data.notes[0].duration_beat, beats(4, 1));
}

#[test]
fn test_tie_between_pitches_is_not_merged() {
    // A tie between different pitches is a slur, so both notes sound
    let data = play("C-D E F");
    assert_eq!(concert(&data), vec![60, 62, 64, 65]);
}

#[test]
fn test_playback_different_rhythms() {
    let data = play("Co\nCp C/ C/ C");
    assert_eq!(data.notes[0].duration_beat, beats(4, 1));
    assert_eq!(data.notes[1].start_beat, beats(4, 1));
    assert_eq!(data.notes[1].duration_beat, beats(2, 1));
    assert_eq!(data.notes[2].duration_beat, beats(1, 2));
    assert_eq!(data.notes[3].start_beat, beats(13, 2));
    assert_eq!(data.notes[4].start_beat, beats(7, 1));
}

#[test]
fn test_playback_with_rests() {
    let data = play("C $ D $");
    assert_eq!(data.notes.len(), 2);
    assert_eq!(data.notes[1].start_beat, beats(2, 1));
}

#[test]
fn test_playback_default_tempo() {
    let data = play("C D E F");
    assert_eq!(data.tempo, 120);
    assert_eq!(data.quarter_note_bpm, 120.0);
}

#[test]
fn test_tempo_half_note() {
    let data = play("---\ntempo: 60p\n---\nC D E F");
    assert_eq!(data.tempo, 60);
    assert_eq!(data.quarter_note_bpm, 120.0);
    // Beats are half notes
    assert_eq!(data.notes[1].start_beat, beats(1, 2));
    assert_eq!(data.notes[0].duration_beat, beats(1, 2));
}

#[test]
fn test_tempo_eighth_note() {
    let data = play("---\ntempo: 240/\n---\nC D E F");
    assert_eq!(data.quarter_note_bpm, 120.0);
    assert_eq!(data.notes[1].start_beat, beats(2, 1));
}

#[test]
fn test_tempo_dotted_quarter() {
    let data = play("---\ntempo: 80*\ntime-signature: 6/8\n---\nC/ D/ E/ F/ G/ A/");
    assert_eq!(data.quarter_note_bpm, 120.0);
    assert_eq!(data.notes[3].start_beat, beats(1, 1));
    assert_eq!(data.notes[0].duration_beat, beats(1, 3));
}

#[test]
fn test_playback_bass_clef() {
    let options = RenderOptions::from_tokens("bass", 0, None, None);
    let data = play_with("C D E F", options);

    // Sounding pitch is unaffected by the clef
    assert_eq!(data.notes[0].concert_pitch_midi, 60);
    // Displayed two octaves lower
    assert_eq!(data.notes[0].display_pitch_midi, 36);
    assert_eq!(data.notes[0].match_key, "36_0.000");
}

#[test]
fn test_playback_octave_shift() {
    let options = RenderOptions::from_tokens("treble", 1, None, None);
    let data = play_with("C D E", options);

    assert_eq!(data.notes[0].concert_pitch_midi, 72);
    assert_eq!(data.notes[0].display_pitch_midi, 72);
    assert_eq!(data.notes[0].match_key, "72_0.000");
    assert_eq!(data.notes[1].match_key, "74_1.000");
}

#[test]
fn test_playback_transposition_display() {
    let options = RenderOptions::from_tokens("treble", 0, None, Some("Bb"));
    let data = play_with("C D E F", options);
    assert_eq!(concert(&data), vec![60, 62, 64, 65]);
    assert_eq!(data.notes[0].display_pitch_midi, 62);
    assert_eq!(data.notes[3].display_pitch_midi, 67);
}

#[test]
fn test_playback_mod_point_for_group() {
    let source = "C D E F\n@Bb:^\nC D E F";
    let plain = play(source);
    assert_eq!(plain.notes[4].concert_pitch_midi, 60);

    let options = RenderOptions::from_tokens("treble", 0, Some("bb"), None);
    let shifted = play_with(source, options);
    assert_eq!(shifted.notes[0].concert_pitch_midi, 60);
    assert_eq!(shifted.notes[4].concert_pitch_midi, 72);
}

#[test]
fn test_playback_key_signature() {
    let data = play("---\nkey-signature: G\n---\nF G A B");
    // F is sharp in G major
    assert_eq!(data.notes[0].concert_pitch_midi, 66);
}

#[test]
fn test_playback_key_change() {
    let data = play("B F B F\n@key:G\nB F B F%");
    assert_eq!(data.notes[4].concert_pitch_midi, 71);
    assert_eq!(data.notes[5].concert_pitch_midi, 66);
    assert_eq!(data.notes[7].concert_pitch_midi, 65);
}

#[test]
fn test_playback_with_chords() {
    let data = play("@ch:C C D E F\n@ch:G7 G A B C^");
    assert_eq!(data.chords.len(), 2);
    assert_eq!(data.chords[0].pitch_midi_set, vec![48, 52, 55]);
    assert_eq!(data.chords[0].start_beat, beats(0, 1));
    // Standalone chords default to a whole note
    assert_eq!(data.chords[0].duration_beat, beats(4, 1));
    assert_eq!(data.chords[1].pitch_midi_set, vec![55, 59, 62, 65]);
    assert_eq!(data.chords[1].start_beat, beats(4, 1));
}

#[test]
fn test_chord_quality_spellings_agree() {
    for symbol in ["Dm7", "Dmin7", "D-7"] {
        let data = play(&format!("@ch:{} D D D D", symbol));
        assert_eq!(data.chords.len(), 1);
        assert_eq!(data.chords[0].pitch_midi_set, vec![50, 53, 57, 60], "{}", symbol);
    }
}

#[test]
fn test_playback_chord_with_duration() {
    let data = play("@ch:F:p C D @ch:G:p E F");
    assert_eq!(data.chords[0].duration_beat, beats(2, 1));
    assert_eq!(data.chords[1].start_beat, beats(2, 1));
}

#[test]
fn test_attached_chord_follows_element() {
    let data = play("@ch:C:Cp D/ D/ D");
    assert_eq!(data.chords[0].duration_beat, beats(2, 1));
}

#[test]
fn test_playback_chord_on_rest() {
    let data = play("@ch:Am $p C C");
    assert_eq!(data.chords.len(), 1);
    assert_eq!(data.chords[0].pitch_midi_set, vec![57, 60, 64]);
    assert_eq!(data.notes.len(), 2);
}

#[test]
fn test_slash_chord_bass() {
    let data = play("@ch:C/G C D E F");
    assert_eq!(data.chords[0].pitch_midi_set, vec![43, 48, 52, 55]);
}

#[test]
fn test_playback_triplets() {
    let data = play("C [D E F]3 G Ep");
    assert_eq!(concert(&data), vec![60, 62, 64, 65, 67, 64]);

    // Three triplet eighths fill one beat
    assert_eq!(data.notes[1].start_beat, beats(1, 1));
    assert_eq!(data.notes[1].duration_beat, beats(1, 3));
    assert_eq!(data.notes[2].start_beat, beats(4, 3));
    assert_eq!(data.notes[3].start_beat, beats(5, 3));
    assert_eq!(data.notes[4].start_beat, beats(2, 1));
}

#[test]
fn test_quarter_triplets() {
    let data = play("[C D E]3p F G");
    assert_eq!(data.notes[0].duration_beat, beats(2, 3));
    assert_eq!(data.notes[3].start_beat, beats(2, 1));
}

#[test]
fn test_match_keys() {
    let data = play("C D E");
    assert_eq!(data.notes[0].match_key, "60_0.000");
    assert_eq!(data.notes[1].match_key, "62_1.000");
    assert_eq!(data.notes[2].match_key, "64_2.000");
}

#[test]
fn test_match_keys_triplets() {
    let data = play("C [D E F]3 G Ep");
    assert_eq!(data.notes[1].display_time, 1.0);
    assert_eq!(data.notes[2].match_key, "64_1.333");
    assert_eq!(data.notes[3].match_key, "65_1.667");
    assert_eq!(data.notes[4].match_key, "67_2.000");
}

#[test]
fn test_display_time_follows_written_divisions() {
    // Quintuplet sixteenths are 9.6 divisions, written as 9, 10, 9, 10, 10
    let data = play("[C D E F G]5 D D D");
    assert_eq!(data.notes[1].display_time, 9.0 / 48.0);
    assert_eq!(data.notes[2].display_time, 19.0 / 48.0);
    assert_eq!(data.notes[5].start_beat, beats(1, 1));
    assert_eq!(data.notes[5].display_time, 1.0);
    assert_eq!(data.notes[5].match_key, "62_1.000");
}

#[test]
fn test_measure_number_and_beat_in_measure() {
    let data = play("C D E F\nG/ A/ B Cp");
    assert_eq!(data.notes[4].measure_number, 2);
    assert_eq!(data.notes[5].beat_in_measure, beats(1, 2));
    assert_eq!(data.notes[6].beat_in_measure, beats(1, 1));
}

#[test]
fn test_beat_in_measure_compound_time() {
    let data = play("---\ntime-signature: 6/8\n---\nC/ D/ E/ F*");
    assert_eq!(data.notes[3].beat_in_measure, beats(3, 1));
}

#[test]
fn test_swing_eighth_notes() {
    let data = play("---\nswing: /\n---\n[C D E F]/ G A");
    assert_eq!(data.swing, Some(SwingType::Eighth));

    // Timing stays straight; the scheduler applies swing
    assert_eq!(data.notes[1].start_beat, beats(1, 2));
    assert_eq!(data.notes[3].start_beat, beats(3, 2));
}

#[test]
fn test_swing_sixteenth_notes() {
    let data = play("---\nswing: //\n---\n[C D E F]// G A B");
    assert_eq!(data.swing, Some(SwingType::Sixteenth));
    assert_eq!(data.notes[1].start_beat, beats(1, 4));
}

#[test]
fn test_no_swing_by_default() {
    let data = play("C D E F");
    assert_eq!(data.swing, None);
    let json = serde_json::to_value(&data).unwrap();
    assert!(json.get("swing").is_none());
}

#[test]
fn test_serialized_shape() {
    let data = play("@ch:C [C D E]3 F G A");
    let json = serde_json::to_value(&data).unwrap();
    assert_eq!(json["tempo"], 120);
    assert_eq!(json["quarterNoteBpm"], 120.0);
    let note = &json["notes"][1];
    assert_eq!(note["concertPitchMidi"], 62);
    assert_eq!(note["displayPitchMidi"], 62);
    assert_eq!(note["measureNumber"], 1);
    assert_eq!(note["matchKey"], "62_0.333");
    assert!((note["startBeat"].as_f64().unwrap() - 1.0 / 3.0).abs() < 1e-9);
    assert!((note["durationBeat"].as_f64().unwrap() - 1.0 / 3.0).abs() < 1e-9);
    let chord = &json["chords"][0];
    assert_eq!(chord["pitchMidiSet"], serde_json::json!([48, 52, 55]));
    assert_eq!(chord["displayTime"], 0.0);
}

// ==================== REPEAT TESTS ====================

#[test]
fn test_playback_simple_repeat() {
    let data = play("||: C D E F :||");
    assert_eq!(concert(&data), vec![60, 62, 64, 65, 60, 62, 64, 65]);
    assert_eq!(data.notes[4].start_beat, beats(4, 1));
    // The repeat keeps its written position for highlighting
    assert_eq!(data.notes[4].match_key, data.notes[0].match_key);
    assert_eq!(data.notes[4].measure_number, 1);
}

#[test]
fn test_playback_repeat_multiple_measures() {
    let data = play("||: C C C C\nD D D D :||");
    assert_eq!(data.notes.len(), 16);
    assert_eq!(data.notes[8].concert_pitch_midi, 60);
    assert_eq!(data.notes[8].start_beat, beats(8, 1));
}

#[test]
fn test_playback_with_intro_and_repeat() {
    let data = play("E E E E\n||: C C C C :||\nG G G G");
    let firsts: Vec<u8> = data.notes.chunks(4).map(|m| m[0].concert_pitch_midi).collect();
    assert_eq!(firsts, vec![64, 60, 60, 67]);
}

#[test]
fn test_repeat_end_without_start_replays_from_beginning() {
    let data = play("C C C C\nD D D D :||");
    let firsts: Vec<u8> = data.notes.chunks(4).map(|m| m[0].concert_pitch_midi).collect();
    assert_eq!(firsts, vec![60, 62, 60, 62]);
}

#[test]
fn test_playback_volta_endings() {
    let data = play("||: C C C C\n1. D D D D :||\n2. E E E E\nF F F F");
    let firsts: Vec<u8> = data.notes.chunks(4).map(|m| m[0].concert_pitch_midi).collect();
    // Main, first ending, main, second ending, coda
    assert_eq!(firsts, vec![60, 62, 60, 64, 65]);
    assert_eq!(data.notes[12].measure_number, 3);
    assert_eq!(data.notes[12].start_beat, beats(12, 1));
}

#[test]
fn test_playback_no_repeat() {
    let data = play("C C C C\nD D D D");
    assert_eq!(data.notes.len(), 8);
}

#[test]
fn test_best_effort_short_measure() {
    let data = play("C C C\nD D D D");
    assert_eq!(data.notes[3].start_beat, beats(3, 1));
}
