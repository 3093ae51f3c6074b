//! # MusicXML Generator
//!
//! Converts a validated [`Document`] into MusicXML 4.0 partwise format.
//!
//! ## Output Structure
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" ...>
//! <score-partwise version="4.0">
//!   <work><work-title>Title</work-title></work>
//!   <identification><creator type="composer">Composer</creator></identification>
//!   <part-list>...</part-list>
//!   <part id="P1">
//!     <measure number="1">
//!       <attributes>...</attributes>  <!-- first measure only -->
//!       <note>...</note>
//!     </measure>
//!   </part>
//! </score-partwise>
//! ```
//!
//! ## Key Concepts
//!
//! ### Divisions
//! Durations are expressed in divisions per quarter note. [`DIVISIONS`] is 48,
//! so a quarter is 48, an eighth 24, a triplet eighth 16 and a 32nd 6.
//! Other tuplet members fall between divisions; see [`measure_divisions`].
//!
//! ### Pitch
//! Notes are stored at concert pitch. Each note's displayed pitch is derived
//! by [`RenderOptions`]: clef offset first, then transposition into the
//! written key.
//!
//! ### Accidentals
//! An `<accidental>` is printed when a note's alteration differs from what the
//! written key signature, or an earlier note of the same letter and octave in
//! the measure, implies. Tie continuations never print one.
//!
//! ### Beaming
//! See [`beaming`] for how groups are formed.

pub mod beaming;

use crate::api::RenderOptions;
use crate::ast::{
    ChordAnnotation, Document, Element, ElementKind, Ending, KeySignature, NoteName, Tempo,
};
use crate::chord::ChordQuality;
use crate::transpose::{Interval, SpelledPitch};
use beaming::{calculate_beams, Beams};
use num_rational::Rational64;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::collections::HashMap;
use std::io::{Cursor, Write};

/// Divisions per quarter note
pub const DIVISIONS: i64 = 48;

const DOCTYPE: &str = r#"score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd""#;

/// Length of each element in divisions.
///
/// Each element spans from its floored start position to its floored end
/// position in the measure, so the lengths always add up to the measure's
/// exact length. A quintuplet of 16ths is written 9, 10, 9, 10, 10.
pub fn measure_divisions(elements: &[Element]) -> Vec<i64> {
    let scale = Rational64::from_integer(4 * DIVISIONS);
    let mut position = Rational64::from_integer(0);
    let mut start = 0;
    elements
        .iter()
        .map(|element| {
            position += element.rhythm.real();
            let end = (position * scale).floor().to_integer();
            let length = end - start;
            start = end;
            length
        })
        .collect()
}

/// Render a document as a MusicXML 4.0 partwise score.
pub fn to_musicxml(document: &Document, options: &RenderOptions) -> String {
    let mut emitter = Emitter {
        writer: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        document,
        options,
    };
    if let Err(e) = emitter.score() {
        log::error!("failed to write MusicXML: {}", e);
    }
    let bytes = emitter.writer.into_inner().into_inner();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Alteration a note name maps to on the staff
fn accidental_name(alter: i8) -> Option<&'static str> {
    match alter {
        -2 => Some("flat-flat"),
        -1 => Some("flat"),
        0 => Some("natural"),
        1 => Some("sharp"),
        2 => Some("double-sharp"),
        _ => None,
    }
}

/// Where a note sits: its measure's key, the written interval, its beams and
/// its length in divisions
struct Placement<'b> {
    key: KeySignature,
    interval: Interval,
    beams: &'b Beams,
    duration: i64,
}

/// Per-measure accidental memory against the written key
struct AccidentalState {
    key: KeySignature,
    seen: HashMap<(NoteName, i8), i8>,
}

impl AccidentalState {
    fn new(key: KeySignature) -> Self {
        Self {
            key,
            seen: HashMap::new(),
        }
    }

    /// Accidental to print for a written pitch, if any
    fn accidental_for(&mut self, pitch: SpelledPitch, tie_continuation: bool) -> Option<&'static str> {
        let slot = (pitch.name, pitch.octave);
        let expected = self
            .seen
            .get(&slot)
            .copied()
            .unwrap_or_else(|| self.key.alter_for(pitch.name));
        self.seen.insert(slot, pitch.alter);
        if tie_continuation || pitch.alter == expected {
            None
        } else {
            accidental_name(pitch.alter)
        }
    }
}

/// Where a volta bracket opens or closes at a measure
struct EndingBounds {
    start: Option<Ending>,
    stop: Option<(Ending, &'static str)>,
}

struct Emitter<'a, W: Write> {
    writer: Writer<W>,
    document: &'a Document,
    options: &'a RenderOptions,
}

impl<W: Write> Emitter<'_, W> {
    fn start(&mut self, element: BytesStart<'_>) -> quick_xml::Result<()> {
        self.writer.write_event(Event::Start(element))
    }

    fn open(&mut self, name: &str) -> quick_xml::Result<()> {
        self.start(BytesStart::new(name))
    }

    fn close(&mut self, name: &str) -> quick_xml::Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, element: BytesStart<'_>) -> quick_xml::Result<()> {
        self.writer.write_event(Event::Empty(element))
    }

    fn text_element(&mut self, name: &str, text: &str) -> quick_xml::Result<()> {
        self.open(name)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn typed(&mut self, name: &str, kind: &str) -> quick_xml::Result<()> {
        let mut element = BytesStart::new(name);
        element.push_attribute(("type", kind));
        self.empty(element)
    }

    fn score(&mut self) -> quick_xml::Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.writer
            .write_event(Event::DocType(BytesText::from_escaped(DOCTYPE)))?;

        let mut root = BytesStart::new("score-partwise");
        root.push_attribute(("version", "4.0"));
        self.start(root)?;

        let document = self.document;
        let metadata = &document.metadata;
        if let Some(title) = &metadata.title {
            self.open("work")?;
            self.text_element("work-title", title)?;
            self.close("work")?;
        }
        if let Some(composer) = &metadata.composer {
            self.open("identification")?;
            let mut creator = BytesStart::new("creator");
            creator.push_attribute(("type", "composer"));
            self.start(creator)?;
            self.writer
                .write_event(Event::Text(BytesText::new(composer)))?;
            self.close("creator")?;
            self.close("identification")?;
        }

        self.open("part-list")?;
        let mut score_part = BytesStart::new("score-part");
        score_part.push_attribute(("id", "P1"));
        self.start(score_part)?;
        let mut part_name = BytesStart::new("part-name");
        part_name.push_attribute(("print-object", "no"));
        self.empty(part_name)?;
        self.close("score-part")?;
        self.close("part-list")?;

        let mut part = BytesStart::new("part");
        part.push_attribute(("id", "P1"));
        self.start(part)?;
        let keys = document.active_keys();
        for (index, key) in keys.into_iter().enumerate() {
            self.measure(index, key)?;
        }
        self.close("part")?;
        self.close("score-partwise")
    }

    fn ending_bounds(&self, index: usize) -> EndingBounds {
        let measures = &self.document.measures;
        let Some(marker) = measures[index].ending else {
            return EndingBounds {
                start: None,
                stop: None,
            };
        };
        let continued = index > 0
            && measures[index - 1]
                .ending
                .is_some_and(|prev| prev.continues && prev.ending == marker.ending);
        let stop_kind = match marker.ending {
            Ending::First => "stop",
            Ending::Second => "discontinue",
        };
        EndingBounds {
            start: (!continued).then_some(marker.ending),
            stop: (!marker.continues).then_some((marker.ending, stop_kind)),
        }
    }

    fn measure(&mut self, index: usize, key: KeySignature) -> quick_xml::Result<()> {
        let document = self.document;
        let measure = &document.measures[index];
        let number = (index + 1).to_string();
        let mut element = BytesStart::new("measure");
        element.push_attribute(("number", number.as_str()));
        if measure.pickup {
            element.push_attribute(("implicit", "yes"));
        }
        self.start(element)?;

        let bounds = self.ending_bounds(index);
        if measure.repeat_start || bounds.start.is_some() {
            self.left_barline(measure.repeat_start, bounds.start)?;
        }

        let (written_key, interval) = self.options.written_key(key);
        if index == 0 {
            self.attributes(written_key)?;
            if let Some(tempo) = document.metadata.tempo {
                self.tempo_direction(&tempo)?;
            }
        } else if measure.key_change.is_some() {
            self.open("attributes")?;
            self.key(written_key)?;
            self.close("attributes")?;
        }

        let beams = calculate_beams(&measure.elements, &document.metadata.time_signature);
        let durations = measure_divisions(&measure.elements);
        let mut accidentals = AccidentalState::new(written_key);
        for ((element, beams), duration) in measure.elements.iter().zip(&beams).zip(durations) {
            if let Some(chord) = &element.chord {
                self.harmony(chord, interval)?;
            }
            let placement = Placement {
                key,
                interval,
                beams,
                duration,
            };
            self.note(index, element, placement, &mut accidentals)?;
        }

        if measure.repeat_end || bounds.stop.is_some() {
            self.right_barline(measure.repeat_end, bounds.stop)?;
        }
        self.close("measure")
    }

    fn left_barline(&mut self, repeat: bool, ending: Option<Ending>) -> quick_xml::Result<()> {
        let mut barline = BytesStart::new("barline");
        barline.push_attribute(("location", "left"));
        self.start(barline)?;
        if repeat {
            self.text_element("bar-style", "heavy-light")?;
        }
        if let Some(ending) = ending {
            let mut element = BytesStart::new("ending");
            element.push_attribute(("number", ending.number()));
            element.push_attribute(("type", "start"));
            self.start(element)?;
            let text = format!("{}.", ending.number());
            self.writer.write_event(Event::Text(BytesText::new(&text)))?;
            self.close("ending")?;
        }
        if repeat {
            let mut element = BytesStart::new("repeat");
            element.push_attribute(("direction", "forward"));
            self.empty(element)?;
        }
        self.close("barline")
    }

    fn right_barline(
        &mut self,
        repeat: bool,
        ending: Option<(Ending, &'static str)>,
    ) -> quick_xml::Result<()> {
        let mut barline = BytesStart::new("barline");
        barline.push_attribute(("location", "right"));
        self.start(barline)?;
        if repeat {
            self.text_element("bar-style", "light-heavy")?;
        }
        if let Some((ending, kind)) = ending {
            let mut element = BytesStart::new("ending");
            element.push_attribute(("number", ending.number()));
            element.push_attribute(("type", kind));
            self.empty(element)?;
        }
        if repeat {
            let mut element = BytesStart::new("repeat");
            element.push_attribute(("direction", "backward"));
            self.empty(element)?;
        }
        self.close("barline")
    }

    fn key(&mut self, key: KeySignature) -> quick_xml::Result<()> {
        self.open("key")?;
        self.text_element("fifths", &key.fifths.to_string())?;
        self.text_element("mode", key.mode_str())?;
        self.close("key")
    }

    fn attributes(&mut self, written_key: KeySignature) -> quick_xml::Result<()> {
        let time = self.document.metadata.time_signature;
        self.open("attributes")?;
        self.text_element("divisions", &DIVISIONS.to_string())?;
        self.key(written_key)?;
        self.open("time")?;
        self.text_element("beats", &time.beats.to_string())?;
        self.text_element("beat-type", &time.beat_type.to_string())?;
        self.close("time")?;
        let (sign, line) = self.options.clef.sign_and_line();
        self.open("clef")?;
        self.text_element("sign", sign)?;
        self.text_element("line", line)?;
        self.close("clef")?;
        if let Some(transposition) = self.options.transposition {
            // Written to sounding, so the opposite of the display interval
            let sounding = transposition.interval.inverse();
            self.open("transpose")?;
            self.text_element("diatonic", &sounding.diatonic.to_string())?;
            self.text_element("chromatic", &sounding.chromatic.to_string())?;
            self.close("transpose")?;
        }
        self.close("attributes")
    }

    fn tempo_direction(&mut self, tempo: &Tempo) -> quick_xml::Result<()> {
        let mut direction = BytesStart::new("direction");
        direction.push_attribute(("placement", "above"));
        self.start(direction)?;
        self.open("direction-type")?;
        self.open("metronome")?;
        self.text_element("beat-unit", tempo.duration.musicxml_type())?;
        if tempo.dotted {
            self.empty(BytesStart::new("beat-unit-dot"))?;
        }
        self.text_element("per-minute", &tempo.bpm.to_string())?;
        self.close("metronome")?;
        self.close("direction-type")?;
        let quarter_bpm = tempo.to_quarter_note_bpm().to_string();
        let mut sound = BytesStart::new("sound");
        sound.push_attribute(("tempo", quarter_bpm.as_str()));
        self.empty(sound)?;
        self.close("direction")
    }

    fn harmony(&mut self, chord: &ChordAnnotation, interval: Interval) -> quick_xml::Result<()> {
        let root_alter = chord.root_accidental.map_or(0, |a| a.alter());
        let root = SpelledPitch::new(chord.root, root_alter, 0).transpose(interval);
        self.open("harmony")?;
        self.open("root")?;
        self.text_element("root-step", root.name.as_str())?;
        if root.alter != 0 {
            self.text_element("root-alter", &root.alter.to_string())?;
        }
        self.close("root")?;

        let quality = ChordQuality::parse(&chord.quality);
        let mut kind = BytesStart::new("kind");
        if !chord.quality.is_empty() {
            kind.push_attribute(("text", chord.quality.as_str()));
        }
        self.start(kind)?;
        self.writer
            .write_event(Event::Text(BytesText::new(quality.kind)))?;
        self.close("kind")?;

        if let Some((name, accidental)) = chord.bass {
            let alter = accidental.map_or(0, |a| a.alter());
            let bass = SpelledPitch::new(name, alter, 0).transpose(interval);
            self.open("bass")?;
            self.text_element("bass-step", bass.name.as_str())?;
            if bass.alter != 0 {
                self.text_element("bass-alter", &bass.alter.to_string())?;
            }
            self.close("bass")?;
        }
        self.close("harmony")
    }

    fn note(
        &mut self,
        index: usize,
        element: &Element,
        placement: Placement<'_>,
        accidentals: &mut AccidentalState,
    ) -> quick_xml::Result<()> {
        let Placement {
            key,
            interval,
            beams,
            duration,
        } = placement;
        self.open("note")?;

        let mut accidental = None;
        match &element.kind {
            ElementKind::Note(note) => {
                let concert = self.options.concert_pitch(self.document, index, note, &key);
                let written = self.options.display_pitch(concert, interval);
                accidental = accidentals.accidental_for(written, note.tie_stop);
                self.open("pitch")?;
                self.text_element("step", written.name.as_str())?;
                if written.alter != 0 {
                    self.text_element("alter", &written.alter.to_string())?;
                }
                self.text_element("octave", &written.musicxml_octave().to_string())?;
                self.close("pitch")?;
            }
            ElementKind::Rest => self.empty(BytesStart::new("rest"))?,
        }

        let rhythm = element.rhythm;
        self.text_element("duration", &duration.to_string())?;
        let note = element.note();
        if let Some(note) = note {
            if note.tie_stop {
                self.typed("tie", "stop")?;
            }
            if note.tie_start {
                self.typed("tie", "start")?;
            }
        }
        self.text_element("type", rhythm.duration.musicxml_type())?;
        if rhythm.dotted {
            self.empty(BytesStart::new("dot"))?;
        }
        if let Some(accidental) = accidental {
            self.text_element("accidental", accidental)?;
        }
        if let Some(tuplet) = rhythm.tuplet {
            self.open("time-modification")?;
            self.text_element("actual-notes", &tuplet.actual_notes.to_string())?;
            self.text_element("normal-notes", &tuplet.normal_notes.to_string())?;
            self.close("time-modification")?;
        }
        for (number, state) in beams {
            let number = number.to_string();
            let mut beam = BytesStart::new("beam");
            beam.push_attribute(("number", number.as_str()));
            self.start(beam)?;
            self.writer
                .write_event(Event::Text(BytesText::new(state.as_str())))?;
            self.close("beam")?;
        }

        let tied = note.is_some_and(|n| n.tie_start || n.tie_stop);
        let slurred = note.is_some_and(|n| n.slur_start || n.slur_stop);
        let tuplet_edge = rhythm.tuplet.is_some_and(|t| t.is_start || t.is_stop);
        if tied || slurred || tuplet_edge {
            self.open("notations")?;
            if let Some(note) = note {
                if note.tie_stop {
                    self.typed("tied", "stop")?;
                }
                if note.tie_start {
                    self.typed("tied", "start")?;
                }
                for (flag, kind) in [(note.slur_stop, "stop"), (note.slur_start, "start")] {
                    if flag {
                        let mut slur = BytesStart::new("slur");
                        slur.push_attribute(("type", kind));
                        slur.push_attribute(("number", "1"));
                        self.empty(slur)?;
                    }
                }
            }
            if let Some(tuplet) = rhythm.tuplet {
                if tuplet.is_start {
                    let mut element = BytesStart::new("tuplet");
                    element.push_attribute(("type", "start"));
                    element.push_attribute(("bracket", "yes"));
                    self.empty(element)?;
                }
                if tuplet.is_stop {
                    self.typed("tuplet", "stop")?;
                }
            }
            self.close("notations")?;
        }

        self.close("note")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn render(source: &str) -> String {
        to_musicxml(&parse(source).unwrap(), &RenderOptions::default())
    }

    fn render_with(source: &str, options: RenderOptions) -> String {
        to_musicxml(&parse(source).unwrap(), &options)
    }

    #[test]
    fn test_header_and_part_list() {
        let xml = render("---\ntitle: Blue & Green\ncomposer: Someone\n---\nC D E F");
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<!DOCTYPE score-partwise PUBLIC"));
        assert!(xml.contains("<score-partwise version=\"4.0\">"));
        assert!(xml.contains("<work-title>Blue &amp; Green</work-title>"));
        assert!(xml.contains("<creator type=\"composer\">Someone</creator>"));
        assert!(xml.contains("<part-name print-object=\"no\"/>"));
        assert!(xml.trim_end().ends_with("</score-partwise>"));
    }

    #[test]
    fn test_no_work_without_title() {
        let xml = render("C D E F");
        assert!(!xml.contains("<work>"));
        assert!(!xml.contains("<identification>"));
    }

    #[test]
    fn test_first_measure_attributes() {
        let xml = render("---\ntime-signature: 3/4\nkey-signature: D\n---\nC D E");
        assert!(xml.contains("<divisions>48</divisions>"));
        assert!(xml.contains("<fifths>2</fifths>"));
        assert!(xml.contains("<mode>major</mode>"));
        assert!(xml.contains("<beats>3</beats>"));
        assert!(xml.contains("<beat-type>4</beat-type>"));
        assert!(xml.contains("<sign>G</sign>"));
        assert!(xml.contains("<line>2</line>"));
        assert_eq!(xml.matches("<attributes>").count(), 1);
    }

    #[test]
    fn test_pitch_and_duration() {
        let xml = render("C F# Bb Dp");
        assert!(xml.contains("<step>C</step>"));
        assert!(xml.contains("<octave>4</octave>"));
        assert!(xml.contains("<alter>1</alter>"));
        assert!(xml.contains("<alter>-1</alter>"));
        assert!(xml.contains("<duration>48</duration>"));
        assert!(xml.contains("<duration>96</duration>"));
        assert!(xml.contains("<type>half</type>"));
    }

    #[test]
    fn test_rest_and_dot() {
        let xml = render("$* C/ Dp");
        assert!(xml.contains("<rest/>"));
        assert!(xml.contains("<dot/>"));
        assert!(xml.contains("<duration>72</duration>"));
    }

    #[test]
    fn test_accidental_against_key() {
        // F# is in the key of G, F natural is not
        let xml = render("---\nkey-signature: G\n---\nF F% F F");
        assert_eq!(xml.matches("<accidental>natural</accidental>").count(), 1);
        assert_eq!(xml.matches("<accidental>sharp</accidental>").count(), 1);
    }

    #[test]
    fn test_accidental_carries_through_measure() {
        let xml = render("F# F# G G\nF F F F");
        assert_eq!(xml.matches("<accidental>sharp</accidental>").count(), 1);
        assert_eq!(xml.matches("<accidental>").count(), 1);
    }

    #[test]
    fn test_tie_elements() {
        let xml = render("C-C D E");
        assert!(xml.contains("<tie type=\"start\"/>"));
        assert!(xml.contains("<tie type=\"stop\"/>"));
        assert!(xml.contains("<tied type=\"start\"/>"));
        assert!(xml.contains("<tied type=\"stop\"/>"));
    }

    #[test]
    fn test_slur_elements() {
        let xml = render("(C D E) F");
        assert!(xml.contains("<slur type=\"start\" number=\"1\"/>"));
        assert!(xml.contains("<slur type=\"stop\" number=\"1\"/>"));
    }

    #[test]
    fn test_triplet_output() {
        let xml = render("[C D E]3 F G A");
        assert_eq!(xml.matches("<actual-notes>3</actual-notes>").count(), 3);
        assert_eq!(xml.matches("<normal-notes>2</normal-notes>").count(), 3);
        assert_eq!(xml.matches("<duration>16</duration>").count(), 3);
        assert!(xml.contains("<tuplet type=\"start\" bracket=\"yes\"/>"));
        assert!(xml.contains("<tuplet type=\"stop\"/>"));
        assert!(xml.contains("<type>eighth</type>"));
    }

    #[test]
    fn test_beams_written() {
        let xml = render("C/ D/ E F G");
        assert!(xml.contains("<beam number=\"1\">begin</beam>"));
        assert!(xml.contains("<beam number=\"1\">end</beam>"));
    }

    #[test]
    fn test_repeat_barlines() {
        let xml = render("||: C D E F :||");
        assert!(xml.contains("<barline location=\"left\">"));
        assert!(xml.contains("<bar-style>heavy-light</bar-style>"));
        assert!(xml.contains("<repeat direction=\"forward\"/>"));
        assert!(xml.contains("<barline location=\"right\">"));
        assert!(xml.contains("<bar-style>light-heavy</bar-style>"));
        assert!(xml.contains("<repeat direction=\"backward\"/>"));
    }

    #[test]
    fn test_volta_endings() {
        let xml = render("||: C C C C\n1. D D D D :||\n2. E E E E");
        assert!(xml.contains("<ending number=\"1\" type=\"start\">1.</ending>"));
        assert!(xml.contains("<ending number=\"1\" type=\"stop\"/>"));
        assert!(xml.contains("<ending number=\"2\" type=\"start\">2.</ending>"));
        assert!(xml.contains("<ending number=\"2\" type=\"discontinue\"/>"));
    }

    #[test]
    fn test_key_change_midway() {
        let xml = render("C D E F\n@key:Eb\nE F G A");
        assert_eq!(xml.matches("<attributes>").count(), 2);
        assert!(xml.contains("<fifths>-3</fifths>"));
        // E and A are flattened by the new key
        assert_eq!(xml.matches("<alter>-1</alter>").count(), 2);
    }

    #[test]
    fn test_tempo_direction() {
        let xml = render("---\ntempo: 80\n---\nC D E F");
        assert!(xml.contains("<beat-unit>quarter</beat-unit>"));
        assert!(xml.contains("<per-minute>80</per-minute>"));
        assert!(xml.contains("<sound tempo=\"80\"/>"));

        let xml = render("C D E F");
        assert!(!xml.contains("<metronome>"));
    }

    #[test]
    fn test_bass_clef_lowers_display() {
        let options = RenderOptions::from_tokens("bass", 0, None, None);
        let xml = render_with("C D E F", options);
        assert!(xml.contains("<sign>F</sign>"));
        assert!(xml.contains("<line>4</line>"));
        assert!(xml.contains("<octave>2</octave>"));
    }

    #[test]
    fn test_bb_transposition() {
        let options = RenderOptions::from_tokens("treble", 0, None, Some("Bb"));
        let xml = render_with("C D E F", options);
        assert!(xml.contains("<fifths>2</fifths>"));
        assert!(xml.contains("<step>D</step>"));
        assert!(xml.contains("<step>G</step>"));
        assert!(xml.contains("<diatonic>-1</diatonic>"));
        assert!(xml.contains("<chromatic>-2</chromatic>"));
        // F# in D major needs no accidental
        assert!(!xml.contains("<accidental>"));
    }

    #[test]
    fn test_mod_point_applies_to_selected_group() {
        let source = "@Eb:^ C D E F";
        let plain = render(source);
        assert!(plain.contains("<octave>4</octave>"));
        let options = RenderOptions::from_tokens("treble", 0, Some("eb"), None);
        let shifted = render_with(source, options);
        assert!(shifted.contains("<octave>5</octave>"));
        assert!(!shifted.contains("<octave>4</octave>"));
    }

    #[test]
    fn test_harmony() {
        let xml = render("@ch:Bbm7/F C D E F");
        assert!(xml.contains("<root-step>B</root-step>"));
        assert!(xml.contains("<root-alter>-1</root-alter>"));
        assert!(xml.contains("<kind text=\"m7\">minor-seventh</kind>"));
        assert!(xml.contains("<bass-step>F</bass-step>"));
        let harmony = xml.find("<harmony>").unwrap();
        let note = xml.find("<note>").unwrap();
        assert!(harmony < note);
    }

    #[test]
    fn test_pickup_measure_implicit() {
        let xml = render("@pickup G\nC D E F");
        assert!(xml.contains("<measure number=\"1\" implicit=\"yes\">"));
        assert!(xml.contains("<measure number=\"2\">"));
    }

    #[test]
    fn test_written_pitch_does_not_transpose() {
        let source = "---\nwritten-pitch: Bb\n---\nC D E F";
        assert_eq!(parse(source).unwrap().metadata.written_pitch.note, NoteName::B);
        assert_eq!(render(source), render("C D E F"));
    }

    fn durations(xml: &str) -> Vec<i64> {
        xml.split("<duration>")
            .skip(1)
            .map(|rest| rest[..rest.find('<').unwrap()].parse().unwrap())
            .collect()
    }

    #[test]
    fn test_measure_divisions() {
        let doc = parse("Cp D/ E/ [F G A]3").unwrap();
        let lengths = measure_divisions(&doc.measures[0].elements);
        assert_eq!(lengths, vec![96, 24, 24, 16, 16, 16]);
    }

    #[test]
    fn test_irregular_tuplets_fill_their_span() {
        let xml = render("[C D E F G]5 C C C");
        assert_eq!(durations(&xml), vec![9, 10, 9, 10, 10, 48, 48, 48]);

        let xml = render("[C D E F G A B]7 C C C");
        let written = durations(&xml);
        assert_eq!(written[..7].iter().sum::<i64>(), 48);
        assert_eq!(written.iter().sum::<i64>(), 192);
    }
}
