//! # Document Model
//!
//! Types produced by the parser and read by the semantic checker, the MusicXML
//! emitter and the playback engine. Nothing here mutates after parsing.
//!
//! ## Type Hierarchy
//! ```text
//! Document
//!   ├── Metadata (title, composer, time sig, key sig, written pitch, tempo, swing)
//!   ├── mod_points: HashMap<InstrumentGroup, Vec<ModPoint>>
//!   ├── line_to_measure: BTreeMap<line, measure_idx>
//!   └── Vec<Measure>
//!         ├── Vec<Element>
//!         │     ├── rhythm: Rhythm (duration, dotted, tuplet)
//!         │     ├── chord: Option<ChordAnnotation>
//!         │     └── kind: Note | Rest
//!         ├── repeat_start / repeat_end
//!         ├── ending: Option<EndingMarker>
//!         ├── key_change: Option<KeySignature>
//!         └── octave_shift, pickup, line
//! ```
//!
//! ## Durations
//! All durations are exact fractions of a whole note ([`Rational64`]), so
//! `8` triplet eighths sum to exactly one half note and a measure comparison
//! never depends on floating point rounding.
//!
//! ## Octave System
//! Octaves always reset at C regardless of key. Octave `0` is the octave of
//! middle C (C4, MIDI 60). A note's sounding octave is the sum of its own
//! marker, its bracket-group markers, the measure marker and the instrument
//! mod point; see [`absolute_octave`]. These layers are kept separate so one
//! document can be rendered with different outer shifts.
//!
//! ## Related Modules
//! - `parser` - builds these types
//! - `semantic` - validates measure lengths and repeat structure
//! - `musicxml` / `playback` - the two read-only projections

use num_rational::Rational64;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Base note value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Duration {
    Whole,
    Half,
    #[default]
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
}

impl Duration {
    const ALL: [Duration; 6] = [
        Duration::Whole,
        Duration::Half,
        Duration::Quarter,
        Duration::Eighth,
        Duration::Sixteenth,
        Duration::ThirtySecond,
    ];

    /// Length as a fraction of a whole note
    pub fn fraction(self) -> Rational64 {
        let denom = match self {
            Duration::Whole => 1,
            Duration::Half => 2,
            Duration::Quarter => 4,
            Duration::Eighth => 8,
            Duration::Sixteenth => 16,
            Duration::ThirtySecond => 32,
        };
        Rational64::new(1, denom)
    }

    /// `/` = eighth, `//` = sixteenth, `///` = thirty-second
    pub fn from_slashes(count: usize) -> Option<Self> {
        match count {
            1 => Some(Duration::Eighth),
            2 => Some(Duration::Sixteenth),
            3 => Some(Duration::ThirtySecond),
            _ => None,
        }
    }

    /// Find the (duration, dotted) pair whose length is exactly `length`
    pub fn from_fraction(length: Rational64) -> Option<(Self, bool)> {
        Self::ALL.iter().find_map(|&d| {
            if d.fraction() == length {
                Some((d, false))
            } else if d.fraction() * Rational64::new(3, 2) == length {
                Some((d, true))
            } else {
                None
            }
        })
    }

    pub fn musicxml_type(self) -> &'static str {
        match self {
            Duration::Whole => "whole",
            Duration::Half => "half",
            Duration::Quarter => "quarter",
            Duration::Eighth => "eighth",
            Duration::Sixteenth => "16th",
            Duration::ThirtySecond => "32nd",
        }
    }

    /// Number of beam lines a note of this value carries (0 for quarter and longer)
    pub fn beam_levels(self) -> u8 {
        match self {
            Duration::Eighth => 1,
            Duration::Sixteenth => 2,
            Duration::ThirtySecond => 3,
            _ => 0,
        }
    }
}

/// Tuplet membership: `actual_notes` in the time of `normal_notes`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupletInfo {
    pub actual_notes: u8,
    pub normal_notes: u8,
    pub is_start: bool,
    pub is_stop: bool,
}

impl TupletInfo {
    /// Standard normal-note count for an N-tuplet
    ///
    /// Duplets and quadruplets borrow from compound time (2 in 3, 4 in 3),
    /// octuplets are 8 in 6, everything else fits into the largest power of
    /// two below N (5 in 4, 7 in 4, 9 in 8).
    pub fn normal_notes_for(actual: u8) -> u8 {
        match actual {
            2 | 4 => 3,
            8 => 6,
            n => {
                let mut normal = 1u8;
                while normal * 2 < n {
                    normal *= 2;
                }
                normal
            }
        }
    }

    /// Multiplier from notated to sounding length
    pub fn ratio(&self) -> Rational64 {
        Rational64::new(self.normal_notes as i64, self.actual_notes as i64)
    }
}

/// Rhythm shared by notes and rests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rhythm {
    pub duration: Duration,
    pub dotted: bool,
    pub tuplet: Option<TupletInfo>,
}

impl Rhythm {
    pub fn new(duration: Duration, dotted: bool) -> Self {
        Self {
            duration,
            dotted,
            tuplet: None,
        }
    }

    /// Written length (dot applied, tuplet ignored)
    pub fn notated(&self) -> Rational64 {
        let base = self.duration.fraction();
        if self.dotted {
            base * Rational64::new(3, 2)
        } else {
            base
        }
    }

    /// Sounding length (dot and tuplet ratio applied)
    pub fn real(&self) -> Rational64 {
        match &self.tuplet {
            Some(t) => self.notated() * t.ratio(),
            None => self.notated(),
        }
    }
}

/// Time signature (e.g. 4/4, 3/4, 6/8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub beats: u8,
    pub beat_type: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }
}

impl TimeSignature {
    /// Total measure length in whole notes
    pub fn measure_length(&self) -> Rational64 {
        Rational64::new(self.beats as i64, self.beat_type as i64)
    }

    /// 6/8, 9/8, 12/8: beats are grouped by dotted quarter
    pub fn is_compound(&self) -> bool {
        self.beat_type == 8 && self.beats % 3 == 0 && self.beats > 3
    }

    /// Length of one beaming beat in whole notes
    pub fn beat_length(&self) -> Rational64 {
        if self.is_compound() {
            Rational64::new(3, 8)
        } else {
            Rational64::new(1, self.beat_type as i64)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NoteName {
    #[default]
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteName {
    const STEPS: [NoteName; 7] = [
        NoteName::C,
        NoteName::D,
        NoteName::E,
        NoteName::F,
        NoteName::G,
        NoteName::A,
        NoteName::B,
    ];

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'C' => Some(NoteName::C),
            'D' => Some(NoteName::D),
            'E' => Some(NoteName::E),
            'F' => Some(NoteName::F),
            'G' => Some(NoteName::G),
            'A' => Some(NoteName::A),
            'B' => Some(NoteName::B),
            _ => None,
        }
    }

    /// Diatonic index from C (C = 0 .. B = 6)
    pub fn step_index(self) -> i32 {
        match self {
            NoteName::C => 0,
            NoteName::D => 1,
            NoteName::E => 2,
            NoteName::F => 3,
            NoteName::G => 4,
            NoteName::A => 5,
            NoteName::B => 6,
        }
    }

    pub fn from_step_index(index: i32) -> Self {
        Self::STEPS[index.rem_euclid(7) as usize]
    }

    /// Semitones above C for the natural note
    pub fn semitone(self) -> i32 {
        match self {
            NoteName::C => 0,
            NoteName::D => 2,
            NoteName::E => 4,
            NoteName::F => 5,
            NoteName::G => 7,
            NoteName::A => 9,
            NoteName::B => 11,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NoteName::C => "C",
            NoteName::D => "D",
            NoteName::E => "E",
            NoteName::F => "F",
            NoteName::G => "G",
            NoteName::A => "A",
            NoteName::B => "B",
        }
    }
}

/// Explicit accidental written in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accidental {
    Sharp,   // #
    Flat,    // b
    Natural, // %
}

impl Accidental {
    pub fn alter(self) -> i8 {
        match self {
            Accidental::Sharp => 1,
            Accidental::Flat => -1,
            Accidental::Natural => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Major,
    Minor,
}

/// Key signature as a position on the circle of fifths
/// (positive = sharps, negative = flats)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeySignature {
    pub fifths: i8,
    pub mode: Mode,
}

const SHARP_ORDER: [NoteName; 7] = [
    NoteName::F,
    NoteName::C,
    NoteName::G,
    NoteName::D,
    NoteName::A,
    NoteName::E,
    NoteName::B,
];

const FLAT_ORDER: [NoteName; 7] = [
    NoteName::B,
    NoteName::E,
    NoteName::A,
    NoteName::D,
    NoteName::G,
    NoteName::C,
    NoteName::F,
];

impl KeySignature {
    pub fn major(fifths: i8) -> Self {
        Self {
            fifths,
            mode: Mode::Major,
        }
    }

    /// Parse a key name (`G`, `Bb`, `F#m`), a sharp run (`###`) or a flat run (`bb`).
    ///
    /// A single `b` is rejected; one flat is written `F`.
    pub fn from_name(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return None;
        }

        if trimmed.chars().all(|c| c == '#') {
            let count = trimmed.len();
            return (count <= 7).then(|| Self::major(count as i8));
        }

        if trimmed.len() >= 2 && trimmed.chars().all(|c| c == 'b') {
            let count = trimmed.len();
            return (count <= 7).then(|| Self::major(-(count as i8)));
        }

        if let Some(tonic) = trimmed.strip_suffix('m') {
            let fifths = match tonic {
                "A" => 0,
                "E" => 1,
                "B" => 2,
                "F#" | "Fs" => 3,
                "C#" | "Cs" => 4,
                "G#" | "Gs" => 5,
                "D#" | "Ds" => 6,
                "A#" | "As" => 7,
                "D" => -1,
                "G" => -2,
                "C" => -3,
                "F" => -4,
                "Bb" | "Bf" => -5,
                "Eb" | "Ef" => -6,
                "Ab" | "Af" => -7,
                _ => return None,
            };
            return Some(Self {
                fifths,
                mode: Mode::Minor,
            });
        }

        let fifths = match trimmed {
            "C" => 0,
            "G" => 1,
            "D" => 2,
            "A" => 3,
            "E" => 4,
            "B" => 5,
            "F#" | "Fs" => 6,
            "C#" | "Cs" => 7,
            "F" => -1,
            "Bb" | "Bf" => -2,
            "Eb" | "Ef" => -3,
            "Ab" | "Af" => -4,
            "Db" | "Df" => -5,
            "Gb" | "Gf" => -6,
            "Cb" | "Cf" => -7,
            _ => return None,
        };
        Some(Self::major(fifths))
    }

    /// Alteration the key applies to an unmarked note
    pub fn alter_for(&self, name: NoteName) -> i8 {
        let count = self.fifths.unsigned_abs().min(7) as usize;
        if self.fifths > 0 && SHARP_ORDER[..count].contains(&name) {
            1
        } else if self.fifths < 0 && FLAT_ORDER[..count].contains(&name) {
            -1
        } else {
            0
        }
    }

    /// Alteration of a note: an explicit accidental (natural included) wins
    /// over the key signature
    pub fn resolve(&self, name: NoteName, accidental: Option<Accidental>) -> i8 {
        match accidental {
            Some(acc) => acc.alter(),
            None => self.alter_for(name),
        }
    }

    pub fn mode_str(&self) -> &'static str {
        match self.mode {
            Mode::Major => "major",
            Mode::Minor => "minor",
        }
    }
}

/// Pitch an instrument's written C sounds as.
///
/// Carried through from the frontmatter for host applications. Rendering
/// never reads it; written parts come from [`crate::api::RenderOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WrittenPitch {
    pub note: NoteName,
    pub accidental: Option<Accidental>,
    pub octave_offset: i8,
}

/// Tempo: `bpm` beats per minute where one beat is `duration` (optionally dotted)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tempo {
    pub bpm: u16,
    pub duration: Duration,
    pub dotted: bool,
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            bpm: 120,
            duration: Duration::Quarter,
            dotted: false,
        }
    }
}

impl Tempo {
    /// Length of one tempo beat in whole notes
    pub fn beat_length(&self) -> Rational64 {
        Rhythm::new(self.duration, self.dotted).notated()
    }

    /// Equivalent quarter-note BPM (e.g. half = 60 is quarter = 120,
    /// dotted quarter = 80 is quarter = 120)
    pub fn to_quarter_note_bpm(&self) -> f64 {
        let quarters = self.beat_length() * 4;
        self.bpm as f64 * (*quarters.numer() as f64 / *quarters.denom() as f64)
    }
}

/// Swing feel passed through to the playback scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SwingType {
    Eighth,
    Sixteenth,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    pub title: Option<String>,
    pub composer: Option<String>,
    pub time_signature: TimeSignature,
    pub key_signature: KeySignature,
    /// Metadata only, see [`WrittenPitch`]
    pub written_pitch: WrittenPitch,
    /// `None` when the document gives no tempo; consumers fall back to [`Tempo::default`]
    pub tempo: Option<Tempo>,
    pub swing: Option<SwingType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordAttachment {
    /// Sounds for the duration of the element it precedes
    Attached,
    /// Sounds for its own rhythm, independent of the melody
    Standalone(Rhythm),
}

/// Chord symbol anchored to an element's position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordAnnotation {
    pub root: NoteName,
    pub root_accidental: Option<Accidental>,
    /// Free-form quality text (`m7`, `maj7`, `sus4`, ...); never validated
    pub quality: String,
    pub bass: Option<(NoteName, Option<Accidental>)>,
    pub attachment: ChordAttachment,
}

impl ChordAnnotation {
    /// Symbol as written, e.g. `Dm7/F`
    pub fn symbol(&self) -> String {
        let mut s = String::from(self.root.as_str());
        s.push_str(accidental_suffix(self.root_accidental));
        s.push_str(&self.quality);
        if let Some((bass, acc)) = self.bass {
            s.push('/');
            s.push_str(bass.as_str());
            s.push_str(accidental_suffix(acc));
        }
        s
    }
}

fn accidental_suffix(acc: Option<Accidental>) -> &'static str {
    match acc {
        Some(Accidental::Sharp) => "#",
        Some(Accidental::Flat) => "b",
        _ => "",
    }
}

/// A pitched note. The accidental is `None` when the key signature decides.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Note {
    pub name: NoteName,
    pub accidental: Option<Accidental>,
    /// Individual marker: `^` = +1, `__` = -2
    pub octave: i8,
    /// Sum of the markers on enclosing bracket groups
    pub group_octave: i8,
    pub tie_start: bool,
    pub tie_stop: bool,
    pub slur_start: bool,
    pub slur_stop: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    Note(Note),
    Rest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub rhythm: Rhythm,
    pub chord: Option<ChordAnnotation>,
    pub kind: ElementKind,
}

impl Element {
    pub fn note(&self) -> Option<&Note> {
        match &self.kind {
            ElementKind::Note(n) => Some(n),
            ElementKind::Rest => None,
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.kind, ElementKind::Rest)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    First,
    Second,
}

impl Ending {
    pub fn number(self) -> &'static str {
        match self {
            Ending::First => "1",
            Ending::Second => "2",
        }
    }
}

/// Volta bracket membership. `continues` is set when the next measure
/// belongs to the same bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndingMarker {
    pub ending: Ending,
    pub continues: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Measure {
    pub elements: Vec<Element>,
    pub repeat_start: bool,
    pub repeat_end: bool,
    pub ending: Option<EndingMarker>,
    pub key_change: Option<KeySignature>,
    /// Measure-wide octave marker (`@:^`)
    pub octave_shift: i8,
    /// Pickup measures may be shorter than the time signature
    pub pickup: bool,
    /// 1-based source line
    pub line: usize,
}

impl Measure {
    /// Sounding length of the measure in whole notes
    pub fn duration(&self) -> Rational64 {
        self.elements
            .iter()
            .fold(Rational64::from_integer(0), |acc, e| acc + e.rhythm.real())
    }

    pub fn ending(&self) -> Option<Ending> {
        self.ending.map(|m| m.ending)
    }
}

/// Instrument families that can carry their own per-line octave overrides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentGroup {
    Bb,
    Eb,
    F,
}

impl InstrumentGroup {
    /// Case-insensitive: `Bb`, `bb`, `Eb`, `eb`, `F`, `f`
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bb" => Some(InstrumentGroup::Bb),
            "eb" => Some(InstrumentGroup::Eb),
            "f" => Some(InstrumentGroup::F),
            _ => None,
        }
    }
}

/// Octave override for one instrument group on one source line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModPoint {
    pub line: usize,
    pub shift: i8,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub metadata: Metadata,
    pub measures: Vec<Measure>,
    pub mod_points: HashMap<InstrumentGroup, Vec<ModPoint>>,
    /// 1-based source line to 0-based measure index
    pub line_to_measure: BTreeMap<usize, usize>,
}

impl Document {
    /// Mod point shift for a measure, 0 when the group has none on that line
    pub fn mod_point_shift(&self, measure_index: usize, group: Option<InstrumentGroup>) -> i8 {
        let (Some(group), Some(measure)) = (group, self.measures.get(measure_index)) else {
            return 0;
        };
        self.mod_points
            .get(&group)
            .and_then(|points| points.iter().find(|p| p.line == measure.line))
            .map_or(0, |p| p.shift)
    }

    /// Key signature in force at each measure
    pub fn active_keys(&self) -> Vec<KeySignature> {
        let mut current = self.metadata.key_signature;
        self.measures
            .iter()
            .map(|m| {
                if let Some(key) = m.key_change {
                    current = key;
                }
                current
            })
            .collect()
    }

    pub fn tempo(&self) -> Tempo {
        self.metadata.tempo.unwrap_or_default()
    }
}

/// Octaves either side of middle C that still fall inside the MIDI range
pub const OCTAVE_LIMIT: i32 = 5;

/// Octave a note sounds in, composing the layers innermost first:
/// individual marker, group markers, measure marker, mod point.
///
/// Summed wide; callers clamp once with [`clamp_octave`].
pub fn absolute_octave(note: &Note, measure_shift: i8, mod_point_shift: i8) -> i32 {
    i32::from(note.octave)
        + i32::from(note.group_octave)
        + i32::from(measure_shift)
        + i32::from(mod_point_shift)
}

/// Clamp a composed octave to `-OCTAVE_LIMIT..=OCTAVE_LIMIT`
pub fn clamp_octave(octave: i32) -> i8 {
    octave.clamp(-OCTAVE_LIMIT, OCTAVE_LIMIT) as i8
}

/// MIDI number for a spelled pitch; octave 0 is the octave of middle C
pub fn midi_number(name: NoteName, alter: i8, octave: i8) -> i32 {
    60 + 12 * octave as i32 + name.semitone() + alter as i32
}
