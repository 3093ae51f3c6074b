//! # Public API
//!
//! This module contains the main entry points for the Gen compiler library.
//!
//! ## Compilation Functions
//!
//! - [`compile()`] - Full compilation with validation (recommended for complete scores)
//! - [`compile_unchecked()`] - Skip validation (useful for partial/incomplete scores)
//! - [`compile_with_options()`] - Custom clef, octave shift, instrument group and transposition
//! - [`generate_playback_data()`] - Timing and pitch events for audio playback
//! - [`lint()`] - Structured diagnostics for editors
//!
//! ## Typical Usage
//!
//! ```rust
//! use gen_core::compile;
//!
//! let source = r#"---
//! title: My Song
//! composer: Me
//! ---
//! C D E F
//! G A B C^
//! "#;
//!
//! let musicxml = compile(source)?;
//! assert!(musicxml.contains("<work-title>My Song</work-title>"));
//! # Ok::<(), gen_core::GenError>(())
//! ```
//!
//! ## Advanced Usage
//!
//! For transposing instruments or custom clefs:
//!
//! ```rust
//! use gen_core::{compile_with_options, RenderOptions};
//!
//! // Alto sax part: Eb transposition, Eb mod points applied
//! let options = RenderOptions::from_tokens("treble", 0, Some("eb"), Some("Eb"));
//! let musicxml = compile_with_options("C D E F @Eb:^", &options, true)?;
//! assert!(musicxml.contains("<fifths>3</fifths>"));
//! # Ok::<(), gen_core::GenError>(())
//! ```

use crate::ast::{absolute_octave, clamp_octave, Document, InstrumentGroup, KeySignature, Note};
use crate::error::GenError;
use crate::musicxml::to_musicxml;
use crate::parser::parse;
use crate::playback::{playback_data, PlaybackData};
use crate::semantic::validate;
use crate::transpose::{Interval, SpelledPitch, Transposition};
use serde::{Deserialize, Deserializer, Serialize};

/// Staff clef
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Clef {
    #[default]
    Treble,
    Bass,
}

impl Clef {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "treble" => Some(Clef::Treble),
            "bass" => Some(Clef::Bass),
            _ => None,
        }
    }

    /// Octaves the staff displays relative to concert pitch
    pub fn octave_offset(self) -> i8 {
        match self {
            Clef::Treble => 0,
            Clef::Bass => -2,
        }
    }

    /// MusicXML `<sign>` and `<line>`
    pub fn sign_and_line(self) -> (&'static str, &'static str) {
        match self {
            Clef::Treble => ("G", "2"),
            Clef::Bass => ("F", "4"),
        }
    }
}

/// How a document is rendered: staff, octave, instrument group, transposition
///
/// Deserializes from JSON with every field optional:
///
/// ```
/// use gen_core::{Clef, InstrumentGroup, RenderOptions};
///
/// let options: RenderOptions =
///     serde_json::from_str(r#"{"clef": "bass", "instrumentGroup": "bb", "transpose": "Bb"}"#)
///         .unwrap();
/// assert_eq!(options.clef, Clef::Bass);
/// assert_eq!(options.instrument_group, Some(InstrumentGroup::Bb));
/// assert!(options.transposition.is_some());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    pub clef: Clef,
    /// Octaves added to every note
    pub octave_shift: i8,
    /// Selects which mod points (`@Bb:^`, `@Eb:_`) apply
    #[serde(deserialize_with = "deserialize_group")]
    pub instrument_group: Option<InstrumentGroup>,
    /// Written-pitch transposition; `None` renders concert pitch
    #[serde(rename = "transpose", deserialize_with = "deserialize_transposition")]
    pub transposition: Option<Transposition>,
}

fn group_from_token(token: &str) -> Option<InstrumentGroup> {
    let group = InstrumentGroup::from_name(token);
    if group.is_none() && !token.trim().is_empty() {
        log::warn!("unknown instrument group '{}', rendering without mod points", token);
    }
    group
}

fn transposition_from_token(token: &str) -> Option<Transposition> {
    let transposition = Transposition::for_key(token);
    let concert = matches!(token.trim(), "" | "C" | "c");
    if transposition.is_none() && !concert {
        log::warn!("unknown transposition '{}', rendering concert pitch", token);
    }
    transposition
}

fn deserialize_group<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<InstrumentGroup>, D::Error> {
    let token = Option::<String>::deserialize(deserializer)?;
    Ok(token.as_deref().and_then(group_from_token))
}

fn deserialize_transposition<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Transposition>, D::Error> {
    let token = Option::<String>::deserialize(deserializer)?;
    Ok(token.as_deref().and_then(transposition_from_token))
}

impl RenderOptions {
    /// Build options from host-supplied strings (`"bass"`, `"eb"`, `"Bb"`).
    /// Unknown tokens fall back to the defaults with a logged warning.
    pub fn from_tokens(
        clef: &str,
        octave_shift: i8,
        instrument_group: Option<&str>,
        transpose_key: Option<&str>,
    ) -> Self {
        let clef = Clef::from_name(clef).unwrap_or_else(|| {
            log::warn!("unknown clef '{}', using treble", clef);
            Clef::Treble
        });
        Self {
            clef,
            octave_shift,
            instrument_group: instrument_group.and_then(group_from_token),
            transposition: transpose_key.and_then(transposition_from_token),
        }
    }

    /// Sounding pitch of a note in a measure whose key is `key`: the note's
    /// own, group, measure and mod point octaves plus the score shift
    pub fn concert_pitch(
        &self,
        document: &Document,
        measure_index: usize,
        note: &Note,
        key: &KeySignature,
    ) -> SpelledPitch {
        let measure_shift = document
            .measures
            .get(measure_index)
            .map_or(0, |m| m.octave_shift);
        let mod_point = document.mod_point_shift(measure_index, self.instrument_group);
        let octave = absolute_octave(note, measure_shift, mod_point) + i32::from(self.octave_shift);
        SpelledPitch::new(
            note.name,
            key.resolve(note.name, note.accidental),
            clamp_octave(octave),
        )
    }

    /// Displayed key for a concert key and the interval its notes move by
    pub fn written_key(&self, key: KeySignature) -> (KeySignature, Interval) {
        match self.transposition {
            Some(t) => t.written_key(key),
            None => (key, Interval::UNISON),
        }
    }

    /// Pitch as written on the staff: clef offset, then transposition
    pub fn display_pitch(&self, concert: SpelledPitch, interval: Interval) -> SpelledPitch {
        SpelledPitch {
            octave: concert.octave.saturating_add(self.clef.octave_offset()),
            ..concert
        }
        .transpose(interval)
    }
}

/// Compile a Gen source string to MusicXML.
///
/// This is the main entry point for the library. It performs full compilation with validation.
///
/// # Pipeline
/// 1. Tokenize source with lexer
/// 2. Parse tokens into a document
/// 3. Validate the document (measure durations, repeats, endings)
/// 4. Generate MusicXML output
///
/// # Example
/// ```rust
/// use gen_core::compile;
///
/// let musicxml = compile("C D E F")?;
/// assert!(musicxml.contains("<step>F</step>"));
/// # Ok::<(), gen_core::GenError>(())
/// ```
///
/// # Errors
/// Returns [`GenError`] if lexing, parsing or validation fails.
pub fn compile(source: &str) -> Result<String, GenError> {
    compile_with_options(source, &RenderOptions::default(), true)
}

/// Compile without validation (useful for partial/incomplete scores).
///
/// Skips semantic validation, allowing compilation of scores with:
/// - Incomplete measures (duration doesn't match time signature)
/// - Unclosed repeats
/// - First endings without a second ending
///
/// Lex and parse errors are still reported.
///
/// # Example
/// ```rust
/// use gen_core::compile_unchecked;
///
/// // Incomplete measure (only 3 beats in 4/4 time)
/// let musicxml = compile_unchecked("C D E")?;
/// # Ok::<(), gen_core::GenError>(())
/// ```
pub fn compile_unchecked(source: &str) -> Result<String, GenError> {
    compile_with_options(source, &RenderOptions::default(), false)
}

/// Compile with render options; `strict` runs semantic validation.
///
/// # Example
/// ```rust
/// use gen_core::{compile_with_options, Clef, RenderOptions};
///
/// let options = RenderOptions {
///     clef: Clef::Bass,
///     octave_shift: -1,
///     ..Default::default()
/// };
/// let musicxml = compile_with_options("C D E F", &options, true)?;
/// assert!(musicxml.contains("<sign>F</sign>"));
/// # Ok::<(), gen_core::GenError>(())
/// ```
pub fn compile_with_options(
    source: &str,
    options: &RenderOptions,
    strict: bool,
) -> Result<String, GenError> {
    let document = parse(source)?;
    if strict {
        validate(&document)?;
    }
    Ok(to_musicxml(&document, options))
}

/// Parse a Gen source string and produce playback events.
///
/// Playback is best effort: semantic validation is not run, so incomplete
/// measures still play.
///
/// # Example
/// ```rust
/// use gen_core::{generate_playback_data, RenderOptions};
///
/// let data = generate_playback_data("C D E F", &RenderOptions::default())?;
/// assert_eq!(data.notes.len(), 4);
/// assert_eq!(data.notes[0].concert_pitch_midi, 60);
/// # Ok::<(), gen_core::GenError>(())
/// ```
pub fn generate_playback_data(
    source: &str,
    options: &RenderOptions,
) -> Result<PlaybackData, GenError> {
    let document = parse(source)?;
    Ok(playback_data(&document, options))
}

/// Error shape handed to editors and other hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl CompileError {
    /// Convert a [`GenError`]; semantic errors are placed on their measure's
    /// source line when the document is available
    pub fn new(error: &GenError, document: Option<&Document>) -> Self {
        let (line, column) = match error {
            GenError::SemanticError { measure, .. } => {
                let line = document
                    .and_then(|d| d.measures.get(measure.wrapping_sub(1)))
                    .map(|m| m.line);
                (line, line.map(|_| 1))
            }
            other => match other.location() {
                Some((line, column)) => (Some(line), Some(column)),
                None => (None, None),
            },
        };
        Self {
            message: error.to_string(),
            line,
            column,
        }
    }
}

impl From<GenError> for CompileError {
    fn from(error: GenError) -> Self {
        CompileError::new(&error, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One editor diagnostic with a 1-based, end-exclusive column range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

/// Check a source string and report problems as diagnostics.
///
/// Lex, parse and metadata errors underline the offending token; semantic
/// errors underline the whole measure line. Annotations after the last
/// measure are reported as warnings.
///
/// ```
/// use gen_core::{lint, Severity};
///
/// assert!(lint("C D E F").is_empty());
/// let diagnostics = lint("C D E F\nG A B");
/// assert_eq!(diagnostics.len(), 1);
/// assert_eq!(diagnostics[0].severity, Severity::Error);
/// assert_eq!(diagnostics[0].line, 2);
/// ```
pub fn lint(source: &str) -> Vec<Diagnostic> {
    let lines: Vec<&str> = source.lines().collect();
    let line_end = |line: usize| {
        lines
            .get(line.wrapping_sub(1))
            .map_or(1, |text| text.chars().count() + 1)
    };

    let mut diagnostics = Vec::new();
    let result = parse(source).and_then(|document| validate(&document).map(|_| document));
    match result {
        Ok(document) => {
            let last_measure_line = document.measures.last().map_or(0, |m| m.line);
            for (number, text) in lines.iter().enumerate().skip(last_measure_line) {
                let trimmed = text.trim_start();
                if trimmed.starts_with('@') && !trimmed.starts_with("@ch:") {
                    diagnostics.push(Diagnostic {
                        severity: Severity::Warning,
                        message: "Annotation has no following measure to apply to".to_string(),
                        line: number + 1,
                        column: text.len() - trimmed.len() + 1,
                        end_line: number + 1,
                        end_column: text.chars().count() + 1,
                    });
                }
            }
        }
        Err(error) => {
            let document = parse(source).ok();
            let located = CompileError::new(&error, document.as_ref());
            let line = located.line.unwrap_or(1);
            let (column, end_column) = match (&error, located.column) {
                (GenError::SemanticError { .. }, _) | (_, None) => (1, line_end(line)),
                (_, Some(column)) => (column, (column + 1).max(token_end(&lines, line, column))),
            };
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                message: error.message().to_string(),
                line,
                column,
                end_line: line,
                end_column,
            });
        }
    }
    diagnostics
}

/// Column just past the whitespace-delimited token starting at `column`
fn token_end(lines: &[&str], line: usize, column: usize) -> usize {
    let Some(text) = lines.get(line.wrapping_sub(1)) else {
        return column + 1;
    };
    let width = text
        .chars()
        .skip(column.saturating_sub(1))
        .take_while(|c| !c.is_whitespace())
        .count();
    column + width.max(1)
}
