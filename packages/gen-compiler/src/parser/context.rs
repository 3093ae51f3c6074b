//! Pass 1: context scan
//!
//! Splits the token stream into lines, decodes the frontmatter block and
//! collects every position-tagged annotation into side tables before any
//! element is parsed:
//!
//! - key changes (measure -> key)
//! - chord annotations ((measure, element ordinal) -> chord)
//! - mod points (instrument group -> [(line, shift)])
//! - measure octave shifts and pickup measures
//! - the line -> measure map
//!
//! A line is a measure line when it has content other than whitespace,
//! comments and measure-level annotations. Lines holding only annotations
//! apply them to the next measure line.

use super::frontmatter::{parse_frontmatter, Entry};
use super::rhythm_from_text;
use crate::ast::{
    Accidental, ChordAnnotation, ChordAttachment, Duration, InstrumentGroup, KeySignature, Metadata,
    ModPoint, NoteName, Rhythm,
};
use crate::error::GenError;
use crate::lexer::{LocatedToken, Token};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Tokens of one source line, newline excluded
#[derive(Debug, Clone)]
pub(crate) struct SourceLine<'t> {
    pub number: usize,
    pub tokens: &'t [LocatedToken],
}

impl SourceLine<'_> {
    fn has_content(&self) -> bool {
        self.tokens
            .iter()
            .any(|t| !t.token.is_trivia() && !t.token.is_line_annotation())
    }

    fn is_frontmatter(&self) -> bool {
        self.tokens.iter().any(|t| {
            matches!(
                t.token,
                Token::FrontmatterDelimiter | Token::FrontmatterEntry { .. }
            )
        })
    }
}

/// Everything pass 2 needs besides the measure lines themselves
#[derive(Debug, Default)]
pub(crate) struct Context<'t> {
    pub metadata: Metadata,
    pub measure_lines: Vec<SourceLine<'t>>,
    pub key_changes: HashMap<usize, KeySignature>,
    pub chords: HashMap<(usize, usize), ChordAnnotation>,
    pub mod_points: HashMap<InstrumentGroup, Vec<ModPoint>>,
    pub measure_octaves: HashMap<usize, i8>,
    pub pickups: HashSet<usize>,
    pub line_to_measure: BTreeMap<usize, usize>,
}

fn split_lines(tokens: &[LocatedToken]) -> Vec<SourceLine<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut number = 1;
    for (i, t) in tokens.iter().enumerate() {
        if t.token == Token::Newline {
            lines.push(SourceLine {
                number,
                tokens: &tokens[start..i],
            });
            start = i + 1;
            number += 1;
        }
    }
    lines.push(SourceLine {
        number,
        tokens: &tokens[start..],
    });
    lines
}

pub(crate) fn scan(tokens: &[LocatedToken]) -> Result<Context<'_>, GenError> {
    let mut ctx = Context::default();
    let mut frontmatter_seen = false;
    let mut in_frontmatter = false;
    let mut entries = Vec::new();
    let mut block_line = 0;
    let mut pending: Vec<&LocatedToken> = Vec::new();

    for line in split_lines(tokens) {
        if line.is_frontmatter() || in_frontmatter {
            for t in line.tokens {
                match &t.token {
                    Token::FrontmatterDelimiter if in_frontmatter => in_frontmatter = false,
                    Token::FrontmatterDelimiter => {
                        if frontmatter_seen {
                            return Err(GenError::parse(
                                t.line,
                                t.column,
                                "Only one frontmatter block is allowed",
                            ));
                        }
                        frontmatter_seen = true;
                        in_frontmatter = true;
                        block_line = t.line;
                    }
                    Token::FrontmatterEntry { key, value } => entries.push(Entry {
                        key: key.clone(),
                        value: value.clone(),
                        line: t.line,
                        column: t.column,
                    }),
                    _ => {}
                }
            }
            continue;
        }

        if !line.has_content() {
            pending.extend(line.tokens.iter().filter(|t| t.token.is_line_annotation()));
            continue;
        }

        let measure = ctx.measure_lines.len();
        ctx.line_to_measure.insert(line.number, measure);

        let annotations: Vec<&LocatedToken> = pending
            .drain(..)
            .chain(line.tokens.iter().filter(|t| t.token.is_line_annotation()))
            .collect();
        for t in annotations {
            ctx.record_annotation(t, measure, line.number)?;
        }
        ctx.record_chords(&line, measure)?;
        ctx.measure_lines.push(line);
    }

    if !pending.is_empty() {
        log::warn!(
            "{} annotation(s) after the last measure have no measure to apply to",
            pending.len()
        );
    }

    if frontmatter_seen {
        ctx.metadata = parse_frontmatter(&entries, block_line)?;
    }

    Ok(ctx)
}

impl Context<'_> {
    fn record_annotation(
        &mut self,
        t: &LocatedToken,
        measure: usize,
        line: usize,
    ) -> Result<(), GenError> {
        match &t.token {
            Token::KeyChange(name) => {
                let key = KeySignature::from_name(name).ok_or_else(|| {
                    GenError::parse(t.line, t.column, format!("Unknown key '{}' in '@key:'", name))
                })?;
                self.key_changes.insert(measure, key);
            }
            Token::ModPoint { group, shift } => {
                let points = self.mod_points.entry(*group).or_default();
                points.retain(|p| p.line != line);
                points.push(ModPoint {
                    line,
                    shift: *shift,
                });
            }
            Token::MeasureOctave(shift) => {
                self.measure_octaves.insert(measure, *shift);
            }
            Token::Pickup => {
                self.pickups.insert(measure);
            }
            _ => {}
        }
        Ok(())
    }

    /// Anchor each chord annotation to the ordinal of the next note or rest
    fn record_chords(&mut self, line: &SourceLine<'_>, measure: usize) -> Result<(), GenError> {
        let mut ordinal = 0;
        for (i, t) in line.tokens.iter().enumerate() {
            match &t.token {
                Token::Note(_) | Token::Rest => ordinal += 1,
                Token::Chord {
                    symbol,
                    attached,
                    rhythm,
                } => {
                    let followed = line.tokens[i + 1..]
                        .iter()
                        .any(|n| matches!(n.token, Token::Note(_) | Token::Rest));
                    if !followed {
                        return Err(GenError::parse(
                            t.line,
                            t.column,
                            "Chord annotation must be followed by a note or rest in the same measure",
                        ));
                    }
                    let attachment = if *attached {
                        ChordAttachment::Attached
                    } else {
                        let (duration, dotted) = if rhythm.is_empty() {
                            (Duration::Whole, false)
                        } else {
                            rhythm_from_text(rhythm)
                                .map_err(|m| GenError::parse(t.line, t.column, m))?
                        };
                        ChordAttachment::Standalone(Rhythm::new(duration, dotted))
                    };
                    let chord = parse_chord_symbol(symbol, attachment)
                        .ok_or_else(|| {
                            GenError::parse(
                                t.line,
                                t.column,
                                format!("Invalid chord symbol '{}'", symbol),
                            )
                        })?;
                    if self.chords.insert((measure, ordinal), chord).is_some() {
                        return Err(GenError::parse(
                            t.line,
                            t.column,
                            "Only one chord annotation may precede an element",
                        ));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn accidental_from_char(c: Option<char>) -> Option<Accidental> {
    match c {
        Some('#') => Some(Accidental::Sharp),
        Some('b') => Some(Accidental::Flat),
        _ => None,
    }
}

/// Split `Dm7/F` into root, quality text and slash bass
pub(crate) fn parse_chord_symbol(symbol: &str, attachment: ChordAttachment) -> Option<ChordAnnotation> {
    let mut chars = symbol.chars();
    let root = NoteName::from_char(chars.next()?)?;
    let rest = chars.as_str();
    let root_accidental = accidental_from_char(rest.chars().next());
    let rest = if root_accidental.is_some() { &rest[1..] } else { rest };

    // A trailing "/X", "/X#" or "/Xb" is a bass note; "6/9" is not
    let mut quality = rest;
    let mut bass = None;
    if let Some((head, tail)) = rest.rsplit_once('/') {
        let mut tail_chars = tail.chars();
        if let Some(name) = tail_chars.next().and_then(NoteName::from_char) {
            let acc_text = tail_chars.as_str();
            let acc = accidental_from_char(acc_text.chars().next());
            if acc_text.is_empty() || (acc.is_some() && acc_text.len() == 1) {
                bass = Some((name, acc));
                quality = head;
            }
        }
    }

    Some(ChordAnnotation {
        root,
        root_accidental,
        quality: quality.to_string(),
        bass,
        attachment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    #[test]
    fn test_chord_symbol_parts() {
        let c = parse_chord_symbol("F#m7b5/C", ChordAttachment::Attached).unwrap();
        assert_eq!(c.root, NoteName::F);
        assert_eq!(c.root_accidental, Some(Accidental::Sharp));
        assert_eq!(c.quality, "m7b5");
        assert_eq!(c.bass, Some((NoteName::C, None)));

        let c = parse_chord_symbol("C6/9", ChordAttachment::Attached).unwrap();
        assert_eq!(c.quality, "6/9");
        assert_eq!(c.bass, None);

        let c = parse_chord_symbol("Bbmaj7/Eb", ChordAttachment::Attached).unwrap();
        assert_eq!(c.root_accidental, Some(Accidental::Flat));
        assert_eq!(c.bass, Some((NoteName::E, Some(Accidental::Flat))));

        assert!(parse_chord_symbol("X7", ChordAttachment::Attached).is_none());
    }

    #[test]
    fn test_annotation_only_line_applies_to_next_measure() {
        let tokens = tokenize("C C C C\n@key:G @Bb:^\nD D D D").unwrap();
        let ctx = scan(&tokens).unwrap();
        assert_eq!(ctx.measure_lines.len(), 2);
        assert_eq!(ctx.key_changes.get(&1), Some(&KeySignature::major(1)));
        assert_eq!(
            ctx.mod_points.get(&InstrumentGroup::Bb),
            Some(&vec![ModPoint { line: 3, shift: 1 }])
        );
        assert_eq!(ctx.line_to_measure.get(&3), Some(&1));
        assert_eq!(ctx.line_to_measure.get(&2), None);
    }

    #[test]
    fn test_chords_keyed_by_element_ordinal() {
        let tokens = tokenize("C @ch:G7 D @ch:C:E F").unwrap();
        let ctx = scan(&tokens).unwrap();
        let g7 = ctx.chords.get(&(0, 1)).unwrap();
        assert_eq!(g7.quality, "7");
        assert_eq!(g7.attachment, ChordAttachment::Standalone(Rhythm::new(Duration::Whole, false)));
        assert_eq!(ctx.chords.get(&(0, 2)).unwrap().attachment, ChordAttachment::Attached);
    }

    #[test]
    fn test_dangling_chord_is_parse_error() {
        let tokens = tokenize("C D E F @ch:G7").unwrap();
        assert!(matches!(scan(&tokens), Err(GenError::ParseError { .. })));
    }

    #[test]
    fn test_frontmatter_at_bottom() {
        let tokens = tokenize("C D E F\n---\ntime-signature: 3/4\n---\n").unwrap();
        let ctx = scan(&tokens).unwrap();
        assert_eq!(ctx.metadata.time_signature.beats, 3);
        assert_eq!(ctx.measure_lines.len(), 1);
    }

    #[test]
    fn test_second_frontmatter_block_rejected() {
        let tokens = tokenize("---\ntitle: a\n---\nC\n---\ntitle: b\n---").unwrap();
        assert!(matches!(scan(&tokens), Err(GenError::ParseError { line: 5, .. })));
    }

    #[test]
    fn test_measure_octave_and_pickup() {
        let tokens = tokenize("@pickup G\nA B C D @:^").unwrap();
        let ctx = scan(&tokens).unwrap();
        assert!(ctx.pickups.contains(&0));
        assert_eq!(ctx.measure_octaves.get(&1), Some(&1));
    }
}
