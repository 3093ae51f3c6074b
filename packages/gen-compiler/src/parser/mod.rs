//! # Parser Module
//!
//! Parses Gen source into a [`Document`].
//!
//! ## Two-Pass Design
//! 1. **Context scan** (`context`): splits tokens into lines, decodes the
//!    frontmatter and records annotations (key changes, chords, mod points,
//!    measure octaves, pickups) in side tables keyed by measure.
//! 2. **Measure parsing** (this module): one measure per measure line,
//!    consuming the side tables by index.
//!
//! ## Grammar (per measure line)
//! ```text
//! line     := ending? '||:'? item* ':||'?
//! item     := element | group | '(' | ')' | '-'
//! element  := octave? (letter accidental? | '$') suffix*
//! group    := rhythm? octave? '[' item* ']' octave? number? rhythm?
//! suffix   := rhythm | octave
//! rhythm   := '/'{1,3} | 'p' | 'o' | '*'
//! octave   := '^'+ | '_'+
//! ```
//!
//! A group's rhythm applies to members without their own rhythm. A group
//! with a tuplet number `N` spans its rhythm (default quarter) and its
//! unmarked members are written as span / normal-notes: `[C D E]3` is three
//! triplet eighths filling one quarter.
//!
//! Ties bind the note before `-` to the next note. A tie between different
//! pitches is recorded as a slur.
//!
//! ## Related Modules
//! - `lexer` - produces the tokens
//! - `ast` - the types built here
//! - `semantic` - validates the result

mod context;
mod frontmatter;

use crate::ast::{
    absolute_octave, Accidental, Document, Duration, Element, ElementKind, Ending, EndingMarker,
    KeySignature, Measure, Note, NoteName, Rhythm, TupletInfo,
};
use crate::error::GenError;
use crate::lexer::{tokenize, LocatedToken, Token};
use context::{Context, SourceLine};
pub(crate) use context::parse_chord_symbol;

/// Parse Gen source into a document
///
/// ```
/// use gen_core::parse;
///
/// let doc = parse("C D E F\nG A B C^").unwrap();
/// assert_eq!(doc.measures.len(), 2);
/// ```
pub fn parse(source: &str) -> Result<Document, GenError> {
    let tokens = tokenize(source)?;
    let context = context::scan(&tokens)?;
    let document = Parser::new(context).parse_document()?;
    log::debug!(
        "parsed {} measure(s), {} mod point group(s)",
        document.measures.len(),
        document.mod_points.len()
    );
    Ok(document)
}

/// Counts of each rhythm modifier seen on one element or group
#[derive(Debug, Default, Clone, Copy)]
struct RhythmMods {
    slashes: usize,
    halves: usize,
    wholes: usize,
    dots: usize,
}

impl RhythmMods {
    fn is_empty(&self) -> bool {
        self.slashes + self.halves + self.wholes + self.dots == 0
    }

    /// Record a rhythm token; false if the token is not one
    fn add(&mut self, token: &Token) -> bool {
        match token {
            Token::Slash => self.slashes += 1,
            Token::SmallP => self.halves += 1,
            Token::SmallO => self.wholes += 1,
            Token::Asterisk => self.dots += 1,
            _ => return false,
        }
        true
    }

    fn resolve(&self) -> Result<(Duration, bool), String> {
        let kinds = [self.slashes, self.halves, self.wholes]
            .iter()
            .filter(|&&n| n > 0)
            .count();
        if kinds > 1 || self.halves > 1 || self.wholes > 1 {
            return Err("Conflicting rhythm modifiers".to_string());
        }
        if self.dots > 1 {
            return Err("Double-dotted rhythms are not supported".to_string());
        }
        let duration = if self.slashes > 0 {
            Duration::from_slashes(self.slashes).ok_or_else(|| {
                "Rhythms shorter than a thirty-second note are not supported".to_string()
            })?
        } else if self.halves > 0 {
            Duration::Half
        } else if self.wholes > 0 {
            Duration::Whole
        } else {
            Duration::Quarter
        };
        Ok((duration, self.dots == 1))
    }
}

/// Parse rhythm text such as `p*` or `//` (empty text is a quarter note)
pub(crate) fn rhythm_from_text(text: &str) -> Result<(Duration, bool), String> {
    let mut mods = RhythmMods::default();
    for c in text.chars() {
        let token = match c {
            '/' => Token::Slash,
            'p' => Token::SmallP,
            'o' => Token::SmallO,
            '*' => Token::Asterisk,
            other => return Err(format!("Unexpected '{}' in rhythm '{}'", other, text)),
        };
        mods.add(&token);
    }
    mods.resolve()
}

/// Position of an element: (measure index, element index)
type ElementRef = (usize, usize);

struct PendingTie {
    from: ElementRef,
    line: usize,
    column: usize,
    in_slur: bool,
}

struct Tie {
    from: ElementRef,
    to: ElementRef,
    in_slur: bool,
}

struct OpenSlur {
    line: usize,
    column: usize,
    first: Option<ElementRef>,
    last: Option<ElementRef>,
    notes: usize,
}

/// Tokens of one measure line with a read position
struct Cursor<'a> {
    tokens: &'a [&'a LocatedToken],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a LocatedToken> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<&'a LocatedToken> {
        let t = self.peek();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    /// Whether the octave run at the cursor is immediately followed by the
    /// start of another element, making it that element's prefix
    fn octave_run_is_prefix(&self) -> bool {
        self.tokens[self.pos..]
            .iter()
            .find(|t| !matches!(t.token, Token::Caret | Token::Underscore))
            .is_some_and(|t| {
                matches!(t.token, Token::Note(_) | Token::Rest | Token::LeftBracket)
            })
    }
}

fn error_at(t: &LocatedToken, message: impl Into<String>) -> GenError {
    GenError::parse(t.line, t.column, message)
}

struct Parser<'t> {
    ctx: Context<'t>,
    measures: Vec<Measure>,
    /// Per element of the current measure: rhythm fixed by the element or an inner group
    explicit_rhythm: Vec<bool>,
    explicit_endings: Vec<Option<(Ending, usize, usize)>>,
    last_element: Option<(ElementRef, bool)>,
    pending_tie: Option<PendingTie>,
    ties: Vec<Tie>,
    slur: Option<OpenSlur>,
}

impl<'t> Parser<'t> {
    fn new(ctx: Context<'t>) -> Self {
        Self {
            ctx,
            measures: Vec::new(),
            explicit_rhythm: Vec::new(),
            explicit_endings: Vec::new(),
            last_element: None,
            pending_tie: None,
            ties: Vec::new(),
            slur: None,
        }
    }

    fn parse_document(mut self) -> Result<Document, GenError> {
        let lines = std::mem::take(&mut self.ctx.measure_lines);
        for line in &lines {
            self.parse_line(line)?;
        }

        if let Some(slur) = &self.slur {
            return Err(GenError::parse(slur.line, slur.column, "Unclosed '('"));
        }
        if let Some(tie) = &self.pending_tie {
            return Err(GenError::parse(
                tie.line,
                tie.column,
                "Tie must be followed by a note",
            ));
        }

        self.resolve_ties();
        self.resolve_endings()?;

        let metadata = std::mem::take(&mut self.ctx.metadata);
        Ok(Document {
            metadata,
            measures: self.measures,
            mod_points: self.ctx.mod_points,
            line_to_measure: self.ctx.line_to_measure,
        })
    }

    fn current_measure(&self) -> usize {
        self.measures.len() - 1
    }

    fn parse_line(&mut self, line: &SourceLine<'t>) -> Result<(), GenError> {
        let index = self.measures.len();
        self.measures.push(Measure {
            line: line.number,
            key_change: self.ctx.key_changes.get(&index).copied(),
            octave_shift: self.ctx.measure_octaves.get(&index).copied().unwrap_or(0),
            pickup: self.ctx.pickups.contains(&index),
            ..Default::default()
        });
        self.explicit_rhythm.clear();

        // Comments, chords and measure annotations were consumed by the context scan
        let tokens: Vec<&LocatedToken> = line
            .tokens
            .iter()
            .filter(|t| {
                !matches!(t.token, Token::Comment | Token::Chord { .. })
                    && !t.token.is_line_annotation()
            })
            .collect();
        let significant: Vec<usize> = (0..tokens.len())
            .filter(|&i| tokens[i].token != Token::Whitespace)
            .collect();

        let mut start = 0;
        let mut end = tokens.len();
        let mut explicit_ending = None;

        if let Some(&i) = significant.first() {
            let ending = match tokens[i].token {
                Token::FirstEnding => Some(Ending::First),
                Token::SecondEnding => Some(Ending::Second),
                _ => None,
            };
            if let Some(ending) = ending {
                explicit_ending = Some((ending, tokens[i].line, tokens[i].column));
                start = i + 1;
            }
        }
        self.explicit_endings.push(explicit_ending);

        if let Some(&i) = significant.iter().find(|&&i| i >= start) {
            if tokens[i].token == Token::RepeatStart {
                self.measures[index].repeat_start = true;
                start = i + 1;
            }
        }

        if let Some(&i) = significant.last() {
            if i >= start && tokens[i].token == Token::RepeatEnd {
                self.measures[index].repeat_end = true;
                end = i;
            }
        }

        let mut cursor = Cursor {
            tokens: &tokens[start..end],
            pos: 0,
        };
        while let Some(t) = cursor.peek() {
            if t.token == Token::RightBracket {
                return Err(error_at(t, "Unmatched ']'"));
            }
            self.parse_item(&mut cursor)?;
        }
        Ok(())
    }

    fn parse_item(&mut self, cursor: &mut Cursor<'_>) -> Result<(), GenError> {
        let Some(t) = cursor.peek() else {
            return Ok(());
        };
        match &t.token {
            Token::Whitespace => {
                cursor.advance();
                Ok(())
            }
            Token::LeftParen => {
                cursor.advance();
                self.open_slur(t)
            }
            Token::RightParen => {
                cursor.advance();
                self.close_slur(t)
            }
            Token::Hyphen => {
                cursor.advance();
                self.start_tie(t)
            }
            Token::RepeatStart => Err(error_at(
                t,
                "Repeat start '||:' must be the first token of its measure",
            )),
            Token::RepeatEnd => Err(error_at(
                t,
                "Repeat end ':||' must be the last token of its measure",
            )),
            Token::FirstEnding | Token::SecondEnding => {
                Err(error_at(t, "Ending markers must start the line"))
            }
            Token::Number(_) => Err(error_at(t, "Tuplet number must directly follow ']'")),
            Token::Sharp | Token::Flat | Token::Natural => {
                Err(error_at(t, "Accidental must directly follow a note letter"))
            }
            Token::RightBracket => Err(error_at(t, "Unmatched ']'")),
            _ => self.parse_element_or_group(cursor),
        }
    }

    /// Consume a run of `^` or `_`
    fn octave_run(&self, cursor: &mut Cursor<'_>) -> Result<Option<i8>, GenError> {
        let mut shift: Option<i8> = None;
        while let Some(t) = cursor.peek() {
            let step = match t.token {
                Token::Caret => 1,
                Token::Underscore => -1,
                _ => break,
            };
            let current = shift.unwrap_or(0);
            if current != 0 && current.signum() != step {
                return Err(error_at(t, "Mixed '^' and '_' in one octave modifier"));
            }
            shift = Some(current.saturating_add(step));
            cursor.advance();
        }
        Ok(shift)
    }

    fn parse_element_or_group(&mut self, cursor: &mut Cursor<'_>) -> Result<(), GenError> {
        let Some(first) = cursor.peek() else {
            return Ok(());
        };

        let mut prefix_rhythm = RhythmMods::default();
        while let Some(t) = cursor.peek() {
            if !prefix_rhythm.add(&t.token) {
                break;
            }
            cursor.advance();
        }
        let prefix_octave = self.octave_run(cursor)?;

        match cursor.peek().map(|t| &t.token) {
            Some(Token::LeftBracket) => self.parse_group(cursor, prefix_rhythm, prefix_octave),
            Some(Token::Note(_)) | Some(Token::Rest) if prefix_rhythm.is_empty() => {
                self.parse_element(cursor, prefix_octave)
            }
            Some(Token::Note(_)) | Some(Token::Rest) => Err(error_at(
                first,
                "Rhythm modifiers follow the note (write 'C/' rather than '/C')",
            )),
            _ if !prefix_rhythm.is_empty() => Err(error_at(
                first,
                "Rhythm modifier must follow a note, rest or group",
            )),
            _ => Err(error_at(
                first,
                "Octave modifier must be attached to a note or group",
            )),
        }
    }

    fn parse_element(
        &mut self,
        cursor: &mut Cursor<'_>,
        prefix_octave: Option<i8>,
    ) -> Result<(), GenError> {
        let Some(t) = cursor.advance() else {
            return Ok(());
        };

        let mut note = match t.token {
            Token::Note(name) => Some(Note {
                name,
                ..Default::default()
            }),
            _ => None,
        };

        if let Some(note) = note.as_mut() {
            note.accidental = match cursor.peek().map(|a| &a.token) {
                Some(Token::Sharp) => Some(Accidental::Sharp),
                Some(Token::Flat) => Some(Accidental::Flat),
                Some(Token::Natural) => Some(Accidental::Natural),
                _ => None,
            };
            if note.accidental.is_some() {
                cursor.advance();
            }
        }

        let mut mods = RhythmMods::default();
        let mut suffix_octave = None;
        while let Some(next) = cursor.peek() {
            if mods.add(&next.token) {
                cursor.advance();
                continue;
            }
            match next.token {
                Token::Caret | Token::Underscore if !cursor.octave_run_is_prefix() => {
                    if suffix_octave.is_some() {
                        return Err(error_at(next, "Duplicate octave modifier"));
                    }
                    suffix_octave = self.octave_run(cursor)?;
                }
                _ => break,
            }
        }

        let octave = match (prefix_octave, suffix_octave) {
            (Some(_), Some(_)) => {
                return Err(error_at(t, "Octave given both before and after the note"))
            }
            (a, b) => a.or(b),
        };
        if note.is_none() && octave.is_some() {
            return Err(error_at(t, "Rests cannot take octave modifiers"));
        }

        let (duration, dotted) = mods.resolve().map_err(|m| error_at(t, m))?;
        let measure = self.current_measure();
        let ordinal = self.measures[measure].elements.len();
        let chord = self.ctx.chords.remove(&(measure, ordinal));

        let is_note = note.is_some();
        let kind = match note {
            Some(mut note) => {
                note.octave = octave.unwrap_or(0);
                ElementKind::Note(note)
            }
            None => ElementKind::Rest,
        };

        self.measures[measure].elements.push(Element {
            rhythm: Rhythm::new(duration, dotted),
            chord,
            kind,
        });
        self.explicit_rhythm.push(!mods.is_empty());
        self.element_created((measure, ordinal), is_note)
    }

    fn element_created(&mut self, at: ElementRef, is_note: bool) -> Result<(), GenError> {
        if is_note {
            if let Some(pending) = self.pending_tie.take() {
                self.ties.push(Tie {
                    from: pending.from,
                    to: at,
                    in_slur: pending.in_slur,
                });
            }
            if let Some(slur) = self.slur.as_mut() {
                slur.first.get_or_insert(at);
                slur.last = Some(at);
                slur.notes += 1;
            }
        } else if let Some(pending) = &self.pending_tie {
            return Err(GenError::parse(
                pending.line,
                pending.column,
                "Tie must be followed by a note",
            ));
        }
        self.last_element = Some((at, is_note));
        Ok(())
    }

    fn parse_group(
        &mut self,
        cursor: &mut Cursor<'_>,
        prefix_rhythm: RhythmMods,
        prefix_octave: Option<i8>,
    ) -> Result<(), GenError> {
        let Some(open) = cursor.advance() else {
            return Ok(());
        };
        let measure = self.current_measure();
        let first = self.measures[measure].elements.len();

        loop {
            match cursor.peek() {
                None => return Err(error_at(open, "Unmatched '['")),
                Some(t) if t.token == Token::RightBracket => {
                    cursor.advance();
                    break;
                }
                Some(_) => self.parse_item(cursor)?,
            }
        }

        let mut suffix_octave = None;
        let mut tuplet: Option<(u32, &LocatedToken)> = None;
        let mut mods = RhythmMods::default();
        while let Some(next) = cursor.peek() {
            if mods.add(&next.token) {
                cursor.advance();
                continue;
            }
            match next.token {
                Token::Caret | Token::Underscore if !cursor.octave_run_is_prefix() => {
                    if suffix_octave.is_some() {
                        return Err(error_at(next, "Duplicate octave modifier"));
                    }
                    suffix_octave = self.octave_run(cursor)?;
                }
                Token::Number(n) => {
                    if tuplet.is_some() || !mods.is_empty() {
                        return Err(error_at(next, "Tuplet number must directly follow ']'"));
                    }
                    tuplet = Some((n, next));
                    cursor.advance();
                }
                _ => break,
            }
        }

        let last = self.measures[measure].elements.len();
        if first == last {
            return Err(error_at(open, "Empty group"));
        }

        let octave = match (prefix_octave, suffix_octave) {
            (Some(_), Some(_)) => {
                return Err(error_at(open, "Octave given both before and after the group"))
            }
            (a, b) => a.or(b).unwrap_or(0),
        };
        if !prefix_rhythm.is_empty() && !mods.is_empty() {
            return Err(error_at(open, "Group rhythm given both before and after the group"));
        }
        let group_mods = if mods.is_empty() { prefix_rhythm } else { mods };

        for element in &mut self.measures[measure].elements[first..last] {
            if let ElementKind::Note(note) = &mut element.kind {
                note.group_octave = note.group_octave.saturating_add(octave);
            }
        }

        if let Some((count, number)) = tuplet {
            if !(2..=64).contains(&count) {
                return Err(error_at(number, "Tuplet count must be between 2 and 64"));
            }
            let members = &self.measures[measure].elements[first..last];
            if members.iter().any(|e| e.rhythm.tuplet.is_some()) {
                return Err(error_at(number, "Nested tuplets are not supported"));
            }

            let (span_duration, span_dotted) =
                group_mods.resolve().map_err(|m| error_at(open, m))?;
            let actual = count as u8;
            let normal = TupletInfo::normal_notes_for(actual);
            let span = Rhythm::new(span_duration, span_dotted).notated();
            let (duration, dotted) = Duration::from_fraction(span / normal as i64).ok_or_else(|| {
                error_at(
                    number,
                    format!(
                        "A {}-tuplet cannot evenly divide a {} note; give the group a rhythm",
                        count,
                        span_duration.musicxml_type()
                    ),
                )
            })?;

            for i in first..last {
                let element = &mut self.measures[measure].elements[i];
                if !self.explicit_rhythm[i] {
                    element.rhythm.duration = duration;
                    element.rhythm.dotted = dotted;
                }
                element.rhythm.tuplet = Some(TupletInfo {
                    actual_notes: actual,
                    normal_notes: normal,
                    is_start: i == first,
                    is_stop: i == last - 1,
                });
                self.explicit_rhythm[i] = true;
            }
        } else if !group_mods.is_empty() {
            let (duration, dotted) = group_mods.resolve().map_err(|m| error_at(open, m))?;
            for i in first..last {
                if !self.explicit_rhythm[i] {
                    let rhythm = &mut self.measures[measure].elements[i].rhythm;
                    rhythm.duration = duration;
                    rhythm.dotted = dotted;
                }
                self.explicit_rhythm[i] = true;
            }
        }

        Ok(())
    }

    fn open_slur(&mut self, t: &LocatedToken) -> Result<(), GenError> {
        if self.slur.is_some() {
            return Err(error_at(t, "Nested slurs are not supported"));
        }
        self.slur = Some(OpenSlur {
            line: t.line,
            column: t.column,
            first: None,
            last: None,
            notes: 0,
        });
        Ok(())
    }

    fn close_slur(&mut self, t: &LocatedToken) -> Result<(), GenError> {
        let Some(slur) = self.slur.take() else {
            return Err(error_at(t, "Unmatched ')'"));
        };
        let (Some(first), Some(last)) = (slur.first, slur.last) else {
            return Err(GenError::parse(slur.line, slur.column, "Empty slur"));
        };
        if slur.notes < 2 {
            return Err(GenError::parse(
                slur.line,
                slur.column,
                "A slur must span at least two notes",
            ));
        }
        if let Some(note) = self.note_mut(first) {
            note.slur_start = true;
        }
        if let Some(note) = self.note_mut(last) {
            note.slur_stop = true;
        }
        Ok(())
    }

    fn start_tie(&mut self, t: &LocatedToken) -> Result<(), GenError> {
        if self.pending_tie.is_some() {
            return Err(error_at(t, "Tie must be followed by a note"));
        }
        let Some((from, true)) = self.last_element else {
            return Err(error_at(t, "Tie must follow a note"));
        };
        self.pending_tie = Some(PendingTie {
            from,
            line: t.line,
            column: t.column,
            in_slur: self.slur.is_some(),
        });
        Ok(())
    }

    fn note_mut(&mut self, (m, e): ElementRef) -> Option<&mut Note> {
        match &mut self.measures.get_mut(m)?.elements.get_mut(e)?.kind {
            ElementKind::Note(note) => Some(note),
            ElementKind::Rest => None,
        }
    }

    /// Spelled pitch used to tell ties from slurs
    fn tie_pitch(&self, (m, e): ElementRef, keys: &[KeySignature]) -> Option<(NoteName, i8, i32)> {
        let measure = self.measures.get(m)?;
        let note = measure.elements.get(e)?.note()?;
        let alter = keys[m].resolve(note.name, note.accidental);
        Some((note.name, alter, absolute_octave(note, measure.octave_shift, 0)))
    }

    fn resolve_ties(&mut self) {
        let keys = {
            let mut current = self.ctx.metadata.key_signature;
            self.measures
                .iter()
                .map(|m| {
                    if let Some(key) = m.key_change {
                        current = key;
                    }
                    current
                })
                .collect::<Vec<_>>()
        };

        let ties = std::mem::take(&mut self.ties);
        for tie in ties {
            let same_pitch = self.tie_pitch(tie.from, &keys) == self.tie_pitch(tie.to, &keys);
            if same_pitch {
                if let Some(note) = self.note_mut(tie.from) {
                    note.tie_start = true;
                }
                if let Some(note) = self.note_mut(tie.to) {
                    note.tie_stop = true;
                }
            } else if !tie.in_slur {
                if let Some(note) = self.note_mut(tie.from) {
                    note.slur_start = true;
                }
                if let Some(note) = self.note_mut(tie.to) {
                    note.slur_stop = true;
                }
            }
        }
    }

    /// Turn explicit `1.`/`2.` markers into ending runs.
    ///
    /// A first ending runs from its marker through the measure carrying
    /// `:||`. A second ending must start on the very next measure, must not
    /// carry `:||`, and continues over consecutive `2.` measures.
    fn resolve_endings(&mut self) -> Result<(), GenError> {
        let count = self.measures.len();
        let mut i = 0;
        while i < count {
            match self.explicit_endings[i] {
                Some((Ending::First, line, column)) => {
                    let mut close = None;
                    for j in i..count {
                        if j > i {
                            if let Some((Ending::Second, l, c)) = self.explicit_endings[j] {
                                return Err(GenError::parse(
                                    l,
                                    c,
                                    "Second ending must follow a first ending closed with ':||'",
                                ));
                            }
                        }
                        if self.measures[j].repeat_end {
                            close = Some(j);
                            break;
                        }
                    }
                    let Some(close) = close else {
                        return Err(GenError::parse(
                            line,
                            column,
                            "First ending must end with ':||'",
                        ));
                    };
                    for j in i..=close {
                        self.measures[j].ending = Some(EndingMarker {
                            ending: Ending::First,
                            continues: j < close,
                        });
                    }

                    let mut k = close + 1;
                    while k < count {
                        let Some((Ending::Second, l, c)) = self.explicit_endings[k] else {
                            break;
                        };
                        if self.measures[k].repeat_end {
                            return Err(GenError::parse(
                                l,
                                c,
                                "Second ending must not end with ':||'",
                            ));
                        }
                        k += 1;
                    }
                    for j in close + 1..k {
                        self.measures[j].ending = Some(EndingMarker {
                            ending: Ending::Second,
                            continues: j + 1 < k,
                        });
                    }
                    i = k.max(close + 1);
                }
                Some((Ending::Second, line, column)) => {
                    return Err(GenError::parse(
                        line,
                        column,
                        "Second ending must follow a first ending closed with ':||'",
                    ));
                }
                None => i += 1,
            }
        }
        Ok(())
    }
}
