//! # Lexer
//!
//! Turns Gen source text into [`LocatedToken`]s carrying 1-based line and
//! column. The lexer is context-free except for frontmatter: lines between two
//! `---` delimiters are lexed as `key: value` entries.
//!
//! Annotations (`@key:`, `@ch:`, `@Bb:`, `@:`, `@pickup`) are lexed into single
//! tokens with their raw payload; the parser interprets the payload.

use crate::ast::{InstrumentGroup, NoteName};
use crate::error::GenError;

/// Token types for the Gen language
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Rhythm modifiers
    Slash,    // / (eighth; repeat for shorter values)
    SmallP,   // p (half note)
    SmallO,   // o (whole note)
    Asterisk, // * (dotted)

    Note(NoteName),
    Rest, // $

    // Pitch modifiers
    Sharp,      // #
    Flat,       // b
    Natural,    // %
    Caret,      // ^
    Underscore, // _

    // Grouping
    LeftBracket,  // [
    RightBracket, // ]
    Number(u32),  // tuplet count after ]

    Hyphen,     // - (tie)
    LeftParen,  // (
    RightParen, // )

    RepeatStart,  // ||:
    RepeatEnd,    // :||
    FirstEnding,  // 1.
    SecondEnding, // 2.

    // Annotations
    KeyChange(String), // @key:G
    Chord {
        symbol: String,
        attached: bool,
        /// Raw rhythm text of a standalone chord (`@ch:Am:p`), empty for the default
        rhythm: String,
    },
    ModPoint {
        group: InstrumentGroup,
        shift: i8,
    }, // @Bb:^
    MeasureOctave(i8), // @:^
    Pickup,            // @pickup

    Comment, // ; to end of line
    Newline,
    Whitespace,

    // Frontmatter
    FrontmatterDelimiter, // ---
    FrontmatterEntry { key: String, value: String },
}

impl Token {
    /// Tokens that carry no musical content on their own
    pub fn is_trivia(&self) -> bool {
        matches!(self, Token::Whitespace | Token::Comment)
    }

    /// Annotations that apply to the whole measure rather than a position
    pub fn is_line_annotation(&self) -> bool {
        matches!(
            self,
            Token::KeyChange(_) | Token::ModPoint { .. } | Token::MeasureOctave(_) | Token::Pickup
        )
    }
}

/// A token with its position in the source
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedToken {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

/// Lexer for tokenizing Gen source code
pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
            position: 0,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.position += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.position..]
    }

    /// Rest of the current line, without the newline
    fn rest_of_line(&self) -> &'a str {
        let rest = self.remaining();
        rest.split('\n').next().unwrap_or("")
    }

    fn advance_by(&mut self, chars: usize) {
        for _ in 0..chars {
            self.advance();
        }
    }

    fn at_line_start(&self) -> bool {
        self.column == 1
    }

    fn at_boundary(&mut self) -> bool {
        matches!(self.peek(), None | Some(' ') | Some('\t') | Some('\r') | Some('\n') | Some(';'))
    }

    fn is_delimiter_line(&self) -> bool {
        self.at_line_start() && self.rest_of_line().trim_end() == "---"
    }

    pub fn tokenize(&mut self) -> Result<Vec<LocatedToken>, GenError> {
        let mut tokens = Vec::new();
        let mut frontmatter_open: Option<usize> = None;

        while let Some(&c) = self.peek() {
            let line = self.line;
            let column = self.column;
            let push = |tokens: &mut Vec<LocatedToken>, token| {
                tokens.push(LocatedToken {
                    token,
                    line,
                    column,
                })
            };

            if self.is_delimiter_line() {
                let len = self.rest_of_line().chars().count();
                self.advance_by(len);
                frontmatter_open = match frontmatter_open {
                    Some(_) => None,
                    None => Some(line),
                };
                push(&mut tokens, Token::FrontmatterDelimiter);
                continue;
            }

            if frontmatter_open.is_some() {
                if c == '\n' {
                    self.advance();
                    push(&mut tokens, Token::Newline);
                } else if let Some(token) = self.frontmatter_line()? {
                    tokens.push(token);
                }
                continue;
            }

            match c {
                '\n' => {
                    self.advance();
                    push(&mut tokens, Token::Newline);
                }
                ' ' | '\t' | '\r' => {
                    while matches!(self.peek(), Some(' ') | Some('\t') | Some('\r')) {
                        self.advance();
                    }
                    push(&mut tokens, Token::Whitespace);
                }
                ';' => {
                    let len = self.rest_of_line().chars().count();
                    self.advance_by(len);
                    push(&mut tokens, Token::Comment);
                }
                '@' => {
                    let token = self.annotation()?;
                    push(&mut tokens, token);
                }
                '|' => {
                    if !self.remaining().starts_with("||:") {
                        return Err(GenError::lex(line, column, "Expected '||:' for repeat start"));
                    }
                    self.advance_by(3);
                    push(&mut tokens, Token::RepeatStart);
                }
                ':' => {
                    if !self.remaining().starts_with(":||") {
                        return Err(GenError::lex(line, column, "Expected ':||' for repeat end"));
                    }
                    self.advance_by(3);
                    push(&mut tokens, Token::RepeatEnd);
                }
                '0'..='9' => {
                    let token = self.number_or_ending()?;
                    push(&mut tokens, token);
                }
                _ => {
                    let token = match c {
                        '/' => Token::Slash,
                        'p' => Token::SmallP,
                        'o' => Token::SmallO,
                        '*' => Token::Asterisk,
                        '$' => Token::Rest,
                        '#' => Token::Sharp,
                        'b' => Token::Flat,
                        '%' => Token::Natural,
                        '^' => Token::Caret,
                        '_' => Token::Underscore,
                        '[' => Token::LeftBracket,
                        ']' => Token::RightBracket,
                        '-' => Token::Hyphen,
                        '(' => Token::LeftParen,
                        ')' => Token::RightParen,
                        _ => match NoteName::from_char(c) {
                            Some(name) => Token::Note(name),
                            None => {
                                return Err(GenError::lex(
                                    line,
                                    column,
                                    format!("Unexpected character '{}'", c),
                                ))
                            }
                        },
                    };
                    self.advance();
                    push(&mut tokens, token);
                }
            }
        }

        if let Some(open_line) = frontmatter_open {
            return Err(GenError::lex(open_line, 1, "Unclosed frontmatter block"));
        }

        Ok(tokens)
    }

    /// Lex one frontmatter line (without its newline)
    fn frontmatter_line(&mut self) -> Result<Option<LocatedToken>, GenError> {
        let text = self.rest_of_line();
        let indent = text.len() - text.trim_start().len();
        let line = self.line;
        let column = self.column + text[..indent].chars().count();
        self.advance_by(text.chars().count());

        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Ok(None);
        }

        let entry = trimmed.split_once(':').and_then(|(key, value)| {
            let key = key.trim();
            let valid_key = !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            valid_key.then(|| (key.to_string(), value.trim().to_string()))
        });

        match entry {
            Some((key, value)) => Ok(Some(LocatedToken {
                token: Token::FrontmatterEntry { key, value },
                line,
                column,
            })),
            None => Err(GenError::lex(
                line,
                column,
                format!("Expected 'key: value' in frontmatter, found '{}'", trimmed),
            )),
        }
    }

    fn number_or_ending(&mut self) -> Result<Token, GenError> {
        let (line, column) = (self.line, self.column);
        let digits: String = self
            .remaining()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        self.advance_by(digits.len());

        if let Some('.') = self.peek() {
            self.advance();
            return match digits.as_str() {
                "1" => Ok(Token::FirstEnding),
                "2" => Ok(Token::SecondEnding),
                _ => Err(GenError::lex(
                    line,
                    column,
                    format!("Unsupported ending '{}.'; only 1. and 2. exist", digits),
                )),
            };
        }

        digits
            .parse::<u32>()
            .map(Token::Number)
            .map_err(|_| GenError::lex(line, column, format!("Number '{}' is too large", digits)))
    }

    /// Consume a run of `^` or `_` and return the signed count
    fn octave_run(&mut self) -> Option<i8> {
        let mut shift: i8 = 0;
        match self.peek() {
            Some('^') => {
                while let Some('^') = self.peek() {
                    self.advance();
                    shift = shift.saturating_add(1);
                }
            }
            Some('_') => {
                while let Some('_') = self.peek() {
                    self.advance();
                    shift = shift.saturating_sub(1);
                }
            }
            _ => return None,
        }
        Some(shift)
    }

    fn annotation(&mut self) -> Result<Token, GenError> {
        let (line, column) = (self.line, self.column);
        self.advance(); // @

        let rest = self.remaining();
        if rest.starts_with("key:") {
            self.advance_by(4);
            let value: String = self
                .remaining()
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '#')
                .collect();
            if value.is_empty() {
                return Err(GenError::lex(line, column, "Missing key after '@key:'"));
            }
            self.advance_by(value.chars().count());
            return Ok(Token::KeyChange(value));
        }

        if rest.starts_with("ch:") {
            self.advance_by(3);
            return self.chord_annotation(line, column);
        }

        if rest.starts_with("pickup") {
            self.advance_by(6);
            if !self.at_boundary() {
                return Err(GenError::lex(line, column, "Unknown annotation after '@pickup'"));
            }
            return Ok(Token::Pickup);
        }

        if rest.starts_with(':') {
            self.advance();
            return self
                .octave_run()
                .map(Token::MeasureOctave)
                .ok_or_else(|| GenError::lex(line, column, "Expected '^' or '_' after '@:'"));
        }

        let name: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        let Some(group) = InstrumentGroup::from_name(&name) else {
            return Err(GenError::lex(
                line,
                column,
                format!("Unknown annotation '@{}'", name),
            ));
        };
        self.advance_by(name.chars().count());
        if self.peek() != Some(&':') {
            return Err(GenError::lex(
                line,
                column,
                format!("Expected ':' after '@{}'", name),
            ));
        }
        self.advance();
        let shift = self.octave_run().ok_or_else(|| {
            GenError::lex(line, column, format!("Expected '^' or '_' after '@{}:'", name))
        })?;
        Ok(Token::ModPoint { group, shift })
    }

    /// `@ch:SYMBOL` (standalone), `@ch:SYMBOL:RHYTHM` (standalone with rhythm)
    /// or `@ch:SYMBOL:` directly followed by an element (attached)
    fn chord_annotation(&mut self, line: usize, column: usize) -> Result<Token, GenError> {
        let symbol: String = self
            .remaining()
            .chars()
            .take_while(|c| !c.is_whitespace() && *c != ':' && *c != ';')
            .collect();
        if symbol.is_empty() {
            return Err(GenError::lex(line, column, "Missing chord symbol after '@ch:'"));
        }
        self.advance_by(symbol.chars().count());

        if self.peek() != Some(&':') {
            return Ok(Token::Chord {
                symbol,
                attached: false,
                rhythm: String::new(),
            });
        }
        self.advance();

        let rhythm: String = self
            .remaining()
            .chars()
            .take_while(|c| matches!(c, '/' | 'p' | 'o' | '*'))
            .collect();
        self.advance_by(rhythm.chars().count());

        match (rhythm.is_empty(), self.at_boundary()) {
            (true, false) => Ok(Token::Chord {
                symbol,
                attached: true,
                rhythm,
            }),
            (false, true) => Ok(Token::Chord {
                symbol,
                attached: false,
                rhythm,
            }),
            (true, true) => Err(GenError::lex(
                line,
                column,
                "Attached chord must be directly followed by a note or rest",
            )),
            (false, false) => Err(GenError::lex(
                line,
                column,
                "Unexpected text after chord rhythm",
            )),
        }
    }
}

/// Tokenize a whole source string
pub fn tokenize(source: &str) -> Result<Vec<LocatedToken>, GenError> {
    Lexer::new(source).tokenize()
}
