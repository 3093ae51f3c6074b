//! # Error Types
//!
//! Every stage of the compiler reports failures through [`GenError`].
//!
//! Lexical, structural and metadata errors carry the 1-based line and column of
//! the offending source text. Semantic errors carry the 1-based measure number;
//! [`crate::api::CompileError`] maps that back to a source line for editors.
//!
//! ## Usage
//! ```rust
//! use gen_core::{compile, GenError};
//!
//! match compile("C C C") {
//!     Ok(_) => unreachable!(),
//!     Err(GenError::SemanticError { measure, message }) => {
//!         assert_eq!(measure, 1);
//!         assert!(message.contains("expected 4 beats"));
//!     }
//!     Err(e) => panic!("unexpected error: {}", e),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenError {
    /// A character sequence that matches no token.
    ///
    /// ```
    /// # use gen_core::GenError;
    /// let err = GenError::lex(2, 5, "Unexpected character 'X'");
    /// assert_eq!(err.to_string(), "Lex error at line 2, column 5: Unexpected character 'X'");
    /// ```
    #[error("Lex error at line {line}, column {column}: {message}")]
    LexError {
        line: usize,
        column: usize,
        message: String,
    },

    /// A structurally invalid token sequence: unmatched brackets, misplaced
    /// modifiers, malformed repeats or endings.
    #[error("Parse error at line {line}, column {column}: {message}")]
    ParseError {
        line: usize,
        column: usize,
        message: String,
    },

    /// A malformed frontmatter value.
    #[error("Invalid metadata at line {line}, column {column}: {message}")]
    MetadataError {
        line: usize,
        column: usize,
        message: String,
    },

    /// A musically invalid document: wrong measure length, unmatched repeats,
    /// first ending without a second.
    ///
    /// ```
    /// # use gen_core::GenError;
    /// let err = GenError::SemanticError {
    ///     measure: 3,
    ///     message: "expected 4 beats, found 7/2 beats".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Semantic error at measure 3: expected 4 beats, found 7/2 beats");
    /// ```
    #[error("Semantic error at measure {measure}: {message}")]
    SemanticError { measure: usize, message: String },
}

impl GenError {
    pub fn lex(line: usize, column: usize, message: impl Into<String>) -> Self {
        GenError::LexError {
            line,
            column,
            message: message.into(),
        }
    }

    pub fn parse(line: usize, column: usize, message: impl Into<String>) -> Self {
        GenError::ParseError {
            line,
            column,
            message: message.into(),
        }
    }

    pub fn metadata(line: usize, column: usize, message: impl Into<String>) -> Self {
        GenError::MetadataError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Source position for errors that have one
    pub fn location(&self) -> Option<(usize, usize)> {
        match self {
            GenError::LexError { line, column, .. }
            | GenError::ParseError { line, column, .. }
            | GenError::MetadataError { line, column, .. } => Some((*line, *column)),
            GenError::SemanticError { .. } => None,
        }
    }

    /// The bare message, without the location prefix
    pub fn message(&self) -> &str {
        match self {
            GenError::LexError { message, .. }
            | GenError::ParseError { message, .. }
            | GenError::MetadataError { message, .. }
            | GenError::SemanticError { message, .. } => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_for_positioned_errors() {
        assert_eq!(GenError::parse(3, 7, "x").location(), Some((3, 7)));
        assert_eq!(GenError::metadata(2, 1, "x").location(), Some((2, 1)));
        let semantic = GenError::SemanticError {
            measure: 4,
            message: "x".to_string(),
        };
        assert_eq!(semantic.location(), None);
    }

    #[test]
    fn test_message_strips_prefix() {
        let err = GenError::parse(1, 1, "Unmatched '['");
        assert_eq!(err.message(), "Unmatched '['");
        assert_eq!(err.to_string(), "Parse error at line 1, column 1: Unmatched '['");
    }
}
