//! # Gen Compiler
//!
//! Compiles Gen, a plain-text music notation language, into MusicXML for
//! score renderers and into timed MIDI events for playback.
//!
//! ## Pipeline
//! 1. [`lexer`] - source text to located tokens
//! 2. [`parser`] - tokens to a [`Document`] (frontmatter, annotations, measures)
//! 3. [`semantic`] - measure durations, repeats and endings (strict mode only)
//! 4. [`musicxml`] / [`playback`] - render with [`RenderOptions`]
//!
//! ```rust
//! use gen_core::{compile, generate_playback_data, RenderOptions};
//!
//! let source = "---\ntitle: Scale\n---\nC D E F\nG A B C^";
//! let xml = compile(source)?;
//! assert!(xml.contains("<work-title>Scale</work-title>"));
//!
//! let playback = generate_playback_data(source, &RenderOptions::default())?;
//! assert_eq!(playback.notes.len(), 8);
//! # Ok::<(), gen_core::GenError>(())
//! ```

pub mod api;
pub mod ast;
pub mod chord;
pub mod error;
pub mod lexer;
pub mod musicxml;
pub mod parser;
pub mod playback;
pub mod semantic;
pub mod transpose;

pub use api::{
    compile, compile_unchecked, compile_with_options, generate_playback_data, lint, Clef,
    CompileError, Diagnostic, RenderOptions, Severity,
};
pub use ast::*;
pub use error::GenError;
pub use musicxml::to_musicxml;
pub use parser::parse;
pub use playback::{playback_data, PlaybackChord, PlaybackData, PlaybackNote};
pub use semantic::validate;
pub use transpose::{Interval, SpelledPitch, Transposition};
