//! # Playback Module
//!
//! Generate MIDI playback data from Gen documents for audio playback and visual highlighting.
//!
//! ## Purpose
//! This module converts a parsed Gen document into MIDI playback data that can be used for:
//! 1. **Audio playback** - MIDI note numbers, timing, and duration for synthesizers
//! 2. **Visual highlighting** - Matching notes on the rendered sheet music during playback
//! 3. **Chord accompaniment** - Piano chords from `@ch:` annotations
//!
//! ## Sub-modules
//! - `types` - PlaybackData, PlaybackNote, PlaybackChord type definitions
//! - `engine` - Performance order, timing and tie merging
//! - `chord_parser` - Chord symbol voicing (C, Am, G7, Dm7/F, etc.)
//!
//! ## Key Types
//! - [`PlaybackData`] - Complete playback info (notes + chords + tempo)
//! - [`PlaybackNote`] - Single note with MIDI pitch, timing, and display matching info
//! - [`PlaybackChord`] - Chord accompaniment (multiple notes simultaneously)
//!
//! ## Entry Points
//! - [`generate_playback_data()`] - Gen source to playback data
//! - [`playback_data()`] - Parsed document to playback data
//!
//! ## Example
//! ```rust
//! use gen_core::playback::generate_playback_data;
//! use gen_core::RenderOptions;
//!
//! let source = r#"---
//! tempo: 120
//! ---
//! C D E F
//! "#;
//!
//! let data = generate_playback_data(source, &RenderOptions::default()).unwrap();
//!
//! assert_eq!(data.tempo, 120);
//! assert_eq!(data.notes.len(), 4);
//! assert_eq!(data.notes[0].concert_pitch_midi, 60); // C4
//! ```
//!
//! ## Dual-Timing System
//!
//! ### Playback Time
//! - Used for actual audio playback
//! - Exact fractions in tempo beats; tuplets use their true length
//! - Example: a quarter-note triplet member is 2/3 of a beat
//!
//! ### Display Time
//! - Used for matching rendered noteheads
//! - Quarter notes along the written score, from the MusicXML divisions
//! - Repeats are not expanded, so a repeated note keeps its written position
//!
//! ## MIDI Note System
//!
//! ### Concert Pitch (`concert_pitch_midi`)
//! - For audio playback
//! - Includes every octave layer and the score octave shift
//! - Unaffected by clef and transposition
//!
//! ### Display Pitch (`display_pitch_midi`)
//! - For matching visual notes
//! - Adds the clef offset and the written-pitch transposition
//! - Example: Bass clef C4 displays as 36; a Bb part's concert C4 displays as 62
//!
//! ## Related Modules
//! - `api` - RenderOptions and the shared pitch derivation
//! - `musicxml` - Parallel output format (MusicXML for rendering, playback for audio)

mod chord_parser;
mod engine;
mod types;

#[cfg(test)]
mod tests;

pub use crate::api::generate_playback_data;
pub use chord_parser::{parse_chord_symbol, voice_chord};
pub use engine::playback_data;
pub use types::{beats_to_f64, PlaybackChord, PlaybackData, PlaybackNote};
