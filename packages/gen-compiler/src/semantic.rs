//! # Semantic Validation Module
//!
//! This module validates the semantic correctness of a parsed Gen document.
//!
//! ## Purpose
//! After parsing, the document may be syntactically valid but musically
//! invalid. This module checks for logical errors:
//! - Measure durations that don't match the time signature
//! - Unclosed or nested repeat starts
//! - First endings without a second ending
//!
//! ## Validation Rules
//!
//! ### Measure Duration
//! - Each measure's total duration (sum of all note/rest durations) must equal the time signature
//! - Durations are exact fractions, so a triplet eighth is exactly 1/12 of a whole note
//! - Pickup measures (`@pickup`) may be shorter, never longer
//!
//! ### Repeat Markers
//! - `||:` (repeat start) must be closed by a later `:||` (repeat end)
//! - No second `||:` before the first one is closed
//! - A `:||` without a start repeats from the beginning and is accepted
//!
//! ### Endings
//! - A first ending run (`1.`) must be followed directly by a second ending run (`2.`)
//!
//! ## Entry Point
//! `validate(document: &Document) -> Result<(), GenError>`
//!
//! ## Example
//! ```rust
//! use gen_core::{parse, validate};
//!
//! let source = "C D E F";  // 4 quarter notes = 4 beats (valid in 4/4)
//! let document = parse(source)?;
//! validate(&document)?;
//! # Ok::<(), gen_core::GenError>(())
//! ```
//!
//! ## Related Modules
//! - `ast` - Defines Document and Measure types
//! - `error` - Returns GenError::SemanticError with 1-based measure numbers

use crate::ast::*;
use crate::error::GenError;
use num_rational::Rational64;

/// Validate a document for semantic correctness
///
/// Checks three rules and returns the violation at the earliest measure:
/// 1. Measure durations match the time signature
/// 2. Repeat starts are closed
/// 3. First endings are followed by second endings
///
/// When two rules fail on the same measure, the earlier rule wins.
pub fn validate(document: &Document) -> Result<(), GenError> {
    let time_signature = &document.metadata.time_signature;
    let durations = document
        .measures
        .iter()
        .enumerate()
        .try_for_each(|(i, measure)| validate_measure(measure, time_signature, i + 1));

    [durations, validate_repeats(document), validate_endings(document)]
        .into_iter()
        .filter_map(Result::err)
        .min_by_key(error_measure)
        .map_or(Ok(()), Err)
}

fn error_measure(error: &GenError) -> usize {
    match error {
        GenError::SemanticError { measure, .. } => *measure,
        _ => usize::MAX,
    }
}

/// Validate that repeat starts are properly closed
fn validate_repeats(document: &Document) -> Result<(), GenError> {
    let mut repeat_start_measure: Option<usize> = None;

    for (i, measure) in document.measures.iter().enumerate() {
        let measure_number = i + 1;

        if measure.repeat_start {
            if repeat_start_measure.is_some() {
                return Err(GenError::SemanticError {
                    measure: measure_number,
                    message: "Repeat start (||:) found without closing the previous repeat. Close the previous repeat with :|| first.".to_string(),
                });
            }
            repeat_start_measure = Some(measure_number);
        }

        if measure.repeat_end {
            repeat_start_measure = None;
        }
    }

    if let Some(start_measure) = repeat_start_measure {
        return Err(GenError::SemanticError {
            measure: start_measure,
            message: "Repeat start (||:) at this measure has no matching repeat end (:||)"
                .to_string(),
        });
    }

    Ok(())
}

/// Validate that every first ending run is followed by a second ending run
fn validate_endings(document: &Document) -> Result<(), GenError> {
    let measures = &document.measures;
    for (i, measure) in measures.iter().enumerate() {
        let Some(marker) = measure.ending else {
            continue;
        };
        if marker.ending != Ending::First || marker.continues {
            continue;
        }
        let next = measures.get(i + 1).and_then(|m| m.ending());
        if next != Some(Ending::Second) {
            let start = (0..=i)
                .rev()
                .take_while(|&j| measures[j].ending() == Some(Ending::First))
                .last()
                .unwrap_or(i);
            return Err(GenError::SemanticError {
                measure: start + 1,
                message: "First ending (1.) must be followed by a second ending (2.)".to_string(),
            });
        }
    }
    Ok(())
}

/// Validate a single measure's exact duration
fn validate_measure(
    measure: &Measure,
    time_signature: &TimeSignature,
    measure_number: usize,
) -> Result<(), GenError> {
    let total = measure.duration();
    let expected = time_signature.measure_length();

    let too_short = total < expected && !measure.pickup;
    if total > expected || too_short {
        let unit = Rational64::from_integer(time_signature.beat_type as i64);
        return Err(GenError::SemanticError {
            measure: measure_number,
            message: format!(
                "Measure duration mismatch: expected {} beats, found {} beats",
                format_beats(expected * unit),
                format_beats(total * unit)
            ),
        });
    }

    Ok(())
}

/// `3`, `7/2`
fn format_beats(beats: Rational64) -> String {
    if beats.is_integer() {
        beats.to_integer().to_string()
    } else {
        format!("{}/{}", beats.numer(), beats.denom())
    }
}
