//! Frontmatter decoding
//!
//! The lexer splits the block into `key: value` entries. Each value is read as
//! a YAML scalar, the entries are collected into a mapping and deserialized
//! into [`RawMetadata`]; known keys are then type-checked into [`Metadata`].
//! Unknown keys are ignored.

use super::rhythm_from_text;
use crate::ast::{Accidental, KeySignature, Metadata, NoteName, SwingType, Tempo, TimeSignature, WrittenPitch};
use crate::error::GenError;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::collections::HashMap;

/// One `key: value` line of the frontmatter block
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Entry {
    pub key: String,
    pub value: String,
    pub line: usize,
    pub column: usize,
}

/// A frontmatter value as YAML typed it
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub(crate) enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Scalar {
    fn text(&self) -> String {
        match self {
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }
}

/// Raw metadata for YAML deserialization
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", default)]
pub(crate) struct RawMetadata {
    pub title: Option<Scalar>,
    pub composer: Option<Scalar>,
    pub time_signature: Option<Scalar>,
    pub key_signature: Option<Scalar>,
    pub written_pitch: Option<Scalar>,
    pub tempo: Option<Scalar>,
    pub swing: Option<Scalar>,
}

/// Read a value as a YAML scalar; anything YAML would not read as a plain
/// scalar (`###` is a comment, `*80` an alias) stays literal text
fn scalar_value(raw: &str) -> Value {
    match serde_yaml::from_str::<Value>(raw) {
        Ok(v @ (Value::Number(_) | Value::Bool(_) | Value::String(_))) => v,
        _ => Value::String(raw.to_string()),
    }
}

pub(crate) fn parse_frontmatter(entries: &[Entry], block_line: usize) -> Result<Metadata, GenError> {
    let mut mapping = Mapping::new();
    let mut positions: HashMap<&str, (usize, usize)> = HashMap::new();
    for entry in entries {
        mapping.insert(Value::String(entry.key.clone()), scalar_value(&entry.value));
        positions.insert(entry.key.as_str(), (entry.line, entry.column));
    }

    let raw: RawMetadata = serde_yaml::from_value(Value::Mapping(mapping))
        .map_err(|e| GenError::metadata(block_line, 1, format!("Invalid frontmatter: {}", e)))?;

    let error_at = |key: &str, message: String| {
        let (line, column) = positions.get(key).copied().unwrap_or((block_line, 1));
        GenError::metadata(line, column, message)
    };

    let mut metadata = Metadata {
        title: raw.title.map(|s| s.text()),
        composer: raw.composer.map(|s| s.text()),
        ..Default::default()
    };

    if let Some(ts) = raw.time_signature {
        metadata.time_signature =
            parse_time_signature(&ts.text()).map_err(|m| error_at("time-signature", m))?;
    }

    if let Some(ks) = raw.key_signature {
        let text = ks.text();
        metadata.key_signature = KeySignature::from_name(&text)
            .ok_or_else(|| error_at("key-signature", format!("Unknown key signature '{}'", text)))?;
    }

    if let Some(wp) = raw.written_pitch {
        metadata.written_pitch =
            parse_written_pitch(&wp.text()).map_err(|m| error_at("written-pitch", m))?;
    }

    if let Some(tempo) = raw.tempo {
        metadata.tempo = Some(parse_tempo(&tempo).map_err(|m| error_at("tempo", m))?);
    }

    if let Some(swing) = raw.swing {
        metadata.swing = parse_swing(&swing.text()).map_err(|m| error_at("swing", m))?;
    }

    Ok(metadata)
}

/// `N/M` where M is a power of two
fn parse_time_signature(text: &str) -> Result<TimeSignature, String> {
    let invalid = || format!("time-signature must be in format N/M, found '{}'", text);
    let (beats, beat_type) = text.trim().split_once('/').ok_or_else(invalid)?;
    let beats: u8 = beats.trim().parse().map_err(|_| invalid())?;
    let beat_type: u8 = beat_type.trim().parse().map_err(|_| invalid())?;
    if beats == 0 {
        return Err("time-signature must have at least one beat".to_string());
    }
    if !beat_type.is_power_of_two() || beat_type > 32 {
        return Err(format!(
            "time-signature beat unit must be a power of two up to 32, found {}",
            beat_type
        ));
    }
    Ok(TimeSignature { beats, beat_type })
}

/// Letter, optional `#`/`b`, optional `^`/`_` run: `Bb`, `Eb_`, `F^`
fn parse_written_pitch(text: &str) -> Result<WrittenPitch, String> {
    let invalid = || format!("Invalid written-pitch '{}'", text);
    let mut chars = text.trim().chars().peekable();
    let note = chars.next().and_then(NoteName::from_char).ok_or_else(invalid)?;
    let accidental = match chars.peek() {
        Some('#') => {
            chars.next();
            Some(Accidental::Sharp)
        }
        Some('b') => {
            chars.next();
            Some(Accidental::Flat)
        }
        _ => None,
    };
    let mut octave_offset: i8 = 0;
    for c in chars {
        match c {
            '^' if octave_offset >= 0 => octave_offset = octave_offset.saturating_add(1),
            '_' if octave_offset <= 0 => octave_offset = octave_offset.saturating_sub(1),
            _ => return Err(invalid()),
        }
    }
    Ok(WrittenPitch {
        note,
        accidental,
        octave_offset,
    })
}

/// BPM with an optional rhythm suffix: `120`, `60p`, `"80/*"`
fn parse_tempo(value: &Scalar) -> Result<Tempo, String> {
    let text = match value {
        Scalar::Int(n) => n.to_string(),
        Scalar::Text(s) => s.trim().to_string(),
        other => return Err(format!("Invalid tempo '{}'", other.text())),
    };
    let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(format!("Tempo must start with a BPM number, found '{}'", text));
    }
    let bpm: u16 = digits
        .parse()
        .map_err(|_| format!("Tempo '{}' is out of range", digits))?;
    if bpm == 0 {
        return Err("Tempo must be greater than zero".to_string());
    }
    let (duration, dotted) = rhythm_from_text(&text[digits.len()..])?;
    Ok(Tempo {
        bpm,
        duration,
        dotted,
    })
}

fn parse_swing(text: &str) -> Result<Option<SwingType>, String> {
    match text.trim() {
        "/" | "eighth" | "8th" => Ok(Some(SwingType::Eighth)),
        "//" | "sixteenth" | "16th" => Ok(Some(SwingType::Sixteenth)),
        "" | "none" | "off" | "false" => Ok(None),
        other => Err(format!("swing must be '/' or '//', found '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Duration, Mode};

    fn entry(key: &str, value: &str, line: usize) -> Entry {
        Entry {
            key: key.to_string(),
            value: value.to_string(),
            line,
            column: 1,
        }
    }

    #[test]
    fn test_known_keys() {
        let entries = vec![
            entry("title", "Blue Bossa", 2),
            entry("composer", "Kenny Dorham", 3),
            entry("time-signature", "3/4", 4),
            entry("key-signature", "Cm", 5),
            entry("tempo", "\"80p*\"", 6),
            entry("swing", "/", 7),
        ];
        let m = parse_frontmatter(&entries, 1).unwrap();
        assert_eq!(m.title.as_deref(), Some("Blue Bossa"));
        assert_eq!(m.composer.as_deref(), Some("Kenny Dorham"));
        assert_eq!(m.time_signature, TimeSignature { beats: 3, beat_type: 4 });
        assert_eq!(m.key_signature.fifths, -3);
        assert_eq!(m.key_signature.mode, Mode::Minor);
        let tempo = m.tempo.unwrap();
        assert_eq!((tempo.bpm, tempo.duration, tempo.dotted), (80, Duration::Half, true));
        assert_eq!(m.swing, Some(SwingType::Eighth));
    }

    #[test]
    fn test_sharp_run_is_not_a_yaml_comment() {
        let m = parse_frontmatter(&[entry("key-signature", "###", 2)], 1).unwrap();
        assert_eq!(m.key_signature.fifths, 3);
    }

    #[test]
    fn test_numeric_title_and_plain_tempo() {
        let m = parse_frontmatter(&[entry("title", "1999", 2), entry("tempo", "96", 3)], 1).unwrap();
        assert_eq!(m.title.as_deref(), Some("1999"));
        assert_eq!(m.tempo.unwrap().bpm, 96);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let m = parse_frontmatter(&[entry("arranger", "someone", 2)], 1).unwrap();
        assert_eq!(m, Metadata::default());
    }

    #[test]
    fn test_bad_time_signature_reports_its_line() {
        let err = parse_frontmatter(&[entry("title", "x", 2), entry("time-signature", "4/3", 3)], 1)
            .unwrap_err();
        assert!(matches!(err, GenError::MetadataError { line: 3, .. }));
        let err = parse_frontmatter(&[entry("time-signature", "four", 2)], 1).unwrap_err();
        assert!(err.message().contains("N/M"));
    }

    #[test]
    fn test_bad_values() {
        assert!(parse_frontmatter(&[entry("key-signature", "H", 2)], 1).is_err());
        assert!(parse_frontmatter(&[entry("tempo", "0", 2)], 1).is_err());
        assert!(parse_frontmatter(&[entry("tempo", "fast", 2)], 1).is_err());
        assert!(parse_frontmatter(&[entry("tempo", "120px", 2)], 1).is_err());
        assert!(parse_frontmatter(&[entry("swing", "triplet", 2)], 1).is_err());
    }

    #[test]
    fn test_written_pitch() {
        let m = parse_frontmatter(&[entry("written-pitch", "Eb_", 2)], 1).unwrap();
        assert_eq!(m.written_pitch.note, NoteName::E);
        assert_eq!(m.written_pitch.accidental, Some(Accidental::Flat));
        assert_eq!(m.written_pitch.octave_offset, -1);

        let long = format!("C{}", "^".repeat(200));
        let m = parse_frontmatter(&[entry("written-pitch", &long, 2)], 1).unwrap();
        assert_eq!(m.written_pitch.octave_offset, i8::MAX);
    }
}
