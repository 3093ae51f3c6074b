//! Chord quality analysis
//!
//! Turns the free-form quality text of a chord symbol (`m7`, `maj9`, `7sus4`,
//! `m7b5`, `6/9`, ...) into semitone intervals above the root and a MusicXML
//! `<kind>` value. Quality text is never rejected: whatever is not understood
//! is skipped, so unknown text still yields at least a major triad.
//!
//! Shared by the MusicXML emitter (`<harmony>`) and the playback engine
//! (chord accompaniment).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Major,
    Minor,
    Diminished,
    HalfDiminished,
    Augmented,
    Power,
}

/// Analyzed chord quality
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordQuality {
    /// MusicXML `<kind>` value
    pub kind: &'static str,
    /// Semitones above the root, ascending, starting with 0
    pub intervals: Vec<i32>,
}

struct Builder {
    family: Family,
    third: Option<i32>,
    fifth: i32,
    sixth: bool,
    seventh: Option<i32>,
    major_seventh: bool,
    extension: u8,
    sus: Option<i32>,
    added: Vec<i32>,
}

/// Strip the first matching prefix
fn take(s: &mut &str, prefixes: &[&str]) -> bool {
    for prefix in prefixes {
        if let Some(rest) = s.strip_prefix(prefix) {
            *s = rest;
            return true;
        }
    }
    false
}

fn take_number(s: &mut &str) -> Option<u8> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    *s = &s[digits.len()..];
    digits.parse().ok()
}

impl ChordQuality {
    pub fn parse(text: &str) -> Self {
        let mut s = text.trim();
        let mut b = Builder {
            family: Family::Major,
            third: Some(4),
            fifth: 7,
            sixth: false,
            seventh: None,
            major_seventh: false,
            extension: 0,
            sus: None,
            added: Vec::new(),
        };

        // Triad family. "maj" must be tried before "m".
        if take(&mut s, &["maj", "Maj", "MA", "M", "Δ", "^"]) {
            b.major_seventh = true;
        } else if take(&mut s, &["min", "mi", "m", "-"]) {
            b.family = Family::Minor;
            b.third = Some(3);
            if take(&mut s, &["(maj", "maj", "Maj", "M", "Δ"]) {
                b.major_seventh = true;
            }
        } else if take(&mut s, &["dim", "°", "o"]) {
            b.family = Family::Diminished;
            b.third = Some(3);
            b.fifth = 6;
        } else if take(&mut s, &["ø"]) {
            b.family = Family::HalfDiminished;
            b.third = Some(3);
            b.fifth = 6;
            b.seventh = Some(10);
        } else if take(&mut s, &["aug", "+"]) {
            b.family = Family::Augmented;
            b.fifth = 8;
        }

        match take_number(&mut s) {
            Some(5) if b.family == Family::Major && !b.major_seventh => {
                b.family = Family::Power;
                b.third = None;
            }
            Some(6) => {
                b.sixth = true;
                if take(&mut s, &["/9", "9"]) {
                    b.added.push(14);
                }
            }
            Some(69) => {
                b.sixth = true;
                b.added.push(14);
            }
            Some(n @ (7 | 9 | 11 | 13)) => {
                b.seventh = Some(match b.family {
                    _ if b.major_seventh => 11,
                    Family::Diminished => 9,
                    _ => 10,
                });
                b.extension = n;
            }
            _ => {
                // "maj" alone is a plain major triad, "Δ" alone a major seventh
                if b.major_seventh && text.trim().starts_with('Δ') {
                    b.seventh = Some(11);
                }
            }
        }

        while !s.is_empty() {
            if take(&mut s, &["sus2"]) {
                b.sus = Some(2);
            } else if take(&mut s, &["sus4", "sus"]) {
                b.sus = Some(5);
            } else if take(&mut s, &["add9", "add2"]) {
                b.added.push(14);
            } else if take(&mut s, &["add11", "add4"]) {
                b.added.push(17);
            } else if take(&mut s, &["add13", "add6"]) {
                b.added.push(21);
            } else if take(&mut s, &["b5", "-5"]) {
                b.fifth = 6;
            } else if take(&mut s, &["#5", "+5"]) {
                b.fifth = 8;
            } else if take(&mut s, &["b9"]) {
                b.added.push(13);
            } else if take(&mut s, &["#9"]) {
                b.added.push(15);
            } else if take(&mut s, &["#11"]) {
                b.added.push(18);
            } else if take(&mut s, &["b13"]) {
                b.added.push(20);
            } else {
                let skip = s.chars().next().map_or(1, char::len_utf8);
                s = &s[skip..];
            }
        }

        // m7b5
        if b.family == Family::Minor && b.seventh == Some(10) && b.fifth == 6 {
            b.family = Family::HalfDiminished;
        }

        b.finish()
    }
}

impl Builder {
    fn finish(self) -> ChordQuality {
        let mut intervals = vec![0];
        if let Some(third) = self.sus.or(self.third) {
            intervals.push(third);
        }
        intervals.push(self.fifth);
        if self.sixth {
            intervals.push(9);
        }
        if let Some(seventh) = self.seventh {
            intervals.push(seventh);
        }
        match self.extension {
            9 => intervals.push(14),
            11 => intervals.extend([14, 17]),
            13 => intervals.extend([14, 21]),
            _ => {}
        }
        intervals.extend(self.added.iter().copied());
        intervals.sort_unstable();
        intervals.dedup();

        ChordQuality {
            kind: self.kind(),
            intervals,
        }
    }

    fn kind(&self) -> &'static str {
        match self.sus {
            Some(5) => return "suspended-fourth",
            Some(2) => return "suspended-second",
            _ => {}
        }
        match (self.family, self.seventh, self.extension) {
            (Family::Power, _, _) => "power",
            (Family::HalfDiminished, _, _) => "half-diminished",
            (Family::Diminished, Some(_), _) => "diminished-seventh",
            (Family::Diminished, None, _) => "diminished",
            (Family::Augmented, Some(_), _) => "augmented-seventh",
            (Family::Augmented, None, _) => "augmented",
            (Family::Minor, Some(11), _) => "major-minor",
            (Family::Minor, Some(_), 9) => "minor-ninth",
            (Family::Minor, Some(_), 11) => "minor-11th",
            (Family::Minor, Some(_), 13) => "minor-13th",
            (Family::Minor, Some(_), _) => "minor-seventh",
            (Family::Minor, None, _) if self.sixth => "minor-sixth",
            (Family::Minor, None, _) => "minor",
            (Family::Major, Some(11), 9) => "major-ninth",
            (Family::Major, Some(11), 11) => "major-11th",
            (Family::Major, Some(11), 13) => "major-13th",
            (Family::Major, Some(11), _) => "major-seventh",
            (Family::Major, Some(_), 9) => "dominant-ninth",
            (Family::Major, Some(_), 11) => "dominant-11th",
            (Family::Major, Some(_), 13) => "dominant-13th",
            (Family::Major, Some(_), _) => "dominant",
            (Family::Major, None, _) if self.sixth => "major-sixth",
            (Family::Major, None, _) => "major",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intervals(text: &str) -> Vec<i32> {
        ChordQuality::parse(text).intervals
    }

    #[test]
    fn test_triads() {
        assert_eq!(intervals(""), vec![0, 4, 7]);
        assert_eq!(intervals("m"), vec![0, 3, 7]);
        assert_eq!(intervals("dim"), vec![0, 3, 6]);
        assert_eq!(intervals("aug"), vec![0, 4, 8]);
        assert_eq!(intervals("+"), vec![0, 4, 8]);
        assert_eq!(intervals("5"), vec![0, 7]);
    }

    #[test]
    fn test_minor_seventh_spellings() {
        for text in ["m7", "min7", "-7", "mi7"] {
            let q = ChordQuality::parse(text);
            assert_eq!(q.intervals, vec![0, 3, 7, 10], "quality {}", text);
            assert_eq!(q.kind, "minor-seventh");
        }
    }

    #[test]
    fn test_sevenths() {
        assert_eq!(ChordQuality::parse("7").kind, "dominant");
        assert_eq!(intervals("7"), vec![0, 4, 7, 10]);
        assert_eq!(ChordQuality::parse("maj7").kind, "major-seventh");
        assert_eq!(intervals("maj7"), vec![0, 4, 7, 11]);
        assert_eq!(intervals("dim7"), vec![0, 3, 6, 9]);
        assert_eq!(ChordQuality::parse("m7b5").kind, "half-diminished");
        assert_eq!(intervals("m7b5"), vec![0, 3, 6, 10]);
        assert_eq!(ChordQuality::parse("mMaj7").kind, "major-minor");
    }

    #[test]
    fn test_extensions_and_sus() {
        assert_eq!(intervals("9"), vec![0, 4, 7, 10, 14]);
        assert_eq!(ChordQuality::parse("maj9").kind, "major-ninth");
        assert_eq!(intervals("7sus4"), vec![0, 5, 7, 10]);
        assert_eq!(ChordQuality::parse("sus2").intervals, vec![0, 2, 7]);
        assert_eq!(intervals("6/9"), vec![0, 4, 7, 9, 14]);
        assert_eq!(intervals("7b9"), vec![0, 4, 7, 10, 13]);
        assert_eq!(ChordQuality::parse("m6").kind, "minor-sixth");
    }

    #[test]
    fn test_unknown_text_is_major_triad() {
        let q = ChordQuality::parse("xyz");
        assert_eq!(q.intervals, vec![0, 4, 7]);
        assert_eq!(q.kind, "major");
    }
}
