//! Beam grouping for one measure
//!
//! Consecutive eighth-or-shorter notes are beamed together while they start
//! in the same beat (a dotted quarter in 6/8, 9/8 and 12/8). Rests and tuplet
//! boundaries break a group; a beat boundary breaks it unless the last note
//! before it is tied across. Within a group, each deeper beam level (16ths,
//! 32nds) gets its own begin/continue/end run, and a lone note at a deeper
//! level gets a hook.

use crate::ast::{Element, TimeSignature};
use num_rational::Rational64;

/// Value of one `<beam>` element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeamState {
    Begin,
    Continue,
    End,
    ForwardHook,
    BackwardHook,
}

impl BeamState {
    pub fn as_str(self) -> &'static str {
        match self {
            BeamState::Begin => "begin",
            BeamState::Continue => "continue",
            BeamState::End => "end",
            BeamState::ForwardHook => "forward hook",
            BeamState::BackwardHook => "backward hook",
        }
    }
}

/// Beams of one note: (beam number, state), level 1 first
pub type Beams = Vec<(u8, BeamState)>;

fn beam_levels(element: &Element) -> u8 {
    match element.note() {
        Some(_) => element.rhythm.duration.beam_levels(),
        None => 0,
    }
}

/// Whether `next` may join the beam group that `prev` ends
fn continues_group(prev: &Element, next: &Element, same_beat: bool) -> bool {
    let tied_across = prev.note().is_some_and(|n| n.tie_start);
    if !same_beat && !tied_across {
        return false;
    }
    match (prev.rhythm.tuplet, next.rhythm.tuplet) {
        (None, None) => true,
        (Some(p), Some(n)) => !p.is_stop && !n.is_start,
        _ => false,
    }
}

/// Beam groups as index ranges into `elements`
fn beam_groups(elements: &[Element], time_signature: &TimeSignature) -> Vec<std::ops::Range<usize>> {
    let beat = time_signature.beat_length();
    let mut groups = Vec::new();
    let mut position = Rational64::from_integer(0);
    let mut current: Option<(usize, i64)> = None;

    for (i, element) in elements.iter().enumerate() {
        let beat_index = (position / beat).floor().to_integer();
        if beam_levels(element) == 0 {
            if let Some((start, _)) = current.take() {
                groups.push(start..i);
            }
        } else {
            current = match current {
                Some((start, group_beat))
                    if continues_group(&elements[i - 1], element, group_beat == beat_index) =>
                {
                    Some((start, beat_index))
                }
                Some((start, _)) => {
                    groups.push(start..i);
                    Some((i, beat_index))
                }
                None => Some((i, beat_index)),
            };
        }
        position += element.rhythm.real();
    }
    if let Some((start, _)) = current {
        groups.push(start..elements.len());
    }

    groups.retain(|g| g.len() >= 2);
    groups
}

/// Beams for every element of a measure (empty for unbeamed elements)
pub fn calculate_beams(elements: &[Element], time_signature: &TimeSignature) -> Vec<Beams> {
    let mut beams = vec![Beams::new(); elements.len()];

    for group in beam_groups(elements, time_signature) {
        let levels: Vec<u8> = group.clone().map(|i| beam_levels(&elements[i])).collect();
        let deepest = levels.iter().copied().max().unwrap_or(0);

        for level in 1..=deepest {
            let mut k = 0;
            while k < levels.len() {
                if levels[k] < level {
                    k += 1;
                    continue;
                }
                let run_start = k;
                while k < levels.len() && levels[k] >= level {
                    k += 1;
                }
                let run_end = k;

                if run_end - run_start == 1 {
                    let hook = if run_start == 0 {
                        BeamState::ForwardHook
                    } else {
                        BeamState::BackwardHook
                    };
                    beams[group.start + run_start].push((level, hook));
                    continue;
                }
                for j in run_start..run_end {
                    let state = if j == run_start {
                        BeamState::Begin
                    } else if j == run_end - 1 {
                        BeamState::End
                    } else {
                        BeamState::Continue
                    };
                    beams[group.start + j].push((level, state));
                }
            }
        }
    }

    beams
}
