//! Event classification and trial-outcome recoding.
//!
//! Hardware event codes are not stable across recording sessions: the same
//! role (response press, Go stimulus, NoGo stimulus, pause marker) can be
//! recorded under different integer codes for different participants. What
//! *is* stable is the frequency ordering — responses outnumber Go trials,
//! Go trials outnumber NoGo trials, and the pause marker (when present)
//! occurs once. [`assign_codes`] derives the per-participant mapping from
//! that ordering; [`recode`] then relabels stimulus/response events into
//! trial outcomes using immediate-neighbor adjacency.

use crate::error::{PipelineError, Result};
use std::collections::HashMap;

/// One timestamped event from the stimulus channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Sample offset into the recording.
    pub sample: usize,
    /// Raw integer code as recorded by the hardware.
    pub code: i32,
}

/// Ordered raw event sequence, immutable once extracted.
#[derive(Debug, Clone)]
pub struct EventStream {
    events: Vec<Event>,
}

impl EventStream {
    pub fn new(mut events: Vec<Event>) -> Self {
        events.sort_by_key(|e| e.sample);
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }
}

/// Semantic trial outcomes. The integer codes follow the original study's
/// convention so downstream tooling can keep reading them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Condition {
    /// Go stimulus followed immediately by a response.
    GoCorrect,
    /// NoGo stimulus with the response correctly withheld.
    NogoCorrect,
    /// Response emitted right after a NoGo stimulus.
    NogoIncorrect,
}

impl Condition {
    pub const fn code(self) -> i32 {
        match self {
            Condition::GoCorrect => 11,
            Condition::NogoCorrect => 101,
            Condition::NogoIncorrect => 102,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            11 => Some(Condition::GoCorrect),
            101 => Some(Condition::NogoCorrect),
            102 => Some(Condition::NogoIncorrect),
            _ => None,
        }
    }

    /// Stable label used in logs and export filenames.
    pub const fn label(self) -> &'static str {
        match self {
            Condition::GoCorrect => "gocorr",
            Condition::NogoCorrect => "nogocorr",
            Condition::NogoIncorrect => "nogoincorr",
        }
    }
}

/// Per-participant mapping from semantic role to raw hardware code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeAssignment {
    pub response: i32,
    pub go: i32,
    pub nogo: i32,
    /// Absent when the recording carries only 3 distinct codes.
    pub pause: Option<i32>,
}

/// Derive the role assignment by descending occurrence frequency.
///
/// Exactly 4 distinct codes → (response, go, nogo, pause); exactly 3 →
/// (response, go, nogo). Any other cardinality means a corrupt stimulus
/// track and fails this participant. Frequency ties break toward the
/// smaller raw code so the assignment is deterministic.
pub fn assign_codes(events: &EventStream) -> Result<CodeAssignment> {
    let mut counts: HashMap<i32, usize> = HashMap::new();
    for e in events.iter() {
        *counts.entry(e.code).or_insert(0) += 1;
    }

    let mut ranked: Vec<(i32, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    match ranked.len() {
        4 => Ok(CodeAssignment {
            response: ranked[0].0,
            go: ranked[1].0,
            nogo: ranked[2].0,
            pause: Some(ranked[3].0),
        }),
        3 => Ok(CodeAssignment {
            response: ranked[0].0,
            go: ranked[1].0,
            nogo: ranked[2].0,
            pause: None,
        }),
        n => Err(PipelineError::EventClassification { distinct: n }),
    }
}

/// Event stream after trial-outcome recoding. Events that matched no rule
/// keep their raw code and are excluded from epoching.
#[derive(Debug, Clone)]
pub struct RecodedEventStream {
    events: Vec<Event>,
    assignment: CodeAssignment,
}

impl RecodedEventStream {
    pub fn assignment(&self) -> CodeAssignment {
        self.assignment
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Events belonging to a defined condition, with their label.
    pub fn condition_events(&self) -> impl Iterator<Item = (Condition, &Event)> {
        self.events
            .iter()
            .filter_map(|e| Condition::from_code(e.code).map(|c| (c, e)))
    }

    pub fn count(&self, cond: Condition) -> usize {
        self.events.iter().filter(|e| e.code == cond.code()).count()
    }

    /// Conditions realized in this participant's data: `GoCorrect` and
    /// `NogoCorrect` always belong to the vocabulary; `NogoIncorrect` only
    /// when at least one such event occurred.
    pub fn defined_conditions(&self) -> Vec<Condition> {
        let mut conds = vec![Condition::GoCorrect, Condition::NogoCorrect];
        if self.count(Condition::NogoIncorrect) > 0 {
            conds.push(Condition::NogoIncorrect);
        }
        conds
    }
}

/// Relabel go/nogo/response events into trial outcomes.
///
/// Scanning in temporal order, with rules evaluated against the ORIGINAL
/// labels (a relabeled predecessor does not change how its successor is
/// classified):
///
/// - go followed immediately by response → that go becomes `GoCorrect`;
/// - nogo followed immediately by go or nogo → that nogo becomes
///   `NogoCorrect` (the response was correctly withheld);
/// - response whose immediate predecessor is nogo → that response becomes
///   `NogoIncorrect` (response-locked).
///
/// A response following a go is intentionally left unlabeled: responding to
/// Go stimuli is the expected behavior and already captured by the
/// `GoCorrect` rule on the stimulus itself. The scan stops before the final
/// event, so a stream-terminating response is never relabeled either.
pub fn recode(events: &EventStream) -> Result<RecodedEventStream> {
    let assignment = assign_codes(events)?;
    let old = events.as_slice();
    let mut recoded = old.to_vec();

    for j in 0..old.len().saturating_sub(1) {
        if j + 1 < old.len() {
            if old[j].code == assignment.go && old[j + 1].code == assignment.response {
                recoded[j].code = Condition::GoCorrect.code();
            } else if old[j].code == assignment.nogo
                && (old[j + 1].code == assignment.go || old[j + 1].code == assignment.nogo)
            {
                recoded[j].code = Condition::NogoCorrect.code();
            }
        }
        if j > 0 && old[j].code == assignment.response && old[j - 1].code == assignment.nogo {
            recoded[j].code = Condition::NogoIncorrect.code();
        }
    }

    Ok(RecodedEventStream { events: recoded, assignment })
}
