use serde::{Deserialize, Serialize};
use std::ops::Index;
use tracing::debug;

use super::id::generate_cue_id;
use super::time_format::is_valid_range;

/// A single timed subtitle entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cue {
    /// Stable identity; empty when loaded from data that predates ids
    #[serde(default)]
    pub id: String,
    /// Position in the owning list, recomputed after structural edits
    #[serde(default)]
    pub index: usize,
    /// Start time in milliseconds
    pub start_time: u64,
    /// End time in milliseconds
    pub end_time: u64,
    /// Subtitle text
    pub text: String,
}

impl Cue {
    /// Create a cue with a freshly generated id
    pub fn new(index: usize, start_time: u64, end_time: u64, text: impl Into<String>) -> Self {
        Self {
            id: generate_cue_id(),
            index,
            start_time,
            end_time,
            text: text.into(),
        }
    }

    /// Length of the cue window, zero for inverted windows
    pub fn duration_ms(&self) -> u64 {
        self.end_time.saturating_sub(self.start_time)
    }

    /// Whether `position_ms` falls inside `[start, end)`
    pub fn contains(&self, position_ms: f64) -> bool {
        self.start_time as f64 <= position_ms && position_ms < self.end_time as f64
    }
}

/// Ordered list of cues owned by one session.
///
/// Every structural mutation finishes with [`CueList::renumber`], so `index`
/// always equals list position once a method returns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct CueList {
    cues: Vec<Cue>,
}

impl CueList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from raw cues, assigning missing ids and renumbering
    pub fn from_cues(cues: Vec<Cue>) -> Self {
        let mut list = Self { cues };
        list.assign_missing_ids();
        list.renumber();
        list
    }

    /// Give an id to every cue that lacks one. Returns how many were assigned.
    pub fn assign_missing_ids(&mut self) -> usize {
        let mut assigned = 0;
        for cue in self.cues.iter_mut().filter(|cue| cue.id.is_empty()) {
            cue.id = generate_cue_id();
            assigned += 1;
        }
        if assigned > 0 {
            debug!("Assigned ids to {} legacy cues", assigned);
        }
        assigned
    }

    /// Reassign `index := position` for every cue
    pub fn renumber(&mut self) {
        for (position, cue) in self.cues.iter_mut().enumerate() {
            cue.index = position;
        }
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cue> {
        self.cues.iter()
    }

    pub fn as_slice(&self) -> &[Cue] {
        &self.cues
    }

    pub fn get(&self, position: usize) -> Option<&Cue> {
        self.cues.get(position)
    }

    /// Position of the cue with the given id
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.cues.iter().position(|cue| cue.id == id)
    }

    pub fn find(&self, id: &str) -> Option<&Cue> {
        self.cues.iter().find(|cue| cue.id == id)
    }

    pub(crate) fn find_mut(&mut self, id: &str) -> Option<&mut Cue> {
        self.cues.iter_mut().find(|cue| cue.id == id)
    }

    pub(crate) fn insert(&mut self, position: usize, cue: Cue) {
        self.cues.insert(position, cue);
        self.renumber();
    }

    pub(crate) fn remove(&mut self, position: usize) -> Cue {
        let removed = self.cues.remove(position);
        self.renumber();
        removed
    }

    pub(crate) fn push(&mut self, cue: Cue) {
        self.cues.push(cue);
        self.renumber();
    }

    /// First cue whose window contains the position
    pub fn cue_at(&self, position_ms: f64) -> Option<&Cue> {
        self.cues.iter().find(|cue| cue.contains(position_ms))
    }

    /// Latest end time across all cues
    pub fn total_duration_ms(&self) -> u64 {
        self.cues.iter().map(|cue| cue.end_time).max().unwrap_or(0)
    }

    /// Whether `index` matches position for every cue
    pub fn is_contiguous(&self) -> bool {
        self.cues.iter().enumerate().all(|(position, cue)| cue.index == position)
    }

    /// Advisory warnings for display next to the editor; nothing here is enforced
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for (position, cue) in self.cues.iter().enumerate() {
            if !is_valid_range(cue.start_time, cue.end_time) {
                issues.push(format!("Line {}: end time is not after start time", position + 1));
            }
            if cue.text.trim().is_empty() {
                issues.push(format!("Line {}: empty text", position + 1));
            }
        }

        for pair in self.cues.windows(2) {
            if pair[0].end_time > pair[1].start_time {
                issues.push(format!(
                    "Lines {} and {}: overlapping times",
                    pair[0].index + 1,
                    pair[1].index + 1
                ));
            }
        }

        issues
    }
}

impl Index<usize> for CueList {
    type Output = Cue;

    fn index(&self, position: usize) -> &Cue {
        &self.cues[position]
    }
}

impl<'a> IntoIterator for &'a CueList {
    type Item = &'a Cue;
    type IntoIter = std::slice::Iter<'a, Cue>;

    fn into_iter(self) -> Self::IntoIter {
        self.cues.iter()
    }
}

impl From<Vec<Cue>> for CueList {
    fn from(cues: Vec<Cue>) -> Self {
        Self::from_cues(cues)
    }
}
