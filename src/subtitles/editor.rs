//! Cue editing operations.
//!
//! Every operation is addressed by cue id, runs synchronously and touches
//! nothing but the list it is called on. Persisting the result is up to the
//! caller. An unknown id is logged and leaves the list untouched.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::cue::{Cue, CueList};
use super::time_format::parse_time_strict;
use crate::error::{Result, YtSubError};

/// Window length used when a new cue has no neighbour to borrow a boundary from
pub const DEFAULT_WINDOW_MS: u64 = 2_000;

/// Partial update for a cue; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuePatch {
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    pub text: Option<String>,
}

impl CuePatch {
    pub fn start(ms: u64) -> Self {
        Self { start_time: Some(ms), ..Self::default() }
    }

    pub fn end(ms: u64) -> Self {
        Self { end_time: Some(ms), ..Self::default() }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.start_time.is_none() && self.end_time.is_none() && self.text.is_none()
    }
}

/// Which boundary of a cue a time edit targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeField {
    Start,
    End,
}

/// Direction of a time nudge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nudge {
    Up,
    Down,
}

/// An editable field of a cue, as typed into the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CueField {
    Start,
    End,
    Text,
}

impl std::str::FromStr for CueField {
    type Err = YtSubError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "end" => Ok(Self::End),
            "text" => Ok(Self::Text),
            other => Err(YtSubError::Import(format!("Unknown cue field: {}", other))),
        }
    }
}

impl CuePatch {
    /// Build a patch from raw editor input. Time fields must be valid
    /// `HH:MM:SS.mmm` text; anything else is rejected here.
    pub fn parse_field(field: CueField, input: &str) -> Result<Self> {
        match field {
            CueField::Start => Ok(Self::start(parse_time_strict(input)?)),
            CueField::End => Ok(Self::end(parse_time_strict(input)?)),
            CueField::Text => Ok(Self::text(input)),
        }
    }
}

impl CueList {
    /// Replace the given fields on the matching cue. Returns whether a cue was updated.
    pub fn update_cue(&mut self, id: &str, patch: CuePatch) -> bool {
        let Some(cue) = self.find_mut(id) else {
            warn!(cue_id = id, "update_cue: cue not found");
            return false;
        };

        if let Some(start) = patch.start_time {
            cue.start_time = start;
        }
        if let Some(end) = patch.end_time {
            cue.end_time = end;
        }
        if let Some(text) = patch.text {
            cue.text = text;
        }

        debug!(cue_id = id, index = cue.index, "Updated cue");
        true
    }

    /// Insert an empty cue immediately before the target.
    ///
    /// The new cue fills the gap after the predecessor, or takes the
    /// [`DEFAULT_WINDOW_MS`] leading up to the target when there is none. On an
    /// empty list a default `[0, 2000)` cue is created. Returns the new cue's id.
    pub fn insert_before(&mut self, id: &str) -> Option<String> {
        if self.is_empty() {
            return Some(self.insert_default());
        }

        let Some(position) = self.position_of(id) else {
            warn!(cue_id = id, "insert_before: cue not found");
            return None;
        };

        let target = &self[position];
        let (start, end) = match position.checked_sub(1).map(|p| &self[p]) {
            Some(previous) => (previous.end_time, target.start_time),
            None => (target.start_time.saturating_sub(DEFAULT_WINDOW_MS), target.start_time),
        };

        let cue = Cue::new(position, start, end, "");
        let new_id = cue.id.clone();
        self.insert(position, cue);

        debug!(cue_id = id, position, start, end, total = self.len(), "Inserted cue before");
        Some(new_id)
    }

    /// Insert an empty cue immediately after the target.
    ///
    /// The new cue fills the gap up to the successor, or runs
    /// [`DEFAULT_WINDOW_MS`] past the target's end when there is none.
    pub fn insert_after(&mut self, id: &str) -> Option<String> {
        if self.is_empty() {
            return Some(self.insert_default());
        }

        let Some(position) = self.position_of(id) else {
            warn!(cue_id = id, "insert_after: cue not found");
            return None;
        };

        let target = &self[position];
        let (start, end) = match self.get(position + 1) {
            Some(next) => (target.end_time, next.start_time),
            None => (target.end_time, target.end_time.saturating_add(DEFAULT_WINDOW_MS)),
        };

        let cue = Cue::new(position + 1, start, end, "");
        let new_id = cue.id.clone();
        self.insert(position + 1, cue);

        debug!(cue_id = id, position = position + 1, start, end, total = self.len(), "Inserted cue after");
        Some(new_id)
    }

    /// Place a copy of the target right after it, back to back, keeping its duration
    pub fn duplicate_line(&mut self, id: &str) -> Option<String> {
        let Some(position) = self.position_of(id) else {
            warn!(cue_id = id, "duplicate_line: cue not found");
            return None;
        };

        let source = &self[position];
        let start = source.end_time;
        let end = source.end_time.saturating_add(source.duration_ms());
        let cue = Cue::new(position + 1, start, end, source.text.clone());
        let new_id = cue.id.clone();
        self.insert(position + 1, cue);

        debug!(cue_id = id, new_id = %new_id, start, end, "Duplicated cue");
        Some(new_id)
    }

    /// Remove the cue. Neighbouring times are left as they are.
    pub fn delete_line(&mut self, id: &str) -> Option<Cue> {
        let Some(position) = self.position_of(id) else {
            warn!(cue_id = id, "delete_line: cue not found");
            return None;
        };

        let removed = self.remove(position);
        debug!(cue_id = id, position, remaining = self.len(), "Deleted cue");
        Some(removed)
    }

    /// Move one boundary by `step_ms`, clamping at zero. Returns the new value.
    pub fn nudge(&mut self, id: &str, field: TimeField, direction: Nudge, step_ms: u64) -> Option<u64> {
        let Some(cue) = self.find_mut(id) else {
            warn!(cue_id = id, "nudge: cue not found");
            return None;
        };

        let current = match field {
            TimeField::Start => cue.start_time,
            TimeField::End => cue.end_time,
        };
        let adjusted = match direction {
            Nudge::Up => current.saturating_add(step_ms),
            Nudge::Down => current.saturating_sub(step_ms),
        };
        match field {
            TimeField::Start => cue.start_time = adjusted,
            TimeField::End => cue.end_time = adjusted,
        }

        debug!(cue_id = id, ?field, current, adjusted, "Nudged cue time");
        Some(adjusted)
    }

    fn insert_default(&mut self) -> String {
        let cue = Cue::new(0, 0, DEFAULT_WINDOW_MS, "");
        let id = cue.id.clone();
        self.push(cue);
        debug!("Inserted default cue into empty list");
        id
    }
}
