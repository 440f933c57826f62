//! Subtitle cue model, editing operations and exchange formats

pub mod cue;
pub mod editor;
pub mod export;
pub mod id;
pub mod import;
pub mod time_format;

pub use cue::{Cue, CueList};
pub use editor::{CueField, CuePatch, Nudge, TimeField, DEFAULT_WINDOW_MS};
pub use export::{SubtitleExporter, SubtitleFormat};
pub use time_format::{format_clock, format_time, is_valid_range, is_valid_time, parse_time, parse_time_strict};
