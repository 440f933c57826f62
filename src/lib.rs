/// ytsub - YouTube subtitle editor core
///
/// Loads captions for a video into an editing session, edits cues by id,
/// tracks the active cue during playback and exports to common subtitle formats.

pub mod captions;
pub mod config;
pub mod debounce;
pub mod error;
pub mod playback;
pub mod session;
pub mod subtitles;

// Re-export main types for easy access
pub use crate::captions::{extract_video_id, CaptionClient, CaptionData};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::debounce::{Debouncer, EditKey};
pub use crate::error::{Result, YtSubError};
pub use crate::playback::{Player, PlayerState, SegmentPlayer, SimulatedPlayer, SubtitleTracker};
pub use crate::session::{FileStorage, MemoryStorage, Session, SessionStore, StorageBackend, StoreEvent};
pub use crate::subtitles::{Cue, CueField, CueList, CuePatch, Nudge, SubtitleExporter, SubtitleFormat, TimeField};
