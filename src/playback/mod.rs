//! Playback tracking: maps a player's position to the active cue

pub mod player;
pub mod segment;
pub mod tracker;

pub use player::{Player, PlayerState, SimulatedPlayer};
pub use segment::SegmentPlayer;
pub use tracker::{PlaybackTracker, SubtitleTracker, TickOutcome, TrackingTask};
