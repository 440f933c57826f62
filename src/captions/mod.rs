//! Captions retrieval: video id extraction and the captions service client

pub mod client;
pub mod youtube;

pub use client::CaptionClient;
pub use youtube::{extract_video_id, is_valid_youtube_url, require_video_id};

use serde::{Deserialize, Serialize};

use crate::subtitles::CueList;

/// Captions and metadata for one video, as returned by the captions service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptionData {
    pub video_id: String,
    pub title: String,
    /// Video length in seconds
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub subtitles: CueList,
}
