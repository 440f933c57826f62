use serde::{Deserialize, Serialize};

use crate::captions::CaptionData;
use crate::subtitles::CueList;

/// One editing context for one source video
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Session identifier
    pub id: String,

    /// Video metadata and the owned cue list
    pub data: CaptionData,

    /// Creation details used for eviction
    pub metadata: SessionMetadata,
}

/// Immutable details captured when a session is created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    /// Unix time in milliseconds
    pub created_at: i64,
    pub video_id: String,
    /// URL the captions were loaded from
    pub url: String,
}

impl Session {
    pub fn new(id: impl Into<String>, data: CaptionData, url: impl Into<String>, created_at: i64) -> Self {
        let metadata = SessionMetadata {
            created_at,
            video_id: data.video_id.clone(),
            url: url.into(),
        };
        Self {
            id: id.into(),
            data,
            metadata,
        }
    }

    pub fn video_id(&self) -> &str {
        &self.data.video_id
    }

    pub fn title(&self) -> &str {
        &self.data.title
    }

    pub fn subtitles(&self) -> &CueList {
        &self.data.subtitles
    }

    pub(crate) fn subtitles_mut(&mut self) -> &mut CueList {
        &mut self.data.subtitles
    }

    /// Age relative to `now_ms`; sessions stamped in the future count as age zero
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.metadata.created_at).max(0)
    }

    pub fn is_expired(&self, now_ms: i64, max_age_ms: i64) -> bool {
        self.age_ms(now_ms) > max_age_ms
    }
}

/// Summary counts for the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub total_cues: usize,
    pub expired_sessions: usize,
}
