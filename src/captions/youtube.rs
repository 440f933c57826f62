/// YouTube video id extraction
use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Result, YtSubError};

fn raw_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").expect("video id pattern is valid"))
}

fn url_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([a-zA-Z0-9_-]{11})")
                .expect("url pattern is valid"),
            Regex::new(r"youtube\.com/watch\?.*v=([a-zA-Z0-9_-]{11})").expect("url pattern is valid"),
        ]
    })
}

/// Extract an 11 character video id from a raw id or a recognised YouTube URL
pub fn extract_video_id(url_or_id: &str) -> Option<String> {
    let input = url_or_id.trim();
    if input.is_empty() {
        return None;
    }

    if raw_id_regex().is_match(input) {
        return Some(input.to_string());
    }

    url_patterns()
        .iter()
        .find_map(|pattern| pattern.captures(input))
        .map(|caps| caps[1].to_string())
}

/// Like [`extract_video_id`], but as an error for unrecognised input
pub fn require_video_id(url_or_id: &str) -> Result<String> {
    extract_video_id(url_or_id).ok_or_else(|| YtSubError::InvalidVideoId(url_or_id.to_string()))
}

pub fn is_valid_youtube_url(url_or_id: &str) -> bool {
    extract_video_id(url_or_id).is_some()
}

/// Canonical watch URL for a video id
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_supported_shapes() {
        let expected = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ"), expected);
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), expected);
        assert_eq!(extract_video_id("dQw4w9WgXcQ"), expected);
        assert_eq!(extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ?start=3"), expected);
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ"),
            expected
        );
    }

    #[test]
    fn test_rejects_unrecognised_input() {
        assert_eq!(extract_video_id(""), None);
        assert_eq!(extract_video_id("not a video"), None);
        assert_eq!(extract_video_id("https://vimeo.com/12345678901"), None);
        assert_eq!(extract_video_id("dQw4w9WgXc"), None);
        assert!(!is_valid_youtube_url("https://example.com/watch?v=short"));
        assert!(matches!(require_video_id("nope"), Err(YtSubError::InvalidVideoId(_))));
    }
}
