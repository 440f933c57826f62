/// Subtitle importers for SRT files and YouTube timedtext XML
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

use super::cue::{Cue, CueList};
use crate::error::{Result, YtSubError};

fn timedtext_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<text start="([^"]+)" dur="([^"]+)"[^>]*>([^<]*)</text>"#)
            .expect("timedtext pattern is valid")
    })
}

/// Load a subtitle file, detecting timedtext XML by its leading `<`
pub async fn import_file<P: AsRef<Path>>(path: P) -> Result<CueList> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path).await?;

    let cues = if content.trim_start().starts_with('<') {
        parse_timedtext(&content)?
    } else {
        parse_srt(&content)?
    };

    info!("📥 Imported {} cues from {}", cues.len(), path.display());
    Ok(cues)
}

/// Parse SubRip content. Sequence numbers in the file are ignored.
pub fn parse_srt(content: &str) -> Result<CueList> {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut cues = Vec::new();

    for block in normalized.split("\n\n").map(str::trim).filter(|b| !b.is_empty()) {
        let mut lines = block.lines().skip_while(|line| !line.contains("-->"));
        let timing = lines
            .next()
            .ok_or_else(|| YtSubError::Import(format!("SRT block without timing line: {:?}", block)))?;

        let (start, end) = timing
            .split_once("-->")
            .ok_or_else(|| YtSubError::Import(format!("Invalid timing line: {}", timing)))?;

        let text = lines.collect::<Vec<_>>().join("\n");
        cues.push(Cue::new(
            cues.len(),
            parse_srt_timestamp(start.trim())?,
            parse_srt_timestamp(end.trim())?,
            text,
        ));
    }

    debug!("Parsed {} SRT blocks", cues.len());
    Ok(CueList::from_cues(cues))
}

/// Parse a single timestamp (HH:MM:SS,mmm); a `.` separator is accepted too
fn parse_srt_timestamp(timestamp: &str) -> Result<u64> {
    let invalid = || YtSubError::Import(format!("Invalid timestamp: {}", timestamp));

    let (hms, millis) = timestamp
        .split_once(|c: char| c == ',' || c == '.')
        .ok_or_else(invalid)?;

    let hms_parts: Vec<&str> = hms.split(':').collect();
    if hms_parts.len() != 3 {
        return Err(invalid());
    }

    let hours: u64 = hms_parts[0].parse().map_err(|_| invalid())?;
    let minutes: u64 = hms_parts[1].parse().map_err(|_| invalid())?;
    let seconds: u64 = hms_parts[2].parse().map_err(|_| invalid())?;
    if millis.len() != 3 || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let milliseconds: u64 = millis.parse().map_err(|_| invalid())?;

    hours
        .checked_mul(3600)
        .and_then(|total| total.checked_add(minutes.checked_mul(60)?))
        .and_then(|total| total.checked_add(seconds))
        .and_then(|total| total.checked_mul(1000))
        .and_then(|total| total.checked_add(milliseconds))
        .ok_or_else(invalid)
}

/// Parse YouTube timedtext XML (`<text start="s" dur="s">`), converting seconds to ms
pub fn parse_timedtext(xml: &str) -> Result<CueList> {
    let mut cues = Vec::new();

    for caps in timedtext_regex().captures_iter(xml) {
        let start: f64 = caps[1]
            .parse()
            .map_err(|_| YtSubError::Import(format!("Invalid start attribute: {}", &caps[1])))?;
        let duration: f64 = caps[2]
            .parse()
            .map_err(|_| YtSubError::Import(format!("Invalid dur attribute: {}", &caps[2])))?;

        let start_ms = seconds_to_ms(start)
            .ok_or_else(|| YtSubError::Import(format!("Invalid start attribute: {}", &caps[1])))?;
        let end_ms = seconds_to_ms(start + duration)
            .ok_or_else(|| YtSubError::Import(format!("Invalid dur attribute: {}", &caps[2])))?;
        cues.push(Cue::new(cues.len(), start_ms, end_ms, decode_entities(caps[3].trim())));
    }

    if cues.is_empty() {
        return Err(YtSubError::Import("No caption entries found in timedtext XML".to_string()));
    }

    Ok(CueList::from_cues(cues))
}

/// Seconds to whole ms; `None` for negative, non-finite or out of range values
fn seconds_to_ms(seconds: f64) -> Option<u64> {
    let ms = (seconds * 1000.0).round();
    (ms.is_finite() && ms >= 0.0 && ms < u64::MAX as f64).then_some(ms as u64)
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
