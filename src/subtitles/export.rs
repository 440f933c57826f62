use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::cue::{Cue, CueList};
use super::time_format::format_with_separator;
use crate::captions::CaptionData;
use crate::error::{Result, YtSubError};

/// Supported download formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    Vtt,
    Sub,
    Sbv,
    Txt,
    Json,
}

impl SubtitleFormat {
    pub const ALL: [SubtitleFormat; 6] = [
        SubtitleFormat::Srt,
        SubtitleFormat::Vtt,
        SubtitleFormat::Sub,
        SubtitleFormat::Sbv,
        SubtitleFormat::Txt,
        SubtitleFormat::Json,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Vtt => "vtt",
            SubtitleFormat::Sub => "sub",
            SubtitleFormat::Sbv => "sbv",
            SubtitleFormat::Txt => "txt",
            SubtitleFormat::Json => "json",
        }
    }

    /// Human readable name shown in format pickers
    pub fn description(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "SubRip Text (.srt)",
            SubtitleFormat::Vtt => "Web Video Text Tracks (.vtt)",
            SubtitleFormat::Sub => "SubViewer (.sub)",
            SubtitleFormat::Sbv => "YouTube Subtitles (.sbv)",
            SubtitleFormat::Txt => "Plain Text (.txt)",
            SubtitleFormat::Json => "JSON (.json)",
        }
    }
}

impl fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for SubtitleFormat {
    type Err = YtSubError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().trim_start_matches('.').to_ascii_lowercase();
        SubtitleFormat::ALL
            .into_iter()
            .find(|format| format.extension() == wanted)
            .ok_or_else(|| YtSubError::Import(format!("Unsupported subtitle format: {}", s)))
    }
}

/// Renders a session's captions into download formats
#[derive(Debug, Clone)]
pub struct SubtitleExporter<'a> {
    data: &'a CaptionData,
}

impl<'a> SubtitleExporter<'a> {
    pub fn new(data: &'a CaptionData) -> Self {
        Self { data }
    }

    /// Render the captions in the requested format
    pub fn render(&self, format: SubtitleFormat) -> Result<String> {
        let cues = &self.data.subtitles;
        Ok(match format {
            SubtitleFormat::Srt => to_srt(cues),
            SubtitleFormat::Vtt => to_vtt(cues),
            SubtitleFormat::Sub => to_sub(cues),
            SubtitleFormat::Sbv => to_sbv(cues),
            SubtitleFormat::Txt => to_txt(cues),
            SubtitleFormat::Json => serde_json::to_string_pretty(self.data)?,
        })
    }

    /// Download file name: `{videoId}-{language}.{ext}`, or `{videoId}.json`
    pub fn file_name(&self, format: SubtitleFormat, language: &str) -> String {
        match format {
            SubtitleFormat::Json => format!("{}.json", self.data.video_id),
            other => format!("{}-{}.{}", self.data.video_id, language, other.extension()),
        }
    }

    /// Render and write to `path`
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P, format: SubtitleFormat) -> Result<()> {
        let content = self.render(format)?;
        tokio::fs::write(path.as_ref(), content).await?;
        Ok(())
    }
}

/// SubRip: numbered blocks separated by a blank line
pub fn to_srt(cues: &CueList) -> String {
    cues.iter()
        .enumerate()
        .map(|(position, cue)| {
            format!(
                "{}\n{} --> {}\n{}\n",
                position + 1,
                format_with_separator(cue.start_time, ','),
                format_with_separator(cue.end_time, ','),
                cue.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// WebVTT with the mandatory header
pub fn to_vtt(cues: &CueList) -> String {
    let mut vtt = String::from("WEBVTT\n\n");
    for cue in cues {
        vtt.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_with_separator(cue.start_time, '.'),
            format_with_separator(cue.end_time, '.'),
            cue.text
        ));
    }
    vtt
}

/// SubViewer 2.0: centisecond timestamps, line breaks as `[br]`
pub fn to_sub(cues: &CueList) -> String {
    let mut sub = String::from("[SUBTITLE]\n");
    for cue in cues {
        sub.push_str(&format!(
            "{},{}\n{}\n\n",
            subviewer_time(cue.start_time),
            subviewer_time(cue.end_time),
            cue.text.replace('\n', "[br]")
        ));
    }
    sub
}

/// YouTube SBV: unpadded hours, comma between start and end
pub fn to_sbv(cues: &CueList) -> String {
    let mut sbv = String::new();
    for cue in cues {
        sbv.push_str(&format!(
            "{},{}\n{}\n\n",
            sbv_time(cue.start_time),
            sbv_time(cue.end_time),
            cue.text
        ));
    }
    sbv
}

/// Plain transcript, one cue per line
pub fn to_txt(cues: &CueList) -> String {
    cues.iter().map(|cue: &Cue| cue.text.as_str()).collect::<Vec<_>>().join("\n")
}

fn subviewer_time(ms: u64) -> String {
    let total_seconds = ms / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:02}",
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60,
        (ms % 1000) / 10
    )
}

fn sbv_time(ms: u64) -> String {
    let total_seconds = ms / 1000;
    format!(
        "{}:{:02}:{:02}.{:03}",
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60,
        ms % 1000
    )
}
