//! End to end editing: import, edit, debounce commits, export.

use std::time::Duration;

use ytsub::debounce::Debouncer;
use ytsub::subtitles::export::to_srt;
use ytsub::subtitles::import::parse_srt;
use ytsub::subtitles::{format_time, parse_time, CueField, CuePatch, SubtitleExporter, SubtitleFormat};
use ytsub::{CaptionData, SessionStore};

const SRT: &str = "1\n00:00:05,000 --> 00:00:07,000\nFirst line\n\n2\n00:00:08,000 --> 00:00:10,500\nSecond line\n";

fn imported_session() -> (SessionStore, String) {
    let cues = parse_srt(SRT).unwrap();
    let data = CaptionData {
        video_id: "dQw4w9WgXcQ".to_string(),
        title: "Imported".to_string(),
        duration: 11.0,
        thumbnail: String::new(),
        subtitles: cues,
    };
    let mut store = SessionStore::new();
    store.add_session("s1", data, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    (store, "s1".to_string())
}

#[test]
fn test_import_edit_export() {
    let (mut store, session_id) = imported_session();
    let first = store.get_session(&session_id).unwrap().subtitles()[0].id.clone();

    let before = store.insert_before(&session_id, &first).unwrap();
    store.update_cue(&session_id, &before, CuePatch::text("Intro"));
    let clone = store.duplicate_line(&session_id, &first).unwrap();
    store.delete_line(&session_id, &clone);

    let session = store.get_session(&session_id).unwrap();
    let cues = session.subtitles();
    assert_eq!(cues.len(), 3);
    assert!(cues.is_contiguous());
    assert_eq!((cues[0].start_time, cues[0].end_time), (3000, 5000));

    let srt = to_srt(cues);
    assert!(srt.starts_with("1\n00:00:03,000 --> 00:00:05,000\nIntro\n"));
    assert!(srt.contains("3\n00:00:08,000 --> 00:00:10,500\nSecond line\n"));

    let exporter = SubtitleExporter::new(&session.data);
    assert_eq!(exporter.file_name(SubtitleFormat::Vtt, "ko"), "dQw4w9WgXcQ-ko.vtt");
    let vtt = exporter.render(SubtitleFormat::Vtt).unwrap();
    assert!(vtt.starts_with("WEBVTT\n\n00:00:03.000 --> 00:00:05.000\nIntro\n\n"));
}

#[test]
fn test_srt_export_reimports() {
    let (store, session_id) = imported_session();
    let cues = store.get_session(&session_id).unwrap().subtitles();

    let reimported = parse_srt(&to_srt(cues)).unwrap();
    assert_eq!(reimported.len(), cues.len());
    for (a, b) in reimported.iter().zip(cues.iter()) {
        assert_eq!((a.start_time, a.end_time, a.text.as_str()), (b.start_time, b.end_time, b.text.as_str()));
    }
}

#[tokio::test(start_paused = true)]
async fn test_debounced_typing_commits_final_text() {
    let (mut store, session_id) = imported_session();
    let cue_id = store.get_session(&session_id).unwrap().subtitles()[0].id.clone();
    let (debouncer, mut commits) = Debouncer::new(Duration::from_millis(2000));

    for partial in ["F", "Fi", "Fix", "Fixed line"] {
        debouncer.schedule((cue_id.clone(), CueField::Text), partial.to_string());
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    debouncer.schedule((cue_id.clone(), CueField::Start), "00:00:04.5".to_string());

    let mut committed = 0;
    while committed < 2 {
        let ((id, field), raw) = commits.recv().await.unwrap();
        let patch = CuePatch::parse_field(field, &raw).unwrap();
        assert!(store.update_cue(&session_id, &id, patch));
        committed += 1;
    }

    let cue = &store.get_session(&session_id).unwrap().subtitles()[0];
    assert_eq!(cue.text, "Fixed line");
    assert_eq!(cue.start_time, 4500);
    assert_eq!(format_time(cue.start_time), "00:00:04.500");
    assert!(commits.try_recv().is_err());
}

#[test]
fn test_time_text_round_trip() {
    for ms in [0, 1, 999, 59_999, 3_600_000, 86_399_999] {
        assert_eq!(parse_time(&format_time(ms)), ms);
    }
}
