use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ytsub::subtitles::export::{to_srt, to_vtt};
use ytsub::subtitles::{format_time, parse_time, Cue, CueList};

fn cue_list(count: u64) -> CueList {
    CueList::from_cues(
        (0..count)
            .map(|i| Cue::new(i as usize, i * 2500, i * 2500 + 2000, format!("Line number {}", i)))
            .collect(),
    )
}

fn bench_editing(c: &mut Criterion) {
    let cues = cue_list(300);
    let middle = cues[150].id.clone();

    c.bench_function("insert_after_300_cues", |b| {
        b.iter(|| {
            let mut cues = cues.clone();
            black_box(cues.insert_after(&middle))
        })
    });

    c.bench_function("duplicate_then_delete_300_cues", |b| {
        b.iter(|| {
            let mut cues = cues.clone();
            if let Some(id) = cues.duplicate_line(&middle) {
                black_box(cues.delete_line(&id));
            }
        })
    });

    c.bench_function("cue_at_lookup", |b| {
        b.iter(|| black_box(cues.cue_at(black_box(600_000.0))))
    });
}

fn bench_formats(c: &mut Criterion) {
    let cues = cue_list(300);

    c.bench_function("srt_export_300_cues", |b| b.iter(|| black_box(to_srt(&cues))));
    c.bench_function("vtt_export_300_cues", |b| b.iter(|| black_box(to_vtt(&cues))));

    c.bench_function("time_text_round_trip", |b| {
        b.iter(|| {
            for ms in [0_u64, 59_999, 3_723_456] {
                black_box(parse_time(&format_time(black_box(ms))));
            }
        })
    });
}

criterion_group!(benches, bench_editing, bench_formats);
criterion_main!(benches);
