use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cloudplay::lyrics::LyricTrack;

fn build_lrc(lines: usize) -> String {
    (0..lines)
        .map(|i| {
            let secs = i as f64 * 2.5;
            format!("[{:02}:{:05.2}]line {}\n", (secs / 60.0) as u64, secs % 60.0, i)
        })
        .collect()
}

fn bench_parse(c: &mut Criterion) {
    let raw = build_lrc(400);
    c.bench_function("lyrics_parse_400", |b| {
        b.iter(|| LyricTrack::parse(black_box(&raw)))
    });
}

fn bench_resolve(c: &mut Criterion) {
    let track = LyricTrack::parse(&build_lrc(400));

    // One second ticks across the whole song, as the progress clock does
    c.bench_function("resolve_active_forward", |b| {
        b.iter(|| {
            let mut last = None;
            for t in 0..1000 {
                last = track.resolve_active(black_box(t as f64), last);
            }
            last
        })
    });

    c.bench_function("resolve_active_after_seek", |b| {
        b.iter(|| track.resolve_active(black_box(12.0), Some(390)))
    });
}

criterion_group!(benches, bench_parse, bench_resolve);
criterion_main!(benches);
