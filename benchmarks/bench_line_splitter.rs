use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use chantail::parser::ChannelParser;
use chantail::splitter::split_lines;

fn chat_log(lines: usize) -> Vec<u8> {
    let mut log = String::from("=== CHANNEL: fleet ===\n");
    for i in 0..lines {
        log.push_str(&format!(
            "[ 2024.03.01 18:{:02}:{:02} ] Pilot {} > align to the gate and wait for the cyno\n",
            (i / 60) % 60,
            i % 60,
            i % 25
        ));
    }
    log.into_bytes()
}

fn bench_split_single_read(c: &mut Criterion) {
    let log = chat_log(1_000);
    let empty: &[u8] = &[];
    c.bench_function("split_single_read", |b| {
        b.iter(|| {
            black_box(split_lines(black_box(empty), black_box(&log)));
        });
    });
}

fn bench_split_small_appends(c: &mut Criterion) {
    let log = chat_log(1_000);
    // Chunks that rarely line up with line boundaries
    c.bench_function("split_small_appends", |b| {
        b.iter(|| {
            let mut pending = Vec::new();
            let mut count = 0;
            for chunk in log.chunks(37) {
                let split = split_lines(&pending, chunk);
                count += split.lines.len();
                pending = split.fragment;
            }
            black_box(count);
        });
    });
}

fn bench_split_and_parse(c: &mut Criterion) {
    let log = chat_log(1_000);
    c.bench_function("split_and_parse", |b| {
        b.iter(|| {
            let mut parser = ChannelParser::new();
            for line in split_lines(&[], &log).lines {
                let _ = black_box(parser.parse(&line));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_split_single_read,
    bench_split_small_appends,
    bench_split_and_parse
);
criterion_main!(benches);
