//! Display formatting benchmarks
//!
//! Run with: cargo bench --bench formatting

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use linenav::format::{fit_window, ResultFormatter, WidthIndex};
use linenav::query::parse_keywords;
use linenav::scope::ScopeKind;
use linenav::search::native::match_text;
use linenav::search::{KeywordSet, LineHit};
use std::path::Path;

fn long_line(len: usize) -> String {
    let filler = "let value = compute(input, options).unwrap_or_default(); ";
    let mut line = filler.repeat(len / filler.len() + 1);
    line.truncate(len / 2);
    line.push_str(" error message ");
    line.push_str(&filler.repeat(len / filler.len() + 1)[..len / 2]);
    line.push_str(" timeout");
    line
}

fn hits_for(text: &str, query: &str) -> Vec<LineHit> {
    let set = KeywordSet::new(&parse_keywords(query)).expect("valid keywords");
    match_text(Path::new("bench.rs"), text, &set)
}

fn bench_width_index(c: &mut Criterion) {
    let ascii = long_line(2_000);
    let cjk = "検索結果の表示幅を計算する、".repeat(100);

    let mut group = c.benchmark_group("width_index");
    group.bench_function("ascii_2k", |b| b.iter(|| WidthIndex::new(black_box(&ascii))));
    group.bench_function("cjk_1400_chars", |b| b.iter(|| WidthIndex::new(black_box(&cjk))));
    group.finish();
}

fn bench_fit_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit_window");
    for len in [200usize, 2_000, 20_000] {
        let line = long_line(len);
        let hits = hits_for(&line, "`error message` timeout");
        let spans = hits[0].spans.clone();
        group.bench_with_input(BenchmarkId::from_parameter(len), &line, |b, line| {
            b.iter(|| fit_window(black_box(line), black_box(&spans), 120))
        });
    }
    group.finish();
}

fn bench_format_results(c: &mut Criterion) {
    let text: String = (0..5_000)
        .map(|i| {
            if i % 3 == 0 {
                format!("{} error {}\n", "x".repeat(i % 400), "y timeout ".repeat(i % 30))
            } else {
                format!("plain line {}\n", i)
            }
        })
        .collect();
    let hits = hits_for(&text, "error timeout");
    let formatter = ResultFormatter::new(100);

    c.bench_function("format_results", |b| {
        b.iter(|| formatter.format(black_box(&hits), ScopeKind::Folder))
    });
}

criterion_group!(benches, bench_width_index, bench_fit_window, bench_format_results);

criterion_main!(benches);
