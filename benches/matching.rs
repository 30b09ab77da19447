//! Line matching benchmarks
//!
//! Run with: cargo bench --bench matching

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use linenav::config::Settings;
use linenav::host::MemoryHost;
use linenav::query::parse_keywords;
use linenav::scope::{ResolveOptions, Scope};
use linenav::search::native::match_text;
use linenav::search::{KeywordSet, SearchEngine, SearchTicket};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Create a folder of source-like files for benchmarking
fn create_benchmark_fixtures() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let root_path = temp_dir.path().to_path_buf();

    for i in 0..200 {
        let content = format!(
            r#"// File {i}
fn handler_{i}(request: Request) -> Result<Response, Error> {{
    let timeout = Duration::from_secs({i});
    if request.expired(timeout) {{
        return Err(Error::new("error message: request timeout"));
    }}
    log::debug!("handled request {i}");
    Ok(Response::default())
}}
"#,
            i = i
        );
        let dir = root_path.join(format!("mod_{}", i % 10));
        fs::create_dir_all(&dir).expect("Failed to create dir");
        fs::write(dir.join(format!("file_{}.rs", i)), content.repeat(20)).expect("Failed to write file");
    }

    (temp_dir, root_path)
}

fn bench_keyword_parsing(c: &mut Criterion) {
    let queries = vec![
        "simple",
        "two words",
        "`exact phrase` word",
        "「全角」 keyword “curly”",
        "many small keywords in one long query string",
    ];

    let mut group = c.benchmark_group("keyword_parsing");
    for query in queries {
        group.bench_with_input(BenchmarkId::from_parameter(query), &query, |b, &q| {
            b.iter(|| parse_keywords(black_box(q)))
        });
    }
    group.finish();
}

fn bench_match_text(c: &mut Criterion) {
    let text = "fn main() { let timeout = 5; report(\"error message\"); }\nplain line\n".repeat(5_000);

    let mut group = c.benchmark_group("match_text");
    for query in ["timeout", "error timeout", "`error message` timeout main"] {
        let set = KeywordSet::new(&parse_keywords(query)).expect("valid keywords");
        group.bench_with_input(BenchmarkId::from_parameter(query), &set, |b, set| {
            b.iter(|| match_text(Path::new("bench.rs"), black_box(&text), set))
        });
    }
    group.finish();
}

fn bench_folder_search(c: &mut Criterion) {
    let (_temp_dir, root_path) = create_benchmark_fixtures();
    let settings = Settings {
        use_accelerated_matcher: false,
        ..Settings::default()
    };
    let engine = SearchEngine::new(&settings).expect("Failed to build engine");
    let host = MemoryHost::new();
    let scope = Scope::Folder(root_path);
    let keywords = parse_keywords("`error message` timeout");

    let mut group = c.benchmark_group("folder_search");

    group.bench_function("uncached", |b| {
        b.iter(|| {
            engine.cache().invalidate();
            engine.sniff_cache().clear();
            engine.search(
                &host,
                black_box(&scope),
                &keywords,
                ResolveOptions::from_settings(&settings, true),
                &SearchTicket::detached(),
            )
        })
    });

    group.bench_function("cached", |b| {
        b.iter(|| {
            engine.search(
                &host,
                black_box(&scope),
                &keywords,
                ResolveOptions::from_settings(&settings, true),
                &SearchTicket::detached(),
            )
        })
    });

    group.finish();
}

criterion_group!(benches, bench_keyword_parsing, bench_match_text, bench_folder_search);

criterion_main!(benches);
