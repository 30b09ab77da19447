//! End-to-end searches over temporary folder trees.

use linenav::config::Settings;
use linenav::error::SearchError;
use linenav::highlight::HighlightRegistry;
use linenav::host::MemoryHost;
use linenav::navigator::Navigator;
use linenav::query::parse_keywords;
use linenav::scope::{ResolveOptions, Scope, ScopeSpec};
use linenav::search::{SearchEngine, SearchTicket, UgrepMatcher};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn native_settings() -> Settings {
    Settings {
        use_accelerated_matcher: false,
        concurrency: 4,
        ..Settings::default()
    }
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn file_names(paths: impl IntoIterator<Item = PathBuf>) -> BTreeSet<String> {
    paths
        .into_iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn phrase_and_keyword_skip_blacklisted_extension() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.log", "an error message during timeout\n");
    write(dir.path(), "b.py", "ok\nan error message during timeout\ntimeout only\n");

    let host = Arc::new(MemoryHost::new());
    let registry = HighlightRegistry::new(host.clone());
    let navigator = Navigator::new(host, native_settings(), &registry).unwrap();

    let spec = ScopeSpec::new(Scope::Folder(dir.path().to_path_buf()));
    let results = navigator.run_query(&spec, "`error message` timeout").unwrap();
    let hits = results.outcome.hits();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].path.file_name().unwrap(), "b.py");
    assert_eq!(hits[0].line_number, 2);
    assert_eq!(hits[0].spans.len(), 2);

    let text = &hits[0].text;
    let matched: Vec<&str> = hits[0].spans.iter().map(|s| &text[s.start..s.end]).collect();
    assert_eq!(matched, vec!["error message", "timeout"]);
}

#[test]
fn has_extension_token_excludes_bare_names() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "README", "target line\n");
    write(dir.path(), "Makefile", "target: all\n");
    write(dir.path(), "main.py", "target = 1\n");

    let settings = Settings {
        file_extensions: vec![".".to_string()],
        ..native_settings()
    };
    let host = Arc::new(MemoryHost::new());
    let registry = HighlightRegistry::new(host.clone());
    let navigator = Navigator::new(host, settings, &registry).unwrap();

    let spec = ScopeSpec::new(Scope::Folder(dir.path().to_path_buf()));
    let results = navigator.run_query(&spec, "target").unwrap();

    let names = file_names(results.outcome.hits().iter().map(|h| h.path.clone()));
    assert_eq!(names, BTreeSet::from(["main.py".to_string()]));
}

#[test]
fn every_hit_contains_every_keyword() {
    let dir = TempDir::new().unwrap();
    for i in 0..20 {
        let content: String = (0..50)
            .map(|line| match (line + i) % 4 {
                0 => "Alpha beta gamma\n",
                1 => "alpha only\n",
                2 => "beta GAMMA and ALPHA\n",
                _ => "nothing here\n",
            })
            .collect();
        write(dir.path(), &format!("src/f{}.txt", i), &content);
    }

    let settings = native_settings();
    let engine = SearchEngine::new(&settings).unwrap();
    let host = MemoryHost::new();
    let keywords = parse_keywords("alpha gamma");

    let outcome = engine
        .search(
            &host,
            &Scope::Folder(dir.path().to_path_buf()),
            &keywords,
            ResolveOptions::from_settings(&settings, true),
            &SearchTicket::detached(),
        )
        .unwrap();

    assert_eq!(outcome.hits().len(), 20 * 25);
    for hit in outcome.hits() {
        let lower = hit.text.to_lowercase();
        assert!(lower.contains("alpha") && lower.contains("gamma"), "{:?}", hit.text);
        assert_eq!(hit.spans.len(), 2);
    }

    // Files in traversal order, lines ascending within a file
    let order: Vec<(PathBuf, usize)> = outcome
        .hits()
        .iter()
        .map(|h| (h.path.clone(), h.line_number))
        .collect();
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted);
}

#[test]
fn superseded_query_results_are_never_kept() {
    let dir = TempDir::new().unwrap();
    for i in 0..200 {
        let content = "first keyword line\nsecond keyword line\n".repeat(200);
        write(dir.path(), &format!("d{}/file{}.txt", i % 10, i), &content);
    }

    let host = Arc::new(MemoryHost::new());
    let registry = HighlightRegistry::new(host.clone());
    let navigator = Navigator::new(host, native_settings(), &registry).unwrap();
    let spec = ScopeSpec::new(Scope::Folder(dir.path().to_path_buf()));

    let newer = thread::scope(|s| {
        let older = s.spawn(|| navigator.run_query(&spec, "first"));
        thread::sleep(Duration::from_millis(5));
        let newer = navigator.run_query(&spec, "second").unwrap();

        match older.join().unwrap() {
            Ok(results) => assert!(results.outcome.hits().iter().all(|h| h.text.contains("first"))),
            Err(e) => assert!(matches!(e, SearchError::Cancelled), "{e}"),
        }
        newer
    });

    assert!(!newer.entries.is_empty());
    let kept = navigator.entries();
    assert_eq!(kept.len(), newer.entries.len());
    assert!(kept.iter().all(|e| e.text.contains("second")));
}

#[test]
fn cancelled_ticket_yields_no_results() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "x.txt", "needle\n");

    let settings = native_settings();
    let engine = SearchEngine::new(&settings).unwrap();
    let host = MemoryHost::new();
    let key = (None, linenav::scope::ScopeKind::Folder);

    let stale = engine.begin(key);
    let _fresh = engine.begin(key);
    assert!(stale.is_cancelled());

    let result = engine.search(
        &host,
        &Scope::Folder(dir.path().to_path_buf()),
        &parse_keywords("needle"),
        ResolveOptions::from_settings(&settings, true),
        &stale,
    );
    assert!(matches!(result, Err(SearchError::Cancelled)));
    assert_eq!(engine.cache().computations(), 0);
}

#[test]
fn concurrent_identical_searches_compute_once() {
    let dir = TempDir::new().unwrap();
    for i in 0..50 {
        write(dir.path(), &format!("f{}.txt", i), &"some text with a token\n".repeat(500));
    }

    let settings = native_settings();
    let engine = SearchEngine::new(&settings).unwrap();
    let host = MemoryHost::new();
    let keywords = parse_keywords("token");
    let scope = Scope::Folder(dir.path().to_path_buf());

    let counts: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    engine
                        .search(
                            &host,
                            &scope,
                            &keywords,
                            ResolveOptions::from_settings(&settings, true),
                            &SearchTicket::detached(),
                        )
                        .unwrap()
                        .hits()
                        .len()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(counts.iter().all(|&n| n == 50 * 500));
    assert_eq!(engine.cache().computations(), 1);
}

#[test]
fn modified_file_is_searched_again() {
    let dir = TempDir::new().unwrap();
    let path = write(dir.path(), "notes.md", "todo one\n");

    let host = Arc::new(MemoryHost::new());
    let registry = HighlightRegistry::new(host.clone());
    let navigator = Navigator::new(host, native_settings(), &registry).unwrap();
    let spec = ScopeSpec::new(Scope::Folder(dir.path().to_path_buf()));

    assert_eq!(navigator.run_query(&spec, "todo").unwrap().entries.len(), 1);
    fs::write(&path, "todo one\ntodo two and more text\n").unwrap();
    let results = navigator.run_query(&spec, "todo").unwrap();
    assert!(!results.outcome.from_cache);
    assert_eq!(results.entries.len(), 2);
}

#[test]
fn skipped_files_are_summarized() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "ok.txt", "value\n");
    fs::write(dir.path().join("blob.dat"), [0u8, 159, 146, 150, 0, 1, 2]).unwrap();

    let settings = Settings {
        file_extensions_blacklist: Vec::new(),
        ..native_settings()
    };
    let host = Arc::new(MemoryHost::new());
    let registry = HighlightRegistry::new(host.clone());
    let navigator = Navigator::new(host, settings, &registry).unwrap();

    let spec = ScopeSpec::new(Scope::Folder(dir.path().to_path_buf()));
    let results = navigator.run_query(&spec, "value").unwrap();
    assert_eq!(results.entries.len(), 1);
    assert!(results.outcome.skipped_summary().starts_with("1 file skipped"));
    assert!(results.summary().contains("1 file skipped"));
}

#[test]
fn accelerated_and_native_select_the_same_lines() {
    let Ok(matcher) = UgrepMatcher::locate(None, Duration::from_secs(30)) else {
        eprintln!("ugrep not installed, skipping");
        return;
    };

    let dir = TempDir::new().unwrap();
    write(dir.path(), "one.rs", "fn Error() {}\nlet timeout = error;\n// ERROR: timeout\n");
    write(dir.path(), "two.txt", "Error timeout\n\nerror-timeout\nnone\n");
    write(dir.path(), "three.md", "`error` and `timeout`\nerror only\n");
    write(dir.path(), "sub/four.py", "x = 'timeout' if error else None\n");

    let settings = Settings {
        concurrency: 2,
        ..Settings::default()
    };
    let native = SearchEngine::with_matcher(&settings, None).unwrap();
    let accelerated = SearchEngine::with_matcher(&settings, Some(matcher)).unwrap();
    let host = MemoryHost::new();
    let scope = Scope::Folder(dir.path().to_path_buf());

    for query in ["error timeout", "error", "`let timeout`", ""] {
        let keywords = parse_keywords(query);
        let run = |engine: &SearchEngine| {
            engine
                .search(
                    &host,
                    &scope,
                    &keywords,
                    ResolveOptions::from_settings(&settings, false),
                    &SearchTicket::detached(),
                )
                .unwrap()
        };
        let lines = |outcome: &linenav::search::SearchOutcome| -> Vec<(PathBuf, usize, Vec<(usize, usize)>)> {
            outcome
                .hits()
                .iter()
                .map(|h| {
                    let spans = h.spans.iter().map(|s| (s.start, s.end)).collect();
                    (h.path.clone(), h.line_number, spans)
                })
                .collect()
        };

        let expected = run(&native);
        let actual = run(&accelerated);
        assert_eq!(lines(&actual), lines(&expected), "query {:?}", query);
    }
}

#[test]
fn late_nul_or_invalid_utf8_is_not_lost_by_the_accelerated_matcher() {
    let Ok(matcher) = UgrepMatcher::locate(None, Duration::from_secs(30)) else {
        eprintln!("ugrep not installed, skipping");
        return;
    };

    let dir = TempDir::new().unwrap();
    let prefix = "filler line without the keyword\n".repeat(300);
    let mut nul = prefix.clone().into_bytes();
    nul.extend_from_slice(b"needle before\n\x00\nneedle after\n");
    fs::write(dir.path().join("late_nul.txt"), nul).unwrap();
    let mut latin = prefix.clone().into_bytes();
    latin.extend_from_slice(b"needle in a caf\xE9\n");
    fs::write(dir.path().join("late_latin1.txt"), latin).unwrap();
    write(dir.path(), "clean.txt", &format!("{}needle clean\n", prefix));

    let settings = Settings {
        concurrency: 2,
        ..Settings::default()
    };
    let native = SearchEngine::with_matcher(&settings, None).unwrap();
    let accelerated = SearchEngine::with_matcher(&settings, Some(matcher)).unwrap();
    let host = MemoryHost::new();
    let scope = Scope::Folder(dir.path().to_path_buf());
    let keywords = parse_keywords("needle");

    let run = |engine: &SearchEngine| {
        let outcome = engine
            .search(
                &host,
                &scope,
                &keywords,
                ResolveOptions::from_settings(&settings, false),
                &SearchTicket::detached(),
            )
            .unwrap();
        let hits: Vec<(PathBuf, usize, String)> = outcome
            .hits()
            .iter()
            .map(|h| (h.path.clone(), h.line_number, h.text.clone()))
            .collect();
        let mut warnings: Vec<(PathBuf, String)> = outcome
            .warnings
            .iter()
            .map(|w| (w.path.clone().unwrap_or_default(), w.kind.label().to_string()))
            .collect();
        warnings.sort();
        (hits, warnings)
    };

    let expected = run(&native);
    let actual = run(&accelerated);
    assert_eq!(actual, expected);

    let names = file_names(expected.0.iter().map(|(path, _, _)| path.clone()));
    assert!(names.contains("late_nul.txt"), "{:?}", names);
    assert!(names.contains("clean.txt"), "{:?}", names);
}

#[test]
fn repeated_search_does_not_reread_unchanged_files() {
    let dir = TempDir::new().unwrap();
    for i in 0..10 {
        write(dir.path(), &format!("f{}.txt", i), "some token here\n");
    }

    let settings = native_settings();
    let engine = SearchEngine::new(&settings).unwrap();
    let host = MemoryHost::new();
    let scope = Scope::Folder(dir.path().to_path_buf());
    let keywords = parse_keywords("token");
    let search = || {
        engine
            .search(
                &host,
                &scope,
                &keywords,
                ResolveOptions::from_settings(&settings, true),
                &SearchTicket::detached(),
            )
            .unwrap()
    };

    assert!(!search().from_cache);
    assert_eq!(engine.sniff_cache().reads(), 10);

    let again = search();
    assert!(again.from_cache);
    assert_eq!(again.hits().len(), 10);
    assert_eq!(engine.sniff_cache().reads(), 10);

    write(dir.path(), "f3.txt", "some token here\nand one more token\n");
    let changed = search();
    assert!(!changed.from_cache);
    assert_eq!(changed.hits().len(), 11);
    assert_eq!(engine.sniff_cache().reads(), 11);
}
