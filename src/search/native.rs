//! In-process line matcher.
//!
//! Matching is case-insensitive and literal. ASCII lines against ASCII
//! keywords go through a lowercased `memmem` search; anything else uses an
//! escaped case-insensitive regex so Unicode case folding is honored.

use super::cancel::CancellationToken;
use super::types::{LineHit, MatchSpan};
use super::{FileResult, LineMatcher};
use crate::error::{MatcherError, ScanWarning, SearchError, WarningKind};
use crate::query::Keyword;
use crate::scope::Candidate;
use crate::utils::encoding::{decode, is_binary, is_clean_utf8, SNIFF_SIZE};
use memchr::memmem;
use memmap2::Mmap;
use regex::{Regex, RegexBuilder};
use std::fs::File;
use std::ops::Deref;
use std::path::Path;

/// Files at least this large are memory-mapped instead of read.
const MMAP_THRESHOLD: u64 = 64 * 1024;

struct KeywordMatcher {
    /// Lowercased needle, present when the keyword is ASCII
    finder: Option<memmem::Finder<'static>>,
    regex: Regex,
}

impl KeywordMatcher {
    fn new(text: &str) -> Result<Self, SearchError> {
        let finder = text
            .is_ascii()
            .then(|| memmem::Finder::new(text.to_ascii_lowercase().as_bytes()).into_owned());
        let regex = RegexBuilder::new(&regex::escape(text))
            .case_insensitive(true)
            .build()
            .map_err(|e| SearchError::Config(format!("keyword {:?}: {}", text, e)))?;
        Ok(Self { finder, regex })
    }

    /// First occurrence not overlapping `taken`, else the first occurrence.
    ///
    /// The fallback may overlap an earlier keyword's span. The line already
    /// contains every keyword, so it still gets one span per keyword.
    fn pick(&self, line: &str, lowered: Option<&[u8]>, taken: &[MatchSpan]) -> Option<(usize, usize)> {
        let free = |start: usize, end: usize| {
            !taken.iter().any(|s| start < s.end && s.start < end)
        };
        let mut first = None;

        match (&self.finder, lowered) {
            (Some(finder), Some(hay)) => {
                let len = finder.needle().len();
                for start in finder.find_iter(hay) {
                    let end = start + len;
                    first.get_or_insert((start, end));
                    if free(start, end) {
                        return Some((start, end));
                    }
                }
            }
            _ => {
                for m in self.regex.find_iter(line) {
                    first.get_or_insert((m.start(), m.end()));
                    if free(m.start(), m.end()) {
                        return Some((m.start(), m.end()));
                    }
                }
            }
        }

        first
    }

    fn find_all(&self, text: &str) -> Vec<(usize, usize)> {
        self.regex.find_iter(text).map(|m| (m.start(), m.end())).collect()
    }
}

/// Compiled form of a parsed query.
pub struct KeywordSet {
    matchers: Vec<KeywordMatcher>,
}

impl KeywordSet {
    pub fn new(keywords: &[Keyword]) -> Result<Self, SearchError> {
        let matchers = keywords
            .iter()
            .map(|k| KeywordMatcher::new(&k.text))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { matchers })
    }

    /// An empty set matches every non-blank line.
    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    /// Spans for every keyword if all of them occur in `line`.
    ///
    /// `scratch` is reused across lines to hold the lowercased line.
    pub fn match_line(&self, line: &str, scratch: &mut Vec<u8>) -> Option<Vec<MatchSpan>> {
        if self.is_empty() {
            return (!line.trim().is_empty()).then(Vec::new);
        }

        let lowered = if line.is_ascii() {
            scratch.clear();
            scratch.extend(line.bytes().map(|b| b.to_ascii_lowercase()));
            Some(scratch.as_slice())
        } else {
            None
        };

        let mut spans: Vec<MatchSpan> = Vec::with_capacity(self.matchers.len());
        for (idx, matcher) in self.matchers.iter().enumerate() {
            let (start, end) = matcher.pick(line, lowered, &spans)?;
            spans.push(MatchSpan::new(idx, start, end));
        }

        spans.sort_by_key(|s| (s.start, s.keyword));
        Some(spans)
    }

    /// Every occurrence of keyword `idx` in `text`, for painting highlights.
    pub fn find_all(&self, idx: usize, text: &str) -> Vec<(usize, usize)> {
        self.matchers
            .get(idx)
            .map(|m| m.find_all(text))
            .unwrap_or_default()
    }
}

/// Match every line of `text`.
pub fn match_text(path: &Path, text: &str, set: &KeywordSet) -> Vec<LineHit> {
    let mut scratch = Vec::new();
    text.lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            set.match_line(line, &mut scratch).map(|spans| LineHit {
                path: path.to_path_buf(),
                line_number: idx + 1,
                text: line.to_string(),
                spans,
                view: None,
            })
        })
        .collect()
}

enum Content {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for Content {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Content::Mapped(map) => map,
            Content::Owned(bytes) => bytes,
        }
    }
}

fn read_content(path: &Path, size: u64) -> std::io::Result<Content> {
    if size >= MMAP_THRESHOLD {
        let file = File::open(path)?;
        // The file is only read; a concurrent truncation surfaces as a bus
        // error the same way it would for any mmap reader.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Content::Mapped(map))
    } else {
        Ok(Content::Owned(std::fs::read(path)?))
    }
}

fn unreadable(candidate: &Candidate, e: std::io::Error) -> ScanWarning {
    ScanWarning::new(&candidate.path, WarningKind::Unreadable, e.to_string())
}

fn match_content(candidate: &Candidate, content: &[u8], set: &KeywordSet) -> FileResult {
    if is_binary(content) {
        return Err(ScanWarning::new(
            &candidate.path,
            WarningKind::Binary,
            "binary content",
        ));
    }
    let text = decode(content, candidate.encoding).ok_or_else(|| {
        ScanWarning::new(
            &candidate.path,
            WarningKind::Undecodable,
            format!("not valid {}", candidate.encoding.name()),
        )
    })?;
    Ok(match_text(&candidate.path, &text, set))
}

fn with_view(candidate: &Candidate, mut hits: Vec<LineHit>) -> Vec<LineHit> {
    for hit in &mut hits {
        hit.view = candidate.view;
    }
    hits
}

/// Match one candidate from its buffer or from disk.
pub fn search_candidate(candidate: &Candidate, set: &KeywordSet) -> FileResult {
    let hits = match &candidate.buffer {
        Some(text) => match_text(&candidate.path, text, set),
        None => {
            let content = read_content(&candidate.path, candidate.size).map_err(|e| unreadable(candidate, e))?;
            match_content(candidate, &content, set)?
        }
    };
    Ok(with_view(candidate, hits))
}

/// Match a file natively when its content past the classification sample
/// is not clean UTF-8.
///
/// ugrep skips such a file without a word under `-I -s`, so its answer for
/// it cannot be trusted. Returns `None` when the whole file is clean, or
/// was fully covered by the sample, and the external result stands.
pub fn recheck_unclean(candidate: &Candidate, set: &KeywordSet) -> Option<FileResult> {
    if candidate.buffer.is_some() || candidate.size <= SNIFF_SIZE as u64 {
        return None;
    }
    let content = match read_content(&candidate.path, candidate.size) {
        Ok(content) => content,
        Err(e) => return Some(Err(unreadable(candidate, e))),
    };
    if is_clean_utf8(&content) {
        return None;
    }
    Some(match_content(candidate, &content, set).map(|hits| with_view(candidate, hits)))
}

/// Strategy that never leaves the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeMatcher;

impl LineMatcher for NativeMatcher {
    fn name(&self) -> &'static str {
        "native"
    }

    fn search_batch(
        &self,
        candidates: &[&Candidate],
        set: &KeywordSet,
        _keywords: &[Keyword],
        token: &CancellationToken,
    ) -> Result<Vec<FileResult>, MatcherError> {
        let mut results = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if token.is_cancelled() {
                return Err(MatcherError::Cancelled);
            }
            results.push(search_candidate(candidate, set));
        }
        Ok(results)
    }
}
