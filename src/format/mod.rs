//! Display entries for matched lines.
//!
//! Each [`LineHit`] becomes one [`DisplayEntry`] whose text never exceeds
//! the configured width. Long lines are cut to a window around their
//! matches (see [`segment`]) and the match spans are remapped into the
//! shown text. A line whose matches cannot all be shown still keeps at
//! least one of them on screen and reports how many were hidden.

pub mod segment;
pub mod width;

pub use segment::{fit_window, Window, ELLIPSIS};
pub use width::{str_width, WidthIndex};

use crate::config::Settings;
use crate::host::ViewId;
use crate::query::PALETTE_SIZE;
use crate::scope::ScopeKind;
use crate::search::{LineHit, MatchSpan};
use rayon::prelude::*;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Narrowest width the formatter accepts.
pub const MIN_DISPLAY_WIDTH: usize = 8;

const MAX_FILE_NAME: usize = 50;

/// A match span in [`DisplayEntry::text`] coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplaySpan {
    pub keyword: usize,
    pub color_index: usize,
    pub start: usize,
    pub end: usize,
    /// Part of the match lies outside the shown text
    pub clipped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryHeader {
    pub line_number: Option<usize>,
    /// 1-based position in the result list
    pub index: usize,
    /// Absent for single-file searches
    pub file_name: Option<String>,
}

impl fmt::Display for EntryHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line_number {
            write!(f, "{} ", line)?;
        }
        write!(f, "#{}", self.index)?;
        if let Some(name) = &self.file_name {
            write!(f, " {}", name)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayEntry {
    pub header: EntryHeader,
    pub text: String,
    pub spans: Vec<DisplaySpan>,
    /// The shown text is a window of the line
    pub windowed: bool,
    /// Some match was clipped or hidden to respect the width
    pub truncated: bool,
    pub hidden_spans: usize,
    /// Byte range of the raw line that `text` shows
    pub source: Range<usize>,
    pub path: PathBuf,
    pub line_number: usize,
    #[serde(skip)]
    pub view: Option<ViewId>,
}

impl DisplayEntry {
    pub fn width(&self) -> usize {
        str_width(&self.text)
    }
}

pub struct ResultFormatter {
    max_width: usize,
    show_line_numbers: bool,
}

impl ResultFormatter {
    pub fn new(max_width: usize) -> Self {
        Self {
            max_width: max_width.max(MIN_DISPLAY_WIDTH),
            show_line_numbers: true,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.max_display_length).with_line_numbers(settings.show_line_numbers)
    }

    pub fn with_line_numbers(mut self, show: bool) -> Self {
        self.show_line_numbers = show;
        self
    }

    pub fn max_width(&self) -> usize {
        self.max_width
    }

    /// Format hits in order. Entry `i` describes `hits[i]`.
    pub fn format(&self, hits: &[LineHit], scope: ScopeKind) -> Vec<DisplayEntry> {
        hits.par_iter()
            .enumerate()
            .map(|(position, hit)| self.format_hit(hit, position, scope))
            .collect()
    }

    pub fn format_hit(&self, hit: &LineHit, position: usize, scope: ScopeKind) -> DisplayEntry {
        let (offset, line) = strip(&hit.text);
        let line = sanitize(line);
        let spans = local_spans(&hit.spans, offset, line.len());

        let window = fit_window(&line, &spans, self.max_width);
        let shift = if window.leading { ELLIPSIS.len() } else { 0 };

        let mut text = String::with_capacity(window.end - window.start + 2 * ELLIPSIS.len());
        if window.leading {
            text.push_str(ELLIPSIS);
        }
        text.push_str(&line[window.start..window.end]);
        if window.trailing {
            text.push_str(ELLIPSIS);
        }

        let mut shown = Vec::with_capacity(spans.len());
        let mut hidden_spans = 0;
        for span in &spans {
            let start = span.start.max(window.start);
            let end = span.end.min(window.end);
            if start >= end {
                hidden_spans += 1;
                continue;
            }
            shown.push(DisplaySpan {
                keyword: span.keyword,
                color_index: span.keyword % PALETTE_SIZE,
                start: start - window.start + shift,
                end: end - window.start + shift,
                clipped: start != span.start || end != span.end,
            });
        }

        DisplayEntry {
            header: EntryHeader {
                line_number: self.show_line_numbers.then_some(hit.line_number),
                index: position + 1,
                file_name: (scope != ScopeKind::CurrentFile).then(|| file_label(&hit.path)),
            },
            truncated: window.truncated || hidden_spans > 0 || shown.iter().any(|s| s.clipped),
            windowed: window.is_partial(),
            spans: shown,
            hidden_spans,
            source: offset + window.start..offset + window.end,
            text,
            path: hit.path.clone(),
            line_number: hit.line_number,
            view: hit.view,
        }
    }
}

/// Trim surrounding whitespace, returning the byte offset of what is left.
fn strip(line: &str) -> (usize, &str) {
    let rest = line.trim_start();
    (line.len() - rest.len(), rest.trim_end())
}

/// Replace ASCII control characters, tabs included, with spaces.
fn sanitize(line: &str) -> Cow<'_, str> {
    if line.bytes().any(|b| b.is_ascii_control()) {
        Cow::Owned(
            line.chars()
                .map(|c| if c.is_ascii_control() { ' ' } else { c })
                .collect(),
        )
    } else {
        Cow::Borrowed(line)
    }
}

/// Spans shifted into the stripped line, dropping any that fall outside it.
fn local_spans(spans: &[MatchSpan], offset: usize, len: usize) -> Vec<MatchSpan> {
    spans
        .iter()
        .filter_map(|s| {
            let start = s.start.saturating_sub(offset).min(len);
            let end = s.end.saturating_sub(offset).min(len);
            (start < end).then(|| MatchSpan::new(s.keyword, start, end))
        })
        .collect()
}

fn file_label(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    if name.chars().count() > MAX_FILE_NAME {
        let kept: String = name.chars().take(MAX_FILE_NAME - 3).collect();
        format!("{}...", kept)
    } else {
        name
    }
}
