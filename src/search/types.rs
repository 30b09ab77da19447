use crate::error::ScanWarning;
use crate::host::ViewId;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Where one keyword matched, as byte offsets into [`LineHit::text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MatchSpan {
    /// Position of the keyword in the parsed query
    pub keyword: usize,
    pub start: usize,
    pub end: usize,
}

impl MatchSpan {
    pub fn new(keyword: usize, start: usize, end: usize) -> Self {
        Self { keyword, start, end }
    }

    pub fn overlaps(&self, other: &MatchSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A line satisfying every keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineHit {
    pub path: PathBuf,
    /// 1-based
    pub line_number: usize,
    /// Raw line without its terminator
    pub text: String,
    /// One span per keyword, sorted by start offset
    pub spans: Vec<MatchSpan>,
    /// Host view the line came from, if any
    #[serde(skip)]
    pub view: Option<ViewId>,
}

/// Which strategy produced a search's hits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Accelerated,
    #[default]
    Native,
    /// The accelerated matcher handled some files and the rest fell back
    Mixed,
}

impl MatchStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            MatchStrategy::Accelerated => "ugrep",
            MatchStrategy::Native => "native",
            MatchStrategy::Mixed => "ugrep+native",
        }
    }

    /// Combine the strategies of two parts of one search.
    pub fn merge(self, other: MatchStrategy) -> MatchStrategy {
        if self == other { self } else { MatchStrategy::Mixed }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything the match stage produced for one candidate list.
#[derive(Debug, Clone, Default)]
pub struct MatchSet {
    /// Grouped by file in candidate order, ascending line numbers per file
    pub hits: Vec<LineHit>,
    /// Files skipped while matching
    pub warnings: Vec<ScanWarning>,
    pub strategy: MatchStrategy,
    pub files_searched: usize,
}
