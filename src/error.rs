//! Error and warning types shared across the search pipeline.
//!
//! Every failure has a fixed recovery:
//!
//! | Failure                 | Recovery                                        |
//! |-------------------------|-------------------------------------------------|
//! | unreadable file or dir  | skip it, record a [`ScanWarning`], continue     |
//! | binary / undecodable    | skip it, record a [`ScanWarning`], continue     |
//! | [`MatcherError`]        | fall back to the native strategy, log at debug |
//! | malformed query         | never raised, the parser degrades to literals   |
//! | [`HostError`] on erase  | log it and force-remove the highlight record    |
//! | [`SearchError::Cancelled`] | discard partial results, nothing shown      |

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a single search invocation.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A newer query for the same view and scope superseded this one.
    #[error("search superseded by a newer query")]
    Cancelled,

    /// The requested scope could not be turned into any root (no active
    /// view, no folder configured, empty project).
    #[error("nothing to search: {0}")]
    NoScope(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SearchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SearchError::Cancelled)
    }
}

/// Failures of the external accelerated matcher. None of these reach the
/// user: the engine reruns the affected files with the native strategy.
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("matcher executable not available")]
    Unavailable,

    #[error("failed to start matcher: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("matcher exited with status {0}")]
    ExitStatus(i32),

    #[error("unparseable matcher output line: {0:?}")]
    Malformed(String),

    #[error("matcher timed out after {0}s")]
    TimedOut(u64),

    #[error("matcher run cancelled")]
    Cancelled,
}

/// Failure reported by the host when applying or removing regions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("view {0} is no longer valid")]
    InvalidView(u64),

    #[error("host rejected region update: {0}")]
    Rejected(String),
}

/// Why a file was skipped during resolution or matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    /// Permission denied, vanished file, symlink loop, walk error.
    Unreadable,
    /// Content sniffing flagged the file as binary.
    Binary,
    /// No supported encoding could decode the file.
    Undecodable,
    /// File exceeds the configured size ceiling.
    TooLarge,
}

impl WarningKind {
    pub fn label(&self) -> &'static str {
        match self {
            WarningKind::Unreadable => "unreadable",
            WarningKind::Binary => "binary",
            WarningKind::Undecodable => "undecodable",
            WarningKind::TooLarge => "too large",
        }
    }
}

/// A recoverable, per-file problem aggregated at the end of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanWarning {
    pub path: Option<PathBuf>,
    pub kind: WarningKind,
    pub message: String,
}

impl ScanWarning {
    pub fn new(path: impl Into<PathBuf>, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            kind,
            message: message.into(),
        }
    }

    /// A warning that is not tied to a single path (e.g. a walk error
    /// that `ignore` could not attribute).
    pub fn detached(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            path: None,
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} ({}): {}", path.display(), self.kind.label(), self.message),
            None => write!(f, "({}): {}", self.kind.label(), self.message),
        }
    }
}

/// Render the user-facing summary for a set of warnings, e.g.
/// `"3 files skipped (2 binary, 1 unreadable)"`. Empty when nothing was
/// skipped.
pub fn skipped_summary(warnings: &[ScanWarning]) -> String {
    if warnings.is_empty() {
        return String::new();
    }

    let order = [
        WarningKind::Binary,
        WarningKind::Undecodable,
        WarningKind::TooLarge,
        WarningKind::Unreadable,
    ];
    let parts: Vec<String> = order
        .iter()
        .filter_map(|kind| {
            let count = warnings.iter().filter(|w| w.kind == *kind).count();
            (count > 0).then(|| format!("{} {}", count, kind.label()))
        })
        .collect();

    let noun = if warnings.len() == 1 { "file" } else { "files" };
    format!("{} {} skipped ({})", warnings.len(), noun, parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipped_summary_empty() {
        assert_eq!(skipped_summary(&[]), "");
    }

    #[test]
    fn test_skipped_summary_groups_kinds() {
        let warnings = vec![
            ScanWarning::new("a.bin", WarningKind::Binary, "nul bytes"),
            ScanWarning::new("b.bin", WarningKind::Binary, "nul bytes"),
            ScanWarning::new("c.txt", WarningKind::Unreadable, "permission denied"),
        ];
        assert_eq!(
            skipped_summary(&warnings),
            "3 files skipped (2 binary, 1 unreadable)"
        );
    }

    #[test]
    fn test_skipped_summary_singular() {
        let warnings = vec![ScanWarning::detached(WarningKind::Unreadable, "loop")];
        assert_eq!(skipped_summary(&warnings), "1 file skipped (1 unreadable)");
    }

    #[test]
    fn test_cancelled_predicate() {
        assert!(SearchError::Cancelled.is_cancelled());
        assert!(!SearchError::NoScope("x".into()).is_cancelled());
    }
}
