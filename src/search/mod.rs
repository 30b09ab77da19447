//! Line matching over resolved candidates.
//!
//! ## Modules
//!
//! - [`native`] - In-process matcher, always available
//! - [`ugrep`] - External accelerated matcher
//! - [`engine`] - Strategy dispatch, worker pool, supersession
//! - [`cache`] - Result memoization by fingerprint
//! - [`cancel`] - Cancellation tokens
//!
//! Both matchers implement [`LineMatcher`] and must select the same lines
//! for the same input; the accelerated one only exists for speed.

pub mod cache;
pub mod cancel;
pub mod engine;
pub mod native;
pub mod types;
pub mod ugrep;

pub use cache::SearchCache;
pub use cancel::{CancellationHandle, CancellationToken, SearchTicket};
pub use engine::{SearchEngine, SearchKey, SearchOutcome};
pub use native::{KeywordSet, NativeMatcher};
pub use types::{LineHit, MatchSet, MatchSpan, MatchStrategy};
pub use ugrep::UgrepMatcher;

use crate::error::{MatcherError, ScanWarning};
use crate::query::Keyword;
use crate::scope::Candidate;

/// Outcome for a single file: its hits, or why it was skipped.
pub type FileResult = Result<Vec<LineHit>, ScanWarning>;

/// A strategy that matches a batch of files.
pub trait LineMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Match every candidate, returning one result per candidate in the
    /// same order. An `Err` means the whole batch must be retried with
    /// another strategy.
    fn search_batch(
        &self,
        candidates: &[&Candidate],
        set: &KeywordSet,
        keywords: &[Keyword],
        token: &CancellationToken,
    ) -> Result<Vec<FileResult>, MatcherError>;
}
