//! Search orchestration: resolve, match, cache, supersede.
//!
//! Work runs on a dedicated rayon pool sized by `concurrency`. Each unit of
//! work (one file, or one batch of files for the external matcher) writes
//! into its own slot of an indexed collect, so the final order is the scope
//! traversal order no matter which worker finishes first.

use super::cache::{fingerprint, keyword_fingerprint, modification_stamp, SearchCache};
use super::cancel::{CancellationToken, SearchTicket, Supersession};
use super::native::{KeywordSet, NativeMatcher};
use super::types::{LineHit, MatchSet, MatchStrategy};
use super::ugrep::{UgrepMatcher, BATCH_SIZE};
use super::{FileResult, LineMatcher};
use crate::config::Settings;
use crate::error::{skipped_summary, MatcherError, ScanWarning, SearchError, WarningKind};
use crate::host::{BufferSource, ViewId};
use crate::query::Keyword;
use crate::scope::{Candidate, ResolveOptions, Scope, ScopeKind, ScopeResolver, SniffCache};
use encoding_rs::UTF_8;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Searches supersede each other per view and scope kind.
pub type SearchKey = (Option<ViewId>, ScopeKind);

/// A finished search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub scope: ScopeKind,
    pub keywords: Vec<Keyword>,
    pub matches: Arc<MatchSet>,
    /// Resolution and match warnings combined
    pub warnings: Vec<ScanWarning>,
    pub candidates: usize,
    pub elapsed: Duration,
    pub from_cache: bool,
    pub generation: u64,
}

impl SearchOutcome {
    pub fn hits(&self) -> &[LineHit] {
        &self.matches.hits
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.matches.strategy
    }

    /// "N files skipped (...)", empty when nothing was skipped.
    pub fn skipped_summary(&self) -> String {
        skipped_summary(&self.warnings)
    }
}

/// How one unit of work is matched.
enum Unit<'c> {
    Skip(ScanWarning),
    Native(&'c Candidate),
    Batch(Vec<&'c Candidate>),
}

pub struct SearchEngine {
    pool: ThreadPool,
    accelerated: Option<UgrepMatcher>,
    cache: SearchCache,
    sniffs: SniffCache,
    searches: Supersession<SearchKey>,
}

impl SearchEngine {
    pub fn new(settings: &Settings) -> Result<Self, SearchError> {
        let accelerated = if settings.use_accelerated_matcher {
            match UgrepMatcher::locate(settings.matcher_path.as_deref(), settings.matcher_timeout()) {
                Ok(matcher) => {
                    debug!(program = %matcher.program().display(), "Using accelerated matcher");
                    Some(matcher)
                }
                Err(e) => {
                    debug!("Accelerated matcher unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self::with_matcher(settings, accelerated)
    }

    /// Build an engine with an explicit accelerated matcher, or none.
    pub fn with_matcher(settings: &Settings, accelerated: Option<UgrepMatcher>) -> Result<Self, SearchError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(settings.effective_concurrency())
            .thread_name(|i| format!("linenav-worker-{}", i))
            .build()
            .map_err(|e| SearchError::Config(format!("worker pool: {}", e)))?;

        Ok(Self {
            pool,
            accelerated,
            cache: SearchCache::new(settings.cache_capacity),
            sniffs: SniffCache::default(),
            searches: Supersession::new(),
        })
    }

    pub fn has_accelerated(&self) -> bool {
        self.accelerated.is_some()
    }

    pub fn cache(&self) -> &SearchCache {
        &self.cache
    }

    pub fn sniff_cache(&self) -> &SniffCache {
        &self.sniffs
    }

    /// Start a search under `key`, cancelling the one it replaces.
    pub fn begin(&self, key: SearchKey) -> SearchTicket {
        self.searches.begin(key)
    }

    /// Cancel whatever is in flight for `view`.
    pub fn cancel_view(&self, view: Option<ViewId>) {
        self.searches.cancel_where(|(v, _)| *v == view);
    }

    /// Run a search that supersedes any earlier one under `key`.
    ///
    /// A search that was superseded while running returns
    /// [`SearchError::Cancelled`] even if it got to the end; its results
    /// are never handed out.
    pub fn run(
        &self,
        key: SearchKey,
        host: &dyn BufferSource,
        scope: &Scope,
        keywords: &[Keyword],
        options: ResolveOptions,
    ) -> Result<SearchOutcome, SearchError> {
        let ticket = self.begin(key);
        let result = self.search(host, scope, keywords, options, &ticket);
        let current = self.searches.is_current(&key, ticket.generation);
        self.searches.finish(&key, ticket.generation);

        match result {
            Ok(outcome) if current && !ticket.is_cancelled() => Ok(outcome),
            Ok(_) => {
                debug!(generation = ticket.generation, "Discarding superseded results");
                Err(SearchError::Cancelled)
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve `scope` and match it, consulting the cache.
    pub fn search(
        &self,
        host: &dyn BufferSource,
        scope: &Scope,
        keywords: &[Keyword],
        options: ResolveOptions,
        ticket: &SearchTicket,
    ) -> Result<SearchOutcome, SearchError> {
        let started = Instant::now();
        let token = &ticket.token;

        let resolver = ScopeResolver::new(host, options)
            .with_token(token.clone())
            .with_sniff_cache(&self.sniffs);
        let resolution = self.pool.install(|| resolver.resolve(scope))?;
        let set = KeywordSet::new(keywords)?;

        let kind = scope.kind();
        let paths: Vec<_> = resolution.candidates.iter().map(|c| &c.path).collect();
        let scope_fp = fingerprint(&(kind, &paths));
        let keyword_fp = keyword_fingerprint(keywords);
        let stamp = modification_stamp(&resolution.candidates);

        let lookup = self
            .cache
            .get_or_compute(scope_fp, keyword_fp, stamp, || {
                self.match_candidates(&resolution.candidates, &set, keywords, token).ok()
            })
            .ok_or(SearchError::Cancelled)?;

        let mut warnings = resolution.warnings;
        warnings.extend(lookup.matches.warnings.iter().cloned());

        let outcome = SearchOutcome {
            scope: kind,
            keywords: keywords.to_vec(),
            matches: lookup.matches,
            warnings,
            candidates: resolution.candidates.len(),
            elapsed: started.elapsed(),
            from_cache: lookup.from_cache,
            generation: ticket.generation,
        };

        info!(
            scope = %kind,
            keywords = keywords.len(),
            results = outcome.hits().len(),
            files = outcome.candidates,
            skipped = outcome.warnings.len(),
            strategy = %outcome.strategy(),
            cached = outcome.from_cache,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Search finished"
        );
        Ok(outcome)
    }

    /// Match candidates without touching the cache.
    ///
    /// Hits come back grouped by file in candidate order, lines ascending.
    pub fn match_candidates(
        &self,
        candidates: &[Candidate],
        set: &KeywordSet,
        keywords: &[Keyword],
        token: &CancellationToken,
    ) -> Result<MatchSet, SearchError> {
        let units = self.plan(candidates);

        let results: Vec<(Vec<FileResult>, Option<MatchStrategy>)> = self.pool.install(|| {
            units
                .par_iter()
                .map(|unit| self.run_unit(unit, set, keywords, token))
                .collect()
        });

        if token.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let mut matches = MatchSet::default();
        let mut strategy: Option<MatchStrategy> = None;
        for (files, unit_strategy) in results {
            if let Some(s) = unit_strategy {
                strategy = Some(strategy.map_or(s, |current| current.merge(s)));
            }
            for file in files {
                match file {
                    Ok(hits) => {
                        matches.files_searched += 1;
                        matches.hits.extend(hits);
                    }
                    Err(warning) => {
                        debug!(%warning, "Skipping file");
                        matches.warnings.push(warning);
                    }
                }
            }
        }
        matches.strategy = strategy.unwrap_or(MatchStrategy::Native);

        Ok(matches)
    }

    fn plan<'c>(&self, candidates: &'c [Candidate]) -> Vec<Unit<'c>> {
        let mut units = Vec::new();
        let mut batch: Vec<&Candidate> = Vec::new();

        for candidate in candidates {
            if candidate.is_binary {
                units.push(Unit::Skip(ScanWarning::new(
                    &candidate.path,
                    WarningKind::Binary,
                    "binary content",
                )));
                continue;
            }

            // ugrep reads from disk and prints raw bytes, so buffers and
            // legacy encodings stay in-process
            let external =
                self.accelerated.is_some() && !candidate.is_buffer() && candidate.encoding == UTF_8;
            if !external {
                units.push(Unit::Native(candidate));
                continue;
            }

            batch.push(candidate);
            if batch.len() == BATCH_SIZE {
                units.push(Unit::Batch(std::mem::take(&mut batch)));
            }
        }
        if !batch.is_empty() {
            units.push(Unit::Batch(batch));
        }

        units
    }

    fn run_unit(
        &self,
        unit: &Unit<'_>,
        set: &KeywordSet,
        keywords: &[Keyword],
        token: &CancellationToken,
    ) -> (Vec<FileResult>, Option<MatchStrategy>) {
        match unit {
            Unit::Skip(warning) => (vec![Err(warning.clone())], None),
            Unit::Native(candidate) => match NativeMatcher.search_batch(&[*candidate], set, keywords, token) {
                Ok(results) => (results, Some(MatchStrategy::Native)),
                Err(_) => (Vec::new(), None),
            },
            Unit::Batch(batch) => {
                let Some(accelerated) = &self.accelerated else {
                    return (Vec::new(), None);
                };
                match accelerated.search_batch(batch, set, keywords, token) {
                    Ok(results) => (results, Some(MatchStrategy::Accelerated)),
                    Err(MatcherError::Cancelled) => (Vec::new(), None),
                    Err(e) => {
                        debug!(files = batch.len(), "Accelerated matcher failed, falling back: {}", e);
                        match NativeMatcher.search_batch(batch, set, keywords, token) {
                            Ok(results) => (results, Some(MatchStrategy::Native)),
                            Err(_) => (Vec::new(), None),
                        }
                    }
                }
            }
        }
    }
}
