//! The result/selection interface a host drives.
//!
//! A [`Navigator`] runs queries against a scope, formats the hits into
//! display entries, and translates preview and selection of an entry into
//! highlight changes in the host. It also owns every teardown trigger the
//! host has to call: cursor moves, panel dismissal, scope switches and
//! view close.

use crate::config::Settings;
use crate::error::SearchError;
use crate::format::{DisplayEntry, ResultFormatter};
use crate::highlight::HighlightRegistry;
use crate::host::{BufferSource, Region, RegionPainter, ViewId};
use crate::query::{parse_keywords, Keyword, QueryMemory};
use crate::scope::{ResolveOptions, Scope, ScopeKind, ScopeSpec};
use crate::search::{KeywordSet, LineHit, MatchSpan, SearchEngine, SearchOutcome};
use memchr::memchr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Everything a host needs to jump to a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub path: PathBuf,
    /// Open view holding the line, if any
    pub view: Option<ViewId>,
    /// 1-based
    pub line_number: usize,
    /// Byte offset of the first match in the line
    pub column: usize,
    /// Match spans in raw line coordinates
    pub spans: Vec<MatchSpan>,
}

/// Output of one query.
#[derive(Debug, Clone)]
pub struct QueryResults {
    pub outcome: SearchOutcome,
    pub entries: Vec<DisplayEntry>,
}

impl QueryResults {
    /// One-line description of the search for status bars.
    pub fn summary(&self) -> String {
        let outcome = &self.outcome;
        let keywords = if outcome.keywords.is_empty() {
            "all lines".to_string()
        } else {
            outcome
                .keywords
                .iter()
                .map(|k| format!("[{}]{}", k.color_index + 1, k.text))
                .collect::<Vec<_>>()
                .join(" ")
        };

        let mut summary = format!(
            "{}: {} | {} result{} in {} file{}",
            outcome.scope,
            keywords,
            self.entries.len(),
            if self.entries.len() == 1 { "" } else { "s" },
            outcome.candidates,
            if outcome.candidates == 1 { "" } else { "s" },
        );
        let skipped = outcome.skipped_summary();
        if !skipped.is_empty() {
            summary.push_str(" | ");
            summary.push_str(&skipped);
        }
        summary.push_str(&format!(
            " | {} | {} ms",
            outcome.strategy(),
            outcome.elapsed.as_millis()
        ));
        if outcome.from_cache {
            summary.push_str(" (cached)");
        }
        summary
    }
}

struct Session {
    generation: u64,
    keywords: Vec<Keyword>,
    set: Arc<KeywordSet>,
    outcome: SearchOutcome,
    entries: Vec<DisplayEntry>,
    /// Last previewed line, as (path, line number)
    previewed: Option<(PathBuf, usize)>,
}

pub struct Navigator<'r, H> {
    host: Arc<H>,
    settings: Settings,
    engine: SearchEngine,
    formatter: ResultFormatter,
    registry: &'r HighlightRegistry,
    memory: QueryMemory,
    session_filter: Mutex<Option<bool>>,
    session: Mutex<Option<Session>>,
}

impl<'r, H> Navigator<'r, H>
where
    H: BufferSource + RegionPainter + 'static,
{
    pub fn new(host: Arc<H>, settings: Settings, registry: &'r HighlightRegistry) -> Result<Self, SearchError> {
        let engine = SearchEngine::new(&settings)?;
        Ok(Self::with_engine(host, settings, engine, registry))
    }

    pub fn with_engine(
        host: Arc<H>,
        settings: Settings,
        engine: SearchEngine,
        registry: &'r HighlightRegistry,
    ) -> Self {
        Self {
            formatter: ResultFormatter::from_settings(&settings),
            host,
            settings,
            engine,
            registry,
            memory: QueryMemory::new(),
            session_filter: Mutex::new(None),
            session: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    pub fn memory(&self) -> &QueryMemory {
        &self.memory
    }

    pub fn session_filter(&self) -> Option<bool> {
        *self.session_filter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Temporarily force extension filtering on or off for this session.
    pub fn set_session_filter(&self, enabled: Option<bool>) {
        *self.session_filter.lock().unwrap_or_else(PoisonError::into_inner) = enabled;
    }

    /// Flip the session filter relative to what `kind` would use now.
    pub fn toggle_session_filter(&self, kind: ScopeKind) -> bool {
        let current = self
            .settings
            .filters_enabled(kind, Default::default(), self.session_filter());
        self.set_session_filter(Some(!current));
        !current
    }

    /// Concrete scope for a scope kind.
    ///
    /// The folder scope uses the configured search folder, then the folder
    /// of the active file, then the first project folder.
    pub fn scope_for(&self, kind: ScopeKind) -> Result<Scope, SearchError> {
        match kind {
            ScopeKind::CurrentFile => Ok(Scope::CurrentFile),
            ScopeKind::OpenFiles => Ok(Scope::OpenFiles),
            ScopeKind::Project => Ok(Scope::Project(self.host.project_folders())),
            ScopeKind::Folder => self
                .settings
                .search_folder()
                .or_else(|| self.active_folder())
                .or_else(|| self.host.project_folders().into_iter().next())
                .map(Scope::Folder)
                .ok_or_else(|| SearchError::NoScope("no folder to search".into())),
        }
    }

    /// The scope a freshly opened panel searches.
    pub fn default_scope(&self) -> Result<ScopeSpec, SearchError> {
        self.scope_for(self.settings.default_search_scope).map(ScopeSpec::new)
    }

    fn active_folder(&self) -> Option<PathBuf> {
        let active = self.host.active_view()?;
        self.host
            .open_buffers()
            .into_iter()
            .find(|b| b.view == active)
            .and_then(|b| b.path)
            .and_then(|p| p.parent().map(Path::to_path_buf))
    }

    /// Parse `query`, search `spec`, and format the hits.
    ///
    /// A newer query for the same view and scope kind cancels this one, in
    /// which case [`SearchError::Cancelled`] is returned and nothing is
    /// kept.
    pub fn run_query(&self, spec: &ScopeSpec, query: &str) -> Result<QueryResults, SearchError> {
        let keywords = parse_keywords(query);
        self.memory.save(query);
        // Leftovers from an earlier session go before anything new is painted
        self.registry.sweep_stale();

        let kind = spec.kind();
        let filters_enabled = self
            .settings
            .filters_enabled(kind, spec.filter_override, self.session_filter());
        let options = ResolveOptions::from_settings(&self.settings, filters_enabled);
        let key = (self.host.active_view(), kind);

        let outcome = self
            .engine
            .run(key, self.host.as_ref(), &spec.scope, &keywords, options)?;
        let entries = self.formatter.format(outcome.hits(), kind);
        let set = Arc::new(KeywordSet::new(&keywords)?);

        let results = QueryResults { outcome, entries };
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        if session
            .as_ref()
            .is_some_and(|s| s.generation > results.outcome.generation)
        {
            // A newer query already finished
            return Err(SearchError::Cancelled);
        }
        *session = Some(Session {
            generation: results.outcome.generation,
            keywords,
            set,
            outcome: results.outcome.clone(),
            entries: results.entries.clone(),
            previewed: None,
        });
        Ok(results)
    }

    /// Entries of the current session.
    pub fn entries(&self) -> Vec<DisplayEntry> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.entries.clone())
            .unwrap_or_default()
    }

    /// Live preview of entry `index` while moving through the results.
    pub fn preview(&self, index: usize) -> Option<Selection> {
        if !self.settings.preview_on_highlight {
            return self.selection_at(index);
        }
        self.show(index)
    }

    /// Commit to entry `index`. The keywords stay highlighted in the target
    /// view until the cursor leaves the line.
    pub fn select(&self, index: usize) -> Option<Selection> {
        let selection = self.show(index)?;
        if let Some(query) = self.session_query() {
            self.memory.save(&query);
        }
        Some(selection)
    }

    fn session_query(&self) -> Option<String> {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let keywords = &session.as_ref()?.keywords;
        (!keywords.is_empty()).then(|| {
            keywords
                .iter()
                .map(|k| crate::query::format_keyword_for_input(&k.text))
                .collect::<Vec<_>>()
                .join(" ")
        })
    }

    fn selection_at(&self, index: usize) -> Option<Selection> {
        let session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let session = session.as_ref()?;
        let hit = session.outcome.hits().get(index)?;
        Some(self.selection_for(hit))
    }

    fn selection_for(&self, hit: &LineHit) -> Selection {
        Selection {
            path: hit.path.clone(),
            view: hit.view.or_else(|| self.view_of(&hit.path)),
            line_number: hit.line_number,
            column: hit.spans.first().map_or(0, |s| s.start),
            spans: hit.spans.clone(),
        }
    }

    /// Paint keywords and the line markers for entry `index`.
    fn show(&self, index: usize) -> Option<Selection> {
        let mut guard = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let session = guard.as_mut()?;
        let hit = session.outcome.hits().get(index)?;
        let entry = session.entries.get(index)?;
        let selection = self.selection_for(hit);

        let Some(view) = selection.view else {
            return Some(selection);
        };
        let text = match self.host.view_text(view) {
            Ok(text) => text,
            Err(e) => {
                warn!(view, error = %e, "Cannot read view for highlighting");
                return Some(selection);
            }
        };

        if let Err(e) = self
            .registry
            .highlight_keywords(view, &text, &session.keywords, &session.set)
        {
            warn!(view, error = %e, "Keyword highlight failed");
        }

        if let Some(line) = line_region(&text, hit.line_number) {
            let here = (hit.path.clone(), hit.line_number);
            let new_line = session.previewed.as_ref() != Some(&here);
            let start = (line.start + entry.source.start).min(line.end);
            let end = (line.start + entry.source.end).min(line.end);
            let segment = Region::new(start, end);

            if let Err(e) = self
                .registry
                .mark_line(view, line, segment, entry.windowed && new_line)
            {
                warn!(view, error = %e, "Line highlight failed");
            }
            session.previewed = Some(here);
        }
        Some(selection)
    }

    fn view_of(&self, path: &Path) -> Option<ViewId> {
        let canonical = path.canonicalize().ok();
        self.host
            .open_buffers()
            .into_iter()
            .find(|b| {
                b.path.as_deref().is_some_and(|p| {
                    p == path || (canonical.is_some() && p.canonicalize().ok() == canonical)
                })
            })
            .map(|b| b.view)
    }

    /// The cursor in `view` moved to byte `offset`.
    pub fn on_cursor_moved(&self, view: ViewId, offset: usize) {
        if self.registry.on_cursor_moved(view, offset) {
            debug!(view, "Cursor left highlighted line");
        }
    }

    /// The result panel was dismissed without a selection.
    pub fn on_panel_hidden(&self) {
        self.engine.cancel_view(self.host.active_view());
        self.registry.clear_all();
        self.session.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// The user picked another scope; everything from the old one goes.
    pub fn switch_scope(&self, spec: &ScopeSpec, query: &str) -> Result<QueryResults, SearchError> {
        self.engine.cancel_view(self.host.active_view());
        self.registry.clear_all();
        self.session.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.run_query(spec, query)
    }

    /// Explicit clear: one view, or every view.
    pub fn clear_highlights(&self, view: Option<ViewId>) {
        match view {
            Some(view) => self.registry.clear_view(view),
            None => self.registry.clear_all(),
        }
    }

    /// Forget the stored query and everything painted.
    pub fn clear_stored(&self) {
        self.memory.clear();
        self.registry.clear_all();
    }

    /// The host closed `view`.
    pub fn close_view(&self, view: ViewId) {
        self.engine.cancel_view(Some(view));
        self.registry.close_view(view);
    }

    pub fn shutdown(&self) {
        self.engine.cancel_view(self.host.active_view());
        self.registry.shutdown();
    }
}

/// Byte range of 1-based line `line_number` in `text`, without its
/// terminator.
pub fn line_region(text: &str, line_number: usize) -> Option<Region> {
    let bytes = text.as_bytes();
    let mut start = 0;
    for _ in 1..line_number.max(1) {
        start += memchr(b'\n', &bytes[start..])? + 1;
    }
    let mut end = memchr(b'\n', &bytes[start..]).map_or(bytes.len(), |i| start + i);
    if end > start && bytes[end - 1] == b'\r' {
        end -= 1;
    }
    Some(Region::new(start, end))
}
