use crate::error::HostError;
use crate::host::{Region, RegionPainter, RegionStyle, ViewId};
use crate::query::Keyword;
use crate::search::cache::{fingerprint, keyword_fingerprint, Fingerprint};
use crate::search::KeywordSet;
use ahash::AHashMap;
use rustc_hash::FxHashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, warn};

/// Lifecycle of one (view, key) highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightState {
    Absent,
    /// Painted and current
    Active,
    /// Still painted, but the line or session it belonged to is gone
    Stale,
}

/// What a set of regions in a view marks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    /// Every occurrence of one keyword
    Keyword(String),
    /// The displayed window of the selected line
    Segment,
    /// Outline of the whole selected line
    Border,
}

impl RecordKey {
    /// Key under which the host stores the regions.
    pub fn region_key(&self) -> String {
        match self {
            RecordKey::Keyword(text) => format!("linenav.keyword.{}", text),
            RecordKey::Segment => "linenav.segment".to_string(),
            RecordKey::Border => "linenav.border".to_string(),
        }
    }

    fn is_line_marker(&self) -> bool {
        matches!(self, RecordKey::Segment | RecordKey::Border)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Keyword(text) => write!(f, "keyword {:?}", text),
            RecordKey::Segment => f.write_str("segment"),
            RecordKey::Border => f.write_str("border"),
        }
    }
}

#[derive(Debug, Clone)]
struct Record {
    regions: Vec<Region>,
    stale: bool,
}

#[derive(Debug, Default)]
struct ViewRecords {
    records: AHashMap<RecordKey, Record>,
    /// Line the segment and border describe
    focus: Option<Region>,
    /// Text and keyword fingerprints of the last keyword paint
    keyword_memo: Option<(Fingerprint, Fingerprint)>,
    /// The view was torn down; nothing may be added any more
    closed: bool,
}

impl ViewRecords {
    /// Replace the regions under `key`. The host swaps the whole set in one
    /// call, so a failure leaves the previous regions in place.
    fn assert(
        &mut self,
        painter: &dyn RegionPainter,
        view: ViewId,
        key: RecordKey,
        regions: Vec<Region>,
        style: RegionStyle,
    ) -> Result<(), HostError> {
        if self.closed {
            return Err(HostError::InvalidView(view));
        }
        if regions.is_empty() {
            self.erase(painter, view, &key);
            return Ok(());
        }
        painter.add_regions(view, &key.region_key(), &regions, style)?;
        self.records.insert(
            key,
            Record {
                regions,
                stale: false,
            },
        );
        Ok(())
    }

    /// Remove the record whether or not the host manages to erase it.
    fn erase(&mut self, painter: &dyn RegionPainter, view: ViewId, key: &RecordKey) {
        if matches!(key, RecordKey::Keyword(_)) {
            self.keyword_memo = None;
        }
        if self.records.remove(key).is_none() {
            return;
        }
        if let Err(e) = painter.erase_regions(view, &key.region_key()) {
            warn!(view, record = %key, error = %e, "Highlight teardown failed, dropping record");
        }
    }

    fn erase_where(&mut self, painter: &dyn RegionPainter, view: ViewId, pred: impl Fn(&RecordKey, &Record) -> bool) {
        let keys: Vec<RecordKey> = self
            .records
            .iter()
            .filter(|(key, record)| pred(key, record))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            self.erase(painter, view, key);
        }
    }

    fn erase_all(&mut self, painter: &dyn RegionPainter, view: ViewId) {
        self.erase_where(painter, view, |_, _| true);
        self.focus = None;
        self.keyword_memo = None;
    }

    fn mark_stale(&mut self, painter: &dyn RegionPainter, view: ViewId) {
        for record in self.records.values_mut() {
            record.stale = true;
        }
        // Line markers only make sense while the cursor is on their line
        self.erase_where(painter, view, |key, _| key.is_line_marker());
        self.focus = None;
    }
}

type SharedRecords = Arc<Mutex<ViewRecords>>;

fn lock(records: &SharedRecords) -> MutexGuard<'_, ViewRecords> {
    records.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Every highlight the navigator has painted, per view.
///
/// Changes to one view are serialized by that view's lock, and host calls
/// for a view are made while holding it. Different views never contend
/// beyond the brief map lookup.
pub struct HighlightRegistry {
    painter: Arc<dyn RegionPainter>,
    views: RwLock<AHashMap<ViewId, SharedRecords>>,
}

impl HighlightRegistry {
    pub fn new(painter: Arc<dyn RegionPainter>) -> Self {
        Self {
            painter,
            views: RwLock::new(AHashMap::new()),
        }
    }

    fn entry(&self, view: ViewId) -> SharedRecords {
        if let Some(records) = self
            .views
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&view)
        {
            return Arc::clone(records);
        }
        let mut views = self.views.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(views.entry(view).or_default())
    }

    fn existing(&self, view: ViewId) -> Option<SharedRecords> {
        self.views
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&view)
            .cloned()
    }

    fn all(&self) -> Vec<(ViewId, SharedRecords)> {
        self.views
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(view, records)| (*view, Arc::clone(records)))
            .collect()
    }

    /// Run `op` on the view's records. A host report that the view is gone
    /// tears the view down.
    fn with_view<T>(
        &self,
        view: ViewId,
        op: impl FnOnce(&mut ViewRecords, &dyn RegionPainter) -> Result<T, HostError>,
    ) -> Result<T, HostError> {
        let shared = self.entry(view);
        let result = op(&mut lock(&shared), self.painter.as_ref());
        if let Err(HostError::InvalidView(_)) = result {
            self.close_view(view);
        }
        result
    }

    pub fn state(&self, view: ViewId, key: &RecordKey) -> HighlightState {
        let Some(shared) = self.existing(view) else {
            return HighlightState::Absent;
        };
        match lock(&shared).records.get(key) {
            None => HighlightState::Absent,
            Some(record) if record.stale => HighlightState::Stale,
            Some(_) => HighlightState::Active,
        }
    }

    /// Regions currently recorded under `key`.
    pub fn regions(&self, view: ViewId, key: &RecordKey) -> Vec<Region> {
        self.existing(view)
            .and_then(|shared| lock(&shared).records.get(key).map(|r| r.regions.clone()))
            .unwrap_or_default()
    }

    /// Number of records in the active or stale state across all views.
    pub fn record_count(&self) -> usize {
        self.all()
            .iter()
            .map(|(_, shared)| lock(shared).records.len())
            .sum()
    }

    /// Views that currently hold at least one record.
    pub fn highlighted_views(&self) -> Vec<ViewId> {
        let mut views: Vec<ViewId> = self
            .all()
            .into_iter()
            .filter(|(_, shared)| !lock(shared).records.is_empty())
            .map(|(view, _)| view)
            .collect();
        views.sort_unstable();
        views
    }

    /// Paint `regions` under `key`, replacing what was there. An empty
    /// region list clears the key.
    pub fn assert_regions(
        &self,
        view: ViewId,
        key: RecordKey,
        regions: Vec<Region>,
        style: RegionStyle,
    ) -> Result<(), HostError> {
        self.with_view(view, |records, painter| {
            records.assert(painter, view, key, regions, style)
        })
    }

    /// Paint every occurrence of each keyword in `text`, the full text of
    /// `view`. Records of keywords no longer in the query are removed.
    /// Returns the number of regions painted.
    pub fn highlight_keywords(
        &self,
        view: ViewId,
        text: &str,
        keywords: &[Keyword],
        set: &KeywordSet,
    ) -> Result<usize, HostError> {
        let memo = (fingerprint(text), keyword_fingerprint(keywords));

        self.with_view(view, |records, painter| {
            if records.closed {
                return Err(HostError::InvalidView(view));
            }
            let unchanged = records.keyword_memo == Some(memo)
                && records
                    .records
                    .iter()
                    .all(|(key, record)| !matches!(key, RecordKey::Keyword(_)) || !record.stale);
            if unchanged {
                let painted = records
                    .records
                    .iter()
                    .filter(|(key, _)| matches!(key, RecordKey::Keyword(_)))
                    .map(|(_, record)| record.regions.len())
                    .sum();
                return Ok(painted);
            }

            let wanted: FxHashSet<&str> = keywords.iter().map(|k| k.text.as_str()).collect();
            records.erase_where(painter, view, |key, _| match key {
                RecordKey::Keyword(text) => !wanted.contains(text.as_str()),
                _ => false,
            });

            // A rejected keyword keeps its previous regions; the others are
            // still brought up to date before the first failure is reported
            let mut painted = 0;
            let mut failure = None;
            for (idx, keyword) in keywords.iter().enumerate() {
                let regions: Vec<Region> = set
                    .find_all(idx, text)
                    .into_iter()
                    .map(|(start, end)| Region::new(start, end))
                    .collect();
                let count = regions.len();
                let result = records.assert(
                    painter,
                    view,
                    RecordKey::Keyword(keyword.text.clone()),
                    regions,
                    RegionStyle::Keyword {
                        color_index: keyword.color_index,
                    },
                );
                match result {
                    Ok(()) => painted += count,
                    Err(e @ HostError::InvalidView(_)) => return Err(e),
                    Err(e) => {
                        warn!(view, keyword = %keyword.text, error = %e, "Keyword highlight rejected");
                        failure.get_or_insert(e);
                    }
                }
            }
            if let Some(e) = failure {
                return Err(e);
            }
            records.keyword_memo = Some(memo);
            debug!(view, keywords = keywords.len(), regions = painted, "Keywords highlighted");
            Ok(painted)
        })
    }

    /// Mark the line the user is looking at: underline `segment` and,
    /// when `border` is set, outline the whole `line`.
    pub fn mark_line(&self, view: ViewId, line: Region, segment: Region, border: bool) -> Result<(), HostError> {
        self.with_view(view, |records, painter| {
            records.assert(painter, view, RecordKey::Segment, vec![segment], RegionStyle::Segment)?;
            if border {
                records.assert(painter, view, RecordKey::Border, vec![line], RegionStyle::Border)?;
            } else {
                records.erase(painter, view, &RecordKey::Border);
            }
            records.focus = Some(line);
            Ok(())
        })
    }

    /// Remove the outline of the marked line, keeping its underline.
    pub fn clear_border(&self, view: ViewId) {
        if let Some(shared) = self.existing(view) {
            lock(&shared).erase(self.painter.as_ref(), view, &RecordKey::Border);
        }
    }

    /// Cursor moved to byte `offset` in `view`. Leaving the marked line
    /// makes the view's highlights stale. Returns whether that happened.
    pub fn on_cursor_moved(&self, view: ViewId, offset: usize) -> bool {
        let Some(shared) = self.existing(view) else {
            return false;
        };
        let mut records = lock(&shared);
        match records.focus {
            Some(line) if offset < line.start || offset > line.end => {
                records.mark_stale(self.painter.as_ref(), view);
                true
            }
            _ => false,
        }
    }

    pub fn mark_stale(&self, view: ViewId) {
        if let Some(shared) = self.existing(view) {
            lock(&shared).mark_stale(self.painter.as_ref(), view);
        }
    }

    /// The search session ended: everything painted becomes stale.
    pub fn end_session(&self) {
        for (view, shared) in self.all() {
            lock(&shared).mark_stale(self.painter.as_ref(), view);
        }
    }

    /// Erase every stale record.
    pub fn sweep_stale(&self) {
        for (view, shared) in self.all() {
            lock(&shared).erase_where(self.painter.as_ref(), view, |_, record| record.stale);
        }
    }

    /// Explicit clear of one view.
    pub fn clear_view(&self, view: ViewId) {
        if let Some(shared) = self.existing(view) {
            lock(&shared).erase_all(self.painter.as_ref(), view);
        }
    }

    /// The view is gone. Its records are dropped without host calls. The
    /// entry stays behind, marked closed, so later changes for the view are
    /// refused instead of starting a fresh record.
    pub fn close_view(&self, view: ViewId) {
        let shared = self.entry(view);
        let mut records = lock(&shared);
        if records.closed {
            return;
        }
        records.closed = true;
        records.records.clear();
        records.focus = None;
        records.keyword_memo = None;
        debug!(view, "Highlights of closed view dropped");
    }

    /// Explicit clear of every view.
    pub fn clear_all(&self) {
        for (view, shared) in self.all() {
            lock(&shared).erase_all(self.painter.as_ref(), view);
        }
    }

    /// Final teardown. Erases everything and forgets every view.
    pub fn shutdown(&self) {
        self.clear_all();
        let drained = std::mem::take(&mut *self.views.write().unwrap_or_else(PoisonError::into_inner));
        for shared in drained.values() {
            lock(shared).closed = true;
        }
        debug!(views = drained.len(), "Highlight registry drained");
    }
}
