//! In-memory host used by the CLI and by tests.
//!
//! Buffers are plain strings. Painted regions are kept in a table so callers
//! can inspect exactly what a real editor would be showing.

use super::{BufferSource, OpenBuffer, Region, RegionPainter, RegionStyle, ViewId};
use crate::error::HostError;
use ahash::AHashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

#[derive(Debug, Clone)]
struct BufferEntry {
    buffer: OpenBuffer,
    text: Arc<str>,
}

#[derive(Debug, Default)]
struct Painted {
    regions: AHashMap<(ViewId, String), (Vec<Region>, RegionStyle)>,
    failing_erase: Option<ViewId>,
}

/// A host that owns its buffers and records painted regions.
#[derive(Debug)]
pub struct MemoryHost {
    next_view: AtomicU64,
    buffers: RwLock<Vec<BufferEntry>>,
    active: RwLock<Option<ViewId>>,
    folders: RwLock<Vec<PathBuf>>,
    painted: Mutex<Painted>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            next_view: AtomicU64::new(1),
            buffers: RwLock::new(Vec::new()),
            active: RwLock::new(None),
            folders: RwLock::new(Vec::new()),
            painted: Mutex::new(Painted::default()),
        }
    }

    /// Open a view backed by `path` with the given text and focus it.
    pub fn open_file(&self, path: impl Into<PathBuf>, text: impl Into<Arc<str>>) -> ViewId {
        self.insert(Some(path.into()), String::new(), text.into(), false)
    }

    /// Read `path` from disk into a new view. Bytes that are not UTF-8 are
    /// replaced.
    pub fn open_from_disk(&self, path: &Path) -> std::io::Result<ViewId> {
        let bytes = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(self.open_file(path, text))
    }

    /// Open a scratch view with no backing file.
    pub fn open_scratch(&self, name: &str, text: impl Into<Arc<str>>) -> ViewId {
        self.insert(None, name.to_string(), text.into(), true)
    }

    fn insert(&self, path: Option<PathBuf>, name: String, text: Arc<str>, dirty: bool) -> ViewId {
        let view = self.next_view.fetch_add(1, Ordering::Relaxed);
        let entry = BufferEntry {
            buffer: OpenBuffer {
                view,
                path,
                name,
                dirty,
            },
            text,
        };
        self.buffers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        self.focus(view);
        view
    }

    /// Replace a view's text and mark it dirty.
    pub fn edit(&self, view: ViewId, text: impl Into<Arc<str>>) -> Result<(), HostError> {
        let mut buffers = self.buffers.write().unwrap_or_else(PoisonError::into_inner);
        let entry = buffers
            .iter_mut()
            .find(|e| e.buffer.view == view)
            .ok_or(HostError::InvalidView(view))?;
        entry.text = text.into();
        entry.buffer.dirty = true;
        Ok(())
    }

    pub fn focus(&self, view: ViewId) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(view);
    }

    /// Drop a view. Regions painted into it disappear with it.
    pub fn close(&self, view: ViewId) {
        self.buffers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|e| e.buffer.view != view);

        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if *active == Some(view) {
            *active = None;
        }
        drop(active);

        self.painted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .regions
            .retain(|(v, _), _| *v != view);
    }

    pub fn set_project_folders(&self, folders: Vec<PathBuf>) {
        *self.folders.write().unwrap_or_else(PoisonError::into_inner) = folders;
    }

    /// Make every erase in `view` fail, to exercise forced teardown.
    pub fn fail_erase_for(&self, view: Option<ViewId>) {
        self.painted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failing_erase = view;
    }

    /// Regions currently painted under `key` in `view`.
    pub fn regions(&self, view: ViewId, key: &str) -> Option<(Vec<Region>, RegionStyle)> {
        self.painted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .regions
            .get(&(view, key.to_string()))
            .cloned()
    }

    /// Number of region sets painted in `view`.
    pub fn painted_count(&self, view: ViewId) -> usize {
        self.painted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .regions
            .keys()
            .filter(|(v, _)| *v == view)
            .count()
    }

    fn has_view(&self, view: ViewId) -> bool {
        self.buffers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|e| e.buffer.view == view)
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferSource for MemoryHost {
    fn open_buffers(&self) -> Vec<OpenBuffer> {
        self.buffers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.buffer.clone())
            .collect()
    }

    fn active_view(&self) -> Option<ViewId> {
        *self.active.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn project_folders(&self) -> Vec<PathBuf> {
        self.folders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn view_text(&self, view: ViewId) -> Result<Arc<str>, HostError> {
        self.buffers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|e| e.buffer.view == view)
            .map(|e| e.text.clone())
            .ok_or(HostError::InvalidView(view))
    }
}

impl RegionPainter for MemoryHost {
    fn add_regions(
        &self,
        view: ViewId,
        key: &str,
        regions: &[Region],
        style: RegionStyle,
    ) -> Result<(), HostError> {
        if !self.has_view(view) {
            return Err(HostError::InvalidView(view));
        }
        self.painted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .regions
            .insert((view, key.to_string()), (regions.to_vec(), style));
        Ok(())
    }

    fn erase_regions(&self, view: ViewId, key: &str) -> Result<(), HostError> {
        let mut painted = self.painted.lock().unwrap_or_else(PoisonError::into_inner);
        if painted.failing_erase == Some(view) {
            return Err(HostError::Rejected(format!("erase of {} refused", key)));
        }
        painted.regions.remove(&(view, key.to_string()));
        Ok(())
    }
}
