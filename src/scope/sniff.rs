//! Remembered content classification of files on disk.
//!
//! Reading the leading bytes of every file is the costly part of resolving
//! a folder a second time. A file whose size and mtime have not moved keeps
//! its earlier verdict, so a repeated search only stats the tree.

use encoding_rs::Encoding;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Files remembered by default.
pub const DEFAULT_CAPACITY: usize = 50_000;

/// What sniffing the leading bytes of a file concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sniffed {
    pub is_binary: bool,
    pub encoding: &'static Encoding,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    size: u64,
    mtime: u64,
    sniffed: Sniffed,
}

pub struct SniffCache {
    entries: Mutex<LruCache<PathBuf, Entry>>,
    reads: AtomicUsize,
}

impl SniffCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            reads: AtomicUsize::new(0),
        }
    }

    /// Number of files actually read so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// The remembered verdict, if the file still has this size and mtime.
    pub fn get(&self, path: &Path, size: u64, mtime: u64) -> Option<Sniffed> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(path) {
            Some(entry) if entry.size == size && entry.mtime == mtime => Some(entry.sniffed),
            Some(_) => {
                entries.pop(path);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, path: &Path, size: u64, mtime: u64, sniffed: Sniffed) {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(path.to_path_buf(), Entry { size, mtime, sniffed });
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Default for SniffCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
