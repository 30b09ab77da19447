//! Memoized search results keyed by (scope, keywords) fingerprints.
//!
//! Concurrent lookups of the same key share one computation: the first
//! caller runs it inside the slot's `OnceLock` and the others block on the
//! same lock. A computation that is cancelled stores nothing usable; its
//! slot is dropped and any waiter retries with its own computation.
//!
//! Every entry records the generation it was computed under and a stamp of
//! the files it read. A stamp mismatch means something in the scope changed
//! on disk, which bumps the generation and invalidates every entry.

use super::types::MatchSet;
use crate::query::Keyword;
use crate::scope::Candidate;
use lru::LruCache;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::debug;

/// Stable 64-bit digest used for cache keys.
pub type Fingerprint = u64;

pub fn fingerprint<T: Hash + ?Sized>(value: &T) -> Fingerprint {
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Order-sensitive digest of a parsed query.
pub fn keyword_fingerprint(keywords: &[Keyword]) -> Fingerprint {
    let mut hasher = FxHasher::default();
    keywords.len().hash(&mut hasher);
    for keyword in keywords {
        keyword.text.hash(&mut hasher);
        keyword.is_phrase.hash(&mut hasher);
    }
    hasher.finish()
}

/// Digest of what the candidates looked like when they were read.
///
/// Files contribute path, size and mtime. Buffers contribute their text.
pub fn modification_stamp(candidates: &[Candidate]) -> Fingerprint {
    let mut hasher = FxHasher::default();
    for candidate in candidates {
        candidate.path.hash(&mut hasher);
        match &candidate.buffer {
            Some(text) => text.hash(&mut hasher),
            None => {
                candidate.size.hash(&mut hasher);
                candidate.mtime.hash(&mut hasher);
            }
        }
    }
    hasher.finish()
}

pub type CachedMatches = Arc<MatchSet>;

struct Slot {
    generation: u64,
    stamp: Fingerprint,
    cell: OnceLock<Option<CachedMatches>>,
}

/// Result of [`SearchCache::get_or_compute`].
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub matches: CachedMatches,
    /// The hits were produced by an earlier or concurrent caller
    pub from_cache: bool,
}

pub struct SearchCache {
    generation: AtomicU64,
    computations: AtomicUsize,
    entries: Mutex<LruCache<(Fingerprint, Fingerprint), Arc<Slot>>>,
}

impl SearchCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            generation: AtomicU64::new(0),
            computations: AtomicUsize::new(0),
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Number of computations run so far.
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    /// Force recomputation on the next access of every entry.
    pub fn invalidate(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(generation, "Search cache invalidated");
    }

    /// Explicit user-requested clear.
    pub fn clear(&self) {
        self.invalidate();
    }

    /// Return the matches for a key, computing them at most once.
    ///
    /// `compute` returns `None` when its search was cancelled; the caller
    /// then gets `None` too, and nothing is cached.
    pub fn get_or_compute<F>(
        &self,
        scope: Fingerprint,
        keywords: Fingerprint,
        stamp: Fingerprint,
        mut compute: F,
    ) -> Option<CacheLookup>
    where
        F: FnMut() -> Option<MatchSet>,
    {
        let key = (scope, keywords);

        loop {
            let slot = self.slot_for(key, stamp);

            let mut ran = false;
            let value = slot.cell.get_or_init(|| {
                ran = true;
                self.computations.fetch_add(1, Ordering::Relaxed);
                compute().map(Arc::new)
            });

            match value {
                Some(matches) => {
                    return Some(CacheLookup {
                        matches: Arc::clone(matches),
                        from_cache: !ran,
                    });
                }
                None => {
                    self.remove_if_same(key, &slot);
                    if ran {
                        return None;
                    }
                    // Whoever computed was cancelled; try again ourselves
                }
            }
        }
    }

    fn slot_for(&self, key: (Fingerprint, Fingerprint), stamp: Fingerprint) -> Arc<Slot> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut generation = self.generation();

        if let Some(slot) = entries.get(&key) {
            if slot.generation == generation && slot.stamp == stamp {
                return Arc::clone(slot);
            }
            if slot.generation == generation {
                // Same generation, different files: the scope changed on disk
                self.invalidate();
                generation = self.generation();
            }
        }

        let slot = Arc::new(Slot {
            generation,
            stamp,
            cell: OnceLock::new(),
        });
        entries.put(key, Arc::clone(&slot));
        slot
    }

    fn remove_if_same(&self, key: (Fingerprint, Fingerprint), slot: &Arc<Slot>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.peek(&key).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            entries.pop(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse_keywords;
    use crate::search::types::LineHit;
    use std::path::PathBuf;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn hit(line: usize) -> MatchSet {
        MatchSet {
            hits: vec![LineHit {
                path: PathBuf::from("a.txt"),
                line_number: line,
                text: "x".to_string(),
                spans: Vec::new(),
                view: None,
            }],
            files_searched: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_keyword_fingerprint_is_order_sensitive() {
        let a = keyword_fingerprint(&parse_keywords("alpha beta"));
        let b = keyword_fingerprint(&parse_keywords("beta alpha"));
        let c = keyword_fingerprint(&parse_keywords("alpha  beta"));
        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_second_lookup_hits_cache() {
        let cache = SearchCache::new(8);
        let first = cache.get_or_compute(1, 2, 0, || Some(hit(1))).unwrap();
        let second = cache.get_or_compute(1, 2, 0, || Some(hit(9))).unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(second.matches.hits[0].line_number, 1);
        assert_eq!(cache.computations(), 1);
    }

    #[test]
    fn test_concurrent_lookups_compute_once() {
        let cache = Arc::new(SearchCache::new(8));
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache
                        .get_or_compute(7, 7, 0, || {
                            thread::sleep(Duration::from_millis(50));
                            Some(hit(3))
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().matches.hits.len(), 1);
        }
        assert_eq!(cache.computations(), 1);
    }

    #[test]
    fn test_cancelled_computation_is_not_cached() {
        let cache = SearchCache::new(8);
        assert!(cache.get_or_compute(1, 1, 0, || None).is_none());

        let lookup = cache.get_or_compute(1, 1, 0, || Some(hit(2))).unwrap();
        assert!(!lookup.from_cache);
        assert_eq!(cache.computations(), 2);
    }

    #[test]
    fn test_stamp_change_invalidates() {
        let cache = SearchCache::new(8);
        cache.get_or_compute(1, 1, 100, || Some(hit(1))).unwrap();
        let before = cache.generation();

        let lookup = cache.get_or_compute(1, 1, 101, || Some(hit(2))).unwrap();
        assert!(!lookup.from_cache);
        assert_eq!(lookup.matches.hits[0].line_number, 2);
        assert!(cache.generation() > before);
    }

    #[test]
    fn test_clear_forces_recompute() {
        let cache = SearchCache::new(8);
        cache.get_or_compute(1, 1, 0, || Some(hit(1))).unwrap();
        cache.clear();
        let lookup = cache.get_or_compute(1, 1, 0, || Some(hit(1))).unwrap();
        assert!(!lookup.from_cache);
        assert_eq!(cache.computations(), 2);
    }

    #[test]
    fn test_zero_capacity_still_works() {
        let cache = SearchCache::new(0);
        assert!(cache.get_or_compute(1, 1, 0, || Some(MatchSet::default())).is_some());
    }

    #[test]
    fn test_modification_stamp_tracks_buffers() {
        let candidate = |text: &str| Candidate {
            path: PathBuf::from("scratch"),
            size: text.len() as u64,
            mtime: 0,
            is_binary: false,
            encoding: encoding_rs::UTF_8,
            buffer: Some(text.into()),
            view: Some(1),
        };
        assert_ne!(
            modification_stamp(&[candidate("one")]),
            modification_stamp(&[candidate("two")])
        );
    }
}
