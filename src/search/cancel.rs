//! Cooperative cancellation and supersession of searches.
//!
//! A `CancellationToken` travels with the search into every worker, which
//! checks it before each file. The matching `CancellationHandle` stays with
//! whoever may cancel the search.
//!
//! [`Supersession`] keeps the latest search per key (a view and scope kind).
//! Beginning a new search under a key cancels the previous one, and results
//! carrying an older generation are discarded.

use ahash::AHashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Checked by workers to detect cancellation.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

/// Held by the caller to cancel an in-flight search.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    flag: Arc<AtomicBool>,
}

/// Create a linked (token, handle) pair.
pub fn cancellation_pair() -> (CancellationToken, CancellationHandle) {
    let flag = Arc::new(AtomicBool::new(false));
    (
        CancellationToken {
            flag: Arc::clone(&flag),
        },
        CancellationHandle { flag },
    )
}

impl CancellationToken {
    /// A token nobody can cancel.
    pub fn never() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Relaxed is enough: a worker may finish one extra file before it sees
    /// the flag.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl CancellationHandle {
    /// Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// A started search: its generation and the token its workers check.
#[derive(Debug, Clone)]
pub struct SearchTicket {
    pub generation: u64,
    pub token: CancellationToken,
}

impl SearchTicket {
    /// A ticket outside any supersession key, used for one-off searches.
    pub fn detached() -> Self {
        Self {
            generation: 0,
            token: CancellationToken::never(),
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Latest search per key.
#[derive(Debug)]
pub struct Supersession<K> {
    next: AtomicU64,
    latest: Mutex<AHashMap<K, (u64, CancellationHandle)>>,
}

impl<K: Hash + Eq> Supersession<K> {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            latest: Mutex::new(AHashMap::new()),
        }
    }

    /// Start a search under `key`, cancelling the one it replaces.
    pub fn begin(&self, key: K) -> SearchTicket {
        let generation = self.next.fetch_add(1, Ordering::AcqRel);
        let (token, handle) = cancellation_pair();

        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, previous)) = latest.insert(key, (generation, handle)) {
            previous.cancel();
        }

        SearchTicket { generation, token }
    }

    /// Whether `generation` is still the latest search under `key`.
    pub fn is_current(&self, key: &K, generation: u64) -> bool {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|(current, _)| *current == generation)
    }

    /// Forget `key` if `generation` is still its latest search.
    pub fn finish(&self, key: &K, generation: u64) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if latest.get(key).is_some_and(|(current, _)| *current == generation) {
            latest.remove(key);
        }
    }

    /// Cancel the in-flight search under `key`, if any.
    pub fn cancel(&self, key: &K) {
        if let Some((_, handle)) = self
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
        {
            handle.cancel();
        }
    }

    /// Cancel every in-flight search matching `pred`.
    pub fn cancel_where(&self, pred: impl Fn(&K) -> bool) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        latest.retain(|key, (_, handle)| {
            if pred(key) {
                handle.cancel();
                false
            } else {
                true
            }
        });
    }
}

impl<K: Hash + Eq> Default for Supersession<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_shares_flag() {
        let (token, handle) = cancellation_pair();
        assert!(!token.is_cancelled());
        handle.cancel();
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_never_token() {
        assert!(!CancellationToken::never().is_cancelled());
        assert!(!SearchTicket::detached().is_cancelled());
    }

    #[test]
    fn test_begin_supersedes_previous() {
        let searches = Supersession::new();
        let first = searches.begin("view-1");
        let other = searches.begin("view-2");
        let second = searches.begin("view-1");

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!other.is_cancelled());
        assert!(second.generation > first.generation);
        assert!(!searches.is_current(&"view-1", first.generation));
        assert!(searches.is_current(&"view-1", second.generation));
    }

    #[test]
    fn test_finish_only_removes_own_generation() {
        let searches = Supersession::new();
        let first = searches.begin(1u8);
        let second = searches.begin(1u8);

        searches.finish(&1, first.generation);
        assert!(searches.is_current(&1, second.generation));

        searches.finish(&1, second.generation);
        assert!(!searches.is_current(&1, second.generation));
    }

    #[test]
    fn test_cancel_where() {
        let searches = Supersession::new();
        let a = searches.begin((1u64, 'a'));
        let b = searches.begin((2u64, 'a'));

        searches.cancel_where(|(view, _)| *view == 1);
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());

        searches.cancel(&(2, 'a'));
        assert!(b.is_cancelled());
    }
}
