//! Keyword and line highlights painted into host views.
//!
//! Each (view, key) pair moves through a small state machine:
//!
//! ```text
//!   Absent --paint--> Active --cursor leaves line / session ends--> Stale
//!     ^                 |  ^                                          |
//!     |                 |  +----------------repaint-------------------+
//!     +----clear / view close / scope switch / shutdown--------------+
//! ```
//!
//! The registry is the only owner of highlight records. Teardown drops a
//! record even when the host refuses to erase its regions, so no record can
//! outlive its view.
//!
//! A process normally installs one registry with [`install`] and keeps a
//! [`TeardownGuard`] alive for its lifetime; dropping the guard (including
//! during a panic unwind) drains every view.

pub mod registry;

pub use registry::{HighlightRegistry, HighlightState, RecordKey};

use crate::host::RegionPainter;
use std::sync::{Arc, OnceLock};

static REGISTRY: OnceLock<HighlightRegistry> = OnceLock::new();

/// Install the process-wide registry. Later calls return the first one.
pub fn install(painter: Arc<dyn RegionPainter>) -> &'static HighlightRegistry {
    REGISTRY.get_or_init(|| HighlightRegistry::new(painter))
}

pub fn global() -> Option<&'static HighlightRegistry> {
    REGISTRY.get()
}

/// Drains the process-wide registry when dropped.
#[must_use = "highlights are drained when the guard is dropped"]
pub struct TeardownGuard {
    _private: (),
}

impl TeardownGuard {
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl Default for TeardownGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        if let Some(registry) = global() {
            registry.shutdown();
        }
    }
}
