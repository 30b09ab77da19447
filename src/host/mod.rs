//! Capabilities the core consumes from the host editor.
//!
//! The core never holds host objects. It refers to views by [`ViewId`] and
//! asks the host for text or region changes through these traits.

pub mod memory;

pub use memory::MemoryHost;

use crate::error::HostError;
use std::path::PathBuf;
use std::sync::Arc;

/// Opaque host identifier of an open view.
pub type ViewId = u64;

/// An open buffer as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenBuffer {
    pub view: ViewId,
    /// Backing file, `None` for scratch buffers
    pub path: Option<PathBuf>,
    /// Display name used for scratch buffers
    pub name: String,
    /// Unsaved edits present; the text must come from the buffer, not disk
    pub dirty: bool,
}

impl OpenBuffer {
    /// Path used for display and ordering. Scratch buffers use their name.
    pub fn display_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.name))
    }

    /// Whether the matcher has to read the text from the host.
    pub fn needs_buffer_text(&self) -> bool {
        self.dirty || self.path.is_none()
    }
}

/// Read-only access to the host's buffers and workspace.
pub trait BufferSource: Send + Sync {
    /// All open buffers in the host's tab order.
    fn open_buffers(&self) -> Vec<OpenBuffer>;

    /// The view that has focus, if any.
    fn active_view(&self) -> Option<ViewId>;

    /// Folders of the current project.
    fn project_folders(&self) -> Vec<PathBuf>;

    /// Full text of a view.
    fn view_text(&self, view: ViewId) -> Result<Arc<str>, HostError>;
}

/// Half-open byte range in a view's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub start: usize,
    pub end: usize,
}

impl Region {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How a set of regions is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionStyle {
    /// Keyword fill, colored by palette index
    Keyword { color_index: usize },
    /// Underline of the displayed part of a truncated line
    Segment,
    /// Outline around the whole selected line
    Border,
}

/// Applies and removes visual region markers in host views.
///
/// `key` names one region set per view. Adding under an existing key
/// replaces that set.
pub trait RegionPainter: Send + Sync {
    fn add_regions(
        &self,
        view: ViewId,
        key: &str,
        regions: &[Region],
        style: RegionStyle,
    ) -> Result<(), HostError>;

    fn erase_regions(&self, view: ViewId, key: &str) -> Result<(), HostError>;
}
