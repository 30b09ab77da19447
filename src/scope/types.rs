use crate::host::ViewId;
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Scope kind without its payload. Used for settings and supersession keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    #[serde(rename = "file")]
    CurrentFile,
    OpenFiles,
    Folder,
    Project,
}

impl ScopeKind {
    pub const ALL: [ScopeKind; 4] = [
        ScopeKind::CurrentFile,
        ScopeKind::OpenFiles,
        ScopeKind::Folder,
        ScopeKind::Project,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ScopeKind::CurrentFile => "file",
            ScopeKind::OpenFiles => "open files",
            ScopeKind::Folder => "folder",
            ScopeKind::Project => "project",
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Extension filter override carried by a scope request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FilterOverride {
    Enabled,
    Disabled,
    #[default]
    Inherit,
}

/// The set of files a search runs over.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The focused view
    CurrentFile,
    /// Every open view
    OpenFiles,
    /// A folder tree
    Folder(PathBuf),
    /// Project folders; empty means "ask the host"
    Project(Vec<PathBuf>),
}

impl Scope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            Scope::CurrentFile => ScopeKind::CurrentFile,
            Scope::OpenFiles => ScopeKind::OpenFiles,
            Scope::Folder(_) => ScopeKind::Folder,
            Scope::Project(_) => ScopeKind::Project,
        }
    }
}

/// A scope request: where to search plus an optional filter override.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeSpec {
    pub scope: Scope,
    pub filter_override: FilterOverride,
}

impl ScopeSpec {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            filter_override: FilterOverride::Inherit,
        }
    }

    pub fn with_override(mut self, filter_override: FilterOverride) -> Self {
        self.filter_override = filter_override;
        self
    }

    pub fn kind(&self) -> ScopeKind {
        self.scope.kind()
    }
}

/// A file selected for matching, with metadata gathered during resolution.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Canonical path, or the display name of a scratch buffer
    pub path: PathBuf,
    pub size: u64,
    /// Modification time in nanoseconds since the epoch, 0 for buffers
    pub mtime: u64,
    pub is_binary: bool,
    pub encoding: &'static Encoding,
    /// Live text for views whose content differs from disk
    pub buffer: Option<Arc<str>>,
    /// View the candidate came from, when it is open in the host
    pub view: Option<ViewId>,
}

impl Candidate {
    /// Whether the candidate must be matched from host text rather than disk.
    pub fn is_buffer(&self) -> bool {
        self.buffer.is_some()
    }
}
