//! Configuration surface read once per search invocation.
//!
//! Settings live in `settings.json` inside the app data directory, or at
//! `LINENAV_SETTINGS` when that is set. Every field has a serde default so
//! partial or older files still load. Loading applies environment overrides
//! on top of the file:
//!
//! - `LINENAV_MAX_WIDTH` - `max_display_length`
//! - `LINENAV_MATCHER` - `matcher_path`
//! - `LINENAV_CONCURRENCY` - `concurrency`

use crate::scope::types::{FilterOverride, ScopeKind};
use crate::utils::app_data::{get_settings_path, num_cpus};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Extensions that are never worth searching as text.
pub const DEFAULT_BLACKLIST: &[&str] = &[
    // Executables and objects
    "exe", "dll", "so", "dylib", "a", "lib", "obj", "o", "bin",
    "class", "jar", "war", "ear", "pyc", "pyo", "pyd",
    // Databases
    "db", "sqlite", "sqlite3", "dat",
    // Images
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "ico", "webp", "svg",
    // Audio and video
    "mp3", "mp4", "avi", "mov", "wmv", "flv", "mkv", "webm", "wav", "m4a",
    // Documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    // Archives and images
    "zip", "rar", "7z", "tar", "gz", "bz2", "xz",
    "iso", "img", "dmg", "deb", "rpm", "msi",
    // Fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // Editor and VCS state
    "sublime-workspace", "sublime-project", "git", "svn", "hg",
    "tmp", "cache", "log", "swp", "swo", "swn", "bak",
];

/// Default size ceiling for folder and project scopes (10 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_search_scope")]
    pub default_search_scope: ScopeKind,

    #[serde(default = "default_true")]
    pub show_line_numbers: bool,

    /// Paint live highlights while moving through results
    #[serde(default = "default_true")]
    pub preview_on_highlight: bool,

    /// Custom folder for the Folder scope; empty means "ask the host"
    #[serde(default)]
    pub search_folder_path: String,

    /// Global extension filter switch
    #[serde(default = "default_true")]
    pub extension_filters: bool,

    /// Per-scope switches; `null` inherits `extension_filters`
    #[serde(default = "default_false_opt")]
    pub extension_filters_file: Option<bool>,
    #[serde(default = "default_true_opt")]
    pub extension_filters_folder: Option<bool>,
    #[serde(default)]
    pub extension_filters_project: Option<bool>,
    #[serde(default = "default_false_opt")]
    pub extension_filters_open_files: Option<bool>,

    /// Maximum display width of a result line, in terminal columns
    #[serde(default = "default_max_display_length")]
    pub max_display_length: usize,

    /// Whitelist tokens (see `scope::filter`)
    #[serde(default)]
    pub file_extensions: Vec<String>,

    #[serde(default = "default_blacklist")]
    pub file_extensions_blacklist: Vec<String>,

    /// Files larger than this are skipped in folder and project scopes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Worker pool size; 0 uses the number of CPUs
    #[serde(default)]
    pub concurrency: usize,

    #[serde(default = "default_true")]
    pub use_accelerated_matcher: bool,

    /// Explicit path to the accelerated matcher executable
    #[serde(default)]
    pub matcher_path: Option<PathBuf>,

    #[serde(default = "default_matcher_timeout_secs")]
    pub matcher_timeout_secs: u64,

    /// Number of (scope, keywords) result sets kept in memory
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Extra glob patterns pruned during folder traversal
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

fn default_search_scope() -> ScopeKind {
    ScopeKind::CurrentFile
}

fn default_true() -> bool {
    true
}

fn default_true_opt() -> Option<bool> {
    Some(true)
}

fn default_false_opt() -> Option<bool> {
    Some(false)
}

fn default_max_display_length() -> usize {
    120
}

fn default_blacklist() -> Vec<String> {
    DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect()
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_matcher_timeout_secs() -> u64 {
    30
}

fn default_cache_capacity() -> usize {
    64
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_search_scope: default_search_scope(),
            show_line_numbers: true,
            preview_on_highlight: true,
            search_folder_path: String::new(),
            extension_filters: true,
            extension_filters_file: default_false_opt(),
            extension_filters_folder: default_true_opt(),
            extension_filters_project: None,
            extension_filters_open_files: default_false_opt(),
            max_display_length: default_max_display_length(),
            file_extensions: Vec::new(),
            file_extensions_blacklist: default_blacklist(),
            max_file_size: default_max_file_size(),
            concurrency: 0,
            use_accelerated_matcher: true,
            matcher_path: None,
            matcher_timeout_secs: default_matcher_timeout_secs(),
            cache_capacity: default_cache_capacity(),
            exclude_patterns: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings with priority: environment > settings file > defaults
    pub fn load() -> Result<Self> {
        let path = get_settings_path()?;
        let mut settings = Self::load_from(&path)?;
        settings.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Load settings from an explicit file, or defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(settings)
    }

    /// Save settings to the app data directory
    pub fn save(&self) -> Result<()> {
        let path = get_settings_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(width) = lookup("LINENAV_MAX_WIDTH").and_then(|v| v.parse().ok()) {
            self.max_display_length = width;
        }
        if let Some(path) = lookup("LINENAV_MATCHER").filter(|v| !v.is_empty()) {
            self.matcher_path = Some(PathBuf::from(path));
        }
        if let Some(n) = lookup("LINENAV_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.concurrency = n;
        }
    }

    /// Worker pool size with 0 resolved to the CPU count
    pub fn effective_concurrency(&self) -> usize {
        if self.concurrency == 0 {
            num_cpus()
        } else {
            self.concurrency
        }
    }

    pub fn matcher_timeout(&self) -> Duration {
        Duration::from_secs(self.matcher_timeout_secs)
    }

    /// The custom search folder, if one is configured
    pub fn search_folder(&self) -> Option<PathBuf> {
        let trimmed = self.search_folder_path.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }

    /// Per-scope filter setting before inheritance is resolved
    pub fn scope_filter_setting(&self, kind: ScopeKind) -> Option<bool> {
        match kind {
            ScopeKind::CurrentFile => self.extension_filters_file,
            ScopeKind::OpenFiles => self.extension_filters_open_files,
            ScopeKind::Folder => self.extension_filters_folder,
            ScopeKind::Project => self.extension_filters_project,
        }
    }

    /// Decide whether extension filtering applies to a search.
    ///
    /// Priority: session override > scope override > per-scope setting >
    /// global switch. A single explicitly chosen file is never filtered.
    pub fn filters_enabled(
        &self,
        kind: ScopeKind,
        scope_override: FilterOverride,
        session_override: Option<bool>,
    ) -> bool {
        if kind == ScopeKind::CurrentFile {
            return false;
        }
        if let Some(enabled) = session_override {
            return enabled;
        }
        match scope_override {
            FilterOverride::Enabled => true,
            FilterOverride::Disabled => false,
            FilterOverride::Inherit => self
                .scope_filter_setting(kind)
                .unwrap_or(self.extension_filters),
        }
    }
}

/// Where a scope's effective filter state comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterSource {
    /// A temporary session toggle is active
    Session,
    /// The per-scope setting is explicit
    Scope,
    /// The per-scope setting is null and the global switch applies
    Inherited,
    /// The scope never filters
    Never,
}

/// One row of the filter status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFilterStatus {
    pub scope: ScopeKind,
    pub enabled: bool,
    pub source: FilterSource,
}

/// Effective filter state of every scope.
pub fn filter_status(settings: &Settings, session_override: Option<bool>) -> Vec<ScopeFilterStatus> {
    ScopeKind::ALL
        .iter()
        .map(|&scope| {
            let enabled = settings.filters_enabled(scope, FilterOverride::Inherit, session_override);
            let source = if scope == ScopeKind::CurrentFile {
                FilterSource::Never
            } else if session_override.is_some() {
                FilterSource::Session
            } else if settings.scope_filter_setting(scope).is_some() {
                FilterSource::Scope
            } else {
                FilterSource::Inherited
            };
            ScopeFilterStatus {
                scope,
                enabled,
                source,
            }
        })
        .collect()
}
