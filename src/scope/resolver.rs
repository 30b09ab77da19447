//! Expands a scope into an ordered, deduplicated list of candidates.

use super::filter::ExtensionRule;
use super::sniff::{SniffCache, Sniffed};
use super::types::{Candidate, Scope};
use crate::config::Settings;
use crate::error::{ScanWarning, SearchError, WarningKind};
use crate::host::{BufferSource, OpenBuffer};
use crate::search::cancel::CancellationToken;
use crate::utils::encoding::{is_binary, sniff_encoding, SNIFF_SIZE};
use encoding_rs::UTF_8;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tracing::debug;

/// Directory names never descended into.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "target",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".idea",
    ".vscode",
];

/// Filtering inputs for one resolution.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub rule: ExtensionRule,
    pub filters_enabled: bool,
    pub max_file_size: u64,
    pub exclude_patterns: Vec<String>,
}

impl ResolveOptions {
    pub fn from_settings(settings: &Settings, filters_enabled: bool) -> Self {
        Self {
            rule: ExtensionRule::new(
                settings.file_extensions.as_slice(),
                settings.file_extensions_blacklist.as_slice(),
            ),
            filters_enabled,
            max_file_size: settings.max_file_size,
            exclude_patterns: settings.exclude_patterns.clone(),
        }
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), true)
    }
}

/// Candidates plus everything skipped along the way.
#[derive(Debug, Default)]
pub struct Resolution {
    pub candidates: Vec<Candidate>,
    pub warnings: Vec<ScanWarning>,
}

pub struct ScopeResolver<'a> {
    host: &'a dyn BufferSource,
    options: ResolveOptions,
    token: CancellationToken,
    sniffs: Option<&'a SniffCache>,
}

impl<'a> ScopeResolver<'a> {
    pub fn new(host: &'a dyn BufferSource, options: ResolveOptions) -> Self {
        Self {
            host,
            options,
            token: CancellationToken::never(),
            sniffs: None,
        }
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Reuse earlier content verdicts for files whose size and mtime are
    /// unchanged.
    pub fn with_sniff_cache(mut self, sniffs: &'a SniffCache) -> Self {
        self.sniffs = Some(sniffs);
        self
    }

    pub fn resolve(&self, scope: &Scope) -> Result<Resolution, SearchError> {
        let mut resolution = Resolution::default();
        let mut seen = FxHashSet::default();

        match scope {
            Scope::CurrentFile => {
                let view = self
                    .host
                    .active_view()
                    .ok_or_else(|| SearchError::NoScope("no active view".to_string()))?;
                let buffer = self
                    .host
                    .open_buffers()
                    .into_iter()
                    .find(|b| b.view == view)
                    .ok_or_else(|| SearchError::NoScope(format!("view {} is not open", view)))?;
                // An explicitly chosen file is never filtered
                self.push_buffer(&buffer, false, &mut seen, &mut resolution);
            }
            Scope::OpenFiles => {
                for buffer in self.host.open_buffers() {
                    self.check_cancelled()?;
                    self.push_buffer(&buffer, self.options.filters_enabled, &mut seen, &mut resolution);
                }
            }
            Scope::Folder(root) => {
                self.walk_root(root, &mut seen, &mut resolution)?;
            }
            Scope::Project(folders) => {
                let folders = if folders.is_empty() {
                    self.host.project_folders()
                } else {
                    folders.clone()
                };
                if folders.is_empty() {
                    return Err(SearchError::NoScope("project has no folders".to_string()));
                }
                for root in &folders {
                    self.walk_root(root, &mut seen, &mut resolution)?;
                }
            }
        }

        debug!(
            scope = ?scope.kind(),
            candidates = resolution.candidates.len(),
            skipped = resolution.warnings.len(),
            "Resolved scope"
        );
        Ok(resolution)
    }

    fn check_cancelled(&self) -> Result<(), SearchError> {
        if self.token.is_cancelled() {
            Err(SearchError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn push_buffer(
        &self,
        buffer: &OpenBuffer,
        filter: bool,
        seen: &mut FxHashSet<PathBuf>,
        resolution: &mut Resolution,
    ) {
        let display = buffer.display_path();
        if !self.options.rule.accepts(&display, filter) {
            return;
        }

        let on_disk = match &buffer.path {
            Some(path) if !buffer.needs_buffer_text() => inspect_file(path, None).ok(),
            _ => None,
        };

        let candidate = match on_disk {
            Some(mut candidate) => {
                candidate.view = Some(buffer.view);
                candidate
            }
            None => match self.host.view_text(buffer.view) {
                Ok(text) => Candidate {
                    path: canonical_or_self(&display),
                    size: text.len() as u64,
                    mtime: 0,
                    is_binary: false,
                    encoding: UTF_8,
                    buffer: Some(text),
                    view: Some(buffer.view),
                },
                Err(e) => {
                    resolution
                        .warnings
                        .push(ScanWarning::new(display, WarningKind::Unreadable, e.to_string()));
                    return;
                }
            },
        };

        if seen.insert(candidate.path.clone()) {
            resolution.candidates.push(candidate);
        }
    }

    fn walk_root(
        &self,
        root: &Path,
        seen: &mut FxHashSet<PathBuf>,
        resolution: &mut Resolution,
    ) -> Result<(), SearchError> {
        let root = root
            .canonicalize()
            .map_err(|e| SearchError::NoScope(format!("{}: {}", root.display(), e)))?;
        if !root.is_dir() {
            return Err(SearchError::NoScope(format!("{} is not a folder", root.display())));
        }

        let excludes = Arc::new(build_excludes(&self.options.exclude_patterns)?);
        let walk_root = root.clone();

        let walker = WalkBuilder::new(&root)
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                let name = entry.file_name().to_string_lossy();
                if entry.file_type().is_some_and(|t| t.is_dir()) && IGNORED_DIRS.contains(&name.as_ref()) {
                    return false;
                }
                let rel = entry.path().strip_prefix(&walk_root).unwrap_or(entry.path());
                !(excludes.is_match(rel) || excludes.is_match(name.as_ref()))
            })
            .build();

        let mut paths = Vec::new();
        for entry in walker {
            self.check_cancelled()?;
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let warning = match walk_error_path(&err) {
                        Some(path) => ScanWarning::new(path, WarningKind::Unreadable, err.to_string()),
                        None => ScanWarning::detached(WarningKind::Unreadable, err.to_string()),
                    };
                    debug!(%warning, "Skipping entry");
                    resolution.warnings.push(warning);
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.into_path();
            if self.options.rule.accepts(&path, self.options.filters_enabled) {
                paths.push(path);
            }
        }

        // Indexed collect keeps traversal order regardless of which worker
        // finishes first
        let max_size = self.options.max_file_size;
        let token = &self.token;
        let sniffs = self.sniffs;
        let inspected: Vec<Option<Result<Candidate, ScanWarning>>> = paths
            .par_iter()
            .map(|path| {
                if token.is_cancelled() {
                    None
                } else {
                    Some(inspect_with(path, Some(max_size), sniffs))
                }
            })
            .collect();
        self.check_cancelled()?;

        for result in inspected.into_iter().flatten() {
            match result {
                Ok(candidate) => {
                    if seen.insert(candidate.path.clone()) {
                        resolution.candidates.push(candidate);
                    }
                }
                Err(warning) => {
                    debug!(%warning, "Skipping file");
                    resolution.warnings.push(warning);
                }
            }
        }

        Ok(())
    }
}

fn build_excludes(patterns: &[String]) -> Result<GlobSet, SearchError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| SearchError::Config(format!("exclude pattern {:?}: {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| SearchError::Config(e.to_string()))
}

fn walk_error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            walk_error_path(err)
        }
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        _ => None,
    }
}

fn canonical_or_self(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Gather candidate metadata from disk. `max_size` applies the size ceiling.
pub fn inspect_file(path: &Path, max_size: Option<u64>) -> Result<Candidate, ScanWarning> {
    inspect_with(path, max_size, None)
}

fn inspect_with(path: &Path, max_size: Option<u64>, sniffs: Option<&SniffCache>) -> Result<Candidate, ScanWarning> {
    let unreadable = |e: std::io::Error| ScanWarning::new(path, WarningKind::Unreadable, e.to_string());

    let metadata = fs::metadata(path).map_err(unreadable)?;
    let size = metadata.len();
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    if let Some(limit) = max_size {
        if size > limit {
            return Err(ScanWarning::new(
                path,
                WarningKind::TooLarge,
                format!("{} bytes exceeds the {} byte limit", size, limit),
            ));
        }
    }

    let sniffed = match sniffs.and_then(|cache| cache.get(path, size, mtime)) {
        Some(sniffed) => sniffed,
        None => {
            let mut sample = Vec::with_capacity(SNIFF_SIZE.min(size as usize));
            File::open(path)
                .and_then(|file| file.take(SNIFF_SIZE as u64).read_to_end(&mut sample))
                .map_err(unreadable)?;
            let sniffed = Sniffed {
                is_binary: is_binary(&sample),
                encoding: sniff_encoding(&sample),
            };
            if let Some(cache) = sniffs {
                cache.insert(path, size, mtime, sniffed);
            }
            sniffed
        }
    };

    Ok(Candidate {
        path: canonical_or_self(path),
        size,
        mtime,
        is_binary: sniffed.is_binary,
        encoding: sniffed.encoding,
        buffer: None,
        view: None,
    })
}
