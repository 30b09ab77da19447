use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "linenav";
const SETTINGS_FILE: &str = "settings.json";

/// Get the number of CPUs available
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Get the path to the settings file. `LINENAV_SETTINGS` overrides the
/// default location.
pub fn get_settings_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os("LINENAV_SETTINGS").filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let app_dir = get_app_data_dir()?;
    Ok(app_dir.join(SETTINGS_FILE))
}

/// Get the application data directory, creating it if needed
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: use XDG_CONFIG_HOME or ~/.config
        dirs::config_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    let app_dir = base.join(APP_NAME);

    fs::create_dir_all(&app_dir)
        .with_context(|| format!("Failed to create {}", app_dir.display()))?;
    Ok(app_dir)
}

/// Find the root of the project containing `start_path`.
///
/// Walks up the directory tree looking for a version-control directory.
/// Falls back to the start path itself when none is found.
pub fn find_project_root(start_path: &Path) -> Result<PathBuf> {
    let start = start_path
        .canonicalize()
        .with_context(|| format!("Invalid path: {}", start_path.display()))?;
    let mut current = start.as_path();

    loop {
        if [".git", ".hg", ".svn"].iter().any(|vcs| current.join(vcs).exists()) {
            return Ok(current.to_path_buf());
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    Ok(start)
}
