//! Integration tests for the linenav binary.
//!
//! Every run points `LINENAV_SETTINGS` at a file inside its own temporary
//! directory so the user's settings are never read or written.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create fixture dir");
        let tree = dir.path().join("tree");
        fs::create_dir_all(tree.join("src")).unwrap();

        fs::write(
            tree.join("src/server.py"),
            "import socket\n\ndef connect():\n    raise TimeoutError('connection timeout')\n\n# error message on timeout\n",
        )
        .unwrap();
        fs::write(
            tree.join("src/client.rs"),
            "fn main() {\n    let timeout = 30;\n    eprintln!(\"error message\");\n}\n",
        )
        .unwrap();
        fs::write(tree.join("app.log"), "error message after timeout\n").unwrap();

        Self { dir }
    }

    fn tree(&self) -> PathBuf {
        self.dir.path().join("tree")
    }

    fn settings_path(&self) -> PathBuf {
        self.dir.path().join("settings.json")
    }

    /// Run linenav and return (stdout, stderr, success)
    fn run(&self, args: &[&str]) -> (String, String, bool) {
        let output = Command::new(env!("CARGO_BIN_EXE_linenav"))
            .args(args)
            .env("LINENAV_SETTINGS", self.settings_path())
            .env_remove("LINENAV_MAX_WIDTH")
            .env_remove("LINENAV_MATCHER")
            .current_dir(self.dir.path())
            .output()
            .expect("Failed to run linenav");

        (
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
            output.status.success(),
        )
    }
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("fixture path is valid UTF-8")
}

#[test]
fn test_folder_search_prints_matching_lines() {
    let fx = Fixture::new();
    let tree = fx.tree();
    let (stdout, stderr, success) = fx.run(&[
        "--native",
        "--color",
        "never",
        "-p",
        path_arg(&tree),
        "`error message`",
        "timeout",
    ]);

    assert!(success, "stderr: {}", stderr);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 1, "stdout: {}", stdout);
    assert!(lines[0].contains("server.py"));
    assert!(lines[0].contains("# error message on timeout"));
    // Log files are blacklisted by default
    assert!(!stdout.contains("app.log"));
    assert!(stderr.contains("1 result in 2 files"), "stderr: {}", stderr);
}

#[test]
fn test_no_filters_includes_blacklisted_files() {
    let fx = Fixture::new();
    let tree = fx.tree();
    let (stdout, _, success) = fx.run(&[
        "--native",
        "--no-filters",
        "--color",
        "never",
        "-p",
        path_arg(&tree),
        "`error message`",
        "timeout",
    ]);

    assert!(success);
    assert_eq!(stdout.lines().count(), 2, "stdout: {}", stdout);
    assert!(stdout.contains("app.log"));
}

#[test]
fn test_file_subcommand_omits_file_name() {
    let fx = Fixture::new();
    let file = fx.tree().join("src/client.rs");
    let (stdout, stderr, success) =
        fx.run(&["--native", "--color", "never", "file", path_arg(&file), "timeout"]);

    assert!(success, "stderr: {}", stderr);
    assert_eq!(stdout.trim_end(), "    2 #1    let timeout = 30;");
}

#[test]
fn test_json_output() {
    let fx = Fixture::new();
    let tree = fx.tree();
    let (stdout, stderr, success) =
        fx.run(&["--native", "--json", "-p", path_arg(&tree), "timeout"]);

    assert!(success, "stderr: {}", stderr);
    let doc: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");
    assert_eq!(doc["scope"], "folder");
    assert_eq!(doc["strategy"], "native");
    assert_eq!(doc["keywords"][0]["text"], "timeout");

    let entries = doc["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    for entry in entries {
        let text = entry["text"].as_str().unwrap().to_lowercase();
        assert!(text.contains("timeout"));
    }
}

#[test]
fn test_narrow_width_windows_long_lines() {
    let fx = Fixture::new();
    let long = format!("{} needle {}", "left ".repeat(40), "right ".repeat(40));
    let file = fx.tree().join("long.txt");
    fs::write(&file, format!("{}\n", long)).unwrap();

    let (stdout, _, success) = fx.run(&[
        "--native",
        "--json",
        "--max-width",
        "30",
        "file",
        path_arg(&file),
        "needle",
    ]);

    assert!(success);
    let doc: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let entry = &doc["entries"][0];
    let text = entry["text"].as_str().unwrap();
    assert!(text.contains("needle"));
    assert!(text.starts_with('…') && text.ends_with('…'));
    assert!(text.chars().count() <= 30);
    assert_eq!(entry["windowed"], true);
}

#[test]
fn test_filters_reports_every_scope() {
    let fx = Fixture::new();
    let (stdout, _, success) = fx.run(&["--color", "never", "filters"]);

    assert!(success);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("file"));
    assert!(lines[0].contains("off"));
    assert!(lines[2].starts_with("folder"));
    assert!(lines[2].contains("on"));

    let (stdout, _, _) = fx.run(&["--color", "never", "--no-filters", "filters"]);
    assert!(stdout.lines().nth(2).unwrap().contains("session override"));
}

#[test]
fn test_config_roundtrip() {
    let fx = Fixture::new();
    let tree = fx.tree();

    let (stdout, _, success) = fx.run(&["config", "toggle-filters"]);
    assert!(success);
    assert!(stdout.contains("Extension filters disabled"));

    let (_, stderr, success) = fx.run(&["config", "set-folder", path_arg(&tree)]);
    assert!(success, "stderr: {}", stderr);

    let (stdout, _, success) = fx.run(&["config", "show"]);
    assert!(success);
    let json_start = stdout.find('{').unwrap();
    let settings: serde_json::Value = serde_json::from_str(&stdout[json_start..]).unwrap();
    assert_eq!(settings["extension_filters"], false);
    let saved = PathBuf::from(settings["search_folder_path"].as_str().unwrap());
    assert_eq!(saved, tree.canonicalize().unwrap());

    // Default folder search now uses the saved folder; the folder scope
    // keeps its own filter setting when the global switch is off
    let (stdout, _, success) = fx.run(&["--native", "--color", "never", "`error message`", "timeout"]);
    assert!(success);
    assert!(stdout.contains("server.py"));
    assert!(!stdout.contains("app.log"));

    let (_, _, success) = fx.run(&["config", "clear-folder"]);
    assert!(success);
    let (stdout, _, _) = fx.run(&["config", "show"]);
    assert!(stdout.contains("\"search_folder_path\": \"\""));
}

#[test]
fn test_set_folder_rejects_missing_directory() {
    let fx = Fixture::new();
    let missing = fx.dir.path().join("missing");
    let (_, stderr, success) = fx.run(&["config", "set-folder", path_arg(&missing)]);

    assert!(!success);
    assert!(stderr.contains("Not a directory"));
    assert!(!fx.settings_path().exists());
}

#[test]
fn test_missing_folder_fails() {
    let fx = Fixture::new();
    let missing = fx.dir.path().join("nope");
    let (_, _, success) = fx.run(&["--native", "-p", path_arg(&missing), "x"]);
    assert!(!success);
}
