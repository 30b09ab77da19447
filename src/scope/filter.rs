//! Extension-based inclusion and exclusion of files.
//!
//! Whitelist tokens:
//!
//! | token              | accepts                                  |
//! |--------------------|------------------------------------------|
//! | `*` or `*.*`       | every file                               |
//! | `.` or `*.`        | files that have an extension             |
//! | `""`               | files without an extension               |
//! | `py`, `.py`, `*.py`| files with that extension (any case)     |
//!
//! The blacklist only holds literal extensions and always wins.

use rustc_hash::FxHashSet;
use std::path::Path;

/// Lowercase extension of `path` without the dot, empty when there is none.
///
/// Leading-dot names such as `.bashrc` have no extension.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    MatchAll,
    HasExtension,
    NoExtension,
    Literal(String),
}

fn parse_token(raw: &str) -> Token {
    let token = raw.trim();
    if token == "*" || token == "*.*" {
        return Token::MatchAll;
    }
    let token = token.strip_prefix('*').unwrap_or(token);
    match token {
        "." => Token::HasExtension,
        "" => Token::NoExtension,
        _ => Token::Literal(token.trim_start_matches('.').to_lowercase()),
    }
}

/// Compiled whitelist and blacklist.
#[derive(Debug, Clone, Default)]
pub struct ExtensionRule {
    match_all: bool,
    has_extension: bool,
    no_extension: bool,
    whitelist: FxHashSet<String>,
    blacklist: FxHashSet<String>,
}

impl ExtensionRule {
    pub fn new<S: AsRef<str>>(whitelist: &[S], blacklist: &[S]) -> Self {
        let mut rule = ExtensionRule::default();

        for raw in whitelist {
            match parse_token(raw.as_ref()) {
                Token::MatchAll => rule.match_all = true,
                Token::HasExtension => rule.has_extension = true,
                Token::NoExtension => rule.no_extension = true,
                Token::Literal(ext) => {
                    rule.whitelist.insert(ext);
                }
            }
        }

        // Special tokens mean nothing in a blacklist
        for raw in blacklist {
            if let Token::Literal(ext) = parse_token(raw.as_ref()) {
                rule.blacklist.insert(ext);
            }
        }

        rule
    }

    fn whitelist_is_empty(&self) -> bool {
        !self.match_all && !self.has_extension && !self.no_extension && self.whitelist.is_empty()
    }

    /// Decide whether `path` is searched.
    pub fn accepts(&self, path: &Path, filters_enabled: bool) -> bool {
        if !filters_enabled {
            return true;
        }

        let ext = extension_of(path);
        if !ext.is_empty() && self.blacklist.contains(&ext) {
            return false;
        }

        if self.match_all || self.whitelist_is_empty() {
            return true;
        }

        if ext.is_empty() {
            self.no_extension
        } else {
            self.has_extension || self.whitelist.contains(&ext)
        }
    }
}

/// One-shot form of [`ExtensionRule::accepts`].
pub fn accepts<S: AsRef<str>>(
    path: &Path,
    whitelist: &[S],
    blacklist: &[S],
    filters_enabled: bool,
) -> bool {
    ExtensionRule::new(whitelist, blacklist).accepts(path, filters_enabled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_BLACKLIST;

    const NONE: &[&str] = &[];

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("src/main.RS")), "rs");
        assert_eq!(extension_of(Path::new("archive.tar.gz")), "gz");
        assert_eq!(extension_of(Path::new("Makefile")), "");
        assert_eq!(extension_of(Path::new(".bashrc")), "");
    }

    #[test]
    fn test_empty_whitelist_accepts_non_blacklisted() {
        for name in ["a.py", "README", "notes.TXT", "x.unknownext"] {
            assert!(accepts(Path::new(name), NONE, DEFAULT_BLACKLIST, true), "{name}");
        }
        assert!(!accepts(Path::new("a.log"), NONE, DEFAULT_BLACKLIST, true));
        assert!(!accepts(Path::new("IMG.PNG"), NONE, DEFAULT_BLACKLIST, true));
    }

    #[test]
    fn test_has_extension_token() {
        let whitelist = ["."];
        assert!(!accepts(Path::new("README"), &whitelist, NONE, true));
        assert!(!accepts(Path::new("Makefile"), &whitelist, NONE, true));
        assert!(accepts(Path::new("main.py"), &whitelist, NONE, true));
    }

    #[test]
    fn test_no_extension_token() {
        let whitelist = ["", "rs"];
        assert!(accepts(Path::new("Makefile"), &whitelist, NONE, true));
        assert!(accepts(Path::new("lib.rs"), &whitelist, NONE, true));
        assert!(!accepts(Path::new("main.py"), &whitelist, NONE, true));
    }

    #[test]
    fn test_match_all_token() {
        let rule = ExtensionRule::new(&["*"], &["log"]);
        assert!(rule.accepts(Path::new("Makefile"), true));
        assert!(rule.accepts(Path::new("x.py"), true));
        assert!(!rule.accepts(Path::new("x.log"), true));
    }

    #[test]
    fn test_literal_forms_are_equivalent() {
        for token in ["py", ".py", "*.py", "PY", " *.Py "] {
            let rule = ExtensionRule::new(&[token], &[]);
            assert!(rule.accepts(Path::new("main.py"), true), "{token}");
            assert!(!rule.accepts(Path::new("main.rs"), true), "{token}");
        }
    }

    #[test]
    fn test_blacklist_beats_whitelist() {
        let rule = ExtensionRule::new(&["log", "*", "."], &["*.log"]);
        assert!(!rule.accepts(Path::new("server.log"), true));
    }

    #[test]
    fn test_filters_disabled_accepts_everything() {
        let rule = ExtensionRule::new(&["py"], &["log"]);
        assert!(rule.accepts(Path::new("server.log"), false));
        assert!(rule.accepts(Path::new("README"), false));
    }

    #[test]
    fn test_special_tokens_ignored_in_blacklist() {
        let rule = ExtensionRule::new(&[], &["", ".", "*"]);
        assert!(rule.accepts(Path::new("README"), true));
        assert!(rule.accepts(Path::new("main.py"), true));
    }
}
