//! Helpers for the text typed into the query panel.
//!
//! The panel text is what the user edits; keywords are derived from it with
//! [`parse_keywords`]. These helpers keep selections round-trippable: a
//! selection pasted into the panel parses back to exactly one keyword.

use crate::query::parser::parse_keywords;
use std::sync::Mutex;
use tracing::debug;

/// Quote a keyword so that [`parse_keywords`] yields it back unchanged.
///
/// A keyword containing a backtick is wrapped in double quotes, one
/// containing whitespace or an apostrophe in backticks, anything else is
/// returned as-is.
pub fn format_keyword_for_input(keyword: &str) -> String {
    if keyword.contains('`') {
        format!("\"{}\"", keyword)
    } else if keyword.contains(char::is_whitespace) || keyword.contains('\'') {
        format!("`{}`", keyword)
    } else {
        keyword.to_string()
    }
}

/// Append `selected` to the panel text unless it is already one of its
/// keywords. The result always ends with a space when it holds keywords so
/// the user can keep typing.
pub fn append_selection(current: &str, selected: &str) -> String {
    if selected.is_empty() {
        return current.to_string();
    }

    let formatted = format_keyword_for_input(selected);
    let already_present = parse_keywords(current)
        .iter()
        .any(|k| k.text == selected || k.text == formatted);
    if already_present {
        return current.to_string();
    }

    let joined = if current.is_empty() || current.ends_with(' ') {
        format!("{}{}", current, formatted)
    } else {
        format!("{} {}", current, formatted)
    };
    ensure_trailing_space(&joined)
}

/// Add a trailing space to text that contains at least one keyword.
pub fn ensure_trailing_space(text: &str) -> String {
    if text.is_empty() || text.ends_with(' ') || parse_keywords(text).is_empty() {
        return text.to_string();
    }
    format!("{} ", text)
}

/// Remembers the last query so a reopened panel starts where the user left
/// off.
#[derive(Debug, Default)]
pub struct QueryMemory {
    stored: Mutex<String>,
}

impl QueryMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the panel text. Empty text does not overwrite a stored query.
    pub fn save(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Ok(mut stored) = self.stored.lock() {
            debug!(query = text, "stored query");
            *stored = text.to_string();
        }
    }

    pub fn stored(&self) -> String {
        self.stored.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Forget the stored query (escape / clear command).
    pub fn clear(&self) {
        if let Ok(mut stored) = self.stored.lock() {
            stored.clear();
        }
    }

    /// Initial text for a new panel: the selection if there is one,
    /// otherwise the stored query.
    pub fn initial_text(&self, selected: Option<&str>) -> String {
        match selected.filter(|s| !s.is_empty()) {
            Some(selected) => ensure_trailing_space(&format_keyword_for_input(selected)),
            None => ensure_trailing_space(&self.stored()),
        }
    }
}
