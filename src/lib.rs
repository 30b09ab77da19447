//! # linenav - Keyword line navigation
//!
//! linenav narrows a body of text down to the lines that contain every
//! keyword of a query, fast enough to re-run on each keystroke of an
//! interactive picker.
//!
//! ## Architecture
//!
//! A query flows through these modules:
//!
//! - [`query`] - Keyword parsing (literals, quoted phrases, CJK quotes)
//! - [`scope`] - Scope resolution and extension filtering
//! - [`search`] - Line matching (external `ugrep` or native), caching,
//!   cancellation
//! - [`format`] - Width-bounded display entries
//! - [`highlight`] - Highlight records painted into host views
//! - [`navigator`] - The interface a host drives: query, preview, select
//!
//! The host editor is abstracted behind the traits in [`host`]; the CLI
//! uses the in-memory [`host::MemoryHost`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use linenav::config::Settings;
//! use linenav::highlight::HighlightRegistry;
//! use linenav::host::MemoryHost;
//! use linenav::navigator::Navigator;
//! use linenav::scope::{Scope, ScopeSpec};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let host = Arc::new(MemoryHost::new());
//! let registry = HighlightRegistry::new(host.clone());
//! let navigator = Navigator::new(host, Settings::default(), &registry).unwrap();
//!
//! let spec = ScopeSpec::new(Scope::Folder(PathBuf::from("src")));
//! let results = navigator.run_query(&spec, "`error message` timeout").unwrap();
//! for entry in &results.entries {
//!     println!("{}  {}", entry.header, entry.text);
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod highlight;
pub mod host;
pub mod navigator;
pub mod output;
pub mod query;
pub mod scope;
pub mod search;
pub mod utils;
