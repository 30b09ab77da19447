//! Scope resolution: which files a search looks at.
//!
//! - [`types`] - `Scope`, `ScopeSpec`, `Candidate`
//! - [`filter`] - Extension whitelist and blacklist
//! - [`resolver`] - Folder traversal and open-buffer expansion
//! - [`sniff`] - Remembered binary and encoding verdicts per file

pub mod filter;
pub mod resolver;
pub mod sniff;
pub mod types;

pub use filter::{accepts, extension_of, ExtensionRule};
pub use resolver::{Resolution, ResolveOptions, ScopeResolver};
pub use sniff::SniffCache;
pub use types::{Candidate, FilterOverride, Scope, ScopeKind, ScopeSpec};
