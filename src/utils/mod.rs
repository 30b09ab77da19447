//! Utility functions shared across the crate.
//!
//! ## Modules
//!
//! - [`app_data`] - Settings directory and project-root discovery
//! - [`encoding`] - Binary sniffing and text decoding
//! - [`progress`] - Progress bar shim (no-op without the `progress` feature)
//!
//! ```no_run
//! use linenav::utils::{decode, is_binary, sniff_encoding};
//!
//! let bytes = std::fs::read("notes.txt").unwrap();
//! if !is_binary(&bytes) {
//!     let text = decode(&bytes, sniff_encoding(&bytes));
//! }
//! ```

pub mod app_data;
pub mod encoding;
pub mod progress;

pub use app_data::*;
pub use encoding::*;
