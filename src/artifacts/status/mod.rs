//! Working tree status inspection
//!
//! Compares HEAD against the index and the index against the working tree,
//! producing one [`status_entry::StatusEntry`] per changed path.
//!
//! ## Components
//!
//! - `options`: scan switches and which comparisons to run
//! - `status_entry`: status bits and the per-side status precedence
//! - `inspector`: stat-cache fast path for tracked files
//! - `ignore`: gitignore rule matching
//! - `status_info`: the scan itself

pub mod ignore;
pub mod inspector;
pub mod options;
pub mod status_entry;
pub mod status_info;
