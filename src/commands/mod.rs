//! Repository operations
//!
//! Operations are `impl Repository` blocks, organized into two categories
//! following Git's architecture:
//!
//! - `plumbing`: Low-level operations over stored objects (write-tree)
//! - `porcelain`: Host-facing workflows (init, staging, commit, diff, status, checkout)

pub mod plumbing;
pub mod porcelain;
