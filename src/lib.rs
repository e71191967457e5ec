//! xit: a content-addressed version-control engine
//!
//! The crate provides the stores and scanners a git front end sits on:
//!
//! - `areas`: the on-disk stores (objects, refs, index, working tree) and the
//!   [`Repository`] tying them together
//! - `artifacts`: data structures and algorithms (objects, diff, status, checkout)
//! - `commands`: repository operations, as `impl Repository` blocks
//! - `config`: engine tuning knobs
//! - `errors`: the error taxonomy shared by every operation
//!
//! The API is synchronous; a [`Repository`] can be shared between threads.
//! Long operations accept a [`CancellationToken`] which they check between
//! path entries.

pub mod areas;
pub mod artifacts;
pub mod commands;
pub mod config;
pub mod errors;

pub use areas::repository::Repository;
pub use artifacts::core::cancellation::CancellationToken;
pub use config::EngineConfig;
pub use errors::{Error, PathFailure, Result};
