//! Data structures and algorithms
//!
//! - `checkout`: Checkout planning, conflict detection and journalled application
//! - `core`: Cancellation and host coordination helpers
//! - `database`: Database entry types
//! - `diff`: Tree diffing, rename/copy detection and binary classification
//! - `index`: Index/staging area data structures
//! - `objects`: Object types (blob, tree, commit, tag)
//! - `refs`: Reference names and targets
//! - `status`: Working tree status inspection

pub mod checkout;
pub mod core;
pub mod database;
pub mod diff;
pub mod index;
pub mod objects;
pub mod refs;
pub mod status;
