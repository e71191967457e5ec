//! Plumbing operations
//!
//! - `write_tree`: Store the trees described by the index

pub mod write_tree;
