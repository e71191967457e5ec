//! Checkout operations and conflict handling
//!
//! This module handles moving the working tree and index to a target tree:
//! - Computing differences between the baseline and target trees
//! - Detecting conflicts with local modifications
//! - Planning and executing file system changes under a journal
//! - Updating the index to match the target
//!
//! Under the SAFE strategy all conflicts are detected before any change is
//! made to the working directory.

pub mod conflict;
pub mod journal;
pub mod migration;
pub mod strategy;
