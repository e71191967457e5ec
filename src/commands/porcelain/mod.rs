//! Porcelain operations
//!
//! ## Operations
//!
//! - `init`: Create a new repository
//! - `add`: Stage working tree content
//! - `restore`: Unstage, revert and resolve paths
//! - `commit`: Record the index as a new commit
//! - `diff`: Compare two trees
//! - `status`: Classify working tree and index changes
//! - `checkout`: Plan and apply a target tree, switch branches

pub mod add;
pub mod checkout;
pub mod commit;
pub mod diff;
pub mod init;
pub mod restore;
pub mod status;
