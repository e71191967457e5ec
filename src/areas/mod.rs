//! Core repository components
//!
//! This module contains the fundamental building blocks of a repository:
//!
//! - `database`: Object database for storing blobs, trees, commits and tags
//! - `index`: Staging area (index/cache) for tracking file changes and conflicts
//! - `refs`: Reference management (branches, HEAD, tags)
//! - `repository`: The engine instance coordinating the other areas
//! - `workspace`: Working directory file system operations

pub mod database;
pub mod index;
pub mod refs;
pub mod repository;
pub mod workspace;
