//! Host coordination helpers
//!
//! - `cancellation`: cooperative cancellation shared between a host and a running operation
//! - `pending`: a one-shot result handle a host event loop can wait on

pub mod cancellation;
pub mod pending;
