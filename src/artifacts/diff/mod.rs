//! Tree comparison
//!
//! - `delta`: per-path change records, the shared classifier and directory aggregation
//! - `options`: diff behaviour switches
//! - `tree_diff`: the tree walk and the flattened-view comparison used by status
//! - `similarity`: rename and copy pairing
//! - `binary`: text/binary classification

pub mod binary;
pub mod delta;
pub mod options;
pub mod similarity;
pub mod tree_diff;
