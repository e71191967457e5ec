use crate::areas::repository::Repository;
use crate::artifacts::core::cancellation::CancellationToken;
use crate::artifacts::diff::options::DiffOptions;
use crate::artifacts::diff::tree_diff::{DiffResult, TreeDiffer};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::Result;

impl Repository {
    /// Compare two trees, commits or tags; `None` stands for the empty tree
    pub fn diff(
        &self,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
        options: DiffOptions,
        cancel: &CancellationToken,
    ) -> Result<DiffResult> {
        TreeDiffer::new(self.database(), options)?
            .with_config(self.config())
            .diff(old, new, cancel)
    }
}
