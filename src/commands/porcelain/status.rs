use crate::areas::repository::Repository;
use crate::artifacts::core::cancellation::CancellationToken;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::status::options::{StatusOptions, StatusShow};
use crate::artifacts::status::status_entry::StatusFlags;
use crate::artifacts::status::status_info::{Status, StatusReport};
use crate::errors::{Error, Result};
use std::path::Path;

impl Repository {
    /// Classify HEAD against the index and the index against the working tree
    pub fn status(
        &self,
        options: StatusOptions,
        show: StatusShow,
        cancel: &CancellationToken,
    ) -> Result<StatusReport> {
        let head = self.refs().read_head()?;
        self.status_against(head.as_ref(), options, show, cancel)
    }

    /// Like [`Repository::status`], with the staged side compared to `baseline`
    ///
    /// `baseline` is a commit, tag or tree; `None` compares against the empty tree.
    pub fn status_against(
        &self,
        baseline: Option<&ObjectId>,
        options: StatusOptions,
        show: StatusShow,
        cancel: &CancellationToken,
    ) -> Result<StatusReport> {
        let baseline_tree = self.baseline_tree(baseline)?;
        let mut index = self.lock_index();

        let report = self
            .status_engine()
            .scan(&mut index, baseline_tree.as_ref(), options, show, cancel)?;

        tracing::debug!(
            entries = report.entries.len(),
            failures = report.failures.len(),
            baseline = ?baseline,
            "status scan finished"
        );
        Ok(report)
    }

    /// Status as seen by an amend of HEAD: staged changes relative to HEAD's parent
    ///
    /// A root commit is amended against the empty tree; an unborn HEAD has
    /// nothing to amend.
    pub fn amending_status(
        &self,
        options: StatusOptions,
        show: StatusShow,
        cancel: &CancellationToken,
    ) -> Result<StatusReport> {
        let baseline = self.amend_baseline()?;
        self.status_against(baseline.as_ref(), options, show, cancel)
    }

    /// First parent of HEAD, the commit an amend rewrites on top of
    pub fn amend_baseline(&self) -> Result<Option<ObjectId>> {
        let head = self
            .refs()
            .read_head()?
            .ok_or_else(|| Error::not_found("HEAD has no commit to amend"))?;
        let commit = self
            .database()
            .parse_object_as_commit(&head)?
            .ok_or_else(|| Error::invalid(format!("HEAD {head} is not a commit")))?;

        Ok(commit.parents().first().copied())
    }

    /// Status flags of one path; empty flags mean it is tracked and unchanged
    pub fn file_status(
        &self,
        path: impl AsRef<Path>,
        show: StatusShow,
        cancel: &CancellationToken,
    ) -> Result<StatusFlags> {
        let head = self.refs().read_head()?;
        self.file_status_against(path, head.as_ref(), show, cancel)
    }

    pub fn file_status_against(
        &self,
        path: impl AsRef<Path>,
        baseline: Option<&ObjectId>,
        show: StatusShow,
        cancel: &CancellationToken,
    ) -> Result<StatusFlags> {
        let baseline_tree = self.baseline_tree(baseline)?;
        let mut index = self.lock_index();

        self.status_engine()
            .file_status(&mut index, baseline_tree.as_ref(), path.as_ref(), show, cancel)
    }

    fn baseline_tree(&self, baseline: Option<&ObjectId>) -> Result<Option<ObjectId>> {
        baseline
            .map(|oid| self.database().peel_to_tree(oid))
            .transpose()
    }

    fn status_engine(&self) -> Status<'_> {
        Status::new(self.database(), self.workspace(), self.config())
    }
}
