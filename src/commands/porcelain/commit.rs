use crate::areas::repository::Repository;
use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};

impl Repository {
    /// Record the index as a commit on top of HEAD and advance HEAD to it
    ///
    /// Without an explicit author the identity is read from `GIT_AUTHOR_NAME`,
    /// `GIT_AUTHOR_EMAIL` and `GIT_AUTHOR_DATE`. The objects are stored before
    /// HEAD moves; a concurrent HEAD update makes this fail with `Conflict`.
    pub fn commit(&self, message: &str, author: Option<Author>) -> Result<ObjectId> {
        let author = match author {
            Some(author) => author,
            None => Author::load_from_env().map_err(Error::invalid)?,
        };

        let mut index = self.lock_index();
        index.rehydrate()?;
        let tree_id = self.write_index_tree(&index)?;

        let parent = self.refs().read_head()?;
        let is_root = parent.is_none();
        let commit = Commit::new(parent.into_iter().collect(), tree_id, author, message.trim());
        let commit_id = self.database().store(&commit)?;

        self.refs().update_head(commit_id, parent)?;

        tracing::info!(
            %commit_id,
            root = is_root,
            message = %commit.short_message(),
            "committed"
        );
        Ok(commit_id)
    }
}
