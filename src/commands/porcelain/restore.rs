use crate::areas::repository::Repository;
use crate::artifacts::core::cancellation::CancellationToken;
use crate::artifacts::diff::delta::FileMap;
use crate::artifacts::diff::tree_diff::{BlobSource, flatten_tree};
use crate::artifacts::index::index_entry::IndexEntry;
use crate::errors::{Error, Result};
use std::path::Path;

impl Repository {
    /// Reset the index entries at or below `path` to HEAD's version
    ///
    /// Paths HEAD does not have are dropped from the index; the working tree
    /// is not touched.
    pub fn unstage(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let whole_tree = path.as_os_str().is_empty() || path == Path::new(".");
        let selected = |file: &Path| whole_tree || file.starts_with(path);

        let head_files = match self.head_tree()? {
            Some(tree) => {
                let (files, failures) = flatten_tree(self.database(), &tree, &CancellationToken::new())?;
                if let Some(failure) = failures.first() {
                    return Err(Error::corrupt(failure.path.display(), &failure.reason));
                }
                files
            }
            None => FileMap::new(),
        };

        let mut index = self.lock_index();
        index.rehydrate()?;

        for tracked in index.entries_under_path(if whole_tree { Path::new(".") } else { path }) {
            if !head_files.contains_key(&tracked) {
                index.remove(&tracked);
            }
        }

        for (file, entry) in head_files.iter().filter(|(file, _)| selected(file)) {
            let unchanged = index
                .entry_by_path(file)
                .is_some_and(|staged| staged.as_database_entry() == *entry);
            if !unchanged {
                index.add(IndexEntry::from_database_entry(file, entry));
            }
        }

        tracing::debug!(path = %path.display(), "unstaged");
        index.write_updates()
    }

    pub fn unstage_all(&self) -> Result<()> {
        self.unstage(".")
    }

    /// Discard working tree changes of one path
    ///
    /// A tracked file is rewritten from its staged content; an untracked one
    /// is deleted. Conflicted paths must be resolved first.
    pub fn revert(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let workspace = self.workspace();
        let mut index = self.lock_index();
        index.rehydrate()?;

        if index.is_conflicted(path) {
            return Err(Error::conflict(
                format!("{} has unresolved conflicts", path.display()),
                vec![path.to_path_buf()],
            ));
        }

        let Some(entry) = index.entry_by_path(path).map(IndexEntry::as_database_entry) else {
            if !workspace.exists(path) {
                return Err(Error::not_found(format!("pathspec {}", path.display())));
            }
            tracing::debug!(path = %path.display(), "removing untracked path");
            return workspace.remove_path(path);
        };

        if entry.mode.is_gitlink() {
            tracing::debug!(path = %path.display(), "submodules are not reverted");
            return Ok(());
        }

        let data = self.database().load_blob(path, &entry)?;
        workspace.write_file(path, &data, entry.mode)?;
        index.update_entry_stat(path, workspace.stat_file(path)?);

        tracing::debug!(path = %path.display(), "reverted");
        index.write_updates()
    }

    /// Collapse the conflict stages of `path` into the working tree version
    ///
    /// When the file was deleted in the working tree the path leaves the index.
    pub fn mark_resolved(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut index = self.lock_index();
        index.rehydrate()?;

        if !index.is_conflicted(path) {
            return Err(Error::invalid(format!("{} is not conflicted", path.display())));
        }

        if self.workspace().exists(path) {
            self.stage_path(&mut index, path)?;
        } else {
            index.remove(path);
        }

        tracing::debug!(path = %path.display(), "marked resolved");
        index.write_updates()
    }
}
