use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::status::ignore::IgnoreRules;
use crate::errors::{Error, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

impl Repository {
    /// Stage a file, or every file below a directory
    ///
    /// Tracked paths below `path` that vanished from the working tree are
    /// removed from the index. Untracked ignored files are skipped.
    pub fn add(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut index = self.lock_index();
        index.rehydrate()?;

        self.stage_path(&mut index, path.as_ref())?;
        index.write_updates()
    }

    /// Stage the whole working tree
    pub fn add_all(&self) -> Result<()> {
        self.add(".")
    }

    pub(crate) fn stage_path(&self, index: &mut Index, path: &Path) -> Result<()> {
        let workspace = self.workspace();
        let whole_tree = path.as_os_str().is_empty() || path == Path::new(".");
        let rules = IgnoreRules::load(workspace.path(), self.config())?;

        let files = match (whole_tree, workspace.exists(path)) {
            (true, _) => workspace.list_files(None)?,
            (false, true) => workspace.list_files(Some(path))?,
            (false, false) => Vec::new(),
        };
        let tracked = index.entries_under_path(if whole_tree { Path::new(".") } else { path });

        if files.is_empty() && tracked.is_empty() {
            return Err(Error::not_found(format!("pathspec {}", path.display())));
        }

        let present = files.iter().cloned().collect::<BTreeSet<PathBuf>>();
        for vanished in tracked.iter().filter(|tracked| !present.contains(*tracked)) {
            tracing::trace!(path = %vanished.display(), "unstaging vanished path");
            index.remove(vanished);
        }

        for file in files {
            if !index.is_directly_tracked(&file) && rules.is_ignored(&file, false) {
                continue;
            }

            let stat = workspace.stat_file(&file)?;
            let oid = if stat.mode.is_gitlink() {
                match workspace.submodule_head(&file)? {
                    Some(oid) => oid,
                    None => {
                        tracing::debug!(path = %file.display(), "skipping submodule without HEAD");
                        continue;
                    }
                }
            } else {
                self.database()
                    .put(ObjectType::Blob, &workspace.read_file(&file)?)?
            };

            tracing::trace!(path = %file.display(), %oid, "staged");
            index.add(IndexEntry::new(file, oid, stat));
        }

        Ok(())
    }
}
