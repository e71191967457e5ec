//! Undo log for checkout application
//!
//! Every working tree mutation is preceded by an entry describing how to
//! reverse it. Rolling back replays the entries newest first. A checkout that
//! recursed into a submodule keeps the nested journal together with the
//! nested index and HEAD it replaced.

use crate::areas::refs::Refs;
use crate::areas::repository::INDEX_FILE;
use crate::areas::workspace::{GIT_DIR, Workspace};
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::refs::ref_target::RefTarget;
use crate::errors::{IoContext, PathFailure, Result};
use bytes::Bytes;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Undo {
    /// Put back a file that was overwritten or deleted
    Restore {
        path: PathBuf,
        content: Bytes,
        mode: EntryMode,
    },
    /// Put back a directory tree that was replaced
    RestoreTree {
        path: PathBuf,
        files: Vec<(PathBuf, Bytes, EntryMode)>,
    },
    /// Remove a path that did not exist before
    Remove(PathBuf),
    /// Recreate a directory that was removed
    MakeDirectory(PathBuf),
    /// Undo a checkout applied inside a nested repository
    Submodule {
        path: PathBuf,
        journal: Journal,
        head: Option<RefTarget>,
        index: Option<Bytes>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Journal {
    entries: Vec<Undo>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record whatever currently occupies `path` before it is replaced or deleted
    pub fn save_path(&mut self, workspace: &Workspace, path: &Path) -> Result<()> {
        let Some(stat) = workspace.try_stat_file(path)? else {
            self.entries.push(Undo::Remove(path.to_path_buf()));
            return Ok(());
        };

        if stat.mode.is_gitlink() {
            tracing::debug!(path = %path.display(), "nested repository is not journalled");
            return Ok(());
        }
        if stat.mode.is_tree() {
            let files = workspace
                .list_files(Some(path))?
                .into_iter()
                .map(|file| {
                    let mode = workspace.stat_file(&file)?.mode;
                    Ok((file.clone(), workspace.read_file(&file)?, mode))
                })
                .collect::<Result<Vec<_>>>()?;
            self.entries.push(Undo::RestoreTree {
                path: path.to_path_buf(),
                files,
            });
            return Ok(());
        }

        self.entries.push(Undo::Restore {
            path: path.to_path_buf(),
            content: workspace.read_file(path)?,
            mode: stat.mode,
        });
        Ok(())
    }

    pub fn directory_created(&mut self, path: &Path) {
        self.entries.push(Undo::Remove(path.to_path_buf()));
    }

    pub fn directory_removed(&mut self, path: &Path) {
        self.entries.push(Undo::MakeDirectory(path.to_path_buf()));
    }

    /// Record a checkout applied in the submodule at `path`
    ///
    /// `head` and `index` are the nested HEAD and index file content from
    /// before the checkout; `None` means absent.
    pub fn submodule_checked_out(
        &mut self,
        path: &Path,
        journal: Journal,
        head: Option<RefTarget>,
        index: Option<Bytes>,
    ) {
        self.entries.push(Undo::Submodule {
            path: path.to_path_buf(),
            journal,
            head,
            index,
        });
    }

    /// Undo everything recorded, newest first; paths that cannot be restored are reported
    pub fn rollback(self, workspace: &Workspace) -> Vec<PathFailure> {
        tracing::warn!(entries = self.entries.len(), "rolling back checkout");
        let mut failures = Vec::new();

        for undo in self.entries.into_iter().rev() {
            let (path, result) = match undo {
                Undo::Restore {
                    path,
                    content,
                    mode,
                } => {
                    let result = workspace.write_file(&path, &content, mode);
                    (path, result)
                }
                Undo::RestoreTree { path, files } => {
                    let result = workspace.remove_path(&path).and_then(|_| {
                        workspace.make_directory(&path)?;
                        files
                            .iter()
                            .try_for_each(|(file, content, mode)| {
                                workspace.write_file(file, content, *mode)
                            })
                    });
                    (path, result)
                }
                Undo::Remove(path) => {
                    let result = workspace.remove_path(&path);
                    (path, result)
                }
                Undo::MakeDirectory(path) => {
                    let result = workspace.make_directory(&path);
                    (path, result)
                }
                Undo::Submodule {
                    path,
                    journal,
                    head,
                    index,
                } => {
                    let root = workspace.abs(&path);
                    failures.extend(journal.rollback(&Workspace::new(&root)).into_iter().map(
                        |failure| PathFailure {
                            path: path.join(&failure.path),
                            ..failure
                        },
                    ));
                    let result = restore_submodule_state(&root, head, index);
                    (path, result)
                }
            };

            if let Err(error) = result {
                tracing::warn!(path = %path.display(), %error, "rollback step failed");
                failures.push(PathFailure::new(path, error));
            }
        }

        failures
    }
}

fn restore_submodule_state(root: &Path, head: Option<RefTarget>, index: Option<Bytes>) -> Result<()> {
    let git_dir = root.join(GIT_DIR);
    let index_path = git_dir.join(INDEX_FILE);

    match index {
        Some(content) => std::fs::write(&index_path, &content),
        None => match std::fs::remove_file(&index_path) {
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            result => result,
        },
    }
    .with_io_context(|| format!("Unable to restore {}", index_path.display()))?;

    if let Some(head) = head {
        Refs::new(git_dir).set_head(head)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::refs::ref_name::RefName;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rollback_restores_overwritten_and_removes_created() {
        let dir = TempDir::new().unwrap();
        dir.child("kept.txt").write_str("original").unwrap();
        let workspace = Workspace::new(dir.path());
        let mut journal = Journal::new();

        journal.save_path(&workspace, Path::new("kept.txt")).unwrap();
        workspace
            .write_file(Path::new("kept.txt"), b"changed", EntryMode::Regular)
            .unwrap();

        journal.directory_created(Path::new("fresh"));
        workspace.make_directory(Path::new("fresh")).unwrap();
        journal.save_path(&workspace, Path::new("fresh/new.txt")).unwrap();
        workspace
            .write_file(Path::new("fresh/new.txt"), b"new", EntryMode::Regular)
            .unwrap();

        let failures = journal.rollback(&workspace);

        assert!(failures.is_empty());
        assert_eq!(std::fs::read_to_string(dir.path().join("kept.txt")).unwrap(), "original");
        assert!(!dir.path().join("fresh").exists());
    }

    #[test]
    fn rollback_restores_replaced_directories() {
        let dir = TempDir::new().unwrap();
        dir.child("tree/a.txt").write_str("a").unwrap();
        dir.child("tree/sub/b.txt").write_str("b").unwrap();
        let workspace = Workspace::new(dir.path());
        let mut journal = Journal::new();

        journal.save_path(&workspace, Path::new("tree")).unwrap();
        workspace
            .write_file(Path::new("tree"), b"now a file", EntryMode::Regular)
            .unwrap();

        assert!(journal.rollback(&workspace).is_empty());
        assert_eq!(std::fs::read_to_string(dir.path().join("tree/sub/b.txt")).unwrap(), "b");
    }

    #[test]
    fn rollback_restores_submodule_files_index_and_head() {
        let dir = TempDir::new().unwrap();
        dir.child("lib/x.txt").write_str("before").unwrap();
        dir.child("lib/.git/index").write_str("old index").unwrap();
        dir.child("lib/.git/HEAD").write_str("ref: refs/heads/main\n").unwrap();
        let workspace = Workspace::new(dir.path());
        let nested = Workspace::new(dir.path().join("lib"));
        let main = RefTarget::Symbolic(RefName::branch("main").unwrap());

        let mut nested_journal = Journal::new();
        nested_journal.save_path(&nested, Path::new("x.txt")).unwrap();
        nested
            .write_file(Path::new("x.txt"), b"after", EntryMode::Regular)
            .unwrap();
        dir.child("lib/.git/index").write_str("new index").unwrap();
        dir.child("lib/.git/HEAD")
            .write_str("3b18e512dba79e4c8300dd08aeb37f8e728b8dad\n")
            .unwrap();

        let mut journal = Journal::new();
        journal.submodule_checked_out(
            Path::new("lib"),
            nested_journal,
            Some(main.clone()),
            Some(Bytes::from_static(b"old index")),
        );

        assert!(journal.rollback(&workspace).is_empty());
        assert_eq!(std::fs::read_to_string(dir.path().join("lib/x.txt")).unwrap(), "before");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("lib/.git/index")).unwrap(),
            "old index"
        );
        assert_eq!(
            Refs::new(dir.path().join("lib/.git")).read(&RefName::head()).unwrap(),
            Some(main)
        );
    }
}
