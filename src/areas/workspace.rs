use crate::areas::database::Database;
use crate::areas::refs::Refs;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::EntryMetadata;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, IoContext, Result};
use bytes::Bytes;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Name of the repository metadata directory, never part of the working tree
pub const GIT_DIR: &str = ".git";

/// Working tree access, all paths relative to the workspace root
#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Workspace {
            path: path.into().into_boxed_path(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn abs(&self, path: &Path) -> PathBuf {
        self.path.join(path)
    }

    fn is_git_dir(path: &Path) -> bool {
        path.file_name().is_some_and(|name| name == GIT_DIR)
    }

    /// Immediate children of a directory, excluding `.git`
    pub fn list_dir(&self, dir_path: &Path) -> Result<Vec<PathBuf>> {
        let abs_dir = self.abs(dir_path);
        let entries = std::fs::read_dir(&abs_dir)
            .with_io_context(|| format!("Unable to list directory {}", abs_dir.display()))?;

        let mut children = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| !Self::is_git_dir(path))
            .filter_map(|path| path.strip_prefix(&self.path).ok().map(Path::to_path_buf))
            .collect::<Vec<_>>();

        children.sort();
        Ok(children)
    }

    /// Every file below `root` (the whole tree when `None`)
    ///
    /// Nested repositories are returned as a single path and not descended into.
    pub fn list_files(&self, root: Option<&Path>) -> Result<Vec<PathBuf>> {
        let root_path = root.map_or_else(|| self.path.to_path_buf(), |root| self.abs(root));

        let metadata = std::fs::symlink_metadata(&root_path)
            .with_io_context(|| format!("The specified path does not exist: {}", root_path.display()))?;

        if !metadata.is_dir() || (root.is_some() && root_path.join(GIT_DIR).exists()) {
            return Ok(root.map(Path::to_path_buf).into_iter().collect());
        }

        let mut files = Vec::new();
        let mut walker = WalkDir::new(&root_path).sort_by_file_name().into_iter();

        while let Some(entry) = walker.next() {
            let entry = entry.map_err(|e| Error::IoFailure(e.into()))?;
            let path = entry.path();

            if Self::is_git_dir(path) {
                walker.skip_current_dir();
                continue;
            }

            if entry.file_type().is_dir() {
                if entry.depth() > 0 && path.join(GIT_DIR).exists() {
                    walker.skip_current_dir();
                } else {
                    continue;
                }
            }

            if let Ok(relative) = path.strip_prefix(&self.path) {
                files.push(relative.to_path_buf());
            }
        }

        Ok(files)
    }

    /// `lstat` of a workdir path
    pub fn stat_file(&self, file_path: &Path) -> Result<EntryMetadata> {
        let abs_path = self.abs(file_path);
        let metadata = std::fs::symlink_metadata(&abs_path)
            .with_io_context(|| format!("Unable to stat {}", file_path.display()))?;

        Ok(EntryMetadata::try_from((abs_path.as_path(), metadata))?)
    }

    /// Like [`Workspace::stat_file`], mapping a missing path to `None`
    pub fn try_stat_file(&self, file_path: &Path) -> Result<Option<EntryMetadata>> {
        match std::fs::symlink_metadata(self.abs(file_path)) {
            Ok(_) => self.stat_file(file_path).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotADirectory => Ok(None),
            Err(e) => Err(e).with_io_context(|| format!("Unable to stat {}", file_path.display())),
        }
    }

    /// File content, or the link target for symlinks
    pub fn read_file(&self, file_path: &Path) -> Result<Bytes> {
        let abs_path = self.abs(file_path);
        let metadata = std::fs::symlink_metadata(&abs_path)
            .with_io_context(|| format!("Unable to stat {}", file_path.display()))?;

        if metadata.file_type().is_symlink() {
            let target = std::fs::read_link(&abs_path)
                .with_io_context(|| format!("Unable to read link {}", file_path.display()))?;
            return Ok(Bytes::copy_from_slice(target.as_os_str().as_bytes()));
        }

        std::fs::read(&abs_path)
            .map(Bytes::from)
            .with_io_context(|| format!("Unable to read {}", file_path.display()))
    }

    /// The id this path would have if staged, computed without storing anything
    ///
    /// For nested repositories this is the commit their HEAD points at.
    pub fn hash_file(&self, file_path: &Path, mode: EntryMode) -> Result<ObjectId> {
        match mode {
            EntryMode::Gitlink => self
                .submodule_head(file_path)?
                .ok_or_else(|| Error::not_found(format!("HEAD of submodule {}", file_path.display()))),
            EntryMode::Directory => Err(Error::invalid(format!(
                "cannot hash directory {}",
                file_path.display()
            ))),
            _ => Ok(Database::hash_object(ObjectType::Blob, &self.read_file(file_path)?)),
        }
    }

    /// HEAD commit of the repository nested at `path`, if there is one
    pub fn submodule_head(&self, path: &Path) -> Result<Option<ObjectId>> {
        let git_dir = self.abs(path).join(GIT_DIR);
        if !git_dir.is_dir() {
            return Ok(None);
        }
        Refs::new(git_dir).read_head()
    }

    /// Write a blob to the workdir with the given mode, replacing whatever is there
    pub fn write_file(&self, file_path: &Path, data: &[u8], mode: EntryMode) -> Result<()> {
        let abs_path = self.abs(file_path);

        if let Some(parent) = abs_path.parent() {
            std::fs::create_dir_all(parent)
                .with_io_context(|| format!("Unable to create parent of {}", file_path.display()))?;
        }
        if std::fs::symlink_metadata(&abs_path).is_ok() {
            self.remove_path(file_path)?;
        }

        if mode == EntryMode::Symlink {
            let target = std::ffi::OsStr::from_bytes(data);
            return std::os::unix::fs::symlink(target, &abs_path)
                .with_io_context(|| format!("Failed to create symlink: {}", file_path.display()));
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&abs_path)
            .with_io_context(|| format!("Failed to open file: {}", file_path.display()))?;
        file.write_all(data)
            .with_io_context(|| format!("Failed to write to file: {}", file_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = match mode {
                EntryMode::Executable => 0o755,
                _ => 0o644,
            };
            std::fs::set_permissions(&abs_path, std::fs::Permissions::from_mode(permissions))
                .with_io_context(|| {
                    format!("Failed to set permissions for file: {}", file_path.display())
                })?;
        }

        tracing::trace!(path = %file_path.display(), %mode, "wrote workdir file");
        Ok(())
    }

    /// Remove a file, symlink or whole directory; missing paths are ignored
    pub fn remove_path(&self, file_path: &Path) -> Result<()> {
        let abs_path = self.abs(file_path);
        let metadata = match std::fs::symlink_metadata(&abs_path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e).with_io_context(|| format!("Unable to stat {}", file_path.display()));
            }
        };

        let result = if metadata.is_dir() {
            std::fs::remove_dir_all(&abs_path)
        } else {
            std::fs::remove_file(&abs_path)
        };
        result.with_io_context(|| format!("Failed to remove {}", file_path.display()))
    }

    /// Remove a directory only if it is empty
    pub fn remove_directory(&self, dir_path: &Path) -> Result<bool> {
        match std::fs::remove_dir(self.abs(dir_path)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) if e.kind() == std::io::ErrorKind::DirectoryNotEmpty => Ok(false),
            Err(e) => {
                Err(e).with_io_context(|| format!("Failed to remove directory {}", dir_path.display()))
            }
        }
    }

    /// Create a directory, replacing a file that occupies its path
    pub fn make_directory(&self, dir_path: &Path) -> Result<()> {
        let abs_path = self.abs(dir_path);

        match std::fs::symlink_metadata(&abs_path) {
            Ok(metadata) if metadata.is_dir() => return Ok(()),
            Ok(_) => self.remove_path(dir_path)?,
            Err(_) => {}
        }

        std::fs::create_dir_all(&abs_path)
            .with_io_context(|| format!("Failed to create directory {}", dir_path.display()))
    }

    pub fn exists(&self, path: &Path) -> bool {
        std::fs::symlink_metadata(self.abs(path)).is_ok()
    }

    pub fn is_dir(&self, path: &Path) -> bool {
        std::fs::symlink_metadata(self.abs(path)).is_ok_and(|metadata| metadata.is_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn listing_skips_git_dir_and_nested_repositories() {
        let dir = TempDir::new().unwrap();
        dir.child(".git/HEAD").write_str("ref: refs/heads/main\n").unwrap();
        dir.child("a.txt").write_str("a").unwrap();
        dir.child("src/lib.rs").write_str("lib").unwrap();
        dir.child("vendor/sub/.git/HEAD").write_str("x").unwrap();
        dir.child("vendor/sub/file").write_str("x").unwrap();

        let workspace = Workspace::new(dir.path());
        let files = workspace.list_files(None).unwrap();

        assert_eq!(
            files,
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("src/lib.rs"),
                PathBuf::from("vendor/sub"),
            ]
        );
    }

    #[test]
    fn executable_mode_is_written_and_detected() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path());

        workspace
            .write_file(Path::new("bin/run.sh"), b"#!/bin/sh\n", EntryMode::Executable)
            .unwrap();

        let stat = workspace.stat_file(Path::new("bin/run.sh")).unwrap();
        assert_eq!(stat.mode, EntryMode::Executable);
        assert_eq!(stat.size, 10);
    }

    #[test]
    fn symlinks_hash_their_target() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path());

        workspace
            .write_file(Path::new("link"), b"target.txt", EntryMode::Symlink)
            .unwrap();

        assert_eq!(workspace.stat_file(Path::new("link")).unwrap().mode, EntryMode::Symlink);
        assert_eq!(
            workspace.hash_file(Path::new("link"), EntryMode::Symlink).unwrap(),
            Database::hash_object(ObjectType::Blob, b"target.txt")
        );
    }
}
