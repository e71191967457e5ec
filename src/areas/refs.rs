//! Git references (branches, HEAD, tags)
//!
//! This module manages Git references which are human-readable names pointing to objects.
//! References can be:
//! - Direct: Containing an object SHA-1
//! - Symbolic: Pointing to another reference (e.g., HEAD -> refs/heads/main)
//!
//! ## Reference Types
//!
//! - HEAD: Special reference pointing to the current branch or commit
//! - Branches: refs/heads/* pointing to branch tip commits
//! - Tags: refs/tags/* pointing to tagged objects
//!
//! ## Updates
//!
//! Every update is a compare-and-swap against the caller's expected value.
//! Writers to the same name are serialized by an in-process lock table and,
//! across processes, by a `<name>.lock` file created exclusively. The new
//! value is written to the lock file and renamed over the reference, so a
//! reader sees either the old content or the new one, never a partial write.

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::refs::REF_SEARCH_PREFIXES;
use crate::artifacts::refs::ref_name::RefName;
use crate::artifacts::refs::ref_target::RefTarget;
use crate::config::DEFAULT_MAX_SYMREF_DEPTH;
use crate::errors::{Error, IoContext, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Git references manager
#[derive(Debug)]
pub struct Refs {
    /// Path to the repository directory (typically `.git`)
    path: Box<Path>,
    max_depth: usize,
    name_locks: Mutex<HashMap<RefName, Arc<Mutex<()>>>>,
}

impl Refs {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_max_depth(path, DEFAULT_MAX_SYMREF_DEPTH)
    }

    pub fn with_max_depth(path: impl Into<PathBuf>, max_depth: usize) -> Self {
        Refs {
            path: path.into().into_boxed_path(),
            max_depth,
            name_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a name to the object it ultimately points at
    ///
    /// The name is looked up as given, then under `refs/`, `refs/tags/` and
    /// `refs/heads/`. Symbolic references are followed up to the configured depth.
    pub fn resolve(&self, name: &str) -> Result<ObjectId> {
        let start = self.find_ref(name)?;
        let mut current = start.clone();

        for _ in 0..=self.max_depth {
            match self.read(&current)? {
                Some(RefTarget::Direct(oid)) => {
                    tracing::trace!(name = %start, %oid, "resolved reference");
                    return Ok(oid);
                }
                Some(RefTarget::Symbolic(next)) => current = next,
                None => return Err(Error::not_found(format!("reference {current}"))),
            }
        }

        Err(Error::SymbolicLoop {
            name: start.to_string(),
            depth: self.max_depth,
        })
    }

    /// Like [`Refs::resolve`], mapping an absent reference to `None`
    pub fn try_resolve(&self, name: &str) -> Result<Option<ObjectId>> {
        match self.resolve(name) {
            Ok(oid) => Ok(Some(oid)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Read a reference without following symbolic targets
    pub fn read(&self, name: &RefName) -> Result<Option<RefTarget>> {
        let path = self.ref_path(name);

        match std::fs::read_to_string(&path) {
            Ok(content) => RefTarget::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            // a directory of nested names, e.g. `refs/heads/feature` for `feature/x`
            Err(_) if path.is_dir() => Ok(None),
            Err(e) => Err(e).with_io_context(|| format!("failed to read ref {name}")),
        }
    }

    /// Follow a symbolic chain to the last name, which is direct or absent
    ///
    /// This is the name an update "through" `name` must write.
    pub fn final_name(&self, name: &RefName) -> Result<RefName> {
        let mut current = name.clone();

        for _ in 0..=self.max_depth {
            match self.read(&current)? {
                Some(RefTarget::Symbolic(next)) => current = next,
                Some(RefTarget::Direct(_)) | None => return Ok(current),
            }
        }

        Err(Error::SymbolicLoop {
            name: name.to_string(),
            depth: self.max_depth,
        })
    }

    /// Compare-and-swap a reference
    ///
    /// `expected_old = None` requires the reference to be absent. On mismatch
    /// the store is left untouched and `Conflict` is returned.
    pub fn update(
        &self,
        name: &RefName,
        target: RefTarget,
        expected_old: Option<&RefTarget>,
    ) -> Result<()> {
        let name_lock = self.name_lock(name);
        let _guard = name_lock.lock();

        let path = self.ref_path(name);
        let parent = path
            .parent()
            .ok_or_else(|| Error::invalid(format!("invalid reference path for {name}")))?;
        std::fs::create_dir_all(parent)
            .with_io_context(|| format!("failed to create directories for ref {name}"))?;

        let lock = RefLock::acquire(&path, name)?;
        let current = self.read(name)?;

        if current.as_ref() != expected_old {
            tracing::debug!(%name, ?current, ?expected_old, "reference update rejected");
            return Err(Error::conflict(
                format!(
                    "reference {name} is at {}, expected {}",
                    describe(current.as_ref()),
                    describe(expected_old)
                ),
                Vec::new(),
            ));
        }

        lock.commit(target.to_file_content().as_bytes())?;
        tracing::debug!(%name, %target, "updated reference");
        Ok(())
    }

    /// Remove a reference; absent references are ignored
    pub fn delete(&self, name: &RefName) -> Result<()> {
        let name_lock = self.name_lock(name);
        let _guard = name_lock.lock();

        let path = self.ref_path(name);
        if !path.is_file() {
            return Ok(());
        }

        {
            let _lock = RefLock::acquire(&path, name)?;
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).with_io_context(|| format!("failed to delete ref {name}")),
            }
        }
        self.prune_empty_parent_dirs(&path)?;

        tracing::debug!(%name, "deleted reference");
        Ok(())
    }

    /// CAS-update whatever HEAD ultimately points at
    pub fn update_head(&self, oid: ObjectId, expected_old: Option<ObjectId>) -> Result<()> {
        let target = self.final_name(&RefName::head())?;
        let expected_old = expected_old.map(RefTarget::Direct);
        self.update(&target, RefTarget::Direct(oid), expected_old.as_ref())
    }

    /// Point HEAD at a branch (symbolic) or an object (detached)
    pub fn set_head(&self, target: RefTarget) -> Result<()> {
        let head = RefName::head();
        let current = self.read(&head)?;
        self.update(&head, target, current.as_ref())
    }

    pub fn read_head(&self) -> Result<Option<ObjectId>> {
        self.try_resolve("HEAD")
    }

    /// The branch HEAD is attached to, or `None` when detached
    pub fn current_branch(&self) -> Result<Option<RefName>> {
        let target = self.final_name(&RefName::head())?;
        Ok((!target.is_head()).then_some(target))
    }

    /// Enumerate references whose full name starts with `prefix`
    pub fn list(&self, prefix: &str) -> Result<Vec<RefName>> {
        let refs_path = self.refs_path();
        let mut names = WalkDir::new(&refs_path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let relative_path = entry.path().strip_prefix(self.path.as_ref()).ok()?;
                RefName::try_parse(relative_path.to_string_lossy()).ok()
            })
            .chain(self.head_path().is_file().then(RefName::head))
            .filter(|name| name.as_str().starts_with(prefix))
            .collect::<Vec<_>>();

        names.sort();
        Ok(names)
    }

    /// Map a user-supplied name to an existing reference
    fn find_ref(&self, name: &str) -> Result<RefName> {
        let name = RefName::try_parse(name)?;

        std::iter::once(name.clone())
            .chain(
                REF_SEARCH_PREFIXES
                    .iter()
                    .filter_map(|prefix| RefName::try_parse(format!("{prefix}{name}")).ok()),
            )
            .find(|candidate| self.ref_path(candidate).is_file())
            .ok_or_else(|| Error::not_found(format!("reference {name}")))
    }

    fn name_lock(&self, name: &RefName) -> Arc<Mutex<()>> {
        self.name_locks
            .lock()
            .entry(name.clone())
            .or_default()
            .clone()
    }

    fn prune_empty_parent_dirs(&self, path: &Path) -> Result<()> {
        let refs_path = self.refs_path();
        let mut parent = path.parent();

        while let Some(dir) = parent
            && dir.starts_with(&refs_path)
            && dir != refs_path.as_path()
            && !dir.ends_with("heads")
            && !dir.ends_with("tags")
        {
            match std::fs::remove_dir(dir) {
                Ok(()) => parent = dir.parent(),
                // not empty, or raced with a writer
                Err(_) => break,
            }
        }

        Ok(())
    }

    pub fn ref_path(&self, name: &RefName) -> PathBuf {
        self.path.join(name.as_str())
    }

    pub fn head_path(&self) -> PathBuf {
        self.path.join("HEAD")
    }

    pub fn refs_path(&self) -> PathBuf {
        self.path.join("refs")
    }

    pub fn heads_path(&self) -> PathBuf {
        self.refs_path().join("heads")
    }
}

/// Exclusive `<name>.lock` file guarding one reference across processes
///
/// Dropping the guard without committing removes the lock file.
struct RefLock {
    lock_path: PathBuf,
    ref_path: PathBuf,
    file: File,
    committed: bool,
}

impl RefLock {
    fn acquire(ref_path: &Path, name: &RefName) -> Result<Self> {
        let mut lock_path = ref_path.as_os_str().to_owned();
        lock_path.push(".lock");
        let lock_path = PathBuf::from(lock_path);

        let file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::conflict(
                    format!("reference {name} is locked by another writer"),
                    Vec::new(),
                ));
            }
            Err(e) => {
                return Err(e)
                    .with_io_context(|| format!("failed to create {}", lock_path.display()));
            }
        };

        Ok(RefLock {
            lock_path,
            ref_path: ref_path.to_path_buf(),
            file,
            committed: false,
        })
    }

    /// Write `content` to the lock file and rename it over the reference
    fn commit(mut self, content: &[u8]) -> Result<()> {
        self.file
            .write_all(content)
            .and_then(|_| self.file.sync_all())
            .with_io_context(|| format!("failed to write {}", self.lock_path.display()))?;
        std::fs::rename(&self.lock_path, &self.ref_path)
            .with_io_context(|| format!("failed to replace {}", self.ref_path.display()))?;

        self.committed = true;
        Ok(())
    }
}

impl Drop for RefLock {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

fn describe(target: Option<&RefTarget>) -> String {
    target.map_or_else(|| "<absent>".to_string(), RefTarget::to_string)
}
