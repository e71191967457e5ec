//! Git index (staging area)
//!
//! The index is Git's staging area that tracks which files should be included in the next commit.
//! It maintains metadata about files including their mode, timestamps, and SHA-1 hashes.
//!
//! ## Index File Format
//!
//! The index file contains:
//! - Header: Signature, version, and entry count
//! - Entries: Sorted list of tracked files with metadata
//! - Checksum: SHA-1 hash of the entire index for integrity verification
//!
//! ## Data Structures
//!
//! - `entries`: Maps `(path, stage)` to the index entry
//! - `children`: Maps directory paths to the files below them
//!
//! A path is either resolved (one stage 0 entry) or conflicted (entries at
//! stages 1..3, any of which may be missing).

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::index_entry::{
    ENTRY_BLOCK, ENTRY_MIN_SIZE, EntryMetadata, IndexEntry, Stage,
};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::HEADER_SIZE;
use crate::errors::{Error, IoContext, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::DerefMut;
use std::path::{Path, PathBuf};

/// Git index (staging area)
#[derive(Debug, Clone)]
pub struct Index {
    /// Path to the index file (typically `.git/index`)
    path: Box<Path>,
    entries: BTreeMap<(PathBuf, Stage), IndexEntry>,
    /// Directory hierarchy for efficient parent-child lookups
    children: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    /// Whether the in-memory index differs from what was loaded
    changed: bool,
}

impl Index {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Index {
            path: path.into().into_boxed_path(),
            entries: BTreeMap::new(),
            children: BTreeMap::new(),
            changed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// The resolved (stage 0) entry at `path`
    pub fn entry_by_path(&self, path: &Path) -> Option<&IndexEntry> {
        self.entries.get(&(path.to_path_buf(), Stage::Merged))
    }

    /// Every stage recorded for `path`, in stage order
    pub fn stages(&self, path: &Path) -> Vec<&IndexEntry> {
        self.entries
            .range((path.to_path_buf(), Stage::Merged)..=(path.to_path_buf(), Stage::Theirs))
            .map(|(_, entry)| entry)
            .collect()
    }

    pub fn is_conflicted(&self, path: &Path) -> bool {
        self.stages(path).iter().any(|entry| entry.stage.is_conflict())
    }

    pub fn has_conflicts(&self) -> bool {
        self.entries.keys().any(|(_, stage)| stage.is_conflict())
    }

    pub fn conflicted_paths(&self) -> BTreeSet<PathBuf> {
        self.entries
            .keys()
            .filter(|(_, stage)| stage.is_conflict())
            .map(|(path, _)| path.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.children.clear();
        self.changed = true;
    }

    /// Load the index from disk
    ///
    /// A missing or empty file yields an empty index. The trailing checksum
    /// is verified; a mismatch is reported as corruption.
    ///
    /// # Locking
    ///
    /// Acquires a shared lock on the index file during reading.
    pub fn rehydrate(&mut self) -> Result<()> {
        self.entries.clear();
        self.children.clear();
        self.changed = false;

        if !self.path.exists() {
            return Ok(());
        }

        let mut index_file = std::fs::OpenOptions::new()
            .read(true)
            .open(&self.path)
            .with_io_context(|| format!("Unable to open index {}", self.path.display()))?;
        let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)
            .with_io_context(|| format!("Unable to lock index {}", self.path.display()))?;

        if lock.deref_mut().metadata()?.len() == 0 {
            return Ok(());
        }

        let mut reader = Checksum::new(lock);
        let result = Self::parse_header(&mut reader).and_then(|entries_count| {
            let entries = Self::parse_entries(entries_count, &mut reader)?;
            reader.verify()?;
            Ok(entries)
        });

        match result {
            Ok(entries) => {
                for entry in entries {
                    self.store_entry(entry);
                }
                tracing::debug!(entries = self.entries.len(), "loaded index");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "corrupt index");
                Err(Error::corrupt(self.path.display(), e))
            }
        }
    }

    fn parse_header(reader: &mut Checksum) -> anyhow::Result<u32> {
        let header_bytes = reader.read(HEADER_SIZE)?;
        Ok(IndexHeader::parse(&header_bytes)?.entries_count)
    }

    /// Parse all entries from the index file
    ///
    /// Reads each entry, handling variable-length paths with 8-byte alignment.
    fn parse_entries(entries_count: u32, reader: &mut Checksum) -> anyhow::Result<Vec<IndexEntry>> {
        let mut entries = Vec::with_capacity(entries_count as usize);

        for _ in 0..entries_count {
            let mut entry_bytes = reader.read(ENTRY_MIN_SIZE)?.to_vec();

            while entry_bytes.last() != Some(&0) {
                entry_bytes.extend_from_slice(&reader.read(ENTRY_BLOCK)?);
            }

            entries.push(IndexEntry::parse(&entry_bytes)?);
        }

        Ok(entries)
    }

    fn store_entry(&mut self, entry: IndexEntry) {
        for parent in entry.parent_dirs() {
            self.children
                .entry(parent.to_path_buf())
                .or_default()
                .insert(entry.name.clone());
        }

        self.entries.insert((entry.name.clone(), entry.stage), entry);
    }

    /// Remove any entries a new entry would collide with
    ///
    /// Parent paths tracked as files, children of a path becoming a file, and
    /// conflict stages of the path itself.
    fn discard_conflicts(&mut self, entry: &IndexEntry) {
        for parent in entry.parent_dirs() {
            self.remove_path_stages(parent);
        }
        self.remove_children(&entry.name);
        self.remove_path_stages(&entry.name);
    }

    fn remove_children(&mut self, path_name: &Path) {
        if let Some(children) = self.children.get(path_name).cloned() {
            for child in children {
                self.remove_path_stages(&child);
            }
        }
    }

    fn remove_path_stages(&mut self, path_name: &Path) {
        let keys = self
            .stages(path_name)
            .into_iter()
            .map(|entry| (entry.name.clone(), entry.stage))
            .collect::<Vec<_>>();
        if keys.is_empty() {
            return;
        }

        for key in keys {
            self.entries.remove(&key);
        }

        for parent in path_name.ancestors().skip(1) {
            if let Some(children) = self.children.get_mut(parent) {
                children.remove(path_name);
                if children.is_empty() {
                    self.children.remove(parent);
                }
            }
        }
    }

    /// Stage a resolved entry, replacing any conflict stages for its path
    pub fn add(&mut self, entry: IndexEntry) {
        let entry = entry.with_stage(Stage::Merged);
        self.discard_conflicts(&entry);
        self.store_entry(entry);
        self.changed = true;
    }

    /// Record a conflict: any existing entries for `path` are replaced by the given stages
    pub fn add_conflict(
        &mut self,
        path: &Path,
        base: Option<DatabaseEntry>,
        ours: Option<DatabaseEntry>,
        theirs: Option<DatabaseEntry>,
    ) {
        self.remove_children(path);
        self.remove_path_stages(path);

        for (stage, side) in [(Stage::Base, base), (Stage::Ours, ours), (Stage::Theirs, theirs)] {
            if let Some(side) = side {
                self.store_entry(IndexEntry::from_database_entry(path, &side).with_stage(stage));
            }
        }
        self.changed = true;
    }

    /// Remove a path (all stages) or a whole directory
    pub fn remove(&mut self, path: &Path) {
        self.remove_path_stages(path);
        self.remove_children(path);
        self.changed = true;
    }

    /// Persist the index
    ///
    /// The new content is written to `index.lock` under an exclusive lock and
    /// renamed over the index, so readers see either the old or the new file.
    pub fn write_updates(&mut self) -> Result<()> {
        let lock_path = self.path.with_extension("lock");
        let result = self.write_to(&lock_path).and_then(|_| {
            std::fs::rename(&lock_path, &self.path)
                .with_io_context(|| format!("Unable to replace index {}", self.path.display()))
        });

        if result.is_err() {
            let _ = std::fs::remove_file(&lock_path);
        }
        result?;

        self.changed = false;
        tracing::debug!(entries = self.entries.len(), "wrote index");
        Ok(())
    }

    fn write_to(&self, lock_path: &Path) -> Result<()> {
        let mut index_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(lock_path)
            .with_io_context(|| format!("Unable to open {}", lock_path.display()))?;
        let lock = file_guard::lock(&mut index_file, file_guard::Lock::Exclusive, 0, 1)
            .with_io_context(|| format!("Unable to lock {}", lock_path.display()))?;

        let mut writer = Checksum::new(lock);

        let mut entries = self.entries.values().collect::<Vec<_>>();
        entries.sort_by(|a, b| {
            (a.name.as_os_str().as_encoded_bytes(), a.stage)
                .cmp(&(b.name.as_os_str().as_encoded_bytes(), b.stage))
        });

        writer.write(&IndexHeader::with_count(entries.len() as u32).to_bytes()?)?;
        for entry in entries {
            writer.write(&entry.to_bytes()?)?;
        }
        writer.write_checksum()?;

        Ok(())
    }

    /// Refresh the cached stat of a resolved entry
    pub fn update_entry_stat(&mut self, path: &Path, stat: EntryMetadata) {
        if let Some(existing_entry) = self.entries.get_mut(&(path.to_path_buf(), Stage::Merged))
            && existing_entry.metadata != stat
        {
            existing_entry.metadata = stat;
            self.changed = true;
        }
    }

    /// Whether `path` is a tracked file or a directory containing tracked files
    pub fn is_directly_tracked(&self, path: &Path) -> bool {
        !self.stages(path).is_empty() || self.children.contains_key(path)
    }

    pub fn is_tracked_dir(&self, path: &Path) -> bool {
        self.children.contains_key(path)
    }

    /// All entries, every stage, ordered by path then stage
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Resolved entries only
    pub fn merged_entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries
            .values()
            .filter(|entry| entry.stage == Stage::Merged)
    }

    /// Paths of every entry (any stage) at or below `path`; `.` selects everything
    pub fn entries_under_path(&self, path: &Path) -> Vec<PathBuf> {
        let paths = self
            .entries
            .keys()
            .filter(|(entry_path, _)| path == Path::new(".") || entry_path.starts_with(path))
            .map(|(entry_path, _)| entry_path.clone())
            .collect::<BTreeSet<_>>();
        paths.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
