use crate::areas::database::Database;
use crate::artifacts::core::cancellation::CancellationToken;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::binary::BinaryDetector;
use crate::artifacts::diff::delta::{DeltaRecord, DeltaStatus, DiffFlags, FileMap, classify};
use crate::artifacts::diff::options::DiffOptions;
use crate::artifacts::diff::similarity;
use crate::artifacts::index::entry_mode::EntryKind;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::config::{DEFAULT_RENAME_THRESHOLD, EngineConfig};
use crate::errors::{Error, PathFailure, Result};
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

pub type TreeEntryMap = BTreeMap<String, DatabaseEntry>;

/// Deltas of a diff together with the paths that could not be compared
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    pub deltas: Vec<DeltaRecord>,
    pub failures: Vec<PathFailure>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&DeltaRecord> {
        self.deltas.iter().find(|delta| delta.path() == path)
    }

    /// Records undoing this diff, in path order
    pub fn inverted(&self) -> Vec<DeltaRecord> {
        let mut inverse = self.deltas.iter().map(DeltaRecord::invert).collect::<Vec<_>>();
        similarity::sort_deltas(&mut inverse);
        inverse
    }
}

/// Every non-directory entry below a tree, keyed by full path
///
/// The root must be readable; unreadable subtrees are returned as failures.
pub fn flatten_tree(
    database: &Database,
    root: &ObjectId,
    cancel: &CancellationToken,
) -> Result<(FileMap, Vec<PathFailure>)> {
    let mut files = FileMap::new();
    let mut failures = Vec::new();
    let mut pending = vec![(PathBuf::new(), *root)];
    let mut is_root = true;

    while let Some((prefix, oid)) = pending.pop() {
        cancel.check()?;

        let tree = match database.load_tree(&oid) {
            Ok(tree) => tree,
            Err(error) if is_root => return Err(error),
            Err(error) => {
                tracing::warn!(path = %prefix.display(), %error, "skipping unreadable subtree");
                failures.push(PathFailure::new(prefix, error));
                continue;
            }
        };
        is_root = false;

        for entry in tree.into_entries() {
            let path = prefix.join(&entry.name);
            if entry.mode.is_tree() {
                pending.push((path, entry.oid));
            } else {
                files.insert(path, entry.as_database_entry());
            }
        }
    }

    Ok((files, failures))
}

/// Where the content of one side of a delta comes from
pub trait BlobSource {
    fn load_blob(&self, path: &Path, entry: &DatabaseEntry) -> Result<Bytes>;
}

impl BlobSource for Database {
    fn load_blob(&self, _path: &Path, entry: &DatabaseEntry) -> Result<Bytes> {
        let raw = self.get(&entry.oid)?;
        if raw.kind != ObjectType::Blob {
            return Err(Error::invalid(format!("{} is a {}, not a blob", entry.oid, raw.kind)));
        }
        Ok(raw.data)
    }
}

#[derive(Debug, Default)]
struct Walk {
    deltas: Vec<DeltaRecord>,
    failures: Vec<PathFailure>,
}

/// Structured comparison of two trees, or of two flattened tree views
#[derive(Debug)]
pub struct TreeDiffer<'r> {
    database: &'r Database,
    options: DiffOptions,
    rename_threshold: u8,
    detector: BinaryDetector,
}

impl<'r> TreeDiffer<'r> {
    pub fn new(database: &'r Database, options: DiffOptions) -> Result<Self> {
        options.validate()?;

        Ok(TreeDiffer {
            database,
            options,
            rename_threshold: DEFAULT_RENAME_THRESHOLD,
            detector: BinaryDetector::default(),
        })
    }

    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.rename_threshold = config.rename_threshold;
        self.detector = BinaryDetector::from_config(config);
        self
    }

    pub fn with_rename_threshold(mut self, threshold: u8) -> Self {
        self.rename_threshold = threshold;
        self
    }

    pub fn options(&self) -> DiffOptions {
        self.options
    }

    /// Compare two trees (commits and tags are peeled); `None` stands for the empty tree
    pub fn diff(
        &self,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
        cancel: &CancellationToken,
    ) -> Result<DiffResult> {
        let (old, new) = if self.options.contains(DiffOptions::REVERSE) {
            (new, old)
        } else {
            (old, new)
        };

        let old_root = old.map(|oid| self.database.peel_to_tree(oid)).transpose()?;
        let new_root = new.map(|oid| self.database.peel_to_tree(oid)).transpose()?;
        tracing::debug!(old = ?old_root, new = ?new_root, options = ?self.options, "diffing trees");

        let old_entries = self.tree_entries(old_root.as_ref())?;
        let new_entries = self.tree_entries(new_root.as_ref())?;

        let mut walk = Walk::default();
        if old_root != new_root {
            self.compare_entries(&old_entries, &new_entries, Path::new(""), &mut walk, cancel)?;
        }

        let copy_sources = match (self.options.contains(DiffOptions::FIND_COPIES), old_root) {
            (true, Some(root)) => Some(flatten_tree(self.database, &root, cancel)?.0),
            _ => None,
        };

        self.finish(walk, copy_sources, self.database, self.database, cancel)
    }

    /// Compare two flattened views, loading content from the given sources
    pub fn diff_flat(
        &self,
        old: &FileMap,
        new: &FileMap,
        old_source: &dyn BlobSource,
        new_source: &dyn BlobSource,
        cancel: &CancellationToken,
    ) -> Result<DiffResult> {
        let (old, new, old_source, new_source) = if self.options.contains(DiffOptions::REVERSE) {
            (new, old, new_source, old_source)
        } else {
            (old, new, old_source, new_source)
        };

        let mut walk = Walk::default();
        let paths = old.keys().chain(new.keys()).collect::<BTreeSet<_>>();

        for path in paths {
            cancel.check()?;
            let old_entry = old.get(path).copied();
            let new_entry = new.get(path).copied();
            if old_entry == new_entry {
                continue;
            }
            self.record(path, old_entry, new_entry, &mut walk);
        }

        let copy_sources = self
            .options
            .contains(DiffOptions::FIND_COPIES)
            .then(|| old.clone());

        self.finish(walk, copy_sources, old_source, new_source, cancel)
    }

    fn tree_entries(&self, oid: Option<&ObjectId>) -> Result<TreeEntryMap> {
        match oid {
            None => Ok(TreeEntryMap::new()),
            Some(oid) => Ok(self
                .database
                .load_tree(oid)?
                .into_entries()
                .map(|entry| (entry.name.clone(), entry.as_database_entry()))
                .collect()),
        }
    }

    /// Descend into a pair of subtrees, recording unreadable ones as failures
    fn compare_oids(
        &self,
        old: Option<&ObjectId>,
        new: Option<&ObjectId>,
        prefix: &Path,
        walk: &mut Walk,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if old == new {
            return Ok(());
        }

        let entries = self
            .tree_entries(old)
            .and_then(|old| Ok((old, self.tree_entries(new)?)));

        match entries {
            Ok((old, new)) => self.compare_entries(&old, &new, prefix, walk, cancel),
            Err(error) => {
                tracing::warn!(path = %prefix.display(), %error, "skipping unreadable subtree");
                walk.failures.push(PathFailure::new(prefix, error));
                Ok(())
            }
        }
    }

    fn compare_entries(
        &self,
        old: &TreeEntryMap,
        new: &TreeEntryMap,
        prefix: &Path,
        walk: &mut Walk,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let names = old.keys().chain(new.keys()).collect::<BTreeSet<_>>();

        for name in names {
            cancel.check()?;

            let path = prefix.join(name);
            let old_entry = old.get(name).copied();
            let new_entry = new.get(name).copied();

            if old_entry == new_entry {
                continue;
            }

            let old_tree = old_entry.filter(DatabaseEntry::is_tree).map(|entry| entry.oid);
            let new_tree = new_entry.filter(DatabaseEntry::is_tree).map(|entry| entry.oid);

            if old_tree.is_none() || new_tree.is_none() {
                self.record(&path, old_entry, new_entry, walk);
            }
            if old_tree.is_some() || new_tree.is_some() {
                self.compare_oids(old_tree.as_ref(), new_tree.as_ref(), &path, walk, cancel)?;
            }
        }

        Ok(())
    }

    /// Record the change of a single path whose sides are not both subtrees
    fn record(
        &self,
        path: &Path,
        old_entry: Option<DatabaseEntry>,
        new_entry: Option<DatabaseEntry>,
        walk: &mut Walk,
    ) {
        if self.options.contains(DiffOptions::IGNORE_SUBMODULES)
            && old_entry
                .iter()
                .chain(new_entry.iter())
                .all(|entry| entry.mode.is_gitlink())
        {
            return;
        }

        let old_file = old_entry.filter(|entry| !entry.is_tree());
        let new_file = new_entry.filter(|entry| !entry.is_tree());
        let status = classify(old_entry.as_ref(), new_entry.as_ref());

        if status == DeltaStatus::TypeChanged {
            if self.options.contains(DiffOptions::INCLUDE_TYPECHANGE) {
                walk.deltas.push(DeltaRecord::between(path, old_entry, new_entry));
                return;
            }
            if let Some(old_file) = old_file {
                walk.deltas.push(DeltaRecord::between(path, Some(old_file), None));
            }
            if let Some(new_file) = new_file {
                walk.deltas.push(DeltaRecord::between(path, None, Some(new_file)));
            }
            return;
        }

        if old_file.is_some() || new_file.is_some() {
            tracing::trace!(path = %path.display(), %status, "changed path");
            walk.deltas.push(DeltaRecord::between(path, old_file, new_file));
        }
    }

    /// Binary classification and rename/copy pairing over the walked records
    fn finish(
        &self,
        walk: Walk,
        copy_sources: Option<FileMap>,
        old_source: &dyn BlobSource,
        new_source: &dyn BlobSource,
        cancel: &CancellationToken,
    ) -> Result<DiffResult> {
        let Walk {
            mut deltas,
            mut failures,
        } = walk;
        let mut contents = ContentCache::new(old_source, new_source);

        for delta in deltas.iter_mut() {
            cancel.check()?;
            if let Some(binary) = self.classify_binary(delta, &mut contents, &mut failures) {
                delta.flags |= if binary {
                    DiffFlags::BINARY
                } else {
                    DiffFlags::NOT_BINARY
                };
            }
        }

        if self.options.detects_similarity() {
            cancel.check()?;

            let copy_sources = copy_sources.map(|mut files| {
                for delta in &deltas {
                    if matches!(delta.status, DeltaStatus::Deleted | DeltaStatus::TypeChanged) {
                        files.remove(&delta.old_path);
                    }
                }
                files
            });

            deltas = similarity::detect(
                deltas,
                copy_sources.as_ref(),
                self.rename_threshold,
                self.options.contains(DiffOptions::FIND_RENAMES),
                |delta, old_side| {
                    let content = contents.side(delta, old_side).ok().flatten()?;
                    let binary = self.side_is_binary(&content);
                    Some((content, binary))
                },
            );
        } else {
            similarity::sort_deltas(&mut deltas);
        }

        tracing::debug!(
            deltas = deltas.len(),
            failures = failures.len(),
            "diff complete"
        );
        Ok(DiffResult { deltas, failures })
    }

    fn side_is_binary(&self, content: &[u8]) -> bool {
        if self.options.contains(DiffOptions::FORCE_BINARY) {
            return true;
        }
        if self.options.contains(DiffOptions::FORCE_TEXT) {
            return false;
        }
        self.detector.is_binary(content)
    }

    fn classify_binary(
        &self,
        delta: &DeltaRecord,
        contents: &mut ContentCache<'_>,
        failures: &mut Vec<PathFailure>,
    ) -> Option<bool> {
        let has_blob = delta
            .old_entry
            .iter()
            .chain(delta.new_entry.iter())
            .any(|entry| entry.kind() == EntryKind::Blob);
        if !has_blob {
            return None;
        }

        if self.options.contains(DiffOptions::FORCE_BINARY) {
            return Some(true);
        }
        if self.options.contains(DiffOptions::FORCE_TEXT) {
            return Some(false);
        }
        if self.options.contains(DiffOptions::SKIP_BINARY_CHECK) {
            return None;
        }

        let mut binary = false;
        for old_side in [true, false] {
            match contents.side(delta, old_side) {
                Ok(Some(content)) => binary |= self.detector.is_binary(&content),
                Ok(None) => {}
                Err(error) => {
                    failures.push(PathFailure::new(delta.path(), error));
                    return None;
                }
            }
        }
        Some(binary)
    }
}

/// Blob contents keyed by id, loaded at most once per diff
struct ContentCache<'s> {
    old_source: &'s dyn BlobSource,
    new_source: &'s dyn BlobSource,
    loaded: HashMap<ObjectId, Bytes>,
}

impl<'s> ContentCache<'s> {
    fn new(old_source: &'s dyn BlobSource, new_source: &'s dyn BlobSource) -> Self {
        ContentCache {
            old_source,
            new_source,
            loaded: HashMap::new(),
        }
    }

    /// Content of one side, `None` when that side is absent or not a blob
    fn side(&mut self, delta: &DeltaRecord, old_side: bool) -> Result<Option<Bytes>> {
        let (entry, path, source) = if old_side {
            (delta.old_entry, &delta.old_path, self.old_source)
        } else {
            (delta.new_entry, &delta.new_path, self.new_source)
        };

        let Some(entry) = entry else {
            return Ok(None);
        };
        if entry.is_tree() || entry.mode.is_gitlink() || entry.oid.is_zero() {
            return Ok(None);
        }

        if let Some(content) = self.loaded.get(&entry.oid) {
            return Ok(Some(content.clone()));
        }
        let content = source.load_blob(path, &entry)?;
        self.loaded.insert(entry.oid, content.clone());
        Ok(Some(content))
    }
}
