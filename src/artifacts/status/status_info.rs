use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::workspace::{GIT_DIR, Workspace};
use crate::artifacts::core::cancellation::CancellationToken;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::delta::{DeltaRecord, DeltaStatus, FileMap};
use crate::artifacts::diff::options::DiffOptions;
use crate::artifacts::diff::tree_diff::{BlobSource, TreeDiffer, flatten_tree};
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::status::ignore::IgnoreRules;
use crate::artifacts::status::inspector::{Inspector, WorkdirSide};
use crate::artifacts::status::options::{StatusOptions, StatusShow};
use crate::artifacts::status::status_entry::{StatusEntry, StatusFlags};
use crate::config::EngineConfig;
use crate::errors::{Error, PathFailure, Result};
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub type StatusMap = BTreeMap<PathBuf, StatusEntry>;

/// Outcome of a status scan: one entry per reported path, plus paths that could not be read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub entries: Vec<StatusEntry>,
    pub failures: Vec<PathFailure>,
}

impl StatusReport {
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&StatusEntry> {
        let path = path.as_ref();
        self.entries.iter().find(|entry| entry.path == path)
    }

    /// Flags of `path`, empty when it is not reported
    pub fn flags(&self, path: impl AsRef<Path>) -> StatusFlags {
        self.get(path)
            .map_or(StatusFlags::empty(), |entry| entry.flags)
    }

    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(StatusEntry::is_current)
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.entries.iter().map(StatusEntry::path).collect()
    }
}

/// Working tree content as a blob source; nothing is written to the store
struct WorkdirBlobs<'w> {
    workspace: &'w Workspace,
}

impl BlobSource for WorkdirBlobs<'_> {
    fn load_blob(&self, path: &Path, _entry: &DatabaseEntry) -> Result<Bytes> {
        self.workspace.read_file(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct UntrackedPath {
    path: PathBuf,
    mode: EntryMode,
    ignored: bool,
}

impl UntrackedPath {
    fn collapsed(dir: &Path, ignored: bool) -> Self {
        let mut path = dir.to_path_buf();
        path.push("");

        UntrackedPath {
            path,
            mode: EntryMode::Directory,
            ignored,
        }
    }

    fn is_collapsed(&self) -> bool {
        self.mode == EntryMode::Directory
    }
}

pub struct Status<'r> {
    database: &'r Database,
    workspace: &'r Workspace,
    config: &'r EngineConfig,
}

impl<'r> Status<'r> {
    pub fn new(database: &'r Database, workspace: &'r Workspace, config: &'r EngineConfig) -> Self {
        Status {
            database,
            workspace,
            config,
        }
    }

    /// Classify every path of HEAD, the index and the working tree
    pub fn scan(
        &self,
        index: &mut Index,
        head_tree: Option<&ObjectId>,
        options: StatusOptions,
        show: StatusShow,
        cancel: &CancellationToken,
    ) -> Result<StatusReport> {
        options.validate()?;

        if options.contains(StatusOptions::REFRESH_BEFORE_SCAN) {
            index.rehydrate()?;
        }

        let mut failures = Vec::new();
        let exclude_submodules = options.contains(StatusOptions::EXCLUDE_SUBMODULES);
        let keep = |entry: &DatabaseEntry| !(exclude_submodules && entry.mode.is_gitlink());
        let conflicted = index.conflicted_paths();

        let mut head_files = match head_tree {
            Some(oid) => {
                let (files, head_failures) = flatten_tree(self.database, oid, cancel)?;
                failures.extend(head_failures);
                files
            }
            None => FileMap::new(),
        };
        head_files.retain(|path, entry| keep(entry) && !conflicted.contains(path));

        let index_files = index
            .merged_entries()
            .map(|entry| (entry.name.clone(), entry.as_database_entry()))
            .filter(|(_, entry)| keep(entry))
            .collect::<FileMap>();

        let mut entries = StatusMap::new();

        if show.includes_index() {
            let differ = self.differ(
                options.contains(StatusOptions::RENAMES_HEAD_TO_INDEX),
                exclude_submodules,
            )?;
            let result =
                differ.diff_flat(&head_files, &index_files, self.database, self.database, cancel)?;
            failures.extend(result.failures);

            for delta in result.deltas {
                let entry = entries
                    .entry(delta.new_path.clone())
                    .or_insert_with(|| StatusEntry::new(delta.new_path.clone()));
                entry.flags |= StatusFlags::for_index_delta(delta.status);
                entry.head_to_index = Some(delta);
            }
        }

        if show.includes_workdir() {
            self.scan_workdir(index, &index_files, options, &mut entries, &mut failures, cancel)?;
        }

        for path in &conflicted {
            entries.insert(
                path.clone(),
                StatusEntry {
                    flags: StatusFlags::CONFLICTED,
                    ..StatusEntry::new(path.clone())
                },
            );
        }

        if options.contains(StatusOptions::INCLUDE_UNMODIFIED) {
            for path in index_files.keys() {
                entries
                    .entry(path.clone())
                    .or_insert_with(|| StatusEntry::new(path.clone()));
            }
        }

        let mut entries = entries.into_values().collect::<Vec<_>>();
        if options.contains(StatusOptions::SORT_CASE_INSENSITIVELY) {
            entries.sort_by_cached_key(|entry| {
                (entry.path.to_string_lossy().to_lowercase(), entry.path.clone())
            });
        }

        tracing::debug!(
            entries = entries.len(),
            failures = failures.len(),
            "status scan complete"
        );
        Ok(StatusReport { entries, failures })
    }

    /// Status flags of a single path
    ///
    /// Untracked and ignored paths are reported individually; a path that is
    /// neither tracked nor present fails with `NotFound`. `show` limits which
    /// side's flags can appear.
    pub fn file_status(
        &self,
        index: &mut Index,
        head_tree: Option<&ObjectId>,
        path: &Path,
        show: StatusShow,
        cancel: &CancellationToken,
    ) -> Result<StatusFlags> {
        let options = StatusOptions::INCLUDE_UNTRACKED
            | StatusOptions::INCLUDE_IGNORED
            | StatusOptions::RECURSE_UNTRACKED_DIRS
            | StatusOptions::RECURSE_IGNORED_DIRS;
        let report = self.scan(index, head_tree, options, show, cancel)?;

        match report.get(path) {
            Some(entry) => Ok(entry.flags),
            None if index.is_directly_tracked(path) || self.workspace.exists(path) => {
                Ok(StatusFlags::empty())
            }
            None => Err(Error::not_found(path.display())),
        }
    }

    fn differ(&self, renames: bool, exclude_submodules: bool) -> Result<TreeDiffer<'r>> {
        let mut options = DiffOptions::INCLUDE_TYPECHANGE | DiffOptions::SKIP_BINARY_CHECK;
        if renames {
            options |= DiffOptions::FIND_RENAMES;
        }
        if exclude_submodules {
            options |= DiffOptions::IGNORE_SUBMODULES;
        }

        Ok(TreeDiffer::new(self.database, options)?.with_config(self.config))
    }

    fn scan_workdir(
        &self,
        index: &mut Index,
        index_files: &FileMap,
        options: StatusOptions,
        entries: &mut StatusMap,
        failures: &mut Vec<PathFailure>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let inspector = Inspector::new(self.workspace);
        let refresh = options.contains(StatusOptions::REFRESH_BEFORE_SCAN);
        let mut workdir_files = FileMap::new();
        let mut unreadable = BTreeSet::new();

        for (path, staged) in index_files {
            cancel.check()?;

            let Some(index_entry) = index.entry_by_path(path).cloned() else {
                continue;
            };
            let side = self.workspace.try_stat_file(path).and_then(|stat| {
                let side = inspector.check_index_against_workspace(&index_entry, stat.as_ref())?;
                Ok((side, stat))
            });

            match side {
                Ok((WorkdirSide::Missing, _)) => {}
                Ok((WorkdirSide::StatClean(entry), _)) => {
                    workdir_files.insert(path.clone(), entry);
                }
                Ok((WorkdirSide::Hashed(entry), stat)) => {
                    if refresh
                        && entry == *staged
                        && !entry.mode.is_gitlink()
                        && let Some(stat) = stat
                    {
                        index.update_entry_stat(path, stat);
                    }
                    workdir_files.insert(path.clone(), entry);
                }
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "unreadable workdir file");
                    failures.push(PathFailure::new(path, error));
                    unreadable.insert(path.clone());
                    workdir_files.insert(path.clone(), *staged);
                }
            }
        }

        let mut untracked = Vec::new();
        if options.walks_untracked() {
            let rules = IgnoreRules::load(self.workspace.path(), self.config)?;
            self.walk_untracked(
                Path::new(""),
                index,
                &rules,
                options,
                &mut untracked,
                cancel,
            )?;
        }

        let renames = options.contains(StatusOptions::RENAMES_INDEX_TO_WORKDIR);
        let untracked_paths = untracked
            .iter()
            .map(|candidate| candidate.path.clone())
            .collect::<BTreeSet<_>>();

        if renames {
            for candidate in untracked
                .iter()
                .filter(|candidate| !candidate.ignored && !candidate.is_collapsed())
            {
                match self.workspace.hash_file(&candidate.path, candidate.mode) {
                    Ok(oid) => {
                        workdir_files.insert(
                            candidate.path.clone(),
                            DatabaseEntry::new(oid, candidate.mode),
                        );
                    }
                    Err(error) => {
                        failures.push(PathFailure::new(&candidate.path, error));
                        unreadable.insert(candidate.path.clone());
                    }
                }
            }
        }

        let differ = self.differ(renames, options.contains(StatusOptions::EXCLUDE_SUBMODULES))?;
        let workdir_blobs = WorkdirBlobs {
            workspace: self.workspace,
        };
        let result =
            differ.diff_flat(index_files, &workdir_files, self.database, &workdir_blobs, cancel)?;
        failures.extend(result.failures);

        for delta in result.deltas {
            let status = match delta.status {
                DeltaStatus::Added if untracked_paths.contains(&delta.new_path) => {
                    DeltaStatus::Untracked
                }
                status => status,
            };
            record_workdir_delta(entries, delta.with_status(status));
        }

        for candidate in untracked {
            let reported = entries
                .get(&candidate.path)
                .is_some_and(|entry| entry.index_to_workdir.is_some());
            if reported {
                continue;
            }

            let status = if candidate.ignored {
                DeltaStatus::Ignored
            } else {
                DeltaStatus::Untracked
            };
            let new_entry = DatabaseEntry::new(ObjectId::default(), candidate.mode);
            record_workdir_delta(
                entries,
                DeltaRecord::between(candidate.path, None, Some(new_entry)).with_status(status),
            );
        }

        for path in unreadable {
            entries
                .entry(path.clone())
                .or_insert_with(|| StatusEntry::new(path))
                .flags |= StatusFlags::WT_UNREADABLE;
        }

        Ok(())
    }

    /// Collect untracked and ignored paths below `dir`
    ///
    /// Tracked directories are always entered. Wholly untracked or ignored
    /// directories collapse into a single `dir/` path unless the matching
    /// recurse option is set; directories holding no files are not reported.
    fn walk_untracked(
        &self,
        dir: &Path,
        index: &Index,
        rules: &IgnoreRules,
        options: StatusOptions,
        found: &mut Vec<UntrackedPath>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let inspector = Inspector::new(self.workspace);

        for child in self.workspace.list_dir(dir)? {
            cancel.check()?;

            let is_dir = self.workspace.is_dir(&child);
            let nested_repo = is_dir && self.workspace.abs(&child).join(GIT_DIR).exists();
            let descendable = is_dir && !nested_repo;

            if index.is_directly_tracked(&child) {
                if descendable {
                    self.walk_untracked(&child, index, rules, options, found, cancel)?;
                }
                continue;
            }
            if nested_repo && options.contains(StatusOptions::EXCLUDE_SUBMODULES) {
                continue;
            }

            if rules.is_ignored(&child, descendable) {
                if !options.contains(StatusOptions::INCLUDE_IGNORED) {
                    continue;
                }
                if !descendable {
                    found.push(self.untracked_file(&child, true));
                } else if options.contains(StatusOptions::RECURSE_IGNORED_DIRS) {
                    for file in self.workspace.list_files(Some(&child))? {
                        found.push(self.untracked_file(&file, true));
                    }
                } else if inspector.dir_contains(&child, &mut |_: &Path| true)? {
                    found.push(UntrackedPath::collapsed(&child, true));
                }
                continue;
            }

            if !descendable {
                if options.contains(StatusOptions::INCLUDE_UNTRACKED) {
                    found.push(self.untracked_file(&child, false));
                }
                continue;
            }

            let collapse = options.contains(StatusOptions::INCLUDE_UNTRACKED)
                && !options.contains(StatusOptions::RECURSE_UNTRACKED_DIRS)
                && inspector
                    .dir_contains(&child, &mut |file: &Path| !rules.is_ignored(file, false))?;

            if collapse {
                found.push(UntrackedPath::collapsed(&child, false));
            } else {
                self.walk_untracked(&child, index, rules, options, found, cancel)?;
            }
        }

        Ok(())
    }

    fn untracked_file(&self, path: &Path, ignored: bool) -> UntrackedPath {
        let mode = self
            .workspace
            .try_stat_file(path)
            .ok()
            .flatten()
            .map_or(EntryMode::Regular, |stat| stat.mode);

        UntrackedPath {
            path: path.to_path_buf(),
            mode,
            ignored,
        }
    }
}

fn record_workdir_delta(entries: &mut StatusMap, delta: DeltaRecord) {
    let entry = entries
        .entry(delta.new_path.clone())
        .or_insert_with(|| StatusEntry::new(delta.new_path.clone()));
    entry.flags |= StatusFlags::for_workdir_delta(delta.status);
    entry.index_to_workdir = Some(delta);
}
