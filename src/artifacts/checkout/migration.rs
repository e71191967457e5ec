//! Checkout planning and application
//!
//! Checking out a tree happens in two steps:
//!
//! 1. [`Migration::plan`] compares the baseline (HEAD's tree) with the target,
//!    inspects the index and the working tree, and produces a [`CheckoutPlan`]:
//!    an ordered list of file system actions plus a state per path. When the
//!    strategy is SAFE and any path would lose local state the plan is
//!    rejected and lists the conflicts.
//! 2. [`CheckoutPlan::apply`] performs the actions in order, journalling every
//!    mutation so a failure (SAFE) or a cancellation can be rolled back, and
//!    finally updates the index.
//!
//! Submodules the checkout recurses into are planned along with the parent,
//! so a conflict inside one rejects the whole plan. Each nested checkout is
//! journalled in the parent, so a later failure also rewinds the nested
//! working tree, index and HEAD.
//!
//! ## Action order
//!
//! ```text
//! delete files -> remove empty dirs (deepest first) -> create dirs (shallowest first)
//!              -> write files -> check out submodules
//! ```

use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::areas::repository::INDEX_FILE;
use crate::areas::workspace::GIT_DIR;
use crate::artifacts::checkout::conflict::{CheckoutConflict, ConflictType, describe_conflicts};
use crate::artifacts::checkout::journal::Journal;
use crate::artifacts::checkout::strategy::{CheckoutStrategy, SubmoduleRecurse};
use crate::artifacts::core::cancellation::CancellationToken;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::delta::FileMap;
use crate::artifacts::diff::options::DiffOptions;
use crate::artifacts::diff::tree_diff::{BlobSource, TreeDiffer, flatten_tree};
use crate::artifacts::index::entry_mode::EntryKind;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::refs::ref_name::RefName;
use crate::artifacts::refs::ref_target::RefTarget;
use crate::artifacts::status::ignore::IgnoreRules;
use crate::artifacts::status::inspector::Inspector;
use crate::artifacts::status::options::{StatusOptions, StatusShow};
use crate::artifacts::status::status_entry::StatusFlags;
use crate::artifacts::status::status_info::Status;
use crate::errors::{Error, PathFailure, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

const OURS_MARKER: &str = "<<<<<<< ours";
const SEPARATOR_MARKER: &str = "=======";
const THEIRS_MARKER: &str = ">>>>>>> theirs";

/// A single working tree operation of a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
    DeleteFile(PathBuf),
    /// Removed only if empty once deletions are done
    RemoveDirectory(PathBuf),
    CreateDirectory(PathBuf),
    WriteFile {
        path: PathBuf,
        entry: DatabaseEntry,
    },
    /// Local content and target content joined by conflict markers
    WriteConflict {
        path: PathBuf,
        theirs: DatabaseEntry,
    },
    CheckoutSubmodule {
        path: PathBuf,
        entry: DatabaseEntry,
    },
}

impl PlanAction {
    pub fn path(&self) -> &Path {
        match self {
            PlanAction::DeleteFile(path)
            | PlanAction::RemoveDirectory(path)
            | PlanAction::CreateDirectory(path)
            | PlanAction::WriteFile { path, .. }
            | PlanAction::WriteConflict { path, .. }
            | PlanAction::CheckoutSubmodule { path, .. } => path,
        }
    }

    fn tracks_state(&self) -> bool {
        !matches!(
            self,
            PlanAction::RemoveDirectory(_) | PlanAction::CreateDirectory(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PathState {
    #[default]
    Unchanged,
    Planned,
    Applied,
    /// Left as it was (USE_OURS or UPDATE_ONLY)
    Skipped,
    Conflicted,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStatus {
    Ready,
    Rejected { conflicts: Vec<CheckoutConflict> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    /// Differs between baseline and target
    Tree,
    /// Unchanged in the tree, but the working tree or index lost the target version
    Restore,
    /// Untracked or ignored file absent from the target
    RemoveUntracked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Change {
    old: Option<DatabaseEntry>,
    new: Option<DatabaseEntry>,
    kind: ChangeKind,
}

/// What applying a plan did
#[derive(Debug, Clone, Default)]
pub struct CheckoutOutcome {
    pub states: BTreeMap<PathBuf, PathState>,
    pub conflicts: Vec<CheckoutConflict>,
    pub failures: Vec<PathFailure>,
}

impl CheckoutOutcome {
    pub fn state(&self, path: impl AsRef<Path>) -> PathState {
        self.states.get(path.as_ref()).copied().unwrap_or_default()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn paths_in(&self, state: PathState) -> Vec<&Path> {
        self.states
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(path, _)| path.as_path())
            .collect()
    }
}

/// Checkout planner
///
/// Holds the state gathered while deciding what a checkout has to do. Build
/// one with [`Migration::plan`], which consumes it into a [`CheckoutPlan`].
pub struct Migration<'r> {
    repository: &'r Repository,
    strategy: CheckoutStrategy,
    submodules: SubmoduleRecurse,
    changes: BTreeMap<PathBuf, Change>,
    conflicts: BTreeMap<PathBuf, CheckoutConflict>,
    ignore_rules: IgnoreRules,
}

impl<'r> Migration<'r> {
    /// Plan moving the working tree and index from `baseline` to `target`
    ///
    /// Both ids may be commits or trees. A missing baseline means an unborn HEAD.
    pub fn plan(
        repository: &'r Repository,
        baseline: Option<&ObjectId>,
        target: &ObjectId,
        strategy: CheckoutStrategy,
        submodules: SubmoduleRecurse,
        cancel: &CancellationToken,
    ) -> Result<CheckoutPlan<'r>> {
        strategy.validate()?;
        let database = repository.database();

        let target_tree = database.peel_to_tree(target)?;
        let baseline_tree = baseline.map(|oid| database.peel_to_tree(oid)).transpose()?;

        let mut index = repository.lock_index();
        index.rehydrate()?;

        let mut migration = Migration {
            repository,
            strategy,
            submodules,
            changes: BTreeMap::new(),
            conflicts: BTreeMap::new(),
            ignore_rules: IgnoreRules::load(repository.workspace().path(), repository.config())?,
        };

        migration.collect_tree_changes(baseline_tree.as_ref(), &target_tree, cancel)?;

        let (target_files, failures) = flatten_tree(database, &target_tree, cancel)?;
        if let Some(failure) = failures.first() {
            return Err(Error::corrupt(failure.path.display(), &failure.reason));
        }

        if strategy.intersects(CheckoutStrategy::FORCE | CheckoutStrategy::RECREATE_MISSING) {
            migration.collect_restores(&index, &target_files, cancel)?;
        }
        if strategy.intersects(CheckoutStrategy::REMOVE_UNTRACKED | CheckoutStrategy::REMOVE_IGNORED) {
            migration.collect_untracked(&mut index, baseline_tree.as_ref(), &target_files, cancel)?;
        }

        if !strategy.is_force() {
            migration.detect_conflicts(&index, cancel)?;
        }

        let submodule_targets = migration.submodule_targets(&target_files);
        drop(index);

        if !strategy.is_force() {
            migration.collect_submodule_conflicts(&submodule_targets, cancel)?;
        }

        tracing::debug!(
            changes = migration.changes.len(),
            conflicts = migration.conflicts.len(),
            ?strategy,
            "planned checkout"
        );

        migration.into_plan(target_tree, submodule_targets, cancel)
    }

    fn collect_tree_changes(
        &mut self,
        baseline: Option<&ObjectId>,
        target: &ObjectId,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let differ = TreeDiffer::new(self.repository.database(), DiffOptions::SKIP_BINARY_CHECK)?
            .with_config(self.repository.config());
        let diff = differ.diff(baseline, Some(target), cancel)?;

        if let Some(failure) = diff.failures.first() {
            return Err(Error::corrupt(failure.path.display(), &failure.reason));
        }

        // split type changes come back as Deleted + Added at one path
        for delta in diff.deltas {
            self.changes
                .entry(delta.path().to_path_buf())
                .and_modify(|change| {
                    change.old = change.old.or(delta.old_entry);
                    change.new = change.new.or(delta.new_entry);
                })
                .or_insert(Change {
                    old: delta.old_entry,
                    new: delta.new_entry,
                    kind: ChangeKind::Tree,
                });
        }
        Ok(())
    }

    fn collect_restores(
        &mut self,
        index: &Index,
        target_files: &FileMap,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let workspace = self.repository.workspace();

        for (path, entry) in target_files {
            if self.changes.contains_key(path) {
                continue;
            }
            cancel.check()?;

            let restore = match workspace.try_stat_file(path)? {
                None => true,
                Some(stat) if self.strategy.is_force() => {
                    !self.workdir_matches(index, path, &stat, entry)?
                        || index.entry_by_path(path).map(IndexEntry::as_database_entry)
                            != Some(*entry)
                }
                Some(_) => false,
            };

            if restore {
                tracing::trace!(path = %path.display(), "restoring target version");
                self.changes.insert(
                    path.clone(),
                    Change {
                        old: Some(*entry),
                        new: Some(*entry),
                        kind: ChangeKind::Restore,
                    },
                );
            }
        }
        Ok(())
    }

    fn collect_untracked(
        &mut self,
        index: &mut Index,
        baseline: Option<&ObjectId>,
        target_files: &FileMap,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut options = StatusOptions::empty();
        let mut wanted = StatusFlags::empty();
        if self.strategy.contains(CheckoutStrategy::REMOVE_UNTRACKED) {
            options |= StatusOptions::INCLUDE_UNTRACKED | StatusOptions::RECURSE_UNTRACKED_DIRS;
            wanted |= StatusFlags::WT_NEW;
        }
        if self.strategy.contains(CheckoutStrategy::REMOVE_IGNORED) {
            options |= StatusOptions::INCLUDE_IGNORED | StatusOptions::RECURSE_IGNORED_DIRS;
            wanted |= StatusFlags::IGNORED;
        }

        let repository = self.repository;
        let report = Status::new(repository.database(), repository.workspace(), repository.config())
            .scan(index, baseline, options, StatusShow::WorkdirOnly, cancel)?;

        for entry in &report.entries {
            let path = entry.path();
            if !entry.flags.intersects(wanted)
                || index.is_directly_tracked(path)
                || target_files.contains_key(path)
                || self.changes.contains_key(path)
            {
                continue;
            }
            self.changes.insert(
                path.to_path_buf(),
                Change {
                    old: None,
                    new: None,
                    kind: ChangeKind::RemoveUntracked,
                },
            );
        }
        Ok(())
    }

    fn detect_conflicts(&mut self, index: &Index, cancel: &CancellationToken) -> Result<()> {
        let inspector = Inspector::new(self.repository.workspace());

        let tree_changes = self
            .changes
            .iter()
            .filter(|(_, change)| change.kind == ChangeKind::Tree)
            .map(|(path, change)| (path.clone(), *change))
            .collect::<Vec<_>>();

        for (path, change) in tree_changes {
            cancel.check()?;
            if let Some(conflict) = self.check_for_conflict(index, &inspector, &path, &change)? {
                tracing::debug!(path = %path.display(), kind = ?conflict.kind, "checkout conflict");
                self.conflicts.insert(path, conflict);
            }
        }
        Ok(())
    }

    fn check_for_conflict(
        &self,
        index: &Index,
        inspector: &Inspector<'_>,
        path: &Path,
        change: &Change,
    ) -> Result<Option<CheckoutConflict>> {
        let workspace = self.repository.workspace();
        let entry = index.entry_by_path(path);

        if index.is_conflicted(path) {
            return Ok(Some(CheckoutConflict::new(path, ConflictType::StaleFile)));
        }

        let staged = entry.map(IndexEntry::as_database_entry);
        if staged != change.old && staged != change.new {
            return Ok(Some(CheckoutConflict::new(path, ConflictType::StaleFile)));
        }

        let stat = workspace.try_stat_file(path)?;
        let is_submodule = [change.old, change.new]
            .iter()
            .flatten()
            .any(|side| side.mode.is_gitlink());
        if is_submodule
            && stat
                .as_ref()
                .is_none_or(|stat| stat.mode.is_tree() || stat.mode.is_gitlink())
        {
            return Ok(None);
        }

        let kind = ConflictType::get_conflict_type(stat.as_ref(), entry, change.new.as_ref());

        match &stat {
            Some(stat) if stat.mode.is_tree() => {
                let has_untracked = inspector.dir_contains(path, &mut |file: &Path| {
                    !index.is_directly_tracked(file) && !self.ignore_rules.is_ignored(file, false)
                })?;
                Ok(has_untracked.then(|| CheckoutConflict::new(path, kind)))
            }
            Some(stat) => {
                let workdir = match entry {
                    Some(entry) => inspector.check_index_against_workspace(entry, Some(stat))?.entry(),
                    None if self.ignore_rules.is_ignored(path, false) => return Ok(None),
                    None => Some(DatabaseEntry::new(
                        workspace.hash_file(path, stat.mode)?,
                        stat.mode,
                    )),
                };

                let lossless = match entry {
                    Some(entry) => workdir == Some(entry.as_database_entry()) || workdir == change.new,
                    None if change.new.is_some() => workdir == change.new,
                    None => workdir == change.old,
                };
                Ok((!lossless).then(|| CheckoutConflict::new(path, kind)))
            }
            None => {
                if change.new.is_none() {
                    return Ok(None);
                }
                Ok(self
                    .untracked_parent(index, path)?
                    .map(|parent| CheckoutConflict::new(parent, ConflictType::UntrackedOverwritten)))
            }
        }
    }

    /// The first ancestor of `path` occupied by an untracked non-directory
    fn untracked_parent(&self, index: &Index, path: &Path) -> Result<Option<PathBuf>> {
        let workspace = self.repository.workspace();
        let Some(parent) = path.parent() else {
            return Ok(None);
        };

        for ancestor in parent.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            match workspace.try_stat_file(ancestor)? {
                Some(stat) if !stat.mode.is_tree() && !index.is_directly_tracked(ancestor) => {
                    return Ok(Some(ancestor.to_path_buf()));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn workdir_matches(
        &self,
        index: &Index,
        path: &Path,
        stat: &EntryMetadata,
        target: &DatabaseEntry,
    ) -> Result<bool> {
        if target.mode.is_gitlink() {
            return Ok(stat.mode.is_tree() || stat.mode.is_gitlink());
        }
        if stat.mode != target.mode {
            return Ok(false);
        }
        if let Some(entry) = index.entry_by_path(path)
            && entry.as_database_entry() == *target
            && entry.stat_match(stat)
            && entry.times_match(stat)
        {
            return Ok(true);
        }
        Ok(self.repository.workspace().hash_file(path, stat.mode)? == target.oid)
    }

    fn submodule_targets(&self, target_files: &FileMap) -> Vec<(PathBuf, DatabaseEntry)> {
        let workspace = self.repository.workspace();
        let initialized = |path: &Path| workspace.abs(path).join(GIT_DIR).is_dir();

        match self.submodules {
            SubmoduleRecurse::No => Vec::new(),
            SubmoduleRecurse::Yes => target_files
                .iter()
                .filter(|(path, entry)| entry.mode.is_gitlink() && initialized(path))
                .map(|(path, entry)| (path.clone(), *entry))
                .collect(),
            SubmoduleRecurse::OnDemand => self
                .changes
                .iter()
                .filter_map(|(path, change)| match change.new {
                    Some(entry)
                        if entry.mode.is_gitlink()
                            && change.old != change.new
                            && initialized(path) =>
                    {
                        Some((path.clone(), entry))
                    }
                    _ => None,
                })
                .collect(),
        }
    }

    /// Plan every nested checkout and report its conflicts under the submodule's path
    fn collect_submodule_conflicts(
        &mut self,
        targets: &[(PathBuf, DatabaseEntry)],
        cancel: &CancellationToken,
    ) -> Result<()> {
        for (path, entry) in targets {
            cancel.check()?;
            let nested = Repository::open_with_config(
                self.repository.workspace().abs(path),
                self.repository.config().clone(),
            )?;
            let plan = nested.checkout_with_submodules(&entry.oid, self.strategy, self.submodules, cancel)?;
            if !plan.is_rejected() {
                continue;
            }

            for conflict in plan.conflicts() {
                let nested_path = path.join(&conflict.path);
                tracing::debug!(path = %nested_path.display(), kind = ?conflict.kind, "submodule conflict");
                self.conflicts
                    .insert(nested_path.clone(), CheckoutConflict::new(nested_path, conflict.kind));
            }
        }
        Ok(())
    }

    fn into_plan(
        self,
        target_tree: ObjectId,
        submodule_targets: Vec<(PathBuf, DatabaseEntry)>,
        cancel: &CancellationToken,
    ) -> Result<CheckoutPlan<'r>> {
        let conflicts = self.conflicts.values().cloned().collect::<Vec<_>>();
        let mut states = BTreeMap::new();

        if !conflicts.is_empty() && !self.strategy.contains(CheckoutStrategy::ALLOW_CONFLICTS) {
            for path in self.changes.keys() {
                let state = if self.conflicts.contains_key(path) {
                    PathState::Conflicted
                } else {
                    PathState::Planned
                };
                states.insert(path.clone(), state);
            }

            return Ok(CheckoutPlan {
                repository: self.repository,
                target_tree,
                strategy: self.strategy,
                submodules: self.submodules,
                status: PlanStatus::Rejected {
                    conflicts: conflicts.clone(),
                },
                actions: Vec::new(),
                states,
                changes: self.changes,
                conflicts,
            });
        }

        let workspace = self.repository.workspace();
        let mut deletes = Vec::new();
        let mut writes = Vec::new();
        let mut rmdirs = BTreeSet::new();
        let mut mkdirs = BTreeSet::new();

        for (path, change) in &self.changes {
            cancel.check()?;

            if self.conflicts.contains_key(path) {
                if self.strategy.contains(CheckoutStrategy::USE_OURS) {
                    states.insert(path.clone(), PathState::Skipped);
                    continue;
                }
                if !self.strategy.contains(CheckoutStrategy::USE_THEIRS) {
                    let stat = workspace.try_stat_file(path)?;
                    if let Some(theirs) = change.new
                        && theirs.kind() == EntryKind::Blob
                        && stat.is_some_and(|stat| !stat.mode.is_tree() && !stat.mode.is_gitlink())
                    {
                        writes.push(PlanAction::WriteConflict {
                            path: path.clone(),
                            theirs,
                        });
                    }
                    states.insert(path.clone(), PathState::Conflicted);
                    continue;
                }
            }

            match change.new {
                None => {
                    let is_submodule = change.old.is_some_and(|old| old.mode.is_gitlink());
                    if workspace.exists(path) && !is_submodule {
                        deletes.push(PlanAction::DeleteFile(path.clone()));
                        for ancestor in path.ancestors().skip(1) {
                            if ancestor.as_os_str().is_empty() {
                                break;
                            }
                            rmdirs.insert(ancestor.to_path_buf());
                        }
                    }
                }
                Some(entry) => {
                    if self.strategy.contains(CheckoutStrategy::UPDATE_ONLY) && !workspace.exists(path)
                    {
                        states.insert(path.clone(), PathState::Skipped);
                        continue;
                    }
                    for ancestor in path.ancestors().skip(1) {
                        if ancestor.as_os_str().is_empty() {
                            break;
                        }
                        mkdirs.insert(ancestor.to_path_buf());
                    }
                    if entry.mode.is_gitlink() {
                        mkdirs.insert(path.clone());
                    } else {
                        writes.push(PlanAction::WriteFile {
                            path: path.clone(),
                            entry,
                        });
                    }
                }
            }
            states.insert(path.clone(), PathState::Planned);
        }

        let mut rmdirs = rmdirs.into_iter().collect::<Vec<_>>();
        rmdirs.sort_by(|a, b| {
            b.components()
                .count()
                .cmp(&a.components().count())
                .then_with(|| a.cmp(b))
        });
        let mut mkdirs = mkdirs.into_iter().collect::<Vec<_>>();
        mkdirs.sort_by(|a, b| {
            a.components()
                .count()
                .cmp(&b.components().count())
                .then_with(|| a.cmp(b))
        });

        let mut actions = deletes;
        actions.extend(rmdirs.into_iter().map(PlanAction::RemoveDirectory));
        actions.extend(mkdirs.into_iter().map(PlanAction::CreateDirectory));
        actions.extend(writes);
        for (path, entry) in submodule_targets {
            states.entry(path.clone()).or_insert(PathState::Planned);
            actions.push(PlanAction::CheckoutSubmodule { path, entry });
        }

        Ok(CheckoutPlan {
            repository: self.repository,
            target_tree,
            strategy: self.strategy,
            submodules: self.submodules,
            status: PlanStatus::Ready,
            actions,
            states,
            changes: self.changes,
            conflicts,
        })
    }
}

/// The result of planning a checkout, ready to be applied
#[derive(Debug)]
pub struct CheckoutPlan<'r> {
    repository: &'r Repository,
    target_tree: ObjectId,
    strategy: CheckoutStrategy,
    submodules: SubmoduleRecurse,
    status: PlanStatus,
    actions: Vec<PlanAction>,
    states: BTreeMap<PathBuf, PathState>,
    changes: BTreeMap<PathBuf, Change>,
    conflicts: Vec<CheckoutConflict>,
}

impl<'r> CheckoutPlan<'r> {
    pub fn status(&self) -> &PlanStatus {
        &self.status
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.status, PlanStatus::Rejected { .. })
    }

    pub fn conflicts(&self) -> &[CheckoutConflict] {
        &self.conflicts
    }

    pub fn actions(&self) -> &[PlanAction] {
        &self.actions
    }

    pub fn states(&self) -> &BTreeMap<PathBuf, PathState> {
        &self.states
    }

    pub fn state(&self, path: impl AsRef<Path>) -> PathState {
        self.states.get(path.as_ref()).copied().unwrap_or_default()
    }

    pub fn target_tree(&self) -> &ObjectId {
        &self.target_tree
    }

    /// Execute the plan against the working tree, then the index
    ///
    /// A rejected plan fails with `Conflict` without touching anything.
    /// Under SAFE the working tree is restored when any step fails; under
    /// FORCE or ALLOW_CONFLICTS failing paths are reported in the outcome.
    /// Cancellation always restores the working tree.
    pub fn apply(self, cancel: &CancellationToken) -> Result<CheckoutOutcome> {
        self.apply_journalled(cancel).map(|(outcome, _)| outcome)
    }

    /// Like [`CheckoutPlan::apply`], also handing back the journal of what was done
    fn apply_journalled(self, cancel: &CancellationToken) -> Result<(CheckoutOutcome, Journal)> {
        if let PlanStatus::Rejected { conflicts } = &self.status {
            let paths = conflicts.iter().map(|conflict| conflict.path.clone()).collect();
            return Err(Error::conflict(describe_conflicts(conflicts), paths));
        }

        let workspace = self.repository.workspace();
        let atomic = self.strategy.is_atomic();
        let mut journal = Journal::new();
        let mut states = self.states.clone();
        let mut ours_entries = BTreeMap::new();
        let mut failures = Vec::new();

        for action in &self.actions {
            if cancel.is_cancelled() {
                failures.extend(journal.rollback(workspace));
                tracing::info!(unrestored = failures.len(), "checkout cancelled");
                return Err(Error::Cancelled);
            }

            match self.apply_action(action, &mut journal, cancel) {
                Ok(ours) => {
                    if let Some(ours) = ours {
                        ours_entries.insert(action.path().to_path_buf(), ours);
                    }
                    if let Some(state) = states.get_mut(action.path())
                        && *state == PathState::Planned
                    {
                        *state = PathState::Applied;
                    }
                }
                Err(error) if atomic || matches!(error, Error::Cancelled) => {
                    tracing::warn!(path = %action.path().display(), %error, "checkout step failed");
                    let unrestored = journal.rollback(workspace);
                    if !unrestored.is_empty() {
                        tracing::warn!(count = unrestored.len(), "paths could not be restored");
                    }
                    return Err(error);
                }
                Err(error) => {
                    tracing::warn!(path = %action.path().display(), %error, "checkout step failed");
                    if action.tracks_state() {
                        states.insert(action.path().to_path_buf(), PathState::Failed);
                    }
                    failures.push(PathFailure::new(action.path(), error));
                }
            }
        }

        // planned paths without a working tree action only need the index
        for state in states.values_mut() {
            if *state == PathState::Planned {
                *state = PathState::Applied;
            }
        }

        if !self.strategy.contains(CheckoutStrategy::DONT_UPDATE_INDEX)
            && let Err(error) = self.update_index(&states, &ours_entries)
        {
            if atomic {
                journal.rollback(workspace);
                return Err(error);
            }
            failures.push(PathFailure::new(self.repository.index_path(), error));
        }

        tracing::info!(
            applied = states.values().filter(|s| **s == PathState::Applied).count(),
            conflicted = self.conflicts.len(),
            failed = failures.len(),
            "checkout applied"
        );

        let outcome = CheckoutOutcome {
            states,
            conflicts: self.conflicts,
            failures,
        };
        Ok((outcome, journal))
    }

    /// Perform one action; returns the stored local version for conflict writes
    fn apply_action(
        &self,
        action: &PlanAction,
        journal: &mut Journal,
        cancel: &CancellationToken,
    ) -> Result<Option<DatabaseEntry>> {
        let workspace = self.repository.workspace();
        let database = self.repository.database();

        match action {
            PlanAction::DeleteFile(path) => {
                journal.save_path(workspace, path)?;
                workspace.remove_path(path)?;
            }
            PlanAction::RemoveDirectory(path) => {
                if workspace.is_dir(path) && workspace.remove_directory(path)? {
                    journal.directory_removed(path);
                }
            }
            PlanAction::CreateDirectory(path) => {
                if !workspace.is_dir(path) {
                    if workspace.exists(path) {
                        journal.save_path(workspace, path)?;
                    } else {
                        journal.directory_created(path);
                    }
                    workspace.make_directory(path)?;
                }
            }
            PlanAction::WriteFile { path, entry } => {
                let data = database.load_blob(path, entry)?;
                journal.save_path(workspace, path)?;
                workspace.write_file(path, &data, entry.mode)?;
            }
            PlanAction::WriteConflict { path, theirs } => {
                let stat = workspace.stat_file(path)?;
                let ours_data = workspace.read_file(path)?;
                let ours = DatabaseEntry::new(database.put(ObjectType::Blob, &ours_data)?, stat.mode);
                let theirs_data = database.load_blob(path, theirs)?;

                journal.save_path(workspace, path)?;
                workspace.write_file(path, &conflict_markers(&ours_data, &theirs_data), stat.mode)?;
                return Ok(Some(ours));
            }
            PlanAction::CheckoutSubmodule { path, entry } => {
                let nested = Repository::open_with_config(
                    workspace.abs(path),
                    self.repository.config().clone(),
                )?;
                let head = nested.refs().read(&RefName::head())?;
                let index_file = path.join(GIT_DIR).join(INDEX_FILE);
                let index = match workspace.exists(&index_file) {
                    true => Some(workspace.read_file(&index_file)?),
                    false => None,
                };

                let (_, nested_journal) = nested
                    .checkout_with_submodules(&entry.oid, self.strategy, self.submodules, cancel)?
                    .apply_journalled(cancel)?;
                journal.submodule_checked_out(path, nested_journal, head.clone(), index);
                nested.refs().set_head(RefTarget::Direct(entry.oid))?;
                tracing::debug!(path = %path.display(), ?head, to = %entry.oid, "checked out submodule");
            }
        }
        Ok(None)
    }

    fn update_index(
        &self,
        states: &BTreeMap<PathBuf, PathState>,
        ours_entries: &BTreeMap<PathBuf, DatabaseEntry>,
    ) -> Result<()> {
        let workspace = self.repository.workspace();
        let mut index = self.repository.lock_index();

        for (path, change) in &self.changes {
            match states.get(path) {
                Some(PathState::Applied) => match change.new {
                    Some(entry) => {
                        let staged = match workspace.try_stat_file(path)? {
                            Some(stat) if stat.mode == entry.mode => {
                                IndexEntry::new(path.clone(), entry.oid, stat)
                            }
                            _ => IndexEntry::from_database_entry(path, &entry),
                        };
                        index.add(staged);
                    }
                    None if change.kind != ChangeKind::RemoveUntracked => index.remove(path),
                    None => {}
                },
                Some(PathState::Conflicted) => {
                    if let Some(ours) = ours_entries.get(path) {
                        index.add_conflict(path, change.old, Some(*ours), change.new);
                    }
                }
                _ => {}
            }
        }

        index.write_updates()
    }
}

/// Local and target content separated by conflict markers
fn conflict_markers(ours: &[u8], theirs: &[u8]) -> Vec<u8> {
    let mut merged = Vec::with_capacity(ours.len() + theirs.len() + 64);
    let sections = [
        (OURS_MARKER, Some(ours)),
        (SEPARATOR_MARKER, Some(theirs)),
        (THEIRS_MARKER, None),
    ];
    for (marker, content) in sections {
        merged.extend_from_slice(marker.as_bytes());
        merged.push(b'\n');
        if let Some(content) = content {
            merged.extend_from_slice(content);
            if !content.is_empty() && !content.ends_with(b"\n") {
                merged.push(b'\n');
            }
        }
    }
    merged
}
