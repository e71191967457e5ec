use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::errors::{Error, Result};
use bitflags::bitflags;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Change classification of a single path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DeltaStatus {
    Unmodified = 0,
    Added = 1,
    Deleted = 2,
    Modified = 3,
    Renamed = 4,
    Copied = 5,
    Ignored = 6,
    Untracked = 7,
    TypeChanged = 8,
    Conflicted = 10,
    /// Only ever assigned to directories whose children changed in different ways
    Mixed = 11,
}

impl DeltaStatus {
    pub fn value(&self) -> u8 {
        *self as u8
    }

    pub fn description(&self) -> &'static str {
        match self {
            DeltaStatus::Unmodified => "unmodified",
            DeltaStatus::Added => "added",
            DeltaStatus::Deleted => "deleted",
            DeltaStatus::Modified => "modified",
            DeltaStatus::Renamed => "renamed",
            DeltaStatus::Copied => "copied",
            DeltaStatus::Ignored => "ignored",
            DeltaStatus::Untracked => "untracked",
            DeltaStatus::TypeChanged => "type change",
            DeltaStatus::Conflicted => "conflict",
            DeltaStatus::Mixed => "mixed",
        }
    }

    pub fn is_modified(&self) -> bool {
        !matches!(self, DeltaStatus::Unmodified | DeltaStatus::Untracked)
    }

    pub fn status_char(&self) -> char {
        match self {
            DeltaStatus::Unmodified => ' ',
            DeltaStatus::Added => 'A',
            DeltaStatus::Deleted => 'D',
            DeltaStatus::Modified => 'M',
            DeltaStatus::Renamed => 'R',
            DeltaStatus::Copied => 'C',
            DeltaStatus::Ignored => '!',
            DeltaStatus::Untracked => '?',
            DeltaStatus::TypeChanged => 'T',
            DeltaStatus::Conflicted => 'U',
            DeltaStatus::Mixed => 'X',
        }
    }
}

impl TryFrom<u8> for DeltaStatus {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(DeltaStatus::Unmodified),
            1 => Ok(DeltaStatus::Added),
            2 => Ok(DeltaStatus::Deleted),
            3 => Ok(DeltaStatus::Modified),
            4 => Ok(DeltaStatus::Renamed),
            5 => Ok(DeltaStatus::Copied),
            6 => Ok(DeltaStatus::Ignored),
            7 => Ok(DeltaStatus::Untracked),
            8 => Ok(DeltaStatus::TypeChanged),
            10 => Ok(DeltaStatus::Conflicted),
            11 => Ok(DeltaStatus::Mixed),
            _ => Err(Error::invalid(format!("unknown delta status: {value}"))),
        }
    }
}

impl std::fmt::Display for DeltaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct DiffFlags: u32 {
        const BINARY = 1 << 0;
        const NOT_BINARY = 1 << 1;
        const VALID_ID = 1 << 2;
        const EXISTS = 1 << 3;
    }
}

/// One changed path between two sides of a diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaRecord {
    pub old_path: PathBuf,
    pub new_path: PathBuf,
    pub old_entry: Option<DatabaseEntry>,
    pub new_entry: Option<DatabaseEntry>,
    pub status: DeltaStatus,
    pub flags: DiffFlags,
    /// Similarity score of renames and copies
    pub similarity: Option<u8>,
}

impl DeltaRecord {
    /// Build a record for `path`, deriving the status and id flags from the entries
    pub fn between(
        path: impl Into<PathBuf>,
        old_entry: Option<DatabaseEntry>,
        new_entry: Option<DatabaseEntry>,
    ) -> Self {
        let path = path.into();
        let status = classify(old_entry.as_ref(), new_entry.as_ref());

        DeltaRecord {
            old_path: path.clone(),
            new_path: path,
            old_entry,
            new_entry,
            status,
            flags: id_flags(old_entry.as_ref(), new_entry.as_ref()),
            similarity: None,
        }
    }

    pub fn with_status(mut self, status: DeltaStatus) -> Self {
        self.status = status;
        self
    }

    /// Pair a deleted and an added record into a rename or copy
    pub(crate) fn paired(
        source: &DeltaRecord,
        target: &DeltaRecord,
        status: DeltaStatus,
        similarity: u8,
    ) -> Self {
        DeltaRecord {
            old_path: source.old_path.clone(),
            new_path: target.new_path.clone(),
            old_entry: source.old_entry,
            new_entry: target.new_entry,
            status,
            flags: id_flags(source.old_entry.as_ref(), target.new_entry.as_ref())
                | ((source.flags | target.flags) & (DiffFlags::BINARY | DiffFlags::NOT_BINARY)),
            similarity: Some(similarity),
        }
    }

    /// The path this record is reported under
    pub fn path(&self) -> &Path {
        &self.new_path
    }

    pub fn is_binary(&self) -> bool {
        self.flags.contains(DiffFlags::BINARY)
    }

    /// The record describing the change from the new side back to the old side
    ///
    /// Copies invert into deletions of the copy, since their source survives on both sides.
    pub fn invert(&self) -> DeltaRecord {
        let status = match self.status {
            DeltaStatus::Added => DeltaStatus::Deleted,
            DeltaStatus::Deleted => DeltaStatus::Added,
            DeltaStatus::Copied => DeltaStatus::Deleted,
            other => other,
        };

        if self.status == DeltaStatus::Copied {
            return DeltaRecord {
                old_path: self.new_path.clone(),
                new_path: self.new_path.clone(),
                old_entry: self.new_entry,
                new_entry: None,
                status,
                flags: id_flags(self.new_entry.as_ref(), None)
                    | (self.flags & (DiffFlags::BINARY | DiffFlags::NOT_BINARY)),
                similarity: None,
            };
        }

        DeltaRecord {
            old_path: self.new_path.clone(),
            new_path: self.old_path.clone(),
            old_entry: self.new_entry,
            new_entry: self.old_entry,
            status,
            flags: id_flags(self.new_entry.as_ref(), self.old_entry.as_ref())
                | (self.flags & (DiffFlags::BINARY | DiffFlags::NOT_BINARY)),
            similarity: self.similarity,
        }
    }
}

/// Per-path classifier shared by the tree differ and the status engine
pub fn classify(old: Option<&DatabaseEntry>, new: Option<&DatabaseEntry>) -> DeltaStatus {
    match (old, new) {
        (None, None) => DeltaStatus::Unmodified,
        (None, Some(_)) => DeltaStatus::Added,
        (Some(_), None) => DeltaStatus::Deleted,
        (Some(old), Some(new)) if old.mode.is_type_change(&new.mode) => DeltaStatus::TypeChanged,
        (Some(old), Some(new)) if old == new => DeltaStatus::Unmodified,
        (Some(_), Some(_)) => DeltaStatus::Modified,
    }
}

fn id_flags(old: Option<&DatabaseEntry>, new: Option<&DatabaseEntry>) -> DiffFlags {
    let mut flags = DiffFlags::empty();

    if new.is_some() {
        flags |= DiffFlags::EXISTS;
    }
    if old.iter().chain(new.iter()).all(|entry| !entry.oid.is_zero()) {
        flags |= DiffFlags::VALID_ID;
    }

    flags
}

/// Flattened view of a tree: every non-directory entry keyed by its full path
pub type FileMap = BTreeMap<PathBuf, DatabaseEntry>;

/// Apply records to a flattened file map, old side to new side
///
/// Directory entries carried by type changes are not part of the flattened view
/// and are skipped.
pub fn apply_deltas<'d>(files: &mut FileMap, deltas: impl IntoIterator<Item = &'d DeltaRecord>) {
    let deltas = deltas.into_iter().collect::<Vec<_>>();

    for delta in &deltas {
        if delta.status != DeltaStatus::Copied
            && delta.old_entry.is_some_and(|entry| !entry.is_tree())
        {
            files.remove(&delta.old_path);
        }
    }
    for delta in &deltas {
        if let Some(entry) = delta.new_entry
            && !entry.is_tree()
        {
            files.insert(delta.new_path.clone(), entry);
        }
    }
}

/// Aggregate file statuses into one status per ancestor directory
///
/// A directory is Conflicted when any child is, otherwise it carries the status its
/// changed children share, Mixed when they disagree and Unmodified when nothing changed.
pub fn summarize_directories<'d>(
    deltas: impl IntoIterator<Item = &'d DeltaRecord>,
) -> BTreeMap<PathBuf, DeltaStatus> {
    let mut children: BTreeMap<PathBuf, Vec<DeltaStatus>> = BTreeMap::new();

    for delta in deltas {
        for ancestor in delta.path().ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            children
                .entry(ancestor.to_path_buf())
                .or_default()
                .push(delta.status);
        }
    }

    children
        .into_iter()
        .map(|(dir, statuses)| (dir, combine_statuses(&statuses)))
        .collect()
}

fn combine_statuses(statuses: &[DeltaStatus]) -> DeltaStatus {
    if statuses.contains(&DeltaStatus::Conflicted) {
        return DeltaStatus::Conflicted;
    }

    let mut changed = statuses
        .iter()
        .filter(|status| **status != DeltaStatus::Unmodified);

    match changed.next() {
        None => DeltaStatus::Unmodified,
        Some(first) if changed.all(|status| status == first) => *first,
        Some(_) => DeltaStatus::Mixed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::entry_mode::EntryMode;
    use crate::artifacts::objects::object_id::ObjectId;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn entry(content: &str, mode: EntryMode) -> DatabaseEntry {
        DatabaseEntry::new(ObjectId::hash(content.as_bytes()), mode)
    }

    fn record(path: &str, status: DeltaStatus) -> DeltaRecord {
        DeltaRecord::between(path, None, Some(entry(path, EntryMode::Regular))).with_status(status)
    }

    #[rstest]
    #[case(DeltaStatus::Unmodified, 0, ' ', false)]
    #[case(DeltaStatus::Untracked, 7, '?', false)]
    #[case(DeltaStatus::TypeChanged, 8, 'T', true)]
    #[case(DeltaStatus::Conflicted, 10, 'U', true)]
    #[case(DeltaStatus::Mixed, 11, 'X', true)]
    fn statuses_keep_stable_values(
        #[case] status: DeltaStatus,
        #[case] value: u8,
        #[case] short: char,
        #[case] modified: bool,
    ) {
        assert_eq!(status.value(), value);
        assert_eq!(status.status_char(), short);
        assert_eq!(DeltaStatus::try_from(value).unwrap(), status);
        assert_eq!(status.is_modified(), modified);
    }

    #[test]
    fn value_nine_is_not_a_status() {
        assert!(DeltaStatus::try_from(9).is_err());
    }

    #[test]
    fn descriptions_match_display() {
        assert_eq!(DeltaStatus::TypeChanged.to_string(), "type change");
        assert_eq!(DeltaStatus::Conflicted.to_string(), "conflict");
    }

    #[rstest]
    #[case(EntryMode::Regular, EntryMode::Executable, DeltaStatus::Modified)]
    #[case(EntryMode::Regular, EntryMode::Symlink, DeltaStatus::TypeChanged)]
    #[case(EntryMode::Regular, EntryMode::Gitlink, DeltaStatus::TypeChanged)]
    #[case(EntryMode::Directory, EntryMode::Regular, DeltaStatus::TypeChanged)]
    fn classifier_separates_modifications_from_type_changes(
        #[case] old_mode: EntryMode,
        #[case] new_mode: EntryMode,
        #[case] expected: DeltaStatus,
    ) {
        let old = entry("same", old_mode);
        let new = entry("same", new_mode);
        assert_eq!(classify(Some(&old), Some(&new)), expected);
    }

    #[test]
    fn added_records_carry_exists_and_valid_id() {
        let delta = DeltaRecord::between("a.txt", None, Some(entry("a", EntryMode::Regular)));
        assert_eq!(delta.status, DeltaStatus::Added);
        assert_eq!(delta.flags, DiffFlags::EXISTS | DiffFlags::VALID_ID);

        let inverse = delta.invert();
        assert_eq!(inverse.status, DeltaStatus::Deleted);
        assert_eq!(inverse.flags, DiffFlags::VALID_ID);
    }

    #[test]
    fn directories_aggregate_with_conflict_first_then_mixed() {
        let deltas = vec![
            record("src/a.rs", DeltaStatus::Added),
            record("src/b.rs", DeltaStatus::Added),
            record("docs/x.md", DeltaStatus::Added),
            record("docs/y.md", DeltaStatus::Deleted),
            record("lib/p/q.rs", DeltaStatus::Modified),
            record("lib/r.rs", DeltaStatus::Conflicted),
            record("same/z", DeltaStatus::Unmodified),
        ];

        let summary = summarize_directories(&deltas);

        assert_eq!(summary[Path::new("src")], DeltaStatus::Added);
        assert_eq!(summary[Path::new("docs")], DeltaStatus::Mixed);
        assert_eq!(summary[Path::new("lib")], DeltaStatus::Conflicted);
        assert_eq!(summary[Path::new("lib/p")], DeltaStatus::Modified);
        assert_eq!(summary[Path::new("same")], DeltaStatus::Unmodified);
    }
}
