use crate::areas::workspace::{GIT_DIR, Workspace};
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::errors::Result;
use derive_new::new;
use std::path::Path;

/// What the working tree holds at a tracked path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkdirSide {
    /// Nothing, or a directory where a file is tracked
    Missing,
    /// Stat data matches the index; content is assumed unchanged
    StatClean(DatabaseEntry),
    /// Content id computed from the file
    Hashed(DatabaseEntry),
}

impl WorkdirSide {
    pub fn entry(&self) -> Option<DatabaseEntry> {
        match self {
            WorkdirSide::Missing => None,
            WorkdirSide::StatClean(entry) | WorkdirSide::Hashed(entry) => Some(*entry),
        }
    }
}

#[derive(new)]
pub struct Inspector<'r> {
    workspace: &'r Workspace,
}

impl<'r> Inspector<'r> {
    /// Workdir side of an index entry, hashing only when the stat cache disagrees
    pub fn check_index_against_workspace(
        &self,
        entry: &IndexEntry,
        stat: Option<&EntryMetadata>,
    ) -> Result<WorkdirSide> {
        let Some(stat) = stat else {
            return Ok(WorkdirSide::Missing);
        };

        if entry.mode().is_gitlink() {
            return self.check_submodule(entry, stat);
        }
        if stat.mode == EntryMode::Directory {
            return Ok(WorkdirSide::Missing);
        }

        if entry.stat_match(stat) && entry.times_match(stat) {
            return Ok(WorkdirSide::StatClean(DatabaseEntry::new(entry.oid, stat.mode)));
        }

        let oid = self.workspace.hash_file(&entry.name, stat.mode)?;
        Ok(WorkdirSide::Hashed(DatabaseEntry::new(oid, stat.mode)))
    }

    /// A checked-out submodule is compared by the commit its HEAD points at;
    /// an uninitialized one counts as unchanged
    fn check_submodule(&self, entry: &IndexEntry, stat: &EntryMetadata) -> Result<WorkdirSide> {
        match stat.mode {
            EntryMode::Gitlink => match self.workspace.submodule_head(&entry.name)? {
                Some(oid) => Ok(WorkdirSide::Hashed(DatabaseEntry::new(oid, EntryMode::Gitlink))),
                None => Ok(WorkdirSide::StatClean(entry.as_database_entry())),
            },
            EntryMode::Directory => Ok(WorkdirSide::StatClean(entry.as_database_entry())),
            mode => {
                let oid = self.workspace.hash_file(&entry.name, mode)?;
                Ok(WorkdirSide::Hashed(DatabaseEntry::new(oid, mode)))
            }
        }
    }

    /// Whether a directory holds at least one file for which `keep` holds
    pub fn dir_contains(&self, dir: &Path, keep: &mut impl FnMut(&Path) -> bool) -> Result<bool> {
        for child in self.workspace.list_dir(dir)? {
            let nested_repo = self.workspace.abs(&child).join(GIT_DIR).exists();
            if self.workspace.is_dir(&child) && !nested_repo {
                if self.dir_contains(&child, keep)? {
                    return Ok(true);
                }
            } else if keep(&child) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
