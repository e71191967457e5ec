use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use std::path::PathBuf;

#[derive(Debug)]
pub struct ConflictMessage {
    pub header: &'static str,
    pub footer: &'static str,
}

impl From<&ConflictType> for ConflictMessage {
    fn from(value: &ConflictType) -> Self {
        match value {
            ConflictType::StaleFile => Self {
                header: "Your local changes to the following files would be overwritten by checkout:",
                footer: "Please commit your changes or stash them before you switch branches.",
            },
            ConflictType::StaleDirectory => Self {
                header: "Updating the following directories would lose untracked files in them:",
                footer: "",
            },
            ConflictType::UntrackedOverwritten => Self {
                header: "The following untracked working tree files would be overwritten by checkout:",
                footer: "Please move or remove them before you switch branches.",
            },
            ConflictType::UntrackedRemoved => Self {
                header: "The following untracked working tree files would be removed by checkout:",
                footer: "Please move or remove them before you switch branches.",
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConflictType {
    StaleFile,
    StaleDirectory,
    UntrackedOverwritten,
    UntrackedRemoved,
}

impl ConflictType {
    pub fn get_conflict_type(
        stat: Option<&EntryMetadata>,
        entry: Option<&IndexEntry>,
        new_entry: Option<&DatabaseEntry>,
    ) -> ConflictType {
        if entry.is_some() {
            ConflictType::StaleFile
        } else if let Some(stat) = stat
            && stat.mode.is_tree()
        {
            ConflictType::StaleDirectory
        } else if new_entry.is_some() {
            ConflictType::UntrackedOverwritten
        } else {
            ConflictType::UntrackedRemoved
        }
    }
}

/// A path a checkout cannot update without losing local state
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CheckoutConflict {
    pub path: PathBuf,
    pub kind: ConflictType,
}

impl CheckoutConflict {
    pub fn new(path: impl Into<PathBuf>, kind: ConflictType) -> Self {
        CheckoutConflict {
            path: path.into(),
            kind,
        }
    }
}

/// Human readable report grouping conflicting paths by kind
pub fn describe_conflicts(conflicts: &[CheckoutConflict]) -> String {
    let mut kinds = conflicts.iter().map(|conflict| conflict.kind).collect::<Vec<_>>();
    kinds.sort();
    kinds.dedup();

    kinds
        .into_iter()
        .map(|kind| {
            let paths = conflicts
                .iter()
                .filter(|conflict| conflict.kind == kind)
                .map(|conflict| format!("\t{}", conflict.path.display()))
                .collect::<Vec<_>>();
            let ConflictMessage { header, footer } = (&kind).into();
            format!("{}\n{}\n{}", header, paths.join("\n"), footer)
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
