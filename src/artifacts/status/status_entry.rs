use crate::artifacts::diff::delta::{DeltaRecord, DeltaStatus};
use bitflags::bitflags;
use std::path::{Path, PathBuf};

bitflags! {
    /// Per-path status bits; an empty set means the path is current
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct StatusFlags: u32 {
        const INDEX_NEW = 1 << 0;
        const INDEX_MODIFIED = 1 << 1;
        const INDEX_DELETED = 1 << 2;
        const INDEX_RENAMED = 1 << 3;
        const INDEX_TYPECHANGE = 1 << 4;
        const WT_NEW = 1 << 7;
        const WT_MODIFIED = 1 << 8;
        const WT_DELETED = 1 << 9;
        const WT_TYPECHANGE = 1 << 10;
        const WT_RENAMED = 1 << 11;
        const WT_UNREADABLE = 1 << 12;
        const IGNORED = 1 << 14;
        const CONFLICTED = 1 << 15;
    }
}

impl StatusFlags {
    pub(crate) fn for_index_delta(status: DeltaStatus) -> Self {
        match status {
            DeltaStatus::Added | DeltaStatus::Copied => StatusFlags::INDEX_NEW,
            DeltaStatus::Deleted => StatusFlags::INDEX_DELETED,
            DeltaStatus::Modified => StatusFlags::INDEX_MODIFIED,
            DeltaStatus::Renamed => StatusFlags::INDEX_RENAMED,
            DeltaStatus::TypeChanged => StatusFlags::INDEX_TYPECHANGE,
            DeltaStatus::Conflicted => StatusFlags::CONFLICTED,
            _ => StatusFlags::empty(),
        }
    }

    pub(crate) fn for_workdir_delta(status: DeltaStatus) -> Self {
        match status {
            DeltaStatus::Added | DeltaStatus::Copied | DeltaStatus::Untracked => {
                StatusFlags::WT_NEW
            }
            DeltaStatus::Deleted => StatusFlags::WT_DELETED,
            DeltaStatus::Modified => StatusFlags::WT_MODIFIED,
            DeltaStatus::Renamed => StatusFlags::WT_RENAMED,
            DeltaStatus::TypeChanged => StatusFlags::WT_TYPECHANGE,
            DeltaStatus::Ignored => StatusFlags::IGNORED,
            DeltaStatus::Conflicted => StatusFlags::CONFLICTED,
            _ => StatusFlags::empty(),
        }
    }
}

/// Status of one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub path: PathBuf,
    pub flags: StatusFlags,
    pub head_to_index: Option<DeltaRecord>,
    pub index_to_workdir: Option<DeltaRecord>,
}

impl StatusEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StatusEntry {
            path: path.into(),
            flags: StatusFlags::empty(),
            head_to_index: None,
            index_to_workdir: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_current(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn is_conflicted(&self) -> bool {
        self.flags.contains(StatusFlags::CONFLICTED)
    }

    /// Whether the entry stands for a whole untracked or ignored directory
    pub fn is_collapsed_dir(&self) -> bool {
        self.path.as_os_str().as_encoded_bytes().ends_with(b"/")
    }

    /// Single status of the staged side
    pub fn index_status(&self) -> DeltaStatus {
        const PRECEDENCE: [(StatusFlags, DeltaStatus); 7] = [
            (StatusFlags::INDEX_MODIFIED, DeltaStatus::Modified),
            (StatusFlags::INDEX_NEW, DeltaStatus::Added),
            (StatusFlags::INDEX_DELETED, DeltaStatus::Deleted),
            (StatusFlags::INDEX_RENAMED, DeltaStatus::Renamed),
            (StatusFlags::INDEX_TYPECHANGE, DeltaStatus::TypeChanged),
            (StatusFlags::IGNORED, DeltaStatus::Ignored),
            (StatusFlags::CONFLICTED, DeltaStatus::Conflicted),
        ];

        PRECEDENCE
            .iter()
            .find(|(flag, _)| self.flags.contains(*flag))
            .map_or(DeltaStatus::Unmodified, |(_, status)| *status)
    }

    /// Single status of the working tree side
    pub fn worktree_status(&self) -> DeltaStatus {
        const PRECEDENCE: [(StatusFlags, DeltaStatus); 5] = [
            (StatusFlags::WT_MODIFIED, DeltaStatus::Modified),
            (StatusFlags::WT_NEW, DeltaStatus::Added),
            (StatusFlags::WT_DELETED, DeltaStatus::Deleted),
            (StatusFlags::WT_RENAMED, DeltaStatus::Renamed),
            (StatusFlags::WT_TYPECHANGE, DeltaStatus::TypeChanged),
        ];

        if self.flags == StatusFlags::CONFLICTED {
            return DeltaStatus::Conflicted;
        }

        PRECEDENCE
            .iter()
            .find(|(flag, _)| self.flags.contains(*flag))
            .map_or(DeltaStatus::Unmodified, |(_, status)| *status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn entry(flags: StatusFlags) -> StatusEntry {
        StatusEntry {
            flags,
            ..StatusEntry::new("file")
        }
    }

    #[rstest]
    #[case(StatusFlags::empty(), DeltaStatus::Unmodified)]
    #[case(StatusFlags::INDEX_NEW | StatusFlags::INDEX_MODIFIED, DeltaStatus::Modified)]
    #[case(StatusFlags::INDEX_DELETED | StatusFlags::INDEX_RENAMED, DeltaStatus::Deleted)]
    #[case(StatusFlags::INDEX_TYPECHANGE | StatusFlags::IGNORED, DeltaStatus::TypeChanged)]
    #[case(StatusFlags::CONFLICTED, DeltaStatus::Conflicted)]
    #[case(StatusFlags::WT_MODIFIED, DeltaStatus::Unmodified)]
    fn index_side_precedence(#[case] flags: StatusFlags, #[case] expected: DeltaStatus) {
        assert_eq!(entry(flags).index_status(), expected);
    }

    #[rstest]
    #[case(StatusFlags::WT_NEW | StatusFlags::WT_MODIFIED, DeltaStatus::Modified)]
    #[case(StatusFlags::WT_NEW, DeltaStatus::Added)]
    #[case(StatusFlags::WT_RENAMED | StatusFlags::WT_TYPECHANGE, DeltaStatus::Renamed)]
    #[case(StatusFlags::CONFLICTED, DeltaStatus::Conflicted)]
    #[case(StatusFlags::CONFLICTED | StatusFlags::WT_UNREADABLE, DeltaStatus::Unmodified)]
    #[case(StatusFlags::IGNORED, DeltaStatus::Unmodified)]
    fn worktree_side_precedence(#[case] flags: StatusFlags, #[case] expected: DeltaStatus) {
        assert_eq!(entry(flags).worktree_status(), expected);
    }
}
