use crate::errors::{Error, Result};
use bitflags::bitflags;

bitflags! {
    /// Behaviour switches of a status scan
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct StatusOptions: u32 {
        const INCLUDE_UNTRACKED = 1 << 0;
        const INCLUDE_IGNORED = 1 << 1;
        const INCLUDE_UNMODIFIED = 1 << 2;
        const EXCLUDE_SUBMODULES = 1 << 3;
        const RECURSE_UNTRACKED_DIRS = 1 << 4;
        const RECURSE_IGNORED_DIRS = 1 << 6;
        const RENAMES_HEAD_TO_INDEX = 1 << 7;
        const RENAMES_INDEX_TO_WORKDIR = 1 << 8;
        const SORT_CASE_SENSITIVELY = 1 << 9;
        const SORT_CASE_INSENSITIVELY = 1 << 10;
        const REFRESH_BEFORE_SCAN = 1 << 12;
    }
}

impl StatusOptions {
    pub fn try_from_bits(bits: u32) -> Result<Self> {
        let options = Self::from_bits(bits)
            .ok_or_else(|| Error::invalid(format!("unknown status option bits: {bits:#x}")))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.contains(Self::SORT_CASE_SENSITIVELY | Self::SORT_CASE_INSENSITIVELY) {
            return Err(Error::invalid("only one sort mode may be requested"));
        }
        if self.contains(Self::RECURSE_UNTRACKED_DIRS) && !self.contains(Self::INCLUDE_UNTRACKED) {
            return Err(Error::invalid("RECURSE_UNTRACKED_DIRS requires INCLUDE_UNTRACKED"));
        }
        if self.contains(Self::RECURSE_IGNORED_DIRS) && !self.contains(Self::INCLUDE_IGNORED) {
            return Err(Error::invalid("RECURSE_IGNORED_DIRS requires INCLUDE_IGNORED"));
        }
        Ok(())
    }

    /// Whether the workdir walk has to look at paths the index does not know
    pub(crate) fn walks_untracked(&self) -> bool {
        self.intersects(Self::INCLUDE_UNTRACKED | Self::INCLUDE_IGNORED)
    }
}

/// Which comparisons a scan performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatusShow {
    #[default]
    IndexAndWorkdir,
    IndexOnly,
    WorkdirOnly,
}

impl StatusShow {
    pub(crate) fn includes_index(&self) -> bool {
        !matches!(self, StatusShow::WorkdirOnly)
    }

    pub(crate) fn includes_workdir(&self) -> bool {
        !matches!(self, StatusShow::IndexOnly)
    }
}
