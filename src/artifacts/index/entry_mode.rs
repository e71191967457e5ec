//! File modes recorded in trees and index entries

use crate::errors::{Error, Result};

/// Mode of a tree or index entry
#[derive(Debug, Clone, Copy, Eq, Hash, Ord, Default, PartialEq, PartialOrd)]
pub enum EntryMode {
    #[default]
    Regular,
    Executable,
    Symlink,
    Directory,
    Gitlink,
}

/// Object kind an entry points at, derived from its mode
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum EntryKind {
    Blob,
    Tree,
    /// Submodule commit
    Commit,
}

impl EntryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryMode::Regular => "100644",
            EntryMode::Executable => "100755",
            EntryMode::Symlink => "120000",
            EntryMode::Directory => "40000",
            EntryMode::Gitlink => "160000",
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            EntryMode::Regular => 0o100644,
            EntryMode::Executable => 0o100755,
            EntryMode::Symlink => 0o120000,
            EntryMode::Directory => 0o40000,
            EntryMode::Gitlink => 0o160000,
        }
    }

    pub fn from_octal_str(mode: &str) -> Result<Self> {
        let value = u32::from_str_radix(mode, 8)
            .map_err(|_| Error::invalid(format!("invalid entry mode: {mode}")))?;
        Self::try_from(value)
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            EntryMode::Regular | EntryMode::Executable | EntryMode::Symlink => EntryKind::Blob,
            EntryMode::Directory => EntryKind::Tree,
            EntryMode::Gitlink => EntryKind::Commit,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Directory)
    }

    pub fn is_gitlink(&self) -> bool {
        matches!(self, EntryMode::Gitlink)
    }

    /// Regular and executable files, the only modes eligible for rename pairing
    pub fn is_file(&self) -> bool {
        matches!(self, EntryMode::Regular | EntryMode::Executable)
    }

    /// Whether a change between two modes is a type change rather than a modification
    ///
    /// Flipping the executable bit is a modification.
    pub fn is_type_change(&self, other: &EntryMode) -> bool {
        !(self == other || self.is_file() && other.is_file())
    }
}

impl TryFrom<u32> for EntryMode {
    type Error = Error;

    fn try_from(mode: u32) -> Result<Self> {
        match mode {
            0o100644 | 0o100664 => Ok(EntryMode::Regular),
            0o100755 => Ok(EntryMode::Executable),
            0o120000 => Ok(EntryMode::Symlink),
            0o40000 => Ok(EntryMode::Directory),
            0o160000 => Ok(EntryMode::Gitlink),
            _ => Err(Error::invalid(format!("invalid entry mode: {mode:o}"))),
        }
    }
}

impl From<EntryMode> for u32 {
    fn from(mode: EntryMode) -> Self {
        mode.as_u32()
    }
}

impl std::fmt::Display for EntryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
