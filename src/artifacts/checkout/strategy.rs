use crate::errors::{Error, Result};
use bitflags::bitflags;

bitflags! {
    /// How a checkout treats local state; the empty set behaves as SAFE
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct CheckoutStrategy: u32 {
        /// Refuse to touch anything when a local change would be lost
        const SAFE = 1 << 0;
        /// Make the working tree match the target, discarding local changes
        const FORCE = 1 << 1;
        /// Write target files missing from the working tree even when unchanged
        const RECREATE_MISSING = 1 << 2;
        /// Apply what can be applied and record conflicts instead of rejecting
        const ALLOW_CONFLICTS = 1 << 4;
        const REMOVE_UNTRACKED = 1 << 5;
        const REMOVE_IGNORED = 1 << 6;
        /// Only update paths that already exist in the working tree
        const UPDATE_ONLY = 1 << 7;
        const DONT_UPDATE_INDEX = 1 << 8;
        /// With ALLOW_CONFLICTS keep the local version of conflicting files
        const USE_OURS = 1 << 11;
        /// With ALLOW_CONFLICTS take the target version of conflicting files
        const USE_THEIRS = 1 << 12;
    }
}

impl CheckoutStrategy {
    pub fn try_from_bits(bits: u32) -> Result<Self> {
        let strategy = Self::from_bits(bits)
            .ok_or_else(|| Error::invalid(format!("unknown checkout strategy bits: {bits:#x}")))?;
        strategy.validate()?;
        Ok(strategy)
    }

    pub fn validate(&self) -> Result<()> {
        if self.contains(Self::SAFE | Self::FORCE) {
            return Err(Error::invalid("SAFE and FORCE are mutually exclusive"));
        }
        if self.contains(Self::USE_OURS | Self::USE_THEIRS) {
            return Err(Error::invalid("USE_OURS and USE_THEIRS are mutually exclusive"));
        }
        Ok(())
    }

    pub fn is_force(&self) -> bool {
        self.contains(Self::FORCE)
    }

    /// Whether apply is all-or-nothing
    pub fn is_atomic(&self) -> bool {
        !self.intersects(Self::FORCE | Self::ALLOW_CONFLICTS)
    }
}

/// Policy for nested repositories recorded as gitlinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SubmoduleRecurse {
    /// Only make sure the submodule directory exists
    #[default]
    No,
    /// Check out every submodule whose repository is present
    Yes,
    /// Check out submodules whose recorded commit changed
    OnDemand,
}
