use crate::errors::{Error, Result};
use bitflags::bitflags;

bitflags! {
    /// Behaviour switches of a tree diff
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct DiffOptions: u32 {
        /// Swap the old and new sides
        const REVERSE = 1 << 0;
        /// Report kind changes as TypeChanged instead of a Deleted and Added pair
        const INCLUDE_TYPECHANGE = 1 << 1;
        const IGNORE_SUBMODULES = 1 << 2;
        const SKIP_BINARY_CHECK = 1 << 3;
        const FORCE_TEXT = 1 << 4;
        const FORCE_BINARY = 1 << 5;
        const FIND_RENAMES = 1 << 6;
        const FIND_COPIES = 1 << 7;
    }
}

impl DiffOptions {
    /// Build options from raw bits, rejecting unknown bits and contradictory pairs
    pub fn try_from_bits(bits: u32) -> Result<Self> {
        let options = Self::from_bits(bits)
            .ok_or_else(|| Error::invalid(format!("unknown diff option bits: {bits:#x}")))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.contains(Self::FORCE_TEXT | Self::FORCE_BINARY) {
            return Err(Error::invalid("FORCE_TEXT and FORCE_BINARY are mutually exclusive"));
        }
        Ok(())
    }

    pub fn detects_similarity(&self) -> bool {
        self.intersects(Self::FIND_RENAMES | Self::FIND_COPIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case((DiffOptions::FIND_RENAMES | DiffOptions::FORCE_TEXT).bits())]
    #[case(DiffOptions::all().bits() & !DiffOptions::FORCE_BINARY.bits())]
    fn accepts_known_combinations(#[case] bits: u32) {
        assert!(DiffOptions::try_from_bits(bits).is_ok());
    }

    #[rstest]
    #[case(1 << 20)]
    #[case((DiffOptions::FORCE_TEXT | DiffOptions::FORCE_BINARY).bits())]
    fn rejects_unknown_bits_and_forced_pairs(#[case] bits: u32) {
        assert!(matches!(
            DiffOptions::try_from_bits(bits),
            Err(Error::InvalidArgument(_))
        ));
    }
}
