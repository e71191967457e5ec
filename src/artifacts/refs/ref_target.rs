//! Reference file contents
//!
//! ## Format
//!
//! A reference file holds a single line, either
//! - 40 hex characters (direct reference), or
//! - `ref: <name>` (symbolic reference)

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::refs::ref_name::RefName;
use crate::errors::{Error, Result};

const SYMREF_PREFIX: &str = "ref: ";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefTarget {
    Direct(ObjectId),
    Symbolic(RefName),
}

impl RefTarget {
    /// Parse reference file content; empty content means the ref is absent
    pub fn parse(content: &str) -> Result<Option<Self>> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        match content.strip_prefix(SYMREF_PREFIX) {
            Some(name) => Ok(Some(RefTarget::Symbolic(RefName::try_parse(name.trim())?))),
            None => Ok(Some(RefTarget::Direct(ObjectId::try_parse(content)?))),
        }
    }

    pub fn to_file_content(&self) -> String {
        match self {
            RefTarget::Direct(oid) => format!("{oid}\n"),
            RefTarget::Symbolic(name) => format!("{SYMREF_PREFIX}{name}\n"),
        }
    }

    pub fn as_direct(&self) -> Option<&ObjectId> {
        match self {
            RefTarget::Direct(oid) => Some(oid),
            RefTarget::Symbolic(_) => None,
        }
    }
}

impl From<ObjectId> for RefTarget {
    fn from(oid: ObjectId) -> Self {
        RefTarget::Direct(oid)
    }
}

impl From<RefName> for RefTarget {
    fn from(name: RefName) -> Self {
        RefTarget::Symbolic(name)
    }
}

impl std::fmt::Display for RefTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefTarget::Direct(oid) => write!(f, "{oid}"),
            RefTarget::Symbolic(name) => write!(f, "{SYMREF_PREFIX}{name}"),
        }
    }
}

impl TryFrom<&str> for RefTarget {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)?.ok_or_else(|| Error::invalid("empty reference content"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_reference_forms() {
        let oid = ObjectId::hash(b"commit");
        assert_eq!(
            RefTarget::parse(&format!("{oid}\n")).unwrap(),
            Some(RefTarget::Direct(oid))
        );
        assert_eq!(
            RefTarget::parse("ref: refs/heads/main\n").unwrap(),
            Some(RefTarget::Symbolic(RefName::branch("main").unwrap()))
        );
        assert_eq!(RefTarget::parse("  \n").unwrap(), None);
    }
}
