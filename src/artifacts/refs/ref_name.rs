use crate::artifacts::refs::{INVALID_REF_NAME_REGEX, REF_ALIASES};
use crate::errors::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

const HEADS_PREFIX: &str = "refs/heads/";
const TAGS_PREFIX: &str = "refs/tags/";

static INVALID_NAME: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(INVALID_REF_NAME_REGEX));

/// A validated reference name such as `HEAD` or `refs/heads/main`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefName(String);

impl RefName {
    /// Validate a name, expanding aliases like `@`
    pub fn try_parse(name: impl AsRef<str>) -> Result<Self> {
        let name = name.as_ref();
        let name = REF_ALIASES.get(name).copied().unwrap_or(name);

        if name.is_empty() {
            return Err(Error::invalid("reference name cannot be empty"));
        }
        let re = INVALID_NAME
            .as_ref()
            .map_err(|e| Error::invalid(format!("invalid ref name regex: {e}")))?;
        if re.is_match(name) {
            return Err(Error::invalid(format!("invalid reference name: {name:?}")));
        }

        Ok(Self(name.to_string()))
    }

    pub fn head() -> Self {
        Self("HEAD".to_string())
    }

    /// `refs/heads/<short>`
    pub fn branch(short: &str) -> Result<Self> {
        Self::try_parse(format!("{HEADS_PREFIX}{short}"))
    }

    /// `refs/tags/<short>`
    pub fn tag(short: &str) -> Result<Self> {
        Self::try_parse(format!("{TAGS_PREFIX}{short}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_head(&self) -> bool {
        self.0 == "HEAD"
    }

    pub fn is_branch(&self) -> bool {
        self.0.starts_with(HEADS_PREFIX)
    }

    /// Name with the `refs/heads/`, `refs/tags/` or `refs/` prefix removed
    pub fn short_name(&self) -> &str {
        [HEADS_PREFIX, TAGS_PREFIX, "refs/"]
            .iter()
            .find_map(|prefix| self.0.strip_prefix(prefix))
            .unwrap_or(&self.0)
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
