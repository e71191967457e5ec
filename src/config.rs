//! Engine configuration
//!
//! Tuning knobs shared by the stores and scanners. Defaults mirror git's
//! behaviour; `from_env` lets a host override them through `XIT_*` variables.

use crate::errors::{Error, Result};

pub const DEFAULT_MAX_SYMREF_DEPTH: usize = 5;
pub const DEFAULT_BINARY_SCAN_WINDOW: usize = 8000;
pub const DEFAULT_BINARY_RATIO: f64 = 0.3;
pub const DEFAULT_RENAME_THRESHOLD: u8 = 50;
pub const DEFAULT_IGNORE_FILE: &str = ".gitignore";
pub const DEFAULT_BRANCH: &str = "main";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Maximum number of symbolic hops followed by `resolve`
    pub max_symref_depth: usize,
    /// Number of leading bytes inspected by binary detection
    pub binary_scan_window: usize,
    /// Non-printable ratio above which a buffer is binary
    pub binary_ratio: f64,
    /// Minimum similarity score (0..=100) for rename and copy pairing
    pub rename_threshold: u8,
    /// Name of the per-repository ignore file at the workspace root
    pub ignore_file: String,
    /// Patterns applied on top of the ignore file
    pub extra_ignore_patterns: Vec<String>,
    /// Branch HEAD points at after `init`
    pub default_branch: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_symref_depth: DEFAULT_MAX_SYMREF_DEPTH,
            binary_scan_window: DEFAULT_BINARY_SCAN_WINDOW,
            binary_ratio: DEFAULT_BINARY_RATIO,
            rename_threshold: DEFAULT_RENAME_THRESHOLD,
            ignore_file: DEFAULT_IGNORE_FILE.to_string(),
            extra_ignore_patterns: Vec::new(),
            default_branch: DEFAULT_BRANCH.to_string(),
        }
    }
}

impl EngineConfig {
    /// Build a configuration from defaults overridden by environment variables
    ///
    /// Recognized: `XIT_MAX_SYMREF_DEPTH`, `XIT_BINARY_SCAN_WINDOW`,
    /// `XIT_RENAME_THRESHOLD`, `XIT_IGNORE_FILE`, `XIT_DEFAULT_BRANCH`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(depth) = read_env_number::<usize>("XIT_MAX_SYMREF_DEPTH")? {
            config.max_symref_depth = depth;
        }
        if let Some(window) = read_env_number::<usize>("XIT_BINARY_SCAN_WINDOW")? {
            config.binary_scan_window = window;
        }
        if let Some(threshold) = read_env_number::<u8>("XIT_RENAME_THRESHOLD")? {
            config.rename_threshold = threshold;
        }
        if let Ok(ignore_file) = std::env::var("XIT_IGNORE_FILE") {
            config.ignore_file = ignore_file;
        }
        if let Ok(branch) = std::env::var("XIT_DEFAULT_BRANCH") {
            config.default_branch = branch;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_rename_threshold(mut self, threshold: u8) -> Self {
        self.rename_threshold = threshold;
        self
    }

    pub fn with_ignore_patterns(mut self, patterns: impl IntoIterator<Item = String>) -> Self {
        self.extra_ignore_patterns.extend(patterns);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_symref_depth == 0 {
            return Err(Error::invalid("max_symref_depth must be at least 1"));
        }
        if self.rename_threshold > 100 {
            return Err(Error::invalid(format!(
                "rename threshold {} exceeds 100",
                self.rename_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.binary_ratio) {
            return Err(Error::invalid(format!(
                "binary ratio {} outside 0..=1",
                self.binary_ratio
            )));
        }
        Ok(())
    }
}

fn read_env_number<N: std::str::FromStr>(name: &str) -> Result<Option<N>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<N>()
            .map(Some)
            .map_err(|_| Error::invalid(format!("{name} is not a valid number: {raw}"))),
        Err(_) => Ok(None),
    }
}
