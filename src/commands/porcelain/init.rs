use crate::areas::repository::Repository;
use crate::artifacts::refs::ref_name::RefName;
use crate::artifacts::refs::ref_target::RefTarget;
use crate::config::EngineConfig;
use crate::errors::{IoContext, Result};
use std::fs;
use std::path::Path;

impl Repository {
    /// Create (or reopen) a repository at `path` with the default configuration
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        Self::init_with_config(path, EngineConfig::default())
    }

    /// Create the `.git` layout and point HEAD at the default branch
    ///
    /// Running it on an existing repository keeps its HEAD and objects.
    pub fn init_with_config(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let path = path.as_ref();
        fs::create_dir_all(path)
            .with_io_context(|| format!("Failed to create {}", path.display()))?;
        let path = path
            .canonicalize()
            .with_io_context(|| format!("Unable to resolve {}", path.display()))?;

        let repository = Self::assemble(path, config);

        fs::create_dir_all(repository.database().objects_path())
            .io_context("Failed to create .git/objects directory")?;
        fs::create_dir_all(repository.refs().heads_path())
            .io_context("Failed to create .git/refs/heads directory")?;
        fs::create_dir_all(repository.refs().refs_path().join("tags"))
            .io_context("Failed to create .git/refs/tags directory")?;

        if !repository.refs().head_path().exists() {
            let branch = RefName::branch(&repository.config().default_branch)?;
            repository.refs().set_head(RefTarget::Symbolic(branch))?;
        }

        repository.lock_index().rehydrate()?;

        tracing::info!(path = %repository.path().display(), "initialized repository");
        Ok(repository)
    }
}
