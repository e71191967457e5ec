use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::refs::Refs;
use crate::areas::workspace::{GIT_DIR, Workspace};
use crate::artifacts::objects::object_id::ObjectId;
use crate::config::EngineConfig;
use crate::errors::{Error, IoContext, Result};
use parking_lot::{Mutex, MutexGuard};
use std::path::{Path, PathBuf};

pub const INDEX_FILE: &str = "index";
pub const OBJECTS_DIR: &str = "objects";

/// An engine instance bound to one working tree and its `.git` directory
///
/// Constructed with [`Repository::init`] or [`Repository::open`] and released
/// with [`Repository::close`] (or by dropping it). All operations take `&self`;
/// the instance can be shared between threads.
#[derive(Debug)]
pub struct Repository {
    path: Box<Path>,
    git_dir: Box<Path>,
    config: EngineConfig,
    index: Mutex<Index>,
    database: Database,
    workspace: Workspace,
    refs: Refs,
}

impl Repository {
    /// Open an existing repository with the default configuration
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, EngineConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let path = path
            .as_ref()
            .canonicalize()
            .with_io_context(|| format!("Unable to resolve {}", path.as_ref().display()))?;
        if !path.join(GIT_DIR).is_dir() {
            return Err(Error::not_found(format!("repository at {}", path.display())));
        }

        let repository = Self::assemble(path, config);
        repository.index.lock().rehydrate()?;

        tracing::info!(path = %repository.path.display(), "opened repository");
        Ok(repository)
    }

    pub(crate) fn assemble(path: PathBuf, config: EngineConfig) -> Self {
        let git_dir = path.join(GIT_DIR);

        Repository {
            index: Mutex::new(Index::new(git_dir.join(INDEX_FILE))),
            database: Database::new(git_dir.join(OBJECTS_DIR)),
            workspace: Workspace::new(path.clone()),
            refs: Refs::with_max_depth(git_dir.clone(), config.max_symref_depth),
            git_dir: git_dir.into_boxed_path(),
            path: path.into_boxed_path(),
            config,
        }
    }

    /// Release the instance
    pub fn close(self) {
        tracing::debug!(path = %self.path.display(), "closed repository");
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.git_dir.join(INDEX_FILE)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Exclusive access to the in-memory index
    pub fn lock_index(&self) -> MutexGuard<'_, Index> {
        self.index.lock()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    /// Tree recorded by the commit HEAD points at; `None` while HEAD is unborn
    pub fn head_tree(&self) -> Result<Option<ObjectId>> {
        self.refs
            .read_head()?
            .map(|oid| self.database.peel_to_tree(&oid))
            .transpose()
    }
}
