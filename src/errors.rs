//! Engine error taxonomy
//!
//! Every public operation returns [`Result`]. Store-level failures are surfaced
//! directly; scans (diff, status) record per-path failures in their result sets
//! instead of aborting.

use std::path::PathBuf;

/// Errors surfaced by the engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An object or reference is absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Stored bytes failed digest verification or could not be decoded
    #[error("corrupt object {id}: {reason}")]
    Corrupt { id: String, reason: String },

    /// A reference compare-and-swap mismatch, or a checkout collision with local changes
    #[error("conflict: {message}")]
    Conflict {
        message: String,
        paths: Vec<PathBuf>,
    },

    /// Symbolic reference indirection exceeded the configured bound
    #[error("symbolic reference loop while resolving {name} (depth {depth})")]
    SymbolicLoop { name: String, depth: usize },

    /// Cooperative cancellation was observed
    #[error("operation cancelled")]
    Cancelled,

    /// Malformed names, unknown option bits, unsupported object kinds
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Underlying storage medium error
    #[error("I/O failure: {0:#}")]
    IoFailure(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Error::NotFound(what.to_string())
    }

    pub fn invalid(message: impl std::fmt::Display) -> Self {
        Error::InvalidArgument(message.to_string())
    }

    pub fn corrupt(id: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Error::Corrupt {
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn conflict(message: impl std::fmt::Display, paths: Vec<PathBuf>) -> Self {
        Error::Conflict {
            message: message.to_string(),
            paths,
        }
    }

    /// Paths attached to a conflict, empty for every other variant
    pub fn conflict_paths(&self) -> &[PathBuf] {
        match self {
            Error::Conflict { paths, .. } => paths,
            _ => &[],
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IoFailure(error.into())
    }
}

impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        Error::IoFailure(error)
    }
}

/// Lift fallible I/O into [`Error::IoFailure`] while attaching context
pub trait IoContext<T> {
    fn io_context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static;

    fn with_io_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> IoContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn io_context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::IoFailure(anyhow::Error::new(e).context(context)))
    }

    fn with_io_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::IoFailure(anyhow::Error::new(e).context(f())))
    }
}

/// A single path that could not be processed during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl PathFailure {
    pub fn new(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        PathFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
