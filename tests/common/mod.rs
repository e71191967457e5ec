#![allow(dead_code)]

use assert_fs::TempDir;
use rstest::fixture;
use std::path::{Path, PathBuf};
use xit::Repository;
use xit::artifacts::objects::commit::Author;
use xit::artifacts::objects::object_id::ObjectId;
use xit::artifacts::refs::ref_name::RefName;
use xit::artifacts::refs::ref_target::RefTarget;

/// Route engine logs to the test output when `RUST_LOG` is set
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn author() -> Author {
    let timestamp = chrono::DateTime::parse_from_rfc3339("2024-05-01T12:00:00+02:00")
        .expect("valid timestamp");
    Author::new_with_timestamp("Ada Lovelace", "ada@example.com", timestamp)
}

/// A repository in a temporary directory plus helpers to shape its working tree
pub struct Sandbox {
    pub dir: TempDir,
    pub repository: Repository,
}

impl Sandbox {
    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative)).expect("Failed to read file")
    }

    pub fn remove(&self, relative: &str) {
        let path = self.path(relative);
        if path.is_dir() {
            std::fs::remove_dir_all(path).expect("Failed to remove directory");
        } else {
            std::fs::remove_file(path).expect("Failed to remove file");
        }
    }

    pub fn exists(&self, relative: &str) -> bool {
        std::fs::symlink_metadata(self.path(relative)).is_ok()
    }

    #[cfg(unix)]
    pub fn make_executable(&self, relative: &str) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(self.path(relative), std::fs::Permissions::from_mode(0o755))
            .expect("Failed to set permissions");
    }

    /// Stage everything and commit it
    pub fn commit_all(&self, message: &str) -> ObjectId {
        self.repository.add_all().expect("Failed to stage files");
        self.repository
            .commit(message, Some(author()))
            .expect("Failed to commit")
    }

    pub fn create_branch(&self, name: &str, target: ObjectId) {
        let branch = RefName::branch(name).expect("valid branch name");
        self.repository
            .refs()
            .update(&branch, RefTarget::Direct(target), None)
            .expect("Failed to create branch");
    }

    pub fn head(&self) -> Option<ObjectId> {
        self.repository.refs().read_head().expect("Failed to read HEAD")
    }
}

#[fixture]
pub fn repository_dir() -> TempDir {
    init_tracing();
    TempDir::new().expect("Failed to create temp dir")
}

#[fixture]
pub fn sandbox(repository_dir: TempDir) -> Sandbox {
    let repository = Repository::init(repository_dir.path()).expect("Failed to init repository");
    Sandbox {
        dir: repository_dir,
        repository,
    }
}

/// Repository with one commit holding `1.txt`, `a/2.txt` and `a/b/3.txt`
#[fixture]
pub fn committed_sandbox(sandbox: Sandbox) -> Sandbox {
    sandbox.write("1.txt", "one");
    sandbox.write("a/2.txt", "two");
    sandbox.write("a/b/3.txt", "three");
    sandbox.commit_all("Initial commit");
    sandbox
}

pub fn paths(entries: &[&Path]) -> Vec<String> {
    entries
        .iter()
        .map(|path| path.display().to_string())
        .collect()
}
