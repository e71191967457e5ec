mod common;

use common::{Sandbox, author, committed_sandbox, repository_dir, sandbox};
use assert_fs::TempDir;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::path::Path;
use xit::artifacts::checkout::strategy::CheckoutStrategy;
use xit::artifacts::refs::ref_name::RefName;
use xit::artifacts::refs::ref_target::RefTarget;
use xit::artifacts::status::options::{StatusOptions, StatusShow};
use xit::artifacts::status::status_entry::StatusFlags;
use xit::artifacts::status::status_info::StatusReport;
use xit::{CancellationToken, EngineConfig, Error, Repository};

fn status(sandbox: &Sandbox) -> StatusReport {
    sandbox
        .repository
        .status(
            StatusOptions::INCLUDE_UNTRACKED | StatusOptions::RECURSE_UNTRACKED_DIRS,
            StatusShow::IndexAndWorkdir,
            &CancellationToken::new(),
        )
        .unwrap()
}

fn staged_paths(sandbox: &Sandbox) -> Vec<String> {
    sandbox
        .repository
        .lock_index()
        .merged_entries()
        .map(|entry| entry.name.display().to_string())
        .collect()
}

/// Leaves `1.txt` conflicted between a local edit and a commit on `main`
fn conflict_on_one(sandbox: &Sandbox) {
    let cancel = CancellationToken::new();
    let base = sandbox.head().unwrap();
    sandbox.write("1.txt", "one, from the other line");
    let theirs = sandbox.commit_all("Theirs");
    sandbox
        .repository
        .detach_to(&base, CheckoutStrategy::FORCE, &cancel)
        .unwrap();
    sandbox.write("1.txt", "one, edited locally");
    sandbox
        .repository
        .checkout(&theirs, CheckoutStrategy::ALLOW_CONFLICTS, &cancel)
        .unwrap()
        .apply(&cancel)
        .unwrap();
}

#[rstest]
fn init_lays_out_an_empty_repository(repository_dir: TempDir) -> Result<(), Box<dyn std::error::Error>> {
    let repository = Repository::init(repository_dir.path())?;
    let git_dir = repository.git_dir().to_path_buf();

    assert!(git_dir.join("objects").is_dir());
    assert!(git_dir.join("refs/heads").is_dir());
    assert!(git_dir.join("refs/tags").is_dir());
    assert_eq!(
        std::fs::read_to_string(git_dir.join("HEAD"))?,
        "ref: refs/heads/main\n"
    );
    assert!(repository.lock_index().is_empty());
    repository.close();

    let reopened = Repository::open(repository_dir.path())?;
    assert_eq!(reopened.refs().read_head()?, None);
    Ok(())
}

#[rstest]
fn init_honours_the_default_branch(repository_dir: TempDir) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig {
        default_branch: "trunk".to_string(),
        ..EngineConfig::default()
    };

    let repository = Repository::init_with_config(repository_dir.path(), config)?;

    assert_eq!(repository.refs().current_branch()?, Some(RefName::branch("trunk")?));
    Ok(())
}

#[rstest]
fn reinit_keeps_history(committed_sandbox: Sandbox) -> Result<(), Box<dyn std::error::Error>> {
    let head = committed_sandbox.head();

    let repository = Repository::init(committed_sandbox.dir.path())?;

    assert_eq!(repository.refs().read_head()?, head);
    assert_eq!(repository.lock_index().len(), 3);
    Ok(())
}

#[rstest]
fn adding_stages_files_and_prunes_vanished_ones(committed_sandbox: Sandbox) {
    let sandbox = committed_sandbox;
    sandbox.remove("a/b/3.txt");
    sandbox.write("a/new.txt", "new");

    sandbox.repository.add("a").unwrap();

    assert_eq!(staged_paths(&sandbox), vec!["1.txt", "a/2.txt", "a/new.txt"]);
    let report = status(&sandbox);
    assert_eq!(report.flags("a/b/3.txt"), StatusFlags::INDEX_DELETED);
    assert_eq!(report.flags("a/new.txt"), StatusFlags::INDEX_NEW);
}

#[rstest]
fn adding_skips_ignored_files(sandbox: Sandbox) {
    sandbox.write(".gitignore", "*.log\n");
    sandbox.write("debug.log", "noise");
    sandbox.write("main.rs", "fn main() {}");

    sandbox.repository.add_all().unwrap();

    assert_eq!(staged_paths(&sandbox), vec![".gitignore", "main.rs"]);
}

#[rstest]
fn adding_an_unknown_path_fails(sandbox: Sandbox) {
    let result = sandbox.repository.add("nowhere.txt");

    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[cfg(unix)]
#[rstest]
fn executable_bit_is_staged(sandbox: Sandbox) {
    use xit::artifacts::index::entry_mode::EntryMode;

    sandbox.write("run.sh", "#!/bin/sh\n");
    sandbox.make_executable("run.sh");

    sandbox.repository.add("run.sh").unwrap();

    let index = sandbox.repository.lock_index();
    let entry = index.entry_by_path(Path::new("run.sh")).unwrap();
    assert_eq!(entry.metadata.mode, EntryMode::Executable);
}

#[rstest]
fn commits_chain_onto_head(sandbox: Sandbox) -> Result<(), Box<dyn std::error::Error>> {
    sandbox.write("1.txt", "one");
    sandbox.repository.add_all()?;
    let root = sandbox.repository.commit("  Initial commit\n\n", Some(author()))?;

    sandbox.write("2.txt", "two");
    sandbox.repository.add_all()?;
    let tree = sandbox.repository.write_tree()?;
    let second = sandbox.repository.commit("Second", Some(author()))?;

    let database = sandbox.repository.database();
    let root_commit = database.parse_object_as_commit(&root)?.unwrap();
    let second_commit = database.parse_object_as_commit(&second)?.unwrap();

    assert_eq!(root_commit.parent(), None);
    assert_eq!(root_commit.message(), "Initial commit");
    assert_eq!(root_commit.author(), &author());
    assert_eq!(second_commit.parent(), Some(&root));
    assert_eq!(second_commit.tree_oid(), &tree);
    assert_eq!(sandbox.head(), Some(second));
    assert_eq!(
        sandbox.repository.refs().read(&RefName::branch("main")?)?,
        Some(RefTarget::Direct(second))
    );
    Ok(())
}

#[rstest]
fn unstaging_restores_head_entries(committed_sandbox: Sandbox) {
    let sandbox = committed_sandbox;
    sandbox.write("1.txt", "one, staged");
    sandbox.write("extra.txt", "extra");
    sandbox.repository.add_all().unwrap();

    sandbox.repository.unstage("1.txt").unwrap();
    let report = status(&sandbox);
    assert_eq!(report.flags("1.txt"), StatusFlags::WT_MODIFIED);
    assert_eq!(report.flags("extra.txt"), StatusFlags::INDEX_NEW);

    sandbox.repository.unstage_all().unwrap();
    let report = status(&sandbox);
    assert_eq!(report.flags("extra.txt"), StatusFlags::WT_NEW);
    assert_eq!(sandbox.read("1.txt"), "one, staged");
}

#[rstest]
fn unstaging_brings_back_deleted_entries(committed_sandbox: Sandbox) {
    let sandbox = committed_sandbox;
    sandbox.remove("a/2.txt");
    sandbox.repository.add_all().unwrap();

    sandbox.repository.unstage("a").unwrap();

    assert_eq!(status(&sandbox).flags("a/2.txt"), StatusFlags::WT_DELETED);
}

#[rstest]
fn reverting_discards_working_tree_changes(committed_sandbox: Sandbox) {
    let sandbox = committed_sandbox;
    sandbox.write("1.txt", "one, edited");
    sandbox.remove("a/2.txt");
    sandbox.write("scratch.txt", "scratch");

    sandbox.repository.revert("1.txt").unwrap();
    sandbox.repository.revert("a/2.txt").unwrap();
    sandbox.repository.revert("scratch.txt").unwrap();

    assert_eq!(sandbox.read("1.txt"), "one");
    assert_eq!(sandbox.read("a/2.txt"), "two");
    assert!(!sandbox.exists("scratch.txt"));
    assert!(status(&sandbox).is_clean());
    assert!(matches!(
        sandbox.repository.revert("ghost.txt"),
        Err(Error::NotFound(_))
    ));
}

#[rstest]
fn conflicts_block_tree_writes_until_resolved(committed_sandbox: Sandbox) {
    let sandbox = committed_sandbox;
    conflict_on_one(&sandbox);

    let write = sandbox.repository.write_tree();
    let commit = sandbox.repository.commit("Too early", Some(author()));
    let revert = sandbox.repository.revert("1.txt");

    assert!(matches!(
        &write,
        Err(Error::Conflict { paths, .. }) if paths == &[Path::new("1.txt").to_path_buf()]
    ));
    assert!(matches!(commit, Err(Error::Conflict { .. })));
    assert!(matches!(revert, Err(Error::Conflict { .. })));

    sandbox.write("1.txt", "one, merged by hand");
    sandbox.repository.mark_resolved("1.txt").unwrap();

    assert!(!sandbox.repository.lock_index().has_conflicts());
    assert!(sandbox.repository.write_tree().is_ok());
    assert_eq!(status(&sandbox).flags("1.txt"), StatusFlags::INDEX_MODIFIED);
}

#[rstest]
fn resolving_a_deleted_conflict_drops_the_path(committed_sandbox: Sandbox) {
    let sandbox = committed_sandbox;
    conflict_on_one(&sandbox);
    sandbox.remove("1.txt");

    sandbox.repository.mark_resolved("1.txt").unwrap();

    let index = sandbox.repository.lock_index();
    assert!(index.stages(Path::new("1.txt")).is_empty());
}

#[rstest]
fn resolving_a_clean_path_is_rejected(committed_sandbox: Sandbox) {
    let result = committed_sandbox.repository.mark_resolved("1.txt");

    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}
