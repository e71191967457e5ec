mod common;

use common::{Sandbox, committed_sandbox, sandbox};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::path::{Path, PathBuf};
use xit::artifacts::diff::delta::{DeltaRecord, DeltaStatus, DiffFlags, FileMap, apply_deltas};
use xit::artifacts::diff::options::DiffOptions;
use xit::artifacts::diff::tree_diff::{DiffResult, flatten_tree};
use xit::artifacts::objects::object_id::ObjectId;
use xit::{CancellationToken, Error};

const GUIDE: &str = "intro\nsetup\ninstall\nconfigure\nrun\ntest\ndeploy\nmonitor\nupgrade\nretire\n";

fn diff(sandbox: &Sandbox, old: Option<&ObjectId>, new: Option<&ObjectId>, options: DiffOptions) -> DiffResult {
    sandbox
        .repository
        .diff(old, new, options, &CancellationToken::new())
        .expect("diff failed")
}

fn summary(result: &DiffResult) -> Vec<(DeltaStatus, PathBuf)> {
    result
        .deltas
        .iter()
        .map(|delta| (delta.status, delta.path().to_path_buf()))
        .collect()
}

#[rstest]
fn file_level_changes_are_classified(committed_sandbox: Sandbox) {
    let sandbox = committed_sandbox;
    let before = sandbox.head().unwrap();

    sandbox.write("1.txt", "one, edited");
    sandbox.remove("a/2.txt");
    sandbox.write("new.txt", "fresh");
    let after = sandbox.commit_all("Second commit");

    let result = diff(&sandbox, Some(&before), Some(&after), DiffOptions::empty());

    assert_eq!(
        summary(&result),
        vec![
            (DeltaStatus::Modified, PathBuf::from("1.txt")),
            (DeltaStatus::Deleted, PathBuf::from("a/2.txt")),
            (DeltaStatus::Added, PathBuf::from("new.txt")),
        ]
    );
    assert!(result.failures.is_empty());
    assert!(result.deltas.iter().all(|delta| delta.flags.contains(DiffFlags::NOT_BINARY)));

    let deleted = result.get(Path::new("a/2.txt")).unwrap();
    assert!(!deleted.flags.contains(DiffFlags::EXISTS));
    assert!(deleted.new_entry.is_none());
}

#[rstest]
fn missing_sides_stand_for_the_empty_tree(committed_sandbox: Sandbox) {
    let sandbox = committed_sandbox;
    let head = sandbox.head().unwrap();

    let added = diff(&sandbox, None, Some(&head), DiffOptions::empty());
    let deleted = diff(&sandbox, Some(&head), None, DiffOptions::empty());

    assert_eq!(
        summary(&added),
        vec![
            (DeltaStatus::Added, PathBuf::from("1.txt")),
            (DeltaStatus::Added, PathBuf::from("a/2.txt")),
            (DeltaStatus::Added, PathBuf::from("a/b/3.txt")),
        ]
    );
    assert!(deleted.deltas.iter().all(|delta| delta.status == DeltaStatus::Deleted));
    assert_eq!(deleted.deltas.len(), 3);
}

#[rstest]
fn identical_trees_have_no_deltas(committed_sandbox: Sandbox) {
    let head = committed_sandbox.head().unwrap();

    let result = diff(&committed_sandbox, Some(&head), Some(&head), DiffOptions::all() - DiffOptions::FORCE_BINARY);

    assert!(result.is_empty());
}

#[rstest]
fn reverse_swaps_the_sides(committed_sandbox: Sandbox) {
    let sandbox = committed_sandbox;
    let before = sandbox.head().unwrap();
    sandbox.write("a/b/3.txt", "three, edited");
    sandbox.write("extra.txt", "extra");
    let after = sandbox.commit_all("Second commit");

    let reversed = diff(&sandbox, Some(&before), Some(&after), DiffOptions::REVERSE);
    let backwards = diff(&sandbox, Some(&after), Some(&before), DiffOptions::empty());

    assert_eq!(reversed, backwards);
    assert_eq!(reversed.get(Path::new("extra.txt")).unwrap().status, DeltaStatus::Deleted);
}

#[rstest]
fn inverting_matches_the_backwards_diff(committed_sandbox: Sandbox) {
    let sandbox = committed_sandbox;
    let before = sandbox.head().unwrap();
    sandbox.write("1.txt", "one, edited");
    sandbox.remove("a/b/3.txt");
    sandbox.write("a/b/4.txt", "four");
    let after = sandbox.commit_all("Second commit");

    let forward = diff(&sandbox, Some(&before), Some(&after), DiffOptions::empty());
    let backwards = diff(&sandbox, Some(&after), Some(&before), DiffOptions::empty());

    assert_eq!(forward.inverted(), backwards.deltas);
    let twice = forward.deltas.iter().map(|delta| delta.invert().invert()).collect::<Vec<DeltaRecord>>();
    assert_eq!(twice, forward.deltas);
}

fn files_at(sandbox: &Sandbox, commit: &ObjectId) -> FileMap {
    let database = sandbox.repository.database();
    let tree = database.peel_to_tree(commit).unwrap();
    let (files, failures) = flatten_tree(database, &tree, &CancellationToken::new()).unwrap();
    assert!(failures.is_empty());
    files
}

#[rstest]
fn deltas_patch_one_side_into_the_other(committed_sandbox: Sandbox) {
    let sandbox = committed_sandbox;
    let before = sandbox.head().unwrap();
    sandbox.write("docs/guide.md", GUIDE);
    let middle = sandbox.commit_all("Guide");
    sandbox.remove("docs/guide.md");
    sandbox.write("manual/guide.md", &GUIDE.replace("deploy", "ship"));
    sandbox.write("1.txt", "one, edited");
    sandbox.remove("a/2.txt");
    sandbox.write("a/b/copy.txt", "three");
    let after = sandbox.commit_all("Reshuffle");

    let old_files = files_at(&sandbox, &middle);
    let new_files = files_at(&sandbox, &after);
    let result = diff(&sandbox, Some(&middle), Some(&after), DiffOptions::FIND_COPIES);

    let mut patched = old_files.clone();
    apply_deltas(&mut patched, &result.deltas);
    assert_eq!(patched, new_files);

    let mut unpatched = new_files;
    apply_deltas(&mut unpatched, &result.inverted());
    assert_eq!(unpatched, old_files);
    assert_ne!(files_at(&sandbox, &before), old_files);
}

#[rstest]
fn file_replaced_by_directory_splits_into_delete_and_add(sandbox: Sandbox) {
    sandbox.write("node", "a file");
    let before = sandbox.commit_all("File");
    sandbox.remove("node");
    sandbox.write("node/child.txt", "now a directory");
    let after = sandbox.commit_all("Directory");

    let result = diff(&sandbox, Some(&before), Some(&after), DiffOptions::empty());

    assert_eq!(
        summary(&result),
        vec![
            (DeltaStatus::Deleted, PathBuf::from("node")),
            (DeltaStatus::Added, PathBuf::from("node/child.txt")),
        ]
    );
}

#[cfg(unix)]
#[rstest]
fn file_replaced_by_symlink_is_a_type_change(sandbox: Sandbox) {
    sandbox.write("target.txt", "target");
    sandbox.write("link", "plain file");
    let before = sandbox.commit_all("File");
    sandbox.remove("link");
    std::os::unix::fs::symlink("target.txt", sandbox.path("link")).unwrap();
    let after = sandbox.commit_all("Symlink");

    let split = diff(&sandbox, Some(&before), Some(&after), DiffOptions::empty());
    let combined = diff(&sandbox, Some(&before), Some(&after), DiffOptions::INCLUDE_TYPECHANGE);

    assert_eq!(
        summary(&split),
        vec![
            (DeltaStatus::Deleted, PathBuf::from("link")),
            (DeltaStatus::Added, PathBuf::from("link")),
        ]
    );
    assert_eq!(summary(&combined), vec![(DeltaStatus::TypeChanged, PathBuf::from("link"))]);
}

#[rstest]
fn moved_files_pair_into_renames(sandbox: Sandbox) {
    sandbox.write("docs/guide.md", GUIDE);
    sandbox.write("docs/notes.md", "short note\n");
    let before = sandbox.commit_all("Docs");

    sandbox.remove("docs/guide.md");
    sandbox.write("manual/guide.md", &GUIDE.replace("deploy", "ship"));
    let after = sandbox.commit_all("Move guide");

    let plain = diff(&sandbox, Some(&before), Some(&after), DiffOptions::empty());
    let renamed = diff(&sandbox, Some(&before), Some(&after), DiffOptions::FIND_RENAMES);

    assert_eq!(plain.deltas.len(), 2);
    assert_eq!(renamed.deltas.len(), 1);
    let rename = &renamed.deltas[0];
    assert_eq!(rename.status, DeltaStatus::Renamed);
    assert_eq!(rename.old_path, PathBuf::from("docs/guide.md"));
    assert_eq!(rename.new_path, PathBuf::from("manual/guide.md"));
    assert_eq!(rename.similarity, Some(90));
}

#[rstest]
fn rename_threshold_rejects_weak_pairs(sandbox: Sandbox) {
    sandbox.write("old.txt", "alpha\nbeta\ngamma\ndelta\n");
    let before = sandbox.commit_all("Old");
    sandbox.remove("old.txt");
    sandbox.write("new.txt", "one\ntwo\nthree\ndelta\n");
    let after = sandbox.commit_all("New");

    let result = diff(&sandbox, Some(&before), Some(&after), DiffOptions::FIND_RENAMES);

    assert_eq!(
        summary(&result),
        vec![
            (DeltaStatus::Added, PathBuf::from("new.txt")),
            (DeltaStatus::Deleted, PathBuf::from("old.txt")),
        ]
    );
}

#[rstest]
fn duplicates_of_surviving_files_are_copies(committed_sandbox: Sandbox) {
    let sandbox = committed_sandbox;
    let before = sandbox.head().unwrap();
    sandbox.write("a/b/copy.txt", "three");
    let after = sandbox.commit_all("Copy");

    let without = diff(&sandbox, Some(&before), Some(&after), DiffOptions::FIND_RENAMES);
    let with = diff(&sandbox, Some(&before), Some(&after), DiffOptions::FIND_COPIES);

    assert_eq!(summary(&without), vec![(DeltaStatus::Added, PathBuf::from("a/b/copy.txt"))]);
    let copy = &with.deltas[0];
    assert_eq!(copy.status, DeltaStatus::Copied);
    assert_eq!(copy.old_path, PathBuf::from("a/b/3.txt"));
    assert_eq!(copy.similarity, Some(100));

    let inverse = copy.invert();
    assert_eq!(inverse.status, DeltaStatus::Deleted);
    assert_eq!(inverse.path(), Path::new("a/b/copy.txt"));
}

#[rstest]
fn binary_content_is_flagged(sandbox: Sandbox) {
    sandbox.write("readme.txt", "plain text\n");
    let before = sandbox.commit_all("Text");
    sandbox.write("image.bin", "PNG\0\u{1}\u{2}\u{3}");
    let after = sandbox.commit_all("Binary");

    let detected = diff(&sandbox, Some(&before), Some(&after), DiffOptions::empty());
    let forced = diff(&sandbox, Some(&before), Some(&after), DiffOptions::FORCE_TEXT);
    let skipped = diff(&sandbox, Some(&before), Some(&after), DiffOptions::SKIP_BINARY_CHECK);

    let path = Path::new("image.bin");
    assert!(detected.get(path).unwrap().is_binary());
    assert!(forced.get(path).unwrap().flags.contains(DiffFlags::NOT_BINARY));
    assert!(
        !skipped
            .get(path)
            .unwrap()
            .flags
            .intersects(DiffFlags::BINARY | DiffFlags::NOT_BINARY)
    );
}

#[rstest]
fn contradictory_options_are_rejected(committed_sandbox: Sandbox) {
    let head = committed_sandbox.head().unwrap();

    let result = committed_sandbox.repository.diff(
        Some(&head),
        None,
        DiffOptions::FORCE_TEXT | DiffOptions::FORCE_BINARY,
        &CancellationToken::new(),
    );

    assert!(matches!(result, Err(Error::InvalidArgument(_))));
    assert!(matches!(DiffOptions::try_from_bits(1 << 30), Err(Error::InvalidArgument(_))));
}

#[rstest]
fn cancelled_diffs_stop(committed_sandbox: Sandbox) {
    let head = committed_sandbox.head().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = committed_sandbox
        .repository
        .diff(None, Some(&head), DiffOptions::empty(), &cancel);

    assert!(matches!(result, Err(Error::Cancelled)));
}
