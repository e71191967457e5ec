mod common;

use common::{Sandbox, author, committed_sandbox, sandbox};
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use std::path::{Path, PathBuf};
use xit::artifacts::checkout::conflict::ConflictType;
use xit::artifacts::checkout::migration::{PathState, PlanAction};
use xit::artifacts::checkout::strategy::{CheckoutStrategy, SubmoduleRecurse};
use xit::artifacts::objects::object_id::ObjectId;
use xit::artifacts::refs::ref_name::RefName;
use xit::artifacts::status::options::{StatusOptions, StatusShow};
use xit::artifacts::status::status_entry::StatusFlags;
use xit::{CancellationToken, Error, Repository};

/// Two commits on `main`, with HEAD detached at the first one
///
/// The second commit edits `1.txt`, deletes `a/2.txt` and adds `c/d/4.txt`.
struct Lines {
    sandbox: Sandbox,
    base: ObjectId,
    next: ObjectId,
}

#[fixture]
fn lines(committed_sandbox: Sandbox) -> Lines {
    let sandbox = committed_sandbox;
    let base = sandbox.head().unwrap();

    sandbox.write("1.txt", "one, from the other line");
    sandbox.remove("a/2.txt");
    sandbox.write("c/d/4.txt", "four");
    let next = sandbox.commit_all("Next");

    sandbox
        .repository
        .detach_to(&base, CheckoutStrategy::FORCE, &CancellationToken::new())
        .unwrap();

    Lines {
        sandbox,
        base,
        next,
    }
}

fn is_clean(sandbox: &Sandbox) -> bool {
    sandbox
        .repository
        .status(
            StatusOptions::INCLUDE_UNTRACKED,
            StatusShow::IndexAndWorkdir,
            &CancellationToken::new(),
        )
        .unwrap()
        .is_clean()
}

#[rstest]
fn detaching_rewinds_the_working_tree(lines: Lines) {
    let sandbox = &lines.sandbox;

    assert_eq!(sandbox.read("1.txt"), "one");
    assert_eq!(sandbox.read("a/2.txt"), "two");
    assert!(!sandbox.exists("c"));
    assert_eq!(sandbox.head(), Some(lines.base));
    assert_eq!(sandbox.repository.refs().current_branch().unwrap(), None);
    assert!(is_clean(sandbox));
}

#[rstest]
fn switching_branches_moves_files_and_head(lines: Lines) {
    let sandbox = &lines.sandbox;
    let cancel = CancellationToken::new();

    let outcome = sandbox
        .repository
        .switch_to("main", CheckoutStrategy::SAFE, &cancel)
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.state("1.txt"), PathState::Applied);
    assert_eq!(outcome.state("a/2.txt"), PathState::Applied);
    assert_eq!(outcome.state("c/d/4.txt"), PathState::Applied);
    assert_eq!(outcome.state("a/b/3.txt"), PathState::Unchanged);

    assert_eq!(sandbox.read("1.txt"), "one, from the other line");
    assert!(!sandbox.exists("a/2.txt"));
    assert_eq!(sandbox.read("c/d/4.txt"), "four");
    assert_eq!(sandbox.head(), Some(lines.next));
    assert_eq!(
        sandbox.repository.refs().current_branch().unwrap(),
        Some(RefName::branch("main").unwrap())
    );
    assert!(is_clean(sandbox));
}

#[rstest]
fn emptied_directories_are_removed(lines: Lines) {
    let sandbox = &lines.sandbox;
    let cancel = CancellationToken::new();
    sandbox
        .repository
        .detach_to(&lines.next, CheckoutStrategy::SAFE, &cancel)
        .unwrap();

    sandbox
        .repository
        .detach_to(&lines.base, CheckoutStrategy::SAFE, &cancel)
        .unwrap();

    assert!(!sandbox.exists("c"));
    assert!(sandbox.exists("a/b/3.txt"));
}

#[rstest]
fn plans_order_deletions_before_writes(lines: Lines) {
    let sandbox = &lines.sandbox;
    let cancel = CancellationToken::new();

    let plan = sandbox
        .repository
        .checkout(&lines.next, CheckoutStrategy::SAFE, &cancel)
        .unwrap();

    assert!(!plan.is_rejected());
    assert_eq!(plan.state("1.txt"), PathState::Planned);
    assert_eq!(
        plan.actions(),
        &[
            PlanAction::DeleteFile("a/2.txt".into()),
            PlanAction::RemoveDirectory("a".into()),
            PlanAction::CreateDirectory("c".into()),
            PlanAction::CreateDirectory("c/d".into()),
            plan.actions()[4].clone(),
            plan.actions()[5].clone(),
        ]
    );
    let written = plan.actions()[4..]
        .iter()
        .map(|action| action.path().to_path_buf())
        .collect::<Vec<_>>();
    assert_eq!(written, vec![PathBuf::from("1.txt"), PathBuf::from("c/d/4.txt")]);
}

#[rstest]
fn safe_checkout_refuses_to_lose_local_edits(lines: Lines) {
    let sandbox = &lines.sandbox;
    let cancel = CancellationToken::new();
    sandbox.write("1.txt", "one, edited locally");

    let plan = sandbox
        .repository
        .checkout(&lines.next, CheckoutStrategy::SAFE, &cancel)
        .unwrap();

    assert!(plan.is_rejected());
    assert_eq!(plan.conflicts().len(), 1);
    assert_eq!(plan.conflicts()[0].path, Path::new("1.txt"));
    assert_eq!(plan.conflicts()[0].kind, ConflictType::StaleFile);
    assert_eq!(plan.state("1.txt"), PathState::Conflicted);

    let error = plan.apply(&cancel).unwrap_err();
    assert!(matches!(error, Error::Conflict { .. }));
    assert_eq!(error.conflict_paths(), &[Path::new("1.txt").to_path_buf()]);

    assert_eq!(sandbox.read("1.txt"), "one, edited locally");
    assert!(sandbox.exists("a/2.txt"));
    assert!(!sandbox.exists("c"));
    assert_eq!(sandbox.head(), Some(lines.base));
}

#[rstest]
fn switching_stops_before_moving_head_on_conflicts(lines: Lines) {
    let sandbox = &lines.sandbox;
    sandbox.write("c/d/4.txt", "an untracked file in the way");

    let result = sandbox
        .repository
        .switch_to("main", CheckoutStrategy::SAFE, &CancellationToken::new());

    assert!(matches!(result, Err(Error::Conflict { .. })));
    assert_eq!(sandbox.repository.refs().current_branch().unwrap(), None);
    assert_eq!(sandbox.read("c/d/4.txt"), "an untracked file in the way");
}

#[rstest]
fn untracked_file_matching_the_target_is_not_a_conflict(lines: Lines) {
    let sandbox = &lines.sandbox;
    let cancel = CancellationToken::new();
    sandbox.write("c/d/4.txt", "four");

    let plan = sandbox
        .repository
        .checkout(&lines.next, CheckoutStrategy::SAFE, &cancel)
        .unwrap();

    assert!(!plan.is_rejected());
}

#[rstest]
fn untracked_file_blocking_a_directory_is_reported(lines: Lines) {
    let sandbox = &lines.sandbox;
    sandbox.write("c", "a file where a directory should go");

    let plan = sandbox
        .repository
        .checkout(&lines.next, CheckoutStrategy::SAFE, &CancellationToken::new())
        .unwrap();

    assert!(plan.is_rejected());
    assert_eq!(plan.conflicts()[0].path, Path::new("c"));
    assert_eq!(plan.conflicts()[0].kind, ConflictType::UntrackedOverwritten);
}

#[rstest]
fn local_edits_to_untouched_files_are_carried_over(lines: Lines) {
    let sandbox = &lines.sandbox;
    sandbox.write("a/b/3.txt", "three, edited locally");

    sandbox
        .repository
        .switch_to("main", CheckoutStrategy::SAFE, &CancellationToken::new())
        .unwrap();

    assert_eq!(sandbox.read("a/b/3.txt"), "three, edited locally");
    assert_eq!(sandbox.read("1.txt"), "one, from the other line");
}

#[rstest]
fn force_discards_local_state(lines: Lines) {
    let sandbox = &lines.sandbox;
    sandbox.write("1.txt", "one, edited locally");
    sandbox.remove("a/b/3.txt");

    let outcome = sandbox
        .repository
        .detach_to(&lines.next, CheckoutStrategy::FORCE, &CancellationToken::new())
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(sandbox.read("1.txt"), "one, from the other line");
    assert_eq!(sandbox.read("a/b/3.txt"), "three");
    assert!(is_clean(sandbox));
}

#[rstest]
fn missing_files_are_recreated_on_request(lines: Lines) {
    let sandbox = &lines.sandbox;
    let cancel = CancellationToken::new();
    sandbox.remove("a/b/3.txt");

    sandbox
        .repository
        .checkout(&lines.base, CheckoutStrategy::SAFE, &cancel)
        .unwrap()
        .apply(&cancel)
        .unwrap();
    assert!(!sandbox.exists("a/b/3.txt"));

    sandbox
        .repository
        .checkout(&lines.base, CheckoutStrategy::RECREATE_MISSING, &cancel)
        .unwrap()
        .apply(&cancel)
        .unwrap();
    assert_eq!(sandbox.read("a/b/3.txt"), "three");
}

#[rstest]
#[case::ours(CheckoutStrategy::USE_OURS, "one, edited locally", PathState::Skipped)]
#[case::theirs(CheckoutStrategy::USE_THEIRS, "one, from the other line", PathState::Applied)]
fn conflicts_resolve_to_one_side(
    lines: Lines,
    #[case] side: CheckoutStrategy,
    #[case] expected: &str,
    #[case] state: PathState,
) {
    let sandbox = &lines.sandbox;
    let cancel = CancellationToken::new();
    sandbox.write("1.txt", "one, edited locally");

    let outcome = sandbox
        .repository
        .checkout(&lines.next, CheckoutStrategy::ALLOW_CONFLICTS | side, &cancel)
        .unwrap()
        .apply(&cancel)
        .unwrap();

    assert_eq!(outcome.state("1.txt"), state);
    assert_eq!(outcome.conflicts.len(), 1);
    assert_eq!(sandbox.read("1.txt"), expected);
    assert_eq!(sandbox.read("c/d/4.txt"), "four");
    assert!(!sandbox.repository.lock_index().has_conflicts());
}

#[rstest]
fn unresolved_conflicts_get_markers_and_index_stages(lines: Lines) {
    let sandbox = &lines.sandbox;
    let cancel = CancellationToken::new();
    sandbox.write("1.txt", "one, edited locally");

    let outcome = sandbox
        .repository
        .checkout(&lines.next, CheckoutStrategy::ALLOW_CONFLICTS, &cancel)
        .unwrap()
        .apply(&cancel)
        .unwrap();

    assert_eq!(outcome.state("1.txt"), PathState::Conflicted);
    assert_eq!(outcome.paths_in(PathState::Conflicted), vec![Path::new("1.txt")]);
    assert_eq!(
        sandbox.read("1.txt"),
        "<<<<<<< ours\none, edited locally\n=======\none, from the other line\n>>>>>>> theirs\n"
    );

    let index = sandbox.repository.lock_index();
    assert!(index.is_conflicted(Path::new("1.txt")));
    assert_eq!(index.stages(Path::new("1.txt")).len(), 3);
    assert!(index.entry_by_path(Path::new("c/d/4.txt")).is_some());
}

#[rstest]
fn update_only_skips_absent_paths(lines: Lines) {
    let sandbox = &lines.sandbox;
    let cancel = CancellationToken::new();

    let outcome = sandbox
        .repository
        .checkout(&lines.next, CheckoutStrategy::UPDATE_ONLY, &cancel)
        .unwrap()
        .apply(&cancel)
        .unwrap();

    assert_eq!(outcome.state("c/d/4.txt"), PathState::Skipped);
    assert_eq!(outcome.state("1.txt"), PathState::Applied);
    assert!(!sandbox.exists("c"));
    assert_eq!(sandbox.read("1.txt"), "one, from the other line");
}

#[rstest]
fn index_can_be_left_alone(lines: Lines) {
    let sandbox = &lines.sandbox;
    let cancel = CancellationToken::new();

    sandbox
        .repository
        .checkout(&lines.next, CheckoutStrategy::DONT_UPDATE_INDEX, &cancel)
        .unwrap()
        .apply(&cancel)
        .unwrap();

    let report = sandbox
        .repository
        .status(StatusOptions::INCLUDE_UNTRACKED, StatusShow::IndexAndWorkdir, &cancel)
        .unwrap();
    assert_eq!(sandbox.read("1.txt"), "one, from the other line");
    assert_eq!(report.flags("1.txt"), StatusFlags::WT_MODIFIED);
    assert_eq!(report.flags("a/2.txt"), StatusFlags::WT_DELETED);
    assert_eq!(report.flags("c"), StatusFlags::WT_NEW);
}

#[rstest]
fn untracked_and_ignored_files_are_removed_on_request(lines: Lines) {
    let sandbox = &lines.sandbox;
    let cancel = CancellationToken::new();
    sandbox.write(".gitignore", "*.log\n");
    sandbox.write("junk.txt", "junk");
    sandbox.write("debug.log", "noise");

    sandbox
        .repository
        .checkout(&lines.base, CheckoutStrategy::REMOVE_UNTRACKED, &cancel)
        .unwrap()
        .apply(&cancel)
        .unwrap();

    assert!(!sandbox.exists("junk.txt"));
    assert!(!sandbox.exists(".gitignore"));
    assert!(sandbox.exists("debug.log"));
    assert_eq!(sandbox.read("1.txt"), "one");
}

#[rstest]
fn ignored_files_are_removed_on_request(lines: Lines) {
    let sandbox = &lines.sandbox;
    let cancel = CancellationToken::new();
    sandbox.write(".gitignore", "*.log\n");
    sandbox.write("debug.log", "noise");

    sandbox
        .repository
        .checkout(&lines.base, CheckoutStrategy::REMOVE_IGNORED, &cancel)
        .unwrap()
        .apply(&cancel)
        .unwrap();

    assert!(!sandbox.exists("debug.log"));
    assert!(sandbox.exists(".gitignore"));
}

#[rstest]
fn cancelled_apply_leaves_the_tree_untouched(lines: Lines) {
    let sandbox = &lines.sandbox;
    let plan = sandbox
        .repository
        .checkout(&lines.next, CheckoutStrategy::SAFE, &CancellationToken::new())
        .unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = plan.apply(&cancel);

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(sandbox.read("1.txt"), "one");
    assert!(sandbox.exists("a/2.txt"));
    assert!(!sandbox.exists("c"));
    assert!(is_clean(sandbox));
}

#[rstest]
fn contradictory_strategies_are_rejected(lines: Lines) {
    let result = lines.sandbox.repository.checkout(
        &lines.next,
        CheckoutStrategy::SAFE | CheckoutStrategy::FORCE,
        &CancellationToken::new(),
    );

    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[rstest]
fn submodules_are_checked_out_on_request(sandbox: Sandbox) {
    let cancel = CancellationToken::new();
    let nested = Repository::init(sandbox.path("lib")).unwrap();
    sandbox.write("lib/x.txt", "v1");
    nested.add_all().unwrap();
    let first = nested.commit("v1", Some(author())).unwrap();
    sandbox.write("readme.md", "outer");
    let outer_first = sandbox.commit_all("Add lib");

    sandbox.write("lib/x.txt", "v2");
    nested.add_all().unwrap();
    nested.commit("v2", Some(author())).unwrap();
    nested.close();
    sandbox.commit_all("Bump lib");

    let shallow = sandbox
        .repository
        .checkout(&outer_first, CheckoutStrategy::SAFE, &cancel)
        .unwrap();
    assert!(
        !shallow
            .actions()
            .iter()
            .any(|action| matches!(action, PlanAction::CheckoutSubmodule { .. }))
    );
    drop(shallow);

    sandbox
        .repository
        .checkout_with_submodules(&outer_first, CheckoutStrategy::SAFE, SubmoduleRecurse::Yes, &cancel)
        .unwrap()
        .apply(&cancel)
        .unwrap();

    let nested = Repository::open(sandbox.path("lib")).unwrap();
    assert_eq!(sandbox.read("lib/x.txt"), "v1");
    assert_eq!(nested.refs().read_head().unwrap(), Some(first));
    assert_eq!(nested.refs().current_branch().unwrap(), None);
}

/// Outer repository with submodules `lib_a` and `lib_b`, both bumped to a second commit
struct Submodules {
    sandbox: Sandbox,
    outer_first: ObjectId,
    a_second: ObjectId,
}

#[fixture]
fn submodules(sandbox: Sandbox) -> Submodules {
    let commit_nested = |nested: &Repository, file: &str, content: &str| {
        sandbox.write(file, content);
        nested.add_all().unwrap();
        nested.commit(content, Some(author())).unwrap()
    };

    let a = Repository::init(sandbox.path("lib_a")).unwrap();
    let b = Repository::init(sandbox.path("lib_b")).unwrap();
    commit_nested(&a, "lib_a/x.txt", "a1");
    commit_nested(&b, "lib_b/y.txt", "b1");
    let outer_first = sandbox.commit_all("Add libs");

    let a_second = commit_nested(&a, "lib_a/x.txt", "a2");
    commit_nested(&b, "lib_b/y.txt", "b2");
    sandbox.commit_all("Bump libs");

    Submodules {
        sandbox,
        outer_first,
        a_second,
    }
}

fn assert_lib_a_untouched(fixture: &Submodules) {
    let nested = Repository::open(fixture.sandbox.path("lib_a")).unwrap();
    assert_eq!(fixture.sandbox.read("lib_a/x.txt"), "a2");
    assert_eq!(nested.refs().read_head().unwrap(), Some(fixture.a_second));
    assert_eq!(
        nested.refs().current_branch().unwrap(),
        Some(RefName::branch("main").unwrap())
    );
    let report = nested
        .status(StatusOptions::empty(), StatusShow::IndexAndWorkdir, &CancellationToken::new())
        .unwrap();
    assert!(report.is_clean());
}

#[rstest]
fn submodule_conflicts_reject_the_parent_plan(submodules: Submodules) {
    let cancel = CancellationToken::new();
    submodules.sandbox.write("lib_b/y.txt", "local edit");

    let plan = submodules
        .sandbox
        .repository
        .checkout_with_submodules(
            &submodules.outer_first,
            CheckoutStrategy::SAFE,
            SubmoduleRecurse::Yes,
            &cancel,
        )
        .unwrap();

    assert!(plan.is_rejected());
    assert_eq!(
        plan.conflicts()
            .iter()
            .map(|conflict| (conflict.path.as_path(), conflict.kind))
            .collect::<Vec<_>>(),
        vec![(Path::new("lib_b/y.txt"), ConflictType::StaleFile)]
    );
    assert!(matches!(plan.apply(&cancel), Err(Error::Conflict { .. })));

    assert_lib_a_untouched(&submodules);
    assert_eq!(submodules.sandbox.read("lib_b/y.txt"), "local edit");
}

#[rstest]
fn failed_submodule_rolls_back_earlier_submodules(submodules: Submodules) {
    let cancel = CancellationToken::new();
    let plan = submodules
        .sandbox
        .repository
        .checkout_with_submodules(
            &submodules.outer_first,
            CheckoutStrategy::SAFE,
            SubmoduleRecurse::Yes,
            &cancel,
        )
        .unwrap();
    assert!(!plan.is_rejected());

    // lib_b changes after planning, so its checkout fails once lib_a is done
    submodules.sandbox.write("lib_b/y.txt", "late edit");

    assert!(matches!(plan.apply(&cancel), Err(Error::Conflict { .. })));
    assert_lib_a_untouched(&submodules);
    assert_eq!(submodules.sandbox.read("lib_b/y.txt"), "late edit");
}
