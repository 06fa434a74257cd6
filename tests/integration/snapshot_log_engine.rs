use canopy::concurrency::ProjectLockManager;
use canopy::{
    ErrorKind, FileNode, MemorySnapshotStore, MergeReport, MergeState, SnapshotLogBackend,
    SnapshotStore, VersionControlEngine,
};
use std::sync::Arc;

use crate::integration::support::{project, snapshot_log_engine, tree, RecordingPublisher};

#[test]
fn fresh_project_has_empty_main() {
    let engine = snapshot_log_engine();
    let p = project("fresh");

    let listing = engine.list_branches(&p).unwrap();
    assert_eq!(listing.branches, vec!["main"]);
    assert_eq!(listing.active, "main");
    assert_eq!(engine.active_branch(&p).unwrap(), "main");
    assert!(engine.list_commits(&p, "main").unwrap().is_empty());
    assert_eq!(engine.get_working_tree(&p, "main").unwrap(), FileNode::root());
}

#[test]
fn feature_is_seeded_from_latest_main_commit() {
    let engine = snapshot_log_engine();
    let p = project("seed");

    engine
        .set_working_tree(&p, "main", tree(&[("readme", "hi")]))
        .unwrap();
    let main_commit = engine.commit(&p, "main", "first", "ada").unwrap();

    engine.create_branch(&p, "feature", Some("main")).unwrap();
    let commits = engine.list_commits(&p, "feature").unwrap();
    assert_eq!(commits.len(), 1);
    let seed = engine.get_commit(&p, "feature", &commits[0].id).unwrap();
    assert_eq!(seed.snapshot, tree(&[("readme", "hi")]));
    assert_ne!(seed.id, main_commit.id);
    assert!(seed.message.contains("main"));

    // Editing feature leaves main's history alone
    engine
        .set_working_tree(&p, "feature", tree(&[("readme", "changed")]))
        .unwrap();
    engine.commit(&p, "feature", "edit", "bob").unwrap();
    let main_latest = engine.get_commit(&p, "main", &main_commit.id).unwrap();
    assert_eq!(main_latest.snapshot, tree(&[("readme", "hi")]));
}

#[test]
fn branch_from_base_without_history_starts_empty() {
    let engine = snapshot_log_engine();
    let p = project("empty-base");
    engine
        .set_working_tree(&p, "main", tree(&[("draft", "uncommitted")]))
        .unwrap();
    engine.create_branch(&p, "feature", Some("main")).unwrap();
    assert!(engine.list_commits(&p, "feature").unwrap().is_empty());
    assert!(engine.get_working_tree(&p, "feature").unwrap().is_empty());
}

#[test]
fn branch_errors_map_to_stable_kinds() {
    let engine = snapshot_log_engine();
    let p = project("errors");
    engine.create_branch(&p, "dev", None).unwrap();

    let dup = engine.create_branch(&p, "dev", None).unwrap_err();
    assert_eq!(dup.kind(), ErrorKind::AlreadyExists);

    let missing_base = engine.create_branch(&p, "x", Some("nope")).unwrap_err();
    assert_eq!(missing_base.kind(), ErrorKind::NotFound);

    let bad_name = engine.create_branch(&p, "has space", None).unwrap_err();
    assert_eq!(bad_name.kind(), ErrorKind::InvalidOperation);

    let missing_switch = engine.switch_branch(&p, "nope").unwrap_err();
    assert_eq!(missing_switch.kind(), ErrorKind::NotFound);
}

#[test]
fn branch_deletion_invariants() {
    let engine = snapshot_log_engine();
    let p = project("delete");

    // only branch
    let err = engine.delete_branch(&p, "main").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);

    engine.create_branch(&p, "dev", None).unwrap();
    engine.switch_branch(&p, "dev").unwrap();

    // main, even when not active
    let err = engine.delete_branch(&p, "main").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);

    // active
    let err = engine.delete_branch(&p, "dev").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);

    engine.switch_branch(&p, "main").unwrap();
    let listing = engine.delete_branch(&p, "dev").unwrap();
    assert_eq!(listing.branches, vec!["main"]);

    let err = engine.delete_branch(&p, "dev").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn switching_does_not_touch_working_trees() {
    let engine = snapshot_log_engine();
    let p = project("switch");
    engine
        .set_working_tree(&p, "main", tree(&[("a", "main")]))
        .unwrap();
    engine.create_branch(&p, "dev", None).unwrap();
    engine.switch_branch(&p, "dev").unwrap();

    assert_eq!(engine.active_branch(&p).unwrap(), "dev");
    assert_eq!(
        engine.get_working_tree(&p, "main").unwrap(),
        tree(&[("a", "main")])
    );
    assert!(engine.get_working_tree(&p, "dev").unwrap().is_empty());
}

#[test]
fn history_is_append_only_and_commits_are_immutable() {
    let engine = snapshot_log_engine();
    let p = project("append");

    let mut ids = Vec::new();
    for i in 0..5 {
        let content = i.to_string();
        engine
            .set_working_tree(&p, "main", tree(&[("counter", content.as_str())]))
            .unwrap();
        ids.push(engine.commit(&p, "main", &format!("c{}", i), "ada").unwrap().id);
    }
    engine
        .set_working_tree(&p, "main", tree(&[("counter", "dirty")]))
        .unwrap();

    let commits = engine.list_commits(&p, "main").unwrap();
    assert_eq!(commits.len(), 5);
    assert_eq!(
        commits.iter().map(|c| c.id.clone()).collect::<Vec<_>>(),
        ids
    );
    for (i, id) in ids.iter().enumerate() {
        let content = i.to_string();
        assert_eq!(
            engine.get_commit(&p, "main", id).unwrap().snapshot,
            tree(&[("counter", content.as_str())])
        );
    }
}

#[test]
fn merging_into_a_branch_with_history_appends_without_touching_it() {
    let store = Arc::new(MemorySnapshotStore::new());
    let engine = VersionControlEngine::new(
        store.clone(),
        Arc::new(SnapshotLogBackend::new()),
        Arc::new(ProjectLockManager::new()),
    );
    let p = project("merge-history");

    let mut earlier = Vec::new();
    for i in 0..3 {
        let content = format!("v{}", i);
        engine
            .set_working_tree(&p, "main", tree(&[("notes", content.as_str())]))
            .unwrap();
        earlier.push(engine.commit(&p, "main", &content, "ada").unwrap());
    }
    engine.create_branch(&p, "feature", Some("main")).unwrap();
    engine
        .set_working_tree(&p, "feature", tree(&[("notes", "feature"), ("extra", "x")]))
        .unwrap();
    engine.commit(&p, "feature", "feature work", "bob").unwrap();

    let outcome = engine.merge_branches(&p, "feature", "main", "ada").unwrap();
    assert_eq!(outcome.state, MergeState::Complete);

    let commits = engine.list_commits(&p, "main").unwrap();
    assert_eq!(commits.len(), earlier.len() + 1);
    for (summary, original) in commits.iter().zip(&earlier) {
        assert_eq!(summary.id, original.id);
        let stored = engine.get_commit(&p, "main", &original.id).unwrap();
        assert_eq!(stored.snapshot, original.snapshot);
        assert_eq!(stored.message, original.message);
    }
    let merge_commit = engine
        .get_commit(&p, "main", &commits[earlier.len()].id)
        .unwrap();
    assert_eq!(
        merge_commit.snapshot,
        tree(&[("notes", "feature"), ("extra", "x")])
    );

    let record = store.load(&p).unwrap().unwrap();
    let main = record.branch("main").unwrap();
    assert_eq!(main.last_merged_from.as_deref(), Some("feature"));
    assert!(record.branch("feature").unwrap().last_merged_from.is_none());
}

#[test]
fn restore_discards_uncommitted_edits() {
    let engine = snapshot_log_engine();
    let p = project("restore");
    engine
        .set_working_tree(&p, "main", tree(&[("a", "1")]))
        .unwrap();
    let c1 = engine.commit(&p, "main", "one", "ada").unwrap();
    engine
        .set_working_tree(&p, "main", tree(&[("a", "2")]))
        .unwrap();

    let restored = engine.restore_commit(&p, "main", &c1.id).unwrap();
    assert_eq!(restored, tree(&[("a", "1")]));
    assert_eq!(engine.get_working_tree(&p, "main").unwrap(), tree(&[("a", "1")]));
    assert_eq!(engine.list_commits(&p, "main").unwrap().len(), 1);

    let err = engine.restore_commit(&p, "main", "missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn merge_is_a_directed_whole_tree_overwrite() {
    let publisher = Arc::new(RecordingPublisher::default());
    let engine = snapshot_log_engine().with_publisher(publisher.clone());
    let p = project("merge");

    engine.create_branch(&p, "a", None).unwrap();
    engine.create_branch(&p, "b", None).unwrap();
    engine.set_working_tree(&p, "a", tree(&[("x", "1")])).unwrap();
    engine.set_working_tree(&p, "b", tree(&[("y", "2")])).unwrap();

    let outcome = engine.merge_branches(&p, "a", "b", "ada").unwrap();
    assert_eq!(outcome.state, MergeState::Complete);
    assert_eq!(outcome.tree, tree(&[("x", "1")]));
    assert_eq!(engine.get_working_tree(&p, "b").unwrap(), tree(&[("x", "1")]));

    let commits = engine.list_commits(&p, "b").unwrap();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].author, "ada");

    let report = MergeReport::from(&outcome);
    assert!(report.success);
    assert!(!report.has_conflicts);

    // b is not the published branch
    assert!(publisher.published.lock().is_empty());

    // the source is untouched
    assert_eq!(engine.get_working_tree(&p, "a").unwrap(), tree(&[("x", "1")]));
}

#[test]
fn merge_into_main_publishes_the_merged_tree() {
    let publisher = Arc::new(RecordingPublisher::default());
    let engine = snapshot_log_engine().with_publisher(publisher.clone());
    let p = project("publish");

    engine.create_branch(&p, "feature", None).unwrap();
    engine
        .set_working_tree(&p, "feature", tree(&[("index.html", "<h1>hi</h1>")]))
        .unwrap();
    engine.merge_branches(&p, "feature", "main", "ada").unwrap();

    let published = publisher.published.lock();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "publish");
    assert_eq!(published[0].1, "main");
    assert_eq!(published[0].2, tree(&[("index.html", "<h1>hi</h1>")]));
}

#[test]
fn conflict_follow_ups_are_invalid_without_a_pending_merge() {
    let engine = snapshot_log_engine();
    let p = project("no-pending");
    let err = engine
        .resolve_conflicts(&p, "main", FileNode::root(), "resolve")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    let err = engine.abort_merge(&p, "main").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

#[test]
fn malformed_trees_are_rejected_before_storage() {
    let engine = snapshot_log_engine();
    let p = project("malformed");
    let bad = FileNode::file("root", "not a folder");
    let err = engine.set_working_tree(&p, "main", bad).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPath);

    let mut files = canopy::FlatFiles::new();
    files.insert("a//b".to_string(), "x".to_string());
    let err = engine.set_flat_files(&p, "main", &files).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPath);
    assert!(engine.get_working_tree(&p, "main").unwrap().is_empty());
}

#[test]
fn duplicate_siblings_and_misnamed_roots_never_reach_a_commit() {
    let engine = snapshot_log_engine();
    let p = project("structure");
    let duplicated = FileNode::Folder {
        name: "root".to_string(),
        children: vec![FileNode::file("a", "1"), FileNode::file("a", "2")],
    };
    let err = engine.set_working_tree(&p, "main", duplicated).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPath);

    let mut misnamed = FileNode::folder("notroot");
    misnamed.upsert_child(FileNode::file("a", "1"));
    let err = engine.set_working_tree(&p, "main", misnamed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPath);

    let commit = engine.commit(&p, "main", "after rejects", "ada").unwrap();
    assert_eq!(commit.snapshot, FileNode::root());
}

#[test]
fn nested_branch_names_are_refused() {
    let engine = snapshot_log_engine();
    let p = project("nested-names");
    engine.create_branch(&p, "feature", None).unwrap();
    let err = engine.create_branch(&p, "feature/x", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    engine.create_branch(&p, "release/1.0", None).unwrap();
    let err = engine.create_branch(&p, "release", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(
        engine.list_branches(&p).unwrap().branches,
        vec!["main", "feature", "release/1.0"]
    );
}
