use canopy::concurrency::ProjectLockManager;
use canopy::config::CanopyConfig;
use canopy::{
    BackendKind, ErrorKind, SledSnapshotStore, SnapshotLogBackend, SnapshotStore,
    VersionControlEngine,
};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use crate::integration::support::{project, tree};

fn sled_engine(path: &std::path::Path) -> VersionControlEngine {
    VersionControlEngine::new(
        Arc::new(SledSnapshotStore::open(path).unwrap()),
        Arc::new(SnapshotLogBackend::new()),
        Arc::new(ProjectLockManager::new()),
    )
}

#[test]
fn history_survives_reopening_the_store() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store");
    let p = project("durable");

    let commit_id = {
        let engine = sled_engine(&path);
        engine
            .set_working_tree(&p, "main", tree(&[("notes.md", "v1")]))
            .unwrap();
        let id = engine.commit(&p, "main", "v1", "ada").unwrap().id;
        engine.create_branch(&p, "draft", Some("main")).unwrap();
        engine
            .set_working_tree(&p, "draft", tree(&[("notes.md", "wip")]))
            .unwrap();
        id
    };

    let engine = sled_engine(&path);
    let listing = engine.list_branches(&p).unwrap();
    assert_eq!(listing.branches, vec!["main", "draft"]);
    let commit = engine.get_commit(&p, "main", &commit_id).unwrap();
    assert_eq!(commit.snapshot, tree(&[("notes.md", "v1")]));
    assert_eq!(
        engine.get_working_tree(&p, "draft").unwrap(),
        tree(&[("notes.md", "wip")])
    );
}

#[test]
fn failed_operation_is_not_persisted() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store");
    let p = project("atomic");
    {
        let engine = sled_engine(&path);
        engine.create_branch(&p, "dev", None).unwrap();
        let err = engine.delete_branch(&p, "main").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }
    let store = SledSnapshotStore::open(&path).unwrap();
    let record = store.load(&p).unwrap().unwrap();
    assert_eq!(record.branches.len(), 2);
    assert_eq!(record.backend, BackendKind::SnapshotLog);
}

#[test]
fn engine_from_config_uses_configured_paths() {
    let temp = TempDir::new().unwrap();
    let mut config = CanopyConfig::default();
    config.storage.store_path = Some(PathBuf::from("state/store"));
    config.engine.published_branch = "live".to_string();

    let p = project("configured");
    {
        let engine = VersionControlEngine::from_config(&config, temp.path()).unwrap();
        assert_eq!(engine.backend_kind(), BackendKind::SnapshotLog);
        assert_eq!(engine.published_branch(), "live");
        engine.commit(&p, "main", "hello", "ada").unwrap();
    }
    assert!(temp.path().join("state/store").exists());

    let engine = VersionControlEngine::from_config(&config, temp.path()).unwrap();
    assert_eq!(engine.list_commits(&p, "main").unwrap().len(), 1);
}
