use canopy::concurrency::ProjectLockManager;
use canopy::{SledSnapshotStore, SnapshotLogBackend, VersionControlEngine};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

use crate::integration::support::{project, snapshot_log_engine, tree};

#[test]
fn concurrent_commits_on_one_branch_serialize() {
    let engine = Arc::new(snapshot_log_engine());
    let p = project("shared");
    engine.list_branches(&p).unwrap();

    let threads = 8;
    let per_thread = 10;
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let engine = Arc::clone(&engine);
            let p = p.clone();
            thread::spawn(move || {
                let author = format!("user-{}", t);
                let mut ids = Vec::new();
                for i in 0..per_thread {
                    let content = format!("{}-{}", t, i);
                    engine
                        .set_working_tree(&p, "main", tree(&[("log", content.as_str())]))
                        .unwrap();
                    ids.push(engine.commit(&p, "main", &content, &author).unwrap().id);
                }
                ids
            })
        })
        .collect();

    let mut returned = HashSet::new();
    for handle in handles {
        returned.extend(handle.join().unwrap());
    }

    let commits = engine.list_commits(&p, "main").unwrap();
    assert_eq!(commits.len(), threads * per_thread);
    assert_eq!(returned.len(), threads * per_thread);
    let stored: HashSet<String> = commits.iter().map(|c| c.id.clone()).collect();
    assert_eq!(stored, returned);

    // every snapshot holds one whole file written by some caller
    for summary in &commits {
        let commit = engine.get_commit(&p, "main", &summary.id).unwrap();
        assert_eq!(commit.snapshot.file_count(), 1);
        assert!(commit.snapshot.get("log").is_some());
    }
}

#[test]
fn racing_readers_and_writers_see_whole_trees() {
    let engine = Arc::new(snapshot_log_engine());
    let p = project("readers");
    let a = tree(&[("x", "a"), ("y", "a")]);
    let b = tree(&[("x", "b"), ("y", "b")]);
    engine.set_working_tree(&p, "main", a.clone()).unwrap();

    let writer = {
        let engine = Arc::clone(&engine);
        let p = p.clone();
        let (a, b) = (a.clone(), b.clone());
        thread::spawn(move || {
            for i in 0..50 {
                let next = if i % 2 == 0 { b.clone() } else { a.clone() };
                engine.set_working_tree(&p, "main", next).unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let p = p.clone();
            let (a, b) = (a.clone(), b.clone());
            thread::spawn(move || {
                for _ in 0..50 {
                    let seen = engine.get_working_tree(&p, "main").unwrap();
                    assert!(seen == a || seen == b);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn first_touch_from_many_threads_creates_one_record() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(SledSnapshotStore::open(&temp.path().join("store")).unwrap());
    let engine = Arc::new(VersionControlEngine::new(
        store,
        Arc::new(SnapshotLogBackend::new()),
        Arc::new(ProjectLockManager::new()),
    ));
    let p = project("lazy");

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let p = p.clone();
            thread::spawn(move || {
                if i % 2 == 0 {
                    engine.list_branches(&p).unwrap();
                } else {
                    engine.create_branch(&p, &format!("b{}", i), None).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let listing = engine.list_branches(&p).unwrap();
    assert_eq!(listing.branches.len(), 5);
    assert_eq!(listing.branches[0], "main");
    assert_eq!(engine.list_projects().unwrap(), vec![p]);
}

#[test]
fn projects_do_not_share_state() {
    let engine = Arc::new(snapshot_log_engine());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let p = project(&format!("p{}", i));
                for _ in 0..5 {
                    engine.commit(&p, "main", "tick", "ada").unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    for i in 0..4 {
        let p = project(&format!("p{}", i));
        assert_eq!(engine.list_commits(&p, "main").unwrap().len(), 5);
    }
}
