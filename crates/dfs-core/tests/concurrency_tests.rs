use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use dfs_core::*;

fn p(raw: &str) -> NodePath {
    raw.parse().unwrap()
}

fn node(port: u16) -> StorageNodeInfo {
    StorageNodeInfo::new("127.0.0.1", port, port + 1)
}

fn shared_naming() -> Arc<NamingCoordinator> {
    let commands = Arc::new(RecordingCommands::new());
    let naming = NamingCoordinator::new(NamingConfig::default(), commands);
    naming.register(node(100), &[]).unwrap();
    Arc::new(naming)
}

fn wait_for_pending_writer(naming: &NamingCoordinator, path: &NodePath) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while naming
        .lock_snapshot(path)
        .map_or(true, |s| s.pending_writers == 0)
    {
        assert!(Instant::now() < deadline, "writer never queued");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_writer_is_not_starved_by_later_readers() {
    let naming = shared_naming();
    naming.create_file(&p("/f")).unwrap();
    naming.acquire_path(&p("/f"), LockMode::Shared).unwrap();

    let (events_tx, events_rx) = mpsc::channel();
    let writer = {
        let naming = Arc::clone(&naming);
        let events = events_tx.clone();
        thread::spawn(move || {
            naming.acquire_path(&p("/f"), LockMode::Exclusive).unwrap();
            events.send("writer").unwrap();
            thread::sleep(Duration::from_millis(20));
            naming.release_path(&p("/f"), LockMode::Exclusive).unwrap();
        })
    };
    wait_for_pending_writer(&naming, &p("/f"));

    let reader = {
        let naming = Arc::clone(&naming);
        let events = events_tx.clone();
        thread::spawn(move || {
            naming.acquire_path(&p("/f"), LockMode::Shared).unwrap();
            events.send("late reader").unwrap();
            naming.release_path(&p("/f"), LockMode::Shared).unwrap();
        })
    };

    thread::sleep(Duration::from_millis(30));
    assert!(events_rx.try_recv().is_err(), "nobody may pass the first reader yet");

    naming.release_path(&p("/f"), LockMode::Shared).unwrap();
    writer.join().unwrap();
    reader.join().unwrap();
    drop(events_tx);

    let order: Vec<&str> = events_rx.iter().collect();
    assert_eq!(order, ["writer", "late reader"]);
}

#[test]
fn test_delete_waits_for_lock_holders_below() {
    let naming = shared_naming();
    naming.create_directory(&p("/dir")).unwrap();
    naming.create_file(&p("/dir/f")).unwrap();
    naming.acquire_path(&p("/dir/f"), LockMode::Shared).unwrap();

    let deleter = {
        let naming = Arc::clone(&naming);
        thread::spawn(move || naming.delete(&p("/dir")))
    };
    wait_for_pending_writer(&naming, &p("/dir"));
    assert!(naming.exists(&p("/dir/f")));

    naming.release_path(&p("/dir/f"), LockMode::Shared).unwrap();
    assert_eq!(deleter.join().unwrap(), Ok(true));
    assert!(!naming.exists(&p("/dir")));
}

#[test]
fn test_concurrent_creates_in_one_directory() {
    let naming = shared_naming();
    naming.create_directory(&p("/bulk")).unwrap();

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let naming = Arc::clone(&naming);
            thread::spawn(move || {
                for i in 0..25 {
                    let path = p(&format!("/bulk/w{worker}-{i}"));
                    assert_eq!(naming.create_file(&path), Ok(true));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(naming.list(&p("/bulk")).unwrap().len(), 200);
    assert_eq!(
        naming.lock_snapshot(&p("/bulk")),
        Some(LockSnapshot::default())
    );
}

#[test]
fn test_concurrent_registrations_share_implicit_directories() {
    let commands = Arc::new(RecordingCommands::new());
    let naming = Arc::new(NamingCoordinator::new(NamingConfig::default(), commands));

    let handles: Vec<_> = (0..6u16)
        .map(|n| {
            let naming = Arc::clone(&naming);
            thread::spawn(move || {
                let files = vec![
                    "/common/deep/same.txt".to_string(),
                    format!("/common/deep/own-{n}.txt"),
                ];
                naming.register(node(1000 + n * 10), &files).unwrap()
            })
        })
        .collect();

    let duplicate_lists: Vec<Vec<String>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Exactly one node won the shared path.
    let winners = duplicate_lists.iter().filter(|d| d.is_empty()).count();
    assert_eq!(winners, 1);
    assert_eq!(naming.list(&p("/common/deep")).unwrap().len(), 7);
    assert_eq!(naming.storage_nodes().len(), 6);
}
