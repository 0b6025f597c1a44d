//! Connectivity transitions driving drains

use crate::common::*;
use fieldsync::local_db::LocalDatabase;
use fieldsync::shared::NewQueueItem;
use fieldsync::sync::{spawn_auto_sync, spawn_probe, ConnectivityEvent, ConnectivityMonitor};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_going_online_drains_once() {
    let db = LocalDatabase::in_memory().await.unwrap();
    db.enqueue(NewQueueItem::update_job_status("J1", "completed")).await.unwrap();
    let (remote, manager) = manager_for(db, MockRemote::new(), immediate_config(5), false);
    let auto_sync = spawn_auto_sync(Arc::clone(&manager));

    assert_eq!(manager.monitor().set_online(true), Some(ConnectivityEvent::WentOnline));
    assert_eq!(manager.monitor().set_online(true), None);

    let drained = eventually(|| {
        let manager = Arc::clone(&manager);
        async move { manager.metrics().drains_completed == 1 }
    })
    .await;
    assert!(drained, "auto sync never drained");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(manager.metrics().drains_completed, 1);
    assert_eq!(remote.targets(), vec!["J1"]);
    assert_eq!(manager.db().queue_len().await.unwrap(), 0);

    auto_sync.abort();
}

#[tokio::test]
async fn test_going_offline_does_not_drain() {
    let (remote, manager) = setup().await;
    manager
        .db()
        .enqueue(NewQueueItem::update_job_status("J1", "completed"))
        .await
        .unwrap();
    let auto_sync = spawn_auto_sync(Arc::clone(&manager));

    assert_eq!(manager.monitor().set_online(false), Some(ConnectivityEvent::WentOffline));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(remote.calls().is_empty());
    assert_eq!(manager.metrics().drains_completed, 0);
    assert_eq!(manager.db().queue_len().await.unwrap(), 1);

    auto_sync.abort();
}

#[tokio::test]
async fn test_probe_feeds_monitor() {
    let remote = Arc::new(MockRemote::new());
    remote.set_unreachable(true);
    let monitor = Arc::new(ConnectivityMonitor::new(true));
    let mut events = monitor.subscribe();

    let probe = spawn_probe(Arc::clone(&monitor), Arc::clone(&remote), Duration::from_millis(10));

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
    assert_eq!(event, ConnectivityEvent::WentOffline);
    assert!(!monitor.is_online());

    remote.set_unreachable(false);
    let event = tokio::time::timeout(Duration::from_secs(1), events.recv()).await.unwrap().unwrap();
    assert_eq!(event, ConnectivityEvent::WentOnline);

    probe.abort();
}
