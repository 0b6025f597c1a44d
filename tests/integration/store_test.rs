//! Durability of the on-disk store across restarts

use crate::{assert_completed, assert_ok};
use crate::common::*;
use fieldsync::local_db::LocalDatabase;
use fieldsync::shared::NewQueueItem;

#[tokio::test]
async fn test_queue_survives_restart_and_drains() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("local.db");

    let (first, second) = {
        let db = assert_ok!(LocalDatabase::open(&path).await, "first open");
        let first = db.enqueue(NewQueueItem::update_job_status("J1", "in_progress")).await.unwrap();
        let second = db.enqueue(NewQueueItem::add_note("J1", "on site")).await.unwrap();
        db.close().await;
        (first, second)
    };

    let db = LocalDatabase::open(&path).await.unwrap();
    let ids: Vec<i64> = db.get_all_queue_items().await.unwrap().iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![first, second]);

    let remote = MockRemote::new();
    remote.put_job(fieldsync::shared::Job::new("J1", serde_json::json!({"notes": null})));
    let (remote, manager) = manager_for(db, remote, immediate_config(5), true);

    let report = assert_completed!(manager.drain().await);

    assert_eq!(report.synced, 2);
    assert_eq!(remote.targets(), vec!["J1", "J1", "J1"]);
    manager.db().close().await;

    let reopened = assert_ok!(LocalDatabase::open(&path).await, "reopen after drain");
    assert_eq!(reopened.queue_len().await.unwrap(), 0);
    let next = reopened.enqueue(NewQueueItem::add_note("J1", "done")).await.unwrap();
    assert!(next > second);
}
