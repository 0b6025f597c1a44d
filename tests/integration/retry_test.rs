//! Backoff and retry exhaustion across drains

use crate::assert_completed;
use crate::common::*;
use fieldsync::offline::RetryPolicy;
use fieldsync::shared::{DeadLetterReason, NewQueueItem, SyncConfig};
use std::time::Duration;

fn exponential(base: Duration, max_attempts: u32) -> SyncConfig {
    SyncConfig::builder()
        .retry_policy(RetryPolicy::Exponential {
            base,
            max_delay: base.max(Duration::from_secs(60)),
            max_attempts,
            jitter: 0.0,
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_failed_item_waits_out_its_backoff() {
    let (remote, manager) = setup_with(MockRemote::new(), exponential(Duration::from_secs(60), 5)).await;
    remote.fail_target("J1");
    let db = manager.db();
    let id = db.enqueue(NewQueueItem::update_job_status("J1", "completed")).await.unwrap();
    db.enqueue(NewQueueItem::update_job_status("J2", "completed")).await.unwrap();

    let report = assert_completed!(manager.drain().await);
    assert_eq!((report.synced, report.failed), (1, 1));

    let state = db.get_attempt_state(id).await.unwrap().unwrap();
    let now = chrono::Utc::now().timestamp_millis();
    assert!(state.next_attempt_at.unwrap() > now + 50_000);

    remote.heal_target("J1");
    remote.clear_calls();
    db.enqueue(NewQueueItem::update_job_status("J3", "completed")).await.unwrap();

    let report = assert_completed!(manager.drain().await);
    assert_eq!((report.total, report.synced, report.deferred), (1, 1, 1));
    assert_eq!(remote.targets(), vec!["J3"]);
    assert_eq!(db.queue_len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_deferred_only_queue_is_an_empty_batch() {
    let (remote, manager) = setup_with(MockRemote::new(), exponential(Duration::from_secs(60), 5)).await;
    remote.fail_target("J1");
    manager
        .db()
        .enqueue(NewQueueItem::update_job_status("J1", "completed"))
        .await
        .unwrap();
    assert_completed!(manager.drain().await);

    let statuses = record_statuses(&manager);
    let report = assert_completed!(manager.drain().await);

    assert_eq!((report.total, report.deferred), (0, 1));
    assert_eq!(statuses.lock().unwrap().last().map(|s| s.progress), Some(0));
}

#[tokio::test]
async fn test_exhausted_item_is_dead_lettered() {
    let (remote, manager) = setup_with(MockRemote::new(), exponential(Duration::ZERO, 3)).await;
    remote.fail_target("J1");
    let db = manager.db();
    let id = db.enqueue(NewQueueItem::update_job_status("J1", "completed")).await.unwrap();

    for attempt in 1..=2 {
        let report = assert_completed!(manager.drain().await);
        assert_eq!((report.failed, report.dead_lettered), (1, 0));
        assert_eq!(db.get_attempt_state(id).await.unwrap().unwrap().attempts, attempt);
    }

    let report = assert_completed!(manager.drain().await);
    assert_eq!((report.failed, report.dead_lettered), (1, 1));
    assert_eq!(db.queue_len().await.unwrap(), 0);

    let letters = db.list_dead_letters().await.unwrap();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].reason, DeadLetterReason::RetriesExhausted);
    assert_eq!(letters[0].attempts, 3);
    assert!(letters[0].last_error.as_deref().unwrap_or_default().contains("503"));
    assert_eq!(remote.targets().len(), 3);
}

#[tokio::test]
async fn test_requeued_dead_letter_is_retried() {
    let (remote, manager) = setup_with(MockRemote::new(), exponential(Duration::ZERO, 1)).await;
    remote.fail_target("J1");
    let db = manager.db();
    db.enqueue(NewQueueItem::update_job_status("J1", "completed")).await.unwrap();

    let report = assert_completed!(manager.drain().await);
    assert_eq!(report.dead_lettered, 1);

    remote.heal_target("J1");
    let letter = db.list_dead_letters().await.unwrap().remove(0);
    db.requeue_dead_letter(letter.id).await.unwrap().unwrap();

    let report = assert_completed!(manager.drain().await);
    assert_eq!(report.synced, 1);
    assert_eq!(db.stats().await.unwrap().dead_letters, 0);
}
