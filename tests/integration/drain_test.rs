//! Drain behaviour: ordering, failure isolation, progress and single-flight

use crate::common::*;
use crate::{assert_completed, assert_contains};
use assert_matches::assert_matches;
use fieldsync::shared::error::SYNC_FAILED_MESSAGE;
use fieldsync::shared::mutation::{MutationKind, PhotoPayload};
use fieldsync::shared::{DeadLetterReason, Job, NewQueueItem, Photo, SyncError};
use fieldsync::sync::{DrainOutcome, SkipReason, SyncStatus};
use fieldsync::local_db::LocalDatabase;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

async fn queued_ids(manager: &TestManager) -> Vec<i64> {
    manager
        .db()
        .get_all_queue_items()
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.id)
        .collect()
}

#[tokio::test]
async fn test_items_are_applied_in_insertion_order() {
    let (remote, manager) = setup().await;
    remote.put_job(Job::new("B", json!({"notes": "old"})));
    let db = manager.db();
    db.enqueue(NewQueueItem::update_job_status("A", "in_progress")).await.unwrap();
    db.enqueue(NewQueueItem::add_note("B", "new")).await.unwrap();
    db.enqueue(NewQueueItem::create_work_report(json!({"job_id": "C", "hours": 1}))).await.unwrap();

    let report = assert_completed!(manager.drain().await);

    assert_eq!(report.synced, 3);
    assert_eq!(
        remote.calls(),
        vec![
            RemoteCall::UpdateJob("A".into(), json!({"status": "in_progress"})),
            RemoteCall::FetchJob("B".into()),
            RemoteCall::UpdateJob("B".into(), json!({"notes": "old\nnew"})),
            RemoteCall::CreateWorkReport(json!({"job_id": "C", "hours": 1})),
        ]
    );
    assert!(queued_ids(&manager).await.is_empty());
}

#[tokio::test]
async fn test_single_status_update_scenario() {
    let (remote, manager) = setup().await;
    let statuses = record_statuses(&manager);
    manager
        .db()
        .enqueue(NewQueueItem::update_job_status("J1", "completed"))
        .await
        .unwrap();

    let report = assert_completed!(manager.drain().await);

    assert_eq!(report.user_message(), "Synced 1 pending changes");
    assert_eq!(
        remote.calls(),
        vec![RemoteCall::UpdateJob("J1".into(), json!({"status": "completed"}))]
    );
    assert!(queued_ids(&manager).await.is_empty());
    assert_eq!(statuses.lock().unwrap().last(), Some(&SyncStatus::finished()));
    assert_eq!(manager.status(), SyncStatus::finished());
}

#[tokio::test]
async fn test_failed_item_does_not_block_the_batch() {
    let (remote, manager) = setup().await;
    let statuses = record_statuses(&manager);
    remote.fail_target("B");
    let db = manager.db();
    db.enqueue(NewQueueItem::update_job_status("A", "completed")).await.unwrap();
    let b = db.enqueue(NewQueueItem::update_job_status("B", "completed")).await.unwrap();
    db.enqueue(NewQueueItem::update_job_status("C", "completed")).await.unwrap();

    let report = assert_completed!(manager.drain().await);

    assert_eq!((report.total, report.synced, report.failed), (3, 2, 1));
    assert_eq!(queued_ids(&manager).await, vec![b]);
    assert_eq!(
        *statuses.lock().unwrap(),
        vec![
            SyncStatus::progress(0),
            SyncStatus::progress(33),
            SyncStatus::progress(33),
            SyncStatus::progress(67),
            SyncStatus::finished(),
        ]
    );

    let state = db.get_attempt_state(b).await.unwrap().unwrap();
    assert_eq!(state.attempts, 1);
    assert_contains!(state.last_error.unwrap(), "503");
}

#[tokio::test]
async fn test_successful_items_are_never_reprocessed() {
    let (remote, manager) = setup().await;
    remote.fail_target("B");
    let db = manager.db();
    db.enqueue(NewQueueItem::update_job_status("A", "completed")).await.unwrap();
    db.enqueue(NewQueueItem::update_job_status("B", "completed")).await.unwrap();
    assert_completed!(manager.drain().await);

    remote.heal_target("B");
    remote.clear_calls();
    let report = assert_completed!(manager.drain().await);

    assert_eq!(report.total, 1);
    assert_eq!(remote.targets(), vec!["B"]);
    assert!(queued_ids(&manager).await.is_empty());
    assert!(db.get_attempt_states().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_queue_reports_no_completion() {
    let (remote, manager) = setup().await;
    let statuses = record_statuses(&manager);

    let report = assert_completed!(manager.drain().await);

    assert_eq!(report.total, 0);
    assert!(remote.calls().is_empty());
    let statuses = statuses.lock().unwrap().clone();
    assert_eq!(statuses, vec![SyncStatus::progress(0), SyncStatus::idle()]);
    assert!(statuses.iter().all(|s| s.progress != 100));
    assert!(!manager.is_draining());
}

#[tokio::test]
async fn test_concurrent_drain_is_ignored_and_batch_is_frozen() {
    let (remote, gate) = MockRemote::gated();
    let (remote, manager) = setup_with(remote, immediate_config(5)).await;
    let db = manager.db().clone();
    db.enqueue(NewQueueItem::update_job_status("A", "completed")).await.unwrap();
    db.enqueue(NewQueueItem::update_job_status("B", "completed")).await.unwrap();

    let entered = remote.entered();
    let first = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.drain().await }
    });
    entered.notified().await;

    assert!(manager.is_draining());
    assert_eq!(
        manager.drain().await.unwrap(),
        DrainOutcome::Skipped(SkipReason::AlreadyRunning)
    );
    let late = db.enqueue(NewQueueItem::update_job_status("C", "completed")).await.unwrap();

    gate.add_permits(10);
    let report = assert_completed!(first.await.unwrap());

    assert_eq!((report.total, report.synced), (2, 2));
    assert_eq!(remote.targets(), vec!["A", "B"]);
    assert_eq!(queued_ids(&manager).await, vec![late]);
    assert!(!manager.is_draining());

    let report = assert_completed!(manager.drain().await);
    assert_eq!(report.synced, 1);
    assert_eq!(remote.targets(), vec!["A", "B", "C"]);
    assert_eq!(manager.metrics().drains_skipped, 1);
}

#[tokio::test]
async fn test_simultaneous_drains_apply_each_item_once() {
    let (remote, manager) = setup().await;
    manager.db().enqueue(NewQueueItem::update_job_status("A", "completed")).await.unwrap();
    manager.db().enqueue(NewQueueItem::update_job_status("B", "completed")).await.unwrap();

    let (first, second) = futures_util::future::join(manager.drain(), manager.drain()).await;

    let first = assert_completed!(first);
    assert_matches!(second, Ok(DrainOutcome::Skipped(SkipReason::AlreadyRunning)));
    assert_eq!(first.synced, 2);
    assert_eq!(remote.targets(), vec!["A", "B"]);
}

#[tokio::test]
async fn test_offline_drain_is_a_noop() {
    let db = LocalDatabase::in_memory().await.unwrap();
    db.enqueue(NewQueueItem::update_job_status("J1", "completed")).await.unwrap();
    let (remote, manager) = manager_for(db, MockRemote::new(), immediate_config(5), false);
    let statuses = record_statuses(&manager);

    let outcome = manager.drain().await.unwrap();

    assert_eq!(outcome, DrainOutcome::Skipped(SkipReason::Offline));
    assert!(remote.calls().is_empty());
    assert!(statuses.lock().unwrap().is_empty());
    assert_eq!(manager.db().queue_len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_batch_read_failure_aborts_and_resets() {
    let (remote, manager) = setup().await;
    let statuses = record_statuses(&manager);
    manager.db().close().await;

    let error = manager.drain().await.unwrap_err();

    assert_matches!(error, SyncError::BatchRead(_));
    assert_eq!(error.user_message(), SYNC_FAILED_MESSAGE);
    assert!(remote.calls().is_empty());
    assert!(!manager.is_draining());

    let last = statuses.lock().unwrap().last().cloned().unwrap();
    assert!(!last.syncing);
    assert_eq!(last.error.as_deref(), Some(SYNC_FAILED_MESSAGE));
    assert_eq!(manager.metrics().drains_failed, 1);

    assert_matches!(manager.drain().await, Err(SyncError::BatchRead(_)));
}

#[tokio::test]
async fn test_unknown_kind_is_retained_then_dead_lettered() {
    let (remote, manager) = setup_with(MockRemote::new(), immediate_config(2)).await;
    let db = manager.db();
    let unknown = db
        .enqueue(NewQueueItem::new(MutationKind::parse("ARCHIVE_JOB"), json!({})).for_job("J9"))
        .await
        .unwrap();
    db.enqueue(NewQueueItem::update_job_status("A", "completed")).await.unwrap();

    let report = assert_completed!(manager.drain().await);
    assert_eq!((report.synced, report.unknown, report.dead_lettered), (1, 1, 0));
    assert_eq!(queued_ids(&manager).await, vec![unknown]);

    let report = assert_completed!(manager.drain().await);
    assert_eq!((report.unknown, report.dead_lettered), (1, 1));
    assert!(queued_ids(&manager).await.is_empty());

    let letters = db.list_dead_letters().await.unwrap();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].reason, DeadLetterReason::UnknownKind);
    assert_eq!(letters[0].item.id, unknown);
    assert_eq!(remote.targets(), vec!["A"]);
}

#[tokio::test]
async fn test_photo_upload_clears_cached_photo() {
    let (remote, manager) = setup().await;
    let db = manager.db();
    let data_url = "data:image/png;base64,AAEC";
    db.put_photo(&Photo::from_data_url("P1", Some("J1".into()), data_url).unwrap())
        .await
        .unwrap();
    db.enqueue(NewQueueItem::upload_photo(PhotoPayload {
        photo_data: data_url.to_string(),
        job_id: Some("J1".into()),
        photo_id: Some("P1".into()),
        file_name: None,
    }))
    .await
    .unwrap();

    let report = assert_completed!(manager.drain().await);

    assert_eq!(report.synced, 1);
    match &remote.calls()[..] {
        [RemoteCall::UploadPhoto { path, content_type, bytes }] => {
            assert!(path.starts_with("J1/") && path.ends_with(".png"));
            assert_eq!(content_type, "image/png");
            assert_eq!(bytes, &vec![0u8, 1, 2]);
        }
        other => panic!("unexpected calls: {:?}", other),
    }
    assert!(db.get_photo("P1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_note_for_missing_job_stays_queued() {
    let (remote, manager) = setup().await;
    let id = manager.db().enqueue(NewQueueItem::add_note("GONE", "hello")).await.unwrap();

    let report = assert_completed!(manager.drain().await);

    assert_eq!(report.failed, 1);
    assert_eq!(remote.calls(), vec![RemoteCall::FetchJob("GONE".into())]);
    assert_eq!(queued_ids(&manager).await, vec![id]);
}

#[tokio::test]
async fn test_malformed_item_stays_queued_without_remote_call() {
    let (remote, manager) = setup().await;
    let id = manager
        .db()
        .enqueue(NewQueueItem::new(MutationKind::UpdateWorkReport, json!({"hours": 2})))
        .await
        .unwrap();

    let report = assert_completed!(manager.drain().await);

    assert_eq!(report.failed, 1);
    assert!(remote.calls().is_empty());
    assert_eq!(queued_ids(&manager).await, vec![id]);
}
