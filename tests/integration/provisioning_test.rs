//! Offline job provisioning

use crate::assert_ok;
use crate::common::*;
use assert_matches::assert_matches;
use fieldsync::shared::{Job, SyncError};
use serde_json::json;

fn job(id: &str, technician: &str, status: &str) -> Job {
    Job::new(id, json!({"technician_id": technician, "status": status, "address": format!("{} Main St", id)}))
}

#[tokio::test]
async fn test_download_caches_open_jobs_for_technician() {
    let (remote, manager) = setup().await;
    remote.put_job(job("J1", "T1", "assigned"));
    remote.put_job(job("J2", "T1", "completed"));
    remote.put_job(job("J3", "T2", "pending"));
    remote.put_job(job("J4", "T1", "in_progress"));

    let count = assert_ok!(manager.download_jobs_for_offline("T1").await);

    assert_eq!(count, 2);
    let cached: Vec<String> = manager.db().get_all_jobs().await.unwrap().into_iter().map(|j| j.id).collect();
    assert_eq!(cached, vec!["J1", "J4"]);
    assert_eq!(
        remote.calls(),
        vec![RemoteCall::ListJobs(
            "T1".into(),
            vec!["pending".into(), "assigned".into(), "in_progress".into()]
        )]
    );
}

#[tokio::test]
async fn test_download_replaces_cached_snapshot() {
    let (remote, manager) = setup().await;
    manager
        .db()
        .put_job(&Job::new("J1", json!({"status": "assigned", "notes": "stale"})))
        .await
        .unwrap();
    remote.put_job(job("J1", "T1", "in_progress"));

    manager.download_jobs_for_offline("T1").await.unwrap();

    let cached = manager.db().get_job("J1").await.unwrap().unwrap();
    assert_eq!(cached.status(), Some("in_progress"));
    assert!(cached.notes().is_none());
}

#[tokio::test]
async fn test_download_failure_is_reported() {
    let (remote, manager) = setup().await;
    remote.set_fail_all(true);

    let result = manager.download_jobs_for_offline("T1").await;

    assert_matches!(result, Err(SyncError::Remote(_)));
    assert_eq!(manager.db().stats().await.unwrap().jobs, 0);
}
