//! Property-based tests for drain ordering and retention

use crate::common::*;
use fieldsync::shared::NewQueueItem;
use fieldsync::sync::DrainOutcome;
use proptest::prelude::*;

/// Enqueue one status update per flag, failing the flagged targets, and drain once.
/// Returns (targets called, targets enqueued, targets still queued).
fn drain_once(failures: &[bool]) -> (Vec<String>, Vec<String>, Vec<String>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let (remote, manager) = setup().await;
        let mut enqueued = Vec::new();

        for (index, fails) in failures.iter().enumerate() {
            let job_id = format!("J{}", index);
            if *fails {
                remote.fail_target(&job_id);
            }
            manager
                .db()
                .enqueue(NewQueueItem::update_job_status(job_id.clone(), "completed"))
                .await
                .unwrap();
            enqueued.push(job_id);
        }

        let outcome = manager.drain().await.unwrap();
        assert!(matches!(outcome, DrainOutcome::Completed(_)));

        let remaining = manager
            .db()
            .get_all_queue_items()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|item| item.job_id)
            .collect();

        (remote.targets(), enqueued, remaining)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_calls_follow_insertion_order(failures in prop::collection::vec(any::<bool>(), 0..12)) {
        let (called, enqueued, _) = drain_once(&failures);
        prop_assert_eq!(called, enqueued);
    }

    #[test]
    fn test_item_retained_iff_its_call_failed(failures in prop::collection::vec(any::<bool>(), 0..12)) {
        let (_, enqueued, remaining) = drain_once(&failures);
        let expected: Vec<String> = enqueued
            .into_iter()
            .zip(&failures)
            .filter(|(_, fails)| **fails)
            .map(|(job_id, _)| job_id)
            .collect();
        prop_assert_eq!(remaining, expected);
    }
}
