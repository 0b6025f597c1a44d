//! Store and sync manager fixtures

use super::mock_remote::MockRemote;
use fieldsync::local_db::LocalDatabase;
use fieldsync::offline::RetryPolicy;
use fieldsync::shared::SyncConfig;
use fieldsync::sync::{ConnectivityMonitor, SyncManager, SyncStatus};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type TestManager = Arc<SyncManager<MockRemote>>;

/// Retry on every drain, dead-letter unknown kinds after `dead_letter_after` drains
pub fn immediate_config(dead_letter_after: u32) -> SyncConfig {
    SyncConfig::builder()
        .retry_policy(RetryPolicy::Immediate)
        .dead_letter_after(dead_letter_after)
        .build()
        .expect("valid test config")
}

/// An online manager over a fresh in-memory store
pub async fn setup() -> (Arc<MockRemote>, TestManager) {
    setup_with(MockRemote::new(), immediate_config(5)).await
}

pub async fn setup_with(remote: MockRemote, config: SyncConfig) -> (Arc<MockRemote>, TestManager) {
    let db = LocalDatabase::in_memory().await.expect("in-memory store");
    manager_for(db, remote, config, true)
}

pub fn manager_for(
    db: LocalDatabase,
    remote: MockRemote,
    config: SyncConfig,
    online: bool,
) -> (Arc<MockRemote>, TestManager) {
    let remote = Arc::new(remote);
    let monitor = Arc::new(ConnectivityMonitor::new(online));
    let manager = Arc::new(SyncManager::new(db, Arc::clone(&remote), monitor, config));
    (remote, manager)
}

/// Every status the manager broadcasts from now on
pub fn record_statuses(manager: &TestManager) -> Arc<Mutex<Vec<SyncStatus>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    // Kept registered for the manager's lifetime.
    let _subscription = manager.subscribe(move |status| sink.lock().unwrap().push(status.clone()));
    seen
}

/// Poll `condition` until it holds or a second passes
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
