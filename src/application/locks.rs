use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-key async mutexes.
///
/// Every mutation of an order or of a seller's payouts runs under the lock of
/// its key, so read-modify-write cycles on one aggregate never interleave while
/// unrelated aggregates proceed in parallel.
#[derive(Default, Clone)]
pub struct LockTable {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop entries nobody holds or waits on.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key.to_string()).or_default().clone()
        };
        mutex.lock_owned().await
    }

    pub async fn lock_order(&self, order_number: &str) -> OwnedMutexGuard<()> {
        self.lock(&format!("order:{order_number}")).await
    }

    pub async fn lock_seller_payouts(&self, seller_id: &str) -> OwnedMutexGuard<()> {
        self.lock(&format!("payout:{seller_id}")).await
    }
}
