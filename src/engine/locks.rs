use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{interval, Duration};

/// Per-user critical sections for ledger operations.
///
/// Every engine call for a user runs under that user's lock, so two rapid
/// taps on "claim daily" or two simultaneous purchases are applied one
/// after the other. The in-SQL guards are the backstop; this keeps whole
/// operations (check, mutate, log) from interleaving at all.
pub struct UserLocks {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the lock for a user, creating it on first use.
    pub async fn acquire(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(user_id).or_insert_with(|| Arc::new(Mutex::new(()))))
        };
        lock.lock_owned().await
    }

    /// Drop lock entries nobody is holding or waiting on.
    pub async fn cleanup(&self) {
        let mut locks = self.locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Number of tracked lock entries.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Periodically sweep unused lock entries.
    pub fn spawn_cleanup_task(self: Arc<Self>, every: Duration) {
        tokio::spawn(async move {
            let mut interval = interval(every);
            loop {
                interval.tick().await;
                self.cleanup().await;
            }
        });
    }
}

impl Default for UserLocks {
    fn default() -> Self {
        Self::new()
    }
}
