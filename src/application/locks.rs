use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Whose running-balance chain, booking calendar or number series a
/// write touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Vehicle(Uuid),
    CashLedger,
    BookingNumbers,
    TripSheetNumbers,
}

/// Keyed async mutexes serializing writes per owner inside one process.
///
/// Two writers for the same key queue up; writers for different keys run
/// concurrently. Entries are created on first use and kept.
#[derive(Debug, Default)]
pub struct OwnerLocks {
    locks: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

impl OwnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: LockKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Lock several keys in a fixed order so that two callers asking for
    /// the same set can never deadlock.
    pub async fn lock_all(&self, keys: &[LockKey]) -> Vec<OwnedMutexGuard<()>> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.lock(key).await);
        }
        guards
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let locks = Arc::new(OwnerLocks::new());
        let key = LockKey::Vehicle(Uuid::new_v4());

        let guard = locks.lock(key).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock(key).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_lock_all_dedups() {
        let locks = OwnerLocks::new();
        let v = LockKey::Vehicle(Uuid::new_v4());
        let guards = locks.lock_all(&[v, LockKey::CashLedger, v]).await;
        assert_eq!(guards.len(), 2);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = OwnerLocks::new();
        let _a = locks.lock(LockKey::Vehicle(Uuid::new_v4())).await;
        let _b = locks.lock(LockKey::CashLedger).await;
    }
}
