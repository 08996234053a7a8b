use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per key. Holding the guard serializes the
/// read-check-insert sequence for a consultant or STIS service slot within
/// this process.
#[derive(Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: impl Into<String>) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.into())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        mutex.lock_owned().await
    }

    /// Drops entries nobody holds or waits on and returns how many went.
    /// A later `lock` on the same key starts a fresh mutex.
    pub fn prune_idle(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        before.saturating_sub(self.locks.len())
    }

    pub fn consultant_key(consultant_id: i64) -> String {
        format!("consultant:{}", consultant_id)
    }

    pub fn stis_service_key(service_id: i64) -> String {
        format!("stis-service:{}", service_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_waits_for_release() {
        let locks = Arc::new(KeyedLocks::new());
        let guard = locks.lock(KeyedLocks::consultant_key(1)).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(KeyedLocks::consultant_key(1)).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_prune_keeps_held_keys_only() {
        let locks = KeyedLocks::new();
        for booking_id in 0..5 {
            drop(locks.lock(format!("stis-result:{}", booking_id)).await);
        }
        let held = locks.lock(KeyedLocks::stis_service_key(3)).await;

        assert_eq!(locks.prune_idle(), 5);
        assert_eq!(locks.locks.len(), 1);

        drop(held);
        assert_eq!(locks.prune_idle(), 1);
        assert!(locks.locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _first = locks.lock(KeyedLocks::consultant_key(1)).await;
        let second = tokio::time::timeout(
            Duration::from_millis(50),
            locks.lock(KeyedLocks::consultant_key(2)),
        )
        .await;
        assert!(second.is_ok());
    }
}
