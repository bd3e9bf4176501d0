//! Per-record async mutex registry
//!
//! Every read-check-write on stock runs while holding the mutex of each
//! product (and order) it touches. Lock order: an order id before any
//! product id, product ids ascending. Entries are dropped from the registry
//! once nobody holds or awaits them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct LockRegistry {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

/// Held locks; released on drop
pub struct LockSet {
    registry: LockRegistry,
    held: Vec<(Uuid, OwnedMutexGuard<()>)>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().clone()
    }

    /// Lock a single record
    pub async fn lock(&self, id: Uuid) -> LockSet {
        self.lock_many([id]).await
    }

    /// Lock several records in ascending id order. Duplicates are locked once.
    pub async fn lock_many<I>(&self, ids: I) -> LockSet
    where
        I: IntoIterator<Item = Uuid>,
    {
        let mut ids: Vec<Uuid> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();

        let mut held = Vec::with_capacity(ids.len());
        for id in ids {
            let guard = self.entry(id).lock_owned().await;
            held.push((id, guard));
        }
        LockSet {
            registry: self.clone(),
            held,
        }
    }

    /// Number of records with a live mutex
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl LockSet {
    pub fn holds(&self, id: Uuid) -> bool {
        self.held.iter().any(|(held, _)| *held == id)
    }
}

impl Drop for LockSet {
    fn drop(&mut self) {
        for (id, guard) in self.held.drain(..) {
            drop(guard);
            self.registry
                .locks
                .remove_if(&id, |_, mutex| Arc::strong_count(mutex) == 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_many_dedups_and_releases() {
        let registry = LockRegistry::new();
        let id = Uuid::new_v4();
        {
            let set = registry.lock_many([id, id]).await;
            assert!(set.holds(id));
            assert_eq!(registry.len(), 1);
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_same_id_is_serialized() {
        let registry = LockRegistry::new();
        let id = Uuid::new_v4();
        let counter = Arc::new(AtomicI64::new(0));
        let max_seen = Arc::new(AtomicI64::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            let counter = counter.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _set = registry.lock(id).await;
                let inside = counter.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(inside, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                counter.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_opposite_orders_do_not_deadlock() {
        let registry = LockRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let r1 = registry.clone();
        let r2 = registry.clone();
        let t1 = tokio::spawn(async move {
            for _ in 0..50 {
                let _set = r1.lock_many([a, b]).await;
                tokio::task::yield_now().await;
            }
        });
        let t2 = tokio::spawn(async move {
            for _ in 0..50 {
                let _set = r2.lock_many([b, a]).await;
                tokio::task::yield_now().await;
            }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            t1.await.unwrap();
            t2.await.unwrap();
        })
        .await
        .unwrap();
    }
}
