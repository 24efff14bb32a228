use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use kbm_types::SiteId;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard, OwnedMutexGuard};

/// Guard for one site's lock.
pub type SiteGuard = OwnedMutexGuard<()>;

/// One lock per external site, created on first use.
///
/// The registry map itself sits behind a short-lived std mutex that is only
/// held while looking up or inserting a lock, never across an await.
#[derive(Default)]
pub struct SiteLockRegistry {
    locks: Mutex<HashMap<SiteId, Arc<AsyncMutex<()>>>>,
}

impl SiteLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for `site`, creating it if needed. Repeated calls return
    /// the same lock.
    pub fn lock_for(&self, site: &SiteId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().expect("lock poisoned");
        Arc::clone(locks.entry(site.clone()).or_default())
    }

    /// Wait for exclusive access to `site`.
    pub async fn acquire(&self, site: &SiteId) -> SiteGuard {
        self.lock_for(site).lock_owned().await
    }

    /// Number of sites seen so far.
    pub fn len(&self) -> usize {
        self.locks.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SiteLockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteLockRegistry")
            .field("site_count", &self.len())
            .finish()
    }
}

/// Serializes every remote write across all workers.
#[derive(Debug, Default)]
pub struct SaveLock {
    inner: AsyncMutex<()>,
}

impl SaveLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.inner.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn site(s: &str) -> SiteId {
        SiteId::new(s).unwrap()
    }

    #[test]
    fn same_site_same_lock() {
        let registry = SiteLockRegistry::new();
        let a = registry.lock_for(&site("enwiki"));
        let b = registry.lock_for(&site("enwiki"));
        let c = registry.lock_for(&site("dewiki"));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn site_lock_is_exclusive() {
        let registry = SiteLockRegistry::new();
        let guard = registry.acquire(&site("enwiki")).await;
        assert!(registry.lock_for(&site("enwiki")).try_lock().is_err());
        assert!(registry.lock_for(&site("dewiki")).try_lock().is_ok());
        drop(guard);
        assert!(registry.lock_for(&site("enwiki")).try_lock().is_ok());
    }

    #[tokio::test]
    async fn waiters_are_serialized() {
        let registry = Arc::new(SiteLockRegistry::new());
        let active = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let registry = Arc::clone(&registry);
            let active = Arc::clone(&active);
            handles.push(tokio::spawn(async move {
                let _guard = registry.acquire(&site("enwiki")).await;
                let now = active.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                assert_eq!(now, 0);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
    }
}
