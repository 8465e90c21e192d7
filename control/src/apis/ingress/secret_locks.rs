//! Per-Secret serialization
//!
//! Two TLS entries may name the same Secret. Holding the lock for a
//! [`SecretKey`] while processing keeps their writes from interleaving.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tlsward_common::SecretKey;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::warn;

/// Mutex access that recovers from poisoning
///
/// The map only holds lock handles, so a panic while it was held leaves
/// nothing half-updated.
#[inline]
fn safe_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Mutex poisoned in secret locks, recovering");
        poisoned.into_inner()
    })
}

/// Async mutex per (namespace, secret name)
#[derive(Default)]
pub struct SecretLocks {
    locks: Mutex<HashMap<SecretKey, Arc<AsyncMutex<()>>>>,
}

impl SecretLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &SecretKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = safe_lock(&self.locks);
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Drop handles nobody holds or waits on
    pub fn prune(&self) {
        let mut locks = safe_lock(&self.locks);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Number of tracked Secrets
    pub(crate) fn len(&self) -> usize {
        safe_lock(&self.locks).len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
