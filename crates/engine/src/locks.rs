//! Per-realm write locks.
//!
//! SQLite isolates writers per database, not per row, so the booking and
//! unbooked-transaction counters are allocated under an explicit async lock
//! held for the whole write transaction of a realm.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Clone, Debug, Default)]
pub struct RealmLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl RealmLocks {
    pub async fn lock(&self, realm_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(realm_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}
