//! Per-user reader/writer locks.
//!
//! Journal operations hold a user's shared lock; a password change holds the
//! exclusive one for the whole rotation. Different users never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Idle locks are dropped once the registry grows past this many users.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<RwLock<()>>>> {
        // The map holds no invariants a panic could break.
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_for(&self, user_id: &str) -> Arc<RwLock<()>> {
        let mut map = self.map();
        if !map.contains_key(user_id) && map.len() >= PRUNE_THRESHOLD {
            prune_idle(&mut map);
        }
        Arc::clone(map.entry(user_id.to_string()).or_default())
    }

    /// Shared access for journal reads and writes.
    pub async fn read(&self, user_id: &str) -> OwnedRwLockReadGuard<()> {
        self.lock_for(user_id).read_owned().await
    }

    /// Exclusive access for key rotation.
    pub async fn write(&self, user_id: &str) -> OwnedRwLockWriteGuard<()> {
        self.lock_for(user_id).write_owned().await
    }

    /// Exclusive access if nobody else holds the user's lock right now.
    pub fn try_write(&self, user_id: &str) -> Option<OwnedRwLockWriteGuard<()>> {
        self.lock_for(user_id).try_write_owned().ok()
    }

    /// Drops locks nobody holds or waits on.
    pub fn prune(&self) {
        prune_idle(&mut self.map());
    }

    /// Number of users with a registered lock.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }
}

fn prune_idle(map: &mut HashMap<String, Arc<RwLock<()>>>) {
    // Owned guards keep a clone of the Arc alive.
    map.retain(|_, lock| Arc::strong_count(lock) > 1);
}
