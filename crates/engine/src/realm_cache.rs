//! Per-user cache of the visible realm list.
//!
//! Filled lazily by `get_realms` and cleared whenever a `RealmChanged` event
//! is flushed, before any subscriber sees that event. A fill that raced with
//! an invalidation is discarded.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::RealmView;

#[derive(Debug, Default)]
struct Entries {
    generation: u64,
    by_user: HashMap<String, Vec<RealmView>>,
}

#[derive(Clone, Debug, Default)]
pub struct RealmCache {
    entries: Arc<Mutex<Entries>>,
}

impl RealmCache {
    fn guard(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached list, or the generation a later [`put`](Self::put) must
    /// present.
    pub fn get(&self, user_id: &str) -> Result<Vec<RealmView>, u64> {
        let entries = self.guard();
        entries
            .by_user
            .get(user_id)
            .cloned()
            .ok_or(entries.generation)
    }

    pub fn put(&self, user_id: &str, generation: u64, realms: Vec<RealmView>) {
        let mut entries = self.guard();
        if entries.generation == generation {
            entries.by_user.insert(user_id.to_string(), realms);
        }
    }

    pub fn invalidate(&self) {
        let mut entries = self.guard();
        entries.generation += 1;
        entries.by_user.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccessLevel, Currency};

    fn view() -> RealmView {
        RealmView {
            id: "home".to_string(),
            name: "Home".to_string(),
            currency: Currency::Eur,
            access_level: AccessLevel::Owner,
        }
    }

    #[test]
    fn invalidate_clears_every_user() {
        let cache = RealmCache::default();
        let generation = cache.get("alice").unwrap_err();
        cache.put("alice", generation, vec![view()]);
        cache.put("bob", generation, vec![]);
        assert_eq!(cache.get("alice"), Ok(vec![view()]));

        cache.invalidate();
        assert!(cache.get("alice").is_err());
        assert!(cache.get("bob").is_err());
    }

    #[test]
    fn stale_fill_is_dropped() {
        let cache = RealmCache::default();
        let generation = cache.get("alice").unwrap_err();
        cache.invalidate();
        cache.put("alice", generation, vec![view()]);
        assert!(cache.get("alice").is_err());
    }
}
