//! Live subscriptions.
//!
//! A [`Subscription`] binds a [`ReadRequest`] to a delivery channel. The
//! [`Notifier`] stores subscriptions, bounds how many re-executions run at
//! once and keeps at most one re-execution per subscription in flight;
//! running the reads is the engine's job.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};

use crate::{ChangeEvent, ReadRequest, ReadResponse};

/// Message delivered to a subscriber.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Push {
    pub subscription_id: String,
    pub result: Option<ReadResponse>,
    pub error: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Subscription {
    pub id: String,
    pub request: ReadRequest,
    pub user_id: String,
    pub session_id: String,
    pub sender: mpsc::UnboundedSender<Push>,
}

impl Subscription {
    pub fn is_triggered_by(&self, event: &ChangeEvent) -> bool {
        let Some(event_type) = event.event_type else {
            return event.subscription_id.as_deref() == Some(self.id.as_str());
        };
        if !self.request.is_affected_by(event_type) {
            return false;
        }
        match self.request.realm_id() {
            Some(realm_id) => event.realm_id.as_deref() == Some(realm_id),
            None => true,
        }
    }
}

/// A re-execution that owns a subscription until [`Notifier::finish`]
/// releases it.
#[derive(Debug)]
pub(crate) struct Run {
    pub subscription: Subscription,
    pub token: u64,
}

#[derive(Debug)]
struct Slot {
    subscription: Subscription,
    /// Token of the run in flight, if any.
    running: Option<u64>,
    /// Triggered again while running.
    dirty: bool,
}

#[derive(Debug, Default)]
struct Registry {
    slots: HashMap<String, Slot>,
    next_token: u64,
}

#[derive(Clone, Debug)]
pub struct Notifier {
    registry: Arc<Mutex<Registry>>,
    workers: Arc<Semaphore>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WORKERS)
    }
}

impl Notifier {
    pub const DEFAULT_WORKERS: usize = 4;

    pub fn new(workers: usize) -> Self {
        Self {
            registry: Arc::default(),
            workers: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    fn guard(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds or replaces the subscription with the same id. A run in flight
    /// for the old one keeps going and picks up the replacement.
    pub fn insert(&self, subscription: Subscription) {
        let mut registry = self.guard();
        match registry.slots.get_mut(&subscription.id) {
            Some(slot) => slot.subscription = subscription,
            None => {
                registry.slots.insert(
                    subscription.id.clone(),
                    Slot {
                        subscription,
                        running: None,
                        dirty: false,
                    },
                );
            }
        }
    }

    pub fn remove(&self, subscription_id: &str) -> bool {
        self.guard().slots.remove(subscription_id).is_some()
    }

    /// Drops every subscription of a closed session, returning how many.
    pub fn remove_session(&self, session_id: &str) -> usize {
        let mut registry = self.guard();
        let before = registry.slots.len();
        registry
            .slots
            .retain(|_, slot| slot.subscription.session_id != session_id);
        before - registry.slots.len()
    }

    pub fn len(&self) -> usize {
        self.guard().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscriptions triggered by at least one of `events`, each once.
    pub fn triggered(&self, events: &[ChangeEvent]) -> Vec<Subscription> {
        self.guard()
            .slots
            .values()
            .map(|slot| &slot.subscription)
            .filter(|s| events.iter().any(|e| s.is_triggered_by(e)))
            .cloned()
            .collect()
    }

    /// Starts a run for every subscription triggered by `events` that has
    /// none in flight. Subscriptions already running are marked dirty and
    /// re-run by their current owner once it finishes.
    pub(crate) fn schedule(&self, events: &[ChangeEvent]) -> Vec<Run> {
        let mut guard = self.guard();
        let registry = &mut *guard;
        let mut runs = Vec::new();
        for slot in registry.slots.values_mut() {
            if !events.iter().any(|e| slot.subscription.is_triggered_by(e)) {
                continue;
            }
            if slot.running.is_some() {
                slot.dirty = true;
                continue;
            }
            registry.next_token += 1;
            slot.running = Some(registry.next_token);
            runs.push(Run {
                subscription: slot.subscription.clone(),
                token: registry.next_token,
            });
        }
        runs
    }

    /// Ends one pass of a run. Returns the subscription to read again when
    /// it was triggered meanwhile, or `None` once the run is released.
    pub(crate) fn finish(&self, subscription_id: &str, token: u64) -> Option<Subscription> {
        let mut registry = self.guard();
        let slot = registry.slots.get_mut(subscription_id)?;
        if slot.running != Some(token) {
            return None;
        }
        if slot.dirty {
            slot.dirty = false;
            return Some(slot.subscription.clone());
        }
        slot.running = None;
        None
    }

    /// Waits for a free re-execution slot.
    pub(crate) async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.workers.clone().acquire_owned().await.ok()
    }
}
