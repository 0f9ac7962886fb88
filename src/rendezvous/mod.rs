use anyhow::anyhow;
use serde::Deserialize;
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{RecError, RecResult};

/// What the emotion-detection worker posts back.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CallbackPayload {
    pub emotion: String,
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Keys tracked at once by a `Rendezvous` or a `StatusBoard`. Past this the
/// stalest idle entry makes room.
pub const MAX_TRACKED_KEYS: usize = 1024;

struct Slot<T> {
    tx: watch::Sender<Option<T>>,
    waiting: bool,
    touched: Instant,
}

impl<T> Slot<T> {
    fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Slot {
            tx,
            waiting: false,
            touched: Instant::now(),
        }
    }

    fn is_empty(&self) -> bool {
        self.tx.borrow().is_none()
    }
}

/// Hands a value produced out of band to a request waiting for it.
///
/// One slot per key. Deliveries overwrite whatever is still unconsumed, so the
/// waiter sees the latest one. Only one waiter per key at a time. A slot lives
/// only while it holds a delivery or has a waiter.
pub struct Rendezvous<T> {
    slots: Mutex<HashMap<String, Slot<T>>>,
    timeout: Duration,
}

impl<T: Send + Sync> Rendezvous<T> {
    pub fn new(timeout: Duration) -> Self {
        Rendezvous {
            slots: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot<T>>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn deliver(&self, key: &str, value: T) {
        let mut slots = self.slots();
        if !slots.contains_key(key) {
            make_room(&mut slots);
        }
        let slot = slots.entry(key.to_string()).or_insert_with(Slot::new);
        slot.touched = Instant::now();
        if slot.tx.send_replace(Some(value)).is_some() {
            debug!(key, "Overwriting unconsumed delivery");
        }
        info!(key, waiting = slot.waiting, "Delivery received");
    }

    /// Keys currently holding a delivery or a waiter.
    pub fn slot_count(&self) -> usize {
        self.slots().len()
    }

    /// Waits for the next delivery on `key`, or returns one already sitting in
    /// the slot. The value is consumed.
    pub async fn wait(&self, key: &str) -> RecResult<T> {
        let mut rx = {
            let mut slots = self.slots();
            if !slots.contains_key(key) {
                make_room(&mut slots);
            }
            let slot = slots.entry(key.to_string()).or_insert_with(Slot::new);
            if slot.waiting {
                return Err(RecError::WaitInProgress(key.to_string()));
            }
            slot.waiting = true;
            slot.tx.subscribe()
        };
        let _guard = WaitGuard {
            rendezvous: self,
            key,
        };

        match tokio::time::timeout(self.timeout, rx.wait_for(Option::is_some)).await {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => return Err(RecError::Internal(anyhow!("rendezvous slot closed"))),
            Err(_) => {
                info!(key, "Timed out waiting for delivery");
                return Err(RecError::CallbackTimeout);
            }
        }

        // Bound to a local so the slots lock is released before the guard runs.
        let taken = self
            .slots()
            .get(key)
            .and_then(|slot| slot.tx.send_replace(None));
        taken.ok_or_else(|| RecError::Internal(anyhow!("delivery vanished before it was taken")))
    }
}

struct WaitGuard<'a, T: Send + Sync> {
    rendezvous: &'a Rendezvous<T>,
    key: &'a str,
}

impl<T: Send + Sync> Drop for WaitGuard<'_, T> {
    fn drop(&mut self) {
        let mut slots = self.rendezvous.slots();
        let drained = match slots.get_mut(self.key) {
            Some(slot) => {
                slot.waiting = false;
                slot.is_empty()
            }
            None => false,
        };
        // A delivery that lands after a timeout stays for the next waiter.
        if drained {
            slots.remove(self.key);
        }
    }
}

/// Evicts the stalest slot nobody is waiting on once the map is full.
fn make_room<T>(slots: &mut HashMap<String, Slot<T>>) {
    if slots.len() < MAX_TRACKED_KEYS {
        return;
    }
    let stalest = slots
        .iter()
        .filter(|(_, slot)| !slot.waiting)
        .min_by_key(|(_, slot)| slot.touched)
        .map(|(key, _)| key.clone());
    if let Some(key) = stalest {
        warn!(key, "Too many pending deliveries, dropping the stalest");
        slots.remove(&key);
    }
}

/// Last progress report per job, polled by the frontend.
#[derive(Default)]
pub struct StatusBoard {
    statuses: Mutex<HashMap<String, (String, Instant)>>,
}

impl StatusBoard {
    pub const IDLE: &'static str = "idle";

    pub fn new() -> Self {
        Self::default()
    }

    fn statuses(&self) -> MutexGuard<'_, HashMap<String, (String, Instant)>> {
        self.statuses.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set(&self, key: &str, status: &str) {
        let mut statuses = self.statuses();
        if !statuses.contains_key(key) && statuses.len() >= MAX_TRACKED_KEYS {
            let stalest = statuses
                .iter()
                .min_by_key(|(_, (_, at))| *at)
                .map(|(key, _)| key.clone());
            if let Some(stalest) = stalest {
                statuses.remove(&stalest);
            }
        }
        statuses.insert(key.to_string(), (status.to_string(), Instant::now()));
    }

    pub fn get(&self, key: &str) -> String {
        self.statuses()
            .get(key)
            .map(|(status, _)| status.clone())
            .unwrap_or_else(|| Self::IDLE.to_string())
    }

    pub fn clear(&self, key: &str) {
        self.statuses().remove(key);
    }

    pub fn tracked(&self) -> usize {
        self.statuses().len()
    }
}
