//! Per-user turn serialization.
//!
//! Only one chat turn runs per user at a time, so a user's message and the
//! reply it produced are always adjacent in history. A second message from
//! the same user queues behind the first. Entries exist only while a turn
//! is running or queued, so the map stays as small as the set of active
//! users.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use cb_domain::error::{Error, Result};

type Slots = Arc<Mutex<HashMap<String, Arc<Semaphore>>>>;

/// One single-permit semaphore per user key with a turn in flight.
#[derive(Default)]
pub struct TurnLockMap {
    slots: Slots,
}

/// Exclusive right to run one turn for a user. Releasing it hands the turn
/// to the next queued caller, or forgets the user if nobody is queued.
pub struct TurnGuard {
    user_key: String,
    permit: Option<OwnedSemaphorePermit>,
    slots: Slots,
}

impl TurnLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other turn for `user_key` is running.
    pub async fn acquire(&self, user_key: &str) -> Result<TurnGuard> {
        // Cloning under the map lock counts this caller before it waits, so
        // a releasing guard never forgets a slot someone is queued on.
        let sem = self
            .slots
            .lock()
            .entry(user_key.to_owned())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone();

        let permit = match sem.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!(user_key = %user_key, "turn in progress, queued");
                sem.acquire_owned()
                    .await
                    .map_err(|_| Error::Other(format!("turn lock for {user_key} closed")))?
            }
        };

        Ok(TurnGuard {
            user_key: user_key.to_owned(),
            permit: Some(permit),
            slots: self.slots.clone(),
        })
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        let mut slots = self.slots.lock();
        // The permit holds one reference, the map another. Anything beyond
        // that is a queued caller.
        drop(self.permit.take());
        if slots
            .get(&self.user_key)
            .is_some_and(|sem| Arc::strong_count(sem) == 1)
        {
            slots.remove(&self.user_key);
        }
    }
}
