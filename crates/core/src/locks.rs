//! In-process mutual exclusion keyed by record id.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, LockResult, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Slot {
    busy: Mutex<bool>,
    freed: Condvar,
}

/// Lock table handing out one exclusive guard per id at a time.
///
/// Entries exist only while some caller holds or waits for them, so the table stays as large
/// as the set of ids currently being mutated.
#[derive(Debug, Default)]
pub struct IdLocks {
    table: Mutex<HashMap<String, Arc<Slot>>>,
}

/// Holds the lock for one id until dropped.
#[derive(Debug)]
pub struct IdGuard<'a> {
    locks: &'a IdLocks,
    id: String,
    slot: Arc<Slot>,
}

// A poisoned lock only means another holder panicked; the protected state is still a plain
// bool or map and stays usable.
fn relock<'a, T>(result: LockResult<MutexGuard<'a, T>>) -> MutexGuard<'a, T> {
    result.unwrap_or_else(PoisonError::into_inner)
}

impl IdLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lock for `id` is free, then takes it.
    pub fn acquire(&self, id: &str) -> IdGuard<'_> {
        let slot = {
            let mut table = relock(self.table.lock());
            Arc::clone(table.entry(id.to_owned()).or_default())
        };

        {
            let mut busy = relock(slot.busy.lock());
            while *busy {
                busy = slot
                    .freed
                    .wait(busy)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            *busy = true;
        }

        IdGuard {
            locks: self,
            id: id.to_owned(),
            slot,
        }
    }

    /// Number of ids with a holder or waiter.
    pub fn len(&self) -> usize {
        relock(self.table.lock()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for IdGuard<'_> {
    fn drop(&mut self) {
        *relock(self.slot.busy.lock()) = false;
        self.slot.freed.notify_one();

        // Clones are only taken under the table lock, so a count of two (table + this guard)
        // means nobody is waiting.
        let mut table = relock(self.locks.table.lock());
        if Arc::strong_count(&self.slot) == 2 {
            table.remove(&self.id);
        }
    }
}
