//! Per-phone-number mutual exclusion.
//!
//! A unit of work holds its phone's lock for the whole of `handle_message`,
//! so concurrent messages for one number serialize while distinct numbers
//! proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

/// Entries with no outstanding guard are pruned once the map grows past this.
const PRUNE_THRESHOLD: usize = 1024;

/// Keyed async locks, one per phone number seen.
#[derive(Default)]
pub struct PhoneLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PhoneLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `phone_number`, waiting if another unit of work
    /// for the same number holds it.
    pub async fn acquire(&self, phone_number: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().expect("phone lock map poisoned");
            if map.len() > PRUNE_THRESHOLD {
                // An entry with strong_count == 1 has no guard or waiter;
                // cloning requires this map mutex, so the check is race-free.
                map.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(
                map.entry(phone_number.to_string())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn same_phone_serializes() {
        let locks = Arc::new(PhoneLocks::new());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let in_flight = Arc::clone(&in_flight);
                let max_seen = Arc::clone(&max_seen);
                tokio::spawn(async move {
                    let _guard = locks.acquire("+15551230000").await;
                    let n = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(n, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_phones_do_not_block_each_other() {
        let locks = PhoneLocks::new();
        let _a = locks.acquire("+15550000001").await;
        // Would deadlock if keys shared a lock.
        let _b = locks.acquire("+15550000002").await;
    }
}
