//! Per-phone turn serialization.
//!
//! Turns from the same phone are processed in arrival order and never
//! concurrently; different phones proceed fully in parallel. The lock is
//! held for the whole `handle(turn)` so session and draft writes cannot
//! race.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct PhoneLocks {
    inner: DashMap<String, Arc<Mutex<()>>>,
}

impl PhoneLocks {
    pub fn new() -> Self {
        PhoneLocks::default()
    }

    /// Entries are never evicted; the table is bounded by the number of
    /// distinct phones this instance has ever served.
    pub async fn acquire(&self, phone: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .inner
            .entry(phone.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn same_phone_serializes_critical_sections() {
        let locks = Arc::new(PhoneLocks::new());
        let in_flight = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let in_flight = in_flight.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("+905551234567").await;
                assert_eq!(in_flight.fetch_add(1, Ordering::SeqCst), 0);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn different_phones_do_not_block_each_other() {
        let locks = PhoneLocks::new();
        let _a = locks.acquire("+905550000001").await;
        // Acquiring a different phone while holding the first must not hang.
        let _b = locks.acquire("+905550000002").await;
    }
}
