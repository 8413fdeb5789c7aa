//! In-Flight Registry Module
//!
//! Process-local set of keys currently being revalidated. Each marked key
//! owns a broadcast signal that wakes every caller queued on it when the key
//! settles. Coordination is per engine instance only; two engines sharing a
//! storage backend do not see each other's markers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

/// Identifies one marker; only its holder may settle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerId(u64);

#[derive(Debug)]
struct Marker {
    id: MarkerId,
    settled: watch::Sender<bool>,
}

/// Outcome of `InFlightRegistry::claim`.
#[derive(Debug)]
pub enum Claim {
    /// The key was free and is now marked for the caller.
    Acquired(MarkerId),
    /// Someone else holds the key.
    InFlight(Waiter),
}

/// Resolves when the marker it was created for settles.
#[derive(Debug)]
pub struct Waiter {
    settled: watch::Receiver<bool>,
}

impl Waiter {
    pub async fn wait(mut self) {
        // Err means the sender was dropped, which is also a settle
        let _ = self.settled.changed().await;
    }
}

// == In-Flight Registry ==
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    keys: Mutex<HashMap<String, Marker>>,
    next_id: AtomicU64,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // == Claim ==
    /// Marks `key` for the caller, or hands back a waiter on the current holder.
    ///
    /// Check and insert happen under one lock, so two callers can never both
    /// acquire the same key. The waiter subscribes under that lock too, so a
    /// settle racing with this call can never be missed. Callers that waited
    /// must claim again: another waiter may have acquired the key first.
    pub fn claim(&self, key: &str) -> Claim {
        let mut keys = self.keys.lock();

        if let Some(marker) = keys.get(key) {
            return Claim::InFlight(Waiter {
                settled: marker.settled.subscribe(),
            });
        }

        let id = MarkerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        keys.insert(
            key.to_string(),
            Marker {
                id,
                settled: watch::channel(false).0,
            },
        );
        Claim::Acquired(id)
    }

    // == Settle ==
    /// Clears the marker `id` of `key` and wakes every waiter queued on it.
    ///
    /// Does nothing if `key` is now held under a different marker. Returns
    /// whether a marker was cleared.
    pub fn settle(&self, key: &str, id: MarkerId) -> bool {
        let mut keys = self.keys.lock();
        match keys.get(key) {
            Some(marker) if marker.id == id => {}
            _ => return false,
        }

        if let Some(marker) = keys.remove(key) {
            marker.settled.send_replace(true);
        }
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn acquire(registry: &InFlightRegistry, key: &str) -> MarkerId {
        match registry.claim(key) {
            Claim::Acquired(id) => id,
            Claim::InFlight(_) => panic!("{} should be free", key),
        }
    }

    fn wait_on(registry: &InFlightRegistry, key: &str) -> Waiter {
        match registry.claim(key) {
            Claim::InFlight(waiter) => waiter,
            Claim::Acquired(_) => panic!("{} should be held", key),
        }
    }

    #[test]
    fn test_claim_and_settle() {
        let registry = InFlightRegistry::new();

        let id = acquire(&registry, "k");
        assert!(registry.contains("k"));
        assert!(matches!(registry.claim("k"), Claim::InFlight(_)));
        assert_eq!(registry.len(), 1);

        assert!(registry.settle("k", id));
        assert!(registry.is_empty());
        // Settling twice is harmless
        assert!(!registry.settle("k", id));
    }

    #[test]
    fn test_settle_only_clears_own_marker() {
        let registry = InFlightRegistry::new();

        let old = acquire(&registry, "k");
        registry.settle("k", old);
        let current = acquire(&registry, "k");

        // A stale holder must not release the current one
        assert!(!registry.settle("k", old));
        assert!(registry.contains("k"));

        assert!(registry.settle("k", current));
        assert!(!registry.contains("k"));
    }

    #[tokio::test]
    async fn test_settle_wakes_every_waiter() {
        let registry = Arc::new(InFlightRegistry::new());
        let id = acquire(&registry, "k");

        let first = wait_on(&registry, "k");
        let second = wait_on(&registry, "k");

        registry.settle("k", id);

        tokio::time::timeout(Duration::from_secs(1), async {
            first.wait().await;
            second.wait().await;
        })
        .await
        .expect("waiters should be woken by settle");
    }

    #[tokio::test]
    async fn test_only_one_woken_waiter_reacquires() {
        let registry = InFlightRegistry::new();
        let id = acquire(&registry, "k");

        let first = wait_on(&registry, "k");
        let second = wait_on(&registry, "k");
        registry.settle("k", id);
        first.wait().await;
        second.wait().await;

        assert!(matches!(registry.claim("k"), Claim::Acquired(_)));
        assert!(matches!(registry.claim("k"), Claim::InFlight(_)));
    }

    #[tokio::test]
    async fn test_waiter_created_before_settle_is_not_lost() {
        let registry = Arc::new(InFlightRegistry::new());
        let id = acquire(&registry, "k");

        // Armed but not yet polled when the settle happens
        let waiter = wait_on(&registry, "k");
        let settler = registry.clone();
        tokio::spawn(async move { settler.settle("k", id) })
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(1), waiter.wait())
            .await
            .expect("settle must not be missed");
    }

    #[tokio::test]
    async fn test_other_keys_are_independent() {
        let registry = InFlightRegistry::new();
        acquire(&registry, "a");
        let b = acquire(&registry, "b");

        let waiter = wait_on(&registry, "a");
        registry.settle("b", b);

        let result = tokio::time::timeout(Duration::from_millis(50), waiter.wait()).await;
        assert!(result.is_err(), "settling b must not wake a");
        assert!(registry.contains("a"));
    }
}
