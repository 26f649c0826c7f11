//! In-memory atomic store.

use chrono::{DateTime, Utc};
use flash_sale_core::environment::{Clock, SystemClock};
use flash_sale_core::keys::ReservationKeys;
use flash_sale_core::protocol::{
    DecrementPlan, DecrementReply, DecrementSnapshot, parse_counter, plan_decrement,
};
use flash_sale_core::{AtomicStore, Result, StockError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Value written for presence-only flags.
const FLAG: &str = "1";

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

/// Mutex-guarded map implementing [`AtomicStore`].
///
/// Every operation runs under one lock that is never held across an
/// `.await`, so scripts are serialized exactly as Redis serializes Lua
/// scripts. Expired entries are dropped lazily when touched.
///
/// Suitable for tests and single-node deployments. Clones share state.
///
/// # Example
///
/// ```
/// use flash_sale_testing::InMemoryAtomicStore;
/// use flash_sale_core::{ReservationConfig, StockService};
///
/// let service = StockService::new(InMemoryAtomicStore::new(), ReservationConfig::default());
/// ```
#[derive(Clone)]
pub struct InMemoryAtomicStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryAtomicStore {
    /// Create an empty store using wall-clock time.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store evaluating TTLs against `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    /// Number of live entries.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        let now = self.clock.now();
        let entries = self.lock("len")?;
        Ok(entries.values().filter(|entry| is_live(entry, now)).count())
    }

    /// Returns `true` if no live entries remain.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Remaining time to live of `key`, `None` if absent or persistent.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = self.clock.now();
        let mut entries = self.lock("ttl")?;
        Ok(live(&mut entries, key, now)
            .and_then(|entry| entry.expires_at)
            .and_then(|at| (at - now).to_std().ok()))
    }

    /// Write a raw value with no expiry, bypassing the protocol.
    ///
    /// Lets tests plant corrupt or legacy data.
    ///
    /// # Errors
    ///
    /// Returns error if the lock is poisoned.
    pub fn insert_raw(&self, key: &str, value: &str) -> Result<()> {
        self.lock("insert_raw")?.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries.lock().map_err(|_| StockError::Command {
            operation,
            message: "in-memory store lock poisoned".to_string(),
        })
    }

    fn expiry(&self, ttl: Duration) -> Option<DateTime<Utc>> {
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| self.clock.now().checked_add_signed(ttl))
    }

    fn flag(&self, ttl: Duration) -> Entry {
        Entry {
            value: FLAG.to_string(),
            expires_at: self.expiry(ttl),
        }
    }
}

impl Default for InMemoryAtomicStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryAtomicStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAtomicStore").finish_non_exhaustive()
    }
}

fn is_live(entry: &Entry, now: DateTime<Utc>) -> bool {
    entry.expires_at.is_none_or(|at| at > now)
}

/// Look up `key`, dropping it first if it has expired.
fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str, now: DateTime<Utc>) -> Option<&'a Entry> {
    if entries.get(key).is_some_and(|entry| !is_live(entry, now)) {
        entries.remove(key);
    }
    entries.get(key)
}

fn counter(entries: &mut HashMap<String, Entry>, key: &str, now: DateTime<Utc>) -> Result<Option<i64>> {
    live(entries, key, now)
        .map(|entry| parse_counter(key, &entry.value))
        .transpose()
}

impl AtomicStore for InMemoryAtomicStore {
    async fn decrement(
        &self,
        keys: &ReservationKeys,
        quantity: i64,
        participation_ttl: Duration,
        sold_out_ttl: Duration,
    ) -> Result<DecrementReply> {
        let now = self.clock.now();
        let mut entries = self.lock("decrement")?;

        let sold_out = live(&mut entries, &keys.sold_out, now).is_some();
        let participating = live(&mut entries, &keys.participation, now).is_some();
        // The counter is only parsed once both flags are known to be absent.
        let stock = if sold_out || participating {
            None
        } else {
            counter(&mut entries, &keys.stock, now)?
        };
        let snapshot = DecrementSnapshot {
            sold_out,
            participating,
            stock,
        };
        let plan = plan_decrement(snapshot, quantity);

        match plan {
            DecrementPlan::Reject(_) => {}
            DecrementPlan::MarkSoldOut { .. } => {
                entries.insert(keys.sold_out.clone(), self.flag(sold_out_ttl));
            }
            DecrementPlan::Reserve { remaining, sold_out } => {
                if let Some(entry) = entries.get_mut(&keys.stock) {
                    entry.value = remaining.to_string();
                }
                entries.insert(keys.participation.clone(), self.flag(participation_ttl));
                if sold_out {
                    entries.insert(keys.sold_out.clone(), self.flag(sold_out_ttl));
                }
            }
        }

        Ok(DecrementReply::from(plan.outcome()))
    }

    async fn restore(&self, keys: &ReservationKeys, quantity: i64, fallback_ttl: Duration) -> Result<i64> {
        let now = self.clock.now();
        let mut entries = self.lock("restore")?;

        let current = counter(&mut entries, &keys.stock, now)?;
        let restored = current
            .unwrap_or(0)
            .checked_add(quantity)
            .ok_or_else(|| StockError::Command {
                operation: "restore",
                message: "increment or decrement would overflow".to_string(),
            })?;

        if current.is_some() {
            if let Some(entry) = entries.get_mut(&keys.stock) {
                entry.value = restored.to_string();
            }
        } else {
            let entry = Entry {
                value: restored.to_string(),
                expires_at: self.expiry(fallback_ttl),
            };
            entries.insert(keys.stock.clone(), entry);
        }
        entries.remove(&keys.sold_out);
        entries.remove(&keys.participation);

        Ok(restored)
    }

    async fn batch_stock(&self, keys: &[String]) -> Result<Vec<Option<i64>>> {
        let now = self.clock.now();
        let mut entries = self.lock("batch_stock")?;

        keys.iter().map(|key| counter(&mut entries, key, now)).collect()
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: self.expiry(ttl),
        };
        self.lock("set_ex")?.insert(key.to_string(), entry);
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = self.clock.now();
        let mut entries = self.lock("set_nx_ex")?;

        if live(&mut entries, key, now).is_some() {
            return Ok(false);
        }
        let entry = Entry {
            value: value.to_string(),
            expires_at: self.expiry(ttl),
        };
        entries.insert(key.to_string(), entry);
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let mut entries = self.lock("get")?;
        Ok(live(&mut entries, key, now).map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = self.clock.now();
        let mut entries = self.lock("delete")?;
        let existed = live(&mut entries, key, now).is_some();
        entries.remove(key);
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let now = self.clock.now();
        let mut entries = self.lock("exists")?;
        Ok(live(&mut entries, key, now).is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use flash_sale_core::{DecrementOutcome, EventId, UserId};

    fn keys() -> ReservationKeys {
        ReservationKeys::new(EventId::new(1), UserId::new(1))
    }

    #[tokio::test]
    async fn test_entries_expire_with_clock() {
        let clock = ManualClock::default();
        let store = InMemoryAtomicStore::with_clock(Arc::new(clock.clone()));

        store.set_ex("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        clock.advance(Duration::from_secs(10));
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_set_nx_only_writes_once() {
        let store = InMemoryAtomicStore::new();
        assert!(store.set_nx_ex("k", "a", Duration::from_secs(10)).await.unwrap());
        assert!(!store.set_nx_ex("k", "b", Duration::from_secs(10)).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_decrement_keeps_counter_ttl() {
        let clock = ManualClock::default();
        let store = InMemoryAtomicStore::with_clock(Arc::new(clock.clone()));
        let keys = keys();

        store.set_ex(&keys.stock, "5", Duration::from_secs(60)).await.unwrap();
        clock.advance(Duration::from_secs(20));

        let reply = store
            .decrement(&keys, 2, Duration::from_secs(30), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(reply.into_outcome(), Ok(DecrementOutcome::Success { remaining: 3 }));
        assert_eq!(store.ttl(&keys.stock).unwrap(), Some(Duration::from_secs(40)));
        assert_eq!(store.ttl(&keys.participation).unwrap(), Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_restore_recreates_expired_counter_with_fallback_ttl() {
        let store = InMemoryAtomicStore::new();
        let keys = keys();

        let stock = store.restore(&keys, 2, Duration::from_secs(90)).await.unwrap();
        assert_eq!(stock, 2);
        assert!(store.ttl(&keys.stock).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_corrupt_counter_is_reported() {
        let store = InMemoryAtomicStore::new();
        let keys = keys();
        store.insert_raw(&keys.stock, "many").unwrap();

        let result = store
            .decrement(&keys, 1, Duration::from_secs(1), Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(StockError::InvalidInteger { .. })));
    }

    #[tokio::test]
    async fn test_flags_win_over_corrupt_counter() {
        let store = InMemoryAtomicStore::new();
        let keys = keys();
        store.insert_raw(&keys.stock, "many").unwrap();
        store.insert_raw(&keys.sold_out, FLAG).unwrap();

        let reply = store
            .decrement(&keys, 1, Duration::from_secs(1), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply.into_outcome(), Ok(DecrementOutcome::SoldOut));

        store.delete(&keys.sold_out).await.unwrap();
        store.insert_raw(&keys.participation, FLAG).unwrap();

        let reply = store
            .decrement(&keys, 1, Duration::from_secs(1), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(reply.into_outcome(), Ok(DecrementOutcome::DuplicateUser));
        assert_eq!(store.get(&keys.stock).await.unwrap(), Some("many".to_string()));
    }

    #[tokio::test]
    async fn test_longest_ttl_never_expires() {
        let clock = ManualClock::default();
        let store = InMemoryAtomicStore::with_clock(Arc::new(clock.clone()));

        store.set_ex("k", "v", Duration::MAX).await.unwrap();
        clock.advance(Duration::from_secs(10 * 365 * 86_400));

        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }
}
