//! Time- and cost-bounded entitlement cache.
//!
//! Resolving entitlements costs a round trip to the platform, so results
//! are memoised per bearer token. Entries live for a fixed TTL and each
//! one is charged a fixed admission cost against a total budget; when
//! the budget is exhausted the entries closest to expiry are evicted
//! first. Nothing else in the system invalidates entries: the token is
//! the unit of staleness.
//!
//! Concurrent misses for the same token may each call the resolver; the
//! last result written wins.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use cop_relay_core::EntitlementSet;

use crate::error::Result;
use crate::resolver::EntitlementResolver;

/// Prefix of every cache key.
pub const CACHE_KEY_PREFIX: &str = "entitlements-";

/// Cache limits.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a resolved set is served without asking again.
    pub ttl: Duration,
    /// Cost charged per entry.
    pub entry_cost: u64,
    /// Total cost budget.
    pub max_cost: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(15 * 60),
            entry_cost: 1000,
            max_cost: 1 << 30,
        }
    }
}

/// Memoising front for an [`EntitlementResolver`].
pub struct EntitlementCache<R> {
    resolver: R,
    config: CacheConfig,
    inner: RwLock<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    total_cost: u64,
}

struct CacheEntry {
    value: EntitlementSet,
    expires_at: Instant,
    cost: u64,
}

impl<R: EntitlementResolver> EntitlementCache<R> {
    /// Create a cache in front of `resolver`.
    pub fn new(resolver: R, config: CacheConfig) -> Self {
        Self {
            resolver,
            config,
            inner: RwLock::new(CacheInner::default()),
        }
    }

    /// Cache key for a token.
    pub fn cache_key(token: &str) -> String {
        format!("{CACHE_KEY_PREFIX}{token}")
    }

    /// Resolve `token`, serving from cache when a live entry exists.
    ///
    /// Resolver failures propagate and leave the cache untouched.
    pub async fn resolve(&self, token: &str) -> Result<EntitlementSet> {
        let key = Self::cache_key(token);

        if let Some(hit) = self.lookup(&key) {
            debug!("entitlement cache hit");
            return Ok(hit);
        }

        debug!("entitlement cache miss");
        let value = self.resolver.resolve(token).await?;
        self.admit(key, value.clone());
        Ok(value)
    }

    /// The wrapped resolver.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of unexpired entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.read()
            .entries
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total cost currently charged, including not-yet-purged expired entries.
    pub fn total_cost(&self) -> u64 {
        self.read().total_cost
    }

    fn lookup(&self, key: &str) -> Option<EntitlementSet> {
        let inner = self.read();
        inner
            .entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone())
    }

    fn admit(&self, key: String, value: EntitlementSet) {
        let cost = self.config.entry_cost;
        if cost > self.config.max_cost {
            debug!(cost, max_cost = self.config.max_cost, "entry exceeds cache budget");
            return;
        }

        let now = Instant::now();
        let mut inner = self.write();

        inner.purge_expired(now);
        if let Some(previous) = inner.entries.remove(&key) {
            inner.total_cost -= previous.cost;
        }
        while inner.total_cost + cost > self.config.max_cost {
            if !inner.evict_soonest() {
                break;
            }
        }

        inner.total_cost += cost;
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + self.config.ttl,
                cost,
            },
        );
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl CacheInner {
    fn purge_expired(&mut self, now: Instant) {
        let mut freed = 0;
        self.entries.retain(|_, e| {
            let live = e.expires_at > now;
            if !live {
                freed += e.cost;
            }
            live
        });
        self.total_cost -= freed;
    }

    fn evict_soonest(&mut self) -> bool {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.expires_at)
            .map(|(k, _)| k.clone());

        match victim.and_then(|k| self.entries.remove(&k)) {
            Some(evicted) => {
                self.total_cost -= evicted.cost;
                true
            }
            None => false,
        }
    }
}
