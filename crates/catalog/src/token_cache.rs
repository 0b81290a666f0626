//! In-process session token cache with lazy TTL eviction.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use time::{Duration, OffsetDateTime};

/// Time source, injected so TTL behavior is testable without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Cached session data for one token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenRecord {
    pub user_id: i64,
    pub client_ip: String,
    pub expires_at: OffsetDateTime,
}

/// Read-mostly token cache. `get` never performs I/O; misses are resolved by
/// the caller against the durable store and written back via `put`.
///
/// Expired entries are evicted lazily on the read path; there is no
/// background sweep.
pub struct TokenCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, TokenRecord>>,
}

impl TokenCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cache with the given TTL in seconds and the system clock.
    pub fn with_ttl_secs(ttl_secs: u64) -> Self {
        Self::new(Duration::seconds(ttl_secs as i64), Arc::new(SystemClock))
    }

    pub fn put(&self, token: impl Into<String>, user_id: i64, client_ip: impl Into<String>) {
        let record = TokenRecord {
            user_id,
            client_ip: client_ip.into(),
            expires_at: self.clock.now() + self.ttl,
        };
        self.entries
            .write()
            .expect("token cache lock poisoned")
            .insert(token.into(), record);
    }

    /// Look up a token. An expired entry is erased under the exclusive lock
    /// (after re-checking, since a racing `put` may have refreshed it).
    pub fn get(&self, token: &str) -> Option<TokenRecord> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().expect("token cache lock poisoned");
            match entries.get(token) {
                Some(record) if record.expires_at > now => return Some(record.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().expect("token cache lock poisoned");
        if let Some(record) = entries.get(token) {
            if record.expires_at > now {
                return Some(record.clone());
            }
            entries.remove(token);
        }
        None
    }

    pub fn remove(&self, token: &str) {
        self.entries
            .write()
            .expect("token cache lock poisoned")
            .remove(token);
    }

    /// Raw presence check, without the eviction side effect.
    pub fn contains(&self, token: &str) -> bool {
        self.entries
            .read()
            .expect("token cache lock poisoned")
            .contains_key(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ManualClock {
        now: Mutex<OffsetDateTime>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(OffsetDateTime::UNIX_EPOCH),
            })
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> OffsetDateTime {
            *self.now.lock().unwrap()
        }
    }

    #[test]
    fn hit_within_ttl() {
        let clock = ManualClock::new();
        let cache = TokenCache::new(Duration::seconds(3600), clock.clone());
        cache.put("tok", 7, "10.0.0.1");

        clock.advance(Duration::seconds(3599));
        let record = cache.get("tok").unwrap();
        assert_eq!(record.user_id, 7);
        assert_eq!(record.client_ip, "10.0.0.1");
    }

    #[test]
    fn expired_entry_is_erased_on_read() {
        let clock = ManualClock::new();
        let cache = TokenCache::new(Duration::seconds(3600), clock.clone());
        cache.put("tok", 7, "10.0.0.1");

        clock.advance(Duration::seconds(3601));
        assert!(cache.get("tok").is_none());
        // Lazy eviction removed the entry, not just hid it.
        assert!(!cache.contains("tok"));
    }

    #[test]
    fn put_refreshes_expiry() {
        let clock = ManualClock::new();
        let cache = TokenCache::new(Duration::seconds(100), clock.clone());
        cache.put("tok", 1, "ip");
        clock.advance(Duration::seconds(90));
        cache.put("tok", 1, "ip");
        clock.advance(Duration::seconds(90));
        assert!(cache.get("tok").is_some());
    }

    #[test]
    fn remove_is_explicit_logout() {
        let clock = ManualClock::new();
        let cache = TokenCache::new(Duration::seconds(100), clock);
        cache.put("tok", 1, "ip");
        cache.remove("tok");
        assert!(cache.get("tok").is_none());
    }
}
