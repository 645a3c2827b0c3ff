//! Shared cache of `<?call?>` results.
//!
//! Entries are keyed by endpoint, method and a digest of the argument
//! bindings, and live for the duration the call declared. Two renders that
//! miss on the same key at the same time may both invoke the endpoint; the
//! later insert wins. Expired entries are dropped when their key is read
//! again and by a sweep that runs every [`PURGE_EVERY`] inserts.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use hrml_types::Value;
use sha2::{Digest, Sha256};

/// Longest lifetime an entry is given, whatever the call declared.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Inserts between sweeps of expired entries.
pub const PURGE_EVERY: usize = 64;

/// Identity of one endpoint invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallKey {
    pub endpoint: String,
    pub method: String,
    /// Hex SHA-256 of the canonical JSON of the argument map.
    pub signature: String,
}

impl CallKey {
    pub fn new(endpoint: &str, method: &str, args: &BTreeMap<String, Value>) -> Self {
        // BTreeMap keys serialize sorted, so equal bindings give equal text
        let canonical = serde_json::to_string(args).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Self {
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            signature: format!("{:x}", hasher.finalize()),
        }
    }
}

#[derive(Debug)]
struct CachedResult {
    value: Value,
    expires: Instant,
}

/// Call results shared by every render of an engine.
#[derive(Debug, Default)]
pub struct CallCache {
    entries: DashMap<CallKey, CachedResult>,
    inserts: AtomicUsize,
}

impl CallCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached value for `key`, if it has not expired.
    pub fn get(&self, key: &CallKey) -> Option<Value> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.expires > now => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }
        // the read guard is released before taking the shard for writing
        self.entries.remove_if(key, |_, entry| entry.expires <= now);
        None
    }

    /// Store `value` for `ttl`, capped at [`MAX_TTL`].
    pub fn insert(&self, key: CallKey, value: Value, ttl: Duration) {
        let now = Instant::now();
        let Some(expires) = now.checked_add(ttl.min(MAX_TTL)) else {
            tracing::debug!(endpoint = %key.endpoint, "call cache expiry out of range, not cached");
            return;
        };
        self.entries.insert(key, CachedResult { value, expires });

        if self.inserts.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            self.purge_expired();
        }
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires > now);
        tracing::trace!(purged = before.saturating_sub(self.entries.len()), "call cache sweep");
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
