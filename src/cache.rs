use crate::envelope;
use crate::key::{Key, KeyRing};
use crate::{Error, Result, Value};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The data of one client's session, for the duration of one request.
///
/// The cache tracks whether it was changed, so that the session cookie is only written when
/// necessary. Only the data and the expiry are part of the cookie, the change tracking flags are
/// reset with each request.
///
/// After [`destroy`](SessionCache::destroy) was called, every further access to the data
/// **panics**, since it indicates a logic error in the request handler.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionCache {
    data: BTreeMap<String, Value>,
    expiry: DateTime<Utc>,
    dirty: bool,
    destroyed: bool,
}

/// The part of the cache that is stored in the cookie.
#[derive(Serialize, Deserialize)]
struct CacheRecord {
    data: BTreeMap<String, Value>,
    expiry: DateTime<Utc>,
}

impl SessionCache {
    /// Create an empty cache that expires `lifetime` after `now`.
    ///
    /// Lifetimes too large to be represented are clamped to the maximum representable expiry.
    pub fn new(lifetime: std::time::Duration, now: DateTime<Utc>) -> Self {
        let expiry = Duration::from_std(lifetime)
            .ok()
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            data: BTreeMap::new(),
            expiry,
            dirty: false,
            destroyed: false,
        }
    }

    /// Insert a value, replacing any existing value under the same key.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.assert_not_destroyed();
        self.data.insert(key.into(), value.into());
        self.dirty = true;
    }

    /// Returns a copy of the value under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.assert_not_destroyed();
        self.data.get(key).cloned()
    }

    /// Remove and return the value under `key`.
    /// The cache only counts as changed if there was such a value.
    pub fn pop(&mut self, key: &str) -> Option<Value> {
        self.assert_not_destroyed();
        let value = self.data.remove(key);
        if value.is_some() {
            self.dirty = true;
        }
        value
    }

    /// Remove the value under `key`, if any.
    /// The cache only counts as changed if there was such a value.
    pub fn remove(&mut self, key: &str) {
        self.pop(key);
    }

    /// Returns true if there is a value under `key`.
    pub fn exists(&self, key: &str) -> bool {
        self.assert_not_destroyed();
        self.data.contains_key(key)
    }

    /// All keys in alphabetical order.
    pub fn keys(&self) -> Vec<String> {
        self.assert_not_destroyed();
        self.data.keys().cloned().collect()
    }

    /// Remove all values, keeping the session itself and its expiry.
    /// The cache only counts as changed if it held any value.
    pub fn clear(&mut self) {
        self.assert_not_destroyed();
        if !self.data.is_empty() {
            self.data.clear();
            self.dirty = true;
        }
    }

    /// Delete all data and mark the session for destruction.
    /// The client will be instructed to delete its session cookie.
    pub fn destroy(&mut self) {
        self.data.clear();
        // The Unix epoch.
        self.expiry = DateTime::<Utc>::default();
        self.dirty = true;
        self.destroyed = true;
    }

    /// The absolute point in time after which this session is void.
    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    /// Returns true if the session expired before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry < now
    }

    /// Returns true if the cache was changed since it was created or loaded.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns true if the session was destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Serialize the data and expiry of this cache and encrypt them under `key`.
    pub fn encode(&self, key: &Key) -> Result<String> {
        let record = CacheRecord {
            data: self.data.clone(),
            expiry: self.expiry,
        };
        let plaintext = rmp_serde::to_vec(&record)?;
        envelope::encode(&plaintext, key)
    }

    /// Decrypt and deserialize a cache from a token.
    /// The resulting cache counts as unchanged.
    pub fn decode(token: &str, keys: &KeyRing) -> Result<Self> {
        let plaintext = envelope::decode(token, keys)?;
        let record: CacheRecord = rmp_serde::from_slice(&plaintext).map_err(|error| {
            log::warn!("Authenticated session token holds undecodable data: {error}");
            Error::InvalidToken
        })?;
        Ok(Self {
            data: record.data,
            expiry: record.expiry,
            dirty: false,
            destroyed: false,
        })
    }

    fn assert_not_destroyed(&self) {
        if self.destroyed {
            panic!("{}", Error::DestroyedSessionAccess);
        }
    }
}
