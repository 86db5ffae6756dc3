use crate::{Error, Result, SessionCache, StructuredValue, Value};
use chrono::{DateTime, Utc};
use http::{Extensions, Request};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// A handle to the session of the current request.
///
/// The session middleware attaches a `Session` to each request's extensions.
/// Handlers retrieve it with [`Session::from_request`] or [`Session::from_extensions`], and read and
/// write session data through it. Clones share the same data, and every operation locks it, so a
/// handler may hand clones to concurrently running sub-tasks.
///
/// Changes are tracked automatically.
/// Writing to the session marks it as changed, and only changed sessions are sent back to the client.
///
/// # Example
///
/// ```
/// use cookie_session::mock;
/// use std::time::Duration;
///
/// let mut request = http::Request::new(());
/// let session = mock::attach_session(&mut request, Duration::from_secs(60));
///
/// session.put("msg", "hi");
/// assert_eq!(session.get_string("msg"), "hi");
/// assert_eq!(session.pop_string("msg"), "hi");
/// assert!(!session.exists("msg"));
/// ```
#[derive(Debug, Clone)]
pub struct Session {
    cache: Arc<Mutex<SessionCache>>,
}

impl Session {
    /// Wrap a cache into a session handle.
    pub fn new(cache: SessionCache) -> Self {
        Self {
            cache: Arc::new(Mutex::new(cache)),
        }
    }

    /// Returns the session attached to `request`.
    ///
    /// **Panics** if the request did not pass through the session middleware.
    pub fn from_request<Body>(request: &Request<Body>) -> Self {
        Self::from_extensions(request.extensions())
    }

    /// Returns the session stored in `extensions`.
    ///
    /// **Panics** if there is none, i.e. the request did not pass through the session middleware.
    pub fn from_extensions(extensions: &Extensions) -> Self {
        match Self::try_from_extensions(extensions) {
            Some(session) => session,
            None => panic!("{}", Error::MissingSessionContext),
        }
    }

    /// Returns the session stored in `extensions`, if any.
    pub fn try_from_extensions(extensions: &Extensions) -> Option<Self> {
        extensions.get::<Self>().cloned()
    }

    /// Lock the cache for the duration of the returned guard.
    ///
    /// Use this to perform several operations atomically.
    /// Calling other methods of this session while holding the guard deadlocks.
    pub fn lock(&self) -> MutexGuard<'_, SessionCache> {
        self.cache.lock()
    }

    /// Add a value to the session, replacing any existing value under the same key.
    pub fn put(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.lock().put(key, value);
    }

    /// Store an application type in the session.
    pub fn put_structured<T: StructuredValue>(&self, key: impl Into<String>, value: &T) -> Result {
        let value = Value::structured(value)?;
        self.lock().put(key, value);
        Ok(())
    }

    /// Returns the value under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key)
    }

    /// Returns the value under `key` and removes it from the session.
    /// This is a one-time `get`, useful for flash messages.
    pub fn pop(&self, key: &str) -> Option<Value> {
        self.lock().pop(key)
    }

    /// Removes the value under `key`.
    /// Removing a key that does not exist is a no-op and does not count as a change.
    pub fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Returns true if there is a value under `key`.
    pub fn exists(&self, key: &str) -> bool {
        self.lock().exists(key)
    }

    /// Returns all keys in alphabetical order.
    pub fn keys(&self) -> Vec<String> {
        self.lock().keys()
    }

    /// Removes all values, but keeps the session and its expiry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Destroys the session.
    /// The data is deleted and the client is instructed to delete the session cookie.
    ///
    /// Any further access to the session data within the same request **panics**.
    pub fn destroy(&self) {
        self.lock().destroy();
    }

    /// The absolute point in time at which this session expires.
    pub fn expiry(&self) -> DateTime<Utc> {
        self.lock().expiry()
    }

    /// Returns true if the session was changed during this request.
    pub fn is_dirty(&self) -> bool {
        self.lock().is_dirty()
    }

    /// Returns true if the session was destroyed during this request.
    pub fn is_destroyed(&self) -> bool {
        self.lock().is_destroyed()
    }

    /// Returns the string under `key`, or `""` if there is none or the value is not a string.
    pub fn get_string(&self, key: &str) -> String {
        self.get(key)
            .and_then(Value::into_string)
            .unwrap_or_default()
    }

    /// Returns the boolean under `key`, or `false` if there is none or the value is not a boolean.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .and_then(|value| value.as_bool())
            .unwrap_or_default()
    }

    /// Returns the integer under `key`, or `0` if there is none or the value is not an integer.
    pub fn get_int(&self, key: &str) -> i64 {
        self.get(key)
            .and_then(|value| value.as_int())
            .unwrap_or_default()
    }

    /// Returns the number under `key`, or `0.0` if there is none or the value is not a float.
    pub fn get_float(&self, key: &str) -> f64 {
        self.get(key)
            .and_then(|value| value.as_float())
            .unwrap_or_default()
    }

    /// Returns the bytes under `key`, or an empty vector if there are none or the value is not a byte sequence.
    pub fn get_bytes(&self, key: &str) -> Vec<u8> {
        self.get(key)
            .and_then(Value::into_bytes)
            .unwrap_or_default()
    }

    /// Returns the time under `key`, or the Unix epoch if there is none or the value is not a time.
    pub fn get_time(&self, key: &str) -> DateTime<Utc> {
        self.get(key)
            .and_then(|value| value.as_time())
            .unwrap_or_default()
    }

    /// Returns the application type under `key`.
    /// Returns `None` if there is none or it was stored as a different type.
    pub fn get_structured<T: StructuredValue>(&self, key: &str) -> Option<T> {
        self.get(key)?.to_structured()
    }

    /// Like [`get_string`](Self::get_string), but removes the value.
    pub fn pop_string(&self, key: &str) -> String {
        self.pop(key)
            .and_then(Value::into_string)
            .unwrap_or_default()
    }

    /// Like [`get_bool`](Self::get_bool), but removes the value.
    pub fn pop_bool(&self, key: &str) -> bool {
        self.pop(key)
            .and_then(|value| value.as_bool())
            .unwrap_or_default()
    }

    /// Like [`get_int`](Self::get_int), but removes the value.
    pub fn pop_int(&self, key: &str) -> i64 {
        self.pop(key)
            .and_then(|value| value.as_int())
            .unwrap_or_default()
    }

    /// Like [`get_float`](Self::get_float), but removes the value.
    pub fn pop_float(&self, key: &str) -> f64 {
        self.pop(key)
            .and_then(|value| value.as_float())
            .unwrap_or_default()
    }

    /// Like [`get_bytes`](Self::get_bytes), but removes the value.
    pub fn pop_bytes(&self, key: &str) -> Vec<u8> {
        self.pop(key)
            .and_then(Value::into_bytes)
            .unwrap_or_default()
    }

    /// Like [`get_time`](Self::get_time), but removes the value.
    pub fn pop_time(&self, key: &str) -> DateTime<Utc> {
        self.pop(key)
            .and_then(|value| value.as_time())
            .unwrap_or_default()
    }

    /// Like [`get_structured`](Self::get_structured), but removes the value.
    ///
    /// The value is removed even if it was stored as a different type.
    pub fn pop_structured<T: StructuredValue>(&self, key: &str) -> Option<T> {
        self.pop(key)?.to_structured()
    }
}
