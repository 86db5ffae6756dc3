//! Helpers for testing request handlers without the session middleware.

use crate::{Session, SessionCache};
use chrono::Utc;
use http::Request;
use std::time::Duration;

/// Attach a fresh, empty session that expires after `lifetime` to `request`, and return it.
///
/// This allows calling handlers that use [`Session::from_request`] directly.
/// Any session already attached to the request is replaced.
pub fn attach_session<Body>(request: &mut Request<Body>, lifetime: Duration) -> Session {
    let session = Session::new(SessionCache::new(lifetime, Utc::now()));
    request.extensions_mut().insert(session.clone());
    session
}
