use crate::{Error, KeyRing, Result, Session, SessionCache, SessionConfig};
use chrono::{DateTime, Utc};
use cookie::Cookie;
use http::header::COOKIE;
use http::HeaderMap;
use std::borrow::Cow;
use time::OffsetDateTime;

/// The maximum length of a serialized `Set-Cookie` header value.
/// User agents are only required to store cookies up to this size.
pub const MAX_COOKIE_SIZE: usize = 4096;

/// Loads sessions from request cookies and turns changed sessions into response cookies.
///
/// This is the framework-independent core of the [`SessionLayer`](crate::SessionLayer).
/// It is immutable and can be shared between any number of concurrent requests.
#[derive(Debug, Clone)]
pub struct SessionManager {
    config: SessionConfig,
    keys: KeyRing,
}

/// Indicates how the client's session cookie should be updated.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCookieCommand {
    /// Set the session cookie.
    Set {
        /// The cookie to send to the client.
        cookie: Cookie<'static>,
    },
    /// Instruct the client to delete the session cookie.
    Delete {
        /// An expired, empty cookie that replaces the session cookie.
        cookie: Cookie<'static>,
    },
    /// The session was not changed, so the cookie stays as it is.
    DoNothing,
}

impl SessionManager {
    /// Create a new session manager with the given cookie policy and keys.
    pub fn new(config: SessionConfig, keys: KeyRing) -> Self {
        Self { config, keys }
    }

    /// The cookie policy of this manager.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The keys of this manager.
    pub fn keys(&self) -> &KeyRing {
        &self.keys
    }

    /// Load the session from the cookies in `headers`.
    /// See [`load_at`](Self::load_at).
    pub fn load(&self, headers: &HeaderMap) -> Result<Session> {
        self.load_at(headers, Utc::now())
    }

    /// Load the session from the cookies in `headers`, treating `now` as the current time.
    ///
    /// If there is no session cookie, or if it is invalid or expired, a fresh session is created.
    /// Cookies that are not valid UTF-8 are read lossily, so they never fail the request.
    pub fn load_at(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Result<Session> {
        let Some(token) = self.find_cookie(headers) else {
            log::trace!("No session cookie, starting a new session");
            return Ok(self.fresh(now));
        };

        let cache = match SessionCache::decode(&token, &self.keys) {
            Ok(cache) => cache,
            Err(Error::InvalidToken) => {
                log::debug!("Discarding session cookie: {}", Error::InvalidToken);
                return Ok(self.fresh(now));
            }
            Err(error) => return Err(error),
        };

        if cache.is_expired(now) {
            log::debug!("Discarding session cookie: {}", Error::ExpiredSession);
            return Ok(self.fresh(now));
        }

        Ok(Session::new(cache))
    }

    /// Persist the session into a cookie command.
    /// See [`persist_at`](Self::persist_at).
    pub fn persist(&self, session: &Session) -> Result<SessionCookieCommand> {
        self.persist_at(session, Utc::now())
    }

    /// Decide how the session cookie must change after a request, treating `now` as the current time.
    ///
    /// Unchanged sessions result in [`SessionCookieCommand::DoNothing`], destroyed sessions in
    /// [`SessionCookieCommand::Delete`], and changed sessions are encrypted under the active key.
    /// Fails with [`Error::CookieTooLarge`] if the resulting cookie exceeds [`MAX_COOKIE_SIZE`].
    pub fn persist_at(
        &self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Result<SessionCookieCommand> {
        let cache = session.lock();

        if !cache.is_dirty() {
            return Ok(SessionCookieCommand::DoNothing);
        }

        if cache.is_destroyed() {
            return Ok(SessionCookieCommand::Delete {
                cookie: self.removal_cookie(),
            });
        }

        let token = cache.encode(self.keys.active())?;
        let cookie = self.build_cookie(token, cache.expiry(), now);

        let size = cookie.to_string().len();
        if size > MAX_COOKIE_SIZE {
            return Err(Error::CookieTooLarge {
                size,
                maximum: MAX_COOKIE_SIZE,
            });
        }

        Ok(SessionCookieCommand::Set { cookie })
    }

    /// Build a session cookie carrying `token` with all configured attributes.
    pub fn build_cookie(
        &self,
        token: String,
        expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Cookie<'static> {
        let mut cookie = self.base_cookie(token);
        if self.config.persist {
            // Round up to the next second, so the cookie does not expire before the session.
            if let Ok(expires) = OffsetDateTime::from_unix_timestamp(expiry.timestamp() + 1) {
                cookie.set_expires(expires);
            }
            let max_age = expiry.signed_duration_since(now).num_seconds() + 1;
            cookie.set_max_age(time::Duration::seconds(max_age));
        }
        cookie
    }

    /// Build an empty, already expired session cookie that makes the client delete its session cookie.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = self.base_cookie(String::new());
        cookie.set_expires(OffsetDateTime::UNIX_EPOCH + time::Duration::SECOND);
        cookie.set_max_age(time::Duration::ZERO);
        cookie
    }

    fn base_cookie(&self, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.config.cookie_name.clone(), value);
        if let Some(path) = &self.config.path {
            cookie.set_path(path.clone());
        }
        if let Some(domain) = &self.config.domain {
            cookie.set_domain(domain.clone());
        }
        if self.config.secure {
            cookie.set_secure(true);
        }
        if self.config.http_only {
            cookie.set_http_only(true);
        }
        cookie.set_same_site(self.config.same_site);
        cookie
    }

    fn fresh(&self, now: DateTime<Utc>) -> Session {
        Session::new(SessionCache::new(self.config.lifetime, now))
    }

    fn find_cookie(&self, headers: &HeaderMap) -> Option<String> {
        for header in headers.get_all(COOKIE) {
            let header = String::from_utf8_lossy(header.as_bytes());
            if matches!(header, Cow::Owned(_)) {
                log::debug!("Cookie header is not valid UTF-8, reading it lossily");
            }
            let found = Cookie::split_parse(header.as_ref())
                .filter_map(|cookie| cookie.ok())
                .find(|cookie| cookie.name() == self.config.cookie_name);
            if let Some(cookie) = found {
                return Some(cookie.value().to_owned());
            }
        }
        None
    }
}
