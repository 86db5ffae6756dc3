use cookie::SameSite;
use std::time::Duration;

/// The default name of the session cookie.
pub const DEFAULT_COOKIE_NAME: &str = "session";

/// The default session lifetime of 24 hours.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

/// The policy for session cookies.
///
/// This is an immutable value that is handed to the [`SessionLayer`](crate::SessionLayer) once.
/// Build it from [`SessionConfig::default`] and the `with_*` methods.
///
/// ```
/// use cookie_session::{SameSite, SessionConfig};
/// use std::time::Duration;
///
/// let config = SessionConfig::default()
///     .with_lifetime(Duration::from_secs(3 * 60 * 60))
///     .with_secure(true)
///     .with_same_site(Some(SameSite::Strict));
/// assert_eq!(config.cookie_name(), "session");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub(crate) cookie_name: String,
    pub(crate) lifetime: Duration,
    pub(crate) domain: Option<String>,
    pub(crate) path: Option<String>,
    pub(crate) secure: bool,
    pub(crate) http_only: bool,
    pub(crate) same_site: Option<SameSite>,
    pub(crate) persist: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_owned(),
            lifetime: DEFAULT_LIFETIME,
            domain: None,
            path: Some("/".to_owned()),
            secure: false,
            http_only: true,
            same_site: Some(SameSite::Lax),
            persist: true,
        }
    }
}

impl SessionConfig {
    /// Set the name of the session cookie.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set how long a session is valid after it was created.
    /// The expiry is absolute: it is set when the session is created and does not move with activity.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Set the `Domain` attribute. By default there is none, and the cookie is sent to the issuing host only.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Set the `Path` attribute. Defaults to `/`.
    /// `None` leaves the attribute out, so the user agent uses the path the cookie was issued from.
    pub fn with_path(mut self, path: Option<String>) -> Self {
        self.path = path;
        self
    }

    /// Set the `Secure` attribute. Defaults to `false`.
    /// Should be enabled whenever the site is served over HTTPS.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the `HttpOnly` attribute. Defaults to `true`.
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Set the `SameSite` attribute. Defaults to `Lax`; `None` leaves the attribute out.
    pub fn with_same_site(mut self, same_site: Option<SameSite>) -> Self {
        self.same_site = same_site;
        self
    }

    /// Set whether the cookie outlives the browser session.
    /// Persistent cookies carry `Expires` and `Max-Age` matching the session expiry. Defaults to `true`.
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// The name of the session cookie.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// The lifetime of new sessions.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }
}
