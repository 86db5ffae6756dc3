//! Tower middleware that loads the session before a request is handled and writes the session
//! cookie afterwards.
//!
//! The inner service produces its whole response before anything is sent, so the session cookie
//! can be decided on after the handler is done with the session. The response is held as a
//! [`PendingResponse`] while the cookie is added, and only then committed.

use crate::manager::SessionCookieCommand;
use crate::{Error, KeyRing, Result, Session, SessionConfig, SessionManager};
use cookie::Cookie;
use http::header::{CONTENT_TYPE, SET_COOKIE, VARY, X_CONTENT_TYPE_OPTIONS};
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, Uri};
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Handles errors that occur while loading or persisting a session.
///
/// It receives the head of the failed request and the error, and produces the response that is
/// sent instead of the handler's response.
pub type ErrorHandler = Arc<dyn Fn(&RequestHead, &Error) -> Response<String> + Send + Sync>;

/// The parts of a request that are available to an [`ErrorHandler`].
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// The request method.
    pub method: Method,
    /// The request URI.
    pub uri: Uri,
    /// The request headers.
    pub headers: HeaderMap,
}

impl RequestHead {
    fn from_request<Body>(request: &Request<Body>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
        }
    }
}

/// Logs the error and responds with a bare `500 Internal Server Error`.
/// No detail about the error is sent to the client.
pub fn default_error_handler(head: &RequestHead, error: &Error) -> Response<String> {
    log::error!("{} {}: {error}", head.method, head.uri);

    let status = StatusCode::INTERNAL_SERVER_ERROR;
    let mut response = Response::new(status.canonical_reason().unwrap_or_default().to_owned());
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}

/// A response that was produced by the handler but not yet sent.
///
/// Headers can still be added until [`commit`](Self::commit) turns it back into a response.
/// Status, headers, extensions and body of the handler's response are kept as they are, so
/// capabilities that travel in the extensions, like connection upgrades, pass through unchanged.
#[derive(Debug)]
pub struct PendingResponse<Body> {
    parts: http::response::Parts,
    body: Body,
}

impl<Body> PendingResponse<Body> {
    /// Hold back a response.
    pub fn new(response: Response<Body>) -> Self {
        let (parts, body) = response.into_parts();
        Self { parts, body }
    }

    /// The status code the handler chose.
    pub fn status(&self) -> StatusCode {
        self.parts.status
    }

    /// The headers of the pending response.
    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// The headers of the pending response, for modification.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.parts.headers
    }

    /// Add a `Set-Cookie` header.
    pub fn set_cookie(&mut self, cookie: &Cookie<'_>) -> Result {
        let value = HeaderValue::from_str(&cookie.to_string())
            .map_err(|error| Error::Transport(error.to_string()))?;
        self.parts.headers.append(SET_COOKIE, value);
        Ok(())
    }

    /// Apply a session cookie command to this response.
    ///
    /// A new session cookie comes with `Vary: Cookie`, so that shared caches do not serve one
    /// client's session to another.
    pub fn apply(&mut self, command: &SessionCookieCommand) -> Result {
        match command {
            SessionCookieCommand::Set { cookie } => {
                self.set_cookie(cookie)?;
                self.parts
                    .headers
                    .append(VARY, HeaderValue::from_static("Cookie"));
            }
            SessionCookieCommand::Delete { cookie } => self.set_cookie(cookie)?,
            SessionCookieCommand::DoNothing => {}
        }
        Ok(())
    }

    /// Release the response.
    pub fn commit(self) -> Response<Body> {
        Response::from_parts(self.parts, self.body)
    }
}

/// A layer that wraps services into a [`SessionService`].
///
/// ```
/// use cookie_session::{Key, KeyRing, SessionConfig, SessionLayer};
///
/// let keys = KeyRing::new(Key::derive(b"a secret with plenty of entropy"));
/// let layer = SessionLayer::new(SessionConfig::default(), keys);
/// # let _ = layer;
/// ```
#[derive(Clone)]
pub struct SessionLayer {
    manager: Arc<SessionManager>,
    error_handler: ErrorHandler,
}

impl SessionLayer {
    /// Create a session layer with the given cookie policy and keys.
    pub fn new(config: SessionConfig, keys: KeyRing) -> Self {
        Self::from_manager(SessionManager::new(config, keys))
    }

    /// Create a session layer around an existing session manager.
    pub fn from_manager(manager: SessionManager) -> Self {
        Self {
            manager: Arc::new(manager),
            error_handler: Arc::new(default_error_handler),
        }
    }

    /// Replace the [`default_error_handler`].
    pub fn with_error_handler(
        mut self,
        error_handler: impl Fn(&RequestHead, &Error) -> Response<String> + Send + Sync + 'static,
    ) -> Self {
        self.error_handler = Arc::new(error_handler);
        self
    }

    /// The session manager used by this layer.
    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }
}

impl Debug for SessionLayer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLayer")
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionService {
            inner,
            manager: self.manager.clone(),
            error_handler: self.error_handler.clone(),
        }
    }
}

/// A service that provides a [`Session`] to the inner service and persists it into a cookie.
///
/// For each request:
///
/// 1. The session is loaded from the request's cookie, or created fresh if there is no valid one.
///    If a session is already attached to the request, because another session layer handled it
///    first, that session is used, and persisting it is left to that layer.
/// 2. The session is attached to the request extensions, see [`Session::from_request`].
/// 3. The inner service handles the request.
/// 4. If the session was changed, the session cookie is added to the response.
///
/// Errors while loading or persisting go to the error handler, whose response replaces the
/// handler's. Errors of the inner service are returned as they are.
#[derive(Clone)]
pub struct SessionService<S> {
    inner: S,
    manager: Arc<SessionManager>,
    error_handler: ErrorHandler,
}

impl<S: Debug> Debug for SessionService<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("inner", &self.inner)
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for SessionService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: From<String> + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        // The clone may not be ready, so keep the service that was polled ready.
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(handle_request(
            inner,
            self.manager.clone(),
            self.error_handler.clone(),
            request,
        ))
    }
}

async fn handle_request<S, ReqBody, ResBody>(
    mut inner: S,
    manager: Arc<SessionManager>,
    error_handler: ErrorHandler,
    mut request: Request<ReqBody>,
) -> Result<Response<ResBody>, S::Error>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    ResBody: From<String>,
{
    let head = RequestHead::from_request(&request);

    let (session, owned) = match Session::try_from_extensions(request.extensions()) {
        Some(session) => {
            log::trace!("Reusing session attached by an outer session layer");
            (session, false)
        }
        None => match manager.load(request.headers()) {
            Ok(session) => (session, true),
            Err(error) => return Ok(error_response(&error_handler, &head, &error)),
        },
    };
    request.extensions_mut().insert(session.clone());

    let mut pending = PendingResponse::new(inner.call(request).await?);

    if owned {
        let persisted = manager
            .persist(&session)
            .and_then(|command| pending.apply(&command));
        if let Err(error) = persisted {
            return Ok(error_response(&error_handler, &head, &error));
        }
    }

    Ok(pending.commit())
}

fn error_response<ResBody: From<String>>(
    error_handler: &ErrorHandler,
    head: &RequestHead,
    error: &Error,
) -> Response<ResBody> {
    error_handler(head, error).map(ResBody::from)
}
