//! Encrypted client-side HTTP sessions.
//!
//! This crate stores all session data in a single cookie on the client.
//! The data is serialized, then encrypted and authenticated with XSalsa20-Poly1305, so the client
//! can neither read nor modify it. On the next request the cookie is verified, decrypted and made
//! available to the request handler as a [`Session`]. There is no server-side session storage.
//!
//! # Change tracking
//!
//! Changes are tracked automatically.
//! Whenever session data is written, the session is marked as changed, and only changed sessions
//! are sent back to the client. Requests that only read the session produce no `Set-Cookie`
//! header at all. Destroying a session instructs the client to delete its cookie.
//!
//! # Expiry
//!
//! Sessions have an absolute expiry that is set when the session is created and never extended.
//! Expired cookies are ignored, as are cookies that fail to decrypt. In both cases the request
//! starts with a fresh, empty session.
//!
//! # Key rotation
//!
//! Cookies are always encrypted with the active key, the first key of the [`KeyRing`].
//! Retired keys are only used to decrypt cookies that were issued before a rotation; such sessions
//! are re-encrypted with the active key as soon as they change.
//!
//! # Example
//!
//! ```
//! use cookie_session::{Key, KeyRing, Session, SessionConfig, SessionLayer};
//! use http::{header, Request, Response};
//! use std::convert::Infallible;
//! use tower::{Layer, ServiceExt};
//!
//! # async_std::task::block_on(async {
//! let keys = KeyRing::new(Key::derive(b"a secret with plenty of entropy"));
//! let layer = SessionLayer::new(SessionConfig::default(), keys);
//!
//! let service = layer.layer(tower::service_fn(|request: Request<String>| async move {
//!     let session = Session::from_request(&request);
//!     session.put("msg", "Hello world");
//!     Ok::<_, Infallible>(Response::new(String::new()))
//! }));
//!
//! let response = service.oneshot(Request::new(String::new())).await.unwrap();
//! assert!(response.headers().contains_key(header::SET_COOKIE));
//! # })
//! ```

#![forbid(unsafe_code)]
#![deny(
    future_incompatible,
    missing_debug_implementations,
    nonstandard_style,
    missing_docs,
    unreachable_pub,
    missing_copy_implementations,
    unused_qualifications
)]

pub use error::Error;
/// A result with the error type of this crate and a default return type of ()
pub type Result<T = (), E = Error> = std::result::Result<T, E>;

mod cache;
mod config;
pub mod envelope;
mod error;
mod key;
mod manager;
pub mod middleware;
pub mod mock;
mod session;
mod value;

pub use cache::SessionCache;
pub use config::{SessionConfig, DEFAULT_COOKIE_NAME, DEFAULT_LIFETIME};
pub use cookie::SameSite;
pub use key::{Key, KeyRing, KEY_LENGTH};
pub use manager::{SessionCookieCommand, SessionManager, MAX_COOKIE_SIZE};
pub use middleware::{PendingResponse, RequestHead, SessionLayer, SessionService};
pub use session::Session;
pub use value::{StructuredValue, Value};
