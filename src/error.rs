/// All errors that can occur in this crate.
///
/// Only some of them ever reach an application.
/// [`InvalidToken`](Error::InvalidToken) and [`ExpiredSession`](Error::ExpiredSession) are
/// recovered by starting a fresh session, and the two programmer errors
/// [`DestroyedSessionAccess`](Error::DestroyedSessionAccess) and
/// [`MissingSessionContext`](Error::MissingSessionContext) are raised as panics.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The cookie could not be decoded, or did not authenticate under any key in the key ring.
    /// Corrupted, forged and rotated-out cookies are deliberately indistinguishable.
    #[error("session: invalid token")]
    InvalidToken,

    /// The cookie was valid, but the session it carries has passed its absolute expiry.
    #[error("session: session has expired")]
    ExpiredSession,

    /// The serialized `Set-Cookie` header would exceed what user agents are required to store.
    #[error("session: cookie length {size} greater than {maximum} bytes")]
    CookieTooLarge {
        /// The length of the serialized cookie.
        size: usize,
        /// The maximum allowed length.
        maximum: usize,
    },

    /// The session cookie could not be written into a response header.
    #[error("session: could not write cookie: {0}")]
    Transport(String),

    /// The session data could not be serialized.
    #[error("session: could not serialize session data: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    /// The cipher refused to seal the session data.
    #[error("session: could not encrypt session data")]
    Encryption,

    /// The operating system's random source failed to produce a nonce.
    #[error("session: random source failure: {0}")]
    Randomness(#[from] rand::Error),

    /// A key was supplied with the wrong length.
    #[error("session: key has length {actual}, but is expected to have length {expected}")]
    InvalidKeyLength {
        /// The required key length.
        expected: usize,
        /// The length of the supplied key.
        actual: usize,
    },

    /// A key ring must hold at least the active key.
    #[error("session: key ring is empty")]
    EmptyKeyRing,

    /// Session data was accessed after the session was destroyed in the same request.
    #[error("session: data accessed after the session was destroyed")]
    DestroyedSessionAccess,

    /// A session accessor was used on a request that did not pass through the session middleware.
    #[error("session: session not present in request extensions")]
    MissingSessionContext,
}

mod expect_impl_error {
    trait ExpectImplError: std::error::Error + Send + Sync + 'static {}

    impl ExpectImplError for super::Error {}
}
