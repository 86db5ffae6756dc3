use crate::{Error, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// The length of a session key, in bytes.
pub const KEY_LENGTH: usize = 32;

const DERIVE_CONTEXT: &str = "cookie-session 2024-01-01 session cookie encryption key";
const FINGERPRINT_CONTEXT: &str = "cookie-session 2024-01-01 session key fingerprint";

/// A secret key used to encrypt and authenticate session cookies.
///
/// Keys must be exactly [`KEY_LENGTH`] bytes long.
/// Shorter or longer key material is rejected rather than padded or truncated;
/// use [`Key::derive`] to turn an arbitrary secret into a key.
#[derive(Clone, Eq, PartialEq)]
#[allow(missing_copy_implementations)]
pub struct Key([u8; KEY_LENGTH]);

impl Key {
    /// Create a key from exactly [`KEY_LENGTH`] bytes of key material.
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Generate a new random key using the operating system's random source.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0; KEY_LENGTH];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(Self(bytes))
    }

    /// Derive a key from secret material of any length using BLAKE3 in key derivation mode.
    ///
    /// The same secret always derives the same key.
    /// The secret should still have enough entropy to be a key on its own;
    /// this is not a password hashing function.
    pub fn derive(secret: &[u8]) -> Self {
        Self(blake3::derive_key(DERIVE_CONTEXT, secret))
    }

    /// A short identifier of this key that is safe to log.
    pub fn fingerprint(&self) -> String {
        let digest = blake3::Hasher::new_derive_key(FINGERPRINT_CONTEXT)
            .update(&self.0)
            .finalize();
        digest.to_hex().as_str()[..8].to_owned()
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Key {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| Error::InvalidKeyLength {
            expected: KEY_LENGTH,
            actual: bytes.len(),
        })?;
        Ok(Self(bytes))
    }
}

impl Debug for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key({})", self.fingerprint())
    }
}

/// An ordered, immutable list of keys.
///
/// The first key is the active key and is used to encrypt every new cookie.
/// All further keys are retired keys, kept only so that cookies issued before a key rotation can
/// still be decrypted. Cloning is cheap, all clones share the same keys.
#[derive(Debug, Clone)]
pub struct KeyRing {
    keys: Arc<[Key]>,
}

impl KeyRing {
    /// Create a key ring with the given active key and no retired keys.
    pub fn new(active: Key) -> Self {
        Self {
            keys: Arc::from(vec![active]),
        }
    }

    /// Create a key ring with the given active key, followed by the given retired keys in the
    /// order in which they should be tried.
    pub fn with_retired(active: Key, retired: impl IntoIterator<Item = Key>) -> Self {
        let keys: Vec<_> = std::iter::once(active).chain(retired).collect();
        Self { keys: keys.into() }
    }

    /// Create a key ring from raw key material.
    /// The first element is the active key.
    ///
    /// Fails if there are no keys, or if any key has the wrong length.
    pub fn from_slices<'a>(keys: impl IntoIterator<Item = &'a [u8]>) -> Result<Self> {
        let keys = keys
            .into_iter()
            .map(Key::try_from)
            .collect::<Result<Vec<_>>>()?;
        if keys.is_empty() {
            return Err(Error::EmptyKeyRing);
        }
        Ok(Self { keys: keys.into() })
    }

    /// The key used to encrypt new cookies.
    pub fn active(&self) -> &Key {
        &self.keys[0]
    }

    /// All keys, starting with the active key.
    pub fn iter(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter()
    }
}
