//! The authenticated encryption envelope around session data.
//!
//! A token is the unpadded URL-safe base64 encoding of a 24 byte random nonce followed by the
//! XSalsa20-Poly1305 box of the plaintext under that nonce.
//! The box layout is the same as NaCl's `secretbox`.

use crate::key::{Key, KeyRing};
use crate::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Key as CipherKey, Nonce, XSalsa20Poly1305};
use rand::rngs::OsRng;
use rand::RngCore;

/// The length of the nonce prepended to each token, in bytes.
pub const NONCE_LENGTH: usize = 24;

fn cipher(key: &Key) -> XSalsa20Poly1305 {
    XSalsa20Poly1305::new(CipherKey::from_slice(key.as_bytes()))
}

/// Encrypt and authenticate `plaintext` under `key`, returning a token.
///
/// A fresh random nonce is drawn for every call.
pub fn encode(plaintext: &[u8], key: &Key) -> Result<String> {
    let mut nonce = [0; NONCE_LENGTH];
    OsRng.try_fill_bytes(&mut nonce)?;

    let sealed = cipher(key)
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| Error::Encryption)?;

    let mut token = Vec::with_capacity(NONCE_LENGTH + sealed.len());
    token.extend_from_slice(&nonce);
    token.extend_from_slice(&sealed);
    Ok(URL_SAFE_NO_PAD.encode(token))
}

/// Verify and decrypt a token produced by [`encode`], trying each key of the ring in order.
///
/// Every failure results in [`Error::InvalidToken`], whether the token was malformed, tampered
/// with, or encrypted under a key that is no longer in the ring.
pub fn decode(token: &str, keys: &KeyRing) -> Result<Vec<u8>> {
    let token = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| Error::InvalidToken)?;
    if token.len() < NONCE_LENGTH {
        return Err(Error::InvalidToken);
    }
    let (nonce, sealed) = token.split_at(NONCE_LENGTH);
    let nonce = Nonce::from_slice(nonce);

    for (index, key) in keys.iter().enumerate() {
        if let Ok(plaintext) = cipher(key).decrypt(nonce, sealed) {
            if index > 0 {
                log::debug!(
                    "Opened session token with retired key {} at position {index}",
                    key.fingerprint()
                );
            }
            return Ok(plaintext);
        }
    }

    Err(Error::InvalidToken)
}
