//! Anonymous public-key sealing.
//!
//! The sealing primitive generates an ephemeral key pair per message, so the
//! ciphertext carries no sender key material at all.

use super::{check_fields, envelope_traits, from_plaintext, from_value, to_plaintext};
use crate::crypto::{identifier_to_public_key, CryptoContext, Identity, BASE64};
use crate::utils::{CryptoError, Result};
use base64::Engine;
use crypto_box::PublicKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;

/// Envelope that hides the sender even from the receiver
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields, bound = "")]
pub struct Sealed<T> {
    cipher: String,
    #[serde(skip)]
    payload: PhantomData<fn() -> T>,
}

envelope_traits!(Sealed { cipher });

impl<T> Sealed<T> {
    /// Seal `value` to the owner of `receiver`
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidIdentifier` if `receiver` is malformed
    pub fn new(context: &CryptoContext, value: &T, receiver: &str) -> Result<Self>
    where
        T: Serialize,
    {
        let receiver = identifier_to_public_key(receiver)?;
        let cipher = seal(context, &to_plaintext(value)?, &receiver)?;
        log::debug!("sealed {} byte envelope", cipher.len());

        Ok(Self {
            cipher,
            payload: PhantomData,
        })
    }

    /// Open the envelope with the receiver's key pair
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::IncorrectKeyPair` if `identity` is not the
    /// receiver or the ciphertext was altered
    pub fn decrypt(&self, identity: &Identity) -> Result<T>
    where
        T: DeserializeOwned,
    {
        from_plaintext(&unseal(identity, &self.cipher)?)
    }

    /// Base64 ciphertext
    pub fn cipher(&self) -> &str {
        &self.cipher
    }

    /// Restore a sealed envelope from plain JSON data
    pub fn revive(value: Value) -> Result<Self> {
        check_fields("Sealed", &value, &["cipher"])?;
        from_value("Sealed", value)
    }

    /// Restore a sealed envelope from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Self::revive(serde_json::from_str(json)?)
    }
}

/// Seal raw bytes to `receiver` and encode the result
pub(super) fn seal(
    context: &CryptoContext,
    plaintext: &[u8],
    receiver: &PublicKey,
) -> Result<String> {
    let sealed = receiver
        .seal(&mut context.rng(), plaintext)
        .map_err(|e| CryptoError::Encryption {
            reason: e.to_string(),
        })?;

    Ok(BASE64.encode(sealed))
}

/// Decode and open bytes sealed to `identity`
pub(super) fn unseal(identity: &Identity, encoded: &str) -> Result<Vec<u8>> {
    let sealed = BASE64
        .decode(encoded)
        .map_err(|_| CryptoError::IncorrectKeyPair)?;

    identity
        .box_secret_key()
        .unseal(&sealed)
        .map_err(|_| CryptoError::IncorrectKeyPair.into())
}
