//! Pairwise symmetric channels between two identities.
//!
//! The X25519 shared key is precomputed once when the channel is opened and
//! reused for every message; each message still gets a fresh random nonce.
//! Wire form: `base64(nonce || tag || ciphertext)`.

use crate::crypto::{
    identifier_to_public_key, CryptoContext, Identity, BASE64, MAC_LENGTH, NONCE_LENGTH,
};
use crate::utils::{CryptoError, Result};
use base64::Engine;
use crypto_box::aead::generic_array::GenericArray;
use crypto_box::aead::{Aead, AeadCore};
use crypto_box::SalsaBox;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Symmetric encryption context shared by exactly two peers.
///
/// `A.init_secure_channel(B)` and `B.init_secure_channel(A)` derive the same
/// key, so either side can decrypt what the other encrypted.
pub struct SecureChannel {
    local_id: String,
    peer_id: String,
    shared: SalsaBox,
    context: CryptoContext,
}

impl SecureChannel {
    /// Precompute the shared key between `identity` and `peer_id`
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidIdentifier` if `peer_id` is malformed
    pub fn new(identity: &Identity, peer_id: &str) -> Result<Self> {
        let peer_key = identifier_to_public_key(peer_id)?;
        let shared = SalsaBox::new(&peer_key, &identity.box_secret_key());

        log::debug!(
            "secure channel {} -> {}",
            short(identity.public_identifier()),
            short(peer_id)
        );

        Ok(Self {
            local_id: identity.public_identifier().to_string(),
            peer_id: peer_id.to_string(),
            shared,
            context: *identity.context(),
        })
    }

    /// Identifier of the identity that opened this channel
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Identifier of the other party
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Serialize `value` to JSON and encrypt it under a fresh nonce
    pub fn encrypt<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let message = serde_json::to_vec(value)?;
        let nonce = SalsaBox::generate_nonce(&mut self.context.rng());

        let ciphertext = self
            .shared
            .encrypt(&nonce, message.as_slice())
            .map_err(|_| CryptoError::Encryption {
                reason: "Failed to encrypt channel message".to_string(),
            })?;

        let mut encrypted = nonce.to_vec();
        encrypted.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(encrypted))
    }

    /// Authenticate, decrypt and parse a message produced by [`Self::encrypt`]
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::IncorrectSecretKey` if the message was encrypted
    /// under another key, was altered in transit or is not valid base64
    pub fn decrypt<T: DeserializeOwned>(&self, encrypted: &str) -> Result<T> {
        let encrypted = BASE64
            .decode(encrypted)
            .map_err(|_| CryptoError::IncorrectSecretKey)?;
        if encrypted.len() < NONCE_LENGTH + MAC_LENGTH {
            return Err(CryptoError::IncorrectSecretKey.into());
        }

        let (nonce, ciphertext) = encrypted.split_at(NONCE_LENGTH);
        let plaintext = self
            .shared
            .decrypt(GenericArray::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::IncorrectSecretKey)?;

        serde_json::from_slice(&plaintext).map_err(Into::into)
    }
}

impl fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureChannel")
            .field("local_id", &self.local_id)
            .field("peer_id", &self.peer_id)
            .finish_non_exhaustive()
    }
}

pub(crate) fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
