//! Signed public-key encryption between two mutually known peers.
//!
//! The payload and the sender's signing key are boxed from the sender's box
//! key to the receiver's under one nonce, and the payload ciphertext is
//! signed. The receiver has to name the sender it expects: the signing key is
//! recovered with that sender's box key, the signature is checked, and only
//! then is the payload opened.
//!
//! Wire form: `cipher = base64(signature || tag || ciphertext)`,
//! `espsk = base64(tag || boxed signing key)`, `nonce = base64(nonce)`.

use super::{check_fields, envelope_traits, from_plaintext, from_value, to_plaintext};
use crate::crypto::{
    identifier_to_public_key, Identity, BASE64, MAC_LENGTH, NONCE_LENGTH, SIGNATURE_LENGTH,
};
use crate::utils::{CryptoError, ProtocolError, Result};
use base64::Engine;
use crypto_box::aead::generic_array::GenericArray;
use crypto_box::aead::{Aead, AeadCore};
use crypto_box::SalsaBox;
use ed25519_dalek::{Signature, Signer, Verifier, VerifyingKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;

/// Envelope whose sender is hidden in transit and verified on receipt
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields, bound = "")]
pub struct Anonymized<T> {
    cipher: String,
    espsk: String,
    nonce: String,
    #[serde(skip)]
    payload: PhantomData<fn() -> T>,
}

envelope_traits!(Anonymized { cipher, espsk, nonce });

impl<T> Anonymized<T> {
    /// Encrypt and sign `value` from `sender` to `receiver`
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidIdentifier` if `receiver` is malformed
    pub fn new(value: &T, sender: &Identity, receiver: &str) -> Result<Self>
    where
        T: Serialize,
    {
        let receiver_key = identifier_to_public_key(receiver)?;
        let shared = SalsaBox::new(&receiver_key, &sender.box_secret_key());
        let nonce = SalsaBox::generate_nonce(&mut sender.context().rng());

        let ciphertext = shared
            .encrypt(&nonce, to_plaintext(value)?.as_slice())
            .map_err(|_| encryption_failed("payload"))?;

        // The signing key shares the payload nonce; peers expect this layout.
        let espsk = shared
            .encrypt(&nonce, sender.sign_public_key().as_slice())
            .map_err(|_| encryption_failed("signing key"))?;

        let signature = sender.signing_key().sign(&ciphertext);
        let mut cipher = signature.to_bytes().to_vec();
        cipher.extend_from_slice(&ciphertext);

        log::debug!("anonymized {} byte envelope", cipher.len());

        Ok(Self {
            cipher: BASE64.encode(cipher),
            espsk: BASE64.encode(espsk),
            nonce: BASE64.encode(nonce),
            payload: PhantomData,
        })
    }

    /// Verify and decrypt, assuming the envelope came from `sender`
    ///
    /// # Errors
    ///
    /// - `CryptoError::IncorrectKeyPair` if `sender` is not the real sender
    ///   or `receiver` is not the addressee
    /// - `CryptoError::SignatureVerification` if the cipher was altered; the
    ///   payload is not decrypted in that case
    pub fn decrypt(&self, receiver: &Identity, sender: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let sender_key = identifier_to_public_key(sender)?;
        let shared = SalsaBox::new(&sender_key, &receiver.box_secret_key());

        let nonce = BASE64.decode(&self.nonce)?;
        if nonce.len() != NONCE_LENGTH {
            return Err(bad_nonce(nonce.len()));
        }
        let nonce = GenericArray::from_slice(&nonce);

        let cipher = BASE64
            .decode(&self.cipher)
            .map_err(|_| CryptoError::SignatureVerification)?;
        if cipher.len() < SIGNATURE_LENGTH + MAC_LENGTH {
            return Err(CryptoError::SignatureVerification.into());
        }
        let (signature, ciphertext) = cipher.split_at(SIGNATURE_LENGTH);

        let espsk = BASE64
            .decode(&self.espsk)
            .map_err(|_| CryptoError::IncorrectKeyPair)?;
        let signing_key = shared
            .decrypt(nonce, espsk.as_slice())
            .map_err(|_| CryptoError::IncorrectKeyPair)?;
        let signing_key: [u8; 32] = signing_key
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::SignatureVerification)?;
        let verifying_key = VerifyingKey::from_bytes(&signing_key)
            .map_err(|_| CryptoError::SignatureVerification)?;

        let signature: [u8; SIGNATURE_LENGTH] = signature
            .try_into()
            .map_err(|_| CryptoError::SignatureVerification)?;
        verifying_key
            .verify(ciphertext, &Signature::from_bytes(&signature))
            .map_err(|_| CryptoError::SignatureVerification)?;

        let plaintext = shared
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::IncorrectKeyPair)?;

        from_plaintext(&plaintext)
    }

    /// Base64 `signature || ciphertext`
    pub fn cipher(&self) -> &str {
        &self.cipher
    }

    /// Base64 encrypted sender public signing key
    pub fn espsk(&self) -> &str {
        &self.espsk
    }

    /// Base64 nonce
    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Restore an anonymized envelope from plain JSON data
    pub fn revive(value: Value) -> Result<Self> {
        check_fields("Anonymized", &value, &["cipher", "espsk", "nonce"])?;

        let envelope: Self = from_value("Anonymized", value)?;
        let nonce = BASE64.decode(&envelope.nonce)?;
        if nonce.len() != NONCE_LENGTH {
            return Err(bad_nonce(nonce.len()));
        }

        Ok(envelope)
    }

    /// Restore an anonymized envelope from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Self::revive(serde_json::from_str(json)?)
    }
}

fn encryption_failed(what: &str) -> crate::utils::PeercryptError {
    CryptoError::Encryption {
        reason: format!("Failed to box {what}"),
    }
    .into()
}

fn bad_nonce(len: usize) -> crate::utils::PeercryptError {
    ProtocolError::InvalidMessage {
        reason: format!("nonce must be {NONCE_LENGTH} bytes, got {len}"),
    }
    .into()
}
