//! Sealed payload plus a sealed sender key.
//!
//! The receiver learns who sent a cloaked envelope only by opening it.

use super::sealed::{seal, unseal};
use super::{check_fields, envelope_traits, from_plaintext, from_value, to_plaintext};
use crate::crypto::{public_key_to_identifier, CryptoContext, Identity, BOX_KEY_LENGTH};
use crate::utils::{CryptoError, ProtocolError, Result};
use crypto_box::PublicKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;

/// Envelope whose sender is revealed after decryption
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, bound = "")]
pub struct Cloaked<T> {
    cipher: String,
    encrypted_sender_public_box_key: String,
    /// Carried for wire compatibility only; decryption never reads it
    #[serde(default)]
    sender: Option<String>,
    #[serde(skip)]
    payload: PhantomData<fn() -> T>,
}

envelope_traits!(Cloaked {
    cipher,
    encrypted_sender_public_box_key,
    sender,
});

/// A decrypted cloaked payload and the identifier of its sender.
///
/// Serializes as the payload object with a `sender` field merged in. Only
/// payloads that serialize to a JSON object can be merged this way; for any
/// other payload serialization fails and `value` must be read directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uncloaked<T> {
    /// The original payload
    #[serde(flatten)]
    pub value: T,
    /// Public identifier recovered from the sealed sender key
    pub sender: String,
}

impl<T> Cloaked<T> {
    /// Cloak `value` from `sender` to `receiver` box public keys
    pub fn new(
        context: &CryptoContext,
        value: &T,
        sender: &[u8; BOX_KEY_LENGTH],
        receiver: &[u8; BOX_KEY_LENGTH],
    ) -> Result<Self>
    where
        T: Serialize,
    {
        let receiver = PublicKey::from(*receiver);
        let cipher = seal(context, &to_plaintext(value)?, &receiver)?;
        let encrypted_sender_public_box_key = seal(context, sender, &receiver)?;
        log::debug!("cloaked {} byte envelope", cipher.len());

        Ok(Self {
            cipher,
            encrypted_sender_public_box_key,
            sender: None,
            payload: PhantomData,
        })
    }

    /// Open both seals and report the sender
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::IncorrectKeyPair` if `identity` is not the
    /// receiver, or `CryptoError::InvalidKey` if the sender key is malformed
    pub fn decrypt(&self, identity: &Identity) -> Result<Uncloaked<T>>
    where
        T: DeserializeOwned,
    {
        let sender_key = unseal(identity, &self.encrypted_sender_public_box_key)?;
        let sender_key: [u8; BOX_KEY_LENGTH] =
            sender_key
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidKey {
                    reason: format!(
                        "sender box key must be {} bytes, got {}",
                        BOX_KEY_LENGTH,
                        sender_key.len()
                    ),
                })?;

        let value = from_plaintext(&unseal(identity, &self.cipher)?)?;

        Ok(Uncloaked {
            value,
            sender: public_key_to_identifier(&sender_key),
        })
    }

    /// Base64 sealed payload
    pub fn cipher(&self) -> &str {
        &self.cipher
    }

    /// Base64 sealed sender box key
    pub fn encrypted_sender_public_box_key(&self) -> &str {
        &self.encrypted_sender_public_box_key
    }

    /// Restore a cloaked envelope from plain JSON data
    pub fn revive(value: Value) -> Result<Self> {
        check_fields("Cloaked", &value, &["cipher", "encryptedSenderPublicBoxKey"])?;

        match value.get("sender") {
            None | Some(Value::Null) | Some(Value::String(_)) => {}
            Some(_) => {
                return Err(ProtocolError::InvalidMessage {
                    reason: "Cloaked.sender must be a string or null".to_string(),
                }
                .into())
            }
        }

        from_value("Cloaked", value)
    }

    /// Restore a cloaked envelope from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Self::revive(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{ready, Seed};
    use crate::utils::PeercryptError;
    use serde_json::json;

    fn identity(phrase: &str) -> Identity {
        Identity::create(&ready().unwrap(), Seed::from(phrase))
    }

    #[test]
    fn test_cloak_reveals_sender() {
        let alice = identity("cloak sender");
        let bob = identity("cloak receiver");
        let value = json!({ "msg": "hi" });

        let cloaked = alice.cloak(&value, bob.public_identifier()).unwrap();
        let uncloaked = bob.uncloak(&cloaked).unwrap();

        assert_eq!(uncloaked.value, value);
        assert_eq!(uncloaked.sender, alice.public_identifier());
    }

    #[test]
    fn test_uncloaked_merges_sender() {
        let alice = identity("cloak sender");
        let bob = identity("cloak receiver");

        let cloaked = alice.cloak(&json!({ "msg": "hi" }), bob.public_identifier()).unwrap();
        let merged = serde_json::to_value(cloaked.decrypt(&bob).unwrap()).unwrap();

        assert_eq!(merged, json!({ "msg": "hi", "sender": alice.public_identifier() }));
    }

    #[test]
    fn test_non_object_payload_reads_but_does_not_merge() {
        let alice = identity("cloak sender");
        let bob = identity("cloak receiver");

        let cloaked = alice.cloak(&json!("hi"), bob.public_identifier()).unwrap();
        let uncloaked = cloaked.decrypt(&bob).unwrap();

        assert_eq!(uncloaked.value, json!("hi"));
        assert_eq!(uncloaked.sender, alice.public_identifier());
        assert!(serde_json::to_value(&uncloaked).is_err());
    }

    #[test]
    fn test_tampered_fields_fail() {
        let alice = identity("cloak sender");
        let bob = identity("cloak receiver");
        let cloaked = alice.cloak(&json!({ "msg": "hi" }), bob.public_identifier()).unwrap();
        let original = serde_json::to_value(&cloaked).unwrap();

        for field in ["cipher", "encryptedSenderPublicBoxKey"] {
            let encoded = original[field].as_str().unwrap().to_string();
            for index in [0, 20, encoded.len() - 2] {
                let mut chars: Vec<char> = encoded.chars().collect();
                chars[index] = if chars[index] == 'A' { 'B' } else { 'A' };

                let mut value = original.clone();
                value[field] = json!(chars.into_iter().collect::<String>());
                let err = Cloaked::<Value>::revive(value)
                    .unwrap()
                    .decrypt(&bob)
                    .unwrap_err();
                assert!(
                    matches!(err, PeercryptError::Crypto(CryptoError::IncorrectKeyPair)),
                    "{field}[{index}]: {err}"
                );
            }
        }
    }

    #[test]
    fn test_fresh_ciphertext_per_call() {
        let alice = identity("cloak sender");
        let bob = identity("cloak receiver");

        let first = alice.cloak(&json!(1), bob.public_identifier()).unwrap();
        let second = alice.cloak(&json!(1), bob.public_identifier()).unwrap();

        assert_ne!(first.cipher(), second.cipher());
        assert_ne!(
            first.encrypted_sender_public_box_key(),
            second.encrypted_sender_public_box_key()
        );
    }

    #[test]
    fn test_sender_hidden_in_transit() {
        let alice = identity("cloak sender");
        let bob = identity("cloak receiver");

        let cloaked = alice.cloak(&json!({ "msg": "hi" }), bob.public_identifier()).unwrap();
        let json = serde_json::to_string(&cloaked).unwrap();

        assert!(!json.contains(alice.public_identifier()));
        assert!(json.contains("\"sender\":null"));
    }

    #[test]
    fn test_wrong_identity_fails() {
        let alice = identity("cloak sender");
        let bob = identity("cloak receiver");
        let carol = identity("cloak bystander");

        let cloaked = alice.cloak(&json!("x"), bob.public_identifier()).unwrap();
        let err = cloaked.decrypt(&carol).unwrap_err();
        assert!(matches!(err, PeercryptError::Crypto(CryptoError::IncorrectKeyPair)));
    }

    #[test]
    fn test_revive_ignores_claimed_sender() {
        let alice = identity("cloak sender");
        let bob = identity("cloak receiver");
        let carol = identity("cloak bystander");

        let cloaked = alice.cloak(&json!({ "k": true }), bob.public_identifier()).unwrap();
        let mut value = serde_json::to_value(&cloaked).unwrap();
        value["sender"] = json!(carol.public_identifier());

        let revived = Cloaked::<Value>::revive(value).unwrap();
        let uncloaked = revived.decrypt(&bob).unwrap();
        assert_eq!(uncloaked.sender, alice.public_identifier());
    }

    #[test]
    fn test_revive_validation() {
        assert!(Cloaked::<Value>::revive(json!({ "cipher": "AAAA" })).is_err());
        assert!(Cloaked::<Value>::revive(json!({
            "cipher": "AAAA",
            "encryptedSenderPublicBoxKey": "AAAA",
            "sender": 12
        }))
        .is_err());

        let ok = Cloaked::<Value>::revive(json!({
            "cipher": "AAAA",
            "encryptedSenderPublicBoxKey": "AAAA"
        }))
        .unwrap();
        assert_eq!(ok.cipher(), "AAAA");
    }
}
