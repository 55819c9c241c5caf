//! Encrypted envelopes with distinct sender visibility.
//!
//! | Envelope | Sender visible to receiver | Needs |
//! |---|---|---|
//! | [`Sealed`] | never | receiver identifier |
//! | [`Cloaked`] | after decryption | sender and receiver box keys |
//! | [`Anonymized`] | verified by signature after decryption | both identifiers up front |
//!
//! Every envelope serializes its payload to JSON and replaces it by
//! ciphertext at construction time. Envelopes are immutable: decryption
//! returns a new value and leaves the envelope untouched, so an envelope can
//! be decrypted any number of times with the same outcome.
//!
//! Envelopes received as plain JSON are restored with `revive`/`from_json`,
//! which check that every field is present and decodable before returning an
//! instance with working `decrypt` behavior.

pub mod anonymized;
pub mod cloaked;
pub mod sealed;

pub use anonymized::Anonymized;
pub use cloaked::{Cloaked, Uncloaked};
pub use sealed::Sealed;

use crate::crypto::{Identity, BASE64};
use crate::utils::{ProtocolError, Result};
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Serialize a payload the way every envelope stores it before encryption
pub(crate) fn to_plaintext<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(Into::into)
}

/// Parse recovered plaintext back into the payload type
pub(crate) fn from_plaintext<T: DeserializeOwned>(plaintext: &[u8]) -> Result<T> {
    serde_json::from_slice(plaintext).map_err(Into::into)
}

/// Check that `fields` are present as strings and decode as base64
pub(crate) fn check_fields(kind: &str, value: &Value, fields: &[&str]) -> Result<()> {
    let object = value.as_object().ok_or_else(|| ProtocolError::InvalidMessage {
        reason: format!("{kind} must be a JSON object"),
    })?;

    for field in fields {
        let encoded = object
            .get(*field)
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::MissingField {
                field: (*field).to_string(),
            })?;

        BASE64
            .decode(encoded)
            .map_err(|e| ProtocolError::InvalidMessage {
                reason: format!("{kind}.{field} is not base64: {e}"),
            })?;
    }

    Ok(())
}

/// Deserialize an already shape-checked envelope
pub(crate) fn from_value<E: DeserializeOwned>(kind: &str, value: Value) -> Result<E> {
    serde_json::from_value(value).map_err(|e| {
        ProtocolError::InvalidMessage {
            reason: format!("{kind}: {e}"),
        }
        .into()
    })
}

/// Clone/Eq/Debug for envelopes without bounds on the phantom payload type
macro_rules! envelope_traits {
    ($name:ident { $($field:ident),+ $(,)? }) => {
        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                Self {
                    $($field: self.$field.clone(),)+
                    payload: std::marker::PhantomData,
                }
            }
        }

        impl<T> PartialEq for $name<T> {
            fn eq(&self, other: &Self) -> bool {
                true $(&& self.$field == other.$field)+
            }
        }

        impl<T> Eq for $name<T> {}

        impl<T> std::fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    $(.field(stringify!($field), &self.$field))+
                    .finish()
            }
        }
    };
}

pub(crate) use envelope_traits;

/// Any of the three envelope kinds.
///
/// Serializes as the bare envelope object. Deserialization tries the most
/// specific shape first, so a cloaked envelope is never mistaken for a
/// sealed one.
#[derive(Serialize, Deserialize)]
#[serde(untagged, bound = "")]
pub enum Encrypted<T> {
    /// Signed and hidden sender
    Anonymized(Anonymized<T>),
    /// Sender revealed on decryption
    Cloaked(Cloaked<T>),
    /// No sender information
    Sealed(Sealed<T>),
}

/// Result of decrypting an [`Encrypted`] envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted<T> {
    /// The original payload
    pub value: T,
    /// Sender identifier, if the envelope kind reveals one
    pub sender: Option<String>,
}

impl<T> Encrypted<T> {
    /// Restore an envelope of any kind from plain JSON data
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::MissingField` or `ProtocolError::InvalidMessage`
    /// if the data matches none of the envelope shapes
    pub fn revive(value: Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| ProtocolError::InvalidMessage {
            reason: "envelope must be a JSON object".to_string(),
        })?;

        if object.contains_key("espsk") || object.contains_key("nonce") {
            Anonymized::revive(value).map(Self::Anonymized)
        } else if object.contains_key("encryptedSenderPublicBoxKey") {
            Cloaked::revive(value).map(Self::Cloaked)
        } else {
            Sealed::revive(value).map(Self::Sealed)
        }
    }

    /// Restore an envelope of any kind from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Self::revive(serde_json::from_str(json)?)
    }

    /// Name of the envelope kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Anonymized(_) => "anonymized",
            Self::Cloaked(_) => "cloaked",
            Self::Sealed(_) => "sealed",
        }
    }

    /// Base64 ciphertext shared by all kinds
    pub fn cipher(&self) -> &str {
        match self {
            Self::Anonymized(envelope) => envelope.cipher(),
            Self::Cloaked(envelope) => envelope.cipher(),
            Self::Sealed(envelope) => envelope.cipher(),
        }
    }

    /// Decrypt with the receiving identity.
    ///
    /// `sender` is the claimed sender identifier; anonymized envelopes
    /// require it and the other kinds ignore it.
    pub fn decrypt(&self, identity: &Identity, sender: Option<&str>) -> Result<Decrypted<T>>
    where
        T: DeserializeOwned,
    {
        match self {
            Self::Anonymized(envelope) => {
                let sender = sender.ok_or_else(|| ProtocolError::MissingField {
                    field: "sender".to_string(),
                })?;
                Ok(Decrypted {
                    value: envelope.decrypt(identity, sender)?,
                    sender: Some(sender.to_string()),
                })
            }
            Self::Cloaked(envelope) => {
                let uncloaked = envelope.decrypt(identity)?;
                Ok(Decrypted {
                    value: uncloaked.value,
                    sender: Some(uncloaked.sender),
                })
            }
            Self::Sealed(envelope) => Ok(Decrypted {
                value: envelope.decrypt(identity)?,
                sender: None,
            }),
        }
    }
}

impl<T> Clone for Encrypted<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Anonymized(envelope) => Self::Anonymized(envelope.clone()),
            Self::Cloaked(envelope) => Self::Cloaked(envelope.clone()),
            Self::Sealed(envelope) => Self::Sealed(envelope.clone()),
        }
    }
}

impl<T> PartialEq for Encrypted<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Anonymized(a), Self::Anonymized(b)) => a == b,
            (Self::Cloaked(a), Self::Cloaked(b)) => a == b,
            (Self::Sealed(a), Self::Sealed(b)) => a == b,
            _ => false,
        }
    }
}

impl<T> Eq for Encrypted<T> {}

impl<T> fmt::Debug for Encrypted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymized(envelope) => envelope.fmt(f),
            Self::Cloaked(envelope) => envelope.fmt(f),
            Self::Sealed(envelope) => envelope.fmt(f),
        }
    }
}

impl<T> From<Anonymized<T>> for Encrypted<T> {
    fn from(envelope: Anonymized<T>) -> Self {
        Self::Anonymized(envelope)
    }
}

impl<T> From<Cloaked<T>> for Encrypted<T> {
    fn from(envelope: Cloaked<T>) -> Self {
        Self::Cloaked(envelope)
    }
}

impl<T> From<Sealed<T>> for Encrypted<T> {
    fn from(envelope: Sealed<T>) -> Self {
        Self::Sealed(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{ready, Seed};
    use serde_json::json;

    fn identities() -> (Identity, Identity) {
        let context = ready().unwrap();
        (
            Identity::create(&context, Seed::from("envelope sender")),
            Identity::create(&context, Seed::from("envelope receiver")),
        )
    }

    #[test]
    fn test_revive_detects_each_kind() {
        let (alice, bob) = identities();
        let payload = json!({ "msg": "hi" });

        let envelopes: Vec<Encrypted<Value>> = vec![
            alice.seal(&payload, bob.public_identifier()).unwrap().into(),
            alice.cloak(&payload, bob.public_identifier()).unwrap().into(),
            alice.anonymize(&payload, bob.public_identifier()).unwrap().into(),
        ];

        for envelope in envelopes {
            let json = serde_json::to_string(&envelope).unwrap();
            let revived = Encrypted::<Value>::from_json(&json).unwrap();
            assert_eq!(revived.kind(), envelope.kind());
            assert_eq!(revived, envelope);

            let decrypted = revived
                .decrypt(&bob, Some(alice.public_identifier()))
                .unwrap();
            assert_eq!(decrypted.value, payload);
        }
    }

    #[test]
    fn test_untagged_deserialize_prefers_specific_shape() {
        let (alice, bob) = identities();
        let cloaked = alice.cloak(&json!(1), bob.public_identifier()).unwrap();
        let json = serde_json::to_string(&cloaked).unwrap();

        let envelope: Encrypted<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(envelope.kind(), "cloaked");
    }

    #[test]
    fn test_decrypt_reports_sender() {
        let (alice, bob) = identities();
        let payload = json!({ "msg": "hi" });

        let sealed: Encrypted<Value> = alice.seal(&payload, bob.public_identifier()).unwrap().into();
        assert_eq!(sealed.decrypt(&bob, None).unwrap().sender, None);

        let cloaked: Encrypted<Value> = alice.cloak(&payload, bob.public_identifier()).unwrap().into();
        assert_eq!(
            cloaked.decrypt(&bob, None).unwrap().sender.as_deref(),
            Some(alice.public_identifier())
        );
    }

    #[test]
    fn test_anonymized_requires_sender() {
        let (alice, bob) = identities();
        let envelope: Encrypted<Value> = alice
            .anonymize(&json!("x"), bob.public_identifier())
            .unwrap()
            .into();

        let err = envelope.decrypt(&bob, None).unwrap_err();
        assert!(err.to_string().contains("Missing required field: sender"));
    }

    #[test]
    fn test_revive_rejects_bad_shapes() {
        assert!(Encrypted::<Value>::revive(json!("cipher")).is_err());
        assert!(Encrypted::<Value>::revive(json!({})).is_err());
        assert!(Encrypted::<Value>::revive(json!({ "cipher": "***" })).is_err());
        assert!(Encrypted::<Value>::revive(json!({ "cipher": "AAAA", "espsk": "AAAA" })).is_err());
    }
}
