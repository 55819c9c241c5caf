//! Envelope types exchanged with a push relay.
//!
//! A subscriber obtains VAPID keys that the relay anonymized to itself,
//! seals its browser push subscription to the relay and hands both out as a
//! [`PushAuthorization`]. Anyone holding an authorization can then have the
//! relay deliver a cloaked payload, while the relay learns neither the sender
//! nor the payload and the subscriber learns the sender only on decryption.
//!
//! HTTP routes and the actual Web Push delivery are left to the relay.

use crate::crypto::Identity;
use crate::envelope::{Anonymized, Cloaked, Sealed};
use crate::utils::{ProtocolError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// VAPID key pair in the encoding used by Web Push libraries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidKeys {
    /// URL-safe base64 private key
    pub private_key: String,
    /// URL-safe base64 public key
    pub public_key: String,
}

/// Browser push subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    /// Push service URL
    pub endpoint: String,
    /// Expiry in milliseconds since the epoch
    #[serde(default)]
    pub expiration_time: Option<u64>,
    /// Keys the payload is encrypted with by the push library
    pub keys: PushSubscriptionKeys,
}

/// Client keys of a [`PushSubscription`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscriptionKeys {
    /// P-256 public key of the browser
    pub p256dh: String,
    /// Authentication secret
    pub auth: String,
}

/// Everything needed to push to one subscriber, readable only by the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound = "")]
pub struct PushAuthorization<S = PushSubscription> {
    /// Subscription sealed to the relay
    pub sealed_push_subscription: Sealed<S>,
    /// VAPID keys the relay anonymized to itself
    pub anonymized_vapid_keys: Anonymized<VapidKeys>,
}

/// Push request body as seen by the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PushMessage<P = Value, S = PushSubscription> {
    /// Authorization of the receiving subscriber
    pub a: PushAuthorization<S>,
    /// Payload cloaked to the receiver
    pub cno: Cloaked<P>,
}

/// Request to push a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound = "")]
pub struct PushMessageRequest<P = Value, S = PushSubscription> {
    /// Identifier of the requester
    pub peer_id: String,
    /// Message to deliver
    pub message: PushMessage<P, S>,
}

/// Request for a new VAPID key pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushVapidRequest {
    /// Identifier of the requester
    pub peer_id: String,
}

/// Relay answer to a [`PushVapidRequest`], itself sent anonymized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushVapidResponse {
    /// Key pair anonymized from the relay to itself
    pub encrypted_vapid_keys: Anonymized<VapidKeys>,
    /// Public key the subscriber registers its push subscription with
    pub vapid_public_key: String,
}

/// What the relay recovers from a [`PushMessage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedPush<S = PushSubscription> {
    /// Keys to sign the delivery with
    pub vapid_keys: VapidKeys,
    /// Where to deliver
    pub subscription: S,
    /// JSON of the still cloaked payload, ready for delivery
    pub payload: String,
}

impl PushVapidResponse {
    /// Build the response to `requester` for freshly generated `vapid_keys`
    pub fn issue(
        relay: &Identity,
        vapid_keys: &VapidKeys,
        requester: &str,
    ) -> Result<Anonymized<Self>> {
        let response = Self {
            encrypted_vapid_keys: relay.anonymize(vapid_keys, relay.public_identifier())?,
            vapid_public_key: vapid_keys.public_key.clone(),
        };
        relay.anonymize(&response, requester)
    }

    /// Open a response received from the relay at `relay_id`
    pub fn open(envelope: &Anonymized<Self>, subscriber: &Identity, relay_id: &str) -> Result<Self> {
        envelope.decrypt(subscriber, relay_id)
    }
}

impl<S> PushAuthorization<S> {
    /// Seal `subscription` to the relay and pair it with the relay's keys
    pub fn new(
        subscriber: &Identity,
        subscription: &S,
        anonymized_vapid_keys: Anonymized<VapidKeys>,
        relay_id: &str,
    ) -> Result<Self>
    where
        S: Serialize,
    {
        Ok(Self {
            sealed_push_subscription: subscriber.seal(subscription, relay_id)?,
            anonymized_vapid_keys,
        })
    }

    /// Restore an authorization from plain JSON data
    pub fn revive(value: Value) -> Result<Self> {
        let (sealed, vapid) = match value {
            Value::Object(mut object) => (
                take(&mut object, "sealedPushSubscription")?,
                take(&mut object, "anonymizedVapidKeys")?,
            ),
            _ => return Err(not_an_object("PushAuthorization")),
        };

        Ok(Self {
            sealed_push_subscription: Sealed::revive(sealed)?,
            anonymized_vapid_keys: Anonymized::revive(vapid)?,
        })
    }
}

impl<P, S> PushMessage<P, S> {
    /// Cloak `payload` from `sender` to the subscriber `receiver`
    pub fn new(
        sender: &Identity,
        payload: &P,
        receiver: &str,
        authorization: PushAuthorization<S>,
    ) -> Result<Self>
    where
        P: Serialize,
    {
        Ok(Self {
            a: authorization,
            cno: sender.cloak(payload, receiver)?,
        })
    }

    /// Restore a push message from plain JSON data
    pub fn revive(value: Value) -> Result<Self> {
        let (a, cno) = match value {
            Value::Object(mut object) => (take(&mut object, "a")?, take(&mut object, "cno")?),
            _ => return Err(not_an_object("PushMessage")),
        };

        Ok(Self {
            a: PushAuthorization::revive(a)?,
            cno: Cloaked::revive(cno)?,
        })
    }

    /// Recover delivery details on the relay.
    ///
    /// # Errors
    ///
    /// - decryption errors if the authorization was not made for `relay`
    /// - `ProtocolError::MessageTooLarge` if the cloaked payload serializes
    ///   to `max_bytes` or more
    pub fn open(&self, relay: &Identity, max_bytes: usize) -> Result<OpenedPush<S>>
    where
        S: DeserializeOwned,
    {
        let vapid_keys = self
            .a
            .anonymized_vapid_keys
            .decrypt(relay, relay.public_identifier())?;
        let subscription = self.a.sealed_push_subscription.decrypt(relay)?;

        let payload = serde_json::to_string(&self.cno)?;
        if payload.len() >= max_bytes {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: max_bytes,
            }
            .into());
        }

        log::debug!("opened push message of {} bytes", payload.len());

        Ok(OpenedPush {
            vapid_keys,
            subscription,
            payload,
        })
    }
}

impl<P, S> PushMessageRequest<P, S> {
    /// Restore a push request from plain JSON data
    pub fn revive(value: Value) -> Result<Self> {
        let (peer_id, message) = match value {
            Value::Object(mut object) => (take(&mut object, "peerId")?, take(&mut object, "message")?),
            _ => return Err(not_an_object("PushMessageRequest")),
        };

        let peer_id = match peer_id {
            Value::String(peer_id) => peer_id,
            _ => {
                return Err(ProtocolError::InvalidMessage {
                    reason: "PushMessageRequest.peerId must be a string".to_string(),
                }
                .into())
            }
        };

        Ok(Self {
            peer_id,
            message: PushMessage::revive(message)?,
        })
    }

    /// Restore a push request from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Self::revive(serde_json::from_str(json)?)
    }
}

fn take(object: &mut serde_json::Map<String, Value>, field: &str) -> Result<Value> {
    object.remove(field).ok_or_else(|| {
        ProtocolError::MissingField {
            field: field.to_string(),
        }
        .into()
    })
}

fn not_an_object(kind: &str) -> crate::utils::PeercryptError {
    ProtocolError::InvalidMessage {
        reason: format!("{kind} must be a JSON object"),
    }
    .into()
}
