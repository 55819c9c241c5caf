//! Long-term peer identities.
//!
//! An [`Identity`] owns a 32-byte seed from which an Ed25519 signing key pair
//! and an X25519 encryption ("box") key pair are derived. The lower-case hex
//! form of the box public key is the peer's public identifier and doubles as
//! its address on the signaling and push layers.

use crate::crypto::{CryptoContext, SecureChannel};
use crate::envelope::{Anonymized, Cloaked, Sealed, Uncloaked};
use crate::utils::{CryptoError, Result};
use blake2::{digest::consts::U32, Blake2b, Digest};
use crypto_box::{PublicKey, SecretKey};
use ed25519_dalek::{SigningKey, KEYPAIR_LENGTH, PUBLIC_KEY_LENGTH};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::fmt;
use zeroize::Zeroizing;

/// Length of an identity seed
pub const SEED_LENGTH: usize = 32;

/// Length of an X25519 public or private key
pub const BOX_KEY_LENGTH: usize = 32;

/// Length of an Ed25519 public key
pub const SIGN_PUBLIC_KEY_LENGTH: usize = PUBLIC_KEY_LENGTH;

/// Length of an Ed25519 private key in `seed || public` form
pub const SIGN_PRIVATE_KEY_LENGTH: usize = KEYPAIR_LENGTH;

/// `keyType` tag of the signing key pair
pub const SIGN_KEY_TYPE: &str = "ed25519";

/// `keyType` tag of the box key pair
pub const BOX_KEY_TYPE: &str = "x25519";

type Blake2b256 = Blake2b<U32>;

/// Source of an identity seed
#[derive(Clone)]
pub enum Seed {
    /// Fresh seed from the system RNG
    Random,
    /// Exact seed bytes
    Bytes([u8; SEED_LENGTH]),
    /// Passphrase hashed to seed length with BLAKE2b
    Phrase(String),
}

impl Seed {
    /// Build a byte seed, checking its length
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if `bytes` is not `SEED_LENGTH` long
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        seed_array(bytes).map(Self::Bytes)
    }

    fn resolve(self, context: &CryptoContext) -> Zeroizing<[u8; SEED_LENGTH]> {
        match self {
            Self::Random => Zeroizing::new(context.random_bytes()),
            Self::Bytes(bytes) => Zeroizing::new(bytes),
            Self::Phrase(phrase) => {
                let mut seed = Zeroizing::new([0u8; SEED_LENGTH]);
                seed.copy_from_slice(&Blake2b256::digest(phrase.as_bytes()));
                seed
            }
        }
    }
}

impl From<&str> for Seed {
    fn from(phrase: &str) -> Self {
        Self::Phrase(phrase.to_string())
    }
}

impl From<[u8; SEED_LENGTH]> for Seed {
    fn from(bytes: [u8; SEED_LENGTH]) -> Self {
        Self::Bytes(bytes)
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => f.write_str("Seed::Random"),
            Self::Bytes(_) => f.write_str("Seed::Bytes(..)"),
            Self::Phrase(_) => f.write_str("Seed::Phrase(..)"),
        }
    }
}

fn seed_array(bytes: &[u8]) -> Result<[u8; SEED_LENGTH]> {
    bytes.try_into().map_err(|_| {
        CryptoError::InvalidKey {
            reason: format!(
                "Invalid seed length: expected {}, got {}",
                SEED_LENGTH,
                bytes.len()
            ),
        }
        .into()
    })
}

/// Encode a box public key as a public identifier
pub fn public_key_to_identifier(public_key: &[u8; BOX_KEY_LENGTH]) -> String {
    hex::encode(public_key)
}

/// Decode a public identifier back into a box public key
///
/// # Errors
///
/// Returns `CryptoError::InvalidIdentifier`, naming the offending string, if
/// it is not hex or does not decode to exactly `BOX_KEY_LENGTH` bytes
pub fn identifier_to_public_key(id: &str) -> Result<PublicKey> {
    let bytes = hex::decode(id).map_err(|e| CryptoError::InvalidIdentifier {
        id: id.to_string(),
        reason: e.to_string(),
    })?;

    let key: [u8; BOX_KEY_LENGTH] =
        bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| CryptoError::InvalidIdentifier {
                id: id.to_string(),
                reason: format!("expected {} bytes, got {}", BOX_KEY_LENGTH, bytes.len()),
            })?;

    Ok(PublicKey::from(key))
}

/// JSON-safe form of a key pair; byte strings are plain number arrays
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPairJson {
    /// Public key bytes
    pub public_key: Vec<u8>,
    /// Private key bytes
    pub private_key: Vec<u8>,
    /// Key algorithm tag
    pub key_type: String,
}

/// JSON-safe form of an identity, e.g. for posting to a background worker
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityJson {
    /// Public identifier
    pub id: String,
    /// Seed bytes
    pub seed: Vec<u8>,
    /// Ed25519 key pair
    pub sign_key_pair: KeyPairJson,
    /// X25519 key pair
    pub box_key_pair: KeyPairJson,
}

/// A peer's long-term key material and derived public identifier
#[derive(Clone)]
pub struct Identity {
    context: CryptoContext,
    seed: Zeroizing<[u8; SEED_LENGTH]>,
    signing_key: SigningKey,
    box_secret: Zeroizing<[u8; BOX_KEY_LENGTH]>,
    box_public: [u8; BOX_KEY_LENGTH],
    public_identifier: String,
}

impl Identity {
    /// Create an identity from a seed source
    ///
    /// Identical seeds always yield byte-identical key pairs and identifiers.
    ///
    /// # Example
    ///
    /// ```rust
    /// use peercrypt::crypto::{ready, Identity, Seed};
    ///
    /// let context = ready().unwrap();
    /// let alice = Identity::create(&context, Seed::from("seed-A"));
    /// let again = Identity::create(&context, Seed::from("seed-A"));
    /// assert_eq!(alice.public_identifier(), again.public_identifier());
    /// ```
    pub fn create(context: &CryptoContext, seed: Seed) -> Self {
        let seed = seed.resolve(context);

        let signing_key = SigningKey::from_bytes(&seed);

        let digest = Sha512::digest(seed.as_slice());
        let mut box_secret = Zeroizing::new([0u8; BOX_KEY_LENGTH]);
        box_secret.copy_from_slice(&digest[..BOX_KEY_LENGTH]);

        Self::from_parts(*context, seed, signing_key, box_secret)
    }

    fn from_parts(
        context: CryptoContext,
        seed: Zeroizing<[u8; SEED_LENGTH]>,
        signing_key: SigningKey,
        box_secret: Zeroizing<[u8; BOX_KEY_LENGTH]>,
    ) -> Self {
        let box_public = *SecretKey::from(*box_secret).public_key().as_bytes();
        let public_identifier = public_key_to_identifier(&box_public);

        Self {
            context,
            seed,
            signing_key,
            box_secret,
            box_public,
            public_identifier,
        }
    }

    /// The hex identifier peers address this identity by
    pub fn public_identifier(&self) -> &str {
        &self.public_identifier
    }

    /// The seed all key material was derived from
    pub fn seed(&self) -> &[u8; SEED_LENGTH] {
        &self.seed
    }

    /// Ed25519 public key
    pub fn sign_public_key(&self) -> [u8; SIGN_PUBLIC_KEY_LENGTH] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// X25519 public key
    pub fn box_public_key(&self) -> &[u8; BOX_KEY_LENGTH] {
        &self.box_public
    }

    /// The readiness capability this identity was created under
    pub fn context(&self) -> &CryptoContext {
        &self.context
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub(crate) fn box_secret_key(&self) -> SecretKey {
        SecretKey::from(*self.box_secret)
    }

    /// Export seed and key pairs as plain byte arrays
    pub fn export(&self) -> IdentityJson {
        IdentityJson {
            id: self.public_identifier.clone(),
            seed: self.seed.to_vec(),
            sign_key_pair: KeyPairJson {
                public_key: self.sign_public_key().to_vec(),
                private_key: self.signing_key.to_keypair_bytes().to_vec(),
                key_type: SIGN_KEY_TYPE.to_string(),
            },
            box_key_pair: KeyPairJson {
                public_key: self.box_public.to_vec(),
                private_key: self.box_secret.to_vec(),
                key_type: BOX_KEY_TYPE.to_string(),
            },
        }
    }

    /// Serialize to the JSON identity format
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.export()).map_err(Into::into)
    }

    /// Rebuild an identity from its exported form
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if a length or key type is wrong, a
    /// private key does not match its public key, or `id` does not match the
    /// box public key
    pub fn import(context: &CryptoContext, json: IdentityJson) -> Result<Self> {
        let seed = Zeroizing::new(seed_array(&json.seed)?);

        check_key_type(&json.sign_key_pair, SIGN_KEY_TYPE)?;
        check_key_type(&json.box_key_pair, BOX_KEY_TYPE)?;

        let keypair_bytes: [u8; SIGN_PRIVATE_KEY_LENGTH] = json
            .sign_key_pair
            .private_key
            .as_slice()
            .try_into()
            .map_err(|_| invalid_key("signing private key has wrong length"))?;
        let signing_key = SigningKey::from_keypair_bytes(&keypair_bytes)
            .map_err(|_| invalid_key("signing private key does not match its public key"))?;
        if json.sign_key_pair.public_key != signing_key.verifying_key().to_bytes() {
            return Err(invalid_key("signing public key does not match private key"));
        }

        let box_secret: [u8; BOX_KEY_LENGTH] = json
            .box_key_pair
            .private_key
            .as_slice()
            .try_into()
            .map_err(|_| invalid_key("box private key has wrong length"))?;

        let identity = Self::from_parts(*context, seed, signing_key, Zeroizing::new(box_secret));

        if json.box_key_pair.public_key != identity.box_public {
            return Err(invalid_key("box public key does not match private key"));
        }
        if json.id != identity.public_identifier {
            return Err(invalid_key("identifier does not match box public key"));
        }

        Ok(identity)
    }

    /// Parse the JSON identity format
    pub fn from_json(context: &CryptoContext, json: &str) -> Result<Self> {
        Self::import(context, serde_json::from_str(json)?)
    }

    /// Open a secure channel to another peer
    pub fn init_secure_channel(&self, other: &str) -> Result<SecureChannel> {
        SecureChannel::new(self, other)
    }

    /// Seal a value for `receiver` without any trace of the sender
    pub fn seal<T: Serialize>(&self, value: &T, receiver: &str) -> Result<Sealed<T>> {
        Sealed::new(&self.context, value, receiver)
    }

    /// Cloak a value for `receiver`; the sender is revealed on decryption
    pub fn cloak<T: Serialize>(&self, value: &T, receiver: &str) -> Result<Cloaked<T>> {
        let receiver_key = identifier_to_public_key(receiver)?;
        Cloaked::new(&self.context, value, &self.box_public, receiver_key.as_bytes())
    }

    /// Anonymize a value for `receiver`, signed by this identity
    pub fn anonymize<T: Serialize>(&self, value: &T, receiver: &str) -> Result<Anonymized<T>> {
        Anonymized::new(value, self, receiver)
    }

    /// Open a sealed envelope addressed to this identity
    pub fn unseal<T: DeserializeOwned>(&self, sealed: &Sealed<T>) -> Result<T> {
        sealed.decrypt(self)
    }

    /// Open a cloaked envelope addressed to this identity
    pub fn uncloak<T: DeserializeOwned>(&self, cloaked: &Cloaked<T>) -> Result<Uncloaked<T>> {
        cloaked.decrypt(self)
    }

    /// Verify and open an anonymized envelope believed to come from `sender`
    pub fn decrypt<T: DeserializeOwned>(&self, anonymized: &Anonymized<T>, sender: &str) -> Result<T> {
        anonymized.decrypt(self, sender)
    }
}

fn check_key_type(pair: &KeyPairJson, expected: &str) -> Result<()> {
    if pair.key_type == expected {
        Ok(())
    } else {
        Err(invalid_key(&format!(
            "unexpected key type {}, expected {}",
            pair.key_type, expected
        )))
    }
}

fn invalid_key(reason: &str) -> crate::utils::PeercryptError {
    CryptoError::InvalidKey {
        reason: reason.to_string(),
    }
    .into()
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        *self.seed == *other.seed
            && self.signing_key.to_keypair_bytes() == other.signing_key.to_keypair_bytes()
            && *self.box_secret == *other.box_secret
            && self.box_public == other.box_public
    }
}

impl Eq for Identity {}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("public_identifier", &self.public_identifier)
            .field("sign_public_key", &hex::encode(self.sign_public_key()))
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.public_identifier)
    }
}
