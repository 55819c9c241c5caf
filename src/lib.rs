//! # peercrypt
//!
//! Cryptographic identities and encrypted envelopes for peer-to-peer
//! applications that talk through untrusted signaling and push servers.
//!
//! ## Features
//!
//! - **Identities**: Ed25519 signing and X25519 box key pairs derived from one seed
//! - **Secure Channels**: pairwise authenticated encryption with a precomputed key
//! - **Envelopes**: sealed, cloaked and anonymized messages with different sender visibility
//! - **Handshake**: token-based authentication of clients, servers and peers
//! - **Push**: envelope types for relaying Web Push messages blindly
//!
//! ## Quick Start
//!
//! ```rust
//! use peercrypt::crypto::{ready, Identity, Seed};
//! use serde_json::{json, Value};
//!
//! let context = ready()?;
//! let alice = Identity::create(&context, Seed::from("seed-A"));
//! let bob = Identity::create(&context, Seed::from("seed-B"));
//!
//! let envelope = alice.anonymize(&json!({ "msg": "hi" }), bob.public_identifier())?;
//! let value: Value = bob.decrypt(&envelope, alice.public_identifier())?;
//! assert_eq!(value, json!({ "msg": "hi" }));
//! # Ok::<(), peercrypt::PeercryptError>(())
//! ```
//!
//! ## Architecture
//!
//! - [`crypto`]: readiness gate, identities and secure channels
//! - [`envelope`]: the `Sealed`, `Cloaked` and `Anonymized` envelopes
//! - [`handshake`]: connection authentication over an external transport
//! - [`push`]: push relay request and authorization types
//! - [`utils`]: configuration, error handling and logging

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod envelope;
pub mod handshake;
pub mod push;
pub mod utils;

#[cfg(test)]
mod proptests;

// Re-export commonly used types for convenience
pub use crypto::{ready, CryptoContext, Identity, SecureChannel, Seed};
pub use envelope::{Anonymized, Cloaked, Decrypted, Encrypted, Sealed, Uncloaked};
pub use handshake::{HandshakeGuard, HandshakeToken, SecureLayer, SecurePeer};
pub use utils::{PeercryptConfig, PeercryptError, Result};

/// Version information for the peercrypt protocol
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Default configuration values
pub mod defaults {
    /// Default wait for a secured server to drop the probe connection, in milliseconds
    pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5000;

    /// Default limit for the serialized cloaked payload of a push message
    pub const DEFAULT_PUSH_MAX_BYTES: usize = 4000;
}
