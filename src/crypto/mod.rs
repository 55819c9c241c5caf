//! Cryptographic primitives and identity management.
//!
//! This module provides the readiness gate, long-term identities and the
//! pairwise secure channels built from them. The primitives follow the NaCl
//! box construction (X25519, XSalsa20-Poly1305, Ed25519) so that messages are
//! interchangeable with libsodium-based peers.

pub mod channel;
pub mod context;
pub mod identity;

pub use channel::SecureChannel;
pub use context::{ready, CryptoContext};
pub use identity::*;

use base64::engine::general_purpose::{GeneralPurpose, URL_SAFE_NO_PAD};

/// Base64 flavour used for every binary field on the wire
pub const BASE64: GeneralPurpose = URL_SAFE_NO_PAD;

/// XSalsa20 nonce length
pub const NONCE_LENGTH: usize = 24;

/// Poly1305 authentication tag length
pub const MAC_LENGTH: usize = 16;

/// Ed25519 detached signature length
pub const SIGNATURE_LENGTH: usize = ed25519_dalek::SIGNATURE_LENGTH;
