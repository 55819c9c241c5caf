//! Error types and handling for peercrypt.
//!
//! Every failure is local to the operation that detected it. Nothing here is
//! retried or recovered silently; callers at the transport boundary decide
//! whether an error terminates a connection or becomes a response status.

use thiserror::Error;

/// Result type alias for the peercrypt library
pub type Result<T> = std::result::Result<T, PeercryptError>;

/// Top-level error type for all peercrypt operations
#[derive(Error, Debug, Clone)]
pub enum PeercryptError {
    /// Cryptographic operation errors
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// Connection authentication errors
    #[error("Handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Envelope and wire format errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Configuration and I/O errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Base64 encoding/decoding errors
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Cryptographic operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The one-time readiness check of the crypto backend failed
    #[error("Crypto backend initialization failed: {reason}")]
    Initialization { reason: String },

    /// A public identifier is not the hex form of a 32-byte public key
    #[error("Invalid identifier: {id}: {reason}")]
    InvalidIdentifier { id: String, reason: String },

    /// Invalid key format or size
    #[error("Invalid key: {reason}")]
    InvalidKey { reason: String },

    /// Symmetric authentication failed (wrong shared secret or tampering)
    #[error("incorrect secret key for the given ciphertext")]
    IncorrectSecretKey,

    /// Asymmetric authentication failed (receiver or claimed sender does not match)
    #[error("incorrect key pair for the given ciphertext")]
    IncorrectKeyPair,

    /// Signature verification failure
    #[error("Signature verification failed")]
    SignatureVerification,

    /// Encryption operation failure
    #[error("Encryption failed: {reason}")]
    Encryption { reason: String },
}

/// Connection authentication errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// The connecting client presented no token
    #[error("Missing handshake token from {client_id}")]
    MissingToken { client_id: String },

    /// The token decrypted but asserts different identities
    #[error("Invalid handshake from {client_id}: {field} mismatch")]
    Mismatch { client_id: String, field: String },

    /// The token could not be decrypted or parsed
    #[error("Invalid handshake from {client_id}: {reason}")]
    Rejected { client_id: String, reason: String },

    /// The signaling server assigned an id other than our identifier
    #[error("Server assigned id {actual}, expected {expected}")]
    AssignedIdMismatch { expected: String, actual: String },
}

/// Envelope and wire format errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Invalid message format
    #[error("Invalid message format: {reason}")]
    InvalidMessage { reason: String },

    /// Message too large
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Missing required message field
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// The other end of a secured connection has gone away
    #[error("Connection to {peer_id} closed")]
    ConnectionClosed { peer_id: String },
}

/// Configuration errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Configuration parsing error
    #[error("Configuration parse error: {reason}")]
    ParseError { reason: String },

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PeercryptError {
    /// Returns true if this error means authentication material did not check out
    pub fn is_security_violation(&self) -> bool {
        matches!(
            self,
            Self::Crypto(CryptoError::IncorrectSecretKey)
                | Self::Crypto(CryptoError::IncorrectKeyPair)
                | Self::Crypto(CryptoError::SignatureVerification)
                | Self::Handshake(_)
        )
    }

    /// Returns true if this error was caused by malformed input rather than keys
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::Crypto(CryptoError::InvalidIdentifier { .. })
                | Self::Protocol(ProtocolError::InvalidMessage { .. })
                | Self::Protocol(ProtocolError::MissingField { .. })
                | Self::Serialization(_)
                | Self::Base64(_)
        )
    }
}

impl From<std::io::Error> for PeercryptError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PeercryptError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = PeercryptError::Crypto(CryptoError::InvalidIdentifier {
            id: "invalid key".to_string(),
            reason: "Invalid character 'i' at position 0".to_string(),
        });
        assert!(error.to_string().contains("Invalid identifier: invalid key"));

        let error = PeercryptError::from(CryptoError::IncorrectSecretKey);
        assert!(error
            .to_string()
            .contains("incorrect secret key for the given ciphertext"));
    }

    #[test]
    fn test_security_violations() {
        let sig_error = PeercryptError::Crypto(CryptoError::SignatureVerification);
        assert!(sig_error.is_security_violation());
        assert!(!sig_error.is_malformed_input());

        let handshake = PeercryptError::from(HandshakeError::MissingToken {
            client_id: "abc".to_string(),
        });
        assert!(handshake.is_security_violation());

        let size = PeercryptError::from(ProtocolError::MessageTooLarge { size: 10, max: 5 });
        assert!(!size.is_security_violation());
    }

    #[test]
    fn test_malformed_input() {
        let bad_id = PeercryptError::from(CryptoError::InvalidIdentifier {
            id: "zz".to_string(),
            reason: "not hex".to_string(),
        });
        assert!(bad_id.is_malformed_input());

        let json: std::result::Result<u8, _> = serde_json::from_str("{");
        let err = PeercryptError::from(json.unwrap_err());
        assert!(err.is_malformed_input());
    }
}
