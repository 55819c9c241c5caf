//! Handshake tokens carried as connection metadata.
//!
//! Both tokens are plain [`SecureChannel`] ciphertexts. Only the holder of
//! the claimed identity can produce one that the other side decrypts, and
//! the decrypted fields bind the token to exactly one pair of identifiers.

use crate::crypto::{Identity, SecureChannel};
use crate::utils::{HandshakeError, PeercryptError, Result};
use serde::{Deserialize, Serialize};

/// Client-to-server token: `{ serverId, peerId }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeToken {
    /// Identifier of the server the client means to reach
    pub server_id: String,
    /// Identifier of the connecting client
    pub peer_id: String,
}

impl HandshakeToken {
    /// Encrypt a token from `client` to the server at `server_id`
    pub fn issue(client: &Identity, server_id: &str) -> Result<String> {
        let token = Self {
            server_id: server_id.to_string(),
            peer_id: client.public_identifier().to_string(),
        };
        client.init_secure_channel(server_id)?.encrypt(&token)
    }

    /// Check a token presented by the client that claims `client_id`
    ///
    /// # Errors
    ///
    /// - `HandshakeError::MissingToken` if `token` is `None`
    /// - `HandshakeError::Rejected` if it cannot be decrypted or parsed
    /// - `HandshakeError::Mismatch` if it names another client or server
    pub fn verify(server: &Identity, client_id: &str, token: Option<&str>) -> Result<Self> {
        let token = token.ok_or_else(|| HandshakeError::MissingToken {
            client_id: client_id.to_string(),
        })?;

        let decrypted: Self = open(server, client_id, token)?;

        if decrypted.peer_id != client_id {
            return Err(mismatch(client_id, "peerId"));
        }
        if decrypted.server_id != server.public_identifier() {
            return Err(mismatch(client_id, "serverId"));
        }

        Ok(decrypted)
    }
}

/// Peer-to-peer connection metadata: `{ tx, rx }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerHandshake {
    /// Identifier of the dialing peer
    pub tx: String,
    /// Identifier of the called peer
    pub rx: String,
}

impl PeerHandshake {
    /// Encrypt dialing metadata over an already opened channel
    pub fn offer(channel: &SecureChannel) -> Result<String> {
        channel.encrypt(&Self {
            tx: channel.local_id().to_string(),
            rx: channel.peer_id().to_string(),
        })
    }

    /// Check the metadata of a connection from `peer_id` and return the
    /// channel to talk to it
    ///
    /// # Errors
    ///
    /// Fails like [`HandshakeToken::verify`], with `tx`/`rx` as field names
    pub fn accept(callee: &Identity, peer_id: &str, metadata: Option<&str>) -> Result<SecureChannel> {
        let metadata = metadata.ok_or_else(|| HandshakeError::MissingToken {
            client_id: peer_id.to_string(),
        })?;

        let channel = callee
            .init_secure_channel(peer_id)
            .map_err(|e| rejected(peer_id, &e))?;
        let decrypted: Self = channel.decrypt(metadata).map_err(|e| rejected(peer_id, &e))?;

        if decrypted.tx != peer_id {
            return Err(mismatch(peer_id, "tx"));
        }
        if decrypted.rx != callee.public_identifier() {
            return Err(mismatch(peer_id, "rx"));
        }

        Ok(channel)
    }
}

fn open<T: serde::de::DeserializeOwned>(identity: &Identity, peer_id: &str, token: &str) -> Result<T> {
    identity
        .init_secure_channel(peer_id)
        .and_then(|channel| channel.decrypt(token))
        .map_err(|e| rejected(peer_id, &e))
}

fn rejected(client_id: &str, error: &PeercryptError) -> PeercryptError {
    HandshakeError::Rejected {
        client_id: client_id.to_string(),
        reason: error.to_string(),
    }
    .into()
}

fn mismatch(client_id: &str, field: &str) -> PeercryptError {
    HandshakeError::Mismatch {
        client_id: client_id.to_string(),
        field: field.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{ready, Seed};

    fn identity(phrase: &str) -> Identity {
        Identity::create(&ready().unwrap(), Seed::from(phrase))
    }

    #[test]
    fn test_token_accepted() {
        let server = identity("server S");
        let client = identity("client C");

        let token = HandshakeToken::issue(&client, server.public_identifier()).unwrap();
        let verified =
            HandshakeToken::verify(&server, client.public_identifier(), Some(&token)).unwrap();

        assert_eq!(verified.peer_id, client.public_identifier());
        assert_eq!(verified.server_id, server.public_identifier());
    }

    #[test]
    fn test_token_json_field_names() {
        let server = identity("server S");
        let client = identity("client C");

        let token = HandshakeToken::issue(&client, server.public_identifier()).unwrap();
        let raw: serde_json::Value = server
            .init_secure_channel(client.public_identifier())
            .unwrap()
            .decrypt(&token)
            .unwrap();

        assert_eq!(raw["serverId"], server.public_identifier());
        assert_eq!(raw["peerId"], client.public_identifier());
    }

    #[test]
    fn test_token_for_other_server_rejected() {
        let server = identity("server S");
        let other = identity("server O");
        let client = identity("client C");

        // encrypted to S but naming O as the intended server
        let channel = client.init_secure_channel(server.public_identifier()).unwrap();
        let token = channel
            .encrypt(&HandshakeToken {
                server_id: other.public_identifier().to_string(),
                peer_id: client.public_identifier().to_string(),
            })
            .unwrap();

        let err =
            HandshakeToken::verify(&server, client.public_identifier(), Some(&token)).unwrap_err();
        assert!(matches!(
            err,
            PeercryptError::Handshake(HandshakeError::Mismatch { ref field, .. }) if field == "serverId"
        ));
    }

    #[test]
    fn test_token_from_impostor_rejected() {
        let server = identity("server S");
        let client = identity("client C");
        let impostor = identity("client I");

        let token = HandshakeToken::issue(&impostor, server.public_identifier()).unwrap();
        let err =
            HandshakeToken::verify(&server, client.public_identifier(), Some(&token)).unwrap_err();
        assert!(matches!(
            err,
            PeercryptError::Handshake(HandshakeError::Rejected { .. })
        ));
        assert!(err.is_security_violation());
    }

    #[test]
    fn test_missing_and_garbage_tokens() {
        let server = identity("server S");
        let client = identity("client C");

        let err = HandshakeToken::verify(&server, client.public_identifier(), None).unwrap_err();
        assert!(matches!(
            err,
            PeercryptError::Handshake(HandshakeError::MissingToken { .. })
        ));

        assert!(HandshakeToken::verify(&server, client.public_identifier(), Some("garbage")).is_err());
        assert!(HandshakeToken::verify(&server, "not-an-id", Some("garbage")).is_err());
    }

    #[test]
    fn test_peer_handshake() {
        let alice = identity("peer A");
        let bob = identity("peer B");
        let carol = identity("peer C");

        let channel = alice.init_secure_channel(bob.public_identifier()).unwrap();
        let metadata = PeerHandshake::offer(&channel).unwrap();

        let accepted =
            PeerHandshake::accept(&bob, alice.public_identifier(), Some(&metadata)).unwrap();
        assert_eq!(accepted.peer_id(), alice.public_identifier());

        // bob's metadata forwarded to carol does not decrypt for her
        assert!(PeerHandshake::accept(&carol, alice.public_identifier(), Some(&metadata)).is_err());
        assert!(PeerHandshake::accept(&bob, alice.public_identifier(), None).is_err());
    }

    #[test]
    fn test_peer_handshake_wrong_callee() {
        let alice = identity("peer A");
        let bob = identity("peer B");
        let carol = identity("peer C");

        let channel = alice.init_secure_channel(bob.public_identifier()).unwrap();
        let metadata = channel
            .encrypt(&PeerHandshake {
                tx: alice.public_identifier().to_string(),
                rx: carol.public_identifier().to_string(),
            })
            .unwrap();

        let err = PeerHandshake::accept(&bob, alice.public_identifier(), Some(&metadata)).unwrap_err();
        assert!(err.to_string().contains("rx mismatch"));
    }
}
