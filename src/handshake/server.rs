//! Server role: refuse every connection without a valid handshake token.

use super::token::HandshakeToken;
use crate::crypto::channel::short;
use crate::crypto::Identity;
use crate::utils::Result;
use tokio::sync::mpsc;

/// A freshly opened connection as seen by the signaling server
pub trait ClientConnection {
    /// Identifier the client claims
    fn id(&self) -> &str;

    /// Token sent with the connection request, if any
    fn token(&self) -> Option<&str>;

    /// Close the underlying socket
    fn close(&mut self);
}

/// Events raised by [`HandshakeGuard`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A client proved its identity
    Connected {
        client_id: String,
    },
    /// A client was refused and its socket closed
    HandshakeError {
        client_id: String,
        token: Option<String>,
        reason: String,
    },
}

/// Validates incoming connections against the server identity
pub struct HandshakeGuard {
    identity: Identity,
    events: mpsc::UnboundedSender<ServerEvent>,
}

impl HandshakeGuard {
    /// Create a guard and the receiving end of its event stream
    pub fn new(identity: Identity) -> (Self, mpsc::UnboundedReceiver<ServerEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        log::info!("handshake guard for server {}", identity.public_identifier());
        (Self { identity, events }, receiver)
    }

    /// Identifier clients must name as `serverId`
    pub fn server_id(&self) -> &str {
        self.identity.public_identifier()
    }

    /// Check the token of a new connection.
    ///
    /// A rejected connection is closed before this returns; other
    /// connections are never affected.
    pub fn handle_connection<C: ClientConnection + ?Sized>(
        &self,
        connection: &mut C,
    ) -> Result<HandshakeToken> {
        let client_id = connection.id().to_string();

        match HandshakeToken::verify(&self.identity, &client_id, connection.token()) {
            Ok(token) => {
                log::info!("client {} authenticated", short(&client_id));
                self.emit(ServerEvent::Connected { client_id });
                Ok(token)
            }
            Err(e) => {
                let token = connection.token().map(str::to_string);
                connection.close();
                log::warn!("rejected client {}: {}", short(&client_id), e);
                self.emit(ServerEvent::HandshakeError {
                    client_id,
                    token,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn emit(&self, event: ServerEvent) {
        if self.events.send(event).is_err() {
            log::debug!("server event dropped: no listener");
        }
    }
}
