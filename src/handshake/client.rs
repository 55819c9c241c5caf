//! Client role: authenticate to a secured server and to other peers.

use super::server::ClientConnection;
use super::token::{HandshakeToken, PeerHandshake};
use crate::crypto::channel::short;
use crate::crypto::{Identity, SecureChannel};
use crate::utils::{ClientConfig, HandshakeError, ProtocolError, Result};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

/// Upper bound of the random id used by the secured-server probe
const PROBE_ID_RANGE: u32 = 1_000_000_000;

/// A peer that only talks over authenticated channels
#[derive(Debug)]
pub struct SecurePeer {
    identity: Identity,
    server_id: Option<String>,
    token: Option<String>,
    probe_timeout: Duration,
}

impl SecurePeer {
    /// Prepare a peer from its identity and client settings.
    ///
    /// With `config.server_id` set, the handshake token for that server is
    /// computed up front.
    pub fn new(identity: Identity, config: &ClientConfig) -> Result<Self> {
        let token = config
            .server_id
            .as_deref()
            .map(|server_id| HandshakeToken::issue(&identity, server_id))
            .transpose()?;

        Ok(Self {
            identity,
            server_id: config.server_id.clone(),
            token,
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
        })
    }

    /// Our identifier; also the id requested from the signaling server
    pub fn id(&self) -> &str {
        self.identity.public_identifier()
    }

    /// Server this peer expects to be secured, if any
    pub fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    /// Token to present when connecting to the server
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Check the id the server assigned on open
    pub fn verify_assigned_id(&self, assigned: &str) -> Result<()> {
        if assigned == self.id() {
            Ok(())
        } else {
            Err(HandshakeError::AssignedIdMismatch {
                expected: self.id().to_string(),
                actual: assigned.to_string(),
            }
            .into())
        }
    }

    /// Dial `peer_id`.
    ///
    /// Returns the metadata to attach to the connection request and the
    /// layer to talk through once it opens.
    pub fn connect(
        &self,
        peer_id: &str,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Result<(String, SecureLayer)> {
        let channel = self.identity.init_secure_channel(peer_id)?;
        let metadata = PeerHandshake::offer(&channel)?;
        log::debug!("dialing {}", short(peer_id));
        Ok((metadata, SecureLayer::new(channel, outbound)))
    }

    /// Accept an incoming peer connection, closing it if its metadata is
    /// not a valid handshake
    pub fn accept<C: ClientConnection + ?Sized>(
        &self,
        connection: &mut C,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Result<SecureLayer> {
        match PeerHandshake::accept(&self.identity, connection.id(), connection.token()) {
            Ok(channel) => {
                log::info!("peer {} connected", short(connection.id()));
                Ok(SecureLayer::new(channel, outbound))
            }
            Err(e) => {
                connection.close();
                log::warn!("invalid handshake from {}: {}", short(connection.id()), e);
                Err(e)
            }
        }
    }

    /// Random numeric id for the unauthenticated probe connection
    pub fn probe_peer_id(&self) -> String {
        self.identity
            .context()
            .rng()
            .gen_range(0..PROBE_ID_RANGE)
            .to_string()
    }

    /// Decide whether the server enforces handshakes.
    ///
    /// `disconnected` must resolve when the server drops a probe connection
    /// made without a token (see [`Self::probe_peer_id`]). Resolving within
    /// the probe timeout counts as secured. This is a best-effort
    /// observation, not authentication.
    pub async fn probe_secured_server<F>(&self, disconnected: F) -> bool
    where
        F: Future<Output = ()>,
    {
        let secured = tokio::time::timeout(self.probe_timeout, disconnected)
            .await
            .is_ok();
        log::debug!("server probe: secured = {}", secured);
        secured
    }
}

/// Encrypted messaging over one peer connection
#[derive(Debug)]
pub struct SecureLayer {
    channel: SecureChannel,
    outbound: mpsc::UnboundedSender<String>,
}

impl SecureLayer {
    /// Wrap a channel and the sink for outgoing frames
    pub fn new(channel: SecureChannel, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self { channel, outbound }
    }

    /// Identifier of the remote peer
    pub fn peer_id(&self) -> &str {
        self.channel.peer_id()
    }

    /// Encrypt `value` and queue the frame
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::ConnectionClosed` if the frame sink is gone
    pub fn send<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let frame = self.channel.encrypt(value)?;
        self.outbound.send(frame).map_err(|_| {
            ProtocolError::ConnectionClosed {
                peer_id: self.peer_id().to_string(),
            }
            .into()
        })
    }

    /// Decrypt a frame received from the remote peer
    pub fn receive<T: DeserializeOwned>(&self, frame: &str) -> Result<T> {
        self.channel.decrypt(frame)
    }
}
