//! Identity authentication over an external transport.
//!
//! The transport itself (signaling server, data connections) lives outside
//! this crate. It hands us the claimed peer id and the opaque token or
//! metadata of each connection, and we decide whether to keep it:
//!
//! 1. A client encrypts `{ serverId, peerId }` to the server's identifier
//!    and presents it when connecting ([`HandshakeToken`]).
//! 2. The server's [`HandshakeGuard`] decrypts it with a channel to the
//!    claimed client id and closes the connection on any mismatch.
//! 3. Peers dialing each other do the same with `{ tx, rx }`
//!    ([`PeerHandshake`]).
//! 4. A client can check whether a server enforces step 2 by watching
//!    whether an unauthenticated probe connection gets dropped
//!    ([`SecurePeer::probe_secured_server`]).

pub mod client;
pub mod server;
pub mod token;

pub use client::{SecureLayer, SecurePeer};
pub use server::{ClientConnection, HandshakeGuard, ServerEvent};
pub use token::{HandshakeToken, PeerHandshake};
