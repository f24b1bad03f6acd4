//! Unified error type for Peerboard.

use peerboard_lobby::LobbyError;
use peerboard_match::MatchError;
use peerboard_protocol::ProtocolError;
use peerboard_room::RoomError;
use peerboard_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` attributes let `?` lift a sub-crate error straight into
/// this type.
#[derive(Debug, thiserror::Error)]
pub enum PeerboardError {
    /// Rendezvous or radio failure (unsupported, connect, retries spent).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encoding or framing failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room could not be opened, renamed or used.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A lobby action was refused.
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// A match action was refused.
    #[error(transparent)]
    Match(#[from] MatchError),
}
