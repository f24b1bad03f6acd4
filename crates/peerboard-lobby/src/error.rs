//! Error types for the lobby layer.

use peerboard_protocol::PeerId;
use peerboard_room::RoomError;

/// Errors returned by lobby operations.
///
/// Malformed or unexpected wire messages never show up here; they are
/// logged and dropped.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// The lobby room could not be used.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The lobby session has stopped.
    #[error("lobby session has stopped")]
    Closed,

    /// The peer is not in our peer table.
    #[error("peer {0} is not in the lobby")]
    UnknownPeer(PeerId),

    /// A challenge addressed to our own id.
    #[error("cannot challenge ourselves")]
    SelfChallenge,

    /// Accept or decline with nothing to answer.
    #[error("no challenge is pending")]
    NoPendingChallenge,

    /// The rating store failed to load or save.
    #[error("rating storage failed: {0}")]
    Storage(String),
}
