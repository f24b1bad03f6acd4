//! Error types for the room layer.

use peerboard_protocol::{ProtocolError, RoomId};
use peerboard_transport::TransportError;

/// Errors that can occur during room operations.
///
/// Sends never produce one of these: sending on a room without peers, or
/// on one that was left, is a silent no-op.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room's actor has stopped (the room was left or its last
    /// handle dropped).
    #[error("room {0} is closed")]
    Closed(RoomId),

    /// No room is registered under this id.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// A different room is already registered under this id.
    #[error("room {0} already exists")]
    AlreadyExists(RoomId),

    /// Joining or opening the underlying transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An action name or payload could not be used on the wire.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
