//! Error types for the match layer.

use peerboard_room::RoomError;

use crate::rules::IllegalMove;

/// Errors returned by local match actions.
///
/// Remote input never produces one of these: stale, duplicate or
/// malformed messages are dropped, and a departing opponent is a state
/// change, not an error.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// The match room could not be used.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The match session has stopped.
    #[error("match session has stopped")]
    Closed,

    /// Spectators cannot act on the board.
    #[error("spectators cannot act in a match")]
    Spectator,

    /// The match already has a result.
    #[error("match is already over")]
    Finished,

    /// It is the other side's move.
    #[error("not our turn")]
    NotOurTurn,

    /// The rules engine refused the move.
    #[error(transparent)]
    IllegalMove(#[from] IllegalMove),

    /// Accept or decline with no draw offer from the opponent.
    #[error("no draw offer to answer")]
    NoDrawOffer,

    /// A draw offer is already outstanding.
    #[error("a draw offer is already outstanding")]
    DrawOfferPending,
}
