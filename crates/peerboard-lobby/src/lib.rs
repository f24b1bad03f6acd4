//! Lobby protocol for Peerboard.
//!
//! Peers in a shared lobby room gossip their presence with periodic
//! heartbeats and pair up through a two-message challenge handshake:
//!
//! ```text
//! A ──challenge{gameId, proposedColor}──→ B
//! A ←──challResp{accept|decline, gameId}── B
//! ```
//!
//! On acceptance both sides derive a [`MatchTicket`]: the challenger plays
//! the proposed color, the acceptor the other one, and both move to the
//! match room named by the game id.
//!
//! # Key types
//!
//! - [`Lobby`]: the pure state machine (peer table, challenge slots)
//! - [`LobbySession`]: actor that runs a [`Lobby`] over a room
//! - [`rating`]: Elo updates and the [`RatingStore`] they persist through

mod config;
mod error;
mod lobby;
pub mod rating;
mod session;

pub use config::{LobbyConfig, DEFAULT_LOBBY_ROOM, DEFAULT_RATING};
pub use error::LobbyError;
pub use lobby::{
    Lobby, LobbyPeer, MatchTicket, PendingChallenge, ResponseOutcome, SentChallenge,
    TransportTag,
};
pub use rating::{MemoryRatingStore, RatingProfile, RatingRecord, RatingStore, Score};
pub use session::{LobbyEvent, LobbyIdentity, LobbySession};
