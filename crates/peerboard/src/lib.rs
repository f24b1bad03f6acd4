//! # Peerboard
//!
//! Serverless matchmaking and match replication for two-player board
//! games.
//!
//! Peers find each other in a shared lobby room, pair up with a
//! challenge handshake, and then replicate an append-only event log in a
//! room of their own. There is no server: every peer validates moves with
//! the same [`RulesEngine`](peerboard_match::RulesEngine) and replays the
//! same log to the same state.
//!
//! Two carriers are supported and chosen once per room: a wide-area
//! rendezvous service, and a short-range point-to-point byte link.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use peerboard::prelude::*;
//!
//! let hub = MemoryRendezvous::new();
//! let mut node = NodeBuilder::new().name("Al").build(hub.endpoint());
//! let (lobby, mut events) = node.join_lobby().await?;
//! // ... challenge a peer, wait for LobbyEvent::Matched(ticket) ...
//! let (game, updates) = node.start_match(&ticket, TicTacToe).await?;
//! game.play(MoveRequest::place("b2")).await?;
//! ```

mod error;
mod node;

pub use error::PeerboardError;
pub use node::{game_report, Node, NodeBuilder, NodeConfig};

pub use peerboard_lobby as lobby;
pub use peerboard_match as game;
pub use peerboard_protocol as protocol;
pub use peerboard_room as room;
pub use peerboard_tick as tick;
pub use peerboard_transport as transport;

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, defaulting to
/// `info`. Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// The types most applications need.
pub mod prelude {
    pub use crate::{init_tracing, Node, NodeBuilder, NodeConfig, PeerboardError};

    pub use peerboard_lobby::{
        LobbyConfig, LobbyEvent, LobbyPeer, LobbySession, MatchTicket, MemoryRatingStore,
        RatingStore,
    };
    pub use peerboard_match::{
        MatchConfig, MatchEvent, MatchResult, MatchSession, MatchView, MoveRequest, Outcome,
        RulesEngine, TicTacToe,
    };
    pub use peerboard_protocol::{Color, GameId, PeerId, RoomId};
    pub use peerboard_room::RoomConfig;
    pub use peerboard_transport::{
        memory_link_pair, MemoryDiscovery, MemoryRendezvous, RetryPolicy,
    };
}
