//! `Node`: one player's connection to the lobby and its matches.
//!
//! A node owns the [`RoomRegistry`] for everything it has open and walks
//! the usual path:
//!
//! ```text
//! join_lobby / open_nearby_lobby ──→ LobbySession
//!        challenge + accept      ──→ MatchTicket
//!        start_match(ticket)     ──→ MatchSession in room <game id>
//! ```
//!
//! Over the rendezvous transport the lobby room is left and the game room
//! is joined fresh. Over a framed link there is only one link to the other
//! player, so the lobby room is handed to the match: the lobby session
//! detaches and the registry re-keys the room under the game id.

use peerboard_lobby::rating::{record_game, GameReport};
use peerboard_lobby::{
    LobbyConfig, LobbyEvent, LobbyIdentity, LobbySession, MatchTicket, RatingProfile,
    RatingStore, Score, TransportTag, DEFAULT_RATING,
};
use peerboard_match::{
    MatchConfig, MatchEvent, MatchSession, MatchSetup, MatchView, Outcome, RulesEngine,
};
use peerboard_protocol::{now_millis, GameId, RoomId};
use peerboard_room::{Room, RoomConfig, RoomRegistry};
use peerboard_transport::{DeviceDiscovery, Rendezvous};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::PeerboardError;

/// Every setting a [`Node`] uses, in one place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub room: RoomConfig,
    pub lobby: LobbyConfig,
    #[serde(rename = "match")]
    pub matches: MatchConfig,
}

/// Builder for a [`Node`].
///
/// # Example
///
/// ```rust,ignore
/// let hub = MemoryRendezvous::new();
/// let mut node = NodeBuilder::new().name("Al").rating(1350).build(hub.endpoint());
/// let (lobby, events) = node.join_lobby().await?;
/// ```
pub struct NodeBuilder {
    identity: LobbyIdentity,
    config: NodeConfig,
}

impl NodeBuilder {
    /// Creates a builder with default settings, no name and the default
    /// rating.
    pub fn new() -> Self {
        Self {
            identity: LobbyIdentity {
                name: String::new(),
                rating: DEFAULT_RATING,
            },
            config: NodeConfig::default(),
        }
    }

    /// Sets the display name announced in heartbeats.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.identity.name = name.into();
        self
    }

    pub fn rating(mut self, rating: u32) -> Self {
        self.identity.rating = rating;
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config.room = config;
        self
    }

    pub fn lobby_config(mut self, config: LobbyConfig) -> Self {
        self.config.lobby = config;
        self
    }

    pub fn match_config(mut self, config: MatchConfig) -> Self {
        self.config.matches = config;
        self
    }

    pub fn config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds a node that reaches other players through `rendezvous`.
    pub fn build<R: Rendezvous>(self, rendezvous: R) -> Node<R> {
        Node {
            identity: self.identity,
            rendezvous,
            rooms: RoomRegistry::new(self.config.room),
            lobby_config: self.config.lobby,
            match_config: self.config.matches,
            lobby: None,
        }
    }
}

impl Default for NodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct ActiveLobby {
    session: LobbySession,
    transport: TransportTag,
}

/// One player's node.
pub struct Node<R: Rendezvous> {
    identity: LobbyIdentity,
    rendezvous: R,
    rooms: RoomRegistry,
    lobby_config: LobbyConfig,
    match_config: MatchConfig,
    lobby: Option<ActiveLobby>,
}

impl<R: Rendezvous> Node<R> {
    pub fn identity(&self) -> &LobbyIdentity {
        &self.identity
    }

    /// Rooms this node has open.
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// The running lobby session, if any.
    pub fn lobby(&self) -> Option<&LobbySession> {
        self.lobby
            .as_ref()
            .map(|l| &l.session)
            .filter(|s| !s.is_closed())
    }

    /// Joins the global lobby over the rendezvous transport. Leaves any
    /// lobby this node was already in.
    ///
    /// # Errors
    /// [`PeerboardError::Room`] if the lobby room cannot be joined.
    pub async fn join_lobby(
        &mut self,
    ) -> Result<(LobbySession, mpsc::UnboundedReceiver<LobbyEvent>), PeerboardError> {
        self.leave_lobby().await;
        let room = self
            .rooms
            .join_rendezvous(&self.rendezvous, self.lobby_config.room_id.clone())
            .await?;
        self.start_lobby(room, TransportTag::Rendezvous).await
    }

    /// Opens a lobby over a framed link to a nearby device.
    ///
    /// # Errors
    /// [`PeerboardError::Room`] wrapping
    /// [`TransportError::Unsupported`](peerboard_transport::TransportError::Unsupported)
    /// when there is no radio, or the connect error once retries are spent.
    pub async fn open_nearby_lobby<D: DeviceDiscovery>(
        &mut self,
        discovery: &D,
    ) -> Result<(LobbySession, mpsc::UnboundedReceiver<LobbyEvent>), PeerboardError> {
        self.leave_lobby().await;
        let room = self
            .rooms
            .open_link(discovery, self.lobby_config.room_id.clone())
            .await?;
        self.start_lobby(room, TransportTag::Link).await
    }

    async fn start_lobby(
        &mut self,
        room: Room,
        transport: TransportTag,
    ) -> Result<(LobbySession, mpsc::UnboundedReceiver<LobbyEvent>), PeerboardError> {
        let (session, events) = LobbySession::start(
            room,
            self.identity.clone(),
            transport,
            self.lobby_config.clone(),
        )
        .await?;
        tracing::info!(room_id = %session.room().id(), ?transport, "lobby joined");
        self.lobby = Some(ActiveLobby {
            session: session.clone(),
            transport,
        });
        Ok((session, events))
    }

    /// Leaves the lobby, if one is running.
    pub async fn leave_lobby(&mut self) {
        if let Some(active) = self.lobby.take() {
            let id = active.session.room().id().clone();
            active.session.leave().await;
            self.rooms.leave(&id).await;
        }
    }

    /// Starts the match a lobby handshake produced.
    ///
    /// # Errors
    /// [`PeerboardError::Room`] if the match room cannot be opened.
    pub async fn start_match<E: RulesEngine>(
        &mut self,
        ticket: &MatchTicket,
        rules: E,
    ) -> Result<(MatchSession, mpsc::UnboundedReceiver<MatchEvent>), PeerboardError> {
        let game_room = ticket.game_id.room_id();
        let room = match self.lobby.take() {
            Some(active) if active.transport == TransportTag::Link => {
                let lobby_room = active.session.detach().await;
                let lobby_id = lobby_room.id().clone();
                tracing::debug!(from = %lobby_id, to = %game_room, "handing link over to match");
                self.rooms.rekey(&lobby_id, game_room).await?
            }
            Some(active) => {
                self.lobby = Some(active);
                self.leave_lobby().await;
                self.join_room(game_room).await?
            }
            None => self.join_room(game_room).await?,
        };

        let setup = MatchSetup {
            game_id: ticket.game_id.clone(),
            color: Some(ticket.color),
            opponent: Some(ticket.opponent.clone()),
        };
        tracing::info!(
            game_id = %ticket.game_id,
            color = %ticket.color,
            opponent = %ticket.opponent,
            "match starting"
        );
        Ok(MatchSession::start(room, setup, rules, self.match_config.clone()).await?)
    }

    /// Watches a match without playing in it.
    ///
    /// # Errors
    /// [`PeerboardError::Room`] if the match room cannot be joined.
    pub async fn spectate<E: RulesEngine>(
        &mut self,
        game_id: &GameId,
        rules: E,
    ) -> Result<(MatchSession, mpsc::UnboundedReceiver<MatchEvent>), PeerboardError> {
        let room = self.join_room(game_id.room_id()).await?;
        let setup = MatchSetup {
            game_id: game_id.clone(),
            color: None,
            opponent: None,
        };
        tracing::info!(%game_id, "spectating");
        Ok(MatchSession::start(room, setup, rules, self.match_config.clone()).await?)
    }

    /// Leaves the match room for `game_id`, stopping any session on it.
    /// Returns whether the room was still open.
    pub async fn leave_match(&mut self, game_id: &GameId) -> bool {
        let left = self.rooms.leave(&game_id.room_id()).await;
        if left {
            tracing::info!(%game_id, "match left");
        }
        left
    }

    async fn join_room(&mut self, id: RoomId) -> Result<Room, PeerboardError> {
        Ok(self.rooms.join_rendezvous(&self.rendezvous, id).await?)
    }

    /// Applies a finished match to the stored rating and adopts the new
    /// rating for future heartbeats. Returns `None` while the match is
    /// still running and for spectators.
    ///
    /// # Errors
    /// [`PeerboardError::Lobby`] if the store fails.
    pub async fn record_result<S: RatingStore>(
        &mut self,
        store: &S,
        view: &MatchView,
        opponent_rating: u32,
    ) -> Result<Option<RatingProfile>, PeerboardError> {
        let Some(report) = game_report(view, opponent_rating) else {
            return Ok(None);
        };
        let profile = record_game(store, report).await?;
        self.identity.rating = profile.record.rating;
        if let Some(lobby) = self.lobby() {
            lobby.set_rating(profile.record.rating).await;
        }
        Ok(Some(profile))
    }

    /// Leaves every open room.
    pub async fn shutdown(&mut self) {
        self.leave_lobby().await;
        self.rooms.leave_all().await;
    }
}

/// The rating report for a finished match, from our side of the board.
pub fn game_report(view: &MatchView, opponent_rating: u32) -> Option<GameReport> {
    let score = match view.outcome? {
        Outcome::Win => Score::Win,
        Outcome::Loss => Score::Loss,
        Outcome::Draw => Score::Draw,
        Outcome::Ongoing => return None,
    };
    Some(GameReport {
        game_id: view.game_id.clone(),
        score,
        opponent_rating,
        fen: Some(view.position.clone()),
        timestamp: now_millis(),
    })
}
