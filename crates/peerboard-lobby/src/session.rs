//! The lobby session actor.
//!
//! One task per joined lobby room. It owns the [`Lobby`] state, sends
//! heartbeats on a fixed timer, and turns inbound heartbeats, challenges
//! and responses into [`LobbyEvent`]s. Local intents (challenge, accept,
//! decline) arrive through the cloneable [`LobbySession`] handle, so every
//! change to lobby state happens on the actor's task.

use std::ops::ControlFlow;

use peerboard_protocol::{
    action, now_millis, Challenge, ChallengeResponse, Color, GameId, Heartbeat, PeerId,
};
use peerboard_room::{ActionReceiver, ActionSender, Inbound, Room};
use peerboard_tick::TickScheduler;
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot};

use crate::{
    Lobby, LobbyConfig, LobbyError, LobbyPeer, MatchTicket, PendingChallenge, ResponseOutcome,
    TransportTag,
};

/// Who we are in the lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyIdentity {
    pub name: String,
    pub rating: u32,
}

/// Something that happened in the lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyEvent {
    /// A heartbeat added or refreshed a peer.
    PeerUpdated(LobbyPeer),
    /// A peer left. `None` when the carrier never identified it.
    PeerLeft(Option<PeerId>),
    /// Someone challenged us. Replaces any earlier unanswered challenge.
    ChallengeReceived(PendingChallenge),
    /// The challenger left before we answered.
    ChallengeWithdrawn(GameId),
    /// Our challenge was declined.
    Declined(GameId),
    /// A handshake completed, on either side.
    Matched(MatchTicket),
    /// The session stopped.
    Closed,
}

enum LobbyCommand {
    Challenge {
        target: PeerId,
        color: Color,
        reply: oneshot::Sender<Result<GameId, LobbyError>>,
    },
    Accept {
        reply: oneshot::Sender<Result<MatchTicket, LobbyError>>,
    },
    Decline {
        reply: oneshot::Sender<Result<(), LobbyError>>,
    },
    Abandon,
    Peers {
        show_all: bool,
        reply: oneshot::Sender<Vec<LobbyPeer>>,
    },
    Pending {
        reply: oneshot::Sender<Option<PendingChallenge>>,
    },
    SetRating(u32),
    SetName(String),
    Stop {
        leave_room: bool,
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running lobby session. Cheap to clone.
///
/// When the last handle is dropped the session stops sending heartbeats;
/// the room itself stays open.
#[derive(Clone)]
pub struct LobbySession {
    room: Room,
    sender: mpsc::Sender<LobbyCommand>,
}

impl std::fmt::Debug for LobbySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LobbySession")
            .field("room", &self.room.id())
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl LobbySession {
    /// Starts a lobby session on `room`.
    ///
    /// The first heartbeat goes out immediately, then one every
    /// `config.heartbeat_interval`.
    ///
    /// # Errors
    /// [`LobbyError::Room`] if the room is already closed.
    pub async fn start(
        room: Room,
        identity: LobbyIdentity,
        transport: TransportTag,
        config: LobbyConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<LobbyEvent>), LobbyError> {
        let (heartbeat_tx, heartbeats) = room.make_action(action::HEARTBEAT).await?;
        let (challenge_tx, challenges) = room.make_action(action::CHALLENGE).await?;
        let (response_tx, responses) = room.make_action(action::CHALLENGE_RESPONSE).await?;
        let joins = room.on_peer_join().await?;
        let leaves = room.on_peer_leave().await?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (tx, rx) = mpsc::channel(32);

        let actor = LobbyActor {
            lobby: Lobby::new(
                room.local_id().clone(),
                identity.name,
                identity.rating,
                transport,
            ),
            ticker: TickScheduler::new(config.heartbeat_tick()),
            config,
            room: room.clone(),
            heartbeat_tx,
            challenge_tx,
            response_tx,
            heartbeats,
            challenges,
            responses,
            joins,
            leaves,
            events: events_tx,
            receiver: rx,
        };
        tokio::spawn(actor.run());

        Ok((Self { room, sender: tx }, events_rx))
    }

    /// The lobby room.
    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Challenges `target`, proposing that we play `color`. Returns the
    /// freshly minted game id.
    ///
    /// # Errors
    /// See [`Lobby::challenge`]; [`LobbyError::Closed`] if the session
    /// stopped.
    pub async fn challenge(&self, target: PeerId, color: Color) -> Result<GameId, LobbyError> {
        let (reply, rx) = oneshot::channel();
        self.command(LobbyCommand::Challenge {
            target,
            color,
            reply,
        })
        .await?;
        rx.await.map_err(|_| LobbyError::Closed)?
    }

    /// Accepts the pending challenge.
    ///
    /// # Errors
    /// [`LobbyError::NoPendingChallenge`] if nothing is pending.
    pub async fn accept(&self) -> Result<MatchTicket, LobbyError> {
        let (reply, rx) = oneshot::channel();
        self.command(LobbyCommand::Accept { reply }).await?;
        rx.await.map_err(|_| LobbyError::Closed)?
    }

    /// Declines the pending challenge.
    ///
    /// # Errors
    /// [`LobbyError::NoPendingChallenge`] if nothing is pending.
    pub async fn decline(&self) -> Result<(), LobbyError> {
        let (reply, rx) = oneshot::channel();
        self.command(LobbyCommand::Decline { reply }).await?;
        rx.await.map_err(|_| LobbyError::Closed)?
    }

    /// Stops waiting for an answer to our challenge. A late acceptance
    /// is then ignored.
    pub async fn abandon(&self) {
        let _ = self.command(LobbyCommand::Abandon).await;
    }

    /// The peer table, filtered by rating unless `show_all`.
    pub async fn peers(&self, show_all: bool) -> Vec<LobbyPeer> {
        let (reply, rx) = oneshot::channel();
        if self
            .command(LobbyCommand::Peers { show_all, reply })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// The challenge waiting for our answer.
    pub async fn pending(&self) -> Option<PendingChallenge> {
        let (reply, rx) = oneshot::channel();
        self.command(LobbyCommand::Pending { reply }).await.ok()?;
        rx.await.ok().flatten()
    }

    /// Advertises a new rating from the next heartbeat on.
    pub async fn set_rating(&self, rating: u32) {
        let _ = self.command(LobbyCommand::SetRating(rating)).await;
    }

    pub async fn set_name(&self, name: impl Into<String>) {
        let _ = self.command(LobbyCommand::SetName(name.into())).await;
    }

    /// Stops the session and leaves the lobby room.
    pub async fn leave(&self) {
        self.stop(true).await;
    }

    /// Stops the session but keeps the room open, for handing a
    /// point-to-point link over to the match. Returns the room.
    pub async fn detach(self) -> Room {
        self.stop(false).await;
        self.room
    }

    async fn stop(&self, leave_room: bool) {
        let (reply, rx) = oneshot::channel();
        if self
            .command(LobbyCommand::Stop { leave_room, reply })
            .await
            .is_ok()
        {
            let _ = rx.await;
        } else if leave_room {
            self.room.leave().await;
        }
    }

    async fn command(&self, cmd: LobbyCommand) -> Result<(), LobbyError> {
        self.sender.send(cmd).await.map_err(|_| LobbyError::Closed)
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct LobbyActor {
    lobby: Lobby,
    config: LobbyConfig,
    room: Room,
    ticker: TickScheduler,
    heartbeat_tx: ActionSender,
    challenge_tx: ActionSender,
    response_tx: ActionSender,
    heartbeats: ActionReceiver,
    challenges: ActionReceiver,
    responses: ActionReceiver,
    joins: mpsc::UnboundedReceiver<PeerId>,
    leaves: mpsc::UnboundedReceiver<Option<PeerId>>,
    events: mpsc::UnboundedSender<LobbyEvent>,
    receiver: mpsc::Receiver<LobbyCommand>,
}

impl LobbyActor {
    async fn run(mut self) {
        tracing::info!(room_id = %self.room.id(), local = %self.lobby.local_id(), "lobby session started");

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => {
                        if self.handle_command(cmd).await.is_break() {
                            break;
                        }
                    }
                    None => break,
                },
                _ = self.ticker.wait_for_tick() => {
                    let hb = self.lobby.heartbeat(now_millis());
                    self.heartbeat_tx.send(&hb, None).await;
                }
                msg = self.heartbeats.recv() => match msg {
                    Some(inbound) => self.on_heartbeat(inbound),
                    None => break,
                },
                msg = self.challenges.recv() => match msg {
                    Some(inbound) => self.on_challenge(inbound),
                    None => break,
                },
                msg = self.responses.recv() => match msg {
                    Some(inbound) => self.on_response(inbound),
                    None => break,
                },
                Some(peer) = self.joins.recv() => {
                    // Newcomers hear from us now rather than a full interval later.
                    let hb = self.lobby.heartbeat(now_millis());
                    self.heartbeat_tx.send(&hb, Some(&peer)).await;
                }
                Some(left) = self.leaves.recv() => self.on_peer_leave(left),
            }
        }

        self.emit(LobbyEvent::Closed);
        tracing::info!(room_id = %self.room.id(), "lobby session stopped");
    }

    async fn handle_command(&mut self, cmd: LobbyCommand) -> ControlFlow<()> {
        match cmd {
            LobbyCommand::Challenge {
                target,
                color,
                reply,
            } => {
                let result = self.lobby.challenge(&target, color, now_millis());
                let result = match result {
                    Ok(challenge) => {
                        tracing::info!(%target, game_id = %challenge.game_id, %color, "challenge sent");
                        self.challenge_tx.send(&challenge, Some(&target)).await;
                        Ok(challenge.game_id)
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            LobbyCommand::Accept { reply } => {
                let result = match self.lobby.accept(now_millis()) {
                    Ok((challenger, response, ticket)) => {
                        self.response_tx.send(&response, Some(&challenger)).await;
                        tracing::info!(%challenger, game_id = %ticket.game_id, color = %ticket.color, "challenge accepted");
                        self.emit(LobbyEvent::Matched(ticket.clone()));
                        Ok(ticket)
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            LobbyCommand::Decline { reply } => {
                let result = match self.lobby.decline(now_millis()) {
                    Ok((challenger, response)) => {
                        self.response_tx.send(&response, Some(&challenger)).await;
                        tracing::info!(%challenger, game_id = %response.game_id, "challenge declined");
                        Ok(())
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            LobbyCommand::Abandon => {
                if let Some(sent) = self.lobby.abandon() {
                    tracing::debug!(game_id = %sent.game_id, "challenge abandoned");
                }
            }
            LobbyCommand::Peers { show_all, reply } => {
                let _ = reply.send(self.lobby.visible(&self.config, show_all));
            }
            LobbyCommand::Pending { reply } => {
                let _ = reply.send(self.lobby.pending().cloned());
            }
            LobbyCommand::SetRating(rating) => self.lobby.set_rating(rating),
            LobbyCommand::SetName(name) => self.lobby.set_name(name),
            LobbyCommand::Stop { leave_room, reply } => {
                if leave_room {
                    self.room.leave().await;
                }
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn on_heartbeat(&mut self, inbound: Inbound) {
        if inbound.from == *self.lobby.local_id() {
            return;
        }
        let Some(hb) = decode::<Heartbeat>(&inbound, action::HEARTBEAT) else {
            return;
        };
        let peer = self.lobby.on_heartbeat(&inbound.from, hb).clone();
        tracing::trace!(peer = %peer.id, rating = peer.rating, "heartbeat");
        self.emit(LobbyEvent::PeerUpdated(peer));
    }

    fn on_challenge(&mut self, inbound: Inbound) {
        let Some(challenge) = decode::<Challenge>(&inbound, action::CHALLENGE) else {
            return;
        };
        tracing::info!(from = %inbound.from, game_id = %challenge.game_id, "challenge received");
        if let Some(old) = self.lobby.on_challenge(&inbound.from, challenge) {
            tracing::debug!(game_id = %old.game_id, "unanswered challenge replaced");
        }
        if let Some(pending) = self.lobby.pending().cloned() {
            self.emit(LobbyEvent::ChallengeReceived(pending));
        }
    }

    fn on_response(&mut self, inbound: Inbound) {
        let Some(response) = decode::<ChallengeResponse>(&inbound, action::CHALLENGE_RESPONSE)
        else {
            return;
        };
        match self.lobby.on_response(&inbound.from, &response) {
            ResponseOutcome::Accepted(ticket) => {
                tracing::info!(opponent = %ticket.opponent, game_id = %ticket.game_id, color = %ticket.color, "challenge accepted by peer");
                self.emit(LobbyEvent::Matched(ticket));
            }
            ResponseOutcome::Declined(game_id) => {
                tracing::info!(from = %inbound.from, %game_id, "challenge declined by peer");
                self.emit(LobbyEvent::Declined(game_id));
            }
            ResponseOutcome::Ignored => {
                tracing::debug!(from = %inbound.from, game_id = %response.game_id, "stray challenge response");
            }
        }
    }

    fn on_peer_leave(&mut self, left: Option<PeerId>) {
        if let Some(game_id) = self.lobby.on_peer_leave(left.as_ref()) {
            tracing::info!(%game_id, "challenger left, challenge withdrawn");
            self.emit(LobbyEvent::ChallengeWithdrawn(game_id));
        }
        self.emit(LobbyEvent::PeerLeft(left));
    }

    fn emit(&self, event: LobbyEvent) {
        let _ = self.events.send(event);
    }
}

fn decode<T: DeserializeOwned>(inbound: &Inbound, action: &str) -> Option<T> {
    match inbound.decode::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(from = %inbound.from, action, error = %e, "dropping malformed message");
            None
        }
    }
}
