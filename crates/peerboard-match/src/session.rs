//! The match session actor.
//!
//! One task per match room. It owns the [`MatchLog`], replays it after
//! every append, and publishes the derived [`MatchView`] through a
//! `watch` channel. Local actions and network input go through the same
//! task, so a local move and a remote entry racing for the same `seq`
//! are ordered by the log's gate, never interleaved.
//!
//! ## What a peer does when another peer shows up
//!
//! ```text
//! peer joins ──→ roleAnnounce (always)
//!            ──→ positionSync (white only)
//!            ──→ logSync      (if our log is non-empty)
//! ```
//!
//! The same greeting is repeated the first time a peer's own
//! `roleAnnounce` reaches us, since that proves its listeners are up.

use std::collections::{BTreeSet, HashSet};
use std::ops::ControlFlow;
use std::time::Duration;

use peerboard_protocol::{
    action, now_millis, Chat, Color, GameId, MoveBroadcast, PeerId, PositionSync, RoleAnnounce,
};
use peerboard_room::{ActionReceiver, ActionSender, Inbound, Room};
use peerboard_tick::{TickConfig, TickInfo, TickScheduler};
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot, watch};

use crate::log::{AppendOutcome, EntryKind, LogEntry, LogSync, MatchLog};
use crate::replay::{replay, EndReason, MatchResult, Outcome, Replay};
use crate::roles::{RoleBook, RoleUpdate};
use crate::rules::{MoveRequest, RulesEngine};
use crate::{MatchClock, MatchConfig, MatchError};

/// How a peer enters a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSetup {
    pub game_id: GameId,
    /// Our color, or `None` to spectate.
    pub color: Option<Color>,
    /// The opponent the lobby paired us with, if any.
    pub opponent: Option<PeerId>,
}

/// Remaining clock time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockView {
    pub white: Duration,
    pub black: Duration,
    pub running: bool,
}

/// Everything a consumer needs to draw the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchView {
    pub game_id: GameId,
    /// Our color; `None` for spectators.
    pub color: Option<Color>,
    pub position: String,
    pub moves: Vec<String>,
    pub result: MatchResult,
    /// `result` from our side of the board. `None` for spectators.
    pub outcome: Option<Outcome>,
    pub draw_offer: Option<Color>,
    pub log_len: usize,
    /// Position and moves come from bare broadcasts because no log entry
    /// has arrived yet.
    pub provisional: bool,
    pub white: Option<PeerId>,
    pub black: Option<PeerId>,
    pub peers: Vec<PeerId>,
    pub clock: ClockView,
}

/// Something that happened in the match room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    PeerJoined(PeerId),
    PeerLeft(Option<PeerId>),
    RoleAssigned { peer: PeerId, color: Color },
    /// An entry made it into the log, from us or from a peer.
    Appended(LogEntry),
    /// A bulk snapshot replaced our empty log.
    Synced { entries: usize },
    Chat(Chat),
    /// The match ended. Reported once.
    Finished(MatchResult),
    Closed,
}

enum MatchCommand {
    Act {
        intent: Intent,
        reply: oneshot::Sender<Result<LogEntry, MatchError>>,
    },
    Chat {
        text: String,
    },
    Log {
        reply: oneshot::Sender<Vec<LogEntry>>,
    },
    Leave {
        reply: oneshot::Sender<()>,
    },
}

enum Intent {
    Play(MoveRequest),
    Resign,
    OfferDraw,
    AcceptDraw,
    DeclineDraw,
}

/// Handle to a running match session. Cheap to clone.
///
/// Dropping the last handle leaves the match room.
#[derive(Clone)]
pub struct MatchSession {
    game_id: GameId,
    sender: mpsc::Sender<MatchCommand>,
    view: watch::Receiver<MatchView>,
}

impl std::fmt::Debug for MatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchSession")
            .field("game_id", &self.game_id)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl MatchSession {
    /// Starts a match session on `room` and greets every peer already
    /// present.
    ///
    /// # Errors
    /// [`MatchError::Room`] if the room is already closed.
    pub async fn start<E: RulesEngine>(
        room: Room,
        setup: MatchSetup,
        rules: E,
        config: MatchConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<MatchEvent>), MatchError> {
        let (append_tx, appends) = room.make_action(action::MOVE_APPEND).await?;
        let (sync_tx, syncs) = room.make_action(action::LOG_SYNC).await?;
        let (position_tx, positions) = room.make_action(action::POSITION_SYNC).await?;
        let (role_tx, roles) = room.make_action(action::ROLE_ANNOUNCE).await?;
        let (chat_tx, chats) = room.make_action(action::CHAT).await?;
        let (legacy_tx, legacy) = room.make_action(action::LEGACY_MOVE).await?;
        let joins = room.on_peer_join().await?;
        let leaves = room.on_peer_leave().await?;
        let present = room.peers().await;

        let local_id = room.local_id().clone();
        let mut book = RoleBook::new();
        book.set_local(&local_id, setup.color);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (tx, rx) = mpsc::channel(config.command_channel_size.max(1));

        let mut actor = MatchActor {
            replay: Replay::initial(&rules),
            clock: MatchClock::new(config.game_time, config.increment),
            ticker: TickScheduler::new(TickConfig::every(config.clock_tick)),
            rules,
            config,
            setup: setup.clone(),
            local_id,
            room,
            log: MatchLog::new(),
            provisional: None,
            final_result: None,
            roles: book,
            heard: HashSet::new(),
            peers: BTreeSet::new(),
            out: Outbox {
                append: append_tx,
                sync: sync_tx,
                position: position_tx,
                role: role_tx,
                chat: chat_tx,
                legacy: legacy_tx,
            },
            inbox: Inbox {
                appends,
                syncs,
                positions,
                roles,
                chats,
                legacy,
                joins,
                leaves,
            },
            view: watch::Sender::new(placeholder_view(&setup)),
            events: events_tx,
            receiver: rx,
        };
        actor.publish();
        let view = actor.view.subscribe();
        tokio::spawn(actor.run(present));

        Ok((
            Self {
                game_id: setup.game_id,
                sender: tx,
                view,
            },
            events_rx,
        ))
    }

    pub fn game_id(&self) -> &GameId {
        &self.game_id
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// The latest view.
    pub fn view(&self) -> MatchView {
        self.view.borrow().clone()
    }

    /// A receiver that is notified on every view change.
    pub fn watch(&self) -> watch::Receiver<MatchView> {
        self.view.clone()
    }

    /// Plays a move for our color.
    ///
    /// # Errors
    /// [`MatchError::Spectator`], [`MatchError::Finished`],
    /// [`MatchError::NotOurTurn`], or [`MatchError::IllegalMove`].
    pub async fn play(&self, mv: MoveRequest) -> Result<LogEntry, MatchError> {
        self.act(Intent::Play(mv)).await
    }

    pub async fn resign(&self) -> Result<LogEntry, MatchError> {
        self.act(Intent::Resign).await
    }

    /// # Errors
    /// [`MatchError::DrawOfferPending`] if either side already has an
    /// offer on the table.
    pub async fn offer_draw(&self) -> Result<LogEntry, MatchError> {
        self.act(Intent::OfferDraw).await
    }

    /// # Errors
    /// [`MatchError::NoDrawOffer`] unless the opponent has offered.
    pub async fn accept_draw(&self) -> Result<LogEntry, MatchError> {
        self.act(Intent::AcceptDraw).await
    }

    /// # Errors
    /// [`MatchError::NoDrawOffer`] unless the opponent has offered.
    pub async fn decline_draw(&self) -> Result<LogEntry, MatchError> {
        self.act(Intent::DeclineDraw).await
    }

    /// Broadcasts a chat line. It is also reported locally as
    /// [`MatchEvent::Chat`].
    pub async fn chat(&self, text: impl Into<String>) {
        let _ = self
            .sender
            .send(MatchCommand::Chat { text: text.into() })
            .await;
    }

    /// A copy of the log.
    pub async fn log(&self) -> Vec<LogEntry> {
        let (reply, rx) = oneshot::channel();
        if self.sender.send(MatchCommand::Log { reply }).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Leaves the match room and stops the session.
    pub async fn leave(&self) {
        let (reply, rx) = oneshot::channel();
        if self.sender.send(MatchCommand::Leave { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    async fn act(&self, intent: Intent) -> Result<LogEntry, MatchError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(MatchCommand::Act { intent, reply })
            .await
            .map_err(|_| MatchError::Closed)?;
        rx.await.map_err(|_| MatchError::Closed)?
    }
}

fn placeholder_view(setup: &MatchSetup) -> MatchView {
    MatchView {
        game_id: setup.game_id.clone(),
        color: setup.color,
        position: String::new(),
        moves: Vec::new(),
        result: MatchResult::Ongoing,
        outcome: None,
        draw_offer: None,
        log_len: 0,
        provisional: false,
        white: None,
        black: None,
        peers: Vec::new(),
        clock: ClockView {
            white: Duration::ZERO,
            black: Duration::ZERO,
            running: false,
        },
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct Outbox {
    append: ActionSender,
    sync: ActionSender,
    position: ActionSender,
    role: ActionSender,
    chat: ActionSender,
    legacy: ActionSender,
}

struct Inbox {
    appends: ActionReceiver,
    syncs: ActionReceiver,
    positions: ActionReceiver,
    roles: ActionReceiver,
    chats: ActionReceiver,
    legacy: ActionReceiver,
    joins: mpsc::UnboundedReceiver<PeerId>,
    leaves: mpsc::UnboundedReceiver<Option<PeerId>>,
}

/// Position and moves learned from bare broadcasts while the log is empty.
struct Provisional {
    position: String,
    moves: Vec<String>,
}

struct MatchActor<E: RulesEngine> {
    rules: E,
    config: MatchConfig,
    setup: MatchSetup,
    local_id: PeerId,
    room: Room,
    log: MatchLog,
    replay: Replay,
    provisional: Option<Provisional>,
    /// Set once, by the first terminal result from any source.
    final_result: Option<MatchResult>,
    roles: RoleBook,
    /// Peers whose own `roleAnnounce` we have received.
    heard: HashSet<PeerId>,
    peers: BTreeSet<PeerId>,
    clock: MatchClock,
    ticker: TickScheduler,
    out: Outbox,
    inbox: Inbox,
    view: watch::Sender<MatchView>,
    events: mpsc::UnboundedSender<MatchEvent>,
    receiver: mpsc::Receiver<MatchCommand>,
}

impl<E: RulesEngine> MatchActor<E> {
    async fn run(mut self, present: Vec<PeerId>) {
        tracing::info!(
            game_id = %self.setup.game_id,
            local = %self.local_id,
            color = ?self.setup.color,
            "match session started"
        );

        for peer in present {
            self.on_join(peer).await;
        }

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => {
                        if self.handle_command(cmd).await.is_break() {
                            break;
                        }
                    }
                    None => {
                        self.room.leave().await;
                        break;
                    }
                },
                info = self.ticker.wait_for_tick() => self.on_tick(info),
                msg = self.inbox.appends.recv() => match msg {
                    Some(inbound) => self.on_append(inbound),
                    None => break,
                },
                msg = self.inbox.syncs.recv() => match msg {
                    Some(inbound) => self.on_sync(inbound),
                    None => break,
                },
                msg = self.inbox.positions.recv() => match msg {
                    Some(inbound) => self.on_position(inbound),
                    None => break,
                },
                msg = self.inbox.roles.recv() => match msg {
                    Some(inbound) => self.on_role(inbound).await,
                    None => break,
                },
                msg = self.inbox.chats.recv() => match msg {
                    Some(inbound) => self.on_chat(inbound),
                    None => break,
                },
                msg = self.inbox.legacy.recv() => match msg {
                    Some(inbound) => self.on_legacy_move(inbound),
                    None => break,
                },
                Some(peer) = self.inbox.joins.recv() => self.on_join(peer).await,
                Some(left) = self.inbox.leaves.recv() => self.on_leave(left),
            }
        }

        self.emit(MatchEvent::Closed);
        tracing::info!(game_id = %self.setup.game_id, "match session stopped");
    }

    async fn handle_command(&mut self, cmd: MatchCommand) -> ControlFlow<()> {
        match cmd {
            MatchCommand::Act { intent, reply } => {
                let result = self.act(intent).await;
                let _ = reply.send(result);
            }
            MatchCommand::Chat { text } => {
                let chat = Chat {
                    text,
                    peer_id: self.local_id.clone(),
                    timestamp: now_millis(),
                };
                self.out.chat.send(&chat, None).await;
                self.emit(MatchEvent::Chat(chat));
            }
            MatchCommand::Log { reply } => {
                let _ = reply.send(self.log.entries().to_vec());
            }
            MatchCommand::Leave { reply } => {
                self.room.leave().await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    // -----------------------------------------------------------------
    // Local actions
    // -----------------------------------------------------------------

    async fn act(&mut self, intent: Intent) -> Result<LogEntry, MatchError> {
        let me = self.setup.color.ok_or(MatchError::Spectator)?;
        if self.final_result.is_some() {
            return Err(MatchError::Finished);
        }

        let kind = match intent {
            Intent::Play(mv) => {
                let position = self.position().to_owned();
                if self.rules.status(&position).side_to_move != me {
                    return Err(MatchError::NotOurTurn);
                }
                let outcome = self.rules.validate_move(&position, &mv)?;
                EntryKind::Move {
                    fen: outcome.position,
                    san: Some(outcome.notation),
                }
            }
            Intent::Resign => EntryKind::Resign { color: Some(me) },
            Intent::OfferDraw => {
                if self.replay.draw_offer.is_some() {
                    return Err(MatchError::DrawOfferPending);
                }
                EntryKind::DrawOffer { color: Some(me) }
            }
            Intent::AcceptDraw => self.answer_draw(me, EntryKind::DrawAccept)?,
            Intent::DeclineDraw => self.answer_draw(me, EntryKind::DrawDecline)?,
        };

        let before = self.position().to_owned();
        let entry = self.log.append_local(kind, now_millis());
        tracing::debug!(game_id = %self.setup.game_id, seq = entry.seq, "local entry appended");
        self.out.append.send(&entry, None).await;
        if self.config.legacy_broadcasts {
            if let EntryKind::Move { fen, san } = &entry.kind {
                let legacy = MoveBroadcast {
                    fen: fen.clone(),
                    san: san.clone(),
                    timestamp: entry.timestamp,
                };
                self.out.legacy.send(&legacy, None).await;
            }
        }
        self.after_append(&entry, &before);
        Ok(entry)
    }

    fn answer_draw(&self, me: Color, answer: EntryKind) -> Result<EntryKind, MatchError> {
        match self.replay.draw_offer {
            Some(by) if by != me => Ok(answer),
            _ => Err(MatchError::NoDrawOffer),
        }
    }

    // -----------------------------------------------------------------
    // Log input
    // -----------------------------------------------------------------

    fn on_append(&mut self, inbound: Inbound) {
        let Some(entry) = decode::<LogEntry>(&inbound, action::MOVE_APPEND) else {
            return;
        };
        let before = self.position().to_owned();
        match self.log.ingest(entry.clone()) {
            AppendOutcome::Appended => {
                tracing::debug!(from = %inbound.from, seq = entry.seq, "remote entry appended");
                self.after_append(&entry, &before);
            }
            AppendOutcome::Rejected { expected, got } => {
                tracing::debug!(from = %inbound.from, expected, got, "out-of-sequence entry dropped");
            }
        }
    }

    fn on_sync(&mut self, inbound: Inbound) {
        let Some(sync) = decode::<LogSync>(&inbound, action::LOG_SYNC) else {
            return;
        };
        let entries = sync.events.len();
        if !self.log.accept_sync(sync.events) {
            tracing::debug!(from = %inbound.from, entries, have = self.log.len(), "log sync ignored");
            return;
        }
        tracing::info!(from = %inbound.from, entries, "log synced from peer");
        self.provisional = None;
        self.replay = replay(&self.rules, self.log.entries());
        self.emit(MatchEvent::Synced { entries });
        self.settle();
    }

    /// Replays after a single append and publishes the result.
    fn after_append(&mut self, entry: &LogEntry, before: &str) {
        self.provisional = None;
        self.replay = replay(&self.rules, self.log.entries());
        if matches!(entry.kind, EntryKind::Move { .. }) {
            let mover = self.rules.status(before).side_to_move;
            self.clock.on_move(mover);
        }
        self.emit(MatchEvent::Appended(entry.clone()));
        self.settle();
    }

    // -----------------------------------------------------------------
    // Bare broadcasts, honoured only before any log entry
    // -----------------------------------------------------------------

    fn accepts_broadcast(&self, from: &PeerId, action: &str) -> bool {
        if !self.log.is_empty() {
            tracing::trace!(%from, action, "broadcast ignored, log already started");
            return false;
        }
        if !self.roles.may_broadcast_position(from) {
            tracing::debug!(%from, action, "broadcast from non-player ignored");
            return false;
        }
        true
    }

    fn on_position(&mut self, inbound: Inbound) {
        if !self.accepts_broadcast(&inbound.from, action::POSITION_SYNC) {
            return;
        }
        let Some(sync) = decode::<PositionSync>(&inbound, action::POSITION_SYNC) else {
            return;
        };
        if !self.rules.is_valid_position(&sync.fen) {
            tracing::debug!(from = %inbound.from, "unreadable position dropped");
            return;
        }
        let moves = self.provisional.take().map(|p| p.moves).unwrap_or_default();
        self.provisional = Some(Provisional {
            position: sync.fen,
            moves,
        });
        self.publish();
    }

    fn on_legacy_move(&mut self, inbound: Inbound) {
        if !self.accepts_broadcast(&inbound.from, action::LEGACY_MOVE) {
            return;
        }
        let Some(mv) = decode::<MoveBroadcast>(&inbound, action::LEGACY_MOVE) else {
            return;
        };
        if !self.rules.is_valid_position(&mv.fen) {
            tracing::debug!(from = %inbound.from, "unreadable position dropped");
            return;
        }
        let mut moves = self.provisional.take().map(|p| p.moves).unwrap_or_default();
        if let Some(san) = mv.san.filter(|s| !s.is_empty()) {
            moves.push(san);
        }
        self.provisional = Some(Provisional {
            position: mv.fen,
            moves,
        });
        self.publish();
    }

    // -----------------------------------------------------------------
    // Presence and roles
    // -----------------------------------------------------------------

    async fn on_join(&mut self, peer: PeerId) {
        if self.peers.insert(peer.clone()) {
            tracing::info!(game_id = %self.setup.game_id, %peer, "peer joined match");
            self.emit(MatchEvent::PeerJoined(peer.clone()));
            self.publish();
        }
        self.greet(&peer).await;
    }

    async fn greet(&self, peer: &PeerId) {
        let announce = match self.setup.color {
            Some(color) => RoleAnnounce::player(color, self.local_id.clone()),
            None => RoleAnnounce::spectator(self.local_id.clone()),
        };
        self.out.role.send(&announce, Some(peer)).await;

        if self.setup.color == Some(Color::White) {
            let sync = PositionSync {
                fen: self.rules.initial_position(),
                timestamp: now_millis(),
            };
            self.out.position.send(&sync, Some(peer)).await;
        }
        if !self.log.is_empty() {
            self.out.sync.send(&self.log.snapshot(), Some(peer)).await;
        }
    }

    async fn on_role(&mut self, inbound: Inbound) {
        let Some(announce) = decode::<RoleAnnounce>(&inbound, action::ROLE_ANNOUNCE) else {
            return;
        };
        let from = inbound.from;
        match self.roles.on_announce(&from, &announce) {
            RoleUpdate::Assigned(color) => {
                tracing::info!(peer = %from, %color, "role assigned");
                self.emit(MatchEvent::RoleAssigned {
                    peer: from.clone(),
                    color,
                });
                self.publish();
            }
            RoleUpdate::Rejected => {
                tracing::warn!(peer = %from, claimed = ?announce.color, "conflicting role announcement ignored");
            }
            RoleUpdate::Spectator | RoleUpdate::Unchanged => {}
        }
        if self.heard.insert(from.clone()) {
            if self.peers.insert(from.clone()) {
                self.emit(MatchEvent::PeerJoined(from.clone()));
                self.publish();
            }
            self.greet(&from).await;
        }
    }

    fn on_leave(&mut self, left: Option<PeerId>) {
        match &left {
            Some(id) => {
                self.peers.remove(id);
                self.heard.remove(id);
            }
            None => {
                self.peers.clear();
                self.heard.clear();
            }
        }
        tracing::info!(game_id = %self.setup.game_id, peer = ?left, "peer left match");
        self.emit(MatchEvent::PeerLeft(left.clone()));

        if self.final_result.is_none() {
            if let Some(color) = self.departing_player(left.as_ref()) {
                self.finish(MatchResult::Won {
                    winner: color.opposite(),
                    reason: EndReason::Forfeit,
                });
            }
        }
        self.publish();
    }

    /// The color of a departing player whose leaving forfeits the match
    /// from our point of view.
    fn departing_player(&self, left: Option<&PeerId>) -> Option<Color> {
        let mine = self.setup.color;
        let color = match left {
            Some(id) => self.roles.color_of(id).or_else(|| {
                (self.setup.opponent.as_ref() == Some(id))
                    .then(|| mine.map(Color::opposite))
                    .flatten()
            }),
            // An unidentified peer on a point-to-point link is our opponent.
            None => mine.map(Color::opposite),
        }?;
        (Some(color) != mine).then_some(color)
    }

    fn on_chat(&mut self, inbound: Inbound) {
        let Some(mut chat) = decode::<Chat>(&inbound, action::CHAT) else {
            return;
        };
        chat.peer_id = inbound.from;
        self.emit(MatchEvent::Chat(chat));
    }

    // -----------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------

    fn clock_running(&self) -> bool {
        self.final_result.is_none() && !self.log.is_empty() && !self.peers.is_empty()
    }

    fn on_tick(&mut self, info: TickInfo) {
        if !self.clock_running() {
            return;
        }
        let side = self.rules.status(self.position()).side_to_move;
        if let Some(flagged) = self.clock.charge(side, info.elapsed()) {
            tracing::info!(game_id = %self.setup.game_id, %flagged, "flag fell");
            self.finish(MatchResult::Won {
                winner: flagged.opposite(),
                reason: EndReason::Timeout,
            });
        }
        self.publish();
    }

    // -----------------------------------------------------------------
    // Derived state
    // -----------------------------------------------------------------

    fn position(&self) -> &str {
        match (&self.provisional, self.log.is_empty()) {
            (Some(p), true) => &p.position,
            _ => &self.replay.position,
        }
    }

    /// Records a terminal result the first time one appears.
    fn finish(&mut self, result: MatchResult) {
        if self.final_result.is_some() {
            return;
        }
        self.final_result = Some(result);
        tracing::info!(game_id = %self.setup.game_id, ?result, "match finished");
        self.emit(MatchEvent::Finished(result));
    }

    /// Picks up a terminal replay result, then publishes.
    fn settle(&mut self) {
        if self.replay.result.is_over() {
            self.finish(self.replay.result);
        }
        self.publish();
    }

    fn publish(&mut self) {
        let (position, moves, provisional) = match (&self.provisional, self.log.is_empty()) {
            (Some(p), true) => (p.position.clone(), p.moves.clone(), true),
            _ => (self.replay.position.clone(), self.replay.moves.clone(), false),
        };
        let result = self.final_result.unwrap_or_default();
        let view = MatchView {
            game_id: self.setup.game_id.clone(),
            color: self.setup.color,
            position,
            moves,
            result,
            outcome: self.setup.color.map(|c| result.outcome_for(c)),
            draw_offer: self.replay.draw_offer,
            log_len: self.log.len(),
            provisional,
            white: self.roles.white().cloned(),
            black: self.roles.black().cloned(),
            peers: self.peers.iter().cloned().collect(),
            clock: ClockView {
                white: self.clock.remaining(Color::White),
                black: self.clock.remaining(Color::Black),
                running: self.clock_running(),
            },
        };
        self.view.send_replace(view);
    }

    fn emit(&self, event: MatchEvent) {
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
