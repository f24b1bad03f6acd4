//! The lobby state machine: peer table plus challenge slots.
//!
//! [`Lobby`] does no I/O. It turns inbound payloads into state changes and
//! local intents into the payloads to send; the
//! [`LobbySession`](crate::LobbySession) actor moves those payloads over
//! the room.
//!
//! ## Challenge handshake
//!
//! ```text
//! initiator                          target
//!   challenge(target) ──challenge──→ on_challenge()
//!                                      │
//!   on_response() ←──challResp──── accept() / decline()
//!      │                               │
//!      ▼                               ▼
//!  MatchTicket(proposed color)    MatchTicket(opposite color)
//! ```
//!
//! Each side holds at most one challenge it sent and one it received. A
//! newer challenge replaces the older one in the same slot.

use std::collections::HashMap;

use peerboard_protocol::{
    Challenge, ChallengeResponse, Color, GameId, Heartbeat, PeerId, ResponseKind,
};
use serde::{Deserialize, Serialize};

use crate::{LobbyConfig, LobbyError};

/// Which carrier a lobby peer was heard on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportTag {
    /// The wide-area rendezvous transport.
    Rendezvous,
    /// A short-range point-to-point link.
    Link,
}

/// One entry of the peer table, refreshed by every heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyPeer {
    pub id: PeerId,
    pub rating: u32,
    pub name: String,
    pub ready: bool,
    /// `timestamp` of the latest heartbeat.
    pub last_seen: u64,
    pub transport: TransportTag,
}

/// A challenge we received and have not answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChallenge {
    pub game_id: GameId,
    pub challenger_id: PeerId,
    pub challenger_name: String,
    pub challenger_rating: u32,
    /// The color the challenger will play.
    pub proposed_color: Color,
}

/// A challenge we sent and are waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentChallenge {
    pub game_id: GameId,
    pub target: PeerId,
    pub proposed_color: Color,
}

/// Everything a peer needs to enter the match room after a handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchTicket {
    pub game_id: GameId,
    /// Our color.
    pub color: Color,
    pub opponent: PeerId,
    pub opponent_name: String,
    pub opponent_rating: u32,
    /// Whether we sent the challenge.
    pub initiator: bool,
}

/// What an inbound `challResp` meant to us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Our challenge was accepted.
    Accepted(MatchTicket),
    /// Our challenge was declined. The sent slot is now empty.
    Declined(GameId),
    /// Not an answer to our outstanding challenge.
    Ignored,
}

/// Lobby state for one local peer.
#[derive(Debug)]
pub struct Lobby {
    local_id: PeerId,
    name: String,
    rating: u32,
    transport: TransportTag,
    peers: HashMap<PeerId, LobbyPeer>,
    sent: Option<SentChallenge>,
    received: Option<PendingChallenge>,
}

impl Lobby {
    pub fn new(local_id: PeerId, name: impl Into<String>, rating: u32, transport: TransportTag) -> Self {
        Self {
            local_id,
            name: name.into(),
            rating,
            transport,
            peers: HashMap::new(),
            sent: None,
            received: None,
        }
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn rating(&self) -> u32 {
        self.rating
    }

    pub fn set_rating(&mut self, rating: u32) {
        self.rating = rating;
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Our own heartbeat. An empty name goes out as `"Player"`.
    pub fn heartbeat(&self, now: u64) -> Heartbeat {
        Heartbeat {
            id: self.local_id.clone(),
            rating: self.rating,
            name: display_name(&self.name),
            ready: true,
            timestamp: now,
        }
    }

    // -----------------------------------------------------------------
    // Presence
    // -----------------------------------------------------------------

    /// Upserts the sender's record. The record is keyed by the sender's
    /// transport identity, not by the `id` inside the payload.
    ///
    /// Returns the updated record.
    pub fn on_heartbeat(&mut self, from: &PeerId, hb: Heartbeat) -> &LobbyPeer {
        let peer = LobbyPeer {
            id: from.clone(),
            rating: hb.rating,
            name: hb.name,
            ready: hb.ready,
            last_seen: hb.timestamp,
            transport: self.transport,
        };
        self.peers.insert(from.clone(), peer);
        &self.peers[from]
    }

    /// Forgets a departed peer. `None` means the carrier lost a peer it
    /// never identified, which on a point-to-point link means everyone.
    ///
    /// Returns the game id of a received challenge that went away with
    /// the peer.
    pub fn on_peer_leave(&mut self, id: Option<&PeerId>) -> Option<GameId> {
        match id {
            Some(id) => {
                self.peers.remove(id);
            }
            None => self.peers.clear(),
        }
        let gone = match (&self.received, id) {
            (Some(pending), Some(id)) => pending.challenger_id == *id,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if gone {
            self.received.take().map(|p| p.game_id)
        } else {
            None
        }
    }

    pub fn peer(&self, id: &PeerId) -> Option<&LobbyPeer> {
        self.peers.get(id)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// The peer table as it should be shown: peers within
    /// `config.rating_window` of our rating (or all of them when
    /// `show_all`), closest rating first, capped at `config.max_displayed`.
    pub fn visible(&self, config: &LobbyConfig, show_all: bool) -> Vec<LobbyPeer> {
        let mut peers: Vec<LobbyPeer> = self
            .peers
            .values()
            .filter(|p| show_all || p.rating.abs_diff(self.rating) <= config.rating_window)
            .cloned()
            .collect();
        peers.sort_by(|a, b| {
            a.rating
                .abs_diff(self.rating)
                .cmp(&b.rating.abs_diff(self.rating))
                .then_with(|| a.id.cmp(&b.id))
        });
        peers.truncate(config.max_displayed);
        peers
    }

    // -----------------------------------------------------------------
    // Challenges
    // -----------------------------------------------------------------

    /// Builds a challenge to `target` under a fresh game id and records it
    /// as our outstanding challenge, replacing any earlier one.
    ///
    /// # Errors
    /// [`LobbyError::SelfChallenge`] for our own id,
    /// [`LobbyError::UnknownPeer`] if no heartbeat from `target` is on
    /// record.
    pub fn challenge(
        &mut self,
        target: &PeerId,
        proposed_color: Color,
        now: u64,
    ) -> Result<Challenge, LobbyError> {
        if *target == self.local_id {
            return Err(LobbyError::SelfChallenge);
        }
        if !self.peers.contains_key(target) {
            return Err(LobbyError::UnknownPeer(target.clone()));
        }
        let game_id = GameId::generate();
        self.sent = Some(SentChallenge {
            game_id: game_id.clone(),
            target: target.clone(),
            proposed_color,
        });
        Ok(Challenge {
            game_id,
            challenger_id: self.local_id.clone(),
            challenger_name: display_name(&self.name),
            challenger_rating: self.rating,
            proposed_color,
            timestamp: now,
        })
    }

    /// Records an inbound challenge, attributed to its sender. Returns
    /// the unanswered challenge it replaced, if any.
    pub fn on_challenge(&mut self, from: &PeerId, c: Challenge) -> Option<PendingChallenge> {
        self.received.replace(PendingChallenge {
            game_id: c.game_id,
            challenger_id: from.clone(),
            challenger_name: c.challenger_name,
            challenger_rating: c.challenger_rating,
            proposed_color: c.proposed_color,
        })
    }

    pub fn pending(&self) -> Option<&PendingChallenge> {
        self.received.as_ref()
    }

    pub fn outstanding(&self) -> Option<&SentChallenge> {
        self.sent.as_ref()
    }

    /// Accepts the pending challenge. Returns the challenger to answer,
    /// the answer, and our ticket (we play the opposite of the proposed
    /// color).
    ///
    /// # Errors
    /// [`LobbyError::NoPendingChallenge`] if nothing is pending.
    pub fn accept(
        &mut self,
        now: u64,
    ) -> Result<(PeerId, ChallengeResponse, MatchTicket), LobbyError> {
        let pending = self.received.take().ok_or(LobbyError::NoPendingChallenge)?;
        let response = ChallengeResponse {
            kind: ResponseKind::Accept,
            game_id: pending.game_id.clone(),
            timestamp: now,
        };
        let ticket = MatchTicket {
            game_id: pending.game_id,
            color: pending.proposed_color.opposite(),
            opponent: pending.challenger_id.clone(),
            opponent_name: pending.challenger_name,
            opponent_rating: pending.challenger_rating,
            initiator: false,
        };
        Ok((pending.challenger_id, response, ticket))
    }

    /// Declines the pending challenge.
    ///
    /// # Errors
    /// [`LobbyError::NoPendingChallenge`] if nothing is pending.
    pub fn decline(&mut self, now: u64) -> Result<(PeerId, ChallengeResponse), LobbyError> {
        let pending = self.received.take().ok_or(LobbyError::NoPendingChallenge)?;
        let response = ChallengeResponse {
            kind: ResponseKind::Decline,
            game_id: pending.game_id,
            timestamp: now,
        };
        Ok((pending.challenger_id, response))
    }

    /// Interprets a `challResp`. Only an answer from the target of our
    /// outstanding challenge, naming its game id, counts.
    pub fn on_response(&mut self, from: &PeerId, resp: &ChallengeResponse) -> ResponseOutcome {
        let matches = self
            .sent
            .as_ref()
            .is_some_and(|s| s.target == *from && s.game_id == resp.game_id);
        if !matches {
            return ResponseOutcome::Ignored;
        }
        let Some(sent) = self.sent.take() else {
            return ResponseOutcome::Ignored;
        };
        match resp.kind {
            ResponseKind::Decline => ResponseOutcome::Declined(sent.game_id),
            ResponseKind::Accept => {
                let (opponent_name, opponent_rating) = self
                    .peers
                    .get(from)
                    .map(|p| (p.name.clone(), p.rating))
                    .unwrap_or_else(|| ("Opponent".to_owned(), crate::DEFAULT_RATING));
                ResponseOutcome::Accepted(MatchTicket {
                    game_id: sent.game_id,
                    color: sent.proposed_color,
                    opponent: sent.target,
                    opponent_name,
                    opponent_rating,
                    initiator: true,
                })
            }
        }
    }

    /// Gives up waiting on our outstanding challenge.
    pub fn abandon(&mut self) -> Option<SentChallenge> {
        self.sent.take()
    }
}

fn display_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        "Player".to_owned()
    } else {
        trimmed.to_owned()
    }
}
