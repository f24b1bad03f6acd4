//! Wire types for every action Peerboard exchanges.
//!
//! Each payload travels on a named action, so none of them needs a global
//! type tag. Field names are camelCase on the wire because browser peers
//! speak the same protocol.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub use peerboard_transport::PeerId;

/// Milliseconds since the Unix epoch, as carried in every `timestamp` field.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Names a room on a rendezvous transport. The lobby and every match get
/// their own room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifier of one match, minted by the challenger.
///
/// The match room is keyed by the same string, see [`GameId::room_id`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(String);

impl GameId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The room this match is played in.
    pub fn room_id(&self) -> RoomId {
        RoomId(self.0.clone())
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Color and role
// ---------------------------------------------------------------------------

/// A side of the board. Serialized as `"w"` / `"b"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    #[serde(rename = "w")]
    White,
    #[serde(rename = "b")]
    Black,
}

impl Color {
    /// The other side.
    pub fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::White => "white",
            Self::Black => "black",
        })
    }
}

/// What a peer does in a match room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Spectator,
}

/// `roleAnnounce`: sent to each peer on join.
///
/// `color` is present for players only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAnnounce {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    pub peer_id: PeerId,
}

impl RoleAnnounce {
    pub fn player(color: Color, peer_id: PeerId) -> Self {
        Self {
            role: Role::Player,
            color: Some(color),
            peer_id,
        }
    }

    pub fn spectator(peer_id: PeerId) -> Self {
        Self {
            role: Role::Spectator,
            color: None,
            peer_id,
        }
    }

    /// The color this announcement claims, if it is a player announcement.
    pub fn claimed_color(&self) -> Option<Color> {
        match self.role {
            Role::Player => self.color,
            Role::Spectator => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Lobby payloads
// ---------------------------------------------------------------------------

/// `heartbeat`: periodic presence broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    pub id: PeerId,
    pub rating: u32,
    pub name: String,
    pub ready: bool,
    pub timestamp: u64,
}

/// `challenge`: sent directly to one peer to propose a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub game_id: GameId,
    pub challenger_id: PeerId,
    pub challenger_name: String,
    pub challenger_rating: u32,
    /// The color the challenger will play.
    pub proposed_color: Color,
    pub timestamp: u64,
}

/// Answer carried by a [`ChallengeResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Accept,
    Decline,
}

/// `challResp`: the target's answer to a [`Challenge`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub game_id: GameId,
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// Match-room payloads
// ---------------------------------------------------------------------------

/// `positionSync`: the canonical starting position, pushed by white.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSync {
    pub fen: String,
    pub timestamp: u64,
}

/// `move`: a bare position broadcast from peers that predate the event log.
///
/// Only meaningful to a peer that has not seen any log entries yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "move", rename_all = "camelCase")]
pub struct MoveBroadcast {
    pub fen: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub san: Option<String>,
    pub timestamp: u64,
}

/// `chat`: a free-text line from a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub text: String,
    pub peer_id: PeerId,
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One message on the rendezvous carrier: the action it travels on plus
/// its JSON payload.
///
/// The Framed Link carries the same pair in its own byte format
/// (see [`crate::frame`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub action: String,
    pub payload: serde_json::Value,
}
