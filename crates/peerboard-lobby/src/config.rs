//! Lobby configuration.

use std::time::Duration;

use peerboard_protocol::RoomId;
use peerboard_tick::TickConfig;
use serde::{Deserialize, Serialize};

/// Room every peer joins to find opponents.
pub const DEFAULT_LOBBY_ROOM: &str = "p2p-chess-global";

/// Rating given to a player with no history.
pub const DEFAULT_RATING: u32 = 1200;

/// Lobby settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyConfig {
    /// The shared lobby room.
    pub room_id: RoomId,

    /// Time between heartbeat broadcasts.
    pub heartbeat_interval: Duration,

    /// Random delay (0..max) before the first heartbeat after the
    /// immediate one.
    pub heartbeat_jitter: Duration,

    /// Peers further than this from our own rating are hidden unless the
    /// caller asks for everyone.
    pub rating_window: u32,

    /// Cap on the number of peers [`Lobby::visible`](crate::Lobby::visible)
    /// returns.
    pub max_displayed: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            room_id: RoomId::from(DEFAULT_LOBBY_ROOM),
            heartbeat_interval: Duration::from_secs(10),
            heartbeat_jitter: Duration::ZERO,
            rating_window: 200,
            max_displayed: 100,
        }
    }
}

impl LobbyConfig {
    /// The heartbeat timer: first beat right away, then every interval.
    pub fn heartbeat_tick(&self) -> TickConfig {
        TickConfig {
            period: Some(self.heartbeat_interval),
            initial_jitter: self.heartbeat_jitter,
            fire_immediately: true,
            ..TickConfig::default()
        }
    }
}
