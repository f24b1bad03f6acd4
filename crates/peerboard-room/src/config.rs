//! Room configuration.

use peerboard_transport::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Settings shared by every room a [`RoomRegistry`](crate::RoomRegistry)
/// opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Capacity of each room actor's command channel. Senders wait when
    /// it is full.
    pub command_channel_size: usize,

    /// Backoff applied when joining a rendezvous room or opening a link
    /// fails with a retryable error.
    pub retry: RetryPolicy,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            command_channel_size: 64,
            retry: RetryPolicy::default(),
        }
    }
}
