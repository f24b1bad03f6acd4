//! Match configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Match settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Clock time each side starts with.
    pub game_time: Duration,

    /// Added to a side's clock after each of its moves.
    pub increment: Duration,

    /// How often the running clock is updated.
    pub clock_tick: Duration,

    /// Also send a bare `move` broadcast with every move entry, for peers
    /// that only understand position broadcasts.
    pub legacy_broadcasts: bool,

    /// Capacity of the session's command channel.
    pub command_channel_size: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            game_time: Duration::from_secs(5 * 60),
            increment: Duration::from_secs(30),
            clock_tick: Duration::from_secs(1),
            legacy_broadcasts: true,
            command_channel_size: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_five_minutes_plus_thirty() {
        let cfg = MatchConfig::default();
        assert_eq!(cfg.game_time, Duration::from_secs(300));
        assert_eq!(cfg.increment, Duration::from_secs(30));
        assert_eq!(cfg.clock_tick, Duration::from_secs(1));
    }
}
