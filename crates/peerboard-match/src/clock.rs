//! Per-side countdown clocks.
//!
//! Clocks are local: they are driven by this peer's own timer and are not
//! replicated, so two peers may see slightly different remaining times. A
//! flag fall is a local inference, like a forfeit.

use std::time::Duration;

use peerboard_protocol::Color;

/// Remaining time for both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchClock {
    white: Duration,
    black: Duration,
    increment: Duration,
    flagged: Option<Color>,
}

impl MatchClock {
    pub fn new(game_time: Duration, increment: Duration) -> Self {
        Self {
            white: game_time,
            black: game_time,
            increment,
            flagged: None,
        }
    }

    pub fn remaining(&self, color: Color) -> Duration {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    /// The side whose time ran out, if any.
    pub fn flagged(&self) -> Option<Color> {
        self.flagged
    }

    /// Charges `elapsed` to `side`. Returns the side the first time its
    /// time reaches zero.
    pub fn charge(&mut self, side: Color, elapsed: Duration) -> Option<Color> {
        if self.flagged.is_some() {
            return None;
        }
        let left = self.slot(side);
        *left = left.saturating_sub(elapsed);
        if left.is_zero() {
            self.flagged = Some(side);
            return Some(side);
        }
        None
    }

    /// Adds the increment after `mover` moved.
    pub fn on_move(&mut self, mover: Color) {
        if self.flagged.is_none() {
            let inc = self.increment;
            let left = self.slot(mover);
            *left = left.saturating_add(inc);
        }
    }

    fn slot(&mut self, color: Color) -> &mut Duration {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_counts_down_one_side() {
        let mut clock = MatchClock::new(Duration::from_secs(10), Duration::ZERO);
        assert_eq!(clock.charge(Color::White, Duration::from_secs(3)), None);
        assert_eq!(clock.remaining(Color::White), Duration::from_secs(7));
        assert_eq!(clock.remaining(Color::Black), Duration::from_secs(10));
    }

    #[test]
    fn test_flag_falls_once() {
        let mut clock = MatchClock::new(Duration::from_secs(2), Duration::ZERO);
        assert_eq!(clock.charge(Color::Black, Duration::from_secs(5)), Some(Color::Black));
        assert_eq!(clock.remaining(Color::Black), Duration::ZERO);
        assert_eq!(clock.charge(Color::Black, Duration::from_secs(1)), None);
        assert_eq!(clock.flagged(), Some(Color::Black));
    }

    #[test]
    fn test_increment_after_move() {
        let mut clock = MatchClock::new(Duration::from_secs(60), Duration::from_secs(30));
        clock.charge(Color::White, Duration::from_secs(10));
        clock.on_move(Color::White);
        assert_eq!(clock.remaining(Color::White), Duration::from_secs(80));
    }
}
