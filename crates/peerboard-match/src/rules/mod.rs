//! The rules engine seam.
//!
//! A match never interprets positions itself. It hands them to a
//! [`RulesEngine`] as opaque strings (FEN for chess) and trusts what comes
//! back. The engine is a pure function of its inputs, so every peer that
//! replays the same log through the same engine lands on the same state.

mod tictactoe;

pub use tictactoe::TicTacToe;

use peerboard_protocol::Color;
use serde::{Deserialize, Serialize};

/// A move as a player requests it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    /// Origin square. Placement games leave this empty.
    pub from: String,
    pub to: String,
    /// Piece to promote to, for engines that have promotion.
    pub promotion: Option<char>,
}

impl MoveRequest {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            promotion: None,
        }
    }

    /// A move that only names its destination.
    pub fn place(to: impl Into<String>) -> Self {
        Self::new(String::new(), to)
    }

    pub fn with_promotion(mut self, piece: char) -> Self {
        self.promotion = Some(piece);
        self
    }
}

/// Terminal-state flags the engine reports for a position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalFlags {
    pub check: bool,
    /// The side to move has lost.
    pub checkmate: bool,
    pub stalemate: bool,
    /// Drawn for any other reason (insufficient material, full board...).
    pub draw: bool,
}

impl TerminalFlags {
    pub fn is_terminal(&self) -> bool {
        self.checkmate || self.stalemate || self.draw
    }
}

/// What the engine knows about a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionStatus {
    pub side_to_move: Color,
    pub flags: TerminalFlags,
}

/// A legal move, applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub position: String,
    /// Human-readable notation (SAN for chess).
    pub notation: String,
    pub flags: TerminalFlags,
}

/// The engine rejected a move.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal move: {0}")]
pub struct IllegalMove(pub String);

/// Game rules, consumed as pure functions over positions.
pub trait RulesEngine: Send + Sync + 'static {
    /// The position every match starts from.
    fn initial_position(&self) -> String;

    /// Applies `mv` to `position`.
    ///
    /// # Errors
    /// [`IllegalMove`] if the move is not legal there.
    fn validate_move(&self, position: &str, mv: &MoveRequest) -> Result<MoveOutcome, IllegalMove>;

    /// Side to move and terminal flags of `position`. Must not fail: an
    /// unreadable position reports white to move and no flags.
    fn status(&self, position: &str) -> PositionStatus;

    /// Whether `position` can be loaded at all.
    fn is_valid_position(&self, position: &str) -> bool;
}
