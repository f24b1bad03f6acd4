//! Deterministic replay of a match log.
//!
//! [`replay`] folds the entries, in `seq` order, into the current
//! position, the move list, the result and any outstanding draw offer.
//! It is a pure function of the log and the rules engine, and it stops at
//! the first entry that ends the match: anything logged after that is
//! ignored.

use peerboard_protocol::Color;
use serde::{Deserialize, Serialize};

use crate::log::{EntryKind, LogEntry};
use crate::rules::RulesEngine;

/// Why a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    Checkmate,
    Resignation,
    Agreement,
    Stalemate,
    /// A drawn position other than stalemate.
    DrawnPosition,
    /// The opponent left before the match was decided. Inferred locally.
    Forfeit,
    /// A clock ran out. Inferred locally.
    Timeout,
}

/// The result of a match, independent of who is looking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum MatchResult {
    #[default]
    Ongoing,
    Won {
        winner: Color,
        reason: EndReason,
    },
    Drawn {
        reason: EndReason,
    },
}

/// A result as one player sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Ongoing,
    Win,
    Loss,
    Draw,
}

impl MatchResult {
    pub fn is_over(&self) -> bool {
        !matches!(self, Self::Ongoing)
    }

    /// The result from `color`'s side of the board.
    pub fn outcome_for(&self, color: Color) -> Outcome {
        match self {
            Self::Ongoing => Outcome::Ongoing,
            Self::Won { winner, .. } if *winner == color => Outcome::Win,
            Self::Won { .. } => Outcome::Loss,
            Self::Drawn { .. } => Outcome::Draw,
        }
    }

    /// PGN result token.
    pub fn pgn_token(&self) -> &'static str {
        match self {
            Self::Ongoing => "*",
            Self::Won {
                winner: Color::White,
                ..
            } => "1-0",
            Self::Won {
                winner: Color::Black,
                ..
            } => "0-1",
            Self::Drawn { .. } => "1/2-1/2",
        }
    }
}

/// State derived from a log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    pub position: String,
    /// Notation of every move, in order.
    pub moves: Vec<String>,
    pub result: MatchResult,
    /// The side with an unanswered draw offer.
    pub draw_offer: Option<Color>,
    /// Entries consumed. Less than the log length when entries follow a
    /// terminal one.
    pub applied: usize,
}

impl Replay {
    /// The state before any entry.
    pub fn initial<E: RulesEngine + ?Sized>(rules: &E) -> Self {
        Self {
            position: rules.initial_position(),
            moves: Vec::new(),
            result: MatchResult::Ongoing,
            draw_offer: None,
            applied: 0,
        }
    }
}

/// Replays `entries` from the initial position.
pub fn replay<E: RulesEngine + ?Sized>(rules: &E, entries: &[LogEntry]) -> Replay {
    let mut state = Replay::initial(rules);

    for entry in entries {
        state.applied += 1;
        match &entry.kind {
            EntryKind::Move { fen, san } => {
                state.position.clone_from(fen);
                if let Some(san) = san.as_deref().filter(|s| !s.is_empty()) {
                    state.moves.push(san.to_owned());
                }
                let status = rules.status(&state.position);
                if status.flags.checkmate {
                    state.result = MatchResult::Won {
                        winner: status.side_to_move.opposite(),
                        reason: EndReason::Checkmate,
                    };
                } else if status.flags.stalemate {
                    state.result = MatchResult::Drawn {
                        reason: EndReason::Stalemate,
                    };
                } else if status.flags.draw {
                    state.result = MatchResult::Drawn {
                        reason: EndReason::DrawnPosition,
                    };
                }
            }
            EntryKind::Resign { color } => {
                let resigner = color.unwrap_or_else(|| rules.status(&state.position).side_to_move);
                state.result = MatchResult::Won {
                    winner: resigner.opposite(),
                    reason: EndReason::Resignation,
                };
            }
            EntryKind::DrawOffer { color } => {
                let by = color.unwrap_or_else(|| rules.status(&state.position).side_to_move);
                state.draw_offer = Some(by);
            }
            EntryKind::DrawAccept => {
                state.draw_offer = None;
                state.result = MatchResult::Drawn {
                    reason: EndReason::Agreement,
                };
            }
            EntryKind::DrawDecline => state.draw_offer = None,
        }
        if state.result.is_over() {
            break;
        }
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::rules::{MoveRequest, TicTacToe};

    fn entry(seq: u64, kind: EntryKind) -> LogEntry {
        LogEntry {
            seq,
            timestamp: 0,
            kind,
        }
    }

    /// Log entries for placing marks on `squares` in order.
    fn moves(squares: &[&str]) -> Vec<LogEntry> {
        let rules = TicTacToe;
        let mut pos = rules.initial_position();
        let mut out = Vec::new();
        for (i, sq) in squares.iter().enumerate() {
            let m = rules.validate_move(&pos, &MoveRequest::place(*sq)).unwrap();
            pos = m.position.clone();
            out.push(entry(
                i as u64 + 1,
                EntryKind::Move {
                    fen: m.position,
                    san: Some(m.notation),
                },
            ));
        }
        out
    }

    #[test]
    fn test_empty_log_is_initial_state() {
        let r = replay(&TicTacToe, &[]);
        assert_eq!(r, Replay::initial(&TicTacToe));
        assert_eq!(r.result, MatchResult::Ongoing);
    }

    #[test]
    fn test_moves_replace_position_and_collect_notation() {
        let r = replay(&TicTacToe, &moves(&["b2", "a1"]));
        assert_eq!(r.position, "....X.O.. w");
        assert_eq!(r.moves, vec!["Xb2", "Oa1"]);
        assert_eq!(r.applied, 2);
    }

    #[test]
    fn test_empty_notation_is_not_listed() {
        let log = vec![entry(
            1,
            EntryKind::Move {
                fen: "....X.... b".into(),
                san: Some(String::new()),
            },
        )];
        assert!(replay(&TicTacToe, &log).moves.is_empty());
    }

    #[test]
    fn test_resign_without_color_blames_side_to_move() {
        let mut log = moves(&["b2"]);
        log.push(entry(2, EntryKind::Resign { color: None }));
        let r = replay(&TicTacToe, &log);
        assert_eq!(
            r.result,
            MatchResult::Won {
                winner: Color::White,
                reason: EndReason::Resignation
            }
        );
        assert_eq!(r.result.outcome_for(Color::Black), Outcome::Loss);
    }

    #[test]
    fn test_resign_with_color_uses_it() {
        let mut log = moves(&["b2"]);
        log.push(entry(2, EntryKind::Resign { color: Some(Color::White) }));
        let r = replay(&TicTacToe, &log);
        assert_eq!(r.result.outcome_for(Color::White), Outcome::Loss);
    }

    #[test]
    fn test_draw_accept_stops_replay() {
        let mut log = moves(&["b2"]);
        log.push(entry(2, EntryKind::DrawOffer { color: None }));
        log.push(entry(3, EntryKind::DrawAccept));
        log.push(entry(
            4,
            EntryKind::Move {
                fen: "....X...O w".into(),
                san: Some("Oc1".into()),
            },
        ));
        let r = replay(&TicTacToe, &log);
        assert_eq!(
            r.result,
            MatchResult::Drawn {
                reason: EndReason::Agreement
            }
        );
        assert_eq!(r.applied, 3);
        assert_eq!(r.moves, vec!["Xb2"]);
        assert_eq!(r.draw_offer, None);
    }

    #[test]
    fn test_draw_offer_then_decline() {
        let mut log = moves(&["b2"]);
        log.push(entry(2, EntryKind::DrawOffer { color: Some(Color::Black) }));
        let r = replay(&TicTacToe, &log);
        assert_eq!(r.draw_offer, Some(Color::Black));
        assert_eq!(r.result, MatchResult::Ongoing);

        log.push(entry(3, EntryKind::DrawDecline));
        let r = replay(&TicTacToe, &log);
        assert_eq!(r.draw_offer, None);
        assert_eq!(r.result, MatchResult::Ongoing);
    }

    #[test]
    fn test_winning_move_ends_match() {
        let r = replay(&TicTacToe, &moves(&["a1", "a2", "b1", "b2", "c1"]));
        assert_eq!(
            r.result,
            MatchResult::Won {
                winner: Color::White,
                reason: EndReason::Checkmate
            }
        );
        assert_eq!(r.result.pgn_token(), "1-0");
    }

    #[test]
    fn test_full_board_is_drawn_position() {
        let r = replay(
            &TicTacToe,
            &moves(&["a1", "b1", "c1", "b2", "a2", "c2", "b3", "a3", "c3"]),
        );
        assert_eq!(
            r.result,
            MatchResult::Drawn {
                reason: EndReason::DrawnPosition
            }
        );
    }
}
