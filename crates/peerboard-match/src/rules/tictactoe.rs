//! A small reference engine: tic-tac-toe on a 3x3 board.
//!
//! Positions are nine cells, rank 3 first, followed by the side to move:
//! `"........." w`. White plays `X`, black plays `O`. Squares are named
//! `a1`..`c3`, and notation is the mark followed by the square (`Xb2`).

use peerboard_protocol::Color;

use super::{IllegalMove, MoveOutcome, MoveRequest, PositionStatus, RulesEngine, TerminalFlags};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Cell {
    Empty,
    X,
    O,
}

struct Board {
    cells: [[Cell; 3]; 3],
    turn: Color,
}

impl Board {
    fn parse(position: &str) -> Option<Self> {
        let (cells_part, turn_part) = position.split_once(' ')?;
        let turn = match turn_part {
            "w" => Color::White,
            "b" => Color::Black,
            _ => return None,
        };
        let chars: Vec<char> = cells_part.chars().collect();
        if chars.len() != 9 {
            return None;
        }
        let mut cells = [[Cell::Empty; 3]; 3];
        for (i, c) in chars.into_iter().enumerate() {
            cells[i / 3][i % 3] = match c {
                '.' => Cell::Empty,
                'X' => Cell::X,
                'O' => Cell::O,
                _ => return None,
            };
        }
        Some(Self { cells, turn })
    }

    fn render(&self) -> String {
        let mut out = String::with_capacity(11);
        for row in &self.cells {
            for cell in row {
                out.push(match cell {
                    Cell::Empty => '.',
                    Cell::X => 'X',
                    Cell::O => 'O',
                });
            }
        }
        out.push(' ');
        out.push(match self.turn {
            Color::White => 'w',
            Color::Black => 'b',
        });
        out
    }

    fn status(&self) -> PositionStatus {
        // The side that just moved is the only one that can have a line.
        let last = mark_of(self.turn.opposite());
        let won = has_line(&self.cells, last);
        let full = self.cells.iter().all(|row| row.iter().all(|c| *c != Cell::Empty));
        PositionStatus {
            side_to_move: self.turn,
            flags: TerminalFlags {
                check: false,
                checkmate: won,
                stalemate: false,
                draw: !won && full,
            },
        }
    }
}

fn mark_of(color: Color) -> Cell {
    match color {
        Color::White => Cell::X,
        Color::Black => Cell::O,
    }
}

fn has_line(b: &[[Cell; 3]; 3], m: Cell) -> bool {
    (0..3).any(|i| (0..3).all(|j| b[i][j] == m))
        || (0..3).any(|j| (0..3).all(|i| b[i][j] == m))
        || (0..3).all(|i| b[i][i] == m)
        || (0..3).all(|i| b[i][2 - i] == m)
}

/// `a1` is the bottom-left square. Returns (row, col) into `cells`.
fn square(name: &str) -> Option<(usize, usize)> {
    let mut chars = name.chars();
    let file = chars.next()?;
    let rank = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let col = match file {
        'a' => 0,
        'b' => 1,
        'c' => 2,
        _ => return None,
    };
    let row = match rank {
        '3' => 0,
        '2' => 1,
        '1' => 2,
        _ => return None,
    };
    Some((row, col))
}

/// Tic-tac-toe rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct TicTacToe;

impl RulesEngine for TicTacToe {
    fn initial_position(&self) -> String {
        "......... w".to_owned()
    }

    fn validate_move(&self, position: &str, mv: &MoveRequest) -> Result<MoveOutcome, IllegalMove> {
        let mut board =
            Board::parse(position).ok_or_else(|| IllegalMove(format!("unreadable position {position:?}")))?;
        if board.status().flags.is_terminal() {
            return Err(IllegalMove("game is over".into()));
        }
        let (row, col) =
            square(&mv.to).ok_or_else(|| IllegalMove(format!("no square {:?}", mv.to)))?;
        if board.cells[row][col] != Cell::Empty {
            return Err(IllegalMove(format!("{} is occupied", mv.to)));
        }

        let mover = board.turn;
        board.cells[row][col] = mark_of(mover);
        board.turn = mover.opposite();
        let mark = if mover == Color::White { 'X' } else { 'O' };

        Ok(MoveOutcome {
            position: board.render(),
            notation: format!("{mark}{}", mv.to),
            flags: board.status().flags,
        })
    }

    fn status(&self, position: &str) -> PositionStatus {
        Board::parse(position)
            .map(|b| b.status())
            .unwrap_or(PositionStatus {
                side_to_move: Color::White,
                flags: TerminalFlags::default(),
            })
    }

    fn is_valid_position(&self, position: &str) -> bool {
        Board::parse(position).is_some()
    }
}
