//! Match layer for Peerboard.
//!
//! A match lives in its own room, named by the game id. Its state is an
//! append-only event log that every peer in the room replicates:
//!
//! ```text
//! local action ──→ MatchLog::append_local ──→ moveAppend ──→ peers
//! moveAppend   ──→ MatchLog::ingest (seq gate) ──→ replay ──→ MatchView
//! late joiner  ←── logSync (whole log, accepted only into an empty log)
//! ```
//!
//! Board rules stay behind the [`RulesEngine`] trait; the log stores
//! positions as opaque strings and replay asks the engine what they mean.
//!
//! # Key types
//!
//! - [`MatchLog`] / [`LogEntry`]: the replicated log
//! - [`replay()`]: pure fold from log to [`Replay`]
//! - [`RoleBook`]: who plays which color
//! - [`MatchSession`]: actor that runs all of the above over a room
//! - [`pgn`]: export of a finished game

mod clock;
mod config;
mod error;
mod log;
pub mod pgn;
mod replay;
mod roles;
pub mod rules;
mod session;

pub use clock::MatchClock;
pub use config::MatchConfig;
pub use error::MatchError;
pub use log::{AppendOutcome, EntryKind, LogEntry, LogSync, MatchLog};
pub use replay::{replay, EndReason, MatchResult, Outcome, Replay};
pub use roles::{RoleBook, RoleUpdate};
pub use rules::{MoveRequest, RulesEngine, TicTacToe};
pub use session::{ClockView, MatchEvent, MatchSession, MatchSetup, MatchView};
