//! The match event log.
//!
//! The log is the source of truth for a match. It only ever grows, one
//! entry at a time, and every entry's `seq` is its 1-based position.
//! Remote entries pass through the same gate as local ones: an entry is
//! taken only if its `seq` is exactly one past the current length. That
//! single rule makes re-delivery harmless and refuses gaps, without any
//! acknowledgements.

use peerboard_protocol::Color;
use serde::{Deserialize, Serialize};

/// What one log entry records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EntryKind {
    /// A move, carrying the resulting position.
    Move {
        fen: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        san: Option<String>,
    },
    /// A resignation. Older peers omit the color; replay then blames the
    /// side to move.
    Resign {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<Color>,
    },
    DrawOffer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<Color>,
    },
    DrawAccept,
    DrawDecline,
}

/// One entry of the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub seq: u64,
    pub timestamp: u64,
    #[serde(flatten)]
    pub kind: EntryKind,
}

/// `logSync`: the whole log, pushed to a peer that just joined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSync {
    pub events: Vec<LogEntry>,
}

/// What happened to an entry offered to [`MatchLog::ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// Wrong `seq`: a duplicate, a gap, or a step backwards.
    Rejected { expected: u64, got: u64 },
}

/// The append-only log of one match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchLog {
    entries: Vec<LogEntry>,
}

impl MatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// The `seq` the next entry must carry.
    pub fn next_seq(&self) -> u64 {
        self.entries.len() as u64 + 1
    }

    /// Appends an entry we produced ourselves and returns it, ready to
    /// broadcast.
    pub fn append_local(&mut self, kind: EntryKind, timestamp: u64) -> LogEntry {
        let entry = LogEntry {
            seq: self.next_seq(),
            timestamp,
            kind,
        };
        self.entries.push(entry.clone());
        entry
    }

    /// Appends a remote entry if and only if its `seq` is the next one.
    pub fn ingest(&mut self, entry: LogEntry) -> AppendOutcome {
        let expected = self.next_seq();
        if entry.seq != expected {
            return AppendOutcome::Rejected {
                expected,
                got: entry.seq,
            };
        }
        self.entries.push(entry);
        AppendOutcome::Appended
    }

    /// Takes a bulk snapshot, but only into an empty log, and only if the
    /// snapshot is non-empty and numbered 1, 2, 3... Returns whether it
    /// was taken.
    pub fn accept_sync(&mut self, events: Vec<LogEntry>) -> bool {
        if !self.entries.is_empty() || events.is_empty() {
            return false;
        }
        let contiguous = events
            .iter()
            .enumerate()
            .all(|(i, e)| e.seq == i as u64 + 1);
        if !contiguous {
            return false;
        }
        self.entries = events;
        true
    }

    /// The whole log as a `logSync` payload.
    pub fn snapshot(&self) -> LogSync {
        LogSync {
            events: self.entries.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn mv(seq: u64, fen: &str) -> LogEntry {
        LogEntry {
            seq,
            timestamp: 0,
            kind: EntryKind::Move {
                fen: fen.into(),
                san: None,
            },
        }
    }

    #[test]
    fn test_entry_wire_shape_is_flat() {
        let entry = LogEntry {
            seq: 1,
            timestamp: 9,
            kind: EntryKind::Move {
                fen: "f".into(),
                san: Some("e4".into()),
            },
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"seq": 1, "timestamp": 9, "kind": "move", "fen": "f", "san": "e4"})
        );

        let accept: LogEntry =
            serde_json::from_value(json!({"seq": 3, "kind": "drawAccept", "timestamp": 1})).unwrap();
        assert_eq!(accept.kind, EntryKind::DrawAccept);

        let resign: LogEntry =
            serde_json::from_value(json!({"seq": 2, "kind": "resign", "timestamp": 1})).unwrap();
        assert_eq!(resign.kind, EntryKind::Resign { color: None });
    }

    #[test]
    fn test_unknown_kind_does_not_decode() {
        let r = serde_json::from_value::<LogEntry>(json!({"seq": 1, "kind": "teleport", "timestamp": 1}));
        assert!(r.is_err());
    }

    #[test]
    fn test_local_append_numbers_from_one() {
        let mut log = MatchLog::new();
        assert_eq!(log.append_local(EntryKind::DrawAccept, 0).seq, 1);
        assert_eq!(log.append_local(EntryKind::DrawDecline, 0).seq, 2);
        assert_eq!(log.next_seq(), 3);
    }

    #[test]
    fn test_ingest_is_idempotent() {
        let mut log = MatchLog::new();
        assert_eq!(log.ingest(mv(1, "a")), AppendOutcome::Appended);
        assert_eq!(
            log.ingest(mv(1, "a")),
            AppendOutcome::Rejected { expected: 2, got: 1 }
        );
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_ingest_rejects_gaps() {
        let mut log = MatchLog::new();
        log.ingest(mv(1, "a"));
        assert_eq!(
            log.ingest(mv(3, "c")),
            AppendOutcome::Rejected { expected: 2, got: 3 }
        );
        assert_eq!(log.len(), 1);
        assert_eq!(log.ingest(mv(2, "b")), AppendOutcome::Appended);
    }

    #[test]
    fn test_sync_only_into_empty_log() {
        let mut log = MatchLog::new();
        assert!(!log.accept_sync(Vec::new()));
        assert!(log.accept_sync(vec![mv(1, "a"), mv(2, "b")]));
        assert_eq!(log.len(), 2);
        assert!(!log.accept_sync(vec![mv(1, "x")]));
        assert_eq!(log.entries()[0], mv(1, "a"));
    }

    #[test]
    fn test_sync_with_gap_is_refused() {
        let mut log = MatchLog::new();
        assert!(!log.accept_sync(vec![mv(1, "a"), mv(3, "c")]));
        assert!(!log.accept_sync(vec![mv(2, "b")]));
        assert!(log.is_empty());
    }
}
