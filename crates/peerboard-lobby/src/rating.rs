//! Player rating: the persisted record, the store it lives in, and the
//! Elo update applied after each finished match.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use peerboard_protocol::GameId;
use serde::{Deserialize, Serialize};

use crate::{LobbyError, DEFAULT_RATING};

/// Elo K-factor.
pub const K_FACTOR: f64 = 32.0;

/// No update takes a rating below this.
pub const RATING_FLOOR: u32 = 100;

/// Number of finished games kept in the history, newest first.
pub const HISTORY_LIMIT: usize = 100;

/// A finished game from one player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Score {
    Win,
    Loss,
    Draw,
}

impl Score {
    fn points(self) -> f64 {
        match self {
            Self::Win => 1.0,
            Self::Loss => 0.0,
            Self::Draw => 0.5,
        }
    }
}

/// Current rating and running totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RatingRecord {
    pub rating: u32,
    pub peak: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub last_updated: u64,
}

impl Default for RatingRecord {
    fn default() -> Self {
        Self {
            rating: DEFAULT_RATING,
            peak: DEFAULT_RATING,
            wins: 0,
            losses: 0,
            draws: 0,
            last_updated: 0,
        }
    }
}

/// One line of game history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub game_id: GameId,
    pub result: Score,
    pub rating_before: u32,
    pub rating_change: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent_rating: Option<u32>,
    /// Final position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fen: Option<String>,
    pub timestamp: u64,
}

/// Everything the store persists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingProfile {
    pub record: RatingRecord,
    /// Newest first, at most [`HISTORY_LIMIT`] entries.
    pub history: Vec<HistoryEntry>,
}

/// A finished game to fold into a profile.
#[derive(Debug, Clone)]
pub struct GameReport {
    pub game_id: GameId,
    pub score: Score,
    pub opponent_rating: u32,
    pub fen: Option<String>,
    pub timestamp: u64,
}

impl RatingProfile {
    /// Applies one finished game and returns the rating change.
    pub fn apply(&mut self, report: GameReport) -> i32 {
        let before = self.record.rating;
        let change = elo_delta(before, report.opponent_rating, report.score);
        let after = (i64::from(before) + i64::from(change)).max(i64::from(RATING_FLOOR));
        let after = u32::try_from(after).unwrap_or(u32::MAX);

        let r = &mut self.record;
        r.rating = after;
        r.peak = r.peak.max(after);
        match report.score {
            Score::Win => r.wins += 1,
            Score::Loss => r.losses += 1,
            Score::Draw => r.draws += 1,
        }
        r.last_updated = report.timestamp;

        self.history.insert(
            0,
            HistoryEntry {
                game_id: report.game_id,
                result: report.score,
                rating_before: before,
                rating_change: change,
                opponent_rating: Some(report.opponent_rating),
                fen: report.fen,
                timestamp: report.timestamp,
            },
        );
        self.history.truncate(HISTORY_LIMIT);
        change
    }
}

/// Rating change for a player rated `mine` who scored `score` against
/// `opponent`, rounded to the nearest point.
pub fn elo_delta(mine: u32, opponent: u32, score: Score) -> i32 {
    let exponent = (f64::from(opponent) - f64::from(mine)) / 400.0;
    let expected = 1.0 / (1.0 + 10f64.powf(exponent));
    (K_FACTOR * (score.points() - expected)).round() as i32
}

/// Persistent storage for a [`RatingProfile`].
pub trait RatingStore: Send + Sync {
    /// The stored profile, or the default one if nothing was stored yet.
    fn load(&self) -> impl Future<Output = Result<RatingProfile, LobbyError>> + Send;

    fn save(&self, profile: &RatingProfile) -> impl Future<Output = Result<(), LobbyError>> + Send;
}

/// Loads the profile, applies `report`, saves it back and returns the
/// updated profile.
///
/// # Errors
/// [`LobbyError::Storage`] from the store.
pub async fn record_game<S: RatingStore>(
    store: &S,
    report: GameReport,
) -> Result<RatingProfile, LobbyError> {
    let mut profile = store.load().await?;
    let game_id = report.game_id.clone();
    let change = profile.apply(report);
    store.save(&profile).await?;
    tracing::info!(%game_id, change, rating = profile.record.rating, "rating updated");
    Ok(profile)
}

/// A [`RatingStore`] held in memory.
#[derive(Debug, Default)]
pub struct MemoryRatingStore {
    profile: Mutex<RatingProfile>,
}

impl MemoryRatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that starts from `record` with no history.
    pub fn with_record(record: RatingRecord) -> Self {
        Self {
            profile: Mutex::new(RatingProfile {
                record,
                history: Vec::new(),
            }),
        }
    }
}

impl RatingStore for MemoryRatingStore {
    async fn load(&self) -> Result<RatingProfile, LobbyError> {
        Ok(self
            .profile
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn save(&self, profile: &RatingProfile) -> Result<(), LobbyError> {
        *self.profile.lock().unwrap_or_else(PoisonError::into_inner) = profile.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(score: Score, opponent_rating: u32) -> GameReport {
        GameReport {
            game_id: GameId::from("g"),
            score,
            opponent_rating,
            fen: None,
            timestamp: 42,
        }
    }

    #[test]
    fn test_even_match_moves_sixteen_points() {
        assert_eq!(elo_delta(1200, 1200, Score::Win), 16);
        assert_eq!(elo_delta(1200, 1200, Score::Loss), -16);
        assert_eq!(elo_delta(1200, 1200, Score::Draw), 0);
    }

    #[test]
    fn test_upset_pays_more() {
        assert!(elo_delta(1000, 1400, Score::Win) > elo_delta(1400, 1000, Score::Win));
        assert_eq!(elo_delta(1000, 1400, Score::Win), 29);
    }

    #[test]
    fn test_apply_updates_totals_and_peak() {
        let mut p = RatingProfile::default();
        assert_eq!(p.apply(report(Score::Win, 1200)), 16);
        assert_eq!(p.record.rating, 1216);
        assert_eq!(p.record.peak, 1216);
        p.apply(report(Score::Loss, 1200));
        assert!(p.record.rating < 1216);
        assert_eq!(p.record.peak, 1216);
        assert_eq!((p.record.wins, p.record.losses, p.record.draws), (1, 1, 0));
        assert_eq!(p.history.len(), 2);
        assert_eq!(p.history[0].result, Score::Loss);
        assert_eq!(p.history[1].rating_before, 1200);
    }

    #[test]
    fn test_rating_never_drops_below_floor() {
        let mut p = RatingProfile {
            record: RatingRecord {
                rating: 105,
                peak: 105,
                ..RatingRecord::default()
            },
            history: Vec::new(),
        };
        p.apply(report(Score::Loss, 100));
        assert_eq!(p.record.rating, RATING_FLOOR);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut p = RatingProfile::default();
        for _ in 0..(HISTORY_LIMIT + 5) {
            p.apply(report(Score::Draw, 1200));
        }
        assert_eq!(p.history.len(), HISTORY_LIMIT);
    }

    #[test]
    fn test_record_deserializes_with_missing_fields() {
        let r: RatingRecord = serde_json::from_str(r#"{"rating": 1500}"#).unwrap();
        assert_eq!(r.rating, 1500);
        assert_eq!(r.peak, DEFAULT_RATING);
        assert_eq!(r.wins, 0);
    }

    #[tokio::test]
    async fn test_record_game_round_trips_through_store() {
        let store = MemoryRatingStore::new();
        let updated = record_game(&store, report(Score::Win, 1200)).await.unwrap();
        assert_eq!(updated.record.rating, 1216);
        assert_eq!(store.load().await.unwrap(), updated);
    }
}
