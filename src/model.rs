use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Value, json};

use crate::markets::{Market, PickSide};

/// One recorded prediction for a game: the free-text pick per market plus
/// the closing lines captured when the prediction was made. Immutable once
/// recorded; grading never mutates it.
#[derive(Debug, Clone, Default)]
pub struct PredictionRow {
    pub id: Option<i64>,
    pub league: String,
    pub game_id: String,
    pub pick_moneyline: Option<String>,
    pub pick_spread: Option<String>,
    pub pick_total: Option<String>,
    pub spread_line: Option<f64>,
    pub total_line: Option<f64>,
}

impl PredictionRow {
    pub fn pick_text(&self, market: Market) -> Option<&str> {
        let raw = match market {
            Market::Moneyline => self.pick_moneyline.as_deref(),
            Market::Spread => self.pick_spread.as_deref(),
            Market::Total => self.pick_total.as_deref(),
        };
        raw.map(str::trim).filter(|s| !s.is_empty())
    }

    /// Closing line recorded alongside the prediction, used when the pick
    /// text itself carries no number.
    pub fn recorded_line(&self, market: Market) -> Option<f64> {
        match market {
            Market::Moneyline => None,
            Market::Spread => self.spread_line,
            Market::Total => self.total_line,
        }
    }
}

/// Final score for a game, produced by the scores ingest. Read-only to the
/// grading core; scores may be absent while a game is still in progress.
#[derive(Debug, Clone)]
pub struct GameResult {
    pub league: String,
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub completed: bool,
    pub start_time: Option<DateTime<Utc>>,
}

impl GameResult {
    pub fn final_score(&self) -> Option<(i64, i64)> {
        if !self.completed {
            return None;
        }
        match (self.home_score, self.away_score) {
            (Some(home), Some(away)) => Some((home, away)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Push,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Win => "WIN",
            Outcome::Loss => "LOSS",
            Outcome::Push => "PUSH",
        }
    }

    pub fn parse(raw: &str) -> Option<Outcome> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "WIN" => Some(Outcome::Win),
            "LOSS" => Some(Outcome::Loss),
            "PUSH" => Some(Outcome::Push),
            _ => None,
        }
    }
}

/// One graded market of one prediction. Derived from (prediction, result,
/// market); recomputed whenever the sources change, never edited in place.
/// `is_correct` is None on a push.
#[derive(Debug, Clone)]
pub struct EvaluatedOutcome {
    pub league: String,
    pub game_id: String,
    pub market: Market,
    pub pick: String,
    pub pick_side: PickSide,
    pub pick_line: Option<f64>,
    pub result: Outcome,
    pub is_correct: Option<bool>,
    pub margin: f64,
    pub game_start: DateTime<Utc>,
    pub prediction_id: Option<i64>,
}

impl EvaluatedOutcome {
    pub fn stat_date(&self) -> NaiveDate {
        self.game_start.date_naive()
    }

    /// Row shape for the remote REST sink, keyed on (league, game_id, market).
    pub fn to_rest_row(&self) -> Value {
        json!({
            "league": self.league,
            "game_id": self.game_id,
            "market": self.market.as_str(),
            "pick": self.pick,
            "pick_side": self.pick_side.as_str(),
            "pick_value": self.pick_line,
            "result": self.result.as_str(),
            "is_correct": self.is_correct,
            "margin": self.margin,
            "game_start": self.game_start.to_rfc3339(),
            "prediction_id": self.prediction_id,
        })
    }
}

/// Aggregate over evaluated outcomes sharing (stat_date, league, market).
/// Derived and recomputable at any time; upserts are idempotent by key.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRollup {
    pub stat_date: NaiveDate,
    pub league: String,
    pub market: Market,
    pub n: u32,
    pub wins: u32,
    pub losses: u32,
    pub pushes: u32,
    pub hit_rate: f64,
}

impl DailyRollup {
    pub fn to_rest_row(&self) -> Value {
        json!({
            "stat_date": self.stat_date.to_string(),
            "league": self.league,
            "market": self.market.as_str(),
            "n": self.n,
            "wins": self.wins,
            "losses": self.losses,
            "pushes": self.pushes,
            "hit_rate": self.hit_rate,
        })
    }
}

/// Best-effort timestamp parsing for source rows. Upstream feeds disagree on
/// formats, so accept RFC 3339, a bare datetime, or a bare date.
pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}
