use std::collections::HashMap;

use chrono::Utc;

use crate::markets::{Market, PickSide, normalize_pick};
use crate::model::{EvaluatedOutcome, GameResult, Outcome, PredictionRow};

/// Two grades within this distance of zero count as a push.
pub const PUSH_TOLERANCE: f64 = 1e-9;

/// Why a pick could not be graded. None of these are errors: absent or
/// malformed data degrades to "not graded" and stays out of the rollups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingPick,
    UnparseablePick,
    MissingScore,
    MissingLine,
}

/// Grading is an explicit tri-state: a graded WIN/LOSS/PUSH, or ungradeable
/// with a reason. Ungradeable picks are never reported as losses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Grade {
    Graded {
        result: Outcome,
        is_correct: Option<bool>,
        margin: f64,
    },
    Ungradeable(SkipReason),
}

pub fn grade_moneyline(score: Option<(i64, i64)>, side: PickSide) -> Grade {
    let Some((home, away)) = score else {
        return Grade::Ungradeable(SkipReason::MissingScore);
    };
    if home == away {
        return Grade::Graded {
            result: Outcome::Push,
            is_correct: None,
            margin: 0.0,
        };
    }
    let winner = if home > away {
        PickSide::Home
    } else {
        PickSide::Away
    };
    let correct = winner == side;
    Grade::Graded {
        result: if correct { Outcome::Win } else { Outcome::Loss },
        is_correct: Some(correct),
        margin: (home - away).abs() as f64,
    }
}

/// adjusted > 0 means the picked side covered the line.
pub fn grade_spread(score: Option<(i64, i64)>, side: PickSide, line: Option<f64>) -> Grade {
    let Some((home, away)) = score else {
        return Grade::Ungradeable(SkipReason::MissingScore);
    };
    let Some(line) = line else {
        return Grade::Ungradeable(SkipReason::MissingLine);
    };
    // The signed line is the handicap applied to the picked side, so a
    // HOME -3 pick needs home to win by more than 3 to cover.
    let diff = (home - away) as f64;
    let picked_diff = match side {
        PickSide::Home => diff,
        _ => -diff,
    };
    let adjusted = picked_diff + line;
    if adjusted.abs() <= PUSH_TOLERANCE {
        return Grade::Graded {
            result: Outcome::Push,
            is_correct: None,
            margin: 0.0,
        };
    }
    let covered = adjusted > 0.0;
    Grade::Graded {
        result: if covered { Outcome::Win } else { Outcome::Loss },
        is_correct: Some(covered),
        margin: adjusted,
    }
}

pub fn grade_total(score: Option<(i64, i64)>, side: PickSide, line: Option<f64>) -> Grade {
    let Some((home, away)) = score else {
        return Grade::Ungradeable(SkipReason::MissingScore);
    };
    let Some(line) = line else {
        return Grade::Ungradeable(SkipReason::MissingLine);
    };
    let delta = (home + away) as f64 - line;
    if delta.abs() <= PUSH_TOLERANCE {
        return Grade::Graded {
            result: Outcome::Push,
            is_correct: None,
            margin: 0.0,
        };
    }
    let correct = (delta > 0.0 && side == PickSide::Over) || (delta < 0.0 && side == PickSide::Under);
    Grade::Graded {
        result: if correct { Outcome::Win } else { Outcome::Loss },
        is_correct: Some(correct),
        margin: delta,
    }
}

/// One market of one prediction graded against a final score.
#[derive(Debug, Clone)]
pub enum MarketGrade {
    Evaluated(EvaluatedOutcome),
    Skipped(SkipReason),
}

pub fn grade_market(pred: &PredictionRow, result: &GameResult, market: Market) -> MarketGrade {
    let Some(raw) = pred.pick_text(market) else {
        return MarketGrade::Skipped(SkipReason::MissingPick);
    };
    let Some(pick) = normalize_pick(raw, market) else {
        return MarketGrade::Skipped(SkipReason::UnparseablePick);
    };

    let score = result.final_score();
    // The pick text wins over the recorded closing line when both exist.
    let line = pick.line.or_else(|| pred.recorded_line(market));
    let grade = match market {
        Market::Moneyline => grade_moneyline(score, pick.side),
        Market::Spread => grade_spread(score, pick.side, line),
        Market::Total => grade_total(score, pick.side, line),
    };

    match grade {
        Grade::Ungradeable(reason) => MarketGrade::Skipped(reason),
        Grade::Graded {
            result: outcome,
            is_correct,
            margin,
        } => MarketGrade::Evaluated(EvaluatedOutcome {
            league: pred.league.clone(),
            game_id: pred.game_id.clone(),
            market,
            pick: raw.to_string(),
            pick_side: pick.side,
            pick_line: pick.line,
            result: outcome,
            is_correct,
            margin,
            game_start: result.start_time.unwrap_or_else(Utc::now),
            prediction_id: pred.id,
        }),
    }
}

/// Counters for one grading run, printed in the run summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationSummary {
    pub predictions: usize,
    pub evaluated: usize,
    pub skipped_missing_pick: usize,
    pub skipped_unparseable: usize,
    pub skipped_missing_score: usize,
    pub skipped_missing_line: usize,
    pub composite_total: f64,
}

impl EvaluationSummary {
    fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::MissingPick => self.skipped_missing_pick += 1,
            SkipReason::UnparseablePick => self.skipped_unparseable += 1,
            SkipReason::MissingScore => self.skipped_missing_score += 1,
            SkipReason::MissingLine => self.skipped_missing_line += 1,
        }
    }

    pub fn skipped_total(&self) -> usize {
        self.skipped_unparseable
            + self.skipped_missing_score
            + self.skipped_missing_line
    }

    pub fn mean_composite_grade(&self) -> f64 {
        if self.predictions == 0 {
            return 0.0;
        }
        self.composite_total / self.predictions as f64
    }
}

/// Grade every market of every prediction that has a matching final result.
/// Predictions without a result row are ignored entirely; ungradeable markets
/// are counted but produce no outcome row.
pub fn evaluate_predictions(
    preds: &[PredictionRow],
    results: &HashMap<String, GameResult>,
) -> (Vec<EvaluatedOutcome>, EvaluationSummary) {
    let mut outcomes = Vec::new();
    let mut summary = EvaluationSummary::default();

    for pred in preds {
        let Some(result) = results.get(&pred.game_id) else {
            continue;
        };
        summary.predictions += 1;

        let mut grades: [Option<Grade>; 3] = [None, None, None];
        for (slot, market) in Market::ALL.into_iter().enumerate() {
            match grade_market(pred, result, market) {
                MarketGrade::Evaluated(outcome) => {
                    grades[slot] = Some(Grade::Graded {
                        result: outcome.result,
                        is_correct: outcome.is_correct,
                        margin: outcome.margin,
                    });
                    outcomes.push(outcome);
                    summary.evaluated += 1;
                }
                MarketGrade::Skipped(reason) => summary.record_skip(reason),
            }
        }
        summary.composite_total += composite_grade(grades[0], grades[1], grades[2]);
    }

    (outcomes, summary)
}

/// Headline number for one prediction across its three markets: a moneyline
/// win counts 1.0, spread and total wins 0.5 each.
pub fn composite_grade(
    moneyline: Option<Grade>,
    spread: Option<Grade>,
    total: Option<Grade>,
) -> f64 {
    let mut score = 0.0;
    for (grade, weight) in [(moneyline, 1.0), (spread, 0.5), (total, 0.5)] {
        if let Some(Grade::Graded {
            result: Outcome::Win,
            ..
        }) = grade
        {
            score += weight;
        }
    }
    score
}
