use std::collections::HashMap;

use chrono::{TimeZone, Utc};

use slate_grader::grading::{self, MarketGrade, SkipReason};
use slate_grader::markets::{Market, PickSide, normalize_pick};
use slate_grader::model::{GameResult, Outcome, PredictionRow};

fn game(game_id: &str, home: i64, away: i64) -> GameResult {
    GameResult {
        league: "nfl".to_string(),
        game_id: game_id.to_string(),
        home_team: "KC".to_string(),
        away_team: "BUF".to_string(),
        home_score: Some(home),
        away_score: Some(away),
        completed: true,
        start_time: Some(Utc.with_ymd_and_hms(2026, 8, 1, 17, 0, 0).unwrap()),
    }
}

fn prediction(game_id: &str) -> PredictionRow {
    PredictionRow {
        league: "nfl".to_string(),
        game_id: game_id.to_string(),
        ..Default::default()
    }
}

#[test]
fn home_minus_three_covers_a_blowout() {
    let mut pred = prediction("g1");
    pred.pick_spread = Some("HOME -3".to_string());
    let result = game("g1", 10, 0);

    match grading::grade_market(&pred, &result, Market::Spread) {
        MarketGrade::Evaluated(outcome) => {
            assert_eq!(outcome.result, Outcome::Win);
            assert_eq!(outcome.is_correct, Some(true));
            assert!((outcome.margin - 7.0).abs() < 1e-9);
            assert_eq!(outcome.pick_line, Some(-3.0));
        }
        MarketGrade::Skipped(reason) => panic!("should grade, got skip {reason:?}"),
    }
}

#[test]
fn over_forty_five_and_a_half_misses_by_half_a_point() {
    let mut pred = prediction("g1");
    pred.pick_total = Some("Over 45.5".to_string());
    let result = game("g1", 20, 25);

    match grading::grade_market(&pred, &result, Market::Total) {
        MarketGrade::Evaluated(outcome) => {
            assert_eq!(outcome.result, Outcome::Loss);
            assert_eq!(outcome.is_correct, Some(false));
            assert!((outcome.margin + 0.5).abs() < 1e-9);
        }
        MarketGrade::Skipped(reason) => panic!("should grade, got skip {reason:?}"),
    }

    // The same game under the same line is the winning side.
    pred.pick_total = Some("Under 45.5".to_string());
    match grading::grade_market(&pred, &result, Market::Total) {
        MarketGrade::Evaluated(outcome) => assert_eq!(outcome.result, Outcome::Win),
        MarketGrade::Skipped(reason) => panic!("should grade, got skip {reason:?}"),
    }
}

#[test]
fn tied_moneyline_pushes_with_zero_margin() {
    let mut pred = prediction("g1");
    pred.pick_moneyline = Some("AWAY".to_string());
    let result = game("g1", 3, 3);

    match grading::grade_market(&pred, &result, Market::Moneyline) {
        MarketGrade::Evaluated(outcome) => {
            assert_eq!(outcome.result, Outcome::Push);
            assert_eq!(outcome.is_correct, None);
            assert_eq!(outcome.margin, 0.0);
        }
        MarketGrade::Skipped(reason) => panic!("should grade, got skip {reason:?}"),
    }
}

#[test]
fn missing_score_is_skipped_not_lost() {
    let mut pred = prediction("g1");
    pred.pick_moneyline = Some("HOME".to_string());
    let mut result = game("g1", 0, 0);
    result.home_score = None;
    result.away_score = None;
    result.completed = false;

    match grading::grade_market(&pred, &result, Market::Moneyline) {
        MarketGrade::Skipped(reason) => assert_eq!(reason, SkipReason::MissingScore),
        MarketGrade::Evaluated(outcome) => {
            panic!("ungradeable pick must not be graded, got {:?}", outcome.result)
        }
    }
}

#[test]
fn garbage_pick_is_skipped_as_unparseable() {
    let mut pred = prediction("g1");
    pred.pick_spread = Some("KC by a lot".to_string());
    let result = game("g1", 31, 10);

    match grading::grade_market(&pred, &result, Market::Spread) {
        MarketGrade::Skipped(reason) => assert_eq!(reason, SkipReason::UnparseablePick),
        MarketGrade::Evaluated(_) => panic!("garbage pick must not grade"),
    }
}

#[test]
fn bare_total_side_is_unparseable_even_with_recorded_line() {
    // "OVER" alone is not a two-token total pick, so it stays unparseable;
    // the closing-line fallback applies only when the pick text parses.
    let mut pred = prediction("g1");
    pred.pick_total = Some("OVER".to_string());
    pred.total_line = Some(41.0);
    let result = game("g1", 24, 20);

    match grading::grade_market(&pred, &result, Market::Total) {
        MarketGrade::Skipped(reason) => assert_eq!(reason, SkipReason::UnparseablePick),
        MarketGrade::Evaluated(_) => panic!("bare OVER should not parse"),
    }
}

#[test]
fn batch_evaluation_counts_skips_and_outcomes() {
    let mut graded = prediction("g1");
    graded.pick_moneyline = Some("HOME".to_string());
    graded.pick_spread = Some("HOME -3".to_string());
    graded.pick_total = Some("Over 40".to_string());

    let mut partial = prediction("g2");
    partial.pick_moneyline = Some("AWAY".to_string());
    partial.pick_spread = Some("not a pick".to_string());

    let mut unmatched = prediction("g9");
    unmatched.pick_moneyline = Some("HOME".to_string());

    let mut results = HashMap::new();
    results.insert("g1".to_string(), game("g1", 27, 20));
    results.insert("g2".to_string(), game("g2", 13, 17));

    let (outcomes, summary) = grading::evaluate_predictions(
        &[graded, partial, unmatched],
        &results,
    );

    assert_eq!(summary.predictions, 2);
    assert_eq!(summary.evaluated, 4);
    assert_eq!(summary.skipped_unparseable, 1);
    assert_eq!(summary.skipped_missing_pick, 1);
    assert_eq!(outcomes.len(), 4);

    // g1: ML win (home won), spread win (27-20-3 covers), total win (47 > 40).
    // Composite 2.0; g2 moneyline win (away won) adds 1.0.
    assert!((summary.composite_total - 3.0).abs() < 1e-9);
    assert!((summary.mean_composite_grade() - 1.5).abs() < 1e-9);

    let g1_spread = outcomes
        .iter()
        .find(|o| o.game_id == "g1" && o.market == Market::Spread)
        .expect("g1 spread outcome");
    assert_eq!(g1_spread.result, Outcome::Win);
    assert_eq!(g1_spread.pick_side, PickSide::Home);
}

#[test]
fn normalization_round_trip_preserves_pairs() {
    for (raw, market) in [
        ("home", Market::Moneyline),
        ("HOME -6.5", Market::Spread),
        ("AWAY +10", Market::Spread),
        ("over 210.5", Market::Total),
    ] {
        let pick = normalize_pick(raw, market).expect("well-formed pick");
        let reparsed = normalize_pick(&pick.serialize(), market).expect("serialized form");
        assert_eq!(pick, reparsed);
    }
}
